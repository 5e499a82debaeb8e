use crate::analyzer;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Audio directory not found: {0}")]
    RootNotFound(PathBuf),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct DatasetResult {
    pub written: u64,
    pub failed: u64,
}

/// One labelled audio file: `<root>/<genre>/<file>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledFile {
    pub path: PathBuf,
    pub track_id: String,
    pub genre: String,
}

/// Files of a genre-organized tree, labelled by the top-level directory
/// they sit under. Files directly in `root` have no genre and are skipped.
pub fn collect_labelled(root: &Path, extension: &str) -> Vec<LabelledFile> {
    crate::reorganize::collect_audio_files(root, extension)
        .into_iter()
        .filter_map(|path| {
            let mut components = path.strip_prefix(root).ok()?.components();
            let genre = components.next()?.as_os_str().to_string_lossy().into_owned();
            components.next()?;
            let name = path.file_name()?.to_string_lossy().into_owned();
            let track_id = name.split('.').next().unwrap_or_default().to_string();
            Some(LabelledFile {
                path,
                track_id,
                genre,
            })
        })
        .collect()
}

/// Header row: `track_id`, `genre`, then the feature column names.
pub fn header() -> Vec<String> {
    let mut h = vec!["track_id".to_string(), "genre".to_string()];
    h.extend(analyzer::column_names());
    h
}

/// Extract features for every file under a genre-organized `root` and write
/// one CSV row per successfully analyzed file. Failures are left out.
pub fn build_dataset(
    root: &Path,
    output: &Path,
    extension: &str,
) -> Result<DatasetResult, DatasetError> {
    if !root.is_dir() {
        return Err(DatasetError::RootNotFound(root.to_path_buf()));
    }
    let files = collect_labelled(root, extension);
    log::info!("Building dataset from {} files", files.len());

    let mut writer = csv::Writer::from_path(output)?;
    write_rows(&mut writer, &files, analyzer::extract)
}

fn write_rows<W, F>(
    writer: &mut csv::Writer<W>,
    files: &[LabelledFile],
    extract: F,
) -> Result<DatasetResult, DatasetError>
where
    W: std::io::Write,
    F: Fn(&Path) -> Option<Vec<f64>>,
{
    writer.write_record(header())?;

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );

    let mut result = DatasetResult {
        written: 0,
        failed: 0,
    };
    for file in files {
        match extract(&file.path) {
            Some(vector) if vector.len() == analyzer::FEATURE_COUNT => {
                let mut row = Vec::with_capacity(vector.len() + 2);
                row.push(file.track_id.clone());
                row.push(file.genre.clone());
                row.extend(vector.iter().map(|v| v.to_string()));
                writer.write_record(&row)?;
                result.written += 1;
            }
            Some(vector) => {
                log::warn!(
                    "Dropping {}: {} features, expected {}",
                    file.path.display(),
                    vector.len(),
                    analyzer::FEATURE_COUNT
                );
                result.failed += 1;
            }
            None => result.failed += 1,
        }
        pb.inc(1);
        pb.set_message(format!("{} written, {} failed", result.written, result.failed));
    }
    writer.flush()?;

    pb.finish_with_message(format!(
        "Done: {} written, {} failed",
        result.written, result.failed
    ));
    Ok(result)
}

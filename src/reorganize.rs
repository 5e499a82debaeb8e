use crate::metadata::{MetadataError, TrackTable};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ReorganizeError {
    #[error("Metadata file not found: {0}")]
    MetadataNotFound(PathBuf),
    #[error("Audio directory not found: {0}")]
    AudioDirNotFound(PathBuf),
    #[error("Cannot derive output directory from {0}")]
    NoOutputDir(PathBuf),
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-file failure inside a run; logged and counted, never fatal.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("file name has no numeric track ID")]
    BadTrackId,
    #[error("genre '{0}' is not usable as a directory name")]
    BadGenre(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ReorganizeOptions {
    pub metadata_path: PathBuf,
    pub audio_dir: PathBuf,
    /// Defaults to `<audio_dir>_genres` next to the audio directory.
    pub output_dir: Option<PathBuf>,
    /// File extension to pick up, without the dot.
    pub extension: String,
    pub dry_run: bool,
}

impl ReorganizeOptions {
    pub fn new(metadata_path: impl Into<PathBuf>, audio_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata_path: metadata_path.into(),
            audio_dir: audio_dir.into(),
            output_dir: None,
            extension: crate::DEFAULT_EXTENSION.to_string(),
            dry_run: false,
        }
    }

    pub fn resolve_output_dir(&self) -> Result<PathBuf, ReorganizeError> {
        if let Some(dir) = &self.output_dir {
            return Ok(dir.clone());
        }
        default_output_dir(&self.audio_dir)
    }
}

/// `<parent>/<name>_genres` for an existing audio directory `<parent>/<name>`.
///
/// The directory is resolved first, so `.` or `fma_small/..` name their real
/// directory. The filesystem root has no sibling and is rejected.
pub fn default_output_dir(audio_dir: &Path) -> Result<PathBuf, ReorganizeError> {
    let resolved = std::fs::canonicalize(audio_dir)?;
    let no_output = || ReorganizeError::NoOutputDir(audio_dir.to_path_buf());
    let name = resolved
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(no_output)?;
    let parent = resolved.parent().ok_or_else(no_output)?;
    Ok(parent.join(format!("{}_genres", name)))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReorganizeResult {
    pub scanned: u64,
    pub moved: u64,
    pub not_found: u64,
    pub no_genre: u64,
    pub errors: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    Moved { genre: String, dest: PathBuf },
    NotFound(u32),
    NoGenre(u32),
}

/// Move every matching audio file under `audio_dir` into
/// `<output>/<genre_top>/<file name>`.
///
/// Missing metadata or audio directory is reported before anything is
/// touched. After that, each file is handled on its own: skips and errors
/// are logged and counted and the run continues.
pub fn reorganize(options: &ReorganizeOptions) -> Result<ReorganizeResult, ReorganizeError> {
    if !options.metadata_path.is_file() {
        return Err(ReorganizeError::MetadataNotFound(options.metadata_path.clone()));
    }
    if !options.audio_dir.is_dir() {
        return Err(ReorganizeError::AudioDirNotFound(options.audio_dir.clone()));
    }
    let output_dir = options.resolve_output_dir()?;

    let table = TrackTable::load(&options.metadata_path)?;
    run(&table, options, &output_dir)
}

/// Reorganize against an already-loaded table.
pub fn run(
    table: &TrackTable,
    options: &ReorganizeOptions,
    output_dir: &Path,
) -> Result<ReorganizeResult, ReorganizeError> {
    let audio_files = collect_audio_files(&options.audio_dir, &options.extension);
    log::info!(
        "Found {} .{} files under {}",
        audio_files.len(),
        options.extension,
        options.audio_dir.display()
    );

    if !options.dry_run {
        std::fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(audio_files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}) ({eta}) {msg}",
        )
        .unwrap()
        .progress_chars("#>-"),
    );
    pb.set_message("Reorganizing...");

    let mut result = ReorganizeResult::default();
    for path in &audio_files {
        result.scanned += 1;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match process_file(table, path, &name, output_dir, options.dry_run) {
            Ok(FileAction::Moved { genre, dest }) => {
                log::info!("Moved {} to {} ({})", name, genre, dest.display());
                result.moved += 1;
            }
            Ok(FileAction::NotFound(id)) => {
                log::warn!("Skipping {}: track ID {} not found in metadata", name, id);
                result.not_found += 1;
            }
            Ok(FileAction::NoGenre(id)) => {
                log::warn!("Skipping {}: no top-level genre for track {}", name, id);
                result.no_genre += 1;
            }
            Err(e) => {
                log::error!("Error with file {}: {}", name, e);
                result.errors += 1;
            }
        }
        pb.inc(1);
    }

    pb.finish_with_message(format!(
        "Done: {} moved, {} not found, {} no genre, {} errors",
        result.moved, result.not_found, result.no_genre, result.errors
    ));

    Ok(result)
}

/// Files with the given extension (case-insensitive), in sorted walk order.
pub fn collect_audio_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .is_some_and(|x| x.eq_ignore_ascii_case(extension))
        })
        .map(|e| e.into_path())
        .collect()
}

/// Track ID from the part of the file name before the first `.`.
pub fn track_id_from_path(path: &Path) -> Option<u32> {
    let name = path.file_name()?.to_str()?;
    let stem = name.split('.').next()?;
    stem.trim().parse().ok()
}

fn process_file(
    table: &TrackTable,
    path: &Path,
    file_name: &str,
    output_dir: &Path,
    dry_run: bool,
) -> Result<FileAction, FileError> {
    let track_id = track_id_from_path(path).ok_or(FileError::BadTrackId)?;

    let Some(record) = table.get(track_id) else {
        return Ok(FileAction::NotFound(track_id));
    };
    let Some(genre) = record.genre_top.as_deref() else {
        return Ok(FileAction::NoGenre(track_id));
    };

    let dir_name = genre_dir_name(genre).ok_or_else(|| FileError::BadGenre(genre.to_string()))?;
    let genre_dir = output_dir.join(&dir_name);
    let dest = genre_dir.join(file_name);

    if !dry_run {
        // create_dir_all succeeds if another process created it first
        std::fs::create_dir_all(&genre_dir)?;
        move_file(path, &dest)?;
    }

    Ok(FileAction::Moved {
        genre: genre.to_string(),
        dest,
    })
}

/// A genre label as a single path component: separators become `-`.
/// Returns `None` for labels that would escape the output directory.
pub fn genre_dir_name(genre: &str) -> Option<String> {
    let cleaned: String = genre
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => None,
        _ => Some(cleaned),
    }
}

/// Rename, falling back to copy + remove when source and destination are
/// on different filesystems.
fn move_file(src: &Path, dest: &Path) -> std::io::Result<()> {
    match std::fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            log::debug!(
                "rename {} failed ({}), copying instead",
                src.display(),
                rename_err
            );
            std::fs::copy(src, dest).map_err(|_| rename_err)?;
            std::fs::remove_file(src)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::TrackRecord;
    use std::fs;

    const TRACKS_CSV: &str = "\
,track,track
,genre_top,genres
track_id,,
5,Rock,[12]
7,,[]
9,Old-Time / Historic,[8]
";

    struct Fixture {
        _tmp: tempfile::TempDir,
        metadata: PathBuf,
        audio: PathBuf,
    }

    fn fixture(files: &[&str]) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let metadata = tmp.path().join("tracks.csv");
        fs::write(&metadata, TRACKS_CSV).unwrap();
        let audio = tmp.path().join("fma_small");
        for f in files {
            let p = audio.join(f);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(&p, b"ID3").unwrap();
        }
        Fixture {
            _tmp: tmp,
            metadata,
            audio,
        }
    }

    #[test]
    fn test_moves_known_track_into_genre_dir() {
        let fx = fixture(&["000/5.mp3"]);
        let opts = ReorganizeOptions::new(&fx.metadata, &fx.audio);
        let result = reorganize(&opts).unwrap();

        let expected = fx.audio.parent().unwrap().join("fma_small_genres/Rock/5.mp3");
        assert!(expected.is_file());
        assert!(!fx.audio.join("000/5.mp3").exists());
        assert_eq!(result.moved, 1);
        assert_eq!(result.scanned, 1);
    }

    #[test]
    fn test_unknown_track_stays_put() {
        let fx = fixture(&["3.mp3"]);
        let result = reorganize(&ReorganizeOptions::new(&fx.metadata, &fx.audio)).unwrap();
        assert_eq!(result.not_found, 1);
        assert_eq!(result.moved, 0);
        assert!(fx.audio.join("3.mp3").is_file());
    }

    #[test]
    fn test_null_genre_is_skipped() {
        let fx = fixture(&["7.mp3"]);
        let result = reorganize(&ReorganizeOptions::new(&fx.metadata, &fx.audio)).unwrap();
        assert_eq!(result.no_genre, 1);
        assert!(fx.audio.join("7.mp3").is_file());
    }

    #[test]
    fn test_bad_name_does_not_abort_batch() {
        let fx = fixture(&["cover.mp3", "5.mp3", "notes.txt"]);
        let result = reorganize(&ReorganizeOptions::new(&fx.metadata, &fx.audio)).unwrap();
        assert_eq!(result.scanned, 2);
        assert_eq!(result.errors, 1);
        assert_eq!(result.moved, 1);
        assert!(fx.audio.join("cover.mp3").is_file());
        assert!(fx.audio.join("notes.txt").is_file());
    }

    #[test]
    fn test_missing_metadata_is_fatal_and_touches_nothing() {
        let fx = fixture(&["5.mp3"]);
        let opts = ReorganizeOptions::new(fx.audio.join("nope.csv"), &fx.audio);
        let err = reorganize(&opts).unwrap_err();
        assert!(matches!(err, ReorganizeError::MetadataNotFound(_)));
        assert!(fx.audio.join("5.mp3").is_file());
        assert!(!fx.audio.parent().unwrap().join("fma_small_genres").exists());
    }

    #[test]
    fn test_missing_audio_dir_is_fatal() {
        let fx = fixture(&[]);
        let opts = ReorganizeOptions::new(&fx.metadata, fx.audio.join("missing"));
        assert!(matches!(
            reorganize(&opts).unwrap_err(),
            ReorganizeError::AudioDirNotFound(_)
        ));
    }

    #[test]
    fn test_dry_run_moves_nothing() {
        let fx = fixture(&["5.mp3"]);
        let mut opts = ReorganizeOptions::new(&fx.metadata, &fx.audio);
        opts.dry_run = true;
        let result = reorganize(&opts).unwrap();
        assert_eq!(result.moved, 1);
        assert!(fx.audio.join("5.mp3").is_file());
        assert!(!fx.audio.parent().unwrap().join("fma_small_genres").exists());
    }

    #[test]
    fn test_explicit_output_dir_and_existing_genre_dir() {
        let fx = fixture(&["5.mp3", "a/9.MP3"]);
        let out = fx.audio.parent().unwrap().join("sorted");
        fs::create_dir_all(out.join("Rock")).unwrap();
        let mut opts = ReorganizeOptions::new(&fx.metadata, &fx.audio);
        opts.output_dir = Some(out.clone());

        let result = reorganize(&opts).unwrap();
        assert_eq!(result.moved, 2);
        assert!(out.join("Rock/5.mp3").is_file());
        assert!(out.join("Old-Time - Historic/9.MP3").is_file());
    }

    #[test]
    fn test_rerun_only_sees_remaining_files() {
        let fx = fixture(&["5.mp3", "3.mp3"]);
        let opts = ReorganizeOptions::new(&fx.metadata, &fx.audio);
        let first = reorganize(&opts).unwrap();
        assert_eq!((first.moved, first.not_found), (1, 1));
        let second = reorganize(&opts).unwrap();
        assert_eq!((second.scanned, second.moved, second.not_found), (1, 0, 1));
    }

    #[test]
    fn test_run_with_in_memory_table() {
        let tmp = tempfile::tempdir().unwrap();
        let audio = tmp.path().join("clips");
        fs::create_dir_all(&audio).unwrap();
        fs::write(audio.join("42.mp3"), b"x").unwrap();

        let mut table = TrackTable::default();
        table.insert(
            42,
            TrackRecord {
                genre_top: Some("Jazz".to_string()),
                ..Default::default()
            },
        );
        let opts = ReorganizeOptions::new(tmp.path().join("unused.csv"), &audio);
        let out = tmp.path().join("out");
        let result = run(&table, &opts, &out).unwrap();
        assert_eq!(result.moved, 1);
        assert!(out.join("Jazz/42.mp3").is_file());
    }

    #[test]
    fn test_track_id_from_path() {
        assert_eq!(track_id_from_path(Path::new("a/000123.mp3")), Some(123));
        assert_eq!(track_id_from_path(Path::new("5.clip.mp3")), Some(5));
        assert_eq!(track_id_from_path(Path::new("x5.mp3")), None);
    }

    #[test]
    fn test_genre_dir_name() {
        assert_eq!(genre_dir_name("Rock").as_deref(), Some("Rock"));
        assert_eq!(
            genre_dir_name("Old-Time / Historic").as_deref(),
            Some("Old-Time - Historic")
        );
        assert_eq!(genre_dir_name(".."), None);
        assert_eq!(genre_dir_name("  "), None);
    }

    #[test]
    fn test_default_output_dir() {
        let fx = fixture(&["5.mp3"]);
        let parent = fs::canonicalize(fx.audio.parent().unwrap()).unwrap();
        assert_eq!(
            default_output_dir(&fx.audio).unwrap(),
            parent.join("fma_small_genres")
        );
    }

    #[test]
    fn test_default_output_dir_resolves_dot_paths() {
        let fx = fixture(&["000/5.mp3"]);
        let parent = fs::canonicalize(fx.audio.parent().unwrap()).unwrap();
        assert_eq!(
            default_output_dir(&fx.audio.join("000").join("..")).unwrap(),
            parent.join("fma_small_genres")
        );

        // Relative to the working directory
        let cwd = fs::canonicalize(".").unwrap();
        let expected = cwd.parent().unwrap().join(format!(
            "{}_genres",
            cwd.file_name().unwrap().to_str().unwrap()
        ));
        assert_eq!(default_output_dir(Path::new(".")).unwrap(), expected);
    }

    #[test]
    fn test_default_output_dir_rejects_root_and_missing() {
        assert!(matches!(
            default_output_dir(Path::new("/")),
            Err(ReorganizeError::NoOutputDir(_))
        ));
        assert!(matches!(
            default_output_dir(Path::new("/nonexistent/fma_small")),
            Err(ReorganizeError::Io(_))
        ));
    }

    #[test]
    fn test_reorganize_from_parent_relative_audio_dir() {
        let fx = fixture(&["000/5.mp3"]);
        let opts = ReorganizeOptions::new(&fx.metadata, fx.audio.join("000").join(".."));
        let result = reorganize(&opts).unwrap();
        assert_eq!(result.moved, 1);
        assert!(fx.audio.parent().unwrap().join("fma_small_genres/Rock/5.mp3").is_file());
    }
}

pub mod literal;

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing header rows (expected category and field rows)")]
    MissingHeader,
    #[error("Required column ({0}, {1}) not present")]
    MissingColumn(String, String),
    #[error("Invalid track ID '{value}' on line {line}")]
    InvalidTrackId { value: String, line: u64 },
    #[error("Duplicate track ID {0}")]
    DuplicateTrackId(u32),
    #[error("Bad list literal in ({column}) for track {track_id}: {source}")]
    Literal {
        track_id: u32,
        column: String,
        #[source]
        source: literal::LiteralError,
    },
}

/// The columns we resolve, as `(category, field)` pairs.
pub const GENRE_TOP: (&str, &str) = ("track", "genre_top");
pub const GENRES: (&str, &str) = ("track", "genres");
pub const GENRES_ALL: (&str, &str) = ("track", "genres_all");

/// Per-track fields decoded from the metadata table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackRecord {
    pub genre_top: Option<String>,
    pub genres: Vec<u32>,
    pub genres_all: Vec<u32>,
}

/// Track metadata keyed by track ID.
///
/// The CSV carries two header rows: the first names the category
/// (`album`, `artist`, `track`, ...), the second the field within it.
/// An optional third row holds only the index name (`track_id,,,...`).
#[derive(Debug, Default)]
pub struct TrackTable {
    tracks: HashMap<u32, TrackRecord>,
}

impl TrackTable {
    pub fn load(path: &Path) -> Result<Self, MetadataError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, MetadataError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        let mut records = rdr.records();

        let categories = records.next().ok_or(MetadataError::MissingHeader)??;
        let fields = records.next().ok_or(MetadataError::MissingHeader)??;

        let column = |(cat, field): (&str, &str)| {
            categories
                .iter()
                .zip(fields.iter())
                .position(|(c, f)| c == cat && f == field)
        };
        let genre_top_idx = column(GENRE_TOP).ok_or_else(|| {
            MetadataError::MissingColumn(GENRE_TOP.0.to_string(), GENRE_TOP.1.to_string())
        })?;
        let genres_idx = column(GENRES);
        let genres_all_idx = column(GENRES_ALL);

        let mut tracks = HashMap::new();
        for record in records {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let raw_id = record.get(0).unwrap_or("").trim();

            if is_index_name_row(&record) {
                log::debug!("Skipping index name row on line {}", line);
                continue;
            }

            let track_id: u32 = raw_id.parse().map_err(|_| MetadataError::InvalidTrackId {
                value: raw_id.to_string(),
                line,
            })?;

            let list_column = |idx: Option<usize>, name: &str| -> Result<Vec<u32>, MetadataError> {
                match idx.and_then(|i| non_null(record.get(i))) {
                    Some(text) => literal::parse_id_list(text).map_err(|source| {
                        MetadataError::Literal {
                            track_id,
                            column: name.to_string(),
                            source,
                        }
                    }),
                    None => Ok(Vec::new()),
                }
            };

            let entry = TrackRecord {
                genre_top: non_null(record.get(genre_top_idx)).map(str::to_string),
                genres: list_column(genres_idx, "track, genres")?,
                genres_all: list_column(genres_all_idx, "track, genres_all")?,
            };

            if tracks.insert(track_id, entry).is_some() {
                return Err(MetadataError::DuplicateTrackId(track_id));
            }
        }

        log::info!("Loaded metadata for {} tracks", tracks.len());
        Ok(Self { tracks })
    }

    pub fn get(&self, track_id: u32) -> Option<&TrackRecord> {
        self.tracks.get(&track_id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.tracks.len()
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, track_id: u32, record: TrackRecord) {
        self.tracks.insert(track_id, record);
    }
}

/// A row with a label in the first column and nothing else.
fn is_index_name_row(record: &csv::StringRecord) -> bool {
    let first = record.get(0).unwrap_or("").trim();
    !first.is_empty()
        && first.parse::<u32>().is_err()
        && record.iter().skip(1).all(|f| f.trim().is_empty())
}

/// Empty cells and `nan` markers are null.
fn non_null(value: Option<&str>) -> Option<&str> {
    let v = value?.trim();
    if v.is_empty() || v.eq_ignore_ascii_case("nan") {
        None
    } else {
        Some(v)
    }
}

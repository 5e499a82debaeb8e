use super::AnalyzeError;
use super::spectral::{self, FrameFeatures, Matrix};
use ndarray::Axis;

/// How a group's per-frame matrix collapses to summary statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    /// Mean and std of each coefficient across frames: `dims` values each.
    PerCoefficient,
    /// Mean and std over every element of the matrix: one value each.
    Flatten,
}

/// One feature group of the output vector.
#[derive(Clone, Copy)]
pub struct FeatureGroup {
    pub name: &'static str,
    pub dims: usize,
    pub reducer: Reducer,
    /// The group's `dims x frames` matrix.
    pub matrix: fn(&FrameFeatures) -> &Matrix,
}

impl FeatureGroup {
    /// Values this group contributes per statistic.
    pub const fn width(&self) -> usize {
        match self.reducer {
            Reducer::PerCoefficient => self.dims,
            Reducer::Flatten => 1,
        }
    }
}

/// Layout of the feature vector. Column names and extraction are both
/// generated from this table, in this order.
pub const FEATURE_GROUPS: &[FeatureGroup] = &[
    FeatureGroup {
        name: "mfcc",
        dims: spectral::N_MFCC,
        reducer: Reducer::PerCoefficient,
        matrix: mfcc_matrix,
    },
    FeatureGroup {
        name: "contrast",
        dims: spectral::CONTRAST_OCTAVES + 1,
        reducer: Reducer::PerCoefficient,
        matrix: contrast_matrix,
    },
    FeatureGroup {
        name: "chroma",
        dims: spectral::N_CHROMA,
        reducer: Reducer::PerCoefficient,
        matrix: chroma_matrix,
    },
    FeatureGroup {
        name: "zcr",
        dims: 1,
        reducer: Reducer::Flatten,
        matrix: zcr_matrix,
    },
];

fn mfcc_matrix(f: &FrameFeatures) -> &Matrix {
    &f.mfcc
}

fn contrast_matrix(f: &FrameFeatures) -> &Matrix {
    &f.contrast
}

fn chroma_matrix(f: &FrameFeatures) -> &Matrix {
    &f.chroma
}

fn zcr_matrix(f: &FrameFeatures) -> &Matrix {
    &f.zcr
}

/// Statistics emitted per group, in order.
pub const STATISTICS: [&str; 2] = ["mean", "std"];

/// Total length of the feature vector.
pub const FEATURE_COUNT: usize = feature_count();

const fn feature_count() -> usize {
    let mut total = 0;
    let mut i = 0;
    while i < FEATURE_GROUPS.len() {
        total += FEATURE_GROUPS[i].width() * STATISTICS.len();
        i += 1;
    }
    total
}

/// Column names matching `extract`'s output order, e.g. `mfcc_mean_01`.
pub fn column_names() -> Vec<String> {
    let mut names = Vec::with_capacity(FEATURE_COUNT);
    for group in FEATURE_GROUPS {
        for stat in STATISTICS {
            names.extend((1..=group.width()).map(|i| format!("{}_{}_{:02}", group.name, stat, i)));
        }
    }
    names
}

/// Reduce per-frame matrices to the flat feature vector.
///
/// Fails if any group's matrix does not have `dims` rows and at least one
/// frame.
pub fn reduce(frames: &FrameFeatures) -> Result<Vec<f64>, AnalyzeError> {
    let mut out = Vec::with_capacity(FEATURE_COUNT);
    for group in FEATURE_GROUPS {
        let m = (group.matrix)(frames);
        let shape_error = || AnalyzeError::Shape {
            group: group.name,
            expected_rows: group.dims,
            rows: m.nrows(),
            frames: m.ncols(),
        };
        if m.nrows() != group.dims || m.ncols() == 0 {
            return Err(shape_error());
        }

        match group.reducer {
            Reducer::PerCoefficient => {
                let mean = m.mean_axis(Axis(1)).ok_or_else(shape_error)?;
                out.extend(mean.iter());
                out.extend(m.std_axis(Axis(1), 0.0).iter());
            }
            Reducer::Flatten => {
                out.push(m.mean().ok_or_else(shape_error)?);
                out.push(m.std(0.0));
            }
        }
    }
    Ok(out)
}

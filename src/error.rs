use std::path::PathBuf;

use thiserror::Error;

use crate::data::model::RegionKind;

pub type Result<T> = std::result::Result<T, CalibError>;

/// Everything the calibration core can reject.
///
/// Overlaps are deliberately absent: they are repaired and reported as
/// [`Adjustment`](crate::data::overlap::Adjustment) records instead.
#[derive(Debug, Error)]
pub enum CalibError {
    #[error("invalid {kind} '{name}': lower bound {lower} must be below upper bound {upper}")]
    InvalidRegion {
        kind: RegionKind,
        name: String,
        lower: f64,
        upper: f64,
    },

    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: RegionKind, name: String },

    #[error("no {kind} named '{name}'")]
    UnknownRegion { kind: RegionKind, name: String },

    #[error("corrupt calibration file {}: {entity}: {reason}", path.display())]
    CorruptFile {
        path: PathBuf,
        entity: String,
        reason: String,
    },

    #[error("invalid isotope '{value}', expected e.g. 'Ti-46'")]
    InvalidIsotope { value: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CalibError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CalibError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(
        path: impl Into<PathBuf>,
        entity: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        CalibError::CorruptFile {
            path: path.into(),
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

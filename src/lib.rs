//! Calibration core for time-of-flight mass spectra: named peak and
//! background regions, their overlap-free ordering, and the normalizer that
//! brings calibration files of any vintage into that shape.
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod state;

pub use config::Settings;
pub use data::calfile::CalibrationFile;
pub use data::model::{Background, Bounds, Isotope, Peak, Region, RegionKind};
pub use data::normalize::{clean_file, normalize, normalize_file, NormalizeReport, Persist};
pub use data::overlap::Adjustment;
pub use error::{CalibError, Result};
pub use state::CalibrationState;

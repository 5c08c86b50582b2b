/// Data layer: region model, ordering, overlap repair and calibration files.
///
/// Architecture:
/// ```text
///  calibration .json (any vintage)
///        │
///        ▼
///   ┌──────────┐
///   │ calfile  │  parse file → RawCalibration (current or legacy layout)
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ normalize │  validate → overlap (resolve) → sort → persist
///   └───────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │ CalibrationFile │  PeakTable + BackgroundTable, overlap-free, sorted
///   └────────────────┘
///        │
///        ▼
///   ┌──────────┐   spectrum (loader)
///   │ integral │◄─ association: background → nearest peak
///   └──────────┘
/// ```

pub mod association;
pub mod calfile;
pub mod integral;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod overlap;
pub mod sort;
pub mod spectrum;
pub mod table;

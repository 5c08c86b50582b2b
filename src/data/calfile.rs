use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::model::{Isotope, Peak, Region, RegionKind};
use super::table::{BackgroundTable, PeakTable};
use crate::error::{CalibError, Result};

/// Application-wide fallback calibration, looked up in the app directory.
pub const DEFAULT_CALIBRATION_FILE: &str = "calibration.json";

// ---------------------------------------------------------------------------
// CalibrationFile – the persisted aggregate
// ---------------------------------------------------------------------------

/// Peaks, backgrounds and the normalization isotopes, plus whatever other
/// calibration content the file carried (mass calibration, filters, ...),
/// which is written back untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationFile {
    pub peaks: PeakTable,
    pub backgrounds: BackgroundTable,
    /// Element symbol → isotope every other isotope of that element is
    /// ratioed to, e.g. `"Ba" → Ba-136`.
    pub norm_isos: BTreeMap<String, Isotope>,
    pub extra: Map<String, JsonValue>,
}

/// On-disk shape of one peak or background.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEntry {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isotope: Option<String>,
}

impl RegionEntry {
    fn from_region<R: Region>(r: &R, isotope: Option<&Isotope>) -> Self {
        RegionEntry {
            name: r.name().to_string(),
            lower: r.lower(),
            upper: r.upper(),
            isotope: isotope.map(ToString::to_string),
        }
    }
}

#[derive(Serialize)]
struct FileOut<'a> {
    peaks: Vec<RegionEntry>,
    backgrounds: Vec<RegionEntry>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    norm_isos: BTreeMap<String, Isotope>,
    #[serde(flatten)]
    extra: &'a Map<String, JsonValue>,
}

impl CalibrationFile {
    /// Pretty JSON with a trailing newline. Key order is fixed, so equal
    /// files serialize to equal bytes.
    pub fn to_json(&self) -> Result<String> {
        let out = FileOut {
            peaks: self
                .peaks
                .iter()
                .map(|p: &Peak| RegionEntry::from_region(p, p.isotope.as_ref()))
                .collect(),
            backgrounds: self
                .backgrounds
                .iter()
                .map(|b| RegionEntry::from_region(b, None))
                .collect(),
            norm_isos: self.norm_isos.clone(),
            extra: &self.extra,
        };
        let mut text = serde_json::to_string_pretty(&out)?;
        text.push('\n');
        Ok(text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CalibError::io(parent, e))?;
        }
        std::fs::write(path, text).map_err(|e| CalibError::io(path, e))
    }
}

// ---------------------------------------------------------------------------
// RawCalibration – a file as read, before any validation
// ---------------------------------------------------------------------------

/// Entity-level parse of a calibration file. Nothing here is checked beyond
/// "the shape deserializes"; see [`normalize`](super::normalize::normalize).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCalibration {
    pub peaks: Vec<RegionEntry>,
    pub backgrounds: Vec<RegionEntry>,
    pub norm_isos: Vec<(String, String)>,
    pub extra: Map<String, JsonValue>,
    /// The file used the old columnar `names`/`values` layout (or null tables).
    pub legacy_layout: bool,
}

/// Read and parse a calibration file.
pub fn read_raw(path: &Path) -> Result<RawCalibration> {
    let bytes = std::fs::read(path).map_err(|e| CalibError::io(path, e))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| CalibError::corrupt(path, "document", e.to_string()))?;
    parse_raw(path, &text)
}

/// Parse calibration JSON. `path` is only used in error messages.
///
/// Supported table layouts:
/// * current: `"peaks": [{"name", "lower", "upper", "isotope"?}, ...]`
/// * legacy:  `"integrals": {"names": [...], "values": [[lower, upper], ...]}`
///
/// Backgrounds use the same two layouts under `"backgrounds"`.
pub fn parse_raw(path: &Path, text: &str) -> Result<RawCalibration> {
    let root: JsonValue = serde_json::from_str(text)
        .map_err(|e| CalibError::corrupt(path, "document", e.to_string()))?;
    let JsonValue::Object(mut obj) = root else {
        return Err(CalibError::corrupt(path, "document", "expected a JSON object"));
    };

    let mut raw = RawCalibration::default();

    match obj.remove("peaks") {
        Some(v) => {
            raw.peaks = parse_table(path, RegionKind::Peak, v, &mut raw.legacy_layout)?;
            // stale legacy table next to a current one
            if obj.remove("integrals").is_some() {
                raw.legacy_layout = true;
            }
        }
        None => {
            if let Some(v) = obj.remove("integrals") {
                raw.peaks = parse_table(path, RegionKind::Peak, v, &mut raw.legacy_layout)?;
                raw.legacy_layout = true;
            }
        }
    }
    if let Some(v) = obj.remove("backgrounds") {
        raw.backgrounds = parse_table(path, RegionKind::Background, v, &mut raw.legacy_layout)?;
    }

    match obj.remove("norm_isos") {
        None | Some(JsonValue::Null) => {}
        Some(JsonValue::Object(map)) => {
            for (element, iso) in map {
                let JsonValue::String(iso) = iso else {
                    return Err(CalibError::corrupt(
                        path,
                        format!("norm_isos '{element}'"),
                        "expected an isotope string",
                    ));
                };
                raw.norm_isos.push((element, iso));
            }
        }
        Some(_) => {
            return Err(CalibError::corrupt(path, "norm_isos", "expected an object"));
        }
    }

    raw.extra = obj;
    Ok(raw)
}

fn parse_table(
    path: &Path,
    kind: RegionKind,
    value: JsonValue,
    legacy: &mut bool,
) -> Result<Vec<RegionEntry>> {
    match value {
        JsonValue::Null => {
            *legacy = true;
            Ok(Vec::new())
        }
        JsonValue::Array(rows) => rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let entity = entity_label(kind, row.get("name").and_then(JsonValue::as_str), i);
                serde_json::from_value(row).map_err(|e| CalibError::corrupt(path, entity, e.to_string()))
            })
            .collect(),
        JsonValue::Object(columns) => {
            *legacy = true;
            parse_columnar(path, kind, columns)
        }
        _ => Err(CalibError::corrupt(
            path,
            format!("{kind} table"),
            "expected a list or a names/values object",
        )),
    }
}

/// The old editor tables: a list of names and an N×2 list of limits.
fn parse_columnar(
    path: &Path,
    kind: RegionKind,
    mut columns: Map<String, JsonValue>,
) -> Result<Vec<RegionEntry>> {
    let table = format!("{kind} table");
    let names: Vec<String> = match columns.remove("names") {
        Some(v) => serde_json::from_value(v)
            .map_err(|e| CalibError::corrupt(path, &table, format!("names: {e}")))?,
        None => return Err(CalibError::corrupt(path, &table, "missing 'names'")),
    };
    let values: Vec<JsonValue> = match columns.remove("values") {
        Some(JsonValue::Array(v)) => v,
        _ => return Err(CalibError::corrupt(path, &table, "missing 'values' list")),
    };
    if names.len() != values.len() {
        return Err(CalibError::corrupt(
            path,
            &table,
            format!("{} names but {} limit pairs", names.len(), values.len()),
        ));
    }

    names
        .into_iter()
        .zip(values)
        .enumerate()
        .map(|(i, (name, limits))| {
            let entity = entity_label(kind, Some(&name), i);
            let [lower, upper]: [f64; 2] = serde_json::from_value(limits)
                .map_err(|e| CalibError::corrupt(path, entity, format!("limits: {e}")))?;
            Ok(RegionEntry {
                name,
                lower,
                upper,
                isotope: None,
            })
        })
        .collect()
}

fn entity_label(kind: RegionKind, name: Option<&str>, index: usize) -> String {
    match name {
        Some(n) if !n.trim().is_empty() => format!("{kind} '{n}'"),
        _ => format!("{kind} #{index}"),
    }
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Calibration to apply to a data file: `<stem>.json` next to it, otherwise
/// the application-wide [`DEFAULT_CALIBRATION_FILE`] in `app_dir`.
pub fn locate_calibration(data_file: &Path, app_dir: &Path) -> Option<PathBuf> {
    let beside = data_file.with_extension("json");
    if beside.is_file() {
        return Some(beside);
    }
    let fallback = app_dir.join(DEFAULT_CALIBRATION_FILE);
    fallback.is_file().then_some(fallback)
}

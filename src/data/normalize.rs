use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use log::{debug, info, warn};

use super::calfile::{read_raw, CalibrationFile, RawCalibration, RegionEntry};
use super::model::{Background, Isotope, Peak, Region, RegionKind};
use super::overlap::{resolve_backgrounds, resolve_overlaps, Adjustment};
use super::sort::sort_regions;
use super::table::RegionTable;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Normalization stages, in order. A file that fails during `Loaded` is
/// corrupt; one that fails during `Validated` holds an ill-formed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loaded,
    Validated,
    Resolved,
    Sorted,
    Persisted,
}

/// When to write the normalized file back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persist {
    Never,
    IfChanged,
    Always,
}

/// An entity dropped during validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub entity: String,
    pub reason: String,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.reason)
    }
}

/// Everything a normalization pass changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeReport {
    pub adjustments: Vec<Adjustment>,
    pub exclusions: Vec<Exclusion>,
    /// Peaks or backgrounds came in out of order.
    pub reordered: bool,
    /// The file used the legacy columnar layout.
    pub migrated: bool,
    pub written: bool,
}

impl NormalizeReport {
    pub fn has_changes(&self) -> bool {
        !self.adjustments.is_empty() || !self.exclusions.is_empty() || self.reordered || self.migrated
    }

    /// Regions whose limits moved.
    pub fn adjusted_count(&self) -> usize {
        self.adjustments.iter().filter(|a| !a.is_removal()).count()
    }

    /// Regions removed by overlap resolution plus entities excluded by
    /// validation.
    pub fn removed_count(&self) -> usize {
        self.adjustments.iter().filter(|a| a.is_removal()).count() + self.exclusions.len()
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Bring a raw calibration into compliance: validate, resolve overlaps, sort.
///
/// Ill-formed limits abort with `InvalidRegion`. Blank names, repeated names
/// and unparseable isotope tags are excluded and reported. The result is a
/// fixed point: normalizing it again reports no changes.
pub fn normalize(raw: RawCalibration) -> Result<(CalibrationFile, NormalizeReport)> {
    let mut report = NormalizeReport {
        migrated: raw.legacy_layout,
        ..Default::default()
    };

    let mut peaks = validate_peaks(raw.peaks, &mut report.exclusions)?;
    let mut backgrounds = validate_backgrounds(raw.backgrounds, &mut report.exclusions)?;
    let norm_isos = validate_norm_isos(raw.norm_isos, &mut report.exclusions);
    debug!(
        "{:?}: {} peak(s), {} background(s)",
        Stage::Validated,
        peaks.len(),
        backgrounds.len()
    );

    let peak_order = names(&peaks);
    let background_order = names(&backgrounds);

    report.adjustments = resolve_overlaps(&mut peaks)?;
    sort_regions(&mut backgrounds);
    report
        .adjustments
        .extend(resolve_backgrounds(&peaks, &mut backgrounds));
    debug!("{:?}: {} adjustment(s)", Stage::Resolved, report.adjustments.len());

    sort_regions(&mut peaks);
    sort_regions(&mut backgrounds);
    report.reordered =
        order_changed(&peak_order, &peaks) || order_changed(&background_order, &backgrounds);
    debug!("{:?}: reordered = {}", Stage::Sorted, report.reordered);

    let file = CalibrationFile {
        peaks: RegionTable::from_regions(peaks)?,
        backgrounds: RegionTable::from_regions(backgrounds)?,
        norm_isos,
        extra: raw.extra,
    };
    Ok((file, report))
}

/// Load, normalize and (depending on `persist`) rewrite a calibration file.
pub fn normalize_file(path: &Path, persist: Persist) -> Result<(CalibrationFile, NormalizeReport)> {
    let raw = read_raw(path)?;
    debug!("{}: {:?}", path.display(), Stage::Loaded);

    let (file, mut report) = normalize(raw)?;

    let write = match persist {
        Persist::Never => false,
        Persist::IfChanged => report.has_changes(),
        Persist::Always => true,
    };
    if write {
        file.save(path)?;
        report.written = true;
        debug!("{}: {:?}", path.display(), Stage::Persisted);
    }

    if report.has_changes() {
        info!(
            "normalized {}: {} adjusted, {} removed, reordered: {}, migrated: {}, written: {}",
            path.display(),
            report.adjusted_count(),
            report.removed_count(),
            report.reordered,
            report.migrated,
            report.written
        );
    }
    Ok((file, report))
}

/// The "clean file" maintenance command: normalize and always rewrite.
pub fn clean_file(path: &Path) -> Result<NormalizeReport> {
    normalize_file(path, Persist::Always).map(|(_, report)| report)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_peaks(entries: Vec<RegionEntry>, excluded: &mut Vec<Exclusion>) -> Result<Vec<Peak>> {
    let mut seen = HashSet::new();
    let mut peaks = Vec::with_capacity(entries.len());

    for entry in entries {
        if !admit(RegionKind::Peak, &entry, &mut seen, excluded) {
            continue;
        }
        let mut peak = Peak::new(entry.name, entry.lower, entry.upper)?;
        if let Some(tag) = entry.isotope {
            match tag.parse::<Isotope>() {
                Ok(iso) => peak.isotope = Some(iso),
                Err(e) => exclude(
                    excluded,
                    format!("isotope of peak '{}'", peak.name()),
                    format!("tag dropped: {e}"),
                ),
            }
        }
        peaks.push(peak);
    }
    Ok(peaks)
}

fn validate_backgrounds(
    entries: Vec<RegionEntry>,
    excluded: &mut Vec<Exclusion>,
) -> Result<Vec<Background>> {
    let mut seen = HashSet::new();
    let mut backgrounds = Vec::with_capacity(entries.len());

    for entry in entries {
        if admit(RegionKind::Background, &entry, &mut seen, excluded) {
            backgrounds.push(Background::new(entry.name, entry.lower, entry.upper)?);
        }
    }
    Ok(backgrounds)
}

/// Blank rows (left behind by the old table editor) and repeated names are
/// excluded; the first occurrence of a name wins.
fn admit(
    kind: RegionKind,
    entry: &RegionEntry,
    seen: &mut HashSet<String>,
    excluded: &mut Vec<Exclusion>,
) -> bool {
    if entry.name.trim().is_empty() {
        exclude(
            excluded,
            format!("{kind} [{}, {}]", entry.lower, entry.upper),
            "blank name".to_string(),
        );
        return false;
    }
    if !seen.insert(entry.name.clone()) {
        exclude(
            excluded,
            format!("{kind} '{}'", entry.name),
            "duplicate name".to_string(),
        );
        return false;
    }
    true
}

fn validate_norm_isos(
    entries: Vec<(String, String)>,
    excluded: &mut Vec<Exclusion>,
) -> BTreeMap<String, Isotope> {
    let mut out = BTreeMap::new();
    for (element, tag) in entries {
        match tag.parse::<Isotope>() {
            Ok(iso) if iso.element == element => {
                out.insert(element, iso);
            }
            Ok(iso) => exclude(
                excluded,
                format!("norm_isos '{element}'"),
                format!("{iso} is not an isotope of {element}"),
            ),
            Err(e) => exclude(excluded, format!("norm_isos '{element}'"), e.to_string()),
        }
    }
    out
}

fn exclude(excluded: &mut Vec<Exclusion>, entity: String, reason: String) {
    warn!("excluded {entity}: {reason}");
    excluded.push(Exclusion { entity, reason });
}

fn names<R: Region>(items: &[R]) -> Vec<String> {
    items.iter().map(|r| r.name().to_string()).collect()
}

/// Compare final order against input order, ignoring regions removed in
/// between.
fn order_changed<R: Region>(before: &[String], after: &[R]) -> bool {
    let kept: HashSet<&str> = after.iter().map(|r| r.name()).collect();
    before
        .iter()
        .filter(|n| kept.contains(n.as_str()))
        .map(String::as_str)
        .ne(after.iter().map(|r| r.name()))
}

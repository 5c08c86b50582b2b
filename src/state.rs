use std::path::{Path, PathBuf};

use log::info;

use crate::config::Settings;
use crate::data::association::{associate, Association};
use crate::data::calfile::CalibrationFile;
use crate::data::integral::{integrate, Integral, SpectrumProvider};
use crate::data::model::{Background, Isotope, Peak, Region, RegionKind};
use crate::data::normalize::{normalize_file, NormalizeReport};
use crate::data::overlap::{resolve_tables, Adjustment};
use crate::data::table::{BackgroundTable, PeakTable};
use crate::error::{CalibError, Result};

// ---------------------------------------------------------------------------
// Calibration editing state
// ---------------------------------------------------------------------------

/// An open calibration, independent of any UI.
///
/// Every edit runs on a copy, re-resolves overlaps and re-sorts, and only
/// then replaces the current tables, so a failed edit leaves nothing behind.
/// Edits return the overlap corrections they caused.
#[derive(Debug, Clone)]
pub struct CalibrationState {
    file: CalibrationFile,

    /// Where `save` writes.
    pub path: PathBuf,

    /// Edits not yet written to `path`.
    pub dirty: bool,

    /// Non-blocking notice for the UI (last auto-correction summary).
    pub status_message: Option<String>,
}

impl CalibrationState {
    /// Start an empty calibration that will be saved to `path`.
    pub fn create(path: impl Into<PathBuf>) -> Self {
        Self {
            file: CalibrationFile::default(),
            path: path.into(),
            dirty: true,
            status_message: None,
        }
    }

    /// Open through the normalizer; `settings` decides whether fixes are
    /// written straight back.
    pub fn open(path: &Path, settings: &Settings) -> Result<(Self, NormalizeReport)> {
        let (file, report) = normalize_file(path, settings.persist_on_load())?;
        let state = Self {
            file,
            path: path.to_path_buf(),
            dirty: report.has_changes() && !report.written,
            status_message: summarize(&report.adjustments),
        };
        Ok((state, report))
    }

    pub fn save(&mut self) -> Result<()> {
        self.file.save(&self.path)?;
        self.dirty = false;
        info!("saved calibration to {}", self.path.display());
        Ok(())
    }

    pub fn save_as(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.path = path.into();
        self.save()
    }

    pub fn file(&self) -> &CalibrationFile {
        &self.file
    }

    pub fn peaks(&self) -> &PeakTable {
        &self.file.peaks
    }

    pub fn backgrounds(&self) -> &BackgroundTable {
        &self.file.backgrounds
    }

    // ---- peaks ----

    pub fn add_peak(&mut self, peak: Peak) -> Result<Vec<Adjustment>> {
        self.edit(|f| f.peaks.insert(peak))
    }

    pub fn remove_peak(&mut self, name: &str) -> Result<Peak> {
        let mut removed = None;
        self.edit(|f| {
            removed = Some(f.peaks.remove(name)?);
            Ok(())
        })?;
        removed.ok_or_else(|| unknown(RegionKind::Peak, name))
    }

    pub fn rename_peak(&mut self, old: &str, new: &str) -> Result<()> {
        self.edit(|f| f.peaks.rename(old, new)).map(drop)
    }

    pub fn set_peak_bounds(&mut self, name: &str, lower: f64, upper: f64) -> Result<Vec<Adjustment>> {
        self.edit(|f| f.peaks.set_bounds(name, lower, upper).map(drop))
    }

    pub fn set_peak_isotope(&mut self, name: &str, isotope: Option<Isotope>) -> Result<()> {
        self.edit(|f| f.peaks.set_isotope(name, isotope)).map(drop)
    }

    /// Add new peaks; peaks whose name already exists take the new limits
    /// and isotope.
    pub fn merge_peaks(&mut self, peaks: Vec<Peak>) -> Result<Vec<Adjustment>> {
        self.edit(|f| {
            for peak in peaks {
                f.peaks.upsert(peak);
            }
            Ok(())
        })
    }

    /// Centre every isotope-tagged peak on its mass: `[mass - below, mass +
    /// above]`. Peaks without an isotope or without a known mass are left
    /// alone.
    pub fn auto_fill_peaks<F>(&mut self, mass_of: F, below: f64, above: f64) -> Result<Vec<Adjustment>>
    where
        F: Fn(&Isotope) -> Option<f64>,
    {
        self.edit(|f| {
            let targets: Vec<(String, f64)> = f
                .peaks
                .iter()
                .filter_map(|p| {
                    let mass = mass_of(p.isotope.as_ref()?)?;
                    Some((p.name().to_string(), mass))
                })
                .collect();
            for (name, mass) in targets {
                f.peaks.set_bounds(&name, mass - below, mass + above)?;
            }
            Ok(())
        })
    }

    // ---- backgrounds ----

    pub fn add_background(&mut self, background: Background) -> Result<Vec<Adjustment>> {
        self.edit(|f| f.backgrounds.insert(background))
    }

    pub fn remove_background(&mut self, name: &str) -> Result<Background> {
        let mut removed = None;
        self.edit(|f| {
            removed = Some(f.backgrounds.remove(name)?);
            Ok(())
        })?;
        removed.ok_or_else(|| unknown(RegionKind::Background, name))
    }

    pub fn rename_background(&mut self, old: &str, new: &str) -> Result<()> {
        self.edit(|f| f.backgrounds.rename(old, new)).map(drop)
    }

    pub fn set_background_bounds(
        &mut self,
        name: &str,
        lower: f64,
        upper: f64,
    ) -> Result<Vec<Adjustment>> {
        self.edit(|f| f.backgrounds.set_bounds(name, lower, upper).map(drop))
    }

    // ---- derived ----

    pub fn associations(&self) -> Vec<Association<'_>> {
        associate(self.file.peaks.as_slice(), self.file.backgrounds.as_slice())
    }

    pub fn integrals<S: SpectrumProvider + ?Sized>(&self, spectrum: &S) -> Vec<Integral> {
        integrate(self.file.peaks.as_slice(), self.file.backgrounds.as_slice(), spectrum)
    }

    /// Apply `change` to a copy, restore the invariants, then commit.
    fn edit<F>(&mut self, change: F) -> Result<Vec<Adjustment>>
    where
        F: FnOnce(&mut CalibrationFile) -> Result<()>,
    {
        let mut next = self.file.clone();
        change(&mut next)?;
        let adjustments = resolve_tables(&mut next.peaks, &mut next.backgrounds)?;

        self.file = next;
        self.dirty = true;
        self.status_message = summarize(&adjustments);
        Ok(adjustments)
    }
}

fn unknown(kind: RegionKind, name: &str) -> CalibError {
    CalibError::UnknownRegion {
        kind,
        name: name.to_string(),
    }
}

fn summarize(adjustments: &[Adjustment]) -> Option<String> {
    if adjustments.is_empty() {
        return None;
    }
    let removed = adjustments.iter().filter(|a| a.is_removal()).count();
    Some(format!(
        "Overlaps corrected: {} region(s) adjusted, {removed} removed",
        adjustments.len() - removed
    ))
}

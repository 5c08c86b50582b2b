use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CalibError, Result};

// ---------------------------------------------------------------------------
// RegionKind – which table a region lives in
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Peak,
    Background,
}

impl fmt::Display for RegionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKind::Peak => write!(f, "peak"),
            RegionKind::Background => write!(f, "background"),
        }
    }
}

// ---------------------------------------------------------------------------
// Bounds – a validated half-open interval in mass (or channel) units
// ---------------------------------------------------------------------------

/// Interval limits with `lower < upper` guaranteed.
///
/// The fields are private so every `Bounds` in circulation went through
/// [`Bounds::try_new`]; NaN limits fail the comparison and are rejected too.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    lower: f64,
    upper: f64,
}

impl Bounds {
    /// `None` unless `lower < upper`.
    pub fn try_new(lower: f64, upper: f64) -> Option<Self> {
        if lower < upper {
            Some(Bounds { lower, upper })
        } else {
            None
        }
    }

    /// Like [`Bounds::try_new`] but names the offending region on failure.
    pub fn for_region(kind: RegionKind, name: &str, lower: f64, upper: f64) -> Result<Self> {
        Bounds::try_new(lower, upper).ok_or_else(|| CalibError::InvalidRegion {
            kind,
            name: name.to_string(),
            lower,
            upper,
        })
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn center(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }

    /// Strict intersection: touching edges do not overlap.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.lower < other.upper && other.lower < self.upper
    }

    /// Membership in `[lower, upper)`.
    pub fn contains(&self, x: f64) -> bool {
        self.lower <= x && x < self.upper
    }

    /// Distance between the two intervals, zero when they touch or overlap.
    pub fn gap(&self, other: &Bounds) -> f64 {
        (other.lower - self.upper).max(self.lower - other.upper).max(0.0)
    }
}

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

// ---------------------------------------------------------------------------
// Region – shared shape of peaks, backgrounds and integrals
// ---------------------------------------------------------------------------

/// A named interval. Setters never repair overlaps; the owning
/// [`CalibrationState`](crate::state::CalibrationState) does that after every
/// edit.
pub trait Region {
    const KIND: RegionKind;

    fn name(&self) -> &str;
    fn bounds(&self) -> Bounds;
    fn set_name(&mut self, name: String);
    fn set_bounds(&mut self, bounds: Bounds);

    fn lower(&self) -> f64 {
        self.bounds().lower()
    }

    fn upper(&self) -> f64 {
        self.bounds().upper()
    }
}

// ---------------------------------------------------------------------------
// Isotope – element + mass number, written "Ti-46"
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isotope {
    pub element: String,
    pub mass_number: u32,
}

impl Isotope {
    pub fn new(element: impl Into<String>, mass_number: u32) -> Self {
        Isotope {
            element: element.into(),
            mass_number,
        }
    }
}

impl FromStr for Isotope {
    type Err = CalibError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CalibError::InvalidIsotope {
            value: s.to_string(),
        };
        let (element, mass) = s.trim().split_once('-').ok_or_else(invalid)?;
        if element.is_empty() || !element.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid());
        }
        let mass_number: u32 = mass.parse().map_err(|_| invalid())?;
        if mass_number == 0 {
            return Err(invalid());
        }
        Ok(Isotope::new(element, mass_number))
    }
}

impl TryFrom<String> for Isotope {
    type Error = CalibError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Isotope> for String {
    fn from(iso: Isotope) -> Self {
        iso.to_string()
    }
}

impl fmt::Display for Isotope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.element, self.mass_number)
    }
}

// ---------------------------------------------------------------------------
// Peak / Background
// ---------------------------------------------------------------------------

/// A named integration window, optionally tied to an isotope.
#[derive(Debug, Clone, PartialEq)]
pub struct Peak {
    name: String,
    bounds: Bounds,
    pub isotope: Option<Isotope>,
}

impl Peak {
    pub fn new(name: impl Into<String>, lower: f64, upper: f64) -> Result<Self> {
        let name = name.into();
        let bounds = Bounds::for_region(RegionKind::Peak, &name, lower, upper)?;
        Ok(Peak {
            name,
            bounds,
            isotope: None,
        })
    }

    pub fn with_isotope(mut self, isotope: Isotope) -> Self {
        self.isotope = Some(isotope);
        self
    }
}

impl Region for Peak {
    const KIND: RegionKind = RegionKind::Peak;

    fn name(&self) -> &str {
        &self.name
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }
}

/// A named window used to estimate the baseline under nearby peaks.
#[derive(Debug, Clone, PartialEq)]
pub struct Background {
    name: String,
    bounds: Bounds,
}

impl Background {
    pub fn new(name: impl Into<String>, lower: f64, upper: f64) -> Result<Self> {
        let name = name.into();
        let bounds = Bounds::for_region(RegionKind::Background, &name, lower, upper)?;
        Ok(Background { name, bounds })
    }
}

impl Region for Background {
    const KIND: RegionKind = RegionKind::Background;

    fn name(&self) -> &str {
        &self.name
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn set_name(&mut self, name: String) {
        self.name = name;
    }

    fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_region_constructs() {
        let p = Peak::new("Ti-46", 45.8, 46.2).unwrap();
        assert_eq!(p.lower(), 45.8);
        assert_eq!(p.upper(), 46.2);
        assert!(p.isotope.is_none());
    }

    #[test]
    fn zero_width_region_is_rejected() {
        let err = Background::new("bg", 5.0, 5.0).unwrap_err();
        match err {
            CalibError::InvalidRegion { kind, name, .. } => {
                assert_eq!(kind, RegionKind::Background);
                assert_eq!(name, "bg");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn inverted_and_nan_bounds_are_rejected() {
        assert!(Peak::new("a", 10.0, 9.0).is_err());
        assert!(Peak::new("a", f64::NAN, 9.0).is_err());
        assert!(Peak::new("a", 1.0, f64::NAN).is_err());
    }

    #[test]
    fn touching_bounds_do_not_overlap() {
        let a = Bounds::try_new(10.0, 19.0).unwrap();
        let b = Bounds::try_new(19.0, 30.0).unwrap();
        assert!(!a.overlaps(&b));
        assert_eq!(a.gap(&b), 0.0);
        assert!(a.overlaps(&Bounds::try_new(18.9, 19.5).unwrap()));
        assert_eq!(a.gap(&Bounds::try_new(21.0, 22.0).unwrap()), 2.0);
    }

    #[test]
    fn contains_is_half_open() {
        let b = Bounds::try_new(1.0, 2.0).unwrap();
        assert!(b.contains(1.0));
        assert!(b.contains(1.5));
        assert!(!b.contains(2.0));
    }

    #[test]
    fn isotope_parses_and_displays() {
        let iso: Isotope = "Ba-136".parse().unwrap();
        assert_eq!(iso, Isotope::new("Ba", 136));
        assert_eq!(iso.to_string(), "Ba-136");
        assert_eq!(serde_json::to_string(&iso).unwrap(), "\"Ba-136\"");
    }

    #[test]
    fn malformed_isotopes_are_rejected() {
        for bad in ["Ba", "Ba-", "-136", "Ba-x", "Ba-0", "B4-10", "Ba-1-2"] {
            assert!(bad.parse::<Isotope>().is_err(), "{bad} parsed");
        }
    }
}

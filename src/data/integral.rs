use std::collections::{BTreeMap, HashMap};

use super::association::associate;
use super::model::{Background, Bounds, Isotope, Peak, Region, RegionKind};
use super::sort::region_order;

// ---------------------------------------------------------------------------
// External collaborators
// ---------------------------------------------------------------------------

/// Anything that can answer "how many ions fell into these limits".
pub trait SpectrumProvider {
    /// Raw counts in `[lower, upper)`.
    fn counts_in(&self, bounds: Bounds) -> f64;
    /// Number of shots the spectrum was accumulated over.
    fn shots(&self) -> u64;
}

/// Natural (standard) isotopic abundances.
pub trait AbundanceTable {
    fn abundance(&self, isotope: &Isotope) -> Option<f64>;
}

impl AbundanceTable for HashMap<Isotope, f64> {
    fn abundance(&self, isotope: &Isotope) -> Option<f64> {
        self.get(isotope).copied()
    }
}

impl AbundanceTable for BTreeMap<Isotope, f64> {
    fn abundance(&self, isotope: &Isotope) -> Option<f64> {
        self.get(isotope).copied()
    }
}

// ---------------------------------------------------------------------------
// Integral
// ---------------------------------------------------------------------------

/// Background-corrected counts for one peak. Derived, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct Integral {
    pub peak_name: String,
    pub bounds: Bounds,
    pub isotope: Option<Isotope>,
    /// Gross counts in the peak window.
    pub counts: f64,
    pub counts_error: f64,
    /// Counts after background subtraction.
    pub net: f64,
    pub net_error: f64,
}

impl Integral {
    /// Net counts and error per shot, `None` for a spectrum without shots.
    pub fn per_shot(&self, shots: u64) -> Option<(f64, f64)> {
        (shots > 0).then(|| {
            let n = shots as f64;
            (self.net / n, self.net_error / n)
        })
    }
}

impl Region for Integral {
    const KIND: RegionKind = RegionKind::Peak;

    fn name(&self) -> &str {
        &self.peak_name
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn set_name(&mut self, name: String) {
        self.peak_name = name;
    }

    fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }
}

/// Integrate every peak over `spectrum`, subtracting its associated
/// backgrounds.
///
/// Background counts `b` collected over a total width `w` are scaled to the
/// peak width by `s = width / w`; the net error is `sqrt(c + b*s^2)` (Poisson
/// on both terms). Peaks are independent, so callers may split the slice and
/// integrate in parallel. The result is sorted like a peak table.
pub fn integrate<S>(peaks: &[Peak], backgrounds: &[Background], spectrum: &S) -> Vec<Integral>
where
    S: SpectrumProvider + ?Sized,
{
    let mut by_peak: HashMap<&str, Vec<&Background>> = HashMap::new();
    for a in associate(peaks, backgrounds) {
        by_peak.entry(a.peak.name()).or_default().push(a.background);
    }

    let mut integrals: Vec<Integral> = peaks
        .iter()
        .map(|peak| {
            let bounds = peak.bounds();
            let counts = spectrum.counts_in(bounds);

            let bgs = by_peak.get(peak.name()).map(Vec::as_slice).unwrap_or_default();
            let bg_width: f64 = bgs.iter().map(|b| b.bounds().width()).sum();
            let (net, net_error) = if bg_width > 0.0 {
                let bg_counts: f64 = bgs.iter().map(|b| spectrum.counts_in(b.bounds())).sum();
                let scale = bounds.width() / bg_width;
                (
                    counts - bg_counts * scale,
                    (counts + bg_counts * scale * scale).sqrt(),
                )
            } else {
                (counts, counts.sqrt())
            };

            Integral {
                peak_name: peak.name().to_string(),
                bounds,
                isotope: peak.isotope.clone(),
                counts,
                counts_error: counts.sqrt(),
                net,
                net_error,
            }
        })
        .collect();
    integrals.sort_by(region_order);
    integrals
}

// ---------------------------------------------------------------------------
// Delta values
// ---------------------------------------------------------------------------

/// Per-mil deviation of a measured isotope ratio from the standard ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delta {
    pub value: f64,
    pub error: f64,
}

/// δ-values for each integral, aligned with `integrals`.
///
/// Each isotope is ratioed to the normalization isotope of its element
/// (`norm_isos`, keyed by element symbol). Integrals without an isotope,
/// without a normalization isotope, without abundances or with non-positive
/// net counts get `None`.
pub fn delta_values<A>(
    integrals: &[Integral],
    norm_isos: &BTreeMap<String, Isotope>,
    abundances: &A,
) -> Vec<Option<Delta>>
where
    A: AbundanceTable + ?Sized,
{
    let by_isotope: HashMap<&Isotope, &Integral> = integrals
        .iter()
        .filter_map(|i| i.isotope.as_ref().map(|iso| (iso, i)))
        .collect();

    integrals
        .iter()
        .map(|integral| {
            let iso = integral.isotope.as_ref()?;
            let norm_iso = norm_isos.get(&iso.element)?;
            if norm_iso == iso {
                return Some(Delta {
                    value: 0.0,
                    error: 0.0,
                });
            }
            let norm = by_isotope.get(norm_iso)?;
            if integral.net <= 0.0 || norm.net <= 0.0 {
                return None;
            }
            let std_ratio = abundances.abundance(iso)? / abundances.abundance(norm_iso)?;
            let ratio = (integral.net / norm.net) / std_ratio;
            let rel_err = ((integral.net_error / integral.net).powi(2)
                + (norm.net_error / norm.net).powi(2))
            .sqrt();
            Some(Delta {
                value: (ratio - 1.0) * 1000.0,
                error: 1000.0 * ratio * rel_err,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spectrum::Spectrum;

    /// One count per unit mass from 0 to 99, ten shots.
    fn flat() -> Spectrum {
        Spectrum::from_bins((0..100).map(|m| (m as f64, 1.0)).collect(), 10)
    }

    #[test]
    fn gross_counts_without_background() {
        let peaks = vec![Peak::new("P", 10.0, 20.0).unwrap()];
        let out = integrate(&peaks, &[], &flat());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].counts, 10.0);
        assert_eq!(out[0].net, 10.0);
        assert_eq!(out[0].counts_error, 10f64.sqrt());
        assert_eq!(out[0].per_shot(10), Some((1.0, 10f64.sqrt() / 10.0)));
        assert_eq!(out[0].per_shot(0), None);
    }

    #[test]
    fn flat_background_is_subtracted_to_zero() {
        let peaks = vec![Peak::new("P", 10.0, 20.0).unwrap()];
        let bgs = vec![
            Background::new("lo", 0.0, 5.0).unwrap(),
            Background::new("hi", 25.0, 30.0).unwrap(),
        ];
        let out = integrate(&peaks, &bgs, &flat());
        assert_eq!(out[0].net, 0.0);
        // c = 10, b = 10, s = 1
        assert_eq!(out[0].net_error, 20f64.sqrt());
    }

    #[test]
    fn integrals_are_sorted_like_peaks() {
        let peaks = vec![
            Peak::new("B", 50.0, 60.0).unwrap(),
            Peak::new("A", 10.0, 20.0).unwrap(),
        ];
        let out = integrate(&peaks, &[], &flat());
        let names: Vec<&str> = out.iter().map(|i| i.name()).collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn each_peak_subtracts_only_its_own_backgrounds() {
        let sp = Spectrum::from_bins(vec![(2.0, 10.0), (15.0, 30.0), (65.0, 4.0), (85.0, 2.0)], 1);
        let peaks = vec![
            Peak::new("P1", 10.0, 20.0).unwrap(),
            Peak::new("P2", 60.0, 70.0).unwrap(),
        ];
        let bgs = vec![
            Background::new("lo", 0.0, 5.0).unwrap(),
            Background::new("hi", 80.0, 90.0).unwrap(),
        ];
        let out = integrate(&peaks, &bgs, &sp);
        // P1: 30 - 10 * (10 / 5); P2: 4 - 2 * (10 / 10)
        assert_eq!(out[0].net, 10.0);
        assert_eq!(out[1].net, 2.0);
        assert_eq!(out[1].net_error, 6f64.sqrt());
    }

    fn integral(iso: &str, net: f64) -> Integral {
        Integral {
            peak_name: iso.to_string(),
            bounds: Bounds::try_new(0.0, 1.0).unwrap(),
            isotope: Some(iso.parse().unwrap()),
            counts: net,
            counts_error: net.sqrt(),
            net,
            net_error: net.sqrt(),
        }
    }

    #[test]
    fn delta_against_normalization_isotope() {
        let integrals = vec![
            integral("Ti-46", 220.0),
            integral("Ti-48", 1000.0),
            integral("Fe-56", 5.0),
        ];
        let norm: BTreeMap<String, Isotope> =
            [("Ti".to_string(), "Ti-48".parse().unwrap())].into_iter().collect();
        let abundances: HashMap<Isotope, f64> = [
            ("Ti-46".parse().unwrap(), 0.1),
            ("Ti-48".parse().unwrap(), 0.5),
        ]
        .into_iter()
        .collect();

        let deltas = delta_values(&integrals, &norm, &abundances);
        let ti46 = deltas[0].unwrap();
        // measured 0.22, standard 0.2
        assert!((ti46.value - 100.0).abs() < 1e-9);
        assert!(ti46.error > 0.0);
        assert_eq!(deltas[1], Some(Delta { value: 0.0, error: 0.0 }));
        assert_eq!(deltas[2], None);
    }
}

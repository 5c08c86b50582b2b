use super::integral::SpectrumProvider;
use super::model::Bounds;

// ---------------------------------------------------------------------------
// Spectrum – a binned mass spectrum held in memory
// ---------------------------------------------------------------------------

/// Histogram of ion counts over mass bins, plus the number of laser shots it
/// was accumulated over.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Bin positions, ascending.
    mass: Vec<f64>,
    /// Counts per bin – same length as `mass`.
    counts: Vec<f64>,
    shots: u64,
}

impl Spectrum {
    /// Build from `(mass, counts)` bins in any order.
    pub fn from_bins(mut bins: Vec<(f64, f64)>, shots: u64) -> Self {
        bins.sort_by(|a, b| a.0.total_cmp(&b.0));
        let (mass, counts) = bins.into_iter().unzip();
        Spectrum {
            mass,
            counts,
            shots,
        }
    }

    pub fn with_shots(mut self, shots: u64) -> Self {
        self.shots = shots;
        self
    }

    pub fn mass(&self) -> &[f64] {
        &self.mass
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.mass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass.is_empty()
    }
}

impl SpectrumProvider for Spectrum {
    fn counts_in(&self, bounds: Bounds) -> f64 {
        let start = self.mass.partition_point(|&m| m < bounds.lower());
        let end = self.mass.partition_point(|&m| m < bounds.upper());
        self.counts[start..end].iter().sum()
    }

    fn shots(&self) -> u64 {
        self.shots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_summed_over_half_open_window() {
        let sp = Spectrum::from_bins(vec![(3.0, 30.0), (1.0, 10.0), (2.0, 20.0), (4.0, 40.0)], 100);
        assert_eq!(sp.mass(), [1.0, 2.0, 3.0, 4.0]);
        let w = Bounds::try_new(2.0, 4.0).unwrap();
        assert_eq!(sp.counts_in(w), 50.0);
        let all = Bounds::try_new(0.0, 10.0).unwrap();
        assert_eq!(sp.counts_in(all), 100.0);
        let none = Bounds::try_new(5.0, 6.0).unwrap();
        assert_eq!(sp.counts_in(none), 0.0);
        assert_eq!(sp.shots(), 100);
    }
}

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};

use super::model::{Bounds, Region, RegionKind};
use super::sort::sort_regions;
use super::table::{BackgroundTable, PeakTable};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Adjustment – one auto-correction, reported back to the caller
// ---------------------------------------------------------------------------

/// A region whose limits were changed (or that was removed) while resolving
/// overlaps. One record per region: `before` is what came in, `after` is what
/// went out.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    pub kind: RegionKind,
    pub name: String,
    pub before: Bounds,
    /// `None` when the region was removed.
    pub after: Option<Bounds>,
}

impl Adjustment {
    pub fn is_removal(&self) -> bool {
        self.after.is_none()
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.after {
            Some(after) => write!(f, "{} '{}': {} -> {}", self.kind, self.name, self.before, after),
            None => write!(f, "{} '{}': {} removed", self.kind, self.name, self.before),
        }
    }
}

// ---------------------------------------------------------------------------
// Peak–peak
// ---------------------------------------------------------------------------

/// Make same-kind regions pairwise disjoint and leave them sorted.
///
/// Each sweep walks adjacent pairs in sorted order and moves the shared edge
/// of an overlapping pair to the midpoint of the overlapping span
/// `[b.lower, min(a.upper, b.upper)]`. A pair that an earlier adjustment in the
/// same sweep pushed out of order is left for the next sweep, which starts
/// from a re-sorted list.
///
/// Regions only ever shrink, so a separated pair stays separated and every
/// sweep but the last separates at least one pair. `n*(n-1)/2 + 1` sweeps
/// therefore always suffice.
///
/// When the midpoint rounds onto a limit and would empty a region, the edge
/// snaps to whichever end of the overlapping span keeps both regions
/// non-empty. Fails with `InvalidRegion` only when no edge exists: two
/// regions sharing a lower limit, one of them a single ulp wide.
pub fn resolve_overlaps<R: Region>(items: &mut [R]) -> Result<Vec<Adjustment>> {
    let before: Vec<(String, Bounds)> = items
        .iter()
        .map(|r| (r.name().to_string(), r.bounds()))
        .collect();

    let n = items.len();
    let max_sweeps = n.saturating_mul(n.saturating_sub(1)) / 2 + 1;
    let mut settled = false;

    for sweep in 1..=max_sweeps {
        sort_regions(items);
        let mut moved = 0usize;

        for i in 1..n {
            let a = items[i - 1].bounds();
            let b = items[i].bounds();
            if !a.overlaps(&b) || b.lower() < a.lower() {
                continue;
            }
            let edge = split_edge(a, b);
            let new_a = Bounds::for_region(R::KIND, items[i - 1].name(), a.lower(), edge)?;
            let new_b = Bounds::for_region(R::KIND, items[i].name(), edge, b.upper())?;
            items[i - 1].set_bounds(new_a);
            items[i].set_bounds(new_b);
            moved += 1;
        }

        debug!("{} overlap sweep {sweep}: {moved} pair(s) split", R::KIND);
        if moved == 0 {
            settled = true;
            break;
        }
    }

    if !settled {
        sort_regions(items);
        warn!("{} overlaps did not settle within {max_sweeps} sweeps", R::KIND);
    }

    Ok(diff(R::KIND, &before, items))
}

/// Shared edge for an in-order overlapping pair: the midpoint of the
/// overlapping span, or a span end when rounding leaves the midpoint no room.
fn split_edge(a: Bounds, b: Bounds) -> f64 {
    let end = a.upper().min(b.upper());
    let mid = 0.5 * (b.lower() + end);
    [mid, b.lower(), end]
        .into_iter()
        .find(|&e| a.lower() < e && e < b.upper())
        .unwrap_or(mid)
}

fn diff<R: Region>(kind: RegionKind, before: &[(String, Bounds)], after: &[R]) -> Vec<Adjustment> {
    let now: HashMap<&str, Bounds> = after.iter().map(|r| (r.name(), r.bounds())).collect();
    before
        .iter()
        .filter_map(|(name, old)| {
            let new = now.get(name.as_str()).copied();
            (new != Some(*old)).then(|| Adjustment {
                kind,
                name: name.clone(),
                before: *old,
                after: new,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Peak–background
// ---------------------------------------------------------------------------

/// Trim backgrounds out of every peak window they intrude on.
///
/// Peaks win: the background edge on the side of the peak closer to the
/// background's centre is moved onto the peak edge. A background trimmed to
/// nothing is removed. The relative order of the survivors is preserved.
pub fn resolve_backgrounds<P: Region, B: Region>(
    peaks: &[P],
    backgrounds: &mut Vec<B>,
) -> Vec<Adjustment> {
    let mut adjustments = Vec::new();

    backgrounds.retain_mut(|bg| {
        let before = bg.bounds();
        let mut current = Some(before);

        for peak in peaks {
            let Some(b) = current else { break };
            let p = peak.bounds();
            if !b.overlaps(&p) {
                continue;
            }
            current = if b.center() >= p.center() {
                Bounds::try_new(p.upper(), b.upper())
            } else {
                Bounds::try_new(b.lower(), p.lower())
            };
        }

        match current {
            Some(after) if after == before => true,
            Some(after) => {
                bg.set_bounds(after);
                adjustments.push(Adjustment {
                    kind: B::KIND,
                    name: bg.name().to_string(),
                    before,
                    after: Some(after),
                });
                true
            }
            None => {
                warn!(
                    "{} '{}' {before} lies inside a peak window and was removed",
                    B::KIND,
                    bg.name()
                );
                adjustments.push(Adjustment {
                    kind: B::KIND,
                    name: bg.name().to_string(),
                    before,
                    after: None,
                });
                false
            }
        }
    });

    adjustments
}

/// Peak–peak, then background–peak, then re-sort both tables.
pub fn resolve_tables(
    peaks: &mut PeakTable,
    backgrounds: &mut BackgroundTable,
) -> Result<Vec<Adjustment>> {
    let mut adjustments = resolve_overlaps(peaks.items_mut())?;
    adjustments.extend(resolve_backgrounds(
        peaks.as_slice(),
        backgrounds.items_mut(),
    ));
    peaks.sort();
    backgrounds.sort();
    Ok(adjustments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Background, Peak};

    fn peak(name: &str, lower: f64, upper: f64) -> Peak {
        Peak::new(name, lower, upper).unwrap()
    }

    fn bg(name: &str, lower: f64, upper: f64) -> Background {
        Background::new(name, lower, upper).unwrap()
    }

    fn limits<R: Region>(r: &R) -> (f64, f64) {
        (r.lower(), r.upper())
    }

    #[test]
    fn pair_meets_at_midpoint_of_overlap() {
        let mut peaks = vec![peak("A", 10.0, 20.0), peak("B", 18.0, 30.0)];
        let adj = resolve_overlaps(&mut peaks).unwrap();
        assert_eq!(limits(&peaks[0]), (10.0, 19.0));
        assert_eq!(limits(&peaks[1]), (19.0, 30.0));
        assert_eq!(adj.len(), 2);
        assert_eq!(adj[0].name, "A");
        assert_eq!(adj[0].after, Bounds::try_new(10.0, 19.0));
    }

    #[test]
    fn disjoint_and_touching_peaks_are_untouched() {
        let mut peaks = vec![peak("B", 20.0, 30.0), peak("A", 10.0, 20.0), peak("C", 40.0, 41.0)];
        let adj = resolve_overlaps(&mut peaks).unwrap();
        assert!(adj.is_empty());
        assert_eq!(peaks[0].name(), "A");
    }

    #[test]
    fn contained_peak_keeps_its_interior() {
        let mut peaks = vec![peak("wide", 10.0, 40.0), peak("narrow", 15.0, 20.0)];
        resolve_overlaps(&mut peaks).unwrap();
        assert_eq!(limits(&peaks[0]), (10.0, 17.5));
        assert_eq!(limits(&peaks[1]), (17.5, 20.0));
    }

    #[test]
    fn cascade_of_three_is_resolved() {
        let mut peaks = vec![peak("A", 0.0, 100.0), peak("B", 10.0, 50.0), peak("C", 12.0, 14.0)];
        resolve_overlaps(&mut peaks).unwrap();
        for w in peaks.windows(2) {
            assert!(w[0].upper() <= w[1].lower(), "{:?}", peaks);
        }
        for p in &peaks {
            assert!(p.lower() < p.upper());
        }
    }

    #[test]
    fn identical_peaks_split_in_half() {
        let mut peaks = vec![peak("B", 10.0, 20.0), peak("A", 10.0, 20.0)];
        resolve_overlaps(&mut peaks).unwrap();
        assert_eq!(peaks[0].name(), "A");
        assert_eq!(limits(&peaks[0]), (10.0, 15.0));
        assert_eq!(limits(&peaks[1]), (15.0, 20.0));
    }

    fn next_up(x: f64) -> f64 {
        f64::from_bits(x.to_bits() + 1)
    }

    #[test]
    fn one_ulp_overlap_snaps_to_a_span_end() {
        // midpoint of [5, 5+ulp] rounds to 5, which would empty A
        let mut peaks = vec![peak("A", 5.0, next_up(5.0)), peak("B", 5.0, 10.0)];
        let adj = resolve_overlaps(&mut peaks).unwrap();
        assert_eq!(limits(&peaks[0]), (5.0, next_up(5.0)));
        assert_eq!(limits(&peaks[1]), (next_up(5.0), 10.0));
        assert_eq!(adj.len(), 1);
        assert_eq!(adj[0].name, "B");
    }

    #[test]
    fn one_ulp_region_inside_another_is_kept() {
        let mut peaks = vec![peak("wide", 0.0, 10.0), peak("thin", 5.0, next_up(5.0))];
        resolve_overlaps(&mut peaks).unwrap();
        assert_eq!(limits(&peaks[0]), (0.0, 5.0));
        assert_eq!(limits(&peaks[1]), (5.0, next_up(5.0)));
    }

    #[test]
    fn unsplittable_pair_is_an_invalid_region() {
        let mut peaks = vec![peak("A", 5.0, next_up(5.0)), peak("B", 5.0, next_up(5.0))];
        assert!(matches!(
            resolve_overlaps(&mut peaks),
            Err(crate::error::CalibError::InvalidRegion { .. })
        ));
    }

    #[test]
    fn background_is_trimmed_at_nearest_peak_edge() {
        let peaks = vec![peak("P", 15.0, 22.0)];
        let mut bgs = vec![bg("Bg", 19.0, 25.0), bg("left", 10.0, 16.0)];
        let adj = resolve_backgrounds(&peaks, &mut bgs);
        assert_eq!(limits(&bgs[0]), (22.0, 25.0));
        assert_eq!(limits(&bgs[1]), (10.0, 15.0));
        assert_eq!(adj.len(), 2);
    }

    #[test]
    fn background_inside_peak_is_removed_and_reported() {
        let peaks = vec![peak("P", 15.0, 22.0)];
        let mut bgs = vec![bg("inside", 16.0, 18.0), bg("clear", 30.0, 31.0)];
        let adj = resolve_backgrounds(&peaks, &mut bgs);
        assert_eq!(bgs.len(), 1);
        assert_eq!(bgs[0].name(), "clear");
        assert_eq!(adj.len(), 1);
        assert!(adj[0].is_removal());
        assert_eq!(adj[0].to_string(), "background 'inside': [16, 18] removed");
    }

    #[test]
    fn background_spanning_two_peaks_is_trimmed_against_both() {
        let peaks = vec![peak("P1", 10.0, 12.0), peak("P2", 18.0, 20.0)];
        let mut bgs = vec![bg("gap", 11.0, 19.0)];
        resolve_backgrounds(&peaks, &mut bgs);
        assert_eq!(limits(&bgs[0]), (12.0, 18.0));
    }

    #[test]
    fn tables_come_back_sorted() {
        let mut peaks = PeakTable::from_regions(vec![peak("A", 10.0, 20.0), peak("B", 18.0, 30.0)]).unwrap();
        let mut bgs =
            BackgroundTable::from_regions(vec![bg("late", 29.0, 35.0), bg("early", 1.0, 2.0)]).unwrap();
        let adj = resolve_tables(&mut peaks, &mut bgs).unwrap();
        assert_eq!(adj.len(), 3);
        assert_eq!(bgs.names(), ["early", "late"]);
        assert_eq!(bgs.get("late").map(limits), Some((30.0, 35.0)));
    }
}

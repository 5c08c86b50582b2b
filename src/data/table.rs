use super::model::{Background, Bounds, Isotope, Peak, Region};
use super::sort::sort_regions;
use crate::error::{CalibError, Result};

pub type PeakTable = RegionTable<Peak>;
pub type BackgroundTable = RegionTable<Background>;

// ---------------------------------------------------------------------------
// RegionTable – name-unique, always sorted collection
// ---------------------------------------------------------------------------

/// Ordered collection of regions of one kind, keyed by name.
///
/// Every structural change re-sorts the table. Boundary edits do not resolve
/// overlaps; that needs both tables and lives in
/// [`CalibrationState`](crate::state::CalibrationState).
#[derive(Debug, Clone, PartialEq)]
pub struct RegionTable<R> {
    items: Vec<R>,
}

impl<R> Default for RegionTable<R> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<R: Region> RegionTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from loose regions, rejecting duplicate names.
    pub fn from_regions(items: Vec<R>) -> Result<Self> {
        let mut table = Self::new();
        for item in items {
            table.ensure_free(item.name())?;
            table.items.push(item);
        }
        table.sort();
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[R] {
        &self.items
    }

    pub fn get(&self, name: &str) -> Option<&R> {
        self.items.iter().find(|r| r.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|r| r.name()).collect()
    }

    pub fn insert(&mut self, item: R) -> Result<()> {
        self.ensure_free(item.name())?;
        self.items.push(item);
        self.sort();
        Ok(())
    }

    /// Insert, or replace the region that already carries this name.
    /// Returns the replaced region.
    pub fn upsert(&mut self, item: R) -> Option<R> {
        let old = match self.position(item.name()) {
            Some(i) => Some(std::mem::replace(&mut self.items[i], item)),
            None => {
                self.items.push(item);
                None
            }
        };
        self.sort();
        old
    }

    pub fn remove(&mut self, name: &str) -> Result<R> {
        let i = self.position_or_err(name)?;
        Ok(self.items.remove(i))
    }

    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let i = self.position_or_err(old)?;
        if old == new {
            return Ok(());
        }
        self.ensure_free(new)?;
        self.items[i].set_name(new.to_string());
        self.sort();
        Ok(())
    }

    /// Replace the limits of a region. Returns the previous bounds.
    pub fn set_bounds(&mut self, name: &str, lower: f64, upper: f64) -> Result<Bounds> {
        let i = self.position_or_err(name)?;
        let bounds = Bounds::for_region(R::KIND, name, lower, upper)?;
        let old = self.items[i].bounds();
        self.items[i].set_bounds(bounds);
        self.sort();
        Ok(old)
    }

    /// Returns `true` if the order changed.
    pub fn sort(&mut self) -> bool {
        sort_regions(&mut self.items)
    }

    pub fn into_vec(self) -> Vec<R> {
        self.items
    }

    pub(crate) fn items_mut(&mut self) -> &mut Vec<R> {
        &mut self.items
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|r| r.name() == name)
    }

    fn position_or_err(&self, name: &str) -> Result<usize> {
        self.position(name).ok_or_else(|| CalibError::UnknownRegion {
            kind: R::KIND,
            name: name.to_string(),
        })
    }

    fn ensure_free(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            return Err(CalibError::DuplicateName {
                kind: R::KIND,
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl RegionTable<Peak> {
    pub fn set_isotope(&mut self, name: &str, isotope: Option<Isotope>) -> Result<()> {
        let i = self.position_or_err(name)?;
        self.items[i].isotope = isotope;
        Ok(())
    }
}

impl<'a, R> IntoIterator for &'a RegionTable<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::RegionKind;

    fn table() -> PeakTable {
        PeakTable::from_regions(vec![
            Peak::new("C", 30.0, 31.0).unwrap(),
            Peak::new("A", 10.0, 11.0).unwrap(),
            Peak::new("B", 20.0, 21.0).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn from_regions_sorts() {
        assert_eq!(table().names(), ["A", "B", "C"]);
    }

    #[test]
    fn from_regions_rejects_duplicates() {
        let err = PeakTable::from_regions(vec![
            Peak::new("A", 1.0, 2.0).unwrap(),
            Peak::new("A", 3.0, 4.0).unwrap(),
        ])
        .unwrap_err();
        assert!(matches!(err, CalibError::DuplicateName { kind: RegionKind::Peak, ref name } if name == "A"));
    }

    #[test]
    fn insert_keeps_order_and_rejects_duplicates() {
        let mut t = table();
        t.insert(Peak::new("D", 15.0, 16.0).unwrap()).unwrap();
        assert_eq!(t.names(), ["A", "D", "B", "C"]);
        assert!(matches!(
            t.insert(Peak::new("D", 50.0, 51.0).unwrap()),
            Err(CalibError::DuplicateName { .. })
        ));
    }

    #[test]
    fn rename_checks_collisions() {
        let mut t = table();
        assert!(matches!(t.rename("A", "B"), Err(CalibError::DuplicateName { .. })));
        t.rename("A", "A").unwrap();
        t.rename("A", "Z").unwrap();
        assert_eq!(t.names(), ["Z", "B", "C"]);
        assert!(matches!(t.rename("nope", "Y"), Err(CalibError::UnknownRegion { .. })));
    }

    #[test]
    fn set_bounds_validates_and_resorts() {
        let mut t = table();
        assert!(matches!(
            t.set_bounds("A", 5.0, 5.0),
            Err(CalibError::InvalidRegion { .. })
        ));
        let old = t.set_bounds("A", 40.0, 41.0).unwrap();
        assert_eq!(old, Bounds::try_new(10.0, 11.0).unwrap());
        assert_eq!(t.names(), ["B", "C", "A"]);
    }

    #[test]
    fn upsert_overwrites_by_name() {
        let mut t = table();
        let old = t.upsert(Peak::new("B", 5.0, 6.0).unwrap());
        assert_eq!(old.map(|p| p.lower()), Some(20.0));
        assert_eq!(t.names(), ["B", "A", "C"]);
        assert!(t.upsert(Peak::new("E", 1.0, 2.0).unwrap()).is_none());
        assert_eq!(t.len(), 4);
    }

    #[test]
    fn remove_returns_region() {
        let mut t = table();
        assert_eq!(t.remove("B").unwrap().name(), "B");
        assert!(t.remove("B").is_err());
        assert_eq!(t.len(), 2);
    }
}

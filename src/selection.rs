use std::collections::BTreeSet;

use crate::competitor::Competitor;
use crate::error::{Result, ResultsError};

/// Which competitors of a course-class set are selected, by index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompetitorSelection {
    count: usize,
    selected: BTreeSet<usize>,
}

impl CompetitorSelection {
    /// An empty selection over `count` competitors
    pub fn new(count: usize) -> Self {
        CompetitorSelection {
            count,
            selected: BTreeSet::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_selected(&self, index: usize) -> bool {
        self.selected.contains(&index)
    }

    /// Selected indexes in ascending order
    pub fn selected_indexes(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    pub fn is_single_runner_selected(&self) -> bool {
        self.selected.len() == 1
    }

    pub fn single_selected_index(&self) -> Option<usize> {
        if self.is_single_runner_selected() {
            self.selected.iter().next().copied()
        } else {
            None
        }
    }

    pub fn select_all(&mut self) {
        self.selected = (0..self.count).collect();
    }

    pub fn select_none(&mut self) {
        self.selected.clear();
    }

    fn check_indexes(&self, indexes: &[usize]) -> Result<()> {
        match indexes.iter().find(|&&index| index >= self.count) {
            Some(index) => Err(ResultsError::invalid(format!(
                "Index {} is out of range for {} competitor(s)",
                index, self.count
            ))),
            None => Ok(()),
        }
    }

    /// Replaces the selection
    pub fn set(&mut self, indexes: &[usize]) -> Result<()> {
        self.check_indexes(indexes)?;
        self.selected = indexes.iter().copied().collect();
        Ok(())
    }

    pub fn toggle(&mut self, index: usize) -> Result<()> {
        self.check_indexes(&[index])?;
        if !self.selected.remove(&index) {
            self.selected.insert(index);
        }
        Ok(())
    }

    /// Adds the indexes; returns whether anything changed
    pub fn bulk_select(&mut self, indexes: &[usize]) -> Result<bool> {
        self.check_indexes(indexes)?;
        let before = self.selected.len();
        self.selected.extend(indexes.iter().copied());
        Ok(self.selected.len() != before)
    }

    /// Removes the indexes; returns whether anything changed
    pub fn bulk_deselect(&mut self, indexes: &[usize]) -> Result<bool> {
        self.check_indexes(indexes)?;
        let before = self.selected.len();
        for index in indexes {
            self.selected.remove(index);
        }
        Ok(self.selected.len() != before)
    }

    /// With one runner selected, also selects every visible runner whose
    /// position on the course swaps with theirs
    pub fn select_crossing_runners(&mut self, competitors: &[&Competitor], is_visible: impl Fn(usize) -> bool) {
        let Some(reference) = self.single_selected_index().and_then(|index| competitors.get(index)) else {
            return;
        };
        let crossing: Vec<usize> = competitors
            .iter()
            .enumerate()
            .filter(|(index, competitor)| is_visible(*index) && competitor.crosses(reference))
            .map(|(index, _)| index)
            .collect();
        self.selected.extend(crossing);
    }

    /// Moves the selection to a new list of competitors. Competitors selected
    /// in the old list stay selected if they are also in the new one, matched
    /// by identity rather than by name.
    pub fn migrate(&mut self, old: &[&Competitor], new: &[&Competitor]) -> Result<()> {
        if old.len() != self.count {
            return Err(ResultsError::invalid(format!(
                "Cannot migrate selection: old list has {} competitor(s), expected {}",
                old.len(),
                self.count
            )));
        }
        if new.is_empty() && !self.selected.is_empty() {
            return Err(ResultsError::invalid(
                "Cannot migrate a non-empty selection to an empty list of competitors",
            ));
        }

        let kept: Vec<&Competitor> = self.selected.iter().map(|&index| old[index]).collect();
        self.count = new.len();
        self.selected = new
            .iter()
            .enumerate()
            .filter(|(_, competitor)| kept.iter().any(|k| std::ptr::eq(*k, **competitor)))
            .map(|(index, _)| index)
            .collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::competitor::CompetitorName;
    use crate::time::Time;

    fn competitor(order: usize, start: i64, cum: &[i64]) -> Competitor {
        Competitor::from_original_cum_times(
            order,
            CompetitorName::new("Runner", order.to_string()),
            "",
            Some(Time::from_secs(start)),
            cum.iter().map(|&t| Some(Time::from_secs(t))).collect(),
        )
    }

    #[test]
    fn test_toggle_and_single_runner() {
        let mut selection = CompetitorSelection::new(4);
        selection.toggle(2).unwrap();
        assert!(selection.is_single_runner_selected());
        assert_eq!(selection.single_selected_index(), Some(2));
        selection.toggle(0).unwrap();
        assert_eq!(selection.selected_indexes(), vec![0, 2]);
        assert_eq!(selection.single_selected_index(), None);
        selection.toggle(2).unwrap();
        assert_eq!(selection.selected_indexes(), vec![0]);
        assert!(selection.toggle(4).is_err());
    }

    #[test]
    fn test_bulk_operations() {
        let mut selection = CompetitorSelection::new(5);
        assert!(selection.bulk_select(&[3, 1]).unwrap());
        assert!(!selection.bulk_select(&[1]).unwrap());
        assert!(selection.bulk_deselect(&[1, 4]).unwrap());
        assert!(!selection.bulk_deselect(&[4]).unwrap());
        assert_eq!(selection.selected_indexes(), vec![3]);
        assert!(selection.bulk_select(&[0, 5]).is_err());
        assert_eq!(selection.selected_indexes(), vec![3]);

        selection.select_all();
        assert_eq!(selection.selected_indexes(), vec![0, 1, 2, 3, 4]);
        selection.select_none();
        assert!(selection.selected_indexes().is_empty());
        assert!(selection.set(&[7]).is_err());
    }

    #[test]
    fn test_select_crossing_runners() {
        let first = competitor(1, 0, &[0, 100, 400]);
        let second = competitor(2, 60, &[0, 100, 200]);
        let third = competitor(3, 600, &[0, 100, 200]);
        let fourth = competitor(4, 30, &[0, 100, 200]);
        let all = [&first, &second, &third, &fourth];

        let mut selection = CompetitorSelection::new(4);
        selection.toggle(0).unwrap();
        selection.select_crossing_runners(&all, |index| index != 3);
        assert_eq!(selection.selected_indexes(), vec![0, 1]);
    }

    #[test]
    fn test_migrate_keeps_selected_by_identity() {
        let a = competitor(1, 0, &[0, 100]);
        let b = competitor(2, 0, &[0, 100]);
        let c = competitor(3, 0, &[0, 100]);
        let b_twin = b.clone();

        let mut selection = CompetitorSelection::new(3);
        selection.set(&[0, 1]).unwrap();
        selection.migrate(&[&a, &b, &c], &[&c, &b_twin, &a]).unwrap();
        assert_eq!(selection.count(), 3);
        assert_eq!(selection.selected_indexes(), vec![2]);

        assert!(selection.migrate(&[&a], &[&b]).is_err());
        assert!(selection.migrate(&[&a, &b, &c], &[]).is_err());
    }
}

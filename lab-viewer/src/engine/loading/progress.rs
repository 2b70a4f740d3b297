use std::collections::HashSet;

use crate::engine::loading::lab_session::LoadTarget;

/// Settled-over-requested ratio for the active lab batch.
///
/// Failed loads count as settled so a broken item cannot hold progress below 100.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadingProgress {
    requested: HashSet<LoadTarget>,
    settled: HashSet<LoadTarget>,
}

impl LoadingProgress {
    /// Start a new batch, discarding anything tracked for the previous lab.
    pub fn reset(&mut self, targets: impl IntoIterator<Item = LoadTarget>) {
        self.requested = targets.into_iter().collect();
        self.settled.clear();
    }

    pub fn clear(&mut self) {
        self.requested.clear();
        self.settled.clear();
    }

    /// Mark a target finished. Untracked targets are ignored.
    pub fn settle(&mut self, target: &LoadTarget) {
        if self.requested.contains(target) {
            self.settled.insert(target.clone());
        }
    }

    pub fn requested(&self) -> usize {
        self.requested.len()
    }

    pub fn settled(&self) -> usize {
        self.settled.len()
    }

    /// Percentage in `0..=100`. An empty batch reports 0 until something is requested.
    pub fn progress(&self) -> u8 {
        if self.requested.is_empty() {
            return 0;
        }
        ((self.settled.len() * 100) / self.requested.len()) as u8
    }

    pub fn is_complete(&self) -> bool {
        !self.requested.is_empty() && self.settled.len() == self.requested.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> LoadTarget {
        LoadTarget::Item(id.to_string())
    }

    #[test]
    fn ratio_counts_lab_and_items() {
        let mut progress = LoadingProgress::default();
        progress.reset([LoadTarget::Lab, item("a"), item("b"), item("c")]);
        assert_eq!(progress.progress(), 0);

        progress.settle(&LoadTarget::Lab);
        assert_eq!(progress.progress(), 25);

        progress.settle(&item("a"));
        progress.settle(&item("a"));
        assert_eq!(progress.progress(), 50);

        progress.settle(&item("b"));
        progress.settle(&item("c"));
        assert!(progress.is_complete());
        assert_eq!(progress.progress(), 100);
    }

    #[test]
    fn reset_forgets_previous_batch() {
        let mut progress = LoadingProgress::default();
        progress.reset([LoadTarget::Lab, item("old")]);
        progress.settle(&LoadTarget::Lab);

        progress.reset([LoadTarget::Lab]);
        progress.settle(&item("old"));
        assert_eq!(progress.settled(), 0);
        assert_eq!(progress.requested(), 1);
    }
}

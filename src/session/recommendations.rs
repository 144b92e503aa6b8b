//! Treatment recommendation editor
//!
//! Entries are keyed by problem label. Labels come from two places: derived
//! from the shapes across all slots, or added by hand (custom). Derived
//! labels appear automatically with empty text and disappear when their last
//! shape goes; custom labels stay until removed.

use std::collections::BTreeSet;

use crate::domain::Recommendations;
use crate::error::ValidationError;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecommendationEditor {
    entries: Recommendations,
    custom: BTreeSet<String>,
}

impl RecommendationEditor {
    /// Start from persisted entries; keys with no shape behind them are kept as custom
    pub fn new(persisted: Recommendations, derived: &BTreeSet<String>) -> Self {
        let custom = persisted
            .keys()
            .filter(|label| !derived.contains(*label))
            .cloned()
            .collect();
        let mut editor = Self {
            entries: persisted,
            custom,
        };
        editor.sync(derived);
        editor
    }

    pub fn entries(&self) -> &Recommendations {
        &self.entries
    }

    pub fn custom_labels(&self) -> &BTreeSet<String> {
        &self.custom
    }

    /// Reconcile with the current derived labels; returns whether anything changed
    pub fn sync(&mut self, derived: &BTreeSet<String>) -> bool {
        let before = self.entries.len();
        let custom = &self.custom;
        self.entries
            .retain(|label, _| derived.contains(label) || custom.contains(label));
        let mut changed = self.entries.len() != before;

        for label in derived {
            if !self.entries.contains_key(label) {
                self.entries.insert(label.clone(), String::new());
                changed = true;
            }
        }
        if changed {
            log::debug!("Recommendation labels now {:?}", self.entries.keys());
        }
        changed
    }

    /// Set the text for a label, creating the entry if needed
    ///
    /// Writing to a label that is neither derived nor custom makes it custom.
    /// The label is trimmed; blank labels are rejected.
    pub fn set(
        &mut self,
        label: &str,
        text: &str,
        derived: &BTreeSet<String>,
    ) -> Result<(), ValidationError> {
        let label = label.trim();
        if label.is_empty() {
            return Err(ValidationError::EmptyLabel);
        }
        if !derived.contains(label) {
            self.custom.insert(label.to_string());
        }
        self.entries.insert(label.to_string(), text.to_string());
        Ok(())
    }

    /// Add a custom label; returns false for blank or already present labels
    pub fn add_custom(&mut self, label: &str) -> bool {
        let label = label.trim();
        if label.is_empty() || self.entries.contains_key(label) {
            return false;
        }
        self.custom.insert(label.to_string());
        self.entries.insert(label.to_string(), String::new());
        true
    }

    /// Remove a custom label; derived labels keep their entry
    pub fn remove_custom(&mut self, label: &str, derived: &BTreeSet<String>) -> bool {
        if !self.custom.remove(label) {
            return false;
        }
        if !derived.contains(label) {
            self.entries.remove(label);
        }
        true
    }
}

//! Report envelopes produced by the batch runner and publisher.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::PipscopeError;

/// Outcome of running one unit of work per symbol.
///
/// Successful symbols land in `results`; failed ones are recorded in
/// `failures` without aborting their siblings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport<T> {
    /// Per-symbol payloads for successful units.
    pub results: BTreeMap<String, T>,
    /// Per-symbol errors for failed units.
    pub failures: BTreeMap<String, PipscopeError>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            results: BTreeMap::new(),
            failures: BTreeMap::new(),
        }
    }
}

impl<T> BatchReport<T> {
    /// Number of symbols that completed.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    /// Number of symbols that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// True when no symbol failed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// `AllFailed` with every symbol's error when nothing succeeded.
    ///
    /// `None` when at least one symbol completed or the batch was empty.
    #[must_use]
    pub fn all_failed(&self) -> Option<PipscopeError> {
        (self.results.is_empty() && !self.failures.is_empty())
            .then(|| PipscopeError::AllFailed(self.failures.values().cloned().collect()))
    }
}

/// Per-profile upload tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileTally {
    /// Symbols whose page was updated.
    pub published: Vec<String>,
    /// Symbols whose upload failed, with the final error.
    pub failures: BTreeMap<String, PipscopeError>,
}

/// Outcome of publishing metrics to every configured profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReport {
    /// Tally per profile name.
    pub profiles: BTreeMap<String, ProfileTally>,
    /// Profiles that failed before any symbol was attempted (e.g. property setup).
    pub profile_failures: BTreeMap<String, PipscopeError>,
}

impl PublishReport {
    /// Total number of successful symbol uploads across profiles.
    #[must_use]
    pub fn published(&self) -> usize {
        self.profiles.values().map(|t| t.published.len()).sum()
    }

    /// Total number of failed symbol uploads across profiles.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.profiles.values().map(|t| t.failures.len()).sum::<usize>()
            + self.profile_failures.len()
    }

    /// `AllFailed` with every profile and symbol error when nothing was
    /// published.
    #[must_use]
    pub fn all_failed(&self) -> Option<PipscopeError> {
        if self.published() > 0 || self.failed() == 0 {
            return None;
        }
        let errors = self
            .profile_failures
            .values()
            .chain(self.profiles.values().flat_map(|t| t.failures.values()))
            .cloned()
            .collect();
        Some(PipscopeError::AllFailed(errors))
    }
}

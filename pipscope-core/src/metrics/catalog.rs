use std::collections::BTreeMap;

use pipscope_types::{
    CategorizedMetrics, MetricMap, PipscopeError, ProfileSpec, SessionTable, category,
};

use crate::metrics::{DATE_RANGE, levels, occurrence, session_metrics, volatility};

/// Every category label in display order.
pub const CATEGORIES: [&str; 7] = [
    category::VOLATILITY,
    category::TIMING,
    category::INTERVALS,
    category::DIRECTIONAL,
    category::OCCURRENCE,
    category::THEMATIC,
    category::OTHER,
];

/// Static metric name to category lookup with profile filtering.
///
/// Built once from the session table so session-derived names line up with
/// what the calculators emit.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    categories: BTreeMap<String, &'static str>,
    profiles: Vec<ProfileSpec>,
}

impl MetricCatalog {
    /// Catalog for `sessions` serving `profiles`.
    #[must_use]
    pub fn new(sessions: &SessionTable, profiles: Vec<ProfileSpec>) -> Self {
        let categories = session_metrics::catalog_entries(sessions)
            .into_iter()
            .chain(volatility::catalog_entries(sessions))
            .chain(occurrence::catalog_entries())
            .chain(levels::catalog_entries())
            .chain(std::iter::once((DATE_RANGE.to_string(), category::THEMATIC)))
            .collect();
        Self {
            categories,
            profiles,
        }
    }

    /// Category of a metric; [`category::OTHER`] for unknown names.
    #[must_use]
    pub fn category_of(&self, metric: &str) -> &'static str {
        self.categories.get(metric).copied().unwrap_or(category::OTHER)
    }

    /// Every known metric name, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Category labels in display order.
    #[must_use]
    pub const fn categories(&self) -> &'static [&'static str] {
        &CATEGORIES
    }

    /// Configured profiles.
    #[must_use]
    pub fn profiles(&self) -> &[ProfileSpec] {
        &self.profiles
    }

    fn profile(&self, name: &str) -> Result<&ProfileSpec, PipscopeError> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| PipscopeError::InvalidArg(format!("unknown profile '{name}'")))
    }

    /// Known metric names the profile receives, sorted.
    ///
    /// # Errors
    /// Returns `InvalidArg` for an unknown profile.
    pub fn metrics_for_profile(&self, profile: &str) -> Result<Vec<&str>, PipscopeError> {
        let spec = self.profile(profile)?;
        Ok(self
            .categories
            .iter()
            .filter(|(name, cat)| spec.admits(name, cat))
            .map(|(name, _)| name.as_str())
            .collect())
    }

    /// Group a flat map by category.
    #[must_use]
    pub fn group_by_category(&self, metrics: &MetricMap) -> CategorizedMetrics {
        let mut out = CategorizedMetrics::new();
        for (name, value) in metrics {
            out.entry(self.category_of(name).to_string())
                .or_default()
                .insert(name.clone(), value.clone());
        }
        out
    }

    /// Subset of grouped metrics a profile receives.
    ///
    /// Non-numeric metrics always pass. Categories left empty are dropped.
    ///
    /// # Errors
    /// Returns `InvalidArg` for an unknown profile.
    pub fn filter_for_profile(
        &self,
        metrics: &CategorizedMetrics,
        profile: &str,
    ) -> Result<CategorizedMetrics, PipscopeError> {
        let spec = self.profile(profile)?;
        let mut out = CategorizedMetrics::new();
        for (cat, map) in metrics {
            let kept: MetricMap = map
                .iter()
                .filter(|(name, value)| !value.is_numeric() || spec.admits(name, cat))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if !kept.is_empty() {
                out.insert(cat.clone(), kept);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipscope_types::{MetricValue, default_profiles};

    fn catalog() -> MetricCatalog {
        MetricCatalog::new(&SessionTable::default(), default_profiles())
    }

    #[test]
    fn categories_follow_metric_families() {
        let c = catalog();
        assert_eq!(c.category_of("Average Daily Range (pips)"), category::VOLATILITY);
        assert_eq!(c.category_of("Average London Range"), category::VOLATILITY);
        assert_eq!(c.category_of("Average Friday Range"), category::VOLATILITY);
        assert_eq!(c.category_of("Daily High in Out of Session %"), category::TIMING);
        assert_eq!(c.category_of("Bearish Daily Low in NY %"), category::TIMING);
        assert_eq!(c.category_of("London-Asia High %"), category::INTERVALS);
        assert_eq!(c.category_of("Bullish London-Asia Low %"), category::DIRECTIONAL);
        assert_eq!(c.category_of("Bullish High in Monday"), category::OCCURRENCE);
        assert_eq!(c.category_of("PD Levels Probability"), category::OCCURRENCE);
        assert_eq!(c.category_of(DATE_RANGE), category::THEMATIC);
        assert_eq!(c.category_of("Something Else"), category::OTHER);
    }

    #[test]
    fn profiles_select_metrics() {
        let c = catalog();
        let research = c.metrics_for_profile("research").unwrap();
        assert_eq!(research.len(), c.names().count());
        let desk = c.metrics_for_profile("desk").unwrap();
        assert!(desk.contains(&"High in Monday"));
        assert!(!desk.contains(&"London-Asia High %"));
        let digest = c.metrics_for_profile("digest").unwrap();
        assert!(digest.contains(&"PDH Probability"));
        assert!(digest.contains(&DATE_RANGE));
        assert!(!digest.contains(&"Average Monday Range"));
        assert!(c.metrics_for_profile("nope").is_err());
    }

    #[test]
    fn filtering_keeps_text_and_drops_empty_categories() {
        let c = catalog();
        let mut flat = MetricMap::new();
        flat.insert("London-Asia High %".into(), MetricValue::Number(12.5));
        flat.insert("PDH Probability".into(), MetricValue::Number(51.0));
        flat.insert("Custom Note".into(), MetricValue::Text("hello".into()));
        let grouped = c.group_by_category(&flat);
        assert_eq!(grouped.len(), 3);
        let digest = c.filter_for_profile(&grouped, "digest").unwrap();
        assert!(!digest.contains_key(category::INTERVALS));
        assert_eq!(digest[category::OCCURRENCE].len(), 1);
        assert_eq!(
            digest[category::OTHER]["Custom Note"],
            MetricValue::Text("hello".into())
        );
    }
}

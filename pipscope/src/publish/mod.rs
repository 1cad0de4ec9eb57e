//! Uploading grouped metrics to profile-specific destinations.
//!
//! [`publish_profiles`] filters every symbol's metrics for each profile,
//! makes sure the destination has the needed columns, then uploads each
//! symbol. Profiles run concurrently; wrap the publisher in a
//! [`RetryingPublisher`] to bound in-flight requests and retry transient
//! failures.

pub mod backoff;
mod notion;
mod retry;

pub use notion::{NotionPublisher, missing_properties, property_values, title_filter};
pub use pipscope_core::Publisher;
pub use retry::RetryingPublisher;

use pipscope_core::MetricCatalog;
use pipscope_types::{
    CategorizedMetrics, MetricMap, PipscopeError, ProfileTally, PublishReport, SymbolMetrics,
};

/// Publish `metrics` to every profile in `profiles`.
///
/// Behavior:
/// - An unknown profile or a failed property setup lands in
///   `profile_failures`; no symbol is attempted for that profile.
/// - Each symbol upload is independent; failures are tallied per profile and
///   the remaining symbols still publish.
/// - Profiles with no symbols to publish yield an empty tally without
///   contacting the destination.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        name = "pipscope::publish::publish_profiles",
        skip(publisher, catalog, metrics),
        fields(sink = publisher.name(), symbols = metrics.len()),
    )
)]
pub async fn publish_profiles(
    publisher: &dyn Publisher,
    catalog: &MetricCatalog,
    metrics: &SymbolMetrics,
    profiles: &[String],
) -> PublishReport {
    let runs = profiles
        .iter()
        .map(|profile| publish_profile(publisher, catalog, metrics, profile));
    let outcomes = futures::future::join_all(runs).await;

    let mut report = PublishReport::default();
    for (profile, outcome) in profiles.iter().zip(outcomes) {
        match outcome {
            Ok(tally) => {
                report.profiles.insert(profile.clone(), tally);
            }
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(profile = %profile, error = %e, "profile skipped");
                report.profile_failures.insert(profile.clone(), e);
            }
        }
    }
    #[cfg(feature = "tracing")]
    tracing::info!(
        published = report.published(),
        failed = report.failed(),
        "publication finished"
    );
    report
}

async fn publish_profile(
    publisher: &dyn Publisher,
    catalog: &MetricCatalog,
    metrics: &SymbolMetrics,
    profile: &str,
) -> Result<ProfileTally, PipscopeError> {
    let filtered: Vec<(&String, CategorizedMetrics)> = metrics
        .iter()
        .map(|(symbol, m)| catalog.filter_for_profile(m, profile).map(|f| (symbol, f)))
        .collect::<Result<_, _>>()?;
    if filtered.is_empty() {
        return Ok(ProfileTally::default());
    }

    let sample: MetricMap = filtered
        .iter()
        .flat_map(|(_, grouped)| grouped.values())
        .flat_map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())))
        .collect();
    publisher.ensure_properties(profile, &sample).await?;

    let uploads = filtered.iter().map(|(symbol, grouped)| async move {
        (*symbol, publisher.publish(profile, symbol, grouped).await)
    });
    let mut tally = ProfileTally::default();
    for (symbol, res) in futures::future::join_all(uploads).await {
        match res {
            Ok(()) => tally.published.push(symbol.clone()),
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(profile, symbol = %symbol, error = %e, "upload failed");
                tally.failures.insert(symbol.clone(), e);
            }
        }
    }
    Ok(tally)
}

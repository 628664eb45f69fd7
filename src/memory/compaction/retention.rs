use crate::memory::store::TierStore;
use crate::memory::types::{Scope, Tier};

/// Result of pruning one scope's monthly tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub kept: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<String>,
}

/// Keep the newest `retention_months` monthly artifacts of `scope` and delete
/// the rest. Daily and weekly artifacts are never touched.
///
/// Returns `None` when retention was skipped: a negative horizon is a
/// misconfiguration, and a listing failure leaves everything in place.
pub async fn enforce_retention(
    store: &dyn TierStore,
    scope: &Scope,
    retention_months: i64,
) -> Option<RetentionReport> {
    let Ok(keep) = usize::try_from(retention_months) else {
        tracing::warn!(
            scope = %scope,
            retention_months,
            "negative retention_months; skipping monthly retention"
        );
        return None;
    };

    let identifiers = match store.list(Tier::Monthly, scope).await {
        Ok(identifiers) => identifiers,
        Err(error) => {
            tracing::warn!(
                scope = %scope,
                error = %error,
                "failed to list monthly memory; skipping retention"
            );
            return None;
        }
    };

    let mut report = RetentionReport::default();
    for (idx, identifier) in identifiers.into_iter().enumerate() {
        if idx < keep {
            report.kept.push(identifier);
            continue;
        }
        match store.delete(Tier::Monthly, scope, &identifier).await {
            Ok(_) => {
                tracing::info!(
                    scope = %scope,
                    identifier = %identifier,
                    "deleted monthly memory past retention"
                );
                report.deleted.push(identifier);
            }
            Err(error) => {
                tracing::warn!(
                    scope = %scope,
                    identifier = %identifier,
                    error = %error,
                    "failed to delete monthly memory"
                );
                report.failed.push(identifier);
            }
        }
    }
    Some(report)
}

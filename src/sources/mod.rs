// src/sources/mod.rs
pub mod arcgis;
pub mod hdx;
pub mod hip;
pub mod html;
pub mod nssd;

use log::warn;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

use crate::models::record::Source;

/// Why a source contributed nothing to this run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceDiagnostic {
    pub source: Source,
    pub reason: String,
}

/// Result of one source fetch. A failure never escapes; it is folded into a
/// diagnostic and an empty contribution.
#[derive(Debug)]
pub enum SourceOutcome<T> {
    Collected(Vec<T>),
    Failed { source: Source, reason: String },
}

impl<T> SourceOutcome<T> {
    pub fn from_result(source: Source, result: anyhow::Result<Vec<T>>) -> Self {
        match result {
            Ok(records) => SourceOutcome::Collected(records),
            Err(e) => SourceOutcome::Failed {
                source,
                reason: format!("{:#}", e),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SourceOutcome::Failed { .. })
    }

    pub fn into_records(self, diagnostics: &mut Vec<SourceDiagnostic>) -> Vec<T> {
        match self {
            SourceOutcome::Collected(records) => records,
            SourceOutcome::Failed { source, reason } => {
                warn!("⚠️  [{}] contributed no records: {}", source, reason);
                diagnostics.push(SourceDiagnostic { source, reason });
                Vec::new()
            }
        }
    }
}

/// Runs one source fetch under an overall deadline.
pub async fn run_with_timeout<T, F>(source: Source, limit: Duration, fetch: F) -> SourceOutcome<T>
where
    F: Future<Output = anyhow::Result<Vec<T>>>,
{
    match tokio::time::timeout(limit, fetch).await {
        Ok(result) => SourceOutcome::from_result(source, result),
        Err(_) => SourceOutcome::Failed {
            source,
            reason: format!("timed out after {}s", limit.as_secs()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_into_records_folds_failures() {
        let mut diagnostics = Vec::new();

        let ok: SourceOutcome<u32> = SourceOutcome::from_result(Source::Hip, Ok(vec![1, 2]));
        assert!(!ok.is_failed());
        assert_eq!(ok.into_records(&mut diagnostics), vec![1, 2]);
        assert!(diagnostics.is_empty());

        let failed: SourceOutcome<u32> = SourceOutcome::from_result(
            Source::Nssd,
            Err(anyhow!("connection reset").context("Failed to fetch NSSD")),
        );
        assert!(failed.is_failed());
        assert!(failed.into_records(&mut diagnostics).is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].source, Source::Nssd);
        assert_eq!(diagnostics[0].reason, "Failed to fetch NSSD: connection reset");
    }

    #[tokio::test]
    async fn test_run_with_timeout() {
        let outcome = run_with_timeout(Source::Arcgis, Duration::from_secs(5), async {
            Ok(vec!["row"])
        })
        .await;
        assert!(matches!(outcome, SourceOutcome::Collected(ref rows) if rows.len() == 1));

        let outcome: SourceOutcome<&str> =
            run_with_timeout(Source::HdxOsm, Duration::from_millis(20), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(vec![])
            })
            .await;
        let mut diagnostics = Vec::new();
        assert!(outcome.into_records(&mut diagnostics).is_empty());
        assert_eq!(diagnostics[0].source, Source::HdxOsm);
        assert!(diagnostics[0].reason.contains("timed out"));
    }
}

//! Retrieval dispatcher: concurrent fan-out of sub-queries to sources

use crate::calls;
use crate::config::TrustTable;
use crate::error::EngineError;
use crate::state::{SourceFailure, SourceWarning};
use corroborate_domain::{
    CancellationToken, RetrievalError, RetrievedItem, SourceDocument, SourceKind, SubQuery,
    SubQueryId,
};
use corroborate_sources::SourceRegistry;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Everything one dispatch of one sub-query produced
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Dispatched sub-query
    pub sub_query: SubQueryId,
    /// Items, unique by origin, sorted by (origin, kind)
    pub items: Vec<RetrievedItem>,
    /// One warning per failing source
    pub warnings: Vec<SourceWarning>,
    /// No source answered successfully
    pub all_failed: bool,
}

/// Fans sub-queries out to the registered retrieval ports
#[derive(Clone)]
pub struct RetrievalDispatcher {
    registry: SourceRegistry,
    trust: TrustTable,
    timeout: Duration,
    max_parallel: usize,
}

impl RetrievalDispatcher {
    /// Create a new dispatcher
    pub fn new(
        registry: SourceRegistry,
        trust: TrustTable,
        timeout: Duration,
        max_parallel: usize,
    ) -> Self {
        Self {
            registry,
            trust,
            timeout,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Dispatch several sub-queries concurrently
    ///
    /// Outcomes come back in the order of `sub_queries`.
    pub async fn dispatch_all(
        &self,
        sub_queries: Vec<SubQuery>,
        cancel: &CancellationToken,
    ) -> Result<Vec<DispatchOutcome>, EngineError> {
        let mut handles = Vec::with_capacity(sub_queries.len());
        for sub_query in sub_queries {
            let dispatcher = self.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                dispatcher.dispatch(&sub_query, &cancel).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await??);
        }
        Ok(outcomes)
    }

    /// Dispatch one sub-query to every source kind attached to it
    ///
    /// Source failures become warnings; only a failure of the engine's own
    /// tasks is an error.
    pub async fn dispatch(
        &self,
        sub_query: &SubQuery,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, EngineError> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let mut warnings = Vec::new();
        let mut handles = Vec::new();

        for kind in &sub_query.sources {
            let Some(port) = self.registry.get(*kind) else {
                warn!("No retrieval port registered for '{}'", kind);
                warnings.push(SourceWarning {
                    sub_query: sub_query.id,
                    kind: *kind,
                    reason: SourceFailure::NotRegistered,
                });
                continue;
            };

            let kind = *kind;
            let sem = Arc::clone(&semaphore);
            let sub_query = sub_query.clone();
            let cancel = cancel.clone();
            let timeout = self.timeout;

            handles.push(tokio::spawn(async move {
                let result = match sem.acquire_owned().await {
                    Ok(_permit) => calls::retrieve(port, sub_query, timeout, &cancel).await,
                    Err(_) => Err(RetrievalError::Canceled),
                };
                (kind, result)
            }));
        }

        let retrieved_at = now_secs();
        let mut by_origin: BTreeMap<String, RetrievedItem> = BTreeMap::new();
        let mut successes = 0;

        // Handles are in kind order, so a duplicate origin keeps its first kind
        for handle in handles {
            let (kind, result) = handle.await?;
            match result {
                Ok(documents) => {
                    successes += 1;
                    debug!("Source '{}' returned {} documents", kind, documents.len());
                    for document in documents {
                        self.stamp(document, kind, sub_query.id, retrieved_at, &mut by_origin);
                    }
                }
                Err(e) => {
                    warn!("Source '{}' failed for sub-query {}: {}", kind, sub_query.id, e);
                    warnings.push(SourceWarning {
                        sub_query: sub_query.id,
                        kind,
                        reason: SourceFailure::from(e),
                    });
                }
            }
        }

        let items: Vec<RetrievedItem> = by_origin.into_values().collect();
        let all_failed = successes == 0;
        info!(
            "Dispatched sub-query '{}': {} items, {} source failures",
            sub_query.text,
            items.len(),
            warnings.len()
        );

        Ok(DispatchOutcome {
            sub_query: sub_query.id,
            items,
            warnings,
            all_failed,
        })
    }

    fn stamp(
        &self,
        document: SourceDocument,
        kind: SourceKind,
        sub_query: SubQueryId,
        retrieved_at: u64,
        by_origin: &mut BTreeMap<String, RetrievedItem>,
    ) {
        if document.origin.trim().is_empty() || document.text.trim().is_empty() {
            debug!("Dropping empty document from '{}'", kind);
            return;
        }
        if by_origin.contains_key(&document.origin) {
            return;
        }
        let item = RetrievedItem::from_document(
            document,
            kind,
            sub_query,
            self.trust.weight(kind),
            retrieved_at,
        );
        by_origin.insert(item.origin.clone(), item);
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

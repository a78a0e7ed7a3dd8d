//! Request dispatch: one network call per (kind, config, dataset) triple,
//! plus all-settled batches for dashboard loads.

pub mod http;
pub mod token;
pub mod wire;

pub use http::{HttpTransport, ServiceConfig};
pub use token::{DispatchToken, SessionGuard};
pub use wire::TransportResponse;

use crate::config::AnalysisConfig;
use crate::dataset::DatasetId;
use crate::error::{AnalysisError, ConfigError};
use crate::registry::{AnalysisKind, AnalysisTypeRegistry};
use crate::result::AnalysisResult;
use futures::future::join_all;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Seam between the dispatcher and the network.
///
/// Implementations: [`HttpTransport`] for the real service, in-memory stubs
/// for tests.
pub trait AnalysisTransport: Send + Sync {
    /// Posts a JSON body to an endpoint path and returns the raw answer.
    ///
    /// Only transport-level failures (unreachable service, broken
    /// connection) are errors here; HTTP status handling is left to the
    /// dispatcher.
    fn post_json(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> impl Future<Output = Result<TransportResponse, AnalysisError>> + Send;
}

/// One member of a batch dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// Caller-chosen name, e.g. the dashboard panel title
    pub label: String,
    pub config: AnalysisConfig,
    pub dataset_id: DatasetId,
    /// A required panel with zero rows settles as `EmptyResult`
    pub required: bool,
}

impl AnalysisRequest {
    pub fn new(label: impl Into<String>, config: AnalysisConfig, dataset_id: DatasetId) -> Self {
        AnalysisRequest {
            label: label.into(),
            config,
            dataset_id,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn kind(&self) -> AnalysisKind {
        self.config.kind()
    }
}

/// Settled outcome of one batch member.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub label: String,
    pub kind: AnalysisKind,
    pub outcome: Result<AnalysisResult, AnalysisError>,
}

/// All-settled outcome of a batch: every member is kept, success or not.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub entries: Vec<BatchEntry>,
}

impl BatchOutcome {
    /// Any single failure marks the whole batch as failed.
    pub fn is_failed(&self) -> bool {
        self.entries.iter().any(|entry| entry.outcome.is_err())
    }

    pub fn successes(&self) -> impl Iterator<Item = (&str, &AnalysisResult)> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            Ok(result) => Some((entry.label.as_str(), result)),
            Err(_) => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &AnalysisError)> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            Ok(_) => None,
            Err(error) => Some((entry.label.as_str(), error)),
        })
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn get(&self, label: &str) -> Option<&BatchEntry> {
        self.entries.iter().find(|entry| entry.label == label)
    }
}

/// Maps configs to service calls and responses to typed results.
///
/// No retries: the caller decides whether to try again.
#[derive(Debug)]
pub struct AnalysisDispatcher<T> {
    transport: T,
    registry: AnalysisTypeRegistry,
}

impl<T: AnalysisTransport> AnalysisDispatcher<T> {
    pub fn new(transport: T) -> Self {
        Self::with_registry(transport, AnalysisTypeRegistry::new())
    }

    pub fn with_registry(transport: T, registry: AnalysisTypeRegistry) -> Self {
        AnalysisDispatcher {
            transport,
            registry,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Dispatches one analysis.
    ///
    /// # Errors
    /// `Validation` if the config does not match `kind` or has empty required
    /// fields (nothing is sent); `Network` or `Server` for service failures.
    pub async fn dispatch(
        &self,
        kind: AnalysisKind,
        config: &AnalysisConfig,
        dataset_id: &DatasetId,
    ) -> Result<AnalysisResult, AnalysisError> {
        if config.kind() != kind {
            return Err(ConfigError::KindMismatch {
                expected: kind.id().to_string(),
                actual: config.kind().id().to_string(),
            }
            .into());
        }
        config.validate()?;

        let endpoint = self.registry.definition(kind).endpoint;
        let body = wire::request_body(config, dataset_id);
        let request_id = Uuid::new_v4();
        debug!(%request_id, kind = kind.id(), dataset = %dataset_id, endpoint, "dispatching analysis");

        let response = self.transport.post_json(endpoint, &body).await;
        let outcome = response.and_then(|response| wire::decode_response(kind, &response));

        match &outcome {
            Ok(result) => debug!(%request_id, rows = result.row_count(), "analysis settled"),
            Err(error) => warn!(%request_id, kind = kind.id(), %error, "analysis failed"),
        }
        outcome
    }

    /// Dispatches and discards the response if the session moved on while
    /// the request was in flight.
    ///
    /// # Errors
    /// As [`Self::dispatch`], plus `Cancelled` when the token went stale.
    pub async fn dispatch_with_token(
        &self,
        kind: AnalysisKind,
        config: &AnalysisConfig,
        dataset_id: &DatasetId,
        token: &DispatchToken,
    ) -> Result<AnalysisResult, AnalysisError> {
        let outcome = self.dispatch(kind, config, dataset_id).await;
        if !token.is_current() {
            debug!(kind = kind.id(), generation = token.generation(), "discarding stale response");
            return Err(AnalysisError::cancelled(format!(
                "{} response arrived after the session changed",
                kind.id()
            )));
        }
        outcome
    }

    /// Issues every request together and waits until all have settled.
    ///
    /// Never short-circuits: each failure is logged and kept alongside the
    /// successes. A required member that comes back without rows settles as
    /// `EmptyResult`.
    pub async fn dispatch_batch(&self, requests: Vec<AnalysisRequest>) -> BatchOutcome {
        self.settle_batch(requests, None).await
    }

    /// Batch dispatch tied to a session: members that settle after the
    /// token went stale are recorded as `Cancelled`.
    pub async fn dispatch_batch_with_token(
        &self,
        requests: Vec<AnalysisRequest>,
        token: &DispatchToken,
    ) -> BatchOutcome {
        self.settle_batch(requests, Some(token)).await
    }

    async fn settle_batch(
        &self,
        requests: Vec<AnalysisRequest>,
        token: Option<&DispatchToken>,
    ) -> BatchOutcome {
        let pending = requests.iter().map(|request| async move {
            let kind = request.kind();
            let outcome = match token {
                Some(token) => {
                    self.dispatch_with_token(kind, &request.config, &request.dataset_id, token)
                        .await
                }
                None => self.dispatch(kind, &request.config, &request.dataset_id).await,
            };
            match outcome {
                Ok(result) if request.required && result.row_count() == 0 => {
                    Err(AnalysisError::empty_result(format!(
                        "'{}' returned no rows",
                        request.label
                    )))
                }
                other => other,
            }
        });
        let settled = join_all(pending).await;

        let entries: Vec<BatchEntry> = requests
            .into_iter()
            .zip(settled)
            .map(|(request, outcome)| BatchEntry {
                kind: request.kind(),
                label: request.label,
                outcome,
            })
            .collect();
        let outcome = BatchOutcome { entries };

        for (label, error) in outcome.failures() {
            warn!(panel = label, kind = error.kind.as_str(), %error, "batch member failed");
        }
        info!(
            succeeded = outcome.success_count(),
            failed = outcome.failure_count(),
            "batch settled"
        );
        outcome
    }
}

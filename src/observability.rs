//! Correlation ids and trace contexts for submissions
//!
//! Every public controller entry point opens a root [`TraceContext`]; work
//! hanging off a submission (rebroadcasts) opens a child that keeps the
//! trace and correlation ids so log lines can be joined afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use solana_sdk::signature::Signature;
use uuid::Uuid;

/// Correlation ID shared by every log line of one submission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: Uuid,
    pub span_id: Uuid,
    pub parent_span_id: Option<Uuid>,
    pub correlation_id: CorrelationId,
    pub operation: &'static str,
    pub started_at: DateTime<Utc>,
}

impl TraceContext {
    /// Root context with fresh trace and correlation ids
    pub fn new(operation: &'static str) -> Self {
        Self {
            trace_id: Uuid::new_v4(),
            span_id: Uuid::new_v4(),
            parent_span_id: None,
            correlation_id: CorrelationId::new(),
            operation,
            started_at: Utc::now(),
        }
    }

    pub fn child(&self, operation: &'static str) -> Self {
        Self {
            span_id: Uuid::new_v4(),
            parent_span_id: Some(self.span_id),
            operation,
            started_at: Utc::now(),
            ..self.clone()
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    /// Wall-clock milliseconds since the context was opened
    pub fn elapsed_ms(&self) -> i64 {
        (Utc::now() - self.started_at).num_milliseconds()
    }

    /// `tracing` span tagged with this context and the transaction signature
    pub fn span(&self, signature: &Signature) -> tracing::Span {
        tracing::info_span!(
            "submission",
            operation = self.operation,
            trace_id = %self.trace_id.simple(),
            span_id = %self.span_id.simple(),
            parent_span_id = ?self.parent_span_id,
            correlation_id = %self.correlation_id,
            %signature,
        )
    }
}

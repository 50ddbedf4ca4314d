//! Request context for RecordIO
//!
//! Caller identity, tenant, and correlation id for one request. Worker
//! tasks never read ambient thread-local state; every task captures a
//! clone of this context by value at submission time.

use uuid::Uuid;

/// Identity and tenancy of the caller for one request
#[derive(Clone, Debug)]
pub struct RequestContext {
    /// Data partition (tenant) the request targets
    pub partition_id: String,
    /// Identity of the calling user
    pub user_id: String,
    /// Opaque credential forwarded to external providers
    pub credential: String,
    /// Correlation id threaded through logs and notifications
    pub correlation_id: String,
}

impl RequestContext {
    /// Create a context with a fresh correlation id
    pub fn new(
        partition_id: impl Into<String>,
        user_id: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            partition_id: partition_id.into(),
            user_id: user_id.into(),
            credential: credential.into(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    /// Override the correlation id (e.g. taken from an incoming header)
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }
}

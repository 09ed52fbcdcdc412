// libs/sync-cell/src/services/audit.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, instrument};

use shared_models::error::ApiError;

use crate::models::{AuditStats, AuditTrail};
use crate::services::collaborators::AuditTrailSource;
use crate::services::normalize;

pub const DEFAULT_AUDIT_PAGE: u32 = 50;

/// Read-only passthrough to the hash-linked audit ledger. The chain is shown
/// as received; no hashes are recomputed here.
pub struct AuditTrailService {
    source: Arc<dyn AuditTrailSource>,
    request_timeout: Duration,
}

impl AuditTrailService {
    pub fn new(source: Arc<dyn AuditTrailSource>, request_timeout: Duration) -> Self {
        Self { source, request_timeout }
    }

    #[instrument(skip(self))]
    pub async fn trail(&self, subject_id: &str, skip: u32, limit: u32) -> Result<AuditTrail, ApiError> {
        let limit = if limit == 0 { DEFAULT_AUDIT_PAGE } else { limit };
        let body = timeout(self.request_timeout, self.source.audit_trail(subject_id, skip, limit))
            .await
            .map_err(|_| ApiError::Transient("audit trail request timed out".to_string()))??;

        let trail = normalize::audit_trail(body)?;
        debug!(subject_id = %subject_id, returned = trail.events.len(), "Audit trail fetched");
        Ok(trail)
    }

    pub async fn stats(&self) -> Result<AuditStats, ApiError> {
        let body = timeout(self.request_timeout, self.source.stats())
            .await
            .map_err(|_| ApiError::Transient("audit stats request timed out".to_string()))??;

        normalize::audit_stats(body)
    }
}

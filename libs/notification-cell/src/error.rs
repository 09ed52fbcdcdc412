use thiserror::Error;

/// Failures of the local alert channel. The delivery engine logs and swallows
/// every one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Delivery channel unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied for {0}")]
    PermissionDenied(String),
}

use crate::SyncOutcome;
use remote_secret_core::ClientError;
use remote_secret_k8s_api::ObjectKey;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Marker(#[from] anyhow::Error),

    #[error("service account {service_account} is managed by another owner; {claim} may not take ownership of it")]
    OwnershipConflict {
        service_account: ObjectKey,
        claim: ObjectKey,
    },

    #[error("secret has no name")]
    UnnamedSecret,
}

/// Returned when a sync stops early. Service accounts synchronized before the
/// failure remain persisted and are reported in `outcome`.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct SyncError {
    pub outcome: SyncOutcome,
    #[source]
    pub error: Error,
}

impl Error {
    /// Fatal errors stop a sync; others are recorded against the link that
    /// caused them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::OwnershipConflict { .. } | Self::Client(ClientError::Timeout(_))
        )
    }
}

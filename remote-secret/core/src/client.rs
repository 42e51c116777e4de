use remote_secret_k8s_api::{self as k8s, ObjectKey};

/// Stores service accounts.
///
/// Writes are optimistic: an update is based on the `resourceVersion` of the
/// object passed in and fails with [`ClientError::Conflict`] when the stored
/// object has changed since it was read.
#[async_trait::async_trait]
pub trait ServiceAccountClient: Send + Sync {
    async fn get(&self, key: &ObjectKey) -> Result<k8s::ServiceAccount, ClientError>;

    /// Creates the account, resolving `metadata.generateName` when no name is
    /// set. Returns the stored object.
    async fn create(&self, sa: &k8s::ServiceAccount) -> Result<k8s::ServiceAccount, ClientError>;

    async fn update(&self, sa: &k8s::ServiceAccount) -> Result<k8s::ServiceAccount, ClientError>;

    /// Lists the accounts in a namespace matching a label selector. An empty
    /// selector matches everything.
    async fn list(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<k8s::ServiceAccount>, ClientError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("service account {0} not found")]
    NotFound(ObjectKey),

    #[error("service account {0} was modified concurrently")]
    Conflict(ObjectKey),

    #[error("request for service account {0} timed out")]
    Timeout(ObjectKey),

    #[error("service account must have a namespace and a name or generateName")]
    InvalidObject,

    #[error(transparent)]
    Kube(#[from] k8s::Error),
}

impl ClientError {
    /// Classifies an API error by its HTTP status.
    pub fn from_kube(key: &ObjectKey, error: k8s::Error) -> Self {
        match &error {
            k8s::Error::Api(rsp) if rsp.code == 404 => Self::NotFound(key.clone()),
            k8s::Error::Api(rsp) if rsp.code == 409 => Self::Conflict(key.clone()),
            _ => Self::Kube(error),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

use crate::ServiceAccountClient;
use remote_secret_k8s_api::{LinkableSecretSpec, ObjectKey};

/// The object a secret is deployed on behalf of.
pub trait DeploymentTarget: Send + Sync {
    type Client: ServiceAccountClient;

    fn client(&self) -> &Self::Client;

    fn target_namespace(&self) -> &str;

    fn spec(&self) -> LinkableSecretSpec;

    /// Identifies the requesting object. Used as the claim recorded by the
    /// object marker.
    fn target_key(&self) -> ObjectKey;

    /// Names of the service accounts synchronized by a previous reconcile.
    fn actual_service_account_names(&self) -> Vec<String> {
        Vec::new()
    }
}

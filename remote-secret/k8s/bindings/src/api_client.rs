use remote_secret_core::{ClientError, ServiceAccountClient, BINDING_CONTROLLER_NAME};
use remote_secret_k8s_api::{self as k8s, ObjectKey};
use std::future::Future;
use tokio::time;

/// Stores service accounts in a cluster through the Kubernetes API.
#[derive(Clone)]
pub struct KubeServiceAccounts {
    client: k8s::Client,
    timeout: time::Duration,
}

impl KubeServiceAccounts {
    pub fn new(client: k8s::Client, timeout: time::Duration) -> Self {
        Self { client, timeout }
    }

    fn api(&self, namespace: &str) -> k8s::Api<k8s::ServiceAccount> {
        k8s::Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> k8s::PostParams {
        k8s::PostParams {
            dry_run: false,
            field_manager: Some(BINDING_CONTROLLER_NAME.to_string()),
        }
    }

    async fn request<T>(
        &self,
        key: &ObjectKey,
        req: impl Future<Output = Result<T, k8s::Error>>,
    ) -> Result<T, ClientError> {
        match time::timeout(self.timeout, req).await {
            Ok(rsp) => rsp.map_err(|error| ClientError::from_kube(key, error)),
            Err(_) => Err(ClientError::Timeout(key.clone())),
        }
    }
}

#[async_trait::async_trait]
impl ServiceAccountClient for KubeServiceAccounts {
    async fn get(&self, key: &ObjectKey) -> Result<k8s::ServiceAccount, ClientError> {
        tracing::trace!(%key, "Getting");
        self.request(key, self.api(&key.namespace).get(&key.name))
            .await
    }

    async fn create(&self, sa: &k8s::ServiceAccount) -> Result<k8s::ServiceAccount, ClientError> {
        let key = request_key(sa).ok_or(ClientError::InvalidObject)?;
        tracing::debug!(%key, "Creating");
        let params = Self::post_params();
        self.request(&key, self.api(&key.namespace).create(&params, sa))
            .await
    }

    async fn update(&self, sa: &k8s::ServiceAccount) -> Result<k8s::ServiceAccount, ClientError> {
        let key = ObjectKey::from_meta(&sa.metadata).ok_or(ClientError::InvalidObject)?;
        tracing::debug!(%key, resource_version = ?sa.metadata.resource_version, "Updating");
        let params = Self::post_params();
        self.request(&key, self.api(&key.namespace).replace(&key.name, &params, sa))
            .await
    }

    async fn list(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<k8s::ServiceAccount>, ClientError> {
        let key = ObjectKey::new(namespace, "*");
        let params = k8s::ListParams::default().labels(label_selector);
        let list = self.request(&key, self.api(namespace).list(&params)).await?;
        Ok(list.items)
    }
}

/// Identifies a service account being created, by name or generated-name
/// prefix.
fn request_key(sa: &k8s::ServiceAccount) -> Option<ObjectKey> {
    let namespace = sa.metadata.namespace.as_deref()?;
    let name = sa
        .metadata
        .name
        .as_deref()
        .or(sa.metadata.generate_name.as_deref())?;
    Some(ObjectKey::new(namespace, name))
}

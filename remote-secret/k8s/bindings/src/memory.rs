use parking_lot::RwLock;
use remote_secret_core::{ClientError, ServiceAccountClient};
use remote_secret_k8s_api::{self as k8s, ObjectKey};
use std::{collections::BTreeMap, sync::Arc};

/// Stores service accounts in memory, with the optimistic concurrency and
/// name generation of the Kubernetes API.
#[derive(Clone, Debug, Default)]
pub struct MemoryServiceAccounts(Arc<RwLock<State>>);

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<ObjectKey, k8s::ServiceAccount>,
    resource_version: u64,
    generated: u64,
}

impl MemoryServiceAccounts {
    pub fn with_objects(objects: impl IntoIterator<Item = k8s::ServiceAccount>) -> Self {
        let mut state = State::default();
        for mut sa in objects {
            if let Some(key) = ObjectKey::from_meta(&sa.metadata) {
                sa.metadata.resource_version = Some(state.next_version());
                state.objects.insert(key, sa);
            }
        }
        Self(Arc::new(RwLock::new(state)))
    }

    /// Returns the stored copy of an object.
    pub fn stored(&self, key: &ObjectKey) -> Option<k8s::ServiceAccount> {
        self.0.read().objects.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.read().objects.is_empty()
    }
}

impl State {
    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn generate_name(&mut self, namespace: &str, prefix: &str) -> String {
        loop {
            self.generated += 1;
            let name = format!("{prefix}{:05x}", self.generated);
            if !self.objects.contains_key(&ObjectKey::new(namespace, &name)) {
                return name;
            }
        }
    }
}

#[async_trait::async_trait]
impl ServiceAccountClient for MemoryServiceAccounts {
    async fn get(&self, key: &ObjectKey) -> Result<k8s::ServiceAccount, ClientError> {
        self.stored(key)
            .ok_or_else(|| ClientError::NotFound(key.clone()))
    }

    async fn create(&self, sa: &k8s::ServiceAccount) -> Result<k8s::ServiceAccount, ClientError> {
        let mut state = self.0.write();
        let namespace = sa
            .metadata
            .namespace
            .clone()
            .ok_or(ClientError::InvalidObject)?;
        let name = match (&sa.metadata.name, &sa.metadata.generate_name) {
            (Some(name), _) => name.clone(),
            (None, Some(prefix)) => state.generate_name(&namespace, prefix),
            (None, None) => return Err(ClientError::InvalidObject),
        };

        let key = ObjectKey::new(&namespace, &name);
        if state.objects.contains_key(&key) {
            return Err(ClientError::Conflict(key));
        }

        let mut sa = sa.clone();
        sa.metadata.name = Some(name);
        sa.metadata.resource_version = Some(state.next_version());
        state.objects.insert(key, sa.clone());
        Ok(sa)
    }

    async fn update(&self, sa: &k8s::ServiceAccount) -> Result<k8s::ServiceAccount, ClientError> {
        let key = ObjectKey::from_meta(&sa.metadata).ok_or(ClientError::InvalidObject)?;
        let mut state = self.0.write();
        let stored = state
            .objects
            .get(&key)
            .ok_or_else(|| ClientError::NotFound(key.clone()))?;

        // Updates without a resource version are unconditional.
        if let Some(version) = sa.metadata.resource_version.as_ref() {
            if stored.metadata.resource_version.as_ref() != Some(version) {
                return Err(ClientError::Conflict(key));
            }
        }

        let mut sa = sa.clone();
        sa.metadata.resource_version = Some(state.next_version());
        state.objects.insert(key, sa.clone());
        Ok(sa)
    }

    async fn list(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<k8s::ServiceAccount>, ClientError> {
        let state = self.0.read();
        Ok(state
            .objects
            .iter()
            .filter(|(key, sa)| key.namespace == namespace && selects(label_selector, sa))
            .map(|(_, sa)| sa.clone())
            .collect())
    }
}

/// Supports equality (`k=v`) and existence (`k`) requirements.
fn selects(selector: &str, sa: &k8s::ServiceAccount) -> bool {
    let labels = sa.metadata.labels.as_ref();
    selector
        .split(',')
        .map(str::trim)
        .filter(|req| !req.is_empty())
        .all(|req| {
            let value = |k: &str| labels.and_then(|l| l.get(k.trim()));
            match req.split_once('=') {
                Some((k, v)) => value(k).map(String::as_str) == Some(v.trim()),
                None => value(req).is_some(),
            }
        })
}

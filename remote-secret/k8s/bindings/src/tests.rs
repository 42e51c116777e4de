use crate::MemoryServiceAccounts;
use anyhow::Result;
use parking_lot::Mutex;
use remote_secret_core::{ClientError, DeploymentTarget, ObjectMarker, ServiceAccountClient};
use remote_secret_k8s_api::{self as k8s, LinkableSecretSpec, Map, ObjectKey, ObjectMeta};


pub(crate) const NAMESPACE: &str = "default";

type MarkFn = Box<dyn Fn(&ObjectKey, &mut ObjectMeta) -> Result<bool> + Send + Sync>;
type QueryFn = Box<dyn Fn(&ObjectKey, &ObjectMeta) -> bool + Send + Sync>;

/// A deployment target whose spec and claim can be changed between syncs.
pub(crate) struct TestDeploymentTarget<C = MemoryServiceAccounts> {
    client: C,
    claim: Mutex<ObjectKey>,
    spec: Mutex<LinkableSecretSpec>,
    actual: Mutex<Vec<String>>,
}

/// An object marker that does nothing unless a behavior is installed.
#[derive(Default)]
pub(crate) struct TestObjectMarker {
    mark_managed: Mutex<Option<MarkFn>>,
    unmark_managed: Mutex<Option<MarkFn>>,
    mark_referenced: Mutex<Option<MarkFn>>,
    unmark_referenced: Mutex<Option<MarkFn>>,
    is_managed_by: Mutex<Option<QueryFn>>,
    is_managed_by_other: Mutex<Option<QueryFn>>,
    is_referenced_by: Mutex<Option<QueryFn>>,
}

/// Wraps a client, failing requests for particular service accounts.
pub(crate) struct FailingClient {
    inner: MemoryServiceAccounts,
    failures: Mutex<Vec<(String, fn(ObjectKey) -> ClientError)>>,
}

pub(crate) fn init_tracing() -> tracing::subscriber::DefaultGuard {
    tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "remote_secret=trace,debug".parse().unwrap()),
            )
            .finish(),
    )
}

pub(crate) fn key(name: &str) -> ObjectKey {
    ObjectKey::new(NAMESPACE, name)
}

pub(crate) fn mk_sa(name: &str, labels: Option<Map>, annotations: Option<Map>) -> k8s::ServiceAccount {
    k8s::ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            labels,
            annotations,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub(crate) fn mk_secret(name: &str) -> k8s::Secret {
    k8s::Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Sets `key` to `value` in a possibly unset map.
pub(crate) fn set(map: &mut Option<Map>, key: &str, value: &str) {
    map.get_or_insert_with(Map::new)
        .insert(key.to_string(), value.to_string());
}

// === impl TestDeploymentTarget ===

impl<C> TestDeploymentTarget<C> {
    pub(crate) fn new(client: C, spec: LinkableSecretSpec) -> Self {
        Self {
            client,
            claim: Mutex::new(key("remote-secret")),
            spec: Mutex::new(spec),
            actual: Mutex::default(),
        }
    }

    pub(crate) fn set_spec(&self, spec: LinkableSecretSpec) {
        *self.spec.lock() = spec;
    }

    pub(crate) fn set_claim(&self, claim: ObjectKey) {
        *self.claim.lock() = claim;
    }

    pub(crate) fn set_actual_service_account_names(&self, names: Vec<String>) {
        *self.actual.lock() = names;
    }
}

impl<C: ServiceAccountClient> DeploymentTarget for TestDeploymentTarget<C> {
    type Client = C;

    fn client(&self) -> &C {
        &self.client
    }

    fn target_namespace(&self) -> &str {
        NAMESPACE
    }

    fn spec(&self) -> LinkableSecretSpec {
        self.spec.lock().clone()
    }

    fn target_key(&self) -> ObjectKey {
        self.claim.lock().clone()
    }

    fn actual_service_account_names(&self) -> Vec<String> {
        self.actual.lock().clone()
    }
}

// === impl TestObjectMarker ===

impl TestObjectMarker {
    pub(crate) fn on_mark_managed(
        &self,
        f: impl Fn(&ObjectKey, &mut ObjectMeta) -> bool + Send + Sync + 'static,
    ) {
        *self.mark_managed.lock() = Some(Box::new(
            move |k: &ObjectKey, o: &mut ObjectMeta| -> Result<bool> { Ok(f(k, o)) },
        ));
    }

    pub(crate) fn on_unmark_managed(
        &self,
        f: impl Fn(&ObjectKey, &mut ObjectMeta) -> bool + Send + Sync + 'static,
    ) {
        *self.unmark_managed.lock() = Some(Box::new(
            move |k: &ObjectKey, o: &mut ObjectMeta| -> Result<bool> { Ok(f(k, o)) },
        ));
    }

    pub(crate) fn on_mark_referenced(
        &self,
        f: impl Fn(&ObjectKey, &mut ObjectMeta) -> bool + Send + Sync + 'static,
    ) {
        self.on_try_mark_referenced(move |k, o| Ok(f(k, o)));
    }

    /// Like `on_mark_referenced`, for markers that may fail.
    pub(crate) fn on_try_mark_referenced(
        &self,
        f: impl Fn(&ObjectKey, &mut ObjectMeta) -> Result<bool> + Send + Sync + 'static,
    ) {
        *self.mark_referenced.lock() = Some(Box::new(f));
    }

    pub(crate) fn on_is_managed_by(
        &self,
        f: impl Fn(&ObjectKey, &ObjectMeta) -> bool + Send + Sync + 'static,
    ) {
        *self.is_managed_by.lock() = Some(Box::new(f));
    }

    pub(crate) fn on_is_managed_by_other(
        &self,
        f: impl Fn(&ObjectKey, &ObjectMeta) -> bool + Send + Sync + 'static,
    ) {
        *self.is_managed_by_other.lock() = Some(Box::new(f));
    }

    pub(crate) fn on_is_referenced_by(
        &self,
        f: impl Fn(&ObjectKey, &ObjectMeta) -> bool + Send + Sync + 'static,
    ) {
        *self.is_referenced_by.lock() = Some(Box::new(f));
    }
}

fn mark(f: &Mutex<Option<MarkFn>>, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool> {
    match f.lock().as_ref() {
        Some(f) => f(key, obj),
        None => Ok(false),
    }
}

fn query(f: &Mutex<Option<QueryFn>>, key: &ObjectKey, obj: &ObjectMeta) -> bool {
    f.lock().as_ref().is_some_and(|f| f(key, obj))
}

#[async_trait::async_trait]
impl ObjectMarker for TestObjectMarker {
    async fn mark_managed(&self, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool> {
        mark(&self.mark_managed, key, obj)
    }

    async fn unmark_managed(&self, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool> {
        mark(&self.unmark_managed, key, obj)
    }

    async fn mark_referenced(&self, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool> {
        mark(&self.mark_referenced, key, obj)
    }

    async fn unmark_referenced(&self, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool> {
        mark(&self.unmark_referenced, key, obj)
    }

    async fn is_managed_by(&self, key: &ObjectKey, obj: &ObjectMeta) -> Result<bool> {
        Ok(query(&self.is_managed_by, key, obj))
    }

    async fn is_managed_by_other(&self, key: &ObjectKey, obj: &ObjectMeta) -> Result<bool> {
        Ok(query(&self.is_managed_by_other, key, obj))
    }

    async fn is_referenced_by(&self, key: &ObjectKey, obj: &ObjectMeta) -> Result<bool> {
        Ok(query(&self.is_referenced_by, key, obj))
    }
}

// === impl FailingClient ===

impl FailingClient {
    pub(crate) fn new(inner: MemoryServiceAccounts) -> Self {
        Self {
            inner,
            failures: Mutex::default(),
        }
    }

    pub(crate) fn fail(&self, name: &str, error: fn(ObjectKey) -> ClientError) {
        self.failures.lock().push((name.to_string(), error));
    }

    fn check(&self, key: &ObjectKey) -> Result<(), ClientError> {
        match self.failures.lock().iter().find(|(name, _)| *name == key.name) {
            Some((_, error)) => Err(error(key.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ServiceAccountClient for FailingClient {
    async fn get(&self, key: &ObjectKey) -> Result<k8s::ServiceAccount, ClientError> {
        self.check(key)?;
        self.inner.get(key).await
    }

    async fn create(&self, sa: &k8s::ServiceAccount) -> Result<k8s::ServiceAccount, ClientError> {
        if let Some(key) = ObjectKey::from_meta(&sa.metadata) {
            self.check(&key)?;
        }
        self.inner.create(sa).await
    }

    async fn update(&self, sa: &k8s::ServiceAccount) -> Result<k8s::ServiceAccount, ClientError> {
        if let Some(key) = ObjectKey::from_meta(&sa.metadata) {
            self.check(&key)?;
        }
        self.inner.update(sa).await
    }

    async fn list(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<k8s::ServiceAccount>, ClientError> {
        self.inner.list(namespace, label_selector).await
    }
}

use crate::{link::originates, Error, SyncError};
use remote_secret_core::{ClientError, DeploymentTarget, ObjectMarker, ServiceAccountClient};
use remote_secret_k8s_api::{
    self as k8s, ManagedName, ManagedServiceAccountSpec, Map, ObjectKey, SecretLink,
    ServiceAccountTarget,
};
use std::fmt;
use tracing::{debug, info, warn};

/// Reconciles the service accounts declared by a deployment target's spec
/// with the cluster, and links secrets to them.
pub struct ServiceAccountHandler<T, M> {
    target: T,
    marker: M,
}

#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// Synchronized service accounts, as stored, in link order. An account
    /// reached through several links appears once.
    pub service_accounts: Vec<k8s::ServiceAccount>,

    /// Links that could not be resolved to a service account.
    pub warnings: Vec<LinkWarning>,

    /// Links that failed without stopping the sync.
    pub failures: Vec<LinkFailure>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkWarning {
    pub link: usize,
    pub warning: Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// A referenced service account does not exist (yet).
    ServiceAccountUnavailable(ObjectKey),

    /// A managed link has neither a name nor a generated-name prefix.
    UnnamedManagedServiceAccount,
}

#[derive(Debug)]
pub struct LinkFailure {
    pub link: usize,
    pub error: Error,
}

enum Ensured {
    Synced(k8s::ServiceAccount),
    Skipped(Warning),
}

// === impl ServiceAccountHandler ===

impl<T, M> ServiceAccountHandler<T, M>
where
    T: DeploymentTarget,
    M: ObjectMarker,
{
    pub fn new(target: T, marker: M) -> Self {
        Self { target, marker }
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn marker(&self) -> &M {
        &self.marker
    }

    /// Makes the service accounts in the target namespace match the target's
    /// spec.
    ///
    /// Links are processed in order. A link that fails is recorded in the
    /// outcome and processing continues, except for fatal errors (an ownership
    /// conflict or a timed out request) which stop the sync. Accounts persisted
    /// before a fatal error stay persisted and are returned in the error.
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        let spec = self.target.spec();
        let claim = self.target.target_key();
        let mut outcome = SyncOutcome::default();

        for (link, secret_link) in spec.linked_to.iter().enumerate() {
            let res = match &secret_link.service_account.target {
                ServiceAccountTarget::Reference(reference) => {
                    self.ensure_referenced(&claim, &reference.name, &spec.linked_to)
                        .await
                }
                ServiceAccountTarget::Managed(managed) => {
                    self.ensure_managed(&claim, managed).await
                }
            };

            match res {
                Ok(Ensured::Synced(sa)) => outcome.insert(sa),
                Ok(Ensured::Skipped(warning)) => {
                    warn!(%claim, link, %warning, "Skipping link");
                    outcome.warnings.push(LinkWarning { link, warning });
                }
                Err(error) if error.is_fatal() => {
                    warn!(%claim, link, %error, "Aborting service account sync");
                    return Err(SyncError { outcome, error });
                }
                Err(error) => {
                    warn!(%claim, link, %error, "Failed to sync service account");
                    outcome.failures.push(LinkFailure { link, error });
                }
            }
        }

        debug!(
            %claim,
            synced = outcome.service_accounts.len(),
            warnings = outcome.warnings.len(),
            failures = outcome.failures.len(),
            "Synced service accounts"
        );
        Ok(outcome)
    }

    async fn ensure_referenced(
        &self,
        claim: &ObjectKey,
        name: &str,
        links: &[SecretLink],
    ) -> Result<Ensured, Error> {
        let key = ObjectKey::new(self.target.target_namespace(), name);
        let mut sa = match self.target.client().get(&key).await {
            Ok(sa) => sa,
            Err(ClientError::NotFound(key)) => {
                return Ok(Ensured::Skipped(Warning::ServiceAccountUnavailable(key)))
            }
            Err(error) => return Err(error.into()),
        };

        // Management is only released when no link still declares the
        // account managed.
        let still_managed = links.iter().any(|l| {
            matches!(l.service_account.target, ServiceAccountTarget::Managed(_))
                && originates(&l.service_account, &sa)
        });
        let mut changed = false;
        if !still_managed && self.marker.is_managed_by(claim, &sa.metadata).await? {
            info!(%key, %claim, "Releasing management of service account");
            changed |= self.marker.unmark_managed(claim, &mut sa.metadata).await?;
        }
        changed |= self.marker.mark_referenced(claim, &mut sa.metadata).await?;

        if changed {
            sa = self.target.client().update(&sa).await?;
        }
        Ok(Ensured::Synced(sa))
    }

    async fn ensure_managed(
        &self,
        claim: &ObjectKey,
        spec: &ManagedServiceAccountSpec,
    ) -> Result<Ensured, Error> {
        let namespace = self.target.target_namespace();
        let existing = match spec.naming() {
            None => return Ok(Ensured::Skipped(Warning::UnnamedManagedServiceAccount)),
            Some(ManagedName::Explicit(name)) => {
                let key = ObjectKey::new(namespace, name);
                match self.target.client().get(&key).await {
                    Ok(sa) => Some(sa),
                    Err(ClientError::NotFound(_)) => None,
                    Err(error) => return Err(error.into()),
                }
            }
            Some(ManagedName::Generated(prefix)) => self.find_generated(claim, prefix).await?,
        };

        let Some(mut sa) = existing else {
            let mut sa = new_service_account(namespace, spec);
            merge(&mut sa.metadata.labels, &spec.labels);
            merge(&mut sa.metadata.annotations, &spec.annotations);
            self.marker.mark_managed(claim, &mut sa.metadata).await?;
            let sa = self.target.client().create(&sa).await?;
            info!(name = ?sa.metadata.name, %namespace, %claim, "Created service account");
            return Ok(Ensured::Synced(sa));
        };

        if self.marker.is_managed_by_other(claim, &sa.metadata).await? {
            return Err(Error::OwnershipConflict {
                service_account: ObjectKey::from_meta(&sa.metadata)
                    .unwrap_or_else(|| ObjectKey::new(namespace, "")),
                claim: claim.clone(),
            });
        }
        let mut changed = merge(&mut sa.metadata.labels, &spec.labels);
        changed |= merge(&mut sa.metadata.annotations, &spec.annotations);
        if self.marker.mark_managed(claim, &mut sa.metadata).await? {
            debug!(name = ?sa.metadata.name, %namespace, %claim, "Marked service account managed");
            changed = true;
        }

        if changed {
            sa = self.target.client().update(&sa).await?;
        }
        Ok(Ensured::Synced(sa))
    }

    /// Finds a service account generated for this claim by an earlier sync.
    async fn find_generated(
        &self,
        claim: &ObjectKey,
        prefix: &str,
    ) -> Result<Option<k8s::ServiceAccount>, Error> {
        let namespace = self.target.target_namespace();
        for name in self.target.actual_service_account_names() {
            if !name.starts_with(prefix) {
                continue;
            }
            let sa = match self.target.client().get(&ObjectKey::new(namespace, &name)).await {
                Ok(sa) => sa,
                Err(ClientError::NotFound(_)) => continue,
                Err(error) => return Err(error.into()),
            };
            if self.marker.is_managed_by(claim, &sa.metadata).await? {
                return Ok(Some(sa));
            }
        }
        Ok(None)
    }
}

fn new_service_account(namespace: &str, spec: &ManagedServiceAccountSpec) -> k8s::ServiceAccount {
    let (name, generate_name) = match spec.naming() {
        Some(ManagedName::Explicit(name)) => (Some(name.to_string()), None),
        Some(ManagedName::Generated(prefix)) => (None, Some(prefix.to_string())),
        None => (None, None),
    };
    k8s::ServiceAccount {
        metadata: k8s::ObjectMeta {
            name,
            generate_name,
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Sets every entry of `from` on `into`, leaving other keys untouched.
fn merge(into: &mut Option<Map>, from: &Map) -> bool {
    if from.is_empty() {
        return false;
    }
    let into = into.get_or_insert_with(Map::new);
    let mut changed = false;
    for (k, v) in from {
        if into.get(k) != Some(v) {
            into.insert(k.clone(), v.clone());
            changed = true;
        }
    }
    changed
}

// === impl SyncOutcome ===

impl SyncOutcome {
    /// Records a synchronized account. An account reached through several
    /// links is kept once, at its first position, as last stored.
    fn insert(&mut self, sa: k8s::ServiceAccount) {
        let key = ObjectKey::from_meta(&sa.metadata);
        match self
            .service_accounts
            .iter_mut()
            .find(|s| key.is_some() && ObjectKey::from_meta(&s.metadata) == key)
        {
            Some(existing) => *existing = sa,
            None => self.service_accounts.push(sa),
        }
    }
}

// === impl Warning ===

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServiceAccountUnavailable(key) => {
                write!(f, "service account {key} is not available")
            }
            Self::UnnamedManagedServiceAccount => {
                write!(f, "managed service account has neither name nor generateName")
            }
        }
    }
}

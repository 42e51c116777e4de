use crate::{Error, ServiceAccountHandler};
use remote_secret_core::{DeploymentTarget, ObjectMarker, ServiceAccountClient};
use remote_secret_k8s_api::{
    self as k8s, LinkableSecretSpec, ManagedName, ObjectKey, ServiceAccountLink,
    ServiceAccountLinkType, ServiceAccountTarget,
};
use tracing::{debug, info};

impl<T, M> ServiceAccountHandler<T, M>
where
    T: DeploymentTarget,
    M: ObjectMarker,
{
    /// Adds the secret to each service account, in every credential list
    /// chosen by the links the account was synchronized from. Accounts that
    /// change are persisted and replaced with their stored copy. Repeated
    /// entries for one account are linked through a single update.
    pub async fn link_to_secret(
        &self,
        service_accounts: &mut [k8s::ServiceAccount],
        secret: &k8s::Secret,
    ) -> Result<(), Error> {
        let secret_name = secret.metadata.name.as_deref().ok_or(Error::UnnamedSecret)?;
        let spec = self.target().spec();

        for i in 0..service_accounts.len() {
            let key = ObjectKey::from_meta(&service_accounts[i].metadata);
            if let Some(first) = (0..i).find(|&j| {
                key.is_some() && ObjectKey::from_meta(&service_accounts[j].metadata) == key
            }) {
                service_accounts[i] = service_accounts[first].clone();
                continue;
            }

            let sa = &mut service_accounts[i];
            let mut changed = false;
            for link_type in link_types_for(&spec, sa) {
                if link(sa, secret_name, link_type) {
                    debug!(name = ?sa.metadata.name, secret = %secret_name, ?link_type, "Linking secret");
                    changed = true;
                }
            }
            if changed {
                *sa = self.target().client().update(sa).await?;
            }
        }
        Ok(())
    }

    /// Lists the service accounts in the target namespace that are referenced
    /// or managed by the target.
    pub async fn list_linked(&self) -> Result<Vec<k8s::ServiceAccount>, Error> {
        let claim = self.target().target_key();
        let selector = self.marker().label_selector().unwrap_or_default();
        let candidates = self
            .target()
            .client()
            .list(self.target().target_namespace(), selector)
            .await?;

        let mut linked = Vec::with_capacity(candidates.len());
        for sa in candidates {
            if self.marker().is_referenced_by(&claim, &sa.metadata).await?
                || self.marker().is_managed_by(&claim, &sa.metadata).await?
            {
                linked.push(sa);
            }
        }
        Ok(linked)
    }

    /// Removes the secret and the target's markers from every service account
    /// linked to the target. Service accounts are never deleted.
    pub async fn detach(&self, secret: &k8s::Secret) -> Result<Vec<k8s::ServiceAccount>, Error> {
        let claim = self.target().target_key();
        let mut detached = Vec::new();
        for mut sa in self.list_linked().await? {
            let mut changed = unlink(secret, &mut sa);
            changed |= self.marker().unmark_managed(&claim, &mut sa.metadata).await?;
            changed |= self.marker().unmark_referenced(&claim, &mut sa.metadata).await?;
            if changed {
                sa = self.target().client().update(&sa).await?;
                info!(key = ?ObjectKey::from_meta(&sa.metadata), %claim, "Detached service account");
            }
            detached.push(sa);
        }
        Ok(detached)
    }
}

/// Removes every reference to the secret from both credential lists of the
/// service account, preserving the order of the remaining entries. Returns
/// whether anything was removed. The account is not persisted.
pub fn unlink(secret: &k8s::Secret, sa: &mut k8s::ServiceAccount) -> bool {
    let Some(name) = secret.metadata.name.as_deref() else {
        return false;
    };

    let mut changed = false;
    if let Some(secrets) = sa.secrets.as_mut() {
        let len = secrets.len();
        secrets.retain(|r| r.name.as_deref() != Some(name));
        changed |= secrets.len() != len;
    }
    if let Some(pull_secrets) = sa.image_pull_secrets.as_mut() {
        let len = pull_secrets.len();
        pull_secrets.retain(|r| r.name != name);
        changed |= pull_secrets.len() != len;
    }
    changed
}

/// Appends a reference to the secret unless the list already holds one.
fn link(sa: &mut k8s::ServiceAccount, secret_name: &str, link_type: ServiceAccountLinkType) -> bool {
    match link_type {
        ServiceAccountLinkType::Secret => {
            let secrets = sa.secrets.get_or_insert_with(Vec::new);
            if secrets.iter().any(|r| r.name.as_deref() == Some(secret_name)) {
                return false;
            }
            secrets.push(k8s::ObjectReference {
                name: Some(secret_name.to_string()),
                ..Default::default()
            });
        }
        ServiceAccountLinkType::ImagePullSecret => {
            let pull_secrets = sa.image_pull_secrets.get_or_insert_with(Vec::new);
            if pull_secrets.iter().any(|r| r.name == secret_name) {
                return false;
            }
            pull_secrets.push(k8s::LocalObjectReference {
                name: secret_name.to_string(),
            });
        }
    }
    true
}

/// Whether the service account is the one the link resolves to. Generated
/// accounts are matched by the `generateName` they were created with.
pub(crate) fn originates(link: &ServiceAccountLink, sa: &k8s::ServiceAccount) -> bool {
    let name = sa.metadata.name.as_deref();
    match &link.target {
        ServiceAccountTarget::Reference(r) => name == Some(r.name.as_str()),
        ServiceAccountTarget::Managed(m) => match m.naming() {
            Some(ManagedName::Explicit(n)) => name == Some(n),
            Some(ManagedName::Generated(prefix)) => {
                sa.metadata.generate_name.as_deref() == Some(prefix)
            }
            None => false,
        },
    }
}

/// Collects the credential lists of every link the service account was
/// synchronized from, in link order. Accounts matching no link get a plain
/// secret reference.
fn link_types_for(
    spec: &LinkableSecretSpec,
    sa: &k8s::ServiceAccount,
) -> Vec<ServiceAccountLinkType> {
    let mut types = Vec::new();
    for link in spec.linked_to.iter().map(|l| &l.service_account) {
        if originates(link, sa) && !types.contains(&link.link_type) {
            types.push(link.link_type);
        }
    }
    if types.is_empty() {
        types.push(ServiceAccountLinkType::default());
    }
    types
}

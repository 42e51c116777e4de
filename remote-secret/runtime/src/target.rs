use crate::{
    core::{DeploymentTarget, ServiceAccountClient},
    k8s::{LinkableSecretSpec, ObjectKey},
};

/// A deployment target described entirely on the command line.
pub struct StaticTarget<C> {
    client: C,
    namespace: String,
    claim: ObjectKey,
    spec: LinkableSecretSpec,
    known_service_accounts: Vec<String>,
}

impl<C> StaticTarget<C> {
    pub fn new(
        client: C,
        namespace: String,
        claim: ObjectKey,
        spec: LinkableSecretSpec,
        known_service_accounts: Vec<String>,
    ) -> Self {
        Self {
            client,
            namespace,
            claim,
            spec,
            known_service_accounts,
        }
    }
}

impl<C: ServiceAccountClient> DeploymentTarget for StaticTarget<C> {
    type Client = C;

    fn client(&self) -> &C {
        &self.client
    }

    fn target_namespace(&self) -> &str {
        &self.namespace
    }

    fn spec(&self) -> LinkableSecretSpec {
        self.spec.clone()
    }

    fn target_key(&self) -> ObjectKey {
        self.claim.clone()
    }

    fn actual_service_account_names(&self) -> Vec<String> {
        self.known_service_accounts.clone()
    }
}

//! Declarative description of the service accounts a secret is linked to.

use crate::{LocalObjectReference, Map};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkableSecretSpec {
    /// Service accounts the secret is attached to, processed in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_to: Vec<SecretLink>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretLink {
    pub service_account: ServiceAccountLink,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ServiceAccountLink {
    #[serde(flatten)]
    pub target: ServiceAccountTarget,

    /// Which credential list of the service account receives the secret.
    #[serde(default, rename = "as")]
    pub link_type: ServiceAccountLinkType,
}

/// The service account a link resolves to.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceAccountTarget {
    /// A pre-existing service account. It is never created or owned, only
    /// marked as referenced.
    Reference(LocalObjectReference),

    /// A service account that is created and owned by the binding.
    Managed(ManagedServiceAccountSpec),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedServiceAccountSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Used when `name` is not set. A new account is generated with this
    /// prefix unless one was already created by an earlier reconcile.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub labels: Map,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub annotations: Map,
}

/// How a managed service account is named.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ManagedName<'a> {
    Explicit(&'a str),
    Generated(&'a str),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ServiceAccountLinkType {
    #[default]
    #[serde(alias = "")]
    Secret,
    ImagePullSecret,
}

// === impl SecretLink ===

impl SecretLink {
    pub fn reference(name: impl ToString) -> Self {
        Self {
            service_account: ServiceAccountLink {
                target: ServiceAccountTarget::Reference(LocalObjectReference {
                    name: name.to_string(),
                }),
                link_type: ServiceAccountLinkType::default(),
            },
        }
    }

    pub fn managed(spec: ManagedServiceAccountSpec) -> Self {
        Self {
            service_account: ServiceAccountLink {
                target: ServiceAccountTarget::Managed(spec),
                link_type: ServiceAccountLinkType::default(),
            },
        }
    }

    pub fn with_link_type(mut self, link_type: ServiceAccountLinkType) -> Self {
        self.service_account.link_type = link_type;
        self
    }
}

// === impl ManagedServiceAccountSpec ===

impl ManagedServiceAccountSpec {
    pub fn named(name: impl ToString) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    pub fn generated(prefix: impl ToString) -> Self {
        Self {
            generate_name: Some(prefix.to_string()),
            ..Default::default()
        }
    }

    /// An explicit name takes precedence over a generated one. Empty values
    /// are treated as unset.
    pub fn naming(&self) -> Option<ManagedName<'_>> {
        fn non_empty(s: &Option<String>) -> Option<&str> {
            s.as_deref().filter(|s| !s.is_empty())
        }

        non_empty(&self.name)
            .map(ManagedName::Explicit)
            .or_else(|| non_empty(&self.generate_name).map(ManagedName::Generated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreemap;

    #[test]
    fn deserialize_links() {
        let spec = serde_yaml::from_str::<LinkableSecretSpec>(
            r#"
linkedTo:
  - serviceAccount:
      reference:
        name: builder
  - serviceAccount:
      as: imagePullSecret
      managed:
        generateName: puller-
        labels:
          team: a
  - serviceAccount:
      as: ""
      managed:
        name: deployer
"#,
        )
        .expect("spec must parse");

        assert_eq!(
            spec.linked_to,
            vec![
                SecretLink::reference("builder"),
                SecretLink::managed(ManagedServiceAccountSpec {
                    labels: btreemap! { "team".to_string() => "a".to_string() },
                    ..ManagedServiceAccountSpec::generated("puller-")
                })
                .with_link_type(ServiceAccountLinkType::ImagePullSecret),
                SecretLink::managed(ManagedServiceAccountSpec::named("deployer")),
            ]
        );
    }

    #[test]
    fn serialize_link() {
        let link = SecretLink::reference("sa").with_link_type(ServiceAccountLinkType::ImagePullSecret);
        assert_eq!(
            serde_json::to_value(&link).unwrap(),
            serde_json::json!({
                "serviceAccount": {
                    "reference": { "name": "sa" },
                    "as": "imagePullSecret",
                }
            })
        );
    }

    #[test]
    fn empty_spec() {
        let spec = serde_json::from_str::<LinkableSecretSpec>("{}").unwrap();
        assert!(spec.linked_to.is_empty());
    }

    #[test]
    fn naming() {
        assert_eq!(
            ManagedServiceAccountSpec::named("sa").naming(),
            Some(ManagedName::Explicit("sa"))
        );
        assert_eq!(
            ManagedServiceAccountSpec::generated("sa-").naming(),
            Some(ManagedName::Generated("sa-"))
        );
        assert_eq!(
            ManagedServiceAccountSpec {
                name: Some(String::new()),
                generate_name: Some("sa-".to_string()),
                ..Default::default()
            }
            .naming(),
            Some(ManagedName::Generated("sa-"))
        );
        assert_eq!(ManagedServiceAccountSpec::default().naming(), None);
    }
}

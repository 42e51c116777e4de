#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod binding;
mod object_key;

pub use self::{
    binding::{
        LinkableSecretSpec, ManagedName, ManagedServiceAccountSpec, SecretLink,
        ServiceAccountLink, ServiceAccountLinkType, ServiceAccountTarget,
    },
    object_key::{InvalidObjectKey, ObjectKey},
};
pub use k8s_openapi::{
    api::core::v1::{LocalObjectReference, ObjectReference, Secret, ServiceAccount},
    ByteString,
};
pub use kube::{
    api::{Api, ListParams, ObjectMeta, PostParams, ResourceExt},
    Client, Error,
};

/// A map of label or annotation keys to values.
pub type Map = std::collections::BTreeMap<String, String>;

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod api_client;
mod error;
mod handler;
mod link;
pub mod marker;
mod memory;

#[cfg(test)]
mod tests;

pub use self::{
    api_client::KubeServiceAccounts,
    error::{Error, SyncError},
    handler::{LinkFailure, LinkWarning, ServiceAccountHandler, SyncOutcome, Warning},
    link::unlink,
    marker::AnnotationMarker,
    memory::MemoryServiceAccounts,
};

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod client;
pub mod comma_separated;
pub mod comparator;
mod marker;
mod target;

pub use self::{
    client::{ClientError, ServiceAccountClient},
    comma_separated::CommaSeparated,
    comparator::SecretComparator,
    marker::ObjectMarker,
    target::DeploymentTarget,
};

pub const BINDING_CONTROLLER_NAME: &str = "remote-secret.dev/binding-controller";

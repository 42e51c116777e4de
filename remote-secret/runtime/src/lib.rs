#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use remote_secret_core as core;
pub use remote_secret_k8s_api as k8s;
pub use remote_secret_k8s_bindings as bindings;

mod args;
mod target;

pub use self::{args::Args, target::StaticTarget};

use anyhow::Result;
use remote_secret_k8s_api::{ObjectKey, ObjectMeta};

/// Records who manages or references an object.
///
/// An object is either unmanaged, managed by the claim identified by `key`,
/// or managed by some other claim. Independently, it carries the set of
/// claims that reference it. Implementations may mutate the metadata they are
/// given and report whether they did so.
#[async_trait::async_trait]
pub trait ObjectMarker: Send + Sync {
    async fn mark_managed(&self, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool>;

    async fn unmark_managed(&self, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool>;

    async fn mark_referenced(&self, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool>;

    async fn unmark_referenced(&self, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool>;

    async fn is_managed_by(&self, key: &ObjectKey, obj: &ObjectMeta) -> Result<bool>;

    /// True when the object is managed by a claim other than `key`.
    async fn is_managed_by_other(&self, key: &ObjectKey, obj: &ObjectMeta) -> Result<bool>;

    async fn is_referenced_by(&self, key: &ObjectKey, obj: &ObjectMeta) -> Result<bool>;

    /// A label selector matching every object this marker has marked, if the
    /// marking is visible to label selection.
    fn label_selector(&self) -> Option<&str> {
        None
    }
}

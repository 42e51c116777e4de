//! Records ownership in the labels and annotations of the marked object.

use anyhow::{bail, Result};
use remote_secret_core::{CommaSeparated, ObjectMarker};
use remote_secret_k8s_api::{Map, ObjectKey, ObjectMeta};

/// Holds the key of the claim that manages the object.
pub const MANAGED_BY_ANNOTATION: &str = "remote-secret.dev/managed-by";

/// Holds the comma-separated keys of all claims referencing the object.
pub const LINKED_BY_ANNOTATION: &str = "remote-secret.dev/linked-by";

pub const MANAGED_LABEL: &str = "remote-secret.dev/managed";
pub const LINKED_LABEL: &str = "remote-secret.dev/linked";

const LINKED_SELECTOR: &str = "remote-secret.dev/linked=true";

/// Marks objects through annotations holding claim keys, plus labels so marked
/// objects can be selected.
///
/// A managed object is always referenced by its manager as well.
#[derive(Clone, Debug, Default)]
pub struct AnnotationMarker(());

#[async_trait::async_trait]
impl ObjectMarker for AnnotationMarker {
    async fn mark_managed(&self, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool> {
        let claim = key.to_string();
        if let Some(manager) = managed_by(obj) {
            if manager != claim {
                bail!("object is already managed by {manager}");
            }
        }

        let mut changed = insert(&mut obj.annotations, MANAGED_BY_ANNOTATION, &claim);
        changed |= insert(&mut obj.labels, MANAGED_LABEL, "true");
        changed |= self.mark_referenced(key, obj).await?;
        Ok(changed)
    }

    async fn unmark_managed(&self, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool> {
        if managed_by(obj) != Some(key.to_string().as_str()) {
            return Ok(false);
        }
        remove(&mut obj.annotations, MANAGED_BY_ANNOTATION);
        remove(&mut obj.labels, MANAGED_LABEL);
        Ok(true)
    }

    async fn mark_referenced(&self, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool> {
        let mut claims = linked_by(obj);
        let mut changed = claims.add(&key.to_string());
        if changed {
            insert(&mut obj.annotations, LINKED_BY_ANNOTATION, &claims.to_string());
        }
        changed |= insert(&mut obj.labels, LINKED_LABEL, "true");
        Ok(changed)
    }

    async fn unmark_referenced(&self, key: &ObjectKey, obj: &mut ObjectMeta) -> Result<bool> {
        let mut claims = linked_by(obj);
        if !claims.remove(&key.to_string()) {
            return Ok(false);
        }
        if claims.is_empty() {
            remove(&mut obj.annotations, LINKED_BY_ANNOTATION);
            remove(&mut obj.labels, LINKED_LABEL);
        } else {
            insert(&mut obj.annotations, LINKED_BY_ANNOTATION, &claims.to_string());
        }
        Ok(true)
    }

    async fn is_managed_by(&self, key: &ObjectKey, obj: &ObjectMeta) -> Result<bool> {
        Ok(managed_by(obj) == Some(key.to_string().as_str()))
    }

    async fn is_managed_by_other(&self, key: &ObjectKey, obj: &ObjectMeta) -> Result<bool> {
        Ok(managed_by(obj).is_some_and(|manager| manager != key.to_string()))
    }

    async fn is_referenced_by(&self, key: &ObjectKey, obj: &ObjectMeta) -> Result<bool> {
        Ok(linked_by(obj).contains(&key.to_string()))
    }

    fn label_selector(&self) -> Option<&str> {
        Some(LINKED_SELECTOR)
    }
}

fn managed_by(obj: &ObjectMeta) -> Option<&str> {
    obj.annotations
        .as_ref()?
        .get(MANAGED_BY_ANNOTATION)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

fn linked_by(obj: &ObjectMeta) -> CommaSeparated {
    obj.annotations
        .as_ref()
        .and_then(|a| a.get(LINKED_BY_ANNOTATION))
        .map(|v| CommaSeparated::parse(v))
        .unwrap_or_default()
}

fn insert(map: &mut Option<Map>, key: &str, value: &str) -> bool {
    let map = map.get_or_insert_with(Map::new);
    if map.get(key).map(String::as_str) == Some(value) {
        return false;
    }
    map.insert(key.to_string(), value.to_string());
    true
}

/// Removes the key, unsetting the map once it is empty.
fn remove(map: &mut Option<Map>, key: &str) {
    if let Some(m) = map.as_mut() {
        m.remove(key);
        if m.is_empty() {
            *map = None;
        }
    }
}

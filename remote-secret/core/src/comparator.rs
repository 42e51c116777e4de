//! Compares secrets while ignoring the fields the control plane fills in.

use remote_secret_k8s_api::Secret;

/// Data keys the control plane injects into service account token secrets.
pub const SERVICE_ACCOUNT_TOKEN_DATA_KEYS: &[&str] = &["ca.crt", "namespace", "token"];

#[derive(Copy, Clone, Debug)]
pub struct SecretComparator {
    ignored_data_keys: &'static [&'static str],
}

impl SecretComparator {
    pub const fn ignoring_data_keys(ignored_data_keys: &'static [&'static str]) -> Self {
        Self { ignored_data_keys }
    }

    /// Compares service account token secrets.
    pub const fn service_account_token() -> Self {
        Self::ignoring_data_keys(SERVICE_ACCOUNT_TOKEN_DATA_KEYS)
    }

    /// Every field except the ignored data keys is significant.
    pub fn equal(&self, a: &Secret, b: &Secret) -> bool {
        self.significant(a) == self.significant(b)
    }

    fn significant(&self, secret: &Secret) -> Secret {
        let mut secret = secret.clone();
        if let Some(data) = secret.data.as_mut() {
            data.retain(|k, _| !self.ignored_data_keys.contains(&k.as_str()));
            if data.is_empty() {
                secret.data = None;
            }
        }
        secret
    }
}

impl Default for SecretComparator {
    fn default() -> Self {
        Self::service_account_token()
    }
}

use crate::{
    bindings::{AnnotationMarker, KubeServiceAccounts, ServiceAccountHandler, SyncError, SyncOutcome},
    k8s::{self, LinkableSecretSpec, ObjectKey},
    StaticTarget,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[clap(
    name = "remote-secret",
    about = "Links a secret to the service accounts declared by a binding spec"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "remote_secret=info,warn",
        env = "REMOTE_SECRET_LOG_LEVEL"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain", env = "REMOTE_SECRET_LOG_FORMAT")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    /// Namespace holding the service accounts and the secret
    #[clap(long, short = 'n', env = "REMOTE_SECRET_NAMESPACE")]
    namespace: String,

    /// The object requesting the binding, as `<namespace>/<name>`
    #[clap(long)]
    claim: ObjectKey,

    /// YAML file holding the binding spec (`linkedTo: [...]`)
    #[clap(long, required_unless_present = "detach")]
    spec: Option<PathBuf>,

    /// Secret to link to the synchronized service accounts
    #[clap(long)]
    secret: Option<String>,

    /// Instead of syncing, unlink the secret from every service account the
    /// claim links to and release them
    #[clap(long, requires = "secret")]
    detach: bool,

    /// Service accounts synchronized by a previous run, used to find
    /// generated service accounts again
    #[clap(long, value_delimiter = ',')]
    known_service_accounts: Vec<String>,

    #[clap(long, default_value = "5000")]
    request_timeout_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            log_level,
            log_format,
            client,
            namespace,
            claim,
            spec,
            secret,
            detach,
            known_service_accounts,
            request_timeout_ms,
        } = self;

        log_format
            .try_init(log_level)
            .expect("must configure logging");

        let client = client.try_client().await?;
        let spec = match spec.as_deref() {
            Some(path) => load_spec(path)?,
            None => LinkableSecretSpec::default(),
        };

        let secret = match secret {
            Some(name) => Some(
                k8s::Api::<k8s::Secret>::namespaced(client.clone(), &namespace)
                    .get(&name)
                    .await
                    .with_context(|| format!("failed to get secret {namespace}/{name}"))?,
            ),
            None => None,
        };

        let timeout = Duration::from_millis(request_timeout_ms);
        let handler = ServiceAccountHandler::new(
            StaticTarget::new(
                KubeServiceAccounts::new(client, timeout),
                namespace,
                claim,
                spec,
                known_service_accounts,
            ),
            AnnotationMarker::default(),
        );

        if detach {
            let Some(secret) = secret else {
                bail!("--detach requires --secret");
            };
            let detached = handler.detach(&secret).await?;
            info!(service_accounts = ?names(&detached), "Detached");
            return Ok(());
        }

        let outcome = match handler.sync().await {
            Ok(outcome) => outcome,
            Err(SyncError { outcome, error }) => {
                report(&outcome);
                return Err(error.into());
            }
        };
        report(&outcome);

        let SyncOutcome {
            mut service_accounts,
            failures,
            ..
        } = outcome;
        if let Some(secret) = secret {
            handler
                .link_to_secret(&mut service_accounts, &secret)
                .await?;
            info!(
                secret = ?secret.metadata.name,
                service_accounts = ?names(&service_accounts),
                "Linked"
            );
        }

        if !failures.is_empty() {
            bail!("{} service account links failed", failures.len());
        }
        Ok(())
    }
}

fn load_spec(path: &Path) -> Result<LinkableSecretSpec> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    serde_yaml::from_reader(file).with_context(|| format!("failed to parse {}", path.display()))
}

fn report(outcome: &SyncOutcome) {
    for w in &outcome.warnings {
        warn!(link = w.link, warning = %w.warning);
    }
    for f in &outcome.failures {
        error!(link = f.link, error = %f.error);
    }
    info!(service_accounts = ?names(&outcome.service_accounts), "Synchronized");
}

fn names(service_accounts: &[k8s::ServiceAccount]) -> Vec<&str> {
    service_accounts
        .iter()
        .filter_map(|sa| sa.metadata.name.as_deref())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::k8s::SecretLink;
    use std::io::Write;

    #[test]
    fn parses_args() {
        let args = Args::try_parse_from([
            "remote-secret",
            "-n",
            "default",
            "--claim",
            "default/my-secret",
            "--spec",
            "binding.yaml",
            "--known-service-accounts",
            "a,b",
        ])
        .expect("args must parse");
        assert_eq!(args.claim, ObjectKey::new("default", "my-secret"));
        assert_eq!(args.known_service_accounts, vec!["a", "b"]);
        assert_eq!(args.request_timeout_ms, 5000);
        assert!(!args.detach);
    }

    #[test]
    fn rejects_invalid_args() {
        // The claim must be namespaced.
        assert!(Args::try_parse_from([
            "remote-secret",
            "-n",
            "default",
            "--claim",
            "my-secret",
            "--spec",
            "binding.yaml",
        ])
        .is_err());

        // Detaching needs a secret.
        assert!(Args::try_parse_from([
            "remote-secret",
            "-n",
            "default",
            "--claim",
            "default/my-secret",
            "--detach",
        ])
        .is_err());

        // Syncing needs a spec.
        assert!(Args::try_parse_from([
            "remote-secret",
            "-n",
            "default",
            "--claim",
            "default/my-secret",
        ])
        .is_err());
    }

    #[test]
    fn loads_spec() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "linkedTo:\n  - serviceAccount:\n      reference:\n        name: builder"
        )
        .unwrap();

        let spec = load_spec(file.path()).expect("spec must load");
        assert_eq!(spec.linked_to, vec![SecretLink::reference("builder")]);
    }

    #[test]
    fn missing_spec_file() {
        let err = load_spec(Path::new("/nonexistent/binding.yaml")).unwrap_err();
        assert!(err.to_string().contains("failed to open"), "{err}");
    }
}

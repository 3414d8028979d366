//! Proving that a management-cluster credential works
//!
//! A credential is admitted only after a client built from it answers a
//! version query. Clients are built on demand for every call and never
//! cached, so a rotated credential takes effect on the next request.
//!
//! Credentials must be self-contained: every certificate, key and token is
//! embedded inline. Kubeconfig features that read files on this host or run
//! commands (`exec`, `auth-provider`, `tokenFile`, `client-certificate`,
//! `client-key`, `certificate-authority`) are refused before a client is
//! built.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::debug;

use crate::backend::{KubeManagementClient, ManagementClient};
use crate::error::{Error, Result};
use crate::model::Credential;

#[async_trait]
pub trait ConnectivityValidator: Send + Sync {
    /// Parse `credential` and probe the cluster it points at.
    ///
    /// InvalidArgument when the credential cannot be parsed,
    /// BackendUnavailable when the probe fails or times out.
    async fn validate(&self, credential: &Credential) -> Result<()>;

    /// Build a client without probing.
    ///
    /// Stored credentials already passed `validate`, so failing to turn one
    /// into a client is an Internal error.
    async fn materialize(&self, credential: &Credential) -> Result<Arc<dyn ManagementClient>>;
}

/// Validator for kubeconfig credentials
pub struct KubeconfigValidator {
    namespace: String,
    timeout: Duration,
}

impl KubeconfigValidator {
    /// `namespace` is where materialized clients manage tenant control planes.
    pub fn new(namespace: &str, timeout: Duration) -> Self {
        Self {
            namespace: namespace.to_string(),
            timeout,
        }
    }

    async fn client(&self, credential: &Credential) -> Result<KubeManagementClient> {
        let kubeconfig = Kubeconfig::from_yaml(credential.expose())
            .map_err(|_| Error::invalid("credential is not a valid kubeconfig"))?;
        ensure_self_contained(&kubeconfig)?;
        let mut config =
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .map_err(|_| Error::invalid("credential is not a usable kubeconfig"))?;
        config.connect_timeout = Some(self.timeout);
        config.read_timeout = Some(self.timeout);

        let client = Client::try_from(config)
            .map_err(|_| Error::invalid("credential does not yield a usable client"))?;
        Ok(KubeManagementClient::new(
            client,
            &self.namespace,
            self.timeout,
        ))
    }
}

/// Refuse kubeconfigs that reference local files or external commands.
pub(crate) fn ensure_self_contained(kubeconfig: &Kubeconfig) -> Result<()> {
    for named in &kubeconfig.clusters {
        let Some(cluster) = &named.cluster else {
            continue;
        };
        if cluster.certificate_authority.is_some() {
            return Err(host_reference("cluster", &named.name, "certificate-authority"));
        }
    }

    for named in &kubeconfig.auth_infos {
        let Some(user) = &named.auth_info else {
            continue;
        };
        let references = [
            ("exec", user.exec.is_some()),
            ("auth-provider", user.auth_provider.is_some()),
            ("tokenFile", user.token_file.is_some()),
            ("client-certificate", user.client_certificate.is_some()),
            ("client-key", user.client_key.is_some()),
        ];
        if let Some((field, _)) = references.iter().find(|(_, set)| *set) {
            return Err(host_reference("user", &named.name, field));
        }
    }
    Ok(())
}

fn host_reference(entry: &str, name: &str, field: &str) -> Error {
    Error::invalid(format!(
        "kubeconfig {} {} sets {}; only inline credentials are accepted",
        entry, name, field
    ))
}

#[async_trait]
impl ConnectivityValidator for KubeconfigValidator {
    async fn validate(&self, credential: &Credential) -> Result<()> {
        let client = self.client(credential).await?;
        let version = client.server_version().await?;
        debug!(version = %version, "Credential passed connectivity check");
        Ok(())
    }

    async fn materialize(&self, credential: &Credential) -> Result<Arc<dyn ManagementClient>> {
        match self.client(credential).await {
            Ok(client) => Ok(Arc::new(client)),
            Err(e) => Err(Error::Internal(format!(
                "stored credential cannot be turned into a client: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn kubeconfig(server: &str, cluster_fields: &str, user_fields: &str) -> Credential {
        Credential::new(format!(
            r#"apiVersion: v1
kind: Config
clusters:
- name: mgmt
  cluster:
    server: {server}
{cluster_fields}contexts:
- name: mgmt
  context:
    cluster: mgmt
    user: operator
current-context: mgmt
users:
- name: operator
  user:
{user_fields}"#
        ))
    }

    fn kubeconfig_for(server: &str) -> Credential {
        kubeconfig(server, "", "    token: not-a-real-token\n")
    }

    fn exec_user(marker: &std::path::Path) -> String {
        format!(
            concat!(
                "    exec:\n",
                "      apiVersion: client.authentication.k8s.io/v1beta1\n",
                "      command: sh\n",
                "      args: [\"-c\", \"touch {}\"]\n",
            ),
            marker.display()
        )
    }

    fn version_body() -> serde_json::Value {
        serde_json::json!({
            "major": "1",
            "minor": "30",
            "gitVersion": "v1.30.2",
            "gitCommit": "39683505b630ff2121012f3c5b16215a1449d5ed",
            "gitTreeState": "clean",
            "buildDate": "2024-06-11T20:21:00Z",
            "goVersion": "go1.22.4",
            "compiler": "gc",
            "platform": "linux/amd64"
        })
    }

    fn validator(timeout: Duration) -> KubeconfigValidator {
        KubeconfigValidator::new("default", timeout)
    }

    #[tokio::test]
    async fn test_reachable_cluster_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_body()))
            .expect(1)
            .mount(&server)
            .await;

        let result = validator(Duration::from_secs(5))
            .validate(&kubeconfig_for(&server.uri()))
            .await;
        assert!(result.is_ok(), "{:?}", result);
    }

    #[tokio::test]
    async fn test_failing_probe_is_backend_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = validator(Duration::from_secs(5))
            .validate(&kubeconfig_for(&server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[tokio::test]
    async fn test_slow_probe_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(version_body())
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = validator(Duration::from_millis(200))
            .validate(&kubeconfig_for(&server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[tokio::test]
    async fn test_refused_connection_is_backend_unavailable() {
        let err = validator(Duration::from_secs(2))
            .validate(&kubeconfig_for("http://127.0.0.1:1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    }

    #[tokio::test]
    async fn test_garbage_credential_is_invalid_and_not_echoed() {
        let secret = "definitely not yaml: [token s3cr3t";
        let err = validator(Duration::from_secs(1))
            .validate(&Credential::new(secret))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(!err.to_string().contains("s3cr3t"));
    }

    #[tokio::test]
    async fn test_materialize_does_not_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_body()))
            .expect(0)
            .mount(&server)
            .await;

        let v = validator(Duration::from_secs(1));
        assert!(v.materialize(&kubeconfig_for(&server.uri())).await.is_ok());

        let err = v
            .materialize(&Credential::new("not a kubeconfig"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn test_host_references_are_refused() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_body()))
            .expect(0)
            .mount(&server)
            .await;

        let cases = [
            (
                "    certificate-authority: /etc/fleetplane/ca.crt\n",
                "    token: not-a-real-token\n",
                "certificate-authority",
            ),
            (
                "",
                "    auth-provider:\n      name: gcp\n      config:\n        cmd-path: /bin/sh\n",
                "auth-provider",
            ),
            (
                "",
                "    tokenFile: /var/run/secrets/kubernetes.io/serviceaccount/token\n",
                "tokenFile",
            ),
            (
                "",
                "    client-certificate: /etc/fleetplane/tls.crt\n",
                "client-certificate",
            ),
            ("", "    client-key: /etc/fleetplane/tls.key\n", "client-key"),
        ];

        let v = validator(Duration::from_secs(1));
        for (cluster_fields, user_fields, field) in cases {
            let credential = kubeconfig(&server.uri(), cluster_fields, user_fields);
            let err = v.validate(&credential).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{}", field);
            assert!(err.to_string().contains(field), "{}", err);
            assert!(!err.to_string().contains("/etc/fleetplane"));
        }
    }

    #[tokio::test]
    async fn test_exec_plugin_is_refused_without_running() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(version_body()))
            .expect(0)
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("exec-ran");
        let credential = kubeconfig(&server.uri(), "", &exec_user(&marker));

        let v = validator(Duration::from_secs(1));
        let err = v.validate(&credential).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("exec"));

        let err = v.materialize(&credential).await.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!marker.exists());
    }

    #[test]
    fn test_inline_client_certificate_is_accepted() {
        let user = "    client-certificate-data: Y2VydA==\n    client-key-data: a2V5\n";
        let credential = kubeconfig("https://10.0.0.1:6443", "", user);
        let parsed = Kubeconfig::from_yaml(credential.expose()).unwrap();
        assert!(ensure_self_contained(&parsed).is_ok());
    }
}

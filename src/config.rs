//! Process configuration
//!
//! Every field has a default, so an empty (or absent) TOML file is a valid
//! configuration. The binary overlays CLI flags and environment variables on
//! top of whatever the file provides.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backend::DEFAULT_BACKEND_TIMEOUT;
use crate::error::{Error, Result};
use crate::version::{KubeVersion, DEFAULT_MIN_CONTROL_PLANE_VERSION};

/// Where management-cluster registrations are kept
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// One Secret per registration
    #[default]
    Secret,
    /// One ClusterRegistration custom resource per registration
    Resource,
    /// Process memory, lost on restart
    Memory,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionerBackend {
    #[default]
    Kamaji,
    Noop,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    pub listen_addr: SocketAddr,
    /// Namespace holding registrations (Secret and resource stores)
    pub registration_namespace: String,
    /// Namespace of `TenantControlPlane` resources inside management clusters
    pub tenant_namespace: String,
    pub backend_timeout_secs: u64,
    pub min_control_plane_version: String,
    pub store: StoreBackend,
    pub provisioner: ProvisionerBackend,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            registration_namespace: "fleetplane-system".to_string(),
            tenant_namespace: "default".to_string(),
            backend_timeout_secs: DEFAULT_BACKEND_TIMEOUT.as_secs(),
            min_control_plane_version: DEFAULT_MIN_CONTROL_PLANE_VERSION.to_string(),
            store: StoreBackend::default(),
            provisioner: ProvisionerBackend::default(),
        }
    }
}

impl FleetConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: FleetConfig = toml::from_str(raw)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend_timeout_secs == 0 {
            return Err(Error::ConfigError(
                "backend_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.registration_namespace.is_empty() || self.tenant_namespace.is_empty() {
            return Err(Error::ConfigError("namespaces must not be empty".to_string()));
        }
        self.min_version()?;
        Ok(())
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    /// Parsed `min_control_plane_version`
    pub fn min_version(&self) -> Result<KubeVersion> {
        self.min_control_plane_version.parse().map_err(|_| {
            Error::ConfigError(format!(
                "min_control_plane_version {:?} is not a version like v1.28.0",
                self.min_control_plane_version
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = FleetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend_timeout(), Duration::from_secs(10));
        assert_eq!(config.min_version().unwrap().to_string(), "v1.28.0");
        assert_eq!(config.store, StoreBackend::Secret);
        assert_eq!(config.provisioner, ProvisionerBackend::Kamaji);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
listen_addr = "127.0.0.1:9090"
store = "memory"
backend_timeout_secs = 3
"#
        )
        .unwrap();

        let config = FleetConfig::from_file(file.path()).unwrap();
        assert_eq!(config.listen_addr.port(), 9090);
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.backend_timeout(), Duration::from_secs(3));
        assert_eq!(config.tenant_namespace, "default");
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = FleetConfig::from_toml("backend_timeout_secs = 0").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        let err = FleetConfig::from_toml(r#"min_control_plane_version = "1.28""#).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        let err = FleetConfig::from_toml(r#"store = "etcd""#).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FleetConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}

//! Domain types shared by the registrar, the provisioner and the API layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::version::{ensure_supported, KubeVersion};

/// Phase reported for a tenant cluster before the backend publishes status
pub const PHASE_PENDING: &str = "Pending";

/// Backend phase meaning the tenant control plane is serving
pub const PHASE_READY: &str = "Ready";

/// Region label on every object fleetplane writes
pub const REGION_LABEL: &str = "fleetplane.io/region";

/// Opaque management-cluster credential (a serialized kubeconfig).
///
/// The content is never printed by `Debug` and never put into error
/// messages.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(raw: impl Into<String>) -> Self {
        Credential(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// A registered management cluster
#[derive(Clone, Debug, PartialEq)]
pub struct ManagementCluster {
    pub id: String,
    pub name: String,
    pub region: String,
    pub credential: Credential,
    pub created_at: Option<DateTime<Utc>>,
}

/// Registration request for a management cluster
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct NewManagementCluster {
    pub name: String,
    pub region: String,
    pub credential: Credential,
}

impl NewManagementCluster {
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            credential: Credential::new(credential),
        }
    }

    /// Reject empty fields and regions that cannot be used as label values.
    pub fn validate(&self) -> Result<()> {
        if self.credential.is_empty() {
            return Err(Error::invalid("kubeconfig field must be non empty"));
        }
        if self.name.trim().is_empty() {
            return Err(Error::invalid("name field is required"));
        }
        if self.region.trim().is_empty() {
            return Err(Error::invalid("region field is required"));
        }
        validate_label_value("region", &self.region)
    }
}

/// Kubernetes label values: at most 63 characters, alphanumerics plus
/// `-`, `_` and `.`, beginning and ending with an alphanumeric.
pub fn validate_label_value(field: &str, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let valid = !bytes.is_empty()
        && bytes.len() <= 63
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if valid {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "{} field must be at most 63 alphanumeric characters, '-', '_' or '.'",
            field
        )))
    }
}

/// Request to create a tenant cluster
///
/// Missing fields deserialize as empty and are reported by `validate`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TenantClusterSpec {
    /// Must be absent: ids are assigned by the provisioner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub region: String,
    pub version: String,
    /// Only meaningful when importing an existing cluster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
}

impl TenantClusterSpec {
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            region: region.into(),
            version: version.into(),
            kubeconfig: None,
        }
    }

    /// Field checks shared by every provisioning mode.
    pub fn validate(&self, min_version: &KubeVersion) -> Result<()> {
        if self.id.is_some() {
            return Err(Error::invalid("id field is not allowed"));
        }
        if self.region.is_empty() {
            return Err(Error::invalid("region field is required"));
        }
        if self.name.is_empty() {
            return Err(Error::invalid("name field is required"));
        }
        if self.version.is_empty() {
            return Err(Error::invalid("version field is required"));
        }
        ensure_supported(&self.version, min_version)?;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantClusterStatus {
    pub phase: String,
    pub online: bool,
}

impl TenantClusterStatus {
    pub fn pending() -> Self {
        Self::from_phase(PHASE_PENDING)
    }

    /// `online` is derived from the phase, never stored separately.
    pub fn from_phase(phase: impl Into<String>) -> Self {
        let phase = phase.into();
        let online = phase == PHASE_READY;
        Self { phase, online }
    }
}

/// A tenant control plane as seen through its backend resource
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantCluster {
    pub id: String,
    /// Not retained by the Kamaji backend, so only known on create
    pub name: Option<String>,
    pub region: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<String>,
    pub status: TenantClusterStatus,
}

/// Result of a list operation that tolerates per-item failures
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ClusterList {
    pub clusters: Vec<TenantCluster>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ClusterList {
    pub fn merge(&mut self, other: ClusterList) {
        self.clusters.extend(other.clusters);
        self.warnings.extend(other.warnings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::version::DEFAULT_MIN_CONTROL_PLANE_VERSION;

    fn floor() -> KubeVersion {
        DEFAULT_MIN_CONTROL_PLANE_VERSION.parse().unwrap()
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let cred = Credential::new("apiVersion: v1\nusers: [token: s3cr3t]");
        let printed = format!("{:?}", cred);
        assert!(!printed.contains("s3cr3t"));

        let record = NewManagementCluster::new("mc", "eu-west", "token: s3cr3t");
        assert!(!format!("{:?}", record).contains("s3cr3t"));
    }

    #[test]
    fn test_registration_requires_fields() {
        let cases = [
            NewManagementCluster::new("mc", "eu-west", ""),
            NewManagementCluster::new("", "eu-west", "kubeconfig"),
            NewManagementCluster::new("mc", "", "kubeconfig"),
            NewManagementCluster::new("mc", "eu west", "kubeconfig"),
            NewManagementCluster::new("mc", "-eu-west", "kubeconfig"),
        ];
        for case in cases {
            let err = case.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{:?}", case);
        }
        assert!(NewManagementCluster::new("mc", "eu-west.1", "kubeconfig")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_label_value_length_limit() {
        assert!(validate_label_value("region", &"a".repeat(63)).is_ok());
        assert!(validate_label_value("region", &"a".repeat(64)).is_err());
    }

    #[test]
    fn test_tenant_spec_validation() {
        assert!(TenantClusterSpec::new("demo", "eu-west", "v1.30.0")
            .validate(&floor())
            .is_ok());

        let mut with_id = TenantClusterSpec::new("demo", "eu-west", "v1.30.0");
        with_id.id = Some("tcp-abc".into());
        assert_eq!(
            with_id.validate(&floor()).unwrap_err().to_string(),
            "id field is not allowed"
        );

        let err = TenantClusterSpec::new("demo", "eu-west", "v1.20.0")
            .validate(&floor())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = TenantClusterSpec::new("demo", "eu-west", "latest")
            .validate(&floor())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = TenantClusterSpec::new("", "eu-west", "v1.30.0")
            .validate(&floor())
            .unwrap_err();
        assert_eq!(err.to_string(), "name field is required");
    }

    #[test]
    fn test_status_online_follows_phase() {
        assert!(!TenantClusterStatus::pending().online);
        assert!(TenantClusterStatus::from_phase("Ready").online);
        assert!(!TenantClusterStatus::from_phase("Provisioning").online);
        assert!(!TenantClusterStatus::from_phase("ready").online);
    }

    #[test]
    fn test_spec_deserializes_camel_case() {
        let spec: TenantClusterSpec = serde_json::from_value(serde_json::json!({
            "name": "demo",
            "region": "eu-west",
            "version": "v1.30.0"
        }))
        .unwrap();
        assert_eq!(spec.id, None);
        assert_eq!(spec.kubeconfig, None);
    }
}

//! ClusterRegistration Custom Resource Definition
//!
//! Holds one management-cluster registration when the custom-resource
//! backed credential store is selected. The object name is `mc-<id>`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "fleetplane.io",
    version = "v1alpha1",
    kind = "ClusterRegistration",
    namespaced,
    shortname = "creg",
    printcolumn = r#"{"name":"Display Name","type":"string","jsonPath":".spec.displayName"}"#,
    printcolumn = r#"{"name":"Region","type":"string","jsonPath":".spec.region"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRegistrationSpec {
    /// Operator-chosen label for the management cluster
    pub display_name: String,

    /// Region served by the management cluster, unique across registrations
    pub region: String,

    /// Serialized kubeconfig used to reach the management cluster
    pub kubeconfig: String,
}

//! Place all spec types into a single module so they can be used as a lightweight dependency
use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::ResourceRequirements, apimachinery::pkg::apis::meta::v1::Condition,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CRD defining the desired state of the rsyslog sidecar daemon.
#[derive(CustomResource, Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "octavia.openstack.org",
    version = "v1beta1",
    kind = "OctaviaRsyslog",
    plural = "octaviarsyslogs",
    status = "OctaviaRsyslogStatus",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct OctaviaRsyslogSpec {
    /// Rsyslog container image URL.
    pub container_image: String,
    /// Container image running one-time network setup before the sidecars
    /// start.
    pub init_container_image: String,
    /// Service account used to run the daemon pods.
    pub service_account: String,
    /// NodeSelector to target a subset of worker nodes running this daemon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
    /// Compute resources required by this daemon.
    #[serde(default)]
    pub resources: ResourceRequirements,
    /// NetworkAttachment resource names exposing the daemon to given networks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_attachments: Vec<String>,
}

/// Current status of the rsyslog daemon.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OctaviaRsyslogStatus {
    /// Number of nodes running a ready rsyslog pod.
    #[serde(default)]
    pub ready_count: i32,
    /// Map of named content hashes used to detect drift.
    #[serde(default)]
    pub hash: BTreeMap<String, String>,
    /// Conditions describing the observed state.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// NetworkAttachment status of the daemon pods.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub network_attachments: BTreeMap<String, Vec<String>>,
}

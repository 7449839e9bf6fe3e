//! Place all spec types into a single module so they can be used as a lightweight dependency
use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::ResourceRequirements, apimachinery::pkg::apis::meta::v1::Condition,
};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tls::{Endpoint, TlsSpec};

/// Hash key tracking the database sync job.
pub const DB_SYNC_HASH: &str = "dbsync";

/// Hash key used to detect deployment changes.
pub const DEPLOYMENT_HASH: &str = "deployment";

/// Condition type reported when a workload is ready.
pub const READY_CONDITION: &str = "Ready";

/// Primary CRD for creating and managing the Octavia service.
#[derive(CustomResource, Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "octavia.openstack.org",
    version = "v1beta1",
    kind = "Octavia",
    plural = "octavias",
    status = "OctaviaStatus",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct OctaviaSpec {
    /// Container image running the Apache server that serves amphora images.
    pub apache_container_image: String,
    /// Container image holding the amphora disk image to publish.
    pub amphora_image_container_image: String,
    /// Desired state of the Octavia API service.
    #[serde(default)]
    pub octavia_api: OctaviaAPISpec,
    /// Compute resources required by the image upload workload.
    #[serde(default)]
    pub resources: ResourceRequirements,
    /// NodeSelector to target a subset of worker nodes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
}

impl Octavia {
    /// Name of the service account shared by pods of this instance.
    pub fn rbac_resource_name(&self) -> String {
        format!("octavia-{}", self.metadata.name.as_deref().unwrap_or_default())
    }
}

/// Current status of the Octavia service.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OctaviaStatus {
    /// Map of named content hashes used to detect drift.
    #[serde(default)]
    pub hash: BTreeMap<String, String>,
    /// Conditions describing the observed state.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// CRD defining the desired state of the Octavia API service.
#[derive(CustomResource, Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "octavia.openstack.org",
    version = "v1beta1",
    kind = "OctaviaAPI",
    plural = "octaviaapis",
    status = "OctaviaAPIStatus",
    derive = "PartialEq",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct OctaviaAPISpec {
    /// MariaDB instance name used to look up database credentials.
    pub database_instance: String,
    /// Username used for the octavia database.
    #[serde(default = "default_octavia_user")]
    pub database_user: String,
    /// Hostname of the octavia database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_hostname: Option<String>,
    /// Service user name.
    #[serde(default = "default_octavia_user")]
    pub service_user: String,
    /// Service account used to run Octavia pods.
    pub service_account: String,
    /// Octavia API container image URL.
    pub container_image: String,
    /// Replicas of the octavia API to run.
    #[serde(default = "default_replicas")]
    #[schemars(range(min = 0, max = 32))]
    pub replicas: Option<i32>,
    /// Secret containing the octavia database and service passwords.
    pub secret: String,
    /// Selectors to identify the passwords within the secret.
    #[serde(default)]
    pub password_selectors: PasswordSelector,
    /// NodeSelector to target a subset of worker nodes running this service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
    /// Do not delete jobs after they finished, e.g. to check logs.
    #[serde(default)]
    pub preserve_jobs: bool,
    /// Customize the service config. The content gets added to
    /// /etc/octavia/octavia.conf.d as custom.conf.
    #[serde(default = "default_custom_service_config")]
    pub custom_service_config: String,
    /// Overwrite rendered config files, or add additional files to the
    /// service config directory.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub default_config_overwrite: BTreeMap<String, String>,
    /// Secret containing the RabbitMQ transport URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_url_secret: Option<String>,
    /// Compute resources required by this service.
    #[serde(default)]
    pub resources: ResourceRequirements,
    /// Override the generated manifest of several child resources.
    #[serde(default)]
    pub r#override: ApiOverrideSpec,
    /// NetworkAttachment resource names exposing the service to given networks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub network_attachments: Vec<String>,
    /// TLS configuration of the API endpoints and trust bundle.
    #[serde(default)]
    pub tls: TlsSpec,
}

fn default_octavia_user() -> String {
    "octavia".to_owned()
}

fn default_replicas() -> Option<i32> {
    Some(1)
}

fn default_custom_service_config() -> String {
    "# add your customization here".to_owned()
}

/// Selectors to identify the database and service user passwords from a secret.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PasswordSelector {
    /// Field holding the database password.
    pub database: String,
    /// Field holding the service user password.
    pub service: String,
}

impl Default for PasswordSelector {
    fn default() -> Self {
        Self {
            database: "OctaviaDatabasePassword".to_owned(),
            service: "OctaviaPassword".to_owned(),
        }
    }
}

/// Overrides for the generated manifests of child resources.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiOverrideSpec {
    /// Override configuration for the Service created for each endpoint kind.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub service: BTreeMap<Endpoint, ServiceOverrideSpec>,
}

/// Override configuration for a generated Service.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceOverrideSpec {
    /// Additional annotations to set on the Service.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Additional labels to set on the Service.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Current status of the Octavia API service.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OctaviaAPIStatus {
    /// Number of ready octavia API instances.
    #[serde(default)]
    pub ready_count: i32,
    /// Map of named content hashes used to detect drift.
    #[serde(default)]
    pub hash: BTreeMap<String, String>,
    /// Conditions describing the observed state.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Hostname of the octavia database.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_hostname: Option<String>,
    /// NetworkAttachment status of the deployment pods.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub network_attachments: BTreeMap<String, Vec<String>>,
}

impl OctaviaAPI {
    /// Reports whether the service is ready to serve requests.
    pub fn is_ready(&self) -> bool {
        self.status
            .as_ref()
            .map(|status| {
                status
                    .conditions
                    .iter()
                    .any(|condition| condition.type_ == READY_CONDITION && condition.status == "True")
            })
            .unwrap_or(false)
    }
}

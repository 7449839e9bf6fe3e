use std::fmt;

use k8s_openapi::api::core::v1::{SecretVolumeSource, Volume, VolumeMount};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Volume name used for the CA bundle across all services.
pub const CA_BUNDLE_VOLUME: &str = "combined-ca-bundle";

const CA_BUNDLE_MOUNT_PATH: &str = "/etc/pki/ca-trust/extracted/pem";
const CERTS_MOUNT_PATH: &str = "/var/lib/config-data/tls";

/// Errors from resolving TLS endpoint configuration.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The endpoint has TLS enabled but no certificate secret to mount.
    #[error("TLS is enabled for the {0} endpoint but no certificate secret is configured")]
    EndpointSecretMissing(Endpoint),
}

/// The discrete set of endpoint kinds a service terminates TLS for.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Endpoint reachable from inside the cluster only.
    Internal,
    /// Endpoint exposed outside the cluster.
    Public,
}

impl Endpoint {
    /// Returns the endpoint kind name as used in resource names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Internal => "internal",
            Endpoint::Public => "public",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TLS configuration for a service, covering the trust bundle and the
/// per-endpoint certificates.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    /// Secret containing a CA bundle to mount into every container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_bundle_secret_name: Option<String>,
    /// TLS configuration of the API endpoints.
    #[serde(default)]
    pub api: ApiTls,
}

impl TlsSpec {
    /// The CA bundle volume, when a bundle secret is configured.
    pub fn create_ca_volume(&self) -> Option<Volume> {
        self.ca_bundle_secret_name
            .as_ref()
            .map(|secret_name| Volume {
                name: CA_BUNDLE_VOLUME.to_owned(),
                secret: Some(SecretVolumeSource {
                    secret_name: Some(secret_name.to_owned()),
                    default_mode: Some(0o444),
                    ..Default::default()
                }),
                ..Default::default()
            })
    }

    /// Mounts for the CA bundle volume. Empty when no bundle secret is
    /// configured.
    pub fn create_ca_volume_mounts(&self) -> Vec<VolumeMount> {
        if self.ca_bundle_secret_name.is_none() {
            return Vec::new();
        }
        vec![VolumeMount {
            name: CA_BUNDLE_VOLUME.to_owned(),
            mount_path: CA_BUNDLE_MOUNT_PATH.to_owned(),
            read_only: Some(true),
            ..Default::default()
        }]
    }
}

/// Per-endpoint TLS configuration of an API service.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiTls {
    /// TLS configuration of the internal endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal: Option<TlsEndpointSpec>,
    /// TLS configuration of the public endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public: Option<TlsEndpointSpec>,
}

impl ApiTls {
    /// The configuration of the given endpoint, if any.
    pub fn endpoint(&self, endpoint: Endpoint) -> Option<&TlsEndpointSpec> {
        match endpoint {
            Endpoint::Internal => self.internal.as_ref(),
            Endpoint::Public => self.public.as_ref(),
        }
    }

    /// Reports whether TLS is enabled for the given endpoint.
    pub fn enabled(&self, endpoint: Endpoint) -> bool {
        self.endpoint(endpoint).is_some()
    }
}

/// TLS configuration of a single service endpoint.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsEndpointSpec {
    /// Secret holding the endpoint certificate and key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

impl TlsEndpointSpec {
    /// Resolve the endpoint configuration into a mountable TLS service.
    ///
    /// Fails when the certificate secret has not been issued yet, in which
    /// case no manifest can be built for the workload.
    pub fn to_service(&self, endpoint: Endpoint) -> Result<TlsService, Error> {
        match self.secret_name.as_deref() {
            Some(secret_name) if !secret_name.is_empty() => Ok(TlsService {
                secret_name: secret_name.to_owned(),
                endpoint,
            }),
            _ => Err(Error::EndpointSecretMissing(endpoint)),
        }
    }
}

/// Resolved TLS material for one endpoint, ready to mount into containers.
#[derive(Debug, PartialEq, Clone)]
pub struct TlsService {
    secret_name: String,
    endpoint: Endpoint,
}

impl TlsService {
    /// The volume holding the endpoint certificate and key.
    pub fn create_volume(&self) -> Volume {
        Volume {
            name: format!("{}-tls-certs", self.endpoint),
            secret: Some(SecretVolumeSource {
                secret_name: Some(self.secret_name.to_owned()),
                default_mode: Some(0o440),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Mounts for the endpoint certificate volume.
    pub fn create_volume_mounts(&self) -> Vec<VolumeMount> {
        vec![VolumeMount {
            name: format!("{}-tls-certs", self.endpoint),
            mount_path: format!("{CERTS_MOUNT_PATH}/{}", self.endpoint),
            read_only: Some(true),
            ..Default::default()
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_without_secret_does_not_resolve() {
        let spec = TlsEndpointSpec { secret_name: None };
        assert!(matches!(
            spec.to_service(Endpoint::Internal),
            Err(Error::EndpointSecretMissing(Endpoint::Internal))
        ));

        let spec = TlsEndpointSpec {
            secret_name: Some("".to_owned()),
        };
        assert!(spec.to_service(Endpoint::Internal).is_err());
    }

    #[test]
    fn resolved_endpoint_produces_one_volume_and_one_mount() {
        let spec = TlsEndpointSpec {
            secret_name: Some("cert-octavia-internal-svc".to_owned()),
        };
        let svc = spec.to_service(Endpoint::Internal).unwrap();

        let volume = svc.create_volume();
        assert_eq!(volume.name, "internal-tls-certs");
        assert_eq!(
            volume.secret.unwrap().secret_name.as_deref(),
            Some("cert-octavia-internal-svc")
        );

        let mounts = svc.create_volume_mounts();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].mount_path, "/var/lib/config-data/tls/internal");
        assert_eq!(mounts[0].read_only, Some(true));
    }

    #[test]
    fn ca_bundle_volume_tracks_configuration() {
        let tls = TlsSpec::default();
        assert!(tls.create_ca_volume().is_none());
        assert!(tls.create_ca_volume_mounts().is_empty());

        let tls = TlsSpec {
            ca_bundle_secret_name: Some("combined-ca-bundle".to_owned()),
            ..Default::default()
        };
        let volume = tls.create_ca_volume().unwrap();
        assert_eq!(volume.name, CA_BUNDLE_VOLUME);
        assert_eq!(tls.create_ca_volume_mounts().len(), 1);
    }
}

//! Builds the Deployment that fetches the amphora image and serves it over
//! HTTP so amphora instances can be booted from it.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{Deployment, DeploymentSpec},
        core::v1::{
            Container, EmptyDirVolumeSource, EnvVar, PodSpec, PodTemplateSpec, SecretVolumeSource,
            SecurityContext, Volume, VolumeMount,
        },
    },
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube::{core::ObjectMeta, ResourceExt};
use tracing::debug;

use crate::octavia::{Octavia, SERVICE_NAME};
use crate::tls;
use crate::tls::Endpoint;

/// Script run by the image serving container.
pub const SERVICE_COMMAND: &str = "/usr/local/bin/container-scripts/image_upload_run.sh";

const INIT_COMMAND: &str = "/usr/local/bin/container-scripts/image_upload_init.sh";
const SCRIPTS_MOUNT_PATH: &str = "/usr/local/bin/container-scripts";
const IMAGE_MOUNT_PATH: &str = "/www";
const IMAGE_VOLUME: &str = "amphora-image";
const MERGED_CONFIG_VOLUME: &str = "config-data-merged";

fn get_volumes(name: &str) -> Vec<Volume> {
    let scripts_volume_default_mode = 0o755;
    let config_access_mode = 0o644;

    vec![
        Volume {
            name: IMAGE_VOLUME.to_owned(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
        Volume {
            name: format!("{name}-scripts"),
            secret: Some(SecretVolumeSource {
                default_mode: Some(scripts_volume_default_mode),
                secret_name: Some(format!("{name}-scripts")),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: format!("{name}-config-data"),
            secret: Some(SecretVolumeSource {
                default_mode: Some(config_access_mode),
                secret_name: Some(format!("{name}-config-data")),
                ..Default::default()
            }),
            ..Default::default()
        },
        Volume {
            name: MERGED_CONFIG_VOLUME.to_owned(),
            empty_dir: Some(EmptyDirVolumeSource::default()),
            ..Default::default()
        },
    ]
}

fn get_init_volume_mounts(name: &str) -> Vec<VolumeMount> {
    vec![
        VolumeMount {
            name: IMAGE_VOLUME.to_owned(),
            mount_path: IMAGE_MOUNT_PATH.to_owned(),
            ..Default::default()
        },
        VolumeMount {
            name: format!("{name}-scripts"),
            mount_path: SCRIPTS_MOUNT_PATH.to_owned(),
            read_only: Some(true),
            ..Default::default()
        },
        VolumeMount {
            name: MERGED_CONFIG_VOLUME.to_owned(),
            mount_path: "/var/lib/config-data/merged".to_owned(),
            ..Default::default()
        },
    ]
}

fn get_volume_mounts(name: &str) -> Vec<VolumeMount> {
    vec![
        VolumeMount {
            name: IMAGE_VOLUME.to_owned(),
            mount_path: IMAGE_MOUNT_PATH.to_owned(),
            read_only: Some(true),
            ..Default::default()
        },
        VolumeMount {
            name: format!("{name}-scripts"),
            mount_path: SCRIPTS_MOUNT_PATH.to_owned(),
            read_only: Some(true),
            ..Default::default()
        },
        VolumeMount {
            name: format!("{name}-config-data"),
            mount_path: "/var/lib/config-data/default".to_owned(),
            read_only: Some(true),
            ..Default::default()
        },
        VolumeMount {
            name: MERGED_CONFIG_VOLUME.to_owned(),
            mount_path: "/var/lib/config-data/merged".to_owned(),
            read_only: Some(true),
            ..Default::default()
        },
    ]
}

fn init_containers(instance: &Octavia, volume_mounts: Vec<VolumeMount>) -> Vec<Container> {
    let run_as_root = SecurityContext {
        run_as_user: Some(0),
        ..Default::default()
    };
    let envs = vec![EnvVar {
        name: "DEST_DIR".to_owned(),
        value: Some(IMAGE_MOUNT_PATH.to_owned()),
        ..Default::default()
    }];

    vec![
        Container {
            name: "init".to_owned(),
            command: Some(vec!["/bin/bash".to_owned()]),
            args: Some(vec!["-c".to_owned(), INIT_COMMAND.to_owned()]),
            image: Some(instance.spec.apache_container_image.to_owned()),
            security_context: Some(run_as_root.clone()),
            env: Some(envs.clone()),
            volume_mounts: Some(volume_mounts.clone()),
            ..Default::default()
        },
        // Runs whatever entrypoint the amphora image defines to copy the
        // image into the shared destination dir.
        Container {
            name: "init-image".to_owned(),
            image: Some(instance.spec.amphora_image_container_image.to_owned()),
            security_context: Some(run_as_root),
            env: Some(envs),
            volume_mounts: Some(volume_mounts),
            ..Default::default()
        },
    ]
}

/// Build the image upload Deployment for an Octavia instance.
///
/// The manifest is a pure function of the instance spec. Fails only when TLS
/// is enabled for the internal endpoint but its certificate secret cannot be
/// resolved; no partial manifest is returned in that case.
pub fn image_upload_deployment(
    instance: &Octavia,
    labels: BTreeMap<String, String>,
) -> Result<Deployment, tls::Error> {
    let name = instance.name_any();
    let deployment_name = format!("{SERVICE_NAME}-image-upload");
    debug!(%name, %deployment_name, "generating image upload deployment");

    let mut volumes = get_volumes(&name);
    let mut volume_mounts = get_volume_mounts(&name);
    let mut init_volume_mounts = get_init_volume_mounts(&name);

    let tls_spec = &instance.spec.octavia_api.tls;

    // add CA cert if defined
    if let Some(ca_volume) = tls_spec.create_ca_volume() {
        volumes.push(ca_volume);
        volume_mounts.extend(tls_spec.create_ca_volume_mounts());
        init_volume_mounts.extend(tls_spec.create_ca_volume_mounts());
    }

    if let Some(endpoint_spec) = tls_spec.api.endpoint(Endpoint::Internal) {
        let svc = endpoint_spec.to_service(Endpoint::Internal)?;
        volumes.push(svc.create_volume());
        volume_mounts.extend(svc.create_volume_mounts());
        init_volume_mounts.extend(svc.create_volume_mounts());
    }

    Ok(Deployment {
        metadata: ObjectMeta {
            name: Some(deployment_name),
            namespace: instance.namespace(),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(instance.rbac_resource_name()),
                    containers: vec![Container {
                        name: "octavia-amphora-httpd".to_owned(),
                        command: Some(vec!["/bin/bash".to_owned()]),
                        args: Some(vec!["-c".to_owned(), SERVICE_COMMAND.to_owned()]),
                        image: Some(instance.spec.apache_container_image.to_owned()),
                        volume_mounts: Some(volume_mounts),
                        resources: Some(instance.spec.resources.clone()),
                        ..Default::default()
                    }],
                    init_containers: Some(init_containers(instance, init_volume_mounts)),
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

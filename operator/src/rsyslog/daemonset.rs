//! Builds the DaemonSet running the rsyslog sidecar on every matching node.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::{
        apps::v1::{DaemonSet, DaemonSetSpec},
        core::v1::{
            Capabilities, Container, EmptyDirVolumeSource, ExecAction, PodSpec, PodTemplateSpec,
            Probe, SecretVolumeSource, SecurityContext, Volume, VolumeMount,
        },
    },
    apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube::{core::ObjectMeta, ResourceExt};
use tracing::debug;

use crate::affinity::distribute_pods;
use crate::env::{merge_envs, EnvValue};
use crate::labels::APP_SELECTOR;
use crate::rsyslog::{OctaviaRsyslog, SERVICE_NAME};

const INIT_CONTAINER_COMMAND: &str = "/usr/local/bin/container-scripts/init.sh";
const UTILS_IMAGE: &str = "quay.io/gthiemonge/centos:netutils";
const SCRIPTS_MOUNT_PATH: &str = "/usr/local/bin/container-scripts";
const MERGED_CONFIG_VOLUME: &str = "config-data-merged";
const HOSTNAME_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";

fn get_volumes(name: &str) -> Vec<Volume> {
    let scripts_volume_default_mode = 0o755;
    let config_access_mode = 0o644;

    vec![
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

fn get_volume_mounts(name: &str) -> Vec<VolumeMount> {
    vec![
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
            ..Default::default()
        },
    ]
}

fn get_init_volume_mounts(name: &str) -> Vec<VolumeMount> {
    vec![
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

// The workload is not network reachable, so both probes check for a running
// rsyslog process instead of a connection.
fn process_probe() -> ExecAction {
    ExecAction {
        command: Some(vec![
            "/usr/bin/pgrep".to_owned(),
            "-r".to_owned(),
            "DRST".to_owned(),
            "rsyslog".to_owned(),
        ]),
    }
}

/// Build the rsyslog DaemonSet for an OctaviaRsyslog instance.
///
/// The manifest is a pure function of its inputs. The supplied config hash is
/// exposed as the `CONFIG_HASH` env var of every container; changing it is
/// how the reconciler forces a rolling restart on config change.
pub fn daemonset(
    instance: &OctaviaRsyslog,
    config_hash: &str,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
) -> DaemonSet {
    let name = instance.name_any();
    debug!(%name, daemonset = SERVICE_NAME, "generating rsyslog daemonset");

    let volumes = get_volumes(&name);
    let volume_mounts = get_volume_mounts(&name);

    let liveness_probe = Probe {
        exec: Some(process_probe()),
        timeout_seconds: Some(15),
        period_seconds: Some(13),
        initial_delay_seconds: Some(3),
        ..Default::default()
    };
    let readiness_probe = Probe {
        exec: Some(process_probe()),
        timeout_seconds: Some(15),
        period_seconds: Some(15),
        initial_delay_seconds: Some(5),
        ..Default::default()
    };

    let env_vars = merge_envs(
        Vec::new(),
        BTreeMap::from_iter(vec![
            (
                "KOLLA_CONFIG_STRATEGY".to_owned(),
                EnvValue::Value("COPY_ALWAYS".to_owned()),
            ),
            (
                "CONFIG_HASH".to_owned(),
                EnvValue::Value(config_hash.to_owned()),
            ),
            (
                "NODE_NAME".to_owned(),
                EnvValue::FieldRef("spec.nodeName".to_owned()),
            ),
        ]),
    );

    DaemonSet {
        metadata: ObjectMeta {
            name: Some(SERVICE_NAME.to_owned()),
            namespace: instance.namespace(),
            ..Default::default()
        },
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    annotations: Some(annotations),
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    service_account_name: Some(instance.spec.service_account.to_owned()),
                    automount_service_account_token: Some(false),
                    containers: vec![
                        Container {
                            name: SERVICE_NAME.to_owned(),
                            image: Some(instance.spec.container_image.to_owned()),
                            env: Some(env_vars.clone()),
                            volume_mounts: Some(volume_mounts.clone()),
                            resources: Some(instance.spec.resources.clone()),
                            readiness_probe: Some(readiness_probe),
                            liveness_probe: Some(liveness_probe),
                            ..Default::default()
                        },
                        // Diagnostic container with elevated network and
                        // system capabilities.
                        Container {
                            name: "utils".to_owned(),
                            image: Some(UTILS_IMAGE.to_owned()),
                            env: Some(env_vars.clone()),
                            volume_mounts: Some(volume_mounts),
                            resources: Some(instance.spec.resources.clone()),
                            security_context: Some(SecurityContext {
                                capabilities: Some(Capabilities {
                                    add: Some(vec![
                                        "NET_ADMIN".to_owned(),
                                        "SYS_ADMIN".to_owned(),
                                        "SYS_NICE".to_owned(),
                                    ]),
                                    drop: Some(vec![]),
                                }),
                                run_as_user: Some(0),
                                privileged: Some(true),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                    ],
                    init_containers: Some(vec![Container {
                        name: "init".to_owned(),
                        image: Some(instance.spec.init_container_image.to_owned()),
                        security_context: Some(SecurityContext {
                            run_as_user: Some(0),
                            capabilities: Some(Capabilities {
                                add: Some(vec![
                                    "NET_ADMIN".to_owned(),
                                    "NET_RAW".to_owned(),
                                    "SYS_ADMIN".to_owned(),
                                    "SYS_NICE".to_owned(),
                                ]),
                                drop: Some(vec![]),
                            }),
                            ..Default::default()
                        }),
                        command: Some(vec!["/bin/bash".to_owned()]),
                        args: Some(vec!["-c".to_owned(), INIT_CONTAINER_COMMAND.to_owned()]),
                        env: Some(env_vars),
                        volume_mounts: Some(get_init_volume_mounts(&name)),
                        ..Default::default()
                    }]),
                    volumes: Some(volumes),
                    // Prefer to not run two pods of this service on the same
                    // worker node; they still get co-located when no other
                    // node is available.
                    affinity: Some(distribute_pods(
                        APP_SELECTOR,
                        &[SERVICE_NAME],
                        HOSTNAME_TOPOLOGY_KEY,
                    )),
                    node_selector: instance.spec.node_selector.clone(),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use crate::labels::selector_labels;
    use crate::rsyslog::OctaviaRsyslogSpec;

    use super::*;

    fn test_instance() -> OctaviaRsyslog {
        let mut instance = OctaviaRsyslog::new(
            "testoctavia",
            OctaviaRsyslogSpec {
                container_image: "quay.io/openstack/octavia-rsyslog:latest".to_owned(),
                init_container_image: "quay.io/openstack/octavia-rsyslog-init:latest".to_owned(),
                service_account: "octavia-testoctavia".to_owned(),
                ..Default::default()
            },
        );
        instance.metadata.namespace = Some("openstack".to_owned());
        instance
    }

    fn build(config_hash: &str) -> DaemonSet {
        daemonset(
            &test_instance(),
            config_hash,
            selector_labels(SERVICE_NAME).unwrap(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn daemonset_shape() {
        let daemonset = build("n58h5h68h");
        assert_eq!(daemonset.metadata.name.as_deref(), Some("octavia-rsyslog"));
        assert_eq!(daemonset.metadata.namespace.as_deref(), Some("openstack"));

        let pod_spec = daemonset.spec.unwrap().template.spec.unwrap();
        assert_eq!(pod_spec.automount_service_account_token, Some(false));
        assert_eq!(
            pod_spec.service_account_name.as_deref(),
            Some("octavia-testoctavia")
        );
        assert_eq!(pod_spec.containers.len(), 2);
        assert_eq!(pod_spec.init_containers.as_ref().unwrap().len(), 1);
        assert!(pod_spec.node_selector.is_none());
    }

    #[test]
    fn probes_check_for_a_running_process() {
        let daemonset = build("n58h5h68h");
        let pod_spec = daemonset.spec.unwrap().template.spec.unwrap();
        let rsyslog = &pod_spec.containers[0];

        let liveness = rsyslog.liveness_probe.as_ref().unwrap();
        assert_eq!(liveness.initial_delay_seconds, Some(3));
        assert_eq!(liveness.period_seconds, Some(13));
        assert_eq!(liveness.timeout_seconds, Some(15));

        let readiness = rsyslog.readiness_probe.as_ref().unwrap();
        assert_eq!(readiness.initial_delay_seconds, Some(5));
        assert_eq!(readiness.period_seconds, Some(15));
        assert_eq!(readiness.timeout_seconds, Some(15));

        for probe in [liveness, readiness] {
            expect![[r#"
                [
                    "/usr/bin/pgrep",
                    "-r",
                    "DRST",
                    "rsyslog",
                ]
            "#]]
            .assert_debug_eq(probe.exec.as_ref().unwrap().command.as_ref().unwrap());
            assert!(probe.http_get.is_none());
            assert!(probe.tcp_socket.is_none());
        }
    }

    #[test]
    fn utils_container_is_privileged_with_capabilities() {
        let daemonset = build("n58h5h68h");
        let pod_spec = daemonset.spec.unwrap().template.spec.unwrap();
        let utils = &pod_spec.containers[1];
        assert_eq!(utils.name, "utils");

        let security_context = utils.security_context.as_ref().unwrap();
        assert_eq!(security_context.privileged, Some(true));
        assert_eq!(security_context.run_as_user, Some(0));
        expect![[r#"
            [
                "NET_ADMIN",
                "SYS_ADMIN",
                "SYS_NICE",
            ]
        "#]]
        .assert_debug_eq(
            security_context
                .capabilities
                .as_ref()
                .unwrap()
                .add
                .as_ref()
                .unwrap(),
        );
    }

    #[test]
    fn init_container_has_network_capabilities() {
        let daemonset = build("n58h5h68h");
        let pod_spec = daemonset.spec.unwrap().template.spec.unwrap();
        let init = &pod_spec.init_containers.as_ref().unwrap()[0];

        assert_eq!(init.name, "init");
        assert_eq!(
            init.args.as_ref().unwrap()[1],
            "/usr/local/bin/container-scripts/init.sh"
        );
        let security_context = init.security_context.as_ref().unwrap();
        assert_eq!(security_context.run_as_user, Some(0));
        expect![[r#"
            [
                "NET_ADMIN",
                "NET_RAW",
                "SYS_ADMIN",
                "SYS_NICE",
            ]
        "#]]
        .assert_debug_eq(
            security_context
                .capabilities
                .as_ref()
                .unwrap()
                .add
                .as_ref()
                .unwrap(),
        );
    }

    #[test]
    fn config_hash_only_changes_the_config_hash_env() {
        let first = build("hash-one");
        let mut second = build("hash-two");

        // Rewrite CONFIG_HASH in the second build; everything else must be
        // field-for-field identical.
        let pod_spec = second
            .spec
            .as_mut()
            .unwrap()
            .template
            .spec
            .as_mut()
            .unwrap();
        let all_containers = pod_spec
            .containers
            .iter_mut()
            .chain(pod_spec.init_containers.as_mut().unwrap().iter_mut());
        for container in all_containers {
            let config_hash = container
                .env
                .as_mut()
                .unwrap()
                .iter_mut()
                .find(|var| var.name == "CONFIG_HASH")
                .unwrap();
            assert_eq!(config_hash.value.as_deref(), Some("hash-two"));
            config_hash.value = Some("hash-one".to_owned());
        }
        assert_eq!(first, second);
    }

    #[test]
    fn node_selector_passes_through() {
        let mut instance = test_instance();
        instance.spec.node_selector = Some(BTreeMap::from_iter(vec![(
            "node-role.kubernetes.io/worker".to_owned(),
            "".to_owned(),
        )]));
        let daemonset = daemonset(
            &instance,
            "n58h5h68h",
            selector_labels(SERVICE_NAME).unwrap(),
            BTreeMap::new(),
        );
        let pod_spec = daemonset.spec.unwrap().template.spec.unwrap();
        assert_eq!(
            pod_spec
                .node_selector
                .as_ref()
                .unwrap()
                .get("node-role.kubernetes.io/worker")
                .map(String::as_str),
            Some("")
        );
    }

    #[test]
    fn identical_inputs_build_identical_manifests() {
        assert_eq!(build("n58h5h68h"), build("n58h5h68h"));
    }
}

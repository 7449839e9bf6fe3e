//! OctaviaRsyslog is a k8s custom resource that defines the rsyslog sidecar
//! daemon deployed on every eligible node.

// Export all spec types
mod spec;
pub use spec::*;

pub mod daemonset;

pub use daemonset::daemonset;

/// Name shared by the DaemonSet and its primary container.
pub const SERVICE_NAME: &str = "octavia-rsyslog";

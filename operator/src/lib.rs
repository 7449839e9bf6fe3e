//! Provides CRD schemas and manifest builders for the Octavia operator and related tooling.
//!
//! The builders in this crate are pure functions from a custom resource to a
//! typed workload object. Convergence, retries and ordering are owned by the
//! reconciler consuming them; identical specs always produce identical
//! manifests so the reconciler can diff desired against live state without
//! spurious churn.
#![warn(missing_docs)]

/// Anti-affinity rule factories shared by the workload builders.
pub mod affinity;
/// Deterministic environment variable merging.
pub mod env;
/// Labels module for managing resource labels.
pub mod labels;
/// Octavia is a k8s custom resource that defines the Octavia load-balancing service.
pub mod octavia;
/// OctaviaRsyslog is a k8s custom resource that defines the rsyslog sidecar daemon.
pub mod rsyslog;
/// TLS and CA bundle configuration shared across services.
pub mod tls;

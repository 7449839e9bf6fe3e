//! Octavia is a k8s custom resource that defines the Octavia load-balancing
//! service, including the workload that publishes amphora images.

// Export all spec types
mod spec;
pub use spec::*;

pub mod image_upload;

pub use image_upload::image_upload_deployment;

/// Base name shared by resources of the Octavia service.
pub const SERVICE_NAME: &str = "octavia";

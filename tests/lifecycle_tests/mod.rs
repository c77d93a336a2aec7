//! Integration tests for chainverify
//!
//! These tests tell the story of a service instance moving through its
//! lifecycle while the control plane lags behind the create and delete calls.
//!
//! # Test Organization
//!
//! - `control_plane`: In-memory control plane serving the inventory and
//!   lifecycle APIs with configurable convergence lag and faults
//!
//! - `setup_stories`: Stories about confirming a freshly created instance,
//!   including slow workload launch and broken service chains
//!
//! - `cleanup_stories`: Stories about confirming teardown, including slow
//!   reclamation and networks shared with sibling instances

mod cleanup_stories;
mod control_plane;
mod setup_stories;

use std::sync::Arc;

use chainverify::config::VerifierConfig;
use chainverify::model::{FqName, ServiceInstanceRef};
use chainverify::ServiceInstanceFixture;

use control_plane::ControlPlane;

/// A two-armed firewall in the `demo` project
fn firewall(name: &str) -> ServiceInstanceRef {
    ServiceInstanceRef::new(
        FqName::new(["default-domain", "demo", name]),
        "nat-template",
        vec!["left".to_string(), "right".to_string()],
    )
    .with_networks("vn-left", "vn-right")
}

fn fixture(plane: &Arc<ControlPlane>, declared: ServiceInstanceRef) -> ServiceInstanceFixture {
    ServiceInstanceFixture::new(
        declared,
        plane.clone(),
        plane.clone(),
        VerifierConfig::default(),
    )
}

//! chainverify - lifecycle verification for chained network service instances
//!
//! A service instance is realized by the control plane as a chain of resources:
//! the instance references a service template, launches one workload per
//! scale-out unit, each workload carries one interface per declared interface
//! type, and each interface attaches to a virtual network and one or more
//! routing instances. The control plane is eventually consistent, so the
//! inventory may lag behind a create or delete call.
//!
//! This crate confirms that the whole chain becomes observable after creation
//! and that it disappears after deletion, polling where convergence lag is
//! expected and failing fast where a structural mismatch cannot be fixed by
//! waiting.
//!
//! # Modules
//!
//! - [`model`] - Typed records for each resource kind and the confirmed stage values
//! - [`inventory`] - Inventory and lifecycle API traits, plus the HTTP adapter
//! - [`retry`] - Fixed-interval retry executor applied around individual checks
//! - [`verify`] - Creation-side stage verifiers and teardown absence checks
//! - [`engine`] - Orders the stages and aggregates them into a single verdict
//! - [`fixture`] - Creates/deletes a service instance and verifies both boundaries
//! - [`context`] - Identities carried from setup verification to cleanup verification
//! - [`config`] - Per-stage retry tuning and verification switches
//! - [`telemetry`] - Tracing subscriber setup for the CLI
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod fixture;
pub mod inventory;
pub mod model;
pub mod retry;
pub mod telemetry;
pub mod verify;

pub use context::LifecycleContext;
pub use engine::{LifecycleVerifier, Verdict};
pub use error::Error;
pub use fixture::ServiceInstanceFixture;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// Network names the control plane reserves for chain-managed service networks
///
/// Networks and routing instances with these names are shared by every service
/// instance in a project and are only reclaimed once no instance remains.
pub const DEFAULT_RESERVED_NETWORKS: [&str; 3] = ["svc-vn-mgmt", "svc-vn-left", "svc-vn-right"];

/// Default inventory endpoint used by the CLI
pub const DEFAULT_INVENTORY_URL: &str = "http://127.0.0.1:8084";

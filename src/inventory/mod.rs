//! Inventory query facade and resource lifecycle API
//!
//! The verification engine only reads. Both collaborators are traits so the
//! engine can run against the HTTP adapter in production and against mocks or a
//! simulated control plane in tests.

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use crate::model::{
    FqName, InterfaceRecord, NetworkRecord, RoutingInstanceRecord, ServiceInstanceRecord,
    ServiceInstanceRef, WorkloadRecord,
};
use crate::Error;

pub mod http;

pub use http::HttpInventory;

/// Read-only view of the control plane's inventory
///
/// Every lookup returns `Ok(None)` when the resource is not found. The view may
/// be stale; `refresh = true` asks the implementation to bypass any cache it
/// keeps so a lagging read does not produce a false negative.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Read a service instance by fully-qualified name
    async fn service_instance(
        &self,
        fq_name: &FqName,
        refresh: bool,
    ) -> Result<Option<ServiceInstanceRecord>, Error>;

    /// Read a workload by id
    async fn workload(&self, id: &str, refresh: bool) -> Result<Option<WorkloadRecord>, Error>;

    /// Read a workload interface by id
    async fn workload_interface(
        &self,
        id: &str,
        refresh: bool,
    ) -> Result<Option<InterfaceRecord>, Error>;

    /// Read a virtual network by id
    async fn virtual_network(&self, id: &str, refresh: bool)
        -> Result<Option<NetworkRecord>, Error>;

    /// Read a routing instance by id
    async fn routing_instance(
        &self,
        id: &str,
        refresh: bool,
    ) -> Result<Option<RoutingInstanceRecord>, Error>;
}

/// Create/delete/list calls against the control plane
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceLifecycle: Send + Sync {
    /// Create the declared service instance and return the stored record
    async fn create_service_instance(
        &self,
        instance: &ServiceInstanceRef,
    ) -> Result<ServiceInstanceRecord, Error>;

    /// Delete a service instance by fully-qualified name
    async fn delete_service_instance(&self, fq_name: &FqName) -> Result<(), Error>;

    /// List the service instances that exist under `scope`
    async fn list_service_instances(&self, scope: &FqName) -> Result<Vec<FqName>, Error>;
}

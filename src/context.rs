//! Lifecycle context carried from setup verification to cleanup verification
//!
//! Confirmed resources are re-read on every verification run. The only state
//! that crosses the creation/teardown boundary is what teardown needs to know
//! about: whether the instance was ever confirmed, which workloads were
//! launched, and which chain-managed networks and routing instances were seen.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::{
    ConfirmedNetwork, ConfirmedRoutingInstance, ConfirmedWorkload, ServiceInstanceRecord,
};
use crate::Error;

/// Identities recorded during setup verification for use at teardown
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleContext {
    /// The service instance was observed at least once
    pub instance_confirmed: bool,
    /// Workload ids observed for the instance
    pub workload_ids: Vec<String>,
    /// Chain-managed networks, id to name
    pub chain_networks: BTreeMap<String, String>,
    /// Chain-managed routing instances, id to name
    pub chain_routing_instances: BTreeMap<String, String>,
}

impl LifecycleContext {
    /// Empty context for an instance that has not been verified yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that the instance has been observed
    pub fn record_instance(&mut self) {
        self.instance_confirmed = true;
    }

    /// Replace the workload ids with the latest observation
    pub fn record_workloads(&mut self, workloads: &[ConfirmedWorkload]) {
        self.workload_ids = workloads.iter().map(|w| w.id().to_string()).collect();
    }

    /// Record what the create (or reuse) call returned, before any verification.
    ///
    /// Workload back-refs already on the record are kept; an empty list leaves
    /// earlier observations alone.
    pub fn record_created(&mut self, record: &ServiceInstanceRecord) {
        self.record_instance();
        if !record.workload_back_refs.is_empty() {
            self.workload_ids = record
                .workload_back_refs
                .iter()
                .map(|r| r.uuid.clone())
                .collect();
        }
    }

    /// Add the chain-managed networks among `networks`
    pub fn record_networks(&mut self, networks: &[ConfirmedNetwork]) {
        for network in networks.iter().filter(|n| n.chain_managed) {
            self.chain_networks
                .insert(network.record.uuid.clone(), network.record.name.clone());
        }
    }

    /// Add the chain-managed routing instances among `instances`
    pub fn record_routing_instances(&mut self, instances: &[ConfirmedRoutingInstance]) {
        for ri in instances.iter().filter(|ri| ri.chain_managed) {
            self.chain_routing_instances
                .insert(ri.record.uuid.clone(), ri.record.name.clone());
        }
    }

    /// Read a context saved by [`LifecycleContext::save`]
    pub fn load(path: &Path) -> Result<Self, Error> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::serialization(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            Error::serialization(format!("invalid lifecycle context {}: {}", path.display(), e))
        })
    }

    /// Persist the context so a later process can run cleanup verification
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::serialization(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| {
            Error::serialization(format!("failed to write {}: {}", path.display(), e))
        })
    }
}

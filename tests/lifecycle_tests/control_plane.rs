//! In-memory control plane with convergence lag
//!
//! Realizes a service instance the way the real control plane does: one
//! workload per scale-out unit, one interface per declared role, a shared
//! chain network and pass-through routing instance per role and scope, and a
//! per-instance chain-hop routing instance. Reads lag behind create and delete
//! by a configurable number of inventory reads.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use chainverify::inventory::{Inventory, ResourceLifecycle};
use chainverify::model::{
    FqName, InterfaceProperties, InterfaceRecord, NetworkRecord, ObjectRef, RefAttributes,
    RoutingInstanceRecord, ServiceChainInfo, ServiceInstanceRecord, ServiceInstanceRef,
    WorkloadRecord,
};
use chainverify::Error;

/// How the simulated control plane misbehaves
#[derive(Clone, Debug, Default)]
pub struct Behavior {
    /// Instance reads after create before workload back-refs appear
    pub launch_reads: u32,
    /// Instance reads after delete before the instance disappears
    pub reclaim_reads: u32,
    /// Never reclaim the instance
    pub stuck_instance: bool,
    /// Never delete workloads
    pub stuck_workloads: bool,
    /// Interface role whose routing-instance refs are never filled in
    pub broken_chain: Option<String>,
    /// Reads of each interface before its routing-instance refs are filled in
    pub routing_lag_reads: u32,
}

struct InstanceEntry {
    record: ServiceInstanceRecord,
    workload_refs: Vec<ObjectRef>,
    pending_launch: u32,
    pending_reclaim: Option<u32>,
    hop_routing_instances: Vec<String>,
}

#[derive(Default)]
struct State {
    instances: HashMap<FqName, InstanceEntry>,
    workloads: HashMap<String, WorkloadRecord>,
    interfaces: HashMap<String, InterfaceRecord>,
    networks: HashMap<String, NetworkRecord>,
    routing_instances: HashMap<String, RoutingInstanceRecord>,
    interface_reads: HashMap<String, u32>,
    creates: u32,
    next_id: u32,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    /// Shared chain network and its pass-through routing instance for a role
    fn chain_network(&mut self, scope: &FqName, role: &str) -> (ObjectRef, ObjectRef) {
        let name = format!("svc-vn-{}", role);
        let vn_id = format!("vn-{}-{}", scope.leaf(), role);
        let ri_id = format!("ri-{}-{}", scope.leaf(), role);
        let vn_fq = FqName::new(scope.parts().iter().cloned().chain([name.clone()]));
        let ri_fq = FqName::new(vn_fq.parts().iter().cloned().chain([name.clone()]));

        self.networks.entry(vn_id.clone()).or_insert_with(|| NetworkRecord {
            fq_name: vn_fq.clone(),
            uuid: vn_id.clone(),
            name: name.clone(),
        });
        self.routing_instances
            .entry(ri_id.clone())
            .or_insert_with(|| RoutingInstanceRecord {
                fq_name: ri_fq.clone(),
                uuid: ri_id.clone(),
                name: name.clone(),
                service_chain: None,
            });
        (ObjectRef::new(vn_fq, vn_id), ObjectRef::new(ri_fq, ri_id))
    }

    fn reclaim(&mut self, fq_name: &FqName, stuck_workloads: bool) {
        let Some(entry) = self.instances.remove(fq_name) else {
            return;
        };
        for ri in &entry.hop_routing_instances {
            self.routing_instances.remove(ri);
        }
        if !stuck_workloads {
            for workload_ref in &entry.workload_refs {
                if let Some(workload) = self.workloads.remove(&workload_ref.uuid) {
                    for iface in workload.interface_refs {
                        self.interfaces.remove(&iface.uuid);
                    }
                }
            }
        }

        let scope = fq_name.parent();
        if !self.instances.keys().any(|name| name.parent() == scope) {
            let prefix = format!("-{}-", scope.leaf());
            self.networks.retain(|id, _| !id.contains(&prefix));
            self.routing_instances.retain(|id, _| !id.contains(&prefix));
        }
    }
}

/// Simulated control plane serving both the inventory and the lifecycle API
pub struct ControlPlane {
    behavior: Behavior,
    state: Mutex<State>,
}

impl ControlPlane {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            state: Mutex::new(State::default()),
        }
    }

    pub fn converging() -> Self {
        Self::new(Behavior::default())
    }

    /// Number of create calls served
    pub fn creates(&self) -> u32 {
        self.state.lock().unwrap().creates
    }

    /// Number of chain networks still stored
    pub fn network_count(&self) -> usize {
        self.state.lock().unwrap().networks.len()
    }

    /// Number of workloads still stored
    pub fn workload_count(&self) -> usize {
        self.state.lock().unwrap().workloads.len()
    }
}

#[async_trait]
impl Inventory for ControlPlane {
    async fn service_instance(
        &self,
        fq_name: &FqName,
        _refresh: bool,
    ) -> Result<Option<ServiceInstanceRecord>, Error> {
        let mut state = self.state.lock().unwrap();
        let stuck_instance = self.behavior.stuck_instance;

        let Some(entry) = state.instances.get_mut(fq_name) else {
            return Ok(None);
        };
        if let Some(remaining) = entry.pending_reclaim.as_mut() {
            if *remaining == 0 && !stuck_instance {
                state.reclaim(fq_name, self.behavior.stuck_workloads);
                return Ok(None);
            }
            *remaining = remaining.saturating_sub(1);
        }

        let mut record = entry.record.clone();
        if entry.pending_launch > 0 {
            entry.pending_launch -= 1;
        } else {
            record.workload_back_refs = entry.workload_refs.clone();
        }
        Ok(Some(record))
    }

    async fn workload(&self, id: &str, _refresh: bool) -> Result<Option<WorkloadRecord>, Error> {
        Ok(self.state.lock().unwrap().workloads.get(id).cloned())
    }

    async fn workload_interface(
        &self,
        id: &str,
        _refresh: bool,
    ) -> Result<Option<InterfaceRecord>, Error> {
        let mut state = self.state.lock().unwrap();
        let reads = state.interface_reads.entry(id.to_string()).or_default();
        *reads += 1;
        let wired = *reads > self.behavior.routing_lag_reads;
        Ok(state.interfaces.get(id).cloned().map(|mut record| {
            if !wired {
                record.routing_instance_refs.clear();
            }
            record
        }))
    }

    async fn virtual_network(
        &self,
        id: &str,
        _refresh: bool,
    ) -> Result<Option<NetworkRecord>, Error> {
        Ok(self.state.lock().unwrap().networks.get(id).cloned())
    }

    async fn routing_instance(
        &self,
        id: &str,
        _refresh: bool,
    ) -> Result<Option<RoutingInstanceRecord>, Error> {
        Ok(self.state.lock().unwrap().routing_instances.get(id).cloned())
    }
}

#[async_trait]
impl ResourceLifecycle for ControlPlane {
    async fn create_service_instance(
        &self,
        instance: &ServiceInstanceRef,
    ) -> Result<ServiceInstanceRecord, Error> {
        let mut state = self.state.lock().unwrap();
        if state.instances.contains_key(&instance.fq_name) {
            return Err(Error::lifecycle(
                "create",
                instance.fq_name.to_string(),
                "already exists",
            ));
        }
        state.creates += 1;

        let scope = instance.scope();
        let si_id = state.id("si");
        let mut workload_refs = Vec::new();
        let mut hop_routing_instances = Vec::new();

        for unit in 1..=instance.scale_out {
            let vm_id = state.id("vm");
            let vm_name = format!("{}-{}", instance.name(), unit);
            let mut interface_refs = Vec::new();

            for role in &instance.interface_types {
                let (vn_ref, ri_ref) = state.chain_network(&scope, role);

                let hop_id = state.id("ri-hop");
                let hop_name = format!("{}-{}-hop", instance.name(), role);
                let hop_fq = FqName::new(vn_ref.to.parts().iter().cloned().chain([hop_name.clone()]));
                state.routing_instances.insert(
                    hop_id.clone(),
                    RoutingInstanceRecord {
                        fq_name: hop_fq.clone(),
                        uuid: hop_id.clone(),
                        name: hop_name,
                        service_chain: Some(ServiceChainInfo {
                            service_chain_address: Some("10.254.0.1".to_string()),
                            routing_instance: Some(ri_ref.to.to_string()),
                            ..Default::default()
                        }),
                    },
                );
                hop_routing_instances.push(hop_id.clone());
                let hop_ref = ObjectRef::new(hop_fq, hop_id).with_attr(RefAttributes {
                    direction: Some("both".to_string()),
                    vlan_tag: Some(unit),
                    ..Default::default()
                });

                let routing_instance_refs =
                    if self.behavior.broken_chain.as_deref() == Some(role.as_str()) {
                        vec![]
                    } else {
                        vec![ri_ref, hop_ref]
                    };

                let vmi_id = state.id("vmi");
                let vmi_fq = FqName::new([vm_name.clone(), format!("{}-{}", vm_name, role)]);
                state.interfaces.insert(
                    vmi_id.clone(),
                    InterfaceRecord {
                        fq_name: vmi_fq.clone(),
                        uuid: vmi_id.clone(),
                        properties: Some(InterfaceProperties {
                            interface_type: Some(role.clone()),
                        }),
                        network_refs: vec![vn_ref],
                        routing_instance_refs,
                    },
                );
                interface_refs.push(ObjectRef::new(vmi_fq, vmi_id));
            }

            state.workloads.insert(
                vm_id.clone(),
                WorkloadRecord {
                    uuid: vm_id.clone(),
                    name: vm_name.clone(),
                    interface_refs,
                },
            );
            workload_refs.push(ObjectRef::new(FqName::new([vm_name]), vm_id));
        }

        let record = ServiceInstanceRecord {
            fq_name: instance.fq_name.clone(),
            uuid: si_id,
            template_refs: vec![ObjectRef::new(
                FqName::new([scope.parts()[0].clone(), instance.template.clone()]),
                "st-1",
            )],
            workload_back_refs: vec![],
        };
        state.instances.insert(
            instance.fq_name.clone(),
            InstanceEntry {
                record: record.clone(),
                workload_refs,
                pending_launch: self.behavior.launch_reads,
                pending_reclaim: None,
                hop_routing_instances,
            },
        );
        Ok(record)
    }

    async fn delete_service_instance(&self, fq_name: &FqName) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        match state.instances.get_mut(fq_name) {
            Some(entry) => {
                entry.pending_reclaim = Some(self.behavior.reclaim_reads);
                Ok(())
            }
            None => Err(Error::lifecycle("delete", fq_name.to_string(), "not found")),
        }
    }

    async fn list_service_instances(&self, scope: &FqName) -> Result<Vec<FqName>, Error> {
        let state = self.state.lock().unwrap();
        let mut names: Vec<FqName> = state
            .instances
            .keys()
            .filter(|name| name.parent() == *scope)
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

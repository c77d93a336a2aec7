//! Creation-side stage verifiers
//!
//! The stages form a strict pipeline: each consumes the value confirmed by its
//! predecessor, so a stage never looks at a resource whose parent has not been
//! confirmed first.
//!
//! ```text
//! instance -> template -> workloads -> per workload: interface count
//!          -> per interface: properties -> networks -> routing instances
//! ```

use tracing::{debug, warn};

use super::{Stage, StageFailure};
use crate::inventory::Inventory;
use crate::model::{
    ConfirmedInterface, ConfirmedNetwork, ConfirmedRoutingInstance, ConfirmedServiceInstance,
    ConfirmedWorkload, ObjectRef, ServiceInstanceRef,
};

/// Log a failure at warn level and hand it back
fn reject(failure: StageFailure) -> StageFailure {
    warn!(stage = %failure.stage, reason = %failure.reason, "Verification stage failed");
    failure
}

/// Confirm the service instance is readable by name.
///
/// Not-found is a hard failure here: the create call is synchronous, so the
/// instance must already be readable. Deployments where that does not hold can
/// wrap this stage in [`crate::retry::retry_check`].
pub async fn verify_instance_exists(
    inventory: &dyn Inventory,
    declared: &ServiceInstanceRef,
) -> Result<ConfirmedServiceInstance, StageFailure> {
    let stage = Stage::InstanceExists;
    let record = inventory
        .service_instance(&declared.fq_name, true)
        .await
        .map_err(|e| reject(StageFailure::from_query(stage, e)))?
        .ok_or_else(|| {
            reject(StageFailure::not_found(
                stage,
                format!("service instance {} not found", declared.fq_name),
            ))
        })?;

    debug!(instance = %declared.fq_name, uuid = %record.uuid, "Service instance exists");
    Ok(ConfirmedServiceInstance { record })
}

/// Confirm the instance references the declared template
pub fn verify_template_ref(
    declared: &ServiceInstanceRef,
    instance: &ConfirmedServiceInstance,
) -> Result<(), StageFailure> {
    let stage = Stage::TemplateRef;
    let refs = &instance.record.template_refs;
    if refs.is_empty() {
        return Err(reject(StageFailure::invariant(
            stage,
            format!("no service template refs in service instance {}", declared.name()),
        )));
    }
    if !refs.iter().any(|r| r.to.leaf() == declared.template) {
        return Err(reject(StageFailure::invariant(
            stage,
            format!(
                "service instance {} has no template ref to {}",
                declared.name(),
                declared.template
            ),
        )));
    }

    debug!(instance = %declared.name(), template = %declared.template, "Template ref present");
    Ok(())
}

/// Confirm every workload of the instance is launched and independently observable.
///
/// Passes only when exactly `scale_out` workloads exist. Fewer workloads, or a
/// back-reference that does not resolve yet, means launch is still in progress
/// and is reported as transient; more workloads than declared is an invariant
/// violation.
pub async fn verify_workload_launched(
    inventory: &dyn Inventory,
    declared: &ServiceInstanceRef,
    instance: &ConfirmedServiceInstance,
) -> Result<Vec<ConfirmedWorkload>, StageFailure> {
    let stage = Stage::WorkloadLaunched;
    let back_refs = &instance.record.workload_back_refs;
    let expected = declared.scale_out as usize;
    if back_refs.is_empty() && expected == 0 {
        debug!(instance = %declared.name(), "No workloads declared");
        return Ok(Vec::new());
    }
    if back_refs.is_empty() {
        return Err(reject(StageFailure::not_found(
            stage,
            format!("service instance {} has no workload back-refs", declared.name()),
        )));
    }

    let mut workloads = Vec::with_capacity(back_refs.len());
    for back_ref in back_refs {
        let record = inventory
            .workload(&back_ref.uuid, true)
            .await
            .map_err(|e| reject(StageFailure::from_query(stage, e)))?
            .ok_or_else(|| {
                reject(StageFailure::not_found(
                    stage,
                    format!(
                        "workload {} of service instance {} not launched",
                        back_ref.uuid,
                        declared.name()
                    ),
                ))
            })?;
        workloads.push(ConfirmedWorkload { record });
    }

    if workloads.len() < expected {
        return Err(reject(StageFailure::not_found(
            stage,
            format!(
                "service instance {} has {} of {} workloads launched",
                declared.name(),
                workloads.len(),
                expected
            ),
        )));
    }
    if workloads.len() > expected {
        return Err(reject(StageFailure::invariant(
            stage,
            format!(
                "service instance {} has {} workloads, declared scale-out is {}",
                declared.name(),
                workloads.len(),
                expected
            ),
        )));
    }

    debug!(instance = %declared.name(), count = workloads.len(), "Workloads launched");
    Ok(workloads)
}

/// Confirm a workload carries one interface per declared interface type
pub fn verify_workload_interfaces(
    declared: &ServiceInstanceRef,
    workload: &ConfirmedWorkload,
) -> Result<(), StageFailure> {
    let found = workload.record.interface_refs.len();
    let expected = declared.interface_types.len();
    if found != expected {
        return Err(reject(StageFailure::invariant(
            Stage::WorkloadInterfaces,
            format!(
                "workload {} of service instance {} has {} interfaces, expected {} ({})",
                workload.id(),
                declared.name(),
                found,
                expected,
                declared.interface_types.join(", ")
            ),
        )));
    }

    debug!(workload = %workload.id(), count = found, "Workload has all interfaces");
    Ok(())
}

/// Read an interface and confirm its type tag is one of the declared roles.
///
/// A tag outside the declared list is an invariant violation and fails no
/// matter how often the stage is polled.
pub async fn verify_interface_properties(
    inventory: &dyn Inventory,
    declared: &ServiceInstanceRef,
    workload: &ConfirmedWorkload,
    interface_ref: &ObjectRef,
) -> Result<ConfirmedInterface, StageFailure> {
    let stage = Stage::InterfaceProperties;
    let record = inventory
        .workload_interface(&interface_ref.uuid, true)
        .await
        .map_err(|e| reject(StageFailure::from_query(stage, e)))?
        .ok_or_else(|| {
            reject(StageFailure::not_found(
                stage,
                format!(
                    "interface {} of workload {} not found",
                    interface_ref.uuid,
                    workload.id()
                ),
            ))
        })?;

    let interface_type = match record.interface_type() {
        Some(t) => t.to_string(),
        None => {
            return Err(reject(StageFailure::invariant(
                stage,
                format!(
                    "interface {} of workload {} in service instance {} has no interface type",
                    record.uuid,
                    workload.id(),
                    declared.name()
                ),
            )))
        }
    };

    if !declared.declares_interface(&interface_type) {
        return Err(reject(StageFailure::invariant(
            stage,
            format!(
                "interface type '{}' of interface {} is not declared for service instance {} ({})",
                interface_type,
                record.uuid,
                declared.name(),
                declared.interface_types.join(", ")
            ),
        )));
    }

    debug!(interface = %record.uuid, interface_type = %interface_type, "Interface type declared");
    Ok(ConfirmedInterface {
        record,
        interface_type,
    })
}

/// Confirm an interface resolves to at least one virtual network.
///
/// Networks whose name is in `reserved_networks` are flagged as chain-managed
/// so teardown can check they are reclaimed.
pub async fn verify_network_links(
    inventory: &dyn Inventory,
    interface: &ConfirmedInterface,
    reserved_networks: &[String],
) -> Result<Vec<ConfirmedNetwork>, StageFailure> {
    let stage = Stage::NetworkLinks;
    let refs = &interface.record.network_refs;
    if refs.is_empty() {
        return Err(reject(StageFailure::invariant(
            stage,
            format!("interface {} has no virtual network refs", interface.interface_type),
        )));
    }

    let mut networks = Vec::with_capacity(refs.len());
    for network_ref in refs {
        let record = inventory
            .virtual_network(&network_ref.uuid, true)
            .await
            .map_err(|e| reject(StageFailure::from_query(stage, e)))?
            .ok_or_else(|| {
                reject(StageFailure::not_found(
                    stage,
                    format!(
                        "interface {} has no network {}",
                        interface.interface_type, network_ref.to
                    ),
                ))
            })?;

        let chain_managed = reserved_networks.iter().any(|n| *n == record.name);
        debug!(
            interface = %interface.interface_type,
            network = %record.name,
            chain_managed,
            "Interface has network"
        );
        networks.push(ConfirmedNetwork {
            record,
            chain_managed,
        });
    }
    Ok(networks)
}

/// Confirm an interface resolves to its routing instances.
///
/// A routing instance named like its owning network is a plain pass-through
/// instance. Any other routing instance is a service-chain hop and must carry
/// non-empty reference attributes and non-empty service-chain metadata.
///
/// Missing references or unresolved routing instances are transient because
/// routing state propagates after the interface and network exist. Missing
/// chain attributes or metadata on a resolved hop are invariant violations.
pub async fn verify_routing_instance(
    inventory: &dyn Inventory,
    interface: &ConfirmedInterface,
    network: &ConfirmedNetwork,
    reserved_networks: &[String],
) -> Result<Vec<ConfirmedRoutingInstance>, StageFailure> {
    let stage = Stage::RoutingInstance;
    let if_type = &interface.interface_type;
    let vn_name = network.name();

    let refs = &interface.record.routing_instance_refs;
    if refs.is_empty() {
        return Err(reject(StageFailure::not_found(
            stage,
            format!("interface {}, network {} has no routing instance refs", if_type, vn_name),
        )));
    }

    let mut instances = Vec::with_capacity(refs.len());
    for ri_ref in refs {
        let record = inventory
            .routing_instance(&ri_ref.uuid, true)
            .await
            .map_err(|e| reject(StageFailure::from_query(stage, e)))?
            .ok_or_else(|| {
                reject(StageFailure::not_found(
                    stage,
                    format!(
                        "interface {}, network {} has no routing instance {}",
                        if_type, vn_name, ri_ref.uuid
                    ),
                ))
            })?;

        let chain_managed = reserved_networks.iter().any(|n| *n == record.name);
        let chain_hop = record.name != vn_name;
        if chain_hop {
            if !ri_ref.has_attributes() {
                return Err(reject(StageFailure::invariant(
                    stage,
                    format!(
                        "interface {}, network {}, routing instance {} has no chain attributes",
                        if_type, vn_name, record.name
                    ),
                )));
            }
            if record.service_chain.as_ref().map_or(true, |sc| sc.is_empty()) {
                return Err(reject(StageFailure::invariant(
                    stage,
                    format!(
                        "interface {}, network {}, routing instance {} has no service chain information",
                        if_type, vn_name, record.name
                    ),
                )));
            }
        }

        debug!(
            interface = %if_type,
            network = %vn_name,
            routing_instance = %record.name,
            chain_hop,
            chain_managed,
            "Interface has routing instance"
        );
        instances.push(ConfirmedRoutingInstance {
            record,
            chain_managed,
            chain_hop,
        });
    }
    Ok(instances)
}

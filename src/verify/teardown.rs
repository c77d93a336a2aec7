//! Teardown-side absence checks
//!
//! Each check is a single attempt; the engine polls it with the stage's retry
//! policy since reclamation is asynchronous. A resource that is still readable
//! is reported as not-yet-converged.
//!
//! Chain-managed networks and routing instances are shared by every service
//! instance in the project. Their checks pass without looking at any id while
//! another service instance still exists in the same scope.

use tracing::{debug, info};

use super::{Stage, StageFailure};
use crate::context::LifecycleContext;
use crate::inventory::{Inventory, ResourceLifecycle};
use crate::model::ServiceInstanceRef;

/// Confirm the service instance can no longer be read.
///
/// Passes immediately, without querying, when the instance was never
/// confirmed during setup.
pub async fn verify_instance_absent(
    inventory: &dyn Inventory,
    declared: &ServiceInstanceRef,
    ctx: &LifecycleContext,
) -> Result<(), StageFailure> {
    let stage = Stage::InstanceAbsent;
    if !ctx.instance_confirmed {
        debug!(instance = %declared.name(), "Service instance never confirmed, nothing to check");
        return Ok(());
    }

    let found = inventory
        .service_instance(&declared.fq_name, true)
        .await
        .map_err(|e| StageFailure::from_query(stage, e))?;
    if found.is_some() {
        return Err(StageFailure::not_found(
            stage,
            format!("service instance {} not removed from inventory", declared.name()),
        ));
    }

    debug!(instance = %declared.name(), "Service instance removed from inventory");
    Ok(())
}

/// Confirm every workload recorded at setup can no longer be read
pub async fn verify_workload_absent(
    inventory: &dyn Inventory,
    declared: &ServiceInstanceRef,
    ctx: &LifecycleContext,
) -> Result<(), StageFailure> {
    let stage = Stage::WorkloadAbsent;
    for id in &ctx.workload_ids {
        let found = inventory
            .workload(id, true)
            .await
            .map_err(|e| StageFailure::from_query(stage, e))?;
        if found.is_some() {
            return Err(StageFailure::not_found(
                stage,
                format!(
                    "workload {} of service instance {} not deleted",
                    id,
                    declared.name()
                ),
            ));
        }
    }

    debug!(instance = %declared.name(), count = ctx.workload_ids.len(), "Workloads deleted");
    Ok(())
}

/// Whether another service instance still exists in the declared scope
async fn shared_resources_in_use(
    lifecycle: &dyn ResourceLifecycle,
    declared: &ServiceInstanceRef,
    stage: Stage,
) -> Result<bool, StageFailure> {
    let remaining = lifecycle
        .list_service_instances(&declared.scope())
        .await
        .map_err(|e| StageFailure::not_found(stage, e.to_string()))?;
    Ok(!remaining.is_empty())
}

/// Confirm chain-managed networks recorded at setup are reclaimed
pub async fn verify_network_absent(
    inventory: &dyn Inventory,
    lifecycle: &dyn ResourceLifecycle,
    declared: &ServiceInstanceRef,
    ctx: &LifecycleContext,
) -> Result<(), StageFailure> {
    let stage = Stage::NetworkAbsent;
    if shared_resources_in_use(lifecycle, declared, stage).await? {
        info!(scope = %declared.scope(), "Service instance still exists in scope, skipping network check");
        return Ok(());
    }

    for (id, name) in &ctx.chain_networks {
        let found = inventory
            .virtual_network(id, true)
            .await
            .map_err(|e| StageFailure::from_query(stage, e))?;
        if found.is_some() {
            return Err(StageFailure::not_found(
                stage,
                format!("service network {} ({}) not removed from inventory", name, id),
            ));
        }
        debug!(network = %name, "Service network removed from inventory");
    }
    Ok(())
}

/// Confirm chain-managed routing instances recorded at setup are reclaimed
pub async fn verify_routing_instance_absent(
    inventory: &dyn Inventory,
    lifecycle: &dyn ResourceLifecycle,
    declared: &ServiceInstanceRef,
    ctx: &LifecycleContext,
) -> Result<(), StageFailure> {
    let stage = Stage::RoutingInstanceAbsent;
    if shared_resources_in_use(lifecycle, declared, stage).await? {
        info!(scope = %declared.scope(), "Service instance still exists in scope, skipping routing instance check");
        return Ok(());
    }

    for (id, name) in &ctx.chain_routing_instances {
        let found = inventory
            .routing_instance(id, true)
            .await
            .map_err(|e| StageFailure::from_query(stage, e))?;
        if found.is_some() {
            return Err(StageFailure::not_found(
                stage,
                format!("routing instance {} ({}) not removed from inventory", name, id),
            ));
        }
        debug!(routing_instance = %name, "Routing instance removed from inventory");
    }
    Ok(())
}

//! Lifecycle verification engine
//!
//! Runs the creation-side stages in dependency order after a create call and
//! the teardown-side absence checks after a delete call. Both runs stop at the
//! first failing stage and report it as a single [`Verdict`].

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::config::VerifierConfig;
use crate::context::LifecycleContext;
use crate::inventory::{Inventory, ResourceLifecycle};
use crate::model::{ConfirmedInterface, ConfirmedNetwork, ServiceInstanceRef};
use crate::retry::retry_check;
use crate::verify::{create, teardown, Stage, StageFailure};
use crate::Error;

/// Aggregated outcome of one verification run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    failure: Option<StageFailure>,
}

impl Verdict {
    /// All stages passed
    pub fn pass() -> Self {
        Self { failure: None }
    }

    /// A stage failed
    pub fn fail(failure: StageFailure) -> Self {
        Self {
            failure: Some(failure),
        }
    }

    /// Whether every stage passed
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// The failing stage, if any
    pub fn failure(&self) -> Option<&StageFailure> {
        self.failure.as_ref()
    }

    /// Diagnostic text naming the failing stage and why it failed
    pub fn detail(&self) -> Option<String> {
        self.failure.as_ref().map(ToString::to_string)
    }

    /// `(passed, detail)` pair
    pub fn into_parts(self) -> (bool, Option<String>) {
        let detail = self.detail();
        (self.passed(), detail)
    }

    /// Turn a failed verdict into a hard error
    pub fn into_result(self) -> Result<(), Error> {
        match self.failure {
            None => Ok(()),
            Some(failure) => Err(Error::Verification(failure)),
        }
    }
}

impl From<Result<(), StageFailure>> for Verdict {
    fn from(result: Result<(), StageFailure>) -> Self {
        match result {
            Ok(()) => Self::pass(),
            Err(failure) => Self::fail(failure),
        }
    }
}

/// Orders the stage verifiers and applies per-stage retry policies
pub struct LifecycleVerifier {
    inventory: Arc<dyn Inventory>,
    lifecycle: Arc<dyn ResourceLifecycle>,
    config: VerifierConfig,
}

impl LifecycleVerifier {
    /// Create a verifier reading from `inventory` and listing through `lifecycle`
    pub fn new(
        inventory: Arc<dyn Inventory>,
        lifecycle: Arc<dyn ResourceLifecycle>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            inventory,
            lifecycle,
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Verify the declared instance is fully present.
    ///
    /// Identities needed at teardown are recorded into `ctx` as each stage
    /// confirms them, so a partially converged instance can still be checked
    /// for absence later.
    #[instrument(skip(self, declared, ctx), fields(instance = %declared.fq_name))]
    pub async fn verify_on_setup(
        &self,
        declared: &ServiceInstanceRef,
        ctx: &mut LifecycleContext,
    ) -> Verdict {
        let budget = self.config.retry.setup_budget(declared);
        debug!(budget_secs = budget.as_secs(), "Verifying service instance is present");
        let verdict = Verdict::from(self.run_setup(declared, ctx).await);
        match verdict.failure() {
            None => info!("Service instance verified present"),
            Some(failure) => warn!(stage = %failure.stage, detail = %failure, "Setup verification failed"),
        }
        verdict
    }

    /// Verify the declared instance and its chain-managed resources are gone
    #[instrument(skip(self, declared, ctx), fields(instance = %declared.fq_name))]
    pub async fn verify_on_cleanup(
        &self,
        declared: &ServiceInstanceRef,
        ctx: &LifecycleContext,
    ) -> Verdict {
        let budget = self.config.retry.cleanup_budget();
        debug!(budget_secs = budget.as_secs(), "Verifying service instance is gone");
        let verdict = Verdict::from(self.run_cleanup(declared, ctx).await);
        match verdict.failure() {
            None => info!("Service instance verified absent"),
            Some(failure) => warn!(stage = %failure.stage, detail = %failure, "Cleanup verification failed"),
        }
        verdict
    }

    async fn run_setup(
        &self,
        declared: &ServiceInstanceRef,
        ctx: &mut LifecycleContext,
    ) -> Result<(), StageFailure> {
        let inventory = self.inventory.as_ref();
        let reserved = self.config.reserved_networks.as_slice();
        let policies = &self.config.retry;

        let instance = create::verify_instance_exists(inventory, declared).await?;
        ctx.record_instance();
        create::verify_template_ref(declared, &instance)?;

        // Launch is asynchronous; later attempts re-read the instance so new
        // back-refs become visible.
        let mut first_read = Some(instance);
        let workloads = retry_check(&policies.workload_launch, Stage::WorkloadLaunched, || {
            let cached = first_read.take();
            async move {
                let instance = match cached {
                    Some(instance) => instance,
                    None => create::verify_instance_exists(inventory, declared)
                        .await
                        .map_err(|f| StageFailure {
                            stage: Stage::WorkloadLaunched,
                            ..f
                        })?,
                };
                create::verify_workload_launched(inventory, declared, &instance).await
            }
        })
        .await?;
        ctx.record_workloads(&workloads);

        for workload in &workloads {
            create::verify_workload_interfaces(declared, workload)?;

            for interface_ref in &workload.record.interface_refs {
                let interface =
                    create::verify_interface_properties(inventory, declared, workload, interface_ref)
                        .await?;
                let networks = create::verify_network_links(inventory, &interface, reserved).await?;
                ctx.record_networks(&networks);

                // Routing-instance refs are filled in after the interface appears;
                // later attempts re-read the interface and its networks.
                let mut first_read = Some((interface, networks));
                let (networks, routing_instances) =
                    retry_check(&policies.routing_instance, Stage::RoutingInstance, || {
                        let cached = first_read.take();
                        async move {
                            let (interface, networks) = match cached {
                                Some(read) => read,
                                None => {
                                    let interface = create::verify_interface_properties(
                                        inventory,
                                        declared,
                                        workload,
                                        interface_ref,
                                    )
                                    .await?;
                                    let networks =
                                        create::verify_network_links(inventory, &interface, reserved)
                                            .await?;
                                    (interface, networks)
                                }
                            };
                            let owning = owning_network(&interface, &networks)?;
                            let routing_instances = create::verify_routing_instance(
                                inventory, &interface, owning, reserved,
                            )
                            .await?;
                            Ok::<_, StageFailure>((networks, routing_instances))
                        }
                    })
                    .await?;
                ctx.record_networks(&networks);
                ctx.record_routing_instances(&routing_instances);
            }
        }
        Ok(())
    }

    async fn run_cleanup(
        &self,
        declared: &ServiceInstanceRef,
        ctx: &LifecycleContext,
    ) -> Result<(), StageFailure> {
        let inventory = self.inventory.as_ref();
        let lifecycle = self.lifecycle.as_ref();
        let policies = &self.config.retry;

        retry_check(&policies.instance_absent, Stage::InstanceAbsent, move || {
            teardown::verify_instance_absent(inventory, declared, ctx)
        })
        .await?;

        retry_check(&policies.workload_absent, Stage::WorkloadAbsent, move || {
            teardown::verify_workload_absent(inventory, declared, ctx)
        })
        .await?;

        if !self.config.do_verify {
            info!("Shared resource checks disabled, skipping network and routing instance checks");
            return Ok(());
        }

        retry_check(&policies.network_absent, Stage::NetworkAbsent, move || {
            teardown::verify_network_absent(inventory, lifecycle, declared, ctx)
        })
        .await?;

        retry_check(
            &policies.routing_instance_absent,
            Stage::RoutingInstanceAbsent,
            move || teardown::verify_routing_instance_absent(inventory, lifecycle, declared, ctx),
        )
        .await
    }
}

/// Network an interface's routing instances are compared against
fn owning_network<'a>(
    interface: &ConfirmedInterface,
    networks: &'a [ConfirmedNetwork],
) -> Result<&'a ConfirmedNetwork, StageFailure> {
    networks.first().ok_or_else(|| {
        StageFailure::invariant(
            Stage::NetworkLinks,
            format!("interface {} has no virtual network", interface.interface_type),
        )
    })
}

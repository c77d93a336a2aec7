//! Service instance fixture
//!
//! Owns the create and delete calls for one service instance and runs the
//! verification engine at both lifecycle boundaries. The lifecycle context
//! recorded during setup verification is kept here and handed to cleanup
//! verification.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::VerifierConfig;
use crate::context::LifecycleContext;
use crate::engine::{LifecycleVerifier, Verdict};
use crate::inventory::{Inventory, ResourceLifecycle};
use crate::model::{ServiceInstanceRecord, ServiceInstanceRef};
use crate::Error;

/// Creates, verifies and tears down one service instance
pub struct ServiceInstanceFixture {
    declared: ServiceInstanceRef,
    inventory: Arc<dyn Inventory>,
    lifecycle: Arc<dyn ResourceLifecycle>,
    verifier: LifecycleVerifier,
    context: LifecycleContext,
    record: Option<ServiceInstanceRecord>,
}

impl ServiceInstanceFixture {
    /// Create a fixture for `declared`
    pub fn new(
        declared: ServiceInstanceRef,
        inventory: Arc<dyn Inventory>,
        lifecycle: Arc<dyn ResourceLifecycle>,
        config: VerifierConfig,
    ) -> Self {
        let verifier = LifecycleVerifier::new(inventory.clone(), lifecycle.clone(), config);
        Self {
            declared,
            inventory,
            lifecycle,
            verifier,
            context: LifecycleContext::new(),
            record: None,
        }
    }

    /// Resume a fixture whose setup ran elsewhere, e.g. in another process
    pub fn with_context(mut self, context: LifecycleContext) -> Self {
        self.context = context;
        self
    }

    /// Declared instance
    pub fn declared(&self) -> &ServiceInstanceRef {
        &self.declared
    }

    /// Identities recorded so far
    pub fn context(&self) -> &LifecycleContext {
        &self.context
    }

    /// Record returned by the create call, or the pre-existing record
    pub fn record(&self) -> Option<&ServiceInstanceRecord> {
        self.record.as_ref()
    }

    /// Create the instance (reusing it if it already exists), then verify it.
    ///
    /// Verification is skipped, and a passing verdict returned, when
    /// `do_verify` is off. The instance and any workloads on the returned
    /// record are still recorded so cleanup checks their absence.
    pub async fn setup(&mut self) -> Result<Verdict, Error> {
        let record = self.create().await?;
        self.context.record_created(&record);
        self.record = Some(record);

        if !self.verifier.config().do_verify {
            debug!(instance = %self.declared.fq_name, "Setup verification disabled");
            return Ok(Verdict::pass());
        }
        Ok(self.verify_on_setup().await)
    }

    /// Delete the instance, then verify it and its chain resources are gone
    pub async fn cleanup(&mut self) -> Result<Verdict, Error> {
        info!(instance = %self.declared.fq_name, "Deleting service instance");
        self.lifecycle
            .delete_service_instance(&self.declared.fq_name)
            .await?;
        self.record = None;
        Ok(self.verify_on_cleanup().await)
    }

    /// Verify the instance is fully present
    pub async fn verify_on_setup(&mut self) -> Verdict {
        self.verifier
            .verify_on_setup(&self.declared, &mut self.context)
            .await
    }

    /// Verify the instance and its chain resources are gone
    pub async fn verify_on_cleanup(&self) -> Verdict {
        self.verifier
            .verify_on_cleanup(&self.declared, &self.context)
            .await
    }

    async fn create(&self) -> Result<ServiceInstanceRecord, Error> {
        let fq_name = &self.declared.fq_name;
        if let Some(existing) = self.inventory.service_instance(fq_name, true).await? {
            debug!(instance = %fq_name, "Service instance already exists");
            return Ok(existing);
        }

        info!(
            instance = %fq_name,
            template = %self.declared.template,
            scale_out = self.declared.scale_out,
            "Creating service instance"
        );
        self.lifecycle.create_service_instance(&self.declared).await
    }
}

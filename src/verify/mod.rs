//! Stage verifiers for both lifecycle boundaries
//!
//! Every verifier performs a single attempt and returns its outcome as a value:
//! the confirmed object for the next stage on success, or a [`StageFailure`].
//! Polling is layered on top by [`crate::retry::retry_check`], so a stage never
//! sleeps on its own.

use std::fmt;

use crate::Error;

pub mod create;
pub mod teardown;

/// Named verification stage, used to identify failures in verdicts
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Service instance is readable by name
    InstanceExists,
    /// Service instance references the declared template
    TemplateRef,
    /// Every workload of the instance is launched and observable
    WorkloadLaunched,
    /// Every workload carries one interface per declared role
    WorkloadInterfaces,
    /// Every interface carries a declared role
    InterfaceProperties,
    /// Every interface resolves to a virtual network
    NetworkLinks,
    /// Every interface resolves to its routing instances
    RoutingInstance,
    /// Service instance is gone from the inventory
    InstanceAbsent,
    /// Workloads are gone from the inventory
    WorkloadAbsent,
    /// Chain-managed networks are gone from the inventory
    NetworkAbsent,
    /// Chain-managed routing instances are gone from the inventory
    RoutingInstanceAbsent,
}

impl Stage {
    /// Stage name as it appears in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Self::InstanceExists => "instance_exists",
            Self::TemplateRef => "template_ref",
            Self::WorkloadLaunched => "workload_launched",
            Self::WorkloadInterfaces => "workload_interfaces",
            Self::InterfaceProperties => "interface_properties",
            Self::NetworkLinks => "network_links",
            Self::RoutingInstance => "routing_instance",
            Self::InstanceAbsent => "instance_absent",
            Self::WorkloadAbsent => "workload_absent",
            Self::NetworkAbsent => "network_absent",
            Self::RoutingInstanceAbsent => "routing_instance_absent",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Category of a stage failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Observed state has not converged yet (resource missing, or still present
    /// during teardown); polling may fix it
    NotFoundTransient,
    /// Resource observed but structurally wrong; polling cannot fix it
    InvariantViolation,
    /// Retry budget exhausted while the state stayed unconverged
    VerificationFailed,
}

/// Why a stage did not pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageFailure {
    /// Stage that failed
    pub stage: Stage,
    /// Failure category
    pub kind: FailureKind,
    /// Human-readable reason naming the offending resource
    pub reason: String,
    /// Attempts spent before giving up
    pub attempts: u32,
}

impl StageFailure {
    /// State not converged yet
    pub fn not_found(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            kind: FailureKind::NotFoundTransient,
            reason: reason.into(),
            attempts: 1,
        }
    }

    /// Structural mismatch
    pub fn invariant(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            kind: FailureKind::InvariantViolation,
            reason: reason.into(),
            attempts: 1,
        }
    }

    /// Classify an inventory query error
    ///
    /// Decode errors mean the record is malformed and become invariant
    /// violations; transport errors are treated as not-yet-converged.
    pub fn from_query(stage: Stage, err: Error) -> Self {
        if err.is_structural() {
            Self::invariant(stage, err.to_string())
        } else {
            Self::not_found(stage, err.to_string())
        }
    }

    /// Whether polling again could change the outcome
    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::NotFoundTransient
    }

    /// Mark the failure terminal after `attempts` tries
    pub fn exhausted(self, attempts: u32) -> Self {
        Self {
            kind: FailureKind::VerificationFailed,
            attempts,
            ..self
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.reason)?;
        if self.kind == FailureKind::VerificationFailed {
            write!(f, " (retry budget exhausted after {} attempts)", self.attempts)?;
        }
        Ok(())
    }
}

impl std::error::Error for StageFailure {}

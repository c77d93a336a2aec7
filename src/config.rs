//! Verification configuration
//!
//! Every field has a default, so an empty YAML document is a valid
//! configuration. Retry policies are tuned per stage to the convergence latency
//! the control plane shows for that resource kind.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::ServiceInstanceRef;
use crate::retry::RetryPolicy;
use crate::{Error, DEFAULT_RESERVED_NETWORKS};

/// Retry policies for the stages that poll
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagePolicies {
    /// Workload launch after create (launch is asynchronous)
    pub workload_launch: RetryPolicy,
    /// Routing-instance resolution after create
    pub routing_instance: RetryPolicy,
    /// Service instance disappearance after delete
    pub instance_absent: RetryPolicy,
    /// Workload disappearance after delete
    pub workload_absent: RetryPolicy,
    /// Chain-managed network disappearance after delete
    pub network_absent: RetryPolicy,
    /// Chain-managed routing-instance disappearance after delete
    pub routing_instance_absent: RetryPolicy,
}

impl Default for StagePolicies {
    fn default() -> Self {
        Self {
            workload_launch: RetryPolicy::new(Duration::from_secs(2), 15),
            routing_instance: RetryPolicy::new(Duration::from_secs(1), 5),
            instance_absent: RetryPolicy::new(Duration::from_secs(2), 15),
            workload_absent: RetryPolicy::new(Duration::from_secs(5), 12),
            network_absent: RetryPolicy::new(Duration::from_secs(2), 15),
            routing_instance_absent: RetryPolicy::new(Duration::from_secs(2), 15),
        }
    }
}

impl StagePolicies {
    fn named(&self) -> [(&'static str, &RetryPolicy); 6] {
        [
            ("workload_launch", &self.workload_launch),
            ("routing_instance", &self.routing_instance),
            ("instance_absent", &self.instance_absent),
            ("workload_absent", &self.workload_absent),
            ("network_absent", &self.network_absent),
            ("routing_instance_absent", &self.routing_instance_absent),
        ]
    }

    /// Upper bound on time spent sleeping while verifying `declared` is present.
    ///
    /// The routing-instance stage is polled once per interface of every
    /// workload.
    pub fn setup_budget(&self, declared: &ServiceInstanceRef) -> Duration {
        let interfaces = declared
            .scale_out
            .saturating_mul(u32::try_from(declared.interface_types.len()).unwrap_or(u32::MAX));
        self.workload_launch.max_wait() + self.routing_instance.max_wait() * interfaces
    }

    /// Upper bound on time spent sleeping during cleanup verification
    pub fn cleanup_budget(&self) -> Duration {
        self.instance_absent.max_wait()
            + self.workload_absent.max_wait()
            + self.network_absent.max_wait()
            + self.routing_instance_absent.max_wait()
    }
}

/// Configuration for the lifecycle verification engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifierConfig {
    /// Network names treated as chain-managed
    pub reserved_networks: Vec<String>,
    /// Run setup verification and the shared-resource teardown checks
    pub do_verify: bool,
    /// Per-stage retry tuning
    pub retry: StagePolicies,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            reserved_networks: DEFAULT_RESERVED_NETWORKS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            do_verify: true,
            retry: StagePolicies::default(),
        }
    }
}

impl VerifierConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("invalid verifier config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn load(path: &Path) -> Result<Self, Error> {
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Reject policies that cannot poll meaningfully
    pub fn validate(&self) -> Result<(), Error> {
        for (name, policy) in self.retry.named() {
            if policy.max_attempts == 0 {
                return Err(Error::config(format!(
                    "retry.{}.max_attempts must be at least 1",
                    name
                )));
            }
            if policy.max_attempts > 1 && policy.interval_ms == 0 {
                return Err(Error::config(format!(
                    "retry.{}.interval_ms must be positive when retrying",
                    name
                )));
            }
        }
        if self.reserved_networks.iter().any(|n| n.is_empty()) {
            return Err(Error::config("reserved_networks must not contain empty names"));
        }
        Ok(())
    }
}

//! chainverify - create, verify and tear down a chained service instance

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use chainverify::config::VerifierConfig;
use chainverify::inventory::HttpInventory;
use chainverify::model::{FqName, ServiceInstanceRef};
use chainverify::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use chainverify::{LifecycleContext, ServiceInstanceFixture, Verdict, DEFAULT_INVENTORY_URL};

/// chainverify - lifecycle verification for chained network service instances
#[derive(Parser, Debug)]
#[command(name = "chainverify", version, about, long_about = None)]
struct Cli {
    /// Base URL of the control plane's inventory API
    #[arg(long, env = "CHAINVERIFY_INVENTORY_URL", default_value = DEFAULT_INVENTORY_URL, global = true)]
    inventory_url: String,

    /// Path to a verifier configuration YAML file
    #[arg(short = 'c', long = "config", env = "CHAINVERIFY_CONFIG", global = true)]
    config_file: Option<PathBuf>,

    /// Emit logs as JSON objects
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the instance, verify it, delete it, verify it is gone
    Lifecycle(InstanceArgs),

    /// Create the instance and verify it is fully present
    ///
    /// The identities confirmed during verification can be written out so a
    /// later `cleanup` run can check them for absence.
    Setup {
        #[command(flatten)]
        instance: InstanceArgs,

        /// Write the lifecycle context to this file
        #[arg(long)]
        context_out: Option<PathBuf>,
    },

    /// Delete the instance and verify it and its chain resources are gone
    Cleanup {
        #[command(flatten)]
        instance: InstanceArgs,

        /// Lifecycle context written by a previous `setup` run
        #[arg(long)]
        context_in: Option<PathBuf>,
    },
}

/// The service instance to operate on
#[derive(Args, Debug)]
struct InstanceArgs {
    /// Fully-qualified instance name, e.g. default-domain:demo:fw
    #[arg(long)]
    instance: String,

    /// Service template the instance is created from
    #[arg(long)]
    template: String,

    /// Interface role each workload carries (repeatable, in template order)
    #[arg(long = "interface", required = true)]
    interfaces: Vec<String>,

    /// Number of workloads to launch
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    scale_out: u32,

    /// Left network passed to the create call
    #[arg(long)]
    left_network: Option<String>,

    /// Right network passed to the create call
    #[arg(long)]
    right_network: Option<String>,
}

impl InstanceArgs {
    fn declared(&self) -> anyhow::Result<ServiceInstanceRef> {
        let fq_name = FqName::parse(&self.instance);
        if fq_name.parts().len() < 2 {
            anyhow::bail!(
                "instance name {:?} must be fully qualified (scope:name)",
                self.instance
            );
        }
        let mut declared =
            ServiceInstanceRef::new(fq_name, self.template.clone(), self.interfaces.clone())
                .with_scale_out(self.scale_out);
        declared.left_network = self.left_network.clone();
        declared.right_network = self.right_network.clone();
        Ok(declared)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        format: if cli.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Text
        },
        ..Default::default()
    })?;

    let config = match &cli.config_file {
        Some(path) => VerifierConfig::load(path)?,
        None => VerifierConfig::default(),
    };
    let api = Arc::new(HttpInventory::new(&cli.inventory_url)?);

    match cli.command {
        Commands::Lifecycle(instance) => {
            let mut fixture =
                ServiceInstanceFixture::new(instance.declared()?, api.clone(), api, config);
            let setup = fixture.setup().await?;
            // Tear down even when setup verification failed
            let cleanup = fixture.cleanup().await?;
            report("setup", setup)?;
            report("cleanup", cleanup)
        }
        Commands::Setup {
            instance,
            context_out,
        } => {
            let mut fixture =
                ServiceInstanceFixture::new(instance.declared()?, api.clone(), api, config);
            let verdict = fixture.setup().await?;
            if let Some(path) = context_out {
                fixture.context().save(&path)?;
                info!(path = %path.display(), "Lifecycle context written");
            }
            report("setup", verdict)
        }
        Commands::Cleanup {
            instance,
            context_in,
        } => {
            let context = match context_in {
                Some(path) => LifecycleContext::load(&path)?,
                // Without a saved context only the instance itself is checked
                None => {
                    let mut context = LifecycleContext::new();
                    context.record_instance();
                    context
                }
            };
            let mut fixture =
                ServiceInstanceFixture::new(instance.declared()?, api.clone(), api, config)
                    .with_context(context);
            let verdict = fixture.cleanup().await?;
            report("cleanup", verdict)
        }
    }
}

fn report(phase: &str, verdict: Verdict) -> anyhow::Result<()> {
    if verdict.passed() {
        info!(phase, "Verification passed");
    }
    verdict
        .into_result()
        .with_context(|| format!("{} verification failed", phase))
}

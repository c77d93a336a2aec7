//! Stories about confirming a freshly created service instance

use std::sync::Arc;

use tokio::time::Instant;

use chainverify::verify::{FailureKind, Stage};
use chainverify::LifecycleContext;

use super::control_plane::{Behavior, ControlPlane};
use super::{firewall, fixture};

/// A platform engineer creates a firewall with two workloads. The control
/// plane realizes it immediately, so setup verification passes and the
/// shared chain networks and routing instances are remembered for teardown.
#[tokio::test(start_paused = true)]
async fn converged_instance_is_verified_and_recorded() {
    let plane = Arc::new(ControlPlane::converging());
    let mut fw = fixture(&plane, firewall("fw").with_scale_out(2));

    let verdict = fw.setup().await.unwrap();
    assert!(verdict.passed(), "{:?}", verdict.detail());

    let ctx = fw.context();
    assert!(ctx.instance_confirmed);
    assert_eq!(ctx.workload_ids.len(), 2);

    let mut networks: Vec<_> = ctx.chain_networks.values().cloned().collect();
    networks.sort();
    assert_eq!(networks, vec!["svc-vn-left", "svc-vn-right"]);
    // Only the pass-through instances carry reserved names; hops are per instance
    assert_eq!(ctx.chain_routing_instances.len(), 2);
}

/// Workloads take a few reads to show up on the instance. Setup verification
/// keeps polling at the workload-launch interval instead of failing.
#[tokio::test(start_paused = true)]
async fn slow_workload_launch_is_polled() {
    let plane = Arc::new(ControlPlane::new(Behavior {
        launch_reads: 3,
        ..Default::default()
    }));
    let mut fw = fixture(&plane, firewall("fw"));

    let start = Instant::now();
    let verdict = fw.setup().await.unwrap();

    assert!(verdict.passed(), "{:?}", verdict.detail());
    assert!(start.elapsed() >= std::time::Duration::from_secs(6));
}

/// The control plane never wires the right-hand interface into its routing
/// instance. Verification polls the routing-instance stage until its budget
/// runs out and names the interface and network in the failure.
#[tokio::test(start_paused = true)]
async fn missing_routing_instance_fails_after_budget() {
    let plane = Arc::new(ControlPlane::new(Behavior {
        broken_chain: Some("right".to_string()),
        ..Default::default()
    }));
    let mut fw = fixture(&plane, firewall("fw"));

    let verdict = fw.setup().await.unwrap();
    let failure = verdict.failure().expect("setup should fail");

    assert_eq!(failure.stage, Stage::RoutingInstance);
    assert_eq!(failure.kind, FailureKind::VerificationFailed);
    assert_eq!(failure.attempts, 5);
    let detail = verdict.detail().unwrap();
    assert!(detail.contains("interface right"), "{}", detail);
    assert!(detail.contains("svc-vn-right"), "{}", detail);

    // Identities confirmed before the failure are still recorded
    assert!(fw.context().instance_confirmed);
    assert!(fw.context().chain_networks.values().any(|n| n == "svc-vn-left"));
}

/// The control plane wires interfaces into their routing instances a few
/// seconds after the interfaces appear. Verification re-reads the interface on
/// each attempt and passes once the refs show up.
#[tokio::test(start_paused = true)]
async fn late_routing_instance_refs_converge_within_budget() {
    let plane = Arc::new(ControlPlane::new(Behavior {
        routing_lag_reads: 3,
        ..Default::default()
    }));
    let mut fw = fixture(&plane, firewall("fw"));

    let start = Instant::now();
    let verdict = fw.setup().await.unwrap();

    assert!(verdict.passed(), "{:?}", verdict.detail());
    // Three stale reads, one second apart, for each of the two interfaces
    assert_eq!(start.elapsed(), std::time::Duration::from_secs(6));
    assert_eq!(fw.context().chain_routing_instances.len(), 2);
}

/// Running setup twice against the same instance reuses it rather than
/// issuing a second create call.
#[tokio::test(start_paused = true)]
async fn repeated_setup_reuses_the_instance() {
    let plane = Arc::new(ControlPlane::converging());

    let mut first = fixture(&plane, firewall("fw"));
    assert!(first.setup().await.unwrap().passed());

    let mut second = fixture(&plane, firewall("fw"));
    assert!(second.setup().await.unwrap().passed());

    assert_eq!(plane.creates(), 1);
    assert_eq!(first.context(), second.context());
}

/// Setup and teardown run in separate processes. The context written after
/// setup lets the teardown run check the same identities.
#[tokio::test(start_paused = true)]
async fn saved_context_drives_a_later_cleanup() {
    let plane = Arc::new(ControlPlane::converging());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fw.json");

    let mut setup = fixture(&plane, firewall("fw"));
    assert!(setup.setup().await.unwrap().passed());
    setup.context().save(&path).unwrap();

    let ctx = LifecycleContext::load(&path).unwrap();
    assert_eq!(&ctx, setup.context());

    let mut teardown = fixture(&plane, firewall("fw")).with_context(ctx);
    let verdict = teardown.cleanup().await.unwrap();
    assert!(verdict.passed(), "{:?}", verdict.detail());
    assert_eq!(plane.network_count(), 0);
}

//! Stories about confirming that a deleted service instance is gone

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use chainverify::verify::{FailureKind, Stage};

use super::control_plane::{Behavior, ControlPlane};
use super::{firewall, fixture};

/// The full lifecycle on a healthy control plane: create, verify present,
/// delete, verify absent. Nothing is left behind.
#[tokio::test(start_paused = true)]
async fn full_lifecycle_leaves_nothing_behind() {
    let plane = Arc::new(ControlPlane::converging());
    let mut fw = fixture(&plane, firewall("fw").with_scale_out(2));

    assert!(fw.setup().await.unwrap().passed());
    let verdict = fw.cleanup().await.unwrap();

    assert!(verdict.passed(), "{:?}", verdict.detail());
    assert_eq!(plane.workload_count(), 0);
    assert_eq!(plane.network_count(), 0);
}

/// The control plane takes a few reads to reclaim the instance. Cleanup
/// verification polls within its budget and passes.
#[tokio::test(start_paused = true)]
async fn slow_reclamation_within_budget_passes() {
    let plane = Arc::new(ControlPlane::new(Behavior {
        reclaim_reads: 4,
        ..Default::default()
    }));
    let mut fw = fixture(&plane, firewall("fw"));
    assert!(fw.setup().await.unwrap().passed());

    let start = Instant::now();
    let verdict = fw.cleanup().await.unwrap();

    assert!(verdict.passed(), "{:?}", verdict.detail());
    assert_eq!(start.elapsed(), Duration::from_secs(8));
}

/// The instance is never reclaimed. Cleanup verification gives up after the
/// instance-absence budget and reports the instance by name.
#[tokio::test(start_paused = true)]
async fn lingering_instance_fails_after_budget() {
    let plane = Arc::new(ControlPlane::new(Behavior {
        stuck_instance: true,
        ..Default::default()
    }));
    let mut fw = fixture(&plane, firewall("fw"));
    assert!(fw.setup().await.unwrap().passed());

    let start = Instant::now();
    let verdict = fw.cleanup().await.unwrap();
    let failure = verdict.failure().expect("cleanup should fail");

    assert_eq!(failure.stage, Stage::InstanceAbsent);
    assert_eq!(failure.kind, FailureKind::VerificationFailed);
    assert_eq!(start.elapsed(), Duration::from_secs(28));
    assert!(verdict
        .detail()
        .unwrap()
        .contains("service instance fw not removed from inventory"));
}

/// The instance goes away but its workload is stuck. The failure points at
/// the workload stage, after the instance check has passed.
#[tokio::test(start_paused = true)]
async fn stuck_workload_is_reported() {
    let plane = Arc::new(ControlPlane::new(Behavior {
        stuck_workloads: true,
        ..Default::default()
    }));
    let mut fw = fixture(&plane, firewall("fw"));
    assert!(fw.setup().await.unwrap().passed());

    let verdict = fw.cleanup().await.unwrap();
    let failure = verdict.failure().expect("cleanup should fail");

    assert_eq!(failure.stage, Stage::WorkloadAbsent);
    assert_eq!(failure.attempts, 12);
    assert!(failure.reason.contains("not deleted"));
}

/// Two firewalls share the project's chain networks. Deleting the first one
/// must not demand the shared networks disappear; deleting the second one
/// does.
#[tokio::test(start_paused = true)]
async fn shared_networks_survive_until_last_instance_is_gone() {
    let plane = Arc::new(ControlPlane::converging());
    let mut first = fixture(&plane, firewall("fw-a"));
    let mut second = fixture(&plane, firewall("fw-b"));
    assert!(first.setup().await.unwrap().passed());
    assert!(second.setup().await.unwrap().passed());

    let verdict = first.cleanup().await.unwrap();
    assert!(verdict.passed(), "{:?}", verdict.detail());
    assert_eq!(plane.network_count(), 2);

    let verdict = second.cleanup().await.unwrap();
    assert!(verdict.passed(), "{:?}", verdict.detail());
    assert_eq!(plane.network_count(), 0);
}

/// Deleting an instance that was never created is a lifecycle error, not a
/// verification verdict.
#[tokio::test]
async fn deleting_unknown_instance_is_an_error() {
    let plane = Arc::new(ControlPlane::converging());
    let mut fw = fixture(&plane, firewall("ghost"));

    let err = fw.cleanup().await.unwrap_err();
    assert!(err.to_string().contains("not found"), "{}", err);
}

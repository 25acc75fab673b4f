use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use cloudsave::admission::{
    AdmissionController, AdmissionKey, AdmissionPolicy, BucketConfig, DashMapBucketStore,
};
use cloudsave::core::{ManualClock, SyncError};

fn controller() -> (AdmissionController, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    ));
    let controller = AdmissionController::new(DashMapBucketStore::new(), clock.clone());
    (controller, clock)
}

#[test]
fn ten_immediate_calls_then_one_per_two_seconds() {
    let (controller, clock) = controller();
    let config = BucketConfig::new(10, 10, 0.5).unwrap();

    for attempt in 0..10 {
        assert!(controller.try_acquire("route", &config), "attempt {attempt}");
    }
    assert!(!controller.try_acquire("route", &config));

    clock.advance(Duration::seconds(2));
    assert!(controller.try_acquire("route", &config));
    assert!(!controller.try_acquire("route", &config));
}

#[test]
fn tokens_stay_within_bounds_for_any_call_sequence() {
    let (controller, clock) = controller();
    let config = BucketConfig::new(5, 3, 1.5).unwrap();

    // Deterministic pseudo-random mix of acquisitions and clock movement,
    // including backwards skew.
    controller.try_acquire("route", &config);
    let mut seed: u64 = 0x5eed;
    for _ in 0..2_000 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        match seed >> 61 {
            0 => clock.advance(Duration::milliseconds((seed % 4_000) as i64)),
            1 => clock.advance(Duration::milliseconds(-((seed % 500) as i64))),
            _ => {
                controller.try_acquire("route", &config);
            }
        }

        let state = controller.peek("route").unwrap();
        assert!(state.tokens >= 0.0, "tokens {}", state.tokens);
        assert!(state.tokens <= f64::from(config.capacity()), "tokens {}", state.tokens);
    }
}

#[test]
fn keys_are_limited_independently() {
    let (controller, _clock) = controller();
    let policy = AdmissionPolicy::new(BucketConfig::full(1, 0.0).unwrap());

    let alice = AdmissionKey::route("/sync").with_client("alice");
    let bob = AdmissionKey::route("/sync").with_client("bob");

    controller.admit_with(&alice, &policy).unwrap();
    let err = controller.admit_with(&alice, &policy).unwrap_err();
    assert_eq!(
        err,
        SyncError::RateLimited {
            key: "/sync|alice".to_string()
        }
    );
    controller.admit_with(&bob, &policy).unwrap();
    assert_eq!(controller.tracked_keys(), 2);
}

#[test]
fn per_route_override_takes_precedence() {
    let (controller, _clock) = controller();
    let policy = AdmissionPolicy::new(BucketConfig::full(100, 0.0).unwrap())
        .with_route("/strict", BucketConfig::full(1, 0.0).unwrap());

    let strict = AdmissionKey::route("/strict");
    controller.admit_with(&strict, &policy).unwrap();
    assert!(controller.admit_with(&strict, &policy).is_err());

    let relaxed = AdmissionKey::route("/relaxed");
    for _ in 0..50 {
        controller.admit_with(&relaxed, &policy).unwrap();
    }
}

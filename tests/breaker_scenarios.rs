/// Breaker Scenario Tests
///
/// Promotes the concrete scenarios from SPEC_FULL.md §8 to integration
/// tests exercised through the crate's public API.
use meshguard::clock::MockClock;
use meshguard::{Breaker, BreakerConfig, BreakerError};
use std::time::Duration;

fn breaker() -> (Breaker, std::sync::Arc<MockClock>) {
    let clock = MockClock::new();
    let breaker = Breaker::new(BreakerConfig::default()).with_clock(clock.clone());
    (breaker, clock)
}

#[test]
fn scenario_1_break_on_endpoint_method() {
    let (breaker, _clock) = breaker();
    breaker.register("A", "a");
    for _ in 0..10 {
        breaker.observe_failure("A", "a");
    }
    assert!(matches!(
        breaker.select_endpoint("a", None),
        Err(BreakerError::CircuitBreakerOpen(_))
    ));
}

#[test]
fn scenario_2_recovery_via_success() {
    let (breaker, _clock) = breaker();
    breaker.register("A", "a");
    for _ in 0..10 {
        breaker.observe_failure("A", "a");
    }
    breaker.observe_success("A", "a");
    assert_eq!(breaker.select_endpoint("a", None).unwrap(), "A");
}

#[test]
fn scenario_3_below_threshold() {
    let (breaker, _clock) = breaker();
    breaker.register("A", "a");
    for _ in 0..5 {
        breaker.observe_failure("A", "a");
    }
    assert_eq!(breaker.select_endpoint("a", None).unwrap(), "A");
}

#[test]
fn scenario_4_endpoint_level_trip_isolated() {
    let (breaker, clock) = breaker();
    breaker.register("A", "a1");
    breaker.register("A", "a2");
    breaker.register("B", "b");

    for _ in 0..5 {
        breaker.observe_failure("A", "a1");
        breaker.observe_failure("A", "a2");
    }
    for _ in 0..5 {
        breaker.observe_success("B", "b");
    }

    assert_eq!(breaker.select_endpoint("b", None).unwrap(), "B");
    assert!(matches!(
        breaker.select_endpoint("a1", None),
        Err(BreakerError::CircuitBreakerOpen(_))
    ));

    clock.advance(Duration::from_secs(120));
    assert_eq!(breaker.select_endpoint("a1", None).unwrap(), "A");
}

#[test]
fn scenario_5_method_level_trip_isolated() {
    let (breaker, clock) = breaker();
    breaker.register("A", "1");
    breaker.register("A", "2");
    breaker.register("B", "1");

    for _ in 0..5 {
        breaker.observe_failure("A", "1");
        breaker.observe_failure("B", "1");
    }
    for _ in 0..5 {
        breaker.observe_success("A", "2");
    }

    assert_eq!(breaker.select_endpoint("2", None).unwrap(), "A");
    assert!(matches!(
        breaker.select_endpoint("1", None),
        Err(BreakerError::CircuitBreakerOpen(_))
    ));

    clock.advance(Duration::from_secs(120));
    let winner = breaker.select_endpoint("1", None).unwrap();
    assert!(winner == "A" || winner == "B");
}

#[test]
fn scenario_6_global_trip() {
    let (breaker, clock) = breaker();
    for endpoint in ["A", "B"] {
        for method in ["1", "2"] {
            breaker.register(endpoint, method);
        }
    }
    for endpoint in ["A", "B"] {
        for method in ["1", "2"] {
            breaker.observe_failure(endpoint, method);
            breaker.observe_failure(endpoint, method);
        }
    }

    match breaker.select_endpoint("1", None) {
        Err(BreakerError::CircuitBreakerOpen(reason)) => assert_eq!(reason, "global"),
        other => panic!("expected global trip, got {:?}", other),
    }

    clock.advance(Duration::from_secs(120));
    let winner = breaker.select_endpoint("1", None).unwrap();
    assert!(winner == "A" || winner == "B");
}

#[test]
fn scenario_7_cleanup_sweep() {
    let (breaker, clock) = breaker();
    breaker.register("A", "1");
    breaker.observe_failure("A", "1");

    clock.advance(Duration::from_secs(99_999));
    assert_eq!(breaker.select_endpoint("1", None).unwrap(), "A");
}

#[test]
fn load_spread_uses_both_slots_of_the_shortlist() {
    use std::collections::HashSet;

    let config = BreakerConfig {
        overprovisioning_factor: 2,
        ..BreakerConfig::default()
    };
    let clock = MockClock::new();
    let mut seen = HashSet::new();
    for seed in 0..100u64 {
        let breaker = Breaker::new(config.clone())
            .with_clock(clock.clone())
            .with_rng(std::sync::Arc::new(meshguard::rng::SeededRngSource::new(seed)));
        for e in ["A", "B", "C", "D"] {
            breaker.register(e, "m");
        }
        seen.insert(breaker.select_endpoint("m", None).unwrap());
    }
    assert_eq!(seen.len(), 2, "expected both top-2 shortlist slots to be hit");
}

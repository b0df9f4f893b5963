use std::time::Duration;

use super::*;

#[test]
fn test_delay_starts_at_base_and_doubles() {
    let policy = BackoffPolicy {
        max_retries: 0,
        base_delay_ms: 250,
        max_delay_ms: 30_000,
    };

    assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(250));
    assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(500));
    assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(1000));
    assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(2000));
}

#[test]
fn test_delay_caps_at_max() {
    let policy = BackoffPolicy {
        max_retries: 0,
        base_delay_ms: 250,
        max_delay_ms: 1000,
    };

    assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(1000));
    assert_eq!(policy.delay_for_attempt(10), Duration::from_millis(1000));
    // absurdly large attempts must not overflow
    assert_eq!(policy.delay_for_attempt(10_000), Duration::from_millis(1000));
}

#[test]
fn test_zero_max_retries_never_exhausts() {
    let policy = BackoffPolicy::default();
    assert!(!policy.exhausted(1));
    assert!(!policy.exhausted(100_000));
}

#[test]
fn test_bounded_max_retries_exhausts_past_limit() {
    let policy = BackoffPolicy {
        max_retries: 3,
        ..BackoffPolicy::default()
    };
    assert!(!policy.exhausted(3));
    assert!(policy.exhausted(4));
}

#[test]
fn test_validate_rejects_zero_base_delay() {
    let policy = BackoffPolicy {
        base_delay_ms: 0,
        ..BackoffPolicy::default()
    };
    assert!(policy.validate().is_err());
}

#[test]
fn test_validate_rejects_cap_below_base() {
    let policy = BackoffPolicy {
        base_delay_ms: 1000,
        max_delay_ms: 500,
        ..BackoffPolicy::default()
    };
    assert!(policy.validate().is_err());
}

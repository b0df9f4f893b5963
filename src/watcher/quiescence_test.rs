use std::time::Duration;

use tokio::time::advance;
use tokio::time::Instant;

use super::quiescence::QuiescenceTimer;

#[tokio::test(start_paused = true)]
async fn test_new_timer_arms_min_deadline() {
    let timer = QuiescenceTimer::new(Duration::from_millis(500), Duration::from_millis(2000));

    assert_eq!(timer.remaining(), Duration::from_millis(500));
    assert!(!timer.is_expired());
}

#[tokio::test(start_paused = true)]
async fn test_extend_pushes_min_deadline_out() {
    let mut timer = QuiescenceTimer::new(Duration::from_millis(500), Duration::from_millis(2000));

    advance(Duration::from_millis(400)).await;
    timer.extend();

    // 500ms from the extension, not from the original arm time
    assert_eq!(timer.remaining(), Duration::from_millis(500));
}

/// Repeated extensions can never push the batch past the max deadline.
#[tokio::test(start_paused = true)]
async fn test_max_deadline_caps_extensions() {
    let start = Instant::now();
    let mut timer = QuiescenceTimer::new(Duration::from_millis(500), Duration::from_millis(1000));

    advance(Duration::from_millis(400)).await;
    timer.extend();
    advance(Duration::from_millis(400)).await;
    timer.extend();

    assert_eq!(timer.next_deadline(), start + Duration::from_millis(1000));

    advance(Duration::from_millis(250)).await;
    assert!(timer.is_expired());
}

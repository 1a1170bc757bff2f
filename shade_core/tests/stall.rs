use std::time::Duration;

use proptest::prelude::*;
use rstest::rstest;
use shade_core::{StallCfg, wait_for_stall};
use shade_traits::clock::test_clock::TestClock;

fn cfg() -> StallCfg {
    StallCfg {
        window: Duration::from_secs(3),
        poll_interval: Duration::from_millis(500),
    }
}

#[test]
fn holding_position_returns_at_three_seconds() {
    let clock = TestClock::new();
    let mut samples = 0u32;
    let mut feed = || {
        samples += 1;
        Some(50u8)
    };
    let pos = wait_for_stall(&mut feed, &cfg(), Duration::from_secs(120), &clock).unwrap();
    assert_eq!(pos, 50);
    assert_eq!(clock.offset(), Duration::from_secs(3));
    // t = 0.0, 0.5, ..., 3.0
    assert_eq!(samples, 7);
}

#[test]
fn ever_changing_position_times_out() {
    let clock = TestClock::new();
    let mut p = 0u8;
    let mut feed = || {
        p = p.wrapping_add(1) % 101;
        Some(p)
    };
    let err = wait_for_stall(&mut feed, &cfg(), Duration::from_secs(30), &clock).unwrap_err();
    assert!(err.elapsed >= Duration::from_secs(30));
    assert!(err.last_position.is_some());
}

#[rstest]
#[case(Duration::from_millis(250), Duration::from_secs(1))]
#[case(Duration::from_millis(500), Duration::from_secs(3))]
#[case(Duration::from_secs(1), Duration::from_secs(1))]
fn window_is_honoured_for_other_settings(#[case] poll: Duration, #[case] window: Duration) {
    let clock = TestClock::new();
    let cfg = StallCfg {
        window,
        poll_interval: poll,
    };
    let mut feed = || Some(7u8);
    assert_eq!(
        wait_for_stall(&mut feed, &cfg, Duration::from_secs(60), &clock).unwrap(),
        7
    );
    assert_eq!(clock.offset(), window);
}

proptest! {
    // Never earlier than `window` after the value first appeared.
    #[test]
    fn stall_never_reported_early(moves in proptest::collection::vec(0u8..=100, 0..20), hold in 0u8..=100) {
        let clock = TestClock::new();
        let mut it = moves.clone().into_iter();
        let mut feed = move || Some(it.next().unwrap_or(hold));
        let pos = wait_for_stall(&mut feed, &cfg(), Duration::from_secs(600), &clock).unwrap();
        prop_assert_eq!(pos, hold);

        // Index of the first sample in the final run of `hold`.
        let mut first = moves.len();
        while first > 0 && moves[first - 1] == hold {
            first -= 1;
        }
        let first_seen = cfg().poll_interval * u32::try_from(first).unwrap();
        prop_assert_eq!(clock.offset(), first_seen + cfg().window);
    }

    #[test]
    fn moving_feed_reports_timeout_not_early(timeout_s in 1u64..60) {
        let clock = TestClock::new();
        let mut up = false;
        let mut feed = move || {
            up = !up;
            Some(if up { 40u8 } else { 41 })
        };
        let timeout = Duration::from_secs(timeout_s);
        let err = wait_for_stall(&mut feed, &cfg(), timeout, &clock).unwrap_err();
        prop_assert!(err.elapsed >= timeout);
        prop_assert!(err.elapsed < timeout + cfg().poll_interval);
    }
}

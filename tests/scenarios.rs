use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{self, Instant};
use tokio_test::{assert_pending, assert_ready_eq, task};
use trailcrab::{ThrottleConfig, Throttler, ThrottlerBuilder};

type Log<A> = Arc<Mutex<Vec<(A, Instant)>>>;

/// Let spawned tasks run without moving the paused clock
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn args<A: Clone>(log: &Log<A>) -> Vec<A> {
    log.lock().iter().map(|(a, _)| a.clone()).collect()
}

#[tokio::test(start_paused = true)]
async fn scenario_a_calls_inside_window_are_held_back() {
    let log: Log<&'static str> = Arc::default();
    let throttler = {
        let log = log.clone();
        Throttler::new(
            move |arg: &'static str| {
                log.lock().push((arg, Instant::now()));
                async move { Ok::<_, String>(arg) }
            },
            ThrottleConfig::from_millis(100),
        )
        .unwrap()
    };

    let first = throttler.request("first");
    assert_eq!(args(&log), vec!["first"]);

    let mut second = task::spawn(throttler.request("second"));
    let mut third = task::spawn(throttler.request("third"));

    time::advance(Duration::from_millis(99)).await;
    settle().await;

    assert_eq!(first.await, Some("first"));
    assert_eq!(args(&log), vec!["first"]);
    assert_eq!(throttler.execution_count(), 1);
    assert_pending!(second.poll());
    assert_pending!(third.poll());

    // Once the window reopens the last of them runs
    time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(args(&log), vec!["first", "third"]);
    assert_ready_eq!(second.poll(), Some("third"));
    assert_ready_eq!(third.poll(), Some("third"));
}

#[tokio::test(start_paused = true)]
async fn scenario_b_requests_during_long_execution_keep_only_the_last() {
    let log: Log<u32> = Arc::default();
    let throttler = {
        let log = log.clone();
        ThrottlerBuilder::<String>::new()
            .wait(Duration::from_millis(1000))
            .build(move |n: u32| {
                log.lock().push((n, Instant::now()));
                async move {
                    if n == 1 {
                        time::sleep(Duration::from_millis(500)).await;
                    }
                    Ok(n)
                }
            })
            .unwrap()
    };
    let start = Instant::now();

    let one = throttler.request(1);
    let two = throttler.request(2);
    let three = throttler.request(3);

    time::advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(throttler.execution_count(), 1);
    assert_eq!(one.await, Some(1));

    time::advance(Duration::from_millis(499)).await;
    settle().await;
    assert_eq!(args(&log), vec![1]);

    time::advance(Duration::from_millis(1)).await;
    settle().await;
    assert_eq!(args(&log), vec![1, 3]);
    assert_eq!(log.lock()[1].1, start + Duration::from_millis(1000));

    assert_eq!(two.await, Some(3));
    assert_eq!(three.await, Some(3));
    assert_eq!(throttler.execution_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn scenario_c_trailing_then_immediate() {
    let log: Log<char> = Arc::default();
    let throttler = {
        let log = log.clone();
        Throttler::new(
            move |c: char| {
                log.lock().push((c, Instant::now()));
                async move { Ok::<_, String>(c) }
            },
            ThrottleConfig::from_millis(100),
        )
        .unwrap()
    };
    let start = Instant::now();

    assert_eq!(throttler.request('a').await, Some('a'));
    assert_eq!(
        throttler.next_execution_time(),
        Some(start + Duration::from_millis(100))
    );

    let b = throttler.request('b');
    assert_eq!(args(&log), vec!['a']);

    time::advance(Duration::from_millis(100)).await;
    assert_eq!(b.await, Some('b'));
    assert_eq!(throttler.execution_count(), 2);
    assert_eq!(args(&log).last(), Some(&'b'));
    assert_eq!(
        throttler.next_execution_time(),
        Some(start + Duration::from_millis(200))
    );

    time::advance(Duration::from_millis(100)).await;
    let c = throttler.request('c');
    assert_eq!(args(&log), vec!['a', 'b', 'c']);
    assert_eq!(c.await, Some('c'));
    assert_eq!(throttler.execution_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn scenario_d_failure_without_observer_is_swallowed() {
    let calls = Arc::new(Mutex::new(0u32));
    let throttler = {
        let calls = calls.clone();
        Throttler::new(
            move |_: ()| {
                let attempt = {
                    let mut calls = calls.lock();
                    *calls += 1;
                    *calls
                };
                async move {
                    if attempt == 1 {
                        Err(std::io::Error::other("first call fails"))
                    } else {
                        Ok(attempt)
                    }
                }
            },
            ThrottleConfig::from_millis(250),
        )
        .unwrap()
    };

    assert_eq!(throttler.request(()).await, None);
    assert_eq!(throttler.execution_count(), 1);

    time::advance(Duration::from_millis(250)).await;
    assert_eq!(throttler.request(()).await, Some(2));
    assert_eq!(throttler.execution_count(), 2);
    assert_eq!(throttler.metrics().failures, 1);
}

#[test]
fn zero_wait_is_rejected_at_construction() {
    let result = Throttler::new(
        |n: u32| async move { Ok::<_, String>(n) },
        ThrottleConfig::new(Duration::ZERO),
    );
    assert!(matches!(result, Err(trailcrab::ThrottleError::ZeroWait)));
}

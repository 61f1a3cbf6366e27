// ==============================================
// FILTERED PUB/SUB DELIVERY (integration)
// ==============================================
//
// Filter routing, per-subscriber FIFO, close semantics, and
// concurrent publishing through the public surface.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use taskmill::{Publication, SubscribeOptions};

async fn collect_n(sub: &mut taskmill::Subscriber<i64>, n: usize) -> Vec<i64> {
    let mut got = Vec::with_capacity(n);
    for _ in 0..n {
        let msg = timeout(Duration::from_secs(5), sub.recv())
            .await
            .expect("receive deadline exceeded")
            .expect("buffer closed early");
        got.push(msg);
    }
    got
}

// ==============================================
// Filter routing
// ==============================================

#[tokio::test]
async fn parity_filters_split_the_stream() {
    let numbers: Publication<i64> = Publication::new();
    let mut evens =
        numbers.subscribe_with(16, SubscribeOptions::new().with_filter(|n| n % 2 == 0));
    let mut odds = numbers.subscribe_with(16, SubscribeOptions::new().with_filter(|n| n % 2 == 1));

    numbers.publish(2);
    numbers.publish(3);

    assert_eq!(collect_n(&mut evens, 1).await, vec![2]);
    assert_eq!(collect_n(&mut odds, 1).await, vec![3]);

    // neither sees the other's message in any window
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(evens.try_recv().is_none());
    assert!(odds.try_recv().is_none());
}

#[tokio::test]
async fn reject_all_filter_delivers_nothing_regardless_of_volume() {
    let numbers: Publication<i64> = Publication::new();
    let filtered_out = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&filtered_out);
    let mut silent = numbers.subscribe_with(
        16,
        SubscribeOptions::new()
            .with_filter(|_| false)
            .on_filtered(move |_| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
    );

    for i in 0..50 {
        numbers.publish(i);
    }

    assert_eq!(filtered_out.load(Ordering::Relaxed), 50);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(silent.try_recv().is_none());
}

// ==============================================
// Per-subscriber ordering
// ==============================================

#[tokio::test]
async fn single_publisher_preserves_per_subscriber_fifo() {
    let numbers: Publication<i64> = Publication::new();
    let mut evens =
        numbers.subscribe_with(32, SubscribeOptions::new().with_filter(|n| n % 2 == 0));

    for i in 1..=10 {
        numbers.publish(i);
        // settle each delivery before the next publish; ordering is
        // only promised per subscriber up to send completion
        tokio::task::yield_now().await;
    }

    assert_eq!(collect_n(&mut evens, 5).await, vec![2, 4, 6, 8, 10]);
}

// ==============================================
// Close semantics
// ==============================================

#[tokio::test]
async fn close_terminates_every_subscriber() {
    let words: Publication<i64> = Publication::new();
    let mut a = words.subscribe(4);
    let mut b = words.subscribe(4);

    words.publish(1);
    tokio::task::yield_now().await;
    words.close();

    assert_eq!(words.subscriber_count(), 0);
    // drain whatever landed, then observe the closed buffer
    while timeout(Duration::from_secs(1), a.recv())
        .await
        .expect("drain deadline")
        .is_some()
    {}
    while timeout(Duration::from_secs(1), b.recv())
        .await
        .expect("drain deadline")
        .is_some()
    {}
}

// ==============================================
// Concurrent publishing
// ==============================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publishers_lose_nothing_under_ample_buffers() {
    let numbers: Publication<i64> = Publication::new();
    let mut all = numbers.subscribe(256);

    let mut publishers = Vec::new();
    for task_id in 0..4i64 {
        let numbers = numbers.clone();
        publishers.push(tokio::spawn(async move {
            for i in 0..25i64 {
                numbers.publish(task_id * 100 + i);
            }
        }));
    }
    for p in publishers {
        p.await.expect("publisher panicked");
    }

    let received = collect_n(&mut all, 100).await;
    let unique: HashSet<i64> = received.iter().copied().collect();
    assert_eq!(unique.len(), 100, "every message arrives exactly once");
}

//! End-to-end tests for the join engine: chunk preservation, intra-stream
//! order, bounded concurrency, zero-leak termination, error funnel and
//! composition, preconditions, and cancellation.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::watch;

use conflux::{
    either, par_join, par_join_unbounded, Chunk, ChunkStream, Either, Event, EventKind,
    JoinConfig, JoinError, JoinFailure, JoinStream, Joiner, Observe, OuterStream, Scope,
};

// ---- helpers ----

fn chunks(batches: Vec<Vec<i32>>) -> ChunkStream<i32> {
    stream::iter(
        batches
            .into_iter()
            .map(|b| Ok(Chunk::from_vec(b)))
            .collect::<Vec<_>>(),
    )
    .boxed()
}

fn failing(reason: &'static str) -> ChunkStream<i32> {
    stream::iter([Err(JoinError::inner(reason))]).boxed()
}

fn outer_of(inners: Vec<ChunkStream<i32>>) -> OuterStream<i32> {
    stream::iter(inners.into_iter().map(Ok).collect::<Vec<_>>()).boxed()
}

async fn drain<T>(mut joined: JoinStream<T>) -> (Vec<T>, Option<JoinFailure>) {
    let mut elems = Vec::new();
    let mut failure = None;
    while let Some(item) = joined.next().await {
        match item {
            Ok(chunk) => elems.extend(chunk),
            Err(f) => failure = Some(f),
        }
    }
    (elems, failure)
}

fn sorted(mut v: Vec<i32>) -> Vec<i32> {
    v.sort_unstable();
    v
}

fn position(haystack: &[i32], needle: i32) -> usize {
    haystack.iter().position(|&n| n == needle).unwrap()
}

/// Observer recording admission/finish counts and the quiesce event.
struct Recorder {
    admitted: AtomicUsize,
    finished: AtomicUsize,
    quiesced_tx: watch::Sender<bool>,
}

impl Recorder {
    fn new() -> (Arc<Self>, watch::Receiver<bool>) {
        let (quiesced_tx, rx) = watch::channel(false);
        (
            Arc::new(Self {
                admitted: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
                quiesced_tx,
            }),
            rx,
        )
    }
}

#[async_trait]
impl Observe for Recorder {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::InnerAdmitted => {
                self.admitted.fetch_add(1, Ordering::SeqCst);
            }
            EventKind::InnerStopped | EventKind::InnerFailed => {
                self.finished.fetch_add(1, Ordering::SeqCst);
            }
            EventKind::Quiesced => {
                let _ = self.quiesced_tx.send(true);
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

async fn await_quiesced(rx: &mut watch::Receiver<bool>) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|q| *q))
        .await
        .expect("join did not quiesce in time")
        .expect("quiesce channel dropped");
}

// ---- end-to-end scenarios ----

#[tokio::test]
async fn single_inner_passes_through_in_order() {
    let joined = par_join(outer_of(vec![chunks(vec![vec![1, 2, 3]])]), 1).unwrap();
    let (elems, failure) = drain(joined).await;

    assert_eq!(elems, vec![1, 2, 3]);
    assert!(failure.is_none());
}

#[tokio::test]
async fn two_inners_merge_all_elements_pairwise_ordered() {
    let joined = par_join(
        outer_of(vec![chunks(vec![vec![1], vec![2]]), chunks(vec![vec![3], vec![4]])]),
        2,
    )
    .unwrap();
    let (elems, failure) = drain(joined).await;

    assert!(failure.is_none());
    assert_eq!(sorted(elems.clone()), vec![1, 2, 3, 4]);
    assert!(position(&elems, 1) < position(&elems, 2));
    assert!(position(&elems, 3) < position(&elems, 4));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_never_exceeds_max_open() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    // Inner streams that track how many of them run at once.
    let gauged = |items: Vec<i32>| -> ChunkStream<i32> {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        stream::unfold(
            (0usize, items, active, peak),
            |(i, items, active, peak)| async move {
                if i == 0 {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                }
                if i < items.len() {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    let item = items[i];
                    Some((Ok(Chunk::singleton(item)), (i + 1, items, active, peak)))
                } else {
                    active.fetch_sub(1, Ordering::SeqCst);
                    None
                }
            },
        )
        .boxed()
    };

    let inners = vec![
        gauged(vec![1, 2, 3]),
        gauged(vec![4, 5, 6]),
        gauged(vec![7, 8, 9]),
    ];
    let joined = par_join(outer_of(inners), 2).unwrap();
    let (elems, failure) = drain(joined).await;

    assert!(failure.is_none());
    assert_eq!(sorted(elems), (1..=9).collect::<Vec<_>>());
    assert!(peak.load(Ordering::SeqCst) <= 2, "peak concurrency exceeded max_open");
}

#[tokio::test]
async fn one_failing_inner_fails_the_join() {
    let inners = vec![
        chunks(vec![vec![1, 2]]),
        failing("boom"),
        chunks(vec![vec![3, 4]]),
    ];
    let joined = par_join(outer_of(inners), 3).unwrap();
    let (elems, failure) = drain(joined).await;

    let failure = failure.expect("join must fail");
    assert!(failure.contains_label("inner_failed"));
    assert!(failure.iter().any(|e| e.to_string().contains("boom")));
    for n in elems {
        assert!((1..=4).contains(&n));
    }
}

#[tokio::test]
async fn external_cancellation_reaches_quiescence() {
    let (rec, mut quiesced) = Recorder::new();
    let joiner = Joiner::new(JoinConfig::bounded(1), vec![rec.clone() as Arc<dyn Observe>]);

    let forever: ChunkStream<i32> = stream::repeat_with(|| Ok(Chunk::singleton(0))).boxed();
    let joined = joiner.join(outer_of(vec![forever])).unwrap();

    // Take a few chunks, then drop the join stream (external cancellation).
    let got: Vec<_> = joined.take(3).collect().await;
    assert_eq!(got.len(), 3);
    for item in got {
        assert_eq!(item.unwrap().into_vec(), vec![0]);
    }

    await_quiesced(&mut quiesced).await;
    assert_eq!(
        rec.admitted.load(Ordering::SeqCst),
        rec.finished.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn outer_failure_fails_the_join() {
    let outer: OuterStream<i32> = stream::iter([
        Ok(chunks(vec![vec![1]])),
        Ok(chunks(vec![vec![2]])),
        Err(JoinError::outer("outer-boom")),
    ])
    .boxed();

    let (elems, failure) = drain(par_join(outer, 2).unwrap()).await;

    let failure = failure.expect("join must fail");
    assert!(failure.contains_label("outer_failed"));
    for n in elems {
        assert!(n == 1 || n == 2);
    }
}

// ---- equivalence laws ----

#[tokio::test]
async fn empty_outer_is_the_empty_stream() {
    let (elems, failure) = drain(par_join(outer_of(Vec::new()), 4).unwrap()).await;
    assert!(elems.is_empty());
    assert!(failure.is_none());
}

#[tokio::test]
async fn singleton_join_is_equivalent_to_the_inner() {
    // Clean inner: same elements, same termination.
    let joined = par_join(outer_of(vec![chunks(vec![vec![1], vec![2, 3]])]), 1).unwrap();
    let (elems, failure) = drain(joined).await;
    assert_eq!(elems, vec![1, 2, 3]);
    assert!(failure.is_none());

    // Failing inner: same elements, same terminal error as primary.
    let inner: ChunkStream<i32> = stream::iter([
        Ok(Chunk::singleton(1)),
        Err(JoinError::inner("inner-boom")),
    ])
    .boxed();
    let joined = par_join(outer_of(vec![inner]), 1).unwrap();
    let (elems, failure) = drain(joined).await;
    assert_eq!(elems, vec![1]);
    assert_eq!(
        failure.unwrap().primary(),
        &JoinError::inner("inner-boom")
    );
}

// ---- preconditions ----

#[tokio::test]
async fn zero_max_open_fails_before_spawning() {
    let err = par_join(outer_of(vec![chunks(vec![vec![1]])]), 0).unwrap_err();
    assert_eq!(err, JoinError::InvalidMaxOpen { max_open: 0 });
}

#[tokio::test]
async fn unbounded_join_merges_everything() {
    let inners = (0..8)
        .map(|i| chunks(vec![vec![i]]))
        .collect::<Vec<_>>();
    let (elems, failure) = drain(par_join_unbounded(outer_of(inners)).unwrap()).await;

    assert!(failure.is_none());
    assert_eq!(sorted(elems), (0..8).collect::<Vec<_>>());
}

// ---- scopes, leases, and error composition ----

#[tokio::test]
async fn scope_finalizers_run_at_termination() {
    let scope = Scope::new();
    let finalized = Arc::new(AtomicBool::new(false));

    let flag = Arc::clone(&finalized);
    scope
        .register(async move {
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();

    let joiner = Joiner::new(JoinConfig::bounded(2), Vec::new());
    let joined = joiner
        .join_scoped(
            outer_of(vec![chunks(vec![vec![1]]), chunks(vec![vec![2]])]),
            scope.clone(),
        )
        .unwrap();
    let (elems, failure) = drain(joined).await;

    assert!(failure.is_none());
    assert_eq!(sorted(elems), vec![1, 2]);
    assert!(finalized.load(Ordering::SeqCst), "finalizer must run before end-of-stream");
    assert!(scope.is_closed().await);
}

#[tokio::test]
async fn producer_and_finalizer_errors_compose() {
    let scope = Scope::new();
    scope
        .register(async { Err(JoinError::finalizer("cleanup-boom")) })
        .await
        .unwrap();

    let joiner = Joiner::new(JoinConfig::bounded(1), Vec::new());
    let joined = joiner
        .join_scoped(outer_of(vec![failing("inner-boom")]), scope)
        .unwrap();
    let (_, failure) = drain(joined).await;

    let failure = failure.expect("join must fail");
    assert_eq!(failure.primary(), &JoinError::inner("inner-boom"));
    assert!(failure.contains_label("finalizer_failed"));
    assert_eq!(failure.suppressed().len(), 1);
}

#[tokio::test]
async fn lease_on_closed_scope_is_fatal() {
    let scope = Scope::new();
    scope.close().await;

    let joiner = Joiner::new(JoinConfig::bounded(1), Vec::new());
    let joined = joiner
        .join_scoped(outer_of(vec![chunks(vec![vec![1]])]), scope)
        .unwrap();
    let (elems, failure) = drain(joined).await;

    assert!(elems.is_empty());
    let failure = failure.expect("join must fail");
    assert_eq!(failure.primary(), &JoinError::LeaseOnClosedScope);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_compose_into_one_composite() {
    // Both inners fail right after the same barrier so the failures land
    // as close together as the scheduler allows. Whichever arrives second
    // may be suppressed by interruption; every retained error must be one
    // of the two, and at least one must be retained.
    let barrier = Arc::new(tokio::sync::Barrier::new(2));

    let fail_after_barrier = |reason: &'static str| -> ChunkStream<i32> {
        let barrier = Arc::clone(&barrier);
        stream::once(async move {
            barrier.wait().await;
            Err(JoinError::inner(reason))
        })
        .boxed()
    };

    let inners = vec![fail_after_barrier("first"), fail_after_barrier("second")];
    let (_, failure) = drain(par_join(outer_of(inners), 2).unwrap()).await;

    let failure = failure.expect("join must fail");
    assert!(failure.iter().count() >= 1);
    for err in failure.iter() {
        let text = err.to_string();
        assert!(text.contains("first") || text.contains("second"));
    }
}

// ---- two-way merge ----

#[tokio::test]
async fn either_tags_both_sides() {
    let left: ChunkStream<i32> = stream::iter([Ok(Chunk::from_vec(vec![1, 2]))]).boxed();
    let right: ChunkStream<&'static str> =
        stream::iter([Ok(Chunk::from_vec(vec!["a", "b"]))]).boxed();

    let (elems, failure) = drain(either(left, right).unwrap()).await;

    assert!(failure.is_none());
    let mut lefts = Vec::new();
    let mut rights = Vec::new();
    for e in elems {
        match e {
            Either::Left(n) => lefts.push(n),
            Either::Right(s) => rights.push(s),
        }
    }
    assert_eq!(lefts, vec![1, 2]);
    assert_eq!(rights, vec!["a", "b"]);
}

// ---- zero-leak accounting ----

#[tokio::test]
async fn every_admission_is_matched_by_an_exit() {
    let (rec, mut quiesced) = Recorder::new();
    let joiner = Joiner::new(JoinConfig::bounded(2), vec![rec.clone() as Arc<dyn Observe>]);

    let inners = vec![
        chunks(vec![vec![1], vec![2]]),
        failing("boom"),
        chunks(vec![vec![3]]),
        chunks(vec![vec![4], vec![5]]),
    ];
    let (_, failure) = drain(joiner.join(outer_of(inners)).unwrap()).await;
    assert!(failure.is_some());

    await_quiesced(&mut quiesced).await;
    let admitted = rec.admitted.load(Ordering::SeqCst);
    let finished = rec.finished.load(Ordering::SeqCst);
    assert!(admitted >= 1);
    assert_eq!(admitted, finished, "every admitted runner must exit exactly once");
}

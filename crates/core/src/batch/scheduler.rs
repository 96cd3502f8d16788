//! Generational worker-pool scheduler for batch files
//!
//! Invocations are split into segments at `commit-batch` barriers. Each
//! segment gets its own worker pool (a generation), sized
//! `min(segment length, max_workers)`. A new generation never starts until
//! the previous one has fully drained, which is the barrier guarantee:
//! nothing after a barrier runs before everything ahead of it finished.
//! Within a segment there is no ordering.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use steward_domain::Invocation;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ports::{InvocationOutcome, InvocationRunner, OutcomeKind};

/// Summary of a completed (or cancelled) batch run.
#[derive(Debug)]
pub struct BatchReport {
    /// Per-item outcomes, in submission order. Barrier lines are not items.
    pub outcomes: Vec<InvocationOutcome>,
    /// Worker-pool size of each generation, in order.
    pub generations: Vec<usize>,
}

impl BatchReport {
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.count(OutcomeKind::Success)
    }

    #[must_use]
    pub fn soft_errors(&self) -> usize {
        self.count(OutcomeKind::SoftError)
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(OutcomeKind::Fatal)
    }

    fn count(&self, kind: OutcomeKind) -> usize {
        self.outcomes.iter().filter(|o| o.kind == kind).count()
    }
}

/// Drives a list of invocations through worker pools.
pub struct BatchScheduler {
    runner: Arc<dyn InvocationRunner>,
    max_workers: usize,
    progress_interval: usize,
    cancel: CancellationToken,
}

impl BatchScheduler {
    pub fn new(
        runner: Arc<dyn InvocationRunner>,
        max_workers: usize,
        progress_interval: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self { runner, max_workers: max_workers.max(1), progress_interval, cancel }
    }

    /// Run the batch to completion or cancellation.
    ///
    /// One failing invocation never aborts the batch; its failure is
    /// recorded in the report and the rest of the segment proceeds.
    /// Cancellation is best-effort: in-flight invocations finish, pending
    /// ones are reported as fatal with a "cancelled" detail.
    pub async fn run(&self, invocations: Vec<Invocation>) -> BatchReport {
        let items: Arc<Vec<Invocation>> =
            Arc::new(invocations.iter().filter(|i| !i.is_barrier()).cloned().collect());
        let segments = split_segments(&invocations);
        let total = items.len();

        info!(total, segments = segments.len(), "starting batch");

        let mut collected: Vec<Option<InvocationOutcome>> = (0..total).map(|_| None).collect();
        let mut generations = Vec::with_capacity(segments.len());
        let finished = Arc::new(AtomicUsize::new(0));

        for (generation, segment) in segments.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                break;
            }

            let workers = segment.len().min(self.max_workers);
            generations.push(workers);
            debug!(generation, items = segment.len(), workers, "starting generation");

            let queue: Arc<Mutex<VecDeque<usize>>> =
                Arc::new(Mutex::new(segment.into_iter().collect()));
            let (result_tx, mut result_rx) = mpsc::unbounded_channel();

            let mut handles = Vec::with_capacity(workers);
            for _ in 0..workers {
                let queue = Arc::clone(&queue);
                let items = Arc::clone(&items);
                let runner = Arc::clone(&self.runner);
                let cancel = self.cancel.clone();
                let finished = Arc::clone(&finished);
                let result_tx = result_tx.clone();
                let progress_interval = self.progress_interval;

                handles.push(tokio::spawn(async move {
                    loop {
                        if cancel.is_cancelled() {
                            break;
                        }
                        let next = queue.lock().await.pop_front();
                        let Some(index) = next else { break };

                        let outcome = runner.run(&items[index]).await;
                        let done = finished.fetch_add(1, Ordering::SeqCst) + 1;
                        if progress_interval > 0 && done % progress_interval == 0 {
                            info!(finished = done, total, "batch progress");
                        }
                        if result_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                }));
            }
            drop(result_tx);

            // Barrier: the generation is drained before the next one starts.
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "batch worker task failed");
                }
            }
            while let Some((index, outcome)) = result_rx.recv().await {
                collected[index] = Some(outcome);
            }
        }

        let outcomes = items
            .iter()
            .zip(collected)
            .map(|(invocation, outcome)| {
                outcome.unwrap_or_else(|| {
                    InvocationOutcome::fatal(invocation.clone(), "cancelled before dispatch")
                })
            })
            .collect();

        let report = BatchReport { outcomes, generations };
        info!(
            total = report.total(),
            succeeded = report.succeeded(),
            soft_errors = report.soft_errors(),
            failed = report.failed(),
            "batch finished"
        );
        report
    }
}

/// Split into per-generation index runs, barriers removed. Indices count
/// non-barrier items only, so they line up with report positions.
fn split_segments(invocations: &[Invocation]) -> Vec<Vec<usize>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    let mut index = 0;
    for invocation in invocations {
        if invocation.is_barrier() {
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
        } else {
            current.push(index);
            index += 1;
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;

    /// Records a (start, end) span per invocation, optionally failing some.
    struct RecordingRunner {
        spans: StdMutex<Vec<(String, Instant, Instant)>>,
        soft_tokens: Vec<String>,
        delay: Duration,
        active: AtomicUsize,
        peak_active: AtomicUsize,
        cancel_after: Option<(usize, CancellationToken)>,
        runs: AtomicUsize,
    }

    impl RecordingRunner {
        fn new(delay: Duration) -> Self {
            Self {
                spans: StdMutex::new(Vec::new()),
                soft_tokens: Vec::new(),
                delay,
                active: AtomicUsize::new(0),
                peak_active: AtomicUsize::new(0),
                cancel_after: None,
                runs: AtomicUsize::new(0),
            }
        }

        fn spans_for(&self, prefix: &str) -> Vec<(Instant, Instant)> {
            self.spans
                .lock()
                .unwrap()
                .iter()
                .filter(|(name, _, _)| name.starts_with(prefix))
                .map(|(_, s, e)| (*s, *e))
                .collect()
        }
    }

    #[async_trait]
    impl InvocationRunner for RecordingRunner {
        async fn run(&self, invocation: &Invocation) -> InvocationOutcome {
            let start = Instant::now();
            let concurrent = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_active.fetch_max(concurrent, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.active.fetch_sub(1, Ordering::SeqCst);
            let end = Instant::now();
            let name = invocation.to_string();
            self.spans.lock().unwrap().push((name.clone(), start, end));

            let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some((after, token)) = &self.cancel_after {
                if run >= *after {
                    token.cancel();
                }
            }

            if self.soft_tokens.iter().any(|t| name.contains(t.as_str())) {
                InvocationOutcome::soft(invocation.clone(), "already exists")
            } else {
                InvocationOutcome::success(invocation.clone())
            }
        }
    }

    fn invocation(tokens: &[&str]) -> Invocation {
        Invocation::new(tokens.iter().map(ToString::to_string).collect()).unwrap()
    }

    fn scheduler(runner: Arc<RecordingRunner>, max_workers: usize) -> BatchScheduler {
        BatchScheduler::new(runner, max_workers, 25, CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn barrier_drains_before_next_generation_starts() {
        let runner = Arc::new(RecordingRunner::new(Duration::from_millis(50)));
        let batch = vec![
            invocation(&["pre", "1"]),
            invocation(&["pre", "2"]),
            invocation(&["pre", "3"]),
            Invocation::barrier(),
            invocation(&["post", "1"]),
            invocation(&["post", "2"]),
        ];

        let report = scheduler(runner.clone(), 8).run(batch).await;

        assert_eq!(report.total(), 5);
        assert_eq!(report.generations, vec![3, 2]);

        let pre = runner.spans_for("pre");
        let post = runner.spans_for("post");
        let last_pre_end = pre.iter().map(|(_, e)| *e).max().unwrap();
        let first_post_start = post.iter().map(|(s, _)| *s).min().unwrap();
        assert!(last_pre_end <= first_post_start);
    }

    #[tokio::test(start_paused = true)]
    async fn large_batch_is_one_generation_capped_at_max_workers() {
        let runner = Arc::new(RecordingRunner::new(Duration::from_millis(10)));
        let batch: Vec<Invocation> =
            (0..237).map(|i| invocation(&["item", &i.to_string()])).collect();

        let report = scheduler(runner.clone(), 25).run(batch).await;

        assert_eq!(report.total(), 237);
        assert_eq!(report.succeeded(), 237);
        assert_eq!(report.generations, vec![25]);
        assert!(runner.peak_active.load(Ordering::SeqCst) <= 25);
    }

    #[tokio::test(start_paused = true)]
    async fn soft_failure_does_not_abort_and_order_is_preserved() {
        let mut runner = RecordingRunner::new(Duration::from_millis(5));
        runner.soft_tokens.push("dupe".to_string());
        let runner = Arc::new(runner);

        let batch = vec![
            invocation(&["create", "alpha"]),
            invocation(&["create", "dupe"]),
            Invocation::barrier(),
            invocation(&["update", "alpha"]),
        ];

        let report = scheduler(runner, 4).run(batch).await;

        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.soft_errors(), 1);
        assert_eq!(report.failed(), 0);
        assert_eq!(report.generations, vec![2, 1]);

        // Submission order in the report, regardless of completion order.
        assert_eq!(report.outcomes[0].invocation.to_string(), "create alpha");
        assert_eq!(report.outcomes[1].invocation.to_string(), "create dupe");
        assert_eq!(report.outcomes[1].kind, OutcomeKind::SoftError);
        assert_eq!(report.outcomes[2].invocation.to_string(), "update alpha");
    }

    #[tokio::test(start_paused = true)]
    async fn small_segment_spawns_only_as_many_workers_as_items() {
        let runner = Arc::new(RecordingRunner::new(Duration::from_millis(1)));
        let batch = vec![invocation(&["a"]), invocation(&["b"]), invocation(&["c"])];

        let report = scheduler(runner, 25).run(batch).await;

        assert_eq!(report.generations, vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_pending_work() {
        let cancel = CancellationToken::new();
        let mut runner = RecordingRunner::new(Duration::from_millis(5));
        runner.cancel_after = Some((2, cancel.clone()));
        let runner = Arc::new(runner);

        let batch: Vec<Invocation> =
            (0..5).map(|i| invocation(&["item", &i.to_string()])).collect();
        let scheduler = BatchScheduler::new(runner, 1, 25, cancel);

        let report = scheduler.run(batch).await;

        assert_eq!(report.total(), 5);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 3);
        for outcome in &report.outcomes[2..] {
            assert_eq!(outcome.kind, OutcomeKind::Fatal);
            assert_eq!(outcome.detail.as_deref(), Some("cancelled before dispatch"));
        }
    }

    #[tokio::test]
    async fn barrier_only_batch_produces_empty_report() {
        let runner = Arc::new(RecordingRunner::new(Duration::ZERO));
        let report = scheduler(runner, 4).run(vec![Invocation::barrier()]).await;

        assert_eq!(report.total(), 0);
        assert!(report.generations.is_empty());
    }
}

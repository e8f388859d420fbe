//! Job dispatch policy (§4.6, §9 redesign note): "one worker abstraction
//! with two implementations (remote broker client, in-process task pool).
//! The Coordinator sees only `dispatch(job)`; no reentrant loop tricks."
//!
//! The broker itself is an external collaborator out of scope for this
//! crate (spec.md §1 names "a generic work-queue broker" among the
//! interfaces it does not define the wire contract for) — `BrokerClient`
//! is that interface seam, mirroring how `GraphStore`/`VectorStore` are
//! interfaces with a local reference adapter but no other concrete impl
//! shipped here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The serializable unit of work a broker-backed dispatcher would ship to a
/// remote worker; the in-process dispatcher runs it directly instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessProjectPayload {
    pub session_id: String,
    pub project_id: String,
    pub project_name: String,
    pub owner_id: String,
    pub files: Vec<(String, String)>,
}

#[async_trait]
pub trait PipelineRun: Send + Sync {
    async fn run(&self, payload: ProcessProjectPayload);
}

/// A reachable external work-queue broker. No concrete implementation ships
/// here since the broker's wire protocol is outside this core's scope.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    async fn ping(&self) -> bool;
    async fn enqueue(&self, payload: ProcessProjectPayload) -> bool;
}

#[async_trait]
pub trait JobDispatch: Send + Sync {
    async fn dispatch(&self, payload: ProcessProjectPayload, runner: Arc<dyn PipelineRun>);
}

/// Runs the job as a new in-process background task; the fallback when no
/// broker is configured or the configured one is unreachable.
pub struct InProcessDispatch;

#[async_trait]
impl JobDispatch for InProcessDispatch {
    async fn dispatch(&self, payload: ProcessProjectPayload, runner: Arc<dyn PipelineRun>) {
        tokio::spawn(async move { runner.run(payload).await });
    }
}

/// Pings the broker first; enqueues there on success, otherwise falls back
/// to an in-process task so API semantics stay identical to the caller.
pub struct BrokerDispatch<B: BrokerClient> {
    broker: B,
    fallback: InProcessDispatch,
}

impl<B: BrokerClient> BrokerDispatch<B> {
    pub fn new(broker: B) -> Self {
        Self { broker, fallback: InProcessDispatch }
    }
}

#[async_trait]
impl<B: BrokerClient> JobDispatch for BrokerDispatch<B> {
    async fn dispatch(&self, payload: ProcessProjectPayload, runner: Arc<dyn PipelineRun>) {
        if self.broker.ping().await && self.broker.enqueue(payload.clone()).await {
            return;
        }
        self.fallback.dispatch(payload, runner).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRunner {
        runs: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PipelineRun for CountingRunner {
        async fn run(&self, _payload: ProcessProjectPayload) {
            self.runs.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn payload() -> ProcessProjectPayload {
        ProcessProjectPayload {
            session_id: "s1".to_string(),
            project_id: "p1".to_string(),
            project_name: "demo".to_string(),
            owner_id: "owner".to_string(),
            files: vec![],
        }
    }

    struct UnreachableBroker;

    #[async_trait]
    impl BrokerClient for UnreachableBroker {
        async fn ping(&self) -> bool {
            false
        }
        async fn enqueue(&self, _payload: ProcessProjectPayload) -> bool {
            true
        }
    }

    struct ReachableBroker {
        enqueued: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BrokerClient for ReachableBroker {
        async fn ping(&self) -> bool {
            true
        }
        async fn enqueue(&self, _payload: ProcessProjectPayload) -> bool {
            self.enqueued.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[tokio::test]
    async fn in_process_dispatch_runs_the_job() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runner: Arc<dyn PipelineRun> = Arc::new(CountingRunner { runs: runs.clone() });
        InProcessDispatch.dispatch(payload(), runner).await;
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_broker_falls_back_to_in_process() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runner: Arc<dyn PipelineRun> = Arc::new(CountingRunner { runs: runs.clone() });
        let dispatcher = BrokerDispatch::new(UnreachableBroker);
        dispatcher.dispatch(payload(), runner).await;
        tokio::task::yield_now().await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reachable_broker_enqueues_instead_of_running_locally() {
        let runs = Arc::new(AtomicUsize::new(0));
        let enqueued = Arc::new(AtomicUsize::new(0));
        let runner: Arc<dyn PipelineRun> = Arc::new(CountingRunner { runs: runs.clone() });
        let dispatcher = BrokerDispatch::new(ReachableBroker { enqueued: enqueued.clone() });
        dispatcher.dispatch(payload(), runner).await;
        assert_eq!(enqueued.load(Ordering::SeqCst), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}

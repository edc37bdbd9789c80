//! Placement service — submits, runs, patches and cancels placement tasks.
//!
//! Each task's pipeline runs on its own tokio task and writes the record
//! at most twice: STARTED when it begins, then one terminal patch. Every
//! write goes through the store's transition check, so a pipeline that
//! loses a race against cancellation has its result rejected and dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, watch};
use tracing::{debug, error, info, warn};
use ulid::Ulid;

use fleetplace_core::config::PlacementConfig;
use fleetplace_core::{ConstraintSet, Resource, ResultCode};
use fleetplace_placement::{
    CandidateSampler, ConstraintAugmenter, FanOutCoordinator, HostScorer, ImageLocality,
    PlacementError,
};
use fleetplace_state::{
    PlacementRequest, PlacementTask, StateError, TaskPatch, TaskStage, TaskStore, epoch_millis,
};

use crate::error::{SchedulerError, SchedulerResult};

/// How often `wait_for_terminal` re-reads the record.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

const STOPPED_ERROR: &str = "placement service stopped";
const RESTARTED_ERROR: &str = "placement service restarted";

/// A placement submission as received from a client.
///
/// `sample_host_count` and `timeout_ms` fall back to the configured
/// root place parameters when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitPlacement {
    pub resource: Resource,
    #[serde(default)]
    pub constraints: ConstraintSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_host_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub direct: bool,
    /// Store the task already STARTED instead of CREATED.
    #[serde(default)]
    pub started: bool,
    /// Keep the record but never run the pipeline.
    #[serde(default)]
    pub processing_disabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// The collaborators a placement pipeline needs.
#[derive(Clone)]
pub struct PlacementPorts {
    pub sampler: Arc<dyn CandidateSampler>,
    pub locality: Arc<dyn ImageLocality>,
    pub scorer: Arc<dyn HostScorer>,
}

struct Inner {
    store: TaskStore,
    sampler: Arc<dyn CandidateSampler>,
    augmenter: ConstraintAugmenter,
    coordinator: FanOutCoordinator,
    defaults: PlacementConfig,
    /// Running pipelines: task id → cancel signal.
    in_flight: RwLock<HashMap<String, watch::Sender<bool>>>,
}

/// Cheap to clone; clones share the same store and in-flight table.
#[derive(Clone)]
pub struct PlacementService {
    inner: Arc<Inner>,
}

impl PlacementService {
    pub fn new(store: TaskStore, ports: PlacementPorts, defaults: PlacementConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                sampler: ports.sampler,
                augmenter: ConstraintAugmenter::new(ports.locality),
                coordinator: FanOutCoordinator::new(ports.scorer),
                defaults,
                in_flight: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.inner.store
    }

    // ── Submission ─────────────────────────────────────────────────

    /// Store a new task and schedule its pipeline.
    ///
    /// Direct submissions return the terminal record. Others return the
    /// record as stored, before the pipeline has touched it.
    pub async fn submit(&self, submit: SubmitPlacement) -> SchedulerResult<PlacementTask> {
        let request = self.resolve_request(&submit)?;
        let stage = if submit.started {
            TaskStage::Started
        } else {
            TaskStage::Created
        };

        let id = Ulid::new().to_string();
        let mut task = PlacementTask::new(id.clone(), request, stage, epoch_millis())?;
        task.request_id = submit.request_id;
        task.processing_disabled = submit.processing_disabled;
        self.inner.store.create_task(&task)?;

        info!(
            task = %id,
            %stage,
            direct = task.request.direct,
            processing_disabled = task.processing_disabled,
            "placement task submitted"
        );

        if task.processing_disabled {
            return Ok(task);
        }

        // The pipeline outlives the caller's future, direct or not.
        let service = self.clone();
        let task_id = id.clone();
        let pipeline = tokio::spawn(async move {
            service.drive(&task_id).await;
        });

        if task.request.direct {
            if let Err(e) = pipeline.await {
                error!(task = %id, error = %e, "placement pipeline aborted");
            }
            return self.get(&id);
        }
        Ok(task)
    }

    fn resolve_request(&self, submit: &SubmitPlacement) -> SchedulerResult<PlacementRequest> {
        let sample_host_count = submit
            .sample_host_count
            .unwrap_or(self.inner.defaults.max_fanout_count);
        let timeout_ms = submit.timeout_ms.unwrap_or(self.inner.defaults.timeout_ms);

        if sample_host_count == 0 {
            return Err(SchedulerError::InvalidRequest(
                "sample_host_count must be at least 1".to_string(),
            ));
        }
        if timeout_ms == 0 {
            return Err(SchedulerError::InvalidRequest(
                "timeout_ms must be positive".to_string(),
            ));
        }
        if let Some(c) = submit.constraints.iter().find(|c| c.values.is_empty()) {
            return Err(SchedulerError::InvalidRequest(format!(
                "constraint {} has no acceptable values",
                c.kind
            )));
        }

        Ok(PlacementRequest {
            resource: submit.resource.clone(),
            constraints: submit.constraints.clone(),
            sample_host_count,
            timeout_ms,
            direct: submit.direct,
        })
    }

    // ── Pipeline ───────────────────────────────────────────────────

    async fn track(&self, id: &str) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        self.inner.in_flight.write().await.insert(id.to_string(), tx);
        rx
    }

    /// Run the pipeline until it finishes or the task is cancelled.
    async fn drive(&self, id: &str) {
        let mut cancel_rx = self.track(id).await;
        let cancelled = async move {
            let _ = cancel_rx.wait_for(|cancelled| *cancelled).await;
        };
        tokio::select! {
            _ = self.run(id) => {}
            _ = cancelled => {
                info!(task = %id, "placement pipeline stopped after cancellation");
            }
        }
        self.inner.in_flight.write().await.remove(id);
    }

    /// Augment, sample, fan out, and record the terminal outcome.
    ///
    /// Placement failures become a FAILED record; nothing is returned.
    pub async fn run(&self, id: &str) {
        let task = match self.inner.store.get_task(id) {
            Ok(Some(task)) => task,
            Ok(None) => {
                warn!(task = %id, "placement task vanished before it ran");
                return;
            }
            Err(e) => {
                error!(task = %id, error = %e, "failed to load placement task");
                return;
            }
        };

        if !self.record(id, &TaskPatch::started()) {
            return;
        }

        let patch = match self.place(&task.request).await {
            Ok(patch) => patch,
            Err(e) => {
                warn!(task = %id, error = %e, code = %e.result_code(), "placement failed");
                TaskPatch::failed(e.result_code(), e.to_string())
            }
        };
        self.record(id, &patch);
    }

    async fn place(&self, request: &PlacementRequest) -> Result<TaskPatch, PlacementError> {
        let constraints = self
            .inner
            .augmenter
            .augment(&request.resource, &request.constraints)
            .await?;

        let candidates = self
            .inner
            .sampler
            .sample(&constraints, request.sample_host_count)
            .await?;
        debug!(%constraints, candidates = candidates.len(), "candidates sampled");

        let outcome = self
            .inner
            .coordinator
            .place(
                &candidates,
                &request.resource,
                Duration::from_millis(request.timeout_ms),
            )
            .await;
        Ok(TaskPatch::from_outcome(&outcome))
    }

    /// Write a pipeline patch. Returns false if the store refused it.
    fn record(&self, id: &str, patch: &TaskPatch) -> bool {
        match self.inner.store.patch_task(id, patch) {
            Ok(task) if task.is_terminal() => {
                info!(
                    task = %id,
                    stage = %task.stage,
                    result = ?task.result_code,
                    host = task.host_id.as_deref().unwrap_or_default(),
                    duration_ms = task.duration_ms(),
                    "placement task finished"
                );
                true
            }
            Ok(_) => true,
            Err(StateError::IllegalTransition { from, to }) => {
                warn!(task = %id, %from, %to, "discarding placement result for terminal task");
                false
            }
            Err(e) => {
                error!(task = %id, error = %e, "failed to record placement result");
                false
            }
        }
    }

    // ── Patch / cancel ─────────────────────────────────────────────

    /// Apply an external stage patch.
    ///
    /// A terminal patch also stops the task's pipeline if one is running.
    pub async fn patch(&self, id: &str, patch: &TaskPatch) -> SchedulerResult<PlacementTask> {
        let task = self.inner.store.patch_task(id, patch).map_err(|e| match e {
            StateError::NotFound(id) => SchedulerError::TaskNotFound(id),
            other => SchedulerError::State(other),
        })?;

        if task.is_terminal() {
            if let Some(cancel) = self.inner.in_flight.read().await.get(id) {
                let _ = cancel.send(true);
            }
        }
        info!(task = %id, stage = %task.stage, "placement task patched");
        Ok(task)
    }

    /// Move a task to CANCELLED. Fails if it is already terminal.
    ///
    /// Outstanding host calls are dropped locally; hosts may still finish
    /// their side of the work.
    pub async fn cancel(&self, id: &str) -> SchedulerResult<PlacementTask> {
        self.patch(id, &TaskPatch::cancelled()).await
    }

    // ── Reads ──────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> SchedulerResult<PlacementTask> {
        self.inner
            .store
            .get_task(id)?
            .ok_or_else(|| SchedulerError::TaskNotFound(id.to_string()))
    }

    pub fn list(&self) -> SchedulerResult<Vec<PlacementTask>> {
        Ok(self.inner.store.list_tasks()?)
    }

    /// Poll until the task is terminal or `timeout` passes.
    pub async fn wait_for_terminal(
        &self,
        id: &str,
        timeout: Duration,
    ) -> SchedulerResult<PlacementTask> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let task = self.get(id)?;
            if task.is_terminal() {
                return Ok(task);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SchedulerError::WaitTimeout {
                    id: id.to_string(),
                    waited_ms: timeout.as_millis() as u64,
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Number of pipelines currently running.
    pub async fn in_flight(&self) -> usize {
        self.inner.in_flight.read().await.len()
    }

    /// Fail every running task and stop its pipeline (for graceful shutdown).
    ///
    /// Records end FAILED / SYSTEM_ERROR rather than being left mid-flight.
    pub async fn stop_all(&self) {
        let ids: Vec<String> = self.inner.in_flight.read().await.keys().cloned().collect();
        for id in &ids {
            self.record(id, &TaskPatch::failed(ResultCode::SystemError, STOPPED_ERROR));
        }

        let in_flight = self.inner.in_flight.read().await;
        for cancel in in_flight.values() {
            let _ = cancel.send(true);
        }
        info!(count = ids.len(), "placement pipelines stopped");
    }

    /// Fail tasks a previous process left CREATED or STARTED.
    ///
    /// Call before serving. Processing-disabled tasks are left alone since
    /// no pipeline was ever going to finish them.
    pub fn fail_orphaned(&self) -> SchedulerResult<usize> {
        let mut failed = 0;
        for task in self.inner.store.list_tasks()? {
            if task.is_terminal() || task.processing_disabled {
                continue;
            }
            let patch = TaskPatch::failed(ResultCode::SystemError, RESTARTED_ERROR);
            if self.record(&task.id, &patch) {
                failed += 1;
            }
        }
        if failed > 0 {
            warn!(count = failed, "failed placement tasks orphaned by a restart");
        }
        Ok(failed)
    }
}

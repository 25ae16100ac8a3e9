use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::{LauncherError, LauncherResult};

use super::stage::{InstallStage, InstallState};

type CompletionCallback = Box<dyn FnOnce() + Send>;

/// Observable state of an [`InstallTask`].
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub stage: InstallStage,
    pub total_files: usize,
    pub remaining_files: usize,
    /// Progress inside the current stage, reset on every stage change.
    pub stage_percentage: f64,
    /// Human readable reason once the task failed.
    pub failure: Option<String>,
}

impl TaskSnapshot {
    fn initial() -> Self {
        Self {
            stage: InstallStage::Before,
            total_files: 0,
            remaining_files: 0,
            stage_percentage: 0.0,
            failure: None,
        }
    }

    /// Fraction of files done when a file count is known, otherwise the
    /// in-stage percentage.
    pub fn progress(&self) -> f64 {
        if self.stage.is_terminal() {
            return 1.0;
        }
        if self.total_files > 0 {
            let done = self.total_files.saturating_sub(self.remaining_files);
            done as f64 / self.total_files as f64
        } else {
            self.stage_percentage
        }
    }

    pub fn is_finished(&self) -> bool {
        self.stage.is_terminal() || self.failure.is_some()
    }
}

/// Staged, forward-only progress of one install job. Created for one
/// version and instance, started at most once, never reused.
pub struct InstallTask {
    id: Uuid,
    title: String,
    /// Stages this task walks through, in order.
    stages: Vec<InstallStage>,
    state: watch::Sender<TaskSnapshot>,
    started: AtomicBool,
    callback: Mutex<Option<CompletionCallback>>,
}

impl InstallTask {
    pub fn new(title: impl Into<String>, stages: Vec<InstallStage>) -> Arc<Self> {
        let (state, _) = watch::channel(TaskSnapshot::initial());
        Arc::new(Self {
            id: Uuid::new_v4(),
            title: title.into(),
            stages,
            state,
            started: AtomicBool::new(false),
            callback: Mutex::new(None),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        self.state.borrow().clone()
    }

    pub fn stage(&self) -> InstallStage {
        self.state.borrow().stage
    }

    pub fn progress(&self) -> f64 {
        self.state.borrow().progress()
    }

    /// Register the callback fired once the task reaches a terminal state.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        *self.callback.lock().unwrap_or_else(|e| e.into_inner()) = Some(Box::new(callback));
    }

    /// Run `work` to completion on the current task, then `complete()` or
    /// `fail()` depending on its result.
    pub async fn run<F, Fut>(self: &Arc<Self>, work: F) -> LauncherResult<()>
    where
        F: FnOnce(Arc<InstallTask>) -> Fut,
        Fut: Future<Output = LauncherResult<()>>,
    {
        self.mark_started()?;
        self.finish(work(Arc::clone(self)).await)
    }

    /// Spawn `work` in the background. Fails if the task was started before.
    pub fn start<F, Fut>(self: &Arc<Self>, work: F) -> LauncherResult<JoinHandle<LauncherResult<()>>>
    where
        F: FnOnce(Arc<InstallTask>) -> Fut + Send + 'static,
        Fut: Future<Output = LauncherResult<()>> + Send + 'static,
    {
        self.mark_started()?;
        let task = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let result = work(Arc::clone(&task)).await;
            task.finish(result)
        }))
    }

    fn mark_started(&self) -> LauncherResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(LauncherError::Other(format!(
                "install task '{}' was already started",
                self.title
            )));
        }
        info!("Starting install task: {}", self.title);
        Ok(())
    }

    fn finish(&self, result: LauncherResult<()>) -> LauncherResult<()> {
        match result {
            Ok(()) => {
                self.complete();
                Ok(())
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    /// Move forward to `stage`, resetting the in-stage percentage and file
    /// counters. Backward moves and moves after a terminal state are ignored.
    pub fn update_stage(&self, stage: InstallStage) -> bool {
        let moved = self.state.send_if_modified(|s| {
            if s.is_finished() || stage <= s.stage {
                return false;
            }
            s.stage = stage;
            s.stage_percentage = 0.0;
            s.total_files = 0;
            s.remaining_files = 0;
            true
        });

        if moved {
            debug!("[{}] stage -> {}", self.title, stage);
        } else {
            warn!("[{}] ignored stage change to {}", self.title, stage);
        }
        moved
    }

    /// Start counting `total` files for the current stage.
    pub fn set_total_files(&self, total: usize) {
        self.state.send_modify(|s| {
            s.total_files = total;
            s.remaining_files = total;
        });
    }

    pub fn complete_one_file(&self) {
        self.state.send_if_modified(|s| {
            if s.remaining_files == 0 {
                return false;
            }
            s.remaining_files -= 1;
            true
        });
    }

    pub fn set_stage_percentage(&self, percentage: f64) {
        let percentage = percentage.clamp(0.0, 1.0);
        self.state.send_if_modified(|s| {
            if s.is_finished() || percentage <= s.stage_percentage {
                return false;
            }
            s.stage_percentage = percentage;
            true
        });
    }

    /// Terminal. Safe to call more than once; the callback fires once.
    pub fn complete(&self) {
        let finished = self.state.send_if_modified(|s| {
            if s.is_finished() {
                return false;
            }
            s.stage = InstallStage::End;
            s.stage_percentage = 0.0;
            s.remaining_files = 0;
            true
        });

        if finished {
            info!("Install task finished: {}", self.title);
            self.fire_callback();
        }
    }

    /// Terminal failure, keeping the stage it failed in.
    pub fn fail(&self, error: &LauncherError) {
        let reason = error.reason();
        let failed = self.state.send_if_modified(|s| {
            if s.is_finished() {
                return false;
            }
            s.failure = Some(reason.clone());
            true
        });

        if failed {
            warn!("Install task '{}' failed: {}", self.title, error);
            self.fire_callback();
        }
    }

    fn fire_callback(&self) {
        let callback = self.callback.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(callback) = callback {
            callback();
        }
    }

    /// Status of every stage this task walks through.
    pub fn install_states(&self) -> Vec<(InstallStage, InstallState)> {
        let snapshot = self.snapshot();
        self.stages
            .iter()
            .map(|&stage| {
                let state = if snapshot.stage.is_terminal() || stage < snapshot.stage {
                    InstallState::Finished
                } else if stage == snapshot.stage {
                    if snapshot.failure.is_some() {
                        InstallState::Failed
                    } else {
                        InstallState::InProgress
                    }
                } else {
                    InstallState::Waiting
                };
                (stage, state)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn vanilla_task() -> Arc<InstallTask> {
        InstallTask::new(
            "1.20.1",
            vec![
                InstallStage::ClientJson,
                InstallStage::ClientIndex,
                InstallStage::ClientJar,
            ],
        )
    }

    #[test]
    fn stage_change_resets_file_progress() {
        let task = vanilla_task();
        task.update_stage(InstallStage::ClientIndex);
        task.set_total_files(2);
        task.complete_one_file();
        task.complete_one_file();
        assert_eq!(task.progress(), 1.0);

        task.update_stage(InstallStage::ClientJar);
        let snapshot = task.snapshot();
        assert_eq!(snapshot.total_files, 0);
        assert_eq!(snapshot.remaining_files, 0);
        assert_eq!(task.progress(), 0.0);
    }

    #[tokio::test]
    async fn observed_stages_never_go_backwards() {
        let task = vanilla_task();
        let mut rx = task.subscribe();

        let sampler = tokio::spawn(async move {
            let mut seen = vec![rx.borrow().clone()];
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                let terminal = snapshot.is_finished();
                seen.push(snapshot);
                if terminal {
                    break;
                }
            }
            seen
        });

        task.update_stage(InstallStage::ClientJson);
        task.set_stage_percentage(0.5);
        task.update_stage(InstallStage::ClientJar);
        assert!(!task.update_stage(InstallStage::ClientIndex));
        task.set_stage_percentage(0.3);
        task.complete();
        assert!(!task.update_stage(InstallStage::ClientJson));

        let seen = sampler.await.unwrap();
        assert!(seen.windows(2).all(|w| w[0].stage <= w[1].stage));
        assert_eq!(seen.last().unwrap().stage, InstallStage::End);
    }

    #[test]
    fn stage_change_resets_percentage() {
        let task = vanilla_task();
        task.update_stage(InstallStage::ClientJson);
        task.set_stage_percentage(0.8);
        assert_eq!(task.snapshot().stage_percentage, 0.8);

        task.update_stage(InstallStage::ClientIndex);
        assert_eq!(task.snapshot().stage_percentage, 0.0);
    }

    #[test]
    fn complete_is_idempotent_and_fires_callback_once() {
        let task = vanilla_task();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        task.on_complete(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        task.complete();
        task.complete();
        task.fail(&LauncherError::Other("late".into()));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(task.stage(), InstallStage::End);
        assert!(task.snapshot().failure.is_none());
    }

    #[test]
    fn file_counters_drive_progress() {
        let task = vanilla_task();
        task.update_stage(InstallStage::ClientJson);
        task.set_total_files(4);
        task.complete_one_file();
        assert_eq!(task.progress(), 0.25);
        for _ in 0..10 {
            task.complete_one_file();
        }
        assert_eq!(task.snapshot().remaining_files, 0);
        assert_eq!(task.progress(), 1.0);
    }

    #[tokio::test]
    async fn start_runs_once_and_reports_failure() {
        let task = vanilla_task();
        let handle = task
            .start(|t| async move {
                t.update_stage(InstallStage::ClientIndex);
                Err(LauncherError::Other("boom".into()))
            })
            .unwrap();

        assert!(task.start(|_| async { Ok(()) }).is_err());
        assert!(handle.await.unwrap().is_err());

        let snapshot = task.snapshot();
        assert_eq!(snapshot.failure.as_deref(), Some("boom"));
        assert_eq!(
            task.install_states(),
            vec![
                (InstallStage::ClientJson, InstallState::Finished),
                (InstallStage::ClientIndex, InstallState::Failed),
                (InstallStage::ClientJar, InstallState::Waiting),
            ]
        );
    }
}

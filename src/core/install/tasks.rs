use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::core::guard::AbortOnDrop;

use super::task::InstallTask;

pub const MINECRAFT: &str = "minecraft";
pub const FABRIC: &str = "fabric";
pub const FORGE: &str = "forge";
pub const NEOFORGE: &str = "neoforge";
pub const CUSTOM_FILE: &str = "customFile";

/// Keys listed first, in this order. Anything else follows alphabetically.
const DISPLAY_ORDER: [&str; 5] = [MINECRAFT, FABRIC, FORGE, NEOFORGE, CUSTOM_FILE];

type TaskMap = BTreeMap<String, Arc<InstallTask>>;

/// Keyed group of install tasks observed as one. Does not drive execution;
/// aggregate progress is the mean of the children's progress, recomputed
/// whenever a child changes.
pub struct InstallTasks {
    tasks: Arc<Mutex<TaskMap>>,
    progress: watch::Sender<f64>,
    watchers: Mutex<Vec<AbortOnDrop<()>>>,
}

impl Default for InstallTasks {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallTasks {
    pub fn new() -> Self {
        let (progress, _) = watch::channel(0.0);
        Self {
            tasks: Arc::new(Mutex::new(BTreeMap::new())),
            progress,
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn single(key: &str, task: Arc<InstallTask>) -> Self {
        let tasks = Self::new();
        tasks.add_task(key, task);
        tasks
    }

    /// Add (or replace) the task under `key` and start observing it.
    /// Must be called inside a tokio runtime.
    pub fn add_task(&self, key: &str, task: Arc<InstallTask>) {
        let mut rx = task.subscribe();
        lock(&self.tasks).insert(key.to_string(), task);
        publish(&self.progress, &lock(&self.tasks));

        let tasks = Arc::clone(&self.tasks);
        let progress = self.progress.clone();
        let watcher = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                publish(&progress, &lock(&tasks));
            }
        });
        lock(&self.watchers).push(AbortOnDrop::new(watcher));
    }

    pub fn get(&self, key: &str) -> Option<Arc<InstallTask>> {
        lock(&self.tasks).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.tasks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tasks in display order.
    pub fn tasks(&self) -> Vec<(String, Arc<InstallTask>)> {
        let map = lock(&self.tasks);
        let mut ordered: Vec<(String, Arc<InstallTask>)> = DISPLAY_ORDER
            .iter()
            .filter_map(|key| map.get(*key).map(|t| (key.to_string(), Arc::clone(t))))
            .collect();
        ordered.extend(
            map.iter()
                .filter(|(key, _)| !DISPLAY_ORDER.contains(&key.as_str()))
                .map(|(key, task)| (key.clone(), Arc::clone(task))),
        );
        ordered
    }

    pub fn progress(&self) -> f64 {
        mean_progress(&lock(&self.tasks))
    }

    /// Aggregate progress, updated whenever any child task changes.
    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    pub fn total_files(&self) -> usize {
        lock(&self.tasks)
            .values()
            .map(|t| t.snapshot().total_files)
            .sum()
    }

    pub fn remaining_files(&self) -> usize {
        lock(&self.tasks)
            .values()
            .map(|t| t.snapshot().remaining_files)
            .sum()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn mean_progress(tasks: &TaskMap) -> f64 {
    if tasks.is_empty() {
        return 0.0;
    }
    tasks.values().map(|t| t.progress()).sum::<f64>() / tasks.len() as f64
}

fn publish(tx: &watch::Sender<f64>, tasks: &TaskMap) {
    let value = mean_progress(tasks);
    tx.send_if_modified(|current| {
        if (*current - value).abs() < f64::EPSILON {
            return false;
        }
        *current = value;
        true
    });
}

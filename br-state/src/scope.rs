//! Lifetime-bound task ownership.

use std::future::Future;
use std::sync::Mutex;

use tokio::task::JoinHandle;
use tracing::debug;

/// Owns every task a controller spawns. Dropping the scope aborts them.
#[derive(Default)]
pub struct TaskScope {
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `future` on the runtime, tied to this scope.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.retain(|task| !task.is_finished());
            tasks.push(handle);
        }
    }

    /// Number of tasks still running.
    pub fn active(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| tasks.iter().filter(|task| !task.is_finished()).count())
            .unwrap_or(0)
    }

    /// Abort every task spawned so far.
    pub fn cancel_all(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            let running = tasks.iter().filter(|task| !task.is_finished()).count();
            for task in tasks.drain(..) {
                task.abort();
            }
            if running > 0 {
                debug!("cancelled {running} scoped task(s)");
            }
        }
    }
}

impl Drop for TaskScope {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

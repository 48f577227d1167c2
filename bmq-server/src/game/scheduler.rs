//! Round-scoped task scheduler
//!
//! Every timer the engine starts (tick interval, delayed next song, playback
//! retry) is registered here under the round generation it belongs to.
//! Moving to a new generation aborts everything registered for older ones, so
//! a countdown can never leak across song transitions. Tasks still re-check
//! the generation when they fire; abort only takes effect at the task's next
//! await point.

use std::future::Future;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct RoundScheduler {
    tasks: Vec<(u64, JoinHandle<()>)>,
}

impl RoundScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `task` on the runtime, owned by round `generation`
    pub fn spawn<F>(&mut self, generation: u64, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.retain(|(_, handle)| !handle.is_finished());
        self.tasks.push((generation, tokio::spawn(task)));
    }

    /// Abort every task registered for a generation older than `generation`
    ///
    /// Returns the number of tasks aborted.
    pub fn cancel_before(&mut self, generation: u64) -> usize {
        let mut aborted = 0;
        self.tasks.retain(|(owner, handle)| {
            if *owner < generation {
                if !handle.is_finished() {
                    handle.abort();
                    aborted += 1;
                }
                false
            } else {
                true
            }
        });
        aborted
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.tasks.drain(..) {
            handle.abort();
        }
    }

    /// Tasks registered and not yet finished
    pub fn pending(&self) -> usize {
        self.tasks.iter().filter(|(_, h)| !h.is_finished()).count()
    }
}

impl Drop for RoundScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

//! Completion-token task queue.
//!
//! Work is submitted as closures with an explicit list of dependency tokens.
//! A task becomes runnable the moment its last dependency completes and is
//! then handed to the rayon pool; tasks themselves never block on other
//! tasks. Failures propagate along dependency edges: a dependent of a failed
//! task is never run, its token instead reports the root cause.

use std::{
    collections::HashMap,
    sync::{Arc, Condvar, Mutex, Weak},
};

use crate::errors::DeviceError;

type Work = Box<dyn FnOnce() -> Result<(), DeviceError> + Send + 'static>;

type TaskId = u64;

/// Shared completion state behind a [`Token`].
#[derive(Debug, Default)]
struct TokenState {
    result: Mutex<Option<Result<(), DeviceError>>>,
    cond: Condvar,
}

impl TokenState {
    fn complete(&self, result: Result<(), DeviceError>) {
        let mut slot = self.result.lock().unwrap();
        *slot = Some(result);
        drop(slot);
        self.cond.notify_all();
    }

    fn wait(&self) -> Result<(), DeviceError> {
        let mut slot = self.result.lock().unwrap();
        while slot.is_none() {
            slot = self.cond.wait(slot).unwrap();
        }
        slot.clone().unwrap()
    }
}

/// Handle to one submitted task.
///
/// Cloning is cheap; all clones observe the same completion. Dropping every
/// token does not cancel the task.
#[derive(Debug, Clone)]
pub struct Token {
    id: TaskId,
    /// The queue that issued this token; task ids are only meaningful there.
    queue: Weak<Mutex<QueueState>>,
    state: Arc<TokenState>,
}

impl Token {
    /// Block the calling thread until the task settles.
    pub fn wait(&self) -> Result<(), DeviceError> {
        self.state.wait()
    }
}

/// A task that has been submitted but not yet completed.
struct PendingTask {
    /// Taken out when the task is dispatched to the pool.
    work: Option<Work>,
    /// Number of dependencies that have not completed yet.
    unmet: usize,
    /// Tasks waiting on this one.
    dependents: Vec<TaskId>,
    state: Arc<TokenState>,
}

#[derive(Default)]
struct QueueState {
    next_id: TaskId,
    pending: HashMap<TaskId, PendingTask>,
}

/// An in-order-free execution queue with dependency tracking.
///
/// Mirrors the submission model of an accelerator command queue: `submit`
/// returns immediately with a [`Token`], and ordering between tasks exists
/// only where dependency edges demand it.
#[derive(Clone, Default)]
pub struct Queue {
    state: Arc<Mutex<QueueState>>,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.state.lock().unwrap().pending.len();
        f.debug_struct("Queue").field("pending", &pending).finish()
    }
}

impl Queue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit `work` to run after every token in `deps` has succeeded.
    ///
    /// Dependencies on tokens from other queues are joined here, at
    /// submission time; only same-queue edges are tracked through the
    /// dependency graph.
    pub fn submit<F>(&self, deps: &[Token], work: F) -> Token
    where
        F: FnOnce() -> Result<(), DeviceError> + Send + 'static,
    {
        let self_queue = Arc::downgrade(&self.state);
        let mut failed = None;
        // Foreign tokens cannot be tracked through this queue's graph, so
        // block on them before taking the lock.
        for dep in deps {
            if !Weak::ptr_eq(&dep.queue, &self_queue) {
                if let Err(err) = dep.state.wait() {
                    failed = Some(err);
                }
            }
        }

        let state = Arc::new(TokenState::default());
        let mut queue = self.state.lock().unwrap();
        let id = queue.next_id;
        queue.next_id += 1;

        let mut unmet = 0;
        for dep in deps.iter().filter(|dep| Weak::ptr_eq(&dep.queue, &self_queue)) {
            if let Some(parent) = queue.pending.get_mut(&dep.id) {
                parent.dependents.push(id);
                unmet += 1;
            } else {
                // Absent from pending means settled; the result is already
                // recorded, so this read does not block.
                if let Err(err) = dep.state.wait() {
                    failed = Some(err);
                }
            }
        }

        let token = Token { id, queue: self_queue, state: Arc::clone(&state) };
        if let Some(err) = failed {
            // Register so late dependents still find the failure, then
            // cascade without running anything.
            queue.pending.insert(
                id,
                PendingTask { work: None, unmet, dependents: Vec::new(), state },
            );
            Self::settle(&mut queue, id, Err(err));
            return token;
        }

        if unmet == 0 {
            queue.pending.insert(
                id,
                PendingTask { work: None, unmet: 0, dependents: Vec::new(), state },
            );
            drop(queue);
            self.dispatch(id, Box::new(work));
        } else {
            queue.pending.insert(
                id,
                PendingTask { work: Some(Box::new(work)), unmet, dependents: Vec::new(), state },
            );
        }
        token
    }

    /// Block until every task submitted so far has settled, then report the
    /// first failure encountered. All tasks are joined before the error is
    /// returned, so the queue is quiescent either way.
    pub fn wait_all(&self) -> Result<(), DeviceError> {
        let tokens: Vec<Token> = {
            let queue = self.state.lock().unwrap();
            queue
                .pending
                .iter()
                .map(|(&id, task)| Token {
                    id,
                    queue: Arc::downgrade(&self.state),
                    state: Arc::clone(&task.state),
                })
                .collect()
        };
        let mut first_err = None;
        for token in tokens {
            if let Err(err) = token.wait() {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn dispatch(&self, id: TaskId, work: Work) {
        let this = self.clone();
        rayon::spawn(move || {
            let result = work();
            let mut queue = this.state.lock().unwrap();
            let runnable = Self::settle(&mut queue, id, result);
            drop(queue);
            for (id, work) in runnable {
                this.dispatch(id, work);
            }
        });
    }

    /// Record `result` for task `id`, wake its waiters, and on failure
    /// cascade the error through every transitive dependent without running
    /// them. Returns the dependents this completion made runnable, to be
    /// dispatched outside the lock. Iterative to keep deep chains off the
    /// stack.
    fn settle(
        queue: &mut QueueState,
        id: TaskId,
        result: Result<(), DeviceError>,
    ) -> Vec<(TaskId, Work)> {
        let Some(task) = queue.pending.remove(&id) else {
            return Vec::new();
        };
        let failed = result.clone().err();
        task.state.complete(result);

        let mut runnable = Vec::new();
        let mut worklist = task.dependents;
        if let Some(err) = failed {
            while let Some(dep_id) = worklist.pop() {
                if let Some(dep) = queue.pending.remove(&dep_id) {
                    dep.state
                        .complete(Err(DeviceError::Execution(format!("dependency failed: {err}"))));
                    worklist.extend(dep.dependents);
                }
            }
        } else {
            for dep_id in worklist {
                if let Some(dep) = queue.pending.get_mut(&dep_id) {
                    dep.unmet -= 1;
                    if dep.unmet == 0 {
                        if let Some(work) = dep.work.take() {
                            runnable.push((dep_id, work));
                        }
                    }
                }
            }
        }
        runnable
    }
}

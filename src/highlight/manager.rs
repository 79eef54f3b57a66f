//! Highlight worker
//!
//! A single shared worker thread with a FIFO of pending jobs and one active
//! slot. Queueing a job for an interpretation cancels any pending or active
//! job for the same interpretation; results flow back to the UI thread over
//! a channel and are committed only if their edit generation is current.

use super::{run_job, HighlightJob, HighlightOutcome};
use crate::interp::{InterpId, Interpretation, ProviderToken};
use crate::theme::ThemeSpans;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

/// A finished highlight pass, to be committed on the UI thread.
pub struct HighlightResult {
    pub interp: InterpId,
    pub generation: u64,
    pub spans: ThemeSpans,
}

struct QueuedJob {
    job: HighlightJob,
    cancel: Arc<AtomicBool>,
}

#[derive(Default)]
struct WorkerState {
    fifo: VecDeque<QueuedJob>,
    active: Option<(InterpId, Arc<AtomicBool>)>,
    shutdown: bool,
}

struct Inner {
    state: Mutex<WorkerState>,
    available: Condvar,
    results: Sender<HighlightResult>,
}

/// Cloneable handle for queueing and cancelling from event subscribers.
#[derive(Clone)]
pub struct HighlightHandle {
    inner: Arc<Inner>,
}

impl HighlightHandle {
    /// Queue a highlight pass, cancelling any in-flight work for the same
    /// interpretation first.
    pub fn queue(&self, job: HighlightJob) {
        let cancel = Arc::new(AtomicBool::new(false));
        let id = job.snapshot.id;
        {
            let mut state = self.inner.state.lock().expect("worker state poisoned");
            self.cancel_locked(&mut state, id);
            state.fifo.push_back(QueuedJob { job, cancel });
        }
        self.inner.available.notify_one();
    }

    /// Cancel pending and active work for `id`.
    pub fn cancel(&self, id: InterpId) {
        let mut state = self.inner.state.lock().expect("worker state poisoned");
        self.cancel_locked(&mut state, id);
    }

    fn cancel_locked(&self, state: &mut WorkerState, id: InterpId) {
        state.fifo.retain(|queued| {
            if queued.job.snapshot.id == id {
                queued.cancel.store(true, Ordering::Relaxed);
                false
            } else {
                true
            }
        });
        if let Some((active_id, token)) = &state.active {
            if *active_id == id {
                token.store(true, Ordering::Relaxed);
            }
        }
    }
}

pub struct HighlightManager {
    inner: Arc<Inner>,
    results: Receiver<HighlightResult>,
    worker: Option<JoinHandle<()>>,
}

impl HighlightManager {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        let inner = Arc::new(Inner {
            state: Mutex::new(WorkerState::default()),
            available: Condvar::new(),
            results: sender,
        });

        let worker_inner = inner.clone();
        let worker = std::thread::Builder::new()
            .name("highlighter".to_string())
            .spawn(move || worker_loop(worker_inner))
            .expect("failed to spawn highlight worker");

        Self {
            inner,
            results: receiver,
            worker: Some(worker),
        }
    }

    pub fn handle(&self) -> HighlightHandle {
        HighlightHandle {
            inner: self.inner.clone(),
        }
    }

    pub fn queue(&self, job: HighlightJob) {
        self.handle().queue(job);
    }

    pub fn cancel(&self, id: InterpId) {
        self.handle().cancel(id);
    }

    /// Drain finished results without blocking. The caller commits them via
    /// [`Interpretation::apply_highlight`].
    pub fn poll_results(&self) -> Vec<HighlightResult> {
        let mut out = Vec::new();
        while let Ok(result) = self.results.try_recv() {
            out.push(result);
        }
        out
    }

    /// Block until a result arrives or the timeout passes. Test support.
    pub fn wait_result(&self, timeout: std::time::Duration) -> Option<HighlightResult> {
        self.results.recv_timeout(timeout).ok()
    }
}

impl Default for HighlightManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HighlightManager {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().expect("worker state poisoned");
            state.shutdown = true;
            for queued in &state.fifo {
                queued.cancel.store(true, Ordering::Relaxed);
            }
            if let Some((_, token)) = &state.active {
                token.store(true, Ordering::Relaxed);
            }
        }
        self.inner.available.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn worker_loop(inner: Arc<Inner>) {
    loop {
        let queued = {
            let mut state = inner.state.lock().expect("worker state poisoned");
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(queued) = state.fifo.pop_front() {
                    state.active = Some((queued.job.snapshot.id, queued.cancel.clone()));
                    break queued;
                }
                state = inner
                    .available
                    .wait(state)
                    .expect("worker state poisoned");
            }
        };

        let (outcome, spans) = run_job(&queued.job, &queued.cancel);

        {
            let mut state = inner.state.lock().expect("worker state poisoned");
            state.active = None;
        }

        match (outcome, spans) {
            (HighlightOutcome::Finished, Some(spans)) => {
                log::debug!(
                    "highlight finished for generation {}",
                    queued.job.snapshot.generation
                );
                let _ = inner.results.send(HighlightResult {
                    interp: queued.job.snapshot.id,
                    generation: queued.job.snapshot.generation,
                    spans,
                });
            }
            _ => {
                log::debug!(
                    "highlight cancelled for generation {}",
                    queued.job.snapshot.generation
                );
            }
        }
    }
}

/// Per-interpretation highlight tag: owns the theme-provider slot the
/// pipeline publishes into and wires edit cancellation.
pub struct HighlightHost {
    token: ProviderToken,
}

impl HighlightHost {
    /// Default provider priority for syntax highlighting; overlays register
    /// above it.
    pub const PRIORITY: i32 = 0;

    /// Register the provider slot and subscribe cancel-on-edit.
    pub fn attach(interp: &mut Interpretation, handle: HighlightHandle) -> Self {
        let token = interp.add_theme_provider(Self::PRIORITY);
        let cancel_handle = handle.clone();
        interp.events.begin_edit.subscribe(move |id| {
            cancel_handle.cancel(*id);
        });
        Self { token }
    }

    pub fn token(&self) -> ProviderToken {
        self.token
    }

    /// Commit a finished result; stale generations are discarded.
    pub fn publish(&self, interp: &mut Interpretation, result: HighlightResult) -> bool {
        if result.interp != interp.id() {
            return false;
        }
        interp.apply_highlight(self.token, result.generation, result.spans)
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod manager_tests;

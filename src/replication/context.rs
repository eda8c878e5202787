//! Execution contexts.
//!
//! Each shard and each master is owned by one named worker thread. Work for
//! an owner is queued on its context and runs there in FIFO order; nothing
//! touches an owner's state from another thread.

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Receiver, Sender};

use super::ReplError;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Cell<Option<ContextId>> = const { Cell::new(None) };
}

/// Identity token of an execution context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

impl ContextId {
    /// Context the calling thread belongs to, if any.
    pub fn current() -> Option<ContextId> {
        CURRENT.with(Cell::get)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

type Task = Box<dyn FnOnce() + Send + 'static>;

enum ContextCommand {
    Run(Task),
    Shutdown,
}

struct Inner {
    id: ContextId,
    name: String,
    tx: Sender<ContextCommand>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let _ = self.tx.send(ContextCommand::Shutdown);
        let handle = self
            .handle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // The last handle may be released by a task on the context itself.
        if let Some(handle) = handle
            && ContextId::current() != Some(self.id)
        {
            let _ = handle.join();
        }
    }
}

#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<Inner>,
}

impl ExecutionContext {
    pub fn new(name: impl Into<String>) -> Result<Self, ReplError> {
        let name = name.into();
        let id = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = crossbeam::channel::unbounded();
        let thread_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_context_loop(id, &thread_name, rx))
            .map_err(ReplError::Spawn)?;
        tracing::debug!(context = %id, name = %name, "execution context started");
        Ok(Self {
            inner: Arc::new(Inner {
                id,
                name,
                tx,
                handle: Mutex::new(Some(handle)),
            }),
        })
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn is_current(&self) -> bool {
        ContextId::current() == Some(self.inner.id)
    }

    /// Queue `task` behind everything already queued. Does not wait.
    pub fn spawn<F>(&self, task: F) -> Result<(), ReplError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .tx
            .send(ContextCommand::Run(Box::new(task)))
            .map_err(|_| self.stopped())
    }

    /// Run `task` on this context and wait for its result. Runs inline when
    /// already on the context.
    ///
    /// A panic in `task` is reported as [`ReplError::TaskPanicked`]; the
    /// context keeps running.
    pub fn run<F, R>(&self, task: F) -> Result<R, ReplError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Ok(task());
        }
        let (reply_tx, reply_rx) = crossbeam::channel::bounded(1);
        self.spawn(move || {
            let _ = reply_tx.send(panic::catch_unwind(AssertUnwindSafe(task)));
        })?;
        match reply_rx.recv() {
            Ok(Ok(out)) => Ok(out),
            Ok(Err(_)) => {
                tracing::error!(context = %self.inner.id, name = %self.inner.name, "task panicked");
                Err(ReplError::TaskPanicked {
                    name: self.inner.name.clone(),
                })
            }
            Err(_) => Err(self.stopped()),
        }
    }

    /// Stop after the tasks already queued have run.
    pub fn shutdown(&self) {
        let _ = self.inner.tx.send(ContextCommand::Shutdown);
    }

    fn stopped(&self) -> ReplError {
        ReplError::ContextStopped {
            name: self.inner.name.clone(),
        }
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

fn run_context_loop(id: ContextId, name: &str, rx: Receiver<ContextCommand>) {
    CURRENT.with(|current| current.set(Some(id)));
    while let Ok(cmd) = rx.recv() {
        match cmd {
            ContextCommand::Run(task) => {
                if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    tracing::error!(context = %id, name, "task panicked");
                }
            }
            ContextCommand::Shutdown => break,
        }
    }
    tracing::debug!(context = %id, name, "execution context stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::{Duration, Instant};

    #[test]
    fn tasks_run_in_order_on_the_context() {
        let ctx = ExecutionContext::new("test-order").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..50 {
            let seen = seen.clone();
            let ctx_id = ctx.id();
            ctx.spawn(move || {
                assert_eq!(ContextId::current(), Some(ctx_id));
                seen.lock().unwrap().push(i);
            })
            .unwrap();
        }
        ctx.run(|| ()).unwrap();
        assert_eq!(*seen.lock().unwrap(), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn run_is_inline_when_already_home() {
        let ctx = ExecutionContext::new("test-inline").unwrap();
        let inner = ctx.clone();
        let nested = ctx.run(move || inner.run(|| 7).unwrap()).unwrap();
        assert_eq!(nested, 7);
        assert!(!ctx.is_current());
    }

    #[test]
    fn stopped_context_refuses_work() {
        let ctx = ExecutionContext::new("test-stop").unwrap();
        ctx.shutdown();
        let deadline = Instant::now() + Duration::from_secs(2);
        while ctx.spawn(|| ()).is_ok() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(ctx.run(|| 1), Err(ReplError::ContextStopped { .. })));
    }

    #[test]
    fn panicking_task_does_not_kill_the_context() {
        let ctx = ExecutionContext::new("test-panic").unwrap();
        ctx.spawn(|| panic!("boom")).unwrap();
        assert_eq!(ctx.run(|| 3).unwrap(), 3);
    }

    #[test]
    fn run_reports_a_panicking_task() {
        let ctx = ExecutionContext::new("test-run-panic").unwrap();
        let err = ctx.run(|| -> u32 { panic!("boom") }).unwrap_err();
        assert!(matches!(err, ReplError::TaskPanicked { ref name } if name == "test-run-panic"));
        assert_eq!(err.effect(), crate::Effect::Unknown);
        assert_eq!(ctx.run(|| 4).unwrap(), 4);
    }
}

//! Execution context passed as the first argument of every repository call
//!
//! A [`Context`] carries three things down the call chain:
//!
//! - a cancellation signal (shared with every derived child),
//! - an optional deadline (children can only tighten it),
//! - the identity of the active span, so tracer backends can parent spans.
//!
//! The repository layer never creates deadlines of its own; it only forwards
//! what the caller put in the context.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::error::{RepositoryError, Result};

/// Identity of a span, as seen by code that did not create it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpanContext {
    pub trace_id: String,
    pub span_id: u64,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<CancelState>>>,
}

impl CancelState {
    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.notify.notify_waiters();

        let children = match self.children.lock() {
            Ok(mut children) => std::mem::take(&mut *children),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn adopt(&self, child: &Arc<CancelState>) {
        {
            let mut children = match self.children.lock() {
                Ok(children) => children,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Drop registrations of children that no longer exist.
            children.retain(|w| w.strong_count() > 0);
            children.push(Arc::downgrade(child));
        }
        // Parent may have been cancelled before the child was registered.
        if self.is_cancelled() {
            child.cancel();
        }
    }

    async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Handle returned by [`Context::with_cancel`]
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<CancelState>,
}

impl CancelHandle {
    /// Cancel the context and every context derived from it
    pub fn cancel(&self) {
        self.state.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

/// Execution context
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancel: Option<Arc<CancelState>>,
    deadline: Option<Instant>,
    span: Option<SpanContext>,
}

impl Context {
    /// Root context: never cancelled, no deadline, no span
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a cancellable child
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let state = Arc::new(CancelState::default());
        if let Some(parent) = &self.cancel {
            parent.adopt(&state);
        }

        let child = Context {
            cancel: Some(state.clone()),
            deadline: self.deadline,
            span: self.span.clone(),
        };
        (child, CancelHandle { state })
    }

    /// Derive a child with a deadline; an earlier parent deadline wins
    pub fn with_deadline(&self, deadline: Instant) -> Context {
        let deadline = match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        };
        Context {
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
            span: self.span.clone(),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Context {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derive a child carrying `span` as the active span
    pub fn with_span(&self, span: SpanContext) -> Context {
        Context {
            cancel: self.cancel.clone(),
            deadline: self.deadline,
            span: Some(span),
        }
    }

    pub fn span(&self) -> Option<&SpanContext> {
        self.span.as_ref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|state| state.is_cancelled())
    }

    /// Why the context is done, if it is
    pub fn err(&self) -> Option<RepositoryError> {
        if self.is_cancelled() {
            return Some(RepositoryError::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(RepositoryError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn check(&self) -> Result<()> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Resolves once the context is cancelled or its deadline passes
    pub async fn done(&self) {
        let cancelled = async {
            match &self.cancel {
                Some(state) => state.wait().await,
                None => std::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => {
                    tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancelled => {}
            _ = expired => {}
        }
    }

    /// Drive `work` until it finishes or the context is done
    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;

        tokio::select! {
            biased;
            _ = self.done() => Err(self.err().unwrap_or(RepositoryError::Cancelled)),
            result = work => result,
        }
    }
}

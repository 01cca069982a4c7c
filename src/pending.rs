//! Awaitable handle for one submitted call.

use std::{
    fmt,
    future::{Future, IntoFuture},
    pin::Pin,
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc,
    },
};

use tokio::{
    runtime::Handle,
    sync::{oneshot, Notify},
    task::JoinHandle,
};

use crate::{GeoApiError, Result};

/// Lifecycle of a submitted call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultState {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

impl ResultState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Succeeded,
            2 => Self::Failed,
            3 => Self::Cancelled,
            _ => Self::Pending,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Succeeded => 1,
            Self::Failed => 2,
            Self::Cancelled => 3,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: AtomicU8,
    cancel_requested: AtomicBool,
    notify: Notify,
}

impl Shared {
    fn state(&self) -> ResultState {
        ResultState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn request_cancel(&self) {
        if self.state().is_terminal() {
            return;
        }
        self.cancel_requested.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

/// Cancels a call from outside the task that consumes its result.
#[derive(Clone, Debug)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    /// Requests cancellation. See [`PendingResult::cancel`].
    pub fn cancel(&self) {
        self.shared.request_cancel();
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.shared.cancel_requested.load(Ordering::Acquire)
    }
}

/// Handle for one call submitted to a [`RequestContext`](crate::RequestContext).
///
/// The call is already running on the runtime when this value is returned.
/// Consume it exactly once, with one of:
/// - `.await` / [`wait`](Self::wait): the value or the terminal error;
/// - [`wait_ignore_error`](Self::wait_ignore_error): the value, or `None` on failure;
/// - [`blocking_wait`](Self::blocking_wait) from a thread outside the runtime;
/// - [`set_callback`](Self::set_callback).
pub struct PendingResult<T> {
    rx: oneshot::Receiver<Result<T>>,
    shared: Arc<Shared>,
    runtime: Handle,
}

impl<T> fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResult")
            .field("state", &self.state())
            .finish()
    }
}

impl<T> PendingResult<T> {
    /// Current lifecycle state.
    pub fn state(&self) -> ResultState {
        self.shared.state()
    }

    /// Requests cancellation.
    ///
    /// Cancellation is cooperative. A call that has not been dispatched yet
    /// (or is waiting for a permit or a backoff delay) ends as
    /// [`ResultState::Cancelled`]. An HTTP request already in flight runs to
    /// completion; the cancel takes effect at the next retry decision, so a
    /// successful in-flight response still wins.
    pub fn cancel(&self) {
        self.shared.request_cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Waits for the terminal state and returns its value or error.
    pub async fn wait(self) -> Result<T> {
        self.rx.await.unwrap_or(Err(GeoApiError::Cancelled))
    }

    /// Waits for the terminal state; failures yield `None`.
    pub async fn wait_ignore_error(self) -> Option<T> {
        discard_error(self.wait().await)
    }

    /// Blocks the current thread until the call is terminal.
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context;
    /// use [`wait`](Self::wait) there.
    pub fn blocking_wait(self) -> Result<T> {
        self.rx.blocking_recv().unwrap_or(Err(GeoApiError::Cancelled))
    }

    /// Blocking form of [`wait_ignore_error`](Self::wait_ignore_error).
    pub fn blocking_wait_ignore_error(self) -> Option<T> {
        discard_error(self.blocking_wait())
    }
}

impl<T: Send + 'static> PendingResult<T> {
    /// Delivers the outcome to exactly one of the two handlers.
    ///
    /// A result that is already terminal is delivered right away. A
    /// cancelled call is reported to `on_failure` as
    /// [`GeoApiError::Cancelled`].
    pub fn set_callback<S, F>(self, on_success: S, on_failure: F) -> JoinHandle<()>
    where
        S: FnOnce(T) + Send + 'static,
        F: FnOnce(GeoApiError) + Send + 'static,
    {
        let runtime = self.runtime.clone();
        runtime.spawn(async move {
            match self.wait().await {
                Ok(value) => on_success(value),
                Err(err) => on_failure(err),
            }
        })
    }
}

impl<T: Send + 'static> IntoFuture for PendingResult<T> {
    type Output = Result<T>;
    type IntoFuture = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

fn discard_error<T>(result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(_err) => {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %_err, "ignoring failed request");
            None
        }
    }
}

/// Worker side of a [`PendingResult`].
pub(crate) struct Completion<T> {
    tx: oneshot::Sender<Result<T>>,
    shared: Arc<Shared>,
}

impl<T> Completion<T> {
    pub(crate) fn is_cancel_requested(&self) -> bool {
        self.shared.cancel_requested.load(Ordering::Acquire)
    }

    /// Resolves once cancellation has been requested.
    pub(crate) async fn cancelled(&self) {
        loop {
            let notified = self.shared.notify.notified();
            if self.is_cancel_requested() {
                return;
            }
            notified.await;
        }
    }

    /// Moves the call to its terminal state and hands the outcome over.
    pub(crate) fn resolve(self, result: Result<T>) {
        let state = match &result {
            Ok(_) => ResultState::Succeeded,
            Err(GeoApiError::Cancelled) => ResultState::Cancelled,
            Err(_) => ResultState::Failed,
        };
        self.shared.state.store(state.as_u8(), Ordering::Release);
        // The receiver may already be gone; nobody is left to notify.
        let _ = self.tx.send(result);
    }
}

pub(crate) fn pending_pair<T>(runtime: Handle) -> (Completion<T>, PendingResult<T>) {
    let (tx, rx) = oneshot::channel();
    let shared = Arc::new(Shared::default());
    (
        Completion {
            tx,
            shared: Arc::clone(&shared),
        },
        PendingResult {
            rx,
            shared,
            runtime,
        },
    )
}

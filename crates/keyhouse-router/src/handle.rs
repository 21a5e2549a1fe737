//! Fetch Handles - Per-Topic Download State
//!
//! One [`FetchHandle`] tracks one dictionary download from the moment the
//! fetch task is spawned until the topic retires. The handle is the unit of
//! deduplication (at most one handle, and therefore at most one in-flight
//! fetch, per topic) and the unit of cancellation (retiring a version fails
//! its handle from outside the fetch task).
//!
//! ## States
//!
//! ```text
//!             complete()
//! Pending ───────────────► Completed      (dictionary installed, handle
//!    │                                     stays resident for the version)
//!    │        fail(cause)
//!    └──────────────────► Failed(cause)   Transient: retry scheduled
//!                                         Retired:   version left service
//!                                         Stopped:   service shut down
//! ```
//!
//! The first transition out of `Pending` wins; all later attempts are
//! rejected. A fetch task whose `complete()` or `fail(Transient)` loses the
//! race knows the topic was retired or the service stopped mid-flight and
//! must not install bytes or schedule a retry.

use tokio::sync::watch;

/// Observable state of one dictionary download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchState {
    /// The fetch task is running.
    Pending,
    /// The dictionary was delivered to the compressor registry.
    Completed,
    /// The download ended without installing a dictionary.
    Failed(FailureCause),
}

/// Why a download failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The attempt failed; a retry has been scheduled.
    Transient,
    /// The version retired while the fetch was tracked. No retry.
    Retired,
    /// The service stopped. No retry.
    Stopped,
}

/// Tracks one pending or completed dictionary download for a topic.
#[derive(Debug)]
pub struct FetchHandle {
    topic: String,
    state: watch::Sender<FetchState>,
}

impl FetchHandle {
    pub fn new(topic: impl Into<String>) -> Self {
        let (state, _) = watch::channel(FetchState::Pending);
        Self {
            topic: topic.into(),
            state,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> FetchState {
        self.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state(), FetchState::Pending)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state(), FetchState::Completed)
    }

    /// Transition `Pending -> Completed`. Returns whether this call won the
    /// transition.
    pub fn complete(&self) -> bool {
        self.transition(FetchState::Completed)
    }

    /// Transition `Pending -> Failed(cause)`. Returns whether this call won
    /// the transition.
    pub fn fail(&self, cause: FailureCause) -> bool {
        self.transition(FetchState::Failed(cause))
    }

    fn transition(&self, next: FetchState) -> bool {
        self.state.send_if_modified(|state| {
            if *state == FetchState::Pending {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the download leaves `Pending` and return the final state.
    pub async fn wait(&self) -> FetchState {
        let mut rx = self.state.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if current != FetchState::Pending {
                return current;
            }
            if rx.changed().await.is_err() {
                return self.state();
            }
        }
    }
}

use std::sync::{Arc, Mutex, PoisonError};

/// Receives the signal that the authenticated session is over and the user
/// must sign in again.
pub trait SessionObserver: Send + Sync {
    fn session_ended(&self);
}

/// Default observer for the command-line binary: logs and tells the user how
/// to sign back in.
pub struct LogSessionObserver;

impl SessionObserver for LogSessionObserver {
    fn session_ended(&self) {
        tracing::warn!("Session expired, stored credentials were cleared");
        eprintln!("Your session has expired. Run `dermoai login` to sign in again.");
    }
}

/// Observer that only counts notifications. Useful for embedding the client
/// where the host decides what to do after logout.
#[derive(Clone, Default)]
pub struct CountingSessionObserver {
    ended: Arc<Mutex<usize>>,
}

impl CountingSessionObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        *self.ended.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionObserver for CountingSessionObserver {
    fn session_ended(&self) {
        *self.ended.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}

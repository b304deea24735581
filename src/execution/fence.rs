use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceState {
    Active,
    Signaled,
    Error,
}

/// Completion signal for a fenced execution; clones observe the same state
#[derive(Clone)]
pub struct SyncFence {
    inner: Arc<(Mutex<FenceState>, Condvar)>,
}

impl SyncFence {
    /// A fence that has not fired yet
    pub fn new() -> Self {
        Self { inner: Arc::new((Mutex::new(FenceState::Active), Condvar::new())) }
    }

    pub fn create_as_signaled() -> Self {
        Self { inner: Arc::new((Mutex::new(FenceState::Signaled), Condvar::new())) }
    }

    pub fn signal(&self) -> Result<()> {
        self.transition(FenceState::Signaled)
    }

    pub fn signal_error(&self) -> Result<()> {
        self.transition(FenceState::Error)
    }

    fn transition(&self, next: FenceState) -> Result<()> {
        let (state, condvar) = &*self.inner;
        let mut state = state.lock().map_err(|_| poisoned())?;
        if *state == FenceState::Active {
            *state = next;
            condvar.notify_all();
        }
        Ok(())
    }

    pub fn state(&self) -> Result<FenceState> {
        let (state, _) = &*self.inner;
        state.lock().map(|state| *state).map_err(|_| poisoned())
    }

    /// Block until the fence leaves `Active` or `timeout` elapses; returns
    /// the state observed last
    pub fn sync_wait(&self, timeout: Option<Duration>) -> Result<FenceState> {
        let (state, condvar) = &*self.inner;
        let guard = state.lock().map_err(|_| poisoned())?;
        let guard = match timeout {
            Some(timeout) => {
                condvar
                    .wait_timeout_while(guard, timeout, |state| *state == FenceState::Active)
                    .map_err(|_| poisoned())?
                    .0
            }
            None => condvar.wait_while(guard, |state| *state == FenceState::Active).map_err(|_| poisoned())?,
        };
        Ok(*guard)
    }

    pub fn same_as(&self, other: &SyncFence) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for SyncFence {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SyncFence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncFence").field("state", &self.state().ok()).finish()
    }
}

fn poisoned() -> Error {
    Error::GeneralFailure("sync fence lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_signal_wakes_waiter() {
        let fence = SyncFence::new();
        let signaller = fence.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            signaller.signal().unwrap();
        });
        assert_eq!(fence.sync_wait(Some(Duration::from_secs(5))).unwrap(), FenceState::Signaled);
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_times_out_while_active() {
        let fence = SyncFence::new();
        assert_eq!(fence.sync_wait(Some(Duration::from_millis(5))).unwrap(), FenceState::Active);
    }

    #[test]
    fn test_first_transition_wins() {
        let fence = SyncFence::new();
        fence.signal_error().unwrap();
        fence.signal().unwrap();
        assert_eq!(fence.state().unwrap(), FenceState::Error);
        assert_eq!(SyncFence::create_as_signaled().sync_wait(None).unwrap(), FenceState::Signaled);
    }
}

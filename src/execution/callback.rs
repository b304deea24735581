use std::sync::{Condvar, Mutex};
use std::time::Duration;

use super::death::ProtectedCallback;
use crate::error::{Error, Result};
use crate::request::{OutputShape, Timing};

pub type ExecutionResult = Result<(Vec<OutputShape>, Timing)>;

/// Completion slot for an asynchronous execution. The first result wins;
/// later notifications are ignored.
#[derive(Default)]
pub struct ExecutionCallback {
    result: Mutex<Option<ExecutionResult>>,
    notified: Condvar,
}

impl ExecutionCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete(&self, result: ExecutionResult) {
        let Ok(mut slot) = self.result.lock() else {
            return;
        };
        if slot.is_none() {
            *slot = Some(result);
            self.notified.notify_all();
        }
    }

    pub fn is_completed(&self) -> bool {
        self.result.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    /// Block until a result arrives; `None` waits without bound
    pub fn wait(&self, timeout: Option<Duration>) -> ExecutionResult {
        let slot = self.result.lock().map_err(|_| poisoned())?;
        let slot = match timeout {
            Some(timeout) => {
                let (slot, waited) = self
                    .notified
                    .wait_timeout_while(slot, timeout, |slot| slot.is_none())
                    .map_err(|_| poisoned())?;
                if waited.timed_out() && slot.is_none() {
                    return Err(Error::DeadlineExceeded(format!(
                        "no execution result after waiting {:?}",
                        timeout
                    )));
                }
                slot
            }
            None => self.notified.wait_while(slot, |slot| slot.is_none()).map_err(|_| poisoned())?,
        };
        slot.clone().unwrap_or_else(|| Err(Error::GeneralFailure("execution callback woke without a result".to_string())))
    }
}

impl ProtectedCallback for ExecutionCallback {
    fn notify_as_dead_object(&self) {
        self.complete(Err(Error::DeadObject("remote endpoint died before the execution completed".to_string())));
    }
}

fn poisoned() -> Error {
    Error::GeneralFailure("execution callback lock poisoned".to_string())
}

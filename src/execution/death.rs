use std::sync::{Arc, Mutex, MutexGuard, Weak};

use log::warn;

use crate::error::{Error, Result};
use crate::proto::{handle_transport_error, DeathRecipient, TransportResult};

/// A pending callback that must not wait forever on a dead endpoint
pub(crate) trait ProtectedCallback: Send + Sync {
    fn notify_as_dead_object(&self);
}

#[derive(Default)]
struct MonitorState {
    died: bool,
    next_id: u64,
    callbacks: Vec<(u64, Weak<dyn ProtectedCallback>)>,
}

#[derive(Default)]
struct DeathMonitor {
    state: Mutex<MonitorState>,
}

impl DeathMonitor {
    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        // The state stays consistent across a panic in a notified callback
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DeathRecipient for DeathMonitor {
    fn service_died(&self) {
        let callbacks = {
            let mut state = self.lock();
            state.died = true;
            std::mem::take(&mut state.callbacks)
        };
        warn!("remote endpoint died, failing {} pending callbacks", callbacks.len());
        for (_, callback) in callbacks {
            if let Some(callback) = callback.upgrade() {
                callback.notify_as_dead_object();
            }
        }
    }
}

/// Registered as the death recipient of one remote endpoint for as long as
/// the adapter wrapping that endpoint lives
pub struct DeathHandler {
    monitor: Arc<DeathMonitor>,
}

impl DeathHandler {
    /// `link` registers the recipient with the remote endpoint; a refused
    /// registration fails creation
    pub fn create<F>(link: F) -> Result<Self>
    where
        F: FnOnce(Arc<dyn DeathRecipient>) -> TransportResult<bool>,
    {
        let monitor = Arc::new(DeathMonitor::default());
        let linked = handle_transport_error(link(monitor.clone()))?;
        if !linked {
            return Err(Error::GeneralFailure("failed to register a death recipient".to_string()));
        }
        Ok(Self { monitor })
    }

    pub fn has_died(&self) -> bool {
        self.monitor.lock().died
    }

    /// Fail `callback` with a dead-object error if the endpoint dies while
    /// the returned registration is alive
    pub(crate) fn protect_callback(&self, callback: Arc<dyn ProtectedCallback>) -> CallbackRegistration {
        let mut state = self.monitor.lock();
        if state.died {
            drop(state);
            callback.notify_as_dead_object();
            return CallbackRegistration { monitor: self.monitor.clone(), id: None };
        }
        let id = state.next_id;
        state.next_id += 1;
        state.callbacks.push((id, Arc::downgrade(&callback)));
        CallbackRegistration { monitor: self.monitor.clone(), id: Some(id) }
    }
}

/// Removes the protected callback from its handler on drop
pub struct CallbackRegistration {
    monitor: Arc<DeathMonitor>,
    id: Option<u64>,
}

impl Drop for CallbackRegistration {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            self.monitor.lock().callbacks.retain(|(registered, _)| *registered != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::TransportError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl ProtectedCallback for Counter {
        fn notify_as_dead_object(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn linked() -> (DeathHandler, Arc<dyn DeathRecipient>) {
        let mut recipient = None;
        let handler = DeathHandler::create(|r| {
            recipient = Some(r);
            Ok(true)
        })
        .unwrap();
        (handler, recipient.unwrap())
    }

    #[test]
    fn test_death_notifies_registered_callbacks() {
        let (handler, recipient) = linked();
        let counter = Arc::new(Counter::default());
        let _registration = handler.protect_callback(counter.clone());
        recipient.service_died();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert!(handler.has_died());
    }

    #[test]
    fn test_dropped_registration_is_not_notified() {
        let (handler, recipient) = linked();
        let counter = Arc::new(Counter::default());
        drop(handler.protect_callback(counter.clone()));
        recipient.service_died();
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_protect_after_death_notifies_immediately() {
        let (handler, recipient) = linked();
        recipient.service_died();
        let counter = Arc::new(Counter::default());
        let _registration = handler.protect_callback(counter.clone());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_link_failures() {
        assert!(DeathHandler::create(|_| Ok(false)).is_err());
        let error = DeathHandler::create(|_| Err(TransportError::DeadObject)).err().unwrap();
        assert!(error.is_dead_object());
    }
}

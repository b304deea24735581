//! Orchestration steps shared by the endpoint adapters.

use std::borrow::Cow;
use std::time::{Duration, SystemTime};

use log::debug;

use crate::error::{Error, Result};
use crate::memory::{flatten_request, unflatten_request};
use crate::request::{OptionalTimePoint, Request};

/// Result of a synchronous attempt as seen by the fallback logic
#[derive(Debug)]
pub enum SyncOutcome<T> {
    /// Final answer; success or a failure the asynchronous path would repeat
    Completed(Result<T>),
    /// The endpoint answered with a failure status
    Declined(Error),
    /// The round trip itself failed
    TransportFailed(Error),
    /// This endpoint has no synchronous path
    Unsupported,
}

/// Attempt the synchronous path first, then fall back to the asynchronous
/// one unless the transport failed
pub fn execute_with_fallback<T, S, A>(prefer_synchronous: bool, synchronous: S, asynchronous: A) -> Result<T>
where
    S: FnOnce() -> SyncOutcome<T>,
    A: FnOnce() -> Result<T>,
{
    if !prefer_synchronous {
        debug!("synchronous execution declined by options");
        return asynchronous();
    }
    match synchronous() {
        SyncOutcome::Completed(result) => result,
        SyncOutcome::TransportFailed(error) => Err(error),
        SyncOutcome::Declined(error) => {
            debug!("synchronous execution failed ({}), retrying asynchronously", error);
            asynchronous()
        }
        SyncOutcome::Unsupported => {
            debug!("synchronous execution unsupported, using the asynchronous path");
            asynchronous()
        }
    }
}

/// Relocate pointer arguments, run `dispatch` on the relocated request and
/// copy relocated outputs back. Nothing is copied back when `dispatch` fails.
pub fn execute_relocated<T, F>(request: &Request, dispatch: F) -> Result<T>
where
    F: FnOnce(&Request) -> Result<T>,
{
    let flattened = flatten_request(request)?;
    let result = dispatch(&flattened)?;
    if let Cow::Owned(relocated) = &flattened {
        unflatten_request(request, relocated)?;
    }
    Ok(result)
}

/// Time left until `deadline`, or `fallback` without a deadline. A passed
/// deadline leaves zero time.
pub fn remaining(deadline: OptionalTimePoint, fallback: Option<Duration>) -> Option<Duration> {
    match deadline {
        Some(deadline) => Some(deadline.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO)),
        None => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_declined_falls_back() {
        let result = execute_with_fallback(
            true,
            || SyncOutcome::Declined(Error::GeneralFailure("busy".to_string())),
            || Ok(7),
        );
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_transport_failure_is_surfaced() {
        let called = Cell::new(false);
        let result: Result<i32> = execute_with_fallback(
            true,
            || SyncOutcome::TransportFailed(Error::DeadObject("gone".to_string())),
            || {
                called.set(true);
                Ok(1)
            },
        );
        assert!(result.unwrap_err().is_dead_object());
        assert!(!called.get());
    }

    #[test]
    fn test_completed_failure_is_final() {
        let result: Result<i32> = execute_with_fallback(
            true,
            || SyncOutcome::Completed(Err(Error::InvalidArgument("bad".to_string()))),
            || Ok(1),
        );
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_preference_skips_synchronous() {
        let result = execute_with_fallback(false, || -> SyncOutcome<i32> { panic!("synchronous path used") }, || Ok(3));
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_remaining() {
        assert_eq!(remaining(None, None), None);
        assert_eq!(remaining(None, Some(Duration::from_secs(1))), Some(Duration::from_secs(1)));
        let past = SystemTime::now() - Duration::from_secs(10);
        assert_eq!(remaining(Some(past), None), Some(Duration::ZERO));
        let future = SystemTime::now() + Duration::from_secs(60);
        assert!(remaining(Some(future), None).unwrap() > Duration::from_secs(50));
    }
}

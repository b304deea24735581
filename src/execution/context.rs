use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Options shared by every prepared model an adapter creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    /// Try the synchronous round trip before the callback-based path
    pub prefer_synchronous: bool,
    /// Bound on the asynchronous wait when the caller gives no deadline
    pub async_wait_timeout: Option<Duration>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self { prefer_synchronous: true, async_wait_timeout: None }
    }
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_prefer_synchronous(mut self, prefer: bool) -> Self {
        self.prefer_synchronous = prefer;
        self
    }

    pub fn set_async_wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.async_wait_timeout = timeout;
        self
    }

    /// Load options from JSON; absent fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidArgument(format!("invalid execution options: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::GeneralFailure(format!("cannot serialize execution options: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ExecutionOptions::new();
        assert!(options.prefer_synchronous);
        assert_eq!(options.async_wait_timeout, None);
    }

    #[test]
    fn test_from_json_partial() {
        let options = ExecutionOptions::from_json(r#"{"prefer_synchronous": false}"#).unwrap();
        assert!(!options.prefer_synchronous);
        assert_eq!(options.async_wait_timeout, None);

        let options =
            ExecutionOptions::from_json(r#"{"async_wait_timeout": {"secs": 2, "nanos": 0}}"#).unwrap();
        assert!(options.prefer_synchronous);
        assert_eq!(options.async_wait_timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_json_round_trip_and_rejection() {
        let options = ExecutionOptions::new()
            .set_prefer_synchronous(false)
            .set_async_wait_timeout(Some(Duration::from_millis(250)));
        let json = options.to_json().unwrap();
        assert_eq!(ExecutionOptions::from_json(&json).unwrap(), options);

        assert!(matches!(ExecutionOptions::from_json("[1, 2]"), Err(Error::InvalidArgument(_))));
    }
}

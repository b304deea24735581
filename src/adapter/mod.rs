//! Canonical `Device` and `PreparedModel` implementations over the remote
//! endpoints of each interface version.

use crate::error::{Error, Result};
use crate::model::{ErrorStatus, Model};

pub mod aidl;
pub mod v1_0;
pub mod v1_2;

/// Turn an in-band status of a remote call into an error
pub(crate) fn check_status(status: ErrorStatus, call: &str) -> Result<()> {
    match status {
        ErrorStatus::None => Ok(()),
        status => Err(Error::from_status(status, format!("{} failed with {}", call, status))),
    }
}

pub(crate) fn check_supported_operations(supported: Vec<bool>, model: &Model) -> Result<Vec<bool>> {
    let expected = model.main.operations.len();
    if supported.len() != expected {
        return Err(Error::GeneralFailure(format!(
            "getSupportedOperations returned vector of size {} but expected {}",
            supported.len(),
            expected
        )));
    }
    Ok(supported)
}

pub(crate) fn fenced_unsupported() -> Error {
    Error::Unsupported("executeFenced is not supported on 1.x HAL service".to_string())
}

pub(crate) fn missing_prepared_model(call: &str) -> Error {
    Error::GeneralFailure(format!("{} returned no prepared model", call))
}

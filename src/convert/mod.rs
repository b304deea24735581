//! Conversions between canonical types and each wire version.
//!
//! Every wire message converts with `TryFrom` in both directions. The
//! `validated_*` entry points of each version module additionally validate
//! the canonical value and reject values that need a newer version.

use std::fmt::Display;

use crate::error::{Error, Result};
use crate::memory::Handle;
use crate::model::Version;
use crate::proto::NativeHandle;
use crate::validation::Validate;

pub mod aidl;
pub mod v1_0;
pub mod v1_2;

/// Element-wise, order-preserving conversion; the first failure aborts
pub(crate) fn convert_vec<'a, T, U>(items: &'a [T]) -> Result<Vec<U>>
where
    U: TryFrom<&'a T, Error = Error>,
{
    items.iter().map(|item| U::try_from(item)).collect()
}

/// Integer conversion that fails instead of truncating
pub(crate) fn checked<T, U>(value: T, what: &str) -> Result<U>
where
    T: Copy + Display,
    U: TryFrom<T>,
{
    U::try_from(value)
        .map_err(|_| Error::InvalidArgument(format!("{} value {} is out of range", what, value)))
}

pub(crate) fn checked_vec<T, U>(values: &[T], what: &str) -> Result<Vec<U>>
where
    T: Copy + Display,
    U: TryFrom<T>,
{
    values.iter().map(|&value| checked(value, what)).collect()
}

pub(crate) fn required<'a, T>(field: &'a Option<T>, name: &str) -> Result<&'a T> {
    field
        .as_ref()
        .ok_or_else(|| Error::GeneralFailure(format!("missing required field {}", name)))
}

pub(crate) fn not_representable(what: &str, value: impl Display, version: Version) -> Error {
    Error::InvalidArgument(format!("{} {} cannot be represented in {}", what, value, version))
}

pub(crate) fn native_handle_from(handle: &Handle) -> NativeHandle {
    NativeHandle { fds: handle.raw_fds(), ints: handle.ints.clone() }
}

pub(crate) fn handle_from_native(native: &NativeHandle) -> Result<Handle> {
    Handle::duplicate_raw(&native.fds, &native.ints)
}

/// Compare consumer counts received over the wire with the recomputed ones
pub(crate) fn check_number_of_consumers(found: &[u32], expected: &[u32]) -> Result<()> {
    if found.len() != expected.len() {
        return Err(Error::InternalConsistency(format!(
            "{} consumer counts for {} operands",
            found.len(),
            expected.len()
        )));
    }
    for (index, (found, expected)) in found.iter().zip(expected).enumerate() {
        if found != expected {
            return Err(Error::GeneralFailure(format!(
                "Invalid numberOfConsumers for operand {}, expected {} but found {}",
                index, expected, found
            )));
        }
    }
    Ok(())
}

fn insufficient_version(required: Version, version: Version) -> String {
    format!("Insufficient version: {} vs required {}", version, required)
}

/// Convert a wire value and check that `version` can legitimately carry it
pub fn validated_convert_to_canonical<'a, W, C>(wire: &'a W, version: Version) -> Result<C>
where
    C: TryFrom<&'a W, Error = Error> + Validate,
{
    let canonical = C::try_from(wire)?;
    let required = canonical.validate()?;
    if required > version {
        return Err(Error::GeneralFailure(insufficient_version(required, version)));
    }
    Ok(canonical)
}

/// Validate a canonical value and convert it for an endpoint of `version`
pub fn validated_convert_from_canonical<'a, C, W>(canonical: &'a C, version: Version) -> Result<W>
where
    C: Validate,
    W: TryFrom<&'a C, Error = Error>,
{
    let required = canonical.validate()?;
    if required > version {
        return Err(Error::InvalidArgument(insufficient_version(required, version)));
    }
    W::try_from(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_count_length_mismatch() {
        match check_number_of_consumers(&[1, 0], &[1, 0, 2]) {
            Err(Error::InternalConsistency(message)) => assert_eq!(message, "2 consumer counts for 3 operands"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(check_number_of_consumers(&[1, 0, 2], &[1, 0, 2]).is_ok());
    }

    #[test]
    fn test_checked_narrowing() {
        assert_eq!(checked::<i64, u32>(7, "offset").unwrap(), 7);
        assert!(checked::<i64, u32>(-1, "offset").is_err());
        assert!(checked::<u32, i32>(u32::MAX, "length").is_err());
        assert!(checked_vec::<i32, u32>(&[1, 2, -3], "dimension").is_err());
    }

    #[test]
    fn test_consumer_count_mismatch_message() {
        let error = check_number_of_consumers(&[1, 0], &[1, 2]).unwrap_err();
        assert_eq!(
            error,
            Error::GeneralFailure("Invalid numberOfConsumers for operand 1, expected 2 but found 0".to_string())
        );
        assert!(check_number_of_consumers(&[0], &[0]).is_ok());
    }
}

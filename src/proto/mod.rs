//! Wire representations of each HAL interface version.
//!
//! Messages derive `prost::Message` so that every wire value has a byte
//! encoding; the transport that carries them is provided by the caller
//! through the `Remote*` traits of each version.

use thiserror::Error as ThisError;

use crate::error::{Error, Result};

/// Declares a wire enumeration together with its mapping to the canonical
/// enumeration. Every canonical value without a wire encoding must be named
/// in `unmapped`, which keeps `from_canonical` an exhaustive match.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident => $canonical:ty {
            $($variant:ident = $value:literal,)+
        }
        unmapped { $($absent:pat,)* }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum $name {
            $($variant = $value,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn from_i32(value: i32) -> Option<Self> {
                match value {
                    $($value => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> i32 {
                value as i32
            }
        }

        const _: () = {
            type Canonical = $canonical;

            impl $name {
                /// Encoding of a canonical value, or `None` when this
                /// interface version cannot represent it
                pub fn from_canonical(value: Canonical) -> Option<Self> {
                    match value {
                        $(Canonical::$variant => Some($name::$variant),)+
                        $($absent => None,)*
                    }
                }
            }

            impl From<$name> for Canonical {
                fn from(value: $name) -> Self {
                    match value {
                        $($name::$variant => Canonical::$variant,)+
                    }
                }
            }
        };
    };
}

pub mod aidl;
pub mod v1_0;
pub mod v1_2;

/// Native handle as carried on the wire: raw descriptors and integers
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct NativeHandle {
    #[prost(int32, repeated, tag = "1")]
    pub fds: Vec<i32>,
    #[prost(int32, repeated, tag = "2")]
    pub ints: Vec<i32>,
}

/// Failure of the transport itself, as opposed to a status returned by the
/// remote endpoint
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("remote endpoint is dead")]
    DeadObject,

    #[error("transaction failed with status {0}")]
    Failed(i32),

    #[error("service-specific error {0}")]
    ServiceSpecific(i32),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Receives a notification when the remote process dies
pub trait DeathRecipient: Send + Sync {
    fn service_died(&self);
}

/// Classify a transport failure; a dead endpoint becomes `Error::DeadObject`
pub fn handle_transport_error<T>(result: TransportResult<T>) -> Result<T> {
    result.map_err(|error| match error {
        TransportError::DeadObject => {
            Error::DeadObject("remote endpoint died during the call".to_string())
        }
        TransportError::Failed(status) => {
            Error::GeneralFailure(format!("transport failure with status {}", status))
        }
        TransportError::ServiceSpecific(code) => {
            Error::GeneralFailure(format!("service-specific error {}", code))
        }
    })
}

pub mod adapter;
pub mod capabilities;
pub mod convert;
pub mod error;
pub mod execution;
pub mod memory;
pub mod model;
pub mod proto;
pub mod request;
pub mod resilient;
pub mod service;
pub mod validation;

// Re-export the canonical surface
pub use capabilities::{
    Capabilities, Extension, ExtensionOperandTypeInformation, OperandPerformance, OperandPerformanceTable,
    PerformanceInfo,
};
pub use error::{Error, Result};
pub use execution::{
    Device, ExecuteFencedInfoCallback, ExecutionOptions, PreparedModel, SharedDevice, SharedPreparedModel, SyncFence,
};
pub use memory::{flatten_model, flatten_request, unflatten_request, Memory, SharedMemory};
pub use model::{
    DataLocation, DeviceType, ErrorStatus, ExecutionPreference, ExtensionCode, HostPointer, MeasureTiming, Model,
    Operand, OperandLifetime, OperandType, Operation, OperationType, Priority, Subgraph, Version,
};
pub use request::{Argument, ArgumentLifetime, MemoryPool, OutputShape, Request, Timing};
pub use resilient::{HandleState, Resilient, ResilientDevice, ResilientPreparedModel};
pub use service::{get_devices, DeviceProvider};
pub use validation::Validate;

use std::time::{Duration, SystemTime};

use strum::{Display, EnumIter};

use crate::error::Result;
use crate::memory::SharedMemory;
use crate::model::{DataLocation, HostPointer};

/// Absolute point in time after which an execution is no longer useful
pub type OptionalTimePoint = Option<SystemTime>;

/// Relative bound such as a loop timeout
pub type OptionalDuration = Option<Duration>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ArgumentLifetime {
    Pool,
    NoValue,
    Pointer,
}

/// One input or output of an execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub lifetime: ArgumentLifetime,
    pub location: DataLocation,
    pub dimensions: Vec<u32>,
}

impl Argument {
    /// Argument backed by the given region of a request pool
    pub fn from_pool(pool_index: u32, offset: u32, length: u32) -> Self {
        Self {
            lifetime: ArgumentLifetime::Pool,
            location: DataLocation { pointer: None, pool_index, offset, length },
            dimensions: Vec::new(),
        }
    }

    /// Argument backed directly by caller memory
    pub fn from_pointer(pointer: HostPointer) -> Result<Self> {
        Ok(Self {
            lifetime: ArgumentLifetime::Pointer,
            location: DataLocation::from_pointer(pointer)?,
            dimensions: Vec::new(),
        })
    }

    pub fn no_value() -> Self {
        Self {
            lifetime: ArgumentLifetime::NoValue,
            location: DataLocation::default(),
            dimensions: Vec::new(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: Vec<u32>) -> Self {
        self.dimensions = dimensions;
        self
    }
}

/// A memory pool of a request: shared memory, or a driver-managed token
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryPool {
    Memory(SharedMemory),
    Token(u32),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Request {
    pub inputs: Vec<Argument>,
    pub outputs: Vec<Argument>,
    pub pools: Vec<MemoryPool>,
}

impl Request {
    /// True when no argument refers to caller memory directly
    pub fn has_no_pointer_data(&self) -> bool {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .all(|argument| argument.location.pointer.is_none())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputShape {
    pub dimensions: Vec<u32>,
    pub is_sufficient: bool,
}

/// Execution timing; `None` means the duration was not measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timing {
    pub time_on_device: Option<Duration>,
    pub time_in_driver: Option<Duration>,
}

impl Timing {
    pub const NOT_MEASURED: Timing = Timing { time_on_device: None, time_in_driver: None };
}

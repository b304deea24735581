//! Canonical execution surface and the machinery shared by every endpoint
//! adapter: options, completion callbacks, death monitoring, fences and the
//! synchronous-then-asynchronous orchestration.

use std::sync::Arc;

use crate::capabilities::{Capabilities, Extension};
use crate::error::Result;
use crate::model::{DeviceType, ExecutionPreference, MeasureTiming, Model, Priority, Version};
use crate::request::{OptionalDuration, OptionalTimePoint, OutputShape, Request, Timing};

pub mod callback;
pub mod context;
pub mod death;
pub mod engine;
pub mod fence;

pub use callback::ExecutionCallback;
pub use context::ExecutionOptions;
pub use death::{CallbackRegistration, DeathHandler};
pub use fence::{FenceState, SyncFence};

/// Yields (launched timing, fenced timing) once a fenced execution finished
pub type ExecuteFencedInfoCallback = Arc<dyn Fn() -> Result<(Timing, Timing)> + Send + Sync>;

/// A model compiled by a device, ready to run requests
pub trait PreparedModel: Send + Sync {
    /// Run `request` and block until its outputs are available.
    ///
    /// Pointer-based arguments are relocated into shared memory for the
    /// remote call and copied back on success only.
    fn execute(
        &self,
        request: &Request,
        measure: MeasureTiming,
        deadline: OptionalTimePoint,
        loop_timeout_duration: OptionalDuration,
    ) -> Result<(Vec<OutputShape>, Timing)>;

    /// Launch `request` once every fence in `wait_for` is signalled and
    /// return a fence for its completion instead of blocking.
    fn execute_fenced(
        &self,
        request: &Request,
        wait_for: &[SyncFence],
        measure: MeasureTiming,
        deadline: OptionalTimePoint,
        loop_timeout_duration: OptionalDuration,
        timeout_duration_after_fence: OptionalDuration,
    ) -> Result<(SyncFence, ExecuteFencedInfoCallback)>;
}

pub type SharedPreparedModel = Arc<dyn PreparedModel>;

/// A compute device reachable through some interface version
pub trait Device: Send + Sync {
    fn name(&self) -> &str;

    fn version_string(&self) -> &str;

    fn feature_level(&self) -> Version;

    fn device_type(&self) -> DeviceType;

    fn supported_extensions(&self) -> &[Extension];

    fn capabilities(&self) -> &Capabilities;

    /// One flag per operation of the main subgraph
    fn get_supported_operations(&self, model: &Model) -> Result<Vec<bool>>;

    fn prepare_model(
        &self,
        model: &Model,
        preference: ExecutionPreference,
        priority: Priority,
        deadline: OptionalTimePoint,
    ) -> Result<SharedPreparedModel>;
}

pub type SharedDevice = Arc<dyn Device>;

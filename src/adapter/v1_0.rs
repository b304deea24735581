use std::sync::Arc;

use super::{check_status, check_supported_operations, fenced_unsupported, missing_prepared_model};
use crate::capabilities::{Capabilities, Extension};
use crate::convert::v1_0 as convert;
use crate::error::{Error, Result};
use crate::execution::engine::{execute_relocated, remaining};
use crate::execution::{
    DeathHandler, Device, ExecuteFencedInfoCallback, ExecutionCallback, ExecutionOptions, PreparedModel,
    SharedPreparedModel, SyncFence,
};
use crate::memory::flatten_model;
use crate::model::{DeviceType, ErrorStatus, ExecutionPreference, MeasureTiming, Model, Priority, Version};
use crate::proto::{handle_transport_error, v1_0 as wire};
use crate::request::{OptionalDuration, OptionalTimePoint, OutputShape, Request, Timing};

impl wire::RemoteExecutionCallback for ExecutionCallback {
    fn notify(&self, status: i32) {
        let result = match convert::status_to_canonical(status) {
            ErrorStatus::None => Ok((Vec::new(), Timing::NOT_MEASURED)),
            status => Err(Error::from_status(status, format!("execution failed with {}", status))),
        };
        self.complete(result);
    }
}

/// Prepared model behind a HAL 1.0 endpoint; executions are asynchronous
/// only and never report timing
pub struct HalPreparedModel {
    remote: Arc<dyn wire::RemotePreparedModel>,
    death_handler: DeathHandler,
    options: ExecutionOptions,
}

impl HalPreparedModel {
    pub fn create(remote: Arc<dyn wire::RemotePreparedModel>, options: ExecutionOptions) -> Result<Arc<Self>> {
        let death_handler = DeathHandler::create(|recipient| remote.link_to_death(recipient))?;
        Ok(Arc::new(Self { remote, death_handler, options }))
    }

    fn execute_asynchronously(
        &self,
        request: &wire::Request,
        deadline: OptionalTimePoint,
    ) -> Result<(Vec<OutputShape>, Timing)> {
        let callback = Arc::new(ExecutionCallback::new());
        let _registration = self.death_handler.protect_callback(callback.clone());

        let status = handle_transport_error(self.remote.execute(request, callback.clone()))?;
        check_status(convert::status_to_canonical(status), "execute")?;

        callback.wait(remaining(deadline, self.options.async_wait_timeout))
    }
}

impl PreparedModel for HalPreparedModel {
    fn execute(
        &self,
        request: &Request,
        _measure: MeasureTiming,
        deadline: OptionalTimePoint,
        _loop_timeout_duration: OptionalDuration,
    ) -> Result<(Vec<OutputShape>, Timing)> {
        execute_relocated(request, |flattened| {
            let request: wire::Request = convert::validated_from_canonical(flattened)?;
            self.execute_asynchronously(&request, deadline)
        })
    }

    fn execute_fenced(
        &self,
        _request: &Request,
        _wait_for: &[SyncFence],
        _measure: MeasureTiming,
        _deadline: OptionalTimePoint,
        _loop_timeout_duration: OptionalDuration,
        _timeout_duration_after_fence: OptionalDuration,
    ) -> Result<(SyncFence, ExecuteFencedInfoCallback)> {
        Err(fenced_unsupported())
    }
}

/// Device behind a HAL 1.0 endpoint
pub struct HalDevice {
    name: String,
    remote: Arc<dyn wire::RemoteDevice>,
    capabilities: Capabilities,
    options: ExecutionOptions,
    _death_handler: DeathHandler,
}

impl HalDevice {
    pub fn create(
        name: impl Into<String>,
        remote: Arc<dyn wire::RemoteDevice>,
        options: ExecutionOptions,
    ) -> Result<Arc<Self>> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("device name must not be empty".to_string()));
        }

        let (status, capabilities) = handle_transport_error(remote.get_capabilities())?;
        check_status(convert::status_to_canonical(status), "getCapabilities")?;
        let capabilities = convert::validated_to_canonical(&capabilities)?;

        let death_handler = DeathHandler::create(|recipient| remote.link_to_death(recipient))?;
        Ok(Arc::new(Self { name, remote, capabilities, options, _death_handler: death_handler }))
    }
}

impl Device for HalDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn version_string(&self) -> &str {
        "UNKNOWN"
    }

    fn feature_level(&self) -> Version {
        convert::VERSION
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::Unknown
    }

    fn supported_extensions(&self) -> &[Extension] {
        &[]
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn get_supported_operations(&self, model: &Model) -> Result<Vec<bool>> {
        let flattened = flatten_model(model)?;
        let wire_model: wire::Model = convert::validated_from_canonical(&*flattened)?;

        let (status, supported) = handle_transport_error(self.remote.get_supported_operations(&wire_model))?;
        check_status(convert::status_to_canonical(status), "getSupportedOperations")?;
        check_supported_operations(supported, model)
    }

    fn prepare_model(
        &self,
        model: &Model,
        _preference: ExecutionPreference,
        _priority: Priority,
        _deadline: OptionalTimePoint,
    ) -> Result<SharedPreparedModel> {
        let flattened = flatten_model(model)?;
        let wire_model: wire::Model = convert::validated_from_canonical(&*flattened)?;

        let (status, prepared) = handle_transport_error(self.remote.prepare_model(&wire_model))?;
        check_status(convert::status_to_canonical(status), "prepareModel")?;
        let prepared = prepared.ok_or_else(|| missing_prepared_model("prepareModel"))?;
        Ok(HalPreparedModel::create(prepared, self.options.clone())?)
    }
}

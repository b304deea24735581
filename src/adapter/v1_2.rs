use std::sync::Arc;

use super::{check_status, check_supported_operations, fenced_unsupported, missing_prepared_model};
use crate::capabilities::{Capabilities, Extension};
use crate::convert::v1_2 as convert;
use crate::error::{Error, Result};
use crate::execution::engine::{execute_relocated, execute_with_fallback, remaining, SyncOutcome};
use crate::execution::{
    DeathHandler, Device, ExecuteFencedInfoCallback, ExecutionCallback, ExecutionOptions, PreparedModel,
    SharedPreparedModel, SyncFence,
};
use crate::memory::flatten_model;
use crate::model::{DeviceType, ErrorStatus, ExecutionPreference, MeasureTiming, Model, Priority, Version};
use crate::proto::{handle_transport_error, v1_2 as wire};
use crate::request::{OptionalDuration, OptionalTimePoint, OutputShape, Request, Timing};

/// Canonical result of a finished execution, whichever path reported it
fn execution_result(
    status: ErrorStatus,
    output_shapes: &[wire::OutputShape],
    timing: &wire::Timing,
) -> Result<(Vec<OutputShape>, Timing)> {
    match status {
        ErrorStatus::None => {
            let output_shapes = output_shapes
                .iter()
                .map(|shape| convert::validated_to_canonical(shape))
                .collect::<Result<Vec<OutputShape>>>()?;
            Ok((output_shapes, convert::validated_to_canonical(timing)?))
        }
        ErrorStatus::OutputInsufficientSize => Err(Error::OutputInsufficientSize {
            message: "execution failed with OUTPUT_INSUFFICIENT_SIZE".to_string(),
            output_shapes: output_shapes.iter().map(OutputShape::try_from).collect::<Result<Vec<_>>>()?,
        }),
        status => Err(Error::from_status(status, format!("execution failed with {}", status))),
    }
}

impl wire::RemoteExecutionCallback for ExecutionCallback {
    fn notify_1_2(&self, status: i32, output_shapes: Vec<wire::OutputShape>, timing: wire::Timing) {
        self.complete(execution_result(convert::status_to_canonical(status), &output_shapes, &timing));
    }
}

/// Prepared model behind a HAL 1.2 endpoint
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

    fn execute_synchronously(
        &self,
        request: &wire::Request,
        measure: wire::MeasureTiming,
    ) -> SyncOutcome<(Vec<OutputShape>, Timing)> {
        let (status, output_shapes, timing) =
            match handle_transport_error(self.remote.execute_synchronously(request, measure)) {
                Ok(reply) => reply,
                Err(error) => return SyncOutcome::TransportFailed(error),
            };
        match convert::status_to_canonical(status) {
            status @ (ErrorStatus::None | ErrorStatus::OutputInsufficientSize) => {
                SyncOutcome::Completed(execution_result(status, &output_shapes, &timing))
            }
            status => SyncOutcome::Declined(Error::from_status(
                status,
                format!("executeSynchronously failed with {}", status),
            )),
        }
    }

    fn execute_asynchronously(
        &self,
        request: &wire::Request,
        measure: wire::MeasureTiming,
        deadline: OptionalTimePoint,
    ) -> Result<(Vec<OutputShape>, Timing)> {
        let callback = Arc::new(ExecutionCallback::new());
        let _registration = self.death_handler.protect_callback(callback.clone());

        let status = handle_transport_error(self.remote.execute_1_2(request, measure, callback.clone()))?;
        check_status(convert::status_to_canonical(status), "execute_1_2")?;

        callback.wait(remaining(deadline, self.options.async_wait_timeout))
    }
}

impl PreparedModel for HalPreparedModel {
    fn execute(
        &self,
        request: &Request,
        measure: MeasureTiming,
        deadline: OptionalTimePoint,
        _loop_timeout_duration: OptionalDuration,
    ) -> Result<(Vec<OutputShape>, Timing)> {
        execute_relocated(request, |flattened| {
            let request: wire::Request = convert::validated_from_canonical(flattened)?;
            let measure = convert::measure_timing_from_canonical(measure)?;
            execute_with_fallback(
                self.options.prefer_synchronous,
                || self.execute_synchronously(&request, measure),
                || self.execute_asynchronously(&request, measure, deadline),
            )
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

/// Device behind a HAL 1.2 endpoint; its metadata is read once at creation
pub struct HalDevice {
    name: String,
    version_string: String,
    device_type: DeviceType,
    extensions: Vec<Extension>,
    capabilities: Capabilities,
    remote: Arc<dyn wire::RemoteDevice>,
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

        let (status, version_string) = handle_transport_error(remote.get_version_string())?;
        check_status(convert::status_to_canonical(status), "getVersionString")?;

        let (status, device_type) = handle_transport_error(remote.get_type())?;
        check_status(convert::status_to_canonical(status), "getType")?;
        let device_type = convert::device_type_to_canonical(device_type)?;

        let (status, extensions) = handle_transport_error(remote.get_supported_extensions())?;
        check_status(convert::status_to_canonical(status), "getSupportedExtensions")?;
        let extensions = extensions
            .iter()
            .map(|extension| convert::validated_to_canonical(extension))
            .collect::<Result<Vec<Extension>>>()?;

        let (status, capabilities) = handle_transport_error(remote.get_capabilities_1_2())?;
        check_status(convert::status_to_canonical(status), "getCapabilities_1_2")?;
        let capabilities = convert::validated_to_canonical(&capabilities)?;

        let death_handler = DeathHandler::create(|recipient| remote.link_to_death(recipient))?;
        Ok(Arc::new(Self {
            name,
            version_string,
            device_type,
            extensions,
            capabilities,
            remote,
            options,
            _death_handler: death_handler,
        }))
    }
}

impl Device for HalDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn version_string(&self) -> &str {
        &self.version_string
    }

    fn feature_level(&self) -> Version {
        convert::VERSION
    }

    fn device_type(&self) -> DeviceType {
        self.device_type
    }

    fn supported_extensions(&self) -> &[Extension] {
        &self.extensions
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn get_supported_operations(&self, model: &Model) -> Result<Vec<bool>> {
        let flattened = flatten_model(model)?;
        let wire_model: wire::Model = convert::validated_from_canonical(&*flattened)?;

        let (status, supported) = handle_transport_error(self.remote.get_supported_operations_1_2(&wire_model))?;
        check_status(convert::status_to_canonical(status), "getSupportedOperations_1_2")?;
        check_supported_operations(supported, model)
    }

    fn prepare_model(
        &self,
        model: &Model,
        preference: ExecutionPreference,
        _priority: Priority,
        _deadline: OptionalTimePoint,
    ) -> Result<SharedPreparedModel> {
        let flattened = flatten_model(model)?;
        let wire_model: wire::Model = convert::validated_from_canonical(&*flattened)?;
        let preference = convert::execution_preference_from_canonical(preference)?;

        let (status, prepared) = handle_transport_error(self.remote.prepare_model_1_2(&wire_model, preference))?;
        check_status(convert::status_to_canonical(status), "prepareModel_1_2")?;
        let prepared = prepared.ok_or_else(|| missing_prepared_model("prepareModel_1_2"))?;
        Ok(HalPreparedModel::create(prepared, self.options.clone())?)
    }
}

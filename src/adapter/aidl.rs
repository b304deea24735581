use std::borrow::Cow;
use std::sync::Arc;

use log::debug;

use super::{check_status, check_supported_operations};
use crate::capabilities::{Capabilities, Extension};
use crate::convert::aidl::{self as convert, handle_transport_error};
use crate::error::{Error, Result};
use crate::execution::engine::{execute_relocated, remaining};
use crate::execution::{
    DeathHandler, Device, ExecuteFencedInfoCallback, ExecutionOptions, FenceState, PreparedModel,
    SharedPreparedModel, SyncFence,
};
use crate::memory::{flatten_model, flatten_request, unflatten_request};
use crate::model::{DeviceType, ExecutionPreference, MeasureTiming, Model, Priority, Version};
use crate::proto::aidl as wire;
use crate::request::{OptionalDuration, OptionalTimePoint, OutputShape, Request, Timing};

fn execution_result(result: &wire::ExecutionResult) -> Result<(Vec<OutputShape>, Timing)> {
    if !result.output_sufficient_size {
        return Err(Error::OutputInsufficientSize {
            message: "execution failed with OUTPUT_INSUFFICIENT_SIZE".to_string(),
            output_shapes: result.output_shapes.iter().map(OutputShape::try_from).collect::<Result<Vec<_>>>()?,
        });
    }
    let output_shapes = result
        .output_shapes
        .iter()
        .map(|shape| convert::validated_to_canonical(shape))
        .collect::<Result<Vec<OutputShape>>>()?;
    let timing = match &result.timing {
        Some(timing) => convert::validated_to_canonical(timing)?,
        None => Timing::NOT_MEASURED,
    };
    Ok((output_shapes, timing))
}

/// Prepared model behind an AIDL endpoint. Executions are synchronous or
/// fenced; there is no callback-based path.
pub struct HalPreparedModel {
    remote: Arc<dyn wire::RemotePreparedModel>,
    options: ExecutionOptions,
    _death_handler: DeathHandler,
}

impl HalPreparedModel {
    pub fn create(remote: Arc<dyn wire::RemotePreparedModel>, options: ExecutionOptions) -> Result<Arc<Self>> {
        let death_handler = DeathHandler::create(|recipient| remote.link_to_death(recipient))?;
        Ok(Arc::new(Self { remote, options, _death_handler: death_handler }))
    }
}

impl PreparedModel for HalPreparedModel {
    fn execute(
        &self,
        request: &Request,
        measure: MeasureTiming,
        deadline: OptionalTimePoint,
        loop_timeout_duration: OptionalDuration,
    ) -> Result<(Vec<OutputShape>, Timing)> {
        execute_relocated(request, |flattened| {
            let request: wire::Request = convert::validated_from_canonical(flattened)?;
            let deadline_ns = convert::deadline_to_wire(deadline)?;
            let loop_timeout_ns = convert::duration_to_wire(loop_timeout_duration)?;

            let result = handle_transport_error(self.remote.execute_synchronously(
                &request,
                measure == MeasureTiming::Yes,
                deadline_ns,
                loop_timeout_ns,
            ))?;
            execution_result(&result)
        })
    }

    fn execute_fenced(
        &self,
        request: &Request,
        wait_for: &[SyncFence],
        measure: MeasureTiming,
        deadline: OptionalTimePoint,
        loop_timeout_duration: OptionalDuration,
        timeout_duration_after_fence: OptionalDuration,
    ) -> Result<(SyncFence, ExecuteFencedInfoCallback)> {
        let flattened = flatten_request(request)?;
        let wire_request: wire::Request = convert::validated_from_canonical(&*flattened)?;

        let result = handle_transport_error(self.remote.execute_fenced(
            &wire_request,
            wait_for,
            measure == MeasureTiming::Yes,
            convert::deadline_to_wire(deadline)?,
            convert::duration_to_wire(loop_timeout_duration)?,
            convert::duration_to_wire(timeout_duration_after_fence)?,
        ))?;
        let callback = result
            .callback
            .ok_or_else(|| Error::GeneralFailure("executeFenced returned no callback".to_string()))?;
        let fence = result.sync_fence.unwrap_or_else(SyncFence::create_as_signaled);

        // Relocated outputs only hold results once the fence fires. The wait
        // is bounded by the deadline, or by the async wait timeout without one.
        if let Cow::Owned(relocated) = &flattened {
            debug!("waiting on the fence to copy relocated outputs back");
            match fence.sync_wait(remaining(deadline, self.options.async_wait_timeout))? {
                FenceState::Signaled => {}
                FenceState::Active => {
                    return Err(Error::DeadlineExceeded(
                        "fenced execution did not signal in time to copy outputs back".to_string(),
                    ))
                }
                FenceState::Error => {
                    return Err(Error::GeneralFailure("fenced execution signalled an error".to_string()))
                }
            }
            unflatten_request(request, relocated)?;
        }

        let info: ExecuteFencedInfoCallback = Arc::new(move || -> Result<(Timing, Timing)> {
            let (launched, fenced, status) = handle_transport_error(callback.get_execution_info())?;
            check_status(convert::status_to_canonical(status), "fenced execution")?;
            Ok((convert::validated_to_canonical(&launched)?, convert::validated_to_canonical(&fenced)?))
        });
        Ok((fence, info))
    }
}

/// Device behind an AIDL endpoint; its metadata is read once at creation
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

        let version_string = handle_transport_error(remote.get_version_string())?;
        let device_type = convert::device_type_to_canonical(handle_transport_error(remote.get_type())?)?;
        let extensions = handle_transport_error(remote.get_supported_extensions())?
            .iter()
            .map(|extension| convert::validated_to_canonical(extension))
            .collect::<Result<Vec<Extension>>>()?;
        let capabilities = convert::validated_to_canonical(&handle_transport_error(remote.get_capabilities())?)?;

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

        let supported = handle_transport_error(self.remote.get_supported_operations(&wire_model))?;
        check_supported_operations(supported, model)
    }

    fn prepare_model(
        &self,
        model: &Model,
        preference: ExecutionPreference,
        priority: Priority,
        deadline: OptionalTimePoint,
    ) -> Result<SharedPreparedModel> {
        let flattened = flatten_model(model)?;
        let wire_model: wire::Model = convert::validated_from_canonical(&*flattened)?;

        let prepared = handle_transport_error(self.remote.prepare_model(
            &wire_model,
            convert::execution_preference_from_canonical(preference)?,
            convert::priority_from_canonical(priority)?,
            convert::deadline_to_wire(deadline)?,
        ))?;
        Ok(HalPreparedModel::create(prepared, self.options.clone())?)
    }
}

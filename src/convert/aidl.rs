use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use super::{
    checked, checked_vec, convert_vec, handle_from_native, native_handle_from, not_representable, required,
};
use crate::capabilities::{
    Capabilities, Extension, ExtensionOperandTypeInformation, OperandPerformance, OperandPerformanceTable,
    PerformanceInfo,
};
use crate::error::{Error, Result};
use crate::memory::Memory;
use crate::model::{
    DataLocation, DeviceType, ErrorStatus, ExecutionPreference, ExtensionCode, ExtensionNameAndPrefix, ExtraParams,
    Model, Operand, OperandLifetime, OperandType, Operation, OperationType, Priority, Subgraph,
    SymmPerChannelQuantParams, Version,
};
use crate::proto::{self, aidl as wire, TransportError, TransportResult};
use crate::request::{
    Argument, ArgumentLifetime, MemoryPool, OptionalDuration, OptionalTimePoint, OutputShape, Request, Timing,
};
use crate::validation::Validate;

pub const VERSION: Version = Version::Aidl;

/// Wire value for an absent deadline, duration or measurement
pub const NO_VALUE: i64 = -1;

pub fn validated_to_canonical<'a, W, C>(wire: &'a W) -> Result<C>
where
    C: TryFrom<&'a W, Error = Error> + Validate,
{
    super::validated_convert_to_canonical(wire, VERSION)
}

pub fn validated_from_canonical<'a, C, W>(canonical: &'a C) -> Result<W>
where
    C: Validate,
    W: TryFrom<&'a C, Error = Error>,
{
    super::validated_convert_from_canonical(canonical, VERSION)
}

fn extension_code(code: i32) -> Option<ExtensionCode> {
    u32::try_from(code).ok().and_then(ExtensionCode::from_code)
}

pub fn operand_type_to_canonical(code: i32) -> Result<OperandType> {
    if let Some(known) = wire::OperandType::from_i32(code) {
        return Ok(known.into());
    }
    extension_code(code)
        .map(OperandType::Extension)
        .ok_or_else(|| Error::GeneralFailure(format!("Unrecognized OperandType {}", code)))
}

pub fn operand_type_from_canonical(operand_type: OperandType) -> Result<i32> {
    if let OperandType::Extension(extension) = operand_type {
        return checked(extension.code(), "extension OperandType");
    }
    wire::OperandType::from_canonical(operand_type)
        .map(i32::from)
        .ok_or_else(|| not_representable("OperandType", operand_type, VERSION))
}

pub fn operation_type_to_canonical(code: i32) -> Result<OperationType> {
    if let Some(known) = wire::OperationType::from_i32(code) {
        return Ok(known.into());
    }
    extension_code(code)
        .map(OperationType::Extension)
        .ok_or_else(|| Error::GeneralFailure(format!("Unrecognized OperationType {}", code)))
}

pub fn operation_type_from_canonical(operation_type: OperationType) -> Result<i32> {
    if let OperationType::Extension(extension) = operation_type {
        return checked(extension.code(), "extension OperationType");
    }
    wire::OperationType::from_canonical(operation_type)
        .map(i32::from)
        .ok_or_else(|| not_representable("OperationType", operation_type, VERSION))
}

pub fn lifetime_to_canonical(code: i32) -> Result<OperandLifetime> {
    wire::OperandLifetime::from_i32(code)
        .map(OperandLifetime::from)
        .ok_or_else(|| Error::GeneralFailure(format!("Unrecognized OperandLifetime {}", code)))
}

pub fn lifetime_from_canonical(lifetime: OperandLifetime) -> Result<i32> {
    wire::OperandLifetime::from_canonical(lifetime)
        .map(i32::from)
        .ok_or_else(|| not_representable("OperandLifetime", lifetime, VERSION))
}

pub fn device_type_to_canonical(code: i32) -> Result<DeviceType> {
    wire::DeviceType::from_i32(code)
        .map(DeviceType::from)
        .ok_or_else(|| Error::GeneralFailure(format!("Unrecognized DeviceType {}", code)))
}

/// Unknown codes are reported as a general failure
pub fn status_to_canonical(code: i32) -> ErrorStatus {
    wire::ErrorStatus::from_i32(code).map(ErrorStatus::from).unwrap_or(ErrorStatus::GeneralFailure)
}

pub fn status_from_canonical(status: ErrorStatus) -> Result<i32> {
    wire::ErrorStatus::from_canonical(status)
        .map(i32::from)
        .ok_or_else(|| not_representable("ErrorStatus", status, VERSION))
}

pub fn execution_preference_from_canonical(preference: ExecutionPreference) -> Result<wire::ExecutionPreference> {
    wire::ExecutionPreference::from_canonical(preference)
        .ok_or_else(|| not_representable("ExecutionPreference", preference, VERSION))
}

pub fn priority_from_canonical(priority: Priority) -> Result<wire::Priority> {
    wire::Priority::from_canonical(priority).ok_or_else(|| not_representable("Priority", priority, VERSION))
}

/// Like [`proto::handle_transport_error`], but a service-specific error
/// carries an `ErrorStatus` code and keeps its classification
pub fn handle_transport_error<T>(result: TransportResult<T>) -> Result<T> {
    match result {
        Err(TransportError::ServiceSpecific(code)) => Err(Error::from_status(
            status_to_canonical(code),
            format!("remote call failed with service-specific error {}", code),
        )),
        other => proto::handle_transport_error(other),
    }
}

/// Nanoseconds since the UNIX epoch, or `-1` without a deadline
pub fn deadline_to_wire(deadline: OptionalTimePoint) -> Result<i64> {
    let Some(deadline) = deadline else {
        return Ok(NO_VALUE);
    };
    let since_epoch = deadline
        .duration_since(UNIX_EPOCH)
        .map_err(|_| Error::InvalidArgument("deadline precedes the UNIX epoch".to_string()))?;
    checked(since_epoch.as_nanos(), "deadline")
}

/// Nanoseconds, or `-1` without a duration
pub fn duration_to_wire(duration: OptionalDuration) -> Result<i64> {
    match duration {
        None => Ok(NO_VALUE),
        Some(duration) => checked(duration.as_nanos(), "duration"),
    }
}

fn duration_from_wire(nanos: i64, what: &str) -> Result<Option<Duration>> {
    match nanos {
        NO_VALUE => Ok(None),
        nanos if nanos < 0 => Err(Error::GeneralFailure(format!("Invalid {} {}", what, nanos))),
        nanos => Ok(Some(Duration::from_nanos(nanos as u64))),
    }
}

impl From<&wire::PerformanceInfo> for PerformanceInfo {
    fn from(info: &wire::PerformanceInfo) -> Self {
        PerformanceInfo { exec_time: info.exec_time, power_usage: info.power_usage }
    }
}

impl From<&PerformanceInfo> for wire::PerformanceInfo {
    fn from(info: &PerformanceInfo) -> Self {
        wire::PerformanceInfo { exec_time: info.exec_time, power_usage: info.power_usage }
    }
}

fn performance_or_none(info: &Option<wire::PerformanceInfo>) -> PerformanceInfo {
    info.as_ref().map(PerformanceInfo::from).unwrap_or(PerformanceInfo::NONE)
}

impl TryFrom<&wire::OperandPerformance> for OperandPerformance {
    type Error = Error;

    fn try_from(performance: &wire::OperandPerformance) -> Result<Self> {
        Ok(OperandPerformance {
            operand_type: operand_type_to_canonical(performance.r#type)?,
            info: performance_or_none(&performance.info),
        })
    }
}

impl TryFrom<&OperandPerformance> for wire::OperandPerformance {
    type Error = Error;

    fn try_from(performance: &OperandPerformance) -> Result<Self> {
        Ok(wire::OperandPerformance {
            r#type: operand_type_from_canonical(performance.operand_type)?,
            info: Some((&performance.info).into()),
        })
    }
}

impl TryFrom<&wire::Capabilities> for Capabilities {
    type Error = Error;

    fn try_from(capabilities: &wire::Capabilities) -> Result<Self> {
        let entries: Vec<OperandPerformance> = convert_vec(&capabilities.operand_performance).map_err(|e| {
            Error::GeneralFailure(format!(
                "Invalid OperandType when converting OperandPerformance in Capabilities: {}",
                e
            ))
        })?;
        let operand_performance = OperandPerformanceTable::create(entries)
            .map_err(|e| Error::GeneralFailure(format!("Invalid Capabilities: {}", e)))?;

        Ok(Capabilities {
            relaxed_float32_to_float16_performance_scalar: performance_or_none(
                &capabilities.relaxed_float32_to_float16_performance_scalar,
            ),
            relaxed_float32_to_float16_performance_tensor: performance_or_none(
                &capabilities.relaxed_float32_to_float16_performance_tensor,
            ),
            operand_performance,
            if_performance: performance_or_none(&capabilities.if_performance),
            while_performance: performance_or_none(&capabilities.while_performance),
        })
    }
}

impl TryFrom<&Capabilities> for wire::Capabilities {
    type Error = Error;

    fn try_from(capabilities: &Capabilities) -> Result<Self> {
        // OEM types have no AIDL encoding and are left out of the table
        let operand_performance = capabilities
            .operand_performance
            .as_slice()
            .iter()
            .filter(|entry| {
                entry.operand_type.is_extension() || wire::OperandType::from_canonical(entry.operand_type).is_some()
            })
            .map(wire::OperandPerformance::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(wire::Capabilities {
            relaxed_float32_to_float16_performance_scalar: Some(
                (&capabilities.relaxed_float32_to_float16_performance_scalar).into(),
            ),
            relaxed_float32_to_float16_performance_tensor: Some(
                (&capabilities.relaxed_float32_to_float16_performance_tensor).into(),
            ),
            operand_performance,
            if_performance: Some((&capabilities.if_performance).into()),
            while_performance: Some((&capabilities.while_performance).into()),
        })
    }
}

impl TryFrom<&wire::DataLocation> for DataLocation {
    type Error = Error;

    fn try_from(location: &wire::DataLocation) -> Result<Self> {
        Ok(DataLocation {
            pointer: None,
            pool_index: checked(location.pool_index, "DataLocation pool index")?,
            offset: checked(location.offset, "DataLocation offset")?,
            length: checked(location.length, "DataLocation length")?,
        })
    }
}

impl TryFrom<&DataLocation> for wire::DataLocation {
    type Error = Error;

    fn try_from(location: &DataLocation) -> Result<Self> {
        if location.pointer.is_some() {
            return Err(Error::InvalidArgument(
                "pointer-based locations cannot be sent to a remote endpoint".to_string(),
            ));
        }
        Ok(wire::DataLocation {
            pool_index: checked(location.pool_index, "DataLocation pool index")?,
            offset: i64::from(location.offset),
            length: i64::from(location.length),
        })
    }
}

fn location_to_canonical(location: &Option<wire::DataLocation>) -> Result<DataLocation> {
    location.as_ref().map(DataLocation::try_from).transpose().map(Option::unwrap_or_default)
}

fn extra_params_to_canonical(params: &Option<wire::operand::ExtraParams>) -> Result<ExtraParams> {
    Ok(match params {
        None => ExtraParams::None,
        Some(wire::operand::ExtraParams::ChannelQuant(quant)) => ExtraParams::ChannelQuant(SymmPerChannelQuantParams {
            scales: quant.scales.clone(),
            channel_dim: checked(quant.channel_dim, "channelDim")?,
        }),
        Some(wire::operand::ExtraParams::Extension(data)) => ExtraParams::Extension(data.clone()),
    })
}

fn extra_params_from_canonical(params: &ExtraParams) -> Result<Option<wire::operand::ExtraParams>> {
    Ok(match params {
        ExtraParams::None => None,
        ExtraParams::ChannelQuant(quant) => {
            Some(wire::operand::ExtraParams::ChannelQuant(wire::SymmPerChannelQuantParams {
                scales: quant.scales.clone(),
                channel_dim: checked(quant.channel_dim, "channelDim")?,
            }))
        }
        ExtraParams::Extension(data) => Some(wire::operand::ExtraParams::Extension(data.clone())),
    })
}

impl TryFrom<&wire::Operand> for Operand {
    type Error = Error;

    fn try_from(operand: &wire::Operand) -> Result<Self> {
        Ok(Operand {
            operand_type: operand_type_to_canonical(operand.r#type)?,
            dimensions: checked_vec(&operand.dimensions, "operand dimension")?,
            scale: operand.scale,
            zero_point: operand.zero_point,
            lifetime: lifetime_to_canonical(operand.lifetime)?,
            location: location_to_canonical(&operand.location)?,
            extra_params: extra_params_to_canonical(&operand.extra_params)?,
        })
    }
}

impl TryFrom<&Operand> for wire::Operand {
    type Error = Error;

    fn try_from(operand: &Operand) -> Result<Self> {
        Ok(wire::Operand {
            r#type: operand_type_from_canonical(operand.operand_type)?,
            dimensions: checked_vec(&operand.dimensions, "operand dimension")?,
            scale: operand.scale,
            zero_point: operand.zero_point,
            lifetime: lifetime_from_canonical(operand.lifetime)?,
            location: Some(wire::DataLocation::try_from(&operand.location)?),
            extra_params: extra_params_from_canonical(&operand.extra_params)?,
        })
    }
}

impl TryFrom<&wire::Operation> for Operation {
    type Error = Error;

    fn try_from(operation: &wire::Operation) -> Result<Self> {
        Ok(Operation {
            operation_type: operation_type_to_canonical(operation.r#type)?,
            inputs: checked_vec(&operation.inputs, "operation input")?,
            outputs: checked_vec(&operation.outputs, "operation output")?,
        })
    }
}

impl TryFrom<&Operation> for wire::Operation {
    type Error = Error;

    fn try_from(operation: &Operation) -> Result<Self> {
        Ok(wire::Operation {
            r#type: operation_type_from_canonical(operation.operation_type)?,
            inputs: checked_vec(&operation.inputs, "operation input")?,
            outputs: checked_vec(&operation.outputs, "operation output")?,
        })
    }
}

impl TryFrom<&wire::Subgraph> for Subgraph {
    type Error = Error;

    fn try_from(subgraph: &wire::Subgraph) -> Result<Self> {
        Ok(Subgraph {
            operands: convert_vec(&subgraph.operands)?,
            operations: convert_vec(&subgraph.operations)?,
            input_indexes: checked_vec(&subgraph.input_indexes, "subgraph input index")?,
            output_indexes: checked_vec(&subgraph.output_indexes, "subgraph output index")?,
        })
    }
}

impl TryFrom<&Subgraph> for wire::Subgraph {
    type Error = Error;

    fn try_from(subgraph: &Subgraph) -> Result<Self> {
        Ok(wire::Subgraph {
            operands: convert_vec(&subgraph.operands)?,
            operations: convert_vec(&subgraph.operations)?,
            input_indexes: checked_vec(&subgraph.input_indexes, "subgraph input index")?,
            output_indexes: checked_vec(&subgraph.output_indexes, "subgraph output index")?,
        })
    }
}

impl TryFrom<&wire::ExtensionNameAndPrefix> for ExtensionNameAndPrefix {
    type Error = Error;

    fn try_from(entry: &wire::ExtensionNameAndPrefix) -> Result<Self> {
        Ok(ExtensionNameAndPrefix { name: entry.name.clone(), prefix: checked(entry.prefix, "extension prefix")? })
    }
}

impl TryFrom<&ExtensionNameAndPrefix> for wire::ExtensionNameAndPrefix {
    type Error = Error;

    fn try_from(entry: &ExtensionNameAndPrefix) -> Result<Self> {
        Ok(wire::ExtensionNameAndPrefix { name: entry.name.clone(), prefix: i32::from(entry.prefix) })
    }
}

impl TryFrom<&wire::Memory> for Memory {
    type Error = Error;

    fn try_from(memory: &wire::Memory) -> Result<Self> {
        Ok(Memory {
            handle: handle_from_native(required(&memory.handle, "memory handle")?)?,
            size: checked(memory.size, "memory size")?,
            name: memory.name.clone(),
        })
    }
}

impl TryFrom<&Memory> for wire::Memory {
    type Error = Error;

    fn try_from(memory: &Memory) -> Result<Self> {
        Ok(wire::Memory {
            name: memory.name.clone(),
            size: checked(memory.size, "memory size")?,
            handle: Some(native_handle_from(&memory.handle)),
        })
    }
}

impl TryFrom<&wire::Model> for Model {
    type Error = Error;

    fn try_from(model: &wire::Model) -> Result<Self> {
        Ok(Model {
            main: Subgraph::try_from(required(&model.main, "main subgraph")?)?,
            referenced: convert_vec(&model.referenced)?,
            operand_values: model.operand_values.clone(),
            pools: model.pools.iter().map(|pool| Memory::try_from(pool).map(Arc::new)).collect::<Result<_>>()?,
            relax_computation_float32_to_float16: model.relax_computation_float32_to_float16,
            extension_name_to_prefix: convert_vec(&model.extension_name_to_prefix)?,
        })
    }
}

impl TryFrom<&Model> for wire::Model {
    type Error = Error;

    fn try_from(model: &Model) -> Result<Self> {
        if !model.has_no_pointer_data() {
            return Err(Error::InvalidArgument(
                "Model cannot be converted because it contains pointer-based memory".to_string(),
            ));
        }
        Ok(wire::Model {
            main: Some(wire::Subgraph::try_from(&model.main)?),
            referenced: convert_vec(&model.referenced)?,
            operand_values: model.operand_values.clone(),
            pools: model.pools.iter().map(|pool| wire::Memory::try_from(pool.as_ref())).collect::<Result<_>>()?,
            relax_computation_float32_to_float16: model.relax_computation_float32_to_float16,
            extension_name_to_prefix: convert_vec(&model.extension_name_to_prefix)?,
        })
    }
}

impl TryFrom<&wire::RequestArgument> for Argument {
    type Error = Error;

    fn try_from(argument: &wire::RequestArgument) -> Result<Self> {
        let lifetime = if argument.has_no_value { ArgumentLifetime::NoValue } else { ArgumentLifetime::Pool };
        Ok(Argument {
            lifetime,
            location: location_to_canonical(&argument.location)?,
            dimensions: checked_vec(&argument.dimensions, "argument dimension")?,
        })
    }
}

impl TryFrom<&Argument> for wire::RequestArgument {
    type Error = Error;

    fn try_from(argument: &Argument) -> Result<Self> {
        let has_no_value = match argument.lifetime {
            ArgumentLifetime::Pool => false,
            ArgumentLifetime::NoValue => true,
            ArgumentLifetime::Pointer => {
                return Err(Error::InvalidArgument(
                    "Request cannot be converted because it contains pointer-based memory".to_string(),
                ))
            }
        };
        Ok(wire::RequestArgument {
            has_no_value,
            location: Some(wire::DataLocation::try_from(&argument.location)?),
            dimensions: checked_vec(&argument.dimensions, "argument dimension")?,
        })
    }
}

impl TryFrom<&wire::RequestMemoryPool> for MemoryPool {
    type Error = Error;

    fn try_from(pool: &wire::RequestMemoryPool) -> Result<Self> {
        match required(&pool.pool, "request memory pool")? {
            wire::request_memory_pool::Pool::Pool(memory) => Ok(MemoryPool::Memory(Arc::new(Memory::try_from(memory)?))),
            wire::request_memory_pool::Pool::Token(token) => Ok(MemoryPool::Token(checked(*token, "memory token")?)),
        }
    }
}

impl TryFrom<&MemoryPool> for wire::RequestMemoryPool {
    type Error = Error;

    fn try_from(pool: &MemoryPool) -> Result<Self> {
        let pool = match pool {
            MemoryPool::Memory(memory) => wire::request_memory_pool::Pool::Pool(wire::Memory::try_from(memory.as_ref())?),
            MemoryPool::Token(token) => wire::request_memory_pool::Pool::Token(checked(*token, "memory token")?),
        };
        Ok(wire::RequestMemoryPool { pool: Some(pool) })
    }
}

impl TryFrom<&wire::Request> for Request {
    type Error = Error;

    fn try_from(request: &wire::Request) -> Result<Self> {
        Ok(Request {
            inputs: convert_vec(&request.inputs)?,
            outputs: convert_vec(&request.outputs)?,
            pools: convert_vec(&request.pools)?,
        })
    }
}

impl TryFrom<&Request> for wire::Request {
    type Error = Error;

    fn try_from(request: &Request) -> Result<Self> {
        if !request.has_no_pointer_data() {
            return Err(Error::InvalidArgument(
                "Request cannot be converted because it contains pointer-based memory".to_string(),
            ));
        }
        Ok(wire::Request {
            inputs: convert_vec(&request.inputs)?,
            outputs: convert_vec(&request.outputs)?,
            pools: convert_vec(&request.pools)?,
        })
    }
}

impl TryFrom<&wire::OutputShape> for OutputShape {
    type Error = Error;

    fn try_from(shape: &wire::OutputShape) -> Result<Self> {
        Ok(OutputShape {
            dimensions: checked_vec(&shape.dimensions, "output dimension")?,
            is_sufficient: shape.is_sufficient,
        })
    }
}

impl TryFrom<&OutputShape> for wire::OutputShape {
    type Error = Error;

    fn try_from(shape: &OutputShape) -> Result<Self> {
        Ok(wire::OutputShape {
            dimensions: checked_vec(&shape.dimensions, "output dimension")?,
            is_sufficient: shape.is_sufficient,
        })
    }
}

impl TryFrom<&wire::Timing> for Timing {
    type Error = Error;

    fn try_from(timing: &wire::Timing) -> Result<Self> {
        Ok(Timing {
            time_on_device: duration_from_wire(timing.time_on_device_ns, "timeOnDevice")?,
            time_in_driver: duration_from_wire(timing.time_in_driver_ns, "timeInDriver")?,
        })
    }
}

impl TryFrom<&Timing> for wire::Timing {
    type Error = Error;

    fn try_from(timing: &Timing) -> Result<Self> {
        Ok(wire::Timing {
            time_on_device_ns: duration_to_wire(timing.time_on_device)?,
            time_in_driver_ns: duration_to_wire(timing.time_in_driver)?,
        })
    }
}

impl TryFrom<&wire::Extension> for Extension {
    type Error = Error;

    fn try_from(extension: &wire::Extension) -> Result<Self> {
        let operand_types = extension
            .operand_types
            .iter()
            .map(|info| {
                Ok(ExtensionOperandTypeInformation {
                    operand_type: checked(info.r#type, "extension operand type")?,
                    is_tensor: info.is_tensor,
                    byte_size: checked(info.byte_size, "extension operand byte size")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Extension { name: extension.name.clone(), operand_types })
    }
}

impl TryFrom<&Extension> for wire::Extension {
    type Error = Error;

    fn try_from(extension: &Extension) -> Result<Self> {
        let operand_types = extension
            .operand_types
            .iter()
            .map(|info| {
                Ok(wire::ExtensionOperandTypeInformation {
                    r#type: i32::from(info.operand_type),
                    is_tensor: info.is_tensor,
                    byte_size: checked(info.byte_size, "extension operand byte size")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(wire::Extension { name: extension.name.clone(), operand_types })
    }
}

use std::sync::Arc;

use super::{
    check_number_of_consumers, checked, convert_vec, handle_from_native, native_handle_from, not_representable,
    required,
};
use crate::capabilities::{make_quantized8_performance_consistent_with_p, Capabilities, PerformanceInfo};
use crate::error::{Error, Result};
use crate::memory::Memory;
use crate::model::{
    count_number_of_consumers, DataLocation, ErrorStatus, ExtraParams, Model, Operand, OperandLifetime, OperandType,
    Operation, OperationType, Subgraph, Version,
};
use crate::proto::v1_0 as wire;
use crate::request::{Argument, ArgumentLifetime, MemoryPool, Request};
use crate::validation::Validate;

pub const VERSION: Version = Version::V1_0;

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

pub fn operand_type_to_canonical(code: i32) -> Result<OperandType> {
    wire::OperandType::from_i32(code)
        .map(OperandType::from)
        .ok_or_else(|| Error::GeneralFailure(format!("Unrecognized OperandType {}", code)))
}

pub fn operand_type_from_canonical(operand_type: OperandType) -> Result<i32> {
    wire::OperandType::from_canonical(operand_type)
        .map(i32::from)
        .ok_or_else(|| not_representable("OperandType", operand_type, VERSION))
}

pub fn operation_type_to_canonical(code: i32) -> Result<OperationType> {
    wire::OperationType::from_i32(code)
        .map(OperationType::from)
        .ok_or_else(|| Error::GeneralFailure(format!("Unrecognized OperationType {}", code)))
}

pub fn operation_type_from_canonical(operation_type: OperationType) -> Result<i32> {
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

/// Status reported by a HIDL endpoint; unknown codes count as a general failure
pub fn status_to_canonical(code: i32) -> ErrorStatus {
    wire::ErrorStatus::from_i32(code)
        .map(ErrorStatus::from)
        .unwrap_or(ErrorStatus::GeneralFailure)
}

pub fn status_from_canonical(status: ErrorStatus) -> Result<i32> {
    wire::ErrorStatus::from_canonical(status)
        .map(i32::from)
        .ok_or_else(|| not_representable("ErrorStatus", status, VERSION))
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

impl TryFrom<&wire::Capabilities> for Capabilities {
    type Error = Error;

    fn try_from(capabilities: &wire::Capabilities) -> Result<Self> {
        let float32 = PerformanceInfo::from(required(&capabilities.float32_performance, "float32Performance")?);
        let quantized8 =
            PerformanceInfo::from(required(&capabilities.quantized8_performance, "quantized8Performance")?);
        Ok(Capabilities {
            relaxed_float32_to_float16_performance_scalar: float32,
            relaxed_float32_to_float16_performance_tensor: float32,
            operand_performance: make_quantized8_performance_consistent_with_p(float32, quantized8),
            if_performance: PerformanceInfo::NONE,
            while_performance: PerformanceInfo::NONE,
        })
    }
}

impl TryFrom<&Capabilities> for wire::Capabilities {
    type Error = Error;

    fn try_from(capabilities: &Capabilities) -> Result<Self> {
        let table = &capabilities.operand_performance;
        Ok(wire::Capabilities {
            float32_performance: Some((&table.lookup(OperandType::TensorFloat32)).into()),
            quantized8_performance: Some((&table.lookup(OperandType::TensorQuant8Asymm)).into()),
        })
    }
}

impl From<&wire::DataLocation> for DataLocation {
    fn from(location: &wire::DataLocation) -> Self {
        DataLocation {
            pointer: None,
            pool_index: location.pool_index,
            offset: location.offset,
            length: location.length,
        }
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
            pool_index: location.pool_index,
            offset: location.offset,
            length: location.length,
        })
    }
}

pub(crate) fn location_to_canonical(location: &Option<wire::DataLocation>) -> DataLocation {
    location.as_ref().map(DataLocation::from).unwrap_or_default()
}

impl TryFrom<&wire::Operand> for Operand {
    type Error = Error;

    fn try_from(operand: &wire::Operand) -> Result<Self> {
        Ok(Operand {
            operand_type: operand_type_to_canonical(operand.r#type)?,
            dimensions: operand.dimensions.clone(),
            scale: operand.scale,
            zero_point: operand.zero_point,
            lifetime: lifetime_to_canonical(operand.lifetime)?,
            location: location_to_canonical(&operand.location),
            extra_params: ExtraParams::None,
        })
    }
}

impl TryFrom<&Operand> for wire::Operand {
    type Error = Error;

    fn try_from(operand: &Operand) -> Result<Self> {
        if operand.extra_params != ExtraParams::None {
            return Err(not_representable("Operand extra params of type", operand.operand_type, VERSION));
        }
        Ok(wire::Operand {
            r#type: operand_type_from_canonical(operand.operand_type)?,
            dimensions: operand.dimensions.clone(),
            // Filled in from the operations once the whole model is known
            number_of_consumers: 0,
            scale: operand.scale,
            zero_point: operand.zero_point,
            lifetime: lifetime_from_canonical(operand.lifetime)?,
            location: Some(wire::DataLocation::try_from(&operand.location)?),
        })
    }
}

impl TryFrom<&wire::Operation> for Operation {
    type Error = Error;

    fn try_from(operation: &wire::Operation) -> Result<Self> {
        Ok(Operation {
            operation_type: operation_type_to_canonical(operation.r#type)?,
            inputs: operation.inputs.clone(),
            outputs: operation.outputs.clone(),
        })
    }
}

impl TryFrom<&Operation> for wire::Operation {
    type Error = Error;

    fn try_from(operation: &Operation) -> Result<Self> {
        Ok(wire::Operation {
            r#type: operation_type_from_canonical(operation.operation_type)?,
            inputs: operation.inputs.clone(),
            outputs: operation.outputs.clone(),
        })
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

pub(crate) fn pools_to_canonical(pools: &[wire::Memory]) -> Result<Vec<Arc<Memory>>> {
    pools.iter().map(|pool| Memory::try_from(pool).map(Arc::new)).collect()
}

pub(crate) fn pools_from_canonical(pools: &[Arc<Memory>]) -> Result<Vec<wire::Memory>> {
    pools.iter().map(|pool| wire::Memory::try_from(pool.as_ref())).collect()
}

impl TryFrom<&wire::Model> for Model {
    type Error = Error;

    fn try_from(model: &wire::Model) -> Result<Self> {
        let operations: Vec<Operation> = convert_vec(&model.operations)?;

        let expected = count_number_of_consumers(model.operands.len(), &operations)?;
        let found: Vec<u32> = model.operands.iter().map(|operand| operand.number_of_consumers).collect();
        check_number_of_consumers(&found, &expected)?;

        Ok(Model {
            main: Subgraph {
                operands: convert_vec(&model.operands)?,
                operations,
                input_indexes: model.input_indexes.clone(),
                output_indexes: model.output_indexes.clone(),
            },
            referenced: Vec::new(),
            operand_values: model.operand_values.clone(),
            pools: pools_to_canonical(&model.pools)?,
            relax_computation_float32_to_float16: false,
            extension_name_to_prefix: Vec::new(),
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
        if !model.referenced.is_empty() {
            return Err(not_representable("Model with referenced subgraphs", model.referenced.len(), VERSION));
        }
        if model.relax_computation_float32_to_float16 {
            return Err(not_representable("Model setting", "relaxComputationFloat32toFloat16", VERSION));
        }
        if !model.extension_name_to_prefix.is_empty() {
            return Err(not_representable("Model using extensions", model.extension_name_to_prefix.len(), VERSION));
        }

        let mut operands: Vec<wire::Operand> = convert_vec(&model.main.operands)?;
        let counts = count_number_of_consumers(operands.len(), &model.main.operations)?;
        for (operand, count) in operands.iter_mut().zip(counts) {
            operand.number_of_consumers = count;
        }

        Ok(wire::Model {
            operands,
            operations: convert_vec(&model.main.operations)?,
            input_indexes: model.main.input_indexes.clone(),
            output_indexes: model.main.output_indexes.clone(),
            operand_values: model.operand_values.clone(),
            pools: pools_from_canonical(&model.pools)?,
        })
    }
}

impl TryFrom<&wire::RequestArgument> for Argument {
    type Error = Error;

    fn try_from(argument: &wire::RequestArgument) -> Result<Self> {
        let lifetime = if argument.has_no_value { ArgumentLifetime::NoValue } else { ArgumentLifetime::Pool };
        Ok(Argument {
            lifetime,
            location: location_to_canonical(&argument.location),
            dimensions: argument.dimensions.clone(),
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
            dimensions: argument.dimensions.clone(),
        })
    }
}

impl TryFrom<&wire::Request> for Request {
    type Error = Error;

    fn try_from(request: &wire::Request) -> Result<Self> {
        Ok(Request {
            inputs: convert_vec(&request.inputs)?,
            outputs: convert_vec(&request.outputs)?,
            pools: pools_to_canonical(&request.pools)?
                .into_iter()
                .map(MemoryPool::Memory)
                .collect(),
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
        let pools = request
            .pools
            .iter()
            .map(|pool| match pool {
                MemoryPool::Memory(memory) => wire::Memory::try_from(memory.as_ref()),
                MemoryPool::Token(token) => Err(not_representable("memory domain token", token, VERSION)),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(wire::Request {
            inputs: convert_vec(&request.inputs)?,
            outputs: convert_vec(&request.outputs)?,
            pools,
        })
    }
}

use std::time::Duration;

use super::v1_0::{location_to_canonical, pools_from_canonical, pools_to_canonical};
use super::{check_number_of_consumers, checked, convert_vec, not_representable, required};
use crate::capabilities::{
    Capabilities, Extension, ExtensionOperandTypeInformation, OperandPerformance, OperandPerformanceTable,
    PerformanceInfo,
};
use crate::error::{Error, Result};
use crate::model::{
    count_number_of_consumers, DeviceType, ExecutionPreference, ExtensionCode, ExtensionNameAndPrefix, ExtraParams,
    MeasureTiming, Model, Operand, OperandType, Operation, OperationType, Subgraph, SymmPerChannelQuantParams,
    Version,
};
use crate::proto::v1_2 as wire;
use crate::request::{OutputShape, Timing};
use crate::validation::Validate;

pub use super::v1_0::{lifetime_from_canonical, lifetime_to_canonical, status_from_canonical, status_to_canonical};

pub const VERSION: Version = Version::V1_2;

/// Wire value of a duration that was not measured
pub const NO_TIMING: u64 = u64::MAX;

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

pub fn device_type_to_canonical(code: i32) -> Result<DeviceType> {
    wire::DeviceType::from_i32(code)
        .map(DeviceType::from)
        .ok_or_else(|| Error::GeneralFailure(format!("Unrecognized DeviceType {}", code)))
}

pub fn measure_timing_from_canonical(measure: MeasureTiming) -> Result<wire::MeasureTiming> {
    wire::MeasureTiming::from_canonical(measure).ok_or_else(|| not_representable("MeasureTiming", measure, VERSION))
}

pub fn execution_preference_from_canonical(preference: ExecutionPreference) -> Result<wire::ExecutionPreference> {
    wire::ExecutionPreference::from_canonical(preference)
        .ok_or_else(|| not_representable("ExecutionPreference", preference, VERSION))
}

fn is_representable(operand_type: OperandType) -> bool {
    operand_type.is_extension() || wire::OperandType::from_canonical(operand_type).is_some()
}

impl TryFrom<&wire::OperandPerformance> for OperandPerformance {
    type Error = Error;

    fn try_from(performance: &wire::OperandPerformance) -> Result<Self> {
        Ok(OperandPerformance {
            operand_type: operand_type_to_canonical(performance.r#type)?,
            info: required(&performance.info, "operand performance info")?.into(),
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
            relaxed_float32_to_float16_performance_scalar: PerformanceInfo::from(required(
                &capabilities.relaxed_float32_to_float16_performance_scalar,
                "relaxedFloat32toFloat16PerformanceScalar",
            )?),
            relaxed_float32_to_float16_performance_tensor: PerformanceInfo::from(required(
                &capabilities.relaxed_float32_to_float16_performance_tensor,
                "relaxedFloat32toFloat16PerformanceTensor",
            )?),
            operand_performance,
            if_performance: PerformanceInfo::NONE,
            while_performance: PerformanceInfo::NONE,
        })
    }
}

impl TryFrom<&Capabilities> for wire::Capabilities {
    type Error = Error;

    fn try_from(capabilities: &Capabilities) -> Result<Self> {
        // Entries for types this version cannot name are dropped from the table
        let operand_performance = capabilities
            .operand_performance
            .as_slice()
            .iter()
            .filter(|entry| is_representable(entry.operand_type))
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
        })
    }
}

fn extra_params_to_canonical(params: &Option<wire::operand::ExtraParams>) -> ExtraParams {
    match params {
        None => ExtraParams::None,
        Some(wire::operand::ExtraParams::ChannelQuant(quant)) => ExtraParams::ChannelQuant(SymmPerChannelQuantParams {
            scales: quant.scales.clone(),
            channel_dim: quant.channel_dim,
        }),
        Some(wire::operand::ExtraParams::Extension(data)) => ExtraParams::Extension(data.clone()),
    }
}

fn extra_params_from_canonical(params: &ExtraParams) -> Option<wire::operand::ExtraParams> {
    match params {
        ExtraParams::None => None,
        ExtraParams::ChannelQuant(quant) => {
            Some(wire::operand::ExtraParams::ChannelQuant(wire::SymmPerChannelQuantParams {
                scales: quant.scales.clone(),
                channel_dim: quant.channel_dim,
            }))
        }
        ExtraParams::Extension(data) => Some(wire::operand::ExtraParams::Extension(data.clone())),
    }
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
            extra_params: extra_params_to_canonical(&operand.extra_params),
        })
    }
}

impl TryFrom<&Operand> for wire::Operand {
    type Error = Error;

    fn try_from(operand: &Operand) -> Result<Self> {
        Ok(wire::Operand {
            r#type: operand_type_from_canonical(operand.operand_type)?,
            dimensions: operand.dimensions.clone(),
            number_of_consumers: 0,
            scale: operand.scale,
            zero_point: operand.zero_point,
            lifetime: lifetime_from_canonical(operand.lifetime)?,
            location: Some((&operand.location).try_into()?),
            extra_params: extra_params_from_canonical(&operand.extra_params),
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

impl TryFrom<&wire::ExtensionNameAndPrefix> for ExtensionNameAndPrefix {
    type Error = Error;

    fn try_from(entry: &wire::ExtensionNameAndPrefix) -> Result<Self> {
        Ok(ExtensionNameAndPrefix { name: entry.name.clone(), prefix: checked(entry.prefix, "extension prefix")? })
    }
}

impl TryFrom<&ExtensionNameAndPrefix> for wire::ExtensionNameAndPrefix {
    type Error = Error;

    fn try_from(entry: &ExtensionNameAndPrefix) -> Result<Self> {
        Ok(wire::ExtensionNameAndPrefix { name: entry.name.clone(), prefix: u32::from(entry.prefix) })
    }
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
        if !model.referenced.is_empty() {
            return Err(not_representable("Model with referenced subgraphs", model.referenced.len(), VERSION));
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
            relax_computation_float32_to_float16: model.relax_computation_float32_to_float16,
            extension_name_to_prefix: convert_vec(&model.extension_name_to_prefix)?,
        })
    }
}

impl TryFrom<&wire::OutputShape> for OutputShape {
    type Error = Error;

    fn try_from(shape: &wire::OutputShape) -> Result<Self> {
        Ok(OutputShape { dimensions: shape.dimensions.clone(), is_sufficient: shape.is_sufficient })
    }
}

impl TryFrom<&OutputShape> for wire::OutputShape {
    type Error = Error;

    fn try_from(shape: &OutputShape) -> Result<Self> {
        Ok(wire::OutputShape { dimensions: shape.dimensions.clone(), is_sufficient: shape.is_sufficient })
    }
}

fn duration_from_micros(micros: u64) -> Option<Duration> {
    (micros != NO_TIMING).then(|| Duration::from_micros(micros))
}

fn micros_from_duration(duration: Option<Duration>) -> Result<u64> {
    let Some(duration) = duration else {
        return Ok(NO_TIMING);
    };
    match u64::try_from(duration.as_micros()) {
        Ok(micros) if micros != NO_TIMING => Ok(micros),
        _ => Err(Error::InvalidArgument(format!("Timing value {:?} is out of range", duration))),
    }
}

impl TryFrom<&wire::Timing> for Timing {
    type Error = Error;

    fn try_from(timing: &wire::Timing) -> Result<Self> {
        Ok(Timing {
            time_on_device: duration_from_micros(timing.time_on_device),
            time_in_driver: duration_from_micros(timing.time_in_driver),
        })
    }
}

impl TryFrom<&Timing> for wire::Timing {
    type Error = Error;

    fn try_from(timing: &Timing) -> Result<Self> {
        Ok(wire::Timing {
            time_on_device: micros_from_duration(timing.time_on_device)?,
            time_in_driver: micros_from_duration(timing.time_in_driver)?,
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
                    byte_size: info.byte_size,
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
            .map(|info| wire::ExtensionOperandTypeInformation {
                r#type: u32::from(info.operand_type),
                is_tensor: info.is_tensor,
                byte_size: info.byte_size,
            })
            .collect();
        Ok(wire::Extension { name: extension.name.clone(), operand_types })
    }
}

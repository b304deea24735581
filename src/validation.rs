use std::collections::HashSet;

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::DiGraph;

use crate::capabilities::{Capabilities, Extension, PerformanceInfo};
use crate::error::{Error, Result};
use crate::memory::SharedMemory;
use crate::model::{
    DataLocation, DeviceType, ExtensionNameAndPrefix, ExtraParams, Model, Operand, OperandLifetime,
    OperandType, Subgraph, Version,
};
use crate::request::{Argument, ArgumentLifetime, MemoryPool, OutputShape, Request, Timing};

/// Checks the invariants of a canonical value
pub trait Validate {
    /// Validate the value and return the oldest version able to represent it
    fn validate(&self) -> Result<Version>;
}

fn invalid(message: String) -> Error {
    Error::InvalidArgument(message)
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<Version> {
        self.iter()
            .try_fold(Version::V1_0, |version, item| Ok(version.max(item.validate()?)))
    }
}

impl Validate for OperandType {
    fn validate(&self) -> Result<Version> {
        Ok(self.version())
    }
}

impl Validate for DeviceType {
    fn validate(&self) -> Result<Version> {
        match self {
            DeviceType::Unknown => Err(invalid("Invalid DeviceType UNKNOWN".to_string())),
            DeviceType::Other | DeviceType::Cpu | DeviceType::Gpu | DeviceType::Accelerator => Ok(Version::V1_2),
        }
    }
}

fn validate_performance_info(info: &PerformanceInfo, what: &str) -> Result<()> {
    if info.exec_time > 0.0 && info.power_usage > 0.0 {
        Ok(())
    } else {
        Err(invalid(format!(
            "{} performance must be positive, got exec time {} and power usage {}",
            what, info.exec_time, info.power_usage
        )))
    }
}

impl Validate for Capabilities {
    fn validate(&self) -> Result<Version> {
        validate_performance_info(&self.relaxed_float32_to_float16_performance_scalar, "relaxed scalar")?;
        validate_performance_info(&self.relaxed_float32_to_float16_performance_tensor, "relaxed tensor")?;
        validate_performance_info(&self.if_performance, "IF")?;
        validate_performance_info(&self.while_performance, "WHILE")?;

        let mut version = Version::V1_0;
        for entry in self.operand_performance.as_slice() {
            validate_performance_info(&entry.info, &entry.operand_type.to_string())?;
            version = version.max(entry.operand_type.version());
        }
        Ok(version)
    }
}

impl Validate for Extension {
    fn validate(&self) -> Result<Version> {
        if self.name.is_empty() {
            return Err(invalid("Extension name must not be empty".to_string()));
        }
        let mut seen = HashSet::new();
        for info in &self.operand_types {
            if !seen.insert(info.operand_type) {
                return Err(invalid(format!(
                    "Extension {} declares operand type {} twice",
                    self.name, info.operand_type
                )));
            }
        }
        Ok(Version::V1_2)
    }
}

impl Validate for OutputShape {
    fn validate(&self) -> Result<Version> {
        Ok(Version::V1_2)
    }
}

impl Validate for Timing {
    fn validate(&self) -> Result<Version> {
        if let (Some(on_device), Some(in_driver)) = (self.time_on_device, self.time_in_driver) {
            if on_device > in_driver {
                return Err(invalid(format!(
                    "Timing time on device ({:?}) exceeds time in driver ({:?})",
                    on_device, in_driver
                )));
            }
        }
        Ok(Version::V1_2)
    }
}

/// Model-wide facts an operand location is checked against
struct ModelContext<'a> {
    operand_values_len: usize,
    pools: &'a [SharedMemory],
    referenced_count: usize,
    prefixes: HashSet<u16>,
}

fn check_range(offset: u32, length: u32, size: usize, what: &str) -> Result<()> {
    let end = u64::from(offset) + u64::from(length);
    if end > size as u64 {
        return Err(invalid(format!(
            "{} range [{}, +{}) exceeds its {} bytes",
            what, offset, length, size
        )));
    }
    Ok(())
}

fn validate_operand_location(index: usize, operand: &Operand, context: &ModelContext<'_>) -> Result<Version> {
    let location = &operand.location;
    if operand.lifetime != OperandLifetime::Pointer && location.pointer.is_some() {
        return Err(invalid(format!(
            "Operand {} with lifetime {} must not carry a host pointer",
            index, operand.lifetime
        )));
    }

    match operand.lifetime {
        OperandLifetime::ConstantCopy => {
            if location.pool_index != 0 {
                return Err(invalid(format!("Operand {} CONSTANT_COPY must use pool index 0", index)));
            }
            check_range(location.offset, location.length, context.operand_values_len, "operand values")?;
            Ok(Version::V1_0)
        }
        OperandLifetime::ConstantReference => {
            let pool = context.pools.get(location.pool_index as usize).ok_or_else(|| {
                invalid(format!(
                    "Operand {} references pool {} but the model has {} pools",
                    index,
                    location.pool_index,
                    context.pools.len()
                ))
            })?;
            check_range(location.offset, location.length, pool.size, "pool")?;
            Ok(Version::V1_0)
        }
        OperandLifetime::Pointer => {
            let pointer = location.pointer.ok_or_else(|| {
                invalid(format!("Operand {} has lifetime POINTER but no host pointer", index))
            })?;
            if location.length as usize > pointer.len() {
                return Err(invalid(format!(
                    "Operand {} length {} exceeds its host buffer of {} bytes",
                    index,
                    location.length,
                    pointer.len()
                )));
            }
            Ok(Version::V1_0)
        }
        OperandLifetime::Subgraph => {
            if operand.operand_type != OperandType::Subgraph {
                return Err(invalid(format!(
                    "Operand {} with lifetime SUBGRAPH must have type SUBGRAPH, not {}",
                    index, operand.operand_type
                )));
            }
            if location.offset as usize >= context.referenced_count {
                return Err(invalid(format!(
                    "Operand {} references subgraph {} but only {} are present",
                    index, location.offset, context.referenced_count
                )));
            }
            Ok(Version::V1_3)
        }
        OperandLifetime::TemporaryVariable
        | OperandLifetime::SubgraphInput
        | OperandLifetime::SubgraphOutput
        | OperandLifetime::NoValue => {
            if *location != DataLocation::default() {
                return Err(invalid(format!(
                    "Operand {} with lifetime {} must have an empty location",
                    index, operand.lifetime
                )));
            }
            Ok(Version::V1_0)
        }
    }
}

fn validate_quantization(index: usize, operand: &Operand) -> Result<()> {
    let zero_point_in = |low: i32, high: i32| (low..=high).contains(&operand.zero_point);
    let valid = match operand.operand_type {
        OperandType::TensorQuant8Asymm => operand.scale > 0.0 && zero_point_in(0, 255),
        OperandType::TensorQuant8AsymmSigned => operand.scale > 0.0 && zero_point_in(-128, 127),
        OperandType::TensorQuant16Asymm => operand.scale > 0.0 && zero_point_in(0, 65535),
        OperandType::TensorQuant8Symm | OperandType::TensorQuant16Symm => {
            operand.scale > 0.0 && operand.zero_point == 0
        }
        OperandType::TensorInt32 => operand.scale >= 0.0,
        OperandType::Float32
        | OperandType::Int32
        | OperandType::Uint32
        | OperandType::TensorFloat32
        | OperandType::Bool
        | OperandType::TensorFloat16
        | OperandType::TensorBool8
        | OperandType::Float16
        | OperandType::TensorQuant8SymmPerChannel
        | OperandType::Subgraph => operand.scale == 0.0 && operand.zero_point == 0,
        OperandType::Oem | OperandType::TensorOemByte | OperandType::Extension(_) => true,
    };
    if valid {
        Ok(())
    } else {
        Err(invalid(format!(
            "Operand {} of type {} has invalid scale {} or zero point {}",
            index, operand.operand_type, operand.scale, operand.zero_point
        )))
    }
}

fn validate_extra_params(index: usize, operand: &Operand) -> Result<Version> {
    match (&operand.extra_params, operand.operand_type) {
        (ExtraParams::ChannelQuant(params), OperandType::TensorQuant8SymmPerChannel) => {
            let channel_count = operand
                .dimensions
                .get(params.channel_dim as usize)
                .ok_or_else(|| {
                    invalid(format!(
                        "Operand {} channel dimension {} is out of range for rank {}",
                        index,
                        params.channel_dim,
                        operand.dimensions.len()
                    ))
                })?;
            if *channel_count != 0 && params.scales.len() != *channel_count as usize {
                return Err(invalid(format!(
                    "Operand {} has {} channel scales for {} channels",
                    index,
                    params.scales.len(),
                    channel_count
                )));
            }
            if params.scales.iter().any(|scale| *scale <= 0.0) {
                return Err(invalid(format!("Operand {} channel scales must be positive", index)));
            }
            Ok(Version::V1_2)
        }
        (_, OperandType::TensorQuant8SymmPerChannel) => Err(invalid(format!(
            "Operand {} of type TENSOR_QUANT8_SYMM_PER_CHANNEL requires channel quantization parameters",
            index
        ))),
        (ExtraParams::ChannelQuant(_), operand_type) => Err(invalid(format!(
            "Operand {} of type {} must not carry channel quantization parameters",
            index, operand_type
        ))),
        (ExtraParams::Extension(_), OperandType::Extension(_)) => Ok(Version::V1_2),
        (ExtraParams::Extension(_), operand_type) => Err(invalid(format!(
            "Operand {} of non-extension type {} must not carry extension parameters",
            index, operand_type
        ))),
        (ExtraParams::None, _) => Ok(Version::V1_0),
    }
}

fn validate_operand(index: usize, operand: &Operand, context: &ModelContext<'_>) -> Result<Version> {
    let mut version = operand.operand_type.validate()?;

    if let OperandType::Extension(code) = operand.operand_type {
        if !context.prefixes.contains(&code.prefix()) {
            return Err(invalid(format!(
                "Operand {} uses extension prefix {} that the model does not declare",
                index,
                code.prefix()
            )));
        }
    } else if !operand.operand_type.is_tensor() && !operand.dimensions.is_empty() {
        return Err(invalid(format!(
            "Operand {} of scalar type {} must not have dimensions",
            index, operand.operand_type
        )));
    }

    validate_quantization(index, operand)?;
    version = version.max(validate_extra_params(index, operand)?);
    version = version.max(validate_operand_location(index, operand, context)?);
    Ok(version)
}

fn validate_io_indexes(
    subgraph: &Subgraph,
    indexes: &[u32],
    lifetime: OperandLifetime,
    what: &str,
) -> Result<()> {
    let mut seen = vec![false; subgraph.operands.len()];
    for &index in indexes {
        let operand = subgraph.operands.get(index as usize).ok_or_else(|| {
            invalid(format!("Subgraph {} index {} is out of range", what, index))
        })?;
        if operand.lifetime != lifetime {
            return Err(invalid(format!(
                "Subgraph {} operand {} has lifetime {} instead of {}",
                what, index, operand.lifetime, lifetime
            )));
        }
        if std::mem::replace(&mut seen[index as usize], true) {
            return Err(invalid(format!("Subgraph {} operand {} is listed twice", what, index)));
        }
    }

    let expected = subgraph.operands.iter().filter(|operand| operand.lifetime == lifetime).count();
    if expected != indexes.len() {
        return Err(invalid(format!(
            "Subgraph has {} operands with lifetime {} but lists {} {} indexes",
            expected,
            lifetime,
            indexes.len(),
            what
        )));
    }
    Ok(())
}

fn validate_subgraph(subgraph: &Subgraph, context: &ModelContext<'_>) -> Result<Version> {
    let mut version = Version::V1_0;
    for (index, operand) in subgraph.operands.iter().enumerate() {
        version = version.max(validate_operand(index, operand, context)?);
    }

    let operand_count = subgraph.operands.len();
    for (index, operation) in subgraph.operations.iter().enumerate() {
        version = version.max(operation.operation_type.version());
        if let Some(bad) = operation
            .inputs
            .iter()
            .chain(operation.outputs.iter())
            .find(|&&operand| operand as usize >= operand_count)
        {
            return Err(invalid(format!(
                "Operation {} ({}) references operand {} but the subgraph has {} operands",
                index, operation.operation_type, bad, operand_count
            )));
        }
    }

    validate_io_indexes(subgraph, &subgraph.input_indexes, OperandLifetime::SubgraphInput, "input")?;
    validate_io_indexes(subgraph, &subgraph.output_indexes, OperandLifetime::SubgraphOutput, "output")?;
    Ok(version)
}

fn validate_extension_prefixes(entries: &[ExtensionNameAndPrefix]) -> Result<Version> {
    let mut names = HashSet::new();
    let mut prefixes = HashSet::new();
    for entry in entries {
        if entry.name.is_empty() || entry.prefix == 0 {
            return Err(invalid(format!(
                "Invalid extension name \"{}\" or prefix {}",
                entry.name, entry.prefix
            )));
        }
        if !names.insert(entry.name.as_str()) || !prefixes.insert(entry.prefix) {
            return Err(invalid(format!(
                "Extension \"{}\" or prefix {} is declared twice",
                entry.name, entry.prefix
            )));
        }
    }
    Ok(if entries.is_empty() { Version::V1_0 } else { Version::V1_2 })
}

fn check_subgraph_references_acyclic(model: &Model) -> Result<()> {
    let mut graph = DiGraph::<usize, ()>::new();
    let nodes: Vec<_> = (0..=model.referenced.len()).map(|index| graph.add_node(index)).collect();

    for (from, subgraph) in model.subgraphs().enumerate() {
        let references = subgraph
            .operands
            .iter()
            .filter(|operand| operand.lifetime == OperandLifetime::Subgraph);
        for operand in references {
            // Main is node 0, so referenced subgraph i is node i + 1
            if let Some(&to) = nodes.get(operand.location.offset as usize + 1) {
                graph.add_edge(nodes[from], to, ());
            }
        }
    }

    if is_cyclic_directed(&graph) {
        return Err(invalid("Model contains a cycle of subgraph references".to_string()));
    }
    Ok(())
}

impl Validate for Model {
    fn validate(&self) -> Result<Version> {
        let mut version = validate_extension_prefixes(&self.extension_name_to_prefix)?;
        if self.relax_computation_float32_to_float16 {
            version = version.max(Version::V1_1);
        }
        if !self.referenced.is_empty() {
            version = version.max(Version::V1_3);
        }

        let context = ModelContext {
            operand_values_len: self.operand_values.len(),
            pools: &self.pools,
            referenced_count: self.referenced.len(),
            prefixes: self.extension_name_to_prefix.iter().map(|entry| entry.prefix).collect(),
        };
        for subgraph in self.subgraphs() {
            version = version.max(validate_subgraph(subgraph, &context)?);
        }

        check_subgraph_references_acyclic(self)?;
        Ok(version)
    }
}

fn validate_argument(argument: &Argument, pools: &[MemoryPool], what: &str) -> Result<()> {
    let location = &argument.location;
    match argument.lifetime {
        ArgumentLifetime::Pool => {
            if location.pointer.is_some() {
                return Err(invalid(format!("{} with lifetime POOL must not carry a host pointer", what)));
            }
            match pools.get(location.pool_index as usize) {
                Some(MemoryPool::Memory(memory)) => check_range(location.offset, location.length, memory.size, what),
                Some(MemoryPool::Token(_)) => Ok(()),
                None => Err(invalid(format!(
                    "{} references pool {} but the request has {} pools",
                    what,
                    location.pool_index,
                    pools.len()
                ))),
            }
        }
        ArgumentLifetime::NoValue => {
            if *location != DataLocation::default() || !argument.dimensions.is_empty() {
                return Err(invalid(format!("{} without a value must have no location or dimensions", what)));
            }
            Ok(())
        }
        ArgumentLifetime::Pointer => {
            let pointer = location
                .pointer
                .ok_or_else(|| invalid(format!("{} has lifetime POINTER but no host pointer", what)))?;
            if location.length as usize > pointer.len() {
                return Err(invalid(format!(
                    "{} length {} exceeds its host buffer of {} bytes",
                    what,
                    location.length,
                    pointer.len()
                )));
            }
            Ok(())
        }
    }
}

impl Validate for Request {
    fn validate(&self) -> Result<Version> {
        let mut version = Version::V1_0;
        for pool in &self.pools {
            if let MemoryPool::Token(token) = pool {
                if *token == 0 {
                    return Err(invalid("Request memory domain token must not be zero".to_string()));
                }
                version = version.max(Version::V1_3);
            }
        }

        for (index, input) in self.inputs.iter().enumerate() {
            validate_argument(input, &self.pools, &format!("Input {}", index))?;
        }
        for (index, output) in self.outputs.iter().enumerate() {
            validate_argument(output, &self.pools, &format!("Output {}", index))?;
        }
        Ok(version)
    }
}

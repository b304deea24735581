use crate::error::{Error, Result};
use crate::model::OperandType;

/// Relative cost of running on a device; lower is better
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceInfo {
    pub exec_time: f32,
    pub power_usage: f32,
}

impl PerformanceInfo {
    /// Reported for operand types a device gives no figures for
    pub const NONE: PerformanceInfo = PerformanceInfo { exec_time: f32::MAX, power_usage: f32::MAX };
}

impl Default for PerformanceInfo {
    fn default() -> Self {
        Self::NONE
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperandPerformance {
    pub operand_type: OperandType,
    pub info: PerformanceInfo,
}

/// Performance figures keyed by operand type, sorted without duplicates
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperandPerformanceTable {
    sorted: Vec<OperandPerformance>,
}

impl OperandPerformanceTable {
    /// Build a table from entries already sorted by operand type
    pub fn create(entries: Vec<OperandPerformance>) -> Result<Self> {
        let sorted_without_duplicates = entries
            .windows(2)
            .all(|pair| pair[0].operand_type < pair[1].operand_type);
        if !sorted_without_duplicates {
            return Err(Error::InvalidArgument(
                "Input must be sorted by key (in ascending order), and there must be no duplicate keys"
                    .to_string(),
            ));
        }
        Ok(Self { sorted: entries })
    }

    /// Figures for `operand_type`, or `PerformanceInfo::NONE` when absent
    pub fn lookup(&self, operand_type: OperandType) -> PerformanceInfo {
        self.sorted
            .binary_search_by(|entry| entry.operand_type.cmp(&operand_type))
            .map(|index| self.sorted[index].info)
            .unwrap_or(PerformanceInfo::NONE)
    }

    pub fn as_slice(&self) -> &[OperandPerformance] {
        &self.sorted
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Capabilities {
    pub relaxed_float32_to_float16_performance_scalar: PerformanceInfo,
    pub relaxed_float32_to_float16_performance_tensor: PerformanceInfo,
    pub operand_performance: OperandPerformanceTable,
    pub if_performance: PerformanceInfo,
    pub while_performance: PerformanceInfo,
}

/// Expand the two figures of a 1.0 device into a full table, using the
/// float32 figure for float types and the quantized figure for the rest.
pub fn make_quantized8_performance_consistent_with_p(
    float32_performance: PerformanceInfo,
    quantized8_performance: PerformanceInfo,
) -> OperandPerformanceTable {
    let entry = |operand_type, info| OperandPerformance { operand_type, info };
    // Already sorted by operand type code
    OperandPerformanceTable {
        sorted: vec![
            entry(OperandType::Float32, float32_performance),
            entry(OperandType::Int32, quantized8_performance),
            entry(OperandType::Uint32, quantized8_performance),
            entry(OperandType::TensorFloat32, float32_performance),
            entry(OperandType::TensorInt32, quantized8_performance),
            entry(OperandType::TensorQuant8Asymm, quantized8_performance),
            entry(OperandType::Oem, quantized8_performance),
            entry(OperandType::TensorOemByte, quantized8_performance),
        ],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionOperandTypeInformation {
    pub operand_type: u16,
    pub is_tensor: bool,
    pub byte_size: u32,
}

/// Vendor extension advertised by a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    pub name: String,
    pub operand_types: Vec<ExtensionOperandTypeInformation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::seq::SliceRandom;
    use rand::Rng;
    use strum::IntoEnumIterator;

    fn random_sorted_entries() -> Vec<OperandPerformance> {
        let mut rng = rand::thread_rng();
        let mut entries = Vec::new();
        for operand_type in OperandType::iter().filter(|t| !t.is_extension()) {
            if rng.gen_bool(0.7) {
                let info = PerformanceInfo {
                    exec_time: rng.gen_range(0.1..10.0),
                    power_usage: rng.gen_range(0.1..10.0),
                };
                entries.push(OperandPerformance { operand_type, info });
            }
        }
        entries
    }

    #[test]
    fn test_lookup_matches_linear_scan() {
        for _ in 0..20 {
            let entries = random_sorted_entries();
            let table = OperandPerformanceTable::create(entries.clone()).unwrap();
            for operand_type in OperandType::iter().filter(|t| !t.is_extension()) {
                let expected = entries
                    .iter()
                    .find(|entry| entry.operand_type == operand_type)
                    .map(|entry| entry.info)
                    .unwrap_or(PerformanceInfo::NONE);
                assert_eq!(table.lookup(operand_type), expected);
            }
        }
    }

    #[test]
    fn test_create_rejects_unsorted_input() {
        let mut entries = random_sorted_entries();
        while entries.len() < 3 {
            entries = random_sorted_entries();
        }
        let sorted = entries.clone();
        let mut rng = rand::thread_rng();
        while entries == sorted {
            entries.shuffle(&mut rng);
        }
        assert!(OperandPerformanceTable::create(entries).is_err());
    }

    #[test]
    fn test_create_rejects_duplicates() {
        let info = PerformanceInfo { exec_time: 1.0, power_usage: 1.0 };
        let entries = vec![
            OperandPerformance { operand_type: OperandType::Float32, info },
            OperandPerformance { operand_type: OperandType::Float32, info },
        ];
        assert!(OperandPerformanceTable::create(entries).is_err());
    }

    #[test]
    fn test_quantized8_table_is_sorted() {
        let float32 = PerformanceInfo { exec_time: 1.0, power_usage: 2.0 };
        let quant8 = PerformanceInfo { exec_time: 3.0, power_usage: 4.0 };
        let table = make_quantized8_performance_consistent_with_p(float32, quant8);
        assert!(OperandPerformanceTable::create(table.as_slice().to_vec()).is_ok());
        assert_eq!(table.lookup(OperandType::TensorFloat32), float32);
        assert_eq!(table.lookup(OperandType::TensorOemByte), quant8);
        assert_eq!(table.lookup(OperandType::TensorFloat16), PerformanceInfo::NONE);
    }
}

use std::cmp::Ordering;
use std::fmt;
use std::ptr::NonNull;

use bytes::Bytes;
use strum::{Display, EnumIter};

use crate::error::{Error, Result};
use crate::memory::SharedMemory;

/// HAL interface versions, oldest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum Version {
    #[strum(serialize = "HAL 1.0")]
    V1_0,
    #[strum(serialize = "HAL 1.1")]
    V1_1,
    #[strum(serialize = "HAL 1.2")]
    V1_2,
    #[strum(serialize = "HAL 1.3")]
    V1_3,
    #[strum(serialize = "AIDL")]
    Aidl,
}

/// Vendor extension code: a 16-bit extension prefix followed by a 16-bit
/// type within that extension. Prefix zero is reserved for the base types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ExtensionCode(u32);

impl ExtensionCode {
    pub const TYPE_WITHIN_EXTENSION_BITS: u32 = 16;

    pub fn new(prefix: u16, type_within_extension: u16) -> Option<Self> {
        let code = (u32::from(prefix) << Self::TYPE_WITHIN_EXTENSION_BITS) | u32::from(type_within_extension);
        Self::from_code(code)
    }

    pub fn from_code(code: u32) -> Option<Self> {
        (code >> Self::TYPE_WITHIN_EXTENSION_BITS != 0).then_some(Self(code))
    }

    pub fn code(self) -> u32 {
        self.0
    }

    pub fn prefix(self) -> u16 {
        (self.0 >> Self::TYPE_WITHIN_EXTENSION_BITS) as u16
    }

    pub fn type_within_extension(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl fmt::Display for ExtensionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.prefix(), self.type_within_extension())
    }
}

// Numbered enumerations with an extension escape for vendor codes
macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident = $code:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
        #[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant,)+
            Extension(ExtensionCode),
        }

        impl $name {
            /// Numeric code shared by every interface version
            pub fn code(self) -> u32 {
                match self {
                    $($name::$variant => $code,)+
                    $name::Extension(extension) => extension.code(),
                }
            }

            pub fn from_code(code: u32) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    other => ExtensionCode::from_code(other).map($name::Extension),
                }
            }

            pub fn is_extension(self) -> bool {
                matches!(self, $name::Extension(_))
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                self.code().cmp(&other.code())
            }
        }
    };
}

coded_enum! {
    /// Data type of an operand
    pub enum OperandType {
        Float32 = 0,
        Int32 = 1,
        Uint32 = 2,
        TensorFloat32 = 3,
        TensorInt32 = 4,
        TensorQuant8Asymm = 5,
        Bool = 6,
        TensorQuant16Symm = 7,
        TensorFloat16 = 8,
        TensorBool8 = 9,
        Float16 = 10,
        TensorQuant8SymmPerChannel = 11,
        TensorQuant16Asymm = 12,
        TensorQuant8Symm = 13,
        TensorQuant8AsymmSigned = 14,
        Subgraph = 15,
        Oem = 10000,
        TensorOemByte = 10001,
    }
}

impl OperandType {
    /// Whether operands of this type carry dimensions
    pub fn is_tensor(self) -> bool {
        matches!(
            self,
            OperandType::TensorFloat32
                | OperandType::TensorInt32
                | OperandType::TensorQuant8Asymm
                | OperandType::TensorQuant16Symm
                | OperandType::TensorFloat16
                | OperandType::TensorBool8
                | OperandType::TensorQuant8SymmPerChannel
                | OperandType::TensorQuant16Asymm
                | OperandType::TensorQuant8Symm
                | OperandType::TensorQuant8AsymmSigned
                | OperandType::TensorOemByte
        )
    }

    /// Oldest interface version that knows this type
    pub fn version(self) -> Version {
        match self.code() {
            0..=5 | 10000 | 10001 => Version::V1_0,
            6..=13 => Version::V1_2,
            14 | 15 => Version::V1_3,
            _ => Version::V1_2,
        }
    }
}

coded_enum! {
    /// Operation performed by a node of the graph
    pub enum OperationType {
        Add = 0,
        AveragePool2d = 1,
        Concatenation = 2,
        Conv2d = 3,
        DepthwiseConv2d = 4,
        DepthToSpace = 5,
        Dequantize = 6,
        EmbeddingLookup = 7,
        Floor = 8,
        FullyConnected = 9,
        HashtableLookup = 10,
        L2Normalization = 11,
        L2Pool2d = 12,
        LocalResponseNormalization = 13,
        Logistic = 14,
        LshProjection = 15,
        Lstm = 16,
        MaxPool2d = 17,
        Mul = 18,
        Relu = 19,
        Relu1 = 20,
        Relu6 = 21,
        Reshape = 22,
        ResizeBilinear = 23,
        Rnn = 24,
        Softmax = 25,
        SpaceToDepth = 26,
        Svdf = 27,
        Tanh = 28,
        BatchToSpaceNd = 29,
        Div = 30,
        Mean = 31,
        Pad = 32,
        SpaceToBatchNd = 33,
        Squeeze = 34,
        StridedSlice = 35,
        Sub = 36,
        Transpose = 37,
        Abs = 38,
        Argmax = 39,
        Argmin = 40,
        AxisAlignedBboxTransform = 41,
        BidirectionalSequenceLstm = 42,
        BidirectionalSequenceRnn = 43,
        BoxWithNmsLimit = 44,
        Cast = 45,
        ChannelShuffle = 46,
        DetectionPostprocessing = 47,
        Equal = 48,
        Exp = 49,
        ExpandDims = 50,
        Gather = 51,
        GenerateProposals = 52,
        Greater = 53,
        GreaterEqual = 54,
        GroupedConv2d = 55,
        HeatmapMaxKeypoint = 56,
        InstanceNormalization = 57,
        Less = 58,
        LessEqual = 59,
        Log = 60,
        LogicalAnd = 61,
        LogicalNot = 62,
        LogicalOr = 63,
        LogSoftmax = 64,
        Maximum = 65,
        Minimum = 66,
        Neg = 67,
        NotEqual = 68,
        PadV2 = 69,
        Pow = 70,
        Prelu = 71,
        Quantize = 72,
        Quantized16bitLstm = 73,
        RandomMultinomial = 74,
        ReduceAll = 75,
        ReduceAny = 76,
        ReduceMax = 77,
        ReduceMin = 78,
        ReduceProd = 79,
        ReduceSum = 80,
        RoiAlign = 81,
        RoiPooling = 82,
        Rsqrt = 83,
        Select = 84,
        Sin = 85,
        Slice = 86,
        Split = 87,
        Sqrt = 88,
        Tile = 89,
        TopkV2 = 90,
        TransposeConv2d = 91,
        UnidirectionalSequenceLstm = 92,
        UnidirectionalSequenceRnn = 93,
        ResizeNearestNeighbor = 94,
        QuantizedLstm = 95,
        If = 96,
        While = 97,
        Elu = 98,
        HardSwish = 99,
        Fill = 100,
        Rank = 101,
        OemOperation = 10000,
    }
}

impl OperationType {
    /// Oldest interface version that knows this operation
    pub fn version(self) -> Version {
        match self.code() {
            0..=28 | 10000 => Version::V1_0,
            29..=37 => Version::V1_1,
            38..=94 => Version::V1_2,
            95..=101 => Version::V1_3,
            _ => Version::V1_2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceType {
    Unknown,
    Other,
    Cpu,
    Gpu,
    Accelerator,
}

/// Status codes reported by remote endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorStatus {
    None,
    DeviceUnavailable,
    GeneralFailure,
    OutputInsufficientSize,
    InvalidArgument,
    MissedDeadlineTransient,
    MissedDeadlinePersistent,
    ResourceExhaustedTransient,
    ResourceExhaustedPersistent,
    DeadObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasureTiming {
    #[default]
    No,
    Yes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionPreference {
    LowPower,
    #[default]
    FastSingleAnswer,
    SustainedSpeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OperandLifetime {
    TemporaryVariable,
    SubgraphInput,
    SubgraphOutput,
    ConstantCopy,
    ConstantReference,
    NoValue,
    Subgraph,
    Pointer,
}

/// Caller-owned host memory referenced by an operand or request argument.
///
/// Host pointers never cross a process boundary; they are relocated into
/// shared memory before a model or request is sent to a remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostPointer {
    ptr: NonNull<u8>,
    len: usize,
    mutable: bool,
}

// SAFETY: the constructors require the memory to stay valid, and free of
// conflicting access, for as long as any value holding the pointer is used.
unsafe impl Send for HostPointer {}
unsafe impl Sync for HostPointer {}

impl HostPointer {
    /// Wrap read-only caller memory.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads of `len` bytes for as long as the model
    /// or request holding the returned value is in use, and must not be
    /// written to concurrently.
    pub unsafe fn from_const(ptr: *const u8, len: usize) -> Result<Self> {
        let ptr = NonNull::new(ptr as *mut u8)
            .ok_or_else(|| Error::InvalidArgument("host pointer must not be null".to_string()))?;
        Ok(Self { ptr, len, mutable: false })
    }

    /// Wrap writable caller memory.
    ///
    /// # Safety
    ///
    /// `ptr` must be valid for reads and writes of `len` bytes for as long as
    /// the request holding the returned value is in use, and must not be
    /// accessed by anything else while an execution is in flight.
    pub unsafe fn from_mut(ptr: *mut u8, len: usize) -> Result<Self> {
        let ptr = NonNull::new(ptr)
            .ok_or_else(|| Error::InvalidArgument("host pointer must not be null".to_string()))?;
        Ok(Self { ptr, len, mutable: true })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// First `length` bytes behind the pointer
    pub(crate) fn bytes(&self, length: usize) -> Result<&[u8]> {
        self.check_length(length)?;
        // SAFETY: guaranteed valid for `self.len` bytes by the constructor contract
        Ok(unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), length) })
    }

    /// Overwrite the first `data.len()` bytes behind the pointer
    pub(crate) fn write(&self, data: &[u8]) -> Result<()> {
        if !self.mutable {
            return Err(Error::InvalidArgument(
                "cannot write through a read-only host pointer".to_string(),
            ));
        }
        self.check_length(data.len())?;
        // SAFETY: writable for `self.len` bytes by the `from_mut` contract
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.as_ptr(), data.len()) };
        Ok(())
    }

    fn check_length(&self, length: usize) -> Result<()> {
        if length > self.len {
            return Err(Error::InvalidArgument(format!(
                "location length {} exceeds the {} bytes behind the host pointer",
                length, self.len
            )));
        }
        Ok(())
    }
}

/// Where the data of an operand or argument lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataLocation {
    pub pointer: Option<HostPointer>,
    pub pool_index: u32,
    pub offset: u32,
    pub length: u32,
}

impl DataLocation {
    /// Location covering all of the memory behind `pointer`
    pub fn from_pointer(pointer: HostPointer) -> Result<Self> {
        let length = u32::try_from(pointer.len()).map_err(|_| {
            Error::InvalidArgument(format!("host buffer of {} bytes is too large", pointer.len()))
        })?;
        Ok(Self {
            pointer: Some(pointer),
            length,
            ..Self::default()
        })
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SymmPerChannelQuantParams {
    pub scales: Vec<f32>,
    pub channel_dim: u32,
}

/// Type-specific operand parameters
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExtraParams {
    #[default]
    None,
    ChannelQuant(SymmPerChannelQuantParams),
    Extension(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operand {
    pub operand_type: OperandType,
    pub dimensions: Vec<u32>,
    pub scale: f32,
    pub zero_point: i32,
    pub lifetime: OperandLifetime,
    pub location: DataLocation,
    pub extra_params: ExtraParams,
}

impl Operand {
    /// Operand with no data of its own, e.g. an intermediate result
    pub fn new(operand_type: OperandType, dimensions: Vec<u32>, lifetime: OperandLifetime) -> Self {
        Self {
            operand_type,
            dimensions,
            scale: 0.0,
            zero_point: 0,
            lifetime,
            location: DataLocation::default(),
            extra_params: ExtraParams::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub operation_type: OperationType,
    pub inputs: Vec<u32>,
    pub outputs: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Subgraph {
    pub operands: Vec<Operand>,
    pub operations: Vec<Operation>,
    pub input_indexes: Vec<u32>,
    pub output_indexes: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionNameAndPrefix {
    pub name: String,
    pub prefix: u16,
}

/// Version-independent compute graph
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub main: Subgraph,
    pub referenced: Vec<Subgraph>,
    pub operand_values: Bytes,
    pub pools: Vec<SharedMemory>,
    pub relax_computation_float32_to_float16: bool,
    pub extension_name_to_prefix: Vec<ExtensionNameAndPrefix>,
}

impl Model {
    /// Name of the extension an extension code belongs to
    pub fn extension_name(&self, code: ExtensionCode) -> Option<&str> {
        self.extension_name_to_prefix
            .iter()
            .find(|entry| entry.prefix == code.prefix())
            .map(|entry| entry.name.as_str())
    }

    /// All subgraphs, main first
    pub fn subgraphs(&self) -> impl Iterator<Item = &Subgraph> {
        std::iter::once(&self.main).chain(self.referenced.iter())
    }

    /// True when no operand refers to caller memory directly
    pub fn has_no_pointer_data(&self) -> bool {
        self.subgraphs()
            .flat_map(|subgraph| subgraph.operands.iter())
            .all(|operand| operand.location.pointer.is_none())
    }
}

/// Count how many operations consume each operand as an input
pub fn count_number_of_consumers(number_of_operands: usize, operations: &[Operation]) -> Result<Vec<u32>> {
    let mut counts = vec![0u32; number_of_operands];
    for operation in operations {
        for &input in &operation.inputs {
            let count = counts.get_mut(input as usize).ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Operand index {} is out of range (only {} operands)",
                    input, number_of_operands
                ))
            })?;
            *count += 1;
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_codes_round_trip() {
        for operand_type in OperandType::iter().filter(|t| !t.is_extension()) {
            assert_eq!(OperandType::from_code(operand_type.code()), Some(operand_type));
        }
        for operation_type in OperationType::iter().filter(|t| !t.is_extension()) {
            assert_eq!(OperationType::from_code(operation_type.code()), Some(operation_type));
        }
    }

    #[test]
    fn test_extension_codes() {
        let code = ExtensionCode::new(3, 7).unwrap();
        assert_eq!(code.prefix(), 3);
        assert_eq!(code.type_within_extension(), 7);
        assert_eq!(OperandType::from_code(code.code()), Some(OperandType::Extension(code)));
        assert!(ExtensionCode::new(0, 7).is_none());
        assert_eq!(OperandType::from_code(9999), None);
    }

    #[test]
    fn test_operand_type_ordering_follows_codes() {
        assert!(OperandType::Float32 < OperandType::TensorQuant8Asymm);
        assert!(OperandType::Subgraph < OperandType::Oem);
        let extension = OperandType::Extension(ExtensionCode::new(1, 0).unwrap());
        assert!(OperandType::TensorOemByte < extension);
    }

    #[test]
    fn test_count_number_of_consumers() {
        let operations = vec![
            Operation { operation_type: OperationType::Add, inputs: vec![0, 1], outputs: vec![2] },
            Operation { operation_type: OperationType::Mul, inputs: vec![2, 2], outputs: vec![3] },
        ];
        assert_eq!(count_number_of_consumers(5, &operations).unwrap(), vec![1, 1, 2, 0, 0]);
        assert!(count_number_of_consumers(2, &operations).is_err());
    }

    #[test]
    fn test_host_pointer_bounds() {
        let mut buffer = [1u8, 2, 3, 4];
        let pointer = unsafe { HostPointer::from_mut(buffer.as_mut_ptr(), buffer.len()) }.unwrap();
        assert_eq!(pointer.bytes(2).unwrap(), &[1, 2]);
        assert!(pointer.bytes(5).is_err());
        pointer.write(&[9, 9]).unwrap();
        assert_eq!(buffer, [9, 9, 3, 4]);

        let readonly = unsafe { HostPointer::from_const(buffer.as_ptr(), buffer.len()) }.unwrap();
        assert!(readonly.write(&[0]).is_err());
        assert!(unsafe { HostPointer::from_const(std::ptr::null(), 4) }.is_err());
    }
}

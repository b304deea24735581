//! HAL 1.2 wire types. Types unchanged since 1.0 are re-exported.

use std::sync::Arc;

use bytes::Bytes;

use super::{DeathRecipient, TransportResult};
use crate::model;

pub use super::v1_0::{DataLocation, ErrorStatus, Memory, OperandLifetime, PerformanceInfo, Request, RequestArgument};

wire_enum! {
    /// Operand types known to HAL 1.2; vendor extension codes are carried as raw values
    pub enum OperandType => model::OperandType {
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
        Oem = 10000,
        TensorOemByte = 10001,
    }
    unmapped {
        model::OperandType::TensorQuant8AsymmSigned,
        model::OperandType::Subgraph,
        model::OperandType::Extension(_),
    }
}

wire_enum! {
    /// Operation types known to HAL 1.2; vendor extension codes are carried as raw values
    pub enum OperationType => model::OperationType {
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
        OemOperation = 10000,
    }
    unmapped {
        model::OperationType::QuantizedLstm,
        model::OperationType::If,
        model::OperationType::While,
        model::OperationType::Elu,
        model::OperationType::HardSwish,
        model::OperationType::Fill,
        model::OperationType::Rank,
        model::OperationType::Extension(_),
    }
}

wire_enum! {
    pub enum DeviceType => model::DeviceType {
        Other = 1,
        Cpu = 2,
        Gpu = 3,
        Accelerator = 4,
    }
    unmapped {
        model::DeviceType::Unknown,
    }
}

wire_enum! {
    pub enum MeasureTiming => model::MeasureTiming {
        No = 0,
        Yes = 1,
    }
    unmapped {}
}

wire_enum! {
    pub enum ExecutionPreference => model::ExecutionPreference {
        LowPower = 0,
        FastSingleAnswer = 1,
        SustainedSpeed = 2,
    }
    unmapped {}
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OperandPerformance {
    #[prost(int32, tag = "1")]
    pub r#type: i32,
    #[prost(message, optional, tag = "2")]
    pub info: Option<PerformanceInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Capabilities {
    #[prost(message, optional, tag = "1")]
    pub relaxed_float32_to_float16_performance_scalar: Option<PerformanceInfo>,
    #[prost(message, optional, tag = "2")]
    pub relaxed_float32_to_float16_performance_tensor: Option<PerformanceInfo>,
    #[prost(message, repeated, tag = "3")]
    pub operand_performance: Vec<OperandPerformance>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SymmPerChannelQuantParams {
    #[prost(float, repeated, tag = "1")]
    pub scales: Vec<f32>,
    #[prost(uint32, tag = "2")]
    pub channel_dim: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Operand {
    #[prost(int32, tag = "1")]
    pub r#type: i32,
    #[prost(uint32, repeated, tag = "2")]
    pub dimensions: Vec<u32>,
    #[prost(uint32, tag = "3")]
    pub number_of_consumers: u32,
    #[prost(float, tag = "4")]
    pub scale: f32,
    #[prost(int32, tag = "5")]
    pub zero_point: i32,
    #[prost(int32, tag = "6")]
    pub lifetime: i32,
    #[prost(message, optional, tag = "7")]
    pub location: Option<DataLocation>,
    #[prost(oneof = "operand::ExtraParams", tags = "8, 9")]
    pub extra_params: Option<operand::ExtraParams>,
}

pub mod operand {
    /// Type-specific parameters; absent when the operand has none
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum ExtraParams {
        #[prost(message, tag = "8")]
        ChannelQuant(super::SymmPerChannelQuantParams),
        #[prost(bytes, tag = "9")]
        Extension(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Operation {
    #[prost(int32, tag = "1")]
    pub r#type: i32,
    #[prost(uint32, repeated, tag = "2")]
    pub inputs: Vec<u32>,
    #[prost(uint32, repeated, tag = "3")]
    pub outputs: Vec<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtensionNameAndPrefix {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint32, tag = "2")]
    pub prefix: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Model {
    #[prost(message, repeated, tag = "1")]
    pub operands: Vec<Operand>,
    #[prost(message, repeated, tag = "2")]
    pub operations: Vec<Operation>,
    #[prost(uint32, repeated, tag = "3")]
    pub input_indexes: Vec<u32>,
    #[prost(uint32, repeated, tag = "4")]
    pub output_indexes: Vec<u32>,
    #[prost(bytes = "bytes", tag = "5")]
    pub operand_values: Bytes,
    #[prost(message, repeated, tag = "6")]
    pub pools: Vec<Memory>,
    #[prost(bool, tag = "7")]
    pub relax_computation_float32_to_float16: bool,
    #[prost(message, repeated, tag = "8")]
    pub extension_name_to_prefix: Vec<ExtensionNameAndPrefix>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OutputShape {
    #[prost(uint32, repeated, tag = "1")]
    pub dimensions: Vec<u32>,
    #[prost(bool, tag = "2")]
    pub is_sufficient: bool,
}

/// Durations in microseconds; `u64::MAX` marks an unmeasured value
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Timing {
    #[prost(uint64, tag = "1")]
    pub time_on_device: u64,
    #[prost(uint64, tag = "2")]
    pub time_in_driver: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtensionOperandTypeInformation {
    #[prost(uint32, tag = "1")]
    pub r#type: u32,
    #[prost(bool, tag = "2")]
    pub is_tensor: bool,
    #[prost(uint32, tag = "3")]
    pub byte_size: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Extension {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub operand_types: Vec<ExtensionOperandTypeInformation>,
}

pub trait RemoteExecutionCallback: Send + Sync {
    fn notify_1_2(&self, status: i32, output_shapes: Vec<OutputShape>, timing: Timing);
}

pub trait RemotePreparedModel: Send + Sync {
    fn execute_1_2(
        &self,
        request: &Request,
        measure: MeasureTiming,
        callback: Arc<dyn RemoteExecutionCallback>,
    ) -> TransportResult<i32>;

    fn execute_synchronously(
        &self,
        request: &Request,
        measure: MeasureTiming,
    ) -> TransportResult<(i32, Vec<OutputShape>, Timing)>;

    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool>;
}

pub trait RemoteDevice: Send + Sync {
    fn get_capabilities_1_2(&self) -> TransportResult<(i32, Capabilities)>;

    fn get_version_string(&self) -> TransportResult<(i32, String)>;

    fn get_type(&self) -> TransportResult<(i32, i32)>;

    fn get_supported_extensions(&self) -> TransportResult<(i32, Vec<Extension>)>;

    fn get_supported_operations_1_2(&self, model: &Model) -> TransportResult<(i32, Vec<bool>)>;

    fn prepare_model_1_2(
        &self,
        model: &Model,
        preference: ExecutionPreference,
    ) -> TransportResult<(i32, Option<Arc<dyn RemotePreparedModel>>)>;

    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool>;
}

//! AIDL wire types. Unsigned quantities travel as signed integers and
//! durations as nanoseconds, with `-1` meaning "none".

use std::sync::Arc;

use bytes::Bytes;

use super::{DeathRecipient, NativeHandle, TransportResult};
use crate::execution::fence::SyncFence;
use crate::model;

wire_enum! {
    /// Operand types known to the AIDL interface; vendor extension codes are carried as raw values
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
        TensorQuant8AsymmSigned = 14,
        Subgraph = 15,
    }
    unmapped {
        model::OperandType::Oem,
        model::OperandType::TensorOemByte,
        model::OperandType::Extension(_),
    }
}

wire_enum! {
    /// Operation types known to the AIDL interface; vendor extension codes are carried as raw values
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
        QuantizedLstm = 95,
        If = 96,
        While = 97,
        Elu = 98,
        HardSwish = 99,
        Fill = 100,
        Rank = 101,
    }
    unmapped {
        model::OperationType::OemOperation,
        model::OperationType::Extension(_),
    }
}

wire_enum! {
    pub enum OperandLifetime => model::OperandLifetime {
        TemporaryVariable = 0,
        SubgraphInput = 1,
        SubgraphOutput = 2,
        ConstantCopy = 3,
        ConstantReference = 4,
        NoValue = 5,
        Subgraph = 6,
    }
    unmapped {
        model::OperandLifetime::Pointer,
    }
}

wire_enum! {
    pub enum ErrorStatus => model::ErrorStatus {
        None = 0,
        DeviceUnavailable = 1,
        GeneralFailure = 2,
        OutputInsufficientSize = 3,
        InvalidArgument = 4,
        MissedDeadlineTransient = 5,
        MissedDeadlinePersistent = 6,
        ResourceExhaustedTransient = 7,
        ResourceExhaustedPersistent = 8,
    }
    unmapped {
        model::ErrorStatus::DeadObject,
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
    pub enum ExecutionPreference => model::ExecutionPreference {
        LowPower = 0,
        FastSingleAnswer = 1,
        SustainedSpeed = 2,
    }
    unmapped {}
}

wire_enum! {
    pub enum Priority => model::Priority {
        Low = 0,
        Medium = 1,
        High = 2,
    }
    unmapped {}
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PerformanceInfo {
    #[prost(float, tag = "1")]
    pub exec_time: f32,
    #[prost(float, tag = "2")]
    pub power_usage: f32,
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
    #[prost(message, optional, tag = "4")]
    pub if_performance: Option<PerformanceInfo>,
    #[prost(message, optional, tag = "5")]
    pub while_performance: Option<PerformanceInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataLocation {
    #[prost(int32, tag = "1")]
    pub pool_index: i32,
    #[prost(int64, tag = "2")]
    pub offset: i64,
    #[prost(int64, tag = "3")]
    pub length: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SymmPerChannelQuantParams {
    #[prost(float, repeated, tag = "1")]
    pub scales: Vec<f32>,
    #[prost(int32, tag = "2")]
    pub channel_dim: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Operand {
    #[prost(int32, tag = "1")]
    pub r#type: i32,
    #[prost(int32, repeated, tag = "2")]
    pub dimensions: Vec<i32>,
    #[prost(float, tag = "3")]
    pub scale: f32,
    #[prost(int32, tag = "4")]
    pub zero_point: i32,
    #[prost(int32, tag = "5")]
    pub lifetime: i32,
    #[prost(message, optional, tag = "6")]
    pub location: Option<DataLocation>,
    #[prost(oneof = "operand::ExtraParams", tags = "7, 8")]
    pub extra_params: Option<operand::ExtraParams>,
}

pub mod operand {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum ExtraParams {
        #[prost(message, tag = "7")]
        ChannelQuant(super::SymmPerChannelQuantParams),
        #[prost(bytes, tag = "8")]
        Extension(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Operation {
    #[prost(int32, tag = "1")]
    pub r#type: i32,
    #[prost(int32, repeated, tag = "2")]
    pub inputs: Vec<i32>,
    #[prost(int32, repeated, tag = "3")]
    pub outputs: Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Subgraph {
    #[prost(message, repeated, tag = "1")]
    pub operands: Vec<Operand>,
    #[prost(message, repeated, tag = "2")]
    pub operations: Vec<Operation>,
    #[prost(int32, repeated, tag = "3")]
    pub input_indexes: Vec<i32>,
    #[prost(int32, repeated, tag = "4")]
    pub output_indexes: Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtensionNameAndPrefix {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int32, tag = "2")]
    pub prefix: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Memory {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int64, tag = "2")]
    pub size: i64,
    #[prost(message, optional, tag = "3")]
    pub handle: Option<NativeHandle>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Model {
    #[prost(message, optional, tag = "1")]
    pub main: Option<Subgraph>,
    #[prost(message, repeated, tag = "2")]
    pub referenced: Vec<Subgraph>,
    #[prost(bytes = "bytes", tag = "3")]
    pub operand_values: Bytes,
    #[prost(message, repeated, tag = "4")]
    pub pools: Vec<Memory>,
    #[prost(bool, tag = "5")]
    pub relax_computation_float32_to_float16: bool,
    #[prost(message, repeated, tag = "6")]
    pub extension_name_to_prefix: Vec<ExtensionNameAndPrefix>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestArgument {
    #[prost(bool, tag = "1")]
    pub has_no_value: bool,
    #[prost(message, optional, tag = "2")]
    pub location: Option<DataLocation>,
    #[prost(int32, repeated, tag = "3")]
    pub dimensions: Vec<i32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestMemoryPool {
    #[prost(oneof = "request_memory_pool::Pool", tags = "1, 2")]
    pub pool: Option<request_memory_pool::Pool>,
}

pub mod request_memory_pool {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Pool {
        #[prost(message, tag = "1")]
        Pool(super::Memory),
        #[prost(int32, tag = "2")]
        Token(i32),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    #[prost(message, repeated, tag = "1")]
    pub inputs: Vec<RequestArgument>,
    #[prost(message, repeated, tag = "2")]
    pub outputs: Vec<RequestArgument>,
    #[prost(message, repeated, tag = "3")]
    pub pools: Vec<RequestMemoryPool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct OutputShape {
    #[prost(int32, repeated, tag = "1")]
    pub dimensions: Vec<i32>,
    #[prost(bool, tag = "2")]
    pub is_sufficient: bool,
}

/// Durations in nanoseconds; `-1` marks an unmeasured value
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Timing {
    #[prost(int64, tag = "1")]
    pub time_on_device_ns: i64,
    #[prost(int64, tag = "2")]
    pub time_in_driver_ns: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExecutionResult {
    #[prost(bool, tag = "1")]
    pub output_sufficient_size: bool,
    #[prost(message, repeated, tag = "2")]
    pub output_shapes: Vec<OutputShape>,
    #[prost(message, optional, tag = "3")]
    pub timing: Option<Timing>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExtensionOperandTypeInformation {
    #[prost(int32, tag = "1")]
    pub r#type: i32,
    #[prost(bool, tag = "2")]
    pub is_tensor: bool,
    #[prost(int32, tag = "3")]
    pub byte_size: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Extension {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub operand_types: Vec<ExtensionOperandTypeInformation>,
}

/// Reports timing and status once a fenced execution has finished
pub trait RemoteFencedExecutionCallback: Send + Sync {
    /// Returns (launched timing, fenced timing, error status)
    fn get_execution_info(&self) -> TransportResult<(Timing, Timing, i32)>;
}

pub struct FencedExecutionResult {
    pub callback: Option<Arc<dyn RemoteFencedExecutionCallback>>,
    /// Signalled when the execution completes; `None` means already done
    pub sync_fence: Option<SyncFence>,
}

pub trait RemotePreparedModel: Send + Sync {
    fn execute_synchronously(
        &self,
        request: &Request,
        measure_timing: bool,
        deadline_ns: i64,
        loop_timeout_duration_ns: i64,
    ) -> TransportResult<ExecutionResult>;

    fn execute_fenced(
        &self,
        request: &Request,
        wait_for: &[SyncFence],
        measure_timing: bool,
        deadline_ns: i64,
        loop_timeout_duration_ns: i64,
        duration_ns: i64,
    ) -> TransportResult<FencedExecutionResult>;

    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool>;
}

/// Remote device; failures with a status travel as `TransportError::ServiceSpecific`
pub trait RemoteDevice: Send + Sync {
    fn get_capabilities(&self) -> TransportResult<Capabilities>;

    fn get_version_string(&self) -> TransportResult<String>;

    fn get_type(&self) -> TransportResult<i32>;

    fn get_supported_extensions(&self) -> TransportResult<Vec<Extension>>;

    fn get_supported_operations(&self, model: &Model) -> TransportResult<Vec<bool>>;

    fn prepare_model(
        &self,
        model: &Model,
        preference: ExecutionPreference,
        priority: Priority,
        deadline_ns: i64,
    ) -> TransportResult<Arc<dyn RemotePreparedModel>>;

    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool>;
}

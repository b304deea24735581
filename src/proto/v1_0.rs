//! HAL 1.0 wire types.

use std::sync::Arc;

use bytes::Bytes;

use super::{DeathRecipient, NativeHandle, TransportResult};
use crate::model;

wire_enum! {
    /// Operand types known to HAL 1.0
    pub enum OperandType => model::OperandType {
        Float32 = 0,
        Int32 = 1,
        Uint32 = 2,
        TensorFloat32 = 3,
        TensorInt32 = 4,
        TensorQuant8Asymm = 5,
        Oem = 10000,
        TensorOemByte = 10001,
    }
    unmapped {
        model::OperandType::Bool,
        model::OperandType::TensorQuant16Symm,
        model::OperandType::TensorFloat16,
        model::OperandType::TensorBool8,
        model::OperandType::Float16,
        model::OperandType::TensorQuant8SymmPerChannel,
        model::OperandType::TensorQuant16Asymm,
        model::OperandType::TensorQuant8Symm,
        model::OperandType::TensorQuant8AsymmSigned,
        model::OperandType::Subgraph,
        model::OperandType::Extension(_),
    }
}

wire_enum! {
    /// Operation types known to HAL 1.0
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
        OemOperation = 10000,
    }
    unmapped {
        model::OperationType::BatchToSpaceNd,
        model::OperationType::Div,
        model::OperationType::Mean,
        model::OperationType::Pad,
        model::OperationType::SpaceToBatchNd,
        model::OperationType::Squeeze,
        model::OperationType::StridedSlice,
        model::OperationType::Sub,
        model::OperationType::Transpose,
        model::OperationType::Abs,
        model::OperationType::Argmax,
        model::OperationType::Argmin,
        model::OperationType::AxisAlignedBboxTransform,
        model::OperationType::BidirectionalSequenceLstm,
        model::OperationType::BidirectionalSequenceRnn,
        model::OperationType::BoxWithNmsLimit,
        model::OperationType::Cast,
        model::OperationType::ChannelShuffle,
        model::OperationType::DetectionPostprocessing,
        model::OperationType::Equal,
        model::OperationType::Exp,
        model::OperationType::ExpandDims,
        model::OperationType::Gather,
        model::OperationType::GenerateProposals,
        model::OperationType::Greater,
        model::OperationType::GreaterEqual,
        model::OperationType::GroupedConv2d,
        model::OperationType::HeatmapMaxKeypoint,
        model::OperationType::InstanceNormalization,
        model::OperationType::Less,
        model::OperationType::LessEqual,
        model::OperationType::Log,
        model::OperationType::LogicalAnd,
        model::OperationType::LogicalNot,
        model::OperationType::LogicalOr,
        model::OperationType::LogSoftmax,
        model::OperationType::Maximum,
        model::OperationType::Minimum,
        model::OperationType::Neg,
        model::OperationType::NotEqual,
        model::OperationType::PadV2,
        model::OperationType::Pow,
        model::OperationType::Prelu,
        model::OperationType::Quantize,
        model::OperationType::Quantized16bitLstm,
        model::OperationType::RandomMultinomial,
        model::OperationType::ReduceAll,
        model::OperationType::ReduceAny,
        model::OperationType::ReduceMax,
        model::OperationType::ReduceMin,
        model::OperationType::ReduceProd,
        model::OperationType::ReduceSum,
        model::OperationType::RoiAlign,
        model::OperationType::RoiPooling,
        model::OperationType::Rsqrt,
        model::OperationType::Select,
        model::OperationType::Sin,
        model::OperationType::Slice,
        model::OperationType::Split,
        model::OperationType::Sqrt,
        model::OperationType::Tile,
        model::OperationType::TopkV2,
        model::OperationType::TransposeConv2d,
        model::OperationType::UnidirectionalSequenceLstm,
        model::OperationType::UnidirectionalSequenceRnn,
        model::OperationType::ResizeNearestNeighbor,
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
    pub enum OperandLifetime => model::OperandLifetime {
        TemporaryVariable = 0,
        SubgraphInput = 1,
        SubgraphOutput = 2,
        ConstantCopy = 3,
        ConstantReference = 4,
        NoValue = 5,
    }
    unmapped {
        model::OperandLifetime::Subgraph,
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
    }
    unmapped {
        model::ErrorStatus::MissedDeadlineTransient,
        model::ErrorStatus::MissedDeadlinePersistent,
        model::ErrorStatus::ResourceExhaustedTransient,
        model::ErrorStatus::ResourceExhaustedPersistent,
        model::ErrorStatus::DeadObject,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PerformanceInfo {
    #[prost(float, tag = "1")]
    pub exec_time: f32,
    #[prost(float, tag = "2")]
    pub power_usage: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Capabilities {
    #[prost(message, optional, tag = "1")]
    pub float32_performance: Option<PerformanceInfo>,
    #[prost(message, optional, tag = "2")]
    pub quantized8_performance: Option<PerformanceInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataLocation {
    #[prost(uint32, tag = "1")]
    pub pool_index: u32,
    #[prost(uint32, tag = "2")]
    pub offset: u32,
    #[prost(uint32, tag = "3")]
    pub length: u32,
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

/// Shared memory as carried by the HIDL interfaces
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Memory {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint64, tag = "2")]
    pub size: u64,
    #[prost(message, optional, tag = "3")]
    pub handle: Option<NativeHandle>,
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
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RequestArgument {
    #[prost(bool, tag = "1")]
    pub has_no_value: bool,
    #[prost(message, optional, tag = "2")]
    pub location: Option<DataLocation>,
    #[prost(uint32, repeated, tag = "3")]
    pub dimensions: Vec<u32>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Request {
    #[prost(message, repeated, tag = "1")]
    pub inputs: Vec<RequestArgument>,
    #[prost(message, repeated, tag = "2")]
    pub outputs: Vec<RequestArgument>,
    #[prost(message, repeated, tag = "3")]
    pub pools: Vec<Memory>,
}

/// Completion callback handed to `RemotePreparedModel::execute`
pub trait RemoteExecutionCallback: Send + Sync {
    fn notify(&self, status: i32);
}

pub trait RemotePreparedModel: Send + Sync {
    /// Launch an execution; the returned value is the launch status
    fn execute(&self, request: &Request, callback: Arc<dyn RemoteExecutionCallback>) -> TransportResult<i32>;

    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool>;
}

pub trait RemoteDevice: Send + Sync {
    fn get_capabilities(&self) -> TransportResult<(i32, Capabilities)>;

    fn get_supported_operations(&self, model: &Model) -> TransportResult<(i32, Vec<bool>)>;

    fn prepare_model(&self, model: &Model) -> TransportResult<(i32, Option<Arc<dyn RemotePreparedModel>>)>;

    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool>;
}

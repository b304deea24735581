//! Mock remote endpoints for every interface version.
//!
//! Each mock pushes the requests it receives through a prost encode/decode
//! cycle, as a real process boundary would, then writes a deterministic
//! byte pattern into every output region.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use prost::Message;

use nnhal::memory::{create_shared_memory, MemoryView};
use nnhal::proto::{aidl, v1_0, v1_2, DeathRecipient, TransportError, TransportResult};
use nnhal::{
    Argument, DataLocation, HostPointer, MemoryPool, Model, Operand, OperandLifetime, OperandType, Operation,
    OperationType, OutputShape, Request, SyncFence, Subgraph,
};

pub fn through_wire<M: Message + Default>(message: &M) -> M {
    M::decode(message.encode_to_vec().as_slice()).expect("wire message decodes")
}

pub fn output_pattern(index: usize, length: usize) -> Vec<u8> {
    (0..length).map(|i| (index * 37 + i * 3 + 1) as u8).collect()
}

/// Write `output_pattern` into every pool-backed output of `request`
pub fn write_outputs(request: &Request) -> Vec<OutputShape> {
    for (index, output) in request.outputs.iter().enumerate() {
        let location = &output.location;
        if let Some(MemoryPool::Memory(memory)) = request.pools.get(location.pool_index as usize) {
            MemoryView::new(memory)
                .unwrap()
                .write_at(location.offset as usize, &output_pattern(index, location.length as usize))
                .unwrap();
        }
    }
    request
        .outputs
        .iter()
        .map(|output| OutputShape { dimensions: output.dimensions.clone(), is_sufficient: true })
        .collect()
}

fn tensor(lifetime: OperandLifetime) -> Operand {
    Operand::new(OperandType::TensorFloat32, vec![2], lifetime)
}

/// out = in0 + in1 with a constant activation
pub fn add_model() -> Model {
    let activation = Operand {
        location: DataLocation { pointer: None, pool_index: 0, offset: 0, length: 4 },
        ..Operand::new(OperandType::Int32, vec![], OperandLifetime::ConstantCopy)
    };
    Model {
        main: Subgraph {
            operands: vec![
                tensor(OperandLifetime::SubgraphInput),
                tensor(OperandLifetime::SubgraphInput),
                activation,
                tensor(OperandLifetime::SubgraphOutput),
            ],
            operations: vec![Operation { operation_type: OperationType::Add, inputs: vec![0, 1, 2], outputs: vec![3] }],
            input_indexes: vec![0, 1],
            output_indexes: vec![3],
        },
        operand_values: Bytes::from_static(&[0, 0, 0, 0]),
        ..Model::default()
    }
}

/// Request for `add_model` whose arguments all live in one shared pool
pub fn pool_request() -> Request {
    let memory = create_shared_memory(24).unwrap();
    MemoryView::new(&memory).unwrap().write_at(0, &[7; 16]).unwrap();
    Request {
        inputs: vec![Argument::from_pool(0, 0, 8), Argument::from_pool(0, 8, 8)],
        outputs: vec![Argument::from_pool(0, 16, 8)],
        pools: vec![MemoryPool::Memory(memory)],
    }
}

/// Request whose arguments point straight at caller buffers. The buffers
/// must outlive the request.
pub fn pointer_request(inputs: &[Vec<u8>], outputs: &mut [Vec<u8>]) -> Request {
    let inputs = inputs
        .iter()
        .map(|data| {
            let pointer = unsafe { HostPointer::from_const(data.as_ptr(), data.len()) }.unwrap();
            Argument::from_pointer(pointer).unwrap()
        })
        .collect();
    let outputs = outputs
        .iter_mut()
        .map(|data| {
            let pointer = unsafe { HostPointer::from_mut(data.as_mut_ptr(), data.len()) }.unwrap();
            Argument::from_pointer(pointer).unwrap()
        })
        .collect();
    Request { inputs, outputs, pools: Vec::new() }
}

/// Keeps the death recipient a client registered so a test can kill the
/// endpoint
#[derive(Default)]
pub struct DeathLink {
    recipient: Mutex<Option<Arc<dyn DeathRecipient>>>,
}

impl DeathLink {
    pub fn link(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool> {
        *self.recipient.lock().unwrap() = Some(recipient);
        Ok(true)
    }

    pub fn kill(&self) {
        let recipient = self.recipient.lock().unwrap().clone();
        if let Some(recipient) = recipient {
            recipient.service_died();
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum AsyncBehavior {
    #[default]
    Succeed,
    /// The launch itself reports this status
    LaunchStatus(i32),
    /// The launch succeeds and the callback reports this status
    CallbackStatus(i32),
    /// The endpoint dies instead of notifying
    DieBeforeNotify,
    NeverNotify,
}

#[derive(Debug, Clone, Default)]
pub enum SyncBehavior {
    #[default]
    Succeed,
    Status(i32),
    Transport(TransportError),
}

#[derive(Default)]
pub struct MockV1_0PreparedModel {
    pub behavior: AsyncBehavior,
    pub death: DeathLink,
    pub executions: AtomicUsize,
}

impl v1_0::RemotePreparedModel for MockV1_0PreparedModel {
    fn execute(
        &self,
        request: &v1_0::Request,
        callback: Arc<dyn v1_0::RemoteExecutionCallback>,
    ) -> TransportResult<i32> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let request: Request = nnhal::convert::v1_0::validated_to_canonical(&through_wire(request)).unwrap();
        match self.behavior.clone() {
            AsyncBehavior::Succeed => {
                write_outputs(&request);
                thread::spawn(move || callback.notify(i32::from(v1_0::ErrorStatus::None)));
            }
            AsyncBehavior::LaunchStatus(status) => return Ok(status),
            AsyncBehavior::CallbackStatus(status) => {
                thread::spawn(move || callback.notify(status));
            }
            AsyncBehavior::DieBeforeNotify => self.death.kill(),
            AsyncBehavior::NeverNotify => {}
        }
        Ok(i32::from(v1_0::ErrorStatus::None))
    }

    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool> {
        self.death.link(recipient)
    }
}

fn v1_0_performance(exec_time: f32) -> Option<v1_0::PerformanceInfo> {
    Some(v1_0::PerformanceInfo { exec_time, power_usage: exec_time })
}

#[derive(Default)]
pub struct MockV1_0Device {
    pub death: DeathLink,
    pub prepared: Mutex<Vec<Arc<MockV1_0PreparedModel>>>,
}

impl v1_0::RemoteDevice for MockV1_0Device {
    fn get_capabilities(&self) -> TransportResult<(i32, v1_0::Capabilities)> {
        let capabilities = v1_0::Capabilities {
            float32_performance: v1_0_performance(0.5),
            quantized8_performance: v1_0_performance(0.25),
        };
        Ok((0, capabilities))
    }

    fn get_supported_operations(&self, model: &v1_0::Model) -> TransportResult<(i32, Vec<bool>)> {
        let model = through_wire(model);
        Ok((0, vec![true; model.operations.len()]))
    }

    fn prepare_model(
        &self,
        model: &v1_0::Model,
    ) -> TransportResult<(i32, Option<Arc<dyn v1_0::RemotePreparedModel>>)> {
        let _: Model = nnhal::convert::v1_0::validated_to_canonical(&through_wire(model)).unwrap();
        let prepared = Arc::new(MockV1_0PreparedModel::default());
        self.prepared.lock().unwrap().push(prepared.clone());
        Ok((0, Some(prepared as Arc<dyn v1_0::RemotePreparedModel>)))
    }

    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool> {
        self.death.link(recipient)
    }
}

fn v1_2_timing(measure: v1_2::MeasureTiming) -> v1_2::Timing {
    match measure {
        v1_2::MeasureTiming::Yes => v1_2::Timing { time_on_device: 10, time_in_driver: 20 },
        v1_2::MeasureTiming::No => v1_2::Timing { time_on_device: u64::MAX, time_in_driver: u64::MAX },
    }
}

fn v1_2_shapes(shapes: &[OutputShape]) -> Vec<v1_2::OutputShape> {
    shapes.iter().map(|shape| v1_2::OutputShape::try_from(shape).unwrap()).collect()
}

#[derive(Default)]
pub struct MockV1_2PreparedModel {
    pub sync: SyncBehavior,
    pub asynchronous: AsyncBehavior,
    pub death: DeathLink,
    pub sync_calls: AtomicUsize,
    pub async_calls: AtomicUsize,
}

impl v1_2::RemotePreparedModel for MockV1_2PreparedModel {
    fn execute_1_2(
        &self,
        request: &v1_2::Request,
        measure: v1_2::MeasureTiming,
        callback: Arc<dyn v1_2::RemoteExecutionCallback>,
    ) -> TransportResult<i32> {
        self.async_calls.fetch_add(1, Ordering::SeqCst);
        let request: Request = nnhal::convert::v1_2::validated_to_canonical(&through_wire(request)).unwrap();
        match self.asynchronous.clone() {
            AsyncBehavior::Succeed => {
                let shapes = v1_2_shapes(&write_outputs(&request));
                thread::spawn(move || callback.notify_1_2(0, shapes, v1_2_timing(measure)));
            }
            AsyncBehavior::LaunchStatus(status) => return Ok(status),
            AsyncBehavior::CallbackStatus(status) => {
                thread::spawn(move || callback.notify_1_2(status, Vec::new(), v1_2_timing(v1_2::MeasureTiming::No)));
            }
            AsyncBehavior::DieBeforeNotify => self.death.kill(),
            AsyncBehavior::NeverNotify => {}
        }
        Ok(0)
    }

    fn execute_synchronously(
        &self,
        request: &v1_2::Request,
        measure: v1_2::MeasureTiming,
    ) -> TransportResult<(i32, Vec<v1_2::OutputShape>, v1_2::Timing)> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        match self.sync.clone() {
            SyncBehavior::Succeed => {
                let request: Request =
                    nnhal::convert::v1_2::validated_to_canonical(&through_wire(request)).unwrap();
                let shapes = v1_2_shapes(&write_outputs(&request));
                Ok((0, shapes, v1_2_timing(measure)))
            }
            SyncBehavior::Status(status) => Ok((status, Vec::new(), v1_2_timing(v1_2::MeasureTiming::No))),
            SyncBehavior::Transport(error) => Err(error),
        }
    }

    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool> {
        self.death.link(recipient)
    }
}

fn v1_2_performance(exec_time: f32) -> Option<v1_0::PerformanceInfo> {
    v1_0_performance(exec_time)
}

#[derive(Default)]
pub struct MockV1_2Device {
    pub death: DeathLink,
    pub extensions: Vec<v1_2::Extension>,
    /// Reported length of the supported-operations vector, when set
    pub supported_len: Option<usize>,
    pub prepared: Mutex<Vec<Arc<MockV1_2PreparedModel>>>,
}

impl v1_2::RemoteDevice for MockV1_2Device {
    fn get_capabilities_1_2(&self) -> TransportResult<(i32, v1_2::Capabilities)> {
        let capabilities = v1_2::Capabilities {
            relaxed_float32_to_float16_performance_scalar: v1_2_performance(0.5),
            relaxed_float32_to_float16_performance_tensor: v1_2_performance(0.5),
            operand_performance: vec![
                v1_2::OperandPerformance {
                    r#type: i32::from(v1_2::OperandType::Float32),
                    info: v1_2_performance(1.0),
                },
                v1_2::OperandPerformance {
                    r#type: i32::from(v1_2::OperandType::TensorFloat32),
                    info: v1_2_performance(0.75),
                },
            ],
        };
        Ok((0, capabilities))
    }

    fn get_version_string(&self) -> TransportResult<(i32, String)> {
        Ok((0, "mock-1.2".to_string()))
    }

    fn get_type(&self) -> TransportResult<(i32, i32)> {
        Ok((0, i32::from(v1_2::DeviceType::Gpu)))
    }

    fn get_supported_extensions(&self) -> TransportResult<(i32, Vec<v1_2::Extension>)> {
        Ok((0, self.extensions.clone()))
    }

    fn get_supported_operations_1_2(&self, model: &v1_2::Model) -> TransportResult<(i32, Vec<bool>)> {
        let model = through_wire(model);
        Ok((0, vec![true; self.supported_len.unwrap_or(model.operations.len())]))
    }

    fn prepare_model_1_2(
        &self,
        model: &v1_2::Model,
        _preference: v1_2::ExecutionPreference,
    ) -> TransportResult<(i32, Option<Arc<dyn v1_2::RemotePreparedModel>>)> {
        let _: Model = nnhal::convert::v1_2::validated_to_canonical(&through_wire(model)).unwrap();
        let prepared = Arc::new(MockV1_2PreparedModel::default());
        self.prepared.lock().unwrap().push(prepared.clone());
        Ok((0, Some(prepared as Arc<dyn v1_2::RemotePreparedModel>)))
    }

    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool> {
        self.death.link(recipient)
    }
}

fn aidl_timing(measure: bool) -> aidl::Timing {
    if measure {
        aidl::Timing { time_on_device_ns: 1_000, time_in_driver_ns: 2_000 }
    } else {
        aidl::Timing { time_on_device_ns: -1, time_in_driver_ns: -1 }
    }
}

pub struct MockFencedCallback {
    pub status: i32,
    pub measure: bool,
}

impl aidl::RemoteFencedExecutionCallback for MockFencedCallback {
    fn get_execution_info(&self) -> TransportResult<(aidl::Timing, aidl::Timing, i32)> {
        Ok((aidl_timing(self.measure), aidl_timing(self.measure), self.status))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FenceBehavior {
    /// Return an active fence signalled once the outputs are written
    #[default]
    SignalLater,
    /// Finish before returning and hand back no fence
    NoFence,
    /// Return an active fence that signals an error
    SignalError,
    /// Return an active fence that is never signalled
    NeverSignal,
    NoCallback,
}

#[derive(Default)]
pub struct MockAidlPreparedModel {
    pub dead: AtomicBool,
    /// Reported as a service-specific error by synchronous executions
    pub sync_status: Option<i32>,
    pub fence: FenceBehavior,
    pub death: DeathLink,
    pub executions: AtomicUsize,
}

impl MockAidlPreparedModel {
    pub fn dead() -> Self {
        Self { dead: AtomicBool::new(true), ..Self::default() }
    }
}

impl aidl::RemotePreparedModel for MockAidlPreparedModel {
    fn execute_synchronously(
        &self,
        request: &aidl::Request,
        measure_timing: bool,
        _deadline_ns: i64,
        _loop_timeout_duration_ns: i64,
    ) -> TransportResult<aidl::ExecutionResult> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.dead.load(Ordering::SeqCst) {
            return Err(TransportError::DeadObject);
        }
        if let Some(status) = self.sync_status {
            return Err(TransportError::ServiceSpecific(status));
        }
        let request: Request = nnhal::convert::aidl::validated_to_canonical(&through_wire(request)).unwrap();
        let output_shapes =
            write_outputs(&request).iter().map(|shape| aidl::OutputShape::try_from(shape).unwrap()).collect();
        Ok(aidl::ExecutionResult {
            output_sufficient_size: true,
            output_shapes,
            timing: Some(aidl_timing(measure_timing)),
        })
    }

    fn execute_fenced(
        &self,
        request: &aidl::Request,
        wait_for: &[SyncFence],
        measure_timing: bool,
        _deadline_ns: i64,
        _loop_timeout_duration_ns: i64,
        _duration_ns: i64,
    ) -> TransportResult<aidl::FencedExecutionResult> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if self.dead.load(Ordering::SeqCst) {
            return Err(TransportError::DeadObject);
        }
        for fence in wait_for {
            fence.sync_wait(None).unwrap();
        }
        let request: Request = nnhal::convert::aidl::validated_to_canonical(&through_wire(request)).unwrap();
        let callback: Option<Arc<dyn aidl::RemoteFencedExecutionCallback>> =
            Some(Arc::new(MockFencedCallback { status: 0, measure: measure_timing }));

        let sync_fence = match self.fence {
            FenceBehavior::NoFence => {
                write_outputs(&request);
                None
            }
            FenceBehavior::NoCallback => return Ok(aidl::FencedExecutionResult { callback: None, sync_fence: None }),
            FenceBehavior::NeverSignal => Some(SyncFence::new()),
            FenceBehavior::SignalLater | FenceBehavior::SignalError => {
                let fence = SyncFence::new();
                let signaller = fence.clone();
                let fail = self.fence == FenceBehavior::SignalError;
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(5));
                    // A failing execution may still have scribbled over its output pool
                    write_outputs(&request);
                    if fail {
                        signaller.signal_error().unwrap();
                    } else {
                        signaller.signal().unwrap();
                    }
                });
                Some(fence)
            }
        };
        Ok(aidl::FencedExecutionResult { callback, sync_fence })
    }

    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool> {
        self.death.link(recipient)
    }
}

fn aidl_performance(exec_time: f32) -> Option<aidl::PerformanceInfo> {
    Some(aidl::PerformanceInfo { exec_time, power_usage: exec_time })
}

/// AIDL device whose first `dead_models` prepared models are dead
#[derive(Default)]
pub struct MockAidlDevice {
    pub dead_models: usize,
    pub death: DeathLink,
    pub prepare_calls: AtomicUsize,
    pub prepared: Mutex<Vec<Arc<MockAidlPreparedModel>>>,
}

impl aidl::RemoteDevice for MockAidlDevice {
    fn get_capabilities(&self) -> TransportResult<aidl::Capabilities> {
        Ok(aidl::Capabilities {
            relaxed_float32_to_float16_performance_scalar: aidl_performance(0.5),
            relaxed_float32_to_float16_performance_tensor: aidl_performance(0.5),
            operand_performance: vec![aidl::OperandPerformance {
                r#type: i32::from(aidl::OperandType::TensorFloat32),
                info: aidl_performance(0.75),
            }],
            if_performance: aidl_performance(1.0),
            while_performance: aidl_performance(1.0),
        })
    }

    fn get_version_string(&self) -> TransportResult<String> {
        Ok("mock-aidl".to_string())
    }

    fn get_type(&self) -> TransportResult<i32> {
        Ok(i32::from(aidl::DeviceType::Accelerator))
    }

    fn get_supported_extensions(&self) -> TransportResult<Vec<aidl::Extension>> {
        Ok(Vec::new())
    }

    fn get_supported_operations(&self, model: &aidl::Model) -> TransportResult<Vec<bool>> {
        let model = through_wire(model);
        Ok(vec![true; model.main.map(|main| main.operations.len()).unwrap_or(0)])
    }

    fn prepare_model(
        &self,
        model: &aidl::Model,
        _preference: aidl::ExecutionPreference,
        _priority: aidl::Priority,
        _deadline_ns: i64,
    ) -> TransportResult<Arc<dyn aidl::RemotePreparedModel>> {
        let _: Model = nnhal::convert::aidl::validated_to_canonical(&through_wire(model)).unwrap();
        let index = self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        let prepared = Arc::new(if index < self.dead_models {
            MockAidlPreparedModel::dead()
        } else {
            MockAidlPreparedModel::default()
        });
        self.prepared.lock().unwrap().push(prepared.clone());
        Ok(prepared as Arc<dyn aidl::RemotePreparedModel>)
    }

    fn link_to_death(&self, recipient: Arc<dyn DeathRecipient>) -> TransportResult<bool> {
        self.death.link(recipient)
    }
}

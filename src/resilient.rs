//! Endpoint handles that reconnect after the remote process dies.
//!
//! A [`Resilient`] caches one endpoint created by a factory. Calls made
//! through [`Resilient::protect`] that fail with a dead-object error recover
//! the endpoint and retry once. Recovery is keyed on the identity of the
//! endpoint that failed, so many callers failing against the same dead
//! endpoint cause a single reconnect.

use std::sync::{Arc, Mutex, MutexGuard};

use log::warn;

use crate::capabilities::{Capabilities, Extension};
use crate::error::{Error, Result};
use crate::execution::{
    Device, ExecuteFencedInfoCallback, PreparedModel, SharedDevice, SharedPreparedModel, SyncFence,
};
use crate::memory::flatten_model;
use crate::model::{DeviceType, ExecutionPreference, MeasureTiming, Model, Priority, Version};
use crate::request::{OptionalDuration, OptionalTimePoint, OutputShape, Request, Timing};

/// Creates a fresh endpoint; the flag tells whether the caller may block
/// waiting for the service to come up
pub type Factory<T> = Box<dyn Fn(bool) -> Result<Arc<T>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Unbound,
    Bound,
    Dead,
}

enum Binding<T: ?Sized> {
    Unbound,
    Bound(Arc<T>),
    Dead,
}

fn same_endpoint<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

pub struct Resilient<T: ?Sized> {
    factory: Factory<T>,
    binding: Mutex<Binding<T>>,
}

impl<T: ?Sized> Resilient<T> {
    /// Handle that creates its endpoint on first use
    pub fn new(factory: Factory<T>) -> Self {
        Self { factory, binding: Mutex::new(Binding::Unbound) }
    }

    /// Handle whose endpoint is created immediately
    pub fn create(factory: Factory<T>, blocking: bool) -> Result<Self> {
        let resilient = Self::new(factory);
        resilient.get_or_create(blocking)?;
        Ok(resilient)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Binding<T>>> {
        self.binding.lock().map_err(|_| Error::GeneralFailure("resilient endpoint lock poisoned".to_string()))
    }

    pub fn state(&self) -> Result<HandleState> {
        Ok(match &*self.lock()? {
            Binding::Unbound => HandleState::Unbound,
            Binding::Bound(_) => HandleState::Bound,
            Binding::Dead => HandleState::Dead,
        })
    }

    /// The bound endpoint, if any
    pub fn current(&self) -> Result<Option<Arc<T>>> {
        Ok(match &*self.lock()? {
            Binding::Bound(endpoint) => Some(endpoint.clone()),
            Binding::Unbound | Binding::Dead => None,
        })
    }

    // Called with the lock held: at most one factory call is in flight.
    fn rebind(&self, binding: &mut Binding<T>, blocking: bool) -> Result<Arc<T>> {
        match (self.factory)(blocking) {
            Ok(endpoint) => {
                *binding = Binding::Bound(endpoint.clone());
                Ok(endpoint)
            }
            Err(error) => {
                *binding = Binding::Unbound;
                Err(error)
            }
        }
    }

    pub fn get_or_create(&self, blocking: bool) -> Result<Arc<T>> {
        let mut binding = self.lock()?;
        if let Binding::Bound(endpoint) = &*binding {
            return Ok(endpoint.clone());
        }
        self.rebind(&mut binding, blocking)
    }

    /// Record that `failing` is unreachable; the next call recreates it
    pub fn mark_dead(&self, failing: &Arc<T>) -> Result<()> {
        let mut binding = self.lock()?;
        if let Binding::Bound(current) = &*binding {
            if same_endpoint(current, failing) {
                *binding = Binding::Dead;
            }
        }
        Ok(())
    }

    /// Replace `failing` with a fresh endpoint, unless another caller has
    /// already done so
    pub fn recover(&self, failing: &Arc<T>, blocking: bool) -> Result<Arc<T>> {
        let mut binding = self.lock()?;
        if let Binding::Bound(current) = &*binding {
            if !same_endpoint(current, failing) {
                return Ok(current.clone());
            }
        }
        warn!("recovering a dead remote endpoint");
        self.rebind(&mut binding, blocking)
    }

    /// Run `call` against the endpoint. A dead-object failure triggers one
    /// recovery and one retry; a retry that also finds the endpoint dead
    /// leaves the handle `Dead`.
    pub fn protect<R, F>(&self, blocking: bool, call: F) -> Result<R>
    where
        F: Fn(&T) -> Result<R>,
    {
        let endpoint = self.get_or_create(blocking)?;
        match call(&*endpoint) {
            Err(error) if error.is_dead_object() => {
                let recovered = self.recover(&endpoint, blocking)?;
                let result = call(&*recovered);
                if matches!(&result, Err(error) if error.is_dead_object()) {
                    self.mark_dead(&recovered)?;
                }
                result
            }
            result => result,
        }
    }
}

/// Prepared model that is re-prepared when its remote endpoint dies
pub struct ResilientPreparedModel {
    handle: Resilient<dyn PreparedModel>,
}

impl ResilientPreparedModel {
    pub fn create<F>(factory: F) -> Result<Arc<Self>>
    where
        F: Fn(bool) -> Result<SharedPreparedModel> + Send + Sync + 'static,
    {
        Ok(Arc::new(Self { handle: Resilient::create(Box::new(factory), true)? }))
    }

    pub fn handle(&self) -> &Resilient<dyn PreparedModel> {
        &self.handle
    }
}

impl PreparedModel for ResilientPreparedModel {
    fn execute(
        &self,
        request: &Request,
        measure: MeasureTiming,
        deadline: OptionalTimePoint,
        loop_timeout_duration: OptionalDuration,
    ) -> Result<(Vec<OutputShape>, Timing)> {
        self.handle.protect(true, |prepared| prepared.execute(request, measure, deadline, loop_timeout_duration))
    }

    fn execute_fenced(
        &self,
        request: &Request,
        wait_for: &[SyncFence],
        measure: MeasureTiming,
        deadline: OptionalTimePoint,
        loop_timeout_duration: OptionalDuration,
        timeout_duration_after_fence: OptionalDuration,
    ) -> Result<(SyncFence, ExecuteFencedInfoCallback)> {
        self.handle.protect(true, |prepared| {
            prepared.execute_fenced(
                request,
                wait_for,
                measure,
                deadline,
                loop_timeout_duration,
                timeout_duration_after_fence,
            )
        })
    }
}

/// Device that reconnects when its service dies. Metadata is taken from the
/// first device the factory produced.
pub struct ResilientDevice {
    handle: Arc<Resilient<dyn Device>>,
    name: String,
    version_string: String,
    feature_level: Version,
    device_type: DeviceType,
    extensions: Vec<Extension>,
    capabilities: Capabilities,
}

impl ResilientDevice {
    pub fn create<F>(factory: F) -> Result<Arc<Self>>
    where
        F: Fn(bool) -> Result<SharedDevice> + Send + Sync + 'static,
    {
        let handle: Arc<Resilient<dyn Device>> = Arc::new(Resilient::new(Box::new(factory)));
        let device = handle.get_or_create(true)?;
        Ok(Arc::new(Self {
            name: device.name().to_string(),
            version_string: device.version_string().to_string(),
            feature_level: device.feature_level(),
            device_type: device.device_type(),
            extensions: device.supported_extensions().to_vec(),
            capabilities: device.capabilities().clone(),
            handle,
        }))
    }

    pub fn handle(&self) -> &Resilient<dyn Device> {
        &self.handle
    }
}

impl Device for ResilientDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn version_string(&self) -> &str {
        &self.version_string
    }

    fn feature_level(&self) -> Version {
        self.feature_level
    }

    fn device_type(&self) -> DeviceType {
        self.device_type
    }

    fn supported_extensions(&self) -> &[Extension] {
        &self.extensions
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn get_supported_operations(&self, model: &Model) -> Result<Vec<bool>> {
        self.handle.protect(true, |device| device.get_supported_operations(model))
    }

    fn prepare_model(
        &self,
        model: &Model,
        preference: ExecutionPreference,
        priority: Priority,
        deadline: OptionalTimePoint,
    ) -> Result<SharedPreparedModel> {
        // The factory outlives `model`, so it keeps an owned copy with host
        // pointers already relocated
        let model = flatten_model(model)?.into_owned();
        let device = self.handle.clone();
        let factory = move |blocking: bool| {
            device.protect(blocking, |device| device.prepare_model(&model, preference, priority, deadline))
        };
        Ok(ResilientPreparedModel::create(factory)?)
    }
}

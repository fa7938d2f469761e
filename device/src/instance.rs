//! Graphics instance and backend configuration.
//!
//! The [`GraphicsInstance`] is the top-level entry point. It selects a
//! backend once, from [`InstanceParameters`], and creates devices on it.

use std::str::FromStr;
use std::sync::{Arc, RwLock, Weak};

use crate::backend::{self, GpuBackend};
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};

/// Environment variable selecting the backend (`auto`, `dummy`, `wgpu`).
pub const BACKEND_ENV: &str = "PRISM_BACKEND";

/// Environment variable selecting the wgpu native API
/// (`auto`, `vulkan`, `metal`, `dx12`, `gl`, `webgpu`).
pub const GPU_API_ENV: &str = "PRISM_GPU_API";

/// Which backend implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendType {
    /// wgpu when available, dummy otherwise.
    #[default]
    Auto,
    /// Headless dummy backend.
    Dummy,
    /// wgpu backend.
    Wgpu,
}

impl FromStr for BackendType {
    type Err = GraphicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "dummy" => Ok(Self::Dummy),
            "wgpu" => Ok(Self::Wgpu),
            other => Err(GraphicsError::InitializationFailed(format!(
                "unknown backend `{other}`"
            ))),
        }
    }
}

/// Native API used underneath the wgpu backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WgpuBackendType {
    /// Let wgpu pick the primary API for the platform.
    #[default]
    Auto,
    /// Vulkan.
    Vulkan,
    /// Metal.
    Metal,
    /// Direct3D 12.
    Dx12,
    /// OpenGL / GLES.
    Gl,
    /// The browser's WebGPU implementation.
    BrowserWebGpu,
}

impl WgpuBackendType {
    /// wgpu backend set to request.
    #[cfg(feature = "wgpu-backend")]
    pub fn to_wgpu_backends(self) -> wgpu::Backends {
        match self {
            Self::Auto => wgpu::Backends::PRIMARY,
            Self::Vulkan => wgpu::Backends::VULKAN,
            Self::Metal => wgpu::Backends::METAL,
            Self::Dx12 => wgpu::Backends::DX12,
            Self::Gl => wgpu::Backends::GL,
            Self::BrowserWebGpu => wgpu::Backends::BROWSER_WEBGPU,
        }
    }
}

impl FromStr for WgpuBackendType {
    type Err = GraphicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "vulkan" => Ok(Self::Vulkan),
            "metal" => Ok(Self::Metal),
            "dx12" => Ok(Self::Dx12),
            "gl" | "gles" => Ok(Self::Gl),
            "webgpu" => Ok(Self::BrowserWebGpu),
            other => Err(GraphicsError::InitializationFailed(format!(
                "unknown GPU API `{other}`"
            ))),
        }
    }
}

/// How a backend lays out binding groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindingModel {
    /// One native group per non-empty partition.
    #[default]
    Grouped,
    /// All partitions merged into a single table.
    Flat,
}

/// Parameters for creating a [`GraphicsInstance`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InstanceParameters {
    /// Backend implementation.
    pub backend: BackendType,
    /// Native API for the wgpu backend.
    pub wgpu_backend: WgpuBackendType,
    /// Binding model; only the dummy backend can emulate `Flat`.
    pub binding_model: BindingModel,
    /// Enable API validation layers.
    pub validation: bool,
    /// Enable debug labels and markers.
    pub debug: bool,
    /// Polls a dummy query readback stays in flight before its values
    /// arrive. Zero completes on the first poll.
    pub dummy_readback_polls: u32,
}

impl InstanceParameters {
    /// Default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `PRISM_BACKEND` and `PRISM_GPU_API`.
    ///
    /// Unrecognized values are logged and ignored.
    pub fn from_env() -> Self {
        let mut params = Self::new();
        if let Ok(value) = std::env::var(BACKEND_ENV) {
            match value.parse() {
                Ok(backend) => params.backend = backend,
                Err(e) => log::warn!("Ignoring {BACKEND_ENV}: {e}"),
            }
        }
        if let Ok(value) = std::env::var(GPU_API_ENV) {
            match value.parse() {
                Ok(api) => params.wgpu_backend = api,
                Err(e) => log::warn!("Ignoring {GPU_API_ENV}: {e}"),
            }
        }
        params
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: BackendType) -> Self {
        self.backend = backend;
        self
    }

    /// Set the wgpu native API.
    pub fn with_wgpu_backend(mut self, wgpu_backend: WgpuBackendType) -> Self {
        self.wgpu_backend = wgpu_backend;
        self
    }

    /// Set the binding model.
    pub fn with_binding_model(mut self, binding_model: BindingModel) -> Self {
        self.binding_model = binding_model;
        self
    }

    /// Enable or disable validation.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Enable or disable debug labels.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Delay dummy query readbacks by the given number of polls.
    pub fn with_dummy_readback_polls(mut self, polls: u32) -> Self {
        self.dummy_readback_polls = polls;
        self
    }
}

/// The graphics instance owns the backend and the devices created on it.
///
/// # Example
///
/// ```ignore
/// let instance = GraphicsInstance::with_parameters(InstanceParameters::from_env())?;
/// let device = instance.create_device()?;
/// ```
pub struct GraphicsInstance {
    /// Weak self-reference for creating devices.
    self_ref: RwLock<Weak<GraphicsInstance>>,
    /// Devices created by this instance.
    devices: RwLock<Vec<Arc<GraphicsDevice>>>,
    parameters: InstanceParameters,
    backend: Arc<dyn GpuBackend>,
}

impl GraphicsInstance {
    /// Create an instance with default parameters.
    pub fn new() -> GraphicsResult<Arc<Self>> {
        Self::with_parameters(InstanceParameters::default())
    }

    /// Create an instance with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested backend cannot be initialized.
    pub fn with_parameters(parameters: InstanceParameters) -> GraphicsResult<Arc<Self>> {
        log::info!("Creating GraphicsInstance ({:?})", parameters.backend);

        let backend = backend::create_backend(&parameters)?;
        log::info!("Using GPU backend: {}", backend.name());

        let instance = Arc::new(Self {
            self_ref: RwLock::new(Weak::new()),
            devices: RwLock::new(Vec::new()),
            parameters,
            backend,
        });

        if let Ok(mut self_ref) = instance.self_ref.write() {
            *self_ref = Arc::downgrade(&instance);
        }

        Ok(instance)
    }

    /// Get the GPU backend (internal use only).
    pub(crate) fn backend(&self) -> &Arc<dyn GpuBackend> {
        &self.backend
    }

    /// Name of the selected backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Binding model of the selected backend.
    pub fn binding_model(&self) -> BindingModel {
        self.backend.binding_model()
    }

    /// Parameters the instance was created with.
    pub fn parameters(&self) -> &InstanceParameters {
        &self.parameters
    }

    fn arc_self(&self) -> Option<Arc<GraphicsInstance>> {
        self.self_ref.read().ok().and_then(|r| r.upgrade())
    }

    /// Create a graphics device on the instance's backend.
    pub fn create_device(&self) -> GraphicsResult<Arc<GraphicsDevice>> {
        let instance = self.arc_self().ok_or_else(|| {
            GraphicsError::InitializationFailed("instance has been dropped".to_string())
        })?;
        log::info!("Creating device on {}", self.backend.name());
        let device = GraphicsDevice::new(instance);

        if let Ok(mut devices) = self.devices.write() {
            devices.push(device.clone());
        }

        Ok(device)
    }

    /// Get all devices created by this instance.
    pub fn devices(&self) -> Vec<Arc<GraphicsDevice>> {
        self.devices
            .read()
            .map(|d| d.clone())
            .unwrap_or_else(|_| Vec::new())
    }

    /// Get the number of devices created by this instance.
    pub fn device_count(&self) -> usize {
        self.devices.read().map(|d| d.len()).unwrap_or(0)
    }
}

impl std::fmt::Debug for GraphicsInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsInstance")
            .field("backend", &self.backend.name())
            .field("device_count", &self.device_count())
            .finish()
    }
}

// Ensure GraphicsInstance is Send + Sync
static_assertions::assert_impl_all!(GraphicsInstance: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_type() {
        assert_eq!("dummy".parse::<BackendType>().unwrap(), BackendType::Dummy);
        assert_eq!(" WGPU ".parse::<BackendType>().unwrap(), BackendType::Wgpu);
        assert!("vulkan-native".parse::<BackendType>().is_err());
    }

    #[test]
    fn test_parse_gpu_api() {
        assert_eq!(
            "webgpu".parse::<WgpuBackendType>().unwrap(),
            WgpuBackendType::BrowserWebGpu
        );
        assert_eq!("gles".parse::<WgpuBackendType>().unwrap(), WgpuBackendType::Gl);
        assert!("directx9".parse::<WgpuBackendType>().is_err());
    }

    #[test]
    fn test_parameters_builder() {
        let params = InstanceParameters::new()
            .with_backend(BackendType::Dummy)
            .with_wgpu_backend(WgpuBackendType::Vulkan)
            .with_binding_model(BindingModel::Flat)
            .with_validation(true);
        assert_eq!(params.backend, BackendType::Dummy);
        assert_eq!(params.wgpu_backend, WgpuBackendType::Vulkan);
        assert_eq!(params.binding_model, BindingModel::Flat);
        assert!(params.validation);
        assert!(!params.debug);
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_create_device() {
        let instance = GraphicsInstance::with_parameters(
            InstanceParameters::new()
                .with_backend(BackendType::Dummy)
                .with_binding_model(BindingModel::Flat),
        )
        .unwrap();
        assert_eq!(instance.backend_name(), "Dummy Backend");
        assert_eq!(instance.binding_model(), BindingModel::Flat);

        let device = instance.create_device().unwrap();
        assert_eq!(instance.device_count(), 1);
        assert!(Arc::ptr_eq(device.instance(), &instance));
    }
}

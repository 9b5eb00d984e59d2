//! GPU device acquisition.

use crate::config::EngineConfig;
use crate::error::{ContextError, EngineError};

/// Device, queue, and adapter description owned by one engine.
#[derive(Debug, Clone)]
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

impl GpuContext {
    /// Request an adapter and device for `config`. Blocks until ready.
    ///
    /// Any failure here is fatal for construction and maps to
    /// [`EngineError::ContextUnavailable`].
    pub fn create_blocking(config: &EngineConfig) -> Result<Self, EngineError> {
        pollster::block_on(Self::create(config))
    }

    pub async fn create(config: &EngineConfig) -> Result<Self, EngineError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: config.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                force_fallback_adapter: config.force_fallback_adapter,
                compatible_surface: None,
            })
            .await
            .map_err(ContextError::Adapter)?;

        let adapter_info = adapter.get_info();
        // Full adapter limits so large outputs can still be read back.
        let required_limits = adapter.limits();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("artifact_device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                ..Default::default()
            })
            .await
            .map_err(ContextError::Device)?;

        tracing::info!(
            "GPU context ready: {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.backend,
            adapter_info.device_type
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    /// Largest 2D texture edge the device accepts.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }
}

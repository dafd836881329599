//! # Vulkan Module
//!
//! Walks the standard initialization sequence against a winit window: instance, debug messenger,
//! surface, physical device, logical device, swapchain and image views. [`VulkanContext`] owns
//! every handle created along the way and destroys them in reverse order when dropped.

mod debug;
mod device;
mod error;
mod instance;
mod negotiate;
mod swapchain;

use std::{collections::HashSet, sync::Arc};

use log::{debug, info};
use vulkanalia::{
    loader::{LIBRARY, LibloadingLoader, LoaderError},
    prelude::v1_0::*,
    vk::KhrSurfaceExtension,
    window as vk_window,
};
use winit::window::Window as WinitWindow;

use crate::config::AppConfig;
use debug::{DebugMessenger, ValidationSink};
use device::{QueueFamilyIndices, Queues};
use swapchain::Swapchain;

pub use error::InitError;

/// Every Vulkan object the application creates.
pub struct VulkanContext {
    #[allow(dead_code)]
    entry: Entry,
    instance: Instance,
    sink: Arc<ValidationSink>,
    messenger: Option<DebugMessenger>,
    surface: vk::SurfaceKHR,
    device: Option<Device>,
    queues: Option<Queues>,
    swapchain: Option<Swapchain>,
}

impl VulkanContext {
    /// Runs the initialization sequence for `window`.
    ///
    /// Validation messages at or above the configured fatal severity fail the stage during which
    /// they were reported. Whatever was created before a failure is destroyed again.
    ///
    /// # Safety
    ///
    /// `window` must outlive the returned context, since the surface refers to it.
    ///
    /// # Errors
    ///
    /// Any [`InitError`] raised by a stage of the sequence.
    pub unsafe fn create(window: &WinitWindow, config: &AppConfig) -> Result<Self, InitError> {
        let loader =
            unsafe { LibloadingLoader::new(LIBRARY) }.map_err(Box::<dyn LoaderError>::from)?;
        let entry = unsafe { Entry::new(loader)? };

        unsafe { instance::log_available_extensions(&entry)? };

        let sink = Arc::new(ValidationSink::new(config.validation.fatal_severity));
        let instance = unsafe { instance::create_instance(window, &entry, config, &sink)? };

        let mut context = Self {
            entry,
            instance,
            sink,
            messenger: None,
            surface: vk::SurfaceKHR::null(),
            device: None,
            queues: None,
            swapchain: None,
        };

        // On error `context` drops here and tears down the stages that completed.
        unsafe { context.init(window, config)? };
        Ok(context)
    }

    unsafe fn init(&mut self, window: &WinitWindow, config: &AppConfig) -> Result<(), InitError> {
        self.sink.check()?;

        if config.validation.enabled {
            let messenger = unsafe { DebugMessenger::create(&self.instance, &self.sink)? };
            self.messenger = Some(messenger);
            self.sink.check()?;
        }

        self.surface = unsafe { vk_window::create_surface(&self.instance, window, window) }
            .map_err(InitError::Surface)?;
        self.sink.check()?;

        let (physical_device, indices) =
            unsafe { device::pick_physical_device(&self.instance, self.surface, config)? };
        self.sink.check()?;

        let (device, queues) = unsafe {
            device::create_logical_device(&self.instance, physical_device, indices, config)?
        };
        let device = self.device.insert(device);
        self.queues = Some(queues);
        self.sink.check()?;

        let swapchain = unsafe {
            Swapchain::create(
                &self.instance,
                device,
                physical_device,
                self.surface,
                indices,
                window,
            )?
        };
        self.swapchain = Some(swapchain);
        self.sink.check()?;

        self.log_ready(indices);
        Ok(())
    }

    fn log_ready(&self, indices: QueueFamilyIndices) {
        if let Some(swapchain) = &self.swapchain {
            let config = swapchain.config();
            info!(
                "Vulkan ready: {}x{} swapchain, {} images, {:?}, queue families {}/{}.",
                config.extent.width,
                config.extent.height,
                swapchain.image_views().len(),
                config.present_mode,
                indices.graphics,
                indices.present,
            );
        }
        if let Some(queues) = &self.queues {
            debug!(
                "Graphics queue: {:?}, present queue: {:?}.",
                queues.graphics, queues.present
            );
        }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        unsafe {
            if let Some(device) = &self.device {
                if let Some(swapchain) = &mut self.swapchain {
                    swapchain.destroy(device);
                }
                device.destroy_device(None);
            }

            if let Some(messenger) = &self.messenger {
                messenger.destroy(&self.instance);
            }

            if !self.surface.is_null() {
                self.instance.destroy_surface_khr(self.surface, None);
            }

            self.instance.destroy_instance(None);
        }

        info!("Destroyed Vulkan context.");
    }
}

/// Names from `requested` that are not in `available`.
fn missing_names(
    available: &HashSet<vk::ExtensionName>,
    requested: &[vk::ExtensionName],
) -> Vec<String> {
    requested
        .iter()
        .filter(|name| !available.contains(*name))
        .map(|name| name.to_string())
        .collect()
}

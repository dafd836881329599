//! # Device Module
//!
//! Finds a physical device that can render to and present on the surface, then creates the
//! logical device and retrieves its queues.

use std::collections::{BTreeSet, HashSet};

use log::{info, warn};
use thiserror::Error;
use vulkanalia::{
    prelude::v1_0::*,
    vk::{KhrSurfaceExtension, SurfaceKHR},
};

use super::{InitError, missing_names, swapchain::SwapchainSupport};
use crate::config::AppConfig;

/// Why a physical device was passed over.
#[derive(Debug, Error)]
pub enum SuitabilityError {
    #[error("missing required queue families")]
    MissingQueueFamilies,

    #[error("missing required device extensions: {0:?}")]
    MissingExtensions(Vec<String>),

    #[error("insufficient swapchain support")]
    InsufficientSwapchainSupport,

    #[error(transparent)]
    Vulkan(#[from] vk::ErrorCode),
}

/// Queue families used by the application.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Looks up the graphics and present families of `physical_device` for `surface`.
    pub unsafe fn get(
        instance: &Instance,
        surface: SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Option<Self>, vk::ErrorCode> {
        let properties =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        Self::resolve(&properties, |index| unsafe {
            instance.get_physical_device_surface_support_khr(physical_device, index, surface)
        })
    }

    /// Scans families in order. A later family that supports graphics or presentation replaces the
    /// earlier match, and the scan stops as soon as both are known.
    pub fn resolve<F>(
        properties: &[vk::QueueFamilyProperties],
        mut supports_present: F,
    ) -> Result<Option<Self>, vk::ErrorCode>
    where
        F: FnMut(u32) -> Result<bool, vk::ErrorCode>,
    {
        let mut graphics = None;
        let mut present = None;

        for (index, family) in (0u32..).zip(properties) {
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics = Some(index);
            }

            if supports_present(index)? {
                present = Some(index);
            }

            if let (Some(graphics), Some(present)) = (graphics, present) {
                return Ok(Some(Self { graphics, present }));
            }
        }

        Ok(None)
    }

    /// Distinct family indices, one queue is created per entry.
    pub fn unique(&self) -> BTreeSet<u32> {
        BTreeSet::from([self.graphics, self.present])
    }

    /// Whether graphics and presentation share one family.
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// Queue handles retrieved from the logical device.
#[derive(Copy, Clone, Debug)]
pub struct Queues {
    pub graphics: vk::Queue,
    pub present: vk::Queue,
}

/// Picks the first physical device that can render to and present on `surface`.
///
/// # Errors
///
/// - [`InitError::Query`]
/// - [`InitError::NoVulkanDevice`]
/// - [`InitError::NoSuitableDevice`]
pub unsafe fn pick_physical_device(
    instance: &Instance,
    surface: SurfaceKHR,
    config: &AppConfig,
) -> Result<(vk::PhysicalDevice, QueueFamilyIndices), InitError> {
    let physical_devices = unsafe { instance.enumerate_physical_devices() }
        .map_err(InitError::query("physical devices"))?;

    if physical_devices.is_empty() {
        return Err(InitError::NoVulkanDevice);
    }

    for physical_device in physical_devices {
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };

        match unsafe { check_physical_device(instance, surface, physical_device, config) } {
            Ok(indices) => {
                info!("Selected physical device (`{}`).", properties.device_name);
                return Ok((physical_device, indices));
            }
            Err(error) => warn!(
                "Skipping physical device (`{}`): {}",
                properties.device_name, error
            ),
        }
    }

    Err(InitError::NoSuitableDevice)
}

unsafe fn check_physical_device(
    instance: &Instance,
    surface: SurfaceKHR,
    physical_device: vk::PhysicalDevice,
    config: &AppConfig,
) -> Result<QueueFamilyIndices, SuitabilityError> {
    let indices = unsafe { QueueFamilyIndices::get(instance, surface, physical_device) }?
        .ok_or(SuitabilityError::MissingQueueFamilies)?;

    let available = unsafe { device_extensions(instance, physical_device) }?;
    let missing = missing_names(&available, &config.device_extensions);
    if !missing.is_empty() {
        return Err(SuitabilityError::MissingExtensions(missing));
    }

    let support = unsafe { SwapchainSupport::query(instance, surface, physical_device) }?;
    if !support.is_adequate() {
        return Err(SuitabilityError::InsufficientSwapchainSupport);
    }

    Ok(indices)
}

unsafe fn device_extensions(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
) -> Result<HashSet<vk::ExtensionName>, vk::ErrorCode> {
    Ok(
        unsafe { instance.enumerate_device_extension_properties(physical_device, None) }?
            .iter()
            .map(|e| e.extension_name)
            .collect(),
    )
}

/// Creates the logical device with one queue per distinct family and fetches the queues.
///
/// # Errors
///
/// - [`InitError::Query`]
/// - [`InitError::LogicalDevice`]
pub unsafe fn create_logical_device(
    instance: &Instance,
    physical_device: vk::PhysicalDevice,
    indices: QueueFamilyIndices,
    config: &AppConfig,
) -> Result<(Device, Queues), InitError> {
    let queue_priorities = &[1.0];
    let queue_infos = indices
        .unique()
        .into_iter()
        .map(|i| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(i)
                .queue_priorities(queue_priorities)
        })
        .collect::<Vec<_>>();

    // Device layers are deprecated, older loaders still honour them.
    let layers = config
        .validation
        .enabled_layers()
        .iter()
        .map(|l| l.as_ptr())
        .collect::<Vec<_>>();

    let mut extensions = config
        .device_extensions
        .iter()
        .map(|e| e.as_ptr())
        .collect::<Vec<_>>();

    // Portability implementations must have the subset extension enabled.
    if cfg!(target_os = "macos") {
        let available = unsafe { device_extensions(instance, physical_device) }
            .map_err(InitError::query("device extensions"))?;
        if available.contains(&vk::KHR_PORTABILITY_SUBSET_EXTENSION.name) {
            extensions.push(vk::KHR_PORTABILITY_SUBSET_EXTENSION.name.as_ptr());
        }
    }

    let features = vk::PhysicalDeviceFeatures::builder();

    let info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extensions)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(physical_device, &info, None) }
        .map_err(InitError::LogicalDevice)?;

    let queues = unsafe {
        Queues {
            graphics: device.get_device_queue(indices.graphics, 0),
            present: device.get_device_queue(indices.present, 0),
        }
    };

    Ok((device, queues))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn single_family_serves_both() {
        let properties = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let indices = QueueFamilyIndices::resolve(&properties, |_| Ok(true)).unwrap();

        assert_eq!(
            indices,
            Some(QueueFamilyIndices {
                graphics: 0,
                present: 0
            })
        );
        assert!(indices.unwrap().is_shared());
    }

    #[test]
    fn later_family_supporting_both_replaces_graphics_only_match() {
        let properties = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER),
        ];
        let indices = QueueFamilyIndices::resolve(&properties, |i| Ok(i == 1)).unwrap();

        assert_eq!(
            indices,
            Some(QueueFamilyIndices {
                graphics: 1,
                present: 1
            })
        );
    }

    #[test]
    fn split_families() {
        let properties = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
        ];
        let indices = QueueFamilyIndices::resolve(&properties, |i| Ok(i == 1))
            .unwrap()
            .unwrap();

        assert_eq!((indices.graphics, indices.present), (0, 1));
        assert!(!indices.is_shared());
        assert_eq!(indices.unique().into_iter().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn missing_present_support_is_incomplete() {
        let properties = [family(vk::QueueFlags::GRAPHICS)];
        assert_eq!(
            QueueFamilyIndices::resolve(&properties, |_| Ok(false)).unwrap(),
            None
        );
    }

    #[test]
    fn surface_query_errors_propagate() {
        let properties = [family(vk::QueueFlags::GRAPHICS)];
        let result =
            QueueFamilyIndices::resolve(&properties, |_| Err(vk::ErrorCode::SURFACE_LOST_KHR));
        assert_eq!(result, Err(vk::ErrorCode::SURFACE_LOST_KHR));
    }

    #[test]
    fn shared_family_creates_one_queue() {
        let indices = QueueFamilyIndices {
            graphics: 2,
            present: 2,
        };
        assert_eq!(indices.unique().len(), 1);
    }
}

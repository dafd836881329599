//! # Config Module
//!
//! Static configuration for the application: the window that gets opened, which validation
//! layers are requested and which device extensions a GPU must support. Everything here is built
//! once in `main` and handed down explicitly; nothing reads process-wide tables.

use vulkanalia::vk;

/// Layer name used by the Khronos validation layer shipped with the Vulkan SDK.
pub const KHRONOS_VALIDATION_LAYER: vk::ExtensionName =
    vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");

/// Top level configuration consumed by the window and the Vulkan initialization sequence.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub validation: ValidationConfig,
    pub application: ApplicationInfo,

    /// Extensions every candidate physical device must expose.
    pub device_extensions: Vec<vk::ExtensionName>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            validation: ValidationConfig::default(),
            application: ApplicationInfo::default(),
            device_extensions: vec![vk::KHR_SWAPCHAIN_EXTENSION.name],
        }
    }
}

#[derive(Clone, Debug)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan window".to_owned(),
            width: 800,
            height: 600,
            // The swapchain is never recreated, so the surface size must stay fixed.
            resizable: false,
        }
    }
}

/// Validation layer settings.
#[derive(Clone, Debug)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub layers: Vec<vk::ExtensionName>,

    /// Messages at or above this severity abort initialization once the current stage returns.
    pub fatal_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: cfg!(debug_assertions),
            layers: vec![KHRONOS_VALIDATION_LAYER],
            fatal_severity: vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
        }
    }
}

impl ValidationConfig {
    /// Layers to enable on the instance and device, empty when validation is off.
    pub fn enabled_layers(&self) -> &[vk::ExtensionName] {
        if self.enabled { &self.layers } else { &[] }
    }
}

/// Data reported to the driver through `VkApplicationInfo`.
#[derive(Clone, Debug)]
pub struct ApplicationInfo {
    pub name: &'static [u8],
    pub version: u32,
    pub engine_name: &'static [u8],
    pub engine_version: u32,
    pub api_version: u32,
}

impl Default for ApplicationInfo {
    fn default() -> Self {
        Self {
            name: b"Triangle\0",
            version: vk::make_version(0, 1, 0),
            engine_name: b"No Engine\0",
            engine_version: vk::make_version(0, 1, 0),
            api_version: vk::make_version(1, 0, 0),
        }
    }
}

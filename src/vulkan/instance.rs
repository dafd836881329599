//! # Instance Module
//!
//! Creates the Vulkan instance with the extensions the window needs, plus the validation layers
//! and debug utilities when validation is enabled.

use std::{collections::HashSet, sync::Arc};

use log::{debug, info};
use vulkanalia::{Version, prelude::v1_0::*, window as vk_window};
use winit::window::Window as WinitWindow;

use super::{InitError, debug::ValidationSink, missing_names};
use crate::config::AppConfig;

/// Loader version from which macOS needs the portability enumeration extension.
const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);

/// Creates the instance with the windowing extensions, plus debug utils and the validation layers
/// when validation is enabled.
///
/// When validation is on, a messenger create info is chained so that problems inside
/// `vkCreateInstance` itself also land in `sink`.
///
/// # Errors
///
/// - [`InitError::MissingLayers`]
/// - [`InitError::Query`]
/// - [`InitError::Instance`]
pub unsafe fn create_instance(
    window: &WinitWindow,
    entry: &Entry,
    config: &AppConfig,
    sink: &Arc<ValidationSink>,
) -> Result<Instance, InitError> {
    let validation = &config.validation;
    if validation.enabled {
        unsafe { check_validation_layer_support(entry, &validation.layers)? };
    }

    let app = &config.application;
    let application_info = vk::ApplicationInfo::builder()
        .application_name(app.name)
        .application_version(app.version)
        .engine_name(app.engine_name)
        .engine_version(app.engine_version)
        .api_version(app.api_version);

    let portability = cfg!(target_os = "macos")
        && entry.version().map_err(InitError::query("loader version"))?
            >= PORTABILITY_MACOS_VERSION;
    if portability {
        info!("Enabling extensions for macOS portability.");
    }

    let extensions = required_extensions(
        vk_window::get_required_instance_extensions(window),
        validation.enabled,
        portability,
    );
    let extension_ptrs = extensions.iter().map(|e| e.as_ptr()).collect::<Vec<_>>();

    let layers = validation
        .enabled_layers()
        .iter()
        .map(|l| l.as_ptr())
        .collect::<Vec<_>>();

    let flags = if portability {
        vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
    } else {
        vk::InstanceCreateFlags::empty()
    };

    let mut info = vk::InstanceCreateInfo::builder()
        .application_info(&application_info)
        .enabled_layer_names(&layers)
        .enabled_extension_names(&extension_ptrs)
        .flags(flags);

    let mut debug_info = super::debug::messenger_info(sink);
    if validation.enabled {
        info = info.push_next(&mut debug_info);
    }

    let instance = unsafe { entry.create_instance(&info, None) }.map_err(InitError::Instance)?;
    debug!("Created instance with extensions {extensions:?}.");

    Ok(instance)
}

/// Instance extensions to enable: the windowing ones, debug utils for validation and the
/// portability pair on macOS.
pub fn required_extensions(
    window_extensions: &[&vk::ExtensionName],
    validation: bool,
    portability: bool,
) -> Vec<vk::ExtensionName> {
    let mut extensions = window_extensions.iter().map(|e| **e).collect::<Vec<_>>();

    if validation {
        extensions.push(vk::EXT_DEBUG_UTILS_EXTENSION.name);
    }

    if portability {
        extensions.push(vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION.name);
        extensions.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name);
    }

    extensions
}

/// # Errors
///
/// - [`InitError::Query`]
/// - [`InitError::MissingLayers`]
unsafe fn check_validation_layer_support(
    entry: &Entry,
    requested: &[vk::ExtensionName],
) -> Result<(), InitError> {
    let available = unsafe { entry.enumerate_instance_layer_properties() }
        .map_err(InitError::query("instance layers"))?
        .iter()
        .map(|l| l.layer_name)
        .collect::<HashSet<_>>();

    let missing = missing_names(&available, requested);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(InitError::MissingLayers(missing))
    }
}

/// Logs every instance extension the loader reports.
///
/// # Errors
///
/// - [`InitError::Query`]
pub unsafe fn log_available_extensions(entry: &Entry) -> Result<(), InitError> {
    let extensions = unsafe { entry.enumerate_instance_extension_properties(None) }
        .map_err(InitError::query("instance extensions"))?;

    debug!("Available instance extensions:");
    for extension in &extensions {
        debug!("\t{}", extension.extension_name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SURFACE: vk::ExtensionName = vk::KHR_SURFACE_EXTENSION.name;

    #[test]
    fn window_extensions_only_without_validation() {
        let extensions = required_extensions(&[&SURFACE], false, false);
        assert_eq!(extensions, vec![SURFACE]);
    }

    #[test]
    fn validation_adds_debug_utils() {
        let extensions = required_extensions(&[&SURFACE], true, false);
        assert_eq!(extensions, vec![SURFACE, vk::EXT_DEBUG_UTILS_EXTENSION.name]);
    }

    #[test]
    fn portability_adds_enumeration_extensions() {
        let extensions = required_extensions(&[], false, true);
        assert!(extensions.contains(&vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name));
        assert!(extensions.contains(&vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION.name));
    }
}

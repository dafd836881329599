//! # Error Module
//!
//! The error type returned by the Vulkan initialization sequence.

use std::{error::Error as StdError, fmt};

use thiserror::Error;
use vulkanalia::{loader::LoaderError, vk};

use crate::window::WindowError;

/// Failures raised while walking the Vulkan initialization sequence.
///
/// Every native call that reports a non-success code is mapped onto the stage it belongs to, so
/// the diagnostic printed on exit names the step that broke.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum InitError {
    /// The Vulkan loader library could not be opened or its entry points resolved.
    #[error("failed to load the Vulkan library")]
    Loader(#[source] LoaderFailure),

    /// Validation was requested but the loader does not expose every requested layer.
    #[error("validation layers requested, but not available: {0:?}")]
    MissingLayers(Vec<String>),

    #[error("failed to create instance")]
    Instance(#[source] vk::ErrorCode),

    #[error("failed to set up debug messenger")]
    DebugMessenger(#[source] vk::ErrorCode),

    #[error("failed to create window surface")]
    Surface(#[source] vk::ErrorCode),

    /// A query against the instance or a physical device failed.
    #[error("failed to query {what}")]
    Query {
        what: &'static str,
        #[source]
        source: vk::ErrorCode,
    },

    #[error("failed to find GPUs with Vulkan support")]
    NoVulkanDevice,

    #[error("failed to find a suitable GPU")]
    NoSuitableDevice,

    #[error("failed to create logical device")]
    LogicalDevice(#[source] vk::ErrorCode),

    #[error("failed to create swap chain")]
    Swapchain(#[source] vk::ErrorCode),

    #[error("failed to create image views")]
    ImageView(#[source] vk::ErrorCode),

    /// The validation layer reported a message at or above the configured fatal severity.
    #[error("validation layer error: {0}")]
    Validation(String),

    #[error(transparent)]
    Window(#[from] WindowError),
}

impl From<Box<dyn LoaderError>> for InitError {
    fn from(error: Box<dyn LoaderError>) -> Self {
        Self::Loader(LoaderFailure(error))
    }
}

impl InitError {
    pub(crate) fn query(what: &'static str) -> impl FnOnce(vk::ErrorCode) -> Self {
        move |source| Self::Query { what, source }
    }
}

/// The loader's own error, kept as the source of [`InitError::Loader`].
#[derive(Debug)]
pub struct LoaderFailure(Box<dyn LoaderError>);

impl fmt::Display for LoaderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for LoaderFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_failure_is_kept_as_source() {
        let error = InitError::from(Box::<dyn LoaderError>::from("libvulkan.so.1: not found"));

        assert!(matches!(error, InitError::Loader(_)));
        assert_eq!(error.to_string(), "failed to load the Vulkan library");

        let source = error.source().map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("libvulkan.so.1: not found"));
    }
}

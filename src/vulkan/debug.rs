//! # Debug Module
//!
//! Validation layer plumbing. The messenger callback is invoked by the driver from inside native calls, so it must never
//! unwind. It logs every message and records the first one at or above the fatal severity in a
//! [`ValidationSink`]; the initialization sequence checks the sink after each stage returns.

use std::{
    ffi::{CStr, c_void},
    sync::{Arc, OnceLock},
};

use log::Level;
use vulkanalia::{prelude::v1_0::*, vk::ExtDebugUtilsExtension};

use super::InitError;

/// Collects validation messages that should abort initialization.
#[derive(Debug)]
pub struct ValidationSink {
    fatal_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    first_fatal: OnceLock<String>,
}

impl ValidationSink {
    /// An empty sink that treats messages at or above `fatal_severity` as fatal.
    pub fn new(fatal_severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Self {
        Self {
            fatal_severity,
            first_fatal: OnceLock::new(),
        }
    }

    /// Records `message` if `severity` reaches the fatal threshold.
    pub fn record(&self, severity: vk::DebugUtilsMessageSeverityFlagsEXT, message: &str) {
        if severity >= self.fatal_severity {
            // Later messages are usually fallout from the first one.
            let _ = self.first_fatal.set(message.to_owned());
        }
    }

    /// Fails with the first recorded fatal message, if any.
    ///
    /// # Errors
    ///
    /// - [`InitError::Validation`]
    pub fn check(&self) -> Result<(), InitError> {
        match self.first_fatal.get() {
            Some(message) => Err(InitError::Validation(message.clone())),
            None => Ok(()),
        }
    }
}

/// Maps a single message severity bit onto a log level.
pub fn log_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> Level {
    if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        Level::Error
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        Level::Warn
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        Level::Debug
    } else {
        Level::Trace
    }
}

extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    type_: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    user_data: *mut c_void,
) -> vk::Bool32 {
    // SAFETY: the driver passes a valid callback data pointer with a NUL-terminated message.
    let message = unsafe { CStr::from_ptr((*data).message) }.to_string_lossy();
    log::log!(log_level(severity), "validation layer ({type_:?}): {message}");

    // SAFETY: `user_data` is the `Arc<ValidationSink>` pointer installed by `messenger_info`, and
    // the context keeps that Arc alive until after the instance is destroyed.
    if let Some(sink) = unsafe { user_data.cast::<ValidationSink>().as_ref() } {
        sink.record(severity, &message);
    }

    vk::FALSE
}

/// Messenger create info reporting every severity and message type into `sink`.
///
/// The returned struct holds a raw pointer to `sink`; it must not outlive it.
pub fn messenger_info(sink: &Arc<ValidationSink>) -> vk::DebugUtilsMessengerCreateInfoEXT {
    let mut info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .user_callback(Some(debug_callback))
        .build();
    info.user_data = Arc::as_ptr(sink).cast_mut().cast();
    info
}

/// A debug messenger writing into a [`ValidationSink`] owned by the caller.
#[derive(Debug)]
pub struct DebugMessenger {
    handle: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// # Errors
    ///
    /// - [`InitError::DebugMessenger`]
    pub unsafe fn create(
        instance: &Instance,
        sink: &Arc<ValidationSink>,
    ) -> Result<Self, InitError> {
        let info = messenger_info(sink);
        let handle = unsafe { instance.create_debug_utils_messenger_ext(&info, None) }
            .map_err(InitError::DebugMessenger)?;

        log::debug!("Created debug messenger.");
        Ok(Self { handle })
    }

    /// Unregisters the callback. Must run before the instance is destroyed.
    pub unsafe fn destroy(&self, instance: &Instance) {
        unsafe { instance.destroy_debug_utils_messenger_ext(self.handle, None) };
    }
}

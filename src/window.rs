//! # Window Module
//!
//! The `window` module uses [`winit`] to create the application window and poll events from the
//! user and OS. Once the window exists it brings up the [`VulkanContext`] for it; a failure there
//! is kept so `main` can report it after the event loop stops.

use log::{error, info};
use thiserror::Error;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    error::OsError,
    event::WindowEvent,
    event_loop::ActiveEventLoop,
    window::{Window as WinitWindow, WindowId},
};

use crate::{
    config::AppConfig,
    vulkan::{InitError, VulkanContext},
};

/// Custom error types for winit.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WindowError {
    /// The platform refused to create the window.
    #[error("failed to create window")]
    Create(#[from] OsError),
}

pub struct Window {
    config: AppConfig,

    /// Declared before `inner` so the surface is destroyed before the window it points at.
    vulkan: Option<VulkanContext>,

    /// The winit window object
    inner: Option<WinitWindow>,

    /// First initialization failure, reported once the event loop returns.
    error: Option<InitError>,
}

impl Window {
    /// Creates the handler; the window itself is only opened once the event loop resumes.
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            vulkan: None,
            inner: None,
            error: None,
        }
    }

    /// Consumes the window, returning the initialization error if startup failed.
    ///
    /// # Errors
    ///
    /// - [`InitError`] recorded while the window or the Vulkan context was being created.
    pub fn finish(mut self) -> Result<(), InitError> {
        self.vulkan.take();
        match self.error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), InitError> {
        let config = &self.config.window;
        let attributes = WinitWindow::default_attributes()
            .with_title(config.title.as_str())
            .with_inner_size(LogicalSize::new(config.width, config.height))
            .with_resizable(config.resizable);

        let window = event_loop
            .create_window(attributes)
            .map_err(WindowError::from)?;
        let window = self.inner.insert(window);

        // SAFETY: `vulkan` is declared before `inner` and both are only ever cleared together, so
        // the context never outlives the window.
        let vulkan = unsafe { VulkanContext::create(window, &self.config)? };
        self.vulkan = Some(vulkan);

        Ok(())
    }
}

impl ApplicationHandler for Window {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.inner.is_some() || self.error.is_some() {
            return;
        }

        if let Err(e) = self.init(event_loop) {
            error!("Initialization failed: {e}");
            self.vulkan = None;
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("The close button was pressed; stopping");
                self.vulkan = None;
                event_loop.exit();
            }
            _ => (),
        }
    }
}

//! # Vulkan Window
//!
//! This binary uses [`winit`] for cross-platform window management, and [`vulkanalia`] for FFI
//! to the Vulkan API. It opens a window, walks the Vulkan initialization sequence up to the
//! swapchain image views and then polls window events until the window is closed.

mod config;
mod vulkan;
mod window;

use anyhow::{Context, Result};
use config::AppConfig;
use window::Window;
use winit::event_loop::{ControlFlow, EventLoop};

fn main() -> Result<()> {
    pretty_env_logger::init();

    let mut window = Window::new(AppConfig::default());
    let event_loop = EventLoop::new()?;

    event_loop.set_control_flow(ControlFlow::Poll);
    event_loop.run_app(&mut window)?;

    window.finish().context("failed to start the application")
}

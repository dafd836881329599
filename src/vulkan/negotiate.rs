//! # Negotiate Module
//!
//! Swapchain configuration negotiation. Given what a physical device reports for a surface, pick the concrete format, present mode,
//! extent and image count to request. Pure functions of their inputs; no Vulkan calls are made
//! here, which keeps the policy testable without a GPU.

use vulkanalia::vk;
use winit::{dpi::PhysicalSize, window::Window as WinitWindow};

/// Sentinel the surface reports in `current_extent` when the application picks the size.
pub const UNDEFINED_EXTENT: u32 = u32::MAX;

/// Source of the window's framebuffer size in pixels.
pub trait FramebufferSize {
    fn framebuffer_size(&self) -> vk::Extent2D;
}

impl FramebufferSize for WinitWindow {
    /// The inner size of a winit window is already in physical pixels, which is what the swapchain
    /// needs on high-DPI displays.
    fn framebuffer_size(&self) -> vk::Extent2D {
        let PhysicalSize { width, height } = self.inner_size();
        vk::Extent2D { width, height }
    }
}

impl FramebufferSize for vk::Extent2D {
    fn framebuffer_size(&self) -> vk::Extent2D {
        *self
    }
}

/// The negotiated swapchain parameters, consumed once by swapchain creation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

impl SwapchainConfig {
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }

    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.surface_format.color_space
    }
}

/// Runs every selection and packages the result.
///
/// `formats` must not be empty; device selection rejects devices without any surface format.
pub fn negotiate(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    formats: &[vk::SurfaceFormatKHR],
    present_modes: &[vk::PresentModeKHR],
    framebuffer: &(impl FramebufferSize + ?Sized),
) -> SwapchainConfig {
    SwapchainConfig {
        surface_format: select_format(formats),
        present_mode: select_present_mode(present_modes),
        extent: select_extent(capabilities, framebuffer),
        image_count: select_image_count(capabilities),
    }
}

/// Prefers 8-bit BGRA in the nonlinear sRGB color space, otherwise the first format offered.
pub fn select_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or_else(|| formats[0])
}

/// Mailbox when available (low latency without tearing), FIFO otherwise since every device must
/// support it.
pub fn select_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|m| *m == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Uses the surface's fixed extent when it has one, else clamps the framebuffer size into the
/// supported range axis by axis.
pub fn select_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer: &(impl FramebufferSize + ?Sized),
) -> vk::Extent2D {
    if capabilities.current_extent.width != UNDEFINED_EXTENT {
        return capabilities.current_extent;
    }

    let size = framebuffer.framebuffer_size();
    let (min, max) = (capabilities.min_image_extent, capabilities.max_image_extent);
    // Not `u32::clamp`: that panics if a driver ever reports min > max.
    let clamp = |value: u32, min: u32, max: u32| value.min(max).max(min);
    vk::Extent2D {
        width: clamp(size.width, min.width, max.width),
        height: clamp(size.height, min.height, max.height),
    }
}

/// One image more than the minimum, bounded by the maximum unless it is 0 (unbounded).
pub fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let count = capabilities.min_image_count.saturating_add(1);
    match capabilities.max_image_count {
        0 => count,
        max => count.min(max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    fn preferred() -> vk::SurfaceFormatKHR {
        format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR)
    }

    fn capabilities(min_images: u32, max_images: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_images,
            max_image_count: max_images,
            current_extent: vk::Extent2D {
                width: UNDEFINED_EXTENT,
                height: UNDEFINED_EXTENT,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        }
    }

    #[test]
    fn preferred_format_wins_in_any_position() {
        let others = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        ];

        for position in 0..=others.len() {
            let mut formats = others.to_vec();
            formats.insert(position, preferred());
            assert_eq!(select_format(&formats), preferred(), "position {position}");
        }
    }

    #[test]
    fn first_format_is_the_fallback() {
        let formats = [
            format(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(select_format(&formats), formats[0]);
    }

    #[test]
    fn mailbox_is_preferred() {
        let modes = [
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
        ];
        assert_eq!(select_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn fifo_without_mailbox() {
        let modes = [vk::PresentModeKHR::IMMEDIATE, vk::PresentModeKHR::FIFO_RELAXED];
        assert_eq!(select_present_mode(&modes), vk::PresentModeKHR::FIFO);
        assert_eq!(select_present_mode(&[vk::PresentModeKHR::FIFO]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn fixed_surface_extent_is_returned_unchanged() {
        let mut caps = capabilities(2, 0);
        caps.current_extent = vk::Extent2D {
            width: 640,
            height: 480,
        };
        // Even when outside the reported bounds or unlike the framebuffer.
        caps.max_image_extent = vk::Extent2D {
            width: 320,
            height: 240,
        };
        let framebuffer = vk::Extent2D {
            width: 1920,
            height: 1080,
        };
        assert_eq!(select_extent(&caps, &framebuffer), caps.current_extent);
    }

    #[test]
    fn undefined_extent_clamps_framebuffer_per_axis() {
        let mut caps = capabilities(2, 0);
        caps.max_image_extent = vk::Extent2D {
            width: 1024,
            height: 1024,
        };
        let framebuffer = vk::Extent2D {
            width: 1920,
            height: 1080,
        };
        assert_eq!(
            select_extent(&caps, &framebuffer),
            vk::Extent2D {
                width: 1024,
                height: 1024
            }
        );

        caps.min_image_extent = vk::Extent2D {
            width: 100,
            height: 50,
        };
        let framebuffer = vk::Extent2D {
            width: 0,
            height: 600,
        };
        assert_eq!(
            select_extent(&caps, &framebuffer),
            vk::Extent2D {
                width: 100,
                height: 600
            }
        );
    }

    #[test]
    fn only_the_width_marks_an_undefined_extent() {
        let mut caps = capabilities(2, 0);
        caps.current_extent = vk::Extent2D {
            width: 640,
            height: UNDEFINED_EXTENT,
        };
        let framebuffer = vk::Extent2D {
            width: 800,
            height: 600,
        };
        assert_eq!(select_extent(&caps, &framebuffer), caps.current_extent);
    }

    #[test]
    fn inverted_extent_bounds_settle_on_the_minimum() {
        let mut caps = capabilities(2, 0);
        caps.min_image_extent = vk::Extent2D {
            width: 800,
            height: 600,
        };
        caps.max_image_extent = vk::Extent2D {
            width: 400,
            height: 300,
        };
        let framebuffer = vk::Extent2D {
            width: 1920,
            height: 1080,
        };
        assert_eq!(
            select_extent(&caps, &framebuffer),
            vk::Extent2D {
                width: 800,
                height: 600
            }
        );
    }

    #[test]
    fn image_count_is_min_plus_one_bounded_by_max() {
        assert_eq!(select_image_count(&capabilities(2, 0)), 3);
        assert_eq!(select_image_count(&capabilities(3, 3)), 3);
        assert_eq!(select_image_count(&capabilities(2, 8)), 3);
        assert_eq!(select_image_count(&capabilities(1, 2)), 2);
    }

    #[test]
    fn image_count_saturates_at_the_largest_minimum() {
        assert_eq!(select_image_count(&capabilities(u32::MAX, 0)), u32::MAX);
        assert_eq!(
            select_image_count(&capabilities(u32::MAX, u32::MAX)),
            u32::MAX
        );
    }

    #[test]
    fn negotiate_packages_every_selection() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            preferred(),
        ];
        let framebuffer = vk::Extent2D {
            width: 800,
            height: 600,
        };

        let config = negotiate(
            &capabilities(2, 0),
            &formats,
            &[vk::PresentModeKHR::FIFO],
            &framebuffer,
        );

        assert_eq!(
            config,
            SwapchainConfig {
                surface_format: preferred(),
                present_mode: vk::PresentModeKHR::FIFO,
                extent: framebuffer,
                image_count: 3,
            }
        );
        assert_eq!(config.format(), vk::Format::B8G8R8A8_SRGB);
        assert_eq!(config.color_space(), vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }
}

//! # Swapchain Module
//!
//! Queries what a surface supports, creates the swapchain from a negotiated [`SwapchainConfig`]
//! and builds one color image view per swapchain image.

use log::debug;
use vulkanalia::{
    prelude::v1_0::*,
    vk::{KhrSurfaceExtension, KhrSwapchainExtension},
};

use super::{
    InitError,
    device::QueueFamilyIndices,
    negotiate::{self, FramebufferSize, SwapchainConfig},
};

/// What a physical device reports for presenting to a surface.
#[derive(Clone, Debug)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// Reads the surface capabilities, formats and present modes of `physical_device`.
    ///
    /// # Errors
    ///
    /// - [`vk::ErrorCode`] from any of the three surface queries.
    pub unsafe fn query(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self, vk::ErrorCode> {
        unsafe {
            Ok(Self {
                capabilities: instance
                    .get_physical_device_surface_capabilities_khr(physical_device, surface)?,
                formats: instance
                    .get_physical_device_surface_formats_khr(physical_device, surface)?,
                present_modes: instance
                    .get_physical_device_surface_present_modes_khr(physical_device, surface)?,
            })
        }
    }

    /// At least one format and one present mode, the precondition for negotiation.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }

    /// Picks the swapchain configuration for this support and the given framebuffer.
    pub fn negotiate(&self, framebuffer: &(impl FramebufferSize + ?Sized)) -> SwapchainConfig {
        negotiate::negotiate(
            &self.capabilities,
            &self.formats,
            &self.present_modes,
            framebuffer,
        )
    }
}

/// The swapchain, its images and one color view per image.
#[derive(Debug)]
pub struct Swapchain {
    handle: vk::SwapchainKHR,
    config: SwapchainConfig,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
}

impl Swapchain {
    /// Negotiates a configuration for `surface` and creates the swapchain and its image views.
    ///
    /// # Errors
    ///
    /// - [`InitError::Query`]
    /// - [`InitError::Swapchain`]
    /// - [`InitError::ImageView`]
    pub unsafe fn create(
        instance: &Instance,
        device: &Device,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        indices: QueueFamilyIndices,
        framebuffer: &(impl FramebufferSize + ?Sized),
    ) -> Result<Self, InitError> {
        let support = unsafe { SwapchainSupport::query(instance, surface, physical_device) }
            .map_err(InitError::query("swapchain support"))?;
        let config = support.negotiate(framebuffer);

        debug!(
            "Creating swapchain.\n\tFormat: {:?}\n\tColorSpace: {:?}\n\tPresentMode: {:?}\n\tExtent: \
             {}x{}\n\tImageCount: {}",
            config.format(),
            config.color_space(),
            config.present_mode,
            config.extent.width,
            config.extent.height,
            config.image_count,
        );

        let (sharing_mode, family_indices) = sharing(indices);

        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(config.image_count)
            .image_format(config.format())
            .image_color_space(config.color_space())
            .image_extent(config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(&family_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let handle =
            unsafe { device.create_swapchain_khr(&info, None) }.map_err(InitError::Swapchain)?;

        let mut swapchain = Self {
            handle,
            config,
            images: vec![],
            image_views: vec![],
        };

        if let Err(error) = unsafe { swapchain.create_images(device) } {
            unsafe { swapchain.destroy(device) };
            return Err(error);
        }

        Ok(swapchain)
    }

    unsafe fn create_images(&mut self, device: &Device) -> Result<(), InitError> {
        self.images = unsafe { device.get_swapchain_images_khr(self.handle) }
            .map_err(InitError::query("swapchain images"))?;

        for &image in &self.images {
            let subresource_range = vk::ImageSubresourceRange::builder()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1);

            let components = vk::ComponentMapping::builder()
                .r(vk::ComponentSwizzle::IDENTITY)
                .g(vk::ComponentSwizzle::IDENTITY)
                .b(vk::ComponentSwizzle::IDENTITY)
                .a(vk::ComponentSwizzle::IDENTITY);

            let info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::_2D)
                .format(self.config.format())
                .components(components)
                .subresource_range(subresource_range);

            // Pushed one at a time so a failure part way still destroys the earlier views.
            let view = unsafe { device.create_image_view(&info, None) }
                .map_err(InitError::ImageView)?;
            self.image_views.push(view);
        }

        debug!("Created {} swapchain image views.", self.image_views.len());
        Ok(())
    }

    /// The configuration the swapchain was created with.
    pub fn config(&self) -> &SwapchainConfig {
        &self.config
    }

    /// One view per swapchain image, in image order.
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Destroys the image views and then the swapchain. Must run before the device is destroyed.
    pub unsafe fn destroy(&mut self, device: &Device) {
        unsafe {
            self.image_views
                .drain(..)
                .for_each(|v| device.destroy_image_view(v, None));
            device.destroy_swapchain_khr(self.handle, None);
        }
        self.images.clear();
    }
}

/// Image sharing for the swapchain: exclusive when one family does both graphics and
/// presentation, concurrent across both families otherwise.
pub fn sharing(indices: QueueFamilyIndices) -> (vk::SharingMode, Vec<u32>) {
    if indices.is_shared() {
        (vk::SharingMode::EXCLUSIVE, vec![])
    } else {
        (
            vk::SharingMode::CONCURRENT,
            vec![indices.graphics, indices.present],
        )
    }
}

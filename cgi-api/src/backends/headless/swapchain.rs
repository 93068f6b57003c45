use super::{CgiDeviceContextHeadless, CgiTextureHeadless};
use crate::{CgiImageLayout, CgiResult, CgiSwapchainDef, CgiTextureDef, CgiTextureUsage};

fn create_images(
    device_context: &CgiDeviceContextHeadless,
    swapchain_def: &CgiSwapchainDef,
) -> CgiResult<Vec<CgiTextureHeadless>> {
    (0..swapchain_def.image_count)
        .map(|image_index| {
            let texture_def = CgiTextureDef {
                name: format!("swapchain image {}", image_index),
                format: swapchain_def.format,
                width: swapchain_def.width,
                height: swapchain_def.height,
                usage: CgiTextureUsage::RENDER_TARGET,
                initial_layout: Some(CgiImageLayout::PresentSrc),
                ..Default::default()
            };
            CgiTextureHeadless::new(device_context, &texture_def)
        })
        .collect()
}

/// Back buffers that are handed out round-robin. Images rest in the present state.
#[derive(Debug)]
pub struct CgiSwapchainHeadless {
    device_context: CgiDeviceContextHeadless,
    swapchain_def: CgiSwapchainDef,
    images: Vec<CgiTextureHeadless>,
    next_image_index: u32,
    current_image_index: Option<u32>,
}

impl CgiSwapchainHeadless {
    pub fn new(
        device_context: &CgiDeviceContextHeadless,
        swapchain_def: &CgiSwapchainDef,
    ) -> CgiResult<Self> {
        if swapchain_def.image_count == 0 {
            return Err("a swap chain needs at least one image".into());
        }

        let images = create_images(device_context, swapchain_def)?;
        log::debug!(
            "Created swap chain with {} images of {}x{}",
            images.len(),
            swapchain_def.width,
            swapchain_def.height
        );

        Ok(CgiSwapchainHeadless {
            device_context: device_context.clone(),
            swapchain_def: swapchain_def.clone(),
            images,
            next_image_index: 0,
            current_image_index: None,
        })
    }

    pub fn swapchain_def(&self) -> &CgiSwapchainDef {
        &self.swapchain_def
    }

    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    pub fn image(
        &self,
        image_index: u32,
    ) -> Option<&CgiTextureHeadless> {
        self.images.get(image_index as usize)
    }

    /// Image acquired by the last `acquire_next_image` that was not presented yet
    pub fn current_image_index(&self) -> Option<u32> {
        self.current_image_index
    }

    pub fn acquire_next_image(&mut self) -> u32 {
        let image_index = self.next_image_index;
        self.next_image_index = (self.next_image_index + 1) % self.image_count();
        self.current_image_index = Some(image_index);
        image_index
    }

    /// Queue a present of the current image
    pub fn present(&mut self) {
        let image_index = self
            .current_image_index
            .take()
            .expect("present() called without an acquired swap chain image");
        let resource = self.images[image_index as usize].resource();
        self.device_context.gpu().present(resource, image_index);
    }

    /// Recreate the images at the new size. The GPU must be idle.
    pub fn resize(
        &mut self,
        width: u32,
        height: u32,
    ) -> CgiResult<()> {
        let mut swapchain_def = self.swapchain_def.clone();
        swapchain_def.width = width;
        swapchain_def.height = height;

        self.images = create_images(&self.device_context, &swapchain_def)?;
        self.swapchain_def = swapchain_def;
        self.next_image_index = 0;
        self.current_image_index = None;
        log::info!("Resized swap chain to {}x{}", width, height);
        Ok(())
    }
}

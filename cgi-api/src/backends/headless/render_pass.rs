use super::internal::{CgiDescriptor, CgiDescriptorHeap, CgiNativeCommand, CgiResourceTransition};
use super::{CgiDeviceContextHeadless, CgiTextureHeadless};
use crate::{
    CgiClearValue, CgiCpuDescriptorHandle, CgiExtents2D, CgiFormat, CgiFramebufferDef,
    CgiImageLayout, CgiLoadOp, CgiRenderPassDef, CgiRenderPassHandle, CgiRenderPassLayout,
    CgiResourceState, CgiResult, CgiSampleCount, CgiTexture,
};
use std::sync::Arc;

/// A validated render pass. Subpasses are emulated: the framebuffer turns the layouts of each
/// subpass into resource state transitions that the command buffer records.
#[derive(Debug)]
pub struct CgiRenderPassHeadless {
    def: CgiRenderPassDef,
    layout: CgiRenderPassLayout,
}

impl CgiRenderPassHeadless {
    pub fn new(def: &CgiRenderPassDef) -> CgiResult<Self> {
        let layout = def.validate()?;
        log::debug!(
            "Created render pass with {} attachments and {} subpasses",
            def.attachments.len(),
            def.subpasses.len()
        );

        Ok(CgiRenderPassHeadless {
            def: def.clone(),
            layout,
        })
    }

    pub fn def(&self) -> &CgiRenderPassDef {
        &self.def
    }

    pub fn layout(&self) -> &CgiRenderPassLayout {
        &self.layout
    }

    pub fn attachment_count(&self) -> u32 {
        self.def.attachments.len() as u32
    }

    pub fn subpass_count(&self) -> u32 {
        self.def.subpasses.len() as u32
    }

    pub fn color_formats(
        &self,
        subpass: u32,
    ) -> Vec<CgiFormat> {
        self.layout.subpasses[subpass as usize]
            .color
            .iter()
            .map(|(index, _)| self.def.attachments[*index as usize].format)
            .collect()
    }

    pub fn depth_format(
        &self,
        subpass: u32,
    ) -> Option<CgiFormat> {
        self.layout.subpasses[subpass as usize]
            .depth_stencil
            .map(|(index, _)| self.def.attachments[index as usize].format)
    }

    /// Sample count of the subpass's render targets
    pub fn sample_count(
        &self,
        subpass: u32,
    ) -> CgiSampleCount {
        let subpass = &self.layout.subpasses[subpass as usize];
        subpass
            .color
            .iter()
            .chain(subpass.depth_stencil.iter())
            .next()
            .map(|(index, _)| self.def.attachments[*index as usize].sample_count)
            .unwrap_or_default()
    }
}

struct FramebufferImage {
    texture: CgiTextureHeadless,
    mip_level: u32,
    array_layer: u32,
    subresource: u32,
}

// RTV/DSV sub-heap of one subpass
struct SubpassViews {
    rtv_first_index: Option<u32>,
    rtv_count: u32,
    dsv_index: Option<u32>,
}

fn resolve_state(
    layout: CgiImageLayout,
    fallback: CgiResourceState,
) -> CgiResourceState {
    if layout == CgiImageLayout::Undefined {
        fallback
    } else {
        layout.into()
    }
}

/// Images bound to the attachments of a render pass, plus everything derived from them: per
/// subpass RTV/DSV views and the resource state of every attachment before, during and after
/// each subpass.
pub struct CgiFramebufferHeadless {
    device_context: CgiDeviceContextHeadless,
    render_pass: Arc<CgiRenderPassHeadless>,
    render_pass_handle: CgiRenderPassHandle,
    images: Vec<FramebufferImage>,
    extents: CgiExtents2D,
    subpass_views: Vec<SubpassViews>,
    // [entry, subpass 0, .., subpass n-1, exit], one state per attachment
    states: Vec<Vec<CgiResourceState>>,
}

impl std::fmt::Debug for CgiFramebufferHeadless {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CgiFramebufferHeadless")
            .field("render_pass_handle", &self.render_pass_handle)
            .field("extents", &self.extents)
            .field("attachment_count", &self.images.len())
            .finish()
    }
}

impl Drop for CgiFramebufferHeadless {
    fn drop(&mut self) {
        for views in &self.subpass_views {
            if let Some(rtv_first_index) = views.rtv_first_index {
                self.device_context
                    .rtv_heap()
                    .free(rtv_first_index, views.rtv_count);
            }
            if let Some(dsv_index) = views.dsv_index {
                self.device_context.dsv_heap().free(dsv_index, 1);
            }
        }
    }
}

impl CgiFramebufferHeadless {
    pub fn new(
        device_context: &CgiDeviceContextHeadless,
        render_pass_handle: CgiRenderPassHandle,
        render_pass: Arc<CgiRenderPassHeadless>,
        framebuffer_def: &CgiFramebufferDef,
        swapchain_image: Option<CgiTextureHeadless>,
    ) -> CgiResult<Self> {
        let attachments = &render_pass.def().attachments;
        let expected_count = attachments.len() as i64 - swapchain_image.is_some() as i64;
        if framebuffer_def.attachments.len() as i64 != expected_count {
            return Err(format!(
                "framebuffer has {} images but the render pass expects {}",
                framebuffer_def.attachments.len(),
                expected_count
            )
            .into());
        }

        let mut images = Vec::with_capacity(attachments.len());
        if let Some(texture) = swapchain_image {
            images.push(FramebufferImage {
                texture,
                mip_level: 0,
                array_layer: 0,
                subresource: 0,
            });
        }
        for attachment in &framebuffer_def.attachments {
            let texture = match &attachment.texture {
                CgiTexture::Headless(texture) => texture.clone(),
            };
            images.push(FramebufferImage {
                subresource: texture
                    .subresource_index(attachment.mip_level, attachment.array_layer),
                texture,
                mip_level: attachment.mip_level,
                array_layer: attachment.array_layer,
            });
        }

        for (attachment, image) in attachments.iter().zip(&images) {
            let texture_def = image.texture.texture_def();
            if image.mip_level >= texture_def.mip_count
                || image.array_layer >= texture_def.array_layers
            {
                return Err(format!(
                    "framebuffer image {} has no mip {} layer {}",
                    texture_def.name, image.mip_level, image.array_layer
                )
                .into());
            }
            if texture_def.format != attachment.format {
                return Err(format!(
                    "attachment {} is {:?} but image {} is {:?}",
                    attachment.name, attachment.format, texture_def.name, texture_def.format
                )
                .into());
            }
            if texture_def.sample_count != attachment.sample_count {
                return Err(format!(
                    "attachment {} has {:?} but image {} has {:?}",
                    attachment.name,
                    attachment.sample_count,
                    texture_def.name,
                    texture_def.sample_count
                )
                .into());
            }
            let extents = texture_def.mip_extents(image.mip_level);
            if extents.width != framebuffer_def.width || extents.height != framebuffer_def.height {
                return Err(format!(
                    "image {} is {}x{} but the framebuffer is {}x{}",
                    texture_def.name,
                    extents.width,
                    extents.height,
                    framebuffer_def.width,
                    framebuffer_def.height
                )
                .into());
            }
        }

        let layout = render_pass.layout();
        let mut states = Vec::with_capacity(layout.subpasses.len() + 2);
        let entry_states: Vec<CgiResourceState> = attachments
            .iter()
            .zip(&images)
            .map(|(attachment, image)| {
                resolve_state(attachment.initial_layout, image.texture.main_state())
            })
            .collect();
        for subpass_layouts in &layout.subpass_layouts {
            let subpass_states = subpass_layouts
                .iter()
                .zip(&entry_states)
                .map(|(subpass_layout, entry_state)| resolve_state(*subpass_layout, *entry_state))
                .collect();
            states.push(subpass_states);
        }
        let exit_states = attachments
            .iter()
            .zip(&images)
            .map(|(attachment, image)| {
                resolve_state(attachment.final_layout, image.texture.main_state())
            })
            .collect();
        states.insert(0, entry_states);
        states.push(exit_states);

        let mut framebuffer = CgiFramebufferHeadless {
            device_context: device_context.clone(),
            render_pass: render_pass.clone(),
            render_pass_handle,
            images,
            extents: CgiExtents2D {
                width: framebuffer_def.width,
                height: framebuffer_def.height,
            },
            subpass_views: Vec::with_capacity(layout.subpasses.len()),
            states,
        };

        // Views are registered before they are filled so Drop frees whatever was allocated on error
        for subpass in &layout.subpasses {
            framebuffer.subpass_views.push(SubpassViews {
                rtv_first_index: None,
                rtv_count: 0,
                dsv_index: None,
            });
            let views_index = framebuffer.subpass_views.len() - 1;
            let images = &framebuffer.images;
            let views = &mut framebuffer.subpass_views[views_index];

            if !subpass.color.is_empty() {
                let rtv_heap = device_context.rtv_heap();
                let rtv_first_index = rtv_heap.allocate(subpass.color.len() as u32)?;
                views.rtv_first_index = Some(rtv_first_index);
                views.rtv_count = subpass.color.len() as u32;
                for (slot, (attachment_index, _)) in subpass.color.iter().enumerate() {
                    let image = &images[*attachment_index as usize];
                    let src_index = image
                        .texture
                        .rtv_index(image.mip_level, image.array_layer)
                        .ok_or_else(|| {
                            format!(
                                "texture {} is used as a color attachment without render target usage",
                                image.texture.texture_def().name
                            )
                        })?;
                    CgiDescriptorHeap::copy_descriptors(
                        rtv_heap,
                        rtv_first_index + slot as u32,
                        rtv_heap,
                        src_index,
                        1,
                    );
                }
            }

            if let Some((attachment_index, attachment_layout)) = subpass.depth_stencil {
                let image = &images[attachment_index as usize];
                if image.texture.dsv_index(image.mip_level, image.array_layer).is_none() {
                    return Err(format!(
                        "texture {} is used as a depth attachment without depth-stencil usage",
                        image.texture.texture_def().name
                    )
                    .into());
                }

                let dsv_index = device_context.dsv_heap().allocate(1)?;
                views.dsv_index = Some(dsv_index);
                device_context.dsv_heap().write(
                    dsv_index,
                    CgiDescriptor::Dsv {
                        resource: image.texture.resource(),
                        subresource: image.subresource,
                        format: image.texture.texture_def().format,
                        read_only: attachment_layout == CgiImageLayout::DepthStencilReadOnly,
                    },
                );
            }
        }

        Ok(framebuffer)
    }

    pub fn render_pass(&self) -> &Arc<CgiRenderPassHeadless> {
        &self.render_pass
    }

    pub fn render_pass_handle(&self) -> CgiRenderPassHandle {
        self.render_pass_handle
    }

    pub fn extents(&self) -> CgiExtents2D {
        self.extents
    }

    pub fn attachment_texture(
        &self,
        attachment_index: u32,
    ) -> Option<&CgiTextureHeadless> {
        self.images
            .get(attachment_index as usize)
            .map(|image| &image.texture)
    }

    /// Resource state of every attachment while `subpass` runs
    pub fn subpass_states(
        &self,
        subpass: u32,
    ) -> &[CgiResourceState] {
        &self.states[subpass as usize + 1]
    }

    pub fn rtv_handles(
        &self,
        subpass: u32,
    ) -> Vec<CgiCpuDescriptorHandle> {
        let views = &self.subpass_views[subpass as usize];
        match views.rtv_first_index {
            Some(first) => (first..first + views.rtv_count)
                .map(|index| self.device_context.rtv_heap().at_cpu(index))
                .collect(),
            None => Vec::default(),
        }
    }

    pub fn dsv_handle(
        &self,
        subpass: u32,
    ) -> Option<CgiCpuDescriptorHandle> {
        self.subpass_views[subpass as usize]
            .dsv_index
            .map(|index| self.device_context.dsv_heap().at_cpu(index))
    }

    // One transition per attachment whose state differs
    fn transitions(
        &self,
        from: usize,
        to: usize,
    ) -> Vec<CgiResourceTransition> {
        self.images
            .iter()
            .zip(self.states[from].iter().zip(&self.states[to]))
            .filter(|(_, (before, after))| before != after)
            .map(|(image, (before, after))| CgiResourceTransition {
                resource: image.texture.resource(),
                subresource: Some(image.subresource),
                before: *before,
                after: *after,
            })
            .collect()
    }

    /// From the state the images are in before the pass to the layouts of subpass 0
    pub fn entry_transitions(&self) -> Vec<CgiResourceTransition> {
        self.transitions(0, 1)
    }

    /// From the layouts of `subpass` to those of `subpass + 1`
    pub fn subpass_transitions(
        &self,
        subpass: u32,
    ) -> Vec<CgiResourceTransition> {
        self.transitions(subpass as usize + 1, subpass as usize + 2)
    }

    /// From the layouts of the last subpass to the final layouts
    pub fn exit_transitions(&self) -> Vec<CgiResourceTransition> {
        self.transitions(self.states.len() - 2, self.states.len() - 1)
    }

    /// Commands that resolve the multisampled color targets of `subpass` into its resolve
    /// targets. Both images are returned to their subpass state afterwards.
    pub fn resolve_commands(
        &self,
        subpass: u32,
    ) -> Vec<CgiNativeCommand> {
        let resolved = &self.render_pass.layout().subpasses[subpass as usize];
        let states = self.subpass_states(subpass);
        let mut commands = Vec::default();

        for ((src_index, _), (dst_index, _)) in resolved.color.iter().zip(&resolved.resolve) {
            let src = &self.images[*src_index as usize];
            let dst = &self.images[*dst_index as usize];
            let src_state = states[*src_index as usize];
            let dst_state = states[*dst_index as usize];

            let mut before = Vec::default();
            let mut after = Vec::default();
            for (image, state, target_state) in &[
                (src, src_state, CgiResourceState::RESOLVE_SOURCE),
                (dst, dst_state, CgiResourceState::RESOLVE_DEST),
            ] {
                if state != target_state {
                    before.push(CgiResourceTransition {
                        resource: image.texture.resource(),
                        subresource: Some(image.subresource),
                        before: *state,
                        after: *target_state,
                    });
                    after.push(CgiResourceTransition {
                        resource: image.texture.resource(),
                        subresource: Some(image.subresource),
                        before: *target_state,
                        after: *state,
                    });
                }
            }

            if !before.is_empty() {
                commands.push(CgiNativeCommand::ResourceBarrier(before));
            }
            commands.push(CgiNativeCommand::ResolveSubresource {
                dst: dst.texture.resource(),
                dst_subresource: dst.subresource,
                src: src.texture.resource(),
                src_subresource: src.subresource,
            });
            if !after.is_empty() {
                commands.push(CgiNativeCommand::ResourceBarrier(after));
            }
        }

        commands
    }

    /// Clears of the attachments first rendered in `subpass`
    pub fn clear_commands(
        &self,
        subpass: u32,
        clear_values: &[CgiClearValue],
    ) -> Vec<CgiNativeCommand> {
        let def = self.render_pass.def();
        let first_render_subpass = &self.render_pass.layout().first_render_subpass;
        let mut commands = Vec::default();

        for (attachment_index, attachment) in def.attachments.iter().enumerate() {
            if first_render_subpass[attachment_index] != Some(subpass) || !attachment.clears() {
                continue;
            }

            let image = &self.images[attachment_index];
            let clear_value = clear_values
                .get(attachment_index)
                .copied()
                .unwrap_or_default();

            if attachment.format.is_depth() {
                let (depth, stencil) = match clear_value {
                    CgiClearValue::DepthStencil { depth, stencil } => (depth, stencil),
                    CgiClearValue::Color(_) => panic!(
                        "depth attachment {} was given a color clear value",
                        attachment.name
                    ),
                };
                if let Some(dsv) = image.texture.dsv_handle(image.mip_level, image.array_layer) {
                    commands.push(CgiNativeCommand::ClearDepthStencilView {
                        dsv,
                        depth: if attachment.load_op == CgiLoadOp::Clear {
                            Some(depth)
                        } else {
                            None
                        },
                        stencil: if attachment.format.has_stencil()
                            && attachment.stencil_load_op == CgiLoadOp::Clear
                        {
                            Some(stencil as u8)
                        } else {
                            None
                        },
                    });
                }
            } else {
                let color = match clear_value {
                    CgiClearValue::Color(color) => color,
                    CgiClearValue::DepthStencil { .. } => panic!(
                        "color attachment {} was given a depth-stencil clear value",
                        attachment.name
                    ),
                };
                if let Some(rtv) = image.texture.rtv_handle(image.mip_level, image.array_layer) {
                    commands.push(CgiNativeCommand::ClearRenderTargetView { rtv, color });
                }
            }
        }

        commands
    }
}

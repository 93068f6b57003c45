use super::internal::{CgiDescriptor, CgiNativeCommand, CgiResourceTransition};
use super::{CgiCommandBufferHeadless, CgiDeviceContextHeadless};
use crate::{
    CgiCpuDescriptorHandle, CgiError, CgiImageLayout, CgiResourceId, CgiResourceState, CgiResult,
    CgiTextureDef, CgiTextureUsage,
};
use std::sync::{Arc, Mutex};

struct CgiTextureHeadlessInner {
    device_context: CgiDeviceContextHeadless,
    texture_def: CgiTextureDef,
    resource: CgiResourceId,
    main_layout: CgiImageLayout,
    // Static slots in the shader-visible heaps
    srv_index: Option<u32>,
    sampler_index: Option<u32>,
    // Per subresource, see `subresource_index`
    rtv_indices: Vec<u32>,
    dsv_indices: Vec<u32>,
    staging_buffers: Mutex<Vec<CgiResourceId>>,
}

impl Drop for CgiTextureHeadlessInner {
    fn drop(&mut self) {
        log::trace!("Destroying texture {}", self.texture_def.name);
        let device_context = &self.device_context;
        if let Some(srv_index) = self.srv_index {
            device_context.cbv_srv_uav_heap().free_static(srv_index, 1);
        }
        if let Some(sampler_index) = self.sampler_index {
            device_context.sampler_heap().free_static(sampler_index, 1);
        }
        for rtv_index in &self.rtv_indices {
            device_context.rtv_heap().free(*rtv_index, 1);
        }
        for dsv_index in &self.dsv_indices {
            device_context.dsv_heap().free(*dsv_index, 1);
        }
        let staging_buffers = self
            .staging_buffers
            .get_mut()
            .unwrap_or_else(|e| e.into_inner());
        for staging_buffer in staging_buffers.drain(..) {
            device_context.gpu().destroy_resource(staging_buffer);
        }
        device_context.gpu().destroy_resource(self.resource);
    }
}

/// An image resource. Outside of render passes and uploads the texture rests in its main layout.
#[derive(Clone)]
pub struct CgiTextureHeadless {
    inner: Arc<CgiTextureHeadlessInner>,
}

impl std::fmt::Debug for CgiTextureHeadless {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CgiTextureHeadless")
            .field("name", &self.inner.texture_def.name)
            .field("resource", &self.inner.resource)
            .finish()
    }
}

impl PartialEq for CgiTextureHeadless {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.inner.resource == other.inner.resource
    }
}

impl CgiTextureHeadless {
    pub fn new(
        device_context: &CgiDeviceContextHeadless,
        texture_def: &CgiTextureDef,
    ) -> CgiResult<Self> {
        texture_def.validate()?;

        let main_layout = texture_def.main_layout();
        let resource = device_context
            .gpu()
            .create_texture(texture_def, main_layout.into());

        // Build the inner right away so the heap slots are released by its Drop if anything fails
        let mut inner = CgiTextureHeadlessInner {
            device_context: device_context.clone(),
            texture_def: texture_def.clone(),
            resource,
            main_layout,
            srv_index: None,
            sampler_index: None,
            rtv_indices: Vec::default(),
            dsv_indices: Vec::default(),
            staging_buffers: Default::default(),
        };

        let usage = texture_def.usage;
        if usage.intersects(CgiTextureUsage::SAMPLED | CgiTextureUsage::INPUT_ATTACHMENT) {
            let heap = device_context.cbv_srv_uav_heap();
            let srv_index = heap.allocate_static(1)?;
            inner.srv_index = Some(srv_index);
            heap.heap().write(
                srv_index,
                CgiDescriptor::Srv {
                    resource,
                    format: texture_def.format,
                    first_mip: 0,
                    mip_count: texture_def.mip_count,
                    cube: usage.contains(CgiTextureUsage::CUBE_MAP),
                },
            );

            let sampler_heap = device_context.sampler_heap();
            let sampler_index = sampler_heap.allocate_static(1)?;
            inner.sampler_index = Some(sampler_index);
            sampler_heap.heap().write(
                sampler_index,
                CgiDescriptor::Sampler(texture_def.sampler.unwrap_or_default()),
            );
        }

        for subresource in 0..texture_def.subresource_count() {
            if usage.contains(CgiTextureUsage::RENDER_TARGET) {
                let rtv_index = device_context.rtv_heap().allocate(1)?;
                inner.rtv_indices.push(rtv_index);
                device_context.rtv_heap().write(
                    rtv_index,
                    CgiDescriptor::Rtv {
                        resource,
                        subresource,
                        format: texture_def.format,
                    },
                );
            }
            if usage.contains(CgiTextureUsage::DEPTH_STENCIL) {
                let dsv_index = device_context.dsv_heap().allocate(1)?;
                inner.dsv_indices.push(dsv_index);
                device_context.dsv_heap().write(
                    dsv_index,
                    CgiDescriptor::Dsv {
                        resource,
                        subresource,
                        format: texture_def.format,
                        read_only: false,
                    },
                );
            }
        }

        log::debug!(
            "Created texture {} {}x{} {:?} ({} mips, {} layers)",
            texture_def.name,
            texture_def.width,
            texture_def.height,
            texture_def.format,
            texture_def.mip_count,
            texture_def.array_layers
        );

        Ok(CgiTextureHeadless {
            inner: Arc::new(inner),
        })
    }

    pub fn texture_def(&self) -> &CgiTextureDef {
        &self.inner.texture_def
    }

    pub fn resource(&self) -> CgiResourceId {
        self.inner.resource
    }

    pub fn main_layout(&self) -> CgiImageLayout {
        self.inner.main_layout
    }

    pub fn main_state(&self) -> CgiResourceState {
        self.inner.main_layout.into()
    }

    pub fn subresource_index(
        &self,
        mip_level: u32,
        array_layer: u32,
    ) -> u32 {
        mip_level + array_layer * self.inner.texture_def.mip_count
    }

    /// Index of the texture's SRV in the static prefix of the CBV/SRV/UAV heap
    pub fn srv_index(&self) -> Option<u32> {
        self.inner.srv_index
    }

    /// Index of the texture's sampler in the static prefix of the sampler heap
    pub fn sampler_index(&self) -> Option<u32> {
        self.inner.sampler_index
    }

    pub fn rtv_index(
        &self,
        mip_level: u32,
        array_layer: u32,
    ) -> Option<u32> {
        self.inner
            .rtv_indices
            .get(self.subresource_index(mip_level, array_layer) as usize)
            .copied()
    }

    pub fn dsv_index(
        &self,
        mip_level: u32,
        array_layer: u32,
    ) -> Option<u32> {
        self.inner
            .dsv_indices
            .get(self.subresource_index(mip_level, array_layer) as usize)
            .copied()
    }

    pub fn rtv_handle(
        &self,
        mip_level: u32,
        array_layer: u32,
    ) -> Option<CgiCpuDescriptorHandle> {
        self.rtv_index(mip_level, array_layer)
            .map(|index| self.inner.device_context.rtv_heap().at_cpu(index))
    }

    pub fn dsv_handle(
        &self,
        mip_level: u32,
        array_layer: u32,
    ) -> Option<CgiCpuDescriptorHandle> {
        self.dsv_index(mip_level, array_layer)
            .map(|index| self.inner.device_context.dsv_heap().at_cpu(index))
    }

    /// Record an upload of one subresource. `data` must be exactly one surface in the texture's
    /// format, rows tightly packed. The staging buffer lives until `free_staging_buffers`.
    pub fn update_image(
        &self,
        command_buffer: &CgiCommandBufferHeadless,
        mip_level: u32,
        array_layer: u32,
        data: &[u8],
    ) -> CgiResult<()> {
        let texture_def = &self.inner.texture_def;
        if mip_level >= texture_def.mip_count || array_layer >= texture_def.array_layers {
            return Err(format!(
                "texture {} has no mip {} layer {}",
                texture_def.name, mip_level, array_layer
            )
            .into());
        }

        let extents = texture_def.mip_extents(mip_level);
        let expected_size = texture_def.format.surface_size(extents.width, extents.height)
            * u64::from(texture_def.depth);
        if data.len() != expected_size as usize {
            return Err(CgiError::ContentError(format!(
                "upload to texture {} mip {} is {} bytes, expected {}",
                texture_def.name,
                mip_level,
                data.len(),
                expected_size
            )));
        }

        let gpu = self.inner.device_context.gpu();
        let staging_buffer = gpu.create_buffer(
            &format!("{} staging", texture_def.name),
            data.len() as u64,
            CgiResourceState::GENERIC_READ,
        );
        gpu.write_buffer(staging_buffer, 0, data);
        self.inner
            .staging_buffers
            .lock()
            .unwrap()
            .push(staging_buffer);

        let subresource = self.subresource_index(mip_level, array_layer);
        let main_state = self.main_state();
        let mut commands = Vec::with_capacity(3);
        if main_state != CgiResourceState::COPY_DST {
            commands.push(CgiNativeCommand::ResourceBarrier(vec![
                CgiResourceTransition {
                    resource: self.inner.resource,
                    subresource: Some(subresource),
                    before: main_state,
                    after: CgiResourceState::COPY_DST,
                },
            ]));
        }
        commands.push(CgiNativeCommand::CopyTextureRegion {
            dst: self.inner.resource,
            dst_subresource: subresource,
            src: staging_buffer,
            src_offset: 0,
            size: data.len() as u64,
        });
        if main_state != CgiResourceState::COPY_DST {
            commands.push(CgiNativeCommand::ResourceBarrier(vec![
                CgiResourceTransition {
                    resource: self.inner.resource,
                    subresource: Some(subresource),
                    before: CgiResourceState::COPY_DST,
                    after: main_state,
                },
            ]));
        }

        command_buffer.record_commands(commands);
        Ok(())
    }

    /// Contents of one subresource as the GPU last wrote them
    pub fn read_subresource(
        &self,
        mip_level: u32,
        array_layer: u32,
    ) -> Option<Vec<u8>> {
        self.inner
            .device_context
            .gpu()
            .read_subresource(self.inner.resource, self.subresource_index(mip_level, array_layer))
    }

    /// Release staging memory of finished uploads. Only call once the uploads have executed.
    pub fn free_staging_buffers(&self) {
        let gpu = self.inner.device_context.gpu();
        for staging_buffer in self.inner.staging_buffers.lock().unwrap().drain(..) {
            gpu.destroy_resource(staging_buffer);
        }
    }
}

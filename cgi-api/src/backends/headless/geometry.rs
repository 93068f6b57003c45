use super::internal::{
    CgiGpuAddress, CgiIndexBufferView, CgiNativeCommand, CgiResourceTransition,
    CgiVertexBufferView,
};
use super::{CgiCommandBufferHeadless, CgiDeviceContextHeadless};
use crate::{CgiGeometryDef, CgiResourceId, CgiResourceState, CgiResult, MAX_VERTEX_INPUT_BINDINGS};
use std::sync::{Arc, Mutex};

#[derive(Copy, Clone, Debug)]
struct GpuBuffer {
    resource: CgiResourceId,
    // Size of one copy. Dynamic buffers hold one copy per ring slot.
    size: u64,
    dynamic: bool,
}

#[derive(Default)]
struct GeometryBuffers {
    vertex_buffers: Vec<Option<GpuBuffer>>,
    index_buffer: Option<GpuBuffer>,
    staging_buffers: Vec<CgiResourceId>,
}

struct CgiGeometryHeadlessInner {
    device_context: CgiDeviceContextHeadless,
    geometry_def: CgiGeometryDef,
    buffers: Mutex<GeometryBuffers>,
}

impl Drop for CgiGeometryHeadlessInner {
    fn drop(&mut self) {
        let gpu = self.device_context.gpu();
        let buffers = self.buffers.get_mut().unwrap_or_else(|e| e.into_inner());
        for buffer in buffers
            .vertex_buffers
            .iter()
            .chain(std::iter::once(&buffers.index_buffer))
            .flatten()
        {
            gpu.destroy_resource(buffer.resource);
        }
        for staging_buffer in buffers.staging_buffers.drain(..) {
            gpu.destroy_resource(staging_buffer);
        }
    }
}

/// Vertex and index buffers described by a `CgiGeometryDef`.
///
/// Static bindings live in GPU memory and are updated through a staging copy recorded into a
/// command buffer. Dynamic bindings live in upload memory with one region per ring slot, written
/// directly by the CPU for the frame being recorded.
#[derive(Clone)]
pub struct CgiGeometryHeadless {
    inner: Arc<CgiGeometryHeadlessInner>,
}

impl std::fmt::Debug for CgiGeometryHeadless {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter,
    ) -> std::fmt::Result {
        f.debug_struct("CgiGeometryHeadless")
            .field("name", &self.inner.geometry_def.name)
            .finish()
    }
}

impl CgiGeometryHeadless {
    pub fn new(
        device_context: &CgiDeviceContextHeadless,
        geometry_def: &CgiGeometryDef,
    ) -> CgiResult<Self> {
        let binding_count = geometry_def.binding_count() as usize;
        if binding_count > MAX_VERTEX_INPUT_BINDINGS {
            return Err(format!(
                "geometry {} uses {} vertex bindings, at most {} are supported",
                geometry_def.name, binding_count, MAX_VERTEX_INPUT_BINDINGS
            )
            .into());
        }

        let buffers = GeometryBuffers {
            vertex_buffers: vec![None; binding_count],
            ..Default::default()
        };

        Ok(CgiGeometryHeadless {
            inner: Arc::new(CgiGeometryHeadlessInner {
                device_context: device_context.clone(),
                geometry_def: geometry_def.clone(),
                buffers: Mutex::new(buffers),
            }),
        })
    }

    pub fn geometry_def(&self) -> &CgiGeometryDef {
        &self.inner.geometry_def
    }

    fn is_dynamic(
        &self,
        binding: u32,
    ) -> bool {
        self.inner.geometry_def.dynamic_binding_mask & (1 << binding) != 0
    }

    fn create_buffer(
        &self,
        name: &str,
        size: u64,
        dynamic: bool,
        static_state: CgiResourceState,
    ) -> GpuBuffer {
        let device_context = &self.inner.device_context;
        let (total_size, state) = if dynamic {
            (
                size * device_context.ring_buffer_size() as u64,
                CgiResourceState::GENERIC_READ,
            )
        } else {
            (size, static_state)
        };

        let resource = device_context.gpu().create_buffer(name, total_size, state);
        GpuBuffer {
            resource,
            size,
            dynamic,
        }
    }

    pub fn create_vertex_buffer(
        &self,
        binding: u32,
        vertex_count: u32,
    ) -> CgiResult<()> {
        let geometry_def = &self.inner.geometry_def;
        if binding >= geometry_def.binding_count() {
            return Err(format!(
                "geometry {} has no vertex binding {}",
                geometry_def.name, binding
            )
            .into());
        }

        let size = geometry_def.binding_stride(binding) as u64 * vertex_count as u64;
        let buffer = self.create_buffer(
            &format!("{} vertex binding {}", geometry_def.name, binding),
            size,
            self.is_dynamic(binding),
            CgiResourceState::VERTEX_AND_CONSTANT_BUFFER,
        );

        let mut buffers = self.inner.buffers.lock().unwrap();
        if let Some(old) = buffers.vertex_buffers[binding as usize].replace(buffer) {
            self.inner.device_context.gpu().destroy_resource(old.resource);
        }
        Ok(())
    }

    pub fn create_index_buffer(
        &self,
        index_count: u32,
    ) -> CgiResult<()> {
        let geometry_def = &self.inner.geometry_def;
        let size = geometry_def.index_type.size_in_bytes() as u64 * index_count as u64;
        let buffer = self.create_buffer(
            &format!("{} indices", geometry_def.name),
            size,
            false,
            CgiResourceState::INDEX_BUFFER,
        );

        let mut buffers = self.inner.buffers.lock().unwrap();
        if let Some(old) = buffers.index_buffer.replace(buffer) {
            self.inner.device_context.gpu().destroy_resource(old.resource);
        }
        Ok(())
    }

    fn update_buffer(
        &self,
        buffer: GpuBuffer,
        data: &[u8],
        command_buffer: Option<&CgiCommandBufferHeadless>,
        static_state: CgiResourceState,
        what: &str,
    ) -> CgiResult<()> {
        if data.len() as u64 > buffer.size {
            return Err(format!(
                "{} of geometry {} holds {} bytes, the update is {} bytes",
                what,
                self.inner.geometry_def.name,
                buffer.size,
                data.len()
            )
            .into());
        }

        let device_context = &self.inner.device_context;
        if buffer.dynamic {
            let offset = buffer.size * device_context.ring_index() as u64;
            device_context
                .gpu()
                .write_buffer(buffer.resource, offset, data);
            return Ok(());
        }

        let command_buffer = command_buffer.ok_or_else(|| {
            format!(
                "{} of geometry {} is static, updating it needs a command buffer",
                what, self.inner.geometry_def.name
            )
        })?;

        let staging_buffer = device_context.gpu().create_buffer(
            &format!("{} {} staging", self.inner.geometry_def.name, what),
            data.len() as u64,
            CgiResourceState::GENERIC_READ,
        );
        device_context.gpu().write_buffer(staging_buffer, 0, data);
        self.inner
            .buffers
            .lock()
            .unwrap()
            .staging_buffers
            .push(staging_buffer);

        let transition = |before, after| {
            CgiNativeCommand::ResourceBarrier(vec![CgiResourceTransition {
                resource: buffer.resource,
                subresource: None,
                before,
                after,
            }])
        };
        command_buffer.record_commands(vec![
            transition(static_state, CgiResourceState::COPY_DST),
            CgiNativeCommand::CopyBufferRegion {
                dst: buffer.resource,
                dst_offset: 0,
                src: staging_buffer,
                src_offset: 0,
                size: data.len() as u64,
            },
            transition(CgiResourceState::COPY_DST, static_state),
        ]);
        Ok(())
    }

    /// Write vertex data of one binding. Static bindings record a copy into `command_buffer`,
    /// dynamic bindings write the current ring slot's region and need no command buffer.
    pub fn update_vertex_buffer(
        &self,
        binding: u32,
        data: &[u8],
        command_buffer: Option<&CgiCommandBufferHeadless>,
    ) -> CgiResult<()> {
        let buffer = self
            .inner
            .buffers
            .lock()
            .unwrap()
            .vertex_buffers
            .get(binding as usize)
            .copied()
            .flatten()
            .ok_or_else(|| {
                format!(
                    "vertex binding {} of geometry {} has no buffer, call create_vertex_buffer first",
                    binding, self.inner.geometry_def.name
                )
            })?;

        self.update_buffer(
            buffer,
            data,
            command_buffer,
            CgiResourceState::VERTEX_AND_CONSTANT_BUFFER,
            "vertex buffer",
        )
    }

    pub fn update_index_buffer(
        &self,
        data: &[u8],
        command_buffer: Option<&CgiCommandBufferHeadless>,
    ) -> CgiResult<()> {
        let buffer = self
            .inner
            .buffers
            .lock()
            .unwrap()
            .index_buffer
            .ok_or_else(|| {
                format!(
                    "geometry {} has no index buffer, call create_index_buffer first",
                    self.inner.geometry_def.name
                )
            })?;

        self.update_buffer(
            buffer,
            data,
            command_buffer,
            CgiResourceState::INDEX_BUFFER,
            "index buffer",
        )
    }

    /// Views of the bindings selected by `binding_mask` that have a buffer, with their slot
    pub fn vertex_buffer_views(
        &self,
        binding_mask: u32,
    ) -> Vec<(u32, CgiVertexBufferView)> {
        let ring_index = self.inner.device_context.ring_index() as u64;
        let buffers = self.inner.buffers.lock().unwrap();
        buffers
            .vertex_buffers
            .iter()
            .enumerate()
            .filter(|(binding, _)| binding_mask & (1 << binding) != 0)
            .filter_map(|(binding, buffer)| {
                buffer.map(|buffer| {
                    let offset = if buffer.dynamic {
                        buffer.size * ring_index
                    } else {
                        0
                    };
                    let view = CgiVertexBufferView {
                        address: CgiGpuAddress {
                            resource: buffer.resource,
                            offset,
                        },
                        size_in_bytes: buffer.size as u32,
                        stride_in_bytes: self.inner.geometry_def.binding_stride(binding as u32),
                    };
                    (binding as u32, view)
                })
            })
            .collect()
    }

    pub fn index_buffer_view(&self) -> Option<CgiIndexBufferView> {
        let buffers = self.inner.buffers.lock().unwrap();
        buffers.index_buffer.map(|buffer| CgiIndexBufferView {
            address: CgiGpuAddress {
                resource: buffer.resource,
                offset: 0,
            },
            size_in_bytes: buffer.size as u32,
            index_type: self.inner.geometry_def.index_type,
        })
    }

    /// Release staging memory of finished uploads. Only call once the uploads have executed.
    pub fn free_staging_buffers(&self) {
        let gpu = self.inner.device_context.gpu();
        let mut buffers = self.inner.buffers.lock().unwrap();
        for staging_buffer in buffers.staging_buffers.drain(..) {
            gpu.destroy_resource(staging_buffer);
        }
    }

    /// Buffer contents as the GPU sees them, for the current ring slot if the binding is dynamic
    pub fn read_vertex_buffer(
        &self,
        binding: u32,
    ) -> Option<Vec<u8>> {
        let buffer = self
            .inner
            .buffers
            .lock()
            .unwrap()
            .vertex_buffers
            .get(binding as usize)
            .copied()
            .flatten()?;
        let offset = if buffer.dynamic {
            buffer.size * self.inner.device_context.ring_index() as u64
        } else {
            0
        };
        self.inner
            .device_context
            .gpu()
            .read_buffer(buffer.resource, offset, buffer.size)
    }
}

use crate::headless::CgiGeometryHeadless;
use crate::{CgiCommandBuffer, CgiGeometryDef, CgiResult};

/// Vertex and index buffers of a mesh. Cloning shares the buffers.
#[derive(Clone, Debug)]
pub enum CgiGeometry {
    Headless(CgiGeometryHeadless),
}

impl CgiGeometry {
    pub fn geometry_def(&self) -> &CgiGeometryDef {
        match self {
            CgiGeometry::Headless(inner) => inner.geometry_def(),
        }
    }

    pub fn create_vertex_buffer(
        &self,
        binding: u32,
        vertex_count: u32,
    ) -> CgiResult<()> {
        match self {
            CgiGeometry::Headless(inner) => inner.create_vertex_buffer(binding, vertex_count),
        }
    }

    pub fn create_index_buffer(
        &self,
        index_count: u32,
    ) -> CgiResult<()> {
        match self {
            CgiGeometry::Headless(inner) => inner.create_index_buffer(index_count),
        }
    }

    /// Write the vertices of one binding. Static bindings need a command buffer to record the
    /// upload into, dynamic bindings are written for the current frame directly.
    pub fn update_vertex_buffer<T: bytemuck::Pod>(
        &self,
        binding: u32,
        vertices: &[T],
        command_buffer: Option<&CgiCommandBuffer>,
    ) -> CgiResult<()> {
        match self {
            CgiGeometry::Headless(inner) => inner.update_vertex_buffer(
                binding,
                bytemuck::cast_slice(vertices),
                command_buffer.map(|command_buffer| match command_buffer {
                    CgiCommandBuffer::Headless(command_buffer) => command_buffer,
                }),
            ),
        }
    }

    pub fn update_index_buffer<T: bytemuck::Pod>(
        &self,
        indices: &[T],
        command_buffer: Option<&CgiCommandBuffer>,
    ) -> CgiResult<()> {
        match self {
            CgiGeometry::Headless(inner) => inner.update_index_buffer(
                bytemuck::cast_slice(indices),
                command_buffer.map(|command_buffer| match command_buffer {
                    CgiCommandBuffer::Headless(command_buffer) => command_buffer,
                }),
            ),
        }
    }

    pub fn free_staging_buffers(&self) {
        match self {
            CgiGeometry::Headless(inner) => inner.free_staging_buffers(),
        }
    }

    pub fn headless_geometry(&self) -> Option<&CgiGeometryHeadless> {
        match self {
            CgiGeometry::Headless(inner) => Some(inner),
        }
    }
}

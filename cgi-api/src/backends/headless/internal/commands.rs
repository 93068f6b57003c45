use crate::{
    CgiCpuDescriptorHandle, CgiGpuDescriptorHandle, CgiIndexType, CgiPrimitiveTopology,
    CgiResourceId, CgiResourceState, CgiScissorRect, CgiViewport,
};

/// GPU virtual address: a byte offset into a buffer resource
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CgiGpuAddress {
    pub resource: CgiResourceId,
    pub offset: u64,
}

impl CgiGpuAddress {
    pub fn offset_by(
        self,
        offset: u64,
    ) -> Self {
        CgiGpuAddress {
            resource: self.resource,
            offset: self.offset + offset,
        }
    }
}

/// One state transition of a resource. `subresource` of None covers every subresource.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CgiResourceTransition {
    pub resource: CgiResourceId,
    pub subresource: Option<u32>,
    pub before: CgiResourceState,
    pub after: CgiResourceState,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CgiPipelineBindPoint {
    Graphics,
    Compute,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CgiVertexBufferView {
    pub address: CgiGpuAddress,
    pub size_in_bytes: u32,
    pub stride_in_bytes: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CgiIndexBufferView {
    pub address: CgiGpuAddress,
    pub size_in_bytes: u32,
    pub index_type: CgiIndexType,
}

/// A command recorded into a headless command list. Mirrors the subset of
/// `ID3D12GraphicsCommandList` the CGI layer emits.
#[derive(Clone, Debug, PartialEq)]
pub enum CgiNativeCommand {
    ResourceBarrier(Vec<CgiResourceTransition>),
    OMSetRenderTargets {
        rtvs: Vec<CgiCpuDescriptorHandle>,
        dsv: Option<CgiCpuDescriptorHandle>,
    },
    ClearRenderTargetView {
        rtv: CgiCpuDescriptorHandle,
        color: [f32; 4],
    },
    ClearDepthStencilView {
        dsv: CgiCpuDescriptorHandle,
        depth: Option<f32>,
        stencil: Option<u8>,
    },
    RSSetViewports(Vec<CgiViewport>),
    RSSetScissorRects(Vec<CgiScissorRect>),
    SetPipelineState(u64),
    SetRootSignature {
        bind_point: CgiPipelineBindPoint,
        root_signature: u64,
    },
    IASetPrimitiveTopology(CgiPrimitiveTopology),
    IASetVertexBuffers {
        start_slot: u32,
        views: Vec<CgiVertexBufferView>,
    },
    IASetIndexBuffer(CgiIndexBufferView),
    SetRootDescriptorTable {
        bind_point: CgiPipelineBindPoint,
        parameter_index: u32,
        base: CgiGpuDescriptorHandle,
    },
    SetRootConstantBufferView {
        bind_point: CgiPipelineBindPoint,
        parameter_index: u32,
        address: CgiGpuAddress,
    },
    SetRoot32BitConstants {
        bind_point: CgiPipelineBindPoint,
        parameter_index: u32,
        values: Vec<u32>,
    },
    DrawInstanced {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
    DrawIndexedInstanced {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchMesh {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchRays {
        width: u32,
        height: u32,
        depth: u32,
    },
    CopyBufferRegion {
        dst: CgiResourceId,
        dst_offset: u64,
        src: CgiResourceId,
        src_offset: u64,
        size: u64,
    },
    CopyTextureRegion {
        dst: CgiResourceId,
        dst_subresource: u32,
        src: CgiResourceId,
        src_offset: u64,
        size: u64,
    },
    ResolveSubresource {
        dst: CgiResourceId,
        dst_subresource: u32,
        src: CgiResourceId,
        src_subresource: u32,
    },
}

impl CgiNativeCommand {
    pub fn is_barrier(&self) -> bool {
        matches!(self, CgiNativeCommand::ResourceBarrier(_))
    }

    /// Number of transitions if this is a barrier command
    pub fn barrier_count(&self) -> usize {
        match self {
            CgiNativeCommand::ResourceBarrier(transitions) => transitions.len(),
            _ => 0,
        }
    }
}

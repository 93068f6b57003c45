use bytemuck::{Pod, Zeroable};
use cgi_api::*;
use cgi_framework::{DeferredCamera, DeferredShading, OmniLight, FORWARD_SUBPASS, GBUFFER_SUBPASS};
use glam::Vec3;

const SCENE_SHADER_NAME: &str = "demo_scene.hlsl";

const SCENE_SHADER: &str = r#"
//@ opaque
//@ transparent

cbuffer PerView : register(b0, space0)
{
    float4x4 view_proj;
};

struct VertexInput
{
    float3 position : POSITION;
    float3 normal : NORMAL;
    float4 instance : INSTANCEDATA;
};

struct VertexOutput
{
    float4 position : SV_Position;
    float3 normal : NORMAL;
    float3 color : COLOR;
};

#ifdef _VS
VertexOutput vertex_main(VertexInput input)
{
    VertexOutput output;
    float3 world = input.position * input.instance.w + input.instance.xyz;
    output.position = mul(view_proj, float4(world, 1.0));
    output.normal = input.normal;
    output.color = frac(input.instance.xyz * 0.37) * 0.5 + 0.5;
    return output;
}

VertexOutput opaqueVS(VertexInput input) { return vertex_main(input); }
VertexOutput transparentVS(VertexInput input) { return vertex_main(input); }
#endif

#ifdef _FS
struct GBufferOutput
{
    float4 albedo : SV_Target0;
    float4 normal : SV_Target1;
    float4 material : SV_Target2;
};

GBufferOutput opaqueFS(VertexOutput input)
{
    GBufferOutput output;
    output.albedo = float4(input.color, 1.0);
    output.normal = float4(normalize(input.normal) * 0.5 + 0.5, 0.0);
    output.material = float4(32.0 / 255.0, 0.0, 0.0, 0.0);
    return output;
}

float4 transparentFS(VertexOutput input) : SV_Target
{
    return float4(input.color, 0.35);
}
#endif
"#;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct PerView {
    view_proj: [[f32; 4]; 4],
}

// Position at binding 0, normal at 12, instance offset and scale at binding 1
const VERTEX_STRIDE_FLOATS: usize = 6;
const INSTANCE_BINDING: u32 = 1;

/// A unit cube with per-face normals
fn cube_mesh() -> (Vec<f32>, Vec<u16>) {
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(faces.len() * 4 * VERTEX_STRIDE_FLOATS);
    let mut indices = Vec::with_capacity(faces.len() * 6);
    for (normal, u, v) in faces.iter() {
        let normal = Vec3::from(*normal);
        let (u, v) = (Vec3::from(*u), Vec3::from(*v));
        let first = (vertices.len() / VERTEX_STRIDE_FLOATS) as u16;
        let corners: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
        for (su, sv) in corners.iter() {
            let position = (normal + u * *su + v * *sv) * 0.5;
            vertices.extend_from_slice(&[position.x, position.y, position.z]);
            vertices.extend_from_slice(&[normal.x, normal.y, normal.z]);
        }
        indices.extend_from_slice(&[first, first + 1, first + 2, first, first + 2, first + 3]);
    }
    (vertices, indices)
}

/// Instanced cubes drawn into the G-buffer, a transparent copy drawn in the forward subpass and
/// a ring of omni lights orbiting them
pub struct DemoScene {
    shader: CgiShader,
    geometry: CgiGeometry,
    opaque_pipeline: CgiPipeline,
    transparent_pipeline: CgiPipeline,
    cube_count: u32,
    index_count: u32,
}

impl DemoScene {
    pub fn new(
        renderer: &CgiRenderer,
        deferred_shading: &DeferredShading,
        cube_count: u32,
    ) -> CgiResult<Self> {
        let shader =
            renderer.create_shader(&CgiShaderDef::from_source(SCENE_SHADER_NAME, SCENE_SHADER))?;
        shader.create_descriptor_set(&CgiDescriptorSetDef::new(
            0,
            std::mem::size_of::<PerView>() as u32,
            1,
            CgiShaderStageFlags::VERTEX,
        ))?;
        shader.create_pipeline_layout()?;

        let mut geometry_def = CgiGeometryDef::new(
            "cubes",
            vec![
                CgiVertexElement::new(
                    0,
                    0,
                    CgiFormat::R32G32B32Sfloat,
                    CgiVertexUsage::Position,
                    0,
                ),
                CgiVertexElement::new(0, 12, CgiFormat::R32G32B32Sfloat, CgiVertexUsage::Normal, 0),
                CgiVertexElement::new(
                    INSTANCE_BINDING,
                    0,
                    CgiFormat::R32G32B32A32Sfloat,
                    CgiVertexUsage::InstanceData,
                    0,
                ),
            ],
        );
        geometry_def.instance_binding_mask = 1 << INSTANCE_BINDING;
        geometry_def.dynamic_binding_mask = 1 << INSTANCE_BINDING;
        let geometry = renderer.create_geometry(&geometry_def)?;

        let (vertices, indices) = cube_mesh();
        geometry.create_vertex_buffer(0, (vertices.len() / VERTEX_STRIDE_FLOATS) as u32)?;
        geometry.create_vertex_buffer(INSTANCE_BINDING, cube_count)?;
        geometry.create_index_buffer(indices.len() as u32)?;
        renderer.execute_immediate(|command_buffer| {
            geometry.update_vertex_buffer(0, &vertices, Some(command_buffer))?;
            geometry.update_index_buffer(&indices, Some(command_buffer))
        })?;
        geometry.free_staging_buffers();

        let opaque_pipeline = renderer.create_pipeline(
            &CgiPipelineDef::graphics(
                &shader,
                "opaque",
                deferred_shading.gbuffer_render_pass(),
                GBUFFER_SUBPASS,
            )
            .with_geometry(&geometry, u32::MAX),
        )?;

        let mut transparent_def = CgiPipelineDef::graphics(
            &shader,
            "transparent",
            deferred_shading.compose_render_pass(),
            FORWARD_SUBPASS,
        )
        .with_geometry(&geometry, u32::MAX);
        transparent_def.depth_write = false;
        transparent_def.cull_mode = CgiCullMode::None;
        transparent_def.color_blend = vec![CgiBlendMode::Alpha];
        let transparent_pipeline = renderer.create_pipeline(&transparent_def)?;

        log::info!(
            "Created demo scene with {} cubes ({} indices each)",
            cube_count,
            indices.len()
        );

        Ok(DemoScene {
            shader,
            geometry,
            opaque_pipeline,
            transparent_pipeline,
            cube_count,
            index_count: indices.len() as u32,
        })
    }

    /// Lay the cubes out on a grid, bobbing with time. Written into this frame's instance region.
    pub fn update(
        &self,
        time: f32,
    ) -> CgiResult<()> {
        let side = (self.cube_count as f32).sqrt().ceil().max(1.0) as u32;
        let instances: Vec<[f32; 4]> = (0..self.cube_count)
            .map(|i| {
                let x = (i % side) as f32 - side as f32 * 0.5;
                let z = (i / side) as f32 - side as f32 * 0.5;
                let y = (time + i as f32 * 0.7).sin() * 0.25;
                [x * 1.5, y, z * 1.5, 0.8]
            })
            .collect();
        self.geometry
            .update_vertex_buffer(INSTANCE_BINDING, &instances, None)
    }

    pub fn camera(
        &self,
        time: f32,
        aspect_ratio: f32,
    ) -> DeferredCamera {
        let eye = Vec3::new((time * 0.2).cos() * 10.0, 5.0, (time * 0.2).sin() * 10.0);
        DeferredCamera::look_at(eye, Vec3::zero(), aspect_ratio, std::f32::consts::FRAC_PI_4)
    }

    pub fn omni_lights(
        &self,
        time: f32,
    ) -> Vec<OmniLight> {
        (0..4)
            .map(|i| {
                let angle = time + i as f32 * std::f32::consts::FRAC_PI_2;
                OmniLight {
                    position: Vec3::new(angle.cos() * 4.0, 1.5, angle.sin() * 4.0),
                    radius: 6.0,
                    color: Vec3::new(
                        0.5 + 0.5 * (i & 1) as f32,
                        0.5 + 0.5 * ((i >> 1) & 1) as f32,
                        1.0,
                    ),
                    intensity: 3.0,
                }
            })
            .collect()
    }

    fn bind(
        &self,
        command_buffer: &CgiCommandBuffer,
        pipeline: &CgiPipeline,
        camera: &DeferredCamera,
    ) -> CgiResult<()> {
        command_buffer.cmd_bind_pipeline(pipeline)?;
        command_buffer.cmd_push_constants(
            &self.shader,
            0,
            &PerView {
                view_proj: camera.view_proj.to_cols_array_2d(),
            },
        )?;
        command_buffer.cmd_bind_vertex_buffers(&self.geometry, u32::MAX)?;
        command_buffer.cmd_bind_index_buffer(&self.geometry)
    }

    /// Record into the G-buffer subpass
    pub fn draw_opaque(
        &self,
        command_buffer: &CgiCommandBuffer,
        camera: &DeferredCamera,
    ) -> CgiResult<()> {
        self.bind(command_buffer, &self.opaque_pipeline, camera)?;
        command_buffer.cmd_draw_indexed_instanced(self.index_count, 0, self.cube_count, 0, 0)
    }

    /// Record into the forward subpass. Draws a see-through copy of the first cube.
    pub fn draw_transparent(
        &self,
        command_buffer: &CgiCommandBuffer,
        camera: &DeferredCamera,
    ) -> CgiResult<()> {
        self.bind(command_buffer, &self.transparent_pipeline, camera)?;
        command_buffer.cmd_draw_indexed_instanced(self.index_count, 0, 1, 0, 0)
    }
}

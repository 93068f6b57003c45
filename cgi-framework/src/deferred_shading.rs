use crate::shaders;
use crate::{DeferredCamera, DirectionalLight, OmniLight, ReflectionParams, ToneMapParams};
use cgi_api::*;

pub const GBUFFER_ALBEDO_FORMAT: CgiFormat = CgiFormat::R8G8B8A8Srgb;
pub const GBUFFER_NORMAL_FORMAT: CgiFormat = CgiFormat::R16G16B16A16Sfloat;
pub const GBUFFER_MATERIAL_FORMAT: CgiFormat = CgiFormat::R8G8B8A8Unorm;
pub const DEPTH_FORMAT: CgiFormat = CgiFormat::D32Sfloat;
pub const LIGHT_ACCUMULATION_FORMAT: CgiFormat = CgiFormat::R16G16B16A16Sfloat;
pub const COMPOSED_FORMAT: CgiFormat = CgiFormat::R16G16B16A16Sfloat;

/// Subpasses of `gbuffer_render_pass()`
pub const GBUFFER_SUBPASS: u32 = 0;
pub const LIGHTING_SUBPASS: u32 = 1;

/// Subpasses of `compose_render_pass()`
pub const COMPOSE_SUBPASS: u32 = 0;
pub const FORWARD_SUBPASS: u32 = 1;

// Complex sets alive per shader set: the current targets plus the ones being replaced on resize
const COMPLEX_SET_CAPACITY: u32 = 4;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DeferredShadingConfig {
    /// Draw the screen-space reflection pass and tone map its output instead of the composed image
    pub reflections: bool,
    pub clear_color: [f32; 4],
}

impl Default for DeferredShadingConfig {
    fn default() -> Self {
        DeferredShadingConfig {
            reflections: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

//
// Render passes. Every attachment enters and leaves in the layout its texture rests in, so the
// passes can run in any order across frames without extra barriers.
//

fn gbuffer_render_pass_def() -> CgiRenderPassDef {
    CgiRenderPassDef::new(
        vec![
            CgiAttachment::new("GBufferAlbedo", GBUFFER_ALBEDO_FORMAT)
                .load_op_clear()
                .layout(CgiImageLayout::FsReadOnly),
            CgiAttachment::new("GBufferNormal", GBUFFER_NORMAL_FORMAT)
                .load_op_clear()
                .layout(CgiImageLayout::FsReadOnly),
            CgiAttachment::new("GBufferMaterial", GBUFFER_MATERIAL_FORMAT)
                .load_op_clear()
                .layout(CgiImageLayout::FsReadOnly),
            CgiAttachment::new("Depth", DEPTH_FORMAT)
                .load_op_clear()
                .layout(CgiImageLayout::DepthStencilReadOnly),
            CgiAttachment::new("LightDiffuse", LIGHT_ACCUMULATION_FORMAT)
                .load_op_clear()
                .layout(CgiImageLayout::FsReadOnly),
            CgiAttachment::new("LightSpecular", LIGHT_ACCUMULATION_FORMAT)
                .load_op_clear()
                .layout(CgiImageLayout::FsReadOnly),
        ],
        vec![
            CgiSubpass::new("GBuffer")
                .color(vec![
                    CgiAttachmentRef::new("GBufferAlbedo", CgiImageLayout::ColorAttachment),
                    CgiAttachmentRef::new("GBufferNormal", CgiImageLayout::ColorAttachment),
                    CgiAttachmentRef::new("GBufferMaterial", CgiImageLayout::ColorAttachment),
                ])
                .depth_stencil(CgiAttachmentRef::new(
                    "Depth",
                    CgiImageLayout::DepthStencilAttachment,
                )),
            CgiSubpass::new("Lighting")
                .input(vec![
                    CgiAttachmentRef::new("GBufferAlbedo", CgiImageLayout::FsReadOnly),
                    CgiAttachmentRef::new("GBufferNormal", CgiImageLayout::FsReadOnly),
                    CgiAttachmentRef::new("GBufferMaterial", CgiImageLayout::FsReadOnly),
                    CgiAttachmentRef::new("Depth", CgiImageLayout::DepthStencilReadOnly),
                ])
                .color(vec![
                    CgiAttachmentRef::new("LightDiffuse", CgiImageLayout::ColorAttachment),
                    CgiAttachmentRef::new("LightSpecular", CgiImageLayout::ColorAttachment),
                ])
                .depth_stencil(CgiAttachmentRef::new(
                    "Depth",
                    CgiImageLayout::DepthStencilReadOnly,
                )),
        ],
        vec![
            CgiDependency::new("GBuffer", "Lighting").mode(CgiDependencyMode::ColorToInput),
            CgiDependency::new("GBuffer", "Lighting").mode(CgiDependencyMode::DepthToInput),
        ],
    )
}

fn compose_render_pass_def() -> CgiRenderPassDef {
    CgiRenderPassDef::new(
        vec![
            // The compose draw covers every pixel
            CgiAttachment::new("Composed", COMPOSED_FORMAT)
                .load_op_dont_care()
                .layout(CgiImageLayout::FsReadOnly),
            CgiAttachment::new("Depth", DEPTH_FORMAT).layout(CgiImageLayout::DepthStencilReadOnly),
        ],
        vec![
            CgiSubpass::new("Compose").color(vec![CgiAttachmentRef::new(
                "Composed",
                CgiImageLayout::ColorAttachment,
            )]),
            CgiSubpass::new("Forward")
                .color(vec![CgiAttachmentRef::new(
                    "Composed",
                    CgiImageLayout::ColorAttachment,
                )])
                .depth_stencil(CgiAttachmentRef::new(
                    "Depth",
                    CgiImageLayout::DepthStencilReadOnly,
                )),
        ],
        vec![CgiDependency::new("Compose", "Forward").mode(CgiDependencyMode::AllGraphics)],
    )
}

fn reflection_render_pass_def() -> CgiRenderPassDef {
    CgiRenderPassDef::new(
        vec![CgiAttachment::new("Reflected", COMPOSED_FORMAT)
            .load_op_dont_care()
            .layout(CgiImageLayout::FsReadOnly)],
        vec![CgiSubpass::new("Reflection").color(vec![CgiAttachmentRef::new(
            "Reflected",
            CgiImageLayout::ColorAttachment,
        )])],
        vec![],
    )
}

fn present_render_pass_def(swapchain_format: CgiFormat) -> CgiRenderPassDef {
    CgiRenderPassDef::new(
        vec![CgiAttachment::new("Backbuffer", swapchain_format)
            .load_op_dont_care()
            .layout(CgiImageLayout::PresentSrc)],
        vec![CgiSubpass::new("ToneMap").color(vec![CgiAttachmentRef::new(
            "Backbuffer",
            CgiImageLayout::ColorAttachment,
        )])],
        vec![],
    )
}

#[derive(Copy, Clone, Debug)]
struct DeferredRenderPasses {
    gbuffer: CgiRenderPassHandle,
    compose: CgiRenderPassHandle,
    reflection: CgiRenderPassHandle,
    present: CgiRenderPassHandle,
}

impl DeferredRenderPasses {
    fn new(renderer: &CgiRenderer) -> CgiResult<Self> {
        Ok(DeferredRenderPasses {
            gbuffer: renderer.create_render_pass(&gbuffer_render_pass_def())?,
            compose: renderer.create_render_pass(&compose_render_pass_def())?,
            reflection: renderer.create_render_pass(&reflection_render_pass_def())?,
            present: renderer
                .create_render_pass(&present_render_pass_def(renderer.swapchain_def().format))?,
        })
    }

    fn destroy(
        self,
        renderer: &CgiRenderer,
    ) {
        renderer.delete_render_pass(self.gbuffer);
        renderer.delete_render_pass(self.compose);
        renderer.delete_render_pass(self.reflection);
        renderer.delete_render_pass(self.present);
    }
}

struct DeferredShaders {
    lighting: CgiShader,
    directional_light_pipeline: CgiPipeline,
    omni_light_pipeline: CgiPipeline,
    compose: CgiShader,
    compose_pipeline: CgiPipeline,
    reflection: CgiShader,
    reflection_pipeline: CgiPipeline,
    present: CgiShader,
    present_pipeline: CgiPipeline,
}

impl DeferredShaders {
    fn new(
        renderer: &CgiRenderer,
        render_passes: &DeferredRenderPasses,
    ) -> CgiResult<Self> {
        let fullscreen_stages = CgiShaderStageFlags::VS_FS;

        // Set 0: per-light root constants. Set 1: view constants and the G-buffer inputs.
        let lighting = renderer.create_shader(&CgiShaderDef::from_source(
            shaders::LIGHTING_SHADER_NAME,
            shaders::LIGHTING_SHADER,
        ))?;
        lighting.create_descriptor_set(&CgiDescriptorSetDef::new(
            0,
            std::mem::size_of::<crate::scene::LightConstants>() as u32,
            1,
            CgiShaderStageFlags::FRAGMENT,
        ))?;
        lighting.create_descriptor_set(
            &CgiDescriptorSetDef::new(
                1,
                std::mem::size_of::<crate::scene::ViewConstants>() as u32,
                COMPLEX_SET_CAPACITY,
                CgiShaderStageFlags::FRAGMENT,
            )
            .with_samplers(vec![CgiSetSampler::Input; 4]),
        )?;
        lighting.create_pipeline_layout()?;

        let mut light_pipeline_def = CgiPipelineDef::graphics(
            &lighting,
            "directional",
            render_passes.gbuffer,
            LIGHTING_SUBPASS,
        )
        .without_depth();
        light_pipeline_def.cull_mode = CgiCullMode::None;
        light_pipeline_def.color_blend = vec![CgiBlendMode::Additive; 2];
        let directional_light_pipeline = renderer.create_pipeline(&light_pipeline_def)?;
        light_pipeline_def.branch = "omni";
        let omni_light_pipeline = renderer.create_pipeline(&light_pipeline_def)?;

        let compose = renderer.create_shader(&CgiShaderDef::from_source(
            shaders::COMPOSE_SHADER_NAME,
            shaders::COMPOSE_SHADER,
        ))?;
        compose.create_descriptor_set(
            &CgiDescriptorSetDef::new(0, 0, COMPLEX_SET_CAPACITY, CgiShaderStageFlags::FRAGMENT)
                .with_samplers(vec![
                    CgiSetSampler::Static(CgiSamplerDef::nearest_clamp());
                    3
                ]),
        )?;
        compose.create_pipeline_layout()?;
        let compose_pipeline = renderer.create_pipeline(
            &CgiPipelineDef::graphics(&compose, "compose", render_passes.compose, COMPOSE_SUBPASS)
                .without_depth(),
        )?;

        let reflection = renderer.create_shader(&CgiShaderDef::from_source(
            shaders::REFLECTION_SHADER_NAME,
            shaders::REFLECTION_SHADER,
        ))?;
        reflection.create_descriptor_set(&CgiDescriptorSetDef::new(
            0,
            std::mem::size_of::<crate::scene::ReflectionConstants>() as u32,
            1,
            fullscreen_stages,
        ))?;
        reflection.create_descriptor_set(
            &CgiDescriptorSetDef::new(1, 0, COMPLEX_SET_CAPACITY, CgiShaderStageFlags::FRAGMENT)
                .with_samplers(vec![
                    CgiSetSampler::Static(CgiSamplerDef::linear_clamp());
                    3
                ]),
        )?;
        reflection.create_pipeline_layout()?;
        let reflection_pipeline = renderer.create_pipeline(
            &CgiPipelineDef::graphics(&reflection, "reflect", render_passes.reflection, 0)
                .without_depth(),
        )?;

        let present = renderer.create_shader(&CgiShaderDef::from_source(
            shaders::PRESENT_SHADER_NAME,
            shaders::PRESENT_SHADER,
        ))?;
        present.create_descriptor_set(&CgiDescriptorSetDef::new(
            0,
            std::mem::size_of::<crate::scene::ToneMapConstants>() as u32,
            1,
            CgiShaderStageFlags::FRAGMENT,
        ))?;
        // Two complex sets per generation of targets, one per possible source image
        present.create_descriptor_set(
            &CgiDescriptorSetDef::new(
                1,
                0,
                2 * COMPLEX_SET_CAPACITY,
                CgiShaderStageFlags::FRAGMENT,
            )
            .with_samplers(vec![CgiSetSampler::Static(CgiSamplerDef::linear_clamp())]),
        )?;
        present.create_pipeline_layout()?;
        let present_pipeline = renderer.create_pipeline(
            &CgiPipelineDef::graphics(&present, "tonemap", render_passes.present, 0)
                .without_depth(),
        )?;

        Ok(DeferredShaders {
            lighting,
            directional_light_pipeline,
            omni_light_pipeline,
            compose,
            compose_pipeline,
            reflection,
            reflection_pipeline,
            present,
            present_pipeline,
        })
    }
}

/// Size-dependent resources: every render target, the framebuffers built on them and the
/// complex sets that sample them. Rebuilt when the swap chain is resized.
struct DeferredTargets {
    width: u32,
    height: u32,
    gbuffer_albedo: CgiTexture,
    gbuffer_normal: CgiTexture,
    gbuffer_material: CgiTexture,
    depth: CgiTexture,
    light_diffuse: CgiTexture,
    light_specular: CgiTexture,
    composed: CgiTexture,
    reflected: CgiTexture,

    gbuffer_framebuffer: CgiFramebufferHandle,
    compose_framebuffer: CgiFramebufferHandle,
    reflection_framebuffer: CgiFramebufferHandle,
    present_framebuffers: Vec<CgiFramebufferHandle>,

    lighting_inputs: CgiComplexSetHandle,
    compose_inputs: CgiComplexSetHandle,
    reflection_inputs: CgiComplexSetHandle,
    present_composed: CgiComplexSetHandle,
    present_reflected: CgiComplexSetHandle,
}

fn create_target(
    renderer: &CgiRenderer,
    name: &str,
    format: CgiFormat,
    width: u32,
    height: u32,
) -> CgiResult<CgiTexture> {
    let (usage, layout) = if format.is_depth() {
        (
            CgiTextureUsage::DEPTH_STENCIL
                | CgiTextureUsage::SAMPLED
                | CgiTextureUsage::INPUT_ATTACHMENT,
            CgiImageLayout::DepthStencilReadOnly,
        )
    } else {
        (
            CgiTextureUsage::RENDER_TARGET
                | CgiTextureUsage::SAMPLED
                | CgiTextureUsage::INPUT_ATTACHMENT,
            CgiImageLayout::FsReadOnly,
        )
    };

    let mut texture_def = CgiTextureDef::new_2d(name, format, width, height, usage);
    texture_def.initial_layout = Some(layout);
    renderer.create_texture(&texture_def)
}

impl DeferredTargets {
    fn new(
        renderer: &CgiRenderer,
        render_passes: &DeferredRenderPasses,
        shaders: &DeferredShaders,
    ) -> CgiResult<Self> {
        let swapchain_def = renderer.swapchain_def();
        let (width, height) = (swapchain_def.width, swapchain_def.height);
        log::debug!("Creating deferred targets at {}x{}", width, height);

        let gbuffer_albedo =
            create_target(renderer, "gbuffer albedo", GBUFFER_ALBEDO_FORMAT, width, height)?;
        let gbuffer_normal =
            create_target(renderer, "gbuffer normal", GBUFFER_NORMAL_FORMAT, width, height)?;
        let gbuffer_material =
            create_target(renderer, "gbuffer material", GBUFFER_MATERIAL_FORMAT, width, height)?;
        let depth = create_target(renderer, "depth", DEPTH_FORMAT, width, height)?;
        let light_diffuse =
            create_target(renderer, "light diffuse", LIGHT_ACCUMULATION_FORMAT, width, height)?;
        let light_specular =
            create_target(renderer, "light specular", LIGHT_ACCUMULATION_FORMAT, width, height)?;
        let composed = create_target(renderer, "composed", COMPOSED_FORMAT, width, height)?;
        let reflected = create_target(renderer, "reflected", COMPOSED_FORMAT, width, height)?;

        let framebuffer = |render_pass: CgiRenderPassHandle, textures: &[&CgiTexture]| {
            renderer.create_framebuffer(&CgiFramebufferDef {
                render_pass,
                attachments: textures
                    .iter()
                    .map(|texture| CgiFramebufferAttachment::new(texture))
                    .collect(),
                width,
                height,
                swapchain_image: None,
            })
        };

        let gbuffer_framebuffer = framebuffer(
            render_passes.gbuffer,
            &[
                &gbuffer_albedo,
                &gbuffer_normal,
                &gbuffer_material,
                &depth,
                &light_diffuse,
                &light_specular,
            ],
        )?;
        let compose_framebuffer = framebuffer(render_passes.compose, &[&composed, &depth])?;
        let reflection_framebuffer = framebuffer(render_passes.reflection, &[&reflected])?;

        let present_framebuffers = (0..renderer.swapchain_image_count())
            .map(|image_index| {
                renderer.create_framebuffer(&CgiFramebufferDef {
                    render_pass: render_passes.present,
                    attachments: vec![],
                    width,
                    height,
                    swapchain_image: Some(image_index),
                })
            })
            .collect::<CgiResult<Vec<_>>>()?;

        let lighting_inputs = shaders.lighting.bind_descriptor_set_textures(
            1,
            &[&gbuffer_albedo, &gbuffer_normal, &gbuffer_material, &depth],
            None,
        )?;
        let compose_inputs = shaders.compose.bind_descriptor_set_textures(
            0,
            &[&gbuffer_albedo, &light_diffuse, &light_specular],
            None,
        )?;
        let reflection_inputs = shaders.reflection.bind_descriptor_set_textures(
            1,
            &[&composed, &gbuffer_normal, &depth],
            None,
        )?;
        let present_composed = shaders
            .present
            .bind_descriptor_set_textures(1, &[&composed], None)?;
        let present_reflected = shaders
            .present
            .bind_descriptor_set_textures(1, &[&reflected], None)?;

        Ok(DeferredTargets {
            width,
            height,
            gbuffer_albedo,
            gbuffer_normal,
            gbuffer_material,
            depth,
            light_diffuse,
            light_specular,
            composed,
            reflected,
            gbuffer_framebuffer,
            compose_framebuffer,
            reflection_framebuffer,
            present_framebuffers,
            lighting_inputs,
            compose_inputs,
            reflection_inputs,
            present_composed,
            present_reflected,
        })
    }

    // The textures are released when the last framebuffer and complex set referencing them is
    // gone, after the GPU is done with them
    fn destroy(
        self,
        renderer: &CgiRenderer,
        shaders: &DeferredShaders,
    ) {
        shaders.lighting.free_descriptor_set(self.lighting_inputs);
        shaders.compose.free_descriptor_set(self.compose_inputs);
        shaders.reflection.free_descriptor_set(self.reflection_inputs);
        shaders.present.free_descriptor_set(self.present_composed);
        shaders.present.free_descriptor_set(self.present_reflected);

        renderer.delete_framebuffer(self.gbuffer_framebuffer);
        renderer.delete_framebuffer(self.compose_framebuffer);
        renderer.delete_framebuffer(self.reflection_framebuffer);
        for framebuffer in self.present_framebuffers {
            renderer.delete_framebuffer(framebuffer);
        }
    }
}

/// A deferred renderer: G-buffer and lighting, compose and forward, screen-space reflection and
/// a tone-mapped copy to the swap chain.
///
/// Per frame, record into the frame's command buffer in this order:
///
/// ```text
/// begin_geometry_pass      -> draw opaque geometry with pipelines for GBUFFER_SUBPASS
/// end_geometry_pass
/// begin_lighting_pass      -> draw_directional_light / draw_omni_lights
/// end_lighting_pass
/// begin_compose_and_forward -> draw transparent geometry with pipelines for FORWARD_SUBPASS
/// end_compose_and_forward
/// draw_reflection
/// draw_to_swapchain
/// ```
pub struct DeferredShading {
    config: DeferredShadingConfig,
    render_passes: DeferredRenderPasses,
    shaders: DeferredShaders,
    targets: DeferredTargets,
}

impl DeferredShading {
    pub fn new(renderer: &CgiRenderer) -> CgiResult<Self> {
        Self::with_config(renderer, DeferredShadingConfig::default())
    }

    pub fn with_config(
        renderer: &CgiRenderer,
        config: DeferredShadingConfig,
    ) -> CgiResult<Self> {
        profiling::scope!("DeferredShading::new");
        let render_passes = DeferredRenderPasses::new(renderer)?;
        let shaders = DeferredShaders::new(renderer, &render_passes)?;
        let targets = DeferredTargets::new(renderer, &render_passes, &shaders)?;
        log::info!(
            "Created deferred shading at {}x{} (reflections {})",
            targets.width,
            targets.height,
            config.reflections
        );

        Ok(DeferredShading {
            config,
            render_passes,
            shaders,
            targets,
        })
    }

    /// Release the render passes and framebuffers. Call it before dropping the renderer.
    pub fn destroy(
        self,
        renderer: &CgiRenderer,
    ) {
        self.targets.destroy(renderer, &self.shaders);
        self.render_passes.destroy(renderer);
    }

    pub fn config(&self) -> &DeferredShadingConfig {
        &self.config
    }

    /// Render pass of the G-buffer and lighting subpasses. Geometry pipelines target
    /// `GBUFFER_SUBPASS`.
    pub fn gbuffer_render_pass(&self) -> CgiRenderPassHandle {
        self.render_passes.gbuffer
    }

    /// Render pass of the compose and forward subpasses. Forward pipelines target
    /// `FORWARD_SUBPASS` and test against the G-buffer depth without writing it.
    pub fn compose_render_pass(&self) -> CgiRenderPassHandle {
        self.render_passes.compose
    }

    pub fn reflection_render_pass(&self) -> CgiRenderPassHandle {
        self.render_passes.reflection
    }

    pub fn present_render_pass(&self) -> CgiRenderPassHandle {
        self.render_passes.present
    }

    pub fn extents(&self) -> (u32, u32) {
        (self.targets.width, self.targets.height)
    }

    pub fn depth_texture(&self) -> &CgiTexture {
        &self.targets.depth
    }

    pub fn gbuffer_textures(&self) -> [&CgiTexture; 3] {
        [
            &self.targets.gbuffer_albedo,
            &self.targets.gbuffer_normal,
            &self.targets.gbuffer_material,
        ]
    }

    pub fn light_accumulation_textures(&self) -> [&CgiTexture; 2] {
        [&self.targets.light_diffuse, &self.targets.light_specular]
    }

    /// The image `draw_to_swapchain` tone maps
    pub fn output_texture(&self) -> &CgiTexture {
        if self.config.reflections {
            &self.targets.reflected
        } else {
            &self.targets.composed
        }
    }

    /// Rebuild the targets at the swap chain's new size. Call after
    /// `CgiRenderer::resize_swapchain`.
    pub fn on_swapchain_resized(
        &mut self,
        renderer: &CgiRenderer,
    ) -> CgiResult<()> {
        let targets = DeferredTargets::new(renderer, &self.render_passes, &self.shaders)?;
        let old_targets = std::mem::replace(&mut self.targets, targets);
        old_targets.destroy(renderer, &self.shaders);
        log::info!(
            "Resized deferred shading to {}x{}",
            self.targets.width,
            self.targets.height
        );
        Ok(())
    }

    /// Begin the G-buffer render pass in its geometry subpass. Every attachment is cleared, depth
    /// to 0 for reverse-z.
    pub fn begin_geometry_pass(
        &self,
        command_buffer: &CgiCommandBuffer,
    ) -> CgiResult<()> {
        profiling::scope!("begin_geometry_pass");
        let clear_values = [
            CgiClearValue::Color(self.config.clear_color),
            CgiClearValue::Color([0.5, 0.5, 1.0, 0.0]),
            CgiClearValue::Color([0.0; 4]),
            CgiClearValue::DepthStencil {
                depth: 0.0,
                stencil: 0,
            },
            CgiClearValue::Color([0.0; 4]),
            CgiClearValue::Color([0.0; 4]),
        ];
        command_buffer.cmd_begin_render_pass(
            self.render_passes.gbuffer,
            self.targets.gbuffer_framebuffer,
            &clear_values,
            CgiViewportFlags::empty(),
        )
    }

    /// Leave the geometry subpass. The G-buffer becomes readable as input attachments.
    pub fn end_geometry_pass(
        &self,
        command_buffer: &CgiCommandBuffer,
    ) -> CgiResult<()> {
        command_buffer.cmd_next_subpass()
    }

    /// Upload the camera and bind the G-buffer inputs for the light draws
    pub fn begin_lighting_pass(
        &self,
        command_buffer: &CgiCommandBuffer,
        camera: &DeferredCamera,
    ) -> CgiResult<()> {
        profiling::scope!("begin_lighting_pass");
        let lighting = &self.shaders.lighting;
        lighting.begin_bind_descriptors();
        let written = lighting.write_uniform(1, &camera.view_constants());
        lighting.end_bind_descriptors();
        written?;

        // Both light pipelines share the root signature, so the view set stays bound
        command_buffer.cmd_bind_pipeline(&self.shaders.directional_light_pipeline)?;
        command_buffer.cmd_bind_descriptors(lighting, 1, Some(self.targets.lighting_inputs))
    }

    pub fn draw_directional_light(
        &self,
        command_buffer: &CgiCommandBuffer,
        light: &DirectionalLight,
    ) -> CgiResult<()> {
        command_buffer.cmd_bind_pipeline(&self.shaders.directional_light_pipeline)?;
        command_buffer.cmd_push_constants(&self.shaders.lighting, 0, &light.light_constants())?;
        command_buffer.cmd_draw(3, 0)
    }

    /// One fullscreen draw per light, accumulated additively
    pub fn draw_omni_lights(
        &self,
        command_buffer: &CgiCommandBuffer,
        lights: &[OmniLight],
    ) -> CgiResult<()> {
        profiling::scope!("draw_omni_lights");
        if lights.is_empty() {
            return Ok(());
        }

        command_buffer.cmd_bind_pipeline(&self.shaders.omni_light_pipeline)?;
        for light in lights {
            command_buffer.cmd_push_constants(
                &self.shaders.lighting,
                0,
                &light.light_constants(),
            )?;
            command_buffer.cmd_draw(3, 0)?;
        }
        Ok(())
    }

    pub fn end_lighting_pass(
        &self,
        command_buffer: &CgiCommandBuffer,
    ) -> CgiResult<()> {
        command_buffer.cmd_end_render_pass()
    }

    /// Combine albedo and accumulated light into the composed image, then move on to the forward
    /// subpass so transparent geometry can be drawn on top
    pub fn begin_compose_and_forward(
        &self,
        command_buffer: &CgiCommandBuffer,
    ) -> CgiResult<()> {
        profiling::scope!("begin_compose_and_forward");
        command_buffer.cmd_begin_render_pass(
            self.render_passes.compose,
            self.targets.compose_framebuffer,
            &[],
            CgiViewportFlags::empty(),
        )?;
        command_buffer.cmd_bind_pipeline(&self.shaders.compose_pipeline)?;
        command_buffer.cmd_bind_descriptors(
            &self.shaders.compose,
            0,
            Some(self.targets.compose_inputs),
        )?;
        command_buffer.cmd_draw(3, 0)?;
        command_buffer.cmd_next_subpass()
    }

    pub fn end_compose_and_forward(
        &self,
        command_buffer: &CgiCommandBuffer,
    ) -> CgiResult<()> {
        command_buffer.cmd_end_render_pass()
    }

    /// Screen-space reflection from the composed image into the reflected image. Does nothing
    /// when reflections are disabled.
    pub fn draw_reflection(
        &self,
        command_buffer: &CgiCommandBuffer,
        params: &ReflectionParams,
    ) -> CgiResult<()> {
        profiling::scope!("draw_reflection");
        if !self.config.reflections {
            log::trace!("Reflections are disabled, skipping the reflection pass");
            return Ok(());
        }

        command_buffer.cmd_begin_render_pass(
            self.render_passes.reflection,
            self.targets.reflection_framebuffer,
            &[],
            CgiViewportFlags::empty(),
        )?;
        command_buffer.cmd_bind_pipeline(&self.shaders.reflection_pipeline)?;
        command_buffer.cmd_push_constants(
            &self.shaders.reflection,
            0,
            &params.reflection_constants(),
        )?;
        command_buffer.cmd_bind_descriptors(
            &self.shaders.reflection,
            1,
            Some(self.targets.reflection_inputs),
        )?;
        command_buffer.cmd_draw(3, 0)?;
        command_buffer.cmd_end_render_pass()
    }

    /// Tone map the output image into a swap chain image. The image is left in the present
    /// layout.
    pub fn draw_to_swapchain(
        &self,
        command_buffer: &CgiCommandBuffer,
        swapchain_image_index: u32,
        tone_map: &ToneMapParams,
    ) -> CgiResult<()> {
        profiling::scope!("draw_to_swapchain");
        let framebuffer = *self
            .targets
            .present_framebuffers
            .get(swapchain_image_index as usize)
            .ok_or_else(|| {
                format!(
                    "no framebuffer for swap chain image {}, was on_swapchain_resized called?",
                    swapchain_image_index
                )
            })?;
        let source = if self.config.reflections {
            self.targets.present_reflected
        } else {
            self.targets.present_composed
        };

        command_buffer.cmd_begin_render_pass(
            self.render_passes.present,
            framebuffer,
            &[],
            CgiViewportFlags::empty(),
        )?;
        command_buffer.cmd_bind_pipeline(&self.shaders.present_pipeline)?;
        command_buffer.cmd_push_constants(
            &self.shaders.present,
            0,
            &tone_map.tone_map_constants(),
        )?;
        command_buffer.cmd_bind_descriptors(&self.shaders.present, 1, Some(source))?;
        command_buffer.cmd_draw(3, 0)?;
        command_buffer.cmd_end_render_pass()
    }
}

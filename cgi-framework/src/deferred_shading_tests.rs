use crate::*;
use cgi_api::*;
use glam::Vec3;

// Geometry and forward pipelines come from the caller, this stands in for a material shader
const SCENE_SHADER: &str = r#"
//@ gbuffer
//@ forward

#ifdef _VS
float4 gbufferVS(uint id : SV_VertexID) : SV_Position { return float4(0, 0, 0, 1); }
float4 forwardVS(uint id : SV_VertexID) : SV_Position { return float4(0, 0, 0, 1); }
#endif

#ifdef _FS
struct GBufferOutput
{
    float4 albedo : SV_Target0;
    float4 normal : SV_Target1;
    float4 material : SV_Target2;
};

GBufferOutput gbufferFS()
{
    GBufferOutput output;
    output.albedo = float4(1, 1, 1, 1);
    output.normal = float4(0.5, 0.5, 1, 0);
    output.material = float4(0.25, 0, 0, 0);
    return output;
}

float4 forwardFS() : SV_Target { return float4(1, 1, 1, 0.5); }
#endif
"#;

fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(true)
        .try_init();
}

fn test_renderer() -> CgiRenderer {
    init_logging();
    let renderer_def = CgiRendererDef {
        ring_buffer_size: 2,
        validation_mode: CgiValidationMode::Enabled,
        swapchain: CgiSwapchainDef {
            width: 256,
            height: 256,
            image_count: 2,
            ..Default::default()
        },
        ..Default::default()
    };
    create_renderer(CGI_SDK_VERSION, &renderer_def).unwrap()
}

struct ScenePipelines {
    _shader: CgiShader,
    gbuffer: CgiPipeline,
    forward: CgiPipeline,
}

fn scene_pipelines(
    renderer: &CgiRenderer,
    deferred_shading: &DeferredShading,
) -> ScenePipelines {
    let shader = renderer
        .create_shader(&CgiShaderDef::from_source("scene.hlsl", SCENE_SHADER))
        .unwrap();
    shader.create_pipeline_layout().unwrap();

    let gbuffer = renderer
        .create_pipeline(&CgiPipelineDef::graphics(
            &shader,
            "gbuffer",
            deferred_shading.gbuffer_render_pass(),
            GBUFFER_SUBPASS,
        ))
        .unwrap();

    let mut forward_def = CgiPipelineDef::graphics(
        &shader,
        "forward",
        deferred_shading.compose_render_pass(),
        FORWARD_SUBPASS,
    );
    forward_def.depth_write = false;
    forward_def.color_blend = vec![CgiBlendMode::Alpha];
    let forward = renderer.create_pipeline(&forward_def).unwrap();

    ScenePipelines {
        _shader: shader,
        gbuffer,
        forward,
    }
}

fn camera() -> DeferredCamera {
    DeferredCamera::look_at(
        Vec3::new(0.0, 2.0, 5.0),
        Vec3::zero(),
        1.0,
        std::f32::consts::FRAC_PI_4,
    )
}

fn omni_lights() -> Vec<OmniLight> {
    vec![
        OmniLight {
            position: Vec3::new(1.0, 1.0, 0.0),
            radius: 4.0,
            color: Vec3::new(1.0, 0.8, 0.6),
            intensity: 2.0,
        },
        OmniLight {
            position: Vec3::new(-1.0, 1.0, 0.0),
            radius: 4.0,
            color: Vec3::new(0.6, 0.8, 1.0),
            intensity: 2.0,
        },
    ]
}

/// Record and present one frame of the whole pipeline
fn render_frame(
    renderer: &mut CgiRenderer,
    deferred_shading: &DeferredShading,
    pipelines: &ScenePipelines,
) {
    renderer.begin_frame(true).unwrap();
    let image_index = renderer.current_swapchain_image_index().unwrap();
    let command_buffer = renderer.command_buffer();

    deferred_shading.begin_geometry_pass(command_buffer).unwrap();
    command_buffer.cmd_bind_pipeline(&pipelines.gbuffer).unwrap();
    command_buffer.cmd_draw(3, 0).unwrap();
    deferred_shading.end_geometry_pass(command_buffer).unwrap();

    deferred_shading
        .begin_lighting_pass(command_buffer, &camera())
        .unwrap();
    deferred_shading
        .draw_directional_light(
            command_buffer,
            &DirectionalLight {
                direction: Vec3::new(-1.0, -1.0, -1.0),
                color: Vec3::one(),
                intensity: 1.0,
            },
        )
        .unwrap();
    deferred_shading
        .draw_omni_lights(command_buffer, &omni_lights())
        .unwrap();
    deferred_shading.end_lighting_pass(command_buffer).unwrap();

    deferred_shading
        .begin_compose_and_forward(command_buffer)
        .unwrap();
    command_buffer.cmd_bind_pipeline(&pipelines.forward).unwrap();
    command_buffer.cmd_draw(3, 0).unwrap();
    deferred_shading
        .end_compose_and_forward(command_buffer)
        .unwrap();

    deferred_shading
        .draw_reflection(command_buffer, &ReflectionParams::default())
        .unwrap();
    deferred_shading
        .draw_to_swapchain(command_buffer, image_index, &ToneMapParams::default())
        .unwrap();

    renderer.end_frame(true).unwrap();
}

fn recorded_commands(
    command_buffer: &CgiCommandBuffer,
) -> Vec<headless::internal::CgiNativeCommand> {
    command_buffer
        .headless_command_buffer()
        .unwrap()
        .recorded_commands()
}

#[test]
fn full_frames_present_without_validation_errors() {
    let mut renderer = test_renderer();
    let deferred_shading = DeferredShading::new(&renderer).unwrap();
    let pipelines = scene_pipelines(&renderer, &deferred_shading);

    for _ in 0..3 {
        render_frame(&mut renderer, &deferred_shading, &pipelines);
    }
    renderer.wait_idle();

    let stats = renderer.frame_stats();
    assert_eq!(stats.gpu.validation_errors, 0);
    assert_eq!(stats.gpu.presents, 3);
    // geometry, directional, two omni, compose, forward, reflection, tone map
    assert_eq!(stats.gpu.draw_calls, 3 * 8);

    drop(pipelines);
    deferred_shading.destroy(&renderer);
}

#[test]
fn geometry_to_lighting_transitions_every_attachment() {
    let mut renderer = test_renderer();
    let deferred_shading = DeferredShading::new(&renderer).unwrap();

    renderer.begin_frame(false).unwrap();
    let command_buffer = renderer.command_buffer();
    deferred_shading.begin_geometry_pass(command_buffer).unwrap();

    let before = recorded_commands(command_buffer).len();
    deferred_shading.end_geometry_pass(command_buffer).unwrap();
    let added = recorded_commands(command_buffer)[before..].to_vec();

    // The G-buffer becomes input, depth read-only and the light targets start rendering
    let barrier_count: usize = added.iter().map(|command| command.barrier_count()).sum();
    assert_eq!(barrier_count, 6);
    assert_eq!(
        command_buffer
            .headless_command_buffer()
            .unwrap()
            .current_subpass(),
        Some(LIGHTING_SUBPASS)
    );

    deferred_shading
        .begin_lighting_pass(command_buffer, &camera())
        .unwrap();
    deferred_shading.draw_omni_lights(command_buffer, &[]).unwrap();
    deferred_shading.end_lighting_pass(command_buffer).unwrap();
    renderer.end_frame(false).unwrap();
    renderer.wait_idle();
    assert_eq!(renderer.frame_stats().gpu.validation_errors, 0);

    deferred_shading.destroy(&renderer);
}

#[test]
fn disabled_reflections_tone_map_the_composed_image() {
    let mut renderer = test_renderer();
    let deferred_shading = DeferredShading::with_config(
        &renderer,
        DeferredShadingConfig {
            reflections: false,
            ..Default::default()
        },
    )
    .unwrap();
    let pipelines = scene_pipelines(&renderer, &deferred_shading);
    assert_eq!(deferred_shading.output_texture().texture_def().name, "composed");

    render_frame(&mut renderer, &deferred_shading, &pipelines);
    renderer.wait_idle();

    let stats = renderer.frame_stats();
    assert_eq!(stats.gpu.validation_errors, 0);
    assert_eq!(stats.gpu.draw_calls, 7);

    drop(pipelines);
    deferred_shading.destroy(&renderer);
}

#[test]
fn resizing_recreates_the_targets() {
    let mut renderer = test_renderer();
    let mut deferred_shading = DeferredShading::new(&renderer).unwrap();
    let pipelines = scene_pipelines(&renderer, &deferred_shading);
    render_frame(&mut renderer, &deferred_shading, &pipelines);

    // More resizes than complex sets per shader set, so the old ones must be released
    for (width, height) in [(128, 64), (320, 200), (64, 64), (200, 100), (512, 256)].iter() {
        renderer.resize_swapchain(*width, *height).unwrap();
        deferred_shading.on_swapchain_resized(&renderer).unwrap();
        assert_eq!(deferred_shading.extents(), (*width, *height));
        assert_eq!(deferred_shading.depth_texture().texture_def().width, *width);
        for texture in deferred_shading.gbuffer_textures().iter() {
            assert_eq!(texture.texture_def().height, *height);
        }

        render_frame(&mut renderer, &deferred_shading, &pipelines);
    }
    renderer.wait_idle();

    let stats = renderer.frame_stats();
    assert_eq!(stats.gpu.validation_errors, 0);
    assert_eq!(stats.gpu.presents, 6);

    drop(pipelines);
    deferred_shading.destroy(&renderer);
}

#[test]
fn unknown_swapchain_images_are_rejected() {
    let mut renderer = test_renderer();
    let deferred_shading = DeferredShading::new(&renderer).unwrap();

    renderer.begin_frame(false).unwrap();
    let result = deferred_shading.draw_to_swapchain(
        renderer.command_buffer(),
        renderer.swapchain_image_count(),
        &ToneMapParams::default(),
    );
    assert!(result.is_err());
    renderer.end_frame(false).unwrap();

    deferred_shading.destroy(&renderer);
}

#[test]
fn destroy_releases_the_render_passes() {
    let renderer = test_renderer();
    let deferred_shading = DeferredShading::new(&renderer).unwrap();
    let gbuffer_render_pass = deferred_shading.gbuffer_render_pass();
    let [albedo, normal, material] = deferred_shading.gbuffer_textures();
    let [diffuse, specular] = deferred_shading.light_accumulation_textures();
    let attachments: Vec<_> = [
        albedo,
        normal,
        material,
        deferred_shading.depth_texture(),
        diffuse,
        specular,
    ]
    .iter()
    .map(|texture| CgiFramebufferAttachment::new(texture))
    .collect();

    let framebuffer_def = CgiFramebufferDef {
        render_pass: gbuffer_render_pass,
        attachments,
        width: 256,
        height: 256,
        swapchain_image: None,
    };
    let framebuffer = renderer.create_framebuffer(&framebuffer_def).unwrap();
    renderer.delete_framebuffer(framebuffer);

    deferred_shading.destroy(&renderer);
    assert!(renderer.create_framebuffer(&framebuffer_def).is_err());
}

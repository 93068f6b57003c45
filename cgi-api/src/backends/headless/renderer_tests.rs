use super::internal::CgiNativeCommand;
use super::{CgiDeviceContextHeadless, CgiFrameInfo, CgiFrameListener};
use crate::*;
use bytemuck::{Pod, Zeroable};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TEST_SHADER: &str = r#"
//@ main
//@ main:Tinted TINT=2
//@ fill (C)

cbuffer PerDraw : register(b0, space0) { float4 color; };
Texture2D albedo : register(t0, space1);

#ifdef _VS
float4 mainVS(uint id : SV_VertexID) : SV_Position { return float4(0, 0, 0, 1); }
#endif

#ifdef _FS
float4 mainFS() : SV_Target {
#if TINT
    return color * TINT;
#else
    return color;
#endif
}
#endif

#ifdef _CS
[numthreads(8, 8, 1)]
void fillCS(uint3 id : SV_DispatchThreadID) {}
#endif
"#;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct PerDraw {
    color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct PerMaterial {
    tint: [f32; 4],
    transform: [[f32; 4]; 4],
}

fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(true)
        .try_init();
}

fn test_renderer(
    ring_buffer_size: u32,
    gpu_timeline: CgiGpuTimeline,
) -> CgiRenderer {
    init_logging();
    let renderer_def = CgiRendererDef {
        ring_buffer_size,
        validation_mode: CgiValidationMode::Enabled,
        swapchain: CgiSwapchainDef {
            width: 256,
            height: 256,
            image_count: 2,
            ..Default::default()
        },
        gpu_timeline,
        ..Default::default()
    };
    create_renderer(CGI_SDK_VERSION, &renderer_def).unwrap()
}

fn color_target(
    renderer: &CgiRenderer,
    name: &str,
) -> CgiTexture {
    let mut texture_def = CgiTextureDef::new_2d(
        name,
        CgiFormat::R8G8B8A8Unorm,
        256,
        256,
        CgiTextureUsage::RENDER_TARGET | CgiTextureUsage::SAMPLED,
    );
    texture_def.initial_layout = Some(CgiImageLayout::FsReadOnly);
    renderer.create_texture(&texture_def).unwrap()
}

fn single_target_pass() -> CgiRenderPassDef {
    CgiRenderPassDef::new(
        vec![CgiAttachment::new("Color", CgiFormat::R8G8B8A8Unorm)
            .load_op_clear()
            .layout(CgiImageLayout::FsReadOnly)],
        vec![CgiSubpass::new("Main").color(vec![CgiAttachmentRef::new(
            "Color",
            CgiImageLayout::ColorAttachment,
        )])],
        vec![],
    )
}

// Set 0 is small enough for root constants, set 1 has a constant buffer and one texture
fn test_shader(renderer: &CgiRenderer) -> CgiShader {
    let shader = renderer
        .create_shader(&CgiShaderDef::from_source("test.hlsl", TEST_SHADER))
        .unwrap();
    shader
        .create_descriptor_set(&CgiDescriptorSetDef::new(
            0,
            std::mem::size_of::<PerDraw>() as u32,
            16,
            CgiShaderStageFlags::VS_FS,
        ))
        .unwrap();
    shader
        .create_descriptor_set(
            &CgiDescriptorSetDef::new(
                1,
                std::mem::size_of::<PerMaterial>() as u32,
                8,
                CgiShaderStageFlags::FRAGMENT,
            )
            .with_samplers(vec![CgiSetSampler::Custom]),
        )
        .unwrap();
    shader.create_pipeline_layout().unwrap();
    shader
}

fn checker_texture(renderer: &CgiRenderer) -> CgiTexture {
    let texture = renderer
        .create_texture(&CgiTextureDef::new_2d(
            "checker",
            CgiFormat::R8G8B8A8Unorm,
            4,
            4,
            CgiTextureUsage::SAMPLED,
        ))
        .unwrap();
    let pixels: Vec<u8> = (0..16u8)
        .flat_map(|i| {
            let v = if i % 2 == 0 { 255 } else { 0 };
            vec![v, v, v, 255]
        })
        .collect();
    renderer
        .execute_immediate(|command_buffer| texture.update_image(command_buffer, 0, 0, &pixels))
        .unwrap();
    texture.free_staging_buffers();
    texture
}

fn recorded_commands(command_buffer: &CgiCommandBuffer) -> Vec<CgiNativeCommand> {
    command_buffer
        .headless_command_buffer()
        .unwrap()
        .recorded_commands()
}

#[test]
fn end_to_end_frames_do_not_stall() {
    let mut renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let target = color_target(&renderer, "target");
    let render_pass = renderer.create_render_pass(&single_target_pass()).unwrap();
    let framebuffer = renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: vec![CgiFramebufferAttachment::new(&target)],
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .unwrap();

    let shader = test_shader(&renderer);
    let pipeline = renderer
        .create_pipeline(&CgiPipelineDef::graphics(&shader, "main", render_pass, 0).without_depth())
        .unwrap();
    let checker = checker_texture(&renderer);
    let material = shader
        .bind_descriptor_set_textures(1, &[&checker], None)
        .unwrap();

    for frame in 0..2 {
        renderer.begin_frame(false).unwrap();
        let command_buffer = renderer.command_buffer();
        command_buffer
            .cmd_begin_render_pass(
                render_pass,
                framebuffer,
                &[CgiClearValue::Color([0.0, 0.0, 0.0, 1.0])],
                CgiViewportFlags::empty(),
            )
            .unwrap();
        command_buffer.cmd_bind_pipeline(&pipeline).unwrap();

        shader.begin_bind_descriptors();
        shader
            .write_uniform(
                0,
                &PerDraw {
                    color: [1.0, 0.5, 0.25, frame as f32],
                },
            )
            .unwrap();
        shader
            .write_uniform(
                1,
                &PerMaterial {
                    tint: [1.0; 4],
                    transform: [[0.0; 4]; 4],
                },
            )
            .unwrap();
        shader.end_bind_descriptors();

        command_buffer.cmd_bind_descriptors(&shader, 0, None).unwrap();
        command_buffer
            .cmd_bind_descriptors(&shader, 1, Some(material))
            .unwrap();
        command_buffer.cmd_draw(3, 0).unwrap();
        command_buffer.cmd_end_render_pass().unwrap();

        assert_eq!(
            shader.headless_shader().unwrap().constant_buffer_load(1),
            1
        );
        renderer.end_frame(false).unwrap();
    }

    renderer.wait_idle();
    let stats = renderer.frame_stats();
    assert_eq!(stats.frame_count, 2);
    assert_eq!(stats.fence_stalls, 0);
    assert_eq!(stats.gpu.draw_calls, 2);
    assert_eq!(stats.gpu.validation_errors, 0);
    // One SRV table of one descriptor per frame
    assert_eq!(stats.cbv_srv_uav_peak_load, 1);

    shader.free_descriptor_set(material);
    assert_eq!(shader.headless_shader().unwrap().complex_set_count(1), 0);
}

struct FrameRecorder {
    device_context: CgiDeviceContextHeadless,
    frames: Mutex<Vec<(CgiFrameInfo, u64)>>,
}

impl CgiFrameListener for FrameRecorder {
    fn on_begin_frame(
        &self,
        frame_info: &CgiFrameInfo,
    ) {
        let completed = self.device_context.gpu().completed_fence_value();
        self.frames.lock().unwrap().push((*frame_info, completed));
    }
}

#[test]
fn ring_slots_are_not_reused_before_the_gpu_is_done() {
    let mut renderer = test_renderer(
        2,
        CgiGpuTimeline::Threaded {
            latency: Duration::from_millis(20),
        },
    );
    let device_context = renderer
        .headless_renderer()
        .unwrap()
        .device_context()
        .clone();
    let recorder = Arc::new(FrameRecorder {
        device_context: device_context.clone(),
        frames: Mutex::default(),
    });
    let listener: Arc<dyn CgiFrameListener> = recorder.clone();
    device_context.register_frame_listener(&listener);

    let target = color_target(&renderer, "target");
    let render_pass = renderer.create_render_pass(&single_target_pass()).unwrap();
    let framebuffer = renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: vec![CgiFramebufferAttachment::new(&target)],
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .unwrap();

    let frame_count = 5;
    let mut expected_fences = Vec::default();
    for _ in 0..frame_count {
        renderer.begin_frame(false).unwrap();
        let ring_index = renderer.ring_index();
        let slot_fence = renderer
            .headless_renderer()
            .unwrap()
            .slot_fence_value(ring_index);
        assert!(device_context.gpu().completed_fence_value() >= slot_fence);
        expected_fences.push(slot_fence);

        renderer
            .command_buffer()
            .cmd_begin_render_pass(
                render_pass,
                framebuffer,
                &[CgiClearValue::Color([0.0; 4])],
                CgiViewportFlags::empty(),
            )
            .unwrap();
        renderer.command_buffer().cmd_end_render_pass().unwrap();
        renderer.end_frame(false).unwrap();
    }

    let frames = recorder.frames.lock().unwrap().clone();
    assert_eq!(frames.len(), frame_count);
    for (i, (frame_info, completed)) in frames.iter().enumerate() {
        assert_eq!(frame_info.frame_count, i as u64 + 1);
        assert_eq!(frame_info.ring_index, i as u32 % 2);
        assert!(*completed >= expected_fences[i]);
    }

    // The third frame reuses the first slot while its 20ms submission is still queued
    let stats = renderer.frame_stats();
    assert!(stats.fence_stalls >= 1);

    renderer.wait_idle();
    assert_eq!(renderer.frame_stats().gpu.validation_errors, 0);
    drop(listener);
}

#[test]
#[should_panic(expected = "dynamic descriptor heap overflow")]
fn dynamic_heap_overflow_is_fatal() {
    init_logging();
    let renderer_def = CgiRendererDef {
        ring_buffer_size: 2,
        validation_mode: CgiValidationMode::Enabled,
        descriptor_heap_sizes: CgiDescriptorHeapSizes {
            cbv_srv_uav: 64,
            cbv_srv_uav_static: 16,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut renderer = create_renderer(CGI_SDK_VERSION, &renderer_def).unwrap();
    assert_eq!(
        renderer
            .headless_renderer()
            .unwrap()
            .device_context()
            .cbv_srv_uav_heap()
            .dynamic_capacity(),
        24
    );

    let shader = renderer
        .create_shader(&CgiShaderDef::from_source("test.hlsl", TEST_SHADER))
        .unwrap();
    shader
        .create_descriptor_set(
            &CgiDescriptorSetDef::new(0, 0, 4, CgiShaderStageFlags::COMPUTE).with_samplers(
                vec![CgiSetSampler::Static(CgiSamplerDef::linear_clamp()); 4],
            ),
        )
        .unwrap();
    shader.create_pipeline_layout().unwrap();
    let pipeline = renderer
        .create_pipeline(&CgiPipelineDef::compute(&shader, "fill"))
        .unwrap();

    let textures: Vec<CgiTexture> = (0..4)
        .map(|i| {
            renderer
                .create_texture(&CgiTextureDef::new_2d(
                    &format!("input {}", i),
                    CgiFormat::R8G8B8A8Unorm,
                    8,
                    8,
                    CgiTextureUsage::SAMPLED,
                ))
                .unwrap()
        })
        .collect();
    let texture_refs: Vec<&CgiTexture> = textures.iter().collect();
    let complex_set = shader
        .bind_descriptor_set_textures(0, &texture_refs, None)
        .unwrap();

    renderer.begin_frame(false).unwrap();
    let command_buffer = renderer.command_buffer();
    command_buffer.cmd_bind_pipeline(&pipeline).unwrap();
    // 6 binds of 4 descriptors fill the 24-descriptor segment, the 7th overflows
    for _ in 0..7 {
        command_buffer
            .cmd_bind_descriptors(&shader, 0, Some(complex_set))
            .unwrap();
        command_buffer.cmd_dispatch(1, 1, 1).unwrap();
    }
}

#[test]
#[should_panic(expected = "handle pool is full")]
fn complex_sets_are_limited_by_capacity() {
    let renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let shader = test_shader(&renderer);
    let checker = checker_texture(&renderer);

    // Set 1 was declared with room for 8 complex sets
    let mut complex_sets = Vec::default();
    for _ in 0..9 {
        complex_sets.push(
            shader
                .bind_descriptor_set_textures(1, &[&checker], None)
                .unwrap(),
        );
    }
}

#[test]
fn framebuffer_image_count_must_match() {
    let renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let render_pass_def = CgiRenderPassDef::new(
        vec![
            CgiAttachment::new("A", CgiFormat::R8G8B8A8Unorm).layout(CgiImageLayout::FsReadOnly),
            CgiAttachment::new("B", CgiFormat::R8G8B8A8Unorm).layout(CgiImageLayout::FsReadOnly),
        ],
        vec![CgiSubpass::new("Main").color(vec![
            CgiAttachmentRef::new("A", CgiImageLayout::ColorAttachment),
            CgiAttachmentRef::new("B", CgiImageLayout::ColorAttachment),
        ])],
        vec![],
    );
    let render_pass = renderer.create_render_pass(&render_pass_def).unwrap();
    let target = color_target(&renderer, "A");

    let result = renderer.create_framebuffer(&CgiFramebufferDef {
        render_pass,
        attachments: vec![CgiFramebufferAttachment::new(&target)],
        width: 256,
        height: 256,
        swapchain_image: None,
    });
    match result {
        Err(CgiError::StringError(message)) => {
            assert_eq!(
                message,
                "framebuffer has 1 images but the render pass expects 2"
            );
        }
        other => panic!("unexpected result {:?}", other),
    }

    // The wrong size is rejected as well
    let small = renderer
        .create_texture(&CgiTextureDef::new_2d(
            "small",
            CgiFormat::R8G8B8A8Unorm,
            64,
            64,
            CgiTextureUsage::RENDER_TARGET,
        ))
        .unwrap();
    assert!(renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: vec![
                CgiFramebufferAttachment::new(&target),
                CgiFramebufferAttachment::new(&small)
            ],
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .is_err());
}

#[test]
fn next_subpass_only_transitions_changed_attachments() {
    let mut renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let render_pass_def = CgiRenderPassDef::new(
        vec![
            CgiAttachment::new("Albedo", CgiFormat::R8G8B8A8Unorm)
                .load_op_clear()
                .layout(CgiImageLayout::FsReadOnly),
            CgiAttachment::new("Extra", CgiFormat::R8G8B8A8Unorm)
                .layout(CgiImageLayout::FsReadOnly),
            CgiAttachment::new("Depth", CgiFormat::D32Sfloat)
                .load_op_clear()
                .layout(CgiImageLayout::DepthStencilReadOnly),
            CgiAttachment::new("Light", CgiFormat::R8G8B8A8Unorm)
                .load_op_clear()
                .layout(CgiImageLayout::FsReadOnly),
        ],
        vec![
            CgiSubpass::new("GBuffer")
                .color(vec![
                    CgiAttachmentRef::new("Albedo", CgiImageLayout::ColorAttachment),
                    CgiAttachmentRef::new("Extra", CgiImageLayout::ColorAttachment),
                ])
                .depth_stencil(CgiAttachmentRef::new(
                    "Depth",
                    CgiImageLayout::DepthStencilAttachment,
                )),
            CgiSubpass::new("Lighting")
                .input(vec![CgiAttachmentRef::new(
                    "Albedo",
                    CgiImageLayout::FsReadOnly,
                )])
                .color(vec![
                    CgiAttachmentRef::new("Light", CgiImageLayout::ColorAttachment),
                    CgiAttachmentRef::new("Extra", CgiImageLayout::ColorAttachment),
                ])
                .depth_stencil(CgiAttachmentRef::new(
                    "Depth",
                    CgiImageLayout::DepthStencilReadOnly,
                )),
        ],
        vec![CgiDependency::new("GBuffer", "Lighting").mode(CgiDependencyMode::ColorToInput)],
    );
    let render_pass = renderer.create_render_pass(&render_pass_def).unwrap();

    let albedo = color_target(&renderer, "albedo");
    let extra = color_target(&renderer, "extra");
    let light = color_target(&renderer, "light");
    let mut depth_def = CgiTextureDef::new_2d(
        "depth",
        CgiFormat::D32Sfloat,
        256,
        256,
        CgiTextureUsage::DEPTH_STENCIL | CgiTextureUsage::INPUT_ATTACHMENT,
    );
    depth_def.initial_layout = Some(CgiImageLayout::DepthStencilReadOnly);
    let depth = renderer.create_texture(&depth_def).unwrap();

    let framebuffer = renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: [&albedo, &extra, &depth, &light]
                .iter()
                .map(|texture| CgiFramebufferAttachment::new(texture))
                .collect(),
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .unwrap();

    renderer.begin_frame(false).unwrap();
    let command_buffer = renderer.command_buffer();
    command_buffer
        .cmd_begin_render_pass(
            render_pass,
            framebuffer,
            &[
                CgiClearValue::Color([0.0; 4]),
                CgiClearValue::Color([0.0; 4]),
                CgiClearValue::DepthStencil {
                    depth: 0.0,
                    stencil: 0,
                },
                CgiClearValue::Color([0.0; 4]),
            ],
            CgiViewportFlags::empty(),
        )
        .unwrap();

    let before = recorded_commands(command_buffer).len();
    command_buffer.cmd_next_subpass().unwrap();
    let added = recorded_commands(command_buffer)[before..].to_vec();

    let barrier = added
        .iter()
        .find(|command| command.is_barrier())
        .expect("cmd_next_subpass() recorded no barrier");
    // Albedo, Depth and Light change layout, Extra stays a color target
    assert_eq!(barrier.barrier_count(), 3);
    if let CgiNativeCommand::ResourceBarrier(transitions) = barrier {
        assert!(transitions
            .iter()
            .all(|transition| transition.resource != extra.resource()));
    }
    // Light is first rendered in the second subpass and cleared there
    assert!(added
        .iter()
        .any(|command| matches!(command, CgiNativeCommand::ClearRenderTargetView { .. })));
    assert_eq!(
        command_buffer
            .headless_command_buffer()
            .unwrap()
            .current_subpass(),
        Some(1)
    );

    command_buffer.cmd_end_render_pass().unwrap();
    renderer.end_frame(false).unwrap();
    renderer.wait_idle();
    assert_eq!(renderer.frame_stats().gpu.validation_errors, 0);
}

#[test]
#[should_panic(expected = "cmd_end_render_pass() in subpass 0")]
fn ending_a_render_pass_early_panics() {
    let mut renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let render_pass_def = CgiRenderPassDef::new(
        vec![
            CgiAttachment::new("A", CgiFormat::R8G8B8A8Unorm).layout(CgiImageLayout::FsReadOnly),
            CgiAttachment::new("B", CgiFormat::R8G8B8A8Unorm).layout(CgiImageLayout::FsReadOnly),
        ],
        vec![
            CgiSubpass::new("First")
                .color(vec![CgiAttachmentRef::new("A", CgiImageLayout::ColorAttachment)]),
            CgiSubpass::new("Second")
                .input(vec![CgiAttachmentRef::new("A", CgiImageLayout::FsReadOnly)])
                .color(vec![CgiAttachmentRef::new("B", CgiImageLayout::ColorAttachment)]),
        ],
        vec![],
    );
    let render_pass = renderer.create_render_pass(&render_pass_def).unwrap();
    let a = color_target(&renderer, "a");
    let b = color_target(&renderer, "b");
    let framebuffer = renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: vec![
                CgiFramebufferAttachment::new(&a),
                CgiFramebufferAttachment::new(&b),
            ],
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .unwrap();

    renderer.begin_frame(false).unwrap();
    let command_buffer = renderer.command_buffer();
    command_buffer
        .cmd_begin_render_pass(render_pass, framebuffer, &[], CgiViewportFlags::empty())
        .unwrap();
    let _ = command_buffer.cmd_end_render_pass();
}

#[test]
#[should_panic(expected = "uniforms written outside begin_bind_descriptors/end_bind_descriptors")]
fn uniforms_need_a_bind_bracket() {
    let renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let shader = test_shader(&renderer);
    let _ = shader.write_uniform(
        0,
        &PerDraw {
            color: [0.0; 4],
        },
    );
}

#[test]
#[should_panic(expected = "renderer was requested for SDK version")]
fn version_mismatch_is_fatal() {
    init_logging();
    let _ = create_renderer(CGI_SDK_VERSION + 1, &CgiRendererDef::default());
}

#[test]
fn dds_textures_honor_lod_bias() {
    let renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let bytes = crate::dds::tests::make_dds(64, 64, 7, CgiFormat::Bc1Unorm, 71, None, 0);

    let texture = renderer
        .create_texture_from_dds("bricks.dds", &bytes, 1)
        .unwrap();
    let texture_def = texture.texture_def();
    assert_eq!((texture_def.width, texture_def.height), (32, 32));
    assert_eq!(texture_def.mip_count, 6);
    assert_eq!(texture_def.format, CgiFormat::Bc1Unorm);

    // The most detailed mip kept is the file's mip 1
    let top = texture.read_subresource(0, 0).unwrap();
    assert_eq!(top.len(), CgiFormat::Bc1Unorm.surface_size(32, 32) as usize);
    assert!(top.iter().all(|b| *b == 1));
    let last = texture.read_subresource(5, 0).unwrap();
    assert!(last.iter().all(|b| *b == 6));

    assert!(renderer
        .create_texture_from_dds("broken.dds", &bytes[..64], 0)
        .is_err());
    assert_eq!(renderer.frame_stats().gpu.validation_errors, 0);
}

#[test]
fn shader_branches_compile_deterministically() {
    let renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let shader_def = CgiShaderDef::from_source("test.hlsl", TEST_SHADER);
    assert_eq!(shader_def.branches, vec!["main", "main:Tinted TINT=2", "fill (C)"]);

    let first = renderer.create_shader(&shader_def).unwrap();
    let second = renderer.create_shader(&shader_def).unwrap();
    for (branch, stage) in &[
        ("main", CgiShaderStageFlags::VERTEX),
        ("main", CgiShaderStageFlags::FRAGMENT),
        ("Tinted", CgiShaderStageFlags::FRAGMENT),
        ("fill", CgiShaderStageFlags::COMPUTE),
    ] {
        let code = first.compiled_code(branch, *stage).unwrap();
        assert_eq!(Some(code), second.compiled_code(branch, *stage));
    }

    let tinted = first
        .compiled_code("Tinted", CgiShaderStageFlags::FRAGMENT)
        .unwrap();
    assert!(tinted.contains("return color * 2;"));
    assert!(!tinted.contains("mainVS("));
    assert!(first
        .compiled_code("fill", CgiShaderStageFlags::COMPUTE)
        .unwrap()
        .contains("fillCS("));

    // Declaring the same branch twice is harmless, two different ones under one name is not
    let mut duplicate = shader_def.clone();
    duplicate.branches.push("main".to_string());
    assert!(renderer.create_shader(&duplicate).is_ok());
    duplicate.branches.push("main TINT=3".to_string());
    assert!(matches!(
        renderer.create_shader(&duplicate),
        Err(CgiError::ShaderCompileError(_))
    ));

    let mut missing_entry = shader_def;
    missing_entry.branches = vec!["other".to_string()];
    assert!(renderer.create_shader(&missing_entry).is_err());
}

#[test]
fn buffers_upload_through_immediate_command_buffers() {
    let renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let mut geometry_def = CgiGeometryDef::new(
        "triangle",
        vec![
            CgiVertexElement::new(0, 0, CgiFormat::R32G32B32Sfloat, CgiVertexUsage::Position, 0),
            CgiVertexElement::new(
                1,
                0,
                CgiFormat::R32G32B32A32Sfloat,
                CgiVertexUsage::InstanceData,
                0,
            ),
        ],
    );
    geometry_def.instance_binding_mask = 0b10;
    geometry_def.dynamic_binding_mask = 0b10;
    let geometry = renderer.create_geometry(&geometry_def).unwrap();

    geometry.create_vertex_buffer(0, 3).unwrap();
    geometry.create_vertex_buffer(1, 2).unwrap();
    geometry.create_index_buffer(3).unwrap();

    let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let indices: [u16; 3] = [0, 1, 2];

    // Static bindings refuse to upload without a command buffer
    assert!(geometry.update_vertex_buffer(0, &positions, None).is_err());
    renderer
        .execute_immediate(|command_buffer| {
            geometry.update_vertex_buffer(0, &positions, Some(command_buffer))?;
            geometry.update_index_buffer(&indices, Some(command_buffer))
        })
        .unwrap();
    geometry.free_staging_buffers();

    let headless = geometry.headless_geometry().unwrap();
    assert_eq!(
        headless.read_vertex_buffer(0).unwrap(),
        bytemuck::cast_slice::<_, u8>(&positions).to_vec()
    );

    // Dynamic bindings are written in place
    let instances: [[f32; 4]; 2] = [[1.0; 4], [2.0; 4]];
    geometry.update_vertex_buffer(1, &instances, None).unwrap();
    assert_eq!(
        headless.read_vertex_buffer(1).unwrap(),
        bytemuck::cast_slice::<_, u8>(&instances).to_vec()
    );

    // Too much data for the buffer
    let too_many = [[0.0f32; 3]; 4];
    assert!(renderer
        .execute_immediate(|command_buffer| {
            geometry.update_vertex_buffer(0, &too_many, Some(command_buffer))
        })
        .is_err());
    assert_eq!(renderer.frame_stats().gpu.validation_errors, 0);
}

#[test]
fn worker_threads_record_in_parallel() {
    let mut renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let target = color_target(&renderer, "target");
    let render_pass = renderer.create_render_pass(&single_target_pass()).unwrap();
    let framebuffer = renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: vec![CgiFramebufferAttachment::new(&target)],
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .unwrap();
    let shader = test_shader(&renderer);
    let pipeline = Arc::new(
        renderer
            .create_pipeline(
                &CgiPipelineDef::graphics(&shader, "Tinted", render_pass, 0).without_depth(),
            )
            .unwrap(),
    );
    let checker = checker_texture(&renderer);
    let material = shader
        .bind_descriptor_set_textures(1, &[&checker], None)
        .unwrap();

    for _ in 0..3 {
        renderer.begin_frame(false).unwrap();

        let worker = {
            let command_buffer = renderer.create_command_buffer();
            let shader = shader.clone();
            let pipeline = pipeline.clone();
            std::thread::spawn(move || -> CgiResult<CgiCommandBuffer> {
                command_buffer.begin()?;
                command_buffer.cmd_begin_render_pass(
                    render_pass,
                    framebuffer,
                    &[CgiClearValue::Color([0.0; 4])],
                    CgiViewportFlags::empty(),
                )?;
                command_buffer.cmd_bind_pipeline(&pipeline)?;
                command_buffer.cmd_push_constants(
                    &shader,
                    0,
                    &PerDraw {
                        color: [0.0, 1.0, 0.0, 1.0],
                    },
                )?;
                command_buffer.cmd_bind_descriptors(&shader, 1, Some(material))?;
                command_buffer.cmd_draw(3, 0)?;
                command_buffer.cmd_end_render_pass()?;
                command_buffer.end()?;
                Ok(command_buffer)
            })
        };

        let command_buffer = renderer.command_buffer();
        command_buffer
            .cmd_begin_render_pass(
                render_pass,
                framebuffer,
                &[CgiClearValue::Color([0.0; 4])],
                CgiViewportFlags::empty(),
            )
            .unwrap();
        command_buffer.cmd_bind_pipeline(&pipeline).unwrap();
        shader.begin_bind_descriptors();
        shader
            .write_uniform(
                0,
                &PerDraw {
                    color: [1.0, 0.0, 0.0, 1.0],
                },
            )
            .unwrap();
        shader.end_bind_descriptors();
        command_buffer.cmd_bind_descriptors(&shader, 0, None).unwrap();
        command_buffer
            .cmd_bind_descriptors(&shader, 1, Some(material))
            .unwrap();
        command_buffer.cmd_draw(3, 0).unwrap();
        command_buffer.cmd_end_render_pass().unwrap();

        let worker_command_buffer = worker.join().unwrap().unwrap();
        renderer
            .queue_command_buffer(&worker_command_buffer)
            .unwrap();
        renderer.end_frame(false).unwrap();
    }

    renderer.wait_idle();
    let stats = renderer.frame_stats();
    assert_eq!(stats.gpu.draw_calls, 6);
    assert!(stats.gpu.command_lists_executed >= 6);
    assert_eq!(stats.gpu.validation_errors, 0);

    // Queuing an open command buffer is an error
    let open = renderer.create_command_buffer();
    assert!(renderer.queue_command_buffer(&open).is_err());
}

#[test]
fn presenting_keeps_swapchain_images_in_the_present_state() {
    let mut renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let format = renderer.swapchain_def().format;
    let render_pass = renderer
        .create_render_pass(&CgiRenderPassDef::new(
            vec![CgiAttachment::new("Backbuffer", format)
                .load_op_clear()
                .layout(CgiImageLayout::PresentSrc)],
            vec![CgiSubpass::new("Main").color(vec![CgiAttachmentRef::new(
                "Backbuffer",
                CgiImageLayout::ColorAttachment,
            )])],
            vec![],
        ))
        .unwrap();
    let framebuffers: Vec<CgiFramebufferHandle> = (0..renderer.swapchain_image_count())
        .map(|image_index| {
            renderer
                .create_framebuffer(&CgiFramebufferDef {
                    render_pass,
                    attachments: vec![],
                    width: 256,
                    height: 256,
                    swapchain_image: Some(image_index),
                })
                .unwrap()
        })
        .collect();

    for _ in 0..3 {
        renderer.begin_frame(true).unwrap();
        let image_index = renderer.current_swapchain_image_index().unwrap();
        let command_buffer = renderer.command_buffer();
        command_buffer
            .cmd_begin_render_pass(
                render_pass,
                framebuffers[image_index as usize],
                &[CgiClearValue::Color([0.1, 0.2, 0.3, 1.0])],
                CgiViewportFlags::empty(),
            )
            .unwrap();
        command_buffer.cmd_end_render_pass().unwrap();
        renderer.present().unwrap();
    }

    renderer.wait_idle();
    let stats = renderer.frame_stats();
    assert_eq!(stats.gpu.presents, 3);
    assert_eq!(stats.gpu.validation_errors, 0);

    // Presenting a frame that did not acquire an image is an error
    renderer.begin_frame(false).unwrap();
    assert!(renderer.end_frame(true).is_err());
    renderer.end_frame(false).unwrap();

    for framebuffer in framebuffers {
        renderer.delete_framebuffer(framebuffer);
    }
    renderer.resize_swapchain(128, 64).unwrap();
    let image = renderer.swapchain_image(0).unwrap();
    assert_eq!((image.texture_def().width, image.texture_def().height), (128, 64));
}

#[test]
fn pipelines_must_match_their_subpass() {
    let renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let render_pass = renderer.create_render_pass(&single_target_pass()).unwrap();
    let shader = test_shader(&renderer);

    let mut pipeline_def = CgiPipelineDef::graphics(&shader, "main", render_pass, 0);
    pipeline_def.sample_count = CgiSampleCount::SampleCount4;
    assert!(renderer.create_pipeline(&pipeline_def).is_err());

    let pipeline_def = CgiPipelineDef::graphics(&shader, "main", render_pass, 1);
    assert!(renderer.create_pipeline(&pipeline_def).is_err());

    let mut pipeline_def = CgiPipelineDef::graphics(&shader, "main", render_pass, 0);
    pipeline_def.color_blend = vec![CgiBlendMode::default(); 2];
    assert!(renderer.create_pipeline(&pipeline_def).is_err());

    let pipeline = renderer
        .create_pipeline(&CgiPipelineDef::graphics(&shader, "main", render_pass, 0))
        .unwrap();
    assert_eq!(pipeline.pipeline_type(), CgiPipelineType::Graphics);
    // No depth attachment, so no depth test
    assert!(!pipeline.headless_pipeline().unwrap().depth_test());

    let unlayouted = renderer
        .create_shader(&CgiShaderDef::from_source("test.hlsl", TEST_SHADER))
        .unwrap();
    assert!(renderer
        .create_pipeline(&CgiPipelineDef::compute(&unlayouted, "fill"))
        .is_err());
}

#[test]
#[should_panic(expected = "end_frame() while a render pass is active")]
fn ending_a_frame_inside_a_render_pass_panics() {
    let mut renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let target = color_target(&renderer, "target");
    let render_pass = renderer.create_render_pass(&single_target_pass()).unwrap();
    let framebuffer = renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: vec![CgiFramebufferAttachment::new(&target)],
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .unwrap();

    renderer.begin_frame(false).unwrap();
    renderer
        .command_buffer()
        .cmd_begin_render_pass(
            render_pass,
            framebuffer,
            &[CgiClearValue::Color([0.0; 4])],
            CgiViewportFlags::empty(),
        )
        .unwrap();
    let _ = renderer.end_frame(false);
}

// Color target plus a depth buffer that the render pass expects in the writable layout
fn color_depth_pass() -> CgiRenderPassDef {
    CgiRenderPassDef::new(
        vec![
            CgiAttachment::new("Color", CgiFormat::R8G8B8A8Unorm)
                .load_op_clear()
                .layout(CgiImageLayout::FsReadOnly),
            CgiAttachment::new("Depth", CgiFormat::D32Sfloat)
                .load_op_clear()
                .layout(CgiImageLayout::DepthStencilAttachment),
        ],
        vec![CgiSubpass::new("Main")
            .color(vec![CgiAttachmentRef::new(
                "Color",
                CgiImageLayout::ColorAttachment,
            )])
            .depth_stencil(CgiAttachmentRef::new(
                "Depth",
                CgiImageLayout::DepthStencilAttachment,
            ))],
        vec![],
    )
}

fn read_only_depth(renderer: &CgiRenderer) -> CgiTexture {
    let mut depth_def = CgiTextureDef::new_2d(
        "depth",
        CgiFormat::D32Sfloat,
        256,
        256,
        CgiTextureUsage::DEPTH_STENCIL | CgiTextureUsage::INPUT_ATTACHMENT,
    );
    depth_def.initial_layout = Some(CgiImageLayout::DepthStencilReadOnly);
    renderer.create_texture(&depth_def).unwrap()
}

const COLOR_DEPTH_CLEAR: [CgiClearValue; 2] = [
    CgiClearValue::Color([0.0; 4]),
    CgiClearValue::DepthStencil {
        depth: 0.0,
        stencil: 0,
    },
];

#[test]
fn mismatched_clear_values_are_rejected() {
    let mut renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let render_pass = renderer.create_render_pass(&color_depth_pass()).unwrap();
    let color = color_target(&renderer, "color");
    let mut depth_def = CgiTextureDef::new_2d(
        "depth",
        CgiFormat::D32Sfloat,
        256,
        256,
        CgiTextureUsage::DEPTH_STENCIL,
    );
    depth_def.initial_layout = Some(CgiImageLayout::DepthStencilAttachment);
    let depth = renderer.create_texture(&depth_def).unwrap();
    let framebuffer = renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: vec![
                CgiFramebufferAttachment::new(&color),
                CgiFramebufferAttachment::new(&depth),
            ],
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .unwrap();

    renderer.begin_frame(false).unwrap();
    let command_buffer = renderer.command_buffer();
    let before = recorded_commands(command_buffer).len();
    let color_for_depth = [CgiClearValue::Color([0.0; 4]), CgiClearValue::Color([1.0; 4])];
    assert!(command_buffer
        .cmd_begin_render_pass(
            render_pass,
            framebuffer,
            &color_for_depth,
            CgiViewportFlags::empty()
        )
        .is_err());
    let depth_for_color = [COLOR_DEPTH_CLEAR[1], COLOR_DEPTH_CLEAR[1]];
    assert!(command_buffer
        .cmd_begin_render_pass(
            render_pass,
            framebuffer,
            &depth_for_color,
            CgiViewportFlags::empty()
        )
        .is_err());
    assert_eq!(recorded_commands(command_buffer).len(), before);

    // The command buffer is still usable
    command_buffer
        .cmd_begin_render_pass(
            render_pass,
            framebuffer,
            &COLOR_DEPTH_CLEAR,
            CgiViewportFlags::empty(),
        )
        .unwrap();
    command_buffer.cmd_end_render_pass().unwrap();
    renderer.end_frame(false).unwrap();
    renderer.wait_idle();
    assert_eq!(renderer.frame_stats().gpu.validation_errors, 0);
}

#[test]
fn image_barriers_toggle_depth_between_read_only_and_attachment() {
    let mut renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let render_pass = renderer.create_render_pass(&color_depth_pass()).unwrap();
    let color = color_target(&renderer, "color");
    let depth = read_only_depth(&renderer);
    let framebuffer = renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: vec![
                CgiFramebufferAttachment::new(&color),
                CgiFramebufferAttachment::new(&depth),
            ],
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .unwrap();

    renderer.begin_frame(false).unwrap();
    let command_buffer = renderer.command_buffer();
    let before = recorded_commands(command_buffer).len();
    command_buffer
        .cmd_pipeline_image_memory_barrier(&[CgiTextureBarrier::layout_transition(
            &depth,
            CgiImageLayout::DepthStencilReadOnly,
            CgiImageLayout::DepthStencilAttachment,
        )])
        .unwrap();
    // Barriers are batched until the next command
    assert_eq!(recorded_commands(command_buffer).len(), before);

    command_buffer
        .cmd_begin_render_pass(
            render_pass,
            framebuffer,
            &COLOR_DEPTH_CLEAR,
            CgiViewportFlags::empty(),
        )
        .unwrap();
    let to_attachment = recorded_commands(command_buffer)[before].clone();
    assert_eq!(to_attachment.barrier_count(), 1);
    if let CgiNativeCommand::ResourceBarrier(transitions) = &to_attachment {
        assert_eq!(transitions[0].resource, depth.resource());
        assert_eq!(transitions[0].subresource, None);
        assert_eq!(transitions[0].after, CgiResourceState::DEPTH_WRITE);
    }
    command_buffer.cmd_end_render_pass().unwrap();

    command_buffer
        .cmd_pipeline_image_memory_barrier(&[CgiTextureBarrier::layout_transition(
            &depth,
            CgiImageLayout::DepthStencilAttachment,
            CgiImageLayout::DepthStencilReadOnly,
        )
        .mip_level(0)
        .array_layer(0)])
        .unwrap();
    // A subresource the texture does not have
    assert!(command_buffer
        .cmd_pipeline_image_memory_barrier(&[CgiTextureBarrier::layout_transition(
            &depth,
            CgiImageLayout::DepthStencilReadOnly,
            CgiImageLayout::DepthStencilAttachment,
        )
        .mip_level(1)])
        .is_err());
    renderer.end_frame(false).unwrap();
    renderer.wait_idle();
    assert_eq!(renderer.frame_stats().gpu.validation_errors, 0);

    // Without the transition the depth clear finds the texture read-only
    renderer.begin_frame(false).unwrap();
    let command_buffer = renderer.command_buffer();
    command_buffer
        .cmd_begin_render_pass(
            render_pass,
            framebuffer,
            &COLOR_DEPTH_CLEAR,
            CgiViewportFlags::empty(),
        )
        .unwrap();
    command_buffer.cmd_end_render_pass().unwrap();
    renderer.end_frame(false).unwrap();
    renderer.wait_idle();
    assert!(renderer.frame_stats().gpu.validation_errors > 0);
}

#[test]
fn sync_waits_for_the_last_frame() {
    let mut renderer = test_renderer(
        2,
        CgiGpuTimeline::Threaded {
            latency: Duration::from_millis(20),
        },
    );
    renderer.begin_frame(false).unwrap();
    renderer.end_frame(false).unwrap();

    let fence_value = renderer
        .headless_renderer()
        .unwrap()
        .slot_fence_value(renderer.ring_index());
    assert!(fence_value > 0);

    renderer.sync(false);
    let gpu = renderer
        .headless_renderer()
        .unwrap()
        .device_context()
        .gpu();
    assert!(gpu.completed_fence_value() >= fence_value);
    assert!(renderer.frame_stats().gpu.command_lists_executed >= 1);
}

#[test]
fn multisampled_targets_resolve_at_the_end_of_the_subpass() {
    let mut renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let render_pass = renderer
        .create_render_pass(&CgiRenderPassDef::new(
            vec![
                CgiAttachment::new("Msaa", CgiFormat::R8G8B8A8Unorm)
                    .sample_count(CgiSampleCount::SampleCount4)
                    .load_op_clear()
                    .layout(CgiImageLayout::FsReadOnly),
                CgiAttachment::new("Resolved", CgiFormat::R8G8B8A8Unorm)
                    .layout(CgiImageLayout::FsReadOnly),
            ],
            vec![CgiSubpass::new("Main")
                .color(vec![CgiAttachmentRef::new(
                    "Msaa",
                    CgiImageLayout::ColorAttachment,
                )])
                .resolve(vec![CgiAttachmentRef::new(
                    "Resolved",
                    CgiImageLayout::ColorAttachment,
                )])],
            vec![],
        ))
        .unwrap();

    let mut msaa_def = CgiTextureDef::new_2d(
        "msaa",
        CgiFormat::R8G8B8A8Unorm,
        256,
        256,
        CgiTextureUsage::RENDER_TARGET,
    );
    msaa_def.sample_count = CgiSampleCount::SampleCount4;
    msaa_def.initial_layout = Some(CgiImageLayout::FsReadOnly);
    let msaa = renderer.create_texture(&msaa_def).unwrap();
    let resolved = color_target(&renderer, "resolved");

    // The resolve target must be single-sampled like its attachment
    assert!(renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: vec![
                CgiFramebufferAttachment::new(&msaa),
                CgiFramebufferAttachment::new(&msaa),
            ],
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .is_err());
    let framebuffer = renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: vec![
                CgiFramebufferAttachment::new(&msaa),
                CgiFramebufferAttachment::new(&resolved),
            ],
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .unwrap();

    renderer.begin_frame(false).unwrap();
    let command_buffer = renderer.command_buffer();
    command_buffer
        .cmd_begin_render_pass(
            render_pass,
            framebuffer,
            &[
                CgiClearValue::Color([1.0, 0.0, 0.0, 1.0]),
                CgiClearValue::Color([0.0; 4]),
            ],
            CgiViewportFlags::empty(),
        )
        .unwrap();
    let before = recorded_commands(command_buffer).len();
    command_buffer.cmd_end_render_pass().unwrap();
    let added = recorded_commands(command_buffer)[before..].to_vec();

    let resolves: Vec<usize> = added
        .iter()
        .enumerate()
        .filter(|(_, command)| matches!(command, CgiNativeCommand::ResolveSubresource { .. }))
        .map(|(index, _)| index)
        .collect();
    assert_eq!(resolves.len(), 1);
    let resolve_index = resolves[0];
    // Both images move to the resolve states and back
    assert_eq!(added[resolve_index - 1].barrier_count(), 2);
    assert_eq!(added[resolve_index + 1].barrier_count(), 2);
    if let CgiNativeCommand::ResourceBarrier(transitions) = &added[resolve_index - 1] {
        assert_eq!(transitions[0].resource, msaa.resource());
        assert_eq!(transitions[0].after, CgiResourceState::RESOLVE_SOURCE);
        assert_eq!(transitions[1].resource, resolved.resource());
        assert_eq!(transitions[1].after, CgiResourceState::RESOLVE_DEST);
    }

    renderer.end_frame(false).unwrap();
    renderer.wait_idle();
    assert_eq!(renderer.frame_stats().gpu.validation_errors, 0);

    let pixels = resolved.read_subresource(0, 0).unwrap();
    assert_eq!(&pixels[..4], &[255, 0, 0, 255]);
}

const GEOMETRY_FREE_SHADER: &str = r#"
//@ meshlet (MF)
//@ rays (R)

#ifdef _MS
void meshletMS(uint3 group : SV_GroupID) {}
#endif

#ifdef _FS
float4 meshletFS() : SV_Target { return float4(1, 1, 1, 1); }
#endif

#ifdef _RS
void raysRS() {}
#endif
"#;

#[test]
fn mesh_and_ray_dispatches_reach_the_gpu() {
    let mut renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let target = color_target(&renderer, "target");
    let render_pass = renderer.create_render_pass(&single_target_pass()).unwrap();
    let framebuffer = renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: vec![CgiFramebufferAttachment::new(&target)],
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .unwrap();

    let shader = renderer
        .create_shader(&CgiShaderDef::from_source(
            "geometry_free.hlsl",
            GEOMETRY_FREE_SHADER,
        ))
        .unwrap();
    shader.create_pipeline_layout().unwrap();
    let mesh_pipeline = renderer
        .create_pipeline(
            &CgiPipelineDef::graphics(&shader, "meshlet", render_pass, 0).without_depth(),
        )
        .unwrap();
    assert_eq!(mesh_pipeline.pipeline_type(), CgiPipelineType::Mesh);
    let ray_pipeline = renderer
        .create_pipeline(&CgiPipelineDef::compute(&shader, "rays"))
        .unwrap();
    assert_eq!(ray_pipeline.pipeline_type(), CgiPipelineType::RayTracing);

    renderer.begin_frame(false).unwrap();
    let command_buffer = renderer.command_buffer();
    command_buffer.cmd_bind_pipeline(&ray_pipeline).unwrap();
    command_buffer.cmd_trace_rays(256, 256, 1).unwrap();

    command_buffer
        .cmd_begin_render_pass(
            render_pass,
            framebuffer,
            &[CgiClearValue::Color([0.0; 4])],
            CgiViewportFlags::empty(),
        )
        .unwrap();
    command_buffer.cmd_bind_pipeline(&mesh_pipeline).unwrap();
    command_buffer.cmd_dispatch_mesh(4, 1, 1).unwrap();
    command_buffer.cmd_end_render_pass().unwrap();

    let commands = recorded_commands(command_buffer);
    assert!(commands.iter().any(|command| matches!(
        command,
        CgiNativeCommand::DispatchRays {
            width: 256,
            height: 256,
            depth: 1
        }
    )));
    assert!(commands.iter().any(|command| matches!(
        command,
        CgiNativeCommand::DispatchMesh { x: 4, y: 1, z: 1 }
    )));

    renderer.end_frame(false).unwrap();
    renderer.wait_idle();
    let stats = renderer.frame_stats();
    assert_eq!(stats.gpu.draw_calls, 1);
    assert_eq!(stats.gpu.dispatches, 1);
    assert_eq!(stats.gpu.validation_errors, 0);
}

#[test]
#[should_panic(expected = "cmd_trace_rays() inside a render pass")]
fn rays_are_not_traced_inside_render_passes() {
    let mut renderer = test_renderer(2, CgiGpuTimeline::Immediate);
    let target = color_target(&renderer, "target");
    let render_pass = renderer.create_render_pass(&single_target_pass()).unwrap();
    let framebuffer = renderer
        .create_framebuffer(&CgiFramebufferDef {
            render_pass,
            attachments: vec![CgiFramebufferAttachment::new(&target)],
            width: 256,
            height: 256,
            swapchain_image: None,
        })
        .unwrap();
    let shader = renderer
        .create_shader(&CgiShaderDef::from_source(
            "geometry_free.hlsl",
            GEOMETRY_FREE_SHADER,
        ))
        .unwrap();
    shader.create_pipeline_layout().unwrap();
    let ray_pipeline = renderer
        .create_pipeline(&CgiPipelineDef::compute(&shader, "rays"))
        .unwrap();

    renderer.begin_frame(false).unwrap();
    let command_buffer = renderer.command_buffer();
    command_buffer
        .cmd_begin_render_pass(
            render_pass,
            framebuffer,
            &[CgiClearValue::Color([0.0; 4])],
            CgiViewportFlags::empty(),
        )
        .unwrap();
    command_buffer.cmd_bind_pipeline(&ray_pipeline).unwrap();
    let _ = command_buffer.cmd_trace_rays(8, 8, 1);
}

#[test]
fn compiled_stages_are_saved_when_requested() {
    init_logging();
    let dump_dir = std::env::temp_dir().join(format!("cgi_compiled_stages_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dump_dir);

    let renderer = create_renderer(
        CGI_SDK_VERSION,
        &CgiRendererDef {
            save_compiled_shaders_dir: Some(dump_dir.clone()),
            ..Default::default()
        },
    )
    .unwrap();
    let shader = renderer
        .create_shader(&CgiShaderDef::from_source("shaders/test.hlsl", TEST_SHADER))
        .unwrap();

    for file_name in &[
        "test.main.mainVS.txt",
        "test.main.mainFS.txt",
        "test.Tinted.mainFS.txt",
        "test.fill.fillCS.txt",
    ] {
        assert!(dump_dir.join(file_name).is_file(), "{} was not saved", file_name);
    }
    let tinted = std::fs::read_to_string(dump_dir.join("test.Tinted.mainFS.txt")).unwrap();
    assert_eq!(
        Some(tinted.as_str()),
        shader.compiled_code("Tinted", CgiShaderStageFlags::FRAGMENT)
    );

    drop(shader);
    drop(renderer);
    std::fs::remove_dir_all(&dump_dir).unwrap();
}

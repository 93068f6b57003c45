use cgi_api::*;
use cgi_framework::{
    DeferredShading, DeferredShadingConfig, DirectionalLight, ReflectionParams, ToneMapParams,
};
use glam::Vec3;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use structopt::StructOpt;

mod scene;
pub use scene::DemoScene;

#[derive(StructOpt, Debug, Clone)]
#[structopt(name = "demo", about = "Renders a deferred-shaded scene with the headless backend")]
pub struct DemoArgs {
    /// RON file holding a CgiRendererDef. The other options override it.
    #[structopt(name = "config", long, parse(from_os_str))]
    pub config: Option<PathBuf>,

    /// Number of frames to render
    #[structopt(long, default_value = "120")]
    pub frames: u64,

    #[structopt(long)]
    pub width: Option<u32>,

    #[structopt(long)]
    pub height: Option<u32>,

    /// Run the simulated GPU on a worker thread that takes this long per submission
    #[structopt(name = "latency-ms", long)]
    pub latency_ms: Option<u64>,

    /// Number of frames the CPU may record ahead of the GPU
    #[structopt(name = "ring-buffer-size", long)]
    pub ring_buffer_size: Option<u32>,

    #[structopt(name = "no-reflections", long)]
    pub no_reflections: bool,

    #[structopt(long, default_value = "16")]
    pub cubes: u32,

    /// Halve the swap chain size after this many frames
    #[structopt(name = "resize-at", long)]
    pub resize_at: Option<u64>,
}

impl Default for DemoArgs {
    fn default() -> Self {
        DemoArgs::from_iter(&["demo"])
    }
}

impl DemoArgs {
    pub fn renderer_def(&self) -> CgiResult<CgiRendererDef> {
        let mut renderer_def = match &self.config {
            Some(path) => {
                log::info!("Loading renderer config from {:?}", path);
                CgiRendererDef::from_ron(&std::fs::read_to_string(path)?)?
            }
            None => CgiRendererDef::default(),
        };

        if let Some(width) = self.width {
            renderer_def.swapchain.width = width;
        }
        if let Some(height) = self.height {
            renderer_def.swapchain.height = height;
        }
        if let Some(latency_ms) = self.latency_ms {
            renderer_def.gpu_timeline = CgiGpuTimeline::Threaded {
                latency: Duration::from_millis(latency_ms),
            };
        }
        if let Some(ring_buffer_size) = self.ring_buffer_size {
            renderer_def.ring_buffer_size = ring_buffer_size;
        }
        Ok(renderer_def)
    }
}

fn aspect_ratio(renderer: &CgiRenderer) -> f32 {
    let swapchain_def = renderer.swapchain_def();
    swapchain_def.width as f32 / swapchain_def.height.max(1) as f32
}

#[profiling::function]
fn render_frame(
    renderer: &mut CgiRenderer,
    deferred_shading: &DeferredShading,
    scene: &DemoScene,
    time: f32,
) -> CgiResult<()> {
    renderer.begin_frame(true)?;
    let image_index = renderer
        .current_swapchain_image_index()
        .ok_or("begin_frame(true) acquired no swap chain image")?;
    let camera = scene.camera(time, aspect_ratio(renderer));
    scene.update(time)?;

    let command_buffer = renderer.command_buffer();
    deferred_shading.begin_geometry_pass(command_buffer)?;
    scene.draw_opaque(command_buffer, &camera)?;
    deferred_shading.end_geometry_pass(command_buffer)?;

    deferred_shading.begin_lighting_pass(command_buffer, &camera)?;
    deferred_shading.draw_directional_light(
        command_buffer,
        &DirectionalLight {
            direction: Vec3::new(-0.4, -1.0, -0.3),
            color: Vec3::new(1.0, 0.95, 0.9),
            intensity: 0.6,
        },
    )?;
    deferred_shading.draw_omni_lights(command_buffer, &scene.omni_lights(time))?;
    deferred_shading.end_lighting_pass(command_buffer)?;

    deferred_shading.begin_compose_and_forward(command_buffer)?;
    scene.draw_transparent(command_buffer, &camera)?;
    deferred_shading.end_compose_and_forward(command_buffer)?;

    deferred_shading.draw_reflection(command_buffer, &ReflectionParams::default())?;
    deferred_shading.draw_to_swapchain(command_buffer, image_index, &ToneMapParams::default())?;

    renderer.end_frame(true)
}

/// Render `args.frames` frames and return the renderer's statistics
pub fn run(args: &DemoArgs) -> CgiResult<CgiFrameStats> {
    let renderer_def = args.renderer_def()?;
    let mut renderer = create_renderer(CGI_SDK_VERSION, &renderer_def)?;

    let mut deferred_shading = DeferredShading::with_config(
        &renderer,
        DeferredShadingConfig {
            reflections: !args.no_reflections,
            ..Default::default()
        },
    )?;
    let scene = DemoScene::new(&renderer, &deferred_shading, args.cubes.max(1))?;

    let start = Instant::now();
    let mut last_report = start;
    for frame in 0..args.frames {
        if args.resize_at == Some(frame) {
            let swapchain_def = renderer.swapchain_def().clone();
            let (width, height) = (
                (swapchain_def.width / 2).max(1),
                (swapchain_def.height / 2).max(1),
            );
            renderer.resize_swapchain(width, height)?;
            deferred_shading.on_swapchain_resized(&renderer)?;
        }

        let time = frame as f32 / 60.0;
        render_frame(&mut renderer, &deferred_shading, &scene, time)?;
        profiling::finish_frame!();

        if last_report.elapsed() >= Duration::from_secs(1) {
            last_report = Instant::now();
            log::info!(
                "frame {}: {:.1} fps",
                frame,
                frame as f64 / start.elapsed().as_secs_f64()
            );
        }
    }

    renderer.wait_idle();
    let stats = renderer.frame_stats();
    log::info!(
        "Rendered {} frames in {:.2?}",
        args.frames,
        start.elapsed()
    );

    drop(scene);
    deferred_shading.destroy(&renderer);
    Ok(stats)
}

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use stipple_engine::coords::{Affine2, Mat4, Path2, Poly2, Rect, Vec2};
use stipple_engine::device::{Gpu, GpuInit, SurfaceErrorAction};
use stipple_engine::logging::{init_logging, LoggingConfig};
use stipple_engine::paint::{Color4, Gradient, Scissor};
use stipple_engine::render::{
    sprite_shader, BlendMode, SpriteBatch, StencilEffect, Texture, WgpuBackend,
};

const CLEAR: wgpu::Color = wgpu::Color {
    r: 0.06,
    g: 0.07,
    b: 0.09,
    a: 1.0,
};

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut studio = Studio::default();
    event_loop
        .run_app(&mut studio)
        .context("winit event loop terminated with error")?;
    Ok(())
}

#[derive(Default)]
struct Studio {
    scene: Option<Scene>,
}

impl ApplicationHandler for Studio {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.scene.is_some() {
            return;
        }
        match Scene::new(event_loop) {
            Ok(scene) => {
                scene.gpu.window().request_redraw();
                self.scene = Some(scene);
            }
            Err(err) => {
                log::error!("studio failed to start: {err:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(scene) = self.scene.as_mut() else { return };
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => scene.gpu.resize(size),
            WindowEvent::RedrawRequested => {
                if let Err(err) = scene.render() {
                    log::error!("{err:#}");
                    event_loop.exit();
                    return;
                }
                scene.gpu.window().request_redraw();
            }
            _ => {}
        }
    }
}

struct Scene {
    gpu: Gpu,
    batch: SpriteBatch<WgpuBackend>,
    checker: Texture,
    started: Instant,
}

impl Scene {
    fn new(event_loop: &ActiveEventLoop) -> Result<Self> {
        let attributes = Window::default_attributes()
            .with_title("stipple studio")
            .with_inner_size(LogicalSize::new(960.0, 640.0));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("failed to create window")?,
        );

        let gpu = pollster::block_on(Gpu::new(window, GpuInit::default()))?;
        let mut backend = WgpuBackend::new(
            gpu.device().clone(),
            gpu.queue().clone(),
            gpu.surface_format(),
            gpu.depth_format(),
        );
        let checker = backend.create_texture(8, 8, &checker_pixels(8));

        let mut batch = SpriteBatch::new(backend);
        batch
            .init(sprite_shader())
            .context("sprite shader failed to compile")?;

        Ok(Self {
            gpu,
            batch,
            checker,
            started: Instant::now(),
        })
    }

    fn render(&mut self) -> Result<()> {
        let frame = match self.gpu.begin_frame() {
            Ok(frame) => frame,
            Err(err) => {
                anyhow::ensure!(
                    self.gpu.handle_surface_error(err) != SurfaceErrorAction::Fatal,
                    "surface is unusable"
                );
                return Ok(());
            }
        };

        let size = self.gpu.size();
        let (w, h) = (size.width as f32, size.height as f32);
        let t = self.started.elapsed().as_secs_f32();

        self.batch.backend_mut().set_target(frame.target(Some(CLEAR)));
        self.batch
            .begin_with(Mat4::orthographic_rh(0.0, w, h, 0.0, -1.0, 1.0));
        self.draw(w, h, t);
        self.batch.end();
        self.batch.backend_mut().take_target();

        log::trace!(
            "frame: {} vertices in {} calls",
            self.batch.vertices_drawn(),
            self.batch.calls_made()
        );
        self.gpu.present(frame);
        Ok(())
    }

    fn draw(&mut self, w: f32, h: f32, t: f32) {
        let batch = &mut self.batch;

        // Panels.
        batch.set_blend_mode(BlendMode::Alpha);
        for (i, color) in [
            Color4::new(0.85, 0.32, 0.30, 1.0),
            Color4::new(0.30, 0.65, 0.45, 1.0),
            Color4::new(0.28, 0.45, 0.85, 1.0),
        ]
        .into_iter()
        .enumerate()
        {
            batch.set_color(color);
            batch.fill_rect(Rect::new(24.0 + i as f32 * 72.0, 24.0, 56.0, 56.0));
        }

        let panel = Rect::new(24.0, 104.0, w * 0.4, h * 0.3);
        batch.set_color(Color4::WHITE);
        batch.set_gradient(Some(Gradient::linear(
            panel.min(),
            panel.max(),
            Color4::new(0.95, 0.75, 0.25, 1.0),
            Color4::new(0.45, 0.15, 0.65, 1.0),
        )));
        batch.fill_rect(panel);
        batch.set_gradient(None);

        batch.set_texture(Some(self.checker));
        batch.fill_rect(Rect::new(24.0, panel.max().y + 24.0, 128.0, 128.0));
        batch.set_texture(None);

        // A spinning ellipse stamped into the stencil, then stripes clipped to it.
        let center = Vec2::new(w * 0.7, h * 0.5);
        batch.clear_stencil();
        batch.set_stencil_effect(StencilEffect::Stamp);
        batch.fill_poly_with_transform(
            &Poly2::ellipse(Rect::new(-160.0, -100.0, 320.0, 200.0), 64),
            Affine2::from_angle_translation(t * 0.6, center),
        );

        batch.set_stencil_effect(StencilEffect::Clip);
        let top = center.y - 200.0;
        for i in 0..20 {
            let hue = i as f32 / 20.0;
            batch.set_color(Color4::new(hue, 0.6, 1.0 - hue, 1.0));
            batch.fill_rect(Rect::new(center.x - 200.0, top + i as f32 * 20.0, 400.0, 10.0));
        }
        batch.set_stencil_effect(StencilEffect::None);

        // Outlines, scissored to the right half of the window.
        batch.set_scissor(Some(Scissor::new(Rect::new(w * 0.5, 0.0, w * 0.5, h))));
        batch.set_color(Color4::new(1.0, 1.0, 1.0, 0.8));
        batch.outline_path(&Path2::from_rect(Rect::new(center.x - 180.0, center.y - 120.0, 360.0, 240.0)));
        batch.set_scissor(None);
    }
}

fn checker_pixels(size: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let v = if (x + y) % 2 == 0 { 235 } else { 60 };
            out.extend_from_slice(&[v, v, v, 255]);
        }
    }
    out
}

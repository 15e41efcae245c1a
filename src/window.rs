use std::{sync::Arc, time::Instant};

use anyhow::Context;
use glam::Vec2;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::EventLoop,
    window::Window,
};

use crate::{rendering::renderer::Renderer, viewer::ViewerState};

struct App {
    renderer: Option<Renderer>,
    state: ViewerState,
    last_frame: Instant,
}

impl App {
    fn from_state(state: ViewerState) -> Self {
        Self {
            renderer: None,
            state,
            last_frame: Instant::now(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &winit::event_loop::ActiveEventLoop) {
        let window_attributes = Window::default_attributes().with_title("Mannequin Viewer");
        let window = event_loop.create_window(window_attributes).unwrap();

        let renderer =
            pollster::block_on(Renderer::new(Arc::new(window), &self.state)).unwrap();
        let size = renderer.size;
        self.state.camera.set_aspect(size.width, size.height);

        renderer.window.request_redraw();
        self.renderer = Some(renderer);
        self.last_frame = Instant::now();
    }

    fn window_event(
        &mut self,
        event_loop: &winit::event_loop::ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.renderer.as_mut().unwrap().resize(new_size);
                self.state.camera.set_aspect(new_size.width, new_size.height);
            }
            WindowEvent::RedrawRequested => {
                let delta = self.last_frame.elapsed().as_secs_f32();
                self.last_frame = Instant::now();

                let renderer = self.renderer.as_mut().unwrap();
                renderer.window.request_redraw();

                self.state.update(delta);
                renderer.upload_new_models(&mut self.state.scene);

                match renderer.render(&self.state) {
                    Ok(()) => {}
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        renderer.resize(renderer.size);
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of memory");
                        event_loop.exit();
                    }
                    Err(wgpu::SurfaceError::Timeout) => {
                        log::warn!("Surface timeout");
                    }
                    Err(other) => {
                        log::error!("Unexpected surface error: {other:?}");
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.state
                    .orbit
                    .cursor_moved(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::MouseInput {
                state: button_state,
                button: MouseButton::Left,
                ..
            } => {
                self.state
                    .orbit
                    .set_rotating(button_state == ElementState::Pressed);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / 50.0,
                };
                self.state.orbit.zoom(amount);
            }
            _ => (),
        }
    }
}

pub async fn run(leg: &str, arm: &str, torso: &str) -> anyhow::Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let mut state = ViewerState::new().context("Failed to create viewer state")?;
    state.handle_sizes(leg, arm, torso);
    let mut app = App::from_state(state);
    event_loop.run_app(&mut app)?;

    Ok(())
}

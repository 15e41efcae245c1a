use std::f32::consts::PI;

use glam::{Mat4, Vec2, Vec3};
use wgpu::util::DeviceExt;

/// Reference aspect ratio used before the first resize event arrives.
pub const REFERENCE_ASPECT: f32 = 1920.0 / 1080.0;

pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn fixed() -> Self {
        Self {
            eye: Vec3::new(75.0, 20.0, 0.0),
            target: Vec3::new(0.0, 20.0, 0.0),
            up: Vec3::Y,
            fov_y_degrees: 60.0,
            aspect: REFERENCE_ASPECT,
            near: 1.0,
            far: 1000.0,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.target, self.up);
        let projection = Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        );
        projection * view
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }
}

const MIN_RADIUS: f32 = 2.0;
const MAX_RADIUS: f32 = 500.0;
const ROTATE_SPEED: f32 = 0.005;
const ZOOM_SPEED: f32 = 2.0;

/// Pointer-driven camera manipulator orbiting a fixed look-at point.
/// Dragging with the primary button rotates, the scroll wheel zooms.
pub struct OrbitController {
    target: Vec3,
    radius: f32,
    theta: f32,
    phi: f32,
    rotating: bool,
    last_cursor: Option<Vec2>,
}

impl OrbitController {
    /// Derives the initial orbit from the camera's eye and target.
    pub fn from_camera(camera: &Camera) -> Self {
        let offset = camera.eye - camera.target;
        let radius = offset.length().max(MIN_RADIUS);
        let theta = offset.z.atan2(offset.x);
        let phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        Self {
            target: camera.target,
            radius,
            theta,
            phi,
            rotating: false,
            last_cursor: None,
        }
    }

    pub fn set_rotating(&mut self, active: bool) {
        self.rotating = active;
        if !active {
            self.last_cursor = None;
        }
    }

    pub fn cursor_moved(&mut self, position: Vec2) {
        if self.rotating {
            if let Some(last) = self.last_cursor {
                let delta = position - last;
                self.theta += delta.x * ROTATE_SPEED;
                // Keep the polar angle away from the poles so the view
                // vector never becomes parallel with the up axis.
                self.phi = (self.phi - delta.y * ROTATE_SPEED).clamp(0.05, PI - 0.05);
            }
            self.last_cursor = Some(position);
        }
    }

    pub fn zoom(&mut self, amount: f32) {
        self.radius = (self.radius - amount * ZOOM_SPEED).clamp(MIN_RADIUS, MAX_RADIUS);
    }

    pub fn update_camera(&self, camera: &mut Camera) {
        let offset = Vec3::new(
            self.phi.sin() * self.theta.cos(),
            self.phi.cos(),
            self.phi.sin() * self.theta.sin(),
        ) * self.radius;

        camera.eye = self.target + offset;
        camera.target = self.target;
    }

    #[cfg(test)]
    pub fn radius(&self) -> f32 {
        self.radius
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable, Default)]
pub struct CameraUniform {
    view_proj: Mat4,
}

impl CameraUniform {
    pub fn update(&mut self, camera: &Camera) {
        self.view_proj = camera.view_projection();
    }

    pub fn create_buffer(&self, device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniform Buffer"),
            contents: bytemuck::cast_slice(&[*self]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }

    pub fn update_buffer(&self, queue: &wgpu::Queue, buffer: &wgpu::Buffer) {
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[*self]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_round_trips_initial_camera() {
        let mut camera = Camera::fixed();
        let original_eye = camera.eye;
        let controller = OrbitController::from_camera(&camera);
        controller.update_camera(&mut camera);

        assert!((camera.eye - original_eye).length() < 1e-3);
        assert_eq!(camera.target, Vec3::new(0.0, 20.0, 0.0));
    }

    #[test]
    fn zoom_clamps_radius() {
        let camera = Camera::fixed();
        let mut controller = OrbitController::from_camera(&camera);

        controller.zoom(1e6);
        assert_eq!(controller.radius(), MIN_RADIUS);

        controller.zoom(-1e6);
        assert_eq!(controller.radius(), MAX_RADIUS);
    }

    #[test]
    fn drag_clamps_pitch_away_from_poles() {
        let camera = Camera::fixed();
        let mut controller = OrbitController::from_camera(&camera);

        controller.set_rotating(true);
        controller.cursor_moved(Vec2::ZERO);
        controller.cursor_moved(Vec2::new(0.0, 1e6));

        let mut camera = Camera::fixed();
        controller.update_camera(&mut camera);
        let offset = (camera.eye - camera.target).normalize();
        // Pitch is clamped, so the eye approaches but never reaches the pole.
        assert!(offset.y > 0.99 && offset.y < 1.0);
    }

    #[test]
    fn cursor_motion_without_button_is_ignored() {
        let camera = Camera::fixed();
        let mut controller = OrbitController::from_camera(&camera);
        let before = controller.theta;

        controller.cursor_moved(Vec2::new(100.0, 100.0));
        controller.cursor_moved(Vec2::new(300.0, 100.0));

        assert_eq!(controller.theta, before);
    }

    #[test]
    fn aspect_ignores_degenerate_sizes() {
        let mut camera = Camera::fixed();
        camera.set_aspect(0, 600);
        assert_eq!(camera.aspect, REFERENCE_ASPECT);
        camera.set_aspect(800, 600);
        assert_eq!(camera.aspect, 800.0 / 600.0);
    }
}

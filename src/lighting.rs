use glam::{Vec3, Vec4};
use wgpu::util::DeviceExt;

/// Shadow-map configuration carried on the directional light. The values
/// are part of the light's contract even though the forward pass does not
/// render a shadow map yet.
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub struct ShadowSettings {
    pub map_size: u32,
    pub bias: f32,
    pub ortho_extent: f32,
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct DirectionalLight {
    pub position: Vec3,
    pub target: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub shadow: ShadowSettings,
}

impl DirectionalLight {
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

/// The scene's light rig: one directional light and one ambient light,
/// configured once at startup and never mutated afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Lighting {
    pub directional: DirectionalLight,
    pub ambient: AmbientLight,
}

impl Lighting {
    pub fn fixed() -> Self {
        Self {
            directional: DirectionalLight {
                position: Vec3::new(20.0, 100.0, 10.0),
                target: Vec3::ZERO,
                color: Vec3::ONE,
                intensity: 1.0,
                shadow: ShadowSettings {
                    map_size: 2048,
                    bias: -0.001,
                    ortho_extent: 100.0,
                    near: 0.5,
                    far: 500.0,
                },
            },
            ambient: AmbientLight {
                color: Vec3::ONE,
                intensity: 4.0,
            },
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightsUniform {
    direction: Vec4,
    directional_color: Vec4,
    ambient_color: Vec4,
}

impl LightsUniform {
    pub fn new(lighting: &Lighting) -> Self {
        let directional = &lighting.directional;
        let ambient = &lighting.ambient;

        Self {
            direction: directional.direction().extend(0.0),
            directional_color: (directional.color * directional.intensity).extend(1.0),
            ambient_color: (ambient.color * ambient.intensity).extend(1.0),
        }
    }

    pub fn create_buffer(&self, device: &wgpu::Device) -> wgpu::Buffer {
        device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lights Uniform Buffer"),
            contents: bytemuck::cast_slice(&[*self]),
            usage: wgpu::BufferUsages::UNIFORM,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_light_points_at_origin() {
        let lighting = Lighting::fixed();
        let direction = lighting.directional.direction();

        assert!((direction.length() - 1.0).abs() < 1e-6);
        assert!(direction.y < 0.0, "light should shine downwards");
    }

    #[test]
    fn uniform_premultiplies_intensity() {
        let lighting = Lighting::fixed();
        let uniform = LightsUniform::new(&lighting);

        assert_eq!(uniform.ambient_color, Vec4::new(4.0, 4.0, 4.0, 1.0));
        assert_eq!(uniform.directional_color, Vec4::new(1.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn shadow_settings_match_rig() {
        let shadow = Lighting::fixed().directional.shadow;
        assert_eq!(shadow.map_size, 2048);
        assert_eq!(shadow.bias, -0.001);
        assert_eq!(shadow.ortho_extent, 100.0);
    }
}

use anyhow::Context;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use gltf::buffer;
use itertools::izip;

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
}

pub struct ModelPrimitive {
    pub index: usize,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

/// CPU-side mesh data, either read from a glTF file or generated
/// procedurally. GPU buffers are created separately by the renderer.
pub struct Model {
    pub name: String,
    pub primitives: Vec<ModelPrimitive>,
}

pub type Buffers<'a> = &'a [buffer::Data];

impl Model {
    pub fn from_gltf(
        name: impl Into<String>,
        mesh: gltf::Mesh,
        buffers: Buffers,
    ) -> anyhow::Result<Model> {
        let mut model = Model {
            name: name.into(),
            primitives: Vec::new(),
        };

        for primitive in mesh.primitives() {
            if primitive.mode() != gltf::mesh::Mode::Triangles {
                return Err(anyhow::anyhow!(
                    "Unsupported primitive mode: {:?}",
                    primitive.mode()
                ));
            }

            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let position_reader = reader
                .read_positions()
                .with_context(|| format!("Mesh {} has no positions", model.name))?;
            let normal_reader = reader
                .read_normals()
                .with_context(|| format!("Mesh {} has no normals", model.name))?;

            let vertices = izip!(position_reader, normal_reader)
                .map(|(position, normal)| Vertex {
                    position: Vec3::from(position),
                    normal: Vec3::from(normal),
                })
                .collect::<Vec<Vertex>>();

            let indices = match reader.read_indices() {
                Some(index_reader) => index_reader.into_u32().collect(),
                None => (0..vertices.len() as u32).collect(),
            };

            model.primitives.push(ModelPrimitive {
                index: primitive.index(),
                vertices,
                indices,
            });
        }

        if model.primitives.is_empty() {
            return Err(anyhow::anyhow!("Mesh without primitives: {}", model.name));
        }

        Ok(model)
    }

    /// Flat ground plane in the xz plane, facing up, centered on the origin.
    pub fn plane(name: impl Into<String>, size: Vec2, subdivisions: u32) -> Model {
        let cells = subdivisions.max(1);
        let verts_per_side = cells + 1;

        let mut vertices = Vec::with_capacity((verts_per_side * verts_per_side) as usize);
        for z in 0..verts_per_side {
            for x in 0..verts_per_side {
                let u = x as f32 / cells as f32;
                let v = z as f32 / cells as f32;
                vertices.push(Vertex {
                    position: Vec3::new((u - 0.5) * size.x, 0.0, (v - 0.5) * size.y),
                    normal: Vec3::Y,
                });
            }
        }

        let mut indices = Vec::with_capacity((cells * cells * 6) as usize);
        for z in 0..cells {
            for x in 0..cells {
                let top_left = z * verts_per_side + x;
                let top_right = top_left + 1;
                let bottom_left = top_left + verts_per_side;
                let bottom_right = bottom_left + 1;

                indices.extend_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }

        Model {
            name: name.into(),
            primitives: vec![ModelPrimitive {
                index: 0,
                vertices,
                indices,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_has_expected_counts() {
        let model = Model::plane("Ground", Vec2::splat(100.0), 10);
        let primitive = &model.primitives[0];

        assert_eq!(primitive.vertices.len(), 11 * 11);
        assert_eq!(primitive.indices.len(), 10 * 10 * 6);
    }

    #[test]
    fn plane_lies_flat_within_bounds() {
        let model = Model::plane("Ground", Vec2::new(100.0, 100.0), 4);

        for vertex in &model.primitives[0].vertices {
            assert_eq!(vertex.position.y, 0.0);
            assert_eq!(vertex.normal, Vec3::Y);
            assert!(vertex.position.x.abs() <= 50.0);
            assert!(vertex.position.z.abs() <= 50.0);
        }
    }

    #[test]
    fn plane_indices_stay_in_range() {
        let model = Model::plane("Ground", Vec2::splat(10.0), 3);
        let primitive = &model.primitives[0];
        let vertex_count = primitive.vertices.len() as u32;

        assert!(primitive.indices.iter().all(|&index| index < vertex_count));
    }
}

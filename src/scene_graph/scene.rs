use glam::{Mat4, Quat, Vec3, Vec4};
use id_arena::Arena;
use std::collections::HashMap;

use crate::model::{Buffers, Model};
use crate::scene_graph::object3d::{Object3D, ObjectId};
use crate::scene_graph::scene_model::{SceneModel, SceneModelId};

/// Result of instantiating a glTF scene: the group object wrapping all of
/// the file's root nodes, plus a name index used to bind animation
/// channels to the spawned objects.
pub struct SpawnedGltf {
    pub root: ObjectId,
    pub nodes_by_name: HashMap<String, ObjectId>,
}

pub struct Scene {
    pub objects: Arena<Object3D>,
    pub models: Arena<SceneModel>,
    gltf_mesh_to_model: HashMap<usize, SceneModelId>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            objects: Arena::new(),
            models: Arena::new(),
            gltf_mesh_to_model: HashMap::new(),
        }
    }

    pub fn add_object(&mut self, object: Object3D) -> ObjectId {
        self.objects.alloc(object)
    }

    pub fn get_object(&self, id: ObjectId) -> Option<&Object3D> {
        self.objects.get(id)
    }

    pub fn add_model(&mut self, model: SceneModel) -> SceneModelId {
        self.models.alloc(model)
    }

    /// Adds a standalone model under a new root object, e.g. the ground
    /// plane the mannequin stands on.
    pub fn spawn_model(&mut self, model: Model, color: Vec4) -> ObjectId {
        let mut object = Object3D::named(model.name.clone());
        let model_id = self.add_model(SceneModel::new(model, color));
        object.model_id = Some(model_id);
        self.add_object(object)
    }

    /// Instantiates every root node of a glTF scene under a single group
    /// object so the whole asset can be transformed as one handle.
    pub fn spawn_gltf_scene(
        &mut self,
        group_name: &str,
        color: Vec4,
        buffers: Buffers,
        scene: &gltf::Scene,
    ) -> anyhow::Result<SpawnedGltf> {
        let root = self.add_object(Object3D::named(group_name));
        let mut nodes_by_name = HashMap::new();

        for node in scene.nodes() {
            self.spawn_gltf_node(color, buffers, &node, root, &mut nodes_by_name)?;
        }

        if self.objects[root].child_ids.is_empty() {
            return Err(anyhow::anyhow!("glTF scene {group_name} has no nodes"));
        }

        Ok(SpawnedGltf {
            root,
            nodes_by_name,
        })
    }

    fn spawn_gltf_node(
        &mut self,
        color: Vec4,
        buffers: Buffers,
        node: &gltf::Node,
        parent: ObjectId,
        nodes_by_name: &mut HashMap<String, ObjectId>,
    ) -> anyhow::Result<ObjectId> {
        let mut object = Object3D::default();
        let node_name = node.name().unwrap_or("Unnamed").to_string();
        object.name = node_name.clone();

        let (translation, rotation, scale) = node.transform().decomposed();
        object.transform.set_transform(
            translation.into(),
            Quat::from_array(rotation),
            Vec3::from(scale),
        );

        if let Some(mesh) = node.mesh() {
            let mesh_index = mesh.index();

            let model_id = match self.gltf_mesh_to_model.get(&mesh_index).copied() {
                Some(model_id) => model_id,
                None => {
                    let mesh_name = mesh
                        .name()
                        .map(String::from)
                        .unwrap_or_else(|| format!("{node_name} (Mesh)"));

                    let model = Model::from_gltf(mesh_name, mesh, buffers)?;
                    let model_id = self.add_model(SceneModel::new(model, color));
                    self.gltf_mesh_to_model.insert(mesh_index, model_id);
                    model_id
                }
            };

            object.model_id = Some(model_id);
        }

        let object_id = self.add_object(object);
        self.set_object_parent(object_id, Some(parent));

        if let Some(name) = node.name() {
            nodes_by_name.entry(name.to_string()).or_insert(object_id);
        }

        for child in node.children() {
            self.spawn_gltf_node(color, buffers, &child, object_id, nodes_by_name)?;
        }

        Ok(object_id)
    }

    /// Recomputes world matrices for every object whose hierarchy was
    /// invalidated since the last call. Runs once per frame, after
    /// animation and parameter updates.
    pub fn update_transforms(&self) {
        let root_objects = self.objects.iter().filter_map(|(id, object)| {
            if object.parent_id.is_none() {
                Some(id)
            } else {
                None
            }
        });

        for root_id in root_objects {
            self.update_object_transform_recursive(root_id, Mat4::IDENTITY);
        }
    }

    fn update_object_transform_recursive(&self, object_id: ObjectId, parent_world_matrix: Mat4) {
        if let Some(object) = self.objects.get(object_id) {
            if object.transform.is_world_dirty() {
                let local_matrix = *object.transform.get_local_matrix();
                let world_matrix = parent_world_matrix * local_matrix;
                object.transform.set_world_matrix(world_matrix);
            }

            let world_matrix = *object.transform.get_world_matrix();
            for &child_id in &object.child_ids {
                self.update_object_transform_recursive(child_id, world_matrix);
            }
        }
    }

    pub fn invalidate_object_hierarchy(&self, object_id: ObjectId) {
        if let Some(object) = self.objects.get(object_id) {
            object.transform.invalidate_world();

            for &child_id in &object.child_ids {
                self.invalidate_object_hierarchy(child_id);
            }
        }
    }

    pub fn set_object_parent(&mut self, child_id: ObjectId, new_parent_id: Option<ObjectId>) {
        if let Some(child) = self.objects.get(child_id) {
            if let Some(old_parent_id) = child.parent_id {
                if let Some(old_parent) = self.objects.get_mut(old_parent_id) {
                    old_parent.child_ids.retain(|&id| id != child_id);
                }
            }
        }

        if let Some(child) = self.objects.get_mut(child_id) {
            child.parent_id = new_parent_id;

            if let Some(new_parent_id) = new_parent_id {
                if let Some(new_parent) = self.objects.get_mut(new_parent_id) {
                    new_parent.child_ids.push(child_id);
                }
            }
        }

        self.invalidate_object_hierarchy(child_id);
    }

    pub fn set_object_translation(&mut self, object_id: ObjectId, translation: Vec3) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_translation(translation);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn set_object_rotation(&mut self, object_id: ObjectId, rotation: Quat) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_rotation(rotation);
        }
        self.invalidate_object_hierarchy(object_id);
    }

    pub fn set_object_scale(&mut self, object_id: ObjectId, scale: Vec3) {
        if let Some(object) = self.objects.get_mut(object_id) {
            object.transform.set_scale(scale);
        }
        self.invalidate_object_hierarchy(object_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    fn scene_with_child() -> (Scene, ObjectId, ObjectId) {
        let mut scene = Scene::new();
        let parent = scene.add_object(Object3D::named("parent"));
        let child = scene.add_object(Object3D::named("child"));
        scene.set_object_parent(child, Some(parent));
        (scene, parent, child)
    }

    #[test]
    fn child_world_matrix_composes_with_parent() {
        let (mut scene, parent, child) = scene_with_child();
        scene.set_object_translation(parent, Vec3::new(0.0, 5.0, 0.0));
        scene.set_object_translation(child, Vec3::new(1.0, 0.0, 0.0));
        scene.update_transforms();

        let world = *scene.get_object(child).unwrap().transform.get_world_matrix();
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(1.0, 5.0, 0.0));
    }

    #[test]
    fn parent_scale_propagates_to_children() {
        let (mut scene, parent, child) = scene_with_child();
        scene.set_object_scale(parent, Vec3::new(2.0, 3.0, 4.0));
        scene.set_object_translation(child, Vec3::ONE);
        scene.update_transforms();

        let world = *scene.get_object(child).unwrap().transform.get_world_matrix();
        assert_eq!(world.transform_point3(Vec3::ZERO), Vec3::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn reparenting_updates_child_lists() {
        let (mut scene, parent, child) = scene_with_child();
        let other = scene.add_object(Object3D::named("other"));
        scene.set_object_parent(child, Some(other));

        assert!(scene.get_object(parent).unwrap().child_ids.is_empty());
        assert_eq!(scene.get_object(other).unwrap().child_ids, vec![child]);
        assert_eq!(scene.get_object(child).unwrap().parent_id, Some(other));
    }

    #[test]
    fn spawn_model_links_object_to_model() {
        let mut scene = Scene::new();
        let id = scene.spawn_model(
            Model::plane("Ground", Vec2::splat(100.0), 10),
            Vec4::new(0.125, 0.125, 0.125, 1.0),
        );

        let object = scene.get_object(id).unwrap();
        let model_id = object.model_id.expect("object should reference a model");
        assert_eq!(scene.models.get(model_id).unwrap().name, "Ground");
    }
}

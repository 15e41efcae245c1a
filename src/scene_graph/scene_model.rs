use glam::Vec4;
use id_arena::Id;

use crate::model::Model;
use crate::rendering::render_model::RenderModelId;

pub type SceneModelId = Id<SceneModel>;

/// A model registered with the scene, plus its flat base color and the GPU
/// counterpart once the renderer has uploaded it.
pub struct SceneModel {
    pub name: String,
    pub model: Model,
    pub color: Vec4,
    pub render_model: Option<RenderModelId>,
}

impl SceneModel {
    pub fn new(model: Model, color: Vec4) -> Self {
        Self {
            name: model.name.clone(),
            model,
            color,
            render_model: None,
        }
    }
}

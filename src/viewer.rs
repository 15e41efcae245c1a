use std::collections::HashMap;

use anyhow::Context;
use glam::{Vec2, Vec3, Vec4};

use crate::animation::{AnimationClip, AnimationMixer};
use crate::camera::{Camera, OrbitController};
use crate::lighting::Lighting;
use crate::loader::{AssetLoader, GltfAsset, LoadEvent};
use crate::model::Model;
use crate::params::SizeParams;
use crate::scene_graph::object3d::ObjectId;
use crate::scene_graph::scene::Scene;

pub const MANNEQUIN_PATH: &str = "assets/mannequin/mannequin.gltf";
pub const ANIMATION_PATH: &str = "assets/mannequin/dance.gltf";

const MANNEQUIN_BASE_SCALE: f32 = 0.1;
const MANNEQUIN_COLOR: Vec4 = Vec4::new(0.7, 0.7, 0.7, 1.0);
const GROUND_COLOR: Vec4 = Vec4::new(0.125, 0.125, 0.125, 1.0);

/// Everything the frame loop reads and writes: the scene, the camera and
/// its orbit controller, the size parameters from the form, and the
/// active animation mixers. The mannequin handle stays `None` until its
/// load completes; the loop skips the scale update in the meantime.
pub struct ViewerState {
    pub camera: Camera,
    pub orbit: OrbitController,
    pub scene: Scene,
    pub lighting: Lighting,
    pub params: SizeParams,
    pub mixers: Vec<AnimationMixer>,
    pub mannequin: Option<ObjectId>,
    mannequin_nodes: HashMap<String, ObjectId>,
    loader: AssetLoader,
}

impl ViewerState {
    pub fn new() -> anyhow::Result<Self> {
        let camera = Camera::fixed();
        let orbit = OrbitController::from_camera(&camera);

        let mut scene = Scene::new();
        scene.spawn_model(Model::plane("Ground", Vec2::splat(100.0), 10), GROUND_COLOR);

        let mut loader = AssetLoader::new().context("Failed to create asset loader")?;
        loader.request_mannequin(MANNEQUIN_PATH);

        Ok(Self {
            camera,
            orbit,
            scene,
            lighting: Lighting::fixed(),
            params: SizeParams::default(),
            mixers: Vec::new(),
            mannequin: None,
            mannequin_nodes: HashMap::new(),
            loader,
        })
    }

    /// Entry point for the size form. Invalid inputs fall back to the
    /// default size; the previous parameters are overwritten either way.
    pub fn handle_sizes(&mut self, leg: &str, arm: &str, torso: &str) {
        self.params = SizeParams::from_inputs(leg, arm, torso);
        log::info!(
            "Received sizes: leg {}, arm {}, torso {}",
            self.params.leg,
            self.params.arm,
            self.params.torso
        );
    }

    /// Per-frame update: drain finished loads, step every mixer with the
    /// same delta, apply the size parameters to the mannequin if it is
    /// present, and refresh world transforms.
    pub fn update(&mut self, delta: f32) {
        while let Some(event) = self.loader.try_next() {
            self.handle_load_event(event);
        }

        for mixer in &mut self.mixers {
            mixer.update(delta, &mut self.scene);
        }

        if let Some(mannequin) = self.mannequin {
            self.scene.set_object_scale(mannequin, self.params.scale());
        }

        self.orbit.update_camera(&mut self.camera);
        self.scene.update_transforms();
    }

    fn handle_load_event(&mut self, event: LoadEvent) {
        match event {
            LoadEvent::MannequinLoaded(asset) => self.on_mannequin_loaded(asset),
            LoadEvent::MannequinFailed(error) => {
                log::error!("Failed to load mannequin: {error:#}");
            }
            LoadEvent::AnimationLoaded(asset) => self.on_animation_loaded(asset),
            LoadEvent::AnimationFailed(error) => {
                log::error!("Failed to load animation: {error:#}");
            }
        }
    }

    fn on_mannequin_loaded(&mut self, asset: GltfAsset) {
        let Some(gltf_scene) = asset
            .document
            .default_scene()
            .or_else(|| asset.document.scenes().next())
        else {
            log::error!("Mannequin asset contains no scenes");
            return;
        };

        match self
            .scene
            .spawn_gltf_scene("Mannequin", MANNEQUIN_COLOR, &asset.buffers, &gltf_scene)
        {
            Ok(spawned) => {
                self.scene
                    .set_object_scale(spawned.root, Vec3::splat(MANNEQUIN_BASE_SCALE));
                self.mannequin = Some(spawned.root);
                self.mannequin_nodes = spawned.nodes_by_name;
                log::info!("Loaded mannequin ({} nodes)", self.mannequin_nodes.len());

                // The animation can only be bound once the mesh exists,
                // so its load is kicked off here rather than at startup.
                self.loader.request_animation(ANIMATION_PATH);
            }
            Err(error) => log::error!("Failed to spawn mannequin: {error:#}"),
        }
    }

    fn on_animation_loaded(&mut self, asset: GltfAsset) {
        let Some(animation) = asset.document.animations().next() else {
            log::error!("Animation asset contains no clips");
            return;
        };

        match AnimationClip::from_gltf(&animation, &asset.buffers, &self.mannequin_nodes) {
            Ok(clip) => {
                if clip.channels.is_empty() {
                    log::warn!("Clip {} has no channels targeting the mannequin", clip.name);
                }
                log::info!("Playing animation clip {}", clip.name);
                self.mixers.push(AnimationMixer::new(clip));
            }
            Err(error) => log::error!("Failed to read animation: {error:#}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::DEFAULT_SIZE;
    use crate::scene_graph::object3d::Object3D;
    use std::time::Duration;

    /// In-memory mannequin stand-in: a scene with a named root node and a
    /// named child, no mesh data.
    fn rigged_asset() -> GltfAsset {
        let json = br#"{
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"nodes": [0]}],
            "nodes": [
                {"name": "Root", "children": [1]},
                {"name": "Hips"}
            ]
        }"#;

        let gltf = gltf::Gltf::from_slice(json).unwrap();
        GltfAsset {
            document: gltf.document,
            buffers: Vec::new(),
        }
    }

    fn wait_for_event(state: &mut ViewerState) -> Option<LoadEvent> {
        for _ in 0..250 {
            if let Some(event) = state.loader.try_next() {
                return Some(event);
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        None
    }

    #[test]
    fn form_submission_with_one_bad_field() {
        let mut state = ViewerState::new().unwrap();
        state.handle_sizes("5", "7", "bad");

        assert_eq!(state.params.leg, 5.0);
        assert_eq!(state.params.arm, 7.0);
        assert_eq!(state.params.torso, DEFAULT_SIZE);
    }

    #[test]
    fn update_without_mannequin_skips_scale_writes() {
        let mut state = ViewerState::new().unwrap();
        state.handle_sizes("2", "3", "4");

        for _ in 0..3 {
            state.update(0.016);
        }

        assert!(state.mannequin.is_none());
        assert!(state.mixers.is_empty());
    }

    #[test]
    fn params_drive_mannequin_scale_even_without_mixers() {
        let mut state = ViewerState::new().unwrap();

        // Stand-in for a completed mesh load whose animation never arrived.
        let stand_in = state.scene.add_object(Object3D::named("Mannequin"));
        state.mannequin = Some(stand_in);

        state.handle_sizes("5", "7", "bad");
        state.update(0.016);

        let scale = state
            .scene
            .get_object(stand_in)
            .unwrap()
            .transform
            .scale();
        assert_eq!(scale, Vec3::new(7.0, 5.0, DEFAULT_SIZE));
        assert!(state.mixers.is_empty());
    }

    #[test]
    fn mesh_success_spawns_mannequin_and_requests_animation() {
        let mut state = ViewerState::new().unwrap();
        state.handle_load_event(LoadEvent::MannequinLoaded(rigged_asset()));

        let mannequin = state.mannequin.expect("mannequin handle should be set");
        assert!(state.mannequin_nodes.contains_key("Root"));
        assert!(state.mannequin_nodes.contains_key("Hips"));

        // The animation file does not exist here, so the request issued
        // from the mesh-success handler must surface as a failure event.
        let mut saw_animation_failure = false;
        while let Some(event) = wait_for_event(&mut state) {
            match event {
                LoadEvent::AnimationFailed(error) => {
                    assert!(error.to_string().contains(ANIMATION_PATH));
                    state.handle_load_event(LoadEvent::AnimationFailed(error));
                    saw_animation_failure = true;
                    break;
                }
                // The startup mannequin request fails in the test cwd.
                other => state.handle_load_event(other),
            }
        }
        assert!(saw_animation_failure, "no animation request was issued");

        // Animation failure leaves the mixer list empty while scale
        // updates keep applying.
        state.handle_sizes("5", "7", "9");
        state.update(0.016);
        assert!(state.mixers.is_empty());
        let scale = state
            .scene
            .get_object(mannequin)
            .unwrap()
            .transform
            .scale();
        assert_eq!(scale, Vec3::new(7.0, 5.0, 9.0));
    }

    #[test]
    fn mesh_failure_requests_no_animation() {
        let mut state = ViewerState::new().unwrap();

        // The startup request targets a path that does not exist in the
        // test cwd; the only event the loader ever produces is its failure.
        match wait_for_event(&mut state) {
            Some(LoadEvent::MannequinFailed(error)) => {
                state.handle_load_event(LoadEvent::MannequinFailed(error));
            }
            Some(_) => panic!("expected a mannequin failure event"),
            None => panic!("loader produced no event within the deadline"),
        }

        assert!(state.mannequin.is_none());
        assert!(state.mannequin_nodes.is_empty());
        assert!(state.mixers.is_empty());

        std::thread::sleep(Duration::from_millis(100));
        assert!(
            state.loader.try_next().is_none(),
            "no follow-up request should be pending after a mesh failure"
        );
    }

    #[test]
    fn negative_sizes_are_applied_unclamped() {
        let mut state = ViewerState::new().unwrap();
        let stand_in = state.scene.add_object(Object3D::named("Mannequin"));
        state.mannequin = Some(stand_in);

        state.handle_sizes("-1", "0", "2");
        state.update(0.016);

        let scale = state
            .scene
            .get_object(stand_in)
            .unwrap()
            .transform
            .scale();
        assert_eq!(scale, Vec3::new(0.0, -1.0, 2.0));
    }
}

use std::collections::HashMap;

use anyhow::Context;
use glam::{Quat, Vec3};
use gltf::animation::util::ReadOutputs;

use crate::model::Buffers;
use crate::scene_graph::object3d::ObjectId;
use crate::scene_graph::scene::Scene;

pub enum ChannelOutput {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

pub struct AnimationChannel {
    pub target: ObjectId,
    pub times: Vec<f32>,
    pub output: ChannelOutput,
}

/// Keyframe tracks read out of a glTF animation, with every channel
/// rebound to an object in the live scene. Channels targeting nodes the
/// scene does not contain are skipped, mirroring how clips recorded
/// against a separate rig file are retargeted by node name.
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<AnimationChannel>,
}

impl AnimationClip {
    pub fn from_gltf(
        animation: &gltf::Animation,
        buffers: Buffers,
        nodes_by_name: &HashMap<String, ObjectId>,
    ) -> anyhow::Result<AnimationClip> {
        let name = animation
            .name()
            .map(String::from)
            .unwrap_or_else(|| format!("Animation {}", animation.index()));

        let mut channels = Vec::new();
        let mut duration = 0.0f32;

        for channel in animation.channels() {
            let target_node = channel.target().node();
            let Some(&target) = target_node.name().and_then(|name| nodes_by_name.get(name))
            else {
                log::debug!(
                    "Skipping channel for unresolved node {:?} in clip {}",
                    target_node.name(),
                    name
                );
                continue;
            };

            let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
            let times: Vec<f32> = reader
                .read_inputs()
                .with_context(|| format!("Channel in {name} has no keyframe times"))?
                .collect();
            let outputs = reader
                .read_outputs()
                .with_context(|| format!("Channel in {name} has no keyframe values"))?;

            let output = match outputs {
                ReadOutputs::Translations(values) => {
                    ChannelOutput::Translation(values.map(Vec3::from).collect())
                }
                ReadOutputs::Rotations(values) => ChannelOutput::Rotation(
                    values.into_f32().map(Quat::from_array).collect(),
                ),
                ReadOutputs::Scales(values) => {
                    ChannelOutput::Scale(values.map(Vec3::from).collect())
                }
                ReadOutputs::MorphTargetWeights(_) => {
                    log::debug!("Skipping morph target channel in clip {name}");
                    continue;
                }
            };

            if let Some(&last) = times.last() {
                duration = duration.max(last);
            }

            channels.push(AnimationChannel {
                target,
                times,
                output,
            });
        }

        Ok(AnimationClip {
            name,
            duration,
            channels,
        })
    }
}

/// Advances one clip bound to one spawned asset. Mixers are appended to
/// the viewer's active list when their clip finishes loading and stay
/// there for the life of the process; playback always loops.
pub struct AnimationMixer {
    clip: AnimationClip,
    time: f32,
}

impl AnimationMixer {
    pub fn new(clip: AnimationClip) -> Self {
        Self { clip, time: 0.0 }
    }

    #[allow(dead_code)]
    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn update(&mut self, delta: f32, scene: &mut Scene) {
        self.time += delta.max(0.0);

        let t = if self.clip.duration > 0.0 {
            self.time % self.clip.duration
        } else {
            0.0
        };

        for channel in &self.clip.channels {
            match &channel.output {
                ChannelOutput::Translation(values) => {
                    scene.set_object_translation(
                        channel.target,
                        sample_vec3(&channel.times, values, t),
                    );
                }
                ChannelOutput::Rotation(values) => {
                    scene
                        .set_object_rotation(channel.target, sample_quat(&channel.times, values, t));
                }
                ChannelOutput::Scale(values) => {
                    scene.set_object_scale(channel.target, sample_vec3(&channel.times, values, t));
                }
            }
        }
    }
}

/// Finds the keyframe pair bracketing `t` and the interpolation weight
/// between them. Clamps before the first key and after the last.
fn segment(times: &[f32], t: f32) -> (usize, usize, f32) {
    debug_assert!(!times.is_empty());

    let next = times.partition_point(|&key| key <= t);
    if next == 0 {
        return (0, 0, 0.0);
    }
    if next == times.len() {
        let last = times.len() - 1;
        return (last, last, 0.0);
    }

    let previous = next - 1;
    let span = times[next] - times[previous];
    let weight = if span > 0.0 {
        (t - times[previous]) / span
    } else {
        0.0
    };

    (previous, next, weight)
}

fn sample_vec3(times: &[f32], values: &[Vec3], t: f32) -> Vec3 {
    let (a, b, weight) = segment(times, t);
    values[a].lerp(values[b], weight)
}

fn sample_quat(times: &[f32], values: &[Quat], t: f32) -> Quat {
    let (a, b, weight) = segment(times, t);
    values[a].slerp(values[b], weight)
}

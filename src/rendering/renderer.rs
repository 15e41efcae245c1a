use std::collections::HashMap;
use std::sync::Arc;

use id_arena::Arena;
use wgpu::CommandEncoderDescriptor;
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    camera::CameraUniform,
    lighting::LightsUniform,
    rendering::{
        render_model::{Instance, RenderModel, RenderModelId, VERTEX_LAYOUT},
        texture::DepthTexture,
    },
    scene_graph::scene::Scene,
    shader_loader::ShaderLoader,
    viewer::ViewerState,
};

/// Owns the surface, device and the single forward pass that draws the
/// whole scene. Scene models are uploaded lazily as their loads finish.
pub struct Renderer {
    pub window: Arc<Window>,
    pub size: PhysicalSize<u32>,

    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,

    depth_texture: DepthTexture,
    camera_uniform: CameraUniform,
    camera_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,

    shader_loader: ShaderLoader,
    render_models: Arena<RenderModel>,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, state: &ViewerState) -> anyhow::Result<Renderer> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone()).unwrap();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .unwrap();

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                label: None,
                memory_hints: Default::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .unwrap();

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_texture = DepthTexture::new(&device, &surface_config, "Depth Texture");

        let mut camera_uniform = CameraUniform::default();
        camera_uniform.update(&state.camera);
        let camera_buffer = camera_uniform.create_buffer(&device);
        let lights_buffer = LightsUniform::new(&state.lighting).create_buffer(&device);

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("uniform_bind_group_layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform_bind_group"),
            layout: &uniform_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline_layout = Arc::new(device.create_pipeline_layout(
            &wgpu::PipelineLayoutDescriptor {
                label: Some("Render Pipeline Layout"),
                bind_group_layouts: &[&uniform_bind_group_layout],
                push_constant_ranges: &[],
            },
        ));

        let shader_loader = ShaderLoader::new(device.clone(), {
            let pipeline_layout = pipeline_layout.clone();
            move |device: &wgpu::Device, source: &str| {
                let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("Forward Shader"),
                    source: wgpu::ShaderSource::Wgsl(source.into()),
                });

                let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("Forward render pipeline"),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &shader,
                        entry_point: Some("vs_main"),
                        buffers: &[VERTEX_LAYOUT, Instance::layout()],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &shader,
                        entry_point: Some("fs_main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: surface_format,
                            blend: Some(wgpu::BlendState::REPLACE),
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: Some(wgpu::Face::Back),
                        polygon_mode: wgpu::PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: DepthTexture::DEPTH_FORMAT,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                    cache: None,
                });

                Ok(pipeline)
            }
        })?;

        Ok(Self {
            window,
            size,
            surface,
            device,
            queue,
            surface_config,
            depth_texture,
            camera_uniform,
            camera_buffer,
            uniform_bind_group,
            shader_loader,
            render_models: Arena::new(),
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.surface_config.width = new_size.width;
            self.surface_config.height = new_size.height;
            self.surface.configure(&self.device, &self.surface_config);
            self.depth_texture.resize(&self.device, &self.surface_config);
        }
    }

    /// Creates GPU buffers for scene models that arrived since the last
    /// frame (i.e. finished asset loads).
    pub fn upload_new_models(&mut self, scene: &mut Scene) {
        for (_, scene_model) in scene.models.iter_mut() {
            if scene_model.render_model.is_none() {
                let render_model = RenderModel::from_model(&self.device, &scene_model.model);
                let render_model_id = self.render_models.alloc(render_model);
                scene_model.render_model = Some(render_model_id);
                log::info!(
                    "Uploaded model {} ({} primitives)",
                    scene_model.name,
                    scene_model.model.primitives.len()
                );
            }
        }
    }

    pub fn render(&mut self, state: &ViewerState) -> Result<(), wgpu::SurfaceError> {
        self.shader_loader.load_pending_shaders();

        self.camera_uniform.update(&state.camera);
        self.camera_uniform
            .update_buffer(&self.queue, &self.camera_buffer);

        let mut batches: HashMap<RenderModelId, Vec<Instance>> = HashMap::new();
        for (_, object) in state.scene.objects.iter() {
            let Some(model_id) = object.model_id else {
                continue;
            };
            let Some(scene_model) = state.scene.models.get(model_id) else {
                continue;
            };
            let Some(render_model_id) = scene_model.render_model else {
                continue;
            };

            batches.entry(render_model_id).or_default().push(Instance {
                model: *object.transform.get_world_matrix(),
                color: scene_model.color,
            });
        }

        for (_, render_model) in self.render_models.iter_mut() {
            render_model.instances.clear();
        }
        for (render_model_id, instances) in &batches {
            if let Some(render_model) = self.render_models.get_mut(*render_model_id) {
                render_model
                    .instances
                    .update(&self.device, &self.queue, instances);
            }
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Forward Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.depth_texture.view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_pipeline(self.shader_loader.pipeline());
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);

            for (_, render_model) in self.render_models.iter() {
                render_model.draw(&mut render_pass);
            }
        }

        self.queue.submit([encoder.finish()]);
        output.present();

        Ok(())
    }
}

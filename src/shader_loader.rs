use std::{path::Path, sync::mpsc::channel, time::Duration};

use anyhow::Context;
use notify_debouncer_mini::{
    new_debouncer_opt,
    notify::{RecommendedWatcher, RecursiveMode},
    DebounceEventResult, DebouncedEventKind, Debouncer,
};
use pollster::block_on;
use wgpu::PollType;

const SHADER_FOLDER: &str = "src/shaders";
const SHADER_FILE: &str = "shader.wgsl";

/// Compiles the forward shader to a pipeline and recompiles it whenever
/// the WGSL file on disk changes. When the source folder cannot be
/// watched (e.g. the binary runs outside the repository) hot reload is
/// disabled and the startup pipeline is kept.
pub(crate) struct ShaderLoader {
    pipeline: wgpu::RenderPipeline,
    receiver: std::sync::mpsc::Receiver<wgpu::RenderPipeline>,
    _debouncer: Option<Debouncer<RecommendedWatcher>>,
}

impl ShaderLoader {
    pub fn new<F>(device: wgpu::Device, mut build_pipeline: F) -> anyhow::Result<Self>
    where
        F: 'static + Send + FnMut(&wgpu::Device, &str) -> anyhow::Result<wgpu::RenderPipeline>,
    {
        let pipeline = compile_file(&device, &mut build_pipeline)
            .context("Failed to compile the forward shader")?;

        let (sender, receiver) = channel();
        let mut builder_for_watcher = build_pipeline;

        let debouncer = new_debouncer_opt::<_, RecommendedWatcher>(
            notify_debouncer_mini::Config::default().with_timeout(Duration::from_millis(100)),
            move |result: DebounceEventResult| match result {
                Ok(events) => {
                    for event in events {
                        if event.path.ends_with(SHADER_FILE)
                            && event.kind == DebouncedEventKind::Any
                        {
                            log::info!("Reloading {SHADER_FILE}");
                            match compile_file(&device, &mut builder_for_watcher) {
                                Ok(pipeline) => {
                                    let _ = sender.send(pipeline);
                                }
                                Err(error) => log::error!("Failed to reload shader: {error:#}"),
                            }
                        }
                    }
                }
                Err(error) => log::error!("Error debouncing shader changes: {error}"),
            },
        );

        let debouncer = match debouncer {
            Ok(mut debouncer) => {
                let watched = Path::new(SHADER_FOLDER)
                    .canonicalize()
                    .map_err(anyhow::Error::from)
                    .and_then(|folder| {
                        debouncer
                            .watcher()
                            .watch(&folder, RecursiveMode::Recursive)
                            .map_err(anyhow::Error::from)
                    });

                match watched {
                    Ok(()) => Some(debouncer),
                    Err(error) => {
                        log::warn!("Shader hot reload disabled: {error:#}");
                        None
                    }
                }
            }
            Err(error) => {
                log::warn!("Shader hot reload disabled: {error:#}");
                None
            }
        };

        Ok(Self {
            pipeline,
            receiver,
            _debouncer: debouncer,
        })
    }

    pub(crate) fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub(crate) fn load_pending_shaders(&mut self) {
        while let Ok(pipeline) = self.receiver.try_recv() {
            self.pipeline = pipeline;
        }
    }
}

fn compile_file<F>(device: &wgpu::Device, build_pipeline: &mut F) -> anyhow::Result<wgpu::RenderPipeline>
where
    F: FnMut(&wgpu::Device, &str) -> anyhow::Result<wgpu::RenderPipeline>,
{
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let path = Path::new(SHADER_FOLDER).join(SHADER_FILE);
    let shader_code = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read shader file {}", path.display()))?;
    let pipeline = build_pipeline(device, &shader_code);

    device
        .poll(PollType::Wait)
        .context("Failed to poll device after shader compilation.")?;

    if let Some(error) = block_on(device.pop_error_scope()) {
        return Err(anyhow::anyhow!("Shader compilation failed: {error}"));
    }

    pipeline
}

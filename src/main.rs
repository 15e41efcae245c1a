use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod animation;
mod camera;
mod lighting;
mod loader;
mod model;
mod params;
mod rendering;
mod scene_graph;
mod shader_loader;
mod upload;
mod viewer;
mod window;

#[derive(Parser)]
#[command(name = "mannequin-viewer")]
#[command(about = "3D mannequin viewer with body measurement upload")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Open the interactive viewer window (the default).
    View {
        /// Leg size; anything that does not parse as a number falls
        /// back to the default of 10.
        #[arg(long, default_value = "")]
        leg: String,
        /// Arm size.
        #[arg(long, default_value = "")]
        arm: String,
        /// Torso size.
        #[arg(long, default_value = "")]
        torso: String,
    },
    /// Upload a front and a side photograph and download the measured
    /// body dimensions as a CSV file.
    Measure {
        /// Front-facing photograph.
        #[arg(long)]
        front: Option<PathBuf>,
        /// Side-facing photograph.
        #[arg(long)]
        side: Option<PathBuf>,
        /// Measurement backend endpoint.
        #[arg(long, default_value = upload::DEFAULT_ENDPOINT)]
        endpoint: String,
    },
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::View {
        leg: String::new(),
        arm: String::new(),
        torso: String::new(),
    }) {
        Command::View { leg, arm, torso } => pollster::block_on(window::run(&leg, &arm, &torso)),
        Command::Measure {
            front,
            side,
            endpoint,
        } => {
            let runtime = tokio::runtime::Runtime::new()?;
            let client = upload::MeasurementClient::new(endpoint, ".");
            let outcome = runtime.block_on(client.submit(front.as_deref(), side.as_deref()));
            if let Some(path) = &outcome.saved_to {
                log::info!("Saved measurements to {}", path.display());
            }
            println!("{}", outcome.message);

            Ok(())
        }
    }
}

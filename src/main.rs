// stillview - A single-image viewer for Wayland
// Shows one image and remembers the window geometry and state between sessions

mod cli;
mod config;
mod debounce;
mod display;
mod geometry;
mod image_loader;
mod shortcuts;
mod viewport;
mod wayland;

use anyhow::Result;
use config::{ConfigStore, WindowConfig};
use log::info;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("Start");

    // Parse command line arguments
    let args = cli::parse_args()?;

    let config = if args.no_persist {
        ConfigStore::in_memory(WindowConfig::default())
    } else {
        let path = match args.config {
            Some(path) => path,
            None => config::default_config_path()?,
        };
        ConfigStore::load(path)
    };
    if let Some(path) = config.path() {
        info!("Window config: {}", path.display());
    }

    // Load the image
    let image = image_loader::load_image(&args.image)?;
    info!(
        "Image loaded: {} ({}x{} pixels)",
        image.label, image.width, image.height
    );

    let options = wayland::StartOptions {
        fullscreen: args.fullscreen,
        reset_window: args.reset_window,
    };
    wayland::run(image, config, options)?;

    info!("Finish");
    Ok(())
}

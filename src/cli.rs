// Command line interface module
// Handles parsing of command line arguments and stdin input

use anyhow::{bail, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::PathBuf;

/// stillview - A single-image viewer that remembers its window
#[derive(Parser, Debug)]
#[command(name = "stillview")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the image file (can also be provided via stdin pipe)
    #[arg(value_name = "IMAGE")]
    pub image_path: Option<PathBuf>,

    /// Window config file (defaults to <config dir>/stillview/window.json)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Start in fullscreen mode
    #[arg(short, long)]
    pub fullscreen: bool,

    /// Start with the default window geometry and state
    #[arg(long)]
    pub reset_window: bool,

    /// Do not read or write the window config file
    #[arg(long)]
    pub no_persist: bool,
}

/// Where the image bytes come from
#[derive(Debug)]
pub enum ImageSource {
    File(PathBuf),
    Stdin(Vec<u8>),
}

/// Parsed arguments with resolved image source
#[derive(Debug)]
pub struct ParsedArgs {
    pub image: ImageSource,
    pub config: Option<PathBuf>,
    pub fullscreen: bool,
    pub reset_window: bool,
    pub no_persist: bool,
}

/// Check if stdin has data available (is a pipe)
fn stdin_has_data() -> bool {
    !atty::is(atty::Stream::Stdin)
}

/// Read image data from stdin
fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin().read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Parse command line arguments and handle stdin input
pub fn parse_args() -> Result<ParsedArgs> {
    resolve(Args::parse())
}

fn resolve(args: Args) -> Result<ParsedArgs> {
    // An explicit path wins over whatever is attached to stdin
    let image = if let Some(path) = args.image_path {
        ImageSource::File(path)
    } else if stdin_has_data() {
        let data = read_stdin()?;
        if data.is_empty() {
            bail!("No data received from stdin");
        }
        ImageSource::Stdin(data)
    } else {
        bail!("No image provided. Please provide an image path or pipe image data to stdin.\n\
               Usage: stillview <IMAGE> [OPTIONS]\n\
               Or:    cat image.png | stillview [OPTIONS]");
    };

    Ok(ParsedArgs {
        image,
        config: args.config,
        fullscreen: args.fullscreen,
        reset_window: args.reset_window,
        no_persist: args.no_persist,
    })
}

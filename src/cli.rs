//! Command-line interface implementation

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use image::RgbaImage;

use crate::color::to_rgba;
use crate::config::load_config;
use crate::draw::{scale_for, Sprite};
use crate::error::IconError;
use crate::manager::IconManager;
use crate::models::{AnimatedIcon, CachedIcon};
use crate::terminal::render_sprite;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Pixelicons - inspect the icon and animation cache of an LED matrix
#[derive(Parser)]
#[command(name = "pxi")]
#[command(about = "Pixelicons - resolve, decode and preview LED-matrix icons and animations")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: pixelicons.toml found upward from the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a static icon and preview it
    Icon {
        /// Icon name, optionally prefixed with ln:, la: or ic:
        name: String,

        /// Preview 8x8 icons at 16x16
        #[arg(long)]
        scale: bool,

        /// Also write the decoded icon to a PNG file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Resolve an animation and print its frame layout and delays
    Anim {
        /// Animation id
        id: String,

        /// Preview the frame shown at this time (ms)
        #[arg(long)]
        preview: Option<u64>,
    },

    /// Print the frame index an animation shows at a given time
    Frame {
        /// Animation id
        id: String,

        /// Time in milliseconds
        #[arg(long)]
        at: u64,
    },

    /// Print the id an alias tag resolves to
    Alias {
        /// Alias tag
        tag: String,
    },
}

/// Parse arguments and run the selected command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };
    let manager = match IconManager::from_config(config) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };
    if let Err(e) = manager.ensure_dirs() {
        eprintln!("Error: {}", e);
        return ExitCode::from(EXIT_ERROR);
    }

    match cli.command {
        Commands::Icon { name, scale, export } => run_icon(&manager, &name, scale, export.as_deref()),
        Commands::Anim { id, preview } => run_anim(&manager, &id, preview),
        Commands::Frame { id, at } => run_frame(&manager, &id, at),
        Commands::Alias { tag } => run_alias(&manager, &tag),
    }
}

fn icon_sprite(icon: &CachedIcon) -> Sprite<'_> {
    Sprite {
        width: icon.width,
        height: icon.height,
        pixels: &icon.pixels,
        alpha: &icon.alpha,
    }
}

fn frame_sprite(anim: &AnimatedIcon, frame: usize) -> Sprite<'_> {
    let start = anim.frame_offset(frame);
    let len = (anim.width * anim.height) as usize;
    Sprite {
        width: anim.width,
        height: anim.height,
        pixels: &anim.pixels[start..start + len],
        alpha: &anim.alpha[start..start + len],
    }
}

fn export_png(sprite: Sprite<'_>, path: &Path) -> Result<(), IconError> {
    let image = RgbaImage::from_fn(sprite.width, sprite.height, |x, y| {
        let i = (y * sprite.width + x) as usize;
        to_rgba(sprite.pixels[i], sprite.alpha[i])
    });
    image.save(path)?;
    Ok(())
}

fn run_icon(manager: &IconManager, name: &str, scale: bool, export: Option<&Path>) -> ExitCode {
    let Some(icon) = manager.get_icon(name) else {
        eprintln!("Error: icon '{}' is not available", name);
        return ExitCode::from(EXIT_ERROR);
    };

    println!("{}: {}x{}", icon.name, icon.width, icon.height);
    let factor = if scale { scale_for(icon.width, icon.height) } else { 1 };
    print!("{}", render_sprite(icon_sprite(&icon), factor));

    if let Some(path) = export {
        if let Err(e) = export_png(icon_sprite(&icon), path) {
            eprintln!("Error: cannot write '{}': {}", path.display(), e);
            return ExitCode::from(EXIT_ERROR);
        }
        println!("Saved {}", path.display());
    }
    ExitCode::from(EXIT_SUCCESS)
}

fn run_anim(manager: &IconManager, id: &str, preview: Option<u64>) -> ExitCode {
    let Some(anim) = manager.get_animated_icon(id) else {
        eprintln!("Error: animation '{}' is not available", id);
        return ExitCode::from(EXIT_ERROR);
    };

    println!("{}: {} frames of {}x{}", anim.name, anim.frame_count, anim.width, anim.height);
    println!("delays (ms): {:?}", anim.delays);
    println!("cycle: {} ms", anim.total_time);

    if let Some(at) = preview {
        let frame = anim.frame_at(at);
        println!("frame {} at {} ms:", frame, at);
        print!("{}", render_sprite(frame_sprite(&anim, frame), scale_for(anim.width, anim.height)));
    }
    ExitCode::from(EXIT_SUCCESS)
}

fn run_frame(manager: &IconManager, id: &str, at: u64) -> ExitCode {
    match manager.get_animated_icon(id) {
        Some(anim) => {
            println!("{}", anim.frame_at(at));
            ExitCode::from(EXIT_SUCCESS)
        }
        None => {
            eprintln!("Error: animation '{}' is not available", id);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run_alias(manager: &IconManager, tag: &str) -> ExitCode {
    match manager.resolve_alias(tag) {
        Some(id) => {
            println!("{}", id);
            ExitCode::from(EXIT_SUCCESS)
        }
        None => {
            eprintln!("Error: no alias '{}'", tag);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_frame_command() {
        let cli = Cli::try_parse_from(["pxi", "--config", "x.toml", "frame", "2389", "--at", "120"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Commands::Frame { ref id, at: 120 } if id == "2389"));
    }

    #[test]
    fn test_frame_requires_time() {
        assert!(Cli::try_parse_from(["pxi", "frame", "1"]).is_err());
    }

    #[test]
    fn test_export_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let pixels = [0xF800, 0x001F];
        let alpha = [255, 0];
        let sprite = Sprite {
            width: 2,
            height: 1,
            pixels: &pixels,
            alpha: &alpha,
        };
        export_png(sprite, &path).unwrap();
        let img = image::open(&path).unwrap().to_rgba8();
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(1, 0).0[3], 0);
    }
}

//! Prints an Aseprite sprite to the terminal, or plays it if it is animated.
//!
//! cargo run -- path/to/sprite.aseprite

use anyhow::Context;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tase::rendering::renderer::FrameBuffer;
use tase::{
    ase, install_panic_handler, Document, Forever, FrameLimit, PlaybackMode, Player, TerminalGuard,
};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to an .ase or .aseprite file
    path: PathBuf,

    /// Print only this frame (0-based) as a still image
    #[arg(long, value_name = "N")]
    frame: Option<usize>,

    /// Stop after playing the animation this many times
    #[arg(long, value_name = "N", conflicts_with = "frame")]
    loops: Option<u64>,

    /// Log more to stderr (-v, -vv, -vvv). RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(args: Args) -> anyhow::Result<()> {
    let file = ase::read_file(&args.path)
        .with_context(|| format!("could not open {}", args.path.display()))?;
    let document = Document::from_ase(&file)
        .with_context(|| format!("could not load {}", args.path.display()))?;

    let mut player = Player::new(FrameBuffer::new());
    if let Some(index) = args.frame {
        player.play_frame(&document, index)?;
        return Ok(());
    }

    let mut guard = TerminalGuard::stdout();
    guard.arm(PlaybackMode::of(&document))?;
    install_panic_handler(&guard);

    match args.loops {
        Some(loops) => player.play(&document, &guard, FrameLimit::loops(&document, loops))?,
        None => player.play(&document, &guard, Forever)?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

//! pxi - inspect the pixelicons asset cache from the command line

use std::process::ExitCode;

use pixelicons::cli;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();
    cli::run()
}

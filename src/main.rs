//! Avatarforge - command-line tool for compositing classroom avatars

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use avatarforge::cli;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    cli::run()
}

pub mod cli;
pub mod jq_exec;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<ExitCode> {
    // RUST_LOG=shape_guard=debug to see shape resolution and rejected assignments
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let command_line_interface = cli::CommandLineInterface::load();
    command_line_interface.run()
}

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{build, deploy, publish};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "roadie")]
#[command(version = VERSION)]
#[command(about = "Build and publish compute packages to an edge service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile the package and bundle it into a deployable archive
    Build(build::BuildArgs),
    /// Upload a built package to a service version and activate it
    Deploy(deploy::DeployArgs),
    /// Build and deploy in one fail-fast run
    Publish(publish::PublishArgs),
}

fn run_json(command: Commands) -> (roadie::Result<serde_json::Value>, i32) {
    match command {
        Commands::Build(args) => output::map_cmd_result_to_json(build::run(args)),
        Commands::Deploy(args) => output::map_cmd_result_to_json(deploy::run(args)),
        Commands::Publish(args) => output::map_cmd_result_to_json(publish::run(args)),
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let (json_result, exit_code) = run_json(cli.command);
    if output::print_json_result(json_result).is_err() {
        return std::process::ExitCode::from(1);
    }

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}

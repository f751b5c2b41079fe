use clap::Args;
use serde::Serialize;

use roadie::build::{self, BuildArtifact};
use roadie::config::BuildConfig;
use roadie::manifest::{Language, Manifest};
use roadie::package::{self, Package};

use crate::commands::{working_dir, CmdResult};

#[derive(Args)]
pub struct BuildArgs {
    /// Language override (defaults to the manifest's declared language)
    #[arg(long)]
    pub language: Option<Language>,

    /// Raw build command override, run through the shell
    #[arg(long)]
    pub command: Option<String>,

    /// Timeout, in seconds, for the toolchain invocation
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Rebuild even if the artifact is newer than all sources
    #[arg(long)]
    pub force: bool,

    /// Include the source tree in the built package
    #[arg(long)]
    pub include_source: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutput {
    pub name: String,
    pub language: Language,
    pub artifact: BuildArtifact,
    pub package: Package,
}

pub fn run(args: BuildArgs) -> CmdResult<BuildOutput> {
    let dir = working_dir()?;
    let manifest = Manifest::load(&dir)?;

    let mut config = BuildConfig::from_manifest(&manifest, dir.clone());
    if args.language.is_some() {
        config.language = args.language;
    }
    if args.command.is_some() {
        config.command = args.command;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    config.force = args.force;

    let artifact = build::build(&manifest, &config)?;
    let package = package::pack(&artifact, &dir, &manifest.name, args.include_source)?;

    Ok((
        BuildOutput {
            name: manifest.name.clone(),
            language: config.language.unwrap_or(manifest.language),
            artifact,
            package,
        },
        0,
    ))
}

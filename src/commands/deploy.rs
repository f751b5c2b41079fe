use clap::Args;

use roadie::api::ApiClient;
use roadie::artifact::resolve_artifact_path;
use roadie::config::{BackendSpec, DeployConfig};
use roadie::deploy::{self, DeployOutcome};
use roadie::manifest::Manifest;
use roadie::package::{self, Package};
use roadie::publish::resolve_for_deploy;
use roadie::version::VersionSelector;

use crate::commands::{working_dir, CmdResult};

#[derive(Args)]
pub struct DeployArgs {
    /// Path or glob of the package to deploy (defaults to pkg/<name>.zip)
    #[arg(short = 'p', long)]
    pub package: Option<String>,

    /// Service version to deploy to: 'latest', 'active', or a number
    #[arg(long)]
    pub version: Option<VersionSelector>,

    /// Clone the version first if it is locked or active
    #[arg(long)]
    pub autoclone: bool,

    /// Domain name to ensure on the version
    #[arg(long)]
    pub domain: Option<String>,

    /// Backend hostname or address to ensure on the version
    #[arg(long)]
    pub backend: Option<String>,

    /// Port for the backend
    #[arg(long)]
    pub backend_port: Option<u16>,

    /// Upload without activating the version
    #[arg(long)]
    pub no_activate: bool,

    /// Service ID override (defaults to the manifest's service_id)
    #[arg(short = 's', long)]
    pub service_id: Option<String>,
}

pub fn run(args: DeployArgs) -> CmdResult<DeployOutcome> {
    let dir = working_dir()?;
    let manifest = Manifest::load(&dir)?;

    let service_id = match args.service_id {
        Some(id) => id,
        None => manifest.require_service_id()?.to_string(),
    };

    let mut config = DeployConfig::from_manifest(&manifest, service_id);
    if let Some(selector) = args.version {
        config.selector = selector;
    }
    config.autoclone = args.autoclone;
    if args.domain.is_some() {
        config.domain = args.domain;
    }
    if let Some(address) = args.backend {
        let port = args
            .backend_port
            .or(manifest.defaults.backend_port)
            .unwrap_or(80);
        config.backend = Some(BackendSpec::from_address(address, port));
    } else if let Some(port) = args.backend_port {
        if let Some(backend) = &mut config.backend {
            backend.port = port;
        }
    }
    config.activate = !args.no_activate;
    config.package = args.package;

    let pattern = config.package.clone().unwrap_or_else(|| {
        package::default_package_path(&dir, &manifest.name)
            .display()
            .to_string()
    });
    let package_path = resolve_artifact_path(&pattern)?;
    let package = Package {
        digest: package::digest_file(&package_path)?,
        path: package_path,
        includes_source: false,
    };

    let client = ApiClient::from_env()?;
    // Lock state is authoritative remotely, so resolution happens
    // immediately before the deploy walk.
    let resolved = resolve_for_deploy(&client, &config)?;
    let outcome = deploy::deploy(&client, &client, &config, &resolved, &package)?;

    Ok((outcome, 0))
}

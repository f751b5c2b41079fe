use clap::Args;

use roadie::api::ApiClient;
use roadie::config::{OptionalField, PublishOverrides};
use roadie::manifest::{Language, Manifest};
use roadie::publish::{self, PublishOutcome};
use roadie::version::VersionSelector;

use crate::commands::{working_dir, CmdResult};

#[derive(Args)]
pub struct PublishArgs {
    // Build flags
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

    // Deploy flags
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
}

/// Map CLI flags onto the override set. Only flags the user actually
/// passed are marked as explicitly set; boolean switches count as set
/// only when toggled on, since clap cannot distinguish an omitted flag
/// from a default `false`.
fn to_overrides(args: &PublishArgs) -> PublishOverrides {
    let mut overrides = PublishOverrides::default();

    if let Some(language) = args.language {
        overrides.language = OptionalField::set(Some(language));
    }
    if let Some(command) = &args.command {
        overrides.command = OptionalField::set(Some(command.clone()));
    }
    if let Some(timeout) = args.timeout {
        overrides.timeout_secs = OptionalField::set(timeout);
    }
    if args.force {
        overrides.force = OptionalField::set(true);
    }
    if args.include_source {
        overrides.include_source = OptionalField::set(true);
    }

    if let Some(selector) = &args.version {
        overrides.selector = OptionalField::set(selector.clone());
    }
    if args.autoclone {
        overrides.autoclone = OptionalField::set(true);
    }
    if let Some(domain) = &args.domain {
        overrides.domain = OptionalField::set(Some(domain.clone()));
    }
    if let Some(backend) = &args.backend {
        overrides.backend = OptionalField::set(Some(backend.clone()));
    }
    if let Some(port) = args.backend_port {
        overrides.backend_port = OptionalField::set(port);
    }
    if args.no_activate {
        overrides.activate = OptionalField::set(false);
    }

    overrides
}

pub fn run(args: PublishArgs) -> CmdResult<PublishOutcome> {
    let dir = working_dir()?;
    let manifest = Manifest::load(&dir)?;
    let overrides = to_overrides(&args);

    let client = ApiClient::from_env()?;
    let outcome = publish::publish(&manifest, &dir, &overrides, &client, &client)?;

    Ok((outcome, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_args() -> PublishArgs {
        PublishArgs {
            language: None,
            command: None,
            timeout: None,
            force: false,
            include_source: false,
            version: None,
            autoclone: false,
            domain: None,
            backend: None,
            backend_port: None,
            no_activate: false,
        }
    }

    #[test]
    fn omitted_flags_are_not_marked_set() {
        let overrides = to_overrides(&bare_args());
        assert!(!overrides.language.was_set());
        assert!(!overrides.timeout_secs.was_set());
        assert!(!overrides.activate.was_set());
        assert!(!overrides.selector.was_set());
    }

    #[test]
    fn passed_flags_are_marked_set() {
        let mut args = bare_args();
        args.timeout = Some(60);
        args.no_activate = true;
        args.version = Some(VersionSelector::Number(3));

        let overrides = to_overrides(&args);
        assert!(overrides.timeout_secs.was_set());
        assert_eq!(*overrides.timeout_secs.value(), 60);
        assert!(overrides.activate.was_set());
        assert!(!*overrides.activate.value());
        assert_eq!(*overrides.selector.value(), VersionSelector::Number(3));
    }
}

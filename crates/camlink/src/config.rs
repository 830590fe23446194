//! CLI configuration -- thin layer over `camlink_config`.
//!
//! Resolves the camera to talk to from the active profile, then applies
//! `GlobalOpts` flag overrides (--host, --password, --vendor, etc.).

use std::time::Duration;

use clap::parser::ValueSource;
use clap::{ArgMatches, ValueEnum};
use secrecy::SecretString;

use camlink_core::{ConnectionDescriptor, EngineConfig};

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use camlink_config::{
    Config, Defaults, Profile, config_path, load_config_or_default, save_config, store_password,
};

/// Everything a device command needs: where, as whom, and how patiently.
pub struct Target {
    pub descriptor: ConnectionDescriptor,
    pub engine: EngineConfig,
}

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Fill `--output` / `--color` from the config file when the user left
/// them at their built-in defaults.
pub fn apply_defaults(global: &mut GlobalOpts, defaults: &Defaults, matches: &ArgMatches) {
    let untouched = |id: &str| matches.value_source(id) == Some(ValueSource::DefaultValue);
    if untouched("output") {
        if let Ok(format) = OutputFormat::from_str(&defaults.output, true) {
            global.output = format;
        }
    }
    if untouched("color") {
        if let Ok(mode) = ColorMode::from_str(&defaults.color, true) {
            global.color = mode;
        }
    }
}

/// Build the connection and engine settings for a device command.
///
/// Flag values win over the profile; the profile wins over built-in
/// defaults. A `--host` without any profile is enough on its own.
pub fn resolve_target(global: &GlobalOpts, config: &Config) -> Result<Target, CliError> {
    let profile = match config.profile(global.profile.as_deref()) {
        Ok(found) => found,
        // A bare --host does not need the default profile to exist.
        Err(_) if global.profile.is_none() && global.host.is_some() => None,
        Err(e) => return Err(e.into()),
    };

    // 1. Host (flag > env > profile)
    let host = global
        .host
        .as_deref()
        .or(profile.map(|(_, p)| p.host.as_str()))
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or(CliError::NoTarget)?;

    // 2. Port and username
    let port = global
        .port
        .or(profile.and_then(|(_, p)| p.port))
        .unwrap_or(ConnectionDescriptor::DEFAULT_PORT);
    let username = global
        .username
        .clone()
        .or_else(|| profile.and_then(|(_, p)| p.username.clone()))
        .unwrap_or_else(|| ConnectionDescriptor::DEFAULT_USERNAME.into());

    // 3. Password (flag > profile chain > none)
    let password = match (&global.password, profile) {
        (Some(pw), _) => SecretString::from(pw.clone()),
        (None, Some((name, p))) => camlink_config::resolve_password(p, name)
            .unwrap_or_else(|| SecretString::from(String::new())),
        (None, None) => SecretString::from(String::new()),
    };

    // 4. Auth scheme and vendor hint
    let auth_mode = global
        .auth_mode
        .or(profile.map(|(_, p)| p.auth_mode))
        .unwrap_or_default();
    let vendor = global.vendor.or(profile.and_then(|(_, p)| p.vendor));

    let descriptor = ConnectionDescriptor::new(host, port)
        .with_credentials(username, password)
        .with_auth_mode(auth_mode)
        .with_vendor(vendor);

    // 5. Engine tuning
    let mut engine = camlink_config::engine_config(&config.defaults, profile.map(|(_, p)| p));
    if let Some(secs) = global.timeout {
        engine.operation_timeout = Duration::from_secs(secs);
    }

    Ok(Target { descriptor, engine })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::{CommandFactory, Parser};
    use secrecy::ExposeSecret;

    use camlink_core::{AuthMode, Vendor};

    use super::*;
    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["camlink"];
        argv.extend_from_slice(args);
        argv.push("check");
        Cli::try_parse_from(argv).unwrap().global
    }

    fn config_with_lobby() -> Config {
        let mut lobby = Profile::new("192.168.1.64");
        lobby.username = Some("operator".into());
        lobby.password = Some("from-file".into());
        lobby.vendor = Some(Vendor::Hikvision);
        lobby.auth_mode = AuthMode::Basic;
        lobby.timeout = Some(45);
        let mut config = Config::default();
        config.profiles.insert("lobby".into(), lobby);
        config.default_profile = Some("lobby".into());
        config
    }

    #[test]
    fn bare_host_needs_no_profile() {
        let target = resolve_target(&global(&["--host", "10.0.0.8"]), &Config::default()).unwrap();
        assert_eq!(target.descriptor.host(), "10.0.0.8");
        assert_eq!(target.descriptor.port(), 80);
        assert_eq!(target.descriptor.username(), "admin");
        assert_eq!(target.descriptor.vendor(), None);
    }

    #[test]
    fn flags_override_profile() {
        let target = resolve_target(
            &global(&[
                "--host",
                "10.0.0.9",
                "--vendor",
                "dahua",
                "--password",
                "from-flag",
                "--timeout",
                "5",
            ]),
            &config_with_lobby(),
        )
        .unwrap();
        assert_eq!(target.descriptor.host(), "10.0.0.9");
        assert_eq!(target.descriptor.username(), "operator");
        assert_eq!(target.descriptor.vendor(), Some(Vendor::Dahua));
        assert_eq!(target.descriptor.auth_mode(), AuthMode::Basic);
        assert_eq!(target.descriptor.password().expose_secret(), "from-flag");
        assert_eq!(target.engine.operation_timeout, Duration::from_secs(5));
    }

    #[test]
    fn profile_timeout_applies_without_flag() {
        let target = resolve_target(&global(&["--password", "x"]), &config_with_lobby()).unwrap();
        assert_eq!(target.descriptor.host(), "192.168.1.64");
        assert_eq!(target.engine.operation_timeout, Duration::from_secs(45));
    }

    #[test]
    fn no_host_anywhere_is_an_error() {
        let err = resolve_target(&global(&[]), &Config::default())
            .err()
            .unwrap();
        assert!(matches!(err, CliError::NoTarget));
    }

    #[test]
    fn config_output_applies_only_without_flag() {
        let defaults = Defaults {
            output: "yaml".into(),
            ..Defaults::default()
        };

        let matches = Cli::command().get_matches_from(["camlink", "check"]);
        let mut opts = global(&[]);
        apply_defaults(&mut opts, &defaults, &matches);
        assert!(matches!(opts.output, OutputFormat::Yaml));

        let matches = Cli::command().get_matches_from(["camlink", "-o", "json", "check"]);
        let mut opts = global(&["-o", "json"]);
        apply_defaults(&mut opts, &defaults, &matches);
        assert!(matches!(opts.output, OutputFormat::Json));
    }

    #[test]
    fn named_profile_must_exist() {
        let err = resolve_target(
            &global(&["--profile", "garage", "--host", "10.0.0.8"]),
            &config_with_lobby(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, CliError::ProfileNotFound { ref name } if name == "garage"));
    }
}

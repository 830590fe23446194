//! Config subcommand handlers.

use std::fmt::Write as _;

use dialoguer::{Input, Password, Select};
use serde::Serialize;
use tabled::Tabled;

use camlink_core::{AuthMode, Vendor};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "probe_timeout = {}", cfg.defaults.probe_timeout);
    let _ = writeln!(out, "verify_tls = {}", cfg.defaults.verify_tls);
    let order: Vec<String> = cfg
        .defaults
        .vendor_order
        .iter()
        .map(|v| format!("\"{v}\""))
        .collect();
    let _ = writeln!(out, "vendor_order = [{}]", order.join(", "));

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "host = \"{}\"", p.host);
        if let Some(port) = p.port {
            let _ = writeln!(out, "port = {port}");
        }
        if let Some(ref u) = p.username {
            let _ = writeln!(out, "username = \"{u}\"");
        }
        if p.password.is_some() {
            let _ = writeln!(out, "password = \"****\"");
        }
        if let Some(ref env) = p.password_env {
            let _ = writeln!(out, "password_env = \"{env}\"");
        }
        let _ = writeln!(out, "auth_mode = \"{}\"", p.auth_mode);
        if let Some(vendor) = p.vendor {
            let _ = writeln!(out, "vendor = \"{vendor}\"");
        }
        if let Some(timeout) = p.timeout {
            let _ = writeln!(out, "timeout = {timeout}");
        }
    }

    out
}

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Store the password in the keyring, or hand it back for the config file.
fn prompt_password_storage(profile_name: &str, password: String) -> Result<Option<String>, CliError> {
    let choices = &[
        "Store in system keyring (recommended)",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Where to store the password?")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    if selection == 0 {
        config::store_password(profile_name, &password)?;
        eprintln!("   ✓ Password stored in system keyring");
        Ok(None)
    } else {
        Ok(Some(password))
    }
}

// ── Profile listing ─────────────────────────────────────────────────

#[derive(Serialize)]
struct ProfileSummary {
    name: String,
    host: String,
    port: Option<u16>,
    vendor: Option<Vendor>,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Vendor")]
    vendor: String,
}

impl From<&ProfileSummary> for ProfileRow {
    fn from(p: &ProfileSummary) -> Self {
        Self {
            marker: if p.default { "*" } else { "" },
            name: p.name.clone(),
            host: match p.port {
                Some(port) => format!("{}:{port}", p.host),
                None => p.host.clone(),
            },
            vendor: p.vendor.map_or_else(|| "auto".into(), |v| v.to_string()),
        }
    }
}

fn summaries(cfg: &Config) -> Vec<ProfileSummary> {
    let mut list: Vec<ProfileSummary> = cfg
        .profiles
        .iter()
        .map(|(name, p)| ProfileSummary {
            name: name.clone(),
            host: p.host.clone(),
            port: p.port,
            vendor: p.vendor,
            default: cfg.default_profile.as_deref() == Some(name.as_str()),
        })
        .collect();
    list.sort_by(|a, b| a.name.cmp(&b.name));
    list
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("camlink: camera profile setup");
            eprintln!("   Config path: {}\n", config_path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let host: String = Input::new()
                .with_prompt("Camera address")
                .interact_text()
                .map_err(prompt_err)?;
            if host.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "host".into(),
                    reason: "address cannot be empty".into(),
                });
            }

            let port: u16 = Input::new()
                .with_prompt("HTTP port")
                .default(80)
                .interact_text()
                .map_err(prompt_err)?;

            let username: String = Input::new()
                .with_prompt("Username")
                .default("admin".into())
                .interact_text()
                .map_err(prompt_err)?;

            let password = Password::new()
                .with_prompt("Password (empty for none)")
                .allow_empty_password(true)
                .interact()
                .map_err(prompt_err)?;
            let password = if password.is_empty() {
                None
            } else {
                prompt_password_storage(&profile_name, password)?
            };

            let vendor_choices = ["Detect automatically", "Axis", "Hikvision", "Dahua", "ONVIF"];
            let vendor = match Select::new()
                .with_prompt("Vendor")
                .items(&vendor_choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?
            {
                1 => Some(Vendor::Axis),
                2 => Some(Vendor::Hikvision),
                3 => Some(Vendor::Dahua),
                4 => Some(Vendor::Onvif),
                _ => None,
            };

            let profile = Profile {
                host: host.trim().to_owned(),
                port: (port != 80).then_some(port),
                username: Some(username),
                password,
                password_env: None,
                auth_mode: AuthMode::default(),
                vendor,
                timeout: None,
            };

            let mut cfg = config::load_config_or_default();
            if cfg.default_profile.is_none() {
                cfg.default_profile = Some(profile_name.clone());
            }
            cfg.profiles.insert(profile_name.clone(), profile);
            config::save_config(&cfg)?;

            eprintln!("\n   ✓ Profile '{profile_name}' saved to {}", config_path.display());
            eprintln!("   Try: camlink --profile {profile_name} check");
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            output::print_output(&format_config_redacted(&cfg), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let list = summaries(&cfg);
            let out = output::render_list(
                &global.output,
                &list,
                |p| ProfileRow::from(p),
                |p| p.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound { name });
            }
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("Default profile set to '{name}'");
            }
            Ok(())
        }

        ConfigCommand::SetPassword { profile } => {
            let cfg = config::load_config_or_default();
            let name = profile
                .or_else(|| global.profile.clone())
                .unwrap_or_else(|| config::active_profile_name(global, &cfg));
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound { name });
            }
            let password = Password::new()
                .with_prompt(format!("Password for '{name}'"))
                .interact()
                .map_err(prompt_err)?;
            config::store_password(&name, &password)?;
            if !global.quiet {
                eprintln!("Password for '{name}' stored in system keyring");
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> Config {
        let mut lobby = Profile::new("192.168.1.64");
        lobby.password = Some("hunter2".into());
        lobby.vendor = Some(Vendor::Axis);
        let mut gate = Profile::new("10.0.0.8");
        gate.port = Some(8080);
        let mut cfg = Config::default();
        cfg.profiles.insert("lobby".into(), lobby);
        cfg.profiles.insert("gate".into(), gate);
        cfg.default_profile = Some("lobby".into());
        cfg
    }

    #[test]
    fn redacted_config_hides_password() {
        let text = format_config_redacted(&sample());
        assert!(!text.contains("hunter2"));
        assert!(text.contains("password = \"****\""));
        assert!(text.contains("[profiles.gate]"));
        assert!(text.contains("vendor = \"axis\""));
    }

    #[test]
    fn summaries_are_sorted_and_mark_default() {
        let list = summaries(&sample());
        let names: Vec<&str> = list.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["gate", "lobby"]);
        assert!(list[1].default);
        assert_eq!(ProfileRow::from(&list[0]).host, "10.0.0.8:8080");
    }
}

//! Config subcommand handlers.

use std::fmt::Write as _;

use serde::Serialize;
use tabled::Tabled;

use habsync_core::ConnectionConfig;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

const MASK: &str = "****";

/// Copy of `cfg` with plaintext tokens masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.token.is_some() {
            profile.token = Some(MASK.into());
        }
    }
    cfg
}

fn format_config(cfg: &Config) -> String {
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "poll_interval = {}", cfg.defaults.poll_interval);
    let _ = write!(out, "push = {}", cfg.defaults.push);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out, "\n\n[profiles.{name}]");
        let _ = write!(out, "server = \"{}\"", p.server);
        if let Some(ref token) = p.token {
            let _ = write!(out, "\ntoken = \"{token}\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = write!(out, "\ntoken_env = \"{env}\"");
        }
        if let Some(insecure) = p.insecure {
            let _ = write!(out, "\ninsecure = {insecure}");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = write!(out, "\nca_cert = \"{}\"", ca.display());
        }
        if let Some(timeout) = p.timeout {
            let _ = write!(out, "\ntimeout = {timeout}");
        }
        if let Some(poll) = p.poll_interval {
            let _ = write!(out, "\npoll_interval = {poll}");
        }
        if let Some(push) = p.push {
            let _ = write!(out, "\npush = {push}");
        }
    }

    out
}

fn validate_server(server: &str) -> Result<(), CliError> {
    ConnectionConfig::from_url(server)?;
    Ok(())
}

fn saved(path: &std::path::Path, what: &str, global: &GlobalOpts) {
    if !global.quiet {
        eprintln!("{what} ({})", path.display());
    }
}

#[derive(Serialize)]
struct ProfileSummary {
    name: String,
    server: String,
    default: bool,
}

#[derive(Tabled)]
struct ProfileRow {
    #[tabled(rename = "")]
    marker: &'static str,
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Server")]
    server: String,
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut cfg = config::load_config_or_default();
    let profile_name = config::active_profile_name(global, &cfg);

    match args.command {
        ConfigCommand::Init {
            server,
            token,
            plaintext,
        } => {
            validate_server(&server)?;
            let mut profile = Profile::new(server);
            if let Some(token) = token {
                if plaintext {
                    profile.token = Some(token);
                } else {
                    habsync_config::store_token(&profile_name, &token)?;
                }
            }

            cfg.profiles.insert(profile_name.clone(), profile);
            if cfg.profiles.len() == 1 || cfg.default_profile.is_none() {
                cfg.default_profile = Some(profile_name.clone());
            }
            let path = config::save_config(&cfg)?;
            saved(&path, &format!("Profile '{profile_name}' saved"), global);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = redacted(&cfg);
            let out = match global.output {
                OutputFormat::Json => serde_json::to_string_pretty(&cfg)?,
                OutputFormat::JsonCompact => serde_json::to_string(&cfg)?,
                OutputFormat::Table | OutputFormat::Plain => format_config(&cfg),
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Profiles => {
            let default = cfg.default_profile_name().to_owned();
            let profiles: Vec<ProfileSummary> = cfg
                .profiles
                .iter()
                .map(|(name, p)| ProfileSummary {
                    name: name.clone(),
                    server: p.server.clone(),
                    default: *name == default,
                })
                .collect();
            let out = output::render_list(
                global.output,
                &profiles,
                |p| ProfileRow {
                    marker: if p.default { "*" } else { "" },
                    name: p.name.clone(),
                    server: p.server.clone(),
                },
                |p| p.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Use { name } => {
            cfg.profile(&name)?;
            cfg.default_profile = Some(name.clone());
            let path = config::save_config(&cfg)?;
            saved(&path, &format!("Default profile set to '{name}'"), global);
            Ok(())
        }

        ConfigCommand::SetUrl { url } => {
            validate_server(&url)?;
            cfg.profiles
                .entry(profile_name.clone())
                .and_modify(|p| p.server.clone_from(&url))
                .or_insert_with(|| Profile::new(url.clone()));
            let path = config::save_config(&cfg)?;
            saved(
                &path,
                &format!("Profile '{profile_name}' now points at {url}"),
                global,
            );
            Ok(())
        }

        ConfigCommand::SetToken { token } => {
            habsync_config::store_token(&profile_name, &token)?;
            if !global.quiet {
                eprintln!("Token for '{profile_name}' stored in the system keyring");
            }
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn show_masks_plaintext_tokens() {
        let mut cfg = Config::default();
        cfg.profiles.insert(
            "home".into(),
            Profile {
                token: Some("oh.secret".into()),
                ..Profile::new("http://openhab.local:8080")
            },
        );

        let text = format_config(&redacted(&cfg));
        assert!(text.contains("[profiles.home]"));
        assert!(text.contains("server = \"http://openhab.local:8080\""));
        assert!(text.contains("token = \"****\""));
        assert!(!text.contains("oh.secret"));
    }
}

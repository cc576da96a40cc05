//! Configuration loading: JSON file, then environment, then CLI flags.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sorng_vmware::VsphereConfig;

pub const ENV_HOST: &str = "SNAPMON_HOST";
pub const ENV_PORT: &str = "SNAPMON_PORT";
pub const ENV_USERNAME: &str = "SNAPMON_USERNAME";
pub const ENV_PASSWORD: &str = "SNAPMON_PASSWORD";
pub const ENV_INSECURE: &str = "SNAPMON_INSECURE";

/// Command-line values that win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub insecure: bool,
    pub no_age: bool,
}

/// `<config dir>/snapmon/config.json`.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("snapmon").join("config.json"))
}

/// Read the config file. An explicit path must exist; the default path is
/// optional and falls back to built-in defaults.
pub fn load_file(explicit: Option<&Path>) -> Result<VsphereConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match default_path() {
            Some(p) if p.exists() => p,
            _ => return Ok(VsphereConfig::default()),
        },
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg: VsphereConfig = serde_json::from_str(&raw)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    log::debug!("loaded config from {}", path.display());
    Ok(cfg)
}

/// Apply `SNAPMON_*` variables via `lookup`.
pub fn apply_env<F>(cfg: &mut VsphereConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup(ENV_HOST) {
        cfg.host = host;
    }
    if let Some(port) = lookup(ENV_PORT) {
        cfg.port = port
            .trim()
            .parse()
            .with_context(|| format!("{ENV_PORT} is not a valid port: {port:?}"))?;
    }
    if let Some(user) = lookup(ENV_USERNAME) {
        cfg.username = user;
    }
    if let Some(password) = lookup(ENV_PASSWORD) {
        cfg.password = password;
    }
    if let Some(flag) = lookup(ENV_INSECURE) {
        cfg.insecure = parse_bool(&flag)
            .with_context(|| format!("{ENV_INSECURE} must be a boolean, got {flag:?}"))?;
    }
    Ok(())
}

pub fn apply_overrides(cfg: &mut VsphereConfig, overrides: &Overrides) {
    if let Some(host) = &overrides.host {
        cfg.host = host.clone();
    }
    if let Some(port) = overrides.port {
        cfg.port = port;
    }
    if let Some(user) = &overrides.username {
        cfg.username = user.clone();
    }
    if overrides.insecure {
        cfg.insecure = true;
    }
    if overrides.no_age {
        cfg.compute_snapshot_age = false;
    }
}

/// Required fields must be present before anything touches the network.
pub fn validate(cfg: &VsphereConfig) -> Result<()> {
    let mut missing = Vec::new();
    if cfg.host.trim().is_empty() {
        missing.push("host");
    }
    if cfg.username.trim().is_empty() {
        missing.push("username");
    }
    if cfg.password.is_empty() {
        missing.push("password");
    }
    if !missing.is_empty() {
        anyhow::bail!("missing required setting(s): {}", missing.join(", "));
    }
    if !cfg.sdk_path.starts_with('/') {
        anyhow::bail!("sdkPath must start with '/', got {:?}", cfg.sdk_path);
    }
    if cfg.timeout_secs == 0 {
        anyhow::bail!("timeoutSecs must be greater than zero");
    }
    Ok(())
}

/// File, then process environment, then flags; validated.
pub fn resolve(explicit: Option<&Path>, overrides: &Overrides) -> Result<VsphereConfig> {
    let mut cfg = load_file(explicit)?;
    apply_env(&mut cfg, |key| std::env::var(key).ok())?;
    apply_overrides(&mut cfg, overrides);
    validate(&cfg)?;
    Ok(cfg)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

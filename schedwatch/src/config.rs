//! Connection profiles and runtime settings.
//!
//! Profiles map a name to a simulator URL (plus an optional poll interval) and
//! live under $XDG_CONFIG_HOME/schedwatch/profiles.json (fallback
//! ~/.config/schedwatch/profiles.json).

use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path, path::PathBuf, time::Duration};

use crate::error::{Error, Result};
use crate::monitor::MonitorConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const API_URL_ENV: &str = "SCHEDWATCH_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProfileEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileEntry>,
    #[serde(default)]
    pub version: u32,
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("schedwatch")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("schedwatch")
    }
}

pub fn profiles_path() -> PathBuf {
    config_dir().join("profiles.json")
}

/// Missing file is an empty set of profiles; a corrupt one is an error.
pub fn load_profiles(path: &Path) -> Result<ProfilesFile> {
    match fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ProfilesFile::default()),
        Err(e) => Err(e.into()),
    }
}

pub fn save_profiles(path: &Path, p: &ProfilesFile) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(p)?;
    fs::write(path, data)?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveProfile {
    /// URL given on the command line. (url, poll_ms)
    Direct(String, Option<u64>),
    /// Loaded from an existing profile entry.
    Loaded(ProfileEntry),
    /// Profile named but not stored, and no URL to create it with.
    Unknown(String),
    /// Nothing given: environment override or the built-in default.
    Fallback(String),
}

pub struct ProfileRequest {
    pub profile_name: Option<String>,
    pub url: Option<String>,
    pub poll_ms: Option<u64>,
}

impl ProfileRequest {
    pub fn resolve(self, pf: &ProfilesFile, env_url: Option<String>) -> ResolveProfile {
        if let Some(u) = self.url {
            return ResolveProfile::Direct(u, self.poll_ms);
        }
        if let Some(name) = self.profile_name {
            return match pf.profiles.get(&name) {
                Some(entry) => {
                    let mut entry = entry.clone();
                    if self.poll_ms.is_some() {
                        entry.poll_ms = self.poll_ms;
                    }
                    ResolveProfile::Loaded(entry)
                }
                None => ResolveProfile::Unknown(name),
            };
        }
        ResolveProfile::Fallback(
            env_url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        )
    }
}

/// Outcome of remembering a direct URL under a profile name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Created,
    Overwritten,
    Unchanged,
    /// Entry exists with different values and overwrite was not requested.
    Kept,
}

/// New names are stored immediately; changing an existing entry needs `overwrite`.
pub fn remember_profile(
    pf: &mut ProfilesFile,
    name: &str,
    entry: ProfileEntry,
    overwrite: bool,
) -> SaveOutcome {
    match pf.profiles.get(name) {
        None => {
            pf.profiles.insert(name.to_string(), entry);
            SaveOutcome::Created
        }
        Some(existing) if *existing == entry => SaveOutcome::Unchanged,
        Some(_) if overwrite => {
            pf.profiles.insert(name.to_string(), entry);
            SaveOutcome::Overwritten
        }
        Some(_) => SaveOutcome::Kept,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_url: String,
    pub request_timeout: Duration,
    pub monitor: MonitorConfig,
}

impl Settings {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            request_timeout: Duration::from_secs(5),
            monitor: MonitorConfig::default(),
        }
    }

    pub fn with_poll_ms(mut self, poll_ms: Option<u64>) -> Self {
        if let Some(ms) = poll_ms.filter(|ms| *ms > 0) {
            self.monitor.poll_interval = Duration::from_millis(ms);
        }
        self
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

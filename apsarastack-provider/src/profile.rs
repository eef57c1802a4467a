//! Local credentials profile file
//!
//! The profile file is a JSON document shaped like
//! `{"profiles": [{"name": "default", "mode": "AK", ...}]}`. A
//! [`ProfileLoader`] reads it at most once and selects the record named by
//! the provider's `profile` attribute. Which keys a record answers depends on
//! its authentication mode.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use apsarastack_core::env::Env;
use log::debug;
use serde::{Deserialize, Deserializer};
use tokio::sync::OnceCell;

/// Directory under the home directory that holds the profile file
pub const DEFAULT_PROFILE_DIR: &str = ".apsarastack";
/// File name of the profile file
pub const DEFAULT_PROFILE_FILE: &str = "config.json";

/// Errors raised while loading the profile file
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Failed to read profile file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse profile file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Profile '{profile}' uses mode {mode} but has no {field}")]
    MissingField {
        profile: String,
        mode: AuthMode,
        field: &'static str,
    },
}

pub type ProfileResult<T> = Result<T, ProfileError>;

/// Authentication mode of a profile record
///
/// Any mode string other than the three named ones (e.g. `AK`) is the
/// default static key/secret mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum AuthMode {
    EcsRamRole,
    StsToken,
    RamRoleArn,
    #[serde(other)]
    Default,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthMode::EcsRamRole => "EcsRamRole",
            AuthMode::StsToken => "StsToken",
            AuthMode::RamRoleArn => "RamRoleArn",
            AuthMode::Default => "Default",
        };
        f.write_str(s)
    }
}

/// String keys a profile record can answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKey {
    AccessKeyId,
    AccessKeySecret,
    RegionId,
    RamRoleName,
    StsToken,
    RamRoleArn,
    RamSessionName,
}

impl ProfileKey {
    /// Whether this key is meaningful under `mode`
    fn applies_to(self, mode: AuthMode) -> bool {
        match self {
            ProfileKey::AccessKeyId | ProfileKey::AccessKeySecret => match mode {
                AuthMode::EcsRamRole => false,
                AuthMode::StsToken | AuthMode::RamRoleArn | AuthMode::Default => true,
            },
            ProfileKey::RamRoleName => matches!(mode, AuthMode::EcsRamRole),
            ProfileKey::StsToken => matches!(mode, AuthMode::StsToken),
            ProfileKey::RamRoleArn | ProfileKey::RamSessionName => {
                matches!(mode, AuthMode::RamRoleArn)
            }
            ProfileKey::RegionId => true,
        }
    }
}

/// A named entry of the profile file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfileRecord {
    pub name: String,
    pub mode: Option<AuthMode>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub sts_token: Option<String>,
    pub ram_role_name: Option<String>,
    pub ram_role_arn: Option<String>,
    pub ram_session_name: Option<String>,
    #[serde(deserialize_with = "deserialize_seconds")]
    pub expired_seconds: Option<u64>,
    pub region_id: Option<String>,
}

impl ProfileRecord {
    /// Look up a key, honoring the record's mode
    ///
    /// Returns `None` when the record has no mode, when the key does not apply
    /// to the mode, or when the value is missing or empty.
    pub fn get(&self, key: ProfileKey) -> Option<&str> {
        let mode = self.mode?;
        if !key.applies_to(mode) {
            return None;
        }

        let value = match key {
            ProfileKey::AccessKeyId => &self.access_key_id,
            ProfileKey::AccessKeySecret => &self.access_key_secret,
            ProfileKey::RegionId => &self.region_id,
            ProfileKey::RamRoleName => &self.ram_role_name,
            ProfileKey::StsToken => &self.sts_token,
            ProfileKey::RamRoleArn => &self.ram_role_arn,
            ProfileKey::RamSessionName => &self.ram_session_name,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// Session expiration for RamRoleArn profiles, 0 otherwise
    pub fn expired_seconds(&self) -> u64 {
        match self.mode {
            Some(AuthMode::RamRoleArn) => self.expired_seconds.unwrap_or(0),
            Some(AuthMode::EcsRamRole | AuthMode::StsToken | AuthMode::Default) | None => 0,
        }
    }

    /// Check that the fields the mode depends on are present
    fn validate(&self) -> ProfileResult<()> {
        let Some(mode) = self.mode else {
            return Ok(());
        };

        let (field, value) = match mode {
            AuthMode::EcsRamRole => ("ram_role_name", &self.ram_role_name),
            AuthMode::StsToken => ("sts_token", &self.sts_token),
            AuthMode::RamRoleArn => ("ram_role_arn", &self.ram_role_arn),
            AuthMode::Default => return Ok(()),
        };

        match value.as_deref() {
            Some(v) if !v.is_empty() => Ok(()),
            _ => Err(ProfileError::MissingField {
                profile: self.name.clone(),
                mode,
                field,
            }),
        }
    }
}

/// Whole-number seconds, written either as `900` or `900.0`
fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let whole = |seconds: f64| seconds >= 0.0 && seconds.fract() == 0.0 && seconds <= u64::MAX as f64;
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(seconds) if whole(seconds) => Ok(Some(seconds as u64)),
        Some(seconds) => Err(serde::de::Error::custom(format!(
            "expected a whole number of seconds, found {}",
            seconds
        ))),
    }
}

/// Records are left untyped until one is selected by name
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProfileFile {
    profiles: Vec<serde_json::Value>,
}

/// Loads the active profile record on first use and caches it
///
/// The file is read at most once per loader, no matter how many lookups are
/// made or whether the first read found anything.
#[derive(Debug)]
pub struct ProfileLoader {
    profile: Option<String>,
    path: PathBuf,
    record: OnceCell<Option<ProfileRecord>>,
}

impl ProfileLoader {
    /// Create a loader for `profile`, reading from `path` or the default location
    ///
    /// An empty profile name disables the loader. A leading `~` in `path` is
    /// expanded to the home directory.
    pub fn new(profile: Option<&str>, path: Option<&str>, env: &Env) -> Self {
        let path = match path.map(str::trim).filter(|p| !p.is_empty()) {
            Some(p) => expand_home(p, env),
            None => default_profile_path(env),
        };

        Self {
            profile: profile
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            path,
            record: OnceCell::new(),
        }
    }

    /// Path of the profile file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The selected profile record, if any
    pub async fn record(&self) -> ProfileResult<Option<&ProfileRecord>> {
        let record = self.record.get_or_try_init(|| self.load()).await?;
        Ok(record.as_ref())
    }

    /// Look up a key in the selected profile
    pub async fn get(&self, key: ProfileKey) -> ProfileResult<Option<String>> {
        Ok(self
            .record()
            .await?
            .and_then(|r| r.get(key))
            .map(str::to_string))
    }

    /// Session expiration configured in the selected profile, 0 when absent
    pub async fn expired_seconds(&self) -> ProfileResult<u64> {
        Ok(self
            .record()
            .await?
            .map(ProfileRecord::expired_seconds)
            .unwrap_or(0))
    }

    async fn load(&self) -> ProfileResult<Option<ProfileRecord>> {
        let Some(profile) = self.profile.as_deref() else {
            return Ok(None);
        };

        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Profile file {} not found", self.path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(ProfileError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let file: ProfileFile =
            serde_json::from_str(&content).map_err(|source| ProfileError::Parse {
                path: self.path.clone(),
                source,
            })?;

        // Later entries with the same name win
        let record = file
            .profiles
            .into_iter()
            .rev()
            .find(|p| p.get("name").and_then(serde_json::Value::as_str) == Some(profile))
            .map(serde_json::from_value::<ProfileRecord>)
            .transpose()
            .map_err(|source| ProfileError::Parse {
                path: self.path.clone(),
                source,
            })?;

        match &record {
            Some(r) => {
                r.validate()?;
                debug!(
                    "Loaded profile '{}' from {}",
                    profile,
                    self.path.display()
                );
            }
            None => debug!(
                "Profile '{}' not found in {}",
                profile,
                self.path.display()
            ),
        }

        Ok(record)
    }
}

fn home_dir(env: &Env) -> Option<PathBuf> {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    env.get_non_empty(var)
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
}

fn default_profile_path(env: &Env) -> PathBuf {
    home_dir(env)
        .unwrap_or_default()
        .join(DEFAULT_PROFILE_DIR)
        .join(DEFAULT_PROFILE_FILE)
}

fn expand_home(path: &str, env: &Env) -> PathBuf {
    match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => {
            match home_dir(env) {
                Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
                None => PathBuf::from(path),
            }
        }
        _ => PathBuf::from(path),
    }
}

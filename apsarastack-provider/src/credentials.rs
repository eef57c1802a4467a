//! Credential resolution
//!
//! Merges the provider block (already defaulted from the environment by the
//! schema) with the selected profile record. Explicit values always win;
//! profile values fill the gaps; only the region has a hardcoded default.

use std::fmt;

use apsarastack_core::env::Env;
use apsarastack_core::resource::ResourceData;
use log::info;

use crate::profile::{ProfileKey, ProfileLoader, ProfileResult};

pub const DEFAULT_REGION: &str = "cn-beijing";
pub const DEFAULT_SESSION_NAME: &str = "terraform";
pub const DEFAULT_SESSION_EXPIRATION: u64 = 3600;
/// Overrides the session expiration when the assume_role block leaves it unset
pub const SESSION_EXPIRATION_ENV: &str = "APSARASTACK_ASSUME_ROLE_SESSION_EXPIRATION";

/// Assume-role settings after merging the profile and the assume_role block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumeRoleParams {
    pub role_arn: String,
    pub session_name: String,
    pub policy: String,
    pub session_expiration: u64,
}

impl AssumeRoleParams {
    /// An STS exchange is needed only when a role ARN is configured
    pub fn is_enabled(&self) -> bool {
        !self.role_arn.is_empty()
    }
}

/// Output of [`CredentialResolver::resolve`]
///
/// Missing keys are left empty; the remote API reports them.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub security_token: String,
    pub region: String,
    pub ecs_role_name: String,
    pub assume_role: AssumeRoleParams,
}

impl fmt::Debug for ResolvedCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"** redacted **")
            .field("security_token", &"** redacted **")
            .field("region", &self.region)
            .field("ecs_role_name", &self.ecs_role_name)
            .field("assume_role", &self.assume_role)
            .finish()
    }
}

pub struct CredentialResolver<'a> {
    profile: &'a ProfileLoader,
    env: &'a Env,
}

impl<'a> CredentialResolver<'a> {
    pub fn new(profile: &'a ProfileLoader, env: &'a Env) -> Self {
        Self { profile, env }
    }

    pub async fn resolve(&self, data: &ResourceData) -> ProfileResult<ResolvedCredentials> {
        let access_key = self
            .explicit_or_profile(data, "access_key", ProfileKey::AccessKeyId)
            .await?;
        let secret_key = self
            .explicit_or_profile(data, "secret_key", ProfileKey::AccessKeySecret)
            .await?;
        let mut region = self
            .explicit_or_profile(data, "region", ProfileKey::RegionId)
            .await?;
        if region.is_empty() {
            region = DEFAULT_REGION.to_string();
        }
        let ecs_role_name = self
            .explicit_or_profile(data, "ecs_role_name", ProfileKey::RamRoleName)
            .await?;
        let security_token = self
            .explicit_or_profile(data, "security_token", ProfileKey::StsToken)
            .await?;

        let assume_role = self.assume_role(data).await?;

        Ok(ResolvedCredentials {
            access_key,
            secret_key,
            security_token,
            region,
            ecs_role_name,
            assume_role,
        })
    }

    async fn explicit_or_profile(
        &self,
        data: &ResourceData,
        attribute: &str,
        key: ProfileKey,
    ) -> ProfileResult<String> {
        let explicit = data.get_str(attribute).trim();
        if !explicit.is_empty() {
            return Ok(explicit.to_string());
        }
        Ok(self
            .profile
            .get(key)
            .await?
            .map(|v| v.trim().to_string())
            .unwrap_or_default())
    }

    async fn assume_role(&self, data: &ResourceData) -> ProfileResult<AssumeRoleParams> {
        let mut role_arn = self
            .profile
            .get(ProfileKey::RamRoleArn)
            .await?
            .unwrap_or_default();
        let mut session_name = self
            .profile
            .get(ProfileKey::RamSessionName)
            .await?
            .unwrap_or_default();
        let mut policy = String::new();
        let mut explicit_expiration = 0;

        // Only a single assume_role block is honored
        if let [block] = data.get_blocks("assume_role").as_slice() {
            let arn = block.get_str("role_arn").trim();
            if !arn.is_empty() {
                role_arn = arn.to_string();
            }
            let name = block.get_str("session_name").trim();
            if !name.is_empty() {
                session_name = name.to_string();
            }
            policy = block.get_str("policy").trim().to_string();
            explicit_expiration = u64::try_from(block.get_int("session_expiration")).unwrap_or(0);
        }

        if session_name.trim().is_empty() {
            session_name = DEFAULT_SESSION_NAME.to_string();
        }

        let session_expiration = match explicit_expiration {
            0 => self.fallback_expiration().await?,
            explicit => explicit,
        };

        let params = AssumeRoleParams {
            role_arn: role_arn.trim().to_string(),
            session_name: session_name.trim().to_string(),
            policy,
            session_expiration,
        };

        if params.is_enabled() {
            info!(
                "assume_role configuration set: (RamRoleArn: {:?}, RamRoleSessionName: {:?}, RamRolePolicy: {:?}, RamRoleSessionExpiration: {})",
                params.role_arn, params.session_name, params.policy, params.session_expiration
            );
        }

        Ok(params)
    }

    /// Environment override, then the profile, then the default
    async fn fallback_expiration(&self) -> ProfileResult<u64> {
        if let Some(seconds) = self
            .env
            .get_non_empty(SESSION_EXPIRATION_ENV)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v > 0)
        {
            return Ok(seconds);
        }

        match self.profile.expired_seconds().await? {
            0 => Ok(DEFAULT_SESSION_EXPIRATION),
            seconds => Ok(seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apsarastack_core::resource::Value;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    const PROFILES: &str = r#"{
        "profiles": [
            {
                "name": "static",
                "mode": "AK",
                "access_key_id": " ak-profile ",
                "access_key_secret": "sk-profile",
                "region_id": "cn-shanghai"
            },
            {
                "name": "ecs",
                "mode": "EcsRamRole",
                "access_key_id": "ak-ecs",
                "access_key_secret": "sk-ecs",
                "ram_role_name": "worker"
            },
            {
                "name": "arn",
                "mode": "RamRoleArn",
                "access_key_id": "ak-arn",
                "access_key_secret": "sk-arn",
                "ram_role_arn": "acs:ram::123:role/profile",
                "ram_session_name": "profile-session",
                "expired_seconds": 1800
            }
        ]
    }"#;

    struct Fixture {
        _dir: TempDir,
        path: String,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, PROFILES).unwrap();
        Fixture {
            path: path.to_string_lossy().to_string(),
            _dir: dir,
        }
    }

    fn data(pairs: Vec<(&str, Value)>) -> ResourceData {
        ResourceData::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<HashMap<_, _>>(),
        )
    }

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    fn assume_role_block(pairs: Vec<(&str, Value)>) -> Value {
        Value::List(vec![Value::Map(
            pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        )])
    }

    async fn resolve(
        profile: Option<&str>,
        path: &str,
        env: &Env,
        data: &ResourceData,
    ) -> ResolvedCredentials {
        let loader = ProfileLoader::new(profile, Some(path), env);
        CredentialResolver::new(&loader, env)
            .resolve(data)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn explicit_values_win_and_are_trimmed() {
        let f = fixture();
        let env = Env::from_slice(&[]);
        let creds = resolve(
            Some("static"),
            &f.path,
            &env,
            &data(vec![
                ("access_key", s("  ak-explicit ")),
                ("secret_key", s("sk-explicit")),
                ("region", s(" cn-qingdao ")),
            ]),
        )
        .await;

        assert_eq!(creds.access_key, "ak-explicit");
        assert_eq!(creds.secret_key, "sk-explicit");
        assert_eq!(creds.region, "cn-qingdao");
    }

    #[tokio::test]
    async fn empty_explicit_falls_back_to_profile() {
        let f = fixture();
        let env = Env::from_slice(&[]);
        let creds = resolve(
            Some("static"),
            &f.path,
            &env,
            &data(vec![("access_key", s(""))]),
        )
        .await;

        assert_eq!(creds.access_key, "ak-profile");
        assert_eq!(creds.secret_key, "sk-profile");
        assert_eq!(creds.region, "cn-shanghai");
        assert!(!creds.assume_role.is_enabled());
    }

    #[tokio::test]
    async fn ecs_ram_role_profile_leaves_access_key_empty() {
        let f = fixture();
        let env = Env::from_slice(&[]);
        let creds = resolve(Some("ecs"), &f.path, &env, &data(vec![])).await;

        assert_eq!(creds.access_key, "");
        assert_eq!(creds.secret_key, "");
        assert_eq!(creds.ecs_role_name, "worker");
    }

    #[tokio::test]
    async fn region_defaults_without_profile() {
        let f = fixture();
        let env = Env::from_slice(&[]);
        let creds = resolve(None, &f.path, &env, &data(vec![])).await;

        assert_eq!(creds.region, DEFAULT_REGION);
        assert_eq!(creds.access_key, "");
    }

    #[tokio::test]
    async fn session_expiration_defaults_to_3600() {
        let f = fixture();
        let env = Env::from_slice(&[]);
        let creds = resolve(
            None,
            &f.path,
            &env,
            &data(vec![(
                "assume_role",
                assume_role_block(vec![("role_arn", s("acs:ram::1:role/admin"))]),
            )]),
        )
        .await;

        assert!(creds.assume_role.is_enabled());
        assert_eq!(creds.assume_role.session_expiration, 3600);
        assert_eq!(creds.assume_role.session_name, DEFAULT_SESSION_NAME);
    }

    #[tokio::test]
    async fn session_expiration_from_environment() {
        let f = fixture();
        let env = Env::from_slice(&[(SESSION_EXPIRATION_ENV, "1200")]);
        let creds = resolve(
            Some("arn"),
            &f.path,
            &env,
            &data(vec![(
                "assume_role",
                assume_role_block(vec![("session_expiration", Value::Int(0))]),
            )]),
        )
        .await;

        assert_eq!(creds.assume_role.session_expiration, 1200);
    }

    #[tokio::test]
    async fn unparsable_environment_expiration_is_ignored() {
        let f = fixture();
        let env = Env::from_slice(&[(SESSION_EXPIRATION_ENV, "soon")]);
        let creds = resolve(Some("arn"), &f.path, &env, &data(vec![])).await;

        assert_eq!(creds.assume_role.session_expiration, 1800);
    }

    #[tokio::test]
    async fn explicit_expiration_wins() {
        let f = fixture();
        let env = Env::from_slice(&[(SESSION_EXPIRATION_ENV, "1200")]);
        let creds = resolve(
            Some("arn"),
            &f.path,
            &env,
            &data(vec![(
                "assume_role",
                assume_role_block(vec![("session_expiration", Value::Int(900))]),
            )]),
        )
        .await;

        assert_eq!(creds.assume_role.session_expiration, 900);
    }

    #[tokio::test]
    async fn profile_role_is_overridden_by_block() {
        let f = fixture();
        let env = Env::from_slice(&[]);

        let creds = resolve(Some("arn"), &f.path, &env, &data(vec![])).await;
        assert_eq!(creds.assume_role.role_arn, "acs:ram::123:role/profile");
        assert_eq!(creds.assume_role.session_name, "profile-session");

        let creds = resolve(
            Some("arn"),
            &f.path,
            &env,
            &data(vec![(
                "assume_role",
                assume_role_block(vec![
                    ("role_arn", s("acs:ram::456:role/block")),
                    ("session_name", s("")),
                    ("policy", s(r#"{"Version":"1"}"#)),
                ]),
            )]),
        )
        .await;
        assert_eq!(creds.assume_role.role_arn, "acs:ram::456:role/block");
        assert_eq!(creds.assume_role.session_name, "profile-session");
        assert_eq!(creds.assume_role.policy, r#"{"Version":"1"}"#);
    }

    #[tokio::test]
    async fn explicit_security_token_is_trimmed() {
        let f = fixture();
        let env = Env::from_slice(&[]);
        let creds = resolve(
            Some("static"),
            &f.path,
            &env,
            &data(vec![("security_token", s(" tok "))]),
        )
        .await;

        assert_eq!(creds.security_token, "tok");
        assert!(!format!("{:?}", creds).contains("tok\""));
    }
}

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 7777;

/// Operator configuration (`nav.config.yaml`). Holds secrets, so it is never
/// served to clients.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NavConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "mailConfig")]
    pub mail: Option<MailConfig>,
    #[serde(default, rename = "XFAPIPassword")]
    pub xf_api_password: Option<String>,
    #[serde(default, rename = "translateProxyUrl")]
    pub translate_proxy_url: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub auth: MailAuth,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailAuth {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub pass: String,
}

impl NavConfig {
    /// The exact `authorization` header value that grants access, if a secret is set.
    pub fn expected_authorization(&self) -> Option<String> {
        let password = self.password.trim();
        if password.is_empty() {
            return None;
        }
        Some(format!("token {password}"))
    }
}

/// Source of the live configuration. Implementations must not cache: callers
/// rely on edits to the backing file taking effect on the next call.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    async fn load(&self) -> anyhow::Result<NavConfig>;
}

#[derive(Debug, Clone)]
pub struct YamlConfigProvider {
    path: PathBuf,
}

impl YamlConfigProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigProvider for YamlConfigProvider {
    async fn load(&self) -> anyhow::Result<NavConfig> {
        let yaml = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("read config: {}", self.path.display()))?;
        parse_config(&yaml).with_context(|| format!("parse config: {}", self.path.display()))
    }
}

pub fn parse_config(yaml: &str) -> anyhow::Result<NavConfig> {
    if yaml.trim().is_empty() {
        return Ok(NavConfig {
            port: DEFAULT_PORT,
            ..NavConfig::default()
        });
    }
    let config: NavConfig = serde_yaml::from_str(yaml).context("deserialize yaml")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_keys() -> anyhow::Result<()> {
        let config = parse_config(
            r#"
port: 7788
password: s3cret
email: owner@example.com
XFAPIPassword: xf-token
mailConfig:
  host: smtp.example.com
  port: 465
  secure: true
  auth:
    user: bot@example.com
    pass: hunter2
  title: New link
  message: <p>someone submitted a link</p>
"#,
        )?;
        assert_eq!(config.port, 7788);
        assert_eq!(config.expected_authorization().as_deref(), Some("token s3cret"));
        assert_eq!(config.xf_api_password.as_deref(), Some("xf-token"));
        let mail = config.mail.expect("mail config");
        assert_eq!(mail.host, "smtp.example.com");
        assert_eq!(mail.port, Some(465));
        assert!(mail.secure);
        assert_eq!(mail.auth.user, "bot@example.com");
        Ok(())
    }

    #[test]
    fn empty_password_grants_nothing() -> anyhow::Result<()> {
        let config = parse_config("password: '  '\n")?;
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.expected_authorization(), None);
        Ok(())
    }

    #[tokio::test]
    async fn yaml_provider_sees_rotated_secret() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nav.config.yaml");
        std::fs::write(&path, "password: one\n")?;
        let provider = YamlConfigProvider::new(&path);
        assert_eq!(provider.load().await?.password, "one");

        std::fs::write(&path, "password: two\n")?;
        assert_eq!(provider.load().await?.password, "two");
        Ok(())
    }
}

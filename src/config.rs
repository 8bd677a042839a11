//! TOML configuration.
//!
//! ```toml
//! [db]
//! path = "./data/evalboard.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [feedback]
//! page_size = 30
//!
//! [[auth.tokens]]
//! token_sha256 = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//! user_id = "u-admin"
//! name = "Admin"
//! role = "admin"
//! ```
//!
//! Bearer tokens are never stored in plain text; `evalboard hash-token`
//! prints the digest to paste into `token_sha256`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedbackConfig {
    /// Rows per page for `GET /feedbacks/list`.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

fn default_page_size() -> i64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    /// Lowercase hex SHA-256 of the bearer token.
    pub token_sha256: String,
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "user".to_string()
}

/// Roles a token may carry. `pending` users are authenticated but not verified.
pub const KNOWN_ROLES: &[&str] = &["admin", "user", "pending"];

impl Config {
    /// Config with defaults and no tokens, for tests and tooling that never
    /// touch a real deployment.
    pub fn minimal() -> Self {
        Self {
            db: DbConfig {
                path: PathBuf::from("./data/evalboard.sqlite"),
            },
            server: ServerConfig {
                bind: "127.0.0.1:8080".to_string(),
            },
            feedback: FeedbackConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.feedback.page_size < 1 {
        anyhow::bail!("feedback.page_size must be >= 1");
    }

    let mut seen_users = HashSet::new();
    for token in &config.auth.tokens {
        let digest = &token.token_sha256;
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!(
                "auth.tokens: token_sha256 for user '{}' must be 64 hex characters",
                token.user_id
            );
        }
        if !KNOWN_ROLES.contains(&token.role.as_str()) {
            anyhow::bail!(
                "Unknown role '{}' for user '{}'. Must be admin, user, or pending.",
                token.role,
                token.user_id
            );
        }
        if !seen_users.insert(token.user_id.as_str()) {
            anyhow::bail!("auth.tokens: duplicate user_id '{}'", token.user_id);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";

    fn parse(extra: &str) -> Result<Config> {
        let content = format!(
            "[db]\npath = \"/tmp/x.sqlite\"\n\n[server]\nbind = \"127.0.0.1:0\"\n{}",
            extra
        );
        let config: Config = toml::from_str(&content)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.feedback.page_size, 30);
        assert!(config.auth.tokens.is_empty());
    }

    #[test]
    fn test_token_role_defaults_to_user() {
        let config = parse(&format!(
            "[[auth.tokens]]\ntoken_sha256 = \"{}\"\nuser_id = \"u1\"\n",
            DIGEST
        ))
        .unwrap();
        assert_eq!(config.auth.tokens[0].role, "user");
    }

    #[test]
    fn test_rejects_bad_digest() {
        let err = parse("[[auth.tokens]]\ntoken_sha256 = \"abc\"\nuser_id = \"u1\"\n").unwrap_err();
        assert!(err.to_string().contains("64 hex"));
    }

    #[test]
    fn test_rejects_unknown_role() {
        let err = parse(&format!(
            "[[auth.tokens]]\ntoken_sha256 = \"{}\"\nuser_id = \"u1\"\nrole = \"root\"\n",
            DIGEST
        ))
        .unwrap_err();
        assert!(err.to_string().contains("Unknown role"));
    }

    #[test]
    fn test_rejects_duplicate_user() {
        let token = format!(
            "[[auth.tokens]]\ntoken_sha256 = \"{}\"\nuser_id = \"u1\"\n",
            DIGEST
        );
        let err = parse(&format!("{}{}", token, token)).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let err = parse("[feedback]\npage_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }
}

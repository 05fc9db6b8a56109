//! `ThunderConfig` (§6 "Configuration (enumerated)"): defaults, layered with
//! an optional `thunder.toml` under `-thunderHome`, then `THUNDER_`-prefixed
//! environment variables — the same layering `config::Config` gives
//! `turbomcp-auth::config::AuthConfig` in the crate this one is adapted from.

use serde::Deserialize;
use std::path::Path;
use thunder_model::ThunderResult;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub issuer: String,
    #[serde(default = "default_jwt_validity")]
    pub validity_period: i64,
}

fn default_jwt_validity() -> i64 {
    3600
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenConfig {
    #[serde(default = "default_refresh_validity")]
    pub validity_period: i64,
}

fn default_refresh_validity() -> i64 {
    86_400
}

impl Default for RefreshTokenConfig {
    fn default() -> Self {
        Self { validity_period: default_refresh_validity() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OauthConfig {
    #[serde(default)]
    pub refresh_token: RefreshTokenConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub crypto_file: String,
    /// §9 Open Question: the upstream `THUNDER_SKIP_SECURITY` switch was
    /// ambiguous about whether it also bypasses token-endpoint auth. This
    /// rewrite exposes the two concerns as separate switches instead of
    /// inferring one from the other.
    #[serde(default)]
    pub skip_jwt_middleware: bool,
    #[serde(default)]
    pub skip_token_endpoint_auth: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebauthnConfig {
    pub rp_id: String,
    pub rp_name: String,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ImmutableResourcesConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerBindConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerBindConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address(), port: default_port() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Everything the core façade needs, loaded once at process start (§9
/// "Initialisation order: config → crypto keys → registries → ...").
#[derive(Debug, Clone, Deserialize)]
pub struct ThunderConfig {
    pub jwt: JwtConfig,
    #[serde(default)]
    pub oauth: OauthConfig,
    pub security: SecurityConfig,
    pub webauthn: WebauthnConfig,
    #[serde(default)]
    pub immutable_resources: ImmutableResourcesConfig,
    #[serde(default)]
    pub server: ServerBindConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl ThunderConfig {
    /// Loads `<thunder_home>/thunder.toml` if present, then applies
    /// `THUNDER_`-prefixed environment overrides (double-underscore
    /// separated for nested keys, e.g. `THUNDER_SECURITY__SKIP_JWT_MIDDLEWARE`).
    pub fn load(thunder_home: &Path) -> ThunderResult<Self> {
        let toml_path = thunder_home.join("thunder.toml");
        let mut builder = config::Config::builder();
        if toml_path.exists() {
            builder = builder.add_source(config::File::from(toml_path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("THUNDER")
                .separator("__")
                .try_parsing(true),
        );
        let raw = builder
            .build()
            .map_err(|e| thunder_model::ThunderError::internal(format!("config load failed: {e}")))?;
        raw.try_deserialize()
            .map_err(|e| thunder_model::ThunderError::internal(format!("config shape invalid: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_toml_with_defaults() {
        let dir = tempfile_dir();
        let mut file = std::fs::File::create(dir.join("thunder.toml")).unwrap();
        writeln!(
            file,
            r#"
            [jwt]
            issuer = "https://issuer.example"

            [security]
            crypto_file = "/dev/null"

            [webauthn]
            rp_id = "example.com"
            rp_name = "Example"
            "#
        )
        .unwrap();

        let cfg = ThunderConfig::load(&dir).unwrap();
        assert_eq!(cfg.jwt.validity_period, 3600);
        assert_eq!(cfg.oauth.refresh_token.validity_period, 86_400);
        assert!(!cfg.security.skip_jwt_middleware);
        assert_eq!(cfg.server.port, 8080);
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("thunder-config-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}

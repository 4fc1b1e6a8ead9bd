//! Process configuration.
//!
//! Every recognised key is read once at startup into [`AppConfig`], which is
//! then handed to the constructors that need it.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_JWT_SECRET: &str = "zeon-dev-secret-change-me";

/// Filesystem roots for templates, packs and generated output.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub template_root: PathBuf,
    pub packs_root: PathBuf,
    pub output_root: PathBuf,
    /// Count ceiling enforced by the cleanup sweep.
    pub max_output_files: usize,
    /// Age threshold enforced by the cleanup sweep.
    pub max_output_age: Duration,
}

/// SMTP transport settings.
#[derive(Clone)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Sender address; falls back to `user` when empty.
    pub from: String,
    /// Implicit TLS (port 465 style).
    pub ssl: bool,
    /// STARTTLS upgrade on a plain connection.
    pub starttls: bool,
    pub timeout: Duration,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("from", &self.from)
            .field("ssl", &self.ssl)
            .field("starttls", &self.starttls)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "smtp.gmail.com".to_string(),
            port: 465,
            user: String::new(),
            password: String::new(),
            from: String::new(),
            ssl: true,
            starttls: false,
            timeout: Duration::from_secs(20),
        }
    }
}

impl SmtpConfig {
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty() && !self.password.is_empty()
    }

    pub fn sender(&self) -> &str {
        if self.from.is_empty() {
            &self.user
        } else {
            &self.from
        }
    }
}

/// Token signing and password hashing settings.
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_seconds: i64,
    pub bcrypt_cost: u32,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

/// An account created at startup when it does not exist yet.
#[derive(Clone)]
pub struct BootstrapAccount {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAccount")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix for absolute download links; empty yields relative links.
    pub base_url: String,
    pub cors_enabled: bool,
    pub cors_allow_origin: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub smtp: SmtpConfig,
    pub auth: AuthConfig,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub admin_bootstrap: Option<BootstrapAccount>,
    pub superadmin_bootstrap: Option<BootstrapAccount>,
    /// Fixed recipient for pack archives when the caller names none.
    pub pack_notify_to: Option<String>,
}

impl AppConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();
        let get_or = |key: &str, default: &str| {
            let v = get(key);
            if v.is_empty() {
                default.to_string()
            } else {
                v
            }
        };

        let template_root = PathBuf::from(get_or("TEMPLATE_ROOT", "plantillas"));
        let packs_root = match get("PACKS_ROOT") {
            v if v.is_empty() => template_root.join("packs"),
            v => PathBuf::from(v),
        };

        let jwt_secret = match get("JWT_SECRET") {
            v if v.is_empty() => {
                log::warn!("JWT_SECRET not set, using default secret. SET THIS IN PRODUCTION!");
                DEFAULT_JWT_SECRET.to_string()
            }
            v => v,
        };

        let database_url = Some(get("DATABASE_URL")).filter(|v| !v.is_empty());

        Self {
            server: ServerConfig {
                host: get_or("HOST", "0.0.0.0"),
                port: parse_int(&get("PORT"), 8080),
                base_url: get("APP_BASE_URL").trim_end_matches('/').to_string(),
                cors_enabled: parse_bool(&get("CORS_ENABLED"), true),
                cors_allow_origin: get_or("CORS_ALLOW_ORIGIN", "*"),
            },
            storage: StorageConfig {
                template_root,
                packs_root,
                output_root: PathBuf::from(get_or("OUTPUT_ROOT", "outputs")),
                max_output_files: parse_int(&get("MAX_OUTPUT_FILES"), 5000),
                max_output_age: Duration::from_secs(parse_int(
                    &get("MAX_OUTPUT_AGE_SECONDS"),
                    7 * 24 * 3600,
                )),
            },
            smtp: SmtpConfig {
                enabled: parse_bool(&get("SMTP_ENABLED"), false),
                host: get_or("SMTP_HOST", "smtp.gmail.com"),
                port: parse_int(&get("SMTP_PORT"), 465),
                user: get("SMTP_USER"),
                password: get("SMTP_PASS"),
                from: get("SMTP_FROM"),
                ssl: parse_bool(&get("SMTP_SSL"), true),
                starttls: parse_bool(&get("SMTP_TLS"), false),
                timeout: Duration::from_secs(parse_int(&get("SMTP_TIMEOUT_SECONDS"), 20)),
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl_seconds: parse_int(&get("JWT_TTL_SECONDS"), 86400),
                bcrypt_cost: parse_int(&get("BCRYPT_COST"), bcrypt::DEFAULT_COST),
            },
            database_url,
            database_max_connections: parse_int(&get("DATABASE_MAX_CONNECTIONS"), 10),
            admin_bootstrap: bootstrap_account(
                get("ADMIN_BOOTSTRAP_EMAIL"),
                get("ADMIN_BOOTSTRAP_PASS"),
            ),
            superadmin_bootstrap: bootstrap_account(
                get("SUPERADMIN_BOOTSTRAP_EMAIL"),
                get("SUPERADMIN_BOOTSTRAP_PASS"),
            ),
            pack_notify_to: Some(get("PACK_NOTIFY_TO")).filter(|v| !v.is_empty()),
        }
    }

    /// Configuration rooted at `root`, with SMTP disabled and no database.
    /// Used by tests and local tooling.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut config = Self::from_lookup(|key| match key {
            "JWT_SECRET" => Some("test-secret".to_string()),
            _ => None,
        });
        config.storage.template_root = root.join("plantillas");
        config.storage.packs_root = root.join("plantillas").join("packs");
        config.storage.output_root = root.join("outputs");
        config.auth.bcrypt_cost = 4;
        config
    }
}

fn bootstrap_account(email: String, password: String) -> Option<BootstrapAccount> {
    if email.is_empty() || password.is_empty() {
        return None;
    }
    Some(BootstrapAccount {
        email: email.to_lowercase(),
        password,
    })
}

/// Parse a boolean flag; empty values yield `default`.
pub fn parse_bool(value: &str, default: bool) -> bool {
    let v = value.trim().to_lowercase();
    if v.is_empty() {
        return default;
    }
    matches!(v.as_str(), "1" | "true" | "yes" | "y" | "on")
}

/// Parse an integer; empty or malformed values yield `default`.
pub fn parse_int<T: std::str::FromStr>(value: &str, default: T) -> T {
    value.trim().parse().unwrap_or(default)
}

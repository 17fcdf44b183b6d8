use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub security: SecurityConfig,

    pub tickets: TicketConfig,

    pub bootstrap: BootstrapConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/helpdesk.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// Whether to set the Secure flag on session and remember-me cookies.
    /// Default: true for production safety. Set to false for local development without HTTPS.
    pub secure_cookies: bool,

    /// Sessions expire after this many minutes without a request.
    pub session_inactivity_minutes: i64,

    /// How often expired sessions are purged from the database.
    pub session_cleanup_minutes: u64,

    /// Return freshly issued reset tokens in the forgot-password response.
    /// There is no mail delivery; enable only for development and tests.
    pub expose_reset_tokens: bool,

    /// Whether `POST /auth/check-email` answers at all.
    /// WARNING: the endpoint tells anonymous callers whether an email is registered.
    pub enable_email_check: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            cors_allowed_origins: vec![
                "http://localhost:5000".to_string(),
                "http://127.0.0.1:5000".to_string(),
            ],
            secure_cookies: true,
            session_inactivity_minutes: 60,
            session_cleanup_minutes: 15,
            expose_reset_tokens: false,
            enable_email_check: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    /// Argon2 parallelism (default: 1)
    pub argon2_parallelism: u32,

    pub min_password_length: usize,

    /// Lifetime of a password reset token (default: 60)
    pub reset_token_ttl_minutes: i64,

    /// Lifetime of the remember-me cookie (default: 30)
    pub remember_token_days: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            min_password_length: 6,
            reset_token_ttl_minutes: 60,
            remember_token_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TicketConfig {
    /// Priority used when a ticket is filed without one
    pub default_priority: String,

    /// Let admins move tickets backwards (e.g. reopen a closed ticket)
    pub allow_reopen: bool,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            default_priority: "medium".to_string(),
            allow_reopen: false,
        }
    }
}

/// Admin account created on startup when the database has no admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub enabled: bool,

    pub admin_email: String,

    pub admin_password: String,

    pub admin_first_name: String,

    pub admin_last_name: String,
}

const MAX_RESET_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;
const MAX_REMEMBER_TOKEN_DAYS: i64 = 365;
const MAX_SESSION_INACTIVITY_MINUTES: i64 = 365 * 24 * 60;

pub const DEFAULT_ADMIN_PASSWORD: &str = "change-me-now";

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            admin_email: "admin@example.com".to_string(),
            admin_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            admin_first_name: "System".to_string(),
            admin_last_name: "Administrator".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
            tickets: TicketConfig::default(),
            bootstrap: BootstrapConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("helpdesk").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".helpdesk").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port cannot be 0");
        }

        if self.general.max_db_connections == 0 {
            anyhow::bail!("general.max_db_connections must be > 0");
        }

        if self.general.min_db_connections > self.general.max_db_connections {
            anyhow::bail!(
                "general.min_db_connections ({}) exceeds general.max_db_connections ({})",
                self.general.min_db_connections,
                self.general.max_db_connections
            );
        }

        argon2::Params::new(
            self.security.argon2_memory_cost_kib,
            self.security.argon2_time_cost,
            self.security.argon2_parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 settings in [security]: {e}"))?;

        if self.security.min_password_length < 6 {
            anyhow::bail!("security.min_password_length must be at least 6");
        }

        if !(0..=MAX_RESET_TOKEN_TTL_MINUTES).contains(&self.security.reset_token_ttl_minutes) {
            anyhow::bail!(
                "security.reset_token_ttl_minutes must be between 0 and {MAX_RESET_TOKEN_TTL_MINUTES}"
            );
        }

        if !(1..=MAX_REMEMBER_TOKEN_DAYS).contains(&self.security.remember_token_days) {
            anyhow::bail!("security.remember_token_days must be between 1 and {MAX_REMEMBER_TOKEN_DAYS}");
        }

        if !(1..=MAX_SESSION_INACTIVITY_MINUTES).contains(&self.server.session_inactivity_minutes) {
            anyhow::bail!(
                "server.session_inactivity_minutes must be between 1 and {MAX_SESSION_INACTIVITY_MINUTES}"
            );
        }

        if self.server.session_cleanup_minutes == 0 {
            anyhow::bail!("server.session_cleanup_minutes must be > 0");
        }

        if self.tickets.default_priority.trim().is_empty() {
            anyhow::bail!("tickets.default_priority cannot be empty");
        }

        if self.bootstrap.enabled
            && self.bootstrap.admin_password.len() < self.security.min_password_length
        {
            anyhow::bail!("bootstrap.admin_password is shorter than security.min_password_length");
        }

        Ok(())
    }
}

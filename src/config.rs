use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::{Result, TollgateError};
use crate::plans::{Plan, PlanCatalog};
use crate::utils::get_env_with_prefix;

/// Main configuration for a tollgate bot
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    pub discord: DiscordConfig,
    pub roles: RolesConfig,
    pub payment: PaymentConfig,
    pub storage: StorageConfig,
    pub sweeper: SweeperConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DiscordConfig {
    /// Bot token. Never serialized.
    #[serde(skip)]
    pub token: Option<SecretString>,
    #[serde(default)]
    pub guild_id: String,
    /// Channel where operators review bills.
    #[serde(default)]
    pub admin_channel_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// Final and waiting role per plan.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RolesConfig {
    pub final_1m: String,
    pub final_6m: String,
    pub final_1y: String,
    pub waiting_1m: String,
    pub waiting_6m: String,
    pub waiting_1y: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PaymentConfig {
    pub vn: VnBankConfig,
    pub jp: JpBankConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VnBankConfig {
    pub bank_name: String,
    /// NAPAS bank identification number used in the VietQR payload.
    pub bank_bin: String,
    pub account_name: String,
    pub account_number: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JpBankConfig {
    pub bank_name: String,
    pub branch: String,
    pub account_name: String,
    pub account_number: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// JSON snapshot of the member map.
    #[serde(default = "default_db_file")]
    pub db_file: PathBuf,
    /// Directory for stored bills.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweeperConfig {
    #[serde(default = "default_sweep_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_grace_period")]
    pub grace_period_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret for relay signatures. Unsigned requests are accepted
    /// when unset.
    #[serde(skip)]
    pub relay_secret: Option<SecretString>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_json")]
    pub json: bool,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            guild_id: String::new(),
            admin_channel_id: String::new(),
            api_base: default_api_base(),
        }
    }
}

impl Default for VnBankConfig {
    fn default() -> Self {
        Self {
            bank_name: "Vietcombank".to_string(),
            bank_bin: "970436".to_string(),
            account_name: "NGUYEN VAN A".to_string(),
            account_number: "0123456789".to_string(),
        }
    }
}

impl Default for JpBankConfig {
    fn default() -> Self {
        Self {
            bank_name: "MUFG Bank".to_string(),
            branch: "Shinjuku".to_string(),
            account_name: "NGUYEN VAN A".to_string(),
            account_number: "1234567".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_file: default_db_file(),
            upload_dir: default_upload_dir(),
        }
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_sweep_interval(),
            grace_period_seconds: default_grace_period(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            relay_secret: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: default_json(),
        }
    }
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_db_file() -> PathBuf {
    PathBuf::from("./members.json")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_sweep_interval() -> u64 {
    60 * 60
}

fn default_grace_period() -> u64 {
    2 * 24 * 60 * 60
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_json() -> bool {
    false
}

impl ServerConfig {
    pub fn addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl SweeperConfig {
    #[must_use]
    pub fn grace_ms(&self) -> i64 {
        i64::try_from(self.grace_period_seconds)
            .unwrap_or(i64::MAX)
            .saturating_mul(1_000)
    }
}

impl RolesConfig {
    /// Build the plan catalog from the configured role ids.
    pub fn catalog(&self) -> Result<PlanCatalog> {
        let entries = [
            (Plan::ShortTerm, &self.final_1m, &self.waiting_1m),
            (Plan::MidTerm, &self.final_6m, &self.waiting_6m),
            (Plan::LongTerm, &self.final_1y, &self.waiting_1y),
        ];

        let mut builder = PlanCatalog::builder();
        for (plan, final_role, waiting_role) in entries {
            let mut entry = builder.plan(plan);
            if !final_role.is_empty() {
                entry = entry.final_role(final_role.as_str());
            }
            if !waiting_role.is_empty() {
                entry = entry.waiting_role(waiting_role.as_str());
            }
            builder = entry.done();
        }
        builder.build()
    }
}

/// Builder for Config with environment variable support
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.config.discord.token = Some(SecretString::from(token.into()));
        self
    }

    pub fn with_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.config.discord.guild_id = guild_id.into();
        self
    }

    pub fn with_admin_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.config.discord.admin_channel_id = channel_id.into();
        self
    }

    pub fn with_roles(mut self, roles: RolesConfig) -> Self {
        self.config.roles = roles;
        self
    }

    pub fn with_payment(mut self, payment: PaymentConfig) -> Self {
        self.config.payment = payment;
        self
    }

    pub fn with_db_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage.db_file = path.into();
        self
    }

    pub fn with_upload_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.storage.upload_dir = path.into();
        self
    }

    pub fn with_sweep_interval(mut self, seconds: u64) -> Self {
        self.config.sweeper.interval_seconds = seconds;
        self
    }

    pub fn with_grace_period(mut self, seconds: u64) -> Self {
        self.config.sweeper.grace_period_seconds = seconds;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_relay_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.server.relay_secret = Some(SecretString::from(secret.into()));
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn with_json_logging(mut self, enabled: bool) -> Self {
        self.config.logging.json = enabled;
        self
    }

    /// Load configuration from environment variables with TOLLGATE_ prefix
    ///
    /// Unprefixed names are accepted as a fallback, so an existing `.env`
    /// with `TOKEN`, `GUILD_ID` and friends keeps working.
    pub fn from_env(mut self) -> Self {
        let c = &mut self.config;

        if let Some(token) = get_env_with_prefix("TOKEN") {
            c.discord.token = Some(SecretString::from(token));
        }
        set_string(&mut c.discord.guild_id, "GUILD_ID");
        set_string(&mut c.discord.admin_channel_id, "ADMIN_CHANNEL_ID");
        set_string(&mut c.discord.api_base, "DISCORD_API_BASE");

        set_string(&mut c.roles.final_1m, "ROLE_1T_ID");
        set_string(&mut c.roles.final_6m, "ROLE_6T_ID");
        set_string(&mut c.roles.final_1y, "ROLE_1Y_ID");
        set_string(&mut c.roles.waiting_1m, "ROLE_WAIT_1T_ID");
        set_string(&mut c.roles.waiting_6m, "ROLE_WAIT_6T_ID");
        set_string(&mut c.roles.waiting_1y, "ROLE_WAIT_1Y_ID");

        set_string(&mut c.payment.vn.bank_name, "VN_BANK_NAME");
        set_string(&mut c.payment.vn.bank_bin, "VN_BANK_BIN");
        set_string(&mut c.payment.vn.account_name, "VN_ACCOUNT_NAME");
        set_string(&mut c.payment.vn.account_number, "VN_ACCOUNT_NUMBER");
        set_string(&mut c.payment.jp.bank_name, "JP_BANK_NAME");
        set_string(&mut c.payment.jp.branch, "JP_BRANCH");
        set_string(&mut c.payment.jp.account_name, "JP_ACCOUNT_NAME");
        set_string(&mut c.payment.jp.account_number, "JP_ACCOUNT_NUMBER");

        if let Some(path) = get_env_with_prefix("DB_FILE") {
            c.storage.db_file = path.into();
        }
        if let Some(path) = get_env_with_prefix("UPLOAD_DIR") {
            c.storage.upload_dir = path.into();
        }

        set_parsed(&mut c.sweeper.interval_seconds, "SWEEP_INTERVAL_SECS");
        set_parsed(&mut c.sweeper.grace_period_seconds, "GRACE_PERIOD_SECS");

        set_string(&mut c.server.host, "HOST");
        set_parsed(&mut c.server.port, "PORT");
        if let Some(secret) = get_env_with_prefix("RELAY_SECRET") {
            c.server.relay_secret = Some(SecretString::from(secret));
        }

        set_string(&mut c.logging.level, "LOG_LEVEL");
        if let Some(json) = get_env_with_prefix("LOG_JSON") {
            c.logging.json = json.parse().unwrap_or(false);
        }

        self
    }

    /// Build the configuration, validating all settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the token, guild, operator channel
    /// or any role id is missing, or when a value is out of range.
    pub fn build(self) -> Result<Config> {
        let config = self.config;

        if config.discord.token.is_none() {
            return Err(TollgateError::config("TOKEN is not set"));
        }
        if config.discord.guild_id.is_empty() {
            return Err(TollgateError::config("GUILD_ID is not set"));
        }
        if config.discord.admin_channel_id.is_empty() {
            return Err(TollgateError::config("ADMIN_CHANNEL_ID is not set"));
        }

        config.roles.catalog()?;

        config.server.addr().map_err(|e| {
            TollgateError::config(format!(
                "Invalid server address {}:{} - {}",
                config.server.host, config.server.port, e
            ))
        })?;

        if config.server.port == 0 {
            return Err(TollgateError::config("Server port must be greater than 0"));
        }

        if config.sweeper.interval_seconds == 0 {
            return Err(TollgateError::config(
                "Sweep interval must be greater than 0",
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(TollgateError::config(format!(
                "Invalid log level: {}. Must be one of: {}",
                config.logging.level,
                valid_log_levels.join(", ")
            )));
        }

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn set_string(target: &mut String, key: &str) {
    if let Some(value) = get_env_with_prefix(key) {
        *target = value;
    }
}

fn set_parsed<T: std::str::FromStr>(target: &mut T, key: &str) {
    if let Some(value) = get_env_with_prefix(key) {
        match value.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!(key = key, value = %value, "Ignoring unparsable setting"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn roles() -> RolesConfig {
        RolesConfig {
            final_1m: "11".to_string(),
            final_6m: "16".to_string(),
            final_1y: "112".to_string(),
            waiting_1m: "21".to_string(),
            waiting_6m: "26".to_string(),
            waiting_1y: "212".to_string(),
        }
    }

    fn complete() -> ConfigBuilder {
        ConfigBuilder::new()
            .with_token("token")
            .with_guild("guild")
            .with_admin_channel("admin")
            .with_roles(roles())
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.db_file, PathBuf::from("./members.json"));
        assert_eq!(config.storage.upload_dir, PathBuf::from("./uploads"));
        assert_eq!(config.sweeper.interval_seconds, 3600);
        assert_eq!(config.sweeper.grace_ms(), 172_800_000);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.payment.vn.bank_bin, "970436");
        assert_eq!(config.payment.jp.branch, "Shinjuku");
    }

    #[test]
    fn test_complete_config_builds() {
        let config = complete().build().unwrap();
        assert_eq!(config.discord.token.unwrap().expose_secret(), "token");

        let catalog = config.roles.catalog().unwrap();
        assert_eq!(catalog.final_role(Plan::LongTerm), "112");
        assert_eq!(catalog.waiting_role(Plan::MidTerm), "26");
    }

    #[test]
    fn test_missing_values_are_rejected() {
        let err = ConfigBuilder::new().build().unwrap_err();
        assert!(err.to_string().contains("TOKEN"));

        let err = complete().with_roles(RolesConfig::default()).build().unwrap_err();
        assert!(matches!(err, TollgateError::Config(_)));

        let err = complete().with_sweep_interval(0).build().unwrap_err();
        assert!(err.to_string().contains("Sweep interval"));

        let err = complete().with_log_level("loud").build().unwrap_err();
        assert!(err.to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_token_is_not_serialized() {
        let config = complete().build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("token\""));
        assert!(!format!("{:?}", config).contains("\"token\""));
    }

    #[test]
    fn test_from_env_reads_unprefixed_keys() {
        // SAFETY: Test runs in isolation with unique env var names
        unsafe {
            std::env::set_var("TOLLGATE_GRACE_PERIOD_SECS", "60");
            std::env::set_var("VN_BANK_BIN", "970415");
        }

        let config = ConfigBuilder::new().from_env();
        assert_eq!(config.config.sweeper.grace_period_seconds, 60);
        assert_eq!(config.config.payment.vn.bank_bin, "970415");

        unsafe {
            std::env::remove_var("TOLLGATE_GRACE_PERIOD_SECS");
            std::env::remove_var("VN_BANK_BIN");
        }
    }
}

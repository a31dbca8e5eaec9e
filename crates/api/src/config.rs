use chrono::NaiveTime;
use chrono_tz::Tz;
use domain::models::{EmailSettings, EmailTemplates, EmailTiming};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    /// Brevo API access
    #[serde(default)]
    pub brevo: BrevoConfig,
    /// Templates, timing and limits of the lifecycle emails
    #[serde(default)]
    pub email: EmailConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub public: PublicConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Pool settings for the persistence layer.
    pub fn pool_config(&self) -> persistence::db::DatabaseConfig {
        persistence::db::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
            idle_timeout_secs: self.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Registration submissions per client address and minute; 0 disables.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

/// Brevo transactional email and contacts API.
#[derive(Debug, Clone, Deserialize)]
pub struct BrevoConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_brevo_base_url")]
    pub base_url: String,

    #[serde(default = "default_brevo_timeout")]
    pub timeout_secs: u64,
}

impl Default for BrevoConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_brevo_base_url(),
            timeout_secs: default_brevo_timeout(),
        }
    }
}

/// Lifecycle email configuration; converted into [`EmailSettings`].
#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Default template ids per email type
    #[serde(default)]
    pub templates: EmailTemplates,

    /// Minutes before the event the reminder goes out
    #[serde(default = "default_time_before_event")]
    pub time_before_event: i64,

    /// Minutes before the event the join link goes out
    #[serde(default = "default_time_join_event")]
    pub time_join_event: i64,

    /// Minutes after the event the follow-up goes out
    #[serde(default = "default_time_after_event")]
    pub time_after_event: i64,

    #[serde(default)]
    pub default_list_id: Option<i64>,

    /// IANA name of the zone event dates are written in
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default = "default_max_schedule_hours")]
    pub max_schedule_hours: i64,

    #[serde(default = "default_join_grace_hours")]
    pub join_grace_hours: i64,

    #[serde(default = "default_followup_grace_days")]
    pub followup_grace_days: i64,

    #[serde(default = "default_min_registration_hours")]
    pub min_registration_hours_for_reminder: i64,

    #[serde(default = "default_instant_guard_secs")]
    pub instant_email_guard_secs: i64,

    #[serde(default = "default_attribute_max_length")]
    pub attribute_max_length: usize,

    #[serde(default = "default_batch_window_days")]
    pub batch_window_days: i64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            templates: EmailTemplates::default(),
            time_before_event: default_time_before_event(),
            time_join_event: default_time_join_event(),
            time_after_event: default_time_after_event(),
            default_list_id: None,
            timezone: default_timezone(),
            max_schedule_hours: default_max_schedule_hours(),
            join_grace_hours: default_join_grace_hours(),
            followup_grace_days: default_followup_grace_days(),
            min_registration_hours_for_reminder: default_min_registration_hours(),
            instant_email_guard_secs: default_instant_guard_secs(),
            attribute_max_length: default_attribute_max_length(),
            batch_window_days: default_batch_window_days(),
        }
    }
}

impl EmailConfig {
    pub fn timezone(&self) -> Result<Tz, ConfigValidationError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ConfigValidationError::InvalidValue(format!(
                "Unknown email.timezone '{}'",
                self.timezone
            ))
        })
    }

    /// Rejects negative durations and ones too large for the time arithmetic.
    fn check_ranges(&self) -> Result<(), ConfigValidationError> {
        const YEAR_MINUTES: i64 = 365 * 24 * 60;
        const YEAR_HOURS: i64 = 365 * 24;
        const YEAR_DAYS: i64 = 365;

        let bounded = [
            ("time_before_event", self.time_before_event, YEAR_MINUTES),
            ("time_join_event", self.time_join_event, YEAR_MINUTES),
            ("time_after_event", self.time_after_event, YEAR_MINUTES),
            ("max_schedule_hours", self.max_schedule_hours, YEAR_HOURS),
            ("join_grace_hours", self.join_grace_hours, YEAR_HOURS),
            ("followup_grace_days", self.followup_grace_days, YEAR_DAYS),
            (
                "min_registration_hours_for_reminder",
                self.min_registration_hours_for_reminder,
                YEAR_HOURS,
            ),
            ("instant_email_guard_secs", self.instant_email_guard_secs, 24 * 60 * 60),
            ("batch_window_days", self.batch_window_days, YEAR_DAYS),
        ];
        for (name, value, max) in bounded {
            if !(0..=max).contains(&value) {
                return Err(ConfigValidationError::InvalidValue(format!(
                    "email.{} must be between 0 and {}, got {}",
                    name, max, value
                )));
            }
        }
        Ok(())
    }

    /// Builds the settings handed to the engine and the registration service.
    pub fn settings(&self, join_base_url: &str) -> Result<EmailSettings, ConfigValidationError> {
        Ok(EmailSettings {
            templates: self.templates,
            timing: EmailTiming {
                time_before_event: self.time_before_event,
                time_join_event: self.time_join_event,
                time_after_event: self.time_after_event,
            },
            default_list_id: self.default_list_id,
            timezone: self.timezone()?,
            max_schedule_hours: self.max_schedule_hours,
            join_grace_hours: self.join_grace_hours,
            followup_grace_days: self.followup_grace_days,
            min_registration_hours_for_reminder: self.min_registration_hours_for_reminder,
            instant_email_guard_secs: self.instant_email_guard_secs,
            attribute_max_length: self.attribute_max_length,
            batch_window_days: self.batch_window_days,
            join_base_url: join_base_url.to_string(),
        })
    }
}

/// Background jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Local wall-clock time of the daily batch, `HH:MM`, in `email.timezone`
    #[serde(default = "default_run_at")]
    pub run_at: String,

    #[serde(default = "default_cleanup_interval")]
    pub claim_cleanup_interval_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_at: default_run_at(),
            claim_cleanup_interval_minutes: default_cleanup_interval(),
        }
    }
}

impl SchedulerConfig {
    pub fn run_time(&self) -> Result<NaiveTime, ConfigValidationError> {
        NaiveTime::parse_from_str(&self.run_at, "%H:%M").map_err(|_| {
            ConfigValidationError::InvalidValue(format!(
                "scheduler.run_at must be HH:MM, got '{}'",
                self.run_at
            ))
        })
    }
}

/// Operational endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Key expected in `X-API-Key`; admin routes reject everything when empty
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublicConfig {
    /// Public origin of this service, used to build personalized join links
    #[serde(default)]
    pub base_url: String,
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    10
}
fn default_min_connections() -> u32 {
    2
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_rate_limit() -> u32 {
    30
}
fn default_brevo_base_url() -> String {
    "https://api.brevo.com".to_string()
}
fn default_brevo_timeout() -> u64 {
    15
}
fn default_time_before_event() -> i64 {
    1440
}
fn default_time_join_event() -> i64 {
    10
}
fn default_time_after_event() -> i64 {
    120
}
fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_max_schedule_hours() -> i64 {
    48
}
fn default_join_grace_hours() -> i64 {
    1
}
fn default_followup_grace_days() -> i64 {
    7
}
fn default_min_registration_hours() -> i64 {
    24
}
fn default_instant_guard_secs() -> i64 {
    30
}
fn default_attribute_max_length() -> usize {
    255
}
fn default_batch_window_days() -> i64 {
    7
}
fn default_true() -> bool {
    true
}
fn default_run_at() -> String {
    "03:00".to_string()
}
fn default_cleanup_interval() -> u64 {
    60
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with EM__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("EM").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds the config from embedded defaults and overrides only, without
    /// touching config files.
    #[cfg(test)]
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "0.0.0.0"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 10
            min_connections = 2
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            rate_limit_per_minute = 30

            [brevo]
            api_key = "test-key"
            base_url = "https://api.brevo.com"
            timeout_secs = 15

            [email]
            timezone = "Europe/Berlin"
            default_list_id = 3

            [email.templates]
            registration = 11
            reminder = 12
            join = 13
            followup = 14

            [scheduler]
            enabled = true
            run_at = "03:00"

            [admin]
            api_key = "admin-secret"

            [public]
            base_url = "https://events.example.com"
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        let cfg: Self = builder.build()?.try_deserialize()?;
        // Skip validation in tests to allow partial configs
        Ok(cfg)
    }

    /// Validate configuration values.
    fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "EM__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        if self.brevo.api_key.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "EM__BREVO__API_KEY environment variable must be set".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.email.max_schedule_hours <= 0 {
            return Err(ConfigValidationError::InvalidValue(
                "email.max_schedule_hours must be positive".to_string(),
            ));
        }

        self.email.check_ranges()?;
        self.email.timezone()?;
        self.scheduler.run_time()?;

        Ok(())
    }

    /// Domain settings derived from the `email` and `public` sections.
    pub fn email_settings(&self) -> Result<EmailSettings, ConfigValidationError> {
        self.email.settings(&self.public.base_url)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigValidationError> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|_| {
                ConfigValidationError::InvalidValue(format!(
                    "Invalid listen address {}:{}",
                    self.server.host, self.server.port
                ))
            })
    }
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub telegram: TelegramConfig,
    pub tracker: TrackerConfig,
    pub assignees: AssigneeConfig,
    pub access: AccessConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
    pub lane_idle_secs: u64,
    /// Consecutive `getUpdates` failures tolerated before giving up; unset
    /// retries forever.
    pub max_consecutive_failures: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub api_base_url: String,
    pub web_base_url: String,
    pub project_key: String,
    pub issue_type: String,
    pub auth_token: SecretString,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AssigneeConfig {
    pub me_id: String,
    pub me_label: String,
    pub other_id: String,
    pub other_label: String,
}

#[derive(Clone, Debug)]
pub struct AccessConfig {
    pub authorized_user_ids: Vec<i64>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base_url: Option<String>,
    pub tracker_api_base_url: Option<String>,
    pub tracker_web_base_url: Option<String>,
    pub tracker_project_key: Option<String>,
    pub tracker_issue_type: Option<String>,
    pub tracker_auth_token: Option<String>,
    pub assignee_me_id: Option<String>,
    pub assignee_other_id: Option<String>,
    pub authorized_user_ids: Option<Vec<i64>>,
    pub health_check_port: Option<u16>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig {
                bot_token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 30,
                lane_idle_secs: 300,
                max_consecutive_failures: None,
            },
            tracker: TrackerConfig {
                api_base_url: String::new(),
                web_base_url: String::new(),
                project_key: String::new(),
                issue_type: String::new(),
                auth_token: String::new().into(),
                timeout_secs: 30,
            },
            assignees: AssigneeConfig {
                me_id: String::new(),
                me_label: "Me".to_string(),
                other_id: String::new(),
                other_label: "Teammate".to_string(),
            },
            access: AccessConfig { authorized_user_ids: Vec::new() },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Precedence: defaults, then file, then environment, then `overrides`.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("taskrelay.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.normalize();
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(telegram) = patch.telegram {
            if let Some(bot_token_value) = telegram.bot_token {
                self.telegram.bot_token = secret_value(bot_token_value);
            }
            if let Some(api_base_url) = telegram.api_base_url {
                self.telegram.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = telegram.poll_timeout_secs {
                self.telegram.poll_timeout_secs = poll_timeout_secs;
            }
            if let Some(lane_idle_secs) = telegram.lane_idle_secs {
                self.telegram.lane_idle_secs = lane_idle_secs;
            }
            if let Some(max_consecutive_failures) = telegram.max_consecutive_failures {
                self.telegram.max_consecutive_failures = Some(max_consecutive_failures);
            }
        }

        if let Some(tracker) = patch.tracker {
            if let Some(api_base_url) = tracker.api_base_url {
                self.tracker.api_base_url = api_base_url;
            }
            if let Some(web_base_url) = tracker.web_base_url {
                self.tracker.web_base_url = web_base_url;
            }
            if let Some(project_key) = tracker.project_key {
                self.tracker.project_key = project_key;
            }
            if let Some(issue_type) = tracker.issue_type {
                self.tracker.issue_type = issue_type;
            }
            if let Some(auth_token_value) = tracker.auth_token {
                self.tracker.auth_token = secret_value(auth_token_value);
            }
            if let Some(timeout_secs) = tracker.timeout_secs {
                self.tracker.timeout_secs = timeout_secs;
            }
        }

        if let Some(assignees) = patch.assignees {
            if let Some(me_id) = assignees.me_id {
                self.assignees.me_id = me_id;
            }
            if let Some(me_label) = assignees.me_label {
                self.assignees.me_label = me_label;
            }
            if let Some(other_id) = assignees.other_id {
                self.assignees.other_id = other_id;
            }
            if let Some(other_label) = assignees.other_label {
                self.assignees.other_label = other_label;
            }
        }

        if let Some(access) = patch.access {
            if let Some(authorized_user_ids) = access.authorized_user_ids {
                self.access.authorized_user_ids = authorized_user_ids;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let bot_token = read_env("TASKRELAY_TELEGRAM_BOT_TOKEN").or_else(|| read_env("TG_BOT_TOKEN"));
        if let Some(value) = bot_token {
            self.telegram.bot_token = secret_value(value);
        }
        if let Some(value) = read_env("TASKRELAY_TELEGRAM_API_BASE_URL") {
            self.telegram.api_base_url = value;
        }
        if let Some(value) = read_env("TASKRELAY_TELEGRAM_POLL_TIMEOUT_SECS") {
            self.telegram.poll_timeout_secs =
                parse_u64("TASKRELAY_TELEGRAM_POLL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("TASKRELAY_TELEGRAM_LANE_IDLE_SECS") {
            self.telegram.lane_idle_secs = parse_u64("TASKRELAY_TELEGRAM_LANE_IDLE_SECS", &value)?;
        }
        if let Some(value) = read_env("TASKRELAY_TELEGRAM_MAX_CONSECUTIVE_FAILURES") {
            let parsed = parse_u64("TASKRELAY_TELEGRAM_MAX_CONSECUTIVE_FAILURES", &value)?;
            self.telegram.max_consecutive_failures =
                Some(u32::try_from(parsed).map_err(|_| ConfigError::InvalidEnvOverride {
                    key: "TASKRELAY_TELEGRAM_MAX_CONSECUTIVE_FAILURES".to_string(),
                    value,
                })?);
        }

        if let Some(value) = read_env("TASKRELAY_TRACKER_API_BASE_URL")
            .or_else(|| read_env("JIRA_URL").map(|endpoint| legacy_api_base(&endpoint)))
        {
            self.tracker.api_base_url = value;
        }
        if let Some(value) =
            read_env("TASKRELAY_TRACKER_WEB_BASE_URL").or_else(|| read_env("JIRA_WEB_URL"))
        {
            self.tracker.web_base_url = value;
        }
        if let Some(value) =
            read_env("TASKRELAY_TRACKER_PROJECT_KEY").or_else(|| read_env("JIRA_PROJECT_KEY"))
        {
            self.tracker.project_key = value;
        }
        if let Some(value) =
            read_env("TASKRELAY_TRACKER_ISSUE_TYPE").or_else(|| read_env("JIRA_ISSUE_TYPE"))
        {
            self.tracker.issue_type = value;
        }
        if let Some(value) = read_env("TASKRELAY_TRACKER_AUTH_TOKEN").or_else(|| read_env("JIRA_TOKEN"))
        {
            self.tracker.auth_token = secret_value(value);
        }
        if let Some(value) = read_env("TASKRELAY_TRACKER_TIMEOUT_SECS") {
            self.tracker.timeout_secs = parse_u64("TASKRELAY_TRACKER_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) =
            read_env("TASKRELAY_ASSIGNEES_ME_ID").or_else(|| read_env("ASSIGNEE_ACCOUNT_ID"))
        {
            self.assignees.me_id = value;
        }
        if let Some(value) = read_env("TASKRELAY_ASSIGNEES_ME_LABEL") {
            self.assignees.me_label = value;
        }
        if let Some(value) =
            read_env("TASKRELAY_ASSIGNEES_OTHER_ID").or_else(|| read_env("SECOND_ASSIGNEE_ACCOUNT_ID"))
        {
            self.assignees.other_id = value;
        }
        if let Some(value) = read_env("TASKRELAY_ASSIGNEES_OTHER_LABEL") {
            self.assignees.other_label = value;
        }

        let authorized = [
            "TASKRELAY_ACCESS_AUTHORIZED_USER_IDS",
            "ALLOWED_USER_IDS",
            "ALLOWED_USER_ID",
        ]
        .into_iter()
        .find_map(|key| read_env(key).map(|value| (key, value)));
        if let Some((key, value)) = authorized {
            self.access.authorized_user_ids = parse_user_ids(key, &value)?;
        }

        if let Some(value) = read_env("TASKRELAY_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("TASKRELAY_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("TASKRELAY_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level =
            read_env("TASKRELAY_LOGGING_LEVEL").or_else(|| read_env("TASKRELAY_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("TASKRELAY_LOGGING_FORMAT").or_else(|| read_env("TASKRELAY_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(bot_token) = overrides.telegram_bot_token {
            self.telegram.bot_token = secret_value(bot_token);
        }
        if let Some(api_base_url) = overrides.telegram_api_base_url {
            self.telegram.api_base_url = api_base_url;
        }
        if let Some(api_base_url) = overrides.tracker_api_base_url {
            self.tracker.api_base_url = api_base_url;
        }
        if let Some(web_base_url) = overrides.tracker_web_base_url {
            self.tracker.web_base_url = web_base_url;
        }
        if let Some(project_key) = overrides.tracker_project_key {
            self.tracker.project_key = project_key;
        }
        if let Some(issue_type) = overrides.tracker_issue_type {
            self.tracker.issue_type = issue_type;
        }
        if let Some(auth_token) = overrides.tracker_auth_token {
            self.tracker.auth_token = secret_value(auth_token);
        }
        if let Some(me_id) = overrides.assignee_me_id {
            self.assignees.me_id = me_id;
        }
        if let Some(other_id) = overrides.assignee_other_id {
            self.assignees.other_id = other_id;
        }
        if let Some(authorized_user_ids) = overrides.authorized_user_ids {
            self.access.authorized_user_ids = authorized_user_ids;
        }
        if let Some(health_check_port) = overrides.health_check_port {
            self.server.health_check_port = health_check_port;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    fn normalize(&mut self) {
        for url in [
            &mut self.telegram.api_base_url,
            &mut self.tracker.api_base_url,
            &mut self.tracker.web_base_url,
        ] {
            let trimmed = url.trim().trim_end_matches('/').to_string();
            *url = trimmed;
        }
        self.tracker.project_key = self.tracker.project_key.trim().to_string();
        self.tracker.issue_type = self.tracker.issue_type.trim().to_string();
        self.assignees.me_id = self.assignees.me_id.trim().to_string();
        self.assignees.other_id = self.assignees.other_id.trim().to_string();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_telegram(&self.telegram)?;
        validate_tracker(&self.tracker)?;
        validate_assignees(&self.assignees)?;
        validate_access(&self.access)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("taskrelay.toml"), PathBuf::from("config/taskrelay.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_telegram(telegram: &TelegramConfig) -> Result<(), ConfigError> {
    if telegram.bot_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "telegram.bot_token is required (TASKRELAY_TELEGRAM_BOT_TOKEN or TG_BOT_TOKEN). Get it from @BotFather".to_string(),
        ));
    }
    require_http_url("telegram.api_base_url", &telegram.api_base_url)?;

    if telegram.poll_timeout_secs > 50 {
        return Err(ConfigError::Validation(
            "telegram.poll_timeout_secs must be in range 0..=50".to_string(),
        ));
    }
    if telegram.max_consecutive_failures == Some(0) {
        return Err(ConfigError::Validation(
            "telegram.max_consecutive_failures must be greater than zero when set".to_string(),
        ));
    }
    if telegram.lane_idle_secs == 0 {
        return Err(ConfigError::Validation(
            "telegram.lane_idle_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_tracker(tracker: &TrackerConfig) -> Result<(), ConfigError> {
    require_http_url("tracker.api_base_url", &tracker.api_base_url)?;
    require_http_url("tracker.web_base_url", &tracker.web_base_url)?;
    require_present("tracker.project_key", &tracker.project_key)?;
    require_present("tracker.issue_type", &tracker.issue_type)?;

    if tracker.auth_token.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "tracker.auth_token is required (TASKRELAY_TRACKER_AUTH_TOKEN or JIRA_TOKEN); use the base64 of `email:api_token`".to_string(),
        ));
    }

    if tracker.timeout_secs == 0 || tracker.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "tracker.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_assignees(assignees: &AssigneeConfig) -> Result<(), ConfigError> {
    require_present("assignees.me_id", &assignees.me_id)?;
    require_present("assignees.other_id", &assignees.other_id)?;
    require_present("assignees.me_label", &assignees.me_label)?;
    require_present("assignees.other_label", &assignees.other_label)?;
    Ok(())
}

fn validate_access(access: &AccessConfig) -> Result<(), ConfigError> {
    if access.authorized_user_ids.is_empty() {
        return Err(ConfigError::Validation(
            "access.authorized_user_ids must list at least one user id".to_string(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn require_present(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{key} is required")));
    }
    Ok(())
}

fn require_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    require_present(key, value)?;
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// `JIRA_URL` historically named the create endpoint itself
/// (`.../rest/api/3/issue`); the client wants the API root.
fn legacy_api_base(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    trimmed.strip_suffix("/issue").unwrap_or(trimmed).to_string()
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Comma-separated ids; blank segments are skipped.
fn parse_user_ids(key: &str, value: &str) -> Result<Vec<i64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            segment.parse::<i64>().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    telegram: Option<TelegramPatch>,
    tracker: Option<TrackerPatch>,
    assignees: Option<AssigneesPatch>,
    access: Option<AccessPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramPatch {
    bot_token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
    lane_idle_secs: Option<u64>,
    max_consecutive_failures: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TrackerPatch {
    api_base_url: Option<String>,
    web_base_url: Option<String>,
    project_key: Option<String>,
    issue_type: Option<String>,
    auth_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AssigneesPatch {
    me_id: Option<String>,
    me_label: Option<String>,
    other_id: Option<String>,
    other_label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AccessPatch {
    authorized_user_ids: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

//! Engine settings.
//!
//! Filled from a module argument string (`key=value` tokens separated by
//! whitespace) or field by field from the daemon's command line.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, warn};

use crate::auth::{Authorization, GroupAuthorization, ServiceAuthorization};
use crate::error::ConfigError;

/// Default number of worker threads.
pub const DEFAULT_NUM_CLIENT_THREADS: usize = 10;

/// Upper bound for `num_client_threads`.
pub const MAX_NUM_CLIENT_THREADS: usize = 1000;

/// Default `query_timeout`, milliseconds.
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 10_000;

/// Default `idle_timeout`, milliseconds.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 300_000;

/// Default `max_response_size`: 100 MiB.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 100 * 1024 * 1024;

pub const DEFAULT_MAX_CACHED_MESSAGES: usize = 500_000;

pub const DEFAULT_MAX_LINES_PER_LOGFILE: usize = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub num_client_threads: usize,
    /// Limit for reading one request once it started; zero disables it.
    pub query_timeout: Duration,
    /// Limit for waiting for the next request; zero disables it.
    pub idle_timeout: Duration,
    pub max_response_size: usize,
    pub max_cached_messages: usize,
    pub max_lines_per_logfile: usize,
    pub authorization: Authorization,
    pub log_file: Option<PathBuf>,
    pub log_archive_path: Option<PathBuf>,
    pub crash_reports_path: Option<PathBuf>,
    pub mkeventd_socket: Option<PathBuf>,
    /// 0 = warnings only, 1 = info, 2 = debug.
    pub debug_level: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            num_client_threads: DEFAULT_NUM_CLIENT_THREADS,
            query_timeout: Duration::from_millis(DEFAULT_QUERY_TIMEOUT_MS),
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
            max_cached_messages: DEFAULT_MAX_CACHED_MESSAGES,
            max_lines_per_logfile: DEFAULT_MAX_LINES_PER_LOGFILE,
            authorization: Authorization::default(),
            log_file: None,
            log_archive_path: None,
            crash_reports_path: None,
            mkeventd_socket: None,
            debug_level: 0,
        }
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| invalid(key, value, "expected a non-negative number"))
}

impl Settings {
    /// Applies every `key=value` token. Bad tokens are reported and skipped,
    /// so the remaining settings still take effect.
    pub fn parse_arguments(&mut self, arguments: &str) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        for token in arguments.split_whitespace() {
            let result = match token.split_once('=') {
                Some((key, value)) => self.set(key, value),
                None => Err(ConfigError::Malformed(token.to_string())),
            };
            if let Err(e) = result {
                warn!("{}", e);
                errors.push(e);
            }
        }
        errors
    }

    /// Sets one option. On error the previous value is kept.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "num_client_threads" => {
                let n: usize = parse_number(key, value)?;
                if !(1..=MAX_NUM_CLIENT_THREADS).contains(&n) {
                    return Err(invalid(
                        key,
                        value,
                        format!("must be between 1 and {MAX_NUM_CLIENT_THREADS}"),
                    ));
                }
                self.num_client_threads = n;
            }
            "query_timeout" => self.query_timeout = Duration::from_millis(parse_number(key, value)?),
            "idle_timeout" => self.idle_timeout = Duration::from_millis(parse_number(key, value)?),
            "max_response_size" => self.max_response_size = parse_number(key, value)?,
            "max_cached_messages" => self.max_cached_messages = parse_number(key, value)?,
            "max_lines_per_logfile" => self.max_lines_per_logfile = parse_number(key, value)?,
            "service_authorization" => {
                self.authorization.service =
                    ServiceAuthorization::from_str(value).map_err(|reason| invalid(key, value, reason))?;
            }
            "group_authorization" => {
                self.authorization.group =
                    GroupAuthorization::from_str(value).map_err(|reason| invalid(key, value, reason))?;
            }
            "log_file" => self.log_file = Some(PathBuf::from(value)),
            "log_archive_path" => self.log_archive_path = Some(PathBuf::from(value)),
            "crash_reports_path" => self.crash_reports_path = Some(PathBuf::from(value)),
            "mkeventd_socket" => self.mkeventd_socket = Some(PathBuf::from(value)),
            "debug" => self.debug_level = parse_number(key, value)?,
            "data_encoding" => debug!("ignoring data_encoding={}, output is always UTF-8", value),
            "livecheck" | "disable_statehist_filtering" => {
                warn!("the option '{}' is no longer supported, ignoring it", key);
            }
            _ => warn!("ignoring unknown option {}={}", key, value),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.num_client_threads, 10);
        assert_eq!(settings.query_timeout, Duration::from_secs(10));
        assert_eq!(settings.idle_timeout, Duration::from_secs(300));
        assert_eq!(settings.max_response_size, 100 * 1024 * 1024);
        assert_eq!(settings.authorization.service, ServiceAuthorization::Loose);
        assert_eq!(settings.authorization.group, GroupAuthorization::Strict);
    }

    #[test]
    fn test_parse_arguments() {
        let mut settings = Settings::default();
        let errors = settings.parse_arguments(
            "num_client_threads=20 query_timeout=0 service_authorization=strict \
             log_file=/var/log/core.log livecheck=/usr/bin/x whatever=1",
        );
        assert!(errors.is_empty());
        assert_eq!(settings.num_client_threads, 20);
        assert!(settings.query_timeout.is_zero());
        assert_eq!(settings.authorization.service, ServiceAuthorization::Strict);
        assert_eq!(settings.log_file, Some(PathBuf::from("/var/log/core.log")));
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let mut settings = Settings::default();
        let errors = settings.parse_arguments("num_client_threads=0 idle_timeout=soon group_authorization=maybe bare");
        assert_eq!(errors.len(), 4);
        assert_eq!(errors[3], ConfigError::Malformed("bare".to_string()));
        assert_eq!(settings, Settings::default());
    }
}

use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::model::{PackingOptions, SolverKind};

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub solver: SolverConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            solver: SolverConfig::from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;

    fn from_env() -> Self {
        let host_value =
            env_string("STOWPLAN_API_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, effective_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                eprintln!(
                    "⚠️ Could not parse STOWPLAN_API_HOST ('{}'): {}. Using {}.",
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    Self::DEFAULT_HOST
                        .parse::<IpAddr>()
                        .expect("Default host must be valid"),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string("STOWPLAN_API_PORT") {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    eprintln!(
                        "⚠️ STOWPLAN_API_PORT must not be 0. Using {}.",
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    eprintln!(
                        "⚠️ Could not parse STOWPLAN_API_PORT ('{}'): {}. Using {}.",
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host: effective_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    /// Configured port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }
}

/// Service-level solver defaults. Per-request options are layered on top of
/// these; the time limit is additionally clamped to the configured maximum.
#[derive(Clone, Debug)]
pub struct SolverConfig {
    defaults: PackingOptions,
    max_time_limit_sec: f64,
}

impl SolverConfig {
    const SOLVER_VAR: &'static str = "STOWPLAN_DEFAULT_SOLVER";
    const TIME_LIMIT_VAR: &'static str = "STOWPLAN_DEFAULT_TIME_LIMIT_SEC";
    const MAX_TIME_LIMIT_VAR: &'static str = "STOWPLAN_MAX_TIME_LIMIT_SEC";
    const SUPPORT_RATIO_VAR: &'static str = "STOWPLAN_MIN_SUPPORT_RATIO";
    const COM_TOLERANCE_VAR: &'static str = "STOWPLAN_COM_TOLERANCE_PER_MILLE";
    const DENSITY_RATIO_VAR: &'static str = "STOWPLAN_DENSITY_RATIO_THRESHOLD";
    const ALLOW_ROTATION_VAR: &'static str = "STOWPLAN_ALLOW_ROTATION";

    const DEFAULT_MAX_TIME_LIMIT_SEC: f64 = 600.0;

    fn from_env() -> Self {
        let mut defaults = PackingOptions::default();

        if let Some(raw) = env_string(Self::SOLVER_VAR) {
            match raw.to_ascii_lowercase().as_str() {
                "exact" | "ortools" => defaults.solver = SolverKind::Exact,
                "greedy" | "py3dbp" => defaults.solver = SolverKind::Greedy,
                other => eprintln!(
                    "⚠️ Could not interpret {} ('{}') as solver name. Using default value.",
                    Self::SOLVER_VAR,
                    other
                ),
            }
        }

        defaults.time_limit_sec = load_f64_with_warning(
            Self::TIME_LIMIT_VAR,
            defaults.time_limit_sec,
            |value| value > 0.0,
            "must be greater than 0",
            "Warning: Adjusted default time limit changes how long solves may run",
        );

        defaults.min_support_ratio = load_f64_with_warning(
            Self::SUPPORT_RATIO_VAR,
            defaults.min_support_ratio,
            |value| (0.0..=1.0).contains(&value),
            "must be between 0 and 1",
            "Warning: Adjusted minimum support may lead to unstable stacks",
        );

        defaults.center_of_mass_tolerance_per_mille = load_f64_with_warning(
            Self::COM_TOLERANCE_VAR,
            defaults.center_of_mass_tolerance_per_mille,
            |value| (0.0..=1000.0).contains(&value),
            "must be between 0 and 1000",
            "Warning: Adjusted balance tolerance may cause loads to tip",
        );

        defaults.density_ratio_threshold = load_f64_with_warning(
            Self::DENSITY_RATIO_VAR,
            defaults.density_ratio_threshold,
            |value| value >= 1.0,
            "must be at least 1",
            "Warning: Adjusted density threshold changes which items may stack on others",
        );

        if let Some(value) = env_string(Self::ALLOW_ROTATION_VAR)
            .and_then(|raw| parse_bool(&raw, Self::ALLOW_ROTATION_VAR))
        {
            defaults.allow_rotation = value;
        }

        let max_time_limit_sec = load_f64_with_warning(
            Self::MAX_TIME_LIMIT_VAR,
            Self::DEFAULT_MAX_TIME_LIMIT_SEC,
            |value| value > 0.0,
            "must be greater than 0",
            "Warning: Adjusted maximum time limit changes how long solves may run",
        );

        Self {
            defaults,
            max_time_limit_sec,
        }
    }

    /// Fixed configuration for unit tests, independent of the environment.
    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            defaults: PackingOptions::default(),
            max_time_limit_sec: Self::DEFAULT_MAX_TIME_LIMIT_SEC,
        }
    }

    /// Service defaults that request options are resolved against.
    pub fn default_options(&self) -> &PackingOptions {
        &self.defaults
    }

    /// Upper bound applied to any requested time limit.
    pub fn clamp_time_limit(&self, requested: f64) -> f64 {
        requested.min(self.max_time_limit_sec)
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            eprintln!(
                "⚠️ Access to {} failed: {}. Using default value.",
                name, err
            );
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            eprintln!(
                "⚠️ Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                if !validator(value) {
                    eprintln!(
                        "⚠️ {} contains invalid value '{}': {}. Using {}.",
                        var_name, raw, invalid_hint, default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        println!("⚠️ {} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                eprintln!(
                    "⚠️ Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));

        // Test case insensitivity
        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("Yes", "TEST_VAR"), Some(true));

        // Test with whitespace
        assert_eq!(parse_bool(" true ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("no", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("off", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("  0  ", "TEST_VAR"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn clamp_time_limit_caps_at_maximum() {
        let config = SolverConfig {
            defaults: PackingOptions::default(),
            max_time_limit_sec: 600.0,
        };
        assert_eq!(config.clamp_time_limit(30.0), 30.0);
        assert_eq!(config.clamp_time_limit(3600.0), 600.0);
    }
}

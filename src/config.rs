use crate::{errors::ProxyError, zones::ZoneResolver};
use serde::Deserialize;
use std::{collections::HashMap, path::Path, time::Duration};
use tracing::debug;

/// Prefix of environment overrides, e.g. `WHOIS_PROXY_SERVICE__PORT=4343`.
const ENV_PREFIX: &str = "WHOIS_PROXY";

/// Longest cache TTL or reset period accepted (1000 years, the moka limit).
pub const MAX_CACHE_PERIOD_SECS: u64 = 1000 * 365 * 24 * 3600;

/// camelCase keys of older YAML files: (section, key, current key path).
const LEGACY_KEYS: &[(&str, &str, &str)] = &[
    ("service", "maxCntConnect", "service.max_connections"),
    ("service", "maxLenBuffer", "service.max_len_buffer"),
    ("service", "readTimeout", "service.read_timeout"),
    ("service", "writeTimeout", "service.write_timeout"),
    ("service", "cacheTTL", "service.cache_ttl"),
    ("service", "cacheReset", "service.cache_reset"),
    ("service", "errorMsgTemplate", "service.error_msg_template"),
    ("service", "defaultWhois", "service.default_whois"),
    ("service", "domainZoneWhois", "service.domain_zone_whois"),
    ("service", "addWhoisDescInfo", "service.add_whois_desc_info"),
    ("graylog", "debugLvl", "logging.debug"),
    ("graylog", "disableColor", "logging.disable_color"),
];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,

    pub max_len_buffer: usize,
    pub read_timeout: u64,  // seconds
    pub write_timeout: u64, // seconds

    pub cache_ttl: u64,   // seconds
    pub cache_reset: u64, // seconds
    #[serde(default)]
    pub cache_max_entries: Option<u64>,

    pub error_msg_template: String,
    pub default_whois: String,
    #[serde(default)]
    pub domain_zone_whois: HashMap<String, String>,
    #[serde(default)]
    pub add_whois_desc_info: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub disable_color: bool,
    #[serde(default)]
    pub file: Option<String>,
}

impl Config {
    /// Defaults, then the YAML file at `path` (if given), then environment
    /// overrides. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ProxyError> {
        let mut settings = config::Config::builder()
            .set_default("service.host", "0.0.0.0")?
            .set_default("service.port", 43)?
            .set_default("service.max_connections", 100)?
            .set_default("service.max_len_buffer", 4096)?
            .set_default("service.read_timeout", 5)?
            .set_default("service.write_timeout", 5)?
            .set_default("service.cache_ttl", 300)?
            .set_default("service.cache_reset", 86400)?
            .set_default("service.error_msg_template", "%s: invalid domain name")?;

        if let Some(path) = path {
            settings = settings.add_source(Self::load_file(path)?);
        }

        settings = settings.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

        let config: Config = settings.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProxyError> {
        self.service.validate()
    }

    /// Read the YAML file, copying camelCase keys to their current names.
    /// A current key written in the same file wins over its legacy twin.
    fn load_file(path: &Path) -> Result<config::Config, ProxyError> {
        let file = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(true),
            )
            .build()?;

        let mut renamed = config::Config::builder();
        let mut found = false;
        for &(section, legacy, current) in LEGACY_KEYS {
            let Ok(table) = file.get_table(section) else {
                continue;
            };
            let value = table
                .into_iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(legacy))
                .map(|(_, value)| value);
            if let Some(value) = value {
                debug!(key = legacy, replacement = current, "legacy config key");
                renamed = renamed.set_default(current, value)?;
                found = true;
            }
        }

        if !found {
            return Ok(file);
        }
        Ok(renamed.add_source(file).build()?)
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.max_connections == 0 {
            return Err(ProxyError::Config("max_connections must be greater than 0".to_string()));
        }
        if self.max_len_buffer == 0 {
            return Err(ProxyError::Config("max_len_buffer must be greater than 0".to_string()));
        }
        if self.read_timeout == 0 || self.write_timeout == 0 {
            return Err(ProxyError::Config(
                "read/write timeouts must be greater than 0".to_string(),
            ));
        }
        if self.cache_reset == 0 {
            return Err(ProxyError::Config("cache_reset must be greater than 0".to_string()));
        }
        if self.cache_ttl > MAX_CACHE_PERIOD_SECS || self.cache_reset > MAX_CACHE_PERIOD_SECS {
            return Err(ProxyError::Config(format!(
                "cache_ttl and cache_reset must not exceed {} seconds",
                MAX_CACHE_PERIOD_SECS
            )));
        }

        self.zone_resolver().map(|_| ())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn cache_reset(&self) -> Duration {
        Duration::from_secs(self.cache_reset)
    }

    pub fn zone_resolver(&self) -> Result<ZoneResolver, ProxyError> {
        ZoneResolver::from_strings(&self.domain_zone_whois, &self.default_whois)
    }
}

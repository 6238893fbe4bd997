//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.miqat/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::location::Coordinates;
use crate::location::provider::DEFAULT_GEOLOCATION_BASE_URL;
use crate::schedule::CalculationMethodId;
use crate::schedule::client::DEFAULT_TIMINGS_BASE_URL;

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MiqatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub calculation_method: Option<u8>,
    pub position_timeout_secs: Option<u64>,
    pub cache_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LocationConfig {
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub timings_base_url: Option<String>,
    pub geolocation_base_url: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_POSITION_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub method: CalculationMethodId,
    pub position_timeout: Duration,
    pub cache_ttl: Duration,
    /// Manual fallback place, only when both halves are present.
    pub place: Option<(String, String)>,
    /// Fixed coordinates replace automatic geolocation when set.
    pub fixed_position: Option<Coordinates>,
    pub timings_base_url: String,
    pub geolocation_base_url: String,
}

/// Values given on the command line. `None` = not specified.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub method: Option<u8>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns `~/.miqat`, where the config and log file live.
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".miqat"))
}

/// Returns the path to `~/.miqat/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    data_dir().map(|d| d.join("config.toml"))
}

/// Load config from `~/.miqat/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and
/// returns `MiqatConfig::default()`. If it exists but is malformed,
/// returns `ConfigError::Parse`.
pub fn load_config() -> Result<MiqatConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(MiqatConfig::default());
        }
    };
    load_config_from(&path)
}

/// Same as [`load_config`] for an explicit path.
pub fn load_config_from(path: &Path) -> Result<MiqatConfig, ConfigError> {
    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(path);
        return Ok(MiqatConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: MiqatConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

const DEFAULT_CONFIG_CONTENT: &str = r#"# Miqat Configuration
# All settings are optional. Defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# calculation_method = 4             # Or set MIQAT_METHOD. See `miqat methods`
# position_timeout_secs = 10
# cache_ttl_secs = 3600

# [location]
# Used when automatic location fails.
# city = "Riyadh"                    # Or set MIQAT_CITY
# country = "Saudi Arabia"           # Or set MIQAT_COUNTRY
# Skip automatic location entirely:
# latitude = 24.7136
# longitude = 46.6753

# [provider]
# timings_base_url = "https://api.aladhan.com/v1"   # Or set ALADHAN_BASE_URL
# geolocation_base_url = "http://ip-api.com"         # Or set MIQAT_GEO_BASE_URL
"#;

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, DEFAULT_CONFIG_CONTENT) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &MiqatConfig, cli: &CliOverrides) -> ResolvedConfig {
    resolve_with_env(config, cli, |key| std::env::var(key).ok())
}

/// [`resolve`] with an injectable environment lookup.
pub fn resolve_with_env<E>(config: &MiqatConfig, cli: &CliOverrides, env: E) -> ResolvedConfig
where
    E: Fn(&str) -> Option<String>,
{
    // Method: CLI → env → config → default
    let method = cli
        .method
        .or_else(|| env_method(&env))
        .or(config.general.calculation_method)
        .map(CalculationMethodId)
        .unwrap_or_default();

    // Place: CLI → env → config, per half
    let city = cli
        .city
        .clone()
        .or_else(|| env("MIQAT_CITY"))
        .or_else(|| config.location.city.clone());
    let country = cli
        .country
        .clone()
        .or_else(|| env("MIQAT_COUNTRY"))
        .or_else(|| config.location.country.clone());
    let place = match (city, country) {
        (Some(city), Some(country)) => Some((city, country)),
        (Some(_), None) | (None, Some(_)) => {
            warn!("Ignoring half-configured place: city and country are both required");
            None
        }
        (None, None) => None,
    };

    // Coordinates: CLI pair wins as a whole over the config pair
    let fixed_position = match (cli.latitude, cli.longitude) {
        (Some(lat), Some(lng)) => checked_coordinates(lat, lng),
        _ => match (config.location.latitude, config.location.longitude) {
            (Some(lat), Some(lng)) => checked_coordinates(lat, lng),
            _ => None,
        },
    };

    // Base URLs: env → config → default
    let timings_base_url = env("ALADHAN_BASE_URL")
        .or_else(|| config.provider.timings_base_url.clone())
        .unwrap_or_else(|| DEFAULT_TIMINGS_BASE_URL.to_string());
    let geolocation_base_url = env("MIQAT_GEO_BASE_URL")
        .or_else(|| config.provider.geolocation_base_url.clone())
        .unwrap_or_else(|| DEFAULT_GEOLOCATION_BASE_URL.to_string());

    ResolvedConfig {
        method,
        position_timeout: Duration::from_secs(
            config
                .general
                .position_timeout_secs
                .unwrap_or(DEFAULT_POSITION_TIMEOUT_SECS),
        ),
        cache_ttl: Duration::from_secs(config.general.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS)),
        place,
        fixed_position,
        timings_base_url,
        geolocation_base_url,
    }
}

fn env_method<E>(env: &E) -> Option<u8>
where
    E: Fn(&str) -> Option<String>,
{
    let raw = env("MIQAT_METHOD")?;
    match raw.trim().parse() {
        Ok(id) => Some(id),
        Err(_) => {
            warn!("Ignoring MIQAT_METHOD={:?}: not a method id", raw);
            None
        }
    }
}

fn checked_coordinates(latitude: f64, longitude: f64) -> Option<Coordinates> {
    let coords = Coordinates::new(latitude, longitude);
    if coords.is_none() {
        warn!("Ignoring out-of-range coordinates {}, {}", latitude, longitude);
    }
    coords
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_resolve_uses_defaults_when_empty() {
        let resolved = resolve_with_env(&MiqatConfig::default(), &CliOverrides::default(), no_env);
        assert_eq!(resolved.method, CalculationMethodId(4));
        assert_eq!(resolved.position_timeout, Duration::from_secs(10));
        assert_eq!(resolved.cache_ttl, Duration::from_secs(3600));
        assert_eq!(resolved.place, None);
        assert_eq!(resolved.fixed_position, None);
        assert_eq!(resolved.timings_base_url, DEFAULT_TIMINGS_BASE_URL);
        assert_eq!(resolved.geolocation_base_url, DEFAULT_GEOLOCATION_BASE_URL);
    }

    #[test]
    fn test_sparse_toml_parses() {
        let toml_str = r#"
[general]
calculation_method = 2
"#;
        let config: MiqatConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.calculation_method, Some(2));
        assert!(config.general.cache_ttl_secs.is_none());
        assert!(config.location.city.is_none());
        assert!(config.provider.timings_base_url.is_none());
    }

    #[test]
    fn test_full_toml_resolves() {
        let toml_str = r#"
[general]
calculation_method = 5
position_timeout_secs = 3
cache_ttl_secs = 60

[location]
city = "Cairo"
country = "Egypt"
latitude = 30.0444
longitude = 31.2357

[provider]
timings_base_url = "http://localhost:9000/v1"
geolocation_base_url = "http://localhost:9001"
"#;
        let config: MiqatConfig = toml::from_str(toml_str).unwrap();
        let resolved = resolve_with_env(&config, &CliOverrides::default(), no_env);
        assert_eq!(resolved.method, CalculationMethodId(5));
        assert_eq!(resolved.position_timeout, Duration::from_secs(3));
        assert_eq!(resolved.cache_ttl, Duration::from_secs(60));
        assert_eq!(resolved.place, Some(("Cairo".into(), "Egypt".into())));
        assert_eq!(resolved.fixed_position, Coordinates::new(30.0444, 31.2357));
        assert_eq!(resolved.timings_base_url, "http://localhost:9000/v1");
        assert_eq!(resolved.geolocation_base_url, "http://localhost:9001");
    }

    #[test]
    fn test_env_overrides_config_and_cli_overrides_env() {
        let config = MiqatConfig {
            general: GeneralConfig {
                calculation_method: Some(2),
                ..Default::default()
            },
            location: LocationConfig {
                city: Some("Cairo".into()),
                country: Some("Egypt".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let env = env_of(&[
            ("MIQAT_METHOD", "3"),
            ("MIQAT_CITY", "Istanbul"),
            ("ALADHAN_BASE_URL", "http://mock/v1"),
        ]);

        let resolved = resolve_with_env(&config, &CliOverrides::default(), &env);
        assert_eq!(resolved.method, CalculationMethodId(3));
        assert_eq!(resolved.place, Some(("Istanbul".into(), "Egypt".into())));
        assert_eq!(resolved.timings_base_url, "http://mock/v1");

        let cli = CliOverrides {
            method: Some(1),
            country: Some("Turkey".into()),
            ..Default::default()
        };
        let resolved = resolve_with_env(&config, &cli, &env);
        assert_eq!(resolved.method, CalculationMethodId(1));
        assert_eq!(resolved.place, Some(("Istanbul".into(), "Turkey".into())));
    }

    #[test]
    fn test_bad_env_method_falls_through() {
        let config = MiqatConfig {
            general: GeneralConfig {
                calculation_method: Some(7),
                ..Default::default()
            },
            ..Default::default()
        };
        let resolved = resolve_with_env(&config, &CliOverrides::default(), env_of(&[("MIQAT_METHOD", "umm")]));
        assert_eq!(resolved.method, CalculationMethodId(7));
    }

    #[test]
    fn test_half_place_is_ignored() {
        let cli = CliOverrides {
            city: Some("Riyadh".into()),
            ..Default::default()
        };
        let resolved = resolve_with_env(&MiqatConfig::default(), &cli, no_env);
        assert_eq!(resolved.place, None);
    }

    #[test]
    fn test_cli_coordinates_win_and_are_range_checked() {
        let config = MiqatConfig {
            location: LocationConfig {
                latitude: Some(1.0),
                longitude: Some(2.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let cli = CliOverrides {
            latitude: Some(21.0),
            longitude: Some(39.0),
            ..Default::default()
        };
        let resolved = resolve_with_env(&config, &cli, no_env);
        assert_eq!(resolved.fixed_position, Coordinates::new(21.0, 39.0));

        let bad = CliOverrides {
            latitude: Some(95.0),
            longitude: Some(0.0),
            ..Default::default()
        };
        assert_eq!(resolve_with_env(&MiqatConfig::default(), &bad, no_env).fixed_position, None);
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let dir = std::env::temp_dir().join(format!("miqat-config-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, "[general\ncalculation_method = ").unwrap();

        let result = load_config_from(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_missing_file_generates_commented_default() {
        let dir = std::env::temp_dir().join(format!("miqat-config-gen-{}", std::process::id()));
        let path = dir.join("config.toml");
        fs::remove_dir_all(&dir).ok();

        let config = load_config_from(&path).unwrap();
        assert!(config.general.calculation_method.is_none());
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("# Miqat Configuration"));

        // The generated file is all comments, so it loads as defaults.
        let reloaded = load_config_from(&path).unwrap();
        assert!(reloaded.location.city.is_none());
        fs::remove_dir_all(&dir).ok();
    }
}

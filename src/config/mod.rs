// Configuration module

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::lifecycle::WorkerOptions;

pub mod precache;
pub mod route;
pub mod server;

pub use precache::PrecacheConfig;
pub use route::{FallbackConfig, RouteConfig};
pub use server::ServerConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub worker: WorkerOptions,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub fallbacks: Vec<FallbackConfig>,
    #[serde(default)]
    pub precache: PrecacheConfig,
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        // First, check that all referenced environment variables exist
        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        self.server.origin_url()?;

        let mut seen_names = HashSet::new();
        for route in &self.routes {
            if route.name.trim().is_empty() {
                return Err("Route name cannot be empty".to_string());
            }

            if !seen_names.insert(&route.name) {
                return Err(format!("Duplicate route name '{}'", route.name));
            }

            if route.cache_name() == crate::constants::PRECACHE_NAME {
                return Err(format!(
                    "Route '{}': cache name '{}' is reserved for the precache",
                    route.name,
                    route.cache_name()
                ));
            }

            http::Method::from_bytes(route.method.as_bytes()).map_err(|_| {
                format!("Route '{}': invalid method '{}'", route.name, route.method)
            })?;

            route
                .expiration
                .validate()
                .map_err(|e| format!("Route '{}': {}", route.name, e))?;

            if route.cacheable_statuses.is_empty() {
                return Err(format!(
                    "Route '{}': cacheable_statuses cannot be empty",
                    route.name
                ));
            }
            for status in &route.cacheable_statuses {
                if !(100..=599).contains(status) {
                    return Err(format!(
                        "Route '{}': invalid cacheable status {}",
                        route.name, status
                    ));
                }
            }

            route
                .matcher
                .compile()
                .map_err(|e| format!("Route '{}': {}", route.name, e))?;
        }

        // Routes sharing a cache must agree on its expiration rule
        for (i, route) in self.routes.iter().enumerate() {
            for other in &self.routes[i + 1..] {
                if route.cache_name() == other.cache_name() && route.expiration != other.expiration
                {
                    return Err(format!(
                        "Routes '{}' and '{}' share cache '{}' with different expiration rules",
                        route.name,
                        other.name,
                        route.cache_name()
                    ));
                }
            }
        }

        for fallback in &self.fallbacks {
            if !fallback.url.starts_with('/') {
                return Err(format!(
                    "Fallback URL '{}' must be an origin-relative path starting with /",
                    fallback.url
                ));
            }
            fallback
                .matcher
                .compile()
                .map_err(|e| format!("Fallback '{}': {}", fallback.url, e))?;
        }

        if self.precache.concurrency == 0 {
            return Err("Precache concurrency must be at least 1".to_string());
        }
        for pattern in &self.precache.ignore_url_parameters {
            Regex::new(pattern)
                .map_err(|e| format!("Invalid ignore_url_parameters pattern '{}': {}", pattern, e))?;
        }
        for critical in &self.precache.critical {
            if !critical.starts_with('/') {
                return Err(format!(
                    "Critical precache URL '{}' must start with /",
                    critical
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Handler;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
server:
  origin: "https://app.example.com"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_yaml_with_env(MINIMAL).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.worker.skip_waiting);
        assert!(config.routes.is_empty());
        assert!(config.fallbacks.is_empty());
        assert_eq!(config.precache.critical, vec!["/", "/offline"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_can_be_loaded_from_file_path() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let config_yaml = r#"
server:
  address: "0.0.0.0"
  port: 3000
  origin: "https://app.example.com"

routes:
  - name: pages
    matcher:
      same_origin: true
      destinations: [document]
      exclude_path_prefixes: ["/api/"]
    handler: stale_while_revalidate
"#;
        temp_file.write_all(config_yaml.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.server.address, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.routes.len(), 1);
        assert_eq!(config.routes[0].handler, Handler::StaleWhileRevalidate);
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        let err = Config::from_file("/nonexistent/tsubame.yaml").unwrap_err();
        assert!(err.contains("Failed to read config file"));
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("TSUBAME_TEST_ORIGIN", "https://env.example.com");
        let yaml = r#"
server:
  origin: "${TSUBAME_TEST_ORIGIN}"
"#;
        let config = Config::from_yaml_with_env(yaml).unwrap();
        assert_eq!(config.server.origin, "https://env.example.com");
        std::env::remove_var("TSUBAME_TEST_ORIGIN");
    }

    #[test]
    fn test_unset_env_variable_is_an_error() {
        let yaml = r#"
server:
  origin: "${TSUBAME_TEST_DEFINITELY_UNSET}"
"#;
        let err = Config::from_yaml_with_env(yaml).unwrap_err();
        assert!(err.contains("TSUBAME_TEST_DEFINITELY_UNSET"));
    }

    fn with_routes(routes: &str) -> Config {
        Config::from_yaml_with_env(&format!("{}\nroutes:\n{}", MINIMAL, routes)).unwrap()
    }

    #[test]
    fn test_duplicate_route_names_are_rejected() {
        let config = with_routes("  - name: pages\n  - name: pages\n");
        assert!(config.validate().unwrap_err().contains("Duplicate route name"));
    }

    #[test]
    fn test_reserved_cache_name_is_rejected() {
        let config = with_routes("  - name: pages\n    cache_name: precache\n");
        assert!(config.validate().unwrap_err().contains("reserved"));
    }

    #[test]
    fn test_unbounded_expiration_is_rejected() {
        let config = with_routes(
            "  - name: pages\n    expiration: { max_entries: null, max_age_seconds: null }\n",
        );
        assert!(config.validate().unwrap_err().contains("at least one"));
    }

    #[test]
    fn test_shared_cache_with_conflicting_expiration_is_rejected() {
        let config = with_routes(
            "  - name: a\n    cache_name: shared\n    expiration: { max_entries: 10 }\n  - name: b\n    cache_name: shared\n    expiration: { max_entries: 20 }\n",
        );
        assert!(config.validate().unwrap_err().contains("share cache"));
    }

    #[test]
    fn test_invalid_method_and_status_are_rejected() {
        let config = with_routes("  - name: pages\n    method: \"GE T\"\n");
        assert!(config.validate().unwrap_err().contains("invalid method"));

        let config = with_routes("  - name: pages\n    cacheable_statuses: [700]\n");
        assert!(config.validate().unwrap_err().contains("invalid cacheable status"));
    }

    #[test]
    fn test_fallback_url_must_be_relative() {
        let yaml = format!(
            "{}\nfallbacks:\n  - url: https://elsewhere.example.com/offline\n",
            MINIMAL
        );
        let config = Config::from_yaml_with_env(&yaml).unwrap();
        assert!(config.validate().unwrap_err().contains("origin-relative"));
    }

    #[test]
    fn test_invalid_origin_fails_validation() {
        let yaml = "server:\n  origin: \"app.example.com\"\n";
        let config = Config::from_yaml_with_env(yaml).unwrap();
        assert!(config.validate().is_err());
    }
}

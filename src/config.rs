//! Environment configuration
//!
//! Everything is read once at startup; routes that need optional pieces check
//! for them explicitly and fail with a structured error instead of behaving
//! unpredictably.

use std::net::SocketAddr;

use anyhow::Context;
use anyhow::Result;
use thiserror::Error;

use crate::utils::env_var_or_else;

const DEFAULT_ADDRESS: &str = "0.0.0.0:7100";

/// Configuration errors surfaced by route-level checks
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The privileged store path is not configured
    #[error("Missing `SERVICE_KEY` in environment.")]
    MissingServiceKey,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Address the HTTP server binds to
    pub address: SocketAddr,

    /// Public origin of the deployment, without trailing slash
    ///
    /// Used for the display form of generated short URLs and for emailed
    /// sign-in links
    pub site_url: String,

    /// Key authorizing the privileged store path (resolver, link creation)
    ///
    /// Absence makes the affected routes answer a structured 500
    pub service_key: Option<String>,

    /// Secret for signing session tokens; generated at startup when unset
    pub jwt_secret: Option<String>,

    /// Analytics measurement ID, exposed to the dashboard when present
    pub analytics_measurement_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Will return `Err` when the address or port do not parse
    pub fn from_env() -> Result<Self> {
        let mut address = env_var_or_else("ADDRESS", || String::from(DEFAULT_ADDRESS))
            .parse::<SocketAddr>()
            .context("ADDRESS must be a valid socket address")?;

        // optional override of just the port
        if let Ok(port) = std::env::var("PORT") {
            if !port.is_empty() {
                let port = port
                    .parse::<u16>()
                    .context("PORT must be a valid port number")?;

                address.set_port(port);
            }
        }

        let site_url = env_var_or_else("SITE_URL", || format!("http://localhost:{}", address.port()))
            .trim_end_matches('/')
            .to_owned();

        Ok(Self {
            address,
            site_url,
            service_key: non_empty_var("SERVICE_KEY"),
            jwt_secret: non_empty_var("JWT_SECRET"),
            analytics_measurement_id: non_empty_var("GA_MEASUREMENT_ID"),
        })
    }

    /// Check that the privileged store path is configured
    ///
    /// # Errors
    ///
    /// Will return `Err` when `SERVICE_KEY` is not set; callers turn this
    /// into a structured 500 without touching storage
    pub fn ensure_service_access(&self) -> Result<(), ConfigError> {
        if self.service_key.is_some() {
            Ok(())
        } else {
            Err(ConfigError::MissingServiceKey)
        }
    }

    /// Host part of the public origin, used as the short URL display base
    pub fn short_url_base(&self) -> &str {
        self.site_url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
    }
}

/// Get the value of an ENV var when it is set and not empty
fn non_empty_var(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(service_key: Option<&str>) -> Config {
        Config {
            address: DEFAULT_ADDRESS.parse().unwrap(),
            site_url: "http://localhost:7100".to_string(),
            service_key: service_key.map(ToString::to_string),
            jwt_secret: Some("verysecret".to_string()),
            analytics_measurement_id: None,
        }
    }

    #[test]
    fn test_service_access() {
        assert!(test_config(Some("service-key")).ensure_service_access().is_ok());

        let err = test_config(None).ensure_service_access().unwrap_err();
        assert_eq!("Missing `SERVICE_KEY` in environment.", err.to_string());
    }

    #[test]
    fn test_short_url_base() {
        let mut config = test_config(None);
        config.site_url = "https://lb.example.com".to_string();

        assert_eq!("lb.example.com", config.short_url_base());
    }
}

//! Routing configuration
//!
//! Process-wide settings, read once at startup and shared read-only by every
//! worker through the [`RoutingEngine`](crate::RoutingEngine).
//!
//! ```rust
//! use rvoip_routing_core::config::{AuthConfig, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .with_auth(AuthConfig::default())
//!     .with_presence()
//!     .with_pstn_gateway("gw.example.net:5060");
//! assert!(config.validate().is_ok());
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{RoutingError, RoutingResult};

/// Main routing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Max-Forwards value inserted when absent, and the hop budget checked in REQINIT
    pub max_forwards: u32,
    /// User-Agent substrings of known scanners; matching requests are dropped silently
    pub scanner_user_agents: Vec<String>,
    /// Answer keepalive OPTIONS addressed to the proxy itself with 200
    pub keepalive_options: bool,
    /// Location table used by the registrar and user location lookups
    pub location_table: String,
    pub nat: NatConfig,
    /// Digest authentication; disabled when absent
    pub auth: Option<AuthConfig>,
    /// Handle PUBLISH/SUBSCRIBE locally instead of rejecting them
    pub presence: bool,
    /// PSTN gateway routing; disabled when absent
    pub pstn: Option<PstnConfig>,
    pub callbacks: CallbackNames,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_forwards: 10,
            scanner_user_agents: vec![
                "friendly-scanner".to_string(),
                "sipcli".to_string(),
                "VaxSIPUserAgent".to_string(),
            ],
            keepalive_options: true,
            location_table: "location".to_string(),
            nat: NatConfig::default(),
            auth: None,
            presence: false,
            pstn: None,
            callbacks: CallbackNames::default(),
        }
    }
}

/// NAT traversal settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatConfig {
    pub enabled: bool,
    /// Mark registered NATed contacts for SIP OPTIONS keepalive pinging (opt-in)
    pub sipping: bool,
    /// Bitmask of `nat_uac_test` checks
    pub uac_tests: u32,
}

impl Default for NatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sipping: false,
            uac_tests: 19,
        }
    }
}

/// Digest authentication settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Credentials table
    pub table: String,
    /// Fixed realm; the From-URI domain is used when absent
    pub realm: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            table: "subscriber".to_string(),
            realm: None,
        }
    }
}

/// PSTN gateway settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PstnConfig {
    /// Gateway `host[:port]`
    pub gateway: String,
}

/// Names under which the transaction callback routes are armed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackNames {
    pub branch: String,
    pub reply: String,
    pub failure: String,
}

impl Default for CallbackNames {
    fn default() -> Self {
        Self {
            branch: "MANAGE_BRANCH".to_string(),
            reply: "MANAGE_REPLY".to_string(),
            failure: "MANAGE_FAILURE".to_string(),
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON document
    pub fn from_json_str(json: &str) -> RoutingResult<Self> {
        let config: RouterConfig = serde_json::from_str(json)
            .map_err(|e| RoutingError::Config(format!("Invalid routing config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> RoutingResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| RoutingError::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn with_max_forwards(mut self, max_forwards: u32) -> Self {
        self.max_forwards = max_forwards;
        self
    }

    pub fn with_nat(mut self, enabled: bool) -> Self {
        self.nat.enabled = enabled;
        self
    }

    /// Enable SIP keepalive pinging for NATed registrations
    pub fn with_nat_sipping(mut self) -> Self {
        self.nat.sipping = true;
        self
    }

    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_presence(mut self) -> Self {
        self.presence = true;
        self
    }

    pub fn with_pstn_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.pstn = Some(PstnConfig {
            gateway: gateway.into(),
        });
        self
    }

    pub fn with_location_table(mut self, table: impl Into<String>) -> Self {
        self.location_table = table.into();
        self
    }

    pub fn with_scanner_user_agents(mut self, agents: Vec<String>) -> Self {
        self.scanner_user_agents = agents;
        self
    }

    /// Check the configuration for values the routes cannot work with
    pub fn validate(&self) -> RoutingResult<()> {
        if self.max_forwards == 0 {
            return Err(RoutingError::Config("max_forwards must be at least 1".to_string()));
        }
        if self.location_table.trim().is_empty() {
            return Err(RoutingError::Config("location_table must not be empty".to_string()));
        }
        let names = [&self.callbacks.branch, &self.callbacks.reply, &self.callbacks.failure];
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(RoutingError::Config("callback route names must not be empty".to_string()));
        }
        if let Some(auth) = &self.auth {
            if auth.table.trim().is_empty() {
                return Err(RoutingError::Config("auth table must not be empty".to_string()));
            }
        }
        if let Some(pstn) = &self.pstn {
            let gateway = pstn.gateway.trim();
            if gateway.is_empty() || gateway.contains(['@', ';', ' ']) {
                return Err(RoutingError::Config(format!(
                    "PSTN gateway must be host[:port], got '{}'",
                    pstn.gateway
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.max_forwards, 10);
        assert!(config.nat.enabled);
        assert!(!config.nat.sipping);
        assert!(config.auth.is_none());
        assert!(!config.presence);
        assert_eq!(config.callbacks.failure, "MANAGE_FAILURE");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = RouterConfig::from_json_str(
            r#"{ "presence": true, "nat": { "sipping": true }, "pstn": { "gateway": "10.0.0.9" } }"#,
        )
        .unwrap();
        assert!(config.presence);
        assert!(config.nat.enabled);
        assert!(config.nat.sipping);
        assert_eq!(config.nat.uac_tests, 19);
        assert_eq!(config.pstn.unwrap().gateway, "10.0.0.9");
        assert_eq!(config.location_table, "location");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(RouterConfig::new().with_max_forwards(0).validate().is_err());
        assert!(RouterConfig::new().with_location_table(" ").validate().is_err());
        assert!(RouterConfig::new().with_pstn_gateway("sip:gw@x").validate().is_err());
        assert!(matches!(
            RouterConfig::from_json_str("{ not json"),
            Err(RoutingError::Config(_))
        ));
    }
}

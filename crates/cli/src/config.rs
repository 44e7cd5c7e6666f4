//! Service configuration.
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables prefixed `HOUSECALL__` with `__` between nested keys, e.g.
//! `HOUSECALL__SERVER__PORT=9000` or `HOUSECALL__STORAGE__TIMEOUT_MS=500`.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;

use casework::{
    Caller, PermissionName, PersonName, Physician, PhysicianId, RegionName, RoleId, UserId,
};
use config::{Environment, File, FileFormat};
use serde::Deserialize;
use workflow::WorkflowSettings;

pub const DEFAULT_CONFIG_PATH: &str = "housecall.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: WorkflowSettings,
    pub logging: LoggingConfig,
    pub notifications: NotificationConfig,
    pub auth: AuthConfig,
    pub regions: Vec<RegionEntry>,
    pub physicians: Vec<PhysicianEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub json: bool,
    /// OTLP/gRPC collector endpoint. Span export is off when absent.
    pub otlp_endpoint: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            otlp_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Delivery webhook. Notices are only logged when absent.
    pub webhook_url: Option<String>,
    pub timeout_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenEntry>,
    pub roles: Vec<RoleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub user_id: u64,
    pub role_id: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleEntry {
    pub id: u64,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegionEntry {
    pub name: String,
    pub abbreviation: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhysicianEntry {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub regions: Vec<String>,
}

impl Config {
    /// Loads `path`, or [`DEFAULT_CONFIG_PATH`] if it exists, then applies
    /// environment overrides. An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (file, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_PATH), false),
        };

        let config = config::Config::builder()
            .add_source(File::from(file).format(FileFormat::Toml).required(required))
            .add_source(
                Environment::with_prefix("HOUSECALL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    #[cfg(test)]
    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.server.host, self.server.port);
        Ok(addr.parse()?)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be non-zero".into());
        }
        if self.storage.timeout_ms == 0 {
            return Err("storage.timeout_ms must be non-zero".into());
        }
        if self.notifications.timeout_ms == 0 {
            return Err("notifications.timeout_ms must be non-zero".into());
        }

        let mut region_names = HashSet::new();
        for region in &self.regions {
            if region.name.trim().is_empty() || region.abbreviation.trim().is_empty() {
                return Err("regions entries need a name and an abbreviation".into());
            }
            if !region_names.insert(region.name.trim()) {
                return Err(format!("region '{}' is configured twice", region.name));
            }
        }

        let mut physician_ids = HashSet::new();
        for physician in &self.physicians {
            if !physician_ids.insert(physician.id) {
                return Err(format!("physician {} is configured twice", physician.id));
            }
            let name = PersonName::new(physician.first_name.as_str(), physician.last_name.as_str());
            if name.is_none() {
                return Err(format!("physician {} needs a first and last name", physician.id));
            }
            if let Some(unknown) = physician
                .regions
                .iter()
                .find(|r| !region_names.contains(r.trim()))
            {
                return Err(format!("physician {} serves unknown region '{unknown}'", physician.id));
            }
        }

        let mut tokens = HashSet::new();
        for entry in &self.auth.tokens {
            if entry.token.trim().is_empty() {
                return Err("auth.tokens entries need a non-blank token".into());
            }
            if !tokens.insert(entry.token.as_str()) {
                return Err("auth.tokens contains a duplicate token".into());
            }
        }
        for role in &self.auth.roles {
            if role.permissions.iter().any(|p| p.trim().is_empty()) {
                return Err(format!("role {} grants a blank permission", role.id));
            }
        }

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Seed data, valid after `validate`
    // -----------------------------------------------------------------------

    pub fn region_seed(&self) -> Vec<(RegionName, String)> {
        self.regions
            .iter()
            .filter_map(|r| {
                let name = RegionName::new(r.name.trim())?;
                Some((name, r.abbreviation.trim().to_string()))
            })
            .collect()
    }

    pub fn physician_seed(&self) -> Vec<Physician> {
        self.physicians
            .iter()
            .filter_map(|p| {
                Some(Physician {
                    id: PhysicianId::new(p.id),
                    name: PersonName::new(p.first_name.as_str(), p.last_name.as_str())?,
                    email: p.email.clone(),
                    phone: p.phone.clone(),
                    regions: p.regions.iter().filter_map(|r| RegionName::new(r.trim())).collect(),
                    on_call: None,
                })
            })
            .collect()
    }

    pub fn token_seed(&self) -> Vec<(String, Caller)> {
        self.auth
            .tokens
            .iter()
            .map(|t| {
                (
                    t.token.clone(),
                    Caller {
                        user_id: UserId::new(t.user_id),
                        role_id: RoleId::new(t.role_id),
                    },
                )
            })
            .collect()
    }

    pub fn grant_seed(&self) -> Vec<(RoleId, Vec<PermissionName>)> {
        self.auth
            .roles
            .iter()
            .map(|r| {
                (
                    RoleId::new(r.id),
                    r.permissions.iter().filter_map(|p| PermissionName::new(p.trim())).collect(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [server]
        port = 9000

        [storage]
        timeout_ms = 500

        [logging]
        json = true

        [notifications]
        webhook_url = "http://localhost:9999/notices"

        [[auth.tokens]]
        token = "Admin-Token"
        user_id = 1
        role_id = 10

        [[auth.roles]]
        id = 10
        permissions = ["cases.create", "cases.assign"]

        [[regions]]
        name = "Maryland"
        abbreviation = "MD"

        [[physicians]]
        id = 7
        first_name = "Gregory"
        last_name = "House"
        regions = ["Maryland"]
    "#;

    #[test]
    fn test_defaults_apply_to_missing_sections() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage, WorkflowSettings::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.notifications.timeout_ms, 5_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sample_parses_and_seeds() {
        let config = Config::from_toml(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.timeout_ms, 500);
        assert_eq!(config.storage.max_transition_retries, 3);
        assert!(config.logging.json);

        let physicians = config.physician_seed();
        assert_eq!(physicians.len(), 1);
        assert_eq!(physicians[0].regions, vec![RegionName::new("Maryland").unwrap()]);

        let tokens = config.token_seed();
        assert_eq!(tokens[0].0, "Admin-Token");
        assert_eq!(tokens[0].1.role_id, RoleId::new(10));
        assert_eq!(config.grant_seed()[0].1.len(), 2);
    }

    #[test]
    fn test_duplicate_region_is_rejected() {
        let config = Config::from_toml(
            r#"
            [[regions]]
            name = "Maryland"
            abbreviation = "MD"

            [[regions]]
            name = "Maryland"
            abbreviation = "MA"
            "#,
        )
        .unwrap();

        assert!(config.validate().unwrap_err().contains("Maryland"));
    }

    #[test]
    fn test_physician_in_unknown_region_is_rejected() {
        let config = Config::from_toml(
            r#"
            [[physicians]]
            id = 1
            first_name = "Gregory"
            last_name = "House"
            regions = ["Atlantis"]
            "#,
        )
        .unwrap();

        assert!(config.validate().unwrap_err().contains("Atlantis"));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let config = Config::from_toml("[storage]\ntimeout_ms = 0").unwrap();

        assert!(config.validate().is_err());
    }
}

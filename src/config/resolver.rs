use std::collections::HashMap;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Endpoint;
use crate::Error;
use crate::Result;

/// Discovery backend selection
///
/// ```toml
/// [resolver]
/// kind = "static"
///
/// [[resolver.targets.payments]]
/// hostname = "10.0.0.1"
/// port = 8080
/// weight = 1
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolverConfig {
    /// Fixed member table
    Static {
        #[serde(default)]
        targets: HashMap<String, Vec<Endpoint>>,
    },
    /// System DNS lookups of `host[:port]` targets
    Dns {
        #[serde(default = "default_dns_port")]
        default_port: u16,
    },
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig::Static {
            targets: HashMap::new(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            ResolverConfig::Static { targets } => {
                for (target, members) in targets {
                    if target.trim().is_empty() {
                        return Err(Error::Config(ConfigError::Message(
                            "resolver.targets contains an empty target name".into(),
                        )));
                    }
                    if let Some(bad) = members.iter().find(|e| e.hostname.is_empty()) {
                        return Err(Error::Config(ConfigError::Message(format!(
                            "resolver.targets.{target} has an endpoint without hostname (port {})",
                            bad.port
                        ))));
                    }
                }
            }
            ResolverConfig::Dns { default_port } => {
                if *default_port == 0 {
                    return Err(Error::Config(ConfigError::Message(
                        "resolver.default_port must be greater than 0".into(),
                    )));
                }
            }
        }
        Ok(())
    }
}

fn default_dns_port() -> u16 {
    80
}

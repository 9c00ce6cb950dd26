use serde::Deserialize;
use serde::Serialize;

use super::invalid;
use crate::Result;

/// Identity sent with `announceClient` once per connection
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientIdentityConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,
}

impl Default for ClientIdentityConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
        }
    }
}

impl ClientIdentityConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("client.name cannot be empty"));
        }
        Ok(())
    }
}

fn default_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}
fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

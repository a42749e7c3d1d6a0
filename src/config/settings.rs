//! TOML tuning file.
//!
//! ```toml
//! [processor]
//! batch_size = 10
//! max_retries = 3
//! idle_interval_ms = 1000
//! cooldown_ms = 1000
//! error_backoff_ms = 5000
//!
//! [broadcast]
//! chunk_size = 20
//! progress_every = 10
//!
//! [notices]
//! confirmation = "<b>Hello {name}! Your request to join {group} has been approved.</b>"
//! promo_photo = "https://example.com/banner.png"
//! promo_caption = "<b>Welcome aboard</b>"
//! ```
//!
//! Every field is optional; missing ones take their defaults.

use std::path::Path;

use serde::Deserialize;

use crate::engine::broadcast::BroadcastConfig;
use crate::engine::processor::ProcessorConfig;
use crate::engine::worker::Notices;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub processor: ProcessorConfig,
    pub broadcast: BroadcastConfig,
    pub notices: Notices,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read settings {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("bad settings {}: {e}", path.display())))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

use std::env;
use std::time::Duration;

use crate::constants::timeouts::{
    DEFAULT_API_BASE, DEFAULT_DATABASE_URL, DEFAULT_GATEWAY_TIMEOUT_SECONDS, DEFAULT_MUTE_SURFACES,
};
use crate::error::{Error, Result};
use crate::gateway::GatewaySettings;

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    /// Session cookie pair for the platform
    pub ct0: String,
    pub auth_token: String,
    pub bearer_token: String,
    pub api_base: String,
    /// Where keyword mutes apply, comma separated
    pub mute_surfaces: String,
    pub gateway_timeout_seconds: u64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let ct0 = required("TWITTER_CT0")?;
        let auth_token = required("TWITTER_AUTH_TOKEN")?;
        let bearer_token = required("TWITTER_BEARER_TOKEN")?;

        let database_url = optional("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let api_base = optional("TWITTER_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let mute_surfaces =
            optional("MUTE_SURFACES").unwrap_or_else(|| DEFAULT_MUTE_SURFACES.to_string());

        let gateway_timeout_seconds = env::var("GATEWAY_TIMEOUT_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_GATEWAY_TIMEOUT_SECONDS);

        Ok(Self {
            database_url,
            ct0,
            auth_token,
            bearer_token,
            api_base,
            mute_surfaces,
            gateway_timeout_seconds,
        })
    }

    pub fn gateway(&self) -> GatewaySettings {
        GatewaySettings {
            api_base: self.api_base.clone(),
            bearer_token: self.bearer_token.clone(),
            ct0: self.ct0.clone(),
            auth_token: self.auth_token.clone(),
            mute_surfaces: self.mute_surfaces.clone(),
            timeout: Duration::from_secs(self.gateway_timeout_seconds),
        }
    }
}

fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| Error::Config(format!("{} environment variable not set", name)))
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

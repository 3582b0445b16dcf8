//! Server settings read from the environment.

use anyhow::Context;
use std::net::SocketAddr;

pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_AGENT_MAX_RETRIES: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Extra attempts a decision client gets before the fallback action
    pub agent_max_retries: u32,
    /// Seed for server-side bots; entropy when unset
    pub bot_seed: Option<u64>,
}

impl ServerConfig {
    /// Read `SERVER_ADDR`, `AGENT_MAX_RETRIES` and `BOT_SEED`
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let addr = lookup("SERVER_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.into())
            .parse()
            .context("SERVER_ADDR is not a socket address")?;

        let agent_max_retries = match lookup("AGENT_MAX_RETRIES") {
            Some(v) => v.parse().context("AGENT_MAX_RETRIES is not a number")?,
            None => DEFAULT_AGENT_MAX_RETRIES,
        };

        let bot_seed: Option<u64> = lookup("BOT_SEED")
            .map(|v| v.parse())
            .transpose()
            .context("BOT_SEED is not a number")?;

        Ok(Self {
            addr,
            agent_max_retries,
            bot_seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.addr, DEFAULT_ADDR.parse::<SocketAddr>().unwrap());
        assert_eq!(config.agent_max_retries, DEFAULT_AGENT_MAX_RETRIES);
        assert_eq!(config.bot_seed, None);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("SERVER_ADDR", "127.0.0.1:9000"),
            ("AGENT_MAX_RETRIES", "5"),
            ("BOT_SEED", "42"),
        ]))
        .unwrap();
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.agent_max_retries, 5);
        assert_eq!(config.bot_seed, Some(42));
    }

    #[test]
    fn test_bad_values_are_rejected() {
        assert!(ServerConfig::from_lookup(lookup(&[("SERVER_ADDR", "nowhere")])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("BOT_SEED", "-1")])).is_err());
    }
}

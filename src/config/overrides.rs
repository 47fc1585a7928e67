//! Command-line overrides applied on top of the config file.

use crate::config::schema::{MarketConfig, MinerConfig};

/// Values given on the command line. `None` leaves the file value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub auth_url: Option<String>,
    pub auth_token: Option<String>,
    pub listen: Option<String>,
    pub payment_address: Option<String>,
    /// Replaces the configured miner list when non-empty.
    pub miners: Vec<String>,
}

impl Overrides {
    pub fn apply(&self, config: &mut MarketConfig) {
        if let Some(url) = &self.auth_url {
            config.auth.url = url.clone();
        }
        if let Some(token) = &self.auth_token {
            config.auth.token = token.clone();
        }
        if let Some(listen) = &self.listen {
            config.api.listen = listen.clone();
        }
        if let Some(address) = &self.payment_address {
            config.payment.address = address.clone();
        }
        if !self.miners.is_empty() {
            config.miners = self
                .miners
                .iter()
                .map(|address| MinerConfig {
                    address: address.clone(),
                    account: String::new(),
                })
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_file_values() {
        let mut config = MarketConfig::default();
        config.api.listen = "127.0.0.1:1".to_string();
        config.payment.address = "f1file".to_string();

        Overrides {
            auth_url: Some("http://auth:8989".to_string()),
            listen: Some("0.0.0.0:41235".to_string()),
            miners: vec!["f01000".to_string(), "f01001".to_string()],
            ..Overrides::default()
        }
        .apply(&mut config);

        assert_eq!(config.auth.url, "http://auth:8989");
        assert_eq!(config.api.listen, "0.0.0.0:41235");
        assert_eq!(config.payment.address, "f1file");
        assert_eq!(config.miners.len(), 2);
    }
}

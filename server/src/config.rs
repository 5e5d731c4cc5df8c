use fuel_session::{FuelOptions, StackConfig};
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::Deserialize;
use std::path::Path;

/// The demo host's configuration file.
///
/// ```toml
/// [options]
/// tokenReloadAttempts = 5
///
/// [[stacks]]
/// key = "s1"
/// clientId = "..."
/// ```
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub options: FuelOptions,
    pub stacks: Vec<StackConfig>,
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("reading {}", path.display()))?;

        Self::parse(&text).wrap_err_with(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).into_diagnostic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stacks_and_defaults_options() {
        let config = ServerConfig::parse(
            r#"
            [[stacks]]
            key = "s1"
            clientId = "client"
            clientSecret = "secret"
            authUrl = "https://auth.s1.example.com/v1/requestToken"
            appSignature = "sig"
            baseUrl = "https://rest.s1.example.com/"
            "#,
        )
        .unwrap();

        assert_eq!(config.stacks.len(), 1);
        assert_eq!(config.stacks[0].key, "s1");
        assert_eq!(config.options.token_reload_attempts, 5);
        assert_eq!(config.options.bypass_path.as_deref(), Some("/harness"));
    }

    #[test]
    fn options_table_overrides_defaults() {
        let config = ServerConfig::parse(
            r#"
            stacks = []

            [options]
            tokenReloadAttempts = 2
            tokenReloadWait = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.options.token_reload_attempts, 2);
        assert_eq!(config.options.token_reload_wait, 250);
    }

    #[test]
    fn missing_stacks_is_an_error() {
        assert!(ServerConfig::parse("[options]\n").is_err());
    }
}

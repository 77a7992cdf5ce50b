//! `agenda config`.

use std::path::Path;

use crate::config::AgendaConfig;
use crate::error::{CliError, CliResult};

/// Renders the effective configuration as TOML.
pub fn dump(config: &AgendaConfig, source: &Path) -> CliResult<String> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| CliError::Config(format!("failed to serialize config: {}", e)))?;
    Ok(format!("# config.toml ({})\n{}", source.display(), toml_str))
}

/// Validates the configuration and the client secrets it points to.
pub fn validate(config: &AgendaConfig) -> CliResult<String> {
    config.validate()?;

    let google = config.to_google_config();
    google.validate()?;
    agenda_providers::google::ClientSecrets::from_file(&google.client_secret_path)?;

    Ok(format!(
        "Configuration is valid.\nClient secrets: {}\nToken file: {}",
        google.client_secret_path.display(),
        google.token_path.display()
    ))
}

/// Shows the configuration file path.
pub fn path(source: &Path) -> CliResult<String> {
    Ok(format!("config: {}", source.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_includes_source_and_values() {
        let output = dump(&AgendaConfig::default(), Path::new("/tmp/agenda.toml")).unwrap();
        assert!(output.starts_with("# config.toml (/tmp/agenda.toml)"));
        assert!(output.contains("request_timeout_secs = 30"));
    }

    #[test]
    fn validate_checks_client_secrets() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AgendaConfig {
            client_secret_path: tmp.path().join("client_secret.json"),
            ..Default::default()
        };
        assert!(matches!(validate(&config), Err(CliError::Calendar(_))));

        std::fs::write(
            &config.client_secret_path,
            r#"{"installed": {"client_id": "id", "client_secret": "secret"}}"#,
        )
        .unwrap();
        assert!(validate(&config).unwrap().starts_with("Configuration is valid."));
    }
}

// SPDX-FileCopyrightText: 2026 TableTalk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the TableTalk dialogue orchestrator.
//!
//! Layered TOML + environment loading via Figment, post-deserialization
//! validation, and miette-rendered diagnostics for config mistakes.

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::TableTalkConfig;
pub use validation::validate_config;

/// Load configuration from the standard hierarchy and validate it.
///
/// Combines figment extraction errors and semantic validation errors into a
/// single diagnostic list for rendering at startup.
pub fn load_and_validate() -> Result<TableTalkConfig, Vec<ConfigError>> {
    let config = match loader::load_config() {
        Ok(config) => config,
        Err(err) => return Err(diagnostic::figment_to_config_errors(err)),
    };
    validation::validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_toml_loads_and_validates() {
        let config = load_config_from_str(
            r#"
            [server]
            host = "0.0.0.0"
            port = 3000
            "#,
        )
        .unwrap();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.server.port, 3000);
    }
}

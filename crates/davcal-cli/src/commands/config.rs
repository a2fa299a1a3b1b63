//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Dumps the configuration to stdout, with inline passwords masked.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&config.redacted())
        .map_err(|e| ClientError::Config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);

    Ok(())
}

/// Validates the configuration without contacting the server.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    let caldav = config.caldav().map_err(ClientError::Config)?;
    let resolved = caldav.to_client_config().map_err(ClientError::Config)?;

    println!("Server: {}", resolved.url_str());
    println!("Timezone: {}", resolved.local_timezone.name());
    if !resolved.has_credentials() {
        println!("No credentials configured.");
    }
    println!("Configuration is valid.");
    Ok(())
}

/// Shows the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    Ok(())
}

//! davcal CLI entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use davcal_caldav::CalDavClient;
use davcal_cli::cli::{Cli, Command, ConfigAction};
use davcal_cli::commands::{config, events, mutate};
use davcal_cli::config::ClientConfig;
use davcal_cli::error::{ClientError, ClientResult};
use davcal_core::{TracingConfig, init_tracing};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let loaded = match cli.config {
        Some(ref path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    };

    let debug = cli.debug || loaded.as_ref().is_ok_and(|c| c.debug);
    let tracing = if debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::cli()
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {}", e);
    }

    let result = loaded
        .map_err(ClientError::Config)
        .and_then(|config| run(cli, config, config_path));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, config: ClientConfig, config_path: PathBuf) -> ClientResult<()> {
    let json = cli.json;

    match cli.command {
        Command::Config { action } => match action {
            ConfigAction::Dump => config::dump(&config, &config_path),
            ConfigAction::Validate => config::validate(&config),
            ConfigAction::Path => config::path(&config_path),
        },
        Command::Today => events::today(&connect(&config)?, json),
        Command::Day { date } => events::day(&connect(&config)?, date, json),
        Command::Range { start, end } => events::range(&connect(&config)?, start, end, json),
        Command::Next => events::next(&connect(&config)?, json),
        Command::Search { title } => events::search(&connect(&config)?, &title, json),
        Command::Calendars => events::calendars(&connect(&config)?, json),
        Command::Create {
            title,
            start,
            minutes,
            days,
            all_day,
        } => mutate::create(&connect(&config)?, &title, start, minutes, days, all_day),
        Command::Delete { url } => mutate::delete(&connect(&config)?, &url),
        Command::Rename { url, title } => mutate::rename(&connect(&config)?, &url, &title),
    }
}

fn connect(config: &ClientConfig) -> ClientResult<CalDavClient> {
    let settings = config.caldav().map_err(ClientError::Config)?;
    let client_config = settings.to_client_config().map_err(ClientError::Config)?;
    debug!(url = %client_config.url_str(), "connecting");
    Ok(CalDavClient::connect(client_config)?)
}

//! Service bootstrap: env-driven configuration and the CLI's remote client.

use std::env;
use std::path::PathBuf;

use fieldcase_core::config::SyncSettings;
use fieldcase_core::service::SyncService;
use fieldcase_core::sync::{
    ApiResponse, HttpRemoteApi, RemoteApi, StaticReachability, SyncError, SyncResult,
};

use crate::cli::Cli;
use crate::error::CliError;

pub type Service = SyncService<ClientApi, StaticReachability>;

/// Remote client for the CLI: a configured HTTP client, or a stub that
/// surfaces the missing configuration when a remote call is attempted.
pub enum ClientApi {
    Http(HttpRemoteApi),
    Unconfigured,
}

impl RemoteApi for ClientApi {
    async fn get(&self, path: &str) -> SyncResult<ApiResponse> {
        match self {
            Self::Http(client) => client.get(path).await,
            Self::Unconfigured => Err(SyncError::MissingConfig(
                "FIELDCASE_API_URL and FIELDCASE_API_TOKEN are not set".to_string(),
            )),
        }
    }

    async fn post_with_token(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> SyncResult<ApiResponse> {
        match self {
            Self::Http(client) => client.post_with_token(path, body).await,
            Self::Unconfigured => Err(SyncError::MissingConfig(
                "FIELDCASE_API_URL and FIELDCASE_API_TOKEN are not set".to_string(),
            )),
        }
    }
}

fn settings_from_env() -> SyncSettings {
    SyncSettings {
        api_base_url: env::var("FIELDCASE_API_URL").ok(),
        api_token: env::var("FIELDCASE_API_TOKEN").ok(),
        sync_interval: None,
    }
}

fn resolve_db_path(cli: &Cli) -> Result<PathBuf, CliError> {
    if let Some(path) = &cli.db_path {
        return Ok(path.clone());
    }
    if let Ok(path) = env::var("FIELDCASE_DB_PATH") {
        return Ok(PathBuf::from(path));
    }
    let base = dirs::data_dir()
        .ok_or_else(|| CliError::Config("could not resolve a data directory".to_string()))?;
    Ok(base.join("fieldcase").join("fieldcase.db"))
}

/// Open the service with env-configured collaborators.
pub async fn build_service(cli: &Cli) -> Result<Service, CliError> {
    let settings = settings_from_env()
        .normalized()
        .map_err(CliError::Config)?;

    let api = if settings.is_configured() {
        ClientApi::Http(HttpRemoteApi::new(&settings)?)
    } else {
        ClientApi::Unconfigured
    };

    // The CLI's oracle: offline when asked for, or when nothing is
    // configured to talk to.
    let online = !cli.offline && settings.is_configured();
    let reachability = StaticReachability::new(online);

    let db_path = resolve_db_path(cli)?;
    Ok(SyncService::open_path(db_path, api, reachability).await?)
}

/// Fail early for commands that need the remote side.
pub fn require_remote(cli: &Cli) -> Result<(), CliError> {
    if cli.offline {
        return Err(CliError::Config(
            "this command needs remote access; drop --offline".to_string(),
        ));
    }
    if !settings_from_env().is_configured() {
        return Err(CliError::SyncNotConfigured);
    }
    Ok(())
}

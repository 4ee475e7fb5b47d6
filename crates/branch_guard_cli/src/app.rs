//! Wiring between configuration sources, the Bitbucket client and the runner.

use bitbucket_client::{BitbucketClient, ClientSettings};
use branch_guard_core::{BranchGuardError, RunSummary, Runner};
use config_manager::{resolve, EnvSource, ResolvedConfig, SourceChain};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::args::Cli;
use crate::errors::Error;
use crate::prompt::PromptSource;

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;

/// Resolves the configuration and runs the reconciliation.
pub async fn execute(cli: Cli) -> Result<RunSummary, Error> {
    let config = {
        let source = build_source(&cli);
        resolve(&source)?
    };
    info!(workspace = %config.workspace, "Configuration resolved");

    let client = build_client(&config)?;
    let summary = Runner::new(&client, &config)
        .run(confirm_delete_on_terminal)
        .await?;
    Ok(summary)
}

/// Command-line flags, then environment variables, then terminal prompts.
pub fn build_source(cli: &Cli) -> SourceChain {
    let chain = SourceChain::new().with(cli.to_source()).with(EnvSource);
    match PromptSource::terminal() {
        Some(prompt) => chain.with(prompt),
        None => chain,
    }
}

pub fn client_settings(config: &ResolvedConfig) -> ClientSettings {
    let mut settings = ClientSettings::default();
    if let Some(url) = &config.api_url {
        settings.api_base = url.clone();
    }
    if let Some(url) = &config.legacy_api_url {
        settings.legacy_api_base = url.clone();
    }
    settings
}

pub fn build_client(config: &ResolvedConfig) -> Result<BitbucketClient, Error> {
    let token = SecretString::from(config.credentials.api_token.expose_secret().to_owned());
    BitbucketClient::new(
        config.credentials.email.clone(),
        token,
        client_settings(config),
    )
    .map_err(Error::Client)
}

fn confirm_delete_on_terminal(repository_count: usize) -> Result<bool, BranchGuardError> {
    let Some(prompt) = PromptSource::terminal() else {
        warn!("CONFIRM_DELETE_EXISTING_RULES is not set and no terminal is attached, keeping existing rules");
        return Ok(false);
    };

    match prompt.confirm_delete(repository_count) {
        Ok(Some(answer)) => Ok(answer),
        Ok(None) => {
            warn!("No answer given, keeping existing rules");
            Ok(false)
        }
        Err(e) => Err(BranchGuardError::Confirmation(e.to_string())),
    }
}

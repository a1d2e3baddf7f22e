//! Credential caching and privileged command execution.

pub mod credential;
pub mod executor;

pub use credential::{Credential, CredentialStore};
pub use executor::{applescript_command, ExecError, Executor, ExecutorPaths, Output};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ElevationError {
    /// No credential is cached; the caller must supply one first
    #[error("Authorization required")]
    AuthorizationRequired,

    /// The helper ran and failed; the cached credential was discarded
    #[error("elevated command failed: {0}")]
    Rejected(#[source] ExecError),

    /// Nothing ran (missing helper, cancelled dialog)
    #[error(transparent)]
    Failed(ExecError),
}

/// Shared credential-or-prompt policy for every elevated step
#[derive(Debug, Clone)]
pub struct Elevator {
    executor: Executor,
    credentials: CredentialStore,
    native_prompt_fallback: bool,
}

impl Elevator {
    pub fn new(executor: Executor, credentials: CredentialStore) -> Self {
        Self {
            executor,
            credentials,
            native_prompt_fallback: false,
        }
    }

    /// Use the OS consent dialog when no credential is cached
    pub fn with_native_prompt_fallback(mut self, enabled: bool) -> Self {
        self.native_prompt_fallback = enabled;
        self
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Run `command` elevated.
    ///
    /// With a cached credential, any `CommandFailed` clears it and raises
    /// the needs-authorization signal. Without one, the signal is raised
    /// immediately unless the native prompt fallback is enabled.
    pub async fn run(&self, command: &str) -> Result<Output, ElevationError> {
        match self.credentials.get() {
            Some(credential) => {
                match self
                    .executor
                    .run_elevated_with_credential(command, &credential)
                    .await
                {
                    Ok(output) => Ok(output),
                    Err(e @ ExecError::CommandFailed { .. }) => {
                        warn!("elevated command failed, discarding cached credential");
                        self.credentials.clear();
                        self.credentials.request_authorization();
                        Err(ElevationError::Rejected(e))
                    }
                    Err(e) => Err(ElevationError::Failed(e)),
                }
            }
            None if self.native_prompt_fallback => {
                info!("no cached credential, using the native administrator prompt");
                self.executor
                    .run_elevated_interactive(command)
                    .await
                    .map_err(ElevationError::Failed)
            }
            None => {
                self.credentials.request_authorization();
                Err(ElevationError::AuthorizationRequired)
            }
        }
    }
}

use std::io;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::{send_with_timeout, TdClient};
use crate::prompt::Prompter;
use crate::td::{AuthorizationState, Request, TdlibParameters};

#[derive(Debug, thiserror::Error)]
pub enum AuthorizationError {
    #[error("prompt failed: {0}")]
    Prompt(#[from] io::Error),
    #[error("authorization did not complete within {0:?}")]
    Timeout(Duration),
    #[error("the TDLib client closed before authorization completed")]
    Closed,
    #[error("authorization state stream ended")]
    StreamEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Ready,
}

/// Drives TDLib's login handshake: every state notification produces at most
/// one request, and the machine finishes at `authorizationStateReady`.
pub struct Authorizer<'a> {
    client: &'a dyn TdClient,
    prompter: &'a dyn Prompter,
    parameters: TdlibParameters,
    phone_number: String,
    request_timeout: Option<Duration>,
}

impl<'a> Authorizer<'a> {
    pub fn new(
        client: &'a dyn TdClient,
        prompter: &'a dyn Prompter,
        parameters: TdlibParameters,
        phone_number: String,
    ) -> Self {
        Self {
            client,
            prompter,
            parameters,
            phone_number,
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub async fn run(
        &self,
        states: &mut mpsc::UnboundedReceiver<AuthorizationState>,
        timeout: Option<Duration>,
    ) -> Result<(), AuthorizationError> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.wait_until_ready(states))
                .await
                .map_err(|_| AuthorizationError::Timeout(limit))?,
            None => self.wait_until_ready(states).await,
        }
    }

    async fn wait_until_ready(
        &self,
        states: &mut mpsc::UnboundedReceiver<AuthorizationState>,
    ) -> Result<(), AuthorizationError> {
        while let Some(state) = states.recv().await {
            if self.handle(state).await? == Step::Ready {
                return Ok(());
            }
        }
        Err(AuthorizationError::StreamEnded)
    }

    pub async fn handle(&self, state: AuthorizationState) -> Result<Step, AuthorizationError> {
        let request = match state {
            AuthorizationState::AuthorizationStateWaitTdlibParameters {} => {
                Request::SetTdlibParameters(self.parameters.clone())
            }
            AuthorizationState::AuthorizationStateWaitEncryptionKey { is_encrypted } => {
                debug!(is_encrypted, "Database encryption key requested");
                Request::CheckDatabaseEncryptionKey {
                    encryption_key: String::new(),
                }
            }
            AuthorizationState::AuthorizationStateWaitPhoneNumber {} => {
                Request::SetAuthenticationPhoneNumber {
                    phone_number: self.phone_number.clone(),
                    settings: None,
                }
            }
            AuthorizationState::AuthorizationStateWaitCode {} => Request::CheckAuthenticationCode {
                code: self.prompter.verification_code()?,
            },
            AuthorizationState::AuthorizationStateWaitPassword { password_hint } => {
                Request::CheckAuthenticationPassword {
                    password: self.prompter.password(&password_hint)?,
                }
            }
            AuthorizationState::AuthorizationStateReady {} => {
                info!("Authorization complete");
                return Ok(Step::Ready);
            }
            AuthorizationState::AuthorizationStateClosed {} => {
                return Err(AuthorizationError::Closed);
            }
            AuthorizationState::Unsupported => {
                warn!("Unsupported authorization state, ignoring");
                return Ok(Step::Continue);
            }
        };

        let name = request.name();
        debug!(request = name, "Sending authorization request");
        // TDLib re-emits the state when a step has to be repeated.
        if let Err(error) = send_with_timeout(self.client, request, self.request_timeout).await {
            warn!(request = name, error = %error, "Authorization request failed");
        }
        Ok(Step::Continue)
    }
}

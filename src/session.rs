use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::authorization::{AuthorizationError, Authorizer};
use crate::client::{send_with_timeout, ClientError, TdClient};
use crate::prompt::Prompter;
use crate::registry::ChatRegistry;
use crate::td::{AuthorizationState, Request, TdlibParameters, Update};

pub const LOAD_CHATS_LIMIT: i32 = 100;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// One connection's worth of state: the client handle, the chats it has
/// announced, and the task routing its updates.
pub struct Session {
    client: Arc<dyn TdClient>,
    registry: ChatRegistry,
    auth_states: mpsc::UnboundedReceiver<AuthorizationState>,
    dispatcher: JoinHandle<()>,
    request_timeout: Option<Duration>,
}

impl Session {
    pub fn start(client: Arc<dyn TdClient>, updates: mpsc::Receiver<Update>) -> Self {
        let registry = ChatRegistry::new();
        let (auth_tx, auth_states) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch_updates(updates, registry.clone(), auth_tx));
        Self {
            client,
            registry,
            auth_states,
            dispatcher,
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn client(&self) -> &dyn TdClient {
        self.client.as_ref()
    }

    pub fn registry(&self) -> &ChatRegistry {
        &self.registry
    }

    /// Blocks until the client reports `authorizationStateReady`.
    pub async fn authorize(
        &mut self,
        prompter: &dyn Prompter,
        parameters: TdlibParameters,
        phone_number: String,
        timeout: Option<Duration>,
    ) -> Result<(), AuthorizationError> {
        let authorizer = Authorizer::new(self.client.as_ref(), prompter, parameters, phone_number)
            .with_request_timeout(self.request_timeout);
        authorizer.run(&mut self.auth_states, timeout).await
    }

    /// Asks the client to announce up to `limit` chats, then waits `settle`
    /// for trailing `updateNewChat` notifications. The delay is a heuristic:
    /// the load response does not guarantee every update has been applied.
    pub async fn load_chats(&self, limit: i32, settle: Duration) {
        let request = Request::LoadChats {
            chat_list: None,
            limit,
        };
        match send_with_timeout(self.client(), request, self.request_timeout).await {
            Ok(_) => debug!(limit, "loadChats completed"),
            Err(ClientError::Td { code: 404, .. }) => debug!("All chats are already loaded"),
            Err(error) => warn!(error = %error, "loadChats failed"),
        }
        tokio::time::sleep(settle).await;
        info!(chats = self.registry.len(), "Chat list loaded");
    }

    /// Posts `close` without waiting for the client to shut down.
    pub fn close(self) {
        if let Err(error) = self.client.post(Request::Close) {
            debug!(error = %error, "Failed to post close");
        }
        self.dispatcher.abort();
    }
}

async fn dispatch_updates(
    mut updates: mpsc::Receiver<Update>,
    registry: ChatRegistry,
    auth_tx: mpsc::UnboundedSender<AuthorizationState>,
) {
    while let Some(update) = updates.recv().await {
        match update {
            Update::UpdateAuthorizationState { authorization_state } => {
                debug!(state = ?authorization_state, "Authorization state changed");
                if auth_tx.send(authorization_state).is_err() {
                    debug!("Authorization state after the handshake finished");
                }
            }
            Update::UpdateNewChat { chat } => {
                debug!(chat_id = chat.id, title = %chat.title, "New chat");
                registry.insert(chat.id, chat.title);
            }
            Update::UpdateChatTitle { chat_id, title } => {
                if !registry.set_title(chat_id, title) {
                    debug!(chat_id, "Title change for an unknown chat");
                }
            }
            Update::Other => {}
        }
    }
    debug!("Update stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::fake::FakeClient;
    use crate::td::Chat;

    fn new_chat(id: i64, title: &str) -> Update {
        Update::UpdateNewChat {
            chat: Chat {
                id,
                title: title.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn dispatcher_routes_chats_and_states() {
        let (tx, rx) = mpsc::channel(16);
        let registry = ChatRegistry::new();
        let (auth_tx, mut auth_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(dispatch_updates(rx, registry.clone(), auth_tx));

        tx.send(new_chat(1, "Family Group")).await.expect("send");
        tx.send(new_chat(2, "Work Chat")).await.expect("send");
        tx.send(Update::UpdateChatTitle {
            chat_id: 2,
            title: "Office".to_string(),
        })
        .await
        .expect("send");
        tx.send(Update::UpdateChatTitle {
            chat_id: 9,
            title: "Ghost".to_string(),
        })
        .await
        .expect("send");
        tx.send(Update::UpdateAuthorizationState {
            authorization_state: AuthorizationState::AuthorizationStateReady {},
        })
        .await
        .expect("send");
        tx.send(Update::Other).await.expect("send");
        drop(tx);
        handle.await.expect("dispatcher");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(2).map(|chat| chat.title), Some("Office".to_string()));
        assert_eq!(
            auth_rx.recv().await,
            Some(AuthorizationState::AuthorizationStateReady {})
        );
    }

    #[tokio::test]
    async fn load_chats_tolerates_already_loaded() {
        let fake = Arc::new(FakeClient::new());
        fake.respond_td_error(404, "Not Found");
        let (_tx, rx) = mpsc::channel(1);
        let session = Session::start(fake.clone(), rx);

        session.load_chats(LOAD_CHATS_LIMIT, Duration::ZERO).await;

        assert_eq!(
            fake.sent(),
            vec![Request::LoadChats {
                chat_list: None,
                limit: 100
            }]
        );
        session.close();
        assert_eq!(fake.posted(), vec![Request::Close]);
    }

    #[tokio::test]
    async fn updates_fill_the_session_registry() {
        let fake = Arc::new(FakeClient::new());
        let (tx, rx) = mpsc::channel(4);
        let session = Session::start(fake, rx);
        tx.send(new_chat(5, "Family Group")).await.expect("send");

        session.load_chats(LOAD_CHATS_LIMIT, Duration::from_millis(50)).await;

        assert_eq!(
            session.registry().find_by_name("FAMILY").map(|chat| chat.id),
            Some(5)
        );
    }
}

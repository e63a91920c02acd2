//! TDLib JSON objects used by this CLI.
//!
//! Every object is tagged with `@type`. Only the fields we read or send are
//! modelled; unknown fields are ignored and unknown types fall into the
//! catch-all variants.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum Request {
    SetTdlibParameters(TdlibParameters),
    CheckDatabaseEncryptionKey {
        encryption_key: String,
    },
    SetAuthenticationPhoneNumber {
        phone_number: String,
        settings: Option<serde_json::Value>,
    },
    CheckAuthenticationCode {
        code: String,
    },
    CheckAuthenticationPassword {
        password: String,
    },
    LoadChats {
        chat_list: Option<serde_json::Value>,
        limit: i32,
    },
    GetChatHistory {
        chat_id: i64,
        from_message_id: i64,
        offset: i32,
        limit: i32,
        only_local: bool,
    },
    Close,
}

impl Request {
    pub fn name(&self) -> &'static str {
        match self {
            Request::SetTdlibParameters(_) => "setTdlibParameters",
            Request::CheckDatabaseEncryptionKey { .. } => "checkDatabaseEncryptionKey",
            Request::SetAuthenticationPhoneNumber { .. } => "setAuthenticationPhoneNumber",
            Request::CheckAuthenticationCode { .. } => "checkAuthenticationCode",
            Request::CheckAuthenticationPassword { .. } => "checkAuthenticationPassword",
            Request::LoadChats { .. } => "loadChats",
            Request::GetChatHistory { .. } => "getChatHistory",
            Request::Close => "close",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TdlibParameters {
    pub use_test_dc: bool,
    pub database_directory: String,
    pub files_directory: String,
    pub database_encryption_key: String,
    pub use_file_database: bool,
    pub use_chat_info_database: bool,
    pub use_message_database: bool,
    pub use_secret_chats: bool,
    pub api_id: i32,
    pub api_hash: String,
    pub system_language_code: String,
    pub device_model: String,
    pub system_version: String,
    pub application_version: String,
    pub enable_storage_optimizer: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum Response {
    Ok {},
    Error(TdError),
    Messages(Messages),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TdError {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Messages {
    #[serde(default)]
    pub total_count: i32,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum Update {
    UpdateAuthorizationState {
        authorization_state: AuthorizationState,
    },
    UpdateNewChat {
        chat: Chat,
    },
    UpdateChatTitle {
        chat_id: i64,
        title: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum AuthorizationState {
    AuthorizationStateWaitTdlibParameters {},
    AuthorizationStateWaitEncryptionKey {
        #[serde(default)]
        is_encrypted: bool,
    },
    AuthorizationStateWaitPhoneNumber {},
    AuthorizationStateWaitCode {},
    AuthorizationStateWaitPassword {
        #[serde(default)]
        password_hint: String,
    },
    AuthorizationStateReady {},
    AuthorizationStateClosed {},
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    pub id: i64,
    pub date: i64,
    pub sender_id: Option<MessageSender>,
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub forward_info: Option<MessageForwardInfo>,
}

impl Message {
    /// Id of the user, chat or channel a forwarded message originally came
    /// from. Hidden senders have none.
    pub fn forward_origin_id(&self) -> Option<i64> {
        match self.forward_info.as_ref()?.origin {
            MessageOrigin::MessageOriginUser { sender_user_id } => Some(sender_user_id),
            MessageOrigin::MessageOriginChat { sender_chat_id } => Some(sender_chat_id),
            MessageOrigin::MessageOriginChannel { chat_id } => Some(chat_id),
            MessageOrigin::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageForwardInfo {
    pub origin: MessageOrigin,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum MessageOrigin {
    MessageOriginUser { sender_user_id: i64 },
    MessageOriginChat { sender_chat_id: i64 },
    MessageOriginChannel { chat_id: i64 },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum MessageSender {
    MessageSenderUser { user_id: i64 },
    MessageSenderChat { chat_id: i64 },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum MessageContent {
    MessageText { text: FormattedText },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FormattedText {
    #[serde(default)]
    pub text: String,
}

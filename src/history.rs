use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use crate::client::{send_with_timeout, TdClient};
use crate::registry::ChatRegistry;
use crate::td::{Message, MessageContent, MessageSender, Request, Response};

pub const DEFAULT_PAGE_SIZE: i32 = 100;
pub const NON_TEXT_PLACEHOLDER: &str = "[Non-text message]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: i64,
    pub date: i64,
    pub sender_id: i64,
    pub text: String,
    pub has_media: bool,
    pub forward_from: Option<i64>,
    pub chat_name: String,
}

impl MessageRecord {
    pub fn from_message(message: Message, chat_name: &str) -> Self {
        let sender_id = sender_id(message.sender_id.as_ref());
        let forward_from = message.forward_origin_id();
        let (text, has_media) = match message.content {
            Some(MessageContent::MessageText { text }) => (text.text, false),
            _ => (NON_TEXT_PLACEHOLDER.to_string(), true),
        };
        Self {
            id: message.id,
            date: message.date,
            sender_id,
            text,
            has_media,
            forward_from,
            chat_name: chat_name.to_string(),
        }
    }
}

pub fn sender_id(sender: Option<&MessageSender>) -> i64 {
    match sender {
        Some(MessageSender::MessageSenderUser { user_id }) => *user_id,
        Some(MessageSender::MessageSenderChat { chat_id }) => *chat_id,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryOptions {
    pub page_size: i32,
    /// `None` keeps paging until the cutoff or an empty page.
    pub max_pages: Option<usize>,
    pub request_timeout: Option<Duration>,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: Some(1),
            request_timeout: None,
        }
    }
}

/// Converts one newest-first page into records, stopping for good at the
/// first message older than `cutoff`.
pub fn records_until_cutoff<'a, I>(
    messages: I,
    cutoff: i64,
    chat_name: &'a str,
) -> impl Iterator<Item = MessageRecord> + 'a
where
    I: IntoIterator<Item = Message> + 'a,
    I::IntoIter: 'a,
{
    messages
        .into_iter()
        .take_while(move |message| message.date >= cutoff)
        .map(move |message| MessageRecord::from_message(message, chat_name))
}

/// Fetches recent history for one chat. Request failures are logged and
/// whatever was collected before them is returned.
pub async fn fetch_recent(
    client: &dyn TdClient,
    chat_id: i64,
    chat_name: &str,
    cutoff: i64,
    options: &HistoryOptions,
) -> Vec<MessageRecord> {
    let mut records = Vec::new();
    let mut from_message_id = 0;
    let mut pages = 0usize;

    loop {
        if options.max_pages.is_some_and(|max| pages >= max) {
            break;
        }
        pages += 1;

        let request = Request::GetChatHistory {
            chat_id,
            from_message_id,
            offset: 0,
            limit: options.page_size,
            only_local: false,
        };
        let messages = match send_with_timeout(client, request, options.request_timeout).await {
            Ok(Response::Messages(page)) => {
                debug!(chat_id, total_count = page.total_count, "getChatHistory returned");
                page.messages
            }
            Ok(other) => {
                warn!(chat_id, response = ?other, "Unexpected getChatHistory response");
                break;
            }
            Err(error) => {
                warn!(chat_id, error = %error, "getChatHistory failed");
                break;
            }
        };

        let Some(oldest) = messages.last() else {
            break;
        };
        let oldest_id = oldest.id;
        let page_len = messages.len();

        let before = records.len();
        records.extend(records_until_cutoff(messages, cutoff, chat_name));
        let kept = records.len() - before;
        debug!(chat_id, page = pages, page_len, kept, "History page processed");

        // A short page means a message below the cutoff ended the walk.
        if kept < page_len || oldest_id == from_message_id {
            break;
        }
        from_message_id = oldest_id;
    }

    records
}

#[derive(Debug, Default)]
pub struct GroupFetch {
    pub records: Vec<MessageRecord>,
    pub found: usize,
}

/// Looks up each requested name and fetches its history. Names with no
/// matching chat are reported through `progress` and skipped.
pub async fn fetch_groups(
    client: &dyn TdClient,
    registry: &ChatRegistry,
    names: &[String],
    cutoff: i64,
    options: &HistoryOptions,
    mut progress: impl FnMut(String),
) -> GroupFetch {
    let mut fetch = GroupFetch::default();
    for name in names {
        progress(format!("\nSearching for group: '{name}'..."));
        let Some(chat) = registry.find_by_name(name) else {
            progress(format!(
                "Group '{name}' not found! Make sure you're a member of this group."
            ));
            continue;
        };
        fetch.found += 1;
        progress(format!("Found group: {}", chat.title));

        progress(format!("\nFetching messages from '{name}'..."));
        let records = fetch_recent(client, chat.id, name, cutoff, options).await;
        progress(format!("Found {} messages in '{name}'", records.len()));
        fetch.records.extend(records);
    }
    fetch
}

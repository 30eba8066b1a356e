//! Bucketed chat history.
//!
//! Messages live in `MessageBucket` documents of at most `BUCKET_CAPACITY`
//! entries. Appends go through a single `ChatServer` task so choosing the
//! current bucket and writing to it never interleave within the process; the
//! store's conditional append keeps a full bucket from growing even when
//! several processes share the database.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use mongodb::bson::DateTime;
use tokio::sync::{mpsc, oneshot};

use crate::error::{AppError, Result};
use crate::store::Store;
use crate::types::{BUCKET_CAPACITY, Chat, ChatId, Message, MessageBucket, UserId};
use crate::views::MessageView;

enum Command {
    AppendMessage {
        chat_id: ChatId,
        sender_id: UserId,
        content: String,
        res_tx: oneshot::Sender<Result<Message>>,
    },
}

pub struct ChatServer {
    store: Arc<dyn Store>,
    cmd_rx: mpsc::UnboundedReceiver<Command>,
}

impl ChatServer {
    pub fn new(store: Arc<dyn Store>) -> (Self, ChatServerHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<Command>();

        (
            Self {
                store: store.clone(),
                cmd_rx,
            },
            ChatServerHandle { cmd_tx, store },
        )
    }

    pub async fn run(mut self) {
        while let Some(command) = self.cmd_rx.recv().await {
            match command {
                Command::AppendMessage {
                    chat_id,
                    sender_id,
                    content,
                    res_tx,
                } => {
                    let result =
                        append_message(self.store.as_ref(), chat_id, sender_id, content).await;
                    if let Err(err) = &result {
                        log::debug!("Append to chat {} failed: {}", chat_id, err);
                    }
                    // The caller may have gone away; the write already happened.
                    let _ = res_tx.send(result);
                }
            }
        }

        log::info!("Chat server stopped");
    }
}

#[derive(Clone)]
pub struct ChatServerHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    store: Arc<dyn Store>,
}

impl ChatServerHandle {
    pub async fn append_message(
        &self,
        chat_id: ChatId,
        sender_id: UserId,
        content: String,
    ) -> Result<Message> {
        let (res_tx, res_rx) = oneshot::channel();

        self.cmd_tx
            .send(Command::AppendMessage {
                chat_id,
                sender_id,
                content,
                res_tx,
            })
            .map_err(|_| AppError::Internal("Chat server is not running".to_string()))?;

        res_rx
            .await
            .map_err(|_| AppError::Internal("Chat server dropped the request".to_string()))?
    }

    pub async fn list_messages(&self, chat_id: ChatId) -> Result<Vec<MessageView>> {
        list_messages(self.store.as_ref(), chat_id).await
    }
}

/// Appends to the chat's current bucket, opening a new bucket when there is none
/// or the current one is full. Callers must serialize calls per chat.
pub async fn append_message(
    store: &dyn Store,
    chat_id: ChatId,
    sender_id: UserId,
    content: String,
) -> Result<Message> {
    let content = content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::invalid("content is required"));
    }

    let chat = store
        .find_chat(chat_id)
        .await?
        .ok_or_else(|| AppError::not_found("Chat"))?;
    if !chat.is_member(sender_id) {
        return Err(AppError::Forbidden("Not a member of this chat".to_string()));
    }

    let message = Message {
        content,
        sender: sender_id,
        timestamp: DateTime::now(),
    };

    if let Some(current) = chat.current_bucket() {
        if store
            .append_to_bucket(current, &message, BUCKET_CAPACITY)
            .await?
        {
            return Ok(message);
        }
    }

    let bucket = MessageBucket::starting_with(chat_id, message.clone());
    store.insert_bucket(&bucket).await?;
    match store.push_bucket(chat_id, bucket.id).await {
        Ok(true) => {}
        Ok(false) => {
            // The chat vanished between the lookup and the write.
            store.delete_buckets_for_chat(chat_id).await?;
            return Err(AppError::not_found("Chat"));
        }
        Err(err) => {
            // An unregistered bucket would surface out of order in the history.
            store.delete_bucket(bucket.id).await?;
            return Err(err.into());
        }
    }
    log::debug!(
        "Opened bucket {} for chat {} ({} buckets)",
        bucket.id,
        chat_id,
        chat.message_buckets.len() + 1
    );

    Ok(message)
}

/// Buckets in the chat's registration order. Unregistered buckets sort last by age.
fn order_buckets(chat: &Chat, mut buckets: Vec<MessageBucket>) -> Vec<MessageBucket> {
    let position: HashMap<_, _> = chat
        .message_buckets
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();

    buckets.sort_by_key(|b| {
        (
            position.get(&b.id).copied().unwrap_or(usize::MAX),
            b.created_at,
        )
    });
    buckets
}

/// Full history of a chat, oldest first, with sender names resolved at read time.
pub async fn list_messages(store: &dyn Store, chat_id: ChatId) -> Result<Vec<MessageView>> {
    let chat = store
        .find_chat(chat_id)
        .await?
        .ok_or_else(|| AppError::not_found("Chat"))?;

    let buckets = order_buckets(&chat, store.buckets_for_chat(chat_id).await?);

    let sender_ids: Vec<UserId> = buckets
        .iter()
        .flat_map(|b| b.messages.iter().map(|m| m.sender))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let names: HashMap<UserId, String> = store
        .find_users(&sender_ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    Ok(buckets
        .iter()
        .flat_map(|b| b.messages.iter())
        .map(|m| MessageView::new(m, names.get(&m.sender).cloned()))
        .collect())
}

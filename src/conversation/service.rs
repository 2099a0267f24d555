//! Conversation operations behind the HTTP handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, warn};

use crate::common::ids::ConversationId;
use crate::common::pagination::{PageMeta, PageParams};
use crate::conversation::model::{Conversation, ConversationConfig, InvalidModel, Message};
use crate::conversation::store::ConversationStore;
use crate::llm::{LlmEngine, LlmError};
use crate::storage::StorageError;

/// Number of trailing messages returned after a send.
pub const RECENT_MESSAGES: usize = 20;

/// Message used when an operation targets a conversation that does not exist.
pub const NOT_FOUND_MESSAGE: &str = "conversation not found";

/// Errors raised by conversation operations.
#[derive(Debug, Error)]
pub enum ConversationError {
    /// The message to send is empty.
    #[error("message content must not be empty")]
    EmptyContent,
    /// `create` was asked for an id that is taken.
    #[error("conversation already exists: {0}")]
    AlreadyExists(ConversationId),
    /// A config body carries an unusable `model`.
    #[error(transparent)]
    InvalidConfig(#[from] InvalidModel),
    /// The model call failed; nothing was persisted.
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// Reading or writing the conversation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Convenience result alias for conversation operations.
pub type ConversationResult<T> = Result<T, ConversationError>;

/// One page of conversation ids, newest first.
#[derive(Clone, Debug, Serialize)]
pub struct ConversationPage {
    /// Ids on this page.
    pub data: Vec<ConversationId>,
    /// Pagination metadata.
    pub meta: PageMeta,
}

/// A conversation with one page of its messages.
#[derive(Clone, Debug, Serialize)]
pub struct ConversationView {
    /// The conversation; `messages` holds only the requested page.
    #[serde(flatten)]
    pub conversation: Conversation,
    /// Pagination metadata over all messages.
    pub meta: PageMeta,
}

/// Result of a send.
#[derive(Clone, Debug, Serialize)]
pub struct SendOutcome {
    /// The assistant's reply.
    pub reply: String,
    /// The most recent messages, including this exchange.
    pub messages: Vec<Message>,
    /// Conversation id.
    pub conversation_id: ConversationId,
    /// Display name.
    pub name: String,
    /// Summary.
    pub summary: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Modification time.
    pub updated_at: DateTime<Utc>,
}

/// Result of a delete.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    /// Whether a conversation was removed.
    pub success: bool,
    /// Reason when nothing was removed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of a config update.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigOutcome {
    /// The stored config after the update.
    Updated(ConversationConfig),
    /// The conversation does not exist.
    Missing {
        /// Reason.
        error: String,
    },
}

/// Per-conversation mutexes, keyed by id.
type LockMap = DashMap<ConversationId, Arc<Mutex<()>>>;

/// Exclusive access to one conversation.
///
/// On release the map entry is evicted unless another task holds a clone of
/// the same mutex, so waiters and later callers always share one lock.
struct ConversationLock<'a> {
    locks: &'a LockMap,
    id: ConversationId,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for ConversationLock<'_> {
    fn drop(&mut self) {
        // One reference in the map, one in our guard.
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

/// Conversation service: storage, per-conversation serialization, LLM calls.
pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    llm: LlmEngine,
    locks: LockMap,
}

impl ConversationService {
    /// Create a service over a store and an engine.
    #[must_use]
    pub fn new(store: Arc<dyn ConversationStore>, llm: LlmEngine) -> Self {
        Self {
            store,
            llm,
            locks: DashMap::new(),
        }
    }

    /// Serialize read-modify-write cycles on one conversation.
    async fn lock(&self, id: &ConversationId) -> ConversationLock<'_> {
        let mutex = self.locks.entry(id.clone()).or_default().value().clone();
        ConversationLock {
            locks: &self.locks,
            id: id.clone(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// An empty conversation bound to the engine's default model.
    fn fresh(&self, id: ConversationId) -> Conversation {
        let mut conversation = Conversation::new(id);
        conversation.config.model = self.llm.default_model().to_string();
        conversation
    }

    /// Conversation ids, newest first.
    pub async fn list(&self, params: PageParams) -> ConversationResult<ConversationPage> {
        let mut entries = self.store.list_entries().await?;
        entries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let total = entries.len();
        let data = params
            .slice(&entries)
            .iter()
            .map(|entry| entry.id.clone())
            .collect();

        Ok(ConversationPage {
            data,
            meta: params.meta(total),
        })
    }

    /// Create and persist an empty conversation.
    pub async fn create(
        &self,
        id: Option<ConversationId>,
        name: Option<String>,
    ) -> ConversationResult<Conversation> {
        let id = id.unwrap_or_else(ConversationId::generate);
        let _lock = self.lock(&id).await;

        if self.store.exists(&id).await? {
            return Err(ConversationError::AlreadyExists(id));
        }

        let mut conversation = self.fresh(id);
        if let Some(name) = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
            conversation.name = name;
        }
        self.store.save(&conversation).await?;
        info!(conversation_id = %conversation.conversation_id, "conversation created");
        Ok(conversation)
    }

    /// A conversation with one page of messages.
    ///
    /// Unknown ids yield an empty conversation that is not persisted. An
    /// unreadable document is logged and answered the same way.
    pub async fn get(&self, id: ConversationId, params: PageParams) -> ConversationView {
        let mut conversation = match self.store.load(&id).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => self.fresh(id),
            Err(err) => {
                error!(conversation_id = %id, error = %err, "failed to read conversation");
                self.fresh(id)
            }
        };

        let total = conversation.messages.len();
        conversation.messages = params.slice(&conversation.messages).to_vec();
        ConversationView {
            conversation,
            meta: params.meta(total),
        }
    }

    /// Append a user message, ask the model, append its reply, persist.
    ///
    /// Sends to the same conversation are serialized. Nothing is written if
    /// the model call fails, and a document that cannot be parsed is left
    /// untouched.
    pub async fn send_message(
        &self,
        id: ConversationId,
        content: String,
        model: Option<String>,
    ) -> ConversationResult<SendOutcome> {
        if content.trim().is_empty() {
            return Err(ConversationError::EmptyContent);
        }
        let model = model.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
        info!(
            conversation_id = %id,
            model = model.as_deref().unwrap_or("-"),
            content = %content,
            "user message received"
        );

        let _lock = self.lock(&id).await;

        let mut conversation = match self.store.load(&id).await? {
            Some(conversation) => conversation,
            None => self.fresh(id.clone()),
        };
        if let Some(model) = model {
            conversation.set_model(model);
        }

        conversation.messages.push(Message::user(content));
        let reply = self
            .llm
            .chat(
                conversation.chat_history(),
                Some(conversation.config.model.as_str()),
            )
            .await?;
        info!(conversation_id = %id, reply_chars = reply.chars().count(), "model replied");

        conversation.messages.push(Message::assistant(reply.clone()));
        conversation.fill_defaults();
        conversation.touch();
        self.store.save(&conversation).await?;

        let skip = conversation.messages.len().saturating_sub(RECENT_MESSAGES);
        Ok(SendOutcome {
            reply,
            messages: conversation.messages.split_off(skip),
            conversation_id: conversation.conversation_id,
            name: conversation.name,
            summary: conversation.summary,
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        })
    }

    /// Delete a conversation.
    pub async fn delete(&self, id: ConversationId) -> DeleteOutcome {
        let _lock = self.lock(&id).await;
        match self.store.delete(&id).await {
            Ok(true) => {
                info!(conversation_id = %id, "conversation deleted");
                DeleteOutcome {
                    success: true,
                    error: None,
                }
            }
            Ok(false) => {
                warn!(conversation_id = %id, "delete requested for missing conversation");
                DeleteOutcome {
                    success: false,
                    error: Some(NOT_FOUND_MESSAGE.to_string()),
                }
            }
            Err(err) => {
                error!(conversation_id = %id, error = %err, "failed to delete conversation");
                DeleteOutcome {
                    success: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Replace a conversation's model settings.
    pub async fn set_config(
        &self,
        id: ConversationId,
        raw: Map<String, Value>,
    ) -> ConversationResult<ConfigOutcome> {
        let _lock = self.lock(&id).await;

        let Some(mut conversation) = self.store.load(&id).await? else {
            return Ok(ConfigOutcome::Missing {
                error: NOT_FOUND_MESSAGE.to_string(),
            });
        };

        conversation.replace_config(raw)?;
        conversation.touch();
        self.store.save(&conversation).await?;
        info!(conversation_id = %id, model = %conversation.config.model, "config updated");
        Ok(ConfigOutcome::Updated(conversation.config))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    use super::*;
    use crate::common::pagination::{PageLimits, PageQuery};
    use crate::conversation::store::JsonConversationStore;
    use crate::llm::{ChatCompletion, ChatModel, ChatRequest, LlmFuture, LlmResult};

    /// Replies with a fixed text and records requests.
    struct FixedReply {
        reply: &'static str,
        fail: bool,
        seen: StdMutex<Vec<ChatRequest>>,
    }

    impl FixedReply {
        fn new(reply: &'static str) -> Arc<Self> {
            Arc::new(Self {
                reply,
                fail: false,
                seen: StdMutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: "",
                fail: true,
                seen: StdMutex::new(Vec::new()),
            })
        }
    }

    impl ChatModel for FixedReply {
        fn backend(&self) -> &'static str {
            "fixed"
        }

        fn complete<'a>(
            &'a self,
            request: &'a ChatRequest,
        ) -> LlmFuture<'a, LlmResult<ChatCompletion>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(request.clone());
                if self.fail {
                    return Err(LlmError::Status {
                        status: 503,
                        body: "unavailable".to_string(),
                    });
                }
                Ok(ChatCompletion {
                    text: self.reply.to_string(),
                    usage: None,
                })
            })
        }
    }

    fn service(dir: &TempDir, model: Arc<dyn ChatModel>) -> ConversationService {
        let store = Arc::new(JsonConversationStore::new(dir.path()));
        ConversationService::new(store, LlmEngine::new(model, "gpt-4.1", 0.7))
    }

    fn id(raw: &str) -> ConversationId {
        ConversationId::new(raw).unwrap()
    }

    fn page(page: i64, size: i64, limits: PageLimits) -> PageParams {
        PageParams::from_query(
            PageQuery {
                page: Some(page),
                size: Some(size),
            },
            limits,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_creates_and_appends() {
        let dir = TempDir::new().unwrap();
        let model = FixedReply::new("这是AI的回复");
        let svc = service(&dir, model.clone());

        let outcome = svc
            .send_message(id("test_conversation"), "测试消息".to_string(), None)
            .await
            .unwrap();
        assert_eq!(outcome.reply, "这是AI的回复");
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.name, "测试消息");
        assert_eq!(outcome.summary, "测试消息");

        svc.send_message(id("test_conversation"), "second".to_string(), None)
            .await
            .unwrap();
        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[1].messages.len(), 3);
        assert_eq!(seen[1].model, "gpt-4.1");
    }

    #[tokio::test]
    async fn test_send_returns_last_twenty() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedReply::new("ok"));
        let conv = id("long");
        let mut last = None;
        for i in 0..12 {
            last = Some(
                svc.send_message(conv.clone(), format!("msg {i}"), None)
                    .await
                    .unwrap(),
            );
        }
        let last = last.unwrap();
        assert_eq!(last.messages.len(), RECENT_MESSAGES);
        assert_eq!(last.messages.last().unwrap().content, "ok");
        assert_eq!(last.messages[RECENT_MESSAGES - 2].content, "msg 11");
        assert_eq!(last.summary, "msg 0");

        let view = svc.get(conv, page(1, 500, PageLimits::MESSAGES)).await;
        assert_eq!(view.meta.total, 24);
    }

    #[tokio::test]
    async fn test_send_with_model_updates_config() {
        let dir = TempDir::new().unwrap();
        let model = FixedReply::new("ok");
        let svc = service(&dir, model.clone());

        svc.send_message(id("m"), "hi".to_string(), Some("o4-mini".to_string()))
            .await
            .unwrap();
        svc.send_message(id("m"), "again".to_string(), None)
            .await
            .unwrap();

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen[0].model, "o4-mini");
        assert_eq!(seen[1].model, "o4-mini");
        drop(seen);

        let view = svc.get(id("m"), page(1, 100, PageLimits::MESSAGES)).await;
        assert_eq!(view.conversation.config.model, "o4-mini");
        assert_eq!(view.conversation.model.as_deref(), Some("o4-mini"));
    }

    #[tokio::test]
    async fn test_send_rejects_empty_content() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedReply::new("ok"));
        let err = svc
            .send_message(id("e"), "   ".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::EmptyContent));
    }

    #[tokio::test]
    async fn test_llm_failure_persists_nothing() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedReply::failing());
        let err = svc
            .send_message(id("f"), "hello".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::Llm(_)));

        let listed = svc.list(page(1, 20, PageLimits::CONVERSATIONS)).await.unwrap();
        assert_eq!(listed.meta.total, 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedReply::new("ok"));
        let path = dir.path().join("bad.json");
        std::fs::write(&path, b"{broken").unwrap();

        let err = svc
            .send_message(id("bad"), "hello".to_string(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::Storage(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"{broken");

        let view = svc.get(id("bad"), page(1, 100, PageLimits::MESSAGES)).await;
        assert!(view.conversation.messages.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_is_fresh_and_not_persisted() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedReply::new("ok"));
        let view = svc.get(id("ghost"), page(1, 100, PageLimits::MESSAGES)).await;
        assert_eq!(view.conversation.conversation_id.as_str(), "ghost");
        assert_eq!(view.conversation.name, "ghost");
        assert_eq!(view.meta.total, 0);
        assert!(!dir.path().join("ghost.json").exists());
    }

    #[tokio::test]
    async fn test_get_paginates_messages() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedReply::new("ok"));
        for i in 0..3 {
            svc.send_message(id("p"), format!("q{i}"), None)
                .await
                .unwrap();
        }
        let view = svc.get(id("p"), page(2, 4, PageLimits::MESSAGES)).await;
        assert_eq!(view.meta.total, 6);
        assert_eq!(view.conversation.messages.len(), 2);
        assert_eq!(view.conversation.messages[0].content, "q2");
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedReply::new("ok"));
        let first = svc.create(Some(id("first")), None).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = svc.create(None, Some("named".to_string())).await.unwrap();
        assert_eq!(second.name, "named");

        let listed = svc.list(page(1, 20, PageLimits::CONVERSATIONS)).await.unwrap();
        assert_eq!(listed.meta.total, 2);
        assert_eq!(listed.data[0], second.conversation_id);
        assert_eq!(listed.data[1], first.conversation_id);

        let paged = svc.list(page(2, 1, PageLimits::CONVERSATIONS)).await.unwrap();
        assert_eq!(paged.data, vec![first.conversation_id]);
    }

    #[tokio::test]
    async fn test_create_refuses_existing() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedReply::new("ok"));
        svc.create(Some(id("dup")), None).await.unwrap();
        let err = svc.create(Some(id("dup")), None).await.unwrap_err();
        assert!(matches!(err, ConversationError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedReply::new("ok"));
        svc.send_message(id("d"), "hi".to_string(), None)
            .await
            .unwrap();

        assert!(svc.delete(id("d")).await.success);
        let again = svc.delete(id("d")).await;
        assert!(!again.success);
        assert_eq!(again.error.as_deref(), Some(NOT_FOUND_MESSAGE));
    }

    #[tokio::test]
    async fn test_set_config() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedReply::new("ok"));

        let missing = svc
            .set_config(id("none"), Map::new())
            .await
            .unwrap();
        assert!(matches!(missing, ConfigOutcome::Missing { .. }));

        svc.create(Some(id("cfg")), None).await.unwrap();
        let raw = json!({"model": "gpt-35-turbo", "max_tokens": 100});
        let updated = svc
            .set_config(id("cfg"), raw.as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(serde_json::to_value(&updated).unwrap(), raw);

        let err = svc
            .set_config(id("cfg"), json!({"model": 5}).as_object().cloned().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ConversationError::InvalidConfig(_)));
        let view = svc.get(id("cfg"), page(1, 100, PageLimits::MESSAGES)).await;
        assert_eq!(view.conversation.config.model, "gpt-35-turbo");
        assert_eq!(view.conversation.model.as_deref(), Some("gpt-35-turbo"));
    }

    #[tokio::test]
    async fn test_concurrent_sends_keep_every_message() {
        let dir = TempDir::new().unwrap();
        let svc = Arc::new(service(&dir, FixedReply::new("ok")));

        let mut handles = Vec::new();
        for i in 0..8 {
            let svc = Arc::clone(&svc);
            handles.push(tokio::spawn(async move {
                svc.send_message(id("busy"), format!("m{i}"), None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let view = svc.get(id("busy"), page(1, 500, PageLimits::MESSAGES)).await;
        assert_eq!(view.meta.total, 16);
    }

    /// Holds its first call until `release` is notified; later calls answer at once.
    #[derive(Default)]
    struct HeldFirstReply {
        calls: AtomicUsize,
        entered: Notify,
        release: Notify,
    }

    impl ChatModel for HeldFirstReply {
        fn backend(&self) -> &'static str {
            "held"
        }

        fn complete<'a>(
            &'a self,
            _request: &'a ChatRequest,
        ) -> LlmFuture<'a, LlmResult<ChatCompletion>> {
            Box::pin(async move {
                if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    self.entered.notify_one();
                    self.release.notified().await;
                }
                Ok(ChatCompletion {
                    text: "ok".to_string(),
                    usage: None,
                })
            })
        }
    }

    #[tokio::test]
    async fn test_sends_queued_behind_delete_share_one_lock() {
        let dir = TempDir::new().unwrap();
        let model = Arc::new(HeldFirstReply::default());
        let svc = Arc::new(service(&dir, model.clone()));

        let first = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.send_message(id("race"), "slow".to_string(), None).await }
        });
        model.entered.notified().await;

        let delete = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.delete(id("race")).await }
        });
        let second = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.send_message(id("race"), "a".to_string(), None).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        model.release.notify_one();
        let third = tokio::spawn({
            let svc = Arc::clone(&svc);
            async move { svc.send_message(id("race"), "b".to_string(), None).await }
        });

        first.await.unwrap().unwrap();
        assert!(delete.await.unwrap().success);
        second.await.unwrap().unwrap();
        third.await.unwrap().unwrap();

        let view = svc.get(id("race"), page(1, 500, PageLimits::MESSAGES)).await;
        assert_eq!(view.meta.total, 4);
        let contents: Vec<&str> = view
            .conversation
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["a", "ok", "b", "ok"]);
        assert!(svc.locks.is_empty());
    }

    #[tokio::test]
    async fn test_locks_are_released_after_each_operation() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir, FixedReply::new("ok"));

        svc.set_config(id("missing"), Map::new()).await.unwrap();
        assert!(svc.locks.is_empty());

        svc.send_message(id("kept"), "hi".to_string(), None)
            .await
            .unwrap();
        svc.create(Some(id("made")), None).await.unwrap();
        svc.create(Some(id("made")), None).await.unwrap_err();
        svc.delete(id("kept")).await;
        svc.delete(id("kept")).await;
        assert!(svc.locks.is_empty());

        let failing = service(&dir, FixedReply::failing());
        failing
            .send_message(id("broken"), "hi".to_string(), None)
            .await
            .unwrap_err();
        assert!(failing.locks.is_empty());
    }
}

//! Property-scoped conversations between a guest and the host.

use tracing::debug;
use ulid::Ulid;

use crate::engine::error::EngineError;
use crate::engine::validate::now_ms;
use crate::engine::Engine;
use crate::limits;
use crate::model::*;

impl Engine {
    /// Open (or reuse) the conversation between `guest` and the property's
    /// host. One conversation per guest/property pair.
    pub async fn open_conversation(
        &self,
        property_id: Ulid,
        guest: Ulid,
    ) -> Result<Ulid, EngineError> {
        let ps = self
            .get_property(&property_id)
            .ok_or(EngineError::NotFound(property_id))?;
        let host = ps.read().await.host;
        if guest == host {
            return Err(EngineError::NotParticipant(guest));
        }

        // Reuse an existing thread for the same pair. Snapshot the handles
        // first so no map shard lock is held across an await.
        let existing: Vec<_> = self
            .conversations
            .iter()
            .map(|e| e.value().clone())
            .collect();
        for convo in existing {
            let guard = convo.read().await;
            if guard.property_id == property_id && guard.is_participant(guest) {
                return Ok(guard.id);
            }
        }

        if self.conversations.len() >= limits::MAX_CONVERSATIONS_PER_TENANT {
            return Err(EngineError::LimitExceeded("conversations per tenant"));
        }

        let id = Ulid::new();
        let event = Event::ConversationOpened {
            id,
            property_id,
            participants: [host, guest],
            created_at: now_ms(),
        };
        self.wal_append(&event).await?;

        let convo = Conversation {
            id,
            property_id,
            participants: [host, guest],
            created_at: now_ms(),
            messages: Vec::new(),
        };
        self.conversations
            .insert(id, std::sync::Arc::new(tokio::sync::RwLock::new(convo)));
        self.notify.send_event(host, &event);

        debug!(%id, %property_id, %guest, "conversation opened");
        Ok(id)
    }

    pub async fn send_message(
        &self,
        conversation_id: Ulid,
        sender: Ulid,
        content: String,
    ) -> Result<Ulid, EngineError> {
        if content.is_empty() || content.len() > limits::MAX_MESSAGE_LEN {
            return Err(EngineError::LimitExceeded("message length"));
        }
        let convo = self
            .conversations
            .get(&conversation_id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(conversation_id))?;
        let mut guard = convo.write().await;

        if !guard.is_participant(sender) {
            return Err(EngineError::NotParticipant(sender));
        }
        if guard.messages.len() >= limits::MAX_MESSAGES_PER_CONVERSATION {
            return Err(EngineError::LimitExceeded("messages per conversation"));
        }

        let message_id = Ulid::new();
        let created_at = now_ms();
        let event = Event::MessageSent {
            id: message_id,
            conversation_id,
            sender,
            content: content.clone(),
            created_at,
        };
        self.wal_append(&event).await?;
        guard.messages.push(Message {
            id: message_id,
            sender,
            content,
            created_at,
        });
        self.notify.send_event(conversation_id, &event);

        metrics::counter!(crate::observability::MESSAGES_SENT_TOTAL).increment(1);
        Ok(message_id)
    }

    /// Messages in send order, visible only to participants.
    pub async fn conversation_messages(
        &self,
        conversation_id: Ulid,
        actor: Ulid,
    ) -> Result<Vec<MessageInfo>, EngineError> {
        let convo = self
            .conversations
            .get(&conversation_id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(conversation_id))?;
        let guard = convo.read().await;

        if !guard.is_participant(actor) {
            return Err(EngineError::NotParticipant(actor));
        }
        Ok(guard
            .messages
            .iter()
            .map(|m| MessageInfo {
                id: m.id,
                conversation_id,
                sender: m.sender,
                content: m.content.clone(),
                created_at: m.created_at,
            })
            .collect())
    }
}

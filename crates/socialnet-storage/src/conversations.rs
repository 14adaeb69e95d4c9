//! Direct-message conversations and their messages.
//!
//! A direct conversation is keyed by the normalized user pair, so both
//! participants resolve to the same conversation regardless of who
//! started it, and two racing starts cannot create two conversations.

use socialnet_types::{
    normalized_pair, ConversationId, DirectMessage, MessageId, Result, SocialnetError, Timestamp,
    UserId,
};

use crate::engine::{allocate, lock, MemoryStore};

/// Conversation storage.
pub trait ConversationStore: Send + Sync {
    /// Returns the direct conversation between `a` and `b`, creating it
    /// if needed.
    fn find_or_create_direct(&self, a: UserId, b: UserId) -> Result<ConversationId>;

    /// Members of the conversation, or `None` if it does not exist.
    fn conversation_members(&self, id: ConversationId) -> Result<Option<Vec<UserId>>>;

    /// Conversations `user` takes part in.
    fn conversations_of(&self, user: UserId) -> Result<Vec<ConversationId>>;

    /// Stores a message in an existing conversation.
    fn create_message(
        &self,
        conversation: ConversationId,
        sender: UserId,
        body: &str,
        now: Timestamp,
    ) -> Result<DirectMessage>;

    /// Latest `limit` messages, oldest first.
    fn messages(&self, conversation: ConversationId, limit: usize) -> Result<Vec<DirectMessage>>;
}

impl ConversationStore for MemoryStore {
    fn find_or_create_direct(&self, a: UserId, b: UserId) -> Result<ConversationId> {
        let mut table = lock(&self.conversations, "conversations")?;
        let pair = normalized_pair(a, b);
        if let Some(id) = table.direct.get(&pair) {
            return Ok(*id);
        }

        let id = ConversationId::new(allocate(&mut table.next_id));
        table.members.insert(id, vec![pair.0, pair.1]);
        table.direct.insert(pair, id);
        Ok(id)
    }

    fn conversation_members(&self, id: ConversationId) -> Result<Option<Vec<UserId>>> {
        Ok(lock(&self.conversations, "conversations")?
            .members
            .get(&id)
            .cloned())
    }

    fn conversations_of(&self, user: UserId) -> Result<Vec<ConversationId>> {
        let table = lock(&self.conversations, "conversations")?;
        Ok(table
            .members
            .iter()
            .filter(|(_, members)| members.contains(&user))
            .map(|(id, _)| *id)
            .collect())
    }

    fn create_message(
        &self,
        conversation: ConversationId,
        sender: UserId,
        body: &str,
        now: Timestamp,
    ) -> Result<DirectMessage> {
        let mut table = lock(&self.conversations, "conversations")?;
        if !table.members.contains_key(&conversation) {
            return Err(SocialnetError::not_found(format!(
                "conversation {conversation}"
            )));
        }
        let id = MessageId::new(allocate(&mut table.next_message_id));
        let message = DirectMessage {
            id,
            conversation_id: conversation,
            sender,
            body: body.to_owned(),
            created_at: now,
        };
        table.messages.insert(id, message.clone());
        Ok(message)
    }

    fn messages(&self, conversation: ConversationId, limit: usize) -> Result<Vec<DirectMessage>> {
        let table = lock(&self.conversations, "conversations")?;
        let mut latest: Vec<DirectMessage> = table
            .messages
            .values()
            .rev()
            .filter(|m| m.conversation_id == conversation)
            .take(limit)
            .cloned()
            .collect();
        drop(table);

        latest.sort_by_key(|m| (m.created_at, m.id));
        Ok(latest)
    }
}

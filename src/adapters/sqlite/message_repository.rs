//! SQLite implementation of the message repositories.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Message, MessageType, UserMessage};
use crate::domain::ports::{MessageRepository, UserMessageRepository};

use super::{parse_timestamp, parse_uuid};

#[derive(Clone)]
pub struct SqliteMessageRepository {
    pool: SqlitePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn load_read_by(&self, message_id: Uuid) -> DomainResult<Vec<Uuid>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT stack_id FROM message_reads WHERE message_id = ?")
                .bind(message_id.to_string())
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(|(s,)| parse_uuid(s)).collect()
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    from_stack_id: Option<String>,
    to_stack_id: Option<String>,
    message_type: String,
    content: String,
    created_at: String,
}

impl TryFrom<MessageRow> for Message {
    type Error = DomainError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: parse_uuid(&row.id)?,
            from_stack_id: row.from_stack_id.as_deref().map(parse_uuid).transpose()?,
            to_stack_id: row.to_stack_id.as_deref().map(parse_uuid).transpose()?,
            message_type: MessageType::from_str(&row.message_type).ok_or_else(|| {
                DomainError::ValidationFailed(format!("bad message type: {}", row.message_type))
            })?,
            content: row.content,
            read_by: Vec::new(),
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

#[async_trait]
impl MessageRepository for SqliteMessageRepository {
    async fn create(&self, message: &Message) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO messages (id, from_stack_id, to_stack_id, message_type,
               content, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.from_stack_id.map(|id| id.to_string()))
        .bind(message.to_stack_id.map(|id| id.to_string()))
        .bind(message.message_type.as_str())
        .bind(&message.content)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Message>> {
        let row: Option<MessageRow> = sqlx::query_as("SELECT * FROM messages WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let mut message = Message::try_from(row)?;
                message.read_by = self.load_read_by(message.id).await?;
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    async fn unread_for_stack(&self, stack_id: Uuid) -> DomainResult<Vec<Message>> {
        // Addressed to this stack, or broadcast; never the stack's own
        // messages; skip anything already in the read set.
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"SELECT m.* FROM messages m
               WHERE (m.to_stack_id = ?1 OR (m.to_stack_id IS NULL AND m.message_type = 'broadcast'))
                 AND (m.from_stack_id IS NULL OR m.from_stack_id != ?1)
                 AND NOT EXISTS (
                     SELECT 1 FROM message_reads r
                     WHERE r.message_id = m.id AND r.stack_id = ?1
                 )
               ORDER BY m.created_at"#,
        )
        .bind(stack_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::new();
        for row in rows {
            let mut message = Message::try_from(row)?;
            message.read_by = self.load_read_by(message.id).await?;
            messages.push(message);
        }
        Ok(messages)
    }

    async fn mark_read(&self, message_id: Uuid, stack_id: Uuid) -> DomainResult<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO message_reads (message_id, stack_id, read_at) VALUES (?, ?, ?)",
        )
        .bind(message_id.to_string())
        .bind(stack_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_direct_to(&self, stack_id: Uuid, limit: usize) -> DomainResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"SELECT * FROM messages WHERE to_stack_id = ? AND message_type = 'direct'
               ORDER BY created_at DESC LIMIT ?"#,
        )
        .bind(stack_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }
}

#[derive(Clone)]
pub struct SqliteUserMessageRepository {
    pool: SqlitePool,
}

impl SqliteUserMessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct UserMessageRow {
    id: String,
    team_id: String,
    sender_name: String,
    content: String,
    sent_at: String,
    processed: bool,
    response_id: Option<String>,
}

impl TryFrom<UserMessageRow> for UserMessage {
    type Error = DomainError;

    fn try_from(row: UserMessageRow) -> Result<Self, Self::Error> {
        Ok(UserMessage {
            id: parse_uuid(&row.id)?,
            team_id: parse_uuid(&row.team_id)?,
            sender_name: row.sender_name,
            content: row.content,
            sent_at: parse_timestamp(&row.sent_at)?,
            processed: row.processed,
            response_id: row.response_id.as_deref().map(parse_uuid).transpose()?,
        })
    }
}

#[async_trait]
impl UserMessageRepository for SqliteUserMessageRepository {
    async fn create(&self, message: &UserMessage) -> DomainResult<()> {
        sqlx::query(
            r#"INSERT INTO user_messages (id, team_id, sender_name, content,
               sent_at, processed, response_id)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.team_id.to_string())
        .bind(&message.sender_name)
        .bind(&message.content)
        .bind(message.sent_at.to_rfc3339())
        .bind(message.processed)
        .bind(message.response_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<UserMessage>> {
        let row: Option<UserMessageRow> =
            sqlx::query_as("SELECT * FROM user_messages WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(UserMessage::try_from).transpose()
    }

    async fn list_unprocessed(&self, team_id: Uuid) -> DomainResult<Vec<UserMessage>> {
        let rows: Vec<UserMessageRow> = sqlx::query_as(
            r#"SELECT * FROM user_messages WHERE team_id = ? AND processed = 0
               ORDER BY sent_at"#,
        )
        .bind(team_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserMessage::try_from).collect()
    }

    async fn mark_processed(&self, id: Uuid, response_id: Uuid) -> DomainResult<()> {
        let result = sqlx::query(
            "UPDATE user_messages SET processed = 1, response_id = ? WHERE id = ?",
        )
        .bind(response_id.to_string())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::MessageNotFound(id));
        }
        Ok(())
    }

    async fn history(&self, team_id: Uuid, limit: usize) -> DomainResult<Vec<UserMessage>> {
        let rows: Vec<UserMessageRow> = sqlx::query_as(
            r#"SELECT * FROM (
                   SELECT * FROM user_messages WHERE team_id = ?
                   ORDER BY sent_at DESC LIMIT ?
               ) ORDER BY sent_at"#,
        )
        .bind(team_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UserMessage::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_seeded_test_pool, SqliteStackRepository};
    use crate::domain::models::Stack;
    use crate::domain::ports::StackRepository;

    async fn setup() -> (SqliteMessageRepository, SqliteUserMessageRepository, Uuid, Uuid) {
        let pool = create_seeded_test_pool().await.unwrap();
        let stacks = SqliteStackRepository::new(pool.clone());
        let a = Stack::new("A");
        let b = Stack::new("B");
        stacks.create(&a).await.unwrap();
        stacks.create(&b).await.unwrap();
        (
            SqliteMessageRepository::new(pool.clone()),
            SqliteUserMessageRepository::new(pool),
            a.id,
            b.id,
        )
    }

    #[tokio::test]
    async fn test_unread_excludes_own_and_read() {
        let (messages, _, a, b) = setup().await;

        let own_broadcast = Message::broadcast(a, "from me");
        let peer_broadcast = Message::broadcast(b, "from peer");
        let direct = Message::direct(b, a, "hey A");
        messages.create(&own_broadcast).await.unwrap();
        messages.create(&peer_broadcast).await.unwrap();
        messages.create(&direct).await.unwrap();

        let unread = messages.unread_for_stack(a).await.unwrap();
        let ids: Vec<Uuid> = unread.iter().map(|m| m.id).collect();
        assert!(ids.contains(&peer_broadcast.id));
        assert!(ids.contains(&direct.id));
        assert!(!ids.contains(&own_broadcast.id));

        messages.mark_read(peer_broadcast.id, a).await.unwrap();
        let unread = messages.unread_for_stack(a).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].id, direct.id);
    }

    #[tokio::test]
    async fn test_mark_read_idempotent() {
        let (messages, _, a, b) = setup().await;
        let msg = Message::direct(b, a, "hello");
        messages.create(&msg).await.unwrap();

        messages.mark_read(msg.id, a).await.unwrap();
        messages.mark_read(msg.id, a).await.unwrap();

        let loaded = messages.get(msg.id).await.unwrap().unwrap();
        assert_eq!(loaded.read_by, vec![a]);
    }

    #[tokio::test]
    async fn test_user_message_processing() {
        let (_, user_messages, a, _) = setup().await;
        let mut older = UserMessage::new(a, "Alice", "can you add dark mode?");
        older.sent_at = Utc::now() - chrono::Duration::seconds(30);
        let newer = UserMessage::new(a, "Bob", "looks great!");
        user_messages.create(&older).await.unwrap();
        user_messages.create(&newer).await.unwrap();

        let unprocessed = user_messages.list_unprocessed(a).await.unwrap();
        assert_eq!(unprocessed.len(), 2);
        assert_eq!(unprocessed[0].sender_name, "Alice");

        let response_id = Uuid::new_v4();
        user_messages.mark_processed(older.id, response_id).await.unwrap();

        let unprocessed = user_messages.list_unprocessed(a).await.unwrap();
        assert_eq!(unprocessed.len(), 1);
        assert_eq!(unprocessed[0].sender_name, "Bob");

        let loaded = user_messages.get(older.id).await.unwrap().unwrap();
        assert!(loaded.processed);
        assert_eq!(loaded.response_id, Some(response_id));
    }
}

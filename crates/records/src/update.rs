//! Partial UPDATE composition for chat rows.
//!
//! Column names come from a closed enum and every value is emitted as a bind
//! placeholder, so no caller-supplied text ever reaches the SQL string.

use chatkeep_core::PresignedUrl;
use std::fmt::Write as _;
use time::OffsetDateTime;

/// Updatable chat columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatColumn {
    Name,
    Description,
    AvatarKey,
    ImageUrl,
    ImageExpireAt,
}

impl ChatColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::AvatarKey => "avatar_key",
            Self::ImageUrl => "image_url",
            Self::ImageExpireAt => "image_expire_at",
        }
    }
}

/// A value bound to one SET assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateValue {
    Text(String),
    Timestamp(OffsetDateTime),
}

/// Bind placeholder dialect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placeholder {
    /// PostgreSQL: `$1`, `$2`, ...
    Numbered,
    /// SQLite: `?`
    Positional,
}

impl Placeholder {
    fn write(self, sql: &mut String, index: usize) {
        match self {
            // Writing to a String cannot fail.
            Self::Numbered => {
                let _ = write!(sql, "${index}");
            }
            Self::Positional => sql.push('?'),
        }
    }
}

/// A rendered statement: SQL text plus the SET values in bind order.
///
/// The scope parameters (chat id, then owner id) follow the SET values and
/// are bound by the caller with their backend-specific types.
#[derive(Debug, PartialEq, Eq)]
pub struct UpdateStatement {
    pub sql: String,
    pub values: Vec<UpdateValue>,
}

/// Accumulates `(column, value)` assignments for an owner-scoped chat UPDATE.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChatUpdate {
    assignments: Vec<(ChatColumn, UpdateValue)>,
}

impl ChatUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(self, name: impl Into<String>) -> Self {
        self.set(ChatColumn::Name, UpdateValue::Text(name.into()))
    }

    pub fn description(self, description: impl Into<String>) -> Self {
        self.set(ChatColumn::Description, UpdateValue::Text(description.into()))
    }

    /// Point the chat at a new avatar object and its freshly issued URL.
    pub fn image(self, avatar_key: impl Into<String>, image: &PresignedUrl) -> Self {
        self.set(ChatColumn::AvatarKey, UpdateValue::Text(avatar_key.into()))
            .set(ChatColumn::ImageUrl, UpdateValue::Text(image.url.clone()))
            .set(
                ChatColumn::ImageExpireAt,
                UpdateValue::Timestamp(image.expire_at),
            )
    }

    /// Set a column, replacing any earlier assignment to it.
    pub fn set(mut self, column: ChatColumn, value: UpdateValue) -> Self {
        match self.assignments.iter_mut().find(|(c, _)| *c == column) {
            Some(existing) => existing.1 = value,
            None => self.assignments.push((column, value)),
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    pub fn assignments(&self) -> &[(ChatColumn, UpdateValue)] {
        &self.assignments
    }

    /// Render `UPDATE chats SET ... WHERE id = ? AND owner_id = ?`.
    ///
    /// Returns `None` when there is nothing to set.
    pub fn render(&self, placeholder: Placeholder) -> Option<UpdateStatement> {
        if self.assignments.is_empty() {
            return None;
        }

        let mut sql = String::from("UPDATE chats SET ");
        for (index, (column, _)) in self.assignments.iter().enumerate() {
            if index > 0 {
                sql.push_str(", ");
            }
            sql.push_str(column.as_str());
            sql.push_str(" = ");
            placeholder.write(&mut sql, index + 1);
        }

        let next = self.assignments.len() + 1;
        sql.push_str(" WHERE id = ");
        placeholder.write(&mut sql, next);
        sql.push_str(" AND owner_id = ");
        placeholder.write(&mut sql, next + 1);

        Some(UpdateStatement {
            sql,
            values: self.assignments.iter().map(|(_, v)| v.clone()).collect(),
        })
    }
}

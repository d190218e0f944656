//! Wire form of the scalar snapshot record.

use chatkeep_core::ChatSnapshot;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Scalar snapshot fields as stored under `chat:{id}`. Participants live in
/// their own list key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CachedChat {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub owner_id: String,
    pub avatar_key: String,
    pub image_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub image_expire_at: OffsetDateTime,
}

impl From<&ChatSnapshot> for CachedChat {
    fn from(snapshot: &ChatSnapshot) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name.clone(),
            description: snapshot.description.clone(),
            owner_id: snapshot.owner_id.clone(),
            avatar_key: snapshot.avatar_key.clone(),
            image_url: snapshot.image_url.clone(),
            image_expire_at: snapshot.image_expire_at,
        }
    }
}

impl CachedChat {
    pub fn into_snapshot(self, participant_ids: Vec<String>) -> ChatSnapshot {
        ChatSnapshot {
            id: self.id,
            name: self.name,
            description: self.description,
            owner_id: self.owner_id,
            avatar_key: self.avatar_key,
            image_url: self.image_url,
            image_expire_at: self.image_expire_at,
            participant_ids,
        }
    }
}

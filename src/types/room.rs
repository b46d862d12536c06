use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

/// Identifier of a chat room.
pub type RoomId = i64;

/// A chat context bound to one or more uploaded documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    /// Backend room id.
    pub id: RoomId,

    /// Title, usually the name of the first uploaded document.
    pub title: String,

    /// Creation time in the backend's local clock.
    #[serde(
        default,
        with = "crate::utils::time",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<PrimitiveDateTime>,
}

impl Room {
    /// Create a room with no creation time.
    pub fn new(id: RoomId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            created_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn room_with_created_at() {
        let room: Room = serde_json::from_value(json!({
            "id": 3,
            "title": "report.pdf",
            "createdAt": "2024-05-01T09:30:15.5"
        }))
        .unwrap();
        assert_eq!(room.id, 3);
        assert_eq!(room.title, "report.pdf");
        assert_eq!(room.created_at.map(|t| t.minute()), Some(30));
    }

    #[test]
    fn room_without_created_at() {
        let room: Room = serde_json::from_value(json!({"id": 4, "title": "x.pdf"})).unwrap();
        assert_eq!(room, Room::new(4, "x.pdf"));

        let room: Room =
            serde_json::from_value(json!({"id": 4, "title": "x.pdf", "createdAt": null})).unwrap();
        assert!(room.created_at.is_none());
    }

    #[test]
    fn room_serializes_without_missing_time() {
        let value = serde_json::to_value(Room::new(1, "a.pdf")).unwrap();
        assert_eq!(value, json!({"id": 1, "title": "a.pdf"}));
    }
}

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ChatError;

use super::participant::{GenderFilter, JoinRequest, ParticipantId, UserSummary};
use super::relay::{MessageEvent, SendMessage};
use super::session::RoomId;

/// Frames a client may send, `{"event": "...", "data": {...}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Join(JoinRequest),
    FindPartner {
        #[serde(default)]
        desired_filter: GenderFilter,
    },
    CancelSearch,
    SendMessage(SendMessage),
    Leave,
    StartChat {
        target_id: ParticipantId,
    },
    RequestUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKind {
    Turn,
    Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Registered {
        id: ParticipantId,
        name: String,
    },
    Waiting,
    Paired {
        room_id: RoomId,
        partner_name: String,
    },
    Message(MessageEvent),
    LimitReached {
        kind: LimitKind,
    },
    PartnerDisconnected {
        room_id: RoomId,
    },
    Users {
        users: Arc<[UserSummary]>,
    },
    Error {
        reason: String,
    },
}

impl From<ChatError> for ServerEvent {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::TurnLimitExceeded => ServerEvent::LimitReached { kind: LimitKind::Turn },
            ChatError::RateLimited => ServerEvent::LimitReached { kind: LimitKind::Rate },
            // storage details stay in the logs
            ChatError::Internal(_) => ServerEvent::Error {
                reason: "internal error".to_owned(),
            },
            err => ServerEvent::Error {
                reason: err.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_join() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "join",
            "data": { "displayName": "owl", "gender": "female" }
        }))
        .unwrap();
        let ClientEvent::Join(join) = event else {
            panic!("expected join, got {event:?}");
        };
        assert_eq!(join.display_name.as_deref(), Some("owl"));
        assert_eq!(join.gender.as_deref(), Some("female"));
        assert_eq!(join.is_guest, None);
    }

    #[test]
    fn parses_unit_events_without_data() {
        let event: ClientEvent = serde_json::from_value(json!({ "event": "cancel-search" })).unwrap();
        assert!(matches!(event, ClientEvent::CancelSearch));
        let event: ClientEvent = serde_json::from_value(json!({ "event": "leave" })).unwrap();
        assert!(matches!(event, ClientEvent::Leave));
    }

    #[test]
    fn parses_find_partner_filter() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "find-partner",
            "data": { "desiredFilter": "other" }
        }))
        .unwrap();
        assert!(matches!(event, ClientEvent::FindPartner { desired_filter: GenderFilter::Other }));

        let bad = serde_json::from_value::<ClientEvent>(json!({
            "event": "find-partner",
            "data": { "desiredFilter": "robots" }
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn unknown_event_is_rejected() {
        assert!(serde_json::from_value::<ClientEvent>(json!({ "event": "shout" })).is_err());
    }

    #[test]
    fn serializes_tagged() {
        let event = ServerEvent::LimitReached { kind: LimitKind::Turn };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({ "event": "limit-reached", "data": { "kind": "turn" } })
        );
        assert_eq!(serde_json::to_value(&ServerEvent::Waiting).unwrap(), json!({ "event": "waiting" }));
    }

    #[test]
    fn errors_map_to_sender_events() {
        assert_eq!(
            ServerEvent::from(ChatError::RateLimited),
            ServerEvent::LimitReached { kind: LimitKind::Rate }
        );
        assert_eq!(
            ServerEvent::from(ChatError::NotFound("room")),
            ServerEvent::Error { reason: "room not found".to_owned() }
        );
        assert_eq!(
            ServerEvent::from(ChatError::Internal("disk on fire".to_owned())),
            ServerEvent::Error { reason: "internal error".to_owned() }
        );
    }
}

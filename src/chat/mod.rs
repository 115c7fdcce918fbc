mod events;
mod hub;
mod journal;
mod participant;
mod queue;
mod rate_limit;
mod registry;
mod relay;
mod session;
mod turn;
mod ws;

use axum::{Router, routing::get};

use crate::AppState;

pub use events::{ClientEvent, LimitKind, ServerEvent};
pub use hub::{Delivery, Hub, OUTBOX_CAPACITY, Outbox, Stats};
pub use journal::{Journal, Write};
pub use participant::{ConnId, Gender, GenderFilter, JoinRequest, Participant, ParticipantId, Profile, UserSummary};
pub use queue::{Entry, MatchQueue};
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use registry::Registry;
pub use relay::{ContentPolicy, MessageEvent, SendMessage};
pub use session::{Room, RoomId, Sessions};
pub use turn::{TurnPhase, TurnState};
pub use ws::{handle_disconnect, handle_event};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::chat_ws))
}

//! The in-memory chat core: who is connected, who is waiting, who is talking
//! to whom.
//!
//! Registry, queue, rooms and outboxes sit behind one mutex. Every operation
//! takes it once, does its map work and event fan-out, and lets go; nothing
//! under the lock awaits or touches storage. That makes "take a waiting entry
//! and open a room" a single step, and serializes a relay's refill of the
//! partner's turn state with the partner's own sends.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::error::{ChatError, ChatResult};

use super::events::ServerEvent;
use super::participant::{ConnId, GenderFilter, JoinRequest, Participant, ParticipantId, UserSummary};
use super::queue::{Entry, MatchQueue};
use super::rate_limit::{RateLimitConfig, RateLimiter};
use super::registry::Registry;
use super::relay::{ContentPolicy, MessageEvent, SendMessage};
use super::session::{RoomId, Sessions};

/// Events queued per connection before further events to it are dropped.
pub const OUTBOX_CAPACITY: usize = 64;

pub type Outbox = mpsc::Sender<ServerEvent>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub online: usize,
    pub waiting: usize,
    pub rooms: usize,
    pub in_rooms: usize,
}

/// A message that made it into a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub event: MessageEvent,
    pub recipient: ParticipantId,
}

#[derive(Default)]
struct Core {
    registry: Registry,
    queue: MatchQueue,
    sessions: Sessions,
    outboxes: HashMap<ConnId, Outbox>,
}

impl Core {
    /// Best effort: a full, closed or missing outbox drops the event.
    fn deliver(&self, conn: ConnId, event: ServerEvent) -> bool {
        let Some(outbox) = self.outboxes.get(&conn) else {
            return false;
        };
        match outbox.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(%conn, "outbox full, event dropped");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    fn deliver_to(&self, participant: ParticipantId, event: ServerEvent) -> bool {
        match self.registry.conn_of(participant) {
            Some(conn) => self.deliver(conn, event),
            None => false,
        }
    }

    fn participant_of(&self, conn: ConnId) -> ChatResult<&Participant> {
        self.registry.lookup(conn).ok_or(ChatError::NotFound("participant"))
    }

    fn set_filter(&mut self, participant: ParticipantId, filter: Option<GenderFilter>) {
        if let Some(p) = self.registry.participant_mut(participant) {
            p.filter = filter;
        }
    }

    /// Destroys the participant's room, if any, and tells the partner.
    fn close_room_of(&mut self, participant: ParticipantId) -> Option<RoomId> {
        let id = self.sessions.room_of(participant)?.id;
        let room = self.sessions.destroy_room(id)?;
        if let Some(partner) = room.partner_of(participant) {
            self.deliver_to(partner, ServerEvent::PartnerDisconnected { room_id: id });
        }
        info!(room = %id, %participant, direct = room.direct, "room closed");
        Some(id)
    }

    fn users(&self) -> Arc<[UserSummary]> {
        let mut users: Vec<UserSummary> = self.registry.iter().map(|(_, p)| p.into()).collect();
        users.sort_by_key(|u| (u.joined_at, u.id));
        users.into()
    }

    /// One list, shared by every recipient.
    fn broadcast_users(&self) {
        let users = self.users();
        for (conn, _) in self.registry.iter() {
            self.deliver(conn, ServerEvent::Users { users: users.clone() });
        }
    }
}

pub struct Hub {
    core: Mutex<Core>,
    limiter: RateLimiter,
    policy: ContentPolicy,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(RateLimitConfig::default(), ContentPolicy::default())
    }
}

impl Hub {
    pub fn new(limits: RateLimitConfig, policy: ContentPolicy) -> Self {
        Self {
            core: Mutex::new(Core::default()),
            limiter: RateLimiter::new(limits),
            policy,
        }
    }

    /// Attaches the channel events for `conn` are written to.
    pub fn connect(&self, conn: ConnId, outbox: Outbox) {
        self.core.lock().outboxes.insert(conn, outbox);
        debug!(%conn, "connection attached");
    }

    pub fn send_to(&self, conn: ConnId, event: ServerEvent) -> bool {
        self.core.lock().deliver(conn, event)
    }

    pub fn join(&self, conn: ConnId, request: JoinRequest) -> ChatResult<Participant> {
        let profile = request.validate()?;

        let mut core = self.core.lock();
        let (participant, replaced) = core.registry.register(conn, profile);
        if let Some(old) = replaced {
            core.queue.remove(old.id);
            core.close_room_of(old.id);
            self.limiter.forget(old.id);
            debug!(%conn, old = %old.id, "connection re-registered");
        }

        core.deliver(
            conn,
            ServerEvent::Registered {
                id: participant.id,
                name: participant.name.clone(),
            },
        );
        core.broadcast_users();

        info!(%conn, participant = %participant.id, name = %participant.name, "joined");
        Ok(participant)
    }

    /// Pairs the caller with the oldest compatible waiting participant, or
    /// queues the caller. Returns the new room, if one was opened.
    pub fn find_partner(&self, conn: ConnId, filter: GenderFilter) -> ChatResult<Option<RoomId>> {
        let mut core = self.core.lock();
        let me = core.participant_of(conn)?;
        let entry = Entry {
            participant: me.id,
            gender: me.gender,
            filter,
        };
        let my_name = me.name.clone();

        if core.sessions.room_of(entry.participant).is_some() {
            return Err(ChatError::Validation("already in a room".to_owned()));
        }

        // a repeated request replaces the old entry
        core.queue.remove(entry.participant);

        let Some(candidate) = core.queue.take_match(&entry) else {
            core.queue.enqueue(entry);
            core.set_filter(entry.participant, Some(filter));
            core.deliver(conn, ServerEvent::Waiting);
            debug!(participant = %entry.participant, ?filter, waiting = core.queue.len(), "queued");
            return Ok(None);
        };

        let room_id = core
            .sessions
            .create_room(candidate.participant, entry.participant, false)?
            .id;
        core.set_filter(entry.participant, None);
        core.set_filter(candidate.participant, None);

        let candidate_name = core
            .registry
            .participant(candidate.participant)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        core.deliver_to(
            candidate.participant,
            ServerEvent::Paired {
                room_id,
                partner_name: my_name,
            },
        );
        core.deliver(
            conn,
            ServerEvent::Paired {
                room_id,
                partner_name: candidate_name,
            },
        );

        info!(room = %room_id, a = %candidate.participant, b = %entry.participant, direct = false, "paired");
        Ok(Some(room_id))
    }

    pub fn cancel_search(&self, conn: ConnId) -> bool {
        let mut core = self.core.lock();
        let Some(participant) = core.registry.lookup_mut(conn) else {
            return false;
        };
        participant.filter = None;
        let id = participant.id;
        core.queue.remove(id)
    }

    /// Opens a room with a specific online participant, skipping the queue.
    pub fn start_chat(&self, conn: ConnId, target: ParticipantId) -> ChatResult<RoomId> {
        let mut core = self.core.lock();
        let me = core.participant_of(conn)?;
        let (my_id, my_name) = (me.id, me.name.clone());

        let target_name = core
            .registry
            .participant(target)
            .map(|p| p.name.clone())
            .ok_or(ChatError::NotFound("participant"))?;

        let room = core.sessions.create_room(my_id, target, true)?;
        let (room_id, direct) = (room.id, room.direct);
        for id in [my_id, target] {
            core.queue.remove(id);
            core.set_filter(id, None);
        }

        core.deliver(
            conn,
            ServerEvent::Paired {
                room_id,
                partner_name: target_name,
            },
        );
        core.deliver_to(
            target,
            ServerEvent::Paired {
                room_id,
                partner_name: my_name,
            },
        );

        info!(room = %room_id, a = %my_id, b = %target, direct, "paired");
        Ok(room_id)
    }

    /// Relays a message to both room members.
    ///
    /// Gates, first failure wins: membership, global rate, turn, content.
    pub fn send_message(&self, conn: ConnId, message: SendMessage) -> ChatResult<Delivery> {
        let mut core = self.core.lock();
        let sender = core.participant_of(conn)?;
        let (sender_id, sender_name) = (sender.id, sender.name.clone());

        let room = core
            .sessions
            .get_room(message.room_id)
            .filter(|room| room.contains(sender_id))
            .ok_or(ChatError::NotFound("room"))?;

        if !self.limiter.check_and_increment(sender_id) {
            return Err(ChatError::RateLimited);
        }

        room.check_turn(sender_id)?;
        let (text, image_ref) = self.policy.check(message.text, message.image_ref)?;

        let room = core
            .sessions
            .get_room_mut(message.room_id)
            .ok_or(ChatError::NotFound("room"))?;
        room.record_send(sender_id)?;
        let participants = room.participants;
        let recipient = room.partner_of(sender_id).ok_or(ChatError::NotFound("room"))?;

        let event = MessageEvent {
            room_id: message.room_id,
            sender_id,
            sender_name,
            text,
            image_ref,
            timestamp: OffsetDateTime::now_utc(),
        };
        for participant in participants {
            core.deliver_to(participant, ServerEvent::Message(event.clone()));
        }

        debug!(room = %message.room_id, sender = %sender_id, "message relayed");
        Ok(Delivery { event, recipient })
    }

    /// Leaves the current room (and the queue) but stays registered.
    pub fn leave(&self, conn: ConnId) -> ChatResult<Option<RoomId>> {
        let mut core = self.core.lock();
        let id = core.participant_of(conn)?.id;
        core.queue.remove(id);
        core.set_filter(id, None);
        Ok(core.close_room_of(id))
    }

    /// Unwinds everything `conn` owned. Returns the participant it was
    /// registered as, marked offline, the first time only.
    pub fn disconnect(&self, conn: ConnId) -> Option<Participant> {
        let mut core = self.core.lock();
        core.outboxes.remove(&conn);

        let mut participant = core.registry.remove(conn)?;
        participant.online = false;
        participant.last_seen = OffsetDateTime::now_utc();
        participant.filter = None;

        core.queue.remove(participant.id);
        core.close_room_of(participant.id);
        self.limiter.forget(participant.id);
        core.broadcast_users();

        info!(%conn, participant = %participant.id, "disconnected");
        Some(participant)
    }

    pub fn request_users(&self, conn: ConnId) -> ChatResult<()> {
        let core = self.core.lock();
        core.participant_of(conn)?;
        core.deliver(conn, ServerEvent::Users { users: core.users() });
        Ok(())
    }

    pub fn users(&self) -> Arc<[UserSummary]> {
        self.core.lock().users()
    }

    pub fn room_of(&self, participant: ParticipantId) -> Option<RoomId> {
        self.core.lock().sessions.room_of(participant).map(|r| r.id)
    }

    pub fn is_waiting(&self, participant: ParticipantId) -> bool {
        self.core.lock().queue.contains(participant)
    }

    pub fn stats(&self) -> Stats {
        let core = self.core.lock();
        Stats {
            online: core.registry.len(),
            waiting: core.queue.len(),
            rooms: core.sessions.len(),
            in_rooms: core.sessions.participant_count(),
        }
    }

    pub fn purge_rate_limits(&self) {
        self.limiter.purge_expired(Instant::now());
    }
}

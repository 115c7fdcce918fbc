use std::collections::HashMap;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{ChatError, ChatResult};

use super::participant::ParticipantId;
use super::turn::TurnState;

pub type RoomId = Uuid;

#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub participants: [ParticipantId; 2],
    pub created_at: OffsetDateTime,
    /// Opened through `start-chat` rather than the queue.
    pub direct: bool,
    turns: [TurnState; 2],
}

impl Room {
    fn new(a: ParticipantId, b: ParticipantId, direct: bool) -> Self {
        Self {
            id: Uuid::now_v7(),
            participants: [a, b],
            created_at: OffsetDateTime::now_utc(),
            direct,
            turns: [TurnState::default(); 2],
        }
    }

    fn index_of(&self, participant: ParticipantId) -> Option<usize> {
        self.participants.iter().position(|p| *p == participant)
    }

    pub fn contains(&self, participant: ParticipantId) -> bool {
        self.index_of(participant).is_some()
    }

    pub fn partner_of(&self, participant: ParticipantId) -> Option<ParticipantId> {
        let index = self.index_of(participant)?;
        Some(self.participants[1 - index])
    }

    pub fn turn(&self, participant: ParticipantId) -> Option<&TurnState> {
        self.index_of(participant).map(|i| &self.turns[i])
    }

    /// Checks `sender` is still allowed to talk without touching any state.
    pub fn check_turn(&self, sender: ParticipantId) -> ChatResult<()> {
        let mut turn = *self.turn(sender).ok_or(ChatError::NotFound("room"))?;
        turn.on_send()
    }

    /// Spends one of the sender's credits and refills the partner's.
    pub fn record_send(&mut self, sender: ParticipantId) -> ChatResult<()> {
        let index = self.index_of(sender).ok_or(ChatError::NotFound("room"))?;
        self.turns[index].on_send()?;
        self.turns[1 - index].on_receive();
        Ok(())
    }
}

/// Live rooms plus the participant → room index.
#[derive(Debug, Default)]
pub struct Sessions {
    rooms: HashMap<RoomId, Room>,
    room_of: HashMap<ParticipantId, RoomId>,
}

impl Sessions {
    pub fn create_room(&mut self, a: ParticipantId, b: ParticipantId, direct: bool) -> ChatResult<&Room> {
        if a == b {
            return Err(ChatError::Validation("cannot chat with yourself".to_owned()));
        }
        if self.room_of.contains_key(&a) || self.room_of.contains_key(&b) {
            return Err(ChatError::Validation("already in a room".to_owned()));
        }

        let room = Room::new(a, b, direct);
        let id = room.id;
        self.room_of.insert(a, id);
        self.room_of.insert(b, id);
        Ok(self.rooms.entry(id).or_insert(room))
    }

    pub fn get_room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn get_room_mut(&mut self, id: RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(&id)
    }

    pub fn room_of(&self, participant: ParticipantId) -> Option<&Room> {
        self.room_of.get(&participant).and_then(|id| self.rooms.get(id))
    }

    /// Removes the room and both index entries. Returns the destroyed room.
    pub fn destroy_room(&mut self, id: RoomId) -> Option<Room> {
        let room = self.rooms.remove(&id)?;
        for participant in room.participants {
            self.room_of.remove(&participant);
        }
        Some(room)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn participant_count(&self) -> usize {
        self.room_of.len()
    }
}

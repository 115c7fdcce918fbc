use std::collections::HashMap;

use super::participant::{ConnId, Participant, ParticipantId, Profile};

/// Live connections and the participant each one registered as.
#[derive(Debug, Default)]
pub struct Registry {
    by_conn: HashMap<ConnId, Participant>,
    conn_of: HashMap<ParticipantId, ConnId>,
}

impl Registry {
    /// Registers `conn` as a fresh participant.
    ///
    /// Returns the new participant and, when the connection had already
    /// registered, the participant it replaces. The caller is responsible for
    /// unwinding whatever queue entry or room the replaced one held.
    pub fn register(&mut self, conn: ConnId, profile: Profile) -> (Participant, Option<Participant>) {
        let replaced = self.remove(conn);
        let participant = Participant::new(profile);
        self.conn_of.insert(participant.id, conn);
        self.by_conn.insert(conn, participant.clone());
        (participant, replaced)
    }

    pub fn lookup(&self, conn: ConnId) -> Option<&Participant> {
        self.by_conn.get(&conn)
    }

    pub fn lookup_mut(&mut self, conn: ConnId) -> Option<&mut Participant> {
        self.by_conn.get_mut(&conn)
    }

    pub fn conn_of(&self, id: ParticipantId) -> Option<ConnId> {
        self.conn_of.get(&id).copied()
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&Participant> {
        self.conn_of(id).and_then(|conn| self.by_conn.get(&conn))
    }

    pub fn participant_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        let conn = self.conn_of(id)?;
        self.by_conn.get_mut(&conn)
    }

    pub fn remove(&mut self, conn: ConnId) -> Option<Participant> {
        let participant = self.by_conn.remove(&conn)?;
        self.conn_of.remove(&participant.id);
        Some(participant)
    }

    pub fn len(&self) -> usize {
        self.by_conn.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_conn.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConnId, &Participant)> {
        self.by_conn.iter().map(|(conn, p)| (*conn, p))
    }
}

//! Room storage. The game loop only talks to rooms through
//! [`RoomRepository`]; [`InMemoryRooms`] keeps them in a map keyed by code.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::room::{ConnId, Room};

/// Characters room codes are drawn from (no I, O, 0 or 1).
pub const ROOM_CODE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ROOM_CODE_LEN: usize = 4;

/// Why a create or join was refused. The text is what the requester sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("Room not found")]
    NotFound,
    #[error("Room is full")]
    Full,
    #[error("Already in a room")]
    AlreadyInRoom,
}

pub trait RoomRepository {
    /// Open a room hosted by `host` and return its code.
    fn create(&mut self, host: ConnId, now: Instant) -> Result<String, JoinError>;
    /// Seat `guest` in the room. A failed join leaves every room untouched.
    fn join(&mut self, code: &str, guest: ConnId, now: Instant) -> Result<&mut Room, JoinError>;
    fn find(&self, code: &str) -> Option<&Room>;
    fn find_mut(&mut self, code: &str) -> Option<&mut Room>;
    /// Code of the room `conn` occupies.
    fn room_of(&self, conn: ConnId) -> Option<String>;
    fn delete(&mut self, code: &str) -> Option<Room>;
    /// Remove and return rooms idle for at least `idle_timeout`.
    fn sweep_expired(&mut self, now: Instant, idle_timeout: Duration) -> Vec<Room>;
    fn codes(&self) -> Vec<String>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct InMemoryRooms {
    rooms: HashMap<String, Room>,
    members: HashMap<ConnId, String>,
    rng: ChaCha8Rng,
}

impl InMemoryRooms {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            rooms: HashMap::new(),
            members: HashMap::new(),
            rng,
        }
    }

    fn generate_code(&mut self) -> String {
        loop {
            let code: String = (0..ROOM_CODE_LEN)
                .map(|_| {
                    let i = self.rng.gen_range(0..ROOM_CODE_CHARSET.len());
                    ROOM_CODE_CHARSET[i] as char
                })
                .collect();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}

/// Room codes are typed by hand, so accept lower case and stray spaces.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

impl RoomRepository for InMemoryRooms {
    fn create(&mut self, host: ConnId, now: Instant) -> Result<String, JoinError> {
        if self.members.contains_key(&host) {
            return Err(JoinError::AlreadyInRoom);
        }
        let code = self.generate_code();
        self.rooms
            .insert(code.clone(), Room::new(code.clone(), host, now));
        self.members.insert(host, code.clone());
        Ok(code)
    }

    fn join(&mut self, code: &str, guest: ConnId, now: Instant) -> Result<&mut Room, JoinError> {
        if self.members.contains_key(&guest) {
            return Err(JoinError::AlreadyInRoom);
        }
        let code = normalize_code(code);
        let room = self.rooms.get_mut(&code).ok_or(JoinError::NotFound)?;
        if room.is_full() {
            return Err(JoinError::Full);
        }
        room.guest = Some(guest);
        room.touch(now);
        self.members.insert(guest, code);
        Ok(room)
    }

    fn find(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code)
    }

    fn find_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    fn room_of(&self, conn: ConnId) -> Option<String> {
        self.members.get(&conn).cloned()
    }

    fn delete(&mut self, code: &str) -> Option<Room> {
        let room = self.rooms.remove(code)?;
        for member in room.members() {
            self.members.remove(&member);
        }
        Some(room)
    }

    fn sweep_expired(&mut self, now: Instant, idle_timeout: Duration) -> Vec<Room> {
        let expired: Vec<String> = self
            .rooms
            .values()
            .filter(|room| room.idle_for(now) >= idle_timeout)
            .map(|room| room.code.clone())
            .collect();
        expired
            .iter()
            .filter_map(|code| self.delete(code))
            .collect()
    }

    fn codes(&self) -> Vec<String> {
        self.rooms.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.rooms.len()
    }
}

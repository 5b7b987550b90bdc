use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;

use crate::core::types::errors::room_error::RoomError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Seated,
    AlreadySeated,
}

/// Per-room set of users holding a participant seat.
///
/// The participant table stays authoritative; a room's entry is seeded from
/// the persisted active participants the first time it is touched, and every
/// admission is decided under that room's entry lock so concurrent joins can
/// never overfill it.
#[derive(Debug, Clone, Default)]
pub struct SeatLedger {
    seats: Arc<DashMap<i32, HashSet<i32>>>,
}

impl SeatLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// `persisted` must be loaded before calling; no I/O happens under the lock.
    pub fn try_admit(
        &self,
        room_id: i32,
        user_id: i32,
        capacity: i32,
        persisted: &[i32],
    ) -> Result<Admission, RoomError> {
        let mut seats = self
            .seats
            .entry(room_id)
            .or_insert_with(|| persisted.iter().copied().collect());

        if seats.contains(&user_id) {
            return Ok(Admission::AlreadySeated);
        }

        if seats.len() >= usize::try_from(capacity).unwrap_or(0) {
            return Err(RoomError::RoomFull(capacity));
        }

        seats.insert(user_id);
        Ok(Admission::Seated)
    }

    pub fn release(&self, room_id: i32, user_id: i32) -> bool {
        let released = self
            .seats
            .get_mut(&room_id)
            .is_some_and(|mut seats| seats.remove(&user_id));

        self.seats.remove_if(&room_id, |_, seats| seats.is_empty());

        released
    }

    pub fn occupied(&self, room_id: i32) -> usize {
        self.seats.get(&room_id).map_or(0, |seats| seats.len())
    }

    pub fn forget_room(&self, room_id: i32) {
        self.seats.remove(&room_id);
    }
}

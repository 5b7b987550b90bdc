use std::{collections::HashMap, sync::Arc};

use dashmap::DashMap;

use crate::core::entities::models::ParticipantRole;

#[derive(Debug, Clone)]
struct PresenceEntry {
    username: String,
    role: ParticipantRole,
    connections: usize,
}

/// Live connections per room, keyed by user. A user may hold several
/// connections to one room and may be present in several rooms.
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    rooms: Arc<DashMap<i32, HashMap<i32, PresenceEntry>>>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when this is the user's first connection to the room.
    pub fn register(
        &self,
        room_id: i32,
        user_id: i32,
        username: &str,
        role: ParticipantRole,
    ) -> bool {
        let mut users = self.rooms.entry(room_id).or_default();

        match users.get_mut(&user_id) {
            Some(entry) => {
                entry.connections += 1;
                entry.role = role;
                false
            }
            None => {
                users.insert(
                    user_id,
                    PresenceEntry {
                        username: username.to_string(),
                        role,
                        connections: 1,
                    },
                );
                true
            }
        }
    }

    /// Returns true when the user's last connection to the room is gone.
    pub fn unregister(&self, room_id: i32, user_id: i32) -> bool {
        let gone = match self.rooms.get_mut(&room_id) {
            Some(mut users) => match users.get_mut(&user_id) {
                Some(entry) if entry.connections > 1 => {
                    entry.connections -= 1;
                    false
                }
                Some(_) => {
                    users.remove(&user_id);
                    true
                }
                None => false,
            },
            None => false,
        };

        self.rooms.remove_if(&room_id, |_, users| users.is_empty());

        gone
    }

    /// Drops every connection of the user at once.
    pub fn remove_user(&self, room_id: i32, user_id: i32) -> bool {
        let removed = self
            .rooms
            .get_mut(&room_id)
            .is_some_and(|mut users| users.remove(&user_id).is_some());

        self.rooms.remove_if(&room_id, |_, users| users.is_empty());

        removed
    }

    pub fn list_usernames(&self, room_id: i32) -> Vec<String> {
        let mut usernames = self
            .rooms
            .get(&room_id)
            .map(|users| {
                users
                    .values()
                    .map(|entry| entry.username.clone())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        usernames.sort();
        usernames
    }

    pub fn is_present(&self, room_id: i32, user_id: i32) -> bool {
        self.rooms
            .get(&room_id)
            .is_some_and(|users| users.contains_key(&user_id))
    }

    pub fn role_of(&self, room_id: i32, user_id: i32) -> Option<ParticipantRole> {
        self.rooms
            .get(&room_id)
            .and_then(|users| users.get(&user_id).map(|entry| entry.role))
    }

    pub fn count(&self, room_id: i32) -> usize {
        self.rooms.get(&room_id).map_or(0, |users| users.len())
    }

    pub fn clear_room(&self, room_id: i32) {
        self.rooms.remove(&room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_multiple_connections_per_user() {
        let presence = PresenceTracker::new();

        assert!(presence.register(1, 10, "ana", ParticipantRole::Participant));
        assert!(!presence.register(1, 10, "ana", ParticipantRole::Participant));
        assert!(presence.register(1, 11, "bao", ParticipantRole::Moderator));

        assert_eq!(presence.list_usernames(1), vec!["ana", "bao"]);
        assert!(!presence.unregister(1, 10));
        assert!(presence.is_present(1, 10));
        assert!(presence.unregister(1, 10));
        assert!(!presence.is_present(1, 10));
        assert_eq!(presence.count(1), 1);
        assert_eq!(presence.role_of(1, 11), Some(ParticipantRole::Moderator));
    }

    #[test]
    fn a_user_can_be_present_in_several_rooms() {
        let presence = PresenceTracker::new();

        presence.register(1, 10, "ana", ParticipantRole::Participant);
        presence.register(2, 10, "ana", ParticipantRole::Moderator);

        assert!(presence.unregister(1, 10));
        assert!(presence.is_present(2, 10));
        assert_eq!(presence.count(1), 0);
    }

    #[test]
    fn remove_user_and_clear_room() {
        let presence = PresenceTracker::new();

        presence.register(1, 10, "ana", ParticipantRole::Participant);
        presence.register(1, 10, "ana", ParticipantRole::Participant);
        presence.register(1, 11, "bao", ParticipantRole::Participant);

        assert!(presence.remove_user(1, 10));
        assert!(!presence.is_present(1, 10));
        assert!(!presence.unregister(1, 10));

        presence.clear_room(1);
        assert!(presence.list_usernames(1).is_empty());
    }
}

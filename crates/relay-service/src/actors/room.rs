//! Room membership model.
//!
//! A `Room` is plain data owned by the registry actor. It never talks to the
//! network; the actor snapshots `members()` and does the fan-out itself.

use chrono::{DateTime, Utc};
use common::types::{ConnectionId, RoomId, UserId};
use std::collections::HashMap;

/// A named set of member connections.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    /// Members in join order. Each id appears at most once.
    members: Vec<ConnectionId>,
    /// User id each member announced when it (last) joined.
    user_ids: HashMap<ConnectionId, UserId>,
    created_at: DateTime<Utc>,
}

impl Room {
    /// Create an empty room.
    #[must_use]
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            members: Vec::new(),
            user_ids: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Add a member, or refresh the user id of an existing one.
    ///
    /// Returns `true` if the connection was not already a member.
    pub fn add_member(&mut self, connection_id: ConnectionId, user_id: UserId) -> bool {
        let added = if self.contains(&connection_id) {
            false
        } else {
            self.members.push(connection_id.clone());
            true
        };
        self.user_ids.insert(connection_id, user_id);
        added
    }

    /// Remove a member. Returns `true` if it was present.
    pub fn remove_member(&mut self, connection_id: &ConnectionId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != connection_id);
        self.user_ids.remove(connection_id);
        self.members.len() != before
    }

    #[must_use]
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.members.contains(connection_id)
    }

    /// Members in join order.
    #[must_use]
    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    #[must_use]
    pub fn user_id_of(&self, connection_id: &ConnectionId) -> Option<&UserId> {
        self.user_ids.get(connection_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn lobby() -> Room {
        Room::new(RoomId::parse("lobby").unwrap())
    }

    #[test]
    fn test_new_room_is_empty() {
        let room = lobby();
        assert!(room.is_empty());
        assert_eq!(room.len(), 0);
        assert_eq!(room.id().as_str(), "lobby");
        assert!(room.created_at() <= Utc::now());
    }

    #[test]
    fn test_add_member_is_idempotent() {
        let mut room = lobby();
        let c1 = ConnectionId::from("c1");

        assert!(room.add_member(c1.clone(), UserId::from("alice")));
        assert!(!room.add_member(c1.clone(), UserId::from("alice")));
        assert!(!room.add_member(c1.clone(), UserId::from("alice")));

        assert_eq!(room.members(), &[c1]);
    }

    #[test]
    fn test_rejoin_refreshes_user_id() {
        let mut room = lobby();
        let c1 = ConnectionId::from("c1");

        room.add_member(c1.clone(), UserId::from("alice"));
        room.add_member(c1.clone(), UserId::from("alice-laptop"));

        assert_eq!(room.len(), 1);
        assert_eq!(room.user_id_of(&c1), Some(&UserId::from("alice-laptop")));
    }

    #[test]
    fn test_members_preserve_join_order() {
        let mut room = lobby();
        for id in ["c3", "c1", "c2"] {
            room.add_member(ConnectionId::from(id), UserId::default());
        }

        let order: Vec<&str> = room.members().iter().map(ConnectionId::as_str).collect();
        assert_eq!(order, vec!["c3", "c1", "c2"]);
    }

    #[test]
    fn test_remove_member() {
        let mut room = lobby();
        let c1 = ConnectionId::from("c1");
        let c2 = ConnectionId::from("c2");
        room.add_member(c1.clone(), UserId::from("alice"));
        room.add_member(c2.clone(), UserId::from("bob"));

        assert!(room.remove_member(&c1));
        assert!(!room.remove_member(&c1));
        assert!(!room.contains(&c1));
        assert!(room.user_id_of(&c1).is_none());
        assert_eq!(room.members(), &[c2.clone()]);

        assert!(room.remove_member(&c2));
        assert!(room.is_empty());
    }
}

//! Registry-level scenarios.
//!
//! Drives a real `RoomRegistryActor` through `TestClient`s and asserts on what
//! each connection's outbound queue receives:
//! - Membership is a set per room
//! - Join and signal fan-out reach every member, sender included
//! - Disconnect announces `peer_left` once per room
//! - Concurrent joins lose no updates

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

use common::types::{ConnectionId, RoomId, UserId};
use relay_service::actors::{RegistrySettings, RoomRegistryActorHandle};
use relay_service::signaling::ServerEvent;
use relay_test_utils::{
    registry_with, sdp_offer, test_registry, test_settings, unique_room, TestClient,
};

fn peer_joined(room: &str, user: &str, connection: &str) -> ServerEvent {
    ServerEvent::PeerJoined {
        room_id: RoomId::parse(room).unwrap(),
        user_id: UserId::from(user),
        connection_id: ConnectionId::from(connection),
    }
}

fn peer_left(room: &str, connection: &str) -> ServerEvent {
    ServerEvent::PeerLeft {
        room_id: RoomId::parse(room).unwrap(),
        connection_id: ConnectionId::from(connection),
    }
}

fn signal_received(room: &str, sender: &str, user: &str, data: &str) -> ServerEvent {
    ServerEvent::SignalReceived {
        room_id: RoomId::parse(room).unwrap(),
        sender_connection_id: ConnectionId::from(sender),
        from_user_id: UserId::from(user),
        signal_data: data.to_string(),
    }
}

async fn member_ids(registry: &RoomRegistryActorHandle, room: &str) -> Vec<String> {
    registry
        .get_room(room)
        .await
        .unwrap()
        .map(|info| {
            info.members
                .into_iter()
                .map(|m| m.connection_id.to_string())
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// Lobby walkthrough
// ============================================================================

#[tokio::test]
async fn test_lobby_scenario() {
    let registry = test_registry();
    let mut c1 = TestClient::connect(&registry, "c1").await;
    let mut c2 = TestClient::connect(&registry, "c2").await;

    c1.join("lobby", "alice").await;
    assert_eq!(c1.next_event().await, peer_joined("lobby", "alice", "c1"));

    c2.join("lobby", "bob").await;
    assert_eq!(c1.next_event().await, peer_joined("lobby", "bob", "c2"));
    assert_eq!(c2.next_event().await, peer_joined("lobby", "bob", "c2"));

    let offer = sdp_offer();
    c2.signal("lobby", "bob", &offer).await;
    let expected = signal_received("lobby", "c2", "bob", &offer);
    assert_eq!(c1.next_event().await, expected);
    assert_eq!(c2.next_event().await, expected);

    let outcome = c1.disconnect().await;
    assert!(outcome.was_registered);
    assert_eq!(outcome.recipients, 1);
    assert_eq!(c2.next_event().await, peer_left("lobby", "c1"));

    assert_eq!(member_ids(&registry, "lobby").await, vec!["c2"]);

    c2.expect_no_event().await;
    registry.cancel();
}

// ============================================================================
// Membership properties
// ============================================================================

#[tokio::test]
async fn test_repeated_join_keeps_single_membership() {
    let registry = test_registry();
    let room = unique_room();
    let mut client = TestClient::connect(&registry, "c1").await;

    for _ in 0..5 {
        client.join(&room, "alice").await;
    }

    assert_eq!(member_ids(&registry, &room).await, vec!["c1"]);
    // Every join is announced, even when the member was already present.
    assert_eq!(client.drain().len(), 5);

    registry.cancel();
}

#[tokio::test]
async fn test_join_reaches_existing_members_and_joiner() {
    let registry = test_registry();
    let room = unique_room();
    let mut a = TestClient::connect(&registry, "a").await;
    let mut b = TestClient::connect(&registry, "b").await;
    let mut c = TestClient::connect(&registry, "c").await;

    a.join(&room, "alice").await;
    b.join(&room, "bob").await;
    a.drain();
    b.drain();

    let outcome = c.join(&room, "carol").await;
    assert_eq!(outcome.recipients, 3);
    assert_eq!(outcome.member_count, 3);

    let expected = peer_joined(&room, "carol", "c");
    assert_eq!(a.next_event().await, expected);
    assert_eq!(b.next_event().await, expected);
    assert_eq!(c.next_event().await, expected);

    registry.cancel();
}

#[tokio::test]
async fn test_signal_reaches_every_member_including_sender() {
    let registry = test_registry();
    let room = unique_room();
    let mut clients = Vec::new();
    for (id, user) in [("a", "alice"), ("b", "bob"), ("c", "carol")] {
        let client = TestClient::connect(&registry, id).await;
        client.join(&room, user).await;
        clients.push(client);
    }
    for client in &mut clients {
        client.drain();
    }

    let outcome = clients[0].signal(&room, "alice", "candidate").await;
    assert_eq!(outcome.recipients, 3);

    let expected = signal_received(&room, "a", "alice", "candidate");
    for client in &mut clients {
        assert_eq!(client.next_event().await, expected);
    }

    registry.cancel();
}

#[tokio::test]
async fn test_signal_without_echo_skips_sender() {
    let registry = registry_with(RegistrySettings {
        echo_signals_to_sender: false,
        ..test_settings()
    });
    let room = unique_room();
    let mut a = TestClient::connect(&registry, "a").await;
    let mut b = TestClient::connect(&registry, "b").await;
    a.join(&room, "alice").await;
    b.join(&room, "bob").await;
    a.drain();
    b.drain();

    let outcome = a.signal(&room, "alice", "offer").await;
    assert_eq!(outcome.recipients, 1);
    assert_eq!(b.next_event().await, signal_received(&room, "a", "alice", "offer"));
    a.expect_no_event().await;

    registry.cancel();
}

// ============================================================================
// Departure
// ============================================================================

#[tokio::test]
async fn test_disconnect_announces_once_per_room() {
    let registry = test_registry();
    let (r1, r2) = (unique_room(), unique_room());
    let leaver = TestClient::connect(&registry, "leaver").await;
    let mut in_r1 = TestClient::connect(&registry, "in-r1").await;
    let mut in_both = TestClient::connect(&registry, "in-both").await;

    leaver.join(&r1, "lee").await;
    leaver.join(&r2, "lee").await;
    in_r1.join(&r1, "ann").await;
    in_both.join(&r1, "bea").await;
    in_both.join(&r2, "bea").await;
    in_r1.drain();
    in_both.drain();

    let outcome = leaver.disconnect().await;
    assert_eq!(outcome.rooms_left.len(), 2);
    assert_eq!(outcome.recipients, 3);

    assert_eq!(in_r1.drain(), vec![peer_left(&r1, "leaver")]);
    let mut seen = in_both.drain();
    seen.sort_by_key(|e| serde_json::to_string(e).unwrap());
    let mut expected = vec![peer_left(&r1, "leaver"), peer_left(&r2, "leaver")];
    expected.sort_by_key(|e| serde_json::to_string(e).unwrap());
    assert_eq!(seen, expected);

    assert!(!member_ids(&registry, &r1).await.contains(&"leaver".to_string()));
    assert!(!member_ids(&registry, &r2).await.contains(&"leaver".to_string()));

    // A second disconnect is a no-op and announces nothing.
    let again = registry.disconnect(&ConnectionId::from("leaver")).await.unwrap();
    assert!(!again.was_registered);
    in_both.expect_no_event().await;

    registry.cancel();
}

#[tokio::test]
async fn test_last_member_leaving_removes_room() {
    let registry = test_registry();
    let room = unique_room();
    let mut solo = TestClient::connect(&registry, "solo").await;
    solo.join(&room, "sam").await;
    solo.drain();

    let outcome = solo.leave(&room).await;
    assert!(outcome.was_member);
    assert!(outcome.room_removed);
    assert_eq!(outcome.recipients, 0);

    assert!(registry.get_room(&room).await.unwrap().is_none());
    assert_eq!(registry.get_status().await.unwrap().room_count, 0);

    registry.cancel();
}

#[tokio::test]
async fn test_leave_is_scoped_to_one_room() {
    let registry = test_registry();
    let (r1, r2) = (unique_room(), unique_room());
    let a = TestClient::connect(&registry, "a").await;
    let mut b = TestClient::connect(&registry, "b").await;
    a.join(&r1, "alice").await;
    a.join(&r2, "alice").await;
    b.join(&r1, "bob").await;
    b.join(&r2, "bob").await;
    b.drain();

    a.leave(&r1).await;

    assert_eq!(b.drain(), vec![peer_left(&r1, "a")]);
    assert_eq!(member_ids(&registry, &r1).await, vec!["b"]);
    assert_eq!(member_ids(&registry, &r2).await, vec!["a", "b"]);

    registry.cancel();
}

// ============================================================================
// Concurrency and backpressure
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_lose_no_updates() {
    const N: usize = 40;

    let registry = test_registry();
    let room = unique_room();
    let mut clients = Vec::with_capacity(N);
    for i in 0..N {
        clients.push(TestClient::connect(&registry, &format!("c{i}")).await);
    }

    let tasks: Vec<_> = (0..N)
        .map(|i| {
            let registry = registry.clone();
            let room = room.clone();
            tokio::spawn(async move {
                registry
                    .join_room(&room, &ConnectionId::from(format!("c{i}")), UserId::from("peer"))
                    .await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let members = member_ids(&registry, &room).await;
    assert_eq!(members.len(), N);
    let status = registry.get_status().await.unwrap();
    assert_eq!(status.room_count, 1);
    assert_eq!(status.connection_count, N);

    drop(clients);
    registry.cancel();
}

#[tokio::test]
async fn test_slow_consumer_is_evicted_without_blocking_others() {
    let registry = test_registry();
    let room = unique_room();
    let slow = TestClient::connect_with_capacity(&registry, "slow", 1).await;
    let mut fast = TestClient::connect(&registry, "fast").await;

    // The slow client's own peer_joined fills its queue.
    slow.join(&room, "sloth").await;
    fast.join(&room, "hare").await;

    assert!(slow.is_evicted());
    assert_eq!(fast.next_event().await, peer_joined(&room, "hare", "fast"));

    registry.cancel();
}

#[tokio::test]
async fn test_unknown_connection_cannot_join() {
    let registry = test_registry();
    let err = registry
        .join_room("lobby", &ConnectionId::from("ghost"), UserId::from("nobody"))
        .await
        .unwrap_err();

    assert_eq!(err.code_label(), "connection_not_found");
    assert!(registry.get_room("lobby").await.unwrap().is_none());

    registry.cancel();
}

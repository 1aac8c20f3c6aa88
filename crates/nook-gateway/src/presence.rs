//! Fan-out of events to a snapshot of room clients.
//!
//! Holds no state of its own: callers take a snapshot from the
//! [`Registry`](crate::registry::Registry) and hand it in.

use tracing::{debug, trace};
use uuid::Uuid;

use nook_types::events::GatewayEvent;
use nook_types::models::MemberDetail;

use crate::registry::RoomClient;

/// Send `event` to every open client in `clients` except `exclude`.
/// A closed recipient is skipped without affecting the others.
/// Returns the number of clients the event was queued for.
pub fn fan_out(clients: &[RoomClient], event: &GatewayEvent, exclude: Option<Uuid>) -> usize {
    let mut delivered = 0;
    for client in clients {
        if Some(client.conn_id()) == exclude || !client.handle.is_open() {
            continue;
        }
        if client.handle.send(event.clone()) {
            delivered += 1;
        } else {
            trace!("Dropped event for closed connection {}", client.conn_id());
        }
    }
    delivered
}

/// Tell the rest of the club that `joined` arrived. The member list is only
/// attached when the join created a new membership.
pub fn announce_join(
    club_clients: &[RoomClient],
    joined: &RoomClient,
    new_members: Option<Vec<MemberDetail>>,
) -> usize {
    let event = GatewayEvent::UserJoined {
        user: joined.online_user(),
        members: new_members,
    };
    let delivered = fan_out(club_clients, &event, Some(joined.conn_id()));
    debug!("{} joined club {}, announced to {} clients", joined.username, joined.club_id, delivered);
    delivered
}

/// Tell the remaining club clients that `left` is gone.
pub fn announce_leave(remaining: &[RoomClient], left: &RoomClient) -> usize {
    let event = GatewayEvent::UserLeft {
        user_id: left.user_id,
        username: left.username.clone(),
    };
    let delivered = fan_out(remaining, &event, Some(left.conn_id()));
    debug!("{} left club {}, announced to {} clients", left.username, left.club_id, delivered);
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ClientHandle, Outbound};
    use tokio::sync::mpsc;

    fn client(room_id: Uuid) -> (RoomClient, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = RoomClient {
            handle: ClientHandle::new(tx),
            user_id: Uuid::new_v4(),
            username: "reader".into(),
            club_id: Uuid::nil(),
            room_id,
        };
        (client, rx)
    }

    #[test]
    fn excluded_and_closed_clients_are_skipped() {
        let room = Uuid::new_v4();
        let (a, mut rx_a) = client(room);
        let (b, rx_b) = client(room);
        let (c, mut rx_c) = client(room);
        drop(rx_b);

        let event = GatewayEvent::Error { message: "ping".into() };
        let delivered = fan_out(&[a.clone(), b, c], &event, Some(a.conn_id()));

        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(matches!(rx_c.try_recv(), Ok(Outbound::Event(GatewayEvent::Error { .. }))));
    }

    #[test]
    fn join_announcement_skips_the_joiner() {
        let room = Uuid::new_v4();
        let (joiner, mut rx_joiner) = client(room);
        let (other, mut rx_other) = client(room);

        let delivered = announce_join(&[joiner.clone(), other], &joiner, None);
        assert_eq!(delivered, 1);
        assert!(rx_joiner.try_recv().is_err());
        match rx_other.try_recv() {
            Ok(Outbound::Event(GatewayEvent::UserJoined { user, members })) => {
                assert_eq!(user.user_id, joiner.user_id);
                assert!(members.is_none());
            }
            other => panic!("expected user-joined, got {:?}", other),
        }
    }
}

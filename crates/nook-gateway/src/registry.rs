use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use uuid::Uuid;

use nook_types::events::GatewayEvent;
use nook_types::models::OnlineUser;

/// What a connection's writer task receives.
#[derive(Debug, Clone)]
pub enum Outbound {
    Event(GatewayEvent),
    /// Close the socket, e.g. because a newer connection took over.
    Close,
}

/// Sending half of one connection. Cheap to clone; the registry keeps one
/// per registered client.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ClientHandle {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            tx,
        }
    }

    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Queue an event. Returns false if the connection is already gone.
    pub fn send(&self, event: GatewayEvent) -> bool {
        self.tx.send(Outbound::Event(event)).is_ok()
    }

    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// A connection present in a club. `room_id` is reassigned in place on a
/// room switch.
#[derive(Debug, Clone)]
pub struct RoomClient {
    pub handle: ClientHandle,
    pub user_id: Uuid,
    pub username: String,
    pub club_id: Uuid,
    pub room_id: Uuid,
}

impl RoomClient {
    pub fn conn_id(&self) -> Uuid {
        self.handle.conn_id()
    }

    pub fn online_user(&self) -> OnlineUser {
        OnlineUser {
            client_id: self.conn_id(),
            user_id: self.user_id,
            username: self.username.clone(),
            room_id: self.room_id,
        }
    }
}

/// A user's direct-message channel.
#[derive(Debug, Clone)]
pub struct DmClient {
    pub handle: ClientHandle,
    pub user_id: Uuid,
    pub username: String,
}

/// conn_id -> client, for one club
type ActiveClub = HashMap<Uuid, RoomClient>;

#[derive(Default)]
struct RegistryState {
    clubs: HashMap<Uuid, ActiveClub>,
    dm_clients: HashMap<Uuid, DmClient>,
}

/// All presence state of the process.
///
/// Every method takes the lock, mutates or copies, and releases it before
/// returning. Nothing here awaits, so callers never observe a half-applied
/// registration and the lock is never held across a suspension point.
#[derive(Default)]
pub struct Registry {
    state: Mutex<RegistryState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RegistryState> {
        // The state is plain maps; a panic elsewhere cannot leave it torn.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Room clients --

    pub fn register_room_client(&self, club_id: Uuid, client: RoomClient) {
        self.state()
            .clubs
            .entry(club_id)
            .or_default()
            .insert(client.conn_id(), client);
    }

    /// Remove a client, dropping the club entry once it is empty.
    pub fn remove_room_client(&self, club_id: Uuid, conn_id: Uuid) -> Option<RoomClient> {
        let mut state = self.state();
        let club = state.clubs.get_mut(&club_id)?;
        let removed = club.remove(&conn_id);
        if club.is_empty() {
            state.clubs.remove(&club_id);
        }
        removed
    }

    pub fn room_client(&self, club_id: Uuid, conn_id: Uuid) -> Option<RoomClient> {
        self.state().clubs.get(&club_id)?.get(&conn_id).cloned()
    }

    /// Every client of a club, in no particular order.
    pub fn list_room_clients(&self, club_id: Uuid) -> Vec<RoomClient> {
        self.state()
            .clubs
            .get(&club_id)
            .map(|club| club.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Clients of a club currently looking at `room_id`.
    pub fn room_clients(&self, club_id: Uuid, room_id: Uuid) -> Vec<RoomClient> {
        self.state()
            .clubs
            .get(&club_id)
            .map(|club| {
                club.values()
                    .filter(|c| c.room_id == room_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Move an existing client to another room. Returns false if the client
    /// is not registered in that club.
    pub fn switch_room(&self, club_id: Uuid, conn_id: Uuid, room_id: Uuid) -> bool {
        match self
            .state()
            .clubs
            .get_mut(&club_id)
            .and_then(|club| club.get_mut(&conn_id))
        {
            Some(client) => {
                client.room_id = room_id;
                true
            }
            None => false,
        }
    }

    /// Move every client of `from_room` to `to_room`. Returns the moved
    /// clients with their new room.
    pub fn relocate_room(&self, club_id: Uuid, from_room: Uuid, to_room: Uuid) -> Vec<RoomClient> {
        let mut state = self.state();
        let Some(club) = state.clubs.get_mut(&club_id) else {
            return vec![];
        };
        club.values_mut()
            .filter(|c| c.room_id == from_room)
            .map(|c| {
                c.room_id = to_room;
                c.clone()
            })
            .collect()
    }

    pub fn has_active_club(&self, club_id: Uuid) -> bool {
        self.state().clubs.contains_key(&club_id)
    }

    pub fn active_club_count(&self) -> usize {
        self.state().clubs.len()
    }

    // -- DM clients --

    /// Install the user's DM client. Last write wins: the superseded entry,
    /// if any, is returned so the caller can close its connection.
    pub fn register_dm_client(&self, user_id: Uuid, client: DmClient) -> Option<DmClient> {
        self.state().dm_clients.insert(user_id, client)
    }

    /// Remove the user's DM client, but only if `conn_id` still owns the
    /// slot. A superseded connection disconnecting late must not evict its
    /// replacement.
    pub fn remove_dm_client(&self, user_id: Uuid, conn_id: Uuid) -> Option<DmClient> {
        let mut state = self.state();
        let owns_slot = state
            .dm_clients
            .get(&user_id)
            .is_some_and(|current| current.handle.conn_id() == conn_id);
        if owns_slot {
            state.dm_clients.remove(&user_id)
        } else {
            None
        }
    }

    pub fn get_dm_client(&self, user_id: Uuid) -> Option<DmClient> {
        self.state().dm_clients.get(&user_id).cloned()
    }

    pub fn dm_client_count(&self) -> usize {
        self.state().dm_clients.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room_client(club_id: Uuid, room_id: Uuid, name: &str) -> (RoomClient, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = RoomClient {
            handle: ClientHandle::new(tx),
            user_id: Uuid::new_v4(),
            username: name.to_string(),
            club_id,
            room_id,
        };
        (client, rx)
    }

    fn dm_client(user_id: Uuid, name: &str) -> (DmClient, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = DmClient {
            handle: ClientHandle::new(tx),
            user_id,
            username: name.to_string(),
        };
        (client, rx)
    }

    #[test]
    fn empty_club_entry_is_reclaimed() {
        let registry = Registry::new();
        let club = Uuid::new_v4();
        let room = Uuid::new_v4();
        let (a, _rx_a) = room_client(club, room, "a");
        let (b, _rx_b) = room_client(club, room, "b");

        registry.register_room_client(club, a.clone());
        registry.register_room_client(club, b.clone());
        assert_eq!(registry.list_room_clients(club).len(), 2);

        assert!(registry.remove_room_client(club, a.conn_id()).is_some());
        assert!(registry.has_active_club(club));

        assert!(registry.remove_room_client(club, b.conn_id()).is_some());
        assert!(!registry.has_active_club(club));
        assert_eq!(registry.active_club_count(), 0);

        // Removing from an absent club is a no-op
        assert!(registry.remove_room_client(club, b.conn_id()).is_none());
    }

    #[test]
    fn switch_room_mutates_in_place() {
        let registry = Registry::new();
        let club = Uuid::new_v4();
        let (general, spoilers) = (Uuid::new_v4(), Uuid::new_v4());
        let (a, _rx) = room_client(club, general, "a");
        registry.register_room_client(club, a.clone());

        assert!(registry.switch_room(club, a.conn_id(), spoilers));
        assert_eq!(registry.list_room_clients(club).len(), 1);
        assert!(registry.room_clients(club, general).is_empty());
        assert_eq!(registry.room_clients(club, spoilers)[0].conn_id(), a.conn_id());

        assert!(!registry.switch_room(Uuid::new_v4(), a.conn_id(), spoilers));
    }

    #[test]
    fn relocate_moves_only_clients_of_the_room() {
        let registry = Registry::new();
        let club = Uuid::new_v4();
        let (general, spoilers) = (Uuid::new_v4(), Uuid::new_v4());
        let (a, _rx_a) = room_client(club, spoilers, "a");
        let (b, _rx_b) = room_client(club, general, "b");
        registry.register_room_client(club, a.clone());
        registry.register_room_client(club, b);

        let moved = registry.relocate_room(club, spoilers, general);
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].conn_id(), a.conn_id());
        assert_eq!(registry.room_clients(club, general).len(), 2);
    }

    #[test]
    fn dm_slot_keeps_newest_connection() {
        let registry = Registry::new();
        let user = Uuid::new_v4();
        let (first, _rx1) = dm_client(user, "old");
        let (second, _rx2) = dm_client(user, "new");

        assert!(registry.register_dm_client(user, first.clone()).is_none());
        let replaced = registry.register_dm_client(user, second.clone()).unwrap();
        assert_eq!(replaced.handle.conn_id(), first.handle.conn_id());
        assert_eq!(registry.dm_client_count(), 1);
        assert_eq!(registry.get_dm_client(user).unwrap().username, "new");

        // The superseded connection's late disconnect leaves the slot alone
        assert!(registry.remove_dm_client(user, first.handle.conn_id()).is_none());
        assert!(registry.get_dm_client(user).is_some());

        assert!(registry.remove_dm_client(user, second.handle.conn_id()).is_some());
        assert_eq!(registry.dm_client_count(), 0);
    }

    #[test]
    fn handle_reports_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ClientHandle::new(tx);
        assert!(handle.is_open());
        drop(rx);
        assert!(!handle.is_open());
        assert!(!handle.send(GatewayEvent::Error { message: "gone".into() }));
    }
}

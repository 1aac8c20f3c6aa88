//! Session protocol: join, room switch, DM registration and disconnect.

use tracing::{debug, info};
use uuid::Uuid;

use nook_types::events::GatewayEvent;

use crate::error::RelayError;
use crate::presence;
use crate::registry::{DmClient, RoomClient};
use crate::relay::{Relay, run_blocking};
use crate::session::{Connection, DmSession, RoomSession, Session};

impl Relay {
    /// Enter a club. Replies `init` and announces the arrival to the rest of
    /// the club.
    pub async fn join(
        &self,
        conn: &mut Connection,
        club_id: Uuid,
        user_id: Uuid,
        display_name: String,
        room_id: Option<Uuid>,
    ) -> Result<(), RelayError> {
        conn.ensure_unjoined()?;
        conn.check_admitted(user_id)?;

        let store = self.store();
        let club = run_blocking(move || Ok(store.find_club(club_id)?))
            .await?
            .ok_or(RelayError::ClubNotFound)?;

        if club.rooms.is_empty() {
            return Err(RelayError::NoRoomsAvailable);
        }
        let room_id = match room_id {
            Some(id) => club
                .room(id)
                .map(|r| r.id)
                .ok_or_else(|| RelayError::invalid("room does not belong to this club"))?,
            None => club.rooms[0].id,
        };

        // The relay's only write to club membership: joining makes you a member.
        let members = self.members();
        let name = display_name.clone();
        let (was_new_member, member_details) = run_blocking(move || {
            let was_new = !members.is_member(club_id, user_id)?;
            if was_new {
                members.add_member(club_id, user_id, &name)?;
            }
            Ok((was_new, members.member_details(club_id)?))
        })
        .await?;

        let client = RoomClient {
            handle: conn.handle().clone(),
            user_id,
            username: display_name.clone(),
            club_id,
            room_id,
        };

        let _publish = self.publish_lock().await;

        // Rooms may have been deleted while we waited. Re-read the club so
        // the snapshot in `init` and the room we register into are current.
        let store = self.store();
        let mut club = run_blocking(move || Ok(store.find_club(club_id)?))
            .await?
            .ok_or(RelayError::ClubNotFound)?;
        if club.room(room_id).is_none() {
            return Err(RelayError::invalid("room no longer exists"));
        }
        if was_new_member && !club.member_ids.contains(&user_id) {
            club.member_ids.push(user_id);
        }
        let messages = self.history(room_id).await?;

        // No await from here on: registration, snapshot and replies happen
        // as one step relative to other connections.
        self.registry().register_room_client(club_id, client.clone());
        conn.set_session(Session::Room(RoomSession {
            club_id,
            user_id,
            username: display_name.clone(),
        }));

        let club_clients = self.registry().list_room_clients(club_id);
        let users = club_clients.iter().map(RoomClient::online_user).collect();

        info!(
            "{} ({}) joined club {} at room {}{}",
            display_name,
            user_id,
            club_id,
            room_id,
            if was_new_member { " as a new member" } else { "" }
        );

        conn.reply(GatewayEvent::Init {
            client_id: conn.conn_id(),
            club,
            current_room_id: room_id,
            messages,
            members: member_details.clone(),
            users,
        });

        presence::announce_join(
            &club_clients,
            &client,
            was_new_member.then_some(member_details),
        );
        Ok(())
    }

    /// Move this connection to another room of its club. Not announced to
    /// anyone else.
    pub async fn switch_room(&self, conn: &mut Connection, room_id: Uuid) -> Result<(), RelayError> {
        let club_id = conn.room_session()?.club_id;

        let _publish = self.publish_lock().await;
        if !self.room_in_club(club_id, room_id).await? {
            return Err(RelayError::invalid("room does not belong to your club"));
        }
        let messages = self.history(room_id).await?;

        if !self.registry().switch_room(club_id, conn.conn_id(), room_id) {
            return Err(RelayError::NotJoined);
        }
        debug!("{} switched to room {}", conn.admitted_user(), room_id);

        conn.reply(GatewayEvent::RoomSwitched { room_id, messages });
        Ok(())
    }

    /// Register this connection as the user's DM channel. A previous channel
    /// for the same user is replaced and told to close.
    pub fn join_dm(
        &self,
        conn: &mut Connection,
        user_id: Uuid,
        display_name: String,
    ) -> Result<(), RelayError> {
        if !matches!(conn.session(), Session::Dm(_)) {
            conn.ensure_unjoined()?;
        }
        conn.check_admitted(user_id)?;

        let client = DmClient {
            handle: conn.handle().clone(),
            user_id,
            username: display_name.clone(),
        };

        if let Some(previous) = self.registry().register_dm_client(user_id, client) {
            if previous.handle.conn_id() != conn.conn_id() {
                info!("{} ({}) DM channel superseded, closing old connection", display_name, user_id);
                previous.handle.close();
            }
        }

        conn.set_session(Session::Dm(DmSession {
            user_id,
            username: display_name,
        }));
        conn.reply(GatewayEvent::DmJoined { user_id });
        Ok(())
    }

    /// Tear down whatever this connection registered. Safe to call more than
    /// once.
    pub fn disconnect(&self, conn: &mut Connection) {
        match conn.take_session() {
            Session::Room(session) => {
                let Some(client) = self.registry().remove_room_client(session.club_id, conn.conn_id())
                else {
                    return;
                };
                let remaining = self.registry().list_room_clients(session.club_id);
                presence::announce_leave(&remaining, &client);
                info!("{} ({}) left club {}", session.username, session.user_id, session.club_id);
            }
            Session::Dm(session) => {
                self.registry().remove_dm_client(session.user_id, conn.conn_id());
                info!("{} ({}) closed DM channel", session.username, session.user_id);
            }
            Session::Unjoined | Session::Closed => {}
        }
    }
}

//! Real-time room and presence relay for book clubs.

pub mod connection;
pub mod error;
pub mod messages;
pub mod moderation;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod session;
pub mod store;

pub use connection::handle_connection;
pub use error::RelayError;
pub use relay::{DEFAULT_HISTORY_LIMIT, Relay, RelayConfig};
pub use session::Connection;

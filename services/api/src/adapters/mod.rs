pub mod db;
pub mod pin;
pub mod roster_file;

pub use db::DbAdapter;
pub use pin::Argon2PinHasher;
pub use roster_file::{load_roster, parse_roster, RosterError};

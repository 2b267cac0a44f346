pub mod events;
pub mod password;

pub use events::{SecurityEvent, SecurityEventLog};
pub use password::{hash_password, verify_password, verify_stored_password, PasswordMatch};

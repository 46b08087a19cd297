pub mod clock;
pub mod duration;
pub mod password;
pub mod snapshot;

pub mod prelude;

pub mod connections;
pub mod tokens;
pub mod users;

pub use super::connections::Entity as Connections;
pub use super::tokens::Entity as Tokens;
pub use super::users::Entity as Users;

pub mod connection_log;
pub mod cv_page;
pub mod token_service;
pub mod user_service;

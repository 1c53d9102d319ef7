pub mod account;
pub mod completion;
pub mod config;
pub mod orders;
pub mod session;
pub mod users;

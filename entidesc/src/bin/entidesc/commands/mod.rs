pub mod cache;
pub mod init;
pub mod schema;
pub mod upgrade;

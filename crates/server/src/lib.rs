#![forbid(unsafe_code)]

mod connection;
pub mod handler;
pub mod logging;

pub use connection::Connection;
pub use handler::{Maintenance, handle_connection};

#![forbid(unsafe_code)]

pub mod aof;
mod object;
pub mod snapshot;
mod store;

pub use aof::{Aof, replay_aof};
pub use object::Object;
pub use snapshot::{save_snapshot, snapshot_filename};
pub use store::Store;

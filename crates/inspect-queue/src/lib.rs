mod backlog;
mod command;

pub use backlog::{BacklogQueue, ITEM_OVERHEAD};
pub use command::{Command, CommandQueue, ConnectionState};

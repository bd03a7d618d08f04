mod context;
mod room;
mod room_behavior;
mod room_command;
mod room_manager;

pub use context::*;
pub use room::*;
pub use room_behavior::*;
pub use room_command::*;
pub use room_manager::*;

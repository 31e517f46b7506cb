mod command;

pub use command::{CommandConfig, CommandMount, CommandProvider, DEFAULT_PROGRAM};

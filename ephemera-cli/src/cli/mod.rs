pub mod actions;
pub mod commands;
pub mod menu;
pub mod output;

pub use commands::{CliArgs, Commands, FetchArgs, RunArgs};
pub use menu::Menu;
pub use output::{download_bar, render_progress, ConsoleObserver};

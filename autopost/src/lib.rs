pub mod cli;
pub mod describe;
pub mod drive;
pub mod http;
pub mod image;
pub mod load_config;
pub mod shorten;
pub mod wordpress;

pub use cli::{run, Cli, Commands};

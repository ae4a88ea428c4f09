pub mod cli;
pub mod commands;
pub mod ld;
pub mod utils;

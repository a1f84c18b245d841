// vmprov-cli: Clap commands, logging, output
// Depends on vmprov-core and vmprov-compiler

pub mod commands;
pub mod logging;
pub mod output;
pub mod ui;

pub use commands::run;

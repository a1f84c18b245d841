// vmprov-core: Pure types, errors, config, naming helpers
// No internal vmprov dependencies; this is the foundation crate.

pub mod config;
pub mod customization;
pub mod descriptor;
pub mod error;
pub mod naming;
pub mod spec;

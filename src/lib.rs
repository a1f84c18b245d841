//! # vmprov: provisioning configuration compiler
//!
//! Facade crate that re-exports the vmprov workspace crates so consumers
//! can depend on a single `vmprov` library.
//!
//! ## Crate breakdown
//!
//! | Module | Crate | Purpose |
//! |--------|-------|---------|
//! | [`core`] | vmprov-core | Spec model, descriptors, platform payload shapes, errors, config |
//! | [`compiler`] | vmprov-compiler | Decoder, compile stages, remote policy, orchestrator |
//! | [`cli`] | vmprov-cli | Clap commands, logging, output |

pub use vmprov_cli as cli;
pub use vmprov_compiler as compiler;
pub use vmprov_core as core;

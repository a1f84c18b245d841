// vmprov-compiler: Spec decoder, compile stages, orchestrator
// Depends on vmprov-core (types, config, errors)

pub mod compiler;
pub mod decoder;
pub mod inventory;
pub mod memory;
pub mod remote;
pub mod stages;

pub use compiler::{LocalPlan, ProvisioningCompiler};
pub use decoder::{DecodeError, SpecFormat, decode, decode_as, encode};
pub use inventory::{Inventory, VmRecordStore};
pub use remote::RemotePolicy;

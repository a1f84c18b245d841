//! The five compile stages. None of them calls another; the compiler owns
//! ordering.

pub mod datacenter;
pub mod host_system;
pub mod network;
pub mod resources;
pub mod storage;

pub use datacenter::DatacenterResolver;
pub use host_system::HostSystemCustomizer;
pub use network::NetworkCustomizer;
pub use resources::ResourceAllocator;
pub use storage::StorageProvisioner;

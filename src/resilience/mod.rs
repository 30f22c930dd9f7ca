pub mod containment;
pub mod policy;

pub use containment::contain_panic;
pub use policy::RecoveryPolicy;

//! Contract artifacts, deployment payloads and bound calls

mod artifact;
mod bound;

pub use artifact::ContractArtifact;
pub use bound::BoundContract;

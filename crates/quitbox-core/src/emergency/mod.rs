mod admission;
mod network;

pub use admission::{AdmissionController, EmergencyState, Grant, GrantKind};
pub use network::{looks_public, NetworkPolicy};

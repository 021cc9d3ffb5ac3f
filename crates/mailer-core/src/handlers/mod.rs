//! Workflow handlers used by the lifecycle service.
//!
//! Proof rounds and escalation actions each follow their own rules on top of
//! the plain transition table.

pub mod escalation;
pub mod proof;

pub use escalation::{EscalationHandler, EscalationPlan};
pub use proof::ProofWorkflow;

// ============================================================================
// Delivery Domain
// ============================================================================
//
// Processing of "out for delivery" events:
// - Errors (DeliveryError)
// - Orchestrator (idempotency check, status resolution, persistence)
//
// ============================================================================

pub mod errors;
pub mod orchestrator;

pub use errors::DeliveryError;
pub use orchestrator::{DeliveryOrchestrator, ProcessOutcome};

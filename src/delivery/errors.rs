use crate::resolver::ResolverError;
use crate::store::StoreError;

// ============================================================================
// Delivery Processing Errors
// ============================================================================
//
// Anything returned here withholds the acknowledgment, so the broker
// redelivers the message. Decode failures and already-processed events are
// recovered before they can become a DeliveryError.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

use std::sync::Arc;

use super::errors::ConsumerError;

/// Where a message sits in the broker log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePosition {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Advances the committed read position past a message.
pub trait OffsetCommitter: Send + Sync {
    fn commit(&self, position: &MessagePosition) -> Result<(), ConsumerError>;
}

/// Single-use handle for one delivered message.
///
/// `acknowledge` consumes the handle, so a message can be committed at most
/// once. Dropping the handle instead leaves the offset uncommitted.
pub struct Acknowledgment {
    position: MessagePosition,
    committer: Arc<dyn OffsetCommitter>,
}

impl Acknowledgment {
    pub fn new(position: MessagePosition, committer: Arc<dyn OffsetCommitter>) -> Self {
        Self {
            position,
            committer,
        }
    }

    pub fn position(&self) -> &MessagePosition {
        &self.position
    }

    pub fn acknowledge(self) -> Result<(), ConsumerError> {
        self.committer.commit(&self.position)?;

        tracing::debug!(
            topic = %self.position.topic,
            partition = self.position.partition,
            offset = self.position.offset,
            "Offset committed"
        );

        Ok(())
    }
}

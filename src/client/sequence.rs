// ABOUTME: Allocates SMPP sequence numbers from a shared durable counter
// ABOUTME: Soft-resets the counter near the 32-bit limit under a short-lived SETNX lock

use crate::client::store::{KeyValueStore, StoreError};
use std::sync::Arc;
use tracing::{debug, info};

pub const SEQUENCE_NUMBER_KEY: &str = "smpp_last_sequence_number";
pub const SEQUENCE_WRAP_LOCK_KEY: &str = "smpp_last_sequence_number_wrap";

/// Counter values at or above this trigger a reset attempt. The 0xFFFF
/// values left above it keep being handed out while someone else resets.
pub const WRAP_THRESHOLD: u32 = 0xFFFF_0000;

/// Seconds a reset lock lives if its holder never finishes.
const WRAP_LOCK_TTL: u64 = 10;

/// Sequence number source for outbound PDUs.
///
/// Valid sequence numbers are 0x00000001 to 0xFFFFFFFF. Several ESMEs can
/// share the counter when they share the store.
#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn KeyValueStore>,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        SequenceAllocator { store }
    }

    pub async fn next(&self) -> Result<u32, StoreError> {
        let raw = self.store.incr(SEQUENCE_NUMBER_KEY).await?;
        let seq = u32::try_from(raw).map_err(|_| {
            StoreError::Backend(format!("sequence counter {raw} is outside 1..=0xFFFFFFFF"))
        })?;

        if seq >= WRAP_THRESHOLD {
            // We return `seq` whether or not the reset happens.
            self.reset_counter().await?;
        }

        Ok(seq)
    }

    /// Reset the counter unless someone else already did.
    ///
    /// If the lock expires while we still think we hold it, another ESME may
    /// reset between our re-check and the delete; the window is a few
    /// milliseconds against a 10 second lock.
    async fn reset_counter(&self) -> Result<(), StoreError> {
        let locked = self.store.setnx(SEQUENCE_WRAP_LOCK_KEY, "1").await?;

        // A holder that died before setting the TTL would otherwise keep the
        // lock forever.
        if self.store.ttl(SEQUENCE_WRAP_LOCK_KEY).await? < 0 {
            self.store
                .expire(SEQUENCE_WRAP_LOCK_KEY, WRAP_LOCK_TTL)
                .await?;
        }

        if !locked {
            debug!("Sequence counter reset already in progress elsewhere");
            return Ok(());
        }

        let current = self
            .store
            .get(SEQUENCE_NUMBER_KEY)
            .await?
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(0);
        if current < u64::from(WRAP_THRESHOLD) {
            return Ok(());
        }

        self.store.delete(SEQUENCE_NUMBER_KEY).await?;
        info!("Sequence counter reset after reaching {:#x}", current);
        Ok(())
    }
}

use crate::domain::fee::{FeeConfiguration, FeeSchedule};
use crate::domain::money::Amount;
use crate::domain::ports::{ClockRef, FeeConfigStoreRef};
use crate::error::Result;
use tokio::sync::RwLock;

/// Cached accessor over the single active `FeeConfiguration`.
///
/// Approvals read the schedule through the cache; activating a new schedule
/// writes through the store and refreshes the cache in the same call, so a
/// stale rate is never served after an update completes.
pub struct FeePolicy {
    store: FeeConfigStoreRef,
    clock: ClockRef,
    cached: RwLock<Option<FeeConfiguration>>,
}

impl FeePolicy {
    pub fn new(store: FeeConfigStoreRef, clock: ClockRef) -> Self {
        Self {
            store,
            clock,
            cached: RwLock::new(None),
        }
    }

    /// The processing fee owed for an approved principal, under the active
    /// schedule (or the 2.00% default when none has been activated yet).
    pub async fn compute_fee(&self, approved_amount: Amount) -> Result<Amount> {
        let schedule = self.active_schedule().await?;
        Ok(schedule.fee_for(approved_amount))
    }

    /// Validates and activates a new schedule, superseding the current one.
    pub async fn update_schedule(&self, schedule: FeeSchedule) -> Result<FeeConfiguration> {
        schedule.validate()?;
        let mut cached = self.cached.write().await;
        let configuration = self
            .store
            .activate_configuration(schedule, self.clock.now())
            .await?;
        tracing::info!(
            version = configuration.version,
            schedule = ?configuration.schedule,
            "fee schedule activated"
        );
        *cached = Some(configuration.clone());
        Ok(configuration)
    }

    async fn active_schedule(&self) -> Result<FeeSchedule> {
        if let Some(configuration) = self.cached.read().await.as_ref() {
            return Ok(configuration.schedule);
        }
        let mut cached = self.cached.write().await;
        // Another task may have filled the cache while we waited.
        if let Some(configuration) = cached.as_ref() {
            return Ok(configuration.schedule);
        }
        match self.store.active_configuration().await? {
            Some(configuration) => {
                let schedule = configuration.schedule;
                *cached = Some(configuration);
                Ok(schedule)
            }
            None => Ok(FeeSchedule::default()),
        }
    }
}

use std::sync::Arc;

use crate::application::services::poller::DeviceReading;
use crate::domain::entities::device::{Device, DeviceStatus};
use crate::domain::entities::supply::SupplyLevel;
use crate::domain::ports::store::{DeviceStore, SampleStore, StoreError, SupplyStore};

/// Persists poll readings: one append-only sample, one upsert per supply
/// row, and the cached device status flip when the online flag changed.
pub struct IngestService {
    devices: Arc<dyn DeviceStore>,
    samples: Arc<dyn SampleStore>,
    supplies: Arc<dyn SupplyStore>,
}

impl IngestService {
    #[must_use]
    pub fn new(
        devices: Arc<dyn DeviceStore>,
        samples: Arc<dyn SampleStore>,
        supplies: Arc<dyn SupplyStore>,
    ) -> Self {
        Self {
            devices,
            samples,
            supplies,
        }
    }

    /// Persist one reading. Only `Active` flips to `Offline` and back;
    /// operator-set states (maintenance, inactive, error) are left alone.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if any write fails.
    pub fn ingest(&self, device: &Device, reading: &DeviceReading) -> Result<(), StoreError> {
        self.samples.save_sample(&reading.sample)?;
        for supply in &reading.supplies {
            self.supplies.save_supply(supply)?;
        }

        if reading.sample.is_online {
            self.devices
                .touch_last_seen(device.id, reading.sample.recorded_at)?;
            if device.status == DeviceStatus::Offline {
                tracing::info!("{} is back online", device.name);
                self.devices.set_device_status(device.id, DeviceStatus::Active)?;
            }
        } else if device.status == DeviceStatus::Active {
            tracing::warn!("{} went offline", device.name);
            self.devices.set_device_status(device.id, DeviceStatus::Offline)?;
        }
        Ok(())
    }

    /// Persist a supply-only refresh without recording a status sample.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if any upsert fails.
    pub fn ingest_supplies(&self, supplies: &[SupplyLevel]) -> Result<(), StoreError> {
        for supply in supplies {
            self.supplies.save_supply(supply)?;
        }
        Ok(())
    }
}

use btleplug::api::{Central as _, CentralEvent, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, PeripheralId};
use futures::StreamExt as _;
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::messages::{AdvertisementReport, clamp_rssi, manufacturer_payload, sender_id};

/// Turns BLE manufacturer data advertisements into [`AdvertisementReport`]s.
pub struct Scanner {
    adapter: Adapter,
    tx: mpsc::Sender<AdvertisementReport>,
}

impl Scanner {
    pub fn new(adapter: Adapter, tx: mpsc::Sender<AdvertisementReport>) -> Self {
        Scanner { adapter, tx }
    }

    /// Scans until the adapter's event stream ends or the receiver is gone.
    pub async fn run(self) -> anyhow::Result<()> {
        let mut events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;
        info!("Scanning for beacons");

        while let Some(event) = events.next().await {
            let CentralEvent::ManufacturerDataAdvertisement {
                id,
                manufacturer_data,
            } = event
            else {
                continue;
            };

            let (sender, rssi) = match self.sender_and_rssi(&id).await {
                Ok(Some(found)) => found,
                Ok(None) => {
                    debug!("No properties for {:?}", id);
                    continue;
                }
                Err(err) => {
                    warn!("Error reading properties of {:?}: {:?}", id, err);
                    continue;
                }
            };

            for (company_id, data) in manufacturer_data {
                let report = AdvertisementReport {
                    sender,
                    payload: manufacturer_payload(company_id, &data),
                    rssi,
                };
                if self.tx.send(report).await.is_err() {
                    debug!("Report receiver closed");
                    return self.stop().await;
                }
            }
        }

        info!("No more BLE events");
        Ok(())
    }

    async fn sender_and_rssi(&self, id: &PeripheralId) -> anyhow::Result<Option<(u16, i8)>> {
        let peripheral = self.adapter.peripheral(id).await?;
        let Some(properties) = peripheral.properties().await? else {
            return Ok(None);
        };
        // Missing RSSI is treated as out of range.
        let rssi = properties.rssi.map(clamp_rssi).unwrap_or(i8::MIN);
        Ok(Some((sender_id(properties.address.into_inner()), rssi)))
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.adapter.stop_scan().await?;
        Ok(())
    }
}

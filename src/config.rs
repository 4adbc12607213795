use std::time::Duration;

use anyhow::{Context as _, bail};
use serde_derive::Deserialize;

use crate::animation::frame_count;
use crate::color::FULL_BRIGHTNESS;
use crate::dispatcher::Settings;
use crate::roster::{Roster, RosterEntry};

const DEFAULT_RSSI_THRESHOLD: i8 = -48;
const DEFAULT_PRESENCE_TIMEOUT_MS: u64 = 1500;
const DEFAULT_STEP: u8 = 10;
const DEFAULT_RAMP_DURATION_MS: u64 = 1000;

#[derive(Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub mqtt: Option<MqttConfig>,
    pub devices: Option<Vec<BeaconDevice>>,
    pub scan: Option<ScanConfig>,
    pub animation: Option<AnimationConfig>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct MqttConfig {
    pub host: String,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub publisher_id: Option<String>,
    pub topic_path: Option<String>,
    pub keep_alive_seconds: Option<u64>,
    pub light_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct BeaconDevice {
    pub id: u16,
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ScanConfig {
    pub rssi_threshold: Option<i8>,
    pub presence_timeout_ms: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct AnimationConfig {
    pub step: Option<u8>,
    pub ramp_duration_ms: Option<u64>,
}

impl AppConfig {
    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        toml::de::from_str(contents).context("Invalid configuration file")
    }

    /// Configured beacons, or the two default beacon ids.
    pub fn roster(&self) -> anyhow::Result<Roster> {
        let entries = match &self.devices {
            Some(devices) => devices
                .iter()
                .map(|device| RosterEntry {
                    id: device.id,
                    name: device
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("0x{:04X}", device.id)),
                })
                .collect(),
            None => [0xAABB, 0xCCDD]
                .into_iter()
                .map(|id| RosterEntry {
                    id,
                    name: format!("0x{:04X}", id),
                })
                .collect(),
        };
        Ok(Roster::new(entries)?)
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        let scan = self.scan.clone().unwrap_or_default();
        let animation = self.animation.clone().unwrap_or_default();

        let presence_timeout_ms = scan
            .presence_timeout_ms
            .unwrap_or(DEFAULT_PRESENCE_TIMEOUT_MS);
        if presence_timeout_ms == 0 {
            bail!("scan.presence_timeout_ms must be greater than zero");
        }

        let step = animation.step.unwrap_or(DEFAULT_STEP);
        if step == 0 || step > FULL_BRIGHTNESS {
            bail!("animation.step must be between 1 and {}", FULL_BRIGHTNESS);
        }

        let ramp_duration_ms = animation
            .ramp_duration_ms
            .unwrap_or(DEFAULT_RAMP_DURATION_MS);
        if ramp_duration_ms == 0 {
            bail!("animation.ramp_duration_ms must be greater than zero");
        }

        Ok(Settings {
            rssi_threshold: scan.rssi_threshold.unwrap_or(DEFAULT_RSSI_THRESHOLD),
            presence_timeout: Duration::from_millis(presence_timeout_ms),
            step,
            frame_period: frame_period(Duration::from_millis(ramp_duration_ms), step),
        })
    }
}

/// Time between frames so that a full ramp takes `ramp_duration`.
pub fn frame_period(ramp_duration: Duration, step: u8) -> Duration {
    (ramp_duration / frame_count(step)).max(Duration::from_millis(1))
}

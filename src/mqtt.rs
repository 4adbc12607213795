use std::time::Duration;

use log::{debug, error, info};
use rumqttc::{MqttOptions, QoS};
use serde_derive::Serialize;

use crate::{color::Color, config};

#[derive(Debug, Clone)]
pub struct MqttClient {
    client: rumqttc::AsyncClient,
    state_topic: String,
}

#[derive(Debug, Serialize)]
struct RgbMessage {
    r: u8,
    g: u8,
    b: u8,
}

/// Home Assistant JSON schema light state.
#[derive(Debug, Serialize)]
struct LightStateMessage {
    state: &'static str,
    color_mode: &'static str,
    brightness: u8,
    color: RgbMessage,
}

impl From<Color> for LightStateMessage {
    fn from(color: Color) -> Self {
        LightStateMessage {
            state: if color.is_black() { "OFF" } else { "ON" },
            color_mode: "rgb",
            brightness: u8::MAX,
            color: RgbMessage {
                r: color.red,
                g: color.green,
                b: color.blue,
            },
        }
    }
}

impl MqttClient {
    pub fn new(config: &config::MqttConfig) -> (Self, rumqttc::EventLoop) {
        let publisher_id = config
            .publisher_id
            .as_ref()
            .unwrap_or(&"beacon-blend".to_string())
            .to_string();

        let mut mqttoptions = MqttOptions::new(
            publisher_id.clone(),
            config.host.clone(),
            config.port.unwrap_or(1883),
        );

        mqttoptions.set_keep_alive(Duration::from_secs(config.keep_alive_seconds.unwrap_or(5)));

        if let (Some(username), Some(password)) =
            (config.username.as_ref(), config.password.as_ref())
        {
            mqttoptions.set_credentials(username.clone(), password.clone());
        }

        let (client, eventloop) = rumqttc::AsyncClient::new(mqttoptions, 10);

        let topic_path = config
            .topic_path
            .clone()
            .unwrap_or("beacon-blend".to_string());
        let light_name = config.light_name.as_deref().unwrap_or("light");

        (
            MqttClient {
                client,
                state_topic: state_topic(&topic_path, &publisher_id, light_name),
            },
            eventloop,
        )
    }

    /// Drives the connection. Returns once a requested disconnect has been
    /// written, so every request queued before it has been sent.
    pub async fn event_loop(eventloop: &mut rumqttc::EventLoop) {
        loop {
            match eventloop.poll().await {
                Ok(event) if is_disconnect(&event) => {
                    debug!("Disconnect sent");
                    return;
                }
                Ok(rumqttc::Event::Incoming(rumqttc::Packet::ConnAck(_))) => {
                    debug!("Connection acknowledged");
                }
                Ok(rumqttc::Event::Incoming(rumqttc::Packet::PubAck(_))) => {
                    debug!("Publish acknowledged");
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Error polling MQTT event loop: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Queues a retained light state without waiting.
    pub fn publish_color(&self, color: Color) -> anyhow::Result<()> {
        let message = serde_json::to_string(&LightStateMessage::from(color))?;
        debug!("Publishing {} to {}", message, self.state_topic);
        self.client
            .try_publish(&self.state_topic, QoS::AtLeastOnce, true, message)?;
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<(), rumqttc::ClientError> {
        info!("Disconnecting MQTT client");
        self.client.disconnect().await
    }
}

fn is_disconnect(event: &rumqttc::Event) -> bool {
    matches!(event, rumqttc::Event::Outgoing(rumqttc::Outgoing::Disconnect))
}

fn state_topic(topic_path: &str, publisher_id: &str, light_name: &str) -> String {
    format!(
        "{}/{}/{}/state",
        topic_path,
        publisher_id,
        sanitize_name(light_name)
    )
}

fn sanitize_name(name: &str) -> String {
    // Remove any non-alphanumeric characters and replace spaces with underscores
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
}

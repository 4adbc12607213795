use log::{error, info};

use crate::color::Color;
use crate::mqtt::MqttClient;

/// Receives the blended color whenever it changes.
///
/// Called from the event loop, so implementations must not block.
pub trait LightOutput {
    fn render(&mut self, color: Color);
}

/// Writes every rendered color to the log.
#[derive(Debug, Default)]
pub struct LogOutput;

impl LightOutput for LogOutput {
    fn render(&mut self, color: Color) {
        info!("Light color {}", color);
    }
}

/// Publishes the color as a Home Assistant JSON light state.
pub struct MqttLightOutput {
    client: MqttClient,
}

impl MqttLightOutput {
    pub fn new(client: MqttClient) -> Self {
        MqttLightOutput { client }
    }
}

impl LightOutput for MqttLightOutput {
    fn render(&mut self, color: Color) {
        if let Err(err) = self.client.publish_color(color) {
            error!("Error publishing light color {}: {:?}", color, err);
        }
    }
}

/// Either output, picked at startup from the configuration.
pub enum Output {
    Log(LogOutput),
    Mqtt(MqttLightOutput),
}

impl LightOutput for Output {
    fn render(&mut self, color: Color) {
        match self {
            Output::Log(output) => output.render(color),
            Output::Mqtt(output) => output.render(color),
        }
    }
}

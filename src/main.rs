use std::path::PathBuf;

use anyhow::Context as _;
use btleplug::api::Manager as _;
use btleplug::platform::Manager;
use clap::Parser;
use log::info;

mod animation;
mod blend;
mod color;
mod config;
mod dispatcher;
mod manager;
mod messages;
mod mqtt;
mod output;
mod presence;
mod roster;
mod scanner;
mod timers;

/// Blends the colors of nearby BLE beacons into one light.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Log colors instead of publishing them, even if MQTT is configured
    #[arg(long)]
    log_only: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init_timed();
    let args = Args::parse();

    let config_contents = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Could not read {}", args.config.display()))?;
    let config = config::AppConfig::parse(&config_contents)?;

    let roster = config.roster()?;
    let settings = config.settings()?;
    info!("Tracking {} beacons with {:?}", roster.len(), settings);

    let (output, mqtt) = match (&config.mqtt, args.log_only) {
        (Some(mqtt_config), false) => {
            let (client, eventloop) = mqtt::MqttClient::new(mqtt_config);
            (
                output::Output::Mqtt(output::MqttLightOutput::new(client.clone())),
                Some((client, eventloop)),
            )
        }
        _ => (output::Output::Log(output::LogOutput), None),
    };

    let bt_manager = Manager::new().await?;

    // get the first bluetooth adapter
    let adapters = bt_manager.adapters().await?;
    let central = adapters
        .into_iter()
        .next()
        .context("No Bluetooth adapter found")?;

    let dispatcher = dispatcher::Dispatcher::new(roster, settings, output);
    let core = manager::Manager::new(central, dispatcher, mqtt);
    core.run_loop().await?;

    Ok(())
}

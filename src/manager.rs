use std::time::{Duration, Instant};

use anyhow::Context as _;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::dispatcher::{Dispatcher, Rejection};
use crate::messages::AdvertisementReport;
use crate::output::Output;
use crate::scanner::Scanner;
use crate::timers::DeadlineTimers;

const REPORT_QUEUE_LEN: usize = 32;
const MQTT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Manager {
    adapter: btleplug::platform::Adapter,
    dispatcher: Dispatcher<Output>,
    timers: DeadlineTimers,
    mqtt: Option<(crate::mqtt::MqttClient, rumqttc::EventLoop)>,
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

/// Waits for a finished scanner task and surfaces its error.
async fn scanner_outcome(task: JoinHandle<anyhow::Result<()>>) -> anyhow::Result<()> {
    let result = task.await.context("Scanner task panicked")?;
    if let Err(err) = &result {
        error!("Error handling BTLE events: {:?}", err);
    }
    result.context("BLE scanning failed")
}

impl Manager {
    pub fn new(
        adapter: btleplug::platform::Adapter,
        dispatcher: Dispatcher<Output>,
        mqtt: Option<(crate::mqtt::MqttClient, rumqttc::EventLoop)>,
    ) -> Self {
        Manager {
            adapter,
            dispatcher,
            timers: DeadlineTimers::new(),
            mqtt,
        }
    }

    /// Runs until Ctrl-C or until the scanner stops.
    ///
    /// Reports and timer expiries are handled one at a time on this task.
    /// A scanner failure is returned once the light has been turned off.
    pub async fn run_loop(mut self) -> anyhow::Result<()> {
        let (tx, mut reports) = mpsc::channel(REPORT_QUEUE_LEN);

        let mqtt = self.mqtt.take().map(|(client, mut eventloop)| {
            let task = tokio::task::spawn(async move {
                crate::mqtt::MqttClient::event_loop(&mut eventloop).await;
            });
            (client, task)
        });

        let scanner = Scanner::new(self.adapter.clone(), tx);
        let scanner_task = tokio::task::spawn(scanner.run());

        let mut scanner_stopped = false;
        loop {
            let deadline = self.timers.next_deadline();
            tokio::select! {
                report = reports.recv() => match report {
                    Some(report) => self.handle_report(report),
                    None => {
                        info!("Scanner stopped");
                        scanner_stopped = true;
                        break;
                    }
                },
                () = wait_until(deadline) => self.fire_due_timers(),
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl-C");
                    break;
                }
            }
        }
        info!("Exiting manager event loop");

        let scan_result = if scanner_stopped {
            scanner_outcome(scanner_task).await
        } else {
            scanner_task.abort();
            Ok(())
        };

        self.dispatcher.shutdown();
        if let Some((client, task)) = mqtt {
            client.disconnect().await?;
            // Let the event loop flush the final state and the disconnect.
            if tokio::time::timeout(MQTT_FLUSH_TIMEOUT, task).await.is_err() {
                warn!("Timed out flushing MQTT messages");
            }
        }

        scan_result
    }

    fn handle_report(&mut self, report: AdvertisementReport) {
        match self
            .dispatcher
            .handle_report(&report, Instant::now(), &mut self.timers)
        {
            Ok(slot) => debug!(
                "Accepted report from 0x{:04X} for slot {} ({} present)",
                report.sender,
                slot,
                self.dispatcher.present_count()
            ),
            Err(rejection @ Rejection::MalformedPayload(_)) => {
                warn!("Dropping report from 0x{:04X}: {}", report.sender, rejection)
            }
            Err(rejection) => debug!("Dropping report: {}", rejection),
        }
    }

    fn fire_due_timers(&mut self) {
        let now = Instant::now();
        while let Some(handle) = self.timers.pop_due(now) {
            self.dispatcher.handle_timer(handle, now, &mut self.timers);
        }
    }
}

//! MQTT command subscription.
//!
//! The broker connection runs on its own thread so keep-alives keep flowing
//! while the desk is busy with a long move. Payloads reach the caller through
//! a channel, in arrival order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use liftdesk::config::MqttSection;
use rumqttc::{Client, Connection, Event, MqttOptions, Packet, QoS};
use tracing::{debug, info, warn};

use crate::exit::{io_error, CliResult};

const REQUEST_CAPACITY: usize = 10;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// What the broker thread hands to the command loop.
#[derive(Debug)]
pub enum Delivery {
    /// First successful connection and subscription.
    Connected,
    /// Raw payload published on the command topic.
    Command(Bytes),
    /// The broker could not be reached at startup.
    Failed(String),
}

pub struct CommandSubscriber {
    client: Client,
    topic: String,
    deliveries: Receiver<Delivery>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CommandSubscriber {
    /// Start the broker thread. Connection errors arrive as [`Delivery::Failed`].
    pub fn connect(settings: &MqttSection) -> CliResult<Self> {
        let mut options =
            MqttOptions::new(settings.client_id.clone(), settings.host.clone(), settings.port);
        options.set_keep_alive(Duration::from_secs(settings.keep_alive_secs));

        let (client, connection) = Client::new(options, REQUEST_CAPACITY);
        let (tx, deliveries) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));

        let pump = Pump {
            connection,
            client: client.clone(),
            topic: settings.topic.clone(),
            tx,
            stop: Arc::clone(&stop),
        };
        let worker = thread::Builder::new()
            .name("mqtt".to_string())
            .spawn(move || pump.run())
            .map_err(|err| io_error("failed to start mqtt thread", err))?;

        info!(host = %settings.host, port = settings.port, topic = %settings.topic, "connecting to broker");
        Ok(Self {
            client,
            topic: settings.topic.clone(),
            deliveries,
            stop,
            worker: Some(worker),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Delivery, RecvTimeoutError> {
        self.deliveries.recv_timeout(timeout)
    }

    /// Disconnect from the broker and join the connection thread.
    ///
    /// Returns once the connection thread sees its next event. While a
    /// connect attempt is in flight that is at most the client's connection
    /// timeout.
    pub fn close(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        self.stop.store(true, Ordering::SeqCst);
        if let Err(err) = self.client.try_disconnect() {
            debug!(error = %err, "disconnect request not queued");
        }
        if worker.join().is_err() {
            warn!("mqtt thread panicked");
        }
        info!("command channel closed");
    }
}

impl Drop for CommandSubscriber {
    fn drop(&mut self) {
        self.close();
    }
}

struct Pump {
    connection: Connection,
    client: Client,
    topic: String,
    tx: Sender<Delivery>,
    stop: Arc<AtomicBool>,
}

impl Pump {
    fn run(mut self) {
        let mut connected = false;
        while !self.stop.load(Ordering::SeqCst) {
            // Blocking poll: a connect attempt runs to completion or to the
            // client's own connection timeout.
            let Ok(event) = self.connection.recv() else {
                break;
            };
            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    // Clean sessions drop subscriptions, so subscribe on every connect.
                    if let Err(err) = self.client.try_subscribe(self.topic.clone(), QoS::AtMostOnce) {
                        let _ = self.tx.send(Delivery::Failed(format!("subscribe failed: {err}")));
                        break;
                    }
                    if connected {
                        info!(topic = %self.topic, "reconnected to broker");
                    } else {
                        connected = true;
                        if self.tx.send(Delivery::Connected).is_err() {
                            break;
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!(topic = %publish.topic, bytes = publish.payload.len(), "command received");
                    if self.tx.send(Delivery::Command(publish.payload)).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    if !connected {
                        let _ = self.tx.send(Delivery::Failed(err.to_string()));
                        break;
                    }
                    warn!(error = %err, "broker connection lost, retrying");
                    thread::sleep(RECONNECT_DELAY);
                }
            }
        }
    }
}

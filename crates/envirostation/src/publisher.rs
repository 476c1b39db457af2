//! MQTT publisher with mutual TLS and acknowledged delivery.
//!
//! The broker speaks MQTT over TLS on port 8883 and authenticates the
//! station by its client certificate. Readings go out with QoS 1, and a
//! publish only counts as delivered once the broker's puback comes back.
//!
//! The wire protocol runs in a spawned driver task that polls the rumqttc
//! event loop; this module owns the handshake, the link state, and the
//! pending-ack bookkeeping around it. There is no automatic reconnect: when
//! the link dies the driver exits and the publisher reports failures until
//! `connect` is called again.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use enviro_common::{BrokerSettings, Reading, TlsSettings};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
    TlsConfiguration, Transport,
};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const REQUEST_CAPACITY: usize = 10;
const DRIVER_DRAIN: Duration = Duration::from_secs(2);

/// Where the broker link currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

type AckSlot = Arc<Mutex<Option<oneshot::Sender<bool>>>>;

struct ActiveConn {
    client: AsyncClient,
    driver: JoinHandle<()>,
    ack_slot: AckSlot,
}

/// Publishes readings to the broker and tracks the link state.
///
/// One publish is in flight at a time; `publish` holds the connection until
/// the broker acknowledges or the link dies, so callers see the real
/// delivery outcome rather than a queued write.
pub struct MqttPublisher {
    client_id: String,
    endpoint: String,
    port: u16,
    tls: TlsSettings,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    conn: Mutex<Option<ActiveConn>>,
}

impl MqttPublisher {
    pub fn new(client_id: String, broker: &BrokerSettings, tls: &TlsSettings) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            client_id,
            endpoint: broker.endpoint.clone(),
            port: broker.port,
            tls: tls.clone(),
            state_tx: Arc::new(state_tx),
            conn: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Open the broker link and wait for the handshake.
    ///
    /// Returns true once the broker accepts the connection, false if the
    /// credentials cannot be read, the broker refuses, or nothing happens
    /// within `timeout`. Any previous link is torn down first.
    pub async fn connect(&self, timeout: Duration) -> bool {
        self.disconnect().await;

        let (ca, client_cert, private_key) = match self.read_credentials() {
            Ok(creds) => creds,
            Err(e) => {
                error!("cannot load TLS credentials: {e:#}");
                return false;
            }
        };

        let mut options = MqttOptions::new(&self.client_id, &self.endpoint, self.port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        options.set_transport(Transport::Tls(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth: Some((client_cert, private_key)),
        }));

        info!(
            "connecting to {}:{} as {}",
            self.endpoint, self.port, self.client_id
        );
        self.state_tx.send_replace(ConnectionState::Connecting);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let ack_slot: AckSlot = Arc::new(Mutex::new(None));
        let driver = tokio::spawn(drive(
            eventloop,
            Arc::clone(&self.state_tx),
            Arc::clone(&ack_slot),
        ));
        *self.conn.lock().await = Some(ActiveConn {
            client,
            driver,
            ack_slot,
        });

        let mut state_rx = self.state_tx.subscribe();
        let connected = tokio::time::timeout(timeout, async {
            loop {
                match *state_rx.borrow_and_update() {
                    ConnectionState::Connected => return true,
                    ConnectionState::Disconnected => return false,
                    ConnectionState::Connecting => {}
                }
                if state_rx.changed().await.is_err() {
                    return false;
                }
            }
        })
        .await
        .unwrap_or(false);

        if !connected {
            warn!(
                "no broker handshake from {}:{} within {timeout:?}",
                self.endpoint, self.port
            );
            self.disconnect().await;
            return false;
        }

        info!("connected to {}:{}", self.endpoint, self.port);
        true
    }

    /// Publish one reading with QoS 1 and wait for the broker's ack.
    ///
    /// Returns false without touching the wire when the link is down. A
    /// pending ack resolves false when the link dies, so this never hangs
    /// past the keep-alive failure detection.
    pub async fn publish(&self, topic: &str, reading: &Reading) -> bool {
        let conn = self.conn.lock().await;
        let Some(active) = conn.as_ref() else {
            warn!("dropping reading for {topic}: not connected");
            return false;
        };
        if self.state() != ConnectionState::Connected {
            warn!("dropping reading for {topic}: link is down");
            return false;
        }

        let payload = match serde_json::to_vec(reading) {
            Ok(payload) => payload,
            Err(e) => {
                error!("cannot encode reading: {e}");
                return false;
            }
        };

        let (tx, rx) = oneshot::channel();
        *active.ack_slot.lock().await = Some(tx);

        if let Err(e) = active
            .client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
        {
            warn!("publish to {topic} failed: {e}");
            active.ack_slot.lock().await.take();
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Close the link. Safe to call when already disconnected.
    pub async fn disconnect(&self) {
        let Some(active) = self.conn.lock().await.take() else {
            return;
        };
        if let Err(e) = active.client.disconnect().await {
            debug!("disconnect request not sent: {e}");
        }
        let mut driver = active.driver;
        if tokio::time::timeout(DRIVER_DRAIN, &mut driver).await.is_err() {
            driver.abort();
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
        info!("mqtt link closed");
    }

    fn read_credentials(&self) -> anyhow::Result<(Vec<u8>, Vec<u8>, Vec<u8>)> {
        let ca = fs::read(&self.tls.root_ca)
            .with_context(|| format!("reading root CA {}", self.tls.root_ca.display()))?;
        let cert = fs::read(&self.tls.client_cert).with_context(|| {
            format!("reading client certificate {}", self.tls.client_cert.display())
        })?;
        let key = fs::read(&self.tls.private_key)
            .with_context(|| format!("reading private key {}", self.tls.private_key.display()))?;
        Ok((ca, cert, key))
    }
}

/// Poll the event loop until the link dies or a disconnect goes out.
async fn drive(
    mut eventloop: EventLoop,
    state: Arc<watch::Sender<ConnectionState>>,
    ack_slot: AckSlot,
) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if ack.code == ConnectReturnCode::Success {
                    state.send_replace(ConnectionState::Connected);
                } else {
                    warn!("broker refused connection: {:?}", ack.code);
                    state.send_replace(ConnectionState::Disconnected);
                    break;
                }
            }
            Ok(Event::Incoming(Packet::PubAck(_))) => {
                // One publish in flight at a time, so this ack belongs to
                // whoever is currently waiting.
                if let Some(tx) = ack_slot.lock().await.take() {
                    let _ = tx.send(true);
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                state.send_replace(ConnectionState::Disconnected);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                if *state.borrow() == ConnectionState::Connected {
                    warn!("mqtt link lost: {e}");
                } else {
                    debug!("mqtt link setup failed: {e}");
                }
                state.send_replace(ConnectionState::Disconnected);
                break;
            }
        }
    }
    // A waiter must not hang on a dead link.
    if let Some(tx) = ack_slot.lock().await.take() {
        let _ = tx.send(false);
    }
}

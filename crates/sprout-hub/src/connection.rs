//! The bus connection seam and its MQTT implementation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tracing::debug;

use crate::error::HubError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// The broker accepted a (re)connection. Subscriptions must be renewed.
    Connected,
    Message { topic: String, payload: Bytes },
    Other,
}

#[async_trait]
pub trait BusConnection: Send {
    /// Next event from the bus. After an `Err`, the following call is a
    /// reconnect attempt.
    async fn next_event(&mut self) -> anyhow::Result<BusEvent>;

    async fn subscribe(&mut self, topic: &str) -> Result<(), HubError>;

    async fn disconnect(&mut self);
}

#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub uri: String,
    pub client_id: String,
    pub keep_alive: Duration,
}

pub struct MqttConnection {
    client: AsyncClient,
    eventloop: EventLoop,
}

impl MqttConnection {
    /// Build the client. No network traffic happens until the first poll.
    pub fn new(settings: &MqttSettings) -> Result<Self, HubError> {
        let (host, port, use_tls) = parse_broker_url(&settings.uri).map_err(HubError::BrokerUrl)?;

        let mut options = MqttOptions::new(&settings.client_id, host, port);
        options.set_keep_alive(settings.keep_alive);
        if use_tls {
            options.set_transport(rumqttc::Transport::tls_with_default_config());
        }

        let (client, eventloop) = AsyncClient::new(options, 100);
        Ok(Self { client, eventloop })
    }
}

#[async_trait]
impl BusConnection for MqttConnection {
    async fn next_event(&mut self) -> anyhow::Result<BusEvent> {
        Ok(match self.eventloop.poll().await? {
            Event::Incoming(Packet::ConnAck(ack)) => {
                debug!("MQTT connack: {:?}", ack);
                BusEvent::Connected
            }
            Event::Incoming(Packet::Publish(publish)) => BusEvent::Message {
                topic: publish.topic,
                payload: publish.payload,
            },
            _ => BusEvent::Other,
        })
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), HubError> {
        self.client
            .subscribe(topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| HubError::Subscribe {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("Error disconnecting MQTT client: {}", e);
        }
    }
}

/// Parse an MQTT broker URL into (host, port, use_tls). A bare `host:port`
/// is read as plain `mqtt://`.
pub fn parse_broker_url(url: &str) -> Result<(String, u16, bool), String> {
    let (use_tls, rest) = if let Some(stripped) = url.strip_prefix("mqtt://") {
        (false, stripped)
    } else if let Some(stripped) = url.strip_prefix("mqtts://") {
        (true, stripped)
    } else if url.contains("://") {
        return Err(format!("unsupported scheme in {url}; use mqtt:// or mqtts://"));
    } else {
        (false, url)
    };

    let default_port = if use_tls { 8883 } else { 1883 };
    let (host, port) = match rest.rsplit_once(':') {
        Some((h, p)) => {
            let port = p.parse::<u16>().map_err(|_| format!("invalid port: {p}"))?;
            (h.to_string(), port)
        }
        None => (rest.to_string(), default_port),
    };

    if host.is_empty() {
        return Err("host cannot be empty".to_string());
    }
    Ok((host, port, use_tls))
}

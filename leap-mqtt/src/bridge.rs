//! Event forwarding and command handling between the gateway and the bus
//!
//! [`MqttBridge`] is transport agnostic: it publishes through a
//! [`BusPublisher`] and executes commands through a [`CommandDispatcher`].
//! [`run_bridge`] wires it to a rumqttc client, a gateway connection and a
//! reconnect supervisor.

use std::sync::Arc;
use std::time::Duration;

use leap_connection::{
    CommandDispatcher, Connector, GatewayConnection, GatewayEvent, ReconnectSupervisor,
};
use rumqttc::{AsyncClient, Event, EventLoop, Packet};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::BusPublisher;
use crate::topics::{BusCommand, Topics};

/// Capacity of the rumqttc request channel.
const MQTT_CHANNEL_CAPACITY: usize = 256;

/// Translates between gateway events and bus messages.
pub struct MqttBridge {
    topics: Topics,
    dispatcher: CommandDispatcher,
    publisher: Arc<dyn BusPublisher>,
}

impl MqttBridge {
    pub fn new(
        topics: Topics,
        dispatcher: CommandDispatcher,
        publisher: Arc<dyn BusPublisher>,
    ) -> Self {
        Self {
            topics,
            dispatcher,
            publisher,
        }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Subscribe to the command filters. Called on every broker connect.
    pub async fn subscribe_commands(&self) -> Result<()> {
        for filter in self.topics.command_filters() {
            self.publisher.subscribe(&filter).await?;
            info!(filter = %filter, "Subscribed to command topic");
        }
        Ok(())
    }

    /// Publish the messages for one gateway event. Publish failures are
    /// logged per message.
    pub async fn publish_event(&self, event: &GatewayEvent) {
        for message in self.topics.state_messages(event) {
            debug!(topic = %message.topic, payload = %message.payload, "Publishing");
            if let Err(e) = self
                .publisher
                .publish(&message.topic, message.payload, message.retain)
                .await
            {
                error!(topic = %message.topic, error = %e, "Failed to publish");
            }
        }
    }

    /// Decode and execute one incoming command.
    pub async fn handle_command(&self, topic: &str, payload: &[u8]) -> Result<()> {
        let command = self.topics.parse_command(topic, payload)?;
        info!(topic, ?command, "Command received");

        match command {
            BusCommand::SetZoneLevel { zone_id, level } => {
                self.dispatcher
                    .set_zone_level(&zone_id, i64::from(level.value()))
                    .await?;
            }
            BusCommand::SetZoneOnOff { zone_id, on } => {
                self.dispatcher.set_zone_on_off(&zone_id, on).await?;
            }
            BusCommand::PressButton { button_id } => {
                // Completion is logged by the dispatcher
                drop(self.dispatcher.press_button(&button_id)?);
            }
        }
        Ok(())
    }

    /// Publish gateway events until the bus closes.
    ///
    /// With `exit_on_disconnect`, returns `BridgeError::GatewayDisconnected`
    /// after publishing the first `Disconnected` event.
    pub async fn forward_events(
        &self,
        mut events: broadcast::Receiver<GatewayEvent>,
        exit_on_disconnect: bool,
    ) -> Result<()> {
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.publish_event(&event).await;
                    if exit_on_disconnect && event == GatewayEvent::Disconnected {
                        return Err(BridgeError::GatewayDisconnected);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "Event forwarder lagged behind");
                }
                Err(RecvError::Closed) => {
                    info!("Event bus closed");
                    return Ok(());
                }
            }
        }
    }

    /// React to one MQTT event loop notification.
    ///
    /// Commands are handled inline, in arrival order. Button presses finish
    /// on their own task.
    pub async fn handle_mqtt_event(&self, event: Event) {
        match event {
            Event::Incoming(Packet::ConnAck(_)) => {
                info!("MQTT connected");
                if let Err(e) = self.subscribe_commands().await {
                    error!(error = %e, "Failed to subscribe to command topics");
                }
            }
            Event::Incoming(Packet::Publish(message)) => {
                if let Err(e) = self.handle_command(&message.topic, &message.payload).await {
                    warn!(topic = %message.topic, error = %e, "Command failed");
                }
            }
            _ => {}
        }
    }
}

async fn poll_mqtt(bridge: Arc<MqttBridge>, mut eventloop: EventLoop) {
    loop {
        match eventloop.poll().await {
            Ok(event) => bridge.handle_mqtt_event(event).await,
            Err(e) => {
                error!(error = %e, "MQTT event loop error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Run the bridge until Ctrl-C.
///
/// Loads credentials, connects to the gateway through `connector`, connects
/// to the broker and forwards in both directions. A failed initial gateway
/// connect is not fatal; the reconnect supervisor keeps trying.
///
/// # Errors
///
/// Configuration and credential errors abort startup. With
/// `exit_on_disconnect` set, a gateway disconnect ends the bridge with
/// `BridgeError::GatewayDisconnected`.
pub async fn run_bridge(config: BridgeConfig, connector: Arc<dyn Connector>) -> Result<()> {
    config.validate()?;
    let credentials = config.load_credentials()?;
    let connection = GatewayConnection::new(connector, credentials, config.connection_config())?;
    connection.register_default_subscriptions()?;

    let (client, eventloop) = AsyncClient::new(config.mqtt_options(), MQTT_CHANNEL_CAPACITY);
    let bridge = Arc::new(MqttBridge::new(
        config.topics(),
        CommandDispatcher::new(connection.clone()),
        Arc::new(client.clone()),
    ));

    let events = connection.subscribe_events();
    let mut forwarder: JoinHandle<Result<()>> = {
        let bridge = Arc::clone(&bridge);
        let exit_on_disconnect = config.exit_on_disconnect;
        tokio::spawn(async move { bridge.forward_events(events, exit_on_disconnect).await })
    };
    let mqtt_task = tokio::spawn(poll_mqtt(Arc::clone(&bridge), eventloop));

    info!(
        gateway = %config.gateway_address,
        broker = %config.mqtt_host,
        prefix = %config.topic_prefix,
        "Starting bridge"
    );
    if let Err(e) = connection.connect().await {
        warn!(error = %e, "Initial gateway connect failed, supervisor will retry");
    }
    let supervisor = ReconnectSupervisor::for_connection(&connection);

    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down");
            Ok(())
        }
        result = &mut forwarder => match result {
            Ok(result) => result,
            Err(e) => Err(BridgeError::Task(format!("event forwarder: {e}"))),
        },
    };

    if let Err(e) = supervisor.shutdown().await {
        warn!(error = %e, "Supervisor shutdown failed");
    }
    connection.close();
    if let Err(e) = client
        .publish(
            bridge.topics().availability(),
            rumqttc::QoS::AtLeastOnce,
            true,
            "0",
        )
        .await
    {
        debug!(error = %e, "Could not publish final availability");
    }
    if let Err(e) = client.disconnect().await {
        debug!(error = %e, "MQTT disconnect failed");
    }
    forwarder.abort();
    mqtt_task.abort();

    outcome
}

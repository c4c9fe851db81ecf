//! Device Event Bridge
//!
//! Consumes [`DeviceEvent`]s from the platform BLE layer, runs raw reports
//! through the sensor codec and keeps the session registry current. Decoded
//! readings are also forwarded to an [`InputSink`] so a virtual-controller
//! backend can mirror them.

use crate::domain::models::{ControllerState, DeviceEvent};
use crate::domain::registry::{ControllerRegistry, RegistryError};
use crate::domain::sensor;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

/// Capacity of the device event channel. BLE notifications arrive at well
/// under 100 Hz per controller, so a small buffer is plenty.
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Consumer seam for the virtual-controller backend: two buttons and two
/// signed unit-range axes, scaled by the consumer to its native range.
pub trait InputSink: Send {
    fn apply(&mut self, state: &ControllerState);
}

/// Default sink when no virtual-controller backend is wired in.
pub struct TracingSink;

impl InputSink for TracingSink {
    fn apply(&mut self, state: &ControllerState) {
        trace!(
            "state: A={} B={} x={:.3} y={:.3}",
            state.button_a,
            state.button_b,
            state.axis_x,
            state.axis_y
        );
    }
}

/// Pumps device events into the registry until the channel closes.
pub struct EventBridge {
    registry: ControllerRegistry,
    sink: Box<dyn InputSink>,
}

impl EventBridge {
    pub fn new(registry: ControllerRegistry, sink: Box<dyn InputSink>) -> Self {
        Self { registry, sink }
    }

    /// Create the bounded event channel the BLE layer should feed.
    pub fn channel() -> (mpsc::Sender<DeviceEvent>, mpsc::Receiver<DeviceEvent>) {
        mpsc::channel(EVENT_CHANNEL_CAPACITY)
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<DeviceEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        debug!("Device event channel closed, bridge exiting");
    }

    fn handle(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::Connected { address } => match self.registry.attach(address) {
                Ok(slot) => info!("Controller {:#014X} attached to slot {}", address, slot),
                Err(RegistryError::NoFreeSlot) => {
                    // The registry keeps serving the four attached pads.
                    warn!(
                        "Controller {:#014X} rejected: all pad slots occupied",
                        address
                    );
                }
            },
            DeviceEvent::Disconnected { address } => {
                info!("Controller {:#014X} detached", address);
                self.registry.detach(address);
            }
            DeviceEvent::Report { address, data } => {
                // Short or garbled notifications decode to None and produce
                // no update; that is routine over BLE.
                if let Some(state) = sensor::decode_report(&data) {
                    self.registry.update_state(address, state);
                    self.sink.apply(&state);
                }
            }
            DeviceEvent::Battery { address, percent } => {
                debug!("Controller {:#014X} battery at {}%", address, percent);
                self.registry.update_battery(address, percent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingSink(Arc<Mutex<Vec<ControllerState>>>);

    impl InputSink for RecordingSink {
        fn apply(&mut self, state: &ControllerState) {
            self.0.lock().unwrap().push(*state);
        }
    }

    fn bridge_with_recorder(
        registry: ControllerRegistry,
    ) -> (EventBridge, Arc<Mutex<Vec<ControllerState>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bridge = EventBridge::new(registry, Box::new(RecordingSink(seen.clone())));
        (bridge, seen)
    }

    #[tokio::test]
    async fn events_flow_into_registry_and_sink() {
        let registry = ControllerRegistry::new();
        let (bridge, seen) = bridge_with_recorder(registry.clone());
        let (tx, rx) = EventBridge::channel();
        let task = tokio::spawn(bridge.run(rx));

        tx.send(DeviceEvent::Connected { address: 0xC0 })
            .await
            .unwrap();
        tx.send(DeviceEvent::Report {
            address: 0xC0,
            // button A, stick at calibrated max
            data: vec![0x01, 0x0C, 0x00, 0x24, 0x00],
        })
        .await
        .unwrap();
        tx.send(DeviceEvent::Battery {
            address: 0xC0,
            percent: 42,
        })
        .await
        .unwrap();
        drop(tx);
        task.await.unwrap();

        let snap = registry.snapshot(0);
        assert!(snap.connected);
        assert!(snap.state.button_a);
        assert_eq!(snap.state.axis_x, 1.0);
        assert_eq!(snap.battery_percent, Some(42));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn short_report_produces_no_update() {
        let registry = ControllerRegistry::new();
        let (bridge, seen) = bridge_with_recorder(registry.clone());
        let (tx, rx) = EventBridge::channel();
        let task = tokio::spawn(bridge.run(rx));

        tx.send(DeviceEvent::Connected { address: 0xC0 })
            .await
            .unwrap();
        tx.send(DeviceEvent::Report {
            address: 0xC0,
            data: vec![0x01, 0x02],
        })
        .await
        .unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(registry.snapshot(0).state, ControllerState::default());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn disconnect_frees_the_slot() {
        let registry = ControllerRegistry::new();
        let (bridge, _seen) = bridge_with_recorder(registry.clone());
        let (tx, rx) = EventBridge::channel();
        let task = tokio::spawn(bridge.run(rx));

        tx.send(DeviceEvent::Connected { address: 0xC0 })
            .await
            .unwrap();
        tx.send(DeviceEvent::Disconnected { address: 0xC0 })
            .await
            .unwrap();
        drop(tx);
        task.await.unwrap();

        assert!(!registry.snapshot(0).connected);
    }

    #[tokio::test]
    async fn fifth_controller_is_rejected_without_disturbing_others() {
        let registry = ControllerRegistry::new();
        let (bridge, _seen) = bridge_with_recorder(registry.clone());
        let (tx, rx) = EventBridge::channel();
        let task = tokio::spawn(bridge.run(rx));

        for address in [0xC0u64, 0xC1, 0xC2, 0xC3, 0xC4] {
            tx.send(DeviceEvent::Connected { address }).await.unwrap();
        }
        drop(tx);
        task.await.unwrap();

        let all = registry.snapshot_all();
        assert!(all.iter().all(|s| s.connected));
        assert!(all.iter().all(|s| s.address != 0xC4));
    }
}

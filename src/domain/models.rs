//! Shared data types for the bridge core.

/// One decoded controller reading.
///
/// Axes are normalized to [-1, 1] with up/right positive. Gyro values are in
/// deg/s and accel values in g, both still in device units; the DSU encoder
/// applies the protocol's fixed multipliers when serializing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerState {
    pub button_a: bool,
    pub button_b: bool,

    pub axis_x: f32,
    pub axis_y: f32,

    pub gyro_x: f32,
    pub gyro_y: f32,
    pub gyro_z: f32,

    pub accel_x: f32,
    pub accel_y: f32,
    pub accel_z: f32,
}

/// Read-only view of one pad slot, handed to the DSU encoder.
///
/// Unassigned slots are represented by the inactive placeholder rather than
/// an error: DSU clients poll fixed slots and expect a well-formed response
/// for absent pads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadSnapshot {
    pub slot: u8,
    pub connected: bool,
    /// 64-bit Bluetooth address of the occupant, 0 when unassigned.
    pub address: u64,
    pub state: ControllerState,
    pub battery_percent: Option<u8>,
}

impl PadSnapshot {
    /// Placeholder for a slot with no attached controller.
    pub fn inactive(slot: u8) -> Self {
        Self {
            slot,
            connected: false,
            address: 0,
            state: ControllerState::default(),
            battery_percent: None,
        }
    }
}

/// Events delivered by the platform BLE layer.
///
/// Ordering is preserved per device by the producer; events from distinct
/// devices may interleave arbitrarily.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A controller finished attaching and should be assigned a pad slot.
    Connected { address: u64 },
    /// A controller dropped off; its slot is freed.
    Disconnected { address: u64 },
    /// One raw notification from the data characteristic.
    Report { address: u64, data: Vec<u8> },
    /// Battery level notification, independent cadence from reports.
    Battery { address: u64, percent: u8 },
}

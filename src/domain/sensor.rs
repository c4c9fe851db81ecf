//! Sensor Codec
//!
//! Decodes raw notification packets from the controller into
//! [`ControllerState`] readings.

use crate::domain::models::ControllerState;

/// Minimum packet length carrying buttons and stick axes.
pub const REPORT_MIN_LEN: usize = 5;

/// Minimum packet length carrying the full report including motion data.
pub const REPORT_MOTION_LEN: usize = 17;

/// Calibrated raw range of the stick X byte.
const STICK_X_RAW: (f32, f32) = (32.0, 192.0);

/// Calibrated raw range of the stick Y byte.
const STICK_Y_RAW: (f32, f32) = (36.0, 180.0);

/// Mapped axis magnitudes below this snap to exactly 0.0.
const STICK_DEADZONE: f32 = 0.075;

/// Decode one raw notification packet.
///
/// Returns `None` when the packet is too short to carry a report. Short and
/// garbled notifications are expected over BLE and simply produce no update.
///
/// # Packet structure
///
/// ```text
/// [0]      : status byte; bits 0-1 encode the buttons
///            (0 = none, 1 = A, 2 = B, 3 = both)
/// [1]-[2]  : stick X nibble pair; raw X = low nibble of [1] ++ high nibble of [2]
/// [3]      : stick Y raw byte
/// [4]      : reserved
/// [5]-[10] : gyro X/Y/Z, one (value, fraction) byte pair per axis
/// [11]-[16]: accel X/Y/Z, one (value, fraction) byte pair per axis
/// ```
pub fn decode_report(bytes: &[u8]) -> Option<ControllerState> {
    if bytes.len() < REPORT_MIN_LEN {
        return None;
    }

    let (button_a, button_b) = decode_buttons(bytes[0]);

    let raw_x = ((bytes[1] & 0x0F) << 4) | (bytes[2] >> 4);
    let axis_x = map_axis(raw_x, STICK_X_RAW.0, STICK_X_RAW.1, false);
    let axis_y = map_axis(bytes[3], STICK_Y_RAW.0, STICK_Y_RAW.1, true);

    let mut state = ControllerState {
        button_a,
        button_b,
        axis_x,
        axis_y,
        ..Default::default()
    };

    // Motion bytes are optional; a 5-byte packet updates buttons/stick only.
    if bytes.len() >= REPORT_MOTION_LEN {
        state.gyro_x = decode_motion_pair(bytes[5], bytes[6]);
        state.gyro_y = decode_motion_pair(bytes[7], bytes[8]);
        state.gyro_z = decode_motion_pair(bytes[9], bytes[10]);
        state.accel_x = decode_motion_pair(bytes[11], bytes[12]);
        state.accel_y = decode_motion_pair(bytes[13], bytes[14]);
        state.accel_z = decode_motion_pair(bytes[15], bytes[16]);
    }

    Some(state)
}

/// Decode one signed motion value from its byte pair.
///
/// The controller uses a sign-magnitude scheme, not two's-complement:
/// the high nibble of `first` selects the sign (< 8 is negative), `second`
/// carries hundredths, and the integer magnitude counts down from 0xFF on
/// the positive side and up from 0x00 on the negative side.
pub fn decode_motion_pair(first: u8, second: u8) -> f32 {
    let negative = (first >> 4) < 8;
    let fraction = f32::from(second) / 100.0;

    let magnitude = if first == 0xFF {
        0.0
    } else if negative {
        f32::from(first) + fraction
    } else {
        f32::from(0xFF - first) + fraction
    };

    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// Buttons share a 2-bit field in the status byte.
fn decode_buttons(status: u8) -> (bool, bool) {
    match status & 0x03 {
        1 => (true, false),
        2 => (false, true),
        3 => (true, true),
        _ => (false, false),
    }
}

/// Map a raw stick byte onto [-1, 1], clamping to the calibrated source
/// range first. `invert` flips the mapped range to [1, -1] so "up" reads
/// positive on the Y axis.
fn map_axis(raw: u8, raw_min: f32, raw_max: f32, invert: bool) -> f32 {
    let clamped = f32::from(raw).clamp(raw_min, raw_max);
    let mut value = (clamped - raw_min) / (raw_max - raw_min) * 2.0 - 1.0;
    if invert {
        value = -value;
    }
    apply_deadzone(value)
}

fn apply_deadzone(value: f32) -> f32 {
    if value.abs() < STICK_DEADZONE {
        0.0
    } else {
        value
    }
}

//! DSU Packet Codec
//!
//! Binary encode/decode for the Cemuhook/DSU wire protocol: a 16-byte header
//! (magic, protocol version, payload length, CRC32, sender id) followed by a
//! message-specific payload. All multi-byte fields are little-endian; the CRC
//! is CRC-32/ISO-HDLC computed over the whole packet with the CRC field
//! zeroed.
//!
//! Any validation failure on the decode path means "ignore the datagram":
//! no response, no error. Malformed or malicious input is expected on an
//! open UDP port.

use crate::domain::models::PadSnapshot;

/// Magic prefix on client packets.
pub const CLIENT_MAGIC: &[u8; 4] = b"DSUC";

/// Magic prefix on server packets.
pub const SERVER_MAGIC: &[u8; 4] = b"DSUS";

/// Highest protocol version this server speaks.
pub const PROTOCOL_VERSION: u16 = 1001;

/// Fixed header length; total packet length = header + payload length field.
pub const HEADER_LEN: usize = 16;

/// Total length of a pad-data response packet.
pub const PAD_DATA_PACKET_LEN: usize = 100;

pub const MSG_VERSION: u32 = 0x0010_0000;
pub const MSG_LIST_PORTS: u32 = 0x0010_0001;
pub const MSG_PAD_DATA: u32 = 0x0010_0002;

/// DSU "accel x10, gyro x20" scaling applied when serializing motion values.
const ACCEL_SCALE: f32 = 10.0;
const GYRO_SCALE: f32 = 20.0;

/// A validated incoming client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// Protocol version query; always answered.
    Version,
    /// Port/controller info query for the listed slots.
    ListPorts { slots: Vec<u8> },
    /// Pad data subscription. The registration filter is accepted but the
    /// server answers with all four slots regardless (superset response).
    PadData {
        registration: u8,
        slot: u8,
        address: [u8; 6],
    },
}

/// Check the CRC of a received packet: bytes 8..12 are zeroed before
/// recomputing.
pub fn verify_crc(datagram: &[u8]) -> bool {
    if datagram.len() < HEADER_LEN {
        return false;
    }
    let stored = u32::from_le_bytes(datagram[8..12].try_into().unwrap());
    let mut scratch = datagram.to_vec();
    scratch[8..12].fill(0);
    crc32fast::hash(&scratch) == stored
}

/// Decode and validate one client datagram.
///
/// Returns `None` for anything that should be ignored: short packets, wrong
/// magic, a protocol version newer than ours, a declared length exceeding
/// the received length, CRC mismatch, unknown message types, and out-of-range
/// counts or slot indices.
pub fn decode_request(datagram: &[u8]) -> Option<ClientRequest> {
    if datagram.len() < HEADER_LEN + 4 {
        return None;
    }
    if &datagram[0..4] != CLIENT_MAGIC {
        return None;
    }

    let version = u16::from_le_bytes(datagram[4..6].try_into().unwrap());
    if version > PROTOCOL_VERSION {
        return None;
    }

    let payload_len = u16::from_le_bytes(datagram[6..8].try_into().unwrap()) as usize;
    if HEADER_LEN + payload_len > datagram.len() {
        return None;
    }

    if !verify_crc(datagram) {
        return None;
    }

    let message_type = u32::from_le_bytes(datagram[16..20].try_into().unwrap());
    match message_type {
        MSG_VERSION => Some(ClientRequest::Version),
        MSG_LIST_PORTS => decode_list_ports(datagram, payload_len),
        MSG_PAD_DATA => decode_pad_data(datagram, payload_len),
        _ => None,
    }
}

fn decode_list_ports(datagram: &[u8], payload_len: usize) -> Option<ClientRequest> {
    if payload_len < 8 {
        return None;
    }
    let count = i32::from_le_bytes(datagram[20..24].try_into().unwrap());
    if !(0..=4).contains(&count) {
        return None;
    }
    let count = count as usize;
    if payload_len < 8 + count {
        return None;
    }

    let slots = datagram[24..24 + count].to_vec();
    // One bad index invalidates the whole request; no partial response.
    if slots.iter().any(|&slot| slot >= 4) {
        return None;
    }
    Some(ClientRequest::ListPorts { slots })
}

fn decode_pad_data(datagram: &[u8], payload_len: usize) -> Option<ClientRequest> {
    if payload_len < 12 {
        return None;
    }
    Some(ClientRequest::PadData {
        registration: datagram[20],
        slot: datagram[21],
        address: datagram[22..28].try_into().unwrap(),
    })
}

/// Build a server packet around `payload`, then compute and patch the CRC.
/// The emitted length is always exactly header + payload.
fn encode_response(server_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(HEADER_LEN + payload.len());
    packet.extend_from_slice(SERVER_MAGIC);
    packet.extend_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    packet.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    packet.extend_from_slice(&[0u8; 4]); // CRC placeholder
    packet.extend_from_slice(&server_id.to_le_bytes());
    packet.extend_from_slice(payload);

    let crc = crc32fast::hash(&packet);
    packet[8..12].copy_from_slice(&crc.to_le_bytes());
    packet
}

/// Version response: message type + the highest supported version.
pub fn encode_version_response(server_id: u32) -> Vec<u8> {
    let mut payload = [0u8; 6];
    payload[0..4].copy_from_slice(&MSG_VERSION.to_le_bytes());
    payload[4..6].copy_from_slice(&PROTOCOL_VERSION.to_le_bytes());
    encode_response(server_id, &payload)
}

/// Port-info response for one slot.
pub fn encode_port_info(server_id: u32, snapshot: &PadSnapshot) -> Vec<u8> {
    let mut payload = [0u8; 16];
    payload[0..4].copy_from_slice(&MSG_LIST_PORTS.to_le_bytes());
    payload[4..15].copy_from_slice(&pad_identity(snapshot));
    // payload[15] stays 0: protocol-mandated terminator byte
    encode_response(server_id, &payload)
}

/// Pad-data response for one slot; always exactly 100 bytes.
///
/// # Layout (offsets within the full packet)
///
/// ```text
/// [16-19] message type            [44-47] dpad analog (unused)
/// [20-30] pad identity (see       [48-55] analog Y,B,A,X,R1,L1,R2,L2
///         pad_identity)           [56-67] touch pads (always inactive)
/// [31]    active flag             [68-75] timestamp, microseconds
/// [32-35] packet counter          [76-87] accel X/Y/Z, f32, x10
/// [36-39] digital buttons         [88-99] gyro pitch/yaw/roll, f32, x20
/// [40-43] stick bytes
/// ```
pub fn encode_pad_data(
    server_id: u32,
    snapshot: &PadSnapshot,
    counter: u32,
    timestamp_us: u64,
) -> Vec<u8> {
    let mut payload = [0u8; PAD_DATA_PACKET_LEN - HEADER_LEN];
    payload[0..4].copy_from_slice(&MSG_PAD_DATA.to_le_bytes());
    payload[4..15].copy_from_slice(&pad_identity(snapshot));
    payload[16..20].copy_from_slice(&counter.to_le_bytes());

    // Absent pads report all-zero data after the counter.
    if !snapshot.connected {
        return encode_response(server_id, &payload);
    }

    let state = &snapshot.state;
    payload[15] = 1; // active

    // Digital buttons: A and B on the face-button bitfield, with matching
    // analog pressure bytes so clients that only read analog still work.
    if state.button_a {
        payload[21] |= 1 << 5;
        payload[34] = 0xFF;
    }
    if state.button_b {
        payload[21] |= 1 << 6;
        payload[33] = 0xFF;
    }

    // Left stick carries the touchpad-derived axes; right stick rests at
    // center. DSU sticks are 0..255 with 128 neutral, plus up/right.
    payload[24] = stick_byte(state.axis_x);
    payload[25] = stick_byte(state.axis_y);
    payload[26] = 128;
    payload[27] = 128;

    payload[52..60].copy_from_slice(&timestamp_us.to_le_bytes());

    payload[60..64].copy_from_slice(&(state.accel_x * ACCEL_SCALE).to_le_bytes());
    payload[64..68].copy_from_slice(&(state.accel_y * ACCEL_SCALE).to_le_bytes());
    payload[68..72].copy_from_slice(&(state.accel_z * ACCEL_SCALE).to_le_bytes());

    payload[72..76].copy_from_slice(&(state.gyro_x * GYRO_SCALE).to_le_bytes());
    payload[76..80].copy_from_slice(&(state.gyro_y * GYRO_SCALE).to_le_bytes());
    payload[80..84].copy_from_slice(&(state.gyro_z * GYRO_SCALE).to_le_bytes());

    encode_response(server_id, &payload)
}

/// The 11-byte identity block shared by port-info and pad-data responses:
/// slot, state, model, connection type, MAC, battery level.
fn pad_identity(snapshot: &PadSnapshot) -> [u8; 11] {
    let mut block = [0u8; 11];
    block[0] = snapshot.slot;
    if snapshot.connected {
        block[1] = 2; // state: connected
        block[2] = 2; // model: full gyro
        block[3] = 2; // connection: bluetooth
        block[4..10].copy_from_slice(&mac_bytes(snapshot.address));
        block[10] = battery_level(snapshot.battery_percent);
    }
    block
}

/// Lower 48 bits of the Bluetooth address, most significant byte first.
fn mac_bytes(address: u64) -> [u8; 6] {
    let bytes = address.to_be_bytes();
    bytes[2..8].try_into().unwrap()
}

/// Map a battery percentage onto the DSU battery enum
/// (1 dying .. 5 full; 0 when unknown).
fn battery_level(percent: Option<u8>) -> u8 {
    match percent {
        None => 0,
        Some(p) if p <= 5 => 1,
        Some(p) if p <= 25 => 2,
        Some(p) if p <= 50 => 3,
        Some(p) if p <= 75 => 4,
        Some(_) => 5,
    }
}

/// Map a [-1, 1] axis onto the protocol's 0..255 stick byte, 128 neutral.
fn stick_byte(value: f32) -> u8 {
    let scaled = (value.clamp(-1.0, 1.0) * 127.0).round() as i16 + 128;
    scaled.clamp(0, 255) as u8
}

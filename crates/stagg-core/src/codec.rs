//! Wire format of the kettle's serial characteristic.
//!
//! Outbound traffic is either the fixed authentication sequence or an
//! 8-byte command frame:
//!
//! ```text
//! EF DD 0A <seq> <type> <value> <seq+value> <type>
//! ```
//!
//! Inbound traffic arrives as pairs of notifications: a header starting
//! with `EF DD <type>` followed by a payload buffer. [`decode_notifications`]
//! folds an ordered list of buffers into a [`DeviceState`].

use tracing::debug;

use stagg_types::{Command, DeviceState, TemperatureUnit};

/// Magic prefix of every frame, in both directions.
pub const FRAME_MAGIC: [u8; 2] = [0xEF, 0xDD];

/// Third byte of an outbound command frame.
pub const COMMAND_FLAG: u8 = 0x0A;

/// Length of an encoded command frame.
pub const COMMAND_FRAME_LEN: usize = 8;

/// Authentication handshake, sent verbatim once per connection.
pub const AUTH_SEQUENCE: [u8; 20] = [
    0xEF, 0xDD, 0x0B, 0x30, 0x31, 0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x30, 0x31,
    0x32, 0x33, 0x34, 0x9A, 0x6D,
];

/// Fixed "heater on" frame understood by early EKG+ firmware.
pub const LEGACY_POWER_ON: [u8; 8] = [0xEF, 0xDD, 0x0A, 0x00, 0x00, 0x01, 0x01, 0x00];

/// Fixed "heater off" frame understood by early EKG+ firmware.
pub const LEGACY_POWER_OFF: [u8; 8] = [0xEF, 0xDD, 0x0A, 0x04, 0x00, 0x00, 0x04, 0x00];

/// Notification message types.
pub mod message {
    /// Heater on/off.
    pub const POWER: u8 = 0;
    /// Hold mode on/off.
    pub const HOLD: u8 = 1;
    /// Target temperature and unit.
    pub const TARGET_TEMPERATURE: u8 = 2;
    /// Current temperature and unit.
    pub const CURRENT_TEMPERATURE: u8 = 3;
    /// Hold countdown.
    pub const COUNTDOWN: u8 = 4;
    /// Kettle on/off base.
    pub const KETTLE_POSITION: u8 = 8;
}

/// Encode a command into its 8-byte frame.
///
/// ```
/// use stagg_core::codec::encode_command;
/// use stagg_types::Command;
///
/// let frame = encode_command(5, Command::power(true));
/// assert_eq!(frame, [0xEF, 0xDD, 0x0A, 5, 0, 1, 6, 0]);
/// ```
pub fn encode_command(sequence: u8, command: Command) -> [u8; COMMAND_FRAME_LEN] {
    let type_byte = command.kind.type_byte();
    [
        FRAME_MAGIC[0],
        FRAME_MAGIC[1],
        COMMAND_FLAG,
        sequence,
        type_byte,
        command.value,
        sequence.wrapping_add(command.value),
        type_byte,
    ]
}

/// The authentication handshake bytes.
pub fn auth_sequence() -> &'static [u8] {
    &AUTH_SEQUENCE
}

/// Fixed power frame for firmware that ignores sequenced power commands.
pub fn legacy_power_frame(on: bool) -> [u8; COMMAND_FRAME_LEN] {
    if on { LEGACY_POWER_ON } else { LEGACY_POWER_OFF }
}

fn is_header(buffer: &[u8]) -> bool {
    buffer.len() >= 3 && buffer[..2] == FRAME_MAGIC
}

/// Decode an ordered list of notification buffers into a state snapshot.
///
/// Buffers are paired by position: a valid header at `i` takes the buffer
/// at `i + 1` as its payload. A buffer that is not a header is skipped on
/// its own, a trailing header without payload is dropped, and unknown
/// message types are ignored. Later messages overwrite earlier ones.
///
/// This never fails; input with nothing decodable yields an empty state.
pub fn decode_notifications<B: AsRef<[u8]>>(buffers: &[B]) -> DeviceState {
    let mut state = DeviceState::default();

    let mut i = 0;
    while i + 1 < buffers.len() {
        let header = buffers[i].as_ref();
        if !is_header(header) {
            i += 1;
            continue;
        }

        let payload = buffers[i + 1].as_ref();
        apply_message(&mut state, header[2], payload);
        i += 2;
    }

    state
}

fn apply_message(state: &mut DeviceState, message_type: u8, payload: &[u8]) {
    match (message_type, payload) {
        (message::POWER, [value, ..]) => {
            state.power = Some(*value == 1);
            debug!("Power: {}", *value == 1);
        }
        (message::HOLD, [value, ..]) => {
            state.hold = Some(*value == 1);
            debug!("Hold: {}", *value == 1);
        }
        (message::TARGET_TEMPERATURE, [temp, unit, ..]) => {
            let unit = TemperatureUnit::from_flag(*unit);
            state.target_temperature = Some(*temp);
            state.temperature_unit = Some(unit);
            debug!("Target temperature: {}{}", temp, unit.symbol());
        }
        (message::CURRENT_TEMPERATURE, [temp, unit, ..]) => {
            let unit = TemperatureUnit::from_flag(*unit);
            state.current_temperature = Some(*temp);
            state.temperature_unit = Some(unit);
            debug!("Current temperature: {}{}", temp, unit.symbol());
        }
        (message::COUNTDOWN, [value, ..]) => {
            state.countdown_seconds = Some(*value);
            debug!("Countdown: {}s", value);
        }
        (message::KETTLE_POSITION, [value, ..]) => {
            state.lifted = Some(*value == 0);
            debug!("Lifted: {}", *value == 0);
        }
        (
            message::POWER
            | message::HOLD
            | message::TARGET_TEMPERATURE
            | message::CURRENT_TEMPERATURE
            | message::COUNTDOWN
            | message::KETTLE_POSITION,
            _,
        ) => {
            debug!(
                "Payload too short for message type {}: {} byte(s)",
                message_type,
                payload.len()
            );
        }
        _ => debug!("Unknown message type: {}", message_type),
    }
}

/// Render bytes as lowercase hex for log lines.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

//! Binary action-table decoder.
//!
//! Layout (all multi-byte fields little-endian):
//!
//! ```text
//! header:  [array type 0x48] [element type 0x41] [count: u16]
//! entry:   [len L] [input/options] [transition] [endpoint] [cluster: u16] [command template: L-5 bytes]
//! ```
//!
//! `input/options`: low nibble is the input number, high nibble option flags.
//! `transition`: bit 7 has-alternate, bit 6 is-alternate, bits 3:2 initial
//! state, bits 1:0 final state. The first template byte is the command id,
//! the rest is its payload.

use std::fmt;

use crate::error::ActionTableError;

pub const ARRAY_TYPE_MARKER: u8 = 0x48;
pub const ELEMENT_TYPE_MARKER: u8 = 0x41;
pub const HEADER_LEN: usize = 4;
/// input/options + transition + endpoint + cluster id.
pub const MIN_ENTRY_LEN: usize = 5;

const HAS_ALTERNATE: u8 = 0x80;
const IS_ALTERNATE: u8 = 0x40;

/// Physical input state in a transition, 2-bit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputState {
    Ignore,
    Pressed,
    KeptPressed,
    Released,
}

impl InputState {
    /// Decode the low two bits of `code`.
    pub const fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0 => InputState::Ignore,
            1 => InputState::Pressed,
            2 => InputState::KeptPressed,
            _ => InputState::Released,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            InputState::Ignore => 0,
            InputState::Pressed => 1,
            InputState::KeptPressed => 2,
            InputState::Released => 3,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            InputState::Ignore => "ignore",
            InputState::Pressed => "pressed",
            InputState::KeptPressed => "kept_pressed",
            InputState::Released => "released",
        }
    }
}

impl fmt::Display for InputState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a physical input was operated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PressType {
    ShortPress,
    LongPress,
    Pressed,
    Released,
}

impl PressType {
    pub const fn name(self) -> &'static str {
        match self {
            PressType::ShortPress => "short_press",
            PressType::LongPress => "long_press",
            PressType::Pressed => "pressed",
            PressType::Released => "released",
        }
    }
}

impl fmt::Display for PressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a transition.
///
/// The table was worked out from observed device behaviour and is not
/// documented by the vendor; double presses in particular are not modelled.
pub const fn derive_press_type(initial: InputState, final_state: InputState) -> PressType {
    match (initial, final_state) {
        (InputState::Pressed, InputState::Released) => PressType::ShortPress,
        (InputState::KeptPressed, _) => PressType::LongPress,
        (InputState::Released, InputState::Pressed) => PressType::Pressed,
        (_, InputState::Released) => PressType::Released,
        _ => PressType::Pressed,
    }
}

/// Key identifying a bus command for reverse lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandSignature {
    pub endpoint: u8,
    pub cluster_id: u16,
    pub command_id: u8,
    pub payload: Vec<u8>,
}

impl CommandSignature {
    pub fn new(endpoint: u8, cluster_id: u16, command_id: u8, payload: &[u8]) -> Self {
        Self {
            endpoint,
            cluster_id,
            command_id,
            payload: payload.to_vec(),
        }
    }
}

impl fmt::Display for CommandSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ep={} cluster=0x{:04X} cmd=0x{:02X} payload=[",
            self.endpoint, self.cluster_id, self.command_id
        )?;
        for (i, b) in self.payload.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        f.write_str("]")
    }
}

/// One decoded action-table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputAction {
    pub input_number: u8,
    pub input_options: u8,
    pub initial_state: InputState,
    pub final_state: InputState,
    pub has_alternate: bool,
    pub is_alternate: bool,
    pub source_endpoint: u8,
    pub cluster_id: u16,
    pub command_id: u8,
    pub command_payload: Vec<u8>,
    pub press_type: PressType,
}

impl InputAction {
    pub fn command_signature(&self) -> CommandSignature {
        CommandSignature::new(
            self.source_endpoint,
            self.cluster_id,
            self.command_id,
            &self.command_payload,
        )
    }
}

/// Decode a raw action table.
///
/// A bad header is fatal. A bad entry is logged and skipped, and parsing
/// resumes after the entry's declared length. An entry whose declared length
/// runs past the end of the data is decoded from the bytes that are there.
pub fn parse(raw: &[u8]) -> Result<Vec<InputAction>, ActionTableError> {
    if raw.len() < HEADER_LEN {
        return Err(ActionTableError::Format(format!(
            "need at least {HEADER_LEN} header bytes, got {}",
            raw.len()
        )));
    }
    if raw[0] != ARRAY_TYPE_MARKER {
        return Err(ActionTableError::Format(format!(
            "array type marker 0x{:02X}, expected 0x{ARRAY_TYPE_MARKER:02X}",
            raw[0]
        )));
    }
    if raw[1] != ELEMENT_TYPE_MARKER {
        return Err(ActionTableError::Format(format!(
            "element type marker 0x{:02X}, expected 0x{ELEMENT_TYPE_MARKER:02X}",
            raw[1]
        )));
    }
    let count = usize::from(u16::from_le_bytes([raw[2], raw[3]]));

    // Each entry needs at least a length byte; don't trust `count` for sizing.
    let mut actions = Vec::with_capacity(count.min(raw.len() - HEADER_LEN));
    let mut offset = HEADER_LEN;
    for index in 0..count {
        if offset >= raw.len() {
            tracing::warn!(
                declared = count,
                decoded = index,
                "action table ends before declared entry count"
            );
            break;
        }
        let declared = usize::from(raw[offset]);
        let body_start = offset + 1;
        let available = raw.len() - body_start;
        if declared > available {
            tracing::warn!(index, offset, declared, available, "action entry truncated");
        }
        let body = &raw[body_start..body_start + declared.min(available)];

        match decode_entry(body) {
            Ok(action) => {
                tracing::trace!(index, input = action.input_number, press = %action.press_type, "action decoded");
                actions.push(action);
            }
            Err(reason) => {
                let err = ActionTableError::EntryDecode {
                    index,
                    offset,
                    reason,
                };
                tracing::warn!(error = %err, "skipping malformed action entry");
            }
        }
        offset = body_start + declared;
    }
    if offset < raw.len() {
        tracing::debug!(trailing = raw.len() - offset, "ignoring bytes after last action entry");
    }
    Ok(actions)
}

fn decode_entry(body: &[u8]) -> Result<InputAction, String> {
    let [input_and_options, transition, endpoint, cluster_lo, cluster_hi, template @ ..] = body
    else {
        return Err(format!(
            "entry has {} bytes, need at least {MIN_ENTRY_LEN}",
            body.len()
        ));
    };
    let Some((&command_id, payload)) = template.split_first() else {
        return Err("empty command template".to_string());
    };

    let initial_state = InputState::from_code(transition >> 2);
    let final_state = InputState::from_code(*transition);
    Ok(InputAction {
        input_number: input_and_options & 0x0F,
        input_options: input_and_options >> 4,
        initial_state,
        final_state,
        has_alternate: transition & HAS_ALTERNATE != 0,
        is_alternate: transition & IS_ALTERNATE != 0,
        source_endpoint: *endpoint,
        cluster_id: u16::from_le_bytes([*cluster_lo, *cluster_hi]),
        command_id,
        command_payload: payload.to_vec(),
        press_type: derive_press_type(initial_state, final_state),
    })
}

//! Broadcast command encoding
//!
//! The simulator accepts a closed set of control messages (camera, replay, pit
//! and chat commands). Each kind takes a fixed argument shape; the shape is
//! looked up from the kind, never inferred from whatever arguments were passed.
//!
//! | Shape          | Kinds                                                               |
//! |----------------|---------------------------------------------------------------------|
//! | `(int, int, int)` | `CamSwitchPos`, `CamSwitchNum`                                   |
//! | `(int, -1, -1)`   | `ReplaySearch`, `ReplaySetState`, `CamSetState`, `TelemCommand`, `VideoCapture` |
//! | `(int, int, -1)`  | `ReloadTextures`, `ChatCommand`, `ReplaySetPlaySpeed`            |
//! | `(int, float)`    | `PitCommand`, `FFBCommand`, `ReplaySearchSessionTime`, `ReplaySetPlayPosition` |
//!
//! On the wire a message is the pair of notify-message parameters the SDK sends:
//! `wparam = MAKELONG(kind, arg1)` and either `lparam = MAKELONG(arg2, arg3)` or,
//! for the float shape, `lparam = (int)(arg2 * 65536.0)`.
//!
//! ```rust
//! use racebridge::{BroadcastKind, CommandArg, encode};
//!
//! let msg = encode(BroadcastKind::PitCommand, 3.into(), Some(0.5.into()), None).unwrap();
//! assert_eq!(msg.lparam(), 32768);
//!
//! assert!(encode(BroadcastKind::PitCommand, 3.into(), None, None).is_err());
//! assert!(encode(9999, 1.into(), Some(2.into()), Some(3.into())).is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Result, TelemetryError};

/// Producer-recognized broadcast message kinds (irsdk_BroadcastMsg).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[repr(u16)]
pub enum BroadcastKind {
    CamSwitchPos = 0,
    CamSwitchNum = 1,
    CamSetState = 2,
    ReplaySetPlaySpeed = 3,
    ReplaySetPlayPosition = 4,
    ReplaySearch = 5,
    ReplaySetState = 6,
    ReloadTextures = 7,
    ChatCommand = 8,
    PitCommand = 9,
    TelemCommand = 10,
    FFBCommand = 11,
    ReplaySearchSessionTime = 12,
    VideoCapture = 13,
}

/// Argument shape a broadcast kind requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// Three integers
    ThreeInts,
    /// One integer; the other two are sent as -1
    OneInt,
    /// Two integers; the third is sent as -1
    TwoInts,
    /// An integer and a float
    IntFloat,
}

impl BroadcastKind {
    pub const ALL: [BroadcastKind; 14] = [
        BroadcastKind::CamSwitchPos,
        BroadcastKind::CamSwitchNum,
        BroadcastKind::CamSetState,
        BroadcastKind::ReplaySetPlaySpeed,
        BroadcastKind::ReplaySetPlayPosition,
        BroadcastKind::ReplaySearch,
        BroadcastKind::ReplaySetState,
        BroadcastKind::ReloadTextures,
        BroadcastKind::ChatCommand,
        BroadcastKind::PitCommand,
        BroadcastKind::TelemCommand,
        BroadcastKind::FFBCommand,
        BroadcastKind::ReplaySearchSessionTime,
        BroadcastKind::VideoCapture,
    ];

    /// The argument shape the producer expects for this kind.
    pub const fn shape(self) -> ArgShape {
        match self {
            BroadcastKind::CamSwitchPos | BroadcastKind::CamSwitchNum => ArgShape::ThreeInts,
            BroadcastKind::ReplaySearch
            | BroadcastKind::ReplaySetState
            | BroadcastKind::CamSetState
            | BroadcastKind::TelemCommand
            | BroadcastKind::VideoCapture => ArgShape::OneInt,
            BroadcastKind::ReloadTextures
            | BroadcastKind::ChatCommand
            | BroadcastKind::ReplaySetPlaySpeed => ArgShape::TwoInts,
            BroadcastKind::PitCommand
            | BroadcastKind::FFBCommand
            | BroadcastKind::ReplaySearchSessionTime
            | BroadcastKind::ReplaySetPlayPosition => ArgShape::IntFloat,
        }
    }

    /// Look a kind up by its numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| i32::from(*kind) == code)
    }
}

impl From<BroadcastKind> for i32 {
    fn from(kind: BroadcastKind) -> Self {
        kind as u16 as i32
    }
}

/// A loosely-typed command argument as supplied by a host runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandArg {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i32> for CommandArg {
    fn from(value: i32) -> Self {
        CommandArg::Int(value.into())
    }
}

impl From<i64> for CommandArg {
    fn from(value: i64) -> Self {
        CommandArg::Int(value)
    }
}

impl From<f32> for CommandArg {
    fn from(value: f32) -> Self {
        CommandArg::Float(value.into())
    }
}

impl From<f64> for CommandArg {
    fn from(value: f64) -> Self {
        CommandArg::Float(value)
    }
}

impl From<&str> for CommandArg {
    fn from(value: &str) -> Self {
        CommandArg::Text(value.to_string())
    }
}

impl fmt::Display for CommandArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandArg::Int(v) => write!(f, "{v}"),
            CommandArg::Float(v) => write!(f, "{v}"),
            CommandArg::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// Validated arguments in their wire types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BroadcastArgs {
    Ints(i32, i32, i32),
    IntFloat(i32, f32),
}

/// An encoded broadcast command, ready for the transport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadcastMessage {
    pub kind: BroadcastKind,
    pub args: BroadcastArgs,
}

/// Integer arguments travel as one 16-bit half of a 32-bit parameter.
const WORD_RANGE: std::ops::RangeInclusive<i64> = (i16::MIN as i64)..=(u16::MAX as i64);

/// Scale applied to float arguments (16.16 fixed point).
const FIXED_POINT_SCALE: f64 = 65536.0;

fn make_long(low: i32, high: i32) -> u32 {
    (low as u32 & 0xFFFF) | ((high as u32 & 0xFFFF) << 16)
}

impl BroadcastMessage {
    /// First notify-message parameter: `MAKELONG(kind, arg1)`.
    pub fn wparam(&self) -> u32 {
        let arg1 = match self.args {
            BroadcastArgs::Ints(a, _, _) | BroadcastArgs::IntFloat(a, _) => a,
        };
        make_long(i32::from(self.kind), arg1)
    }

    /// Second notify-message parameter.
    pub fn lparam(&self) -> i32 {
        match self.args {
            BroadcastArgs::Ints(_, a2, a3) => make_long(a2, a3) as i32,
            BroadcastArgs::IntFloat(_, f) => (f64::from(f) * FIXED_POINT_SCALE) as i32,
        }
    }

    /// `wparam` then `lparam`, little-endian.
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        bytes[..4].copy_from_slice(&self.wparam().to_le_bytes());
        bytes[4..].copy_from_slice(&self.lparam().to_le_bytes());
        bytes
    }
}

fn int_arg(kind: BroadcastKind, position: usize, arg: Option<&CommandArg>) -> Result<i32> {
    let value = match arg {
        Some(CommandArg::Int(v)) => *v,
        Some(CommandArg::Float(v)) if v.is_finite() && v.fract() == 0.0 => *v as i64,
        Some(other) => {
            return Err(TelemetryError::rejected(format!(
                "{kind:?} argument {position} must be an integer, got {other}"
            )));
        }
        None => {
            return Err(TelemetryError::rejected(format!(
                "{kind:?} requires integer argument {position}"
            )));
        }
    };

    if !WORD_RANGE.contains(&value) {
        return Err(TelemetryError::rejected(format!(
            "{kind:?} argument {position} ({value}) does not fit in 16 bits"
        )));
    }
    Ok(value as i32)
}

fn float_arg(kind: BroadcastKind, position: usize, arg: Option<&CommandArg>) -> Result<f32> {
    let value = match arg {
        Some(CommandArg::Float(v)) => *v,
        Some(CommandArg::Int(v)) => *v as f64,
        Some(other) => {
            return Err(TelemetryError::rejected(format!(
                "{kind:?} argument {position} must be a number, got {other}"
            )));
        }
        None => {
            return Err(TelemetryError::rejected(format!(
                "{kind:?} requires numeric argument {position}"
            )));
        }
    };

    let scaled = value * FIXED_POINT_SCALE;
    if !value.is_finite() || scaled < i32::MIN as f64 || scaled > i32::MAX as f64 {
        return Err(TelemetryError::rejected(format!(
            "{kind:?} argument {position} ({value}) is outside the 16.16 fixed-point range"
        )));
    }
    Ok(value as f32)
}

/// Unused trailing arguments may be omitted, but anything supplied must be numeric.
fn ignored_arg(kind: BroadcastKind, position: usize, arg: Option<&CommandArg>) -> Result<()> {
    match arg {
        Some(CommandArg::Text(text)) => Err(TelemetryError::rejected(format!(
            "{kind:?} argument {position} must be numeric when given, got {text:?}"
        ))),
        _ => Ok(()),
    }
}

/// Encode a broadcast command for `kind`.
///
/// `kind` accepts a [`BroadcastKind`] or a raw numeric code. Unknown codes and
/// arguments that do not match the kind's shape are `Rejected`.
pub fn encode(
    kind: impl Into<i32>,
    arg1: CommandArg,
    arg2: Option<CommandArg>,
    arg3: Option<CommandArg>,
) -> Result<BroadcastMessage> {
    let code = kind.into();
    let kind = BroadcastKind::from_code(code)
        .ok_or_else(|| TelemetryError::rejected(format!("unknown broadcast kind {code}")))?;

    let (arg1, arg2, arg3) = (Some(&arg1), arg2.as_ref(), arg3.as_ref());
    let args = match kind.shape() {
        ArgShape::ThreeInts => BroadcastArgs::Ints(
            int_arg(kind, 1, arg1)?,
            int_arg(kind, 2, arg2)?,
            int_arg(kind, 3, arg3)?,
        ),
        ArgShape::OneInt => {
            let first = int_arg(kind, 1, arg1)?;
            ignored_arg(kind, 2, arg2)?;
            ignored_arg(kind, 3, arg3)?;
            BroadcastArgs::Ints(first, -1, -1)
        }
        ArgShape::TwoInts => {
            let args = BroadcastArgs::Ints(int_arg(kind, 1, arg1)?, int_arg(kind, 2, arg2)?, -1);
            ignored_arg(kind, 3, arg3)?;
            args
        }
        ArgShape::IntFloat => {
            let args = BroadcastArgs::IntFloat(int_arg(kind, 1, arg1)?, float_arg(kind, 2, arg2)?);
            ignored_arg(kind, 3, arg3)?;
            args
        }
    };

    Ok(BroadcastMessage { kind, args })
}

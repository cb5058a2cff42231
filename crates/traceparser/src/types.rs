use std::fmt;

// === Error types ===

/// Errors that can occur while decoding a monitor trace.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Reached end of stream at a clean frame boundary (no more events).
    #[error("End of file reached.")]
    EndOfStream,

    /// The stream ended in the middle of a header, scope run or event.
    #[error("Invalid file format (missing data).")]
    Truncated,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magik numbers (found {found:08x}).")]
    BadMagic { found: u32 },

    #[error("Major version mismatch (trace is {found}, expected {expected}).")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("Out of memory.")]
    OutOfMemory,

    /// A known element declared a length that does not match its shape.
    #[error("Inconsistent parsing: {element} declares {found} bytes, expected {expected}.")]
    InconsistentLength {
        element: &'static str,
        expected: Expected,
        found: u32,
    },

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Extra data element too large ({length} bytes, limit is {limit}).")]
    PayloadTooLarge { length: usize, limit: usize },
}

impl ParseError {
    /// Turns a clean end of stream into a truncation error.
    ///
    /// Only the first control word of a scope run may legally hit EOF,
    /// every other read goes through this.
    pub(crate) fn eof_is_truncation(self) -> Self {
        match self {
            ParseError::EndOfStream => ParseError::Truncated,
            other => other,
        }
    }
}

/// The length a known element must declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Exactly(u32),
    AtLeast(u32),
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Exactly(n) => write!(f, "exactly {}", n),
            Expected::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

// === Stream header ===

/// Version information read from the 16-byte stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceHeader {
    pub major: u32,
    pub minor: u32,
}

/// Decoder settings.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Largest `MonitorData` payload the parser will allocate.
    pub max_payload: usize,
}

/// 256 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 268_435_456;

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }
}

// === Scope ===

bitflags::bitflags! {
    /// Bitmask of the scope kinds present in a [`Scope`].
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct ScopeKinds: u8 {
        /// At least one scope element had an unrecognized tag.
        const UNKNOWN = 1 << 0;
        const SIMULATION = 1 << 1;
        const NODE = 1 << 2;
    }
}

/// CPU cycles and milliseconds since boot, as measured on a node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeTime {
    pub cycles: u64,
    pub millis: f64,
}

/// Timing and location metadata recorded alongside an event.
///
/// `sim_us` is meaningful only when `kinds` contains SIMULATION, `node_id`
/// and `node_time` only when it contains NODE.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Scope {
    pub kinds: ScopeKinds,
    pub sim_us: u64,
    pub node_id: u16,
    pub node_time: NodeTime,
}

impl Scope {
    pub fn simulation(&self) -> Option<u64> {
        self.kinds
            .contains(ScopeKinds::SIMULATION)
            .then_some(self.sim_us)
    }

    pub fn node(&self) -> Option<(u16, NodeTime)> {
        self.kinds
            .contains(ScopeKinds::NODE)
            .then_some((self.node_id, self.node_time))
    }
}

// === Events ===

/// One-time calibration record emitted when a monitor starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorCreate {
    pub state_offset: NodeTime,
    pub data_offset: NodeTime,
    pub byte_offset: NodeTime,
    pub byte_order: u8,
}

/// A state-machine transition signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorState {
    pub context: u16,
    pub entity: u16,
    pub state: u16,
}

/// Opaque data attached to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorData {
    pub context: u16,
    pub entity: u16,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A decoded trace event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// An element with an unrecognized type tag. Its payload was skipped.
    Unknown { type_tag: u16, length: u32 },
    MonitorCreate(MonitorCreate),
    MonitorState(MonitorState),
    MonitorData(MonitorData),
    NodeCreate,
    NodeDestroy,
    NodePosition(NodePosition),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Unknown { .. } => EventKind::Unknown,
            Event::MonitorCreate(_) => EventKind::MonitorCreate,
            Event::MonitorState(_) => EventKind::MonitorState,
            Event::MonitorData(_) => EventKind::MonitorData,
            Event::NodeCreate => EventKind::NodeCreate,
            Event::NodeDestroy => EventKind::NodeDestroy,
            Event::NodePosition(_) => EventKind::NodePosition,
        }
    }
}

/// The kind of an [`Event`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Unknown,
    MonitorCreate,
    MonitorState,
    MonitorData,
    NodeCreate,
    NodeDestroy,
    NodePosition,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Unknown,
        EventKind::MonitorCreate,
        EventKind::MonitorState,
        EventKind::MonitorData,
        EventKind::NodeCreate,
        EventKind::NodeDestroy,
        EventKind::NodePosition,
    ];

    /// Upper-case wire name, e.g. `MON_STATE`.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::Unknown => "UNKNOWN",
            EventKind::MonitorCreate => "MON_CREATE",
            EventKind::MonitorState => "MON_STATE",
            EventKind::MonitorData => "MON_DATA",
            EventKind::NodeCreate => "NODE_CREATE",
            EventKind::NodeDestroy => "NODE_DESTROY",
            EventKind::NodePosition => "NODE_POSITION",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

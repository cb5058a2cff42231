use std::io::Read;

use crate::reader::TraceReader;
use crate::types::*;

/// Magic words at the start of every trace ("ctkt", "race").
pub const MAGIC: [u32; 2] = [0x63746b74, 0x72616365];

/// Major version of the trace format understood by this parser.
pub const MAJOR_VERSION: u32 = 1;
/// Minor version written by [`crate::TraceWriter`].
pub const MINOR_VERSION: u32 = 0;

// Scope element type tags (wire values). The separator is tag 0.
pub const SC_T_SIMULATION: u16 = 1;
pub const SC_T_NODE: u16 = 2;

// Event element type tags (wire values).
pub const EV_T_MON_CREATE: u16 = 1;
pub const EV_T_MON_STATE: u16 = 2;
pub const EV_T_MON_DATA: u16 = 3;
pub const EV_T_NODE_CREATE: u16 = 4;
pub const EV_T_NODE_DESTROY: u16 = 5;
pub const EV_T_NODE_POSITION: u16 = 6;

const NODE_TIME_SIZE: u32 = 8 + 8;

pub(crate) const SIMULATION_SCOPE_SIZE: u32 = 8;
pub(crate) const NODE_SCOPE_SIZE: u32 = NODE_TIME_SIZE + 2;

pub(crate) const MON_CREATE_SIZE: u32 = 1 + 3 * NODE_TIME_SIZE;
pub(crate) const MON_STATE_SIZE: u32 = 3 * 2;
pub(crate) const MON_DATA_PREFIX_SIZE: u32 = 2 * 2;
pub(crate) const NODE_POSITION_SIZE: u32 = 3 * 8;

/// Streaming decoder for a monitor trace.
///
/// The stream header is validated by [`TraceParser::open`]. Each call to
/// [`TraceParser::next_event`] then decodes one scope run followed by one
/// event element. `ParseError::EndOfStream` is returned once the stream ends
/// cleanly at the start of a scope run.
pub struct TraceParser<R> {
    reader: TraceReader<R>,
    header: TraceHeader,
    config: ParserConfig,
}

impl<R: Read> TraceParser<R> {
    /// Read and validate the stream header.
    pub fn open(source: R, config: ParserConfig) -> Result<Self, ParseError> {
        let mut reader = TraceReader::new(source);
        let header = read_trace_header(&mut reader)?;

        log::debug!(
            "opened trace version {}.{} (max payload {} bytes)",
            header.major,
            header.minor,
            config.max_payload
        );
        if header.minor != MINOR_VERSION {
            log::warn!(
                "trace minor version {} differs from {}, continuing",
                header.minor,
                MINOR_VERSION
            );
        }

        Ok(Self {
            reader,
            header,
            config,
        })
    }

    pub fn header(&self) -> TraceHeader {
        self.header
    }

    /// Number of bytes consumed from the source so far.
    pub fn offset(&self) -> u64 {
        self.reader.offset()
    }

    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Decode the next (scope, event) pair.
    pub fn next_event(&mut self) -> Result<(Scope, Event), ParseError> {
        let scope = parse_scope(&mut self.reader)?;
        let event = parse_event(&mut self.reader, &self.config)?;
        Ok((scope, event))
    }
}

impl<R: Read> Iterator for TraceParser<R> {
    type Item = Result<(Scope, Event), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Err(ParseError::EndOfStream) => None,
            other => Some(other),
        }
    }
}

pub(crate) fn read_trace_header<R: Read>(
    reader: &mut TraceReader<R>,
) -> Result<TraceHeader, ParseError> {
    let mut words = [0u32; 4];
    for word in words.iter_mut() {
        *word = reader.u32().map_err(ParseError::eof_is_truncation)?;
    }

    for (found, expected) in words[..2].iter().zip(MAGIC.iter()) {
        if found != expected {
            return Err(ParseError::BadMagic { found: *found });
        }
    }

    let header = TraceHeader {
        major: words[2],
        minor: words[3],
    };
    if header.major != MAJOR_VERSION {
        return Err(ParseError::VersionMismatch {
            found: header.major,
            expected: MAJOR_VERSION,
        });
    }

    Ok(header)
}

/// Parse one scope run up to and including its separator.
///
/// Only the very first control word of the run may hit a clean EOF.
pub(crate) fn parse_scope<R: Read>(reader: &mut TraceReader<R>) -> Result<Scope, ParseError> {
    let mut scope = Scope::default();
    let mut first = true;

    loop {
        let hdr = match reader.element_header() {
            Ok(hdr) => hdr,
            Err(e) if first => return Err(e),
            Err(e) => return Err(e.eof_is_truncation()),
        };
        first = false;

        if hdr.is_separator() {
            return Ok(scope);
        }

        parse_scope_element(reader, hdr.type_tag, hdr.len, &mut scope)
            .map_err(ParseError::eof_is_truncation)?;
    }
}

fn parse_scope_element<R: Read>(
    reader: &mut TraceReader<R>,
    type_tag: u16,
    len: u32,
    scope: &mut Scope,
) -> Result<(), ParseError> {
    match type_tag {
        SC_T_SIMULATION => {
            check_exact("SIMULATION scope", len, SIMULATION_SCOPE_SIZE)?;
            scope.sim_us = reader.u64()?;
            scope.kinds.insert(ScopeKinds::SIMULATION);
        }
        SC_T_NODE => {
            check_exact("NODE scope", len, NODE_SCOPE_SIZE)?;
            scope.node_time = node_time(reader)?;
            scope.node_id = reader.u16()?;
            scope.kinds.insert(ScopeKinds::NODE);
        }
        other => {
            log::debug!(
                "skipping unknown scope element type {} ({} bytes) at offset {}",
                other,
                len,
                reader.offset()
            );
            reader.skip(u64::from(len))?;
            scope.kinds.insert(ScopeKinds::UNKNOWN);
        }
    }
    Ok(())
}

/// Parse exactly one event element.
pub(crate) fn parse_event<R: Read>(
    reader: &mut TraceReader<R>,
    config: &ParserConfig,
) -> Result<Event, ParseError> {
    let hdr = reader
        .element_header()
        .map_err(ParseError::eof_is_truncation)?;
    parse_event_body(reader, config, hdr.type_tag, hdr.len).map_err(ParseError::eof_is_truncation)
}

fn parse_event_body<R: Read>(
    reader: &mut TraceReader<R>,
    config: &ParserConfig,
    type_tag: u16,
    len: u32,
) -> Result<Event, ParseError> {
    let event = match type_tag {
        EV_T_MON_CREATE => {
            check_exact("MON_CREATE", len, MON_CREATE_SIZE)?;
            Event::MonitorCreate(MonitorCreate {
                state_offset: node_time(reader)?,
                data_offset: node_time(reader)?,
                byte_offset: node_time(reader)?,
                byte_order: reader.u8()?,
            })
        }
        EV_T_MON_STATE => {
            check_exact("MON_STATE", len, MON_STATE_SIZE)?;
            Event::MonitorState(MonitorState {
                context: reader.u16()?,
                entity: reader.u16()?,
                state: reader.u16()?,
            })
        }
        EV_T_MON_DATA => {
            if len < MON_DATA_PREFIX_SIZE {
                return Err(ParseError::InconsistentLength {
                    element: "MON_DATA",
                    expected: Expected::AtLeast(MON_DATA_PREFIX_SIZE),
                    found: len,
                });
            }
            let context = reader.u16()?;
            let entity = reader.u16()?;

            let length = (len - MON_DATA_PREFIX_SIZE) as usize;
            if length > config.max_payload {
                return Err(ParseError::PayloadTooLarge {
                    length,
                    limit: config.max_payload,
                });
            }

            Event::MonitorData(MonitorData {
                context,
                entity,
                payload: reader.bytes(length)?,
            })
        }
        EV_T_NODE_CREATE => {
            check_exact("NODE_CREATE", len, 0)?;
            Event::NodeCreate
        }
        EV_T_NODE_DESTROY => {
            check_exact("NODE_DESTROY", len, 0)?;
            Event::NodeDestroy
        }
        EV_T_NODE_POSITION => {
            check_exact("NODE_POSITION", len, NODE_POSITION_SIZE)?;
            Event::NodePosition(NodePosition {
                x: reader.f64()?,
                y: reader.f64()?,
                z: reader.f64()?,
            })
        }
        other => {
            log::debug!(
                "skipping unknown event type {} ({} bytes) at offset {}",
                other,
                len,
                reader.offset()
            );
            reader.skip(u64::from(len))?;
            Event::Unknown {
                type_tag: other,
                length: len,
            }
        }
    };

    Ok(event)
}

fn node_time<R: Read>(reader: &mut TraceReader<R>) -> Result<NodeTime, ParseError> {
    Ok(NodeTime {
        cycles: reader.u64()?,
        millis: reader.f64()?,
    })
}

fn check_exact(element: &'static str, found: u32, expected: u32) -> Result<(), ParseError> {
    if found != expected {
        return Err(ParseError::InconsistentLength {
            element,
            expected: Expected::Exactly(expected),
            found,
        });
    }
    Ok(())
}

use std::io::{self, Read, Write};

use crate::parser::*;
use crate::reader::SEPARATOR;
use crate::types::*;

/// Largest type tag that fits the 15 bits of a control word.
const MAX_TYPE_TAG: u16 = 0x7fff;

/// Encodes scopes and events in the monitor trace format.
///
/// Lengths below 256 use the 1-byte length field, larger ones the 4-byte
/// field. This is what the monitored nodes emit, and what the tests use to
/// build fixtures.
pub struct TraceWriter<W> {
    out: W,
}

impl<W: Write> TraceWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write the 16-byte stream header for the current format version.
    pub fn write_header(&mut self) -> io::Result<()> {
        self.write_header_version(MAJOR_VERSION, MINOR_VERSION)
    }

    pub fn write_header_version(&mut self, major: u32, minor: u32) -> io::Result<()> {
        for word in [MAGIC[0], MAGIC[1], major, minor] {
            self.out.write_all(&word.to_be_bytes())?;
        }
        Ok(())
    }

    /// Write the scope run for an event, separator included.
    ///
    /// The UNKNOWN bit carries no data and is not encoded.
    pub fn write_scope(&mut self, scope: &Scope) -> io::Result<()> {
        if let Some(sim_us) = scope.simulation() {
            self.element_header(SC_T_SIMULATION, SIMULATION_SCOPE_SIZE)?;
            self.out.write_all(&sim_us.to_be_bytes())?;
        }
        if let Some((node_id, time)) = scope.node() {
            self.element_header(SC_T_NODE, NODE_SCOPE_SIZE)?;
            self.node_time(&time)?;
            self.out.write_all(&node_id.to_be_bytes())?;
        }
        self.out.write_all(&(SEPARATOR << 1).to_be_bytes())
    }

    /// Write one event element.
    ///
    /// `Event::Unknown` is written with its type tag and a zero-filled
    /// payload of its declared length.
    pub fn write_event(&mut self, event: &Event) -> io::Result<()> {
        match event {
            Event::Unknown { type_tag, length } => {
                self.element_header(*type_tag, *length)?;
                io::copy(&mut io::repeat(0).take(u64::from(*length)), &mut self.out)?;
            }
            Event::MonitorCreate(ev) => {
                self.element_header(EV_T_MON_CREATE, MON_CREATE_SIZE)?;
                self.node_time(&ev.state_offset)?;
                self.node_time(&ev.data_offset)?;
                self.node_time(&ev.byte_offset)?;
                self.out.write_all(&[ev.byte_order])?;
            }
            Event::MonitorState(ev) => {
                self.element_header(EV_T_MON_STATE, MON_STATE_SIZE)?;
                for v in [ev.context, ev.entity, ev.state] {
                    self.out.write_all(&v.to_be_bytes())?;
                }
            }
            Event::MonitorData(ev) => {
                let len = u32::try_from(ev.payload.len())
                    .ok()
                    .and_then(|n| n.checked_add(MON_DATA_PREFIX_SIZE))
                    .ok_or_else(|| {
                        io::Error::new(io::ErrorKind::InvalidInput, "payload too large")
                    })?;
                self.element_header(EV_T_MON_DATA, len)?;
                self.out.write_all(&ev.context.to_be_bytes())?;
                self.out.write_all(&ev.entity.to_be_bytes())?;
                self.out.write_all(&ev.payload)?;
            }
            Event::NodeCreate => self.element_header(EV_T_NODE_CREATE, 0)?,
            Event::NodeDestroy => self.element_header(EV_T_NODE_DESTROY, 0)?,
            Event::NodePosition(ev) => {
                self.element_header(EV_T_NODE_POSITION, NODE_POSITION_SIZE)?;
                for v in [ev.x, ev.y, ev.z] {
                    self.out.write_all(&v.to_be_bytes())?;
                }
            }
        }
        Ok(())
    }

    /// Write an element with an arbitrary type tag and raw payload.
    pub fn write_raw_element(&mut self, type_tag: u16, payload: &[u8]) -> io::Result<()> {
        let len = u32::try_from(payload.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "payload too large"))?;
        self.element_header(type_tag, len)?;
        self.out.write_all(payload)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn element_header(&mut self, type_tag: u16, len: u32) -> io::Result<()> {
        if type_tag == SEPARATOR || type_tag > MAX_TYPE_TAG {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid element type tag {}", type_tag),
            ));
        }

        let control = type_tag << 1;
        match u8::try_from(len) {
            Ok(short) => {
                self.out.write_all(&control.to_be_bytes())?;
                self.out.write_all(&[short])
            }
            Err(_) => {
                self.out.write_all(&(control | 1).to_be_bytes())?;
                self.out.write_all(&len.to_be_bytes())
            }
        }
    }

    fn node_time(&mut self, time: &NodeTime) -> io::Result<()> {
        self.out.write_all(&time.cycles.to_be_bytes())?;
        self.out.write_all(&time.millis.to_be_bytes())
    }
}

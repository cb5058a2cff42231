//! Decoder for the binary monitor trace format.
//!
//! Instrumented nodes record state changes, data attachments and node
//! lifecycle events. Each event is framed together with the timing scopes in
//! which it was recorded. This crate validates the stream header, decodes
//! every (scope, event) pair and hands them to an [`EventHandler`].
//!
//! # Protocol
//!
//! All integers and doubles are big-endian. The stream starts with a 16-byte
//! header:
//!
//! | Offset | Size | Field                    |
//! |--------|------|--------------------------|
//! | 0      | 4    | Magic `0x63746b74`       |
//! | 4      | 4    | Magic `0x72616365`       |
//! | 8      | 4    | Major version (must be 1)|
//! | 12     | 4    | Minor version            |
//!
//! It is followed by repeated frames, each made of a run of scope elements
//! closed by a separator, then exactly one event element. Every element
//! starts with a 16-bit control word: bit 0 selects a 1-byte (0) or 4-byte
//! (1) length field and the remaining 15 bits hold the type tag. The
//! separator (type 0) has no length field.
//!
//! | Scope type     | Length | Payload                          |
//! |----------------|--------|----------------------------------|
//! | 1 (simulation) | 8      | u64 microseconds                 |
//! | 2 (node)       | 18     | u64 cycles, f64 millis, u16 node |
//!
//! | Event type        | Length | Payload                               |
//! |-------------------|--------|---------------------------------------|
//! | 1 (mon_create)    | 49     | 3 × (u64 cycles, f64 millis), u8 order|
//! | 2 (mon_state)     | 6      | u16 context, u16 entity, u16 state    |
//! | 3 (mon_data)      | ≥ 4    | u16 context, u16 entity, bytes        |
//! | 4 (node_create)   | 0      |                                       |
//! | 5 (node_destroy)  | 0      |                                       |
//! | 6 (node_position) | 24     | f64 x, f64 y, f64 z                   |
//!
//! Unknown scope and event types are skipped using their declared length.
//!
//! # Usage
//!
//! ```no_run
//! use mon_traceparser::{ParseError, ParserConfig, TraceParser};
//!
//! let file = std::fs::File::open("trace.bin").unwrap();
//! let source = std::io::BufReader::new(file);
//! let mut parser = TraceParser::open(source, ParserConfig::default()).unwrap();
//!
//! loop {
//!     match parser.next_event() {
//!         Ok((scope, event)) => println!("{:?} {:?}", scope, event),
//!         Err(ParseError::EndOfStream) => break,
//!         Err(e) => panic!("parse error: {}", e),
//!     }
//! }
//! ```

pub mod dispatch;
pub mod types;
mod parser;
mod reader;
mod writer;

pub use dispatch::{dispatch, dispatch_event, EventHandler};
pub use parser::{
    TraceParser, EV_T_MON_CREATE, EV_T_MON_DATA, EV_T_MON_STATE, EV_T_NODE_CREATE,
    EV_T_NODE_DESTROY, EV_T_NODE_POSITION, MAGIC, MAJOR_VERSION, MINOR_VERSION, SC_T_NODE,
    SC_T_SIMULATION,
};
pub use types::*;
pub use writer::TraceWriter;

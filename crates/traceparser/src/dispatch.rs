use std::io::Read;

use crate::parser::TraceParser;
use crate::types::*;

/// One callback per event kind.
///
/// Every method is required, so a handler that ignores some kinds must say
/// so explicitly. Returning an error stops [`dispatch`] immediately.
pub trait EventHandler {
    type Error: From<ParseError>;

    fn unknown(&mut self, scope: &Scope, type_tag: u16, length: u32) -> Result<(), Self::Error>;

    fn mon_create(&mut self, scope: &Scope, event: MonitorCreate) -> Result<(), Self::Error>;

    fn mon_state(&mut self, scope: &Scope, event: MonitorState) -> Result<(), Self::Error>;

    /// Receives the payload by value, so it can be dropped as soon as the
    /// handler is done with it.
    fn mon_data(&mut self, scope: &Scope, event: MonitorData) -> Result<(), Self::Error>;

    fn node_create(&mut self, scope: &Scope) -> Result<(), Self::Error>;

    fn node_destroy(&mut self, scope: &Scope) -> Result<(), Self::Error>;

    fn node_position(&mut self, scope: &Scope, event: NodePosition) -> Result<(), Self::Error>;
}

/// Route a single event to the matching handler method.
pub fn dispatch_event<H: EventHandler + ?Sized>(
    handler: &mut H,
    scope: &Scope,
    event: Event,
) -> Result<(), H::Error> {
    match event {
        Event::Unknown { type_tag, length } => handler.unknown(scope, type_tag, length),
        Event::MonitorCreate(ev) => handler.mon_create(scope, ev),
        Event::MonitorState(ev) => handler.mon_state(scope, ev),
        Event::MonitorData(ev) => handler.mon_data(scope, ev),
        Event::NodeCreate => handler.node_create(scope),
        Event::NodeDestroy => handler.node_destroy(scope),
        Event::NodePosition(ev) => handler.node_position(scope, ev),
    }
}

/// Drive the parser over the whole stream, in order.
///
/// Returns the number of events dispatched once the stream ends cleanly at
/// a scope-run boundary. Any decode error, or any error returned by the
/// handler, aborts the run.
pub fn dispatch<R: Read, H: EventHandler + ?Sized>(
    parser: &mut TraceParser<R>,
    handler: &mut H,
) -> Result<u64, H::Error> {
    let mut count = 0u64;
    loop {
        let (scope, event) = match parser.next_event() {
            Ok(next) => next,
            Err(ParseError::EndOfStream) => break,
            Err(e) => {
                log::debug!(
                    "decode failed after {} events at offset {}: {}",
                    count,
                    parser.offset(),
                    e
                );
                return Err(e.into());
            }
        };
        dispatch_event(handler, &scope, event)?;
        count += 1;
    }

    log::debug!("dispatched {} events ({} bytes)", count, parser.offset());
    Ok(count)
}

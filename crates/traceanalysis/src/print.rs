//! Event-by-event listing of a trace.

use std::io::{self, Write};

use mon_traceparser::{
    EventHandler, EventKind, MonitorCreate, MonitorData, MonitorState, NodePosition, NodeTime,
    Scope, ScopeKinds,
};

use crate::error::AnalysisError;
use crate::names::NameRegistry;
use crate::typed::Typed;

/// Indentation of fields in human form.
const HUMAN_INDENT: &str = "  ";

struct Field<'a> {
    name: &'static str,
    human_name: &'static str,
    value: Typed<'a>,
}

impl<'a> Field<'a> {
    fn new(name: &'static str, human_name: &'static str, value: Typed<'a>) -> Self {
        Self {
            name,
            human_name,
            value,
        }
    }
}

/// Writes one record per event, numbered from 0.
///
/// Normal form is a single line per event:
/// `EVENT=<n> <scope fields>:<event fields>`. Human form writes
/// `Event: <n>` followed by one aligned line per field and a blank line.
pub struct PrintMode<'n, W> {
    names: &'n NameRegistry,
    out: W,
    human: bool,
    event_id: u64,
}

impl<'n, W: Write> PrintMode<'n, W> {
    pub fn new(names: &'n NameRegistry, out: W, human: bool) -> Self {
        Self {
            names,
            out,
            human,
            event_id: 0,
        }
    }

    /// Number of events written so far.
    pub fn events_printed(&self) -> u64 {
        self.event_id
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, scope: &Scope, kind: EventKind, fields: &[Field<'_>]) -> io::Result<()> {
        let scope_fields = scope_fields(scope);
        let event_type = Field::new("EVENT_TYPE", "Event type", Typed::EventKind(kind));
        let event_fields = std::iter::once(&event_type).chain(fields);

        if self.human {
            let width = scope_fields
                .iter()
                .chain(event_fields.clone())
                .map(|f| f.human_name.len())
                .max()
                .unwrap_or(0);

            writeln!(self.out, "Event: {}", self.event_id)?;
            for field in scope_fields.iter().chain(event_fields) {
                writeln!(
                    self.out,
                    "{}{:<width$} : {}",
                    HUMAN_INDENT,
                    field.human_name,
                    field.value.display_human(self.names),
                    width = width
                )?;
            }
            writeln!(self.out)?;
        } else {
            let scope_part = join_normal(scope_fields.iter(), self.names);
            let event_part = join_normal(event_fields, self.names);
            writeln!(
                self.out,
                "EVENT={} {}:{}",
                self.event_id, scope_part, event_part
            )?;
        }

        self.event_id += 1;
        Ok(())
    }
}

fn scope_fields<'a>(scope: &Scope) -> Vec<Field<'a>> {
    let mut fields = vec![Field::new(
        "SCOPES_USED",
        "Scopes used",
        Typed::ScopeKinds(scope.kinds),
    )];
    if scope.kinds.contains(ScopeKinds::SIMULATION) {
        fields.push(Field::new(
            "SIM_TIME_US",
            "Simulation time (micros.)",
            Typed::TimeUs(scope.sim_us),
        ));
    }
    if let Some((node_id, time)) = scope.node() {
        fields.push(Field::new("NID", "Node ID", Typed::Id(node_id)));
        fields.push(Field::new(
            "NODE_TIME_MS",
            "Millis. since boot",
            Typed::TimeMs(time.millis),
        ));
        fields.push(Field::new(
            "NODE_CYCLES",
            "CPU cycles since boot",
            Typed::Cycles(time.cycles),
        ));
    }
    fields
}

fn join_normal<'f, 'a: 'f>(
    fields: impl Iterator<Item = &'f Field<'a>>,
    names: &NameRegistry,
) -> String {
    fields
        .map(|f| format!("{}={}", f.name, f.value.display_normal(names)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn offset_fields(
    offset: &NodeTime,
    time: (&'static str, &'static str),
    cycles: (&'static str, &'static str),
) -> [Field<'static>; 2] {
    [
        Field::new(time.0, time.1, Typed::TimeMs(offset.millis)),
        Field::new(cycles.0, cycles.1, Typed::Cycles(offset.cycles)),
    ]
}

impl<W: Write> EventHandler for PrintMode<'_, W> {
    type Error = AnalysisError;

    fn unknown(&mut self, scope: &Scope, type_tag: u16, length: u32) -> Result<(), AnalysisError> {
        log::trace!("printing unknown event type {} ({} bytes)", type_tag, length);
        self.emit(scope, EventKind::Unknown, &[])?;
        Ok(())
    }

    fn mon_create(&mut self, scope: &Scope, event: MonitorCreate) -> Result<(), AnalysisError> {
        let mut fields = Vec::with_capacity(6);
        fields.extend(offset_fields(
            &event.state_offset,
            ("STATE_OFFSET_TIME", "State offset in millis"),
            ("STATE_OFFSET_CYCLES", "State offset in CPU cycles"),
        ));
        fields.extend(offset_fields(
            &event.data_offset,
            ("DATA_OFFSET_TIME", "Data offset in millis"),
            ("DATA_OFFSET_CYCLES", "Data offset in CPU cycles"),
        ));
        fields.extend(offset_fields(
            &event.byte_offset,
            ("BYTE_OFFSET_TIME", "Byte offset in millis"),
            ("BYTE_OFFSET_CYCLES", "Byte offset in CPU cycles"),
        ));
        self.emit(scope, EventKind::MonitorCreate, &fields)?;
        Ok(())
    }

    fn mon_state(&mut self, scope: &Scope, event: MonitorState) -> Result<(), AnalysisError> {
        let MonitorState {
            context,
            entity,
            state,
        } = event;
        let fields = [
            Field::new("CTX", "Context", Typed::Context(context)),
            Field::new("ENT", "Entity", Typed::Entity { context, entity }),
            Field::new("STATE", "State", Typed::State { context, state }),
        ];
        self.emit(scope, EventKind::MonitorState, &fields)?;
        Ok(())
    }

    fn mon_data(&mut self, scope: &Scope, event: MonitorData) -> Result<(), AnalysisError> {
        let MonitorData {
            context,
            entity,
            payload,
        } = event;
        let fields = [
            Field::new("CTX", "Context", Typed::Context(context)),
            Field::new("ENT", "Entity", Typed::Entity { context, entity }),
            Field::new("DATA", "Data", Typed::Data(&payload)),
        ];
        self.emit(scope, EventKind::MonitorData, &fields)?;
        Ok(())
    }

    fn node_create(&mut self, scope: &Scope) -> Result<(), AnalysisError> {
        self.emit(scope, EventKind::NodeCreate, &[])?;
        Ok(())
    }

    fn node_destroy(&mut self, scope: &Scope) -> Result<(), AnalysisError> {
        self.emit(scope, EventKind::NodeDestroy, &[])?;
        Ok(())
    }

    fn node_position(&mut self, scope: &Scope, event: NodePosition) -> Result<(), AnalysisError> {
        let fields = [
            Field::new("COORD_X", "Coord. X", Typed::Position(event.x)),
            Field::new("COORD_Y", "Coord. Y", Typed::Position(event.y)),
            Field::new("COORD_Z", "Coord. Z", Typed::Position(event.z)),
        ];
        self.emit(scope, EventKind::NodePosition, &fields)?;
        Ok(())
    }
}

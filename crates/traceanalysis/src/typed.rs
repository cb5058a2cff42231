use mon_traceparser::{EventKind, ScopeKinds};

use crate::dump::hex_dump;
use crate::names::NameRegistry;

/// A value shown by the print mode, tagged with how it should be rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Typed<'a> {
    ScopeKinds(ScopeKinds),
    EventKind(EventKind),
    Context(u16),
    Entity { context: u16, entity: u16 },
    State { context: u16, state: u16 },
    Position(f64),
    TimeMs(f64),
    TimeUs(u64),
    Cycles(u64),
    Data(&'a [u8]),
    Id(u16),
}

impl Typed<'_> {
    /// Compact rendering, suitable for `NAME=value` lines.
    pub fn display_normal(&self, names: &NameRegistry) -> String {
        match *self {
            Typed::ScopeKinds(kinds) => {
                scope_kinds(kinds, ["UNKNOWN", "SIMULATION", "NODE"], "/")
                    .unwrap_or_else(|| "NONE".to_string())
            }
            Typed::EventKind(kind) => kind.name().to_string(),
            Typed::Position(v) | Typed::TimeMs(v) => format!("{:.6}", v),
            Typed::TimeUs(v) | Typed::Cycles(v) => v.to_string(),
            Typed::Data(data) => hex::encode_upper(data),
            Typed::Id(id) => id.to_string(),
            Typed::Context(context) => names.context_label(context).into_owned(),
            Typed::Entity { context, entity } => names.entity_label(context, entity).into_owned(),
            Typed::State { context, state } => names.state_label(context, state).into_owned(),
        }
    }

    /// Rendering with units and long names.
    pub fn display_human(&self, names: &NameRegistry) -> String {
        match *self {
            Typed::ScopeKinds(kinds) => {
                scope_kinds(kinds, ["unknown", "simulation", "node"], " ")
                    .unwrap_or_else(|| "none".to_string())
            }
            Typed::EventKind(kind) => event_kind_human(kind).to_string(),
            Typed::Position(v) => format!("{:.6}", v),
            Typed::TimeMs(v) => format!("{:.6} ms", v),
            Typed::TimeUs(v) => format!("{} us", v),
            Typed::Cycles(v) => format!("{} cycles", v),
            Typed::Data(data) => format!("\n{}", hex_dump(data).trim_end_matches('\n')),
            Typed::Id(id) => id.to_string(),
            Typed::Context(context) => names.context_label(context).into_owned(),
            Typed::Entity { context, entity } => names.entity_label(context, entity).into_owned(),
            Typed::State { context, state } => names.state_label(context, state).into_owned(),
        }
    }
}

fn scope_kinds(kinds: ScopeKinds, labels: [&str; 3], separator: &str) -> Option<String> {
    let present: Vec<&str> = [ScopeKinds::UNKNOWN, ScopeKinds::SIMULATION, ScopeKinds::NODE]
        .into_iter()
        .zip(labels)
        .filter(|(kind, _)| kinds.contains(*kind))
        .map(|(_, label)| label)
        .collect();
    (!present.is_empty()).then(|| present.join(separator))
}

fn event_kind_human(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Unknown => "Unknown event",
        EventKind::MonitorCreate => "Monitor creation",
        EventKind::MonitorState => "State event",
        EventKind::MonitorData => "Data event",
        EventKind::NodeCreate => "Node creation",
        EventKind::NodeDestroy => "Node removal",
        EventKind::NodePosition => "Node position",
    }
}

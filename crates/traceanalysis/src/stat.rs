//! Event and scope counters, plus the sets of distinct IDs seen in a trace.

use std::io::{self, Write};

use mon_traceparser::{
    EventHandler, EventKind, MonitorCreate, MonitorData, MonitorState, NodePosition, Scope,
    ScopeKinds,
};

use crate::error::AnalysisError;

/// How many IDs of a seen set are listed before the rest is elided.
pub const MAX_SEEN_DISPLAY: usize = 16;

const SEEN_WORDS: usize = (u16::MAX as usize + 1) / 64;

/// Membership set over the whole 16-bit ID space.
#[derive(Clone)]
pub struct SeenSet {
    words: Box<[u64; SEEN_WORDS]>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self {
            words: Box::new([0; SEEN_WORDS]),
        }
    }

    /// Returns true if `id` was not already in the set.
    pub fn mark(&mut self, id: u16) -> bool {
        let (word, bit) = Self::position(id);
        let fresh = self.words[word] & bit == 0;
        self.words[word] |= bit;
        fresh
    }

    pub fn contains(&self, id: u16) -> bool {
        let (word, bit) = Self::position(id);
        self.words[word] & bit != 0
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Members in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        (0..=u16::MAX).filter(move |&id| self.contains(id))
    }

    fn position(id: u16) -> (usize, u64) {
        (usize::from(id / 64), 1u64 << (id % 64))
    }
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SeenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventCounts {
    pub unknown: u64,
    pub mon_create: u64,
    pub mon_state: u64,
    pub mon_data: u64,
    pub node_create: u64,
    pub node_destroy: u64,
    pub node_position: u64,
}

impl EventCounts {
    pub fn get(&self, kind: EventKind) -> u64 {
        match kind {
            EventKind::Unknown => self.unknown,
            EventKind::MonitorCreate => self.mon_create,
            EventKind::MonitorState => self.mon_state,
            EventKind::MonitorData => self.mon_data,
            EventKind::NodeCreate => self.node_create,
            EventKind::NodeDestroy => self.node_destroy,
            EventKind::NodePosition => self.node_position,
        }
    }

    pub fn total(&self) -> u64 {
        EventKind::ALL.iter().map(|&k| self.get(k)).sum()
    }

    fn bump(&mut self, kind: EventKind) {
        let counter = match kind {
            EventKind::Unknown => &mut self.unknown,
            EventKind::MonitorCreate => &mut self.mon_create,
            EventKind::MonitorState => &mut self.mon_state,
            EventKind::MonitorData => &mut self.mon_data,
            EventKind::NodeCreate => &mut self.node_create,
            EventKind::NodeDestroy => &mut self.node_destroy,
            EventKind::NodePosition => &mut self.node_position,
        };
        *counter += 1;
    }
}

/// Number of events carrying each scope kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScopeCounts {
    pub unknown: u64,
    pub simulation: u64,
    pub node: u64,
}

/// Accumulates counters over a whole trace.
#[derive(Debug, Default)]
pub struct StatAggregator {
    pub events: EventCounts,
    pub scopes: ScopeCounts,
    pub seen_nodes: SeenSet,
    pub seen_contexts: SeenSet,
    pub seen_entities: SeenSet,
    pub seen_states: SeenSet,
}

impl StatAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, scope: &Scope, kind: EventKind) {
        self.events.bump(kind);

        if scope.kinds.contains(ScopeKinds::UNKNOWN) {
            self.scopes.unknown += 1;
        }
        if scope.kinds.contains(ScopeKinds::SIMULATION) {
            self.scopes.simulation += 1;
        }
        if let Some((node_id, _)) = scope.node() {
            self.scopes.node += 1;
            self.seen_nodes.mark(node_id);
        }
    }

    /// Write the counters, either as `name:value` lines or as titled
    /// sections for a human reader.
    pub fn render<W: Write>(&self, human: bool, out: &mut W) -> io::Result<()> {
        let counters = self.counter_lines();
        let seen = self.seen_lines();
        if human {
            render_human(&counters, &seen, out)
        } else {
            for line in &counters {
                if let Line::Counter { name, value, .. } = line {
                    writeln!(out, "{}:{}", name, value)?;
                }
            }
            for line in &seen {
                if let Line::Seen { name, set, .. } = line {
                    writeln!(out, "{}:{}", name, format_seen(set))?;
                }
            }
            Ok(())
        }
    }

    fn counter_lines(&self) -> Vec<Line<'_>> {
        let ev = &self.events;
        let sc = &self.scopes;
        vec![
            Line::title("Number of events", "times"),
            Line::counter("ev_unknown", "Unknown", ev.unknown),
            Line::counter("ev_mon_create", "Mon create", ev.mon_create),
            Line::counter("ev_mon_state", "Mon state", ev.mon_state),
            Line::counter("ev_mon_data", "Mon data", ev.mon_data),
            Line::counter("ev_node_create", "Node create", ev.node_create),
            Line::counter("ev_node_destroy", "Node destroy", ev.node_destroy),
            Line::counter("ev_node_position", "Node position", ev.node_position),
            Line::title("Number of scopes", "times"),
            Line::counter("sc_unknown", "Unknown", sc.unknown),
            Line::counter("sc_simulation", "Simulation", sc.simulation),
            Line::counter("sc_node", "Node", sc.node),
            Line::title("Elements seen", ""),
            Line::counter_unit(
                "nb_seen_nodes",
                "Nodes",
                "distinct nodes",
                self.seen_nodes.len() as u64,
            ),
            Line::counter_unit(
                "nb_seen_contexts",
                "Contexts",
                "distinct contexts",
                self.seen_contexts.len() as u64,
            ),
            Line::counter_unit(
                "nb_seen_entities",
                "Entities",
                "distinct entities",
                self.seen_entities.len() as u64,
            ),
            Line::counter_unit(
                "nb_seen_states",
                "States",
                "distinct states",
                self.seen_states.len() as u64,
            ),
        ]
    }

    fn seen_lines(&self) -> Vec<Line<'_>> {
        vec![
            Line::Title {
                title: "Seen values",
                unit: "",
            },
            Line::Seen {
                name: "seen_nodes",
                human_name: "Nodes",
                set: &self.seen_nodes,
            },
            Line::Seen {
                name: "seen_contexts",
                human_name: "Contexts",
                set: &self.seen_contexts,
            },
            Line::Seen {
                name: "seen_entities",
                human_name: "Entities",
                set: &self.seen_entities,
            },
            Line::Seen {
                name: "seen_states",
                human_name: "States",
                set: &self.seen_states,
            },
        ]
    }
}

enum Line<'a> {
    /// Starts a section. `unit` applies to counters that have none.
    Title {
        title: &'static str,
        unit: &'static str,
    },
    Counter {
        name: &'static str,
        human_name: &'static str,
        unit: Option<&'static str>,
        value: u64,
    },
    Seen {
        name: &'static str,
        human_name: &'static str,
        set: &'a SeenSet,
    },
}

impl Line<'_> {
    fn title(title: &'static str, unit: &'static str) -> Self {
        Line::Title { title, unit }
    }

    fn counter(name: &'static str, human_name: &'static str, value: u64) -> Self {
        Line::Counter {
            name,
            human_name,
            unit: None,
            value,
        }
    }

    fn counter_unit(
        name: &'static str,
        human_name: &'static str,
        unit: &'static str,
        value: u64,
    ) -> Self {
        Line::Counter {
            name,
            human_name,
            unit: Some(unit),
            value,
        }
    }

    /// Width of the label, if this line is displayed in human form.
    fn label_width(&self) -> Option<usize> {
        match self {
            Line::Title { .. } => None,
            Line::Counter {
                human_name, value, ..
            } => (*value != 0).then_some(human_name.len()),
            Line::Seen { human_name, .. } => Some(human_name.len()),
        }
    }
}

/// Space separated IDs as 4 hex digits, elided after [`MAX_SEEN_DISPLAY`].
fn format_seen(set: &SeenSet) -> String {
    let mut out = String::new();
    for (i, id) in set.iter().enumerate() {
        if i == MAX_SEEN_DISPLAY {
            out.push_str(" ...");
            break;
        }
        out.push_str(&format!(" {:04x}", id));
    }
    out
}

/// Write one titled list. Labels are padded to the widest one shown in
/// this list.
fn render_section<W: Write>(
    lines: &[Line<'_>],
    first: &mut bool,
    out: &mut W,
) -> io::Result<()> {
    let width = lines
        .iter()
        .filter_map(Line::label_width)
        .max()
        .unwrap_or(0);

    let mut section_unit = "";
    for line in lines {
        match line {
            Line::Title { title, unit } => {
                if !*first {
                    writeln!(out)?;
                }
                *first = false;
                writeln!(out, "{}", title)?;
                writeln!(out, "{}", "-".repeat(title.len()))?;
                writeln!(out)?;
                section_unit = *unit;
            }
            Line::Counter {
                human_name,
                unit,
                value,
                ..
            } => {
                if *value == 0 {
                    continue;
                }
                let unit = (*unit).unwrap_or(section_unit);
                write!(out, "{:<width$} : {}", human_name, value, width = width)?;
                if !unit.is_empty() {
                    write!(out, " {}", unit)?;
                }
                writeln!(out)?;
            }
            Line::Seen {
                human_name, set, ..
            } => {
                writeln!(
                    out,
                    "{:<width$} :{}",
                    human_name,
                    format_seen(set),
                    width = width
                )?;
            }
        }
    }
    Ok(())
}

fn render_human<W: Write>(
    counters: &[Line<'_>],
    seen: &[Line<'_>],
    out: &mut W,
) -> io::Result<()> {
    let mut first = true;
    render_section(counters, &mut first, out)?;
    render_section(seen, &mut first, out)
}

impl EventHandler for StatAggregator {
    type Error = AnalysisError;

    fn unknown(&mut self, scope: &Scope, _: u16, _: u32) -> Result<(), AnalysisError> {
        self.record(scope, EventKind::Unknown);
        Ok(())
    }

    fn mon_create(&mut self, scope: &Scope, _: MonitorCreate) -> Result<(), AnalysisError> {
        self.record(scope, EventKind::MonitorCreate);
        Ok(())
    }

    fn mon_state(&mut self, scope: &Scope, event: MonitorState) -> Result<(), AnalysisError> {
        self.record(scope, EventKind::MonitorState);
        self.seen_contexts.mark(event.context);
        self.seen_entities.mark(event.entity);
        self.seen_states.mark(event.state);
        Ok(())
    }

    fn mon_data(&mut self, scope: &Scope, _: MonitorData) -> Result<(), AnalysisError> {
        self.record(scope, EventKind::MonitorData);
        Ok(())
    }

    fn node_create(&mut self, scope: &Scope) -> Result<(), AnalysisError> {
        self.record(scope, EventKind::NodeCreate);
        Ok(())
    }

    fn node_destroy(&mut self, scope: &Scope) -> Result<(), AnalysisError> {
        self.record(scope, EventKind::NodeDestroy);
        Ok(())
    }

    fn node_position(&mut self, scope: &Scope, _: NodePosition) -> Result<(), AnalysisError> {
        self.record(scope, EventKind::NodePosition);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mon_traceparser::{dispatch_event, Event, NodeTime};

    fn state(context: u16, entity: u16, state: u16) -> Event {
        Event::MonitorState(MonitorState {
            context,
            entity,
            state,
        })
    }

    fn node_scope(id: u16) -> Scope {
        Scope {
            kinds: ScopeKinds::NODE,
            node_id: id,
            node_time: NodeTime::default(),
            ..Default::default()
        }
    }

    #[test]
    fn test_seen_set() {
        let mut set = SeenSet::new();
        assert!(set.is_empty());
        assert!(set.mark(0xffff));
        assert!(set.mark(3));
        assert!(!set.mark(3));
        assert!(set.contains(3));
        assert!(!set.contains(4));
        assert_eq!(set.len(), 2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![3, 0xffff]);
    }

    #[test]
    fn test_seen_idempotence() {
        let mut stats = StatAggregator::new();
        for _ in 0..3 {
            dispatch_event(&mut stats, &Scope::default(), state(5, 1, 2)).unwrap();
        }
        assert_eq!(stats.events.mon_state, 3);
        assert_eq!(stats.seen_contexts.len(), 1);
        assert_eq!(stats.seen_entities.len(), 1);
        assert_eq!(stats.seen_states.len(), 1);
    }

    #[test]
    fn test_counts_by_kind_and_scope() {
        let mut stats = StatAggregator::new();
        let both = Scope {
            kinds: ScopeKinds::SIMULATION | ScopeKinds::NODE,
            sim_us: 1,
            ..node_scope(9)
        };
        dispatch_event(&mut stats, &both, Event::NodeCreate).unwrap();
        dispatch_event(&mut stats, &node_scope(2), Event::NodeDestroy).unwrap();
        dispatch_event(
            &mut stats,
            &Scope::default(),
            Event::Unknown {
                type_tag: 40,
                length: 0,
            },
        )
        .unwrap();
        dispatch_event(
            &mut stats,
            &Scope::default(),
            Event::MonitorData(MonitorData {
                context: 6,
                entity: 7,
                payload: vec![0; 4],
            }),
        )
        .unwrap();

        assert_eq!(stats.events.node_create, 1);
        assert_eq!(stats.events.node_destroy, 1);
        assert_eq!(stats.events.unknown, 1);
        assert_eq!(stats.events.mon_data, 1);
        assert_eq!(stats.events.total(), 4);
        assert_eq!(
            stats.scopes,
            ScopeCounts {
                unknown: 0,
                simulation: 1,
                node: 2
            }
        );
        assert_eq!(stats.seen_nodes.iter().collect::<Vec<_>>(), vec![2, 9]);
        // Only MON_STATE marks context, entity and state IDs.
        assert!(stats.seen_contexts.is_empty());
        assert!(stats.seen_states.is_empty());
    }

    #[test]
    fn test_render_normal() {
        let mut stats = StatAggregator::new();
        dispatch_event(&mut stats, &Scope::default(), state(5, 1, 2)).unwrap();

        let mut out = Vec::new();
        stats.render(false, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ev_unknown:0\n\
             ev_mon_create:0\n\
             ev_mon_state:1\n\
             ev_mon_data:0\n\
             ev_node_create:0\n\
             ev_node_destroy:0\n\
             ev_node_position:0\n\
             sc_unknown:0\n\
             sc_simulation:0\n\
             sc_node:0\n\
             nb_seen_nodes:0\n\
             nb_seen_contexts:1\n\
             nb_seen_entities:1\n\
             nb_seen_states:1\n\
             seen_nodes:\n\
             seen_contexts: 0005\n\
             seen_entities: 0001\n\
             seen_states: 0002\n"
        );
    }

    #[test]
    fn test_render_human() {
        let mut stats = StatAggregator::new();
        dispatch_event(&mut stats, &Scope::default(), state(5, 1, 2)).unwrap();

        let mut out = Vec::new();
        stats.render(true, &mut out).unwrap();
        // Each list is aligned on its own widest label.
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Number of events\n\
             ----------------\n\
             \n\
             Mon state : 1 times\n\
             \n\
             Number of scopes\n\
             ----------------\n\
             \n\
             \n\
             Elements seen\n\
             -------------\n\
             \n\
             Contexts  : 1 distinct contexts\n\
             Entities  : 1 distinct entities\n\
             States    : 1 distinct states\n\
             \n\
             Seen values\n\
             -----------\n\
             \n\
             Nodes    :\n\
             Contexts : 0005\n\
             Entities : 0001\n\
             States   : 0002\n"
        );
    }

    #[test]
    fn test_seen_display_is_capped() {
        let mut set = SeenSet::new();
        for id in 0..MAX_SEEN_DISPLAY as u16 {
            set.mark(id);
        }
        let exact = format_seen(&set);
        assert!(!exact.ends_with("..."));
        assert!(exact.ends_with(" 000f"));

        set.mark(0x100);
        let capped = format_seen(&set);
        assert!(capped.ends_with(" 000f ..."));
        assert!(!capped.contains("0100"));
    }
}

//! Per-context state automata built from MON_STATE events.
//!
//! Every context gets its own automaton. A state node is created the first
//! time a state is observed, and an edge from the previously observed state
//! of the same context is created or updated on every later observation.
//! Edges carry timing statistics that can be rendered as DOT labels.

use std::io::{self, Write};

use indexmap::IndexMap;
use mon_traceparser::{
    EventHandler, MonitorCreate, MonitorData, MonitorState, NodePosition, Scope,
};

use crate::error::AnalysisError;
use crate::names::NameRegistry;

/// A value that can be aggregated into min/max/sum statistics.
pub trait Sample: Copy + PartialOrd {
    fn accumulate(self, other: Self) -> Self;
    fn as_f64(self) -> f64;
}

impl Sample for u64 {
    fn accumulate(self, other: Self) -> Self {
        self.wrapping_add(other)
    }

    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl Sample for f64 {
    fn accumulate(self, other: Self) -> Self {
        self + other
    }

    fn as_f64(self) -> f64 {
        self
    }
}

/// Min, max and sum of the samples recorded for one metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aggregate<T> {
    pub sum: T,
    pub min: T,
    pub max: T,
    pub samples: u64,
}

impl<T: Sample> Aggregate<T> {
    fn record(slot: &mut Option<Self>, delta: T) {
        match slot {
            Some(agg) => {
                agg.sum = agg.sum.accumulate(delta);
                if delta < agg.min {
                    agg.min = delta;
                }
                if delta > agg.max {
                    agg.max = delta;
                }
                agg.samples += 1;
            }
            None => {
                *slot = Some(Aggregate {
                    sum: delta,
                    min: delta,
                    max: delta,
                    samples: 1,
                })
            }
        }
    }

    /// Average over the recorded samples, not over every traversal of the
    /// edge.
    pub fn mean(&self) -> f64 {
        self.sum.as_f64() / self.samples as f64
    }
}

/// Statistics attached to an edge.
///
/// A metric only receives samples from transitions where both the source
/// and the destination scope carry the data it needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelStats {
    pub count: u64,
    pub sim_us: Option<Aggregate<u64>>,
    pub node_ms: Option<Aggregate<f64>>,
    pub cycles: Option<Aggregate<u64>>,
}

impl LabelStats {
    fn update(&mut self, source: &Scope, destination: &Scope) {
        self.count += 1;

        if let (Some(from), Some(to)) = (source.simulation(), destination.simulation()) {
            Aggregate::record(&mut self.sim_us, to.wrapping_sub(from));
        }

        // Node clocks are only comparable on the same node.
        if let (Some((from_node, from)), Some((to_node, to))) = (source.node(), destination.node())
        {
            if from_node == to_node {
                Aggregate::record(&mut self.node_ms, to.millis - from.millis);
                Aggregate::record(&mut self.cycles, to.cycles.wrapping_sub(from.cycles));
            }
        }
    }
}

/// The statistic used to label edges in the rendered graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphMetric {
    SimUs,
    Cycles,
    NodeMs,
    Count,
}

impl GraphMetric {
    pub const ALL: [GraphMetric; 4] = [
        GraphMetric::SimUs,
        GraphMetric::Cycles,
        GraphMetric::NodeMs,
        GraphMetric::Count,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GraphMetric::SimUs => "sim_us",
            GraphMetric::Cycles => "cycles",
            GraphMetric::NodeMs => "node_ms",
            GraphMetric::Count => "count",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GraphMetric::SimUs => "Simulation time in microseconds",
            GraphMetric::Cycles => "Node time in cycles",
            GraphMetric::NodeMs => "Node time in milliseconds",
            GraphMetric::Count => "Number of transitions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Edge label for this metric. The average divides by the number of
    /// traversals that carried the metric, so traversals lacking the needed
    /// scope do not pull it towards zero. A metric without samples is `n/a`.
    pub fn label(self, stats: &LabelStats) -> String {
        match self {
            GraphMetric::SimUs => stats.sim_us.map_or_else(not_available, |agg| {
                format!("min={} avg={:.3} max={}", agg.min, agg.mean(), agg.max)
            }),
            GraphMetric::Cycles => stats.cycles.map_or_else(not_available, |agg| {
                format!("min={} avg={:.3} max={}", agg.min, agg.mean(), agg.max)
            }),
            GraphMetric::NodeMs => stats.node_ms.map_or_else(not_available, |agg| {
                format!("min={:.3} avg={:.3} max={:.3}", agg.min, agg.mean(), agg.max)
            }),
            GraphMetric::Count => format!("count={}", stats.count),
        }
    }
}

fn not_available() -> String {
    "n/a".to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub destination: u16,
    pub stats: LabelStats,
}

#[derive(Debug, Clone)]
pub struct AutomatonState {
    pub state: u16,
    /// Scope of the most recent event that entered this state.
    pub last_scope: Scope,
    /// Outgoing edges, at most one per destination, in creation order.
    pub transitions: Vec<Transition>,
}

impl AutomatonState {
    fn new(state: u16) -> Self {
        Self {
            state,
            last_scope: Scope::default(),
            transitions: Vec::new(),
        }
    }

    pub fn transition(&self, destination: u16) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| t.destination == destination)
    }
}

#[derive(Debug, Clone)]
pub struct Automaton {
    context: u16,
    last_state: Option<u16>,
    states: IndexMap<u16, AutomatonState>,
}

impl Automaton {
    fn new(context: u16) -> Self {
        Self {
            context,
            last_state: None,
            states: IndexMap::new(),
        }
    }

    pub fn context(&self) -> u16 {
        self.context
    }

    /// The state entered by the most recent event of this context.
    pub fn last_state(&self) -> Option<u16> {
        self.last_state
    }

    pub fn state(&self, state: u16) -> Option<&AutomatonState> {
        self.states.get(&state)
    }

    /// States in order of first observation.
    pub fn states(&self) -> impl Iterator<Item = &AutomatonState> {
        self.states.values()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transition_count(&self) -> usize {
        self.states.values().map(|s| s.transitions.len()).sum()
    }

    fn observe(&mut self, scope: &Scope, state: u16) -> Result<(), AnalysisError> {
        self.states
            .entry(state)
            .or_insert_with(|| AutomatonState::new(state));

        if let Some(previous) = self.last_state {
            let source = self.state_mut(previous)?;
            let source_scope = source.last_scope;
            match source
                .transitions
                .iter_mut()
                .find(|t| t.destination == state)
            {
                Some(t) => t.stats.update(&source_scope, scope),
                None => {
                    let mut stats = LabelStats::default();
                    stats.update(&source_scope, scope);
                    source.transitions.push(Transition {
                        destination: state,
                        stats,
                    });
                }
            }
        }

        self.state_mut(state)?.last_scope = *scope;
        self.last_state = Some(state);
        Ok(())
    }

    fn state_mut(&mut self, state: u16) -> Result<&mut AutomatonState, AnalysisError> {
        let context = self.context;
        self.states
            .get_mut(&state)
            .ok_or(AnalysisError::MissingState { context, state })
    }

    /// Write this automaton as a DOT digraph.
    pub fn render<W: Write>(
        &self,
        names: &NameRegistry,
        metric: Option<GraphMetric>,
        out: &mut W,
    ) -> io::Result<()> {
        let context = self.context;
        writeln!(out, "digraph \"{}\" {{", names.context_label(context))?;

        for state in self.states.values() {
            let source = names.state_label(context, state.state);
            writeln!(out, "\"{}\";", source)?;
            for t in &state.transitions {
                let destination = names.state_label(context, t.destination);
                match metric {
                    Some(metric) => writeln!(
                        out,
                        "\"{}\" -> \"{}\" [ label=\"{}\" ]",
                        source,
                        destination,
                        metric.label(&t.stats)
                    )?,
                    None => writeln!(out, "\"{}\" -> \"{}\"", source, destination)?,
                }
            }
        }

        writeln!(out, "}}")
    }
}

/// Builds one automaton per context from the MON_STATE events it is fed.
#[derive(Debug, Default)]
pub struct AutomatonBuilder {
    contexts: IndexMap<u16, Automaton>,
}

impl AutomatonBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, scope: &Scope, event: &MonitorState) -> Result<(), AnalysisError> {
        self.contexts
            .entry(event.context)
            .or_insert_with(|| Automaton::new(event.context))
            .observe(scope, event.state)
    }

    pub fn automaton(&self, context: u16) -> Option<&Automaton> {
        self.contexts.get(&context)
    }

    /// Automata in order of first observation of their context.
    pub fn automata(&self) -> impl Iterator<Item = &Automaton> {
        self.contexts.values()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Write every automaton, one digraph after the other.
    pub fn render<W: Write>(
        &self,
        names: &NameRegistry,
        metric: Option<GraphMetric>,
        out: &mut W,
    ) -> io::Result<()> {
        for automaton in self.contexts.values() {
            automaton.render(names, metric, out)?;
        }
        Ok(())
    }
}

impl EventHandler for AutomatonBuilder {
    type Error = AnalysisError;

    fn unknown(&mut self, _: &Scope, _: u16, _: u32) -> Result<(), AnalysisError> {
        Ok(())
    }

    fn mon_create(&mut self, _: &Scope, _: MonitorCreate) -> Result<(), AnalysisError> {
        Ok(())
    }

    fn mon_state(&mut self, scope: &Scope, event: MonitorState) -> Result<(), AnalysisError> {
        self.observe(scope, &event)
    }

    fn mon_data(&mut self, _: &Scope, _: MonitorData) -> Result<(), AnalysisError> {
        Ok(())
    }

    fn node_create(&mut self, _: &Scope) -> Result<(), AnalysisError> {
        Ok(())
    }

    fn node_destroy(&mut self, _: &Scope) -> Result<(), AnalysisError> {
        Ok(())
    }

    fn node_position(&mut self, _: &Scope, _: NodePosition) -> Result<(), AnalysisError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mon_traceparser::{NodeTime, ScopeKinds};

    fn sim(us: u64) -> Scope {
        Scope {
            kinds: ScopeKinds::SIMULATION,
            sim_us: us,
            ..Default::default()
        }
    }

    fn node(id: u16, cycles: u64, millis: f64) -> Scope {
        Scope {
            kinds: ScopeKinds::NODE,
            node_id: id,
            node_time: NodeTime { cycles, millis },
            ..Default::default()
        }
    }

    fn both(us: u64, id: u16, cycles: u64, millis: f64) -> Scope {
        Scope {
            kinds: ScopeKinds::SIMULATION | ScopeKinds::NODE,
            sim_us: us,
            ..node(id, cycles, millis)
        }
    }

    fn st(context: u16, state: u16) -> MonitorState {
        MonitorState {
            context,
            entity: 0,
            state,
        }
    }

    #[test]
    fn test_first_event_creates_node_only() {
        let mut b = AutomatonBuilder::new();
        b.observe(&sim(10), &st(5, 1)).unwrap();

        let a = b.automaton(5).unwrap();
        assert_eq!(a.state_count(), 1);
        assert_eq!(a.transition_count(), 0);
        assert_eq!(a.last_state(), Some(1));
    }

    #[test]
    fn test_transition_dedup() {
        let mut b = AutomatonBuilder::new();
        for (t, s) in [(0, 1), (10, 2), (20, 1), (40, 2)] {
            b.observe(&sim(t), &st(5, s)).unwrap();
        }

        let a = b.automaton(5).unwrap();
        assert_eq!(a.state_count(), 2);
        assert_eq!(a.transition_count(), 2);

        let forward = a.state(1).unwrap().transition(2).unwrap();
        assert_eq!(forward.stats.count, 2);
        assert_eq!(
            forward.stats.sim_us,
            Some(Aggregate {
                sum: 30,
                min: 10,
                max: 20,
                samples: 2
            })
        );

        let back = a.state(2).unwrap().transition(1).unwrap();
        assert_eq!(back.stats.count, 1);
    }

    #[test]
    fn test_self_loop() {
        let mut b = AutomatonBuilder::new();
        b.observe(&sim(0), &st(1, 7)).unwrap();
        b.observe(&sim(5), &st(1, 7)).unwrap();

        let a = b.automaton(1).unwrap();
        assert_eq!(a.state_count(), 1);
        let t = a.state(7).unwrap().transition(7).unwrap();
        assert_eq!(t.stats.count, 1);
        assert_eq!(t.stats.sim_us.unwrap().min, 5);
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut b = AutomatonBuilder::new();
        b.observe(&sim(0), &st(1, 1)).unwrap();
        b.observe(&sim(1), &st(2, 9)).unwrap();
        b.observe(&sim(2), &st(1, 2)).unwrap();

        assert_eq!(b.automaton(1).unwrap().transition_count(), 1);
        assert_eq!(b.automaton(2).unwrap().transition_count(), 0);
        let order: Vec<_> = b.automata().map(|a| a.context()).collect();
        assert_eq!(order, vec![1, 2]);
    }

    #[test]
    fn test_metric_gating() {
        let mut b = AutomatonBuilder::new();
        // Source has no NODE scope: only the simulation delta counts.
        b.observe(&sim(100), &st(4, 1)).unwrap();
        b.observe(&both(150, 3, 1000, 2.0), &st(4, 2)).unwrap();

        let stats = &b.automaton(4).unwrap().state(1).unwrap().transitions[0].stats;
        assert_eq!(stats.count, 1);
        assert_eq!(stats.sim_us.unwrap().sum, 50);
        assert_eq!(stats.node_ms, None);
        assert_eq!(stats.cycles, None);
    }

    #[test]
    fn test_mixed_traversals_of_one_edge() {
        let mut b = AutomatonBuilder::new();
        // 1 -> 2 first with node data on both ends.
        b.observe(&node(3, 100, 1.0), &st(4, 1)).unwrap();
        b.observe(&node(3, 200, 2.0), &st(4, 2)).unwrap();
        // Then again with simulation time only.
        b.observe(&sim(300), &st(4, 1)).unwrap();
        b.observe(&sim(400), &st(4, 2)).unwrap();

        let stats = &b.automaton(4).unwrap().state(1).unwrap().transition(2).unwrap().stats;
        assert_eq!(stats.count, 2);
        assert_eq!(
            stats.cycles,
            Some(Aggregate {
                sum: 100,
                min: 100,
                max: 100,
                samples: 1
            })
        );
        assert_eq!(stats.node_ms.unwrap().samples, 1);
        assert_eq!(stats.sim_us.unwrap().sum, 100);
        assert_eq!(GraphMetric::Cycles.label(stats), "min=100 avg=100.000 max=100");
        assert_eq!(GraphMetric::Count.label(stats), "count=2");
    }

    #[test]
    fn test_node_metrics_require_same_node() {
        let mut b = AutomatonBuilder::new();
        b.observe(&node(1, 100, 1.0), &st(4, 1)).unwrap();
        b.observe(&node(2, 300, 3.0), &st(4, 2)).unwrap();
        b.observe(&node(2, 500, 4.5), &st(4, 1)).unwrap();

        let a = b.automaton(4).unwrap();
        let cross = &a.state(1).unwrap().transition(2).unwrap().stats;
        assert_eq!(cross.cycles, None);
        assert_eq!(cross.sim_us, None);

        let same = &a.state(2).unwrap().transition(1).unwrap().stats;
        assert_eq!(same.cycles.unwrap().sum, 200);
        assert_eq!(same.node_ms.unwrap().sum, 1.5);
    }

    #[test]
    fn test_wrapping_deltas() {
        let mut b = AutomatonBuilder::new();
        b.observe(&sim(10), &st(0, 1)).unwrap();
        b.observe(&sim(4), &st(0, 2)).unwrap();

        let stats = &b.automaton(0).unwrap().state(1).unwrap().transitions[0].stats;
        assert_eq!(stats.sim_us.unwrap().min, u64::MAX - 5);
    }

    #[test]
    fn test_uses_last_scope_of_source_state() {
        let mut b = AutomatonBuilder::new();
        b.observe(&sim(0), &st(0, 1)).unwrap();
        b.observe(&sim(10), &st(0, 2)).unwrap();
        // State 1 is re-entered; its scope is refreshed.
        b.observe(&sim(100), &st(0, 1)).unwrap();
        b.observe(&sim(103), &st(0, 2)).unwrap();

        let agg = b
            .automaton(0)
            .unwrap()
            .state(1)
            .unwrap()
            .transition(2)
            .unwrap()
            .stats
            .sim_us;
        assert_eq!(agg.unwrap().min, 3);
        assert_eq!(agg.unwrap().max, 10);
    }

    #[test]
    fn test_labels() {
        let mut stats = LabelStats::default();
        stats.update(&both(0, 1, 0, 0.0), &both(10, 1, 80, 0.5));
        stats.update(&both(0, 1, 0, 0.0), &both(20, 1, 160, 1.5));

        assert_eq!(
            GraphMetric::SimUs.label(&stats),
            "min=10 avg=15.000 max=20"
        );
        assert_eq!(
            GraphMetric::Cycles.label(&stats),
            "min=80 avg=120.000 max=160"
        );
        assert_eq!(
            GraphMetric::NodeMs.label(&stats),
            "min=0.500 avg=1.000 max=1.500"
        );
        assert_eq!(GraphMetric::Count.label(&stats), "count=2");

        let empty = LabelStats {
            count: 3,
            ..Default::default()
        };
        assert_eq!(GraphMetric::SimUs.label(&empty), "n/a");
    }

    #[test]
    fn test_metric_names() {
        for metric in GraphMetric::ALL {
            assert_eq!(GraphMetric::from_name(metric.name()), Some(metric));
        }
        assert_eq!(GraphMetric::from_name("bogus"), None);
    }

    #[test]
    fn test_render_dot() {
        let mut names = NameRegistry::new();
        names.register_context(5, "RADIO");
        names.register_state(5, 0, "ON").unwrap();

        let mut b = AutomatonBuilder::new();
        b.observe(&sim(0), &st(5, 0)).unwrap();
        b.observe(&sim(7), &st(5, 1)).unwrap();

        let mut out = Vec::new();
        b.render(&names, Some(GraphMetric::SimUs), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "digraph \"RADIO\" {\n\
             \"ON\";\n\
             \"ON\" -> \"0001\" [ label=\"min=7 avg=7.000 max=7\" ]\n\
             \"0001\";\n\
             }\n"
        );

        let mut out = Vec::new();
        b.render(&names, None, &mut out).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("\"ON\" -> \"0001\"\n"));
    }

    #[test]
    fn test_render_empty() {
        let mut out = Vec::new();
        AutomatonBuilder::new()
            .render(&NameRegistry::new(), Some(GraphMetric::Count), &mut out)
            .unwrap();
        assert!(out.is_empty());
    }
}

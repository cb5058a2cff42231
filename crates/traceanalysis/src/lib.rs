//! Consumers of decoded monitor traces.
//!
//! Each output mode is an [`EventHandler`](mon_traceparser::EventHandler):
//! [`PrintMode`] lists events as they arrive, [`AutomatonBuilder`] folds
//! MON_STATE events into per-context state graphs and [`StatAggregator`]
//! counts events, scopes and distinct IDs. All of them use a
//! [`NameRegistry`] to show IDs by name.

mod dump;
mod error;
pub mod graph;
pub mod ids;
pub mod names;
mod print;
pub mod stat;
mod typed;

pub use dump::hex_dump;
pub use error::AnalysisError;
pub use graph::{
    Aggregate, Automaton, AutomatonBuilder, AutomatonState, GraphMetric, LabelStats, Transition,
};
pub use ids::register_mon_ids;
pub use names::{NameError, NameRegistry};
pub use print::PrintMode;
pub use stat::{SeenSet, StatAggregator};
pub use typed::Typed;

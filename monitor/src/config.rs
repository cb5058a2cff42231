use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use mon_traceanalysis::{GraphMetric, NameError, NameRegistry};
use mon_traceparser::{ParserConfig, DEFAULT_MAX_PAYLOAD};

use crate::mode::OutputMode;

/// Keywords that list the available choices instead of selecting one.
const LIST_KEYWORDS: [&str; 2] = ["list", "?"];

#[derive(Parser, Debug)]
#[command(name = "mon-trace")]
#[command(about = "Decode and analyse binary monitor traces")]
#[command(version)]
pub struct Options {
    /// Output mode (use `list` or `?` to display available modes)
    #[arg(short, long, default_value = "print")]
    pub output: String,

    /// Metric used to label graph edges (use `list` or `?` to display available metrics)
    #[arg(short = 'G', long)]
    pub graph_metric: Option<String>,

    /// Display events or statistics in a human readable format
    #[arg(short = 'H', long)]
    pub human: bool,

    /// Disable resolution of monitor ID names
    #[arg(short = 'i', long)]
    pub no_ids: bool,

    /// JSON file with additional context, state and entity names
    #[arg(short, long)]
    pub names: Option<PathBuf>,

    /// Largest MON_DATA payload accepted, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    pub max_payload: usize,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    pub verbose: bool,

    /// The trace file to analyse
    pub trace_file: Option<PathBuf>,
}

/// What the tool was asked to do.
#[derive(Debug)]
pub enum Command {
    ListModes,
    ListMetrics,
    Run(RunConfig),
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: OutputMode,
    pub metric: Option<GraphMetric>,
    pub human: bool,
    pub resolve_names: bool,
    pub names_file: Option<PathBuf>,
    pub parser: ParserConfig,
    pub trace_file: PathBuf,
}

impl Options {
    /// Validate the options and turn them into a command.
    pub fn command(&self) -> Result<Command> {
        if LIST_KEYWORDS.contains(&self.output.as_str()) {
            return Ok(Command::ListModes);
        }
        let mode = OutputMode::from_name(&self.output).with_context(|| {
            format!(
                "output mode {:?} not found, use list or ? to display available modes",
                self.output
            )
        })?;

        let metric = match self.graph_metric.as_deref() {
            Some(name) if LIST_KEYWORDS.contains(&name) => return Ok(Command::ListMetrics),
            Some(name) => Some(GraphMetric::from_name(name).with_context(|| {
                format!(
                    "graph metric {:?} not found, use list or ? to display available metrics",
                    name
                )
            })?),
            None => None,
        };

        let trace_file = self
            .trace_file
            .clone()
            .context("expected a trace file")?;

        Ok(Command::Run(RunConfig {
            mode,
            metric,
            human: self.human,
            resolve_names: !self.no_ids,
            names_file: self.names.clone(),
            parser: ParserConfig {
                max_payload: self.max_payload,
            },
            trace_file,
        }))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NamedId {
    pub id: u16,
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ContextNames {
    pub id: u16,
    pub name: String,
    #[serde(default)]
    pub states: Vec<NamedId>,
    #[serde(default)]
    pub entities: Vec<NamedId>,
}

/// Extra names loaded from a JSON file, for example:
///
/// ```json
/// {
///   "contexts": [
///     { "id": 16, "name": "APP", "states": [{ "id": 0, "name": "IDLE" }] }
///   ],
///   "common_states": [{ "id": 65532, "name": "RESET" }]
/// }
/// ```
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NamesFile {
    #[serde(default)]
    pub contexts: Vec<ContextNames>,
    #[serde(default)]
    pub common_states: Vec<NamedId>,
    #[serde(default)]
    pub common_entities: Vec<NamedId>,
}

impl NamesFile {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("cannot open names file {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("invalid names file {}", path.display()))
    }

    /// Register every name. A context is registered before its states and
    /// entities.
    pub fn apply(&self, names: &mut NameRegistry) -> Result<(), NameError> {
        for context in &self.contexts {
            names.register_context(context.id, context.name.clone());
            for state in &context.states {
                names.register_state(context.id, state.id, state.name.clone())?;
            }
            for entity in &context.entities {
                names.register_entity(context.id, entity.id, entity.name.clone())?;
            }
        }
        for state in &self.common_states {
            names.register_common_state(state.id, state.name.clone());
        }
        for entity in &self.common_entities {
            names.register_common_entity(entity.id, entity.name.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn parse(args: &[&str]) -> Options {
        Options::try_parse_from(std::iter::once("mon-trace").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cmd = parse(&["trace.bin"]).command().unwrap();
        assert_matches!(cmd, Command::Run(cfg) => {
            assert_eq!(cfg.mode, OutputMode::Print);
            assert_eq!(cfg.metric, None);
            assert!(!cfg.human);
            assert!(cfg.resolve_names);
            assert_eq!(cfg.parser.max_payload, DEFAULT_MAX_PAYLOAD);
            assert_eq!(cfg.trace_file, PathBuf::from("trace.bin"));
        });
    }

    #[test]
    fn test_graph_options() {
        let cmd = parse(&["-o", "graph", "-G", "node_ms", "-H", "-i", "t.bin"])
            .command()
            .unwrap();
        assert_matches!(cmd, Command::Run(cfg) => {
            assert_eq!(cfg.mode, OutputMode::Graph);
            assert_eq!(cfg.metric, Some(GraphMetric::NodeMs));
            assert!(cfg.human);
            assert!(!cfg.resolve_names);
        });
    }

    #[test]
    fn test_list_keywords() {
        assert_matches!(parse(&["-o", "list"]).command(), Ok(Command::ListModes));
        assert_matches!(parse(&["-o", "?"]).command(), Ok(Command::ListModes));
        assert_matches!(
            parse(&["-o", "graph", "-G", "?"]).command(),
            Ok(Command::ListMetrics)
        );
    }

    #[test]
    fn test_unknown_choices() {
        let err = parse(&["-o", "bogus", "t.bin"]).command().unwrap_err();
        assert!(err.to_string().contains("output mode \"bogus\" not found"));

        let err = parse(&["-G", "bogus", "t.bin"]).command().unwrap_err();
        assert!(err.to_string().contains("graph metric \"bogus\" not found"));
    }

    #[test]
    fn test_missing_trace_file() {
        assert!(parse(&["-o", "stat"]).command().is_err());
    }

    #[test]
    fn test_names_file_apply() {
        let file: NamesFile = serde_json::from_str(
            r#"{
                "contexts": [
                    { "id": 16, "name": "APP",
                      "states": [{ "id": 0, "name": "IDLE" }],
                      "entities": [{ "id": 3, "name": "LED" }] }
                ],
                "common_states": [{ "id": 65532, "name": "RESET" }],
                "common_entities": [{ "id": 9, "name": "ALL" }]
            }"#,
        )
        .unwrap();

        let mut names = NameRegistry::new();
        file.apply(&mut names).unwrap();
        assert_eq!(names.resolve_context(16), Some("APP"));
        assert_eq!(names.resolve_state(16, 0), Some("IDLE"));
        assert_eq!(names.resolve_entity(16, 3), Some("LED"));
        assert_eq!(names.resolve_state(1, 65532), Some("RESET"));
        assert_eq!(names.resolve_entity(1, 9), Some("ALL"));
    }

    #[test]
    fn test_names_file_rejects_unknown_fields() {
        let res: Result<NamesFile, _> = serde_json::from_str(r#"{ "context": [] }"#);
        assert!(res.is_err());
    }
}

use std::fs::File;
use std::io::{BufReader, Read, Write};

use anyhow::{Context, Result};

use mon_traceanalysis::{
    register_mon_ids, AnalysisError, AutomatonBuilder, GraphMetric, NameRegistry, PrintMode,
    StatAggregator,
};
use mon_traceparser::{dispatch, ParserConfig, TraceParser};

use crate::config::{NamesFile, RunConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Print,
    Graph,
    Stat,
}

impl OutputMode {
    pub const ALL: [OutputMode; 3] = [OutputMode::Print, OutputMode::Graph, OutputMode::Stat];

    pub fn name(self) -> &'static str {
        match self {
            OutputMode::Print => "print",
            OutputMode::Graph => "graph",
            OutputMode::Stat => "stat",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OutputMode::Print => "Print each event on the standard output.",
            OutputMode::Graph => "Output dot graph of the components automata.",
            OutputMode::Stat => "Display statistics.",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.name() == name)
    }
}

/// How a decoded trace is turned into output.
#[derive(Debug, Clone, Copy)]
pub struct Analysis {
    pub mode: OutputMode,
    pub metric: Option<GraphMetric>,
    pub human: bool,
}

pub fn list_modes<W: Write>(out: &mut W) -> std::io::Result<()> {
    for mode in OutputMode::ALL {
        writeln!(out, "{}\t{}", mode.name(), mode.description())?;
    }
    Ok(())
}

pub fn list_metrics<W: Write>(out: &mut W) -> std::io::Result<()> {
    for metric in GraphMetric::ALL {
        writeln!(out, "{}\t{}", metric.name(), metric.description())?;
    }
    Ok(())
}

/// The built-in names, then those of the names file, if any.
pub fn load_names(config: &RunConfig) -> Result<NameRegistry> {
    let mut names = NameRegistry::new();
    register_mon_ids(&mut names).context("cannot register built-in monitor names")?;
    if let Some(path) = &config.names_file {
        NamesFile::load(path)?
            .apply(&mut names)
            .with_context(|| format!("cannot register names from {}", path.display()))?;
    }
    names.set_enabled(config.resolve_names);
    Ok(names)
}

/// Decode the whole trace read from `source` and write the selected output.
///
/// Print mode writes as it goes, so output for the events before a decode
/// error has already been written when the error is returned. Graph and
/// stat modes write nothing unless the whole trace decodes.
pub fn analyse<R: Read, W: Write>(
    source: R,
    parser_config: ParserConfig,
    analysis: Analysis,
    names: &NameRegistry,
    out: &mut W,
) -> Result<u64, AnalysisError> {
    let mut parser = TraceParser::open(source, parser_config)?;
    let header = parser.header();
    log::debug!(
        "trace version {}.{}, {} mode",
        header.major,
        header.minor,
        analysis.mode.name()
    );

    let count = match analysis.mode {
        OutputMode::Print => {
            let mut print = PrintMode::new(names, &mut *out, analysis.human);
            dispatch(&mut parser, &mut print)?
        }
        OutputMode::Graph => {
            let mut builder = AutomatonBuilder::new();
            let count = dispatch(&mut parser, &mut builder)?;
            builder.render(names, analysis.metric, out)?;
            count
        }
        OutputMode::Stat => {
            let mut stats = StatAggregator::new();
            let count = dispatch(&mut parser, &mut stats)?;
            stats.render(analysis.human, out)?;
            count
        }
    };

    out.flush()?;
    Ok(count)
}

/// Run the configured analysis over the trace file.
pub fn run<W: Write>(config: &RunConfig, out: &mut W) -> Result<u64> {
    let names = load_names(config)?;
    let path = &config.trace_file;
    let file =
        File::open(path).with_context(|| format!("cannot open trace {}", path.display()))?;

    let analysis = Analysis {
        mode: config.mode,
        metric: config.metric,
        human: config.human,
    };
    let count = analyse(
        BufReader::new(file),
        config.parser.clone(),
        analysis,
        &names,
        out,
    )
    .with_context(|| format!("{}: parsing error", path.display()))?;

    log::info!("{}: {} events", path.display(), count);
    Ok(count)
}

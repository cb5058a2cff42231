use mon_traceparser::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    /// The automaton references a state it never created.
    #[error("automaton for context {context:04x} has no state {state:04x}")]
    MissingState { context: u16, state: u16 },
}

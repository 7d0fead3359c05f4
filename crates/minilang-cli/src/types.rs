//! Shared types used across CLI commands and tests.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Global flags after parsing.
#[derive(Clone, Debug)]
pub(crate) struct RunCfg {
    pub(crate) options: minilang_engine::pipeline::PipelineOptions,
    pub(crate) format: OutputFormat,
}

//! Run orchestration
//!
//! A [`Pipeline`] takes raw policy text to rendered output and records the
//! stage it is in. Errors move it to [`Stage::Aborted`]; nothing is rendered
//! unless every stage succeeds.

use super::emit::{self, OutputFormat, RenderOptions};
use super::error::Result;
use super::ingest;
use super::optimizer::{self, OptimizerOptions};
use crate::config::Config;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Stage {
    #[strum(serialize = "idle")]
    Idle,
    #[strum(serialize = "ingesting")]
    Ingesting,
    #[strum(serialize = "collapsing")]
    Collapsing,
    #[strum(serialize = "filtering")]
    Filtering,
    #[strum(serialize = "aggregating")]
    Aggregating,
    #[strum(serialize = "grouping services")]
    GroupingServices,
    #[strum(serialize = "emitting")]
    Emitting,
    #[strum(serialize = "done")]
    Done,
    #[strum(serialize = "aborted")]
    Aborted,
}

/// One optimizer run over one input
#[derive(Debug)]
pub struct Pipeline<'a> {
    config: &'a Config,
    format: OutputFormat,
    stage: Stage,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config, format: OutputFormat) -> Self {
        Self {
            config,
            format,
            stage: Stage::Idle,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, next: Stage) {
        if next != self.stage {
            tracing::debug!(from = %self.stage, to = %next, "pipeline stage");
            self.stage = next;
        }
    }

    /// Ingests, optimizes and renders `input`.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage; the pipeline is then
    /// [`Stage::Aborted`].
    pub fn run(&mut self, input: &str) -> Result<String> {
        let result = self.run_stages(input);
        if result.is_err() {
            self.enter(Stage::Aborted);
        }
        result
    }

    fn run_stages(&mut self, input: &str) -> Result<String> {
        let config = self.config;

        self.enter(Stage::Ingesting);
        let ingested = ingest::ingest(input, config)?;

        let options = OptimizerOptions::from(config);
        let policy = optimizer::optimize_tracked(&ingested.rules, &options, &mut |stage: Stage| {
            self.enter(stage);
        })?;

        self.enter(Stage::Emitting);
        let rendered = emit::render(
            &policy,
            ingested.form,
            &RenderOptions::from(config),
            self.format,
        )?;

        self.enter(Stage::Done);
        tracing::info!(
            input_rules = ingested.rules.len(),
            output_lines = rendered.lines().count(),
            "optimized policy"
        );
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_reaches_done() {
        let config = Config::default();
        let mut pipeline = Pipeline::new(&config, OutputFormat::Text);
        assert_eq!(pipeline.stage(), Stage::Idle);

        let out = pipeline
            .run("10.0.0.0 255.255.255.0 tcp:80\n10.0.1.0 255.255.255.0 tcp:80\n")
            .unwrap();
        assert_eq!(out, "10.0.0.0 255.255.254.0 tcp:80\n");
        assert_eq!(pipeline.stage(), Stage::Done);
    }

    #[test]
    fn test_bad_record_aborts() {
        let config = Config::default();
        let mut pipeline = Pipeline::new(&config, OutputFormat::Text);
        assert!(pipeline.run("10.0.0.0 255.255.255.0 host\n").is_err());
        assert_eq!(pipeline.stage(), Stage::Aborted);
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::GroupingServices.to_string(), "grouping services");
        assert_eq!(Stage::Aborted.to_string(), "aborted");
    }
}

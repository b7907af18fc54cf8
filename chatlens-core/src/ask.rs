//! Answer orchestration
//!
//! [`ChatLens`] is the top-level handle. It owns the log, the optional
//! generator, and the analysis configuration, and it decides which answer
//! path runs for a question.
//!
//! The decision is fixed: the generator is attempted only when one is
//! configured and the selected context is non-empty; any generator failure
//! falls back to the statistics-based analyzer. The fallback path itself
//! never fails, so `ask` only errors on caller mistakes or storage trouble.

use crate::analyze;
use crate::config::{AnalysisConfig, Config, ContextConfig};
use crate::context;
use crate::db::{ChatLog, RowOrder};
use crate::error::{Error, Result};
use crate::generate::{create_generator, AnswerGenerator};
use crate::normalize::normalize_all;
use crate::stats;
use crate::types::{AnswerSource, AskResponse, LogStatus, LogSummary};
use chrono::Utc;
use std::path::Path;

/// Row sample cap for whole-log summaries.
const SUMMARY_SAMPLE_ROWS: usize = 1_000_000;

/// Top-level handle over one chat log.
pub struct ChatLens {
    log: ChatLog,
    generator: Option<Box<dyn AnswerGenerator>>,
    context: ContextConfig,
    analysis: AnalysisConfig,
}

impl std::fmt::Debug for ChatLens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatLens")
            .field("log_path", &self.log.path())
            .field("has_generator", &self.generator.is_some())
            .field("context", &self.context)
            .field("analysis", &self.analysis)
            .finish()
    }
}

impl ChatLens {
    /// Open the configured log and build the default generator when an API
    /// key is available.
    pub fn open(config: &Config) -> Result<Self> {
        let generator = create_generator(&config.generator)?;
        Self::open_with_generator(config, generator)
    }

    /// Open with a caller-supplied generator (used for tests and custom
    /// backends). `None` serves every answer from the fallback path.
    pub fn open_with_generator(
        config: &Config,
        generator: Option<Box<dyn AnswerGenerator>>,
    ) -> Result<Self> {
        config.validate()?;

        let path = config
            .log
            .path
            .clone()
            .ok_or_else(|| Error::Config("log.path is required (set it in config or pass --db)".to_string()))?;
        let log = ChatLog::open(&path)?;

        if generator.is_none() {
            tracing::info!("no generator API key configured; answers use the fallback analyzer");
        }

        Ok(Self {
            log,
            generator,
            context: config.context.clone(),
            analysis: config.analysis.clone(),
        })
    }

    /// Answer a question over the given context mode.
    ///
    /// Mode names are `recent`, `monthly`, and `all`; anything else is an
    /// error rather than a silent default.
    pub fn ask(&self, question: &str, mode: &str) -> Result<AskResponse> {
        let parsed = context::parse(mode, Utc::now(), &self.context)?;
        let window = context::select(&self.log, &parsed)?;

        let mut source = AnswerSource::Fallback;
        let mut answer = None;

        if let Some(generator) = &self.generator {
            if !window.messages.is_empty() {
                match generator.generate(question, &window.messages) {
                    Ok(text) => {
                        source = AnswerSource::Generator;
                        answer = Some(text);
                    }
                    Err(err) if err.is_generator_failure() => {
                        tracing::warn!(error = %err, "generator failed, falling back");
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "unexpected generator error, falling back");
                    }
                }
            }
        }

        let answer = match answer {
            Some(text) => text,
            None => analyze::analyze(
                question,
                &window.messages,
                &self.analysis.keywords,
                self.analysis.top_keywords,
            ),
        };

        tracing::info!(
            mode,
            source = source.as_str(),
            messages = window.messages.len(),
            "answered question"
        );

        Ok(AskResponse {
            answer,
            confidence: source.confidence(),
            source,
            message_count: window.messages.len(),
            context: mode.to_string(),
        })
    }

    /// Whole-log overview: raw row count plus statistics over a large
    /// normalized sample.
    pub fn summary(&self) -> Result<LogSummary> {
        let total_events = self.log.count_rows()?;
        let rows = self
            .log
            .fetch_all_rows(SUMMARY_SAMPLE_ROWS, RowOrder::NewestById)?;
        let batch = normalize_all(&rows);
        let statistics = stats::compute(
            &batch.messages,
            &self.analysis.keywords,
            self.analysis.top_keywords,
        );

        Ok(LogSummary {
            total_events,
            total_messages: statistics.total_messages,
            unique_participants: statistics.unique_participants,
            unique_groups: batch.groups.len() as u64,
            date_range: statistics.date_range,
            most_active_user: statistics.most_active_user,
            average_messages_per_day: statistics.average_messages_per_day,
        })
    }

    /// Schema detection result and row count for the backing log.
    pub fn status(&self) -> Result<LogStatus> {
        self.log.status()
    }

    /// Re-open the backing file and re-run schema detection.
    pub fn reload(&self) -> Result<()> {
        self.log.reload()
    }

    /// Path of the backing SQLite file.
    pub fn log_path(&self) -> &Path {
        self.log.path()
    }
}

//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use corroborate_domain::{Polarity, VerifiedClaim};
use corroborate_engine::{Outcome, RunEvent, RunResult, SubQueryStatus};
use colored::*;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Whether output is colorized.
    pub fn color_enabled(&self) -> bool {
        self.color_enabled
    }

    /// Format a run result.
    ///
    /// `threshold` selects the claims shown in quiet mode.
    pub fn format_result(&self, result: &RunResult, threshold: f64) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
            OutputFormat::Table => Ok(self.format_result_table(result)),
            OutputFormat::Quiet => Ok(self.format_result_quiet(result, threshold)),
        }
    }

    fn format_result_table(&self, result: &RunResult) -> String {
        let mut sections = Vec::new();

        let headline = format!(
            "{} ({}) after {} iteration(s){}",
            result.state,
            result.stop_reason,
            result.iterations,
            if result.partial { ", partial" } else { "" }
        );
        sections.push(match result.state {
            Outcome::Synthesize if !result.partial => self.success(&headline),
            Outcome::Synthesize => self.warning(&headline),
            Outcome::Failed => self.error(&headline),
        });

        sections.push(self.format_claims(&result.verified_claims));

        let mut builder = Builder::default();
        builder.push_record(["Sub-query", "Sources", "Status", "Attempts"]);
        for state in &result.sub_queries {
            let sources: Vec<&str> = state.sub_query.sources.iter().map(|k| k.as_str()).collect();
            builder.push_record([
                state.sub_query.text.clone(),
                sources.join(", "),
                self.status(state.status),
                state.attempts.to_string(),
            ]);
        }
        sections.push(self.table(builder));

        if !result.warnings.is_empty() {
            let warnings: Vec<String> = result
                .warnings
                .iter()
                .map(|w| self.warning(&w.to_string()))
                .collect();
            sections.push(warnings.join("\n"));
        }

        sections.join("\n\n")
    }

    /// Format verified claims as a table.
    pub fn format_claims(&self, claims: &[VerifiedClaim]) -> String {
        if claims.is_empty() {
            return self.colorize("No claims found.", "yellow");
        }

        let mut sorted: Vec<&VerifiedClaim> = claims.iter().collect();
        sorted.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut builder = Builder::default();
        builder.push_record(["Claim", "Confidence", "Kinds", "Sources", "Flags"]);
        for claim in sorted {
            let statement = match claim.claim.polarity {
                Polarity::Asserted => claim.claim.statement.clone(),
                Polarity::Negated => format!("NOT: {}", claim.claim.statement),
            };
            let origins: Vec<&str> = claim.claim.support.keys().map(String::as_str).collect();
            let flags = if claim.contradicted { "contradicted" } else { "" };
            builder.push_record([
                statement,
                format!("{:.2}", claim.confidence),
                claim.diversity.to_string(),
                origins.join("\n"),
                flags.to_string(),
            ]);
        }
        self.table(builder)
    }

    /// Confident claims, one statement per line.
    fn format_result_quiet(&self, result: &RunResult, threshold: f64) -> String {
        result
            .confident_claims(threshold)
            .iter()
            .map(|c| c.claim.statement.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Format a progress event as one line.
    pub fn event(&self, event: &RunEvent) -> String {
        let line = match event {
            RunEvent::Started { run_id, mode } => format!("run {} started ({} mode)", run_id, mode),
            RunEvent::PhaseEntered { phase, iteration } => {
                format!("[{}] {}", iteration, phase)
            }
            RunEvent::SubQueriesPlanned { count, refinement } => format!(
                "planned {} {}sub-queries",
                count,
                if *refinement { "refined " } else { "" }
            ),
            RunEvent::DispatchFinished {
                sub_query,
                items,
                failures,
            } => format!(
                "sub-query {}: {} items, {} failed sources",
                sub_query, items, failures
            ),
            RunEvent::ClaimsVerified { total, new } => {
                format!("{} claims ({} new)", total, new)
            }
            RunEvent::Decided {
                iteration,
                decision,
            } => format!("iteration {}: {}", iteration, decision),
            RunEvent::Finished { outcome, reason } => format!("finished: {} ({})", outcome, reason),
        };
        self.info(&line)
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn status(&self, status: SubQueryStatus) -> String {
        let color = match status {
            SubQueryStatus::Resolved => "green",
            SubQueryStatus::Open => "yellow",
            SubQueryStatus::NoEvidence => "red",
            SubQueryStatus::Superseded => "cyan",
        };
        self.colorize(status.as_str(), color)
    }

    fn table(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corroborate_domain::{
        Claim, Mode, Polarity, Query, RetrievedItem, SourceDocument, SourceKind, SubQuery,
    };
    use corroborate_engine::{
        RunMutation, RunState, RunWarning, SourceFailure, SourceWarning, StopReason,
    };
    use std::collections::BTreeSet;

    fn create_test_result(confidence: f64) -> RunResult {
        let query = Query::new("Is X true?", Mode::Deep);
        let sub_query = SubQuery::new(query.id, 0, "Is X true?", BTreeSet::from([SourceKind::Web]));
        let item = RetrievedItem::from_document(
            SourceDocument::new("https://news.example/x", "X is true"),
            SourceKind::Web,
            sub_query.id,
            0.6,
            0,
        );
        let claim = VerifiedClaim {
            claim: Claim::from_item("X is true", Polarity::Asserted, &item),
            confidence,
            diversity: 1,
            support_count: 1,
            support_weight: 0.6,
            opposing_weight: 0.0,
            contradicted: false,
            first_seen_iteration: 1,
        };

        let mut state = RunState::new(query, 4);
        let id = sub_query.id;
        state
            .apply_all([
                RunMutation::AddSubQueries(vec![sub_query]),
                RunMutation::RecordDispatch { sub_query: id, items: 1 },
                RunMutation::ReplaceClaims(vec![claim]),
                RunMutation::Warn(RunWarning::Source(SourceWarning {
                    sub_query: id,
                    kind: SourceKind::Academic,
                    reason: SourceFailure::Timeout,
                })),
                RunMutation::AdvanceIteration,
                RunMutation::Terminate {
                    outcome: Outcome::Failed,
                    reason: StopReason::IterationBudget,
                },
            ])
            .unwrap();
        state.into_result(false).unwrap()
    }

    #[test]
    fn test_json_format() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_result(&create_test_result(0.7), 0.5).unwrap();
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["partial"], true);
        assert_eq!(json["verified_claims"][0]["claim"]["statement"], "X is true");
    }

    #[test]
    fn test_table_format() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_result(&create_test_result(0.7), 0.5).unwrap();
        assert!(output.contains("FAILED (iteration_budget) after 1 iteration(s), partial"));
        assert!(output.contains("Confidence"));
        assert!(output.contains("0.70"));
        assert!(output.contains("https://news.example/x"));
        assert!(output.contains("source 'academic' timed out"));
    }

    #[test]
    fn test_quiet_format_filters_by_threshold() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let result = create_test_result(0.4);
        assert_eq!(formatter.format_result(&result, 0.5).unwrap(), "");
        assert_eq!(formatter.format_result(&result, 0.3).unwrap(), "X is true");
    }

    #[test]
    fn test_empty_claims() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert!(formatter.format_claims(&[]).contains("No claims found"));
    }

    #[test]
    fn test_event_line() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let line = formatter.event(&RunEvent::ClaimsVerified { total: 3, new: 1 });
        assert_eq!(line, "ℹ 3 claims (1 new)");
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let msg = formatter.success("test");
        assert_eq!(msg, "✓ test");
    }
}

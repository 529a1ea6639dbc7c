//! Plain-text renderings of evaluation results. Output depends only on the input values.

use std::fmt;

use crate::evaluation::metrics::{Comparison, Metrics, Winner};
use crate::evaluation::runner::{ABReport, RecordingReport, SuiteReport};

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}%", v * 100.0))
}

fn cents(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:+.1} cents", v))
}

fn signed(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:+.4}", v))
}

fn winner_label<'a>(winner: Winner, first: &'a str, second: &'a str) -> &'a str {
    match winner {
        Winner::First => first,
        Winner::Second => second,
        Winner::Tie => "tie",
    }
}

struct MetricsText<'a> {
    metrics: &'a Metrics,
    name: &'a str,
}

impl fmt::Display for MetricsText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.metrics;
        writeln!(f, "=== {} ===", self.name)?;
        writeln!(
            f,
            "frames: {} total, {} voiced, {} detected voiced",
            m.total_frames, m.voiced_frames, m.detected_voiced_frames
        )?;
        writeln!(f, "raw pitch accuracy: {}", percent(m.rpa))?;
        writeln!(f, "gross pitch error: {}", percent(m.gpe))?;
        writeln!(f, "octave error rate: {}", percent(m.octave_error_rate))?;
        writeln!(f, "voicing accuracy: {}", percent(m.voicing_accuracy))?;
        writeln!(f, "voicing recall: {}", percent(m.voicing_recall))?;
        writeln!(f, "mean error: {}", cents(m.mean_cents_error))?;
        writeln!(f, "median error: {}", cents(m.median_cents_error))?;
        writeln!(f, "error std dev: {}", cents(m.std_cents_error))?;
        writeln!(f, "mean absolute error: {}", cents(m.mean_abs_cents_error))?;
        writeln!(
            f,
            "confidence discriminates: {}",
            if m.confidence_discriminates { "yes" } else { "no" }
        )
    }
}

struct ComparisonText<'a> {
    comparison: &'a Comparison,
    first: &'a str,
    second: &'a str,
}

impl fmt::Display for ComparisonText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} vs {} ===", self.first, self.second)?;
        for (metric, difference) in &self.comparison.differences {
            let winner = self
                .comparison
                .winners
                .get(metric)
                .copied()
                .unwrap_or(Winner::Tie);
            writeln!(
                f,
                "{:<18} difference {:>9}  winner: {}",
                metric,
                signed(*difference),
                winner_label(winner, self.first, self.second)
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== synthetic suite: {} ===", self.detector)?;
        for test in &self.tests {
            writeln!(
                f,
                "{:<24} rpa {:>7}  gpe {:>7}  octave {:>7}",
                test.name,
                percent(test.metrics.rpa),
                percent(test.metrics.gpe),
                percent(test.metrics.octave_error_rate)
            )?;
        }
        for (kind, summary) in &self.by_kind {
            writeln!(
                f,
                "{} ({} tests): mean rpa {}, mean gpe {}",
                kind,
                summary.tests,
                percent(summary.mean_rpa),
                percent(summary.mean_gpe)
            )?;
        }
        writeln!(
            f,
            "overall ({} tests): mean rpa {}, mean gpe {}",
            self.overall.tests,
            percent(self.overall.mean_rpa),
            percent(self.overall.mean_gpe)
        )
    }
}

impl fmt::Display for RecordingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== recording: {} ===", self.detector)?;
        writeln!(
            f,
            "notes: {} detected, {} expected ({:+})",
            self.validation.detected_count, self.validation.expected_count, self.validation.difference
        )?;
        for note in &self.notes {
            writeln!(
                f,
                "#{} {:.3}-{:.3} s: {} spread {} voiced {}",
                note.index + 1,
                note.start_time,
                note.end_time,
                note.mean_frequency
                    .map_or_else(|| "n/a".to_string(), |hz| format!("{:.2} Hz", hz)),
                note.std_cents
                    .map_or_else(|| "n/a".to_string(), |c| format!("{:.1} cents", c)),
                percent(note.voiced_ratio)
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ABReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.detector1.as_str();
        let second = self.detector2.as_str();
        writeln!(f, "=== A/B: {} vs {} ===", first, second)?;
        for test in &self.tests {
            let rpa = test
                .comparison
                .winners
                .get("rpa")
                .copied()
                .unwrap_or(Winner::Tie);
            writeln!(f, "{:<24} rpa winner: {}", test.name, winner_label(rpa, first, second))?;
        }
        for (metric, tally) in &self.tallies {
            writeln!(
                f,
                "{}: {} {} / {} {} / {} ties",
                metric, first, tally.detector1, second, tally.detector2, tally.ties
            )?;
        }
        writeln!(
            f,
            "overall winner: {}",
            winner_label(self.overall_winner, first, second)
        )
    }
}

pub fn generate_report(metrics: &Metrics, name: &str) -> String {
    MetricsText { metrics, name }.to_string()
}

pub fn generate_comparison_report(comparison: &Comparison, first: &str, second: &str) -> String {
    ComparisonText {
        comparison,
        first,
        second,
    }
    .to_string()
}

//! Terminal output formatting with colors and box drawing.

use colored::Colorize;

use crate::result::{Outcome, RunReport, TestReport};

/// Format a RunReport for human-readable terminal output.
pub fn format_report(report: &RunReport) -> String {
    let mut output = String::new();
    let sep = "\u{2500}".repeat(62);

    output.push_str("calcium-glm\n");
    output.push_str(&sep);
    output.push('\n');
    if let Some(label) = &report.label {
        output.push_str(&format!("  Label: {}\n", label));
    }
    output.push('\n');

    for test in &report.tests {
        output.push_str(&format_test(test));
        output.push('\n');
    }

    output.push_str(&sep);
    output.push('\n');
    let completed = report.completed().count();
    let failed = report.failed().count();
    output.push_str(&format!(
        "{} completed, {} failed, {} skipped in {:.2} s\n",
        completed,
        failed,
        report.tests.len() - completed - failed,
        report.runtime_secs
    ));

    output
}

/// Format one test's report.
pub fn format_test(test: &TestReport) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "  Test {}: {}  {}\n",
        test.test,
        test.description,
        format_outcome(test.outcome)
    ));

    if let Some(summary) = &test.summary {
        output.push_str(&format!(
            "    Design: {} frames x {} regressors ({} dof)\n",
            summary.n_frames, summary.n_regressors, summary.dof
        ));
        output.push_str(&format!(
            "    Mask: {} of {} voxels\n",
            summary.masked_voxels, summary.total_voxels
        ));
        output.push_str(&format!(
            "    AR(1): {} bins, mean {:.2}\n",
            summary.n_ar1_bins, summary.mean_ar1
        ));
        output.push_str(&format!(
            "    z range: {:.2} to {:.2}, peak effect {:.2}\n",
            summary.min_z, summary.max_z, summary.max_effect
        ));
        let above = format!("{} above", summary.voxels_above_threshold);
        let above = if summary.voxels_above_threshold > 0 {
            above.green().bold().to_string()
        } else {
            above
        };
        output.push_str(&format!(
            "    |z| > {:.2}: {}, {} below\n",
            summary.z_threshold, above, summary.voxels_below_threshold
        ));
        if summary.degenerate_voxels > 0 {
            output.push_str(&format!(
                "    {}\n",
                format!("{} voxels with zero variance", summary.degenerate_voxels).yellow()
            ));
        }
    }

    if let Some(failure) = &test.failure {
        output.push_str(&format!("    {}\n", failure.message.dimmed()));
    }

    for path in &test.outputs {
        output.push_str(&format!("    -> {}\n", path.display()));
    }

    output
}

/// Format Outcome for display.
fn format_outcome(outcome: Outcome) -> String {
    match outcome {
        Outcome::Completed => "\u{2713} done".green().to_string(),
        Outcome::SkippedEmptyMask => "\u{26A0} empty mask".yellow().to_string(),
        Outcome::Failed => "\u{2717} failed".red().bold().to_string(),
    }
}

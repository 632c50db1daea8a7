use crate::cli::{Cli, Commands};
use crate::domain::models::ConformanceReport;
use crate::services::config::RunConfig;
use crate::services::output::print_verdict;
use crate::services::runner::run_conformance;

pub fn handle_run_command(cli: &Cli) -> anyhow::Result<bool> {
    let Commands::Run(args) = &cli.command else {
        return Ok(false);
    };

    let config = RunConfig::from_args(args)?;
    let report = run_conformance(&config)?;
    print_verdict(cli.json, report.conformant(), &report, render_report)?;
    if let Some(path) = &config.report_path {
        if !cli.json {
            println!("report: {}", path.display());
        }
    }
    if !report.conformant() {
        std::process::exit(1);
    }
    Ok(true)
}

fn render_report(report: &ConformanceReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .results
        .iter()
        .map(|r| {
            format!(
                "{}\t{}\t{}\t{}",
                r.outcome,
                r.check_id,
                r.requirement_ids.join(","),
                r.notes.as_deref().unwrap_or("")
            )
        })
        .collect();
    let s = &report.summary;
    lines.push(format!(
        "{} {}: passed={} failed={} skipped={} not_applicable={} error={} xfailed={} total={}",
        report.profile,
        if report.conformant() {
            "conformant"
        } else {
            "NOT conformant"
        },
        s.passed,
        s.failed,
        s.skipped,
        s.not_applicable,
        s.error,
        s.xfailed,
        s.total
    ));
    lines
}

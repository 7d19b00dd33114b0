use std::io::{self, IsTerminal};

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use harvest_core::{CommandStatus, ExecutionOutcome, GlobalOptions};
use serde_json::Value;

mod cli;
mod style;

use cli::{build_command, HarvestCli};
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = HarvestCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        json: cli.json,
    };

    let command = build_command(&cli.command);
    let outcome = harvest_core::execute(&global, &command).map_err(|err| eyre!("{err:?}"))?;
    let code = emit_output(&cli, command.name(), &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("harvest_core={level},harvest={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn emit_output(cli: &HarvestCli, command: &str, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.exit_code();
    let style = Style::new(cli.no_color, io::stdout().is_terminal());

    if cli.json {
        let payload = harvest_core::to_json_response(command, outcome);
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !cli.quiet || outcome.status != CommandStatus::Ok {
        let message = harvest_core::format_status_message(command, &outcome.message);
        println!("{}", style.status(&outcome.status, &message));
        for (tone, line) in package_lines(&outcome.details) {
            println!("{}", style.package_line(&tone, &line));
        }
        if let Some(hint) = hint_from_details(&outcome.details) {
            println!("{}", style.info(&format!("Hint: {hint}")));
        }
    }

    Ok(code)
}

/// Non-success package reports from `fetch`, flagged packages from `scan`.
fn package_lines(details: &Value) -> Vec<(String, String)> {
    let mut lines = Vec::new();
    if let Some(reports) = details.get("reports").and_then(Value::as_array) {
        for report in reports {
            let outcome = report.get("outcome").and_then(Value::as_str).unwrap_or("");
            if outcome == "success" {
                continue;
            }
            let package = report.get("package").and_then(Value::as_str).unwrap_or("?");
            let reason = report
                .get("cause")
                .and_then(Value::as_str)
                .unwrap_or(outcome);
            lines.push((outcome.to_string(), format!("{package}: {reason}")));
        }
    }
    if let Some(flagged) = details.get("flagged").and_then(Value::as_array) {
        for scan in flagged {
            let package = scan.get("package").and_then(Value::as_str).unwrap_or("?");
            if let Some(error) = scan.get("error").and_then(Value::as_str) {
                lines.push(("failure".to_string(), format!("{package}: {error}")));
            }
            for finding in scan
                .get("findings")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                let file = finding.get("file").and_then(Value::as_str).unwrap_or("?");
                let message = finding.get("message").and_then(Value::as_str).unwrap_or("");
                lines.push(("finding".to_string(), format!("{package}: {file}: {message}")));
            }
        }
    }
    lines
}

fn hint_from_details(details: &Value) -> Option<&'static str> {
    match details.get("kind").and_then(Value::as_str)? {
        "usage" => Some("create the target directory first; harvest never creates it"),
        "cache-io" => Some("fix or remove info.json in the target directory, then rerun"),
        "network" => Some("check connectivity; HARVEST_HTTP_ATTEMPTS controls retries"),
        _ => None,
    }
}

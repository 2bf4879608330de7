use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use colored::Colorize;
use nbreg_diff::{diff_notebooks, filter_diff, render_diff, validate_pattern, RenderOptions};
use nbreg_exec::ProcessorRegistry;
use nbreg_regress::{
    Outcome, RegressionComparator, RegressionConfig, RegressionResult, CONFIG_FILE_NAME,
};
use nbreg_types::read_notebook;
use serde_json::json;
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let format = cli.format;
    match cli.command {
        Command::Check(args) => cmd_check(args, format),
        Command::Diff(args) => cmd_diff(args, format),
        Command::Processors => cmd_processors(format),
    }
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

fn cmd_check(args: CheckArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    if args.no_color || format == OutputFormat::Json {
        colored::control::set_override(false);
    }
    let config = build_config(&args, format)?;
    let comparator =
        RegressionComparator::jupyter(config).context("invalid regression configuration")?;

    let notebooks = collect_notebooks(&args.paths)?;
    if notebooks.is_empty() {
        anyhow::bail!("no notebooks found");
    }

    let mut failures = 0usize;
    let mut reports = Vec::with_capacity(notebooks.len());
    for path in &notebooks {
        let report = match comparator.check(path, false) {
            Ok(result) => {
                if result.outcome.is_failure() {
                    failures += 1;
                }
                Report::Checked(result)
            }
            Err(err) => {
                failures += 1;
                Report::Error(err.to_string())
            }
        };
        match format {
            OutputFormat::Text => print_report(path, &report),
            OutputFormat::Json => reports.push(report_json(path, &report)),
        }
    }

    match format {
        OutputFormat::Text => {
            let summary = format!("{} checked, {} failed", notebooks.len(), failures);
            if failures == 0 {
                println!("{} {}", "✓".green().bold(), summary);
            } else {
                println!("{} {}", "✗".red().bold(), summary);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
    }

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Load the configuration file and apply command-line overrides.
fn build_config(args: &CheckArgs, format: OutputFormat) -> anyhow::Result<RegressionConfig> {
    let mut config = match &args.config {
        Some(path) => RegressionConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => RegressionConfig::load_or_default(CONFIG_FILE_NAME)?,
    };

    if let Some(cwd) = &args.cwd {
        config.exec_cwd = Some(cwd.clone());
    }
    if let Some(timeout) = args.timeout {
        config.exec_timeout = timeout;
    }
    config.exec_allow_errors |= args.allow_errors;
    config.exec_notebook &= !args.no_exec;
    config.coverage |= args.coverage;
    if !args.post_processors.is_empty() {
        config.post_processors = args.post_processors.clone();
    }
    config.diff_ignore.extend(args.ignore.iter().cloned());
    config.diff_replace.extend(args.replace_rules());
    config.force_regen |= args.force_regen;
    config.diff_color_words |= args.color_words;
    if args.no_color || format == OutputFormat::Json {
        config.diff_use_color = false;
    }

    debug!(?config, "effective configuration");
    Ok(config)
}

/// Expand directories into the `*.ipynb` files below them, skipping
/// checkpoint directories. Explicit file arguments are kept as given.
fn collect_notebooks(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for root in paths {
        if !root.is_dir() {
            anyhow::ensure!(root.exists(), "no such file or directory: {}", root.display());
            found.push(root.clone());
            continue;
        }
        let walker = walkdir::WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".ipynb_checkpoints");
        for entry in walker {
            let entry = entry.with_context(|| format!("walking {}", root.display()))?;
            if entry.file_type().is_file() && is_notebook(entry.path()) {
                found.push(entry.into_path());
            }
        }
    }
    Ok(found)
}

fn is_notebook(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "ipynb")
}

enum Report {
    Checked(RegressionResult),
    Error(String),
}

fn print_report(path: &Path, report: &Report) {
    let name = path.display().to_string();
    match report {
        Report::Checked(result) => match &result.outcome {
            Outcome::Pass => println!("{} {}", "PASS".green().bold(), name),
            Outcome::Skipped { .. } => {
                println!("{} {} ({})", "SKIP".yellow().bold(), name, result.outcome)
            }
            Outcome::Mismatch => {
                println!("{} {}", "FAIL".red().bold(), name);
                println!("{}", result.diff_text);
            }
            Outcome::Regenerated { .. } => {
                println!("{} {}", "REGEN".cyan().bold(), name);
                println!("{}", result.diff_text);
            }
            Outcome::ExecutionFailed(error) => {
                println!("{} {}: {}", "ERROR".red().bold(), name, error);
                if !result.diff_filtered.is_empty() {
                    println!("{}", result.diff_text);
                }
            }
        },
        Report::Error(message) => println!("{} {}: {}", "ERROR".red().bold(), name, message),
    }
}

fn report_json(path: &Path, report: &Report) -> serde_json::Value {
    let path = path.display().to_string();
    match report {
        Report::Checked(result) => json!({
            "path": path,
            "outcome": result.outcome.name(),
            "message": result.outcome.to_string(),
            "diff": result.diff_filtered,
            "diff_text": result.diff_text,
            "stages": result
                .stages
                .iter()
                .map(|s| json!({"stage": s.stage.name(), "elapsed_ms": s.elapsed.as_millis() as u64}))
                .collect::<Vec<_>>(),
        }),
        Report::Error(message) => json!({
            "path": path,
            "outcome": "error",
            "message": message,
        }),
    }
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

fn cmd_diff(args: DiffArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    for pattern in &args.ignore {
        validate_pattern(pattern)?;
    }
    let expected = read_notebook(&args.expected)?;
    let obtained = read_notebook(&args.obtained)?;
    let diff = filter_diff(&diff_notebooks(&expected, &obtained)?, &args.ignore);

    match format {
        OutputFormat::Text => {
            if diff.is_empty() {
                println!("{} notebooks match", "✓".green().bold());
            } else {
                let options = RenderOptions {
                    use_color: !args.no_color,
                    color_words: false,
                };
                println!("{}", render_diff(&expected.to_value(), &diff, options));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&diff)?),
    }

    Ok(if diff.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

// ---------------------------------------------------------------------------
// processors
// ---------------------------------------------------------------------------

fn cmd_processors(format: OutputFormat) -> anyhow::Result<ExitCode> {
    let registry = ProcessorRegistry::with_builtins();
    match format {
        OutputFormat::Text => println!("{}", registry.describe()),
        OutputFormat::Json => {
            let entries: Vec<_> = registry
                .names()
                .into_iter()
                .filter_map(|name| registry.get(name))
                .map(|p| json!({"name": p.name, "description": p.description}))
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use nbreg_regress::DEFAULT_IGNORE;

    fn check_args(argv: &[&str]) -> CheckArgs {
        let mut full = vec!["nbreg", "check"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Check(args) => args,
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn flags_override_file_configuration() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("custom.toml");
        std::fs::write(&file, "exec_timeout = 10\ndiff_ignore = [\"/metadata\"]\n").unwrap();
        let file = file.display().to_string();

        let args = check_args(&[
            "--config",
            &file,
            "--timeout",
            "60",
            "--no-exec",
            "--ignore",
            "/cells/*/outputs",
            "--replace",
            "/cells",
            "a",
            "b",
            "--post-processor",
            "coalesce_streams",
        ]);
        let config = build_config(&args, OutputFormat::Text).unwrap();
        assert_eq!(config.exec_timeout, 60);
        assert!(!config.exec_notebook);
        assert_eq!(config.diff_ignore, vec!["/metadata", "/cells/*/outputs"]);
        assert_eq!(
            config.diff_replace,
            vec![("/cells".into(), "a".into(), "b".into())]
        );
        assert_eq!(config.post_processors, vec!["coalesce_streams"]);
    }

    #[test]
    fn json_output_disables_color() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("empty.toml");
        std::fs::write(&file, "").unwrap();
        let args = check_args(&["--config", &file.display().to_string()]);
        let config = build_config(&args, OutputFormat::Json).unwrap();
        assert!(!config.diff_use_color);
        assert_eq!(config.diff_ignore, vec![DEFAULT_IGNORE]);
    }

    #[test]
    fn notebooks_are_collected_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("sub/.ipynb_checkpoints")).unwrap();
        for name in ["b.ipynb", "a.ipynb", "notes.txt", "sub/c.ipynb", "sub/.ipynb_checkpoints/c.ipynb"] {
            std::fs::write(root.join(name), "{}").unwrap();
        }

        let found = collect_notebooks(&[root.to_path_buf()]).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.ipynb"),
                PathBuf::from("b.ipynb"),
                PathBuf::from("sub/c.ipynb"),
            ]
        );
    }

    #[test]
    fn missing_paths_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_notebooks(&[dir.path().join("nope.ipynb")]).is_err());
    }
}

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use nbreg_config::{config_from_metadata, ConfigError};
use nbreg_diff::{
    apply_replacements, diff_values, filter_diff, render_diff, validate_pattern, RenderOptions,
    ReplaceRule,
};
use nbreg_exec::{
    execute_in_workdir, ExecRequest, ExecutionError, Executor, JupyterExecutor, Processor,
    ProcessorRegistry, Resources,
};
use nbreg_types::{read_notebook, write_notebook, Notebook};
use tracing::{debug, info, warn};

use crate::config::RegressionConfig;
use crate::error::Result;
use crate::result::{Outcome, RegressionResult};
use crate::stage::{Stage, StageTrace};

// ---------------------------------------------------------------------------
// RegressionComparator
// ---------------------------------------------------------------------------

/// Executes notebooks and compares the result against the stored outputs.
///
/// All configuration is validated when the comparator is built, so a bad
/// ignore pattern or processor name fails before any notebook is executed.
pub struct RegressionComparator {
    config: RegressionConfig,
    rules: Vec<ReplaceRule>,
    processors: Vec<Processor>,
    executor: Box<dyn Executor>,
}

impl fmt::Debug for RegressionComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegressionComparator")
            .field("config", &self.config)
            .field("rules", &self.rules.len())
            .field("processors", &self.processors)
            .finish_non_exhaustive()
    }
}

impl RegressionComparator {
    /// Build a comparator, resolving processor names against `registry`.
    pub fn new(
        config: RegressionConfig,
        executor: impl Executor + 'static,
        registry: &ProcessorRegistry,
    ) -> Result<Self> {
        if config.exec_timeout == 0 {
            return Err(invalid_option("exec_timeout", "must be greater than zero").into());
        }
        if let Some(cwd) = &config.exec_cwd {
            if !cwd.is_dir() {
                let reason = format!("'{}' is not an existing directory", cwd.display());
                return Err(invalid_option("exec_cwd", reason).into());
            }
        }
        for pattern in &config.diff_ignore {
            validate_pattern(pattern).map_err(ConfigError::from)?;
        }

        let rules = config
            .diff_replace
            .iter()
            .map(|(path, regex, replacement)| {
                ReplaceRule::new(path.as_str(), regex, replacement.as_str())
                    .map_err(ConfigError::from)
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let processors = config
            .post_processors
            .iter()
            .map(|name| {
                registry
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownProcessor {
                        name: name.clone(),
                        registered: registry.names().join(", "),
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self {
            config,
            rules,
            processors,
            executor: Box::new(executor),
        })
    }

    /// A comparator running notebooks through Jupyter with the built-in
    /// post-processors.
    pub fn jupyter(config: RegressionConfig) -> Result<Self> {
        Self::new(
            config,
            JupyterExecutor::new(),
            &ProcessorRegistry::with_builtins(),
        )
    }

    pub fn config(&self) -> &RegressionConfig {
        &self.config
    }

    /// Compare the notebook stored at `path`.
    ///
    /// With `raise_errors`, a mismatch, regeneration or execution failure is
    /// returned as the matching [`crate::RegressionError`].
    pub fn check(&self, path: impl AsRef<Path>, raise_errors: bool) -> Result<RegressionResult> {
        let path = path.as_ref();
        debug!(path = %path.display(), "checking notebook");
        let notebook = read_notebook(path)?;
        let result = self.check_notebook(&notebook, Some(path))?;
        if raise_errors {
            result.into_checked()
        } else {
            Ok(result)
        }
    }

    /// Compare an in-memory notebook; `source` is where a regenerated
    /// notebook is written.
    pub fn check_notebook(
        &self,
        notebook: &Notebook,
        source: Option<&Path>,
    ) -> Result<RegressionResult> {
        let mut trace = StageTrace::start();
        trace.record(Stage::Init, None);

        let metadata = config_from_metadata(notebook)?;
        let notebook_rules = metadata.replace_rules()?;
        trace.record(Stage::Loaded, Some(format!("{} cells", notebook.len())));

        if metadata.skip {
            info!(reason = %metadata.skip_reason, "notebook skipped");
            trace.record(Stage::Decided, Some("skipped".into()));
            return Ok(RegressionResult {
                outcome: Outcome::Skipped {
                    reason: metadata.skip_reason,
                },
                initial: notebook.clone(),
                final_notebook: notebook.clone(),
                diff_full: Vec::new(),
                diff_filtered: Vec::new(),
                diff_text: String::new(),
                resources: self.config.process_resources.clone(),
                stages: trace.finish(),
            });
        }

        let (executed, exec_error, resources) = self.execute(notebook, &mut trace)?;
        let (final_notebook, resources) = self.post_process(executed, resources);
        trace.record(
            Stage::PostProcessed,
            Some(format!("{} processors", self.processors.len())),
        );

        let initial_value = notebook.to_value();
        let final_value = final_notebook.to_value();
        let rules: Vec<ReplaceRule> = self.rules.iter().cloned().chain(notebook_rules).collect();
        // Old values are rendered from the same scrubbed tree the diff was
        // computed against.
        let (initial_value, final_value) = if rules.is_empty() {
            (initial_value, final_value)
        } else {
            (
                apply_replacements(&initial_value, &rules),
                apply_replacements(&final_value, &rules),
            )
        };
        let diff_full = diff_values(&initial_value, &final_value, &[])?;
        trace.record(Stage::Diffed, Some(format!("{} entries", diff_full.len())));

        let patterns: BTreeSet<&str> = self
            .config
            .diff_ignore
            .iter()
            .chain(&metadata.diff_ignore)
            .map(String::as_str)
            .collect();
        let patterns: Vec<&str> = patterns.into_iter().collect();
        let diff_filtered = filter_diff(&diff_full, &patterns);
        let diff_text = render_diff(
            &initial_value,
            &diff_filtered,
            RenderOptions {
                use_color: self.config.diff_use_color,
                color_words: self.config.diff_color_words,
            },
        );
        trace.record(
            Stage::Filtered,
            Some(format!("{} entries", diff_filtered.len())),
        );

        let differs = !diff_filtered.is_empty();
        let regen_target =
            source.filter(|_| differs && self.config.force_regen && exec_error.is_none());
        let outcome = if let Some(path) = regen_target {
            write_notebook(&final_notebook, path)?;
            info!(path = %path.display(), "regenerated expected notebook");
            warn!("notebook differed from its expected output:{diff_text}");
            Outcome::Regenerated {
                path: path.to_path_buf(),
            }
        } else if let Some(error) = exec_error {
            warn!(%error, "notebook execution failed:{diff_text}");
            Outcome::ExecutionFailed(error)
        } else if differs {
            Outcome::Mismatch
        } else {
            Outcome::Pass
        };
        trace.record(Stage::Decided, Some(outcome.name().into()));

        Ok(RegressionResult {
            outcome,
            initial: notebook.clone(),
            final_notebook,
            diff_full,
            diff_filtered,
            diff_text,
            resources,
            stages: trace.finish(),
        })
    }

    fn execute(
        &self,
        notebook: &Notebook,
        trace: &mut StageTrace,
    ) -> Result<(Notebook, Option<ExecutionError>, Resources)> {
        let resources = self.config.process_resources.clone();
        if !self.config.exec_notebook {
            trace.record(Stage::Executed, Some("execution disabled".into()));
            return Ok((notebook.clone(), None, resources));
        }

        let request = ExecRequest {
            cwd: self.config.exec_cwd.clone(),
            timeout: Duration::from_secs(self.config.exec_timeout),
            allow_errors: self.config.exec_allow_errors,
            coverage: self.config.coverage,
            resources,
        };
        let result = execute_in_workdir(&*self.executor, notebook, request)?;

        match result.coverage_data() {
            Ok(Some(files)) => debug!(files = files.len(), "coverage recorded"),
            Ok(None) => {}
            Err(err) => warn!(%err, "ignoring unreadable coverage data"),
        }
        match &result.error {
            Some(error) => trace.record(Stage::ExecFailed, Some(error.to_string())),
            None => trace.record(Stage::Executed, None),
        }
        Ok((result.notebook, result.error, result.resources))
    }

    fn post_process(&self, notebook: Notebook, resources: Resources) -> (Notebook, Resources) {
        self.processors
            .iter()
            .fold((notebook, resources), |(nb, res), processor| {
                debug!(processor = %processor.name, "post-processing");
                processor.apply(nb, res)
            })
    }
}

fn invalid_option(name: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidOption {
        name: name.to_string(),
        reason: reason.into(),
    }
}

//! Docsweep run pipeline
//!
//! A run walks five stages in a fixed order, threading one [`RunState`]
//! through them:
//!
//! Discover → Check Headers → Scan Secrets → Generate Docs → Finalize
//!
//! Per-file problems are recorded in [`RunState::failures`] and the stage
//! carries on. Structural problems (the root cannot be enumerated, the
//! generator transport is down, the run was cancelled) abort the run before
//! Finalize.

use crate::config::PipelineConfig;
use crate::docs::{doc_file_name, finalize_markdown, truncate_source};
use crate::header::HeaderValidator;
use crate::models::{DocOutput, GeneratedText, PromptContext, RunState, Stage};
use crate::sandbox::SandboxedStore;
use crate::secrets::SecretScanner;
use crate::{DocsweepError, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// The external documentation generation capability.
///
/// Implementations fail with [`DocsweepError::Generation`] for a problem
/// with one file and [`DocsweepError::Transport`] when the backend cannot
/// be reached at all. An empty result is treated as a generation failure
/// by the pipeline.
#[async_trait]
pub trait DocGenerator: Send + Sync {
    /// Set up the backend before the first call. Any error aborts the run.
    async fn prepare(&self) -> crate::Result<()> {
        Ok(())
    }

    /// Generate documentation for one file
    async fn generate(&self, context: PromptContext) -> crate::Result<GeneratedText>;
}

/// Pipeline for one sandboxed root
pub struct Pipeline {
    store: Arc<SandboxedStore>,
    headers: HeaderValidator,
    scanner: SecretScanner,
    generator: Option<Arc<dyn DocGenerator>>,
    config: PipelineConfig,
    generation_timeout: Duration,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Creates a pipeline over `root` with the given configuration
    pub fn new(root: impl AsRef<Path>, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let store = SandboxedStore::new(root)?
            .with_extension(config.source.extension.clone())
            .with_exclude_dirs(config.source.exclude_dirs.clone());

        Ok(Self {
            store: Arc::new(store),
            headers: HeaderValidator::new(config.header.clone()),
            scanner: SecretScanner::new(),
            generator: None,
            generation_timeout: Duration::from_secs(config.generation.timeout_seconds),
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// Attach the documentation generator used by Generate Docs
    pub fn with_generator(mut self, generator: Arc<dyn DocGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Observe `token` for cancellation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Replace the header validator
    pub fn with_header_validator(mut self, validator: HeaderValidator) -> Self {
        self.headers = validator;
        self
    }

    /// Override the per-call generation timeout
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// The sandboxed store all reads go through
    pub fn store(&self) -> &SandboxedStore {
        &self.store
    }

    /// Token that cancels this pipeline's runs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Configuration in effect
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Empty state for a run against this pipeline's root
    pub fn new_state(&self, request: &str, out_dir: impl AsRef<Path>) -> RunState {
        RunState::new(
            request,
            self.store.root().to_path_buf(),
            out_dir.as_ref().to_path_buf(),
        )
    }

    /// Run all five stages
    #[instrument(skip(self, request, out_dir), fields(root = %self.store.root().display()))]
    pub async fn run(&self, request: &str, out_dir: impl AsRef<Path>) -> Result<RunState> {
        info!("Starting docsweep pipeline");
        if self.generator.is_none() {
            return Err(DocsweepError::Config(
                "No documentation generator configured".to_string(),
            ));
        }

        let mut state = self.new_state(request, out_dir);
        let mut next = Some(Stage::Discover);
        while let Some(stage) = next {
            info!("Stage: {}", stage);
            state = match stage {
                Stage::Discover => self.discover(state)?,
                Stage::CheckHeaders => self.check_headers(state)?,
                Stage::ScanSecrets => self.scan_secrets(state)?,
                Stage::GenerateDocs => self.generate_docs(state).await?,
                Stage::Finalize => self.finalize(state),
            };
            next = stage.next();
        }

        info!("Pipeline complete");
        Ok(state)
    }

    /// Run discovery, header checks and the secret scan, then summarize.
    ///
    /// No generator is needed; `out_dir` is only recorded in the state.
    #[instrument(skip(self, out_dir), fields(root = %self.store.root().display()))]
    pub fn check(&self, out_dir: impl AsRef<Path>) -> Result<RunState> {
        let state = self.new_state("", out_dir);
        let state = self.discover(state)?;
        let state = self.check_headers(state)?;
        let state = self.scan_secrets(state)?;
        Ok(self.finalize(state))
    }

    /// Discover: list source files under the root
    #[instrument(skip_all)]
    pub fn discover(&self, mut state: RunState) -> Result<RunState> {
        self.ensure_active()?;
        state.discovered_files = self.store.list_source_files()?;
        info!("Discovered {} files", state.discovered_files.len());
        Ok(state)
    }

    /// Check Headers: record failing verdicts
    #[instrument(skip_all)]
    pub fn check_headers(&self, mut state: RunState) -> Result<RunState> {
        let check_dates = self.headers.policy().check_modified_date;

        for file in state.discovered_files.clone() {
            self.ensure_active()?;

            let source = match self.read(&file) {
                Ok(source) => source,
                Err(e) => {
                    warn!("Skipping header check for {}: {}", file, e);
                    state.record_failure(Stage::CheckHeaders, &file, e.to_string());
                    continue;
                }
            };

            let path = check_dates.then(|| self.store.root().join(&file));
            match self.headers.check(&source, path.as_deref()) {
                Ok(verdict) if verdict.ok => {}
                Ok(verdict) => {
                    debug!("Header issue in {}: {}", file, verdict.message);
                    state.header_issues.insert(file, verdict);
                }
                Err(e) => {
                    warn!("Header check failed for {}: {}", file, e);
                    state.record_failure(Stage::CheckHeaders, &file, e.to_string());
                }
            }
        }

        info!("{} files with header issues", state.header_issues.len());
        Ok(state)
    }

    /// Scan Secrets: record non-empty finding lists
    #[instrument(skip_all)]
    pub fn scan_secrets(&self, mut state: RunState) -> Result<RunState> {
        let max_findings = self.config.secrets.max_findings;

        for file in state.discovered_files.clone() {
            self.ensure_active()?;

            match self.read(&file) {
                Ok(source) => {
                    let findings = self.scanner.scan(&source, max_findings);
                    if !findings.is_empty() {
                        debug!("{} findings in {}", findings.len(), file);
                        state.secret_findings.insert(file, findings);
                    }
                }
                Err(e) => {
                    warn!("Skipping secret scan for {}: {}", file, e);
                    state.record_failure(Stage::ScanSecrets, &file, e.to_string());
                }
            }
        }

        info!(
            "{} findings across {} files",
            state.total_findings(),
            state.secret_findings.len()
        );
        Ok(state)
    }

    /// Generate Docs: call the generator per file, bounded in concurrency.
    ///
    /// Results are committed in path order once every call has settled.
    /// Cancellation drops in-flight calls and commits nothing.
    #[instrument(skip_all)]
    pub async fn generate_docs(&self, mut state: RunState) -> Result<RunState> {
        let generator = self.generator.clone().ok_or_else(|| {
            DocsweepError::Config("No documentation generator configured".to_string())
        })?;

        self.ensure_active()?;
        generator.prepare().await?;
        tokio::fs::create_dir_all(&state.out_dir).await?;

        let files = state.discovered_files.clone();
        let request = state.request.clone();
        let out_dir = state.out_dir.clone();

        let mut calls = futures::stream::iter(files.into_iter().map(|file| {
            let generator = Arc::clone(&generator);
            let request = request.as_str();
            let out_dir = out_dir.as_path();
            async move {
                let outcome = self
                    .generate_one(generator.as_ref(), request, &file, out_dir)
                    .await;
                (file, outcome)
            }
        }))
        .buffer_unordered(self.config.generation.max_concurrency);

        let mut outputs = Vec::new();
        let mut failures = Vec::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!("Generation cancelled with calls in flight");
                    return Err(DocsweepError::Cancelled);
                }
                next = calls.next() => next,
            };
            let Some((file, outcome)) = next else {
                break;
            };

            match outcome {
                Ok(doc) => outputs.push((file, doc)),
                Err(e) if e.is_structural() => return Err(e),
                Err(e) => {
                    warn!("Documentation failed for {}: {}", file, e);
                    failures.push((file, e.to_string()));
                }
            }
        }
        drop(calls);

        failures.sort();
        for (file, message) in failures {
            state.record_failure(Stage::GenerateDocs, &file, message);
        }
        state.generated_docs.extend(outputs);

        info!("Generated {} documents", state.generated_docs.len());
        Ok(state)
    }

    /// Finalize: write the summary and stamp the finish time
    #[instrument(skip_all)]
    pub fn finalize(&self, mut state: RunState) -> RunState {
        state.summary = Some(format_summary(&state));
        state.finished_at = Some(Utc::now());
        state
    }

    async fn generate_one(
        &self,
        generator: &dyn DocGenerator,
        request: &str,
        file: &str,
        out_dir: &Path,
    ) -> Result<DocOutput> {
        self.ensure_active()?;

        let source = self.read(file)?;
        if source.trim().is_empty() {
            return Err(DocsweepError::Generation(format!("Empty source for {file}")));
        }

        let (source, truncated) = truncate_source(&source, self.config.generation.max_source_chars);
        if truncated {
            debug!("Truncated {} before generation", file);
        }

        let context = PromptContext {
            request: request.trim().to_string(),
            relative_path: file.to_string(),
            source,
            truncated,
        };

        let generated = tokio::time::timeout(self.generation_timeout, generator.generate(context))
            .await
            .map_err(|_| {
                DocsweepError::Generation(format!(
                    "Timed out after {}s",
                    self.generation_timeout.as_secs_f64()
                ))
            })??;

        let document = finalize_markdown(&generated.text, file)?;
        let path = output_path(out_dir, file, &self.config.generation.doc_suffix);
        tokio::fs::write(&path, document.as_bytes()).await?;
        info!("Wrote {}", path.display());

        Ok(DocOutput {
            path,
            bytes_written: document.len(),
            model: generated.model,
        })
    }

    fn read(&self, file: &str) -> Result<String> {
        self.store.read_text(file, self.config.source.max_read_bytes)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(DocsweepError::Cancelled);
        }
        Ok(())
    }
}

/// Where the document for `file` is written
pub fn output_path(out_dir: &Path, file: &str, suffix: &str) -> PathBuf {
    out_dir.join(doc_file_name(file, suffix))
}

fn format_summary(state: &RunState) -> String {
    format!(
        "Processed {} files.\n\
         Header issues: {} files.\n\
         Secret findings: {} files ({} findings).\n\
         Docs generated: {} files.\n\
         Failures: {}.\n\
         Output dir: {}\n",
        state.discovered_files.len(),
        state.header_issues.len(),
        state.secret_findings.len(),
        state.total_findings(),
        state.generated_docs.len(),
        state.failures.len(),
        state.out_dir.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Echo;

    #[async_trait]
    impl DocGenerator for Echo {
        async fn generate(&self, context: PromptContext) -> crate::Result<GeneratedText> {
            Ok(GeneratedText::new(format!(
                "Docs for {} ({} chars)",
                context.relative_path,
                context.source.len()
            )))
        }
    }

    #[tokio::test]
    async fn test_run_requires_generator() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let out = TempDir::new()?;
        let pipeline = Pipeline::new(root.path(), PipelineConfig::default())?;
        let err = pipeline.run("docs", out.path()).await.unwrap_err();
        assert!(matches!(err, DocsweepError::Config(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_run_walks_every_stage() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let out = TempDir::new()?;
        std::fs::write(root.path().join("a.py"), "x = 1\n")?;

        let pipeline = Pipeline::new(root.path(), PipelineConfig::default())?
            .with_generator(Arc::new(Echo));
        let state = pipeline.run("docs", out.path().join("docs")).await?;

        assert_eq!(state.discovered_files, vec!["a.py"]);
        assert!(state.header_issues.contains_key("a.py"));
        assert!(state.secret_findings.is_empty());
        let doc = &state.generated_docs["a.py"];
        assert_eq!(doc.path, out.path().join("docs").join("a.py.md"));
        let written = std::fs::read_to_string(&doc.path)?;
        assert_eq!(written, "# a.py\n\nDocs for a.py (6 chars)\n");
        assert_eq!(doc.bytes_written, written.len());
        assert!(state.finished_at.is_some());
        Ok(())
    }

    #[test]
    fn test_check_needs_no_generator() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        std::fs::write(root.path().join("a.py"), "password = \"hunter2hunter2\"\n")?;

        let pipeline = Pipeline::new(root.path(), PipelineConfig::default())?;
        let state = pipeline.check(root.path())?;

        assert_eq!(state.secret_findings["a.py"].len(), 1);
        assert!(state.generated_docs.is_empty());
        assert!(state.summary.is_some());
        Ok(())
    }

    #[test]
    fn test_summary_format() {
        let state = RunState::new("r", PathBuf::from("/src"), PathBuf::from("/out"));
        assert_eq!(
            format_summary(&state),
            "Processed 0 files.\nHeader issues: 0 files.\nSecret findings: 0 files (0 findings).\nDocs generated: 0 files.\nFailures: 0.\nOutput dir: /out\n"
        );
    }

    #[test]
    fn test_cancelled_before_discover() -> anyhow::Result<()> {
        let root = TempDir::new()?;
        let pipeline = Pipeline::new(root.path(), PipelineConfig::default())?;
        pipeline.cancellation_token().cancel();
        let err = pipeline.check(root.path()).unwrap_err();
        assert!(matches!(err, DocsweepError::Cancelled));
        Ok(())
    }
}

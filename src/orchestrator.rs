// src/orchestrator.rs
//
// Discover -> read -> generate -> write, once per file.
//
// Each file's chain is owned by exactly one worker; workers share nothing but
// the job and result channels. Results are slotted back by discovery index so
// the run reports in discovery order whatever the completion order was.

use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::PipelineOptions;
use crate::discovery::{self, Classifier, PageMarker};
use crate::error::{InvocationError, PipelineError};
use crate::reader::ContentReader;
use crate::state::{
    FileOutcome, GenerationStatus, PipelineRun, ProjectFile, ReadStatus, TerminalStatus,
    WriteStatus,
};
use crate::testgen::generator::TestCodeGenerator;
use crate::testgen::writer::{MirrorLayout, TestCodeWriter};

/* ---------- cancellation ---------- */

/// Run-level stop signal. Stops new file pipelines from launching; in-flight
/// ones run to completion.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token sharing this one's flag that also trips after `timeout`.
    pub fn with_deadline(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            cancelled: self.cancelled.clone(),
            deadline: Some(self.deadline.map_or(deadline, |d| d.min(deadline))),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Trip this token on Ctrl-C instead of killing the process. Can be
    /// installed once per process.
    pub fn cancel_on_interrupt(&self) -> Result<(), ctrlc::Error> {
        let flag = self.cancelled.clone();
        ctrlc::set_handler(move || {
            if !flag.swap(true, Ordering::SeqCst) {
                warn!("interrupt received, finishing in-flight files");
            }
        })
    }
}

/* ---------- orchestrator ---------- */

pub struct PipelineOrchestrator {
    reader: Box<dyn ContentReader>,
    generator: Box<dyn TestCodeGenerator>,
    writer: Box<dyn TestCodeWriter>,
    classifier: Option<Box<dyn Classifier>>,
    cancel: CancelToken,
}

impl PipelineOrchestrator {
    pub fn new(
        reader: Box<dyn ContentReader>,
        generator: Box<dyn TestCodeGenerator>,
        writer: Box<dyn TestCodeWriter>,
    ) -> Self {
        Self {
            reader,
            generator,
            writer,
            classifier: None,
            cancel: CancelToken::new(),
        }
    }

    /// Overrides the page-marker classifier built from the options.
    pub fn with_classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Discovered files paired with the test path each would be written to.
    /// Nothing is read, generated or written.
    pub fn plan(
        &self,
        project_root: &Path,
        options: &PipelineOptions,
    ) -> Result<Vec<(ProjectFile, PathBuf)>, PipelineError> {
        check_options(options)?;
        let root = discovery::canonical_root(project_root)?;
        let files = self.discover(&root, options)?;

        Ok(files
            .into_iter()
            .map(|f| {
                let target = options.layout.target_for(&root, f.relative());
                (f, target)
            })
            .collect())
    }

    pub fn run(
        &self,
        project_root: &Path,
        options: &PipelineOptions,
    ) -> Result<PipelineRun, PipelineError> {
        check_options(options)?;
        let root = discovery::canonical_root(project_root)?;
        let mut run = PipelineRun::begin(root.clone());

        let cancel = match options.run_timeout {
            Some(t) => self.cancel.with_deadline(t),
            None => self.cancel.clone(),
        };

        let files = self.discover(&root, options)?;
        let mut slots: Vec<Option<FileOutcome>> = vec![None; files.len()];
        let mut jobs = Vec::new();

        for (idx, file) in files.iter().enumerate() {
            match &options.category_filter {
                Some(filter) if !filter.contains(file.category()) => {
                    let outcome = FileOutcome::skipped(
                        file.clone(),
                        format!("category `{}` not selected", file.category()),
                    );
                    log_outcome(&outcome);
                    slots[idx] = Some(outcome);
                }
                _ => jobs.push((idx, file.clone())),
            }
        }

        info!(
            run_id = %run.run_id(),
            files = files.len(),
            queued = jobs.len(),
            concurrency = options.concurrency,
            "pipeline started"
        );

        if options.concurrency <= 1 || jobs.len() <= 1 {
            for (idx, file) in jobs {
                slots[idx] = Some(self.launch(file, &root, &options.layout, &cancel));
            }
        } else {
            self.run_parallel(jobs, &mut slots, &root, options, &cancel);
        }

        for (slot, file) in slots.into_iter().zip(files) {
            let outcome = slot.unwrap_or_else(|| {
                FileOutcome::failed(file, TerminalStatus::Cancelled, "worker exited before completion")
            });
            run.record(outcome);
        }

        let run = run.finish();
        let counts = run.counts();
        info!(
            run_id = %run.run_id(),
            written = counts.written,
            failed = counts.failed,
            skipped = counts.skipped,
            cancelled = counts.cancelled,
            "pipeline finished"
        );

        Ok(run)
    }

    fn discover(
        &self,
        root: &Path,
        options: &PipelineOptions,
    ) -> Result<Vec<ProjectFile>, PipelineError> {
        let fallback;
        let classifier: &dyn Classifier = match &self.classifier {
            Some(c) => c.as_ref(),
            None => {
                fallback = PageMarker::new(options.page_marker.clone());
                &fallback
            }
        };

        Ok(discovery::discover(
            root,
            &options.extension_filter,
            classifier,
            &options.excluded_dirs,
        )?)
    }

    fn run_parallel(
        &self,
        jobs: Vec<(usize, ProjectFile)>,
        slots: &mut [Option<FileOutcome>],
        root: &Path,
        options: &PipelineOptions,
        cancel: &CancelToken,
    ) {
        let workers = options.concurrency.min(jobs.len());
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<(usize, ProjectFile)>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<(usize, FileOutcome)>();

        for job in jobs {
            // receiver is alive until the scope below ends
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let layout = &options.layout;

        thread::scope(|s| {
            for worker in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();

                s.spawn(move || {
                    for (idx, file) in job_rx.iter() {
                        debug!(worker, file = %file.relative().display(), "picked up");
                        let outcome = self.launch(file, root, layout, cancel);
                        if done_tx.send((idx, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(done_tx);

            for (idx, outcome) in done_rx.iter() {
                slots[idx] = Some(outcome);
            }
        });
    }

    fn launch(
        &self,
        file: ProjectFile,
        root: &Path,
        layout: &MirrorLayout,
        cancel: &CancelToken,
    ) -> FileOutcome {
        let outcome = if cancel.is_cancelled() {
            FileOutcome::cancelled(file)
        } else {
            self.process(file, root, layout)
        };
        log_outcome(&outcome);
        outcome
    }

    /// One file through all four stages. Any non-success stage ends the chain.
    fn process(&self, file: ProjectFile, root: &Path, layout: &MirrorLayout) -> FileOutcome {
        debug!(file = %file.relative().display(), stage = "read");
        let content = self.reader.read(&file);
        if content.status != ReadStatus::Ok {
            let message = match content.status {
                ReadStatus::NotFound => "source file not found".to_string(),
                ReadStatus::Empty => "source file is empty".to_string(),
                _ => content.text,
            };
            return FileOutcome::failed(file, TerminalStatus::ReadFailed(content.status), message);
        }

        debug!(file = %file.relative().display(), stage = "generate");
        let generated = self.generator.generate(&content);
        drop(content);
        match generated.status {
            GenerationStatus::Ok => {}
            GenerationStatus::Empty => {
                return FileOutcome::failed(
                    file,
                    TerminalStatus::GenerationFailed(GenerationStatus::Empty),
                    "generator returned no test code",
                )
            }
            GenerationStatus::Failed => {
                return FileOutcome::failed(
                    file,
                    TerminalStatus::GenerationFailed(GenerationStatus::Failed),
                    generated.text,
                )
            }
        }

        debug!(file = %file.relative().display(), stage = "write");
        let written = self.writer.write(&file, &generated, root, layout);
        match written.status {
            WriteStatus::Written => FileOutcome::written(file, written.target),
            status => FileOutcome::failed(
                file,
                TerminalStatus::WriteFailed(status),
                written
                    .message
                    .unwrap_or_else(|| "writer skipped the test".to_string()),
            ),
        }
    }
}

fn check_options(options: &PipelineOptions) -> Result<(), InvocationError> {
    if options.concurrency == 0 {
        return Err(InvocationError::InvalidConcurrency);
    }
    if options.extension_filter.trim().is_empty() {
        return Err(InvocationError::EmptyExtension);
    }
    Ok(())
}

fn log_outcome(outcome: &FileOutcome) {
    let file = outcome.file.relative().display();
    match (&outcome.status, &outcome.target) {
        (TerminalStatus::Written, Some(target)) => {
            info!(%file, target = %target.display(), "test written")
        }
        (status, _) => warn!(
            %file,
            status = status.label(),
            message = outcome.message.as_deref().unwrap_or(""),
            "file not written"
        ),
    }
}

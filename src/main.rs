use std::error::Error;
use std::path::PathBuf;

use clap::Parser;

use testmirror::config::{self, PipelineOptions, RawConfig};
use testmirror::discovery;
use testmirror::logger;
use testmirror::orchestrator::{CancelToken, PipelineOrchestrator};
use testmirror::reader::FsReader;
use testmirror::report;
use testmirror::testgen::generator::SkeletonGenerator;
use testmirror::testgen::registry::GeneratorRegistry;
use testmirror::testgen::writer::FsTestWriter;

#[derive(Parser, Debug)]
#[command(
    name = "testmirror",
    version,
    about = "Generate tests for every matching source file and write them into a mirrored test tree."
)]
struct Cli {
    /// Project root to scan
    project_root: PathBuf,

    #[arg(long, help = "Config file (default: <config dir>/testmirror/config.toml)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Only include files whose name ends with this, e.g. .tsx")]
    extension: Option<String>,

    #[arg(long, help = "Directory under the project root that receives tests")]
    mirror_dir: Option<String>,

    #[arg(long, help = "Test file suffix, e.g. .test.js")]
    suffix: Option<String>,

    #[arg(long, help = "append | replace")]
    suffix_mode: Option<String>,

    #[arg(long = "exclude", help = "Directory name to skip (repeatable)")]
    exclude: Vec<String>,

    #[arg(short = 'j', long, help = "Files processed in parallel")]
    concurrency: Option<usize>,

    #[arg(long = "category", help = "Only process this category (repeatable)")]
    categories: Vec<String>,

    #[arg(long, help = "File name classified as a page")]
    page_marker: Option<String>,

    #[arg(long, help = "Stop launching new files after this many seconds")]
    timeout_secs: Option<u64>,

    #[arg(long, help = "Generator name: llm | skeleton")]
    generator: Option<String>,

    #[arg(long, help = "LLM provider: openai | anthropic | ollama")]
    provider: Option<String>,

    #[arg(long, help = "LLM model name")]
    model: Option<String>,

    #[arg(long, help = "Retries per file on generation errors")]
    retries: Option<u32>,

    #[arg(long, help = "Write the full run as JSON to this file")]
    summary_out: Option<PathBuf>,

    #[arg(long, default_value_t = false, help = "List files and targets without generating")]
    dry_run: bool,

    #[arg(short, long, action = clap::ArgAction::Count, help = "More logging (-v, -vv)")]
    verbose: u8,
}

impl Cli {
    /// CLI flags override whatever the config file set.
    fn apply(&self, raw: &mut RawConfig) {
        let p = &mut raw.pipeline;
        if let Some(v) = &self.extension {
            p.extension = v.clone();
        }
        if let Some(v) = &self.mirror_dir {
            p.mirror_dir = v.clone();
        }
        if let Some(v) = &self.suffix {
            p.suffix = v.clone();
        }
        if let Some(v) = &self.suffix_mode {
            p.suffix_mode = v.clone();
        }
        if !self.exclude.is_empty() {
            p.exclude.extend(self.exclude.iter().cloned());
        }
        if let Some(v) = self.concurrency {
            p.concurrency = v;
        }
        if !self.categories.is_empty() {
            p.categories = Some(self.categories.clone());
        }
        if let Some(v) = &self.page_marker {
            p.page_marker = v.clone();
        }
        if self.timeout_secs.is_some() {
            p.timeout_secs = self.timeout_secs;
        }

        if let Some(v) = &self.generator {
            raw.generator.kind = v.clone();
        }
        if let Some(v) = self.retries {
            raw.generator.retries = v;
        }
        if let Some(v) = &self.provider {
            raw.llm.provider = v.clone();
        }
        if let Some(v) = &self.model {
            raw.llm.model = v.clone();
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    run(cli)
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut raw = RawConfig::load(cli.config.as_deref())?;
    cli.apply(&mut raw);

    let options = PipelineOptions::from_raw(&raw.pipeline)?;

    if cli.dry_run {
        let orchestrator = PipelineOrchestrator::new(
            Box::new(FsReader),
            Box::new(SkeletonGenerator),
            Box::new(FsTestWriter),
        );
        let root = discovery::canonical_root(&cli.project_root)?;
        let plan = orchestrator.plan(&root, &options)?;
        print!("{}", report::render_plan(&root, &plan));
        return Ok(());
    }

    let (kind, settings) = config::generator_settings(&raw.generator, &raw.llm)?;
    let generator = GeneratorRegistry::with_builtins().build(&kind, &settings)?;

    let cancel = CancelToken::new();
    cancel.cancel_on_interrupt()?;

    let orchestrator =
        PipelineOrchestrator::new(Box::new(FsReader), generator, Box::new(FsTestWriter))
            .with_cancel(cancel);
    let run = orchestrator.run(&cli.project_root, &options)?;

    print!("{}", report::render_summary(&run));

    if let Some(path) = &cli.summary_out {
        report::write_json(&run, path)?;
    }

    Ok(())
}

//! CLI for synthesizing verified puzzle solutions.
//!
//! # Usage
//!
//! ```bash
//! # One puzzle part, committed to the repository in the current directory
//! cargo run -p aoc-generator --bin aoc-generate -- 2024 6 --part 1
//!
//! # Quick mode, nothing committed
//! cargo run -p aoc-generator --bin aoc-generate -- 2024 6 --quick --dry-run
//!
//! # A range of days, concurrently, with a JSON report
//! cargo run -p aoc-generator --bin aoc-generate -- 2024 --days 1..=5 --report-json report.json
//! ```

use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::Level;

use aoc_core::{
    FetcherConfig, GenerativeCapability, HttpStatementFetcher, Persistence, ProblemCatalog,
    ProblemIdentity, ProblemPart,
};
use aoc_evaluators::{PythonSandbox, DEFAULT_INTERPRETER};
use aoc_generator::{
    obs, CancellationFlag, ClaudeClient, DryRunPersistence, ExampleTestSynthesizer,
    GitPersistence, LlmImplementationSynthesizer, LlmTestSynthesizer, Pipeline, PipelineConfig,
    RunOutcome, TestSynthesizer,
};

#[derive(Parser, Debug)]
#[command(name = "aoc-generate", version, about = "Synthesize and commit verified puzzle solutions")]
struct Args {
    /// Puzzle year
    year: u16,

    /// Puzzle day (omit when using --days)
    #[arg(required_unless_present = "days")]
    day: Option<u8>,

    /// Puzzle part (1 or 2)
    #[arg(long, default_value_t = 1)]
    part: u8,

    /// Inclusive day range, e.g. `1..=5` or `1-5`
    #[arg(long, value_parser = parse_days, conflicts_with = "day")]
    days: Option<RangeInclusive<u8>>,

    /// Override the attempt budget
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Shorter timeouts and fewer attempts
    #[arg(long, conflicts_with = "thorough")]
    quick: bool,

    /// Longer timeouts and more attempts
    #[arg(long)]
    thorough: bool,

    /// Repository that receives the commits
    #[arg(long, env = "AOC_REPO", default_value = ".")]
    repo: PathBuf,

    /// Keep batches in memory and print them instead of committing
    #[arg(long)]
    dry_run: bool,

    /// Replace artifacts already present in the repository
    #[arg(long)]
    overwrite: bool,

    /// Ask the generator for the test suite instead of rendering it from examples
    #[arg(long)]
    llm_tests: bool,

    /// Write a JSON run report to this file
    #[arg(long)]
    report_json: Option<PathBuf>,

    /// Python interpreter used for validation
    #[arg(long, env = "AOC_PYTHON", default_value = DEFAULT_INTERPRETER)]
    python: PathBuf,

    /// Puzzle site base URL
    #[arg(long, env = "AOC_BASE_URL")]
    base_url: Option<String>,

    /// Identities run at once (defaults to the number of CPUs)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> PipelineConfig {
        let mut config = if self.quick {
            PipelineConfig::quick()
        } else if self.thorough {
            PipelineConfig::thorough()
        } else {
            PipelineConfig::default()
        };

        if let Some(max) = self.max_attempts {
            config.controller.max_attempts = max.max(1);
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency.max(1);
        }
        config.overwrite = self.overwrite;
        config
    }

    fn identities(&self) -> Result<Vec<ProblemIdentity>, String> {
        let part = ProblemPart::from_number(self.part).map_err(|e| e.to_string())?;
        let days: Vec<u8> = match (&self.days, self.day) {
            (Some(range), _) => range.clone().collect(),
            (None, Some(day)) => vec![day],
            (None, None) => return Err("a day or --days is required".into()),
        };
        days.into_iter()
            .map(|day| ProblemIdentity::new(self.year, day, part).map_err(|e| e.to_string()))
            .collect()
    }
}

fn parse_days(s: &str) -> Result<RangeInclusive<u8>, String> {
    let (start, end) = s
        .split_once("..=")
        .or_else(|| s.split_once('-'))
        .ok_or_else(|| format!("expected a range like 1..=5, got `{s}`"))?;
    let start: u8 = start.trim().parse().map_err(|e| format!("bad start day: {e}"))?;
    let end: u8 = end.trim().parse().map_err(|e| format!("bad end day: {e}"))?;
    if start > end {
        return Err(format!("empty range {start}..={end}"));
    }
    Ok(start..=end)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    obs::init_tracing(
        obs::json_requested(),
        if args.verbose { Level::DEBUG } else { Level::INFO },
    );

    let identities = match args.identities() {
        Ok(ids) => ids,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let config = args.config();

    let client: Arc<dyn GenerativeCapability> = match ClaudeClient::from_env() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("Error creating generator: {}", e);
            eprintln!();
            eprintln!("Make sure ANTHROPIC_API_KEY is set:");
            eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
            return ExitCode::FAILURE;
        }
    };

    let fetcher = match HttpStatementFetcher::new(FetcherConfig::from_env()) {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            eprintln!("Error creating fetcher: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let catalog = match &args.base_url {
        Some(url) => ProblemCatalog::with_base_url(fetcher, url.clone()),
        None => ProblemCatalog::new(fetcher),
    };

    let tests: Arc<dyn TestSynthesizer> = if args.llm_tests {
        Arc::new(LlmTestSynthesizer::new(client.clone()))
    } else {
        Arc::new(ExampleTestSynthesizer)
    };

    let dry_run = Arc::new(DryRunPersistence::new());
    let persistence: Arc<dyn Persistence> = if args.dry_run {
        dry_run.clone()
    } else {
        Arc::new(GitPersistence::new(&args.repo))
    };

    println!("Puzzle Solution Synthesizer");
    println!("===========================");
    println!();
    for identity in &identities {
        println!("Problem: {}", identity);
    }
    println!("Max attempts: {}", config.controller.max_attempts);
    println!("Tests: {}", if args.llm_tests { "generated" } else { "from examples" });
    println!(
        "Target: {}",
        if args.dry_run { "dry run".to_string() } else { args.repo.display().to_string() }
    );
    println!();

    let pipeline = Pipeline::new(
        catalog,
        Arc::new(LlmImplementationSynthesizer::new(client)),
        tests,
        Arc::new(PythonSandbox::new(&args.python)),
        persistence,
        config,
    );

    let cancel = CancellationFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Cancelling after the current stage...");
                cancel.cancel();
            }
        });
    }

    let reports = pipeline.run_many(identities, &cancel).await;

    for report in &reports {
        println!("{}", report.format_summary());
    }

    if args.dry_run {
        for batch in dry_run.batches() {
            println!("Staged batch: {}", batch.message);
            println!("=============");
            for file in &batch.files {
                println!();
                println!("--- {} ({:?})", file.path, file.mode);
                println!("{}", file.content);
            }
        }
    }

    if let Some(path) = &args.report_json {
        let summaries: Vec<_> = reports.iter().map(|r| r.summary()).collect();
        let written = serde_json::to_string_pretty(&summaries)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => println!("Report written to: {}", path.display()),
            Err(e) => {
                eprintln!("Failed to write report: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let failed = reports
        .iter()
        .filter(|r| matches!(r.outcome, RunOutcome::Aborted { .. }))
        .count();
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        eprintln!("{} of {} run(s) aborted", failed, reports.len());
        ExitCode::FAILURE
    }
}

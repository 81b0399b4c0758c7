use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use sagevault_core::chunker::ChunkingConfig;
use sagevault_core::config::{expand_path, Config, Settings};
use sagevault_core::data_processor::DataProcessor;
use sagevault_core::types::{Document, UPLOADED_PREFIX};
use sagevault_embed::default_embedder;
use sagevault_guard::{GuardConfig, SecurityGate};
use sagevault_index::EmbeddingIndex;
use sagevault_retrieval::{attribution_headers, IndexHandle, PipelineContext, RetrievalResult};

const USAGE: &str = "Usage: sagevault <index|query|ask> [args...]
  index <dir> [--uploads <dir>] [--out <file>]
  query <snapshot> \"<question>\" [--limit N] [--json]
  ask <dir> \"<question>\" [--uploads <dir>] [--limit N] [--json]";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().collect();
    args.remove(0);
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

/// Positional arguments plus the few flags the commands share.
#[derive(Default)]
struct Opts {
    positional: Vec<String>,
    uploads: Option<PathBuf>,
    out: Option<PathBuf>,
    limit: Option<usize>,
    json: bool,
}

fn parse_opts(args: &[String]) -> Opts {
    let mut opts = Opts::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--uploads" => opts.uploads = Some(expand_path(flag_value(args, i, "--uploads"))),
            "--out" | "-o" => opts.out = Some(expand_path(flag_value(args, i, "--out"))),
            "--limit" | "-k" => {
                let Ok(limit) = flag_value(args, i, "--limit").parse::<usize>() else {
                    eprintln!("Error: --limit requires a number"); std::process::exit(1);
                };
                opts.limit = Some(limit);
            }
            "--json" => { opts.json = true; i += 1; continue; }
            other => { opts.positional.push(other.to_string()); i += 1; continue; }
        }
        i += 2;
    }
    opts
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(v) => v,
        None => { eprintln!("Error: {flag} requires a value"); std::process::exit(1) }
    }
}

fn positional(opts: &Opts, i: usize, what: &str) -> String {
    opts.positional.get(i).cloned().unwrap_or_else(|| {
        eprintln!("Error: missing {what}\n{USAGE}"); std::process::exit(1)
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn spinner(msg: &'static str) -> anyhow::Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(msg);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn load_corpus(dir: &Path, uploads: Option<&Path>, chunking: &ChunkingConfig) -> anyhow::Result<Vec<Document>> {
    let processor = DataProcessor::new(chunking.clone());
    let mut corpus = processor.load_directory(dir, None)?;
    if let Some(uploads) = uploads {
        corpus.extend(processor.load_directory(uploads, Some(UPLOADED_PREFIX))?);
    }
    Ok(corpus)
}

fn build(ctx: &PipelineContext, corpus: &[Document], settings: &Settings) -> anyhow::Result<IndexHandle> {
    let pb = spinner("embedding passages")?;
    let handle = ctx.build_index(corpus, settings.chunking.max_chars, settings.chunking.overlap_percent);
    pb.finish_and_clear();
    Ok(handle?)
}

/// `--limit` overrides the configured `max_results`.
fn run_query(ctx: &PipelineContext, handle: &IndexHandle, question: &str, opts: &Opts, settings: &Settings) -> anyhow::Result<RetrievalResult> {
    let mut options = settings.retrieval.clone();
    if let Some(limit) = opts.limit { options.max_results = limit; }
    let k = options.max_results;
    Ok(ctx.query(handle, question, k, &options)?)
}

fn repo_name(dir: &Path) -> String {
    dir.file_name().map_or_else(|| dir.display().to_string(), |n| n.to_string_lossy().to_string())
}

fn print_result(result: &RetrievalResult, settings: &Settings, repo: &str, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    if result.blocked {
        println!("🚫 {}", result.block_reason.as_deref().unwrap_or("Query blocked"));
        return Ok(());
    }
    for header in attribution_headers(&result.passages, repo) {
        println!("{header}");
    }
    let gate = SecurityGate::new(GuardConfig::from(&settings.retrieval));
    println!("\n🔍 {} passage(s)", result.passages.len());
    for (i, p) in result.passages.iter().enumerate() {
        println!("\n  {}. score={:.4}  source={}", i + 1, p.similarity, p.source_key);
        for line in gate.prepare_display(&p.text).lines() {
            println!("     {line}");
        }
    }
    for w in &result.warnings {
        println!("⚠️  {w}");
    }
    if result.redactions > 0 {
        println!("🔒 {} credential(s) redacted", result.redactions);
    }
    let d = &result.diagnostics;
    println!("\n📊 pool={} after_gate={} dropped_by_budget={} context_chars={} context_tokens≈{}",
        d.pool_size, d.after_gate, d.dropped_by_budget, d.context_chars, d.context_tokens);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let ctx = PipelineContext::new(default_embedder(&settings.embedding));
    let (cmd, args) = parse_args();
    let opts = parse_opts(&args);
    tracing::debug!(command = %cmd, args = opts.positional.len(), "dispatching");
    let default_snapshot = || {
        let p: String = config.get("data.snapshot_path").unwrap_or_else(|_| "sagevault-index.json".to_string());
        expand_path(p)
    };

    match cmd.as_str() {
        "index" => {
            let dir = expand_path(positional(&opts, 0, "<dir>"));
            let out = opts.out.clone().unwrap_or_else(default_snapshot);
            println!("Indexing {}", dir.display());
            let corpus = load_corpus(&dir, opts.uploads.as_deref(), &settings.chunking)?;
            let handle = build(&ctx, &corpus, &settings)?;
            handle.index().save(&out)?;
            println!("✅ Indexed {} documents into {} passages", corpus.len(), handle.index().len());
            if let Some(pinned) = handle.pinned() { println!("📌 Pinned overview: {}", pinned.key); }
            println!("💾 Snapshot written to {}", out.display());
        }
        "query" => {
            let snapshot = expand_path(positional(&opts, 0, "<snapshot>"));
            let question = positional(&opts, 1, "\"<question>\"");
            let index = EmbeddingIndex::load(&snapshot, Arc::clone(ctx.embedder()))?;
            let handle = ctx.attach(index);
            let result = run_query(&ctx, &handle, &question, &opts, &settings)?;
            print_result(&result, &settings, &repo_name(&snapshot.with_extension("")), opts.json)?;
        }
        "ask" => {
            let dir = expand_path(positional(&opts, 0, "<dir>"));
            let question = positional(&opts, 1, "\"<question>\"");
            let corpus = load_corpus(&dir, opts.uploads.as_deref(), &settings.chunking)?;
            let handle = build(&ctx, &corpus, &settings)?;
            let result = run_query(&ctx, &handle, &question, &opts, &settings)?;
            print_result(&result, &settings, &repo_name(&dir), opts.json)?;
        }
        _ => { eprintln!("Unknown command: {}\n{USAGE}", cmd); std::process::exit(1); }
    }
    Ok(())
}

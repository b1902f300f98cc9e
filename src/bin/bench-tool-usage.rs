use std::{
    collections::BTreeMap,
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;
use serde::Serialize;
use spurwerk::{
    dataset::{load_pairs, BenchPair},
    providers::openai::OpenAI,
    EvaluationResult, JudgeConfig, OutputEvaluation, TrajectoryEvaluator,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bench-tool-usage")]
#[command(about = "Score recorded agent runs against expected tool trajectories")]
struct Args {
    /// Path to a pairs file or directory (YAML/JSON)
    #[arg(long, default_value = "bench/pairs")]
    pairs: PathBuf,

    /// Output grading mode (qa, qa_math, qa_math_without_question, none)
    #[arg(long, default_value = "none", value_parser = parse_judge_mode)]
    judge: OutputEvaluation,

    /// Judge model identifier
    #[arg(long, default_value = spurwerk::DEFAULT_JUDGE_MODEL)]
    model: String,

    /// Output path for JSONL results
    #[arg(long)]
    out: Option<PathBuf>,

    /// Evaluate only pairs whose id contains this substring (repeatable)
    #[arg(long)]
    filter: Vec<String>,

    /// Stop at first evaluation error
    #[arg(long)]
    fail_fast: bool,
}

fn parse_judge_mode(s: &str) -> Result<OutputEvaluation, String> {
    s.parse().map_err(|err: spurwerk::EvalError| err.to_string())
}

fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn default_out_path() -> PathBuf {
    let ts = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    PathBuf::from(format!("bench/runs/{ts}.jsonl"))
}

#[derive(Serialize)]
struct PairResult<'a> {
    id: &'a str,
    results: &'a [EvaluationResult],
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let pairs = load_pairs(&args.pairs)?;
    let pairs = filter_pairs(pairs, &args.filter);
    if pairs.is_empty() {
        eprintln!("No pairs matched.");
        std::process::exit(2);
    }

    let mut judge_config = JudgeConfig::new(args.judge).with_model(args.model);
    if args.judge != OutputEvaluation::None {
        judge_config = judge_config.with_provider(Arc::new(OpenAI::from_env()?));
    }
    let evaluator = TrajectoryEvaluator::from_judge_config(judge_config)?;

    let out_path = args.out.unwrap_or_else(default_out_path);
    ensure_parent_dir(&out_path)?;
    let file = fs::File::create(&out_path)?;
    let mut writer = BufWriter::new(file);

    let mut evaluated = 0usize;
    let mut errors = 0usize;
    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for pair in &pairs {
        match evaluator.evaluate_run(&pair.run, &pair.example).await {
            Ok(results) => {
                evaluated += 1;
                for result in &results {
                    let entry = totals.entry(result.key.clone()).or_insert((0.0, 0));
                    entry.0 += result.score;
                    entry.1 += 1;
                }

                serde_json::to_writer(&mut writer, &PairResult { id: &pair.id, results: &results })?;
                writer.write_all(b"\n")?;
            }
            Err(err) => {
                errors += 1;
                eprintln!("ERROR {}: {err}", pair.id);
                if args.fail_fast {
                    break;
                }
            }
        }
    }

    writer.flush()?;

    println!(
        "Evaluated {evaluated}/{} pair(s), output: {}",
        pairs.len(),
        out_path.display()
    );
    for (key, (sum, count)) in &totals {
        println!("Avg {key}: {:.3}", sum / *count as f64);
    }

    if errors == 0 {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn filter_pairs(mut pairs: Vec<BenchPair>, filters: &[String]) -> Vec<BenchPair> {
    if filters.is_empty() {
        return pairs;
    }
    pairs.retain(|p| filters.iter().any(|f| p.id.contains(f)));
    pairs
}

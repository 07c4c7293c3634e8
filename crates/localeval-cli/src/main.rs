use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use localeval_core::config::DataConfig;
use localeval_core::suite::build_eval;
use localeval_core::testing::assert_eval_pass_rate;
use localeval_core::{EvalConfig, SpamClassifier};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "localeval", about = "Evaluate a local OpenAI-compatible model")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	/// Run the evaluation suite
	Run(RunArgs),
	/// Classify one text as SPAM or NOT_SPAM
	Classify(ClassifyArgs),
}

#[derive(Debug, Clone, Args)]
struct EndpointArgs {
	/// YAML config file; flags below override it
	#[arg(long)]
	config: Option<PathBuf>,

	/// Base URL of the OpenAI-compatible endpoint
	#[arg(long)]
	base_url: Option<String>,

	/// Model name
	#[arg(long)]
	model: Option<String>,

	/// API key sent as bearer token
	#[arg(long)]
	api_key: Option<String>,
}

#[derive(Debug, Clone, Parser)]
struct RunArgs {
	#[command(flatten)]
	endpoint: EndpointArgs,

	/// JSONL file with lines { "id"?: any, "input": any, "expected"?: any }; defaults to the built-in cases
	#[arg(long)]
	data: Option<PathBuf>,

	/// Cases in flight
	#[arg(long)]
	concurrency: Option<usize>,

	/// Write the full JSON result to a file
	#[arg(long)]
	json_out: Option<PathBuf>,

	/// Exit non-zero when the pass rate is below this (0.0..=1.0)
	#[arg(long)]
	min_pass_rate: Option<f64>,
}

#[derive(Debug, Clone, Parser)]
struct ClassifyArgs {
	#[command(flatten)]
	endpoint: EndpointArgs,

	text: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	init_tracing();
	let cli = Cli::parse();
	match cli.command {
		Commands::Run(args) => run(args).await?,
		Commands::Classify(args) => classify(args).await?,
	}
	Ok(())
}

fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(true)
		.with_writer(std::io::stderr)
		.init();
}

async fn load_config(args: &EndpointArgs) -> Result<EvalConfig> {
	let mut config = match &args.config {
		Some(path) => EvalConfig::from_path(path).await?,
		None => EvalConfig::default(),
	};
	if let Some(url) = &args.base_url {
		config.endpoint.base_url = url.clone();
	}
	if let Some(model) = &args.model {
		config.endpoint.model = model.clone();
	}
	if let Some(key) = &args.api_key {
		config.endpoint.api_key = key.clone();
	}
	Ok(config)
}

async fn run(args: RunArgs) -> Result<()> {
	let mut config = load_config(&args.endpoint).await?;
	if let Some(path) = args.data {
		config.data = Some(DataConfig { path });
	}
	if let Some(n) = args.concurrency {
		config.concurrency = n;
	}
	info!(base_url = %config.endpoint.base_url, model = %config.endpoint.model, "using endpoint");

	let eval = build_eval(&config)?;
	let result = eval.run().await?;
	println!("{}", result.summary_table());

	println!("Scores per case:");
	for cr in &result.cases {
		println!("  {}", cr.case.id.as_deref().unwrap_or("-"));
		for s in &cr.scores {
			match &s.reason {
				Some(reason) => println!("    {}: {:.3} ({})", s.name, s.value, reason),
				None => println!("    {}: {:.3}", s.name, s.value),
			}
		}
		if let Some(err) = &cr.error {
			println!("    error: {}", err);
		}
	}

	if let Some(path) = args.json_out {
		let json = serde_json::to_string_pretty(&result)?;
		tokio::fs::write(&path, json).await?;
		info!(path = %path.display(), "wrote results");
	}

	if let Some(min) = args.min_pass_rate {
		assert_eval_pass_rate(&result, min)?;
	}

	Ok(())
}

async fn classify(args: ClassifyArgs) -> Result<()> {
	let config = load_config(&args.endpoint).await?;
	let classifier = SpamClassifier::from_endpoint(&config.endpoint);
	let classification = classifier.classify(&args.text).await?;
	println!("{}", serde_json::to_string_pretty(&classification)?);
	Ok(())
}

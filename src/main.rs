mod answer;
mod call;
mod config;
mod error;
mod extract;
mod gemini;
mod llm;
mod manager;
mod ollama;
mod planner;
mod research;
mod search;
mod sources;
mod synthesizer;
#[cfg(test)]
mod testing;
mod types;
mod workflow;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, Provider};
use manager::ResearchManager;
use research::ResearchProgress;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use types::{ResearchReport, Style};

#[derive(Debug, Parser)]
#[command(name = "deep-research", version, about = "Multi-agent web research with cited answers")]
struct Cli {
    /// Research query; prompted for on stdin when omitted
    #[arg(short, long)]
    query: Option<String>,

    /// Answer style: academic, business, educational, journalistic, or any free text
    #[arg(short, long, default_value = "academic")]
    style: Style,

    /// Write the full report as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of research agents (clamped to the configured maximum)
    #[arg(short, long)]
    agents: Option<usize>,

    /// Run the plan → research → draft → refine workflow graph
    #[arg(short, long)]
    workflow: bool,

    /// Only run the searches and print the folded search answer
    #[arg(long, conflicts_with = "workflow")]
    search_only: bool,

    /// Config file (default: ~/.config/deep-research/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Errors only
    #[arg(long, conflicts_with = "verbose")]
    quiet: bool,
}

fn init_tracing(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("deep_research={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_query() -> Result<String> {
    print!("Enter your research query: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Progress lines go to stderr so stdout carries only the answer.
fn spawn_progress_printer(mut rx: mpsc::UnboundedReceiver<ResearchProgress>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            let line = match progress {
                ResearchProgress::Planning(query) => format!("Planning research for: {query}"),
                ResearchProgress::Searching(query) => format!("Searching: {query}"),
                ResearchProgress::Synthesizing(query) => format!("Synthesizing findings for: {query}"),
                ResearchProgress::AgentsStarted(n) => format!("Started {n} research agents"),
                ResearchProgress::TaskCompleted(query) => format!("Finished research task: {query}"),
                ResearchProgress::Merging => "Merging agent findings".to_string(),
                ResearchProgress::Drafting => "Drafting answer".to_string(),
                ResearchProgress::Refining(style) => format!("Refining answer ({style} style)"),
                ResearchProgress::Completed => "Research complete".to_string(),
            };
            eprintln!("[*] {line}");
        }
    })
}

fn print_report(report: &ResearchReport) {
    println!("\n{}\n", "=".repeat(80));
    println!("{}", report.answer);
    println!("\n{}\n", "=".repeat(80));

    if !report.sources.is_empty() {
        println!("Sources:");
        for (i, source) in report.sources.iter().enumerate() {
            println!("{}. {}", i + 1, source.title);
            println!("   URL: {}", source.url);
            if let Some(date) = &source.published_date {
                println!("   Published: {date}");
            }
        }
    }
}

fn write_report(path: &Path, report: &ResearchReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    println!("\nFull report saved to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(&cli);

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    if config.search.api_key.is_none() {
        eprintln!("Error: TAVILY_API_KEY is not set. Add it to your environment or a .env file.");
        return Ok(());
    }
    if config.llm.provider == Provider::Gemini && config.llm.api_key.is_none() {
        eprintln!("Error: GEMINI_API_KEY is not set. Add it to your environment or a .env file.");
        return Ok(());
    }

    let query = match cli.query.clone() {
        Some(query) => query,
        None => read_query()?,
    };
    if query.trim().is_empty() {
        eprintln!("Error: no research query given.");
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cancelling outstanding calls...");
            ctrl_c.cancel();
        }
    });

    let mut manager = ResearchManager::from_config(&config, cancel)?;
    let (tx, rx) = mpsc::unbounded_channel();
    manager.set_progress_channel(tx);
    let printer = spawn_progress_printer(rx);

    if let Style::Custom(raw) = &cli.style {
        tracing::info!("style '{raw}' is not one of {:?}; using it as free text", Style::NAMES);
    }

    let agents = cli.agents.unwrap_or(config.research.default_agents);
    tracing::info!(query = %query, style = %cli.style, agents, workflow = cli.workflow, "starting research");

    if cli.search_only {
        let result = manager.quick_search(&query).await?;
        drop(manager);
        let _ = printer.await;
        println!("\n{}\n", result.answer);
        println!("{}", sources::format_sources(&result.sources));
        return Ok(());
    }

    let report = if cli.workflow {
        manager.run_workflow(&query, cli.style.clone()).await
    } else if agents > 1 {
        manager.run_multi_agent(&query, agents, &cli.style).await?
    } else {
        manager.process_query(&query, &cli.style).await?
    };

    drop(manager);
    let _ = printer.await;

    print_report(&report);
    if let Some(path) = &cli.output {
        write_report(path, &report)?;
    }

    Ok(())
}

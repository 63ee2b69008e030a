use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colloquy_core::chat::{AgentLoop, AgentRun, ConversationMemory, TurnOutcome};
use colloquy_core::config::Config;
use colloquy_core::provider::{OpenAiProvider, Provider};
use colloquy_core::rag::{RagEngine, RagTool};
use colloquy_core::summarize::Summarizer;
use colloquy_plugin::ToolRegistry;
use colloquy_std::{CalculatorTool, SuggestActivityTool, WeatherTool};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "colloquy")]
#[command(about = "Chat with an LLM that can call tools and answer from your documents", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Interactive chat with memory, a calculator and a weather tool")]
    Chat {
        #[arg(short, long, help = "Document the assistant may consult through a retrieval tool")]
        document: Option<PathBuf>,
    },

    #[command(about = "Answer questions from a document")]
    Ask {
        #[arg(help = "Text file to index")]
        document: PathBuf,

        #[arg(help = "Question to answer; starts an interactive session when omitted")]
        question: Option<String>,
    },

    #[command(about = "Summarize a text file")]
    Summarize {
        #[arg(help = "Text file to summarize")]
        file: PathBuf,

        #[arg(short, long, help = "Also write the summary to this file")]
        output: Option<PathBuf>,
    },

    #[command(about = "Look up the weather for a city and suggest an activity")]
    Activity {
        #[arg(help = "City name, e.g. 'Paris'")]
        city: String,
    },

    #[command(about = "Configuration commands")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    #[command(about = "Show current configuration")]
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("colloquy_core=info,colloquy_std=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Chat { document } => chat(&config, document.as_deref()).await,
        Commands::Ask { document, question } => ask(&config, &document, question.as_deref()).await,
        Commands::Summarize { file, output } => summarize(&config, &file, output.as_deref()).await,
        Commands::Activity { city } => activity(&config, &city).await,
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                show_config(&config);
                Ok(())
            }
        },
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
    } else {
        info!(path = %path.display(), "Config file not found, using defaults");
        Ok(Config::default())
    }
}

fn provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let api_key = config.api_key().context("Missing API key")?;
    Ok(Arc::new(OpenAiProvider::from_config(&config.llm, api_key)))
}

async fn index_document(config: &Config, provider: Arc<dyn Provider>, path: &Path) -> Result<RagEngine> {
    let mut engine = RagEngine::new(config, provider).context("Failed to create RAG engine")?;
    let added = engine
        .index_file(path)
        .await
        .with_context(|| format!("Failed to index {}", path.display()))?;
    println!("{} Indexed {} ({} chunks)", "✓".green().bold(), path.display(), added);
    Ok(engine)
}

type InputLines = Lines<BufReader<Stdin>>;

/// Prompts and reads one line. `None` means the session is over.
async fn read_line(lines: &mut InputLines, prompt: &str) -> Result<Option<String>> {
    print!("{} ", prompt.bold().blue());
    std::io::stdout().flush()?;

    let Some(line) = lines.next_line().await.context("Failed to read input")? else {
        return Ok(None);
    };
    let line = line.trim().to_string();
    if line.eq_ignore_ascii_case("exit") {
        return Ok(None);
    }
    Ok(Some(line))
}

fn print_run(run: &AgentRun) {
    for step in &run.steps {
        println!(
            "  {} {}({}) → {}",
            "⚙".dimmed(),
            step.tool.cyan(),
            step.input,
            step.observation.dimmed()
        );
    }
    match run.outcome {
        TurnOutcome::Final => println!("{} {}", "AI:".bold().green(), run.output),
        TurnOutcome::ExceededIterations => println!(
            "{} {}",
            "Stopped after too many tool calls:".bold().yellow(),
            run.output
        ),
    }
}

async fn chat(config: &Config, document: Option<&Path>) -> Result<()> {
    let provider = provider(config)?;

    let mut registry = ToolRegistry::new()
        .with(Arc::new(CalculatorTool::new()))?
        .with(Arc::new(WeatherTool::from_config(&config.tools)))?;

    if let Some(path) = document {
        let engine = index_document(config, provider.clone(), path).await?;
        registry.register(Arc::new(RagTool::new(
            Arc::new(engine),
            "document-qa",
            format!(
                "Answers questions about the document '{}'. Input is the question.",
                path.display()
            ),
        )))?;
    }

    let agent = AgentLoop::new(config, provider, registry)?;
    let mut memory = ConversationMemory::with_max_turns(config.agent.memory_max_turns);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Type {} to quit. Ctrl-C cancels the current request.\n", "exit".bold());

    while let Some(input) = read_line(&mut lines, "You:").await? {
        if input.is_empty() {
            continue;
        }

        tokio::select! {
            result = agent.run(&mut memory, &input) => match result {
                Ok(run) => print_run(&run),
                Err(e) => println!("{} {}", "Error:".bold().red(), e),
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", "Request cancelled.".yellow());
            }
        }
        println!();
    }

    Ok(())
}

async fn ask(config: &Config, document: &Path, question: Option<&str>) -> Result<()> {
    let provider = provider(config)?;
    let engine = index_document(config, provider, document).await?;

    let stream = |chunk: &str| {
        print!("{}", chunk);
        let _ = std::io::stdout().flush();
    };

    if let Some(question) = question {
        engine.answer_stream(question, stream).await?;
        println!();
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(question) = read_line(&mut lines, "Question:").await? {
        if question.is_empty() {
            continue;
        }

        print!("{} ", "AI:".bold().green());
        tokio::select! {
            result = engine.answer_stream(&question, stream) => {
                if let Err(e) = result {
                    print!("{} {}", "Error:".bold().red(), e);
                }
            }
            _ = tokio::signal::ctrl_c() => print!("{}", "Request cancelled.".yellow()),
        }
        println!("\n");
    }

    Ok(())
}

async fn summarize(config: &Config, file: &Path, output: Option<&Path>) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    println!("Summarizing {} ({} characters)...", file.display(), text.chars().count());

    let summarizer = Summarizer::new(config, provider(config)?)?;
    let summary = summarizer.summarize(&text).await.context("Summarization failed")?;

    println!("\n{}\n", "=== SUMMARY ===".bold().green());
    println!("{}", summary);

    if let Some(output) = output {
        tokio::fs::write(output, &summary)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;
        println!("\n{} Summary saved to {}", "✓".green().bold(), output.display());
    }

    Ok(())
}

/// Runs a weather agent and feeds its answer to an activity agent.
async fn activity(config: &Config, city: &str) -> Result<()> {
    let provider = provider(config)?;

    let weather_agent = AgentLoop::new(
        config,
        provider.clone(),
        ToolRegistry::new().with(Arc::new(WeatherTool::from_config(&config.tools)))?,
    )?
    .with_system_prompt("You report the current weather. Use the get-weather tool.");

    let activity_agent = AgentLoop::new(
        config,
        provider,
        ToolRegistry::new().with(Arc::new(SuggestActivityTool::new()))?,
    )?
    .with_system_prompt(
        "You suggest outdoor activities that suit the weather. Use the suggest-activity tool.",
    );

    let weather = weather_agent
        .run(&mut ConversationMemory::new(), &format!("What is the weather in {}?", city))
        .await
        .context("Weather agent failed")?;
    print_run(&weather);

    let suggestion = activity_agent
        .run(
            &mut ConversationMemory::new(),
            &format!("Suggest an outdoor activity for this weather: {}", weather.output),
        )
        .await
        .context("Activity agent failed")?;
    print_run(&suggestion);

    Ok(())
}

fn show_config(config: &Config) {
    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:           {}", config.llm.model.cyan());
    println!("  Base URL:        {}", config.llm.base_url);
    println!("  API Key Env:     {}", config.llm.api_key_env);
    println!("  Temperature:     {}", config.llm.temperature);
    println!("  Timeout:         {}s", config.llm.request_timeout_secs);
    println!();
    println!("{}", "RAG:".bold());
    println!("  Embedding Model: {}", config.rag.embedding_model.cyan());
    println!("  Chunk Size:      {}", config.rag.chunk_size);
    println!("  Chunk Overlap:   {}", config.rag.chunk_overlap);
    println!("  Metric:          {:?}", config.rag.similarity_metric);
    println!("  Index:           {:?}", config.rag.index);
    println!("  Top K:           {}", config.rag.top_k);
    println!();
    println!("{}", "Agent:".bold());
    println!("  Max Iterations:  {}", config.agent.max_iterations);
    match config.agent.memory_max_turns {
        Some(turns) => println!("  Memory Limit:    {} turns", turns),
        None => println!("  Memory Limit:    unbounded"),
    }
    println!("  System Prompt:   {}", config.system_prompt);
    println!();
    println!("{}", "Tools:".bold());
    println!("  Weather URL:     {}", config.tools.weather_base_url);
    println!("  Weather Key Env: {}", config.tools.weather_api_key_env);
    println!("  Timeout:         {}s", config.tools.request_timeout_secs);
}

//! Console chatbot for managing A/B experiments through natural language.

use anyhow::Result;
use application::{Agent, LoopConfig};
use clap::Parser;
use colored::Colorize;
use domain::state::ConversationState;
use infrastructure::{AnthropicClient, Config, ExperimentApi, UpGradeClient};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "upgrade-agent", about = "Conversational assistant for the UpGrade A/B testing service", version)]
struct Cli {
    /// Override the experiment service URL from the environment
    #[arg(long)]
    api_url: Option<String>,

    /// Check service health and exit
    #[arg(long)]
    health: bool,
}

fn print_welcome() {
    println!("\n{}", "=".repeat(78));
    println!("{}", "Welcome to UpGrade Agent".bold());
    println!("A conversational assistant for the UpGrade A/B testing platform");
    println!("{}", "=".repeat(78));
    println!("\nWhat I can help you with:");
    println!("  - Explain A/B testing concepts and platform terminology");
    println!("  - List and inspect experiments");
    println!("  - Create, update, and manage experiments");
    println!("  - Simulate user assignments and decision points");
    println!("\nExamples:");
    println!("  \"What contexts are available?\"");
    println!("  \"Create an experiment called Math Hints\"");
    println!("  \"What conditions did user123 get in assign-prog?\"");
    println!("\nType 'quit', 'exit', or 'bye' to end the conversation.");
    println!("{}\n", "-".repeat(78));
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(api_url) = cli.api_url {
        config.api_url = api_url;
    }

    let api = UpGradeClient::new(&config)?;

    if cli.health {
        match api.health().await {
            Ok(health) => {
                println!("{} {} ({})", "OK".green().bold(), health.name, health.version);
                return Ok(());
            }
            Err(err) => {
                eprintln!("{} {err}", "UNREACHABLE".red().bold());
                std::process::exit(1);
            }
        }
    }

    if let Err(err) = config.validate() {
        eprintln!("{} {err}", "Configuration error:".red().bold());
        std::process::exit(1);
    }

    let model = AnthropicClient::new(&config)?;
    let agent = Agent::new(
        Arc::new(model),
        Arc::new(api),
        LoopConfig {
            max_iterations: config.max_iterations as usize,
            iteration_timeout: Duration::from_secs(config.request_timeout_secs.max(60)),
        },
    );
    let mut state = ConversationState::new();

    print_welcome();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{} ", "You:".cyan().bold());
        io::stdout().flush()?;
        let Some(line) = lines.next() else {
            println!("\nGoodbye!");
            break;
        };
        let input = line?.trim().to_string();

        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "bye" | "q") {
            println!("\nThank you for using UpGrade Agent. Goodbye!");
            break;
        }

        match agent.handle_turn(&mut state, &input).await {
            Ok(response) => {
                println!("{} {response}\n", "Bot:".green().bold());
            }
            Err(err) => {
                tracing::error!(%err, "turn failed");
                println!(
                    "{} I encountered an error while processing your request: {err}. Please try again.\n",
                    "Bot:".green().bold()
                );
            }
        }
    }

    Ok(())
}

//! newsdesk command implementations

use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::info;

use newsdesk_agent::tools::{register_default_tools, ToolRegistry};
use newsdesk_agent::{AgentEvent, AgentLoop, AgentSettings};
use newsdesk_config::{self, Config, NewsConfig, RetryConfig};
use newsdesk_provider::{FileAuditLog, InferenceGateway, OpenRouterProvider, RetryPolicy};
use newsdesk_session::Conversation;

const PROMPT: &str = "AWS News Assistant (x to exit): ";

/// Initialize config and audit directory
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing newsdesk...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = newsdesk_config::init().await?;

    println!("Config:    {}", newsdesk_config::config_path().display());
    println!("Audit log: {}", config.audit_dir().display());
    println!("\n◆ newsdesk initialized");
    println!("\nNext steps:");
    println!("  1. Add your API key to ~/.newsdesk/config.json");
    println!("     or export {}", newsdesk_config::API_KEY_ENV);
    println!("  2. Start chatting: newsdesk chat -m \"What's new in S3?\"");

    Ok(())
}

fn retry_policy(retry: &RetryConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: retry.max_attempts,
        base_delay: retry.base_delay(),
        max_delay: retry.max_delay(),
        multiplier: retry.multiplier,
    }
}

fn build_registry(news: &NewsConfig) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    register_default_tools(&mut registry, news)?;
    Ok(registry)
}

fn build_agent(config: &Config) -> Result<AgentLoop<OpenRouterProvider>> {
    config.validate()?;

    let api_key = config.api_key().with_context(|| {
        format!(
            "No API key configured. Set {} or add one to ~/.newsdesk/config.json",
            newsdesk_config::API_KEY_ENV
        )
    })?;

    let provider = OpenRouterProvider::new(api_key, config.api_base(), Some(config.model()))
        .with_retry(retry_policy(&config.retry));
    let audit = Arc::new(FileAuditLog::new(config.audit_dir()));
    let gateway = InferenceGateway::new(provider, audit);
    info!("Session {} auditing to {:?}", gateway.session(), config.audit_dir());

    let tools = Arc::new(build_registry(&config.news)?);
    Ok(AgentLoop::new(gateway, tools, AgentSettings::from_config(config)))
}

fn print_event(event: &AgentEvent) {
    match event {
        AgentEvent::Thinking(text) => println!("  ◆ {}", text),
        AgentEvent::ToolCall { name, input, .. } => {
            let args = serde_json::Value::Object(input.clone());
            println!("  ▸ {}({})", name, args);
        }
        AgentEvent::ToolResult {
            name,
            is_error: true,
            ..
        } => println!("  ✗ {} failed", name),
        AgentEvent::ToolResult { .. } => {}
    }
}

/// Run one turn, printing tool notices while the loop works
async fn run_turn(
    agent: &AgentLoop<OpenRouterProvider>,
    conversation: &mut Conversation,
    events: &mut UnboundedReceiver<AgentEvent>,
    input: &str,
) -> newsdesk_agent::Result<String> {
    let turn = agent.process_turn(conversation, input);
    tokio::pin!(turn);

    let outcome = loop {
        tokio::select! {
            outcome = &mut turn => break outcome,
            Some(event) = events.recv() => print_event(&event),
        }
    };

    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
    outcome
}

fn is_exit(input: &str) -> bool {
    input.eq_ignore_ascii_case("x") || input == "exit" || input == "quit"
}

/// Chat with the assistant
pub async fn chat_command(message: Option<String>) -> Result<()> {
    let config = Config::load().await?;
    let (tx, mut events) = mpsc::unbounded_channel();
    let agent = build_agent(&config)?.with_events(tx);
    let mut conversation = Conversation::new("cli:direct");

    if let Some(msg) = message {
        let answer = run_turn(&agent, &mut conversation, &mut events, &msg).await?;
        println!("\n◆ {}", answer);
        return Ok(());
    }

    println!("◆ Interactive mode");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    loop {
        print!("{}", PROMPT);
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit(input) {
            break;
        }

        match run_turn(&agent, &mut conversation, &mut events, input).await {
            Ok(answer) => println!("\n◆ {}\n", answer),
            Err(e) => eprintln!("\n{}\n", e),
        }
    }

    Ok(())
}

/// Print the tool descriptors as sent to the model
pub async fn tools_command() -> Result<()> {
    let config = Config::load().await?;
    let registry = build_registry(&config.news)?;
    println!("{}", serde_json::to_string_pretty(&registry.provider_schema())?);
    Ok(())
}

/// Show status
pub async fn status_command() -> Result<()> {
    let config_path = newsdesk_config::config_path();

    println!("◆ newsdesk Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_path.exists() {
            "[OK]"
        } else {
            "[Missing]"
        }
    );

    let config = Config::load().await?;
    let audit = config.audit_dir();
    println!("Model:     {}", config.model());
    println!(
        "API Key:   {}",
        if config.has_api_key() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!(
        "Audit log: {} {}",
        audit.display(),
        if audit.exists() { "[OK]" } else { "[Missing]" }
    );
    println!("News API:  {}", config.news.api_base);
    println!("Budget:    {} tool rounds per turn", config.agent.max_recursions);

    println!("\n◆ Ready");

    Ok(())
}

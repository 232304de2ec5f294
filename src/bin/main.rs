use esg_finance_assistant::{config::ChatConfig, FinanceChatbot};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SESSION_ID: &str = "terminal";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = ChatConfig::from_env()?;
    info!(
        "Local model: {} at {}",
        config.local_llm_model, config.local_llm_url
    );

    let chatbot = FinanceChatbot::from_config(&config)?;

    println!("{}", "=".repeat(50));
    println!("ESG Finance Chatbot");
    println!("{}", "=".repeat(50));
    println!("Type 'exit' or 'quit' to end the session");
    println!("\nChatbot ready! Enter your financial questions.");
    println!("{}", "-".repeat(50));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"\nYou: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let user_input = line.trim();

        if user_input.is_empty() {
            continue;
        }
        if matches!(user_input.to_lowercase().as_str(), "exit" | "quit" | "bye") {
            break;
        }

        println!("\nProcessing your query... This may take a moment.");
        let reply = chatbot.respond(SESSION_ID, user_input).await;
        println!("\nChatbot: {}", reply.answer);
    }

    println!("Goodbye!");
    Ok(())
}

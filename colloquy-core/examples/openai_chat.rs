use colloquy_core::provider::{ChatRequest, Message, OpenAiProvider, Provider};
use colloquy_core::Config;

#[tokio::main]
async fn main() {
    let config = Config::load_or_default();
    println!("Model: {}", config.llm.model);
    println!("Base URL: {}", config.llm.base_url);

    let api_key = match config.api_key() {
        Ok(key) => key,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    let provider = OpenAiProvider::from_config(&config.llm, api_key);
    let request = ChatRequest::new(&config.llm.model, vec![Message::user("Hi there!")]);

    match provider
        .chat(
            request,
            Box::new(|response| {
                print!("{}", response.content);
                std::io::Write::flush(&mut std::io::stdout()).ok();
            }),
        )
        .await
    {
        Ok(_) => println!("\n\nChat test successful!"),
        Err(e) => {
            eprintln!("\n\nChat test failed: {}", e);
            eprintln!("\nTroubleshooting:");
            eprintln!("  1. Is {} set?", config.llm.api_key_env);
            eprintln!("  2. Is the model available? ({})", config.llm.model);
            eprintln!("  3. Is the base URL correct? ({})", config.llm.base_url);
        }
    }
}

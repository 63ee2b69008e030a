use colloquy_plugin::ToolRegistry;
use colloquy_std::CalculatorTool;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let registry = ToolRegistry::new()
        .with(Arc::new(CalculatorTool::new()))
        .expect("calculator registers");

    for expression in ["7 * 10", "(1 + 2) ^ 2 / 4", "1 / 0"] {
        let observation = registry.invoke("calculator", expression).await.expect("calculator is registered");
        println!("{} => {}", expression, observation);
    }
}

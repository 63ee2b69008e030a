//! colloquy - Conversational retrieval and tool-use engine
//!
//! This is the convenience wrapper crate that re-exports colloquy components
//! with optional feature flags for easy usage.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! colloquy = "0.1"  # Includes core + standard tools by default
//! ```
//!
//! ```no_run
//! use colloquy::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load_or_default();
//! let provider = Arc::new(OpenAiProvider::from_config(&config.llm, config.api_key()?));
//! let registry = ToolRegistry::new().with(Arc::new(colloquy_std::CalculatorTool::new()))?;
//!
//! let agent = AgentLoop::new(&config, provider, registry)?;
//! let mut memory = ConversationMemory::new();
//! let run = agent.run(&mut memory, "What is 7 * 10?").await?;
//! println!("{}", run.output);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `std` (default): Include the standard tools (calculator, weather, activity)

// Re-export core
pub use colloquy_core::*;
pub use colloquy_plugin;

// Re-export standard tools if feature is enabled
#[cfg(feature = "std")]
pub use colloquy_std;

/// Prelude module for convenient imports
pub mod prelude {
    pub use colloquy_core::*;
    pub use colloquy_plugin::{Tool, ToolError, ToolRegistry};

    #[cfg(feature = "std")]
    pub use colloquy_std;
}

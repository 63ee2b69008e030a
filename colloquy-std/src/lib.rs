//! Standard tools for colloquy
//!
//! The standard library is a collection of built-in tools that cover the
//! common assistant use-cases and work out of the box:
//! - Arithmetic (`calculator`)
//! - Current weather lookup (`get-weather`)
//! - Activity suggestions from a weather report (`suggest-activity`)

mod activity;
mod calculator;
mod weather;

pub use activity::SuggestActivityTool;
pub use calculator::{evaluate, CalculatorTool, EvalError};
pub use weather::WeatherTool;

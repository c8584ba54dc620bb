//! Stateless demonstration tools: echo, clock, word count, calculator

use crate::tool::{ToolArguments, ToolOutput};
use anyhow::Result;
use chrono::Local;
use tracing::info;

/// Handle Echo tool
pub fn handle_echo(args: &ToolArguments) -> Result<ToolOutput> {
    let message = args.str("message")?;
    info!(message = message, "Echo tool called");
    Ok(format!("Echo: {}", message).into())
}

/// Handle GetCurrentTime tool
pub fn handle_current_time(_args: &ToolArguments) -> Result<ToolOutput> {
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    info!(time = %now, "Returning current time");
    Ok(format!("Current time: {}", now).into())
}

/// Number of words separated by spaces, tabs or line breaks
pub fn count_words(text: &str) -> usize {
    text.split([' ', '\t', '\n', '\r'])
        .filter(|word| !word.is_empty())
        .count()
}

/// Handle CountWords tool
pub fn handle_count_words(args: &ToolArguments) -> Result<ToolOutput> {
    let text = args.str("text")?;
    let count = count_words(text);
    info!(count = count, "Counted words in text");
    Ok(format!("Word count: {}, Text: {}", count, text).into())
}

/// Evaluate `a <operation> b`
///
/// Unknown operations and division by zero are reported as `Error: ...`
/// text rather than failures.
pub fn calculate(operation: &str, a: f64, b: f64) -> String {
    let result = match operation.to_lowercase().as_str() {
        "add" => a + b,
        "subtract" => a - b,
        "multiply" => a * b,
        "divide" => {
            if b == 0.0 {
                return "Error: Cannot divide by zero".to_string();
            }
            a / b
        }
        _ => return format!("Error: Unknown operation: {}", operation),
    };

    format!("Result of {} {} {} = {}", a, operation, b, result)
}

/// Handle Calculate tool
pub fn handle_calculate(args: &ToolArguments) -> Result<ToolOutput> {
    let operation = args.str("operation")?;
    let a = args.number("a")?;
    let b = args.number("b")?;

    info!(operation = operation, a = a, b = b, "Performing calculation");

    Ok(calculate(operation, a, b).into())
}

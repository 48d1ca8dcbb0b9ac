//! Minimal condensation example: grow a history past its limit, shrink it.
//!
//! Builds a synthetic 120-event session, runs one condensation cycle
//! against a live completion endpoint, and prints the before/after shape.
//!
//! # Usage
//!
//! ```bash
//! OPENROUTER_KEY=sk-... cargo run --example basic_condense
//! ```

use chrono::{Duration, Utc};
use recap_rs::prelude::*;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Create the completion client the condenser will summarize through.
    let api_key = std::env::var("OPENROUTER_KEY")
        .map_err(|_| "Set OPENROUTER_KEY env var to your OpenRouter API key")?;
    let client = Arc::new(OneShotClient::new(api_key)?);

    // 2. Configure and build the condenser.
    let config = CondenserConfig::default()
        .with_max_size(100)
        .with_keep_first(2)
        .with_max_compression_ratio(0.3);
    let condenser = Condenser::new(config, client)?.with_sink(Arc::new(LoggingSink));

    // 3. Fake a session that has outgrown its limit.
    let start = Utc::now() - Duration::hours(2);
    let mut view = View::new();
    view.push(Event::user_message(0, start, "please add a retry flag to the CLI"));
    view.push(Event::user_message(1, start, "keep the default behavior unchanged"));
    for i in 2..120 {
        let at = start + Duration::minutes(i);
        view.push(match i % 3 {
            0 => Event::action(i as u64, at, ActionKind::Command, "cargo check"),
            1 => Event::action(i as u64, at, ActionKind::Edit, "edited src/cli.rs"),
            _ => Event::observation(i as u64, at, "compiled successfully"),
        });
    }

    // 4. Condense and inspect the result.
    println!("before: {} events", view.len());
    let view = condenser.maybe_condense(view).await;
    println!("after:  {} events", view.len());

    for event in view.iter().take(4) {
        let preview: String = event.content.chars().take(60).collect();
        println!("[{} | {}] {preview}", event.id, event.kind.label());
    }

    Ok(())
}

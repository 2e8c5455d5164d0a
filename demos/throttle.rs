//! Throttling and delaying calls on a tokio runtime.
//!
//! A burst of "save" requests is coalesced: the first runs at once, the last
//! one runs when the window ends, and everything in between is dropped.

use std::time::Duration;
use timing_decorators::{delay, DeferredError, Throttle, TokioTimer};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Throttle Example ===\n");

    let save = Throttle::builder(|draft: String| {
        info!(%draft, "saving");
        draft.len()
    })
    .with_window(Duration::from_millis(200))
    .on_trailing(|outcome| match outcome {
        Ok(bytes) => println!("trailing save wrote {} bytes", bytes),
        Err(DeferredError::Panicked(msg)) => println!("trailing save panicked: {}", msg),
        Err(e) => println!("trailing save failed: {}", e),
    })
    .build()
    .expect("valid throttle config");

    for (i, draft) in ["H", "He", "Hel", "Hell", "Hello"].iter().enumerate() {
        match save.call(draft.to_string()) {
            Some(bytes) => println!("call {}: saved immediately ({} bytes)", i, bytes),
            None => println!("call {}: deferred", i),
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    tokio::time::sleep(Duration::from_millis(300)).await;

    let snapshot = save.metrics().snapshot();
    println!("\nExecutions: {}", snapshot.invocations);
    println!("Superseded: {}", snapshot.trailing_superseded);

    println!("\n=== Delay Example ===\n");

    let timer = TokioTimer::new();
    let reminder = delay(
        &timer,
        Duration::from_millis(100),
        |who: &'static str| format!("reminder for {}", who),
        "ops",
    )
    .expect("running inside tokio");

    println!("scheduled, waiting...");
    match reminder.recv().await {
        Ok(message) => println!("{}", message),
        Err(e) => println!("delayed call failed: {}", e),
    }
}

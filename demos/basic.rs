//! Basic example of the caching decorators.
//!
//! `once` runs an expensive setup a single time; `memoize` remembers every
//! result it has computed, including falsy ones like `0` and `false`.

use timing_decorators::{memoize, once, Metrics};
use tracing::info;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    println!("=== Caching Decorators Example ===\n");

    let load_config = once(|path: &str| {
        info!(path, "loading configuration");
        format!("config from {}", path)
    });

    println!("First call:  {}", load_config.call("/etc/app.toml"));
    println!("Second call: {}", load_config.call("/tmp/other.toml"));
    println!("(the loader ran once; later arguments are ignored)\n");

    let metrics = Metrics::new();
    let divisors = memoize(|n: u64| {
        info!(n, "counting divisors");
        (1..=n).filter(|d| n % d == 0).count()
    })
    .with_metrics(metrics.clone());

    for n in [12, 7, 12, 0, 0, 7] {
        println!("divisors({}) = {}", n, divisors.call(n));
    }

    let snapshot = metrics.snapshot();
    println!("\n=== Metrics ===");
    println!("Invocations: {}", snapshot.invocations);
    println!("Cache hits:  {}", snapshot.cache_hits);
    println!("Hit rate:    {:.0}%", snapshot.hit_rate() * 100.0);
}

//! # Example: search_box
//!
//! Demonstrates supersession: a search box fires a lookup on every keystroke,
//! and only the latest lookup's result may reach the UI.
//!
//! Shows how to:
//! - Build a controller with an error mapper and observers
//! - Supersede running lookups by calling `start_with` again
//! - Cancel explicitly and `clean` a shown error
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► type "r", "ru", "rus" (each start supersedes the previous lookup)
//!   │     └─► only "rus" completes into `value`; older completions are discarded
//!   ├─► type "zzz" ─► lookup fails with NoMatch ─► `error`
//!   ├─► clean()    ─► error dismissed
//!   └─► type "slow" then cancel() ─► Idle immediately, late result ignored
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example search_box --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use taskslot::{Controller, ControllerConfig, Event, Failure, LogWriter, Observe, Snapshot};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq)]
enum SearchError {
    NoMatch(String),
    Backend(String),
}

impl std::fmt::Display for SearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchError::NoMatch(q) => write!(f, "no match for {q:?}"),
            SearchError::Backend(msg) => write!(f, "backend: {msg}"),
        }
    }
}

/// Prints what a UI would render.
struct Screen;

impl Observe<Vec<String>, SearchError> for Screen {
    fn on_event(&self, ev: &Event, snap: &Snapshot<Vec<String>, SearchError>) {
        println!(
            "[screen] {:<10} spinner={} results={:?} error={:?}",
            ev.kind.as_label(),
            snap.is_active(),
            snap.value,
            snap.error.as_ref().map(ToString::to_string),
        );
    }

    fn name(&self) -> &'static str {
        "screen"
    }
}

const CATALOG: &[&str] = &["rust", "rustc", "rustup", "ruby", "python"];

async fn lookup(query: String, ctx: CancellationToken) -> Result<Vec<String>, Failure<SearchError>> {
    let latency = Duration::from_millis(if query == "slow" { 500 } else { 80 });
    tokio::select! {
        _ = ctx.cancelled() => return Err(Failure::Cancelled),
        _ = tokio::time::sleep(latency) => {}
    }
    if query.contains('!') {
        return Err(Failure::foreign(anyhow::anyhow!("invalid query {query:?}")));
    }
    let hits: Vec<String> = CATALOG
        .iter()
        .filter(|name| name.starts_with(query.as_str()))
        .map(|name| name.to_string())
        .collect();
    if hits.is_empty() {
        return Err(Failure::domain(SearchError::NoMatch(query)));
    }
    Ok(hits)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async {
            let search: Controller<Vec<String>, SearchError> = Controller::builder()
                .with_config(ControllerConfig::named("search"))
                .with_error_mapper(|f: &Failure<SearchError>| {
                    f.foreign_ref()
                        .map(|e| SearchError::Backend(e.to_string()))
                })
                .with_observer(Arc::new(Screen))
                .with_observer(Arc::new(LogWriter))
                .build();

            println!("=== typing \"rus\" ===");
            for query in ["r", "ru", "rus"] {
                search.start_with(query.to_string(), lookup);
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            search.wait_idle().await;
            println!("results: {:?}\n", search.value());

            println!("=== typing \"zzz\" ===");
            search.start_with("zzz".to_string(), lookup);
            search.wait_idle().await;
            println!("error: {:?}", search.error());
            search.clean();
            println!("after clean: {:?}\n", search.snapshot());

            println!("=== typing \"bad!\" (mapped foreign failure) ===");
            search.start_with("bad!".to_string(), lookup);
            search.wait_idle().await;
            println!("error: {:?}\n", search.error());

            println!("=== typing \"slow\" then cancel ===");
            search.start_with("slow".to_string(), lookup);
            search.cancel();
            println!("state right after cancel: {}", search.state());
            tokio::time::sleep(Duration::from_millis(600)).await;
            println!("still: {:?}", search.snapshot());
        })
        .await;

    Ok(())
}

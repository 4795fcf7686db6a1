// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Simulated conversation scroll session.
//!
//! Demonstrates:
//! 1. Starting the engine with an in-memory address book and registry
//! 2. Resolving display names through the fallback chain
//! 3. Scrolling cells in and out of view through the visibility pump
//! 4. A low-memory signal evacuating all media
//! 5. Displaying captured metrics
//! 6. Clean shutdown
//!
//! # Run
//!
//! ```bash
//! cargo run --example scroll_session
//! ```

use std::sync::Arc;
use std::time::Duration;

use conversation_core::{
    AccountRecord, CellId, CellMediaEntry, CellState, Collaborators, ContactRecord, ContentId, ConversationEngine,
    EngineConfig, IdentityKey, InMemoryAccountRegistry, InMemoryContactSource, InMemoryImageDecoder,
    InMemoryMediaLoader, PressureSignal, StyleHints, VisibilityEvent,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt().with_target(false).compact().init();

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Collaborators and engine
    // ─────────────────────────────────────────────────────────────────────────
    let alice = IdentityKey::parse("+1 (555) 123-0000")?;
    let bob = IdentityKey::parse("+1 (555) 987-6543")?;
    let stranger = IdentityKey::parse("5550001111")?;

    let contacts = Arc::new(InMemoryContactSource::new(vec![
        ContactRecord::new("Alice", "Liddell", vec![alice.clone()]),
        ContactRecord::new("Bob", "", vec![bob.clone()]),
    ]));
    let accounts = Arc::new(InMemoryAccountRegistry::new());
    accounts.insert(AccountRecord::registered(bob.clone()).with_profile_name("Bobby"));

    let loader = Arc::new(InMemoryMediaLoader::with_delay(Duration::from_millis(10)));
    for i in 0..20u64 {
        loader.insert(ContentId::new(format!("attachment-{i}")), CellMediaEntry::new(vec![0u8; 256 * 1024]));
    }

    let engine = ConversationEngine::new(
        EngineConfig::default(),
        Collaborators {
            contacts,
            accounts,
            decoder: Arc::new(InMemoryImageDecoder::new()),
            media: loader,
        },
    );
    engine.start().await?;
    println!("State: {}", engine.state());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Names
    // ─────────────────────────────────────────────────────────────────────────
    for key in [&alice, &bob, &stranger] {
        let styled = engine.resolver().formatted_name(key, StyleHints::FamilyName);
        println!(
            "{:>14} → {:<16} spans={:?}",
            key.as_str(),
            engine.resolver().display_name(key),
            styled.spans
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Scroll: a window of 5 visible cells slides over 20
    // ─────────────────────────────────────────────────────────────────────────
    for i in 0..20u64 {
        engine.media().bind(CellId(i), Some(ContentId::new(format!("attachment-{i}"))));
    }
    let (tx, rx) = mpsc::channel(64);
    let pump = engine.spawn_visibility_pump(rx);

    for top in 0..15u64 {
        if top > 0 {
            tx.send(VisibilityEvent { cell: CellId(top - 1), visible: false }).await?;
        }
        for cell in top..top + 5 {
            tx.send(VisibilityEvent { cell: CellId(cell), visible: true }).await?;
        }
        tokio::time::sleep(Duration::from_millis(15)).await;
    }
    tokio::time::sleep(Duration::from_millis(30)).await;

    let loaded = (0..20u64)
        .filter(|i| engine.media().state(CellId(*i)) == Some(CellState::Loaded))
        .count();
    println!("Loaded cells after scrolling: {loaded}, cache: {:?}", engine.media().cache().stats());

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Pressure
    // ─────────────────────────────────────────────────────────────────────────
    let evacuated = engine.on_pressure(PressureSignal::LowMemory);
    println!("Low memory evacuated {evacuated} cells, cache now {} entries", engine.media().cache().len());

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\nMetrics:");
    for (key, _, _, value) in snapshotter.snapshot().into_vec() {
        let value = match value {
            DebugValue::Counter(v) => v.to_string(),
            DebugValue::Gauge(v) => format!("{:.0}", v.into_inner()),
            DebugValue::Histogram(v) => format!("{} samples", v.len()),
        };
        println!("  {:<48} {}", key.key().name(), value);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Shutdown
    // ─────────────────────────────────────────────────────────────────────────
    drop(tx);
    engine.shutdown();
    pump.await?;
    println!("\nState: {}", engine.state());
    Ok(())
}

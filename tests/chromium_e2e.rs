//! End-to-end tests against a real headless Chromium.
//!
//! The remote collaborators stay in memory; only the browser is real. The
//! tests are gated behind `FACESHEET_E2E` so they do not run in CI unless a
//! browser is installed and the run is explicitly requested.
//!
//! Run with:
//!   FACESHEET_E2E=1 cargo test --test chromium_e2e -- --nocapture
//!
//! Point at a specific browser with `CHROME_PATH=/path/to/chrome`.

use facesheet::pipeline::engine::ChromiumEngine;
use facesheet::pipeline::paginate::Paginator;
use facesheet::progress::RunLog;
use facesheet::remote::memory::MemoryWorkspace;
use facesheet::{GenerationStatus, Generator, GeneratorConfig, Services};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless FACESHEET_E2E is set and a browser can be found.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("FACESHEET_E2E").is_err() {
            println!("SKIP: set FACESHEET_E2E=1 to run browser tests");
            return;
        }
        if !chrome_auto::is_chrome_available() {
            println!("SKIP: no Chromium found; set CHROME_PATH");
            return;
        }
    }};
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("facesheet=debug")
        .with_test_writer()
        .try_init();
}

fn assert_is_pdf(bytes: &[u8], context: &str) {
    assert!(bytes.len() > 100, "[{context}] PDF is suspiciously small");
    assert!(bytes.starts_with(b"%PDF-"), "[{context}] missing PDF header");
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_paginator_prints_local_html() {
    e2e_skip_unless_ready!();
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let html = dir.path().join("page.html");
    let pdf = dir.path().join("page.pdf");
    std::fs::write(&html, "<html><body><h1>Spring Roster</h1><p>Jane Doe</p></body></html>")
        .unwrap();
    let config = GeneratorConfig::builder()
        .parent_folder_id("unused")
        .settle_ms(100)
        .build()
        .unwrap();
    let engine = ChromiumEngine::from_config(&config);
    let log = RunLog::new(None);

    Paginator::new(&engine, &config)
        .convert(&html, &pdf, "Letter", "1in", "0.5in", &log)
        .await
        .unwrap();

    assert_is_pdf(&std::fs::read(&pdf).unwrap(), "paginator");
    let lines = log.lines();
    assert!(lines.iter().any(|l| l.starts_with("✅ All images loaded")), "{lines:#?}");
}

#[tokio::test]
async fn test_full_run_with_real_browser() {
    e2e_skip_unless_ready!();
    init_tracing();

    let out = tempfile::tempdir().unwrap();
    let ws = Arc::new(MemoryWorkspace::new());
    ws.add_sheet("s1", "E2E Roster");
    ws.set_worksheet(
        "s1",
        "Settings",
        vec![vec!["Key", "Value"], vec!["PDFSize", "A5"]],
    );
    ws.set_worksheet(
        "s1",
        "People",
        vec![
            vec!["Category", "Name", "Title", "Show"],
            vec!["Crew", "Jane Doe", "Lead", "Hamlet"],
            vec!["Crew", "John Roe", "Member", ""],
        ],
    );
    ws.add_file("imgs", "jane_doe.png", "image/png", vec![0x89, b'P', b'N', b'G']);

    let config = GeneratorConfig::builder()
        .parent_folder_id("published")
        .image_folder_id("imgs")
        .mirror_images(true)
        .output_dir(out.path())
        .settle_ms(100)
        .image_wait_interval_secs(1)
        .build()
        .unwrap();
    let services = Services {
        sheets: ws.clone(),
        assets: ws.clone(),
        objects: ws.clone(),
        engine: Arc::new(ChromiumEngine::from_config(&config)),
    };
    let generator = Generator::new(config, services).unwrap();

    let result = generator.generate("e2e@example.org", "s1").await;

    for line in &result.log {
        println!("{line}");
    }
    assert_eq!(result.status, GenerationStatus::Success);
    let local = std::fs::read(out.path().join("E2E Roster.pdf")).unwrap();
    assert_is_pdf(&local, "local");
    let id = &ws.files_named("published", "E2E Roster.pdf")[0];
    assert_eq!(ws.file_bytes(id).unwrap(), local);
}

// tests/shutdown.rs
//
// Signal handling. Kept in its own test binary: once the handlers are
// installed they stay installed for the life of the process.

#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::process::Command;

use tokio_util::sync::CancellationToken;

use skillwatch::spawn_shutdown_listener;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn sigterm_cancels_the_watch_token() -> TestResult {
    init_tracing();

    let cancel = CancellationToken::new();
    let listener = spawn_shutdown_listener(cancel.clone())?;
    assert!(!cancel.is_cancelled());

    let status = Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()?;
    assert!(status.success());

    with_timeout(cancel.cancelled()).await;
    with_timeout(listener).await?;
    Ok(())
}

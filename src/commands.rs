use std::sync::Arc;
use std::time::Duration;

use pollkeeper_core::{ManagedTimer, PollConfigExt, TimerSnapshot};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::app_state::{AppState, PollLoop};
use crate::poller::poll_handler;

/// Create a poll loop and start it right away
pub async fn create(
    name: &str,
    interval_ms: Option<u64>,
    fail_after_ticks: Option<u64>,
    state: Arc<RwLock<AppState>>,
) -> Result<(), String> {
    let mut s = state.write().await;
    if s.loops.contains_key(name) {
        return Err(format!("poll loop '{name}' already exists"));
    }

    let interval = match interval_ms {
        Some(ms) => Duration::from_millis(ms),
        None => s.config.default_interval().map_err(|e| e.to_string())?,
    };

    let timer = s
        .factory
        .create(name, interval)
        .map_err(|e| e.to_string())?;
    let started = timer
        .start(
            poll_handler(name.to_string(), fail_after_ticks),
            s.shutdown.child_token(),
        )
        .map_err(|e| e.to_string())?;

    tracing::info!(
        timer = name,
        interval_ms = interval.as_millis() as u64,
        started,
        "poll loop created"
    );
    s.loops.insert(
        name.to_string(),
        PollLoop {
            timer,
            fail_after_ticks,
        },
    );
    println!("created '{name}' ({}ms)", interval.as_millis());
    Ok(())
}

/// Create every configured preset. Invalid configs are logged and skipped.
pub async fn create_presets(state: Arc<RwLock<AppState>>) {
    let specs = {
        let s = state.read().await;
        match s.config.poll_loop_specs() {
            Ok(specs) => specs,
            Err(e) => {
                tracing::warn!(error = %e, "skipping configured poll loops");
                return;
            }
        }
    };

    for spec in specs {
        let interval_ms = spec.interval.as_millis() as u64;
        let created = create(
            &spec.name,
            Some(interval_ms),
            spec.fail_after_ticks,
            Arc::clone(&state),
        )
        .await;
        if let Err(e) = created {
            tracing::warn!(timer = %spec.name, error = %e, "failed to create configured poll loop");
        }
    }
}

pub async fn start(name: &str, state: Arc<RwLock<AppState>>) -> Result<(), String> {
    let s = state.read().await;
    let poll_loop = s
        .loops
        .get(name)
        .ok_or_else(|| format!("no poll loop named '{name}'"))?;

    let started = poll_loop
        .timer
        .start(
            poll_handler(name.to_string(), poll_loop.fail_after_ticks),
            s.shutdown.child_token(),
        )
        .map_err(|e| e.to_string())?;
    report(name, "start", started, poll_loop.timer.as_ref());
    Ok(())
}

pub async fn pause(name: &str, state: Arc<RwLock<AppState>>) -> Result<(), String> {
    let timer = state.read().await.timer(name)?;
    let paused = timer
        .pause(&CancellationToken::new())
        .map_err(|e| e.to_string())?;
    report(name, "pause", paused, timer.as_ref());
    Ok(())
}

pub async fn resume(name: &str, state: Arc<RwLock<AppState>>) -> Result<(), String> {
    let timer = state.read().await.timer(name)?;
    let resumed = timer
        .resume(&CancellationToken::new())
        .map_err(|e| e.to_string())?;
    report(name, "resume", resumed, timer.as_ref());
    Ok(())
}

pub async fn set_interval(
    name: &str,
    interval_ms: u64,
    state: Arc<RwLock<AppState>>,
) -> Result<(), String> {
    let timer = state.read().await.timer(name)?;
    let changed = timer
        .update_interval(Duration::from_millis(interval_ms), &CancellationToken::new())
        .map_err(|e| e.to_string())?;
    report(name, "interval", changed, timer.as_ref());
    Ok(())
}

pub async fn stop(name: &str, state: Arc<RwLock<AppState>>) -> Result<(), String> {
    let (timer, timeout) = {
        let s = state.read().await;
        (s.timer(name)?, s.config.stop_timeout())
    };

    // Dropping the stop future only abandons the wait; the stop request stands.
    let cancel = CancellationToken::new();
    let stopped = match tokio::time::timeout(timeout, timer.stop(&cancel)).await {
        Ok(result) => result.map_err(|e| e.to_string())?,
        Err(_) => {
            tracing::warn!(timer = name, timeout_ms = timeout.as_millis() as u64, "stop timed out");
            return Err(format!("'{name}' did not stop within {}ms", timeout.as_millis()));
        }
    };
    report(name, "stop", stopped, timer.as_ref());
    Ok(())
}

pub async fn dispose(name: &str, state: Arc<RwLock<AppState>>) -> Result<(), String> {
    let (poll_loop, timeout) = {
        let mut s = state.write().await;
        let poll_loop = s
            .loops
            .remove(name)
            .ok_or_else(|| format!("no poll loop named '{name}'"))?;
        (poll_loop, s.config.stop_timeout())
    };

    if tokio::time::timeout(timeout, poll_loop.timer.dispose()).await.is_err() {
        tracing::warn!(timer = name, "dispose timed out");
    }
    println!("disposed '{name}'");
    Ok(())
}

pub async fn list(state: Arc<RwLock<AppState>>) {
    let mut snapshots = state.read().await.registry().snapshots();
    if snapshots.is_empty() {
        println!("no timers registered");
        return;
    }
    snapshots.sort_by(|a, b| a.name.cmp(&b.name));

    println!(
        "{:<16} {:<8} {:>10}  {:<10} {:<10} fault",
        "name", "state", "interval", "last", "next"
    );
    for snapshot in &snapshots {
        println!("{}", format_row(snapshot));
    }
}

/// Stop every loop and dispose every timer before the process exits
pub async fn shutdown(state: Arc<RwLock<AppState>>) {
    let (loops, timeout) = {
        let mut s = state.write().await;
        s.shutdown.cancel();
        (std::mem::take(&mut s.loops), s.config.stop_timeout())
    };

    for (name, poll_loop) in loops {
        if tokio::time::timeout(timeout, poll_loop.timer.dispose()).await.is_err() {
            tracing::warn!(timer = %name, "dispose timed out during shutdown");
        }
    }
    tracing::info!("all poll loops disposed");
}

fn report(name: &str, op: &str, applied: bool, timer: &dyn ManagedTimer) {
    if applied {
        println!("{op} '{name}': now {}", timer.state());
    } else {
        println!("{op} '{name}': no change ({})", timer.state());
    }
}

fn format_row(snapshot: &TimerSnapshot) -> String {
    let time = |t: Option<chrono::DateTime<chrono::Utc>>| {
        t.map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    format!(
        "{:<16} {:<8} {:>8}ms  {:<10} {:<10} {}",
        snapshot.name,
        snapshot.state,
        snapshot.interval_ms,
        time(snapshot.last_tick_utc),
        time(snapshot.next_tick_utc),
        snapshot.last_fault.as_deref().unwrap_or("-"),
    )
}

//! Background expiry sweeper.
//!
//! Flips overdue active licenses to `expired` in one bulk UPDATE.
//! Read paths never depend on it (usability checks compare dates
//! themselves); the sweeper only keeps stored status and listings
//! honest. Runs once at startup, then on the configured interval.

use std::time::Duration;

use crate::audit;
use crate::clock;
use crate::db::AppState;
use crate::models::AdminAction;

pub fn spawn_expiry_sweeper(state: AppState, interval: Duration) {
    tokio::spawn(async move {
        tracing::info!(interval_secs = interval.as_secs(), "Expiry sweeper started");
        run_sweep(&state);
        loop {
            tokio::time::sleep(interval).await;
            run_sweep(&state);
        }
    });
}

/// One sweep pass. Writes a single audit record, and only on runs
/// that actually transitioned rows, so an idle system stays quiet.
pub fn run_sweep(state: &AppState) {
    let conn = match state.db.get() {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!("Expiry sweep skipped, no database connection: {}", e);
            return;
        }
    };
    match crate::db::queries::expire_overdue_licenses(&conn, clock::today()) {
        Ok(0) => tracing::debug!("Expiry sweep found no overdue licenses"),
        Ok(count) => {
            tracing::info!(count, "Expiry sweep transitioned licenses to expired");
            audit::log_admin_activity(
                &conn,
                audit::SYSTEM_ACTOR_ID,
                audit::SYSTEM_ACTOR_NAME,
                AdminAction::ExpireLicenses,
                &format!("{} license(s) transitioned to expired", count),
            );
        }
        Err(e) => tracing::error!("Expiry sweep failed: {}", e),
    }
}

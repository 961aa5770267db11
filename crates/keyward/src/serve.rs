// SPDX-FileCopyrightText: 2026 Keyward Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keyward serve` and `keyward scan`: the rotation daemon and its one-shot form.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use keyward_config::model::KeywardConfig;
use keyward_core::KeywardError;
use keyward_policy::{LogNotifier, PolicyEngine, RotationPolicy, RotationScheduler, ScanReport};
use keyward_storage::SqliteStore;

use crate::shutdown;

fn build_engine(config: &KeywardConfig, store: Arc<SqliteStore>) -> PolicyEngine {
    PolicyEngine::new(
        store,
        Arc::new(LogNotifier),
        RotationPolicy::from_config(&config.rotation),
    )
    .with_concurrency(config.rotation.concurrency)
}

/// Run the rotation scheduler until SIGINT or SIGTERM.
pub async fn run_serve(config: KeywardConfig) -> Result<(), KeywardError> {
    let store = Arc::new(SqliteStore::open(&config.storage).await?);
    info!(
        service = %config.service.name,
        database = %config.storage.database_path,
        "keyward starting"
    );

    let cancel = shutdown::install_signal_handler()?;

    if config.rotation.enabled {
        let engine = Arc::new(build_engine(&config, store.clone()));
        let scheduler = Arc::new(RotationScheduler::from_config(engine, &config.rotation));
        info!(
            interval_secs = scheduler.period().as_secs(),
            warn_before_days = config.rotation.warn_before_days,
            "rotation scheduler enabled"
        );
        scheduler.run(cancel.clone()).await;
    } else {
        info!("rotation scheduler disabled; waiting for shutdown signal");
        cancel.cancelled().await;
    }

    store.close().await?;
    info!("keyward serve shutdown complete");
    Ok(())
}

/// Run one rotation scan and return its counters.
pub async fn run_scan(config: &KeywardConfig) -> Result<ScanReport, KeywardError> {
    let store = Arc::new(SqliteStore::open(&config.storage).await?);
    let cancel = shutdown::install_signal_handler()?;
    let report = build_engine(config, store.clone())
        .scan(Utc::now(), &cancel)
        .await?;
    store.close().await?;
    Ok(report)
}

// ============================================================
// Layer 2 — ServeUseCase
// ============================================================
// Starts the inference service:
//
//   Step 1: Load checkpoint + sidecar   (Layer 6 - infra)
//           failure here is fatal, the listener is never bound
//   Step 2: Build AppState              (api)
//   Step 3: Bind and serve until Ctrl-C (axum on tokio)

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};

use crate::api::{router, AppState};
use crate::infra::{checkpoint::CheckpointManager, telemetry::ServiceMetrics};
use crate::ml::{backend::default_device, inferencer::Inferencer, model::SimpleCnnConfig};

#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub model_path: PathBuf,
    pub image_size: u32,
    pub bind_addr:  String,
}

pub struct ServeUseCase {
    config: ServeConfig,
}

impl ServeUseCase {
    pub fn new(config: ServeConfig) -> Self {
        Self { config }
    }

    /// Load the model and build the shared handler state.
    pub fn build_state(&self) -> Result<AppState> {
        let cfg       = &self.config;
        let model_cfg = SimpleCnnConfig::new().with_image_size(cfg.image_size as usize);
        let ckpt      = CheckpointManager::new(&cfg.model_path);

        let inferencer = Inferencer::from_checkpoint(&ckpt, &model_cfg, default_device())
            .context("Refusing to start without a usable model")?;
        let metrics = Arc::new(ServiceMetrics::new()?);

        Ok(AppState::new(Arc::new(inferencer), metrics))
    }

    /// Block the calling thread serving HTTP until Ctrl-C.
    pub fn execute(&self) -> Result<()> {
        let state = self.build_state()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Cannot start async runtime")?;

        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind(&self.config.bind_addr)
                .await
                .with_context(|| format!("Cannot bind '{}'", self.config.bind_addr))?;
            tracing::info!("Serving on http://{}", listener.local_addr()?);

            axum::serve(listener, router(state))
                .with_graceful_shutdown(shutdown_signal())
                .await
                .context("Server error")?;

            tracing::info!("Server stopped");
            Ok(())
        })
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

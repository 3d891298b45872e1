//! Vault endpoints backed by the `sx` CLI.

use std::{
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    Extension,
    extract::{Path as UrlPath, State},
    routing::{get, post},
};
use pilot_process::{CommandRunner, Invocation, ProcessError, truncate_chars};
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::{
    cache::{TtlCache, TtlCell},
    config::VaultConfig,
    error::ApiError,
    request_meta::RequestMeta,
    security::is_valid_asset_name,
    state::AppState,
    vault_catalog::{MergedAsset, merge_assets},
    vault_decode::{AssetDetail, VaultStatus, decode_detail, decode_status},
};

const RAW_LOG_CHARS: usize = 500;

#[derive(Debug, thiserror::Error)]
pub enum DetailError {
    #[error("Invalid asset name: only alphanumeric characters and hyphens allowed")]
    InvalidName,
    #[error("sx CLI not found")]
    BinaryMissing,
    #[error("Asset '{0}' not found")]
    NotFound(String),
    #[error("Unexpected sx response format")]
    Malformed,
    #[error("Failed to fetch asset detail: {0}")]
    Upstream(#[source] ProcessError),
}

impl From<DetailError> for ApiError {
    fn from(err: DetailError) -> Self {
        match err {
            DetailError::InvalidName => ApiError::BadRequest(err.to_string()),
            DetailError::BinaryMissing => ApiError::Internal(err.to_string()),
            DetailError::NotFound(_) => ApiError::NotFound(err.to_string()),
            DetailError::Malformed | DetailError::Upstream(_) => {
                ApiError::BadGateway(err.to_string())
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("Installation already in progress")]
    InProgress,
    #[error("sx CLI not found")]
    BinaryMissing,
}

impl From<InstallError> for ApiError {
    fn from(err: InstallError) -> Self {
        match err {
            InstallError::InProgress => ApiError::Conflict(err.to_string()),
            InstallError::BinaryMissing => ApiError::Internal(err.to_string()),
        }
    }
}

/// Cached view of `sx` state plus the single background install.
pub struct VaultService<R> {
    runner: Arc<R>,
    config: VaultConfig,
    status_cache: TtlCell<VaultStatus>,
    detail_cache: TtlCache<String, AssetDetail>,
    installing: AtomicBool,
    install_task: Mutex<Option<JoinHandle<()>>>,
}

impl<R: CommandRunner> VaultService<R> {
    pub fn new(runner: Arc<R>, config: VaultConfig) -> Self {
        Self {
            runner,
            status_cache: TtlCell::new(config.status_ttl),
            detail_cache: TtlCache::new(config.detail_ttl),
            config,
            installing: AtomicBool::new(false),
            install_task: Mutex::new(None),
        }
    }

    pub fn is_installing(&self) -> bool {
        self.installing.load(Ordering::Acquire)
    }

    fn invocation(&self, sx: &Path, args: &[&str], timeout: Duration) -> Invocation {
        let program = sx.to_string_lossy().into_owned();
        let argv = std::iter::once(program).chain(args.iter().map(|a| a.to_string()));
        Invocation::new(argv, timeout).current_dir(&self.config.project_root)
    }

    // A fetch already in flight keeps its result out of the cache.
    fn invalidate_all(&self) {
        self.status_cache.invalidate();
        self.detail_cache.clear();
    }

    /// Never fails: any problem with `sx` degrades to the "not installed"
    /// snapshot.
    pub async fn status(&self) -> VaultStatus {
        let installing = self.is_installing();
        if let Some(cached) = self.status_cache.get() {
            return cached.with_installing(installing);
        }

        let Some(sx) = self.runner.locate(&self.config.sx_program) else {
            tracing::debug!(program = %self.config.sx_program, "sx not found on PATH");
            return VaultStatus::not_installed(installing);
        };

        let generation = self.status_cache.generation();
        let timeout = self.config.status_timeout;
        let config_inv = self.invocation(&sx, &["config", "--json"], timeout);
        let catalog_inv = self.invocation(&sx, &["vault", "list", "--json"], timeout);
        let (config_out, catalog_out) = tokio::join!(
            self.runner.run(&config_inv),
            self.runner.run(&catalog_inv)
        );

        let config_raw = match config_out {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(error = %err, "sx config failed");
                return VaultStatus::not_installed(installing);
            }
        };
        let catalog_raw = match catalog_out {
            Ok(raw) => Some(raw),
            Err(err) => {
                tracing::warn!(error = %err, "sx vault list failed; reporting empty catalog");
                None
            }
        };

        match decode_status(&config_raw, catalog_raw.as_deref(), installing) {
            Ok(status) => {
                self.status_cache.set_if_current(generation, status.clone());
                status
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    raw = %truncate_chars(&config_raw, RAW_LOG_CHARS),
                    "unexpected sx config output"
                );
                VaultStatus::not_installed(installing)
            }
        }
    }

    pub async fn assets(&self) -> Vec<MergedAsset> {
        let status = self.status().await;
        merge_assets(&status.catalog, &status.assets)
    }

    pub async fn detail(&self, name: &str) -> Result<AssetDetail, DetailError> {
        if !is_valid_asset_name(name) {
            return Err(DetailError::InvalidName);
        }
        let key = name.to_string();
        if let Some(cached) = self.detail_cache.get(&key) {
            return Ok(cached);
        }

        let sx = self
            .runner
            .locate(&self.config.sx_program)
            .ok_or(DetailError::BinaryMissing)?;

        let generation = self.detail_cache.generation();
        let inv = self.invocation(
            &sx,
            &["vault", "show", name, "--json"],
            self.config.status_timeout,
        );
        let raw = match self.runner.run(&inv).await {
            Ok(raw) => raw,
            Err(err) if err.is_nonzero_exit() => {
                tracing::debug!(name = %name, error = %err, "sx vault show reported failure");
                return Err(DetailError::NotFound(key));
            }
            Err(err) => {
                tracing::error!(name = %name, error = %err, "sx vault show failed");
                return Err(DetailError::Upstream(err));
            }
        };

        let detail = decode_detail(&raw).map_err(|err| {
            tracing::error!(
                name = %name,
                error = %err,
                raw = %truncate_chars(&raw, RAW_LOG_CHARS),
                "unexpected sx vault show output"
            );
            DetailError::Malformed
        })?;

        self.detail_cache.set_if_current(generation, key, detail.clone());
        Ok(detail)
    }

    /// Start `sx install --repair` in the background.
    ///
    /// Returns once the install is marked in flight and the status cache is
    /// dropped. Completion clears both caches before the flag is reset. The
    /// task logs under an `install` span tagged with `request_id`.
    pub fn install(self: &Arc<Self>, request_id: &str) -> Result<(), InstallError> {
        if self
            .installing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(InstallError::InProgress);
        }

        let Some(sx) = self.runner.locate(&self.config.sx_program) else {
            self.installing.store(false, Ordering::Release);
            return Err(InstallError::BinaryMissing);
        };

        self.status_cache.invalidate();

        let target = self.config.project_root.to_string_lossy().into_owned();
        let inv = self.invocation(
            &sx,
            &["install", "--repair", "--target", &target],
            self.config.install_timeout,
        );
        let span = tracing::info_span!("install", request_id = %request_id);
        let guard = InstallGuard(Arc::clone(self));
        let task = async move {
            let svc = &guard.0;
            match svc.runner.run(&inv).await {
                Ok(_) => tracing::info!(project = %target, "sx install finished"),
                Err(err) => tracing::error!(project = %target, error = %err, "sx install failed"),
            }
            drop(guard);
        };
        let handle = tokio::spawn(task.instrument(span));

        *self.install_task.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        tracing::info!(request_id = %request_id, "sx install started");
        Ok(())
    }

    /// Wait for the running install, if any, to finish.
    pub async fn wait_for_install(&self) {
        let handle = self
            .install_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            tracing::error!(error = %err, "install task aborted");
        }
    }
}

/// Clears caches, then releases the installing flag, however the install
/// task ends.
struct InstallGuard<R: CommandRunner>(Arc<VaultService<R>>);

impl<R: CommandRunner> Drop for InstallGuard<R> {
    fn drop(&mut self) {
        self.0.invalidate_all();
        self.0.installing.store(false, Ordering::Release);
    }
}

#[derive(Debug, Serialize)]
struct AssetsView {
    assets: Vec<MergedAsset>,
}

pub fn routes<R: CommandRunner>() -> Router<AppState<R>> {
    Router::new()
        .route("/api/vault/status", get(status::<R>))
        .route("/api/vault/assets", get(assets::<R>))
        .route("/api/vault/install", post(install::<R>))
        .route("/api/vault/detail/", get(detail_without_name))
        .route("/api/vault/detail/:name", get(detail::<R>))
}

async fn status<R: CommandRunner>(State(state): State<AppState<R>>) -> Json<VaultStatus> {
    Json(state.vault.status().await)
}

async fn assets<R: CommandRunner>(State(state): State<AppState<R>>) -> Json<AssetsView> {
    Json(AssetsView {
        assets: state.vault.assets().await,
    })
}

async fn install<R: CommandRunner>(
    State(state): State<AppState<R>>,
    Extension(meta): Extension<RequestMeta>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.vault.install(&meta.request_id)?;
    Ok(Json(json!({ "started": true })))
}

async fn detail_without_name() -> ApiError {
    DetailError::InvalidName.into()
}

async fn detail<R: CommandRunner>(
    State(state): State<AppState<R>>,
    UrlPath(name): UrlPath<String>,
) -> Result<Json<AssetDetail>, ApiError> {
    Ok(Json(state.vault.detail(&name).await?))
}

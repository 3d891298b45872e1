use std::{net::SocketAddr, path::PathBuf, time::Duration};

const DEFAULT_ADDR: &str = "127.0.0.1:41777";
const DEFAULT_SX_PROGRAM: &str = "sx";
const DEFAULT_BRANCH_PREFIX: &str = "spec/";

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_u64(name: &str) -> Option<u64> {
    env_string(name).and_then(|v| v.parse::<u64>().ok())
}

fn env_millis(name: &str, default_ms: u64, min_ms: u64, max_ms: u64) -> Duration {
    Duration::from_millis(
        env_u64(name)
            .map(|v| v.clamp(min_ms, max_ms))
            .unwrap_or(default_ms),
    )
}

/// Settings for the `sx`-backed Vault endpoints.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Program name looked up on `PATH`, or a path to the binary.
    pub sx_program: String,
    pub project_root: PathBuf,
    pub status_timeout: Duration,
    pub install_timeout: Duration,
    pub status_ttl: Duration,
    pub detail_ttl: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            sx_program: DEFAULT_SX_PROGRAM.to_string(),
            project_root: PathBuf::from("."),
            status_timeout: Duration::from_secs(15),
            install_timeout: Duration::from_secs(60),
            status_ttl: Duration::from_secs(30),
            detail_ttl: Duration::from_secs(60),
        }
    }
}

/// Settings for the git worktree endpoints.
#[derive(Debug, Clone)]
pub struct WorktreeConfig {
    pub project_root: PathBuf,
    /// Branches starting with this prefix are tool-managed worktrees.
    pub branch_prefix: String,
    /// Used when `git worktree list` does not name the main checkout's branch.
    pub default_base_branch: String,
}

impl Default for WorktreeConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_string(),
            default_base_branch: "main".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub addr: SocketAddr,
    pub kill_grace: Duration,
    pub vault: VaultConfig,
    pub worktree: WorktreeConfig,
}

impl ConsoleConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let addr_raw = env_string("PILOT_CONSOLE_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr: SocketAddr = addr_raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid PILOT_CONSOLE_ADDR {addr_raw:?}: {e}"))?;

        let project_root = match env_string("PILOT_PROJECT_ROOT") {
            Some(p) => PathBuf::from(p),
            None => std::env::current_dir()?,
        };

        let vault = VaultConfig {
            sx_program: env_string("PILOT_SX_BIN").unwrap_or_else(|| DEFAULT_SX_PROGRAM.to_string()),
            project_root: project_root.clone(),
            status_timeout: env_millis("PILOT_SX_STATUS_TIMEOUT_MS", 15_000, 1_000, 300_000),
            install_timeout: env_millis("PILOT_SX_INSTALL_TIMEOUT_MS", 60_000, 5_000, 3_600_000),
            status_ttl: env_millis("PILOT_VAULT_STATUS_TTL_MS", 30_000, 0, 3_600_000),
            detail_ttl: env_millis("PILOT_VAULT_DETAIL_TTL_MS", 60_000, 0, 3_600_000),
        };

        let worktree = WorktreeConfig {
            project_root,
            branch_prefix: env_string("PILOT_WORKTREE_PREFIX")
                .unwrap_or_else(|| DEFAULT_BRANCH_PREFIX.to_string()),
            ..WorktreeConfig::default()
        };

        Ok(Self {
            addr,
            kill_grace: env_millis("PILOT_KILL_GRACE_MS", 1_000, 100, 30_000),
            vault,
            worktree,
        })
    }
}

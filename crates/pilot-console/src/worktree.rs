//! Tool-managed git worktrees: status, diffs, squash-merge sync and discard.
//!
//! Nothing here is cached; git state changes under us whenever the user runs
//! git themselves, so every request inspects the repository again.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use axum::{
    Json, Router,
    Extension,
    extract::{Path as UrlPath, Query, State},
    routing::{get, post},
};
use pilot_process::{CommandRunner, Invocation, ProcessError};
use serde::{Deserialize, Serialize};

use crate::{
    config::WorktreeConfig,
    error::ApiError,
    request_meta::RequestMeta,
    state::AppState,
    worktree_git::{
        WorktreeFileChange, count_files_from_stat, main_repo_root, parse_base_branch,
        parse_changed_files,
    },
};

const INSPECT_TIMEOUT: Duration = Duration::from_secs(2);
const DIFF_LIST_TIMEOUT: Duration = Duration::from_secs(10);
const FILE_DIFF_TIMEOUT: Duration = Duration::from_secs(5);
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(10);
const MERGE_TIMEOUT: Duration = Duration::from_secs(30);
const COMMIT_TIMEOUT: Duration = Duration::from_secs(10);
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);
const REMOVE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorktreeStatus {
    pub active: bool,
    pub worktree_path: Option<String>,
    pub branch: Option<String>,
    pub base_branch: Option<String>,
    pub plan_slug: Option<String>,
}

impl WorktreeStatus {
    pub fn inactive() -> Self {
        Self {
            active: false,
            worktree_path: None,
            branch: None,
            base_branch: None,
            plan_slug: None,
        }
    }
}

/// A checkout on a reserved-prefix branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveWorktree {
    pub path: PathBuf,
    pub branch: String,
    pub base_branch: String,
    pub plan_slug: String,
}

impl ActiveWorktree {
    fn range(&self) -> String {
        format!("{}...{}", self.base_branch, self.branch)
    }
}

impl From<Option<ActiveWorktree>> for WorktreeStatus {
    fn from(active: Option<ActiveWorktree>) -> Self {
        match active {
            Some(wt) => Self {
                active: true,
                worktree_path: Some(wt.path.display().to_string()),
                branch: Some(wt.branch),
                base_branch: Some(wt.base_branch),
                plan_slug: Some(wt.plan_slug),
            },
            None => Self::inactive(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFiles {
    pub active: bool,
    pub files: Vec<WorktreeFileChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub file: String,
    pub diff: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub files_changed: u64,
    pub commit_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscardOutcome {
    pub success: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum WorktreeError {
    #[error("No active worktree")]
    NotActive,
    #[error("Missing file path")]
    MissingPath,
    #[error("Invalid project path")]
    InvalidProject,
    #[error("File not found in diff")]
    DiffNotFound,
    #[error("Cannot determine main repository root")]
    NoMainRoot,
    #[error("{step} failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: ProcessError,
    },
}

impl From<WorktreeError> for ApiError {
    fn from(err: WorktreeError) -> Self {
        match err {
            WorktreeError::NotActive | WorktreeError::MissingPath | WorktreeError::InvalidProject => {
                ApiError::BadRequest(err.to_string())
            }
            WorktreeError::DiffNotFound => ApiError::NotFound(err.to_string()),
            WorktreeError::NoMainRoot | WorktreeError::Step { .. } => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

pub struct WorktreeService<R> {
    runner: Arc<R>,
    config: WorktreeConfig,
}

impl<R: CommandRunner> WorktreeService<R> {
    pub fn new(runner: Arc<R>, config: WorktreeConfig) -> Self {
        Self { runner, config }
    }

    /// The configured project root, or `requested` when it names an existing
    /// absolute directory.
    pub fn resolve_project_root(&self, requested: Option<&str>) -> Result<PathBuf, WorktreeError> {
        match requested.map(str::trim).filter(|p| !p.is_empty()) {
            None => Ok(self.config.project_root.clone()),
            Some(p) => {
                let path = PathBuf::from(p);
                if path.is_absolute() && path.is_dir() {
                    Ok(path)
                } else {
                    Err(WorktreeError::InvalidProject)
                }
            }
        }
    }

    async fn git(&self, cwd: &Path, args: &[&str], timeout: Duration) -> Result<String, ProcessError> {
        let argv = std::iter::once("git").chain(args.iter().copied());
        self.runner
            .run(&Invocation::new(argv, timeout).current_dir(cwd))
            .await
    }

    /// A failed step aborts the operation; earlier steps are not undone.
    async fn step(
        &self,
        step: &'static str,
        cwd: &Path,
        args: &[&str],
        timeout: Duration,
    ) -> Result<String, WorktreeError> {
        self.git(cwd, args, timeout).await.map_err(|source| {
            tracing::warn!(step, error = %source, "worktree step failed");
            WorktreeError::Step { step, source }
        })
    }

    pub async fn active(&self, project_root: &Path) -> Option<ActiveWorktree> {
        let branch = match self
            .git(project_root, &["rev-parse", "--abbrev-ref", "HEAD"], INSPECT_TIMEOUT)
            .await
        {
            Ok(out) => out.trim().to_string(),
            Err(err) => {
                tracing::debug!(error = %err, root = %project_root.display(), "no git branch");
                return None;
            }
        };
        let plan_slug = branch.strip_prefix(self.config.branch_prefix.as_str())?.to_string();

        let mut base_branch = None;
        if let Some(main_root) = main_repo_root(project_root) {
            match self.git(&main_root, &["worktree", "list"], INSPECT_TIMEOUT).await {
                Ok(list) => base_branch = parse_base_branch(&list),
                Err(err) => tracing::debug!(error = %err, "git worktree list failed"),
            }
        }

        Some(ActiveWorktree {
            path: project_root.to_path_buf(),
            branch,
            base_branch: base_branch.unwrap_or_else(|| self.config.default_base_branch.clone()),
            plan_slug,
        })
    }

    pub async fn status(&self, project_root: &Path) -> WorktreeStatus {
        self.active(project_root).await.into()
    }

    async fn require_active(&self, project_root: &Path) -> Result<ActiveWorktree, WorktreeError> {
        self.active(project_root).await.ok_or(WorktreeError::NotActive)
    }

    pub async fn changed_files(&self, project_root: &Path) -> ChangedFiles {
        let Some(wt) = self.active(project_root).await else {
            return ChangedFiles {
                active: false,
                files: Vec::new(),
            };
        };

        let range = wt.range();
        let listed = async {
            let name_status = self
                .git(&wt.path, &["diff", "--name-status", &range], DIFF_LIST_TIMEOUT)
                .await?;
            let numstat = self
                .git(&wt.path, &["diff", "--numstat", &range], DIFF_LIST_TIMEOUT)
                .await?;
            Ok::<_, ProcessError>(parse_changed_files(&name_status, &numstat))
        };
        let files = listed.await.unwrap_or_else(|err| {
            tracing::warn!(error = %err, %range, "listing worktree changes failed");
            Vec::new()
        });

        ChangedFiles {
            active: true,
            files,
        }
    }

    pub async fn file_diff(&self, project_root: &Path, file: &str) -> Result<FileDiff, WorktreeError> {
        let wt = self.require_active(project_root).await?;
        if file.is_empty() {
            return Err(WorktreeError::MissingPath);
        }

        let diff = self
            .git(&wt.path, &["diff", &wt.range(), "--", file], FILE_DIFF_TIMEOUT)
            .await
            .map_err(|err| {
                tracing::debug!(error = %err, file, "file diff failed");
                WorktreeError::DiffNotFound
            })?;

        Ok(FileDiff {
            file: file.to_string(),
            diff,
        })
    }

    /// Squash-merge the worktree branch into its base, then remove the
    /// worktree and branch.
    ///
    /// Steps run in order and stop at the first failure with no rollback: a
    /// failed commit leaves the main checkout on the base branch with the
    /// squashed changes staged.
    pub async fn sync(&self, project_root: &Path) -> Result<SyncOutcome, WorktreeError> {
        let wt = self.require_active(project_root).await?;
        let main_root = main_repo_root(&wt.path).ok_or(WorktreeError::NoMainRoot)?;

        let root = main_root.as_path();
        self.step("git checkout", root, &["checkout", &wt.base_branch], CHECKOUT_TIMEOUT)
            .await?;
        self.step(
            "git merge --squash",
            root,
            &["merge", "--squash", &wt.branch],
            MERGE_TIMEOUT,
        )
        .await?;
        // Fixed `spec/` label, whatever the configured branch prefix.
        let message = format!("feat: implement spec/{}", wt.plan_slug);
        self.step("git commit", root, &["commit", "-m", &message], COMMIT_TIMEOUT)
            .await?;
        let commit_hash = self
            .step("git rev-parse", root, &["rev-parse", "HEAD"], QUERY_TIMEOUT)
            .await?
            .trim()
            .to_string();
        let stat = self
            .step("git diff --stat", root, &["diff", "--stat", "HEAD~1"], QUERY_TIMEOUT)
            .await?;
        let files_changed = count_files_from_stat(&stat);

        self.remove(root, &wt).await?;

        tracing::info!(
            branch = %wt.branch,
            base = %wt.base_branch,
            commit = %commit_hash,
            files_changed,
            "worktree synced"
        );
        Ok(SyncOutcome {
            success: true,
            files_changed,
            commit_hash,
        })
    }

    /// Remove the worktree and delete its branch without merging.
    pub async fn discard(&self, project_root: &Path) -> Result<DiscardOutcome, WorktreeError> {
        let wt = self.require_active(project_root).await?;
        let main_root = main_repo_root(&wt.path).ok_or(WorktreeError::NoMainRoot)?;

        self.remove(&main_root, &wt).await?;

        tracing::info!(branch = %wt.branch, "worktree discarded");
        Ok(DiscardOutcome { success: true })
    }

    async fn remove(&self, main_root: &Path, wt: &ActiveWorktree) -> Result<(), WorktreeError> {
        let path = wt.path.to_string_lossy();
        self.step(
            "git worktree remove",
            main_root,
            &["worktree", "remove", &path, "--force"],
            REMOVE_TIMEOUT,
        )
        .await?;
        self.step("git branch -D", main_root, &["branch", "-D", &wt.branch], QUERY_TIMEOUT)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub project: Option<String>,
}

pub fn routes<R: CommandRunner>() -> Router<AppState<R>> {
    Router::new()
        .route("/api/worktree/status", get(status::<R>))
        .route("/api/worktree/diff", get(changed_files::<R>))
        .route("/api/worktree/diff/", get(missing_file::<R>))
        .route("/api/worktree/diff/*file", get(file_diff::<R>))
        .route("/api/worktree/sync", post(sync::<R>))
        .route("/api/worktree/discard", post(discard::<R>))
}

async fn status<R: CommandRunner>(
    State(state): State<AppState<R>>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<WorktreeStatus>, ApiError> {
    let root = state.worktree.resolve_project_root(q.project.as_deref())?;
    Ok(Json(state.worktree.status(&root).await))
}

async fn changed_files<R: CommandRunner>(
    State(state): State<AppState<R>>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<ChangedFiles>, ApiError> {
    let root = state.worktree.resolve_project_root(q.project.as_deref())?;
    Ok(Json(state.worktree.changed_files(&root).await))
}

async fn missing_file<R: CommandRunner>(
    State(state): State<AppState<R>>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<FileDiff>, ApiError> {
    let root = state.worktree.resolve_project_root(q.project.as_deref())?;
    Ok(Json(state.worktree.file_diff(&root, "").await?))
}

async fn file_diff<R: CommandRunner>(
    State(state): State<AppState<R>>,
    UrlPath(file): UrlPath<String>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<FileDiff>, ApiError> {
    let root = state.worktree.resolve_project_root(q.project.as_deref())?;
    Ok(Json(state.worktree.file_diff(&root, &file).await?))
}

async fn sync<R: CommandRunner>(
    State(state): State<AppState<R>>,
    Extension(meta): Extension<RequestMeta>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<SyncOutcome>, ApiError> {
    let root = state.worktree.resolve_project_root(q.project.as_deref())?;
    let outcome = state.worktree.sync(&root).await.inspect_err(|err| {
        tracing::error!(
            request_id = %meta.request_id,
            root = %root.display(),
            error = %err,
            "worktree sync failed"
        );
    })?;
    Ok(Json(outcome))
}

async fn discard<R: CommandRunner>(
    State(state): State<AppState<R>>,
    Extension(meta): Extension<RequestMeta>,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<DiscardOutcome>, ApiError> {
    let root = state.worktree.resolve_project_root(q.project.as_deref())?;
    let outcome = state.worktree.discard(&root).await.inspect_err(|err| {
        tracing::error!(
            request_id = %meta.request_id,
            root = %root.display(),
            error = %err,
            "worktree discard failed"
        );
    })?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedRunner, exited};

    fn service(runner: ScriptedRunner, root: &Path) -> (Arc<ScriptedRunner>, WorktreeService<ScriptedRunner>) {
        let runner = Arc::new(runner);
        let config = WorktreeConfig {
            project_root: root.to_path_buf(),
            ..WorktreeConfig::default()
        };
        (runner.clone(), WorktreeService::new(runner, config))
    }

    fn args_are(args: &[String], expected: &[&str]) -> bool {
        args.len() == expected.len() && args.iter().zip(expected).all(|(a, e)| a == e)
    }

    /// Answers git as if `branch` were checked out in a main repository on `develop`.
    fn git_on(branch: &'static str) -> ScriptedRunner {
        ScriptedRunner::new(move |args| {
            if args_are(args, &["rev-parse", "--abbrev-ref", "HEAD"]) {
                Ok(format!("{branch}\n"))
            } else if args_are(args, &["worktree", "list"]) {
                Ok("/repo      1a2b3c4 [develop]\n/repo-wt   5d6e7f8 [spec/login]\n".into())
            } else if args.first().map(String::as_str) == Some("diff") && args.contains(&"--name-status".to_string()) {
                Ok("A\tsrc/new.rs\nM\tsrc/lib.rs\n".into())
            } else if args.first().map(String::as_str) == Some("diff") && args.contains(&"--numstat".to_string()) {
                Ok("12\t0\tsrc/new.rs\n3\t1\tsrc/lib.rs\n".into())
            } else if args_are(args, &["rev-parse", "HEAD"]) {
                Ok("deadbeef\n".into())
            } else if args.first().map(String::as_str) == Some("diff") && args.contains(&"--stat".to_string()) {
                Ok(" src/new.rs | 12 ++++\n src/lib.rs | 4 +++-\n 2 files changed, 15 insertions(+), 1 deletion(-)\n".into())
            } else if args.first().map(String::as_str) == Some("diff") {
                Ok("@@ -0,0 +1 @@\n+fn main() {}\n".into())
            } else {
                Ok(String::new())
            }
        })
    }

    fn plain_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        dir
    }

    #[tokio::test]
    async fn inactive_outside_prefixed_branch() {
        let dir = plain_repo();
        let (_, svc) = service(git_on("main"), dir.path());
        assert_eq!(svc.status(dir.path()).await, WorktreeStatus::inactive());

        let (_, svc) = service(ScriptedRunner::new(|_| Err(exited("git", 128, "not a git repository"))), dir.path());
        assert_eq!(svc.status(dir.path()).await, WorktreeStatus::inactive());
    }

    #[tokio::test]
    async fn active_status_reads_base_branch_from_worktree_list() {
        let dir = plain_repo();
        let (runner, svc) = service(git_on("spec/login"), dir.path());

        let status = svc.status(dir.path()).await;
        assert!(status.active);
        assert_eq!(status.branch.as_deref(), Some("spec/login"));
        assert_eq!(status.base_branch.as_deref(), Some("develop"));
        assert_eq!(status.plan_slug.as_deref(), Some("login"));
        assert_eq!(status.worktree_path, Some(dir.path().display().to_string()));

        let calls = runner.calls();
        assert!(calls.iter().all(|c| c.program() == "git"));
        assert!(calls.iter().all(|c| c.cwd.as_deref() == Some(dir.path())));
    }

    #[tokio::test]
    async fn base_branch_defaults_to_main() {
        let dir = plain_repo();
        let runner = ScriptedRunner::new(|args| {
            if args_are(args, &["rev-parse", "--abbrev-ref", "HEAD"]) {
                Ok("spec/x\n".into())
            } else {
                Err(exited("git", 1, "boom"))
            }
        });
        let (_, svc) = service(runner, dir.path());
        assert_eq!(svc.status(dir.path()).await.base_branch.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn changed_files_use_three_dot_range() {
        let dir = plain_repo();
        let (runner, svc) = service(git_on("spec/login"), dir.path());

        let changed = svc.changed_files(dir.path()).await;
        assert!(changed.active);
        assert_eq!(changed.files.len(), 2);
        assert_eq!(changed.files[0].path, "src/new.rs");
        assert_eq!(changed.files[0].additions, 12);
        assert_eq!(runner.calls_with("develop...spec/login"), 2);
    }

    #[tokio::test]
    async fn changed_files_inactive_is_empty() {
        let dir = plain_repo();
        let (runner, svc) = service(git_on("main"), dir.path());
        let changed = svc.changed_files(dir.path()).await;
        assert!(!changed.active);
        assert!(changed.files.is_empty());
        assert_eq!(runner.call_count(), 1);
    }

    #[tokio::test]
    async fn file_diff_errors() {
        let dir = plain_repo();
        let (_, svc) = service(git_on("main"), dir.path());
        assert!(matches!(
            svc.file_diff(dir.path(), "src/lib.rs").await,
            Err(WorktreeError::NotActive)
        ));

        let (_, svc) = service(git_on("spec/login"), dir.path());
        assert!(matches!(svc.file_diff(dir.path(), "").await, Err(WorktreeError::MissingPath)));

        let diff = svc.file_diff(dir.path(), "src/new.rs").await.unwrap();
        assert_eq!(diff.file, "src/new.rs");
        assert!(diff.diff.contains("fn main"));

        let runner = ScriptedRunner::new(|args| {
            if args_are(args, &["rev-parse", "--abbrev-ref", "HEAD"]) {
                Ok("spec/login\n".into())
            } else if args.first().map(String::as_str) == Some("diff") {
                Err(exited("git", 128, "bad revision"))
            } else {
                Ok(String::new())
            }
        });
        let (_, svc) = service(runner, dir.path());
        assert!(matches!(
            svc.file_diff(dir.path(), "nope.rs").await,
            Err(WorktreeError::DiffNotFound)
        ));
    }

    #[tokio::test]
    async fn sync_runs_steps_in_main_root() {
        let dir = tempfile::tempdir().unwrap();
        let main = dir.path().join("repo");
        let wt = dir.path().join("repo-wt");
        std::fs::create_dir_all(main.join(".git/worktrees/login")).unwrap();
        std::fs::create_dir_all(&wt).unwrap();
        std::fs::write(
            wt.join(".git"),
            format!("gitdir: {}\n", main.join(".git/worktrees/login").display()),
        )
        .unwrap();

        let (runner, svc) = service(git_on("spec/login"), &wt);
        let outcome = svc.sync(&wt).await.unwrap();
        assert_eq!(
            outcome,
            SyncOutcome {
                success: true,
                files_changed: 2,
                commit_hash: "deadbeef".into(),
            }
        );

        let steps: Vec<Vec<String>> = runner
            .calls()
            .into_iter()
            .filter(|c| c.cwd.as_deref() == Some(main.as_path()))
            .map(|c| c.args().to_vec())
            .filter(|a| a.first().map(String::as_str) != Some("worktree") || a.get(1).map(String::as_str) != Some("list"))
            .collect();
        let wt_path = wt.to_string_lossy().to_string();
        let expected: Vec<Vec<&str>> = vec![
            vec!["checkout", "develop"],
            vec!["merge", "--squash", "spec/login"],
            vec!["commit", "-m", "feat: implement spec/login"],
            vec!["rev-parse", "HEAD"],
            vec!["diff", "--stat", "HEAD~1"],
            vec!["worktree", "remove", wt_path.as_str(), "--force"],
            vec!["branch", "-D", "spec/login"],
        ];
        assert_eq!(steps, expected);
    }

    #[tokio::test]
    async fn commit_message_keeps_spec_label_under_custom_prefix() {
        let dir = plain_repo();
        let runner = Arc::new(git_on("plan/login"));
        let config = WorktreeConfig {
            project_root: dir.path().to_path_buf(),
            branch_prefix: "plan/".into(),
            ..WorktreeConfig::default()
        };
        let svc = WorktreeService::new(runner.clone(), config);

        svc.sync(dir.path()).await.unwrap();
        let commit = runner
            .calls()
            .into_iter()
            .find(|c| c.args().first().map(String::as_str) == Some("commit"))
            .unwrap();
        assert_eq!(commit.args(), ["commit", "-m", "feat: implement spec/login"]);
        assert_eq!(runner.calls_with("plan/login"), 2);
    }

    #[tokio::test]
    async fn sync_stops_at_first_failed_step() {
        let dir = plain_repo();
        let runner = ScriptedRunner::new(|args| {
            if args_are(args, &["rev-parse", "--abbrev-ref", "HEAD"]) {
                Ok("spec/login\n".into())
            } else if args.first().map(String::as_str) == Some("merge") {
                Err(exited("git", 1, "CONFLICT (content)"))
            } else {
                Ok(String::new())
            }
        });
        let (runner, svc) = service(runner, dir.path());

        let err = svc.sync(dir.path()).await.unwrap_err();
        assert!(matches!(err, WorktreeError::Step { step: "git merge --squash", .. }));
        assert_eq!(runner.calls_with("commit"), 0);
        assert_eq!(runner.calls_with("-D"), 0);

        let api: ApiError = err.into();
        assert_eq!(api.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn discard_removes_worktree_and_branch() {
        let dir = plain_repo();
        let (runner, svc) = service(git_on("spec/login"), dir.path());
        assert_eq!(svc.discard(dir.path()).await.unwrap(), DiscardOutcome { success: true });
        assert_eq!(runner.calls_with("remove"), 1);
        assert_eq!(runner.calls_with("-D"), 1);
        assert_eq!(runner.calls_with("--squash"), 0);

        let (_, svc) = service(git_on("main"), dir.path());
        assert!(matches!(svc.discard(dir.path()).await, Err(WorktreeError::NotActive)));
    }

    #[test]
    fn project_override_must_be_existing_absolute_dir() {
        let dir = plain_repo();
        let (_, svc) = service(git_on("main"), dir.path());

        assert_eq!(svc.resolve_project_root(None).unwrap(), dir.path());
        assert_eq!(svc.resolve_project_root(Some("  ")).unwrap(), dir.path());

        let other = tempfile::tempdir().unwrap();
        let requested = other.path().to_string_lossy().to_string();
        assert_eq!(svc.resolve_project_root(Some(&requested)).unwrap(), other.path());

        for bad in ["relative/dir", "/definitely/not/here/pilot"] {
            assert!(matches!(
                svc.resolve_project_root(Some(bad)),
                Err(WorktreeError::InvalidProject)
            ));
        }
    }

    #[test]
    fn error_statuses() {
        use axum::http::StatusCode;
        let cases = [
            (WorktreeError::NotActive, StatusCode::BAD_REQUEST),
            (WorktreeError::MissingPath, StatusCode::BAD_REQUEST),
            (WorktreeError::InvalidProject, StatusCode::BAD_REQUEST),
            (WorktreeError::DiffNotFound, StatusCode::NOT_FOUND),
            (WorktreeError::NoMainRoot, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, code) in cases {
            assert_eq!(ApiError::from(err).status(), code);
        }
    }
}

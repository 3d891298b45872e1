//! Parsing of `git` output and `.git` layout for the worktree endpoints.

use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeFileChange {
    pub path: String,
    /// First letter of the `--name-status` code (`A`, `M`, `D`, `R`, ...).
    pub status: String,
    pub additions: u64,
    pub deletions: u64,
}

/// Join `git diff --name-status` with `git diff --numstat` output.
///
/// Entries come from the name-status listing, in its order; renames and
/// copies report their destination path.
pub fn parse_changed_files(name_status: &str, numstat: &str) -> Vec<WorktreeFileChange> {
    let mut stats: HashMap<&str, (u64, u64)> = HashMap::new();
    for line in numstat.lines().filter(|l| !l.trim().is_empty()) {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() >= 3 {
            // Binary files show `-` for both counts.
            let additions = parts[0].trim().parse().unwrap_or(0);
            let deletions = parts[1].trim().parse().unwrap_or(0);
            stats.insert(parts[2], (additions, deletions));
        }
    }

    let mut files = Vec::new();
    for line in name_status.lines().filter(|l| !l.trim().is_empty()) {
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 2 {
            continue;
        }
        let path = parts[parts.len() - 1];
        let status = parts[0].chars().next().map(String::from).unwrap_or_default();
        let (additions, deletions) = stats.get(path).copied().unwrap_or((0, 0));
        files.push(WorktreeFileChange {
            path: path.to_string(),
            status,
            additions,
            deletions,
        });
    }
    files
}

/// Number of files from the summary line of `git diff --stat`
/// (`N file(s) changed, ...`). Zero when there is no summary.
pub fn count_files_from_stat(stat_output: &str) -> u64 {
    let Some(last) = stat_output.trim().lines().last() else {
        return 0;
    };
    let tokens: Vec<&str> = last.split_whitespace().collect();
    tokens
        .windows(3)
        .find_map(|w| {
            let n = w[0].parse::<u64>().ok()?;
            let noun = matches!(w[1], "file" | "files");
            (noun && w[2].starts_with("changed")).then_some(n)
        })
        .unwrap_or(0)
}

/// Branch of the main checkout: the first `[...]` on the first line of
/// `git worktree list`.
pub fn parse_base_branch(worktree_list: &str) -> Option<String> {
    let first = worktree_list.lines().next()?;
    let start = first.find('[')? + 1;
    let len = first[start..].find(']')?;
    let branch = &first[start..start + len];
    (!branch.is_empty()).then(|| branch.to_string())
}

/// Root of the main repository that `project_root` belongs to.
///
/// A linked worktree has a `.git` file reading `gitdir: <main>/.git/worktrees/<name>`;
/// the main root is two levels above that gitdir, minus the `.git` component.
/// Anything else (a `.git` directory, no `.git`, unreadable file) means the
/// project root is itself the main root.
pub fn main_repo_root(project_root: &Path) -> Option<PathBuf> {
    let Ok(content) = std::fs::read_to_string(project_root.join(".git")) else {
        return Some(project_root.to_path_buf());
    };
    let Some(gitdir) = content.trim().strip_prefix("gitdir:") else {
        return Some(project_root.to_path_buf());
    };

    let main_git_dir = normalize_lexically(&project_root.join(gitdir.trim()).join("..").join(".."));
    main_git_dir.parent().map(Path::to_path_buf)
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_files_join_name_status_and_numstat() {
        let name_status = "A\tsrc/new-file.ts\nM\tsrc/existing.ts\nD\tsrc/removed.ts\n";
        let numstat = "50\t0\tsrc/new-file.ts\n10\t5\tsrc/existing.ts\n0\t30\tsrc/removed.ts\n";

        let files = parse_changed_files(name_status, numstat);
        assert_eq!(
            files,
            vec![
                WorktreeFileChange {
                    path: "src/new-file.ts".into(),
                    status: "A".into(),
                    additions: 50,
                    deletions: 0,
                },
                WorktreeFileChange {
                    path: "src/existing.ts".into(),
                    status: "M".into(),
                    additions: 10,
                    deletions: 5,
                },
                WorktreeFileChange {
                    path: "src/removed.ts".into(),
                    status: "D".into(),
                    additions: 0,
                    deletions: 30,
                },
            ]
        );
    }

    #[test]
    fn single_added_file() {
        let files = parse_changed_files("A\tfile.ts\n", "5\t2\tfile.ts\n");
        assert_eq!(
            files,
            vec![WorktreeFileChange {
                path: "file.ts".into(),
                status: "A".into(),
                additions: 5,
                deletions: 2,
            }]
        );
    }

    #[test]
    fn empty_output_gives_no_files() {
        assert!(parse_changed_files("", "").is_empty());
        assert!(parse_changed_files("\n\n", "\n").is_empty());
    }

    #[test]
    fn missing_numstat_defaults_to_zero() {
        let files = parse_changed_files("A\tsrc/new-file.ts\n", "");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].additions, 0);
        assert_eq!(files[0].deletions, 0);
    }

    #[test]
    fn renames_report_new_path() {
        let files = parse_changed_files("R100\tsrc/old.ts\tsrc/new.ts\n", "0\t0\tsrc/new.ts\n");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].status, "R");
        assert_eq!(files[0].path, "src/new.ts");
    }

    #[test]
    fn binary_numstat_counts_as_zero() {
        let files = parse_changed_files("M\tlogo.png\n", "-\t-\tlogo.png\n");
        assert_eq!(files[0].additions, 0);
        assert_eq!(files[0].deletions, 0);
    }

    #[test]
    fn stat_summary_counts() {
        assert_eq!(count_files_from_stat(""), 0);
        assert_eq!(
            count_files_from_stat(
                " src/main.ts | 10 ++++\n src/util.ts | 5 ++---\n 2 files changed, 12 insertions(+), 3 deletions(-)\n"
            ),
            2
        );
        assert_eq!(
            count_files_from_stat(" src/main.ts | 10 ++++\n 1 file changed, 10 insertions(+)\n"),
            1
        );
        assert_eq!(count_files_from_stat(" src/main.ts | 10 ++++\n"), 0);
    }

    #[test]
    fn base_branch_from_worktree_list() {
        let list = "/home/me/repo        1a2b3c4 [main]\n/home/me/repo-wt     5d6e7f8 [spec/login]\n";
        assert_eq!(parse_base_branch(list).as_deref(), Some("main"));
        assert_eq!(parse_base_branch("/repo 1a2b3c4 (detached HEAD)\n"), None);
        assert_eq!(parse_base_branch(""), None);
    }

    #[test]
    fn main_root_of_plain_checkout_is_itself() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        assert_eq!(main_repo_root(dir.path()), Some(dir.path().to_path_buf()));

        let bare = tempfile::tempdir().unwrap();
        assert_eq!(main_repo_root(bare.path()), Some(bare.path().to_path_buf()));
    }

    #[test]
    fn main_root_of_linked_worktree_follows_gitdir() {
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
        assert_eq!(main_repo_root(&wt), Some(main.clone()));

        std::fs::write(wt.join(".git"), "gitdir: ../repo/.git/worktrees/login\n").unwrap();
        assert_eq!(main_repo_root(&wt), Some(main));
    }

    #[test]
    fn lexical_normalization() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/./c/../../d")),
            PathBuf::from("/a/d")
        );
        assert_eq!(normalize_lexically(Path::new("/../x")), PathBuf::from("/x"));
        assert_eq!(normalize_lexically(Path::new("../../x")), PathBuf::from("../../x"));
    }
}

//! Staging and committing accepted artifacts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use aoc_core::{
    AoCProblem, CommitBatch, CommitId, FileMode, FileToCommit, GeneratedImplementation,
    GeneratedUnitTests, Persistence, PersistenceError, ProblemIdentity,
};

pub const SOLUTION_FILE: &str = "solution.py";
pub const TESTS_FILE: &str = "tests.py";

/// Builds commit batches and hands them to persistence, one commit per
/// identity at a time.
pub struct CommitStager {
    persistence: Arc<dyn Persistence>,
    mode: FileMode,
    locks: Mutex<HashMap<ProblemIdentity, Arc<tokio::sync::Mutex<()>>>>,
}

impl CommitStager {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self {
            persistence,
            mode: FileMode::Create,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Stage files as `Overwrite` instead of `Create`.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.mode = if overwrite {
            FileMode::Overwrite
        } else {
            FileMode::Create
        };
        self
    }

    /// Always exactly the implementation and its tests, under the
    /// identity's artifact directory.
    pub fn stage(
        &self,
        problem: &AoCProblem,
        implementation: &GeneratedImplementation,
        tests: &GeneratedUnitTests,
    ) -> CommitBatch {
        let dir = problem.identity.artifact_dir();
        CommitBatch {
            identity: problem.identity,
            message: format!("Add solution for {}: {}", problem.identity, problem.title),
            files: vec![
                FileToCommit {
                    path: format!("{}/{}", dir, SOLUTION_FILE),
                    content: implementation.source.clone(),
                    mode: self.mode,
                },
                FileToCommit {
                    path: format!("{}/{}", dir, TESTS_FILE),
                    content: tests.source.clone(),
                    mode: self.mode,
                },
            ],
        }
    }

    pub async fn commit(&self, batch: &CommitBatch) -> Result<CommitId, PersistenceError> {
        let lock = self.lock_for(batch.identity);
        let _guard = lock.lock().await;
        debug!(event = "stager.commit", identity = %batch.identity, files = batch.files.len());
        self.persistence.commit(batch).await
    }

    fn lock_for(&self, identity: ProblemIdentity) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(identity).or_default().clone()
    }
}

/// Commits batches to a git working tree.
///
/// Every identity shares one index, so whole batches are applied one at a
/// time, and each commit records only its own paths. Changes the user
/// staged beforehand stay staged and out of the commit.
pub struct GitPersistence {
    repo_root: PathBuf,
    index: tokio::sync::Mutex<()>,
}

impl GitPersistence {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            index: tokio::sync::Mutex::new(()),
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    async fn git_output(&self, args: &[&str]) -> Result<std::process::Output, PersistenceError> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PersistenceError::Git(format!("failed to run git: {e}")))
    }

    async fn git(&self, args: &[&str]) -> Result<String, PersistenceError> {
        let output = self.git_output(args).await?;
        if !output.status.success() {
            let mut message = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if message.is_empty() {
                message = String::from_utf8_lossy(&output.stdout).trim().to_string();
            }
            return Err(PersistenceError::Git(format!("git {}: {}", args.join(" "), message)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn write_all(
        &self,
        batch: &CommitBatch,
        previous: &mut Vec<(PathBuf, Option<String>)>,
    ) -> Result<(), PersistenceError> {
        for file in &batch.files {
            let path = self.repo_root.join(&file.path);
            let before = match tokio::fs::read_to_string(&path).await {
                Ok(content) => Some(content),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            };
            previous.push((path.clone(), before));

            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &file.content).await?;
        }
        Ok(())
    }

    async fn record(&self, batch: &CommitBatch) -> Result<CommitId, PersistenceError> {
        let paths: Vec<&str> = batch.files.iter().map(|f| f.path.as_str()).collect();

        let mut add: Vec<&str> = vec!["add", "--"];
        add.extend(&paths);
        self.git(&add).await?;

        // Exits 0 only when the staged paths match HEAD.
        let mut diff: Vec<&str> = vec!["diff", "--cached", "--quiet", "--"];
        diff.extend(&paths);
        if self.git_output(&diff).await?.status.success() {
            return Err(PersistenceError::Git(format!(
                "nothing to commit for {}",
                batch.identity
            )));
        }

        let mut commit: Vec<&str> =
            vec!["commit", "-q", "--only", "-m", batch.message.as_str(), "--"];
        commit.extend(&paths);
        self.git(&commit).await?;
        let head = self.git(&["rev-parse", "HEAD"]).await?;
        Ok(CommitId(head))
    }

    async fn rollback(&self, batch: &CommitBatch, previous: Vec<(PathBuf, Option<String>)>) {
        let mut reset: Vec<&str> = vec!["reset", "-q", "--"];
        reset.extend(batch.files.iter().map(|f| f.path.as_str()));
        if let Err(e) = self.git(&reset).await {
            debug!(event = "git.unstage_failed", error = %e);
        }

        for (path, before) in previous {
            let restored = match before {
                Some(content) => tokio::fs::write(&path, content).await,
                None => tokio::fs::remove_file(&path).await,
            };
            if let Err(e) = restored {
                warn!(event = "git.rollback_failed", path = %path.display(), error = %e);
            }
        }
    }
}

#[async_trait]
impl Persistence for GitPersistence {
    async fn commit(&self, batch: &CommitBatch) -> Result<CommitId, PersistenceError> {
        if batch.files.is_empty() {
            return Err(PersistenceError::Rejected("empty batch".into()));
        }
        let _index = self.index.lock().await;

        for file in &batch.files {
            let path = self.repo_root.join(&file.path);
            if file.mode == FileMode::Create && tokio::fs::try_exists(&path).await? {
                return Err(PersistenceError::AlreadyExists(file.path.clone()));
            }
        }

        let mut previous = Vec::with_capacity(batch.files.len());
        let result = match self.write_all(batch, &mut previous).await {
            Ok(()) => self.record(batch).await,
            Err(e) => Err(e),
        };

        if result.is_err() {
            self.rollback(batch, previous).await;
        }
        result
    }
}

/// Keeps batches in memory; used by `--dry-run`.
#[derive(Default)]
pub struct DryRunPersistence {
    batches: Mutex<Vec<CommitBatch>>,
}

impl DryRunPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<CommitBatch> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Persistence for DryRunPersistence {
    async fn commit(&self, batch: &CommitBatch) -> Result<CommitId, PersistenceError> {
        let mut batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        batches.push(batch.clone());
        Ok(CommitId(format!("dry-run-{}", batches.len())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aoc_core::{Entrypoint, ProblemPart};
    use aoc_sim::MemoryPersistence;
    use std::time::Duration;

    fn problem(day: u8) -> AoCProblem {
        AoCProblem {
            identity: ProblemIdentity::new(2024, day, ProblemPart::One).unwrap(),
            title: "Historian Hysteria".into(),
            statement: String::new(),
            preamble: String::new(),
            url: String::new(),
        }
    }

    fn artifacts() -> (GeneratedImplementation, GeneratedUnitTests) {
        (
            GeneratedImplementation::new("def solve(s):\n    return 1\n", Entrypoint::new("solve")),
            GeneratedUnitTests {
                source: "from solution import solve\n".into(),
            },
        )
    }

    #[test]
    fn test_stage_produces_two_files() {
        let stager = CommitStager::new(Arc::new(MemoryPersistence::new()));
        let (implementation, tests) = artifacts();
        let batch = stager.stage(&problem(1), &implementation, &tests);

        assert_eq!(batch.files.len(), 2);
        assert_eq!(batch.files[0].path, "advent_of_code/year2024/day1/part1/solution.py");
        assert_eq!(batch.files[1].path, "advent_of_code/year2024/day1/part1/tests.py");
        assert!(batch.files.iter().all(|f| f.mode == FileMode::Create));
        assert_eq!(batch.files[0].content, implementation.source);
        assert!(batch.message.contains("2024/day01/part1"));

        let overwrite = CommitStager::new(Arc::new(MemoryPersistence::new())).with_overwrite(true);
        let batch = overwrite.stage(&problem(1), &implementation, &tests);
        assert!(batch.files.iter().all(|f| f.mode == FileMode::Overwrite));
    }

    #[tokio::test]
    async fn test_same_identity_commits_are_serialized() {
        let persistence = Arc::new(MemoryPersistence::new().with_delay(Duration::from_millis(20)));
        let stager = Arc::new(CommitStager::new(persistence.clone()));
        let (implementation, tests) = artifacts();
        let batch = stager.stage(&problem(1), &implementation, &tests);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stager = stager.clone();
                let batch = batch.clone();
                tokio::spawn(async move { stager.commit(&batch).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(persistence.batches().len(), 4);
        assert_eq!(persistence.max_in_flight_same_identity(), 1);
    }

    #[tokio::test]
    async fn test_persistence_error_propagates() {
        let stager = CommitStager::new(Arc::new(MemoryPersistence::failing(
            PersistenceError::Rejected("read-only".into()),
        )));
        let (implementation, tests) = artifacts();
        let batch = stager.stage(&problem(2), &implementation, &tests);
        assert_eq!(
            stager.commit(&batch).await,
            Err(PersistenceError::Rejected("read-only".into()))
        );
    }

    #[tokio::test]
    async fn test_dry_run_records_batches() {
        let persistence = Arc::new(DryRunPersistence::new());
        let stager = CommitStager::new(persistence.clone());
        let (implementation, tests) = artifacts();
        let batch = stager.stage(&problem(3), &implementation, &tests);

        let id = stager.commit(&batch).await.unwrap();
        assert_eq!(id, CommitId("dry-run-1".into()));
        assert_eq!(persistence.batches(), vec![batch]);
    }

    async fn git_ok(dir: &Path, args: &[&str]) -> Option<()> {
        Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .await
            .ok()
            .filter(|o| o.status.success())
            .map(|_| ())
    }

    async fn git_repo() -> Option<tempfile::TempDir> {
        let dir = tempfile::tempdir().ok()?;
        git_ok(dir.path(), &["init", "-q"]).await?;
        git_ok(dir.path(), &["config", "user.email", "aoc@example.com"]).await?;
        git_ok(dir.path(), &["config", "user.name", "aoc"]).await?;
        git_ok(dir.path(), &["config", "commit.gpgsign", "false"]).await?;
        Some(dir)
    }

    #[tokio::test]
    async fn test_git_commit_writes_and_records() {
        let Some(repo) = git_repo().await else {
            eprintln!("git not available; skipping");
            return;
        };
        let git = GitPersistence::new(repo.path());
        let stager = CommitStager::new(Arc::new(GitPersistence::new(repo.path())));
        let (implementation, tests) = artifacts();
        let batch = stager.stage(&problem(4), &implementation, &tests);

        let id = stager.commit(&batch).await.unwrap();
        assert_eq!(id.0.len(), 40);
        assert_eq!(git.git(&["rev-parse", "HEAD"]).await.unwrap(), id.0);

        let written = std::fs::read_to_string(repo.path().join(&batch.files[0].path)).unwrap();
        assert_eq!(written, implementation.source);
        assert_eq!(git.git(&["status", "--porcelain"]).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_git_create_refuses_existing_files() {
        let Some(repo) = git_repo().await else {
            eprintln!("git not available; skipping");
            return;
        };
        let stager = CommitStager::new(Arc::new(GitPersistence::new(repo.path())));
        let (implementation, tests) = artifacts();
        let batch = stager.stage(&problem(5), &implementation, &tests);
        stager.commit(&batch).await.unwrap();

        let changed = GeneratedImplementation::new("def solve(s):\n    return 2\n", Entrypoint::new("solve"));
        let again = stager.stage(&problem(5), &changed, &tests);
        assert!(matches!(
            stager.commit(&again).await,
            Err(PersistenceError::AlreadyExists(path)) if path.ends_with("solution.py")
        ));

        let on_disk = std::fs::read_to_string(repo.path().join(&batch.files[0].path)).unwrap();
        assert_eq!(on_disk, implementation.source);
    }

    fn lines(text: &str) -> Vec<String> {
        let mut lines: Vec<String> = text
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        lines.sort();
        lines
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_git_concurrent_identities_commit_only_their_own_files() {
        let Some(repo) = git_repo().await else {
            eprintln!("git not available; skipping");
            return;
        };
        let git = GitPersistence::new(repo.path());
        let stager = Arc::new(CommitStager::new(Arc::new(GitPersistence::new(repo.path()))));
        let (implementation, tests) = artifacts();

        let handles: Vec<_> = (1..=8)
            .map(|day| {
                let stager = stager.clone();
                let batch = stager.stage(&problem(day), &implementation, &tests);
                tokio::spawn(async move {
                    let result = stager.commit(&batch).await;
                    (batch, result)
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        let tree = lines(&git.git(&["ls-tree", "-r", "--name-only", "HEAD"]).await.unwrap());
        for (batch, result) in &results {
            let mut own: Vec<String> = batch.files.iter().map(|f| f.path.clone()).collect();
            own.sort();
            match result {
                Ok(id) => {
                    let shown = git
                        .git(&["show", "--name-only", "--format=", &id.0])
                        .await
                        .unwrap();
                    assert_eq!(lines(&shown), own, "{}", batch.identity);
                }
                Err(e) => {
                    assert!(
                        own.iter().all(|path| !tree.contains(path)),
                        "{} failed with {} but is in HEAD",
                        batch.identity,
                        e
                    );
                }
            }
        }

        assert!(results.iter().all(|(_, result)| result.is_ok()));
        assert_eq!(git.git(&["rev-list", "--count", "HEAD"]).await.unwrap(), "8");
        assert_eq!(tree.len(), 16);
        assert_eq!(git.git(&["status", "--porcelain"]).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_git_commit_leaves_user_staged_changes_alone() {
        let Some(repo) = git_repo().await else {
            eprintln!("git not available; skipping");
            return;
        };
        let git = GitPersistence::new(repo.path());
        let stager = CommitStager::new(Arc::new(GitPersistence::new(repo.path())));
        let (implementation, tests) = artifacts();
        stager
            .commit(&stager.stage(&problem(10), &implementation, &tests))
            .await
            .unwrap();

        std::fs::write(repo.path().join("notes.txt"), "scratch\n").unwrap();
        git.git(&["add", "notes.txt"]).await.unwrap();

        let batch = stager.stage(&problem(11), &implementation, &tests);
        let id = stager.commit(&batch).await.unwrap();

        let shown = git.git(&["show", "--name-only", "--format=", &id.0]).await.unwrap();
        assert!(!shown.contains("notes.txt"));
        assert_eq!(lines(&shown).len(), 2);
        assert_eq!(
            git.git(&["diff", "--cached", "--name-only"]).await.unwrap(),
            "notes.txt"
        );
    }

    #[tokio::test]
    async fn test_git_failure_leaves_no_partial_batch() {
        let Some(repo) = git_repo().await else {
            eprintln!("git not available; skipping");
            return;
        };
        let git = GitPersistence::new(repo.path());
        // Nothing to commit: identical overwrite makes `git commit` fail.
        let stager = CommitStager::new(Arc::new(GitPersistence::new(repo.path()))).with_overwrite(true);
        let (implementation, tests) = artifacts();
        let batch = stager.stage(&problem(6), &implementation, &tests);
        let first = stager.commit(&batch).await.unwrap();

        assert!(matches!(stager.commit(&batch).await, Err(PersistenceError::Git(_))));
        assert_eq!(git.git(&["rev-parse", "HEAD"]).await.unwrap(), first.0);

        let plain = tempfile::tempdir().unwrap();
        let fresh = stager.stage(&problem(7), &implementation, &tests);
        let not_a_repo = GitPersistence::new(plain.path());
        assert!(matches!(not_a_repo.commit(&fresh).await, Err(PersistenceError::Git(_))));
        assert!(!plain.path().join(&fresh.files[0].path).exists());
        assert!(!plain.path().join(&fresh.files[1].path).exists());
    }
}

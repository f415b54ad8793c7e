//! Version-control port and its libgit2 implementation.
//!
//! The orchestrator only sees [`Repository`] and [`RepositoryProvider`]; the
//! [`Git2Provider`] wires them to `git2`.

use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{BranchType, ErrorCode, IndexAddOption, Oid, RepositoryInitOptions, StatusOptions};
use tracing::{debug, info, instrument};

use crate::error::RepoError;

/// Working copy operations the orchestrator needs.
pub trait Repository {
    /// Stage `paths` (files or directories) and commit them on `HEAD`.
    ///
    /// Returns `false` when the staged tree equals `HEAD`'s and no commit
    /// was made.
    fn stage_and_commit(&mut self, paths: &[PathBuf], message: &str) -> Result<bool, RepoError>;

    /// Create `name` at `HEAD` unless it exists, then check it out.
    fn create_and_checkout_branch(&mut self, name: &str) -> Result<(), RepoError>;

    /// Tracked files differ from `HEAD`. Untracked files do not count.
    fn is_dirty(&self) -> Result<bool, RepoError>;

    /// Local branch names.
    fn list_branches(&self) -> Result<Vec<String>, RepoError>;

    fn checkout(&mut self, branch: &str) -> Result<(), RepoError>;

    /// Merge `branch` into the current branch as one commit whose parents are
    /// the tips of `parents`, in order. Conflicts abort without a commit.
    fn merge(&mut self, branch: &str, parents: &[&str], message: &str) -> Result<(), RepoError>;

    /// `branch`'s tip is reachable from `into`'s tip.
    fn is_merged(&self, branch: &str, into: &str) -> Result<bool, RepoError>;
}

/// Opens an existing working copy or initializes a new one.
pub trait RepositoryProvider {
    fn init_or_load(&self, path: &Path) -> Result<Box<dyn Repository>, RepoError>;
}

// ---------------------------------------------------------------------------
// git2 implementation
// ---------------------------------------------------------------------------

const FALLBACK_NAME: &str = "doclib";
const FALLBACK_EMAIL: &str = "doclib@localhost";

/// Production provider. New repositories start on `main_branch`.
#[derive(Debug, Clone)]
pub struct Git2Provider {
    main_branch: String,
}

impl Git2Provider {
    pub fn new(main_branch: impl Into<String>) -> Self {
        Self {
            main_branch: main_branch.into(),
        }
    }
}

impl RepositoryProvider for Git2Provider {
    #[instrument(skip(self), level = "debug")]
    fn init_or_load(&self, path: &Path) -> Result<Box<dyn Repository>, RepoError> {
        let repo = match git2::Repository::open(path) {
            Ok(repo) => {
                debug!("opened repository at {}", path.display());
                repo
            }
            Err(e) if e.code() == ErrorCode::NotFound => {
                std::fs::create_dir_all(path).map_err(|source| RepoError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let mut opts = RepositoryInitOptions::new();
                opts.initial_head(&self.main_branch);
                let repo = git2::Repository::init_opts(path, &opts)?;
                info!("initialized repository at {}", path.display());
                repo
            }
            Err(e) => return Err(e.into()),
        };
        if repo.is_bare() {
            return Err(RepoError::Bare {
                path: path.to_path_buf(),
            });
        }
        Ok(Box::new(Git2Repository { repo }))
    }
}

/// [`Repository`] over a non-bare libgit2 repository.
pub struct Git2Repository {
    repo: git2::Repository,
}

impl Git2Repository {
    pub fn inner(&self) -> &git2::Repository {
        &self.repo
    }

    fn workdir(&self) -> Result<&Path, RepoError> {
        self.repo.workdir().ok_or_else(|| RepoError::Bare {
            path: self.repo.path().to_path_buf(),
        })
    }

    fn head_commit(&self) -> Result<Option<git2::Commit<'_>>, RepoError> {
        match self.repo.head() {
            Ok(head) => Ok(Some(head.peel_to_commit()?)),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn branch_tip(&self, branch: &str) -> Result<Oid, RepoError> {
        let found = match self.repo.find_branch(branch, BranchType::Local) {
            Ok(b) => b,
            Err(e) if e.code() == ErrorCode::NotFound => {
                return Err(RepoError::BranchNotFound(branch.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        found
            .get()
            .target()
            .ok_or_else(|| RepoError::BranchNotFound(branch.to_string()))
    }

    fn signature(&self) -> Result<git2::Signature<'static>, RepoError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(git2::Signature::now(FALLBACK_NAME, FALLBACK_EMAIL)?),
        }
    }

    /// Pathspec for `path` relative to the working directory.
    fn pathspec(&self, path: &Path) -> Result<String, RepoError> {
        let workdir = self.workdir()?;
        let relative = if path.is_relative() {
            path.to_path_buf()
        } else if let Ok(rel) = path.strip_prefix(workdir) {
            rel.to_path_buf()
        } else {
            let canonical_path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            let canonical_workdir = workdir
                .canonicalize()
                .unwrap_or_else(|_| workdir.to_path_buf());
            canonical_path
                .strip_prefix(&canonical_workdir)
                .map(Path::to_path_buf)
                .map_err(|_| RepoError::OutsideWorkdir {
                    path: path.to_path_buf(),
                    workdir: workdir.to_path_buf(),
                })?
        };
        let spec = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Ok(if spec.is_empty() { "*".to_string() } else { spec })
    }
}

impl Repository for Git2Repository {
    #[instrument(skip(self, paths), level = "debug")]
    fn stage_and_commit(&mut self, paths: &[PathBuf], message: &str) -> Result<bool, RepoError> {
        let specs = paths
            .iter()
            .map(|p| self.pathspec(p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut index = self.repo.index()?;
        index.add_all(specs.iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        let parent = self.head_commit()?;
        match &parent {
            Some(p) if p.tree_id() == tree_oid => {
                debug!("nothing to commit");
                return Ok(false);
            }
            None if tree.is_empty() => {
                debug!("nothing to commit on unborn branch");
                return Ok(false);
            }
            _ => {}
        }

        let signature = self.signature()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;
        info!("committed {oid}: {message}");
        Ok(true)
    }

    #[instrument(skip(self), level = "debug")]
    fn create_and_checkout_branch(&mut self, name: &str) -> Result<(), RepoError> {
        let exists = match self.repo.find_branch(name, BranchType::Local) {
            Ok(_) => true,
            Err(e) if e.code() == ErrorCode::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if !exists {
            match self.head_commit()? {
                Some(head) => {
                    self.repo.branch(name, &head, false)?;
                    info!("created branch {name}");
                }
                None => {
                    // Unborn: the branch is born with the next commit.
                    self.repo.set_head(&format!("refs/heads/{name}"))?;
                    info!("switched unborn HEAD to {name}");
                    return Ok(());
                }
            }
        }
        self.checkout(name)
    }

    fn is_dirty(&self) -> Result<bool, RepoError> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(!statuses.is_empty())
    }

    fn list_branches(&self) -> Result<Vec<String>, RepoError> {
        let mut names = Vec::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    #[instrument(skip(self), level = "debug")]
    fn checkout(&mut self, branch: &str) -> Result<(), RepoError> {
        let tip = self.branch_tip(branch)?;
        let object = self.repo.find_object(tip, None)?;
        self.repo
            .checkout_tree(&object, Some(CheckoutBuilder::new().safe()))?;
        self.repo.set_head(&format!("refs/heads/{branch}"))?;
        debug!("checked out {branch}");
        Ok(())
    }

    #[instrument(skip(self, message), level = "debug")]
    fn merge(&mut self, branch: &str, parents: &[&str], message: &str) -> Result<(), RepoError> {
        let ours = self
            .head_commit()?
            .ok_or_else(|| RepoError::BranchNotFound("HEAD".to_string()))?;
        let theirs = self.repo.find_commit(self.branch_tip(branch)?)?;

        let mut merged = self.repo.merge_commits(&ours, &theirs, None)?;
        if merged.has_conflicts() {
            return Err(RepoError::MergeConflict {
                branch: branch.to_string(),
            });
        }
        let tree_oid = merged.write_tree_to(&self.repo)?;
        let tree = self.repo.find_tree(tree_oid)?;

        let parent_commits = parents
            .iter()
            .map(|name| {
                self.branch_tip(name)
                    .and_then(|oid| Ok(self.repo.find_commit(oid)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let signature = self.signature()?;
        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            message,
            &tree,
            &parent_refs,
        )?;
        self.repo
            .checkout_head(Some(CheckoutBuilder::new().force()))?;
        info!("merged {branch} as {oid}");
        Ok(())
    }

    fn is_merged(&self, branch: &str, into: &str) -> Result<bool, RepoError> {
        let tip = self.branch_tip(branch)?;
        let base = self.branch_tip(into)?;
        Ok(tip == base || self.repo.graph_descendant_of(base, tip)?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> Box<dyn Repository> {
        Git2Provider::new("main")
            .init_or_load(dir.path())
            .expect("init")
    }

    fn commit_file(repo: &mut dyn Repository, dir: &TempDir, name: &str, body: &str) {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, body).unwrap();
        assert!(repo.stage_and_commit(&[path], &format!("edit {name}")).unwrap());
    }

    #[test]
    fn init_starts_on_main() {
        let tmp = TempDir::new().unwrap();
        let mut repo = open(&tmp);
        commit_file(repo.as_mut(), &tmp, "a.md", "one");
        assert_eq!(repo.list_branches().unwrap(), vec!["main"]);
    }

    #[test]
    fn reopen_keeps_history() {
        let tmp = TempDir::new().unwrap();
        {
            let mut repo = open(&tmp);
            commit_file(repo.as_mut(), &tmp, "a.md", "one");
        }
        let mut repo = open(&tmp);
        assert!(!repo
            .stage_and_commit(&[tmp.path().join("a.md")], "again")
            .unwrap());
    }

    #[test]
    fn directories_are_staged_recursively() {
        let tmp = TempDir::new().unwrap();
        let mut repo = open(&tmp);
        fs::create_dir_all(tmp.path().join("docs/guide")).unwrap();
        fs::write(tmp.path().join("docs/guide/a.md"), "a").unwrap();
        fs::write(tmp.path().join("docs/b.md"), "b").unwrap();
        assert!(repo
            .stage_and_commit(&[tmp.path().join("docs")], "docs")
            .unwrap());
        assert!(!repo.is_dirty().unwrap());
    }

    #[test]
    fn modified_tracked_file_is_dirty_untracked_is_not() {
        let tmp = TempDir::new().unwrap();
        let mut repo = open(&tmp);
        commit_file(repo.as_mut(), &tmp, "a.md", "one");
        fs::write(tmp.path().join("new.md"), "untracked").unwrap();
        assert!(!repo.is_dirty().unwrap());
        fs::write(tmp.path().join("a.md"), "two").unwrap();
        assert!(repo.is_dirty().unwrap());
    }

    #[test]
    fn create_branch_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let mut repo = open(&tmp);
        commit_file(repo.as_mut(), &tmp, "a.md", "one");
        repo.create_and_checkout_branch("ABC-1-FIX").unwrap();
        repo.create_and_checkout_branch("ABC-1-FIX").unwrap();
        let mut branches = repo.list_branches().unwrap();
        branches.sort();
        assert_eq!(branches, vec!["ABC-1-FIX", "main"]);
    }

    #[test]
    fn merge_creates_two_parent_commit() {
        let tmp = TempDir::new().unwrap();
        let mut repo = open(&tmp);
        commit_file(repo.as_mut(), &tmp, "a.md", "one");
        repo.create_and_checkout_branch("feature").unwrap();
        commit_file(repo.as_mut(), &tmp, "a.md", "two");
        assert!(!repo.is_merged("feature", "main").unwrap());

        repo.checkout("main").unwrap();
        assert_eq!(fs::read_to_string(tmp.path().join("a.md")).unwrap(), "one");
        repo.merge("feature", &["main", "feature"], "merge").unwrap();

        assert!(repo.is_merged("feature", "main").unwrap());
        assert_eq!(fs::read_to_string(tmp.path().join("a.md")).unwrap(), "two");
        let raw = git2::Repository::open(tmp.path()).unwrap();
        let head = raw.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.parent_count(), 2);
        assert_eq!(raw.head().unwrap().shorthand(), Some("main"));
    }

    #[test]
    fn conflicting_merge_commits_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut repo = open(&tmp);
        commit_file(repo.as_mut(), &tmp, "a.md", "base\n");
        repo.create_and_checkout_branch("feature").unwrap();
        commit_file(repo.as_mut(), &tmp, "a.md", "feature\n");
        repo.checkout("main").unwrap();
        commit_file(repo.as_mut(), &tmp, "a.md", "main\n");

        let raw = git2::Repository::open(tmp.path()).unwrap();
        let before = raw.head().unwrap().target().unwrap();
        let err = repo
            .merge("feature", &["main", "feature"], "merge")
            .unwrap_err();
        assert!(matches!(err, RepoError::MergeConflict { .. }));
        assert_eq!(raw.head().unwrap().target().unwrap(), before);
    }

    #[test]
    fn unknown_branch_is_reported() {
        let tmp = TempDir::new().unwrap();
        let mut repo = open(&tmp);
        commit_file(repo.as_mut(), &tmp, "a.md", "one");
        assert!(matches!(
            repo.checkout("nope"),
            Err(RepoError::BranchNotFound(_))
        ));
    }
}

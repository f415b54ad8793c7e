//! The four library operations: add, checkout, checkin, merge.
//!
//! ```text
//! add       source tree ──collect──▶ registry + library ──save──▶ meta/<p>.yaml
//! checkout  registry ──copy──▶ workspace ──commit + branch──▶ workspace repo
//! checkin   workspace repo ──merge feature──▶ main ──collect──▶ library ──branch──▶ library repo
//! merge     registry ──read workspace docs──▶ directives ──agents──▶ sibling copies
//! ```
//!
//! Every operation returns an [`OperationReport`]. Local state (copies,
//! registry) is persisted before any repository branch is created.

use std::path::{Path, PathBuf};

use doclib_core::config::BranchMatch;
use doclib_core::layout::Layout;
use doclib_core::registry::{LoadStatus, Registration, RegistryLock, SignatureRegistry};
use doclib_core::types::{AssetRecord, OperationName, ProductCode, Signature, TicketId};
use doclib_core::Settings;
use doclib_directive::{
    AgentEnv, AgentKind, AgentTable, DirectiveIndex, DirectiveRules, Document, Effect,
};
use tracing::{info, instrument, warn};

use crate::error::RepoError;
use crate::fs::Filesystem;
use crate::prompt::Prompt;
use crate::report::{OperationReport, Signal};
use crate::repository::{Repository, RepositoryProvider};
use crate::ticket::{Ticket, TicketService};

/// External collaborators of the orchestrator.
#[derive(Clone, Copy)]
pub struct Ports<'a> {
    pub fs: &'a dyn Filesystem,
    pub repos: &'a dyn RepositoryProvider,
    pub tickets: &'a dyn TicketService,
    pub prompt: &'a dyn Prompt,
}

/// Runs operations for one invocation.
pub struct SyncOrchestrator<'a> {
    settings: &'a Settings,
    layout: &'a Layout,
    ports: Ports<'a>,
}

/// Result of walking one tree into the library.
#[derive(Debug, Default, Clone, Copy)]
struct Collection {
    files: usize,
    inserted: usize,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(settings: &'a Settings, layout: &'a Layout, ports: Ports<'a>) -> Self {
        Self {
            settings,
            layout,
            ports,
        }
    }

    // -----------------------------------------------------------------------
    // add
    // -----------------------------------------------------------------------

    /// Register every document under `<source_dir>/<doc_source>` and copy it
    /// into the library.
    #[instrument(skip(self), fields(product = %product))]
    pub fn add(&self, product: &ProductCode, source_dir: &Path) -> OperationReport {
        let mut report = OperationReport::new(OperationName::Add);
        let Some((mut registry, status, lock)) = self.load_registry_for_update(product, &mut report)
        else {
            return report;
        };
        let collection = self.collect_into_library(&mut registry, source_dir, &mut report);
        if collection.files > 0 {
            self.persist(&registry, &lock, status, collection, &mut report);
        }
        report
    }

    // -----------------------------------------------------------------------
    // checkout
    // -----------------------------------------------------------------------

    /// Copy the product's library documents into its workspace, then open a
    /// ticket branch.
    #[instrument(skip(self), fields(product = %product, ticket = %ticket_id))]
    pub fn checkout(&self, product: &ProductCode, ticket_id: &TicketId) -> OperationReport {
        let mut report = OperationReport::new(OperationName::Checkout);
        if !self.ticket_matches_product(product, ticket_id, &mut report) {
            return report;
        }
        let Some((registry, _)) = self.load_registry(product, &mut report) else {
            return report;
        };

        for (signature, record) in sorted_contents(&registry) {
            let from = self.layout.library_file(signature);
            let to = self.layout.workspace_file(product, record);
            let copied = self
                .ports
                .fs
                .make_dirs(&self.layout.workspace_dir_for(product, record))
                .and_then(|()| self.ports.fs.copy(&from, &to));
            match copied {
                Ok(outcome) => report.push(Signal::CheckedOut(outcome)),
                Err(e) => report.push(Signal::CopyFailed {
                    from,
                    to,
                    reason: e.to_string(),
                }),
            }
        }

        let Some(ticket) = self.obtain_ticket(ticket_id, &mut report) else {
            return report;
        };
        if self.settings.git_in_workspace {
            let workspace = self.layout.product_workspace(product);
            let doc_root = self.layout.doc_root(&workspace);
            self.open_ticket_branch(&workspace, product, &ticket, &[doc_root], &mut report);
        }
        report
    }

    // -----------------------------------------------------------------------
    // checkin
    // -----------------------------------------------------------------------

    /// Merge the ticket's feature branch into the main line, refresh the
    /// library from the workspace, then record a branch in the library
    /// repository.
    #[instrument(skip(self), fields(product = %product, ticket = %ticket_id))]
    pub fn checkin(&self, product: &ProductCode, ticket_id: &TicketId) -> OperationReport {
        let mut report = OperationReport::new(OperationName::Checkin);
        if !self.ticket_matches_product(product, ticket_id, &mut report) {
            return report;
        }

        let workspace = self.layout.product_workspace(product);
        let mut repo = match self.ports.repos.init_or_load(&workspace) {
            Ok(repo) => repo,
            Err(e) => {
                report.push(repo_failed(&workspace, &e));
                return report;
            }
        };
        if !self.merge_feature_branch(repo.as_mut(), &workspace, ticket_id, &mut report) {
            return report;
        }

        let Some((mut registry, status, lock)) = self.load_registry_for_update(product, &mut report)
        else {
            return report;
        };
        let collection = self.collect_into_library(&mut registry, &workspace, &mut report);
        if collection.files == 0 || !self.persist(&registry, &lock, status, collection, &mut report)
        {
            return report;
        }
        drop(lock);

        let Some(ticket) = self.obtain_ticket(ticket_id, &mut report) else {
            return report;
        };
        let stage = [self.layout.library_dir(), self.layout.meta_dir()];
        self.open_ticket_branch(self.layout.data_dir(), product, &ticket, &stage, &mut report);
        report
    }

    /// Returns `false` when checkin must stop.
    fn merge_feature_branch(
        &self,
        repo: &mut dyn Repository,
        workspace: &Path,
        ticket_id: &TicketId,
        report: &mut OperationReport,
    ) -> bool {
        match repo.is_dirty() {
            Ok(false) => {}
            Ok(true) => {
                report.push(Signal::WorkspaceDirty {
                    repository: workspace.to_path_buf(),
                });
                return false;
            }
            Err(e) => {
                report.push(repo_failed(workspace, &e));
                return false;
            }
        }

        let mut candidates: Vec<String> = match repo.list_branches() {
            Ok(branches) => branches
                .into_iter()
                .filter(|b| is_ticket_branch(b, ticket_id, &self.settings.sep.code))
                .collect(),
            Err(e) => {
                report.push(repo_failed(workspace, &e));
                return false;
            }
        };
        candidates.sort();

        let feature = match (candidates.len(), self.settings.branch_match) {
            (0, _) => {
                report.push(Signal::FeatureBranchNotFound {
                    ticket: ticket_id.clone(),
                });
                return false;
            }
            (1, _) => candidates[0].clone(),
            (_, BranchMatch::Strict) => {
                report.push(Signal::FeatureBranchAmbiguous { candidates });
                return false;
            }
            (_, BranchMatch::FirstMatch) => {
                let branch = candidates[0].clone();
                report.push(Signal::FeatureBranchChosen {
                    branch: branch.clone(),
                    candidates,
                });
                branch
            }
        };

        let main = self.settings.main_branch.as_str();
        if let Err(e) = repo.checkout(main) {
            report.push(repo_failed(workspace, &e));
            return false;
        }
        match repo.is_merged(&feature, main) {
            Ok(true) => {
                report.push(Signal::AlreadyMerged { branch: feature });
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                report.push(repo_failed(workspace, &e));
                return false;
            }
        }

        let message = crate::ticket::merge_message(ticket_id);
        match repo.merge(&feature, &[main, feature.as_str()], &message) {
            Ok(()) => {
                info!("merged {feature} into {main}");
                report.push(Signal::Merged { branch: feature });
                true
            }
            Err(e) => {
                match e {
                    RepoError::MergeConflict { branch } => {
                        report.push(Signal::MergeConflict { branch })
                    }
                    other => report.push(repo_failed(workspace, &other)),
                }
                if let Err(e) = repo.checkout(&feature) {
                    warn!("could not return to {feature}: {e}");
                }
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // merge
    // -----------------------------------------------------------------------

    /// Run the agents of every workspace document in the default format.
    /// An empty `include` runs every agent kind.
    #[instrument(skip(self), fields(product = %product))]
    pub fn merge(&self, product: &ProductCode, include: &[AgentKind]) -> OperationReport {
        let mut report = OperationReport::new(OperationName::Merge);
        let rules = DirectiveRules::from_settings(self.settings);
        let table = if include.is_empty() {
            AgentTable::standard(&rules)
        } else {
            AgentTable::with_kinds(&rules, include)
        };
        let Some((registry, _)) = self.load_registry(product, &mut report) else {
            return report;
        };

        let env = AgentEnv {
            product,
            code_sep: &self.settings.sep.code,
            workspace: self.layout.workspace_dir(),
        };
        for (signature, record) in sorted_contents(&registry) {
            if !record.name.ends_with(&self.settings.default_doc_format) {
                report.push(Signal::MergeTargetFormatMismatch(signature.clone()));
                continue;
            }
            let path = self.layout.workspace_file(product, record);
            let text = match self.ports.fs.read_to_string(&path) {
                Ok(text) => text,
                Err(e) => {
                    report.push(Signal::DocumentUnreadable {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            let index = DirectiveIndex::from_text(&text, &rules);
            for run in table.dispatch(&env, &Document { path: &path }, &index) {
                match run.outcome {
                    Ok(effects) => {
                        for effect in effects {
                            self.apply(effect, &mut report);
                        }
                    }
                    Err(e) => report.push(Signal::AgentFailed {
                        agent: run.agent,
                        document: path.clone(),
                        reason: e.to_string(),
                    }),
                }
            }
        }
        report
    }

    fn apply(&self, effect: Effect, report: &mut OperationReport) {
        match effect {
            Effect::Copy { from, to, sibling } => {
                let parent = to.parent().map(Path::to_path_buf).unwrap_or_default();
                let copied = self
                    .ports
                    .fs
                    .make_dirs(&parent)
                    .and_then(|()| self.ports.fs.copy(&from, &to));
                match copied {
                    Ok(_) => report.push(Signal::Propagated { from, to, sibling }),
                    Err(e) => report.push(Signal::CopyFailed {
                        from,
                        to,
                        reason: e.to_string(),
                    }),
                }
            }
            Effect::Observe {
                key,
                document,
                values,
            } => report.push(Signal::Observed {
                key,
                document,
                values,
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Shared steps
    // -----------------------------------------------------------------------

    fn load_registry(
        &self,
        product: &ProductCode,
        report: &mut OperationReport,
    ) -> Option<(SignatureRegistry, LoadStatus)> {
        let registry = SignatureRegistry::for_product(self.layout, self.settings, product);
        self.load_into(registry, report)
    }

    /// [`load_registry`](Self::load_registry) under the registry lock. The
    /// lock is held until the caller drops it, normally after `persist`.
    fn load_registry_for_update(
        &self,
        product: &ProductCode,
        report: &mut OperationReport,
    ) -> Option<(SignatureRegistry, LoadStatus, RegistryLock)> {
        let registry = SignatureRegistry::for_product(self.layout, self.settings, product);
        let lock = match registry.lock() {
            Ok(lock) => lock,
            Err(e) => {
                report.push(Signal::RegistryLoadFailed {
                    reason: e.to_string(),
                });
                return None;
            }
        };
        let (registry, status) = self.load_into(registry, report)?;
        Some((registry, status, lock))
    }

    fn load_into(
        &self,
        mut registry: SignatureRegistry,
        report: &mut OperationReport,
    ) -> Option<(SignatureRegistry, LoadStatus)> {
        match registry.load() {
            Ok(status) => {
                report.push(Signal::RegistryLoaded(status));
                Some((registry, status))
            }
            Err(e) => {
                report.push(Signal::RegistryLoadFailed {
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Walk `<tree>/<doc_source>`, register every document and copy it into
    /// the library. Existing records still refresh their library copy.
    fn collect_into_library(
        &self,
        registry: &mut SignatureRegistry,
        tree: &Path,
        report: &mut OperationReport,
    ) -> Collection {
        let root = self.layout.doc_root(tree);
        let entries = match self.ports.fs.walk(&root) {
            Ok(entries) => entries,
            Err(e) => {
                report.push(Signal::WalkFailed {
                    root,
                    reason: e.to_string(),
                });
                return Collection::default();
            }
        };

        let mut collection = Collection::default();
        for entry in entries {
            let relative = relative_directory(&root, &entry.dir);
            for name in entry.files.iter().filter(|n| self.settings.is_doc_file(n)) {
                let key = registry.compute_key(&relative);
                let registration = registry.register(AssetRecord::new(name, &relative, key));
                let signature = registration.signature().clone();
                match registration {
                    Registration::Inserted(sig) => {
                        collection.inserted += 1;
                        report.push(Signal::Registered(sig));
                    }
                    Registration::AlreadyRegistered(sig) => {
                        report.push(Signal::AlreadyRegistered(sig))
                    }
                }

                let from = entry.dir.join(name);
                let to = self.layout.library_file(&signature);
                match self.ports.fs.copy(&from, &to) {
                    Ok(outcome) => report.push(Signal::LibraryUpdated(outcome)),
                    Err(e) => report.push(Signal::CopyFailed {
                        from,
                        to,
                        reason: e.to_string(),
                    }),
                }
                collection.files += 1;
            }
        }

        if collection.files == 0 {
            report.push(Signal::NothingCollected { root });
        } else {
            report.push(Signal::Collected {
                files: collection.files,
            });
        }
        collection
    }

    /// Save when something new was registered or no document existed yet.
    fn persist(
        &self,
        registry: &SignatureRegistry,
        lock: &RegistryLock,
        status: LoadStatus,
        collection: Collection,
        report: &mut OperationReport,
    ) -> bool {
        if collection.inserted == 0 && status != LoadStatus::Missing {
            return true;
        }
        match registry.save(lock) {
            Ok(()) => {
                report.push(Signal::RegistrySaved {
                    path: registry.path().to_path_buf(),
                    records: registry.len(),
                });
                true
            }
            Err(e) => {
                report.push(Signal::RegistrySaveFailed {
                    reason: e.to_string(),
                });
                false
            }
        }
    }

    fn ticket_matches_product(
        &self,
        product: &ProductCode,
        ticket_id: &TicketId,
        report: &mut OperationReport,
    ) -> bool {
        if !self.settings.require_project_code_in_ticket {
            return true;
        }
        let probe = Ticket::new(ticket_id.clone(), "");
        if probe.belongs_to(product, &self.settings.sep.code) {
            return true;
        }
        report.push(Signal::TicketProjectMismatch {
            ticket: ticket_id.clone(),
            product: product.clone(),
        });
        false
    }

    /// Online lookup when allowed, otherwise (or on a miss) manual entry.
    /// `None` when no usable summary was obtained.
    fn obtain_ticket(&self, ticket_id: &TicketId, report: &mut OperationReport) -> Option<Ticket> {
        if self.settings.allow_remote_requests {
            match self.ports.tickets.find(ticket_id) {
                Ok(Some(mut ticket)) => {
                    report.push(Signal::TicketFound(ticket_id.clone()));
                    let prompt = format!(
                        "Ticket summary [{ticket_id}]\nDefault text '{}'\nNew summary (leave empty to keep the default)",
                        ticket.summary()
                    );
                    let default = ticket.summary().to_string();
                    match self.ports.prompt.ask(&prompt, &default) {
                        Ok(answer) => {
                            ticket.set_summary(answer);
                        }
                        Err(e) => warn!("keeping ticket summary: {e}"),
                    }
                    return self.summary_obtained(ticket, report);
                }
                Ok(None) => report.push(Signal::TicketNotFound(ticket_id.clone())),
                Err(e) => report.push(Signal::TicketLookupFailed {
                    reason: e.to_string(),
                }),
            }
        }

        let prompt = format!("Ticket summary [{ticket_id}]");
        match self.ports.prompt.ask(&prompt, "") {
            Ok(answer) => self.summary_obtained(Ticket::new(ticket_id.clone(), answer), report),
            Err(e) => {
                report.push(Signal::SummaryUpdateFailed {
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    fn summary_obtained(&self, ticket: Ticket, report: &mut OperationReport) -> Option<Ticket> {
        if ticket.has_summary() {
            report.push(Signal::SummaryUpdated {
                summary: ticket.summary().to_string(),
            });
            Some(ticket)
        } else {
            report.push(Signal::SummaryUpdateFailed {
                reason: "empty summary".to_string(),
            });
            None
        }
    }

    /// Commit `stage` as `"<ID>: <summary>"`, then create and check out the
    /// ticket branch. Re-running lands on the existing branch.
    fn open_ticket_branch(
        &self,
        repository: &Path,
        product: &ProductCode,
        ticket: &Ticket,
        stage: &[PathBuf],
        report: &mut OperationReport,
    ) {
        let mut repo = match self.ports.repos.init_or_load(repository) {
            Ok(repo) => repo,
            Err(e) => {
                report.push(repo_failed(repository, &e));
                return;
            }
        };

        let message = ticket.commit_message();
        match repo.stage_and_commit(stage, &message) {
            Ok(true) => report.push(Signal::Committed {
                repository: repository.to_path_buf(),
                message,
            }),
            Ok(false) => report.push(Signal::NothingToCommit {
                repository: repository.to_path_buf(),
            }),
            Err(e) => {
                report.push(repo_failed(repository, &e));
                return;
            }
        }

        let branch = ticket.branch_name(product, &self.settings.sep.code);
        match repo.create_and_checkout_branch(&branch) {
            Ok(()) => report.push(Signal::BranchCheckedOut {
                repository: repository.to_path_buf(),
                branch,
            }),
            Err(e) => report.push(repo_failed(repository, &e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn repo_failed(repository: &Path, e: &RepoError) -> Signal {
    Signal::RepositoryFailed {
        repository: repository.to_path_buf(),
        reason: e.to_string(),
    }
}

/// `branch` is `<ID>` itself or starts with `<ID><sep>`, so `ABC-1` never
/// claims `ABC-10-...`.
fn is_ticket_branch(branch: &str, ticket_id: &TicketId, sep: &str) -> bool {
    branch
        .strip_prefix(ticket_id.as_str())
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(sep))
}

fn sorted_contents(registry: &SignatureRegistry) -> Vec<(&Signature, &AssetRecord)> {
    let mut contents: Vec<_> = registry.contents().collect();
    contents.sort_by(|a, b| a.0.cmp(b.0));
    contents
}

/// `dir` relative to `root`, `/`-separated, empty for `root` itself.
fn relative_directory(root: &Path, dir: &Path) -> String {
    dir.strip_prefix(root)
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

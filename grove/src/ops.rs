//! Recursive Operation Executor.
//!
//! Applies one git action over a subtree in pre-order. Only failures that
//! make the traversal itself impossible (an uninitialized workspace, an
//! unresolvable starting address) are returned as errors. Everything that
//! goes wrong on an individual node is recorded in the [`OpReport`] and
//! passed to the [`Reporter`], and the traversal moves on.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tracing::{debug, instrument, warn};

use crate::core::path::join;
use crate::core::types::Operation;
use crate::error::GroveError;
use crate::io::git::{GitProvider, GitPullResult, GitPushResult, GitStatus};
use crate::io::manifest::ConfigProvider;
use crate::tree::NodeKind;
use crate::workspace::Workspace;

/// Shared cancellation signal, checked before each node.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct OpOptions {
    /// Descend into children; otherwise only the target is visited.
    pub recursive: bool,
    /// Clone lazy nodes instead of skipping them and their subtrees.
    pub include_lazy: bool,
    pub cancel: CancelFlag,
}

/// What happened to one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    Cloned,
    /// Lazy and not on disk; the node and its subtree were not visited.
    SkippedLazy,
    /// The target itself has no repository to act on.
    NotARepository,
    Pulled(GitPullResult),
    Pushed(GitPushResult),
    Status(GitStatus),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub path: String,
    pub event: NodeEvent,
}

#[derive(Debug)]
pub struct NodeFailure {
    pub path: String,
    pub error: anyhow::Error,
}

/// Outcome of a whole traversal.
#[derive(Debug)]
pub struct OpReport {
    pub operation: Operation,
    /// Logical path the traversal started from.
    pub target: String,
    pub events: Vec<NodeReport>,
    pub failures: Vec<NodeFailure>,
    /// True when the traversal stopped early at a node boundary.
    pub cancelled: bool,
}

impl OpReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Paths that produced `event`, in visit order.
    pub fn paths_with(&self, event: &NodeEvent) -> Vec<&str> {
        self.events
            .iter()
            .filter(|report| report.event == *event)
            .map(|report| report.path.as_str())
            .collect()
    }
}

/// Receives per-node outcomes as they happen.
pub trait Reporter {
    fn on_event(&mut self, _report: &NodeReport) {}
    fn on_failure(&mut self, _failure: &NodeFailure) {}
}

/// Reporter that ignores everything; the [`OpReport`] still has it all.
#[derive(Debug, Default, Clone, Copy)]
pub struct Quiet;

impl Reporter for Quiet {}

impl<G: GitProvider, C: ConfigProvider> Workspace<G, C> {
    /// Run `operation` starting at `target`.
    #[instrument(skip(self, options, reporter), fields(recursive = options.recursive, include_lazy = options.include_lazy))]
    pub fn run_operation<R: Reporter>(
        &mut self,
        target: &str,
        operation: Operation,
        options: &OpOptions,
        reporter: &mut R,
    ) -> Result<OpReport> {
        self.store.ensure_loaded()?;
        let start = self.locate(target, options.include_lazy)?;
        let mut report = OpReport {
            operation,
            target: start.clone(),
            events: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        };
        let mut visit = Visit {
            operation,
            options,
            target: &start,
            report: &mut report,
            reporter,
        };
        self.visit(&start, &mut visit);
        debug!(
            events = report.events.len(),
            failures = report.failures.len(),
            cancelled = report.cancelled,
            "operation finished"
        );
        Ok(report)
    }

    /// Materialize every eager node (and lazy ones with `include_lazy`)
    /// under `target`, loading nested manifests on the way.
    pub fn materialize_all<R: Reporter>(
        &mut self,
        target: &str,
        include_lazy: bool,
        reporter: &mut R,
    ) -> Result<OpReport> {
        let options = OpOptions {
            recursive: true,
            include_lazy,
            cancel: CancelFlag::new(),
        };
        self.run_operation(target, Operation::Clone, &options, reporter)
    }

    fn visit<R: Reporter>(&mut self, path: &str, visit: &mut Visit<'_, R>) {
        if visit.options.cancel.is_cancelled() {
            visit.report.cancelled = true;
            return;
        }

        let node = match self.store.get_node(path) {
            Ok(node) => node.clone(),
            Err(err) => {
                visit.fail(path, err);
                return;
            }
        };
        let physical = match self.physical_path(path) {
            Ok(physical) => physical,
            Err(err) => {
                visit.fail(path, err);
                return;
            }
        };

        if physical.is_dir() {
            if !node.is_cloned {
                if let Err(err) = self.materialize(path) {
                    visit.fail(path, err);
                    return;
                }
            }
        } else {
            if node.is_lazy && !visit.options.include_lazy {
                visit.event(path, NodeEvent::SkippedLazy);
                return;
            }
            if let Err(err) = self.materialize(path) {
                visit.fail(path, err);
                return;
            }
            if node.repository().is_some() {
                visit.event(path, NodeEvent::Cloned);
            }
        }

        match &node.kind {
            NodeKind::Repo { .. } => {
                if let Err(err) = self.apply(path, &physical, visit) {
                    let err = GroveError::GitAction {
                        action: visit.operation.as_str(),
                        path: path.to_string(),
                        source: err.into(),
                    };
                    visit.fail(path, err.into());
                }
            }
            NodeKind::Group | NodeKind::ConfigRef { .. } => {
                if path == visit.target
                    && !visit.options.recursive
                    && visit.operation != Operation::Clone
                {
                    visit.event(path, NodeEvent::NotARepository);
                }
            }
        }

        if !visit.options.recursive {
            return;
        }
        if let Err(err) = self.ensure_children(path, false) {
            visit.fail(path, err);
            return;
        }
        let children = match self.store.get_node(path) {
            Ok(node) => node.children.clone(),
            Err(err) => {
                visit.fail(path, err);
                return;
            }
        };
        for name in children {
            let child = join(path, &name);
            self.visit(&child, visit);
            if visit.report.cancelled {
                return;
            }
        }
    }

    /// The per-node git action for a repository on disk.
    fn apply<R: Reporter>(
        &mut self,
        path: &str,
        physical: &Path,
        visit: &mut Visit<'_, R>,
    ) -> Result<()> {
        match visit.operation {
            Operation::Pull => {
                let result = self.git.pull(physical)?;
                visit.event(path, NodeEvent::Pulled(result));
            }
            Operation::Push => {
                let result = self.git.push(physical)?;
                visit.event(path, NodeEvent::Pushed(result));
            }
            Operation::Status => {
                let status = self.git.status(physical)?;
                let mut node = self.store.get_node(path)?.clone();
                node.has_changes = !status.is_clean();
                self.store.update_node(path, node)?;
                visit.event(path, NodeEvent::Status(status));
            }
            Operation::Clone => {}
        }
        Ok(())
    }
}

struct Visit<'a, R> {
    operation: Operation,
    options: &'a OpOptions,
    target: &'a str,
    report: &'a mut OpReport,
    reporter: &'a mut R,
}

impl<R: Reporter> Visit<'_, R> {
    fn event(&mut self, path: &str, event: NodeEvent) {
        let report = NodeReport {
            path: path.to_string(),
            event,
        };
        self.reporter.on_event(&report);
        self.report.events.push(report);
    }

    fn fail(&mut self, path: &str, error: anyhow::Error) {
        warn!(path, error = %format!("{error:#}"), "node failed");
        let failure = NodeFailure {
            path: path.to_string(),
            error,
        };
        self.reporter.on_failure(&failure);
        self.report.failures.push(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeGit, GitCall, TestWorkspace, manifest};
    use crate::tree::NodeDefinition;

    fn recursive(include_lazy: bool) -> OpOptions {
        OpOptions {
            recursive: true,
            include_lazy,
            cancel: CancelFlag::new(),
        }
    }

    #[test]
    fn pre_order_visits_parent_before_children() {
        let ws = TestWorkspace::new(&manifest(
            "root",
            "repos",
            vec![
                NodeDefinition::repo("platform", "u-platform"),
                NodeDefinition::repo("web", "u-web"),
            ],
        ))
        .expect("workspace");
        ws.write_manifest(
            "repos/platform/grove.yaml",
            &manifest("platform", "repos", vec![NodeDefinition::repo("auth", "u-auth")]),
        )
        .expect("nested");
        ws.mkdir("repos/platform/repos/auth").expect("mkdir");
        ws.mkdir("repos/web").expect("mkdir");

        let git = FakeGit::new();
        let mut workspace = ws.open(git.clone()).expect("open");
        let report = workspace
            .run_operation("/", Operation::Pull, &recursive(false), &mut Quiet)
            .expect("pull");

        assert!(!report.has_failures());
        let pulled: Vec<_> = git.pulled().into_iter().map(|p| p.display().to_string()).collect();
        assert_eq!(pulled.len(), 3);
        assert!(pulled[0].ends_with("repos/platform"));
        assert!(pulled[1].ends_with("repos/platform/repos/auth"));
        assert!(pulled[2].ends_with("repos/web"));
    }

    #[test]
    fn status_records_changes_on_node() {
        let ws = TestWorkspace::new(&manifest(
            "root",
            "repos",
            vec![NodeDefinition::repo("api", "u-api")],
        ))
        .expect("workspace");
        ws.mkdir("repos/api").expect("mkdir");

        let git = FakeGit::new().dirty("api");
        let mut workspace = ws.open(git).expect("open");
        let report = workspace
            .run_operation("/api", Operation::Status, &OpOptions::default(), &mut Quiet)
            .expect("status");

        assert_eq!(report.events.len(), 1);
        assert!(workspace.store().get_node("/api").expect("api").has_changes);
    }

    #[test]
    fn non_recursive_group_target_is_not_a_repository() {
        let ws = TestWorkspace::new(&manifest(
            "root",
            "repos",
            vec![NodeDefinition::repo("api", "u-api")],
        ))
        .expect("workspace");
        let git = FakeGit::new();
        let mut workspace = ws.open(git.clone()).expect("open");
        let report = workspace
            .run_operation("/", Operation::Pull, &OpOptions::default(), &mut Quiet)
            .expect("pull");

        assert_eq!(report.paths_with(&NodeEvent::NotARepository), vec!["/"]);
        assert!(git.calls().is_empty());
    }

    #[test]
    fn cancelled_traversal_stops_at_node_boundary() {
        let ws = TestWorkspace::new(&manifest(
            "root",
            "repos",
            vec![NodeDefinition::repo("a", "u-a"), NodeDefinition::repo("b", "u-b")],
        ))
        .expect("workspace");

        let options = recursive(false);
        options.cancel.cancel();
        let git = FakeGit::new();
        let mut workspace = ws.open(git.clone()).expect("open");
        let report = workspace
            .run_operation("/", Operation::Pull, &options, &mut Quiet)
            .expect("pull");

        assert!(report.cancelled);
        assert!(git.calls().is_empty());
    }

    #[test]
    fn eager_missing_nodes_are_cloned_before_action() {
        let ws = TestWorkspace::new(&manifest(
            "root",
            "repos",
            vec![NodeDefinition::repo("api", "u-api")],
        ))
        .expect("workspace");
        let git = FakeGit::new();
        let mut workspace = ws.open(git.clone()).expect("open");
        let report = workspace
            .run_operation("/", Operation::Pull, &recursive(false), &mut Quiet)
            .expect("pull");

        assert_eq!(report.paths_with(&NodeEvent::Cloned), vec!["/api"]);
        assert!(matches!(git.calls()[0], GitCall::Clone { .. }));
        assert!(matches!(git.calls()[1], GitCall::Pull(_)));
    }

    #[test]
    fn materialize_all_loads_cloned_manifests() {
        let ws = TestWorkspace::new(&manifest(
            "root",
            "repos",
            vec![NodeDefinition::repo("platform", "u-platform")],
        ))
        .expect("workspace");
        let git = FakeGit::new().with_manifest(
            "platform",
            manifest("platform", "svc", vec![NodeDefinition::repo("auth", "u-auth")]),
        );
        let mut workspace = ws.open(git.clone()).expect("open");
        let report = workspace
            .materialize_all("/", false, &mut Quiet)
            .expect("materialize");

        assert_eq!(report.paths_with(&NodeEvent::Cloned), vec!["/platform", "/platform/auth"]);
        assert!(ws.root().join("repos/platform/svc/auth").is_dir());
    }

    #[test]
    fn config_cycle_is_reported_not_fatal() {
        let ws = TestWorkspace::new(&manifest(
            "root",
            "repos",
            vec![
                NodeDefinition::config_ref("loop", "grove.yaml"),
                NodeDefinition::repo("api", "u-api"),
            ],
        ))
        .expect("workspace");
        let git = FakeGit::new();
        let mut workspace = ws.open(git.clone()).expect("open");
        let report = workspace
            .run_operation("/", Operation::Pull, &recursive(false), &mut Quiet)
            .expect("pull");

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "/loop");
        assert!(matches!(
            GroveError::find(&report.failures[0].error),
            Some(GroveError::ConfigCycle { .. })
        ));
        assert_eq!(git.pulled().len(), 1);
    }
}

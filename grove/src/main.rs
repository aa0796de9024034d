//! `grove`: work with a tree of git repositories as one workspace.
//!
//! The workspace root is the nearest ancestor of the working directory that
//! holds `.grove/`, or the directory given with `-C`.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};

use grove::core::types::Operation;
use grove::error::GroveError;
use grove::exit_codes;
use grove::io::config::load_settings;
use grove::io::git::{GitStatus, SystemGit};
use grove::io::init::{GrovePaths, InitOptions, find_workspace_root, init_workspace};
use grove::io::manifest::FileManifests;
use grove::list::{render_listing, render_tree};
use grove::ops::{NodeEvent, NodeFailure, NodeReport, OpOptions, OpReport, Reporter};
use grove::tree::NodeDefinition;
use grove::workspace::Workspace;

#[derive(Parser)]
#[command(
    name = "grove",
    version,
    about = "Work with a tree of git repositories as one workspace"
)]
struct Cli {
    /// Workspace root (default: nearest ancestor containing `.grove/`).
    #[arg(short = 'C', long = "workspace", global = true)]
    workspace: Option<PathBuf>,
    /// More diagnostics on stderr (`-v` info, `-vv` debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create `grove.yaml` and `.grove/` in the workspace root.
    Init {
        /// Workspace name (default: the directory name).
        #[arg(long)]
        name: Option<String>,
        /// Overwrite an existing manifest.
        #[arg(short, long)]
        force: bool,
    },
    /// Print the whole tree with status icons.
    Tree,
    /// List the children of a node.
    Ls {
        path: Option<String>,
        /// Show the full subtree instead of a preview.
        #[arg(short, long)]
        recursive: bool,
    },
    /// Print the directory of a node.
    Path {
        path: String,
        /// Clone or create the node if it is not on disk.
        #[arg(long)]
        ensure: bool,
    },
    /// Make a node the current position and print its directory.
    Nav {
        path: String,
        /// Fail instead of cloning a node that is not on disk.
        #[arg(long)]
        no_clone: bool,
    },
    /// Show a node's kind, location and git state.
    Info { path: Option<String> },
    /// Pull repositories.
    Pull(OpArgs),
    /// Push repositories.
    Push(OpArgs),
    /// Show working tree status of repositories.
    Status(OpArgs),
    /// Clone every eager node below a node.
    Clone {
        path: Option<String>,
        /// Clone lazy nodes too.
        #[arg(long)]
        include_lazy: bool,
    },
    /// Declare a new node.
    Add {
        name: String,
        /// Git remote of the new repository node.
        #[arg(long, conflicts_with = "file")]
        url: Option<String>,
        /// Manifest that declares the new node's children.
        #[arg(long)]
        file: Option<String>,
        /// Only clone when asked to.
        #[arg(long)]
        lazy: bool,
        /// Node to add under.
        #[arg(long, default_value = ".")]
        parent: String,
    },
    /// Remove a node and its subtree from the manifests.
    Rm { path: String },
}

#[derive(Args)]
struct OpArgs {
    path: Option<String>,
    /// Include every node below the target.
    #[arg(short, long)]
    recursive: bool,
    /// Clone and include lazy nodes instead of skipping them.
    #[arg(long)]
    include_lazy: bool,
}

impl OpArgs {
    fn options(&self) -> OpOptions {
        OpOptions {
            recursive: self.recursive,
            include_lazy: self.include_lazy,
            ..OpOptions::default()
        }
    }

    fn target(&self) -> &str {
        self.path.as_deref().unwrap_or(".")
    }
}

fn main() {
    let cli = Cli::parse();
    grove::logging::init(cli.verbose);
    let code = match run(cli) {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("grove: {err:#}");
            exit_codes::INVALID
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Init { name, force } = &cli.command {
        return cmd_init(cli.workspace.as_deref(), name.clone(), *force);
    }

    let mut workspace = open_workspace(cli.workspace.as_deref())?;
    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Tree => {
            print!("{}", render_tree(&workspace.list_recursive("/")?));
            Ok(())
        }
        Command::Ls { path, recursive } => {
            let target = path.as_deref().unwrap_or(".");
            if recursive {
                print!("{}", render_tree(&workspace.list_recursive(target)?));
            } else {
                print!("{}", render_listing(&workspace.list(target)?));
            }
            Ok(())
        }
        Command::Path { path, ensure } => {
            let resolved = workspace.resolve(&path, ensure)?;
            println!("{}", resolved.physical.display());
            Ok(())
        }
        Command::Nav { path, no_clone } => {
            let resolved = workspace.navigate(&path, !no_clone)?;
            println!("{}", resolved.physical.display());
            Ok(())
        }
        Command::Info { path } => cmd_info(&mut workspace, path.as_deref().unwrap_or(".")),
        Command::Pull(args) => cmd_operation(&mut workspace, Operation::Pull, &args),
        Command::Push(args) => cmd_operation(&mut workspace, Operation::Push, &args),
        Command::Status(args) => cmd_operation(&mut workspace, Operation::Status, &args),
        Command::Clone { path, include_lazy } => {
            let target = path.as_deref().unwrap_or(".");
            let report = workspace.materialize_all(target, include_lazy, &mut CliReporter)?;
            print_summary(&report);
            Ok(())
        }
        Command::Add {
            name,
            url,
            file,
            lazy,
            parent,
        } => {
            let mut def = match (url, file) {
                (Some(url), _) => NodeDefinition::repo(name, url),
                (None, Some(file)) => NodeDefinition::config_ref(name, file),
                (None, None) => NodeDefinition::group(name),
            };
            if lazy {
                def = def.lazy();
            }
            let path = workspace.add_node(&parent, def)?;
            println!("added {path}");
            Ok(())
        }
        Command::Rm { path } => {
            let removed = workspace.remove_node(&path)?;
            println!("removed {}", removed.path);
            Ok(())
        }
    }
}

fn cmd_init(root: Option<&Path>, name: Option<String>, force: bool) -> Result<()> {
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => env::current_dir().context("read current directory")?,
    };
    let paths = init_workspace(&root, &InitOptions { name, force })?;
    println!("initialized {}", paths.root.display());
    Ok(())
}

fn open_workspace(root: Option<&Path>) -> Result<Workspace<SystemGit, FileManifests>> {
    let cwd = env::current_dir().context("read current directory")?;
    let root = match root {
        Some(root) => root.to_path_buf(),
        None => find_workspace_root(&cwd)?,
    };
    let settings = load_settings(&GrovePaths::new(&root).config_path)?;
    let git = SystemGit::new(&settings.git);
    Ok(Workspace::open(&root, git, FileManifests)?.with_cwd(cwd))
}

fn cmd_operation(
    workspace: &mut Workspace<SystemGit, FileManifests>,
    operation: Operation,
    args: &OpArgs,
) -> Result<()> {
    let report =
        workspace.run_operation(args.target(), operation, &args.options(), &mut CliReporter)?;
    print_summary(&report);
    Ok(())
}

fn cmd_info(workspace: &mut Workspace<SystemGit, FileManifests>, target: &str) -> Result<()> {
    let details = workspace.describe(target)?;
    let node = &details.node;
    println!("path:     {}", node.path);
    println!("dir:      {}", details.physical.display());
    match node.repository() {
        Some(url) => println!("url:      {url}"),
        None if node.is_config_ref() => println!("kind:     config reference"),
        None => println!("kind:     group"),
    }
    println!(
        "fetch:    {}",
        if node.is_lazy { "lazy" } else { "eager" }
    );
    println!(
        "on disk:  {}",
        if details.on_disk { "yes" } else { "no" }
    );
    if let Some(branch) = &details.branch {
        println!("branch:   {branch}");
    }
    for (name, url) in &details.remotes {
        println!("remote:   {name} {url}");
    }
    Ok(())
}

/// Prints per-node results to stdout and failures to stderr as they happen.
struct CliReporter;

impl Reporter for CliReporter {
    fn on_event(&mut self, report: &NodeReport) {
        println!("{}: {}", report.path, describe_event(&report.event));
    }

    fn on_failure(&mut self, failure: &NodeFailure) {
        // Manifest problems are errors; git failures are warnings.
        let level = match GroveError::find(&failure.error) {
            Some(err) if err.is_fatal() => "error",
            _ => "warning",
        };
        eprintln!("{level}: {}: {:#}", failure.path, failure.error);
    }
}

fn describe_event(event: &NodeEvent) -> String {
    match event {
        NodeEvent::Cloned => "cloned".to_string(),
        NodeEvent::SkippedLazy => "skipped (lazy, not cloned)".to_string(),
        NodeEvent::NotARepository => "not a repository".to_string(),
        NodeEvent::Pulled(result) => summary_or(&result.summary, "pulled"),
        NodeEvent::Pushed(result) => summary_or(&result.summary, "pushed"),
        NodeEvent::Status(status) => describe_status(status),
    }
}

fn summary_or(summary: &str, fallback: &str) -> String {
    match summary.lines().last().map(str::trim) {
        Some(line) if !line.is_empty() => line.to_string(),
        _ => fallback.to_string(),
    }
}

fn describe_status(status: &GitStatus) -> String {
    let mut out = format!("[{}]", status.branch);
    if status.ahead > 0 {
        out.push_str(&format!(" ahead {}", status.ahead));
    }
    if status.behind > 0 {
        out.push_str(&format!(" behind {}", status.behind));
    }
    if status.is_clean() {
        out.push_str(" clean");
    } else {
        out.push_str(&format!(" {} changed", status.entries.len()));
    }
    out
}

fn print_summary(report: &OpReport) {
    if report.cancelled {
        eprintln!("{} cancelled", report.operation);
    }
    if report.has_failures() {
        eprintln!(
            "{} finished with {} failed node(s)",
            report.operation,
            report.failures.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grove::io::git::StatusEntry;

    #[test]
    fn parse_pull_flags() {
        let cli = Cli::parse_from(["grove", "pull", "/backend", "-r", "--include-lazy"]);
        match cli.command {
            Command::Pull(args) => {
                assert_eq!(args.target(), "/backend");
                assert!(args.options().recursive);
                assert!(args.options().include_lazy);
            }
            _ => panic!("expected pull"),
        }
    }

    #[test]
    fn parse_defaults_to_current_node() {
        let cli = Cli::parse_from(["grove", "status"]);
        match cli.command {
            Command::Status(args) => {
                assert_eq!(args.target(), ".");
                assert!(!args.options().recursive);
            }
            _ => panic!("expected status"),
        }
    }

    #[test]
    fn parse_global_workspace_flag() {
        let cli = Cli::parse_from(["grove", "tree", "-C", "/tmp/ws"]);
        assert_eq!(cli.workspace.as_deref(), Some(Path::new("/tmp/ws")));
        assert!(matches!(cli.command, Command::Tree));
    }

    #[test]
    fn add_rejects_url_with_file() {
        let parsed = Cli::try_parse_from(["grove", "add", "x", "--url", "u", "--file", "f.yaml"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn status_line_shows_divergence_and_changes() {
        let status = GitStatus {
            branch: "main".to_string(),
            ahead: 2,
            behind: 0,
            entries: vec![StatusEntry {
                code: "??".to_string(),
                path: "new.txt".to_string(),
            }],
        };
        assert_eq!(describe_status(&status), "[main] ahead 2 1 changed");
        assert_eq!(describe_status(&GitStatus::default()), "[] clean");
    }

    #[test]
    fn pull_summary_uses_last_line() {
        assert_eq!(summary_or("Updating a..b\nFast-forward\n", "pulled"), "Fast-forward");
        assert_eq!(summary_or("", "pulled"), "pulled");
    }
}

//! Git adapter for workspace operations.
//!
//! [`GitProvider`] is the seam the tree engine talks to; [`SystemGit`] is the
//! production implementation built on a small wrapper around `git`
//! subprocess calls. Tests substitute a recording fake.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use wait_timeout::ChildExt;

use crate::io::config::GitSettings;

static AHEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ahead (\d+)").expect("valid regex"));
static BEHIND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"behind (\d+)").expect("valid regex"));

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Working tree state of one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitStatus {
    pub branch: String,
    pub ahead: u32,
    pub behind: u32,
    pub entries: Vec<StatusEntry>,
}

impl GitStatus {
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitPullResult {
    /// False when the branch was already up to date.
    pub updated: bool,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitPushResult {
    /// False when the remote already had everything.
    pub pushed: bool,
    pub summary: String,
}

/// Git operations the tree engine consumes.
pub trait GitProvider {
    /// Clone `url` into `dest`. The parent of `dest` exists; `dest` does not.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;
    fn pull(&self, path: &Path) -> Result<GitPullResult>;
    fn push(&self, path: &Path) -> Result<GitPushResult>;
    fn status(&self, path: &Path) -> Result<GitStatus>;
    /// Remote name to fetch URL.
    fn remotes(&self, path: &Path) -> Result<BTreeMap<String, String>>;
    fn current_branch(&self, path: &Path) -> Result<String>;
}

/// [`GitProvider`] that spawns the configured git binary.
#[derive(Debug, Clone)]
pub struct SystemGit {
    program: String,
    timeout: Duration,
}

impl SystemGit {
    pub fn new(settings: &GitSettings) -> Self {
        Self {
            program: settings.program.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    fn at(&self, workdir: &Path) -> Git {
        Git {
            workdir: workdir.to_path_buf(),
            program: self.program.clone(),
            timeout: self.timeout,
        }
    }
}

impl GitProvider for SystemGit {
    #[instrument(skip_all, fields(url = %url, dest = %dest.display()))]
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        let parent = dest
            .parent()
            .with_context(|| format!("clone destination missing parent {}", dest.display()))?;
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
        let dest_arg = dest.to_string_lossy();
        self.at(parent).run_checked(&["clone", url, dest_arg.as_ref()])?;
        info!("clone completed");
        Ok(())
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn pull(&self, path: &Path) -> Result<GitPullResult> {
        let output = self.at(path).run_checked(&["pull", "--ff-only"])?;
        let summary = combined_output(&output);
        let updated = !summary.contains("Already up to date");
        debug!(updated, "pull completed");
        Ok(GitPullResult { updated, summary })
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    fn push(&self, path: &Path) -> Result<GitPushResult> {
        let output = self.at(path).run_checked(&["push"])?;
        let summary = combined_output(&output);
        let pushed = !summary.contains("Everything up-to-date");
        debug!(pushed, "push completed");
        Ok(GitPushResult { pushed, summary })
    }

    fn status(&self, path: &Path) -> Result<GitStatus> {
        self.at(path).status()
    }

    fn remotes(&self, path: &Path) -> Result<BTreeMap<String, String>> {
        let out = self.at(path).run_capture(&["remote", "-v"])?;
        Ok(parse_remotes(&out))
    }

    fn current_branch(&self, path: &Path) -> Result<String> {
        self.at(path).current_branch()
    }
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    program: String,
    timeout: Duration,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        let defaults = GitSettings::default();
        Self {
            workdir: workdir.into(),
            program: defaults.program,
            timeout: Duration::from_secs(defaults.timeout_secs),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD in {}", self.workdir.display()));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// Branch tracking info plus changed entries (including untracked).
    pub fn status(&self) -> Result<GitStatus> {
        let out = self.run_capture(&["status", "--porcelain=v1", "--branch", "-uall"])?;
        let mut status = GitStatus::default();
        for line in out.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix("## ") {
                let (branch, ahead, behind) = parse_branch_line(header);
                status.branch = branch;
                status.ahead = ahead;
                status.behind = behind;
                continue;
            }
            status.entries.push(parse_status_line(line)?);
        }
        Ok(status)
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    /// Run git with the configured timeout, draining both pipes while it runs.
    fn run(&self, args: &[&str]) -> Result<Output> {
        let mut child = Command::new(&self.program)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env("GIT_TERMINAL_PROMPT", "0")
            .spawn()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout).context("wait for git")? {
            Some(status) => status,
            None => {
                child.kill().context("kill git process")?;
                child.wait().context("wait git process")?;
                warn!(timeout_secs = self.timeout.as_secs(), "git timed out");
                return Err(anyhow!(
                    "git {} timed out after {:?}",
                    args.join(" "),
                    self.timeout
                ));
            }
        };

        Ok(Output {
            status,
            stdout: join_drain(stdout)?,
            stderr: join_drain(stderr)?,
        })
    }
}

type Drain = Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Drain {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join_drain(handle: Drain) -> Result<Vec<u8>> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| anyhow!("git output reader panicked"))?
            .context("read git output"),
        None => Ok(Vec::new()),
    }
}

fn combined_output(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{}\n{}", stdout.trim(), stderr.trim())
        .trim()
        .to_string()
}

/// Parse the `## ...` header of `git status --branch`.
fn parse_branch_line(header: &str) -> (String, u32, u32) {
    let header = header.trim();
    let branch = if let Some(rest) = header.strip_prefix("No commits yet on ") {
        rest.to_string()
    } else if header.starts_with("HEAD (no branch)") {
        "HEAD".to_string()
    } else {
        let name = header.split_whitespace().next().unwrap_or("");
        name.split("...").next().unwrap_or(name).to_string()
    };
    let count = |re: &Regex| {
        re.captures(header)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    (branch, count(&AHEAD), count(&BEHIND))
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}

fn parse_remotes(out: &str) -> BTreeMap<String, String> {
    let mut remotes = BTreeMap::new();
    for line in out.lines() {
        let mut parts = line.split_whitespace();
        let (Some(name), Some(url)) = (parts.next(), parts.next()) else {
            continue;
        };
        if parts.next() == Some("(push)") && remotes.contains_key(name) {
            continue;
        }
        remotes.insert(name.to_string(), url.to_string());
    }
    remotes
}

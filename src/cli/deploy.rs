//! Deployment: publish the build tree to a git branch.
//!
//! The build tree gets its own repository (first deploy runs `git init`
//! there), is committed on the configured branch and pushed to the
//! configured remote - GitHub Pages style. Uses the system `git` so the
//! user's credentials and helpers apply.

use anyhow::{Result, bail};
use std::path::Path;

use crate::{config::BusterConfig, log, utils::exec::Cmd};

/// Publish the build tree. Expects a completed production build.
pub fn deploy_site(config: &BusterConfig) -> Result<()> {
    let deploy = &config.deploy;
    let output = &config.build.output;

    if !output.exists() {
        bail!("build output not found: {}", output.display());
    }

    if !output.join(".git").exists() {
        git(output, &["init", "-q"])?;
    }

    git(output, &["checkout", "-q", "-B", &deploy.branch])?;
    git(output, &["add", "-A"])?;
    commit(output)?;

    let refspec = format!("HEAD:{}", deploy.branch);
    let mut args = vec!["push", "-q"];
    if deploy.force {
        args.push("--force");
    }
    args.push(&deploy.remote);
    args.push(&refspec);
    git(output, &args)?;

    log!("deploy"; "pushed to {} ({})", deploy.remote, deploy.branch);
    Ok(())
}

/// Commit staged changes, tolerating an unchanged tree.
fn commit(output: &Path) -> Result<()> {
    let result = Cmd::new("git")
        .args(["commit", "-q", "-m", "buster deploy"])
        .cwd(output)
        .run_unchecked()?;

    if result.status.success() {
        return Ok(());
    }

    let detail = format!(
        "{}{}",
        String::from_utf8_lossy(&result.stdout),
        String::from_utf8_lossy(&result.stderr)
    );
    if detail.contains("nothing to commit") {
        log!("deploy"; "no changes since last deploy");
        return Ok(());
    }
    bail!("git commit failed: {}", detail.trim());
}

fn git(root: &Path, args: &[&str]) -> Result<std::process::Output> {
    Cmd::new("git").args(args.iter().copied()).cwd(root).run()
}

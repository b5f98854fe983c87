// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

mod logging;

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use beetle_github_app::{GithubAppClient, GithubAppConfig};
use beetle_report::{
	write_screenshot, IssueDraft, IssueFilingSession, ReportError, Selection, SessionParams,
};
use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::logging::{init_tracing, parse_level, LogFormat};

/// Beetle - file bug reports as GitHub issues
#[derive(Parser, Debug)]
#[command(name = "beetle", version, about, long_about = None)]
struct Args {
	/// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
	#[arg(short, long, default_value = "info", value_parser = parse_level)]
	log_level: tracing::Level,

	/// Output logs as JSON
	#[arg(long)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// List the collaborators and labels a report can use
	Metadata {
		#[command(flatten)]
		target: Target,

		/// Print JSON instead of a listing
		#[arg(long)]
		json: bool,
	},

	/// File a bug report with a screenshot attached
	Submit {
		#[command(flatten)]
		target: Target,

		/// Issue title
		#[arg(long)]
		title: String,

		/// Issue description (Markdown)
		#[arg(long)]
		description: String,

		/// PNG screenshot, or `-` to read it from stdin
		#[arg(long)]
		screenshot: PathBuf,

		/// Collaborator login to assign (repeatable)
		#[arg(long = "assignee", value_name = "LOGIN")]
		assignees: Vec<String>,

		/// Label name to apply (repeatable)
		#[arg(long = "label", value_name = "NAME")]
		labels: Vec<String>,

		/// Where screenshots read from stdin are saved
		#[arg(long, env = "BEETLE_CAPTURE_DIR", default_value = ".beetle/captures")]
		capture_dir: PathBuf,

		/// Print the created issue as JSON
		#[arg(long)]
		json: bool,
	},
}

#[derive(clap::Args, Debug, Clone)]
struct Target {
	/// Organization or user owning the repository
	#[arg(long)]
	org: String,

	/// Repository name
	#[arg(long)]
	repo: String,
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	let format = if args.json_logs {
		LogFormat::Json
	} else {
		LogFormat::Pretty
	};
	init_tracing(args.log_level, format);

	let config = GithubAppConfig::from_env().context("failed to load GitHub App configuration")?;
	info!(app_id = config.app_id(), base_url = %config.base_url(), "starting beetle");

	let client = GithubAppClient::new(config).context("failed to create GitHub client")?;

	match args.command {
		Command::Metadata { target, json } => run_metadata(client, target, json).await,
		Command::Submit {
			target,
			title,
			description,
			screenshot,
			assignees,
			labels,
			capture_dir,
			json,
		} => {
			let screenshot = resolve_screenshot(&screenshot, &capture_dir).await?;
			let draft = assignees
				.into_iter()
				.fold(IssueDraft::new(title, description, screenshot), |draft, login| {
					draft.with_assignee(login)
				});
			let draft = labels
				.into_iter()
				.fold(draft, |draft, name| draft.with_label(name));
			run_submit(client, target, draft, json).await
		}
	}
}

async fn run_metadata(client: GithubAppClient, target: Target, json: bool) -> Result<()> {
	let params = SessionParams::new(&target.org, &target.repo);
	let mut session = IssueFilingSession::new(client, params);
	let progress = watch_progress(&session);

	let snapshot = session.open().await.map_err(|e| session_error(e, &target))?;
	drop(session);
	let _ = progress.await;

	if json {
		let output = serde_json::json!({
			"collaborators": snapshot.collaborators(),
			"labels": snapshot.labels(),
		});
		println!("{}", serde_json::to_string_pretty(&output)?);
		return Ok(());
	}

	println!("Collaborators ({}):", snapshot.collaborators().len());
	for collaborator in snapshot.collaborators() {
		println!("  {}", collaborator.login);
	}
	println!("Labels ({}):", snapshot.labels().len());
	for label in snapshot.labels() {
		match &label.description {
			Some(description) if !description.is_empty() => {
				println!("  {} - {description}", label.name)
			}
			_ => println!("  {}", label.name),
		}
	}
	Ok(())
}

async fn run_submit(
	client: GithubAppClient,
	target: Target,
	draft: IssueDraft,
	json: bool,
) -> Result<()> {
	let screenshot = draft.validate().await.context("invalid bug report")?;
	debug!(
		width = screenshot.width(),
		height = screenshot.height(),
		"Screenshot accepted"
	);

	let params = SessionParams::new(&target.org, &target.repo).with_screenshot(draft.screenshot());
	let mut session = IssueFilingSession::new(client, params);
	let progress = watch_progress(&session);

	let snapshot = session.open().await.map_err(|e| session_error(e, &target))?;

	let mut selection = Selection::new();
	for login in draft.assignees() {
		selection.select_assignee(login.as_str());
	}
	for name in draft.labels() {
		selection.select_label(name.as_str());
	}
	let draft = snapshot.draft(
		&selection,
		draft.title(),
		draft.description(),
		draft.screenshot(),
	);

	let issue = session
		.submit(draft)
		.await
		.map_err(|e| session_error(e, &target))?;
	drop(session);
	let _ = progress.await;

	if json {
		println!("{}", serde_json::to_string_pretty(&issue)?);
	} else {
		println!("Filed {}", issue.reference(&target.org, &target.repo));
		println!("{}", issue.html_url);
	}
	Ok(())
}

/// Log every session transition until the session is dropped.
fn watch_progress(session: &IssueFilingSession) -> JoinHandle<()> {
	let mut states = session.subscribe();
	tokio::spawn(async move {
		while states.changed().await.is_ok() {
			let state = states.borrow_and_update().clone();
			debug!(%state, "Session state changed");
		}
	})
}

/// Use `path` as-is, or save stdin to a fresh file when it is `-`.
async fn resolve_screenshot(path: &Path, capture_dir: &Path) -> Result<PathBuf> {
	if path != Path::new("-") {
		return Ok(path.to_path_buf());
	}

	let bytes = tokio::task::spawn_blocking(|| {
		let mut bytes = Vec::new();
		std::io::stdin().lock().read_to_end(&mut bytes).map(|_| bytes)
	})
	.await
	.context("stdin reader panicked")?
	.context("failed to read screenshot from stdin")?;

	let saved = write_screenshot(&bytes, capture_dir)
		.await
		.context("failed to save screenshot")?;
	info!(path = %saved.display(), "Saved screenshot from stdin");
	Ok(saved)
}

fn session_error(error: ReportError, target: &Target) -> anyhow::Error {
	let kind = error.kind();
	anyhow::Error::new(error).context(format!(
		"failed to file bug report for {}/{} ({kind})",
		target.org, target.repo
	))
}

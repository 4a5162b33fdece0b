//! Terminal rendering of build reports, plans and command summaries.
//!
//! Every builder is shown as one line: a status marker, its uid and a dimmed
//! detail. Command results end with an aligned block of `label: value` rows.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use suitebuild_lib::context::{BuildReport, PlanEntry, PlanStatus};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// What happened, or will happen, to one builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
  Built,
  Cached,
  Failed,
  Skipped,
  /// Would run on the next build.
  Pending,
  /// Would rerun because its inputs changed.
  Stale,
}

impl Marker {
  fn glyph(self) -> &'static str {
    match self {
      Marker::Built | Marker::Pending => "+",
      Marker::Cached => "=",
      Marker::Failed => "✗",
      Marker::Skipped => "-",
      Marker::Stale => "~",
    }
  }

  fn from_plan(status: PlanStatus) -> Self {
    match status {
      PlanStatus::New => Marker::Pending,
      PlanStatus::Stale => Marker::Stale,
      PlanStatus::UpToDate | PlanStatus::Done => Marker::Cached,
    }
  }

  /// Failures go to stderr, everything else to stdout.
  fn print(self, uid: &str, detail: &str) {
    let failed = self == Marker::Failed;
    let stream = || if failed { Stream::Stderr } else { Stream::Stdout };
    let glyph = self.glyph();
    let glyph = match self {
      Marker::Built | Marker::Pending => glyph.if_supports_color(stream(), |s| s.green()).to_string(),
      Marker::Stale | Marker::Skipped => glyph.if_supports_color(stream(), |s| s.yellow()).to_string(),
      Marker::Failed => glyph.if_supports_color(stream(), |s| s.red()).to_string(),
      Marker::Cached => glyph.if_supports_color(stream(), |s| s.dimmed()).to_string(),
    };
    let line = format!("  {glyph} {uid} {}", detail.if_supports_color(stream(), |s| s.dimmed()));

    if failed {
      eprintln!("{line}");
    } else {
      println!("{line}");
    }
  }
}

/// Aligned `label: value` rows closing a command's output.
#[derive(Debug, Default)]
pub struct Summary {
  rows: Vec<(&'static str, String)>,
}

impl Summary {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn row(mut self, label: &'static str, value: impl ToString) -> Self {
    self.rows.push((label, value.to_string()));
    self
  }

  fn lines(&self) -> Vec<(String, &str)> {
    let width = self.rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    self
      .rows
      .iter()
      .map(|(label, value)| (format!("{label:<width$}"), value.as_str()))
      .collect()
  }

  pub fn print(&self) {
    for (label, value) in self.lines() {
      println!("  {}  {value}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()));
    }
  }
}

/// Closing line of a command: green check on success, red cross on stderr otherwise.
pub fn headline(ok: bool, message: &str) {
  if ok {
    println!("{} {message}", "✓".if_supports_color(Stream::Stdout, |s| s.green()));
  } else {
    eprintln!(
      "{} {}",
      "✗".if_supports_color(Stream::Stderr, |s| s.red()),
      message.if_supports_color(Stream::Stderr, |s| s.red())
    );
  }
}

pub fn notice(message: &str) {
  println!("{} {message}", "•".if_supports_color(Stream::Stdout, |s| s.blue()));
}

pub fn emit_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{json}");
  Ok(())
}

/// One line per builder of a finished pass. Cached builders are only counted.
pub fn print_build_report(report: &BuildReport, elapsed: Duration) {
  for (uid, outputs) in &report.executed {
    Marker::Built.print(uid, &plural(outputs.len(), "output"));
  }
  for (uid, error) in &report.failed {
    Marker::Failed.print(uid, &error.to_string());
  }
  for (uid, cause) in &report.skipped {
    Marker::Skipped.print(uid, &format!("({cause} failed)"));
  }

  println!();
  if report.is_success() {
    headline(true, "Build complete!");
  }

  let mut summary = Summary::new()
    .row("Built", report.executed.len())
    .row("Up to date", report.cached.len());
  if !report.is_success() {
    summary = summary
      .row("Failed", report.failed.len())
      .row("Skipped", report.skipped.len());
  }
  summary.row("Duration", format_elapsed(elapsed)).print();
}

/// Plan entries grouped by wave, then the number of builders that would run.
pub fn print_plan(plan: &[PlanEntry]) {
  let mut wave = None;
  for entry in plan {
    if wave != Some(entry.wave) {
      wave = Some(entry.wave);
      println!("{}", format!("wave {}", entry.wave).if_supports_color(Stream::Stdout, |s| s.bold()));
    }
    let detail = format!("({}, {})", entry.kind, short_digest(entry.digest.as_deref()));
    Marker::from_plan(entry.status).print(&entry.uid, &detail);
  }

  let count = |statuses: &[PlanStatus]| plan.iter().filter(|e| statuses.contains(&e.status)).count();
  println!();
  Summary::new()
    .row("To build", count(&[PlanStatus::New, PlanStatus::Stale]))
    .row("Up to date", count(&[PlanStatus::UpToDate, PlanStatus::Done]))
    .print();
}

fn short_digest(digest: Option<&str>) -> &str {
  match digest {
    Some(digest) => &digest[..digest.len().min(12)],
    None => "-",
  }
}

fn plural(count: usize, noun: &str) -> String {
  if count == 1 {
    format!("(1 {noun})")
  } else {
    format!("({count} {noun}s)")
  }
}

pub fn format_elapsed(elapsed: Duration) -> String {
  let millis = elapsed.as_millis();
  match millis {
    0..1_000 => format!("{millis}ms"),
    1_000..60_000 => format!("{:.2}s", elapsed.as_secs_f64()),
    _ => format!("{}m {:02}s", millis / 60_000, (millis / 1_000) % 60),
  }
}

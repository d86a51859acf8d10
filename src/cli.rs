use crate::model::{ReviewConfig, ReviewContext};
use crate::orchestrator::{self, CloseReason, ReviewEvent, UiCommand};
use crate::planner::{HttpPlanner, Planner};
use crate::telemetry::{BeaconTelemetry, Telemetry, TracingTelemetry};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use time::macros::format_description;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "plan-review",
    version,
    about = "Review and apply AI-proposed schedule changes"
)]
pub struct Cli {
    /// Base URL of the planner service (`/run` and `/apply` are appended)
    #[arg(long, default_value = "http://localhost:8000/ai")]
    pub base_url: String,

    /// Dialog title shown above the review
    #[arg(long, default_value = "AI Plan Review")]
    pub title: String,

    /// First day of the planning window (YYYY-MM-DD, default: today)
    #[arg(long)]
    pub window_start: Option<String>,

    /// Last day of the planning window (YYYY-MM-DD, default: start + --window-days)
    #[arg(long)]
    pub window_end: Option<String>,

    /// Window length in days when --window-end is not given
    #[arg(long, default_value_t = 14)]
    pub window_days: u16,

    /// Person to plan for; repeat for several (default: everyone)
    #[arg(long = "person")]
    pub people: Vec<String>,

    /// Minimum time the loading state stays visible
    #[arg(long, default_value = "450ms")]
    pub min_loading: humantime::Duration,

    /// How long status notifications stay up
    #[arg(long, default_value_t = humantime::Duration::from(orchestrator::DEFAULT_NOTIFICATION_DURATION))]
    pub notification_duration: humantime::Duration,

    /// Timeout for each planner request
    #[arg(long, default_value = "30s")]
    pub request_timeout: humantime::Duration,

    /// Collector endpoint for usage events (default: write them to the log)
    #[arg(long)]
    pub telemetry_url: Option<String>,

    /// Run the planner once, print the result as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Line-oriented interactive mode reading commands from stdin (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Write logs to this file instead of the default location
    #[arg(long)]
    pub log_file: Option<std::path::PathBuf>,
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text {
        return Err(anyhow::anyhow!("--json and --text are mutually exclusive."));
    }

    if !args.json && !args.text {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_text(args).await;
        }
    }

    if args.json {
        return run_json(args).await;
    }

    run_text(args).await
}

fn parse_day(raw: &str, flag: &str) -> Result<time::Date> {
    time::Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("{flag} must be a date like 2024-09-02, got '{raw}'"))
}

fn format_day(day: time::Date) -> String {
    day.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| day.to_string())
}

/// Resolve the planning window from CLI arguments, defaulting to today.
fn resolve_window(args: &Cli) -> Result<(String, String)> {
    let start = match args.window_start.as_deref() {
        Some(raw) => parse_day(raw, "--window-start")?,
        None => time::OffsetDateTime::now_local()
            .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
            .date(),
    };
    let end = match args.window_end.as_deref() {
        Some(raw) => parse_day(raw, "--window-end")?,
        None => start + time::Duration::days(i64::from(args.window_days)),
    };
    if end < start {
        return Err(anyhow::anyhow!(
            "--window-end ({}) is before --window-start ({})",
            format_day(end),
            format_day(start)
        ));
    }
    Ok((format_day(start), format_day(end)))
}

/// Build a `ReviewConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<ReviewConfig> {
    let (window_start, window_end) = resolve_window(args)?;
    let people = args
        .people
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();
    Ok(ReviewConfig {
        base_url: args.base_url.clone(),
        context: ReviewContext {
            window_start,
            window_end,
            people,
        },
        min_loading: Duration::from(args.min_loading),
        notification_duration: Duration::from(args.notification_duration),
        request_timeout: Duration::from(args.request_timeout),
        telemetry_url: args.telemetry_url.clone(),
        user_agent: format!("plan-review/{}", env!("CARGO_PKG_VERSION")),
    })
}

/// Construct the planner client and telemetry sink for a session.
pub(crate) fn build_services(cfg: &ReviewConfig) -> Result<(Arc<dyn Planner>, Arc<dyn Telemetry>)> {
    let planner = HttpPlanner::new(cfg).context("failed to build planner client")?;
    let telemetry: Arc<dyn Telemetry> = match cfg.telemetry_url.as_deref() {
        Some(url) => {
            let http = reqwest::Client::builder()
                .user_agent(cfg.user_agent.clone())
                .timeout(cfg.request_timeout)
                .build()
                .context("failed to build telemetry client")?;
            Arc::new(BeaconTelemetry::new(http, url))
        }
        None => Arc::new(TracingTelemetry),
    };
    Ok((Arc::new(planner), telemetry))
}

/// One planner run, printed as JSON. Nothing is applied.
async fn run_json(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;
    let (planner, _) = build_services(&cfg)?;
    let result = planner
        .run()
        .await
        .map_err(|e| anyhow::anyhow!(e.message().unwrap_or_else(|| "Failed to run planner".into())))
        .context("planner run failed")?;

    let (out_tx, out_handle) = spawn_output_writer();
    let out = serde_json::to_string_pretty(&result)?;
    let _ = out_tx.send(OutputLine::Stdout(out));
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

const TEXT_HELP: &[&str] = &[
    "Commands:",
    "  toggle <id>   select or deselect a change",
    "  apply         apply the selected changes",
    "  retry         run the planner again after a failed run",
    "  rescan        ask the planner for a fresh plan",
    "  close         close the review",
    "  help          show this help",
];

/// Parse one line of text-mode input. `Ok(None)` means "show help".
fn parse_command(line: &str) -> Result<Option<UiCommand>, String> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts.next();
    match (cmd.as_str(), arg) {
        ("toggle" | "t", Some(id)) => Ok(Some(UiCommand::Toggle(id.to_string()))),
        ("toggle" | "t", None) => Err("toggle needs a change id".to_string()),
        ("apply" | "a", _) => Ok(Some(UiCommand::Apply)),
        ("retry" | "r", _) => Ok(Some(UiCommand::Run)),
        ("rescan" | "s", _) => Ok(Some(UiCommand::Rescan)),
        ("close" | "quit" | "q", _) => Ok(Some(UiCommand::Close)),
        ("help" | "?" | "", _) => Ok(None),
        (other, _) => Err(format!("unknown command '{other}' (try `help`)")),
    }
}

/// Read stdin on a plain thread; stdin reads are blocking and never cancel.
fn spawn_stdin_reader(
    cmd_tx: mpsc::UnboundedSender<UiCommand>,
    out_tx: mpsc::UnboundedSender<OutputLine>,
) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Ok(Some(cmd)) => {
                    if cmd_tx.send(cmd).is_err() {
                        return;
                    }
                }
                Ok(None) => {
                    for l in TEXT_HELP {
                        let _ = out_tx.send(OutputLine::Stderr((*l).to_string()));
                    }
                }
                Err(msg) => {
                    let _ = out_tx.send(OutputLine::Stderr(msg));
                }
            }
        }
        // EOF closes the review like the close command would.
        let _ = cmd_tx.send(UiCommand::Close);
    });
}

async fn run_text(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;
    let (planner, telemetry) = build_services(&cfg)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ReviewEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    spawn_stdin_reader(cmd_tx, out_tx.clone());
    let controller = tokio::spawn(async move {
        orchestrator::run_controller(&cfg, planner, telemetry, event_tx, cmd_rx).await
    });

    // Only print when the rendered block actually changed.
    let mut last_lines: Vec<String> = Vec::new();
    while let Some(ev) = event_rx.recv().await {
        match ev {
            ReviewEvent::Updated(view) => {
                let summary = crate::text_summary::build_text_summary(&args.title, &view);
                if summary.lines != last_lines {
                    for line in &summary.lines {
                        let _ = out_tx.send(OutputLine::Stdout(line.clone()));
                    }
                    let _ = out_tx.send(OutputLine::Stdout(String::new()));
                    last_lines = summary.lines;
                }
            }
            ReviewEvent::Closed(reason) => {
                let msg = match reason {
                    CloseReason::NothingToApply => "Nothing selected; review closed.",
                    CloseReason::Dismissed | CloseReason::Disconnected => "Review closed.",
                };
                let _ = out_tx.send(OutputLine::Stderr(msg.to_string()));
            }
        }
    }

    controller.await.context("review controller task failed")?;
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(extra: &[&str]) -> Cli {
        let mut argv = vec!["plan-review"];
        argv.extend_from_slice(extra);
        Cli::parse_from(argv)
    }

    #[test]
    fn config_defaults() {
        let cfg = build_config(&cli(&["--window-start", "2024-09-02"])).expect("config");
        assert_eq!(cfg.context.window_start, "2024-09-02");
        assert_eq!(cfg.context.window_end, "2024-09-16");
        assert!(cfg.context.people.is_empty());
        assert_eq!(cfg.min_loading, Duration::from_millis(450));
        assert_eq!(cfg.notification_duration, Duration::from_millis(2800));
        assert!(cfg.user_agent.starts_with("plan-review/"));
    }

    #[test]
    fn people_and_explicit_window() {
        let cfg = build_config(&cli(&[
            "--window-start",
            "2024-09-02",
            "--window-end",
            "2024-09-06",
            "--person",
            "Ada",
            "--person",
            " ",
            "--person",
            "Max",
        ]))
        .expect("config");
        assert_eq!(cfg.context.window_end, "2024-09-06");
        assert_eq!(cfg.context.people, vec!["Ada".to_string(), "Max".to_string()]);
    }

    #[test]
    fn rejects_inverted_or_malformed_window() {
        assert!(build_config(&cli(&[
            "--window-start",
            "2024-09-10",
            "--window-end",
            "2024-09-01"
        ]))
        .is_err());
        assert!(build_config(&cli(&["--window-start", "next monday"])).is_err());
    }

    #[test]
    fn text_commands() {
        assert_eq!(
            parse_command("toggle c-12"),
            Ok(Some(UiCommand::Toggle("c-12".into())))
        );
        assert_eq!(parse_command("  APPLY "), Ok(Some(UiCommand::Apply)));
        assert_eq!(parse_command("retry"), Ok(Some(UiCommand::Run)));
        assert_eq!(parse_command("q"), Ok(Some(UiCommand::Close)));
        assert_eq!(parse_command(""), Ok(None));
        assert!(parse_command("toggle").is_err());
        assert!(parse_command("explode").is_err());
    }
}

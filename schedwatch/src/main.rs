//! Entry point for the schedwatch CLI. Resolves the simulator URL and runs a command.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use schedwatch::config::{
    load_profiles, profiles_path, remember_profile, save_profiles, ProfileEntry, ProfileRequest,
    ResolveProfile, SaveOutcome, Settings, API_URL_ENV,
};
use schedwatch::monitor::MonitorState;
use schedwatch::report::{render_text, Report};
use schedwatch::types::{AddProcessRequest, Workload};
use schedwatch::{HttpSimulator, Monitor, Simulator};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Live view of a remote process-scheduling simulator",
    after_help = "The simulator URL comes from --url, then --profile, then $SCHEDWATCH_API_URL, \
                  then http://localhost:5000/api."
)]
struct Cli {
    /// Simulator API base URL, e.g. http://localhost:5000/api
    #[arg(long, short = 'u', global = true)]
    url: Option<String>,

    /// Named connection profile (saved on first use together with --url)
    #[arg(long, short = 'P', global = true)]
    profile: Option<String>,

    /// Overwrite an existing profile whose URL differs
    #[arg(long, global = true)]
    save: bool,

    /// Poll interval in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    poll_ms: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll continuously and print a summary after every update (default)
    Watch {
        /// Emit one JSON object per update instead of text
        #[arg(long)]
        json: bool,
    },
    /// Fetch once and print the derived view
    Snapshot {
        #[arg(long)]
        json: bool,
    },
    /// Start the simulation
    Start,
    /// Stop the simulation
    Stop,
    /// Add a process to the simulation
    Add {
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_enum, default_value_t = Workload::Medium)]
        workload: Workload,
        /// 1 (highest) to 5 (lowest)
        #[arg(long, default_value_t = 3)]
        priority: u32,
    },
    /// Add a preset "<workload>-batch" process
    QuickAdd {
        #[arg(value_enum)]
        workload: Workload,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("schedwatch=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Watch { json: false });

    // Validate before any I/O so a bad request never reaches the simulator.
    let add_request = match &command {
        Command::Add {
            name,
            workload,
            priority,
        } => Some(AddProcessRequest::new(name.as_deref(), *workload, *priority)?),
        Command::QuickAdd { workload } => Some(AddProcessRequest::preset(*workload)),
        _ => None,
    };

    let settings = resolve_settings(cli.url, cli.profile, cli.save, cli.poll_ms)?;
    let sim = HttpSimulator::new(&settings.api_url, settings.request_timeout)
        .context("building simulator client")?;
    info!(url = %sim.base(), "using simulator");

    match command {
        Command::Watch { json } => watch(sim, &settings, json).await,
        Command::Snapshot { json } => snapshot(&sim, json).await,
        Command::Start => {
            sim.start().await.context("start simulation")?;
            println!("Simulation started");
            Ok(())
        }
        Command::Stop => {
            sim.stop().await.context("stop simulation")?;
            println!("Simulation stopped");
            Ok(())
        }
        Command::Add { .. } | Command::QuickAdd { .. } => {
            if let Some(req) = add_request {
                sim.add_process(&req).await.context("add process")?;
                println!("Process added");
            }
            Ok(())
        }
    }
}

fn resolve_settings(
    url: Option<String>,
    profile: Option<String>,
    save: bool,
    poll_ms: Option<u64>,
) -> Result<Settings> {
    let path = profiles_path();
    let mut profiles = if profile.is_some() {
        load_profiles(&path)?
    } else {
        Default::default()
    };
    let req = ProfileRequest {
        profile_name: profile.clone(),
        url,
        poll_ms,
    };
    let resolved = req.resolve(&profiles, std::env::var(API_URL_ENV).ok());

    let (url, poll_ms) = match resolved {
        ResolveProfile::Direct(u, p) => {
            if let Some(name) = profile.as_deref() {
                let entry = ProfileEntry {
                    url: u.clone(),
                    poll_ms: p,
                };
                match remember_profile(&mut profiles, name, entry, save) {
                    SaveOutcome::Created | SaveOutcome::Overwritten => {
                        save_profiles(&path, &profiles)
                            .with_context(|| format!("saving {}", path.display()))?;
                        info!(profile = name, path = %path.display(), "profile saved");
                    }
                    SaveOutcome::Kept => warn!(
                        profile = name,
                        "profile exists with a different url; pass --save to overwrite"
                    ),
                    SaveOutcome::Unchanged => {}
                }
            }
            (u, p)
        }
        ResolveProfile::Loaded(entry) => (entry.url, entry.poll_ms),
        ResolveProfile::Unknown(name) => {
            bail!("profile '{name}' does not exist yet; pass --url to create it")
        }
        ResolveProfile::Fallback(u) => (u, poll_ms),
    };
    Ok(Settings::new(url).with_poll_ms(poll_ms))
}

async fn snapshot(sim: &HttpSimulator, json: bool) -> Result<()> {
    let mut state = MonitorState::new(Settings::default().monitor.retention);
    let seq = state.begin_fetch();
    let snap = sim.fetch().await.context("fetching snapshot")?;
    let now = Instant::now();
    state.apply(seq, Ok(snap), now);
    print_view(&Report::from_view(&state.view(), now), json)
}

async fn watch(sim: HttpSimulator, settings: &Settings, json: bool) -> Result<()> {
    let handle = Monitor::new(Arc::new(sim), settings.monitor).spawn();
    let mut views = handle.subscribe();
    let result = loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let view = Arc::clone(&views.borrow_and_update());
                let report = Report::from_view(&view, tokio::time::Instant::now().into_std());
                if let Err(e) = print_view(&report, json) {
                    break Err(e);
                }
            }
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };
    handle.shutdown().await;
    result
}

fn print_view(report: &Report, json: bool) -> Result<()> {
    let mut out = std::io::stdout().lock();
    if json {
        serde_json::to_writer(&mut out, report)?;
        writeln!(out)?;
    } else {
        write!(out, "{}", render_text(report))?;
    }
    out.flush()?;
    Ok(())
}

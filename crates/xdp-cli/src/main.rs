//! `xdp` - cross-domain policy developer CLI.
//!
//! `xdp check` evaluates whether a target connection would be
//! permitted for a hosting context, polling the resolver until it
//! reaches a terminal decision. `xdp show` fetches a target's policy
//! document and prints the parsed rule set as JSON.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use url::Url;

use xdp_core::{Decision, PolicyDocument, SecurityContext, policy_url};
use xdp_engine::{
    FetchStatus, HttpTransport, PolicyCache, PolicyProvider, PolicyResolver, PolicyTransport,
};

#[derive(Parser, Debug)]
#[command(name = "xdp", version, about = "Cross-domain policy checks")]
struct Cli {
    /// Verbose diagnostic logging (never affects decisions).
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate whether a target connection is permitted.
    Check(CheckArgs),
    /// Fetch and print a target's parsed policy document.
    Show(ShowArgs),
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Hosting URL of the embedding application.
    #[arg(long)]
    hosting_url: Url,

    /// Target URI, absolute or relative to the hosting URL.
    #[arg(long)]
    target: String,

    /// Treat this as an editor/tooling context.
    #[arg(long)]
    tooling: bool,

    /// Treat this as a standalone-player context.
    #[arg(long)]
    standalone_player: bool,

    /// Disable policy enforcement entirely (everything allows).
    #[arg(long)]
    no_enforcement: bool,

    /// Give up polling after this many seconds.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

#[derive(Args, Debug)]
struct ShowArgs {
    /// Target URI whose policy document to fetch.
    #[arg(long)]
    target: Url,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Check(args) => check(&args),
        Commands::Show(args) => show(&args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn check(args: &CheckArgs) -> Result<ExitCode> {
    let runtime = tokio::runtime::Runtime::new().context("starting fetch runtime")?;
    let transport: Arc<dyn PolicyTransport> =
        Arc::new(HttpTransport::new(runtime.handle().clone()));

    let context = SecurityContext::new(args.hosting_url.clone())
        .with_tooling(args.tooling)
        .with_standalone_player(args.standalone_player)
        .with_enforcement(!args.no_enforcement);
    let requester = context.origin();
    let resolver = PolicyResolver::new(
        context,
        Arc::new(PolicyCache::new()),
        PolicyProvider::queued(transport),
    );

    let deadline = Instant::now() + Duration::from_secs(args.timeout_secs);
    let decision = loop {
        let decision = resolver.evaluate(&args.target, &requester)?;
        if decision.is_terminal() {
            break decision;
        }
        if Instant::now() >= deadline {
            break Decision::Unknown;
        }
        debug!(target = %args.target, "policy fetch pending, polling again");
        std::thread::sleep(Duration::from_millis(50));
    };

    println!("{decision}");
    Ok(match decision {
        Decision::Allow => ExitCode::SUCCESS,
        Decision::Deny => ExitCode::from(1),
        Decision::Unknown => ExitCode::from(2),
    })
}

fn show(args: &ShowArgs) -> Result<ExitCode> {
    let policy = policy_url(&args.target)?;

    let runtime = tokio::runtime::Runtime::new().context("starting fetch runtime")?;
    let transport = HttpTransport::new(runtime.handle().clone());
    let token = transport.start_fetch(&policy);
    let bytes = loop {
        match transport.poll(token) {
            FetchStatus::Pending => std::thread::sleep(Duration::from_millis(50)),
            FetchStatus::Succeeded(bytes) => break bytes,
            FetchStatus::Failed(err) => {
                return Err(err).with_context(|| format!("fetching {policy}"));
            }
        }
    };

    let document = PolicyDocument::parse(&bytes)
        .with_context(|| format!("parsing policy document from {policy}"))?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(ExitCode::SUCCESS)
}

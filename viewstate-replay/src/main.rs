//! viewstate-replay - Replay recorded actions through a store

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clap::Parser;
use libviewstate::logging::{LogFormat, LoggingConfig};
use libviewstate::store::{Action, ActionRecord, DerivedContext, Store};
use libviewstate::{Config, Result, ViewstateError};
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "viewstate-replay")]
#[command(version, about = "Replay recorded actions and print the derived context")]
#[command(long_about = r#"Replay recorded actions through a store and print every derived context change.

Input is one JSON action per line, for example:
    {"kind": "set_active_token", "token": "t"}
    {"kind": "fetched_auth_info", "token": "t", "auth_info": {"UID": 1, "Login": "u"}}

Blank lines are skipped. Unknown kinds are accepted and change nothing.

EXAMPLES:
    # Replay a recording
    viewstate-replay session.jsonl

    # From stdin, as JSON lines
    cat session.jsonl | viewstate-replay --format json

    # Also print every applied action, including follow-ups
    viewstate-replay session.jsonl --history

EXIT CODES:
    0 - Success
    1 - Error (configuration, I/O)
    3 - Invalid input (malformed action line, unreadable input file)
"#)]
struct Cli {
    /// Action file (reads from stdin if not provided or "-")
    file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Print the applied action log after the replay
    #[arg(long)]
    history: bool,

    /// Log format (text, json, pretty)
    #[arg(long, default_value = "text", env = "VIEWSTATE_LOG_FORMAT", value_name = "FORMAT")]
    log_format: LogFormat,

    /// Log level filter
    #[arg(long, default_value = "warn", env = "VIEWSTATE_LOG_LEVEL", value_name = "LEVEL")]
    log_level: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Config file (defaults to $VIEWSTATE_CONFIG, then the XDG location)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    LoggingConfig::new(cli.log_format, cli.log_level.clone(), cli.verbose).init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let json = cli.format == "json";

    let input: Box<dyn BufRead> = match &cli.file {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(path).map_err(|e| {
                ViewstateError::InvalidInput(format!("cannot read {}: {}", path.display(), e))
            })?;
            Box::new(BufReader::new(file))
        }
        _ => Box::new(io::stdin().lock()),
    };

    let store = Store::new(&config.store);

    // The first call is the starting context, not a change.
    let changes: Arc<Mutex<Vec<DerivedContext>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    let primed = AtomicBool::new(false);
    let _subscription = store.subscribe(move |context| {
        if primed.swap(true, Ordering::Relaxed) {
            lock(&sink).push(context.clone());
        }
    });

    let mut out = io::stdout().lock();
    let mut dispatched = 0usize;

    for (index, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let action = parse_action(trimmed, index + 1)?;
        debug!(line = index + 1, kind = action.kind(), "Dispatching");
        store.dispatch(action);
        dispatched += 1;

        let changed = std::mem::take(&mut *lock(&changes));
        for context in &changed {
            write_context(&mut out, context, json)?;
        }
    }

    if cli.history {
        for record in store.history() {
            write_record(&mut out, &record, json)?;
        }
    }
    out.flush()?;

    info!(dispatched, applied = store.history().len(), "Replay finished");
    Ok(())
}

fn parse_action(line: &str, number: usize) -> Result<Action> {
    serde_json::from_str(line)
        .map_err(|e| ViewstateError::InvalidInput(format!("line {}: {}", number, e)))
}

fn write_context(out: &mut impl Write, context: &DerivedContext, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer(&mut *out, context).map_err(io::Error::from)?;
        writeln!(out)?;
        return Ok(());
    }

    let uid = context
        .auth_info
        .as_ref()
        .and_then(|info| info.uid)
        .map(|uid| uid.to_string());
    let login = context.auth_info.as_ref().and_then(|info| info.login.clone());
    let user = context.user.as_ref().map(|user| user.login.clone());
    writeln!(
        out,
        "signed_in={} uid={} login={} user={}",
        context.signed_in,
        uid.as_deref().unwrap_or("-"),
        login.as_deref().unwrap_or("-"),
        user.as_deref().unwrap_or("-"),
    )?;
    Ok(())
}

fn write_record(out: &mut impl Write, record: &ActionRecord, json: bool) -> Result<()> {
    if json {
        serde_json::to_writer(&mut *out, record).map_err(io::Error::from)?;
        writeln!(out)?;
    } else {
        writeln!(out, "#{} {}", record.seq, record.action.kind())?;
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

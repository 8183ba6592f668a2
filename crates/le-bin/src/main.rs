//! lineedit entrypoint: feeds script lines through an edit session and reports
//! continuation prompts and accepted commands.
use anyhow::{Context, Result, bail};
use clap::Parser;
use core_config::load_from;
use core_state::{EditSession, TrackerError};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const DEFAULT_LOG_FILE: &str = "lineedit.log";

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "lineedit", version, about = "Shell line-editing core driver")]
struct Args {
    /// Script to read. Standard input when omitted.
    pub path: Option<PathBuf>,
    /// Configuration file path (overrides discovery of `lineedit.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Log file written through a non-blocking appender.
    #[arg(long = "log-file", default_value = DEFAULT_LOG_FILE)]
    pub log_file: PathBuf,
    /// Run the buffer validator after every line and stop on corruption.
    #[arg(long)]
    pub validate: bool,
}

fn configure_logging(path: &Path) -> Option<WorkerGuard> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .map_or_else(|| DEFAULT_LOG_FILE.into(), |n| n.to_os_string());
    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    // Fails only when a global subscriber is already installed; the guard is dropped then.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .with_ansi(false)
        .try_init()
        .ok()
        .map(|_| guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

/// Line-at-a-time REPL driver over one `EditSession`.
struct Driver<W> {
    session: EditSession,
    out: W,
    validate: bool,
    accepted: usize,
}

impl<W: Write> Driver<W> {
    fn new(session: EditSession, out: W, validate: bool) -> Self {
        Self {
            session,
            out,
            validate,
            accepted: 0,
        }
    }

    fn feed_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim_end_matches(['\n', '\r']);
        if let Err(e) = self.session.paste(&format!("{line}\n")) {
            return Err(self.edit_failure(e));
        }
        if self.validate {
            self.session
                .validate()
                .into_result()
                .context("buffer failed validation")?;
        }
        match self.session.accept() {
            Ok(Some(text)) => {
                self.accepted += 1;
                writeln!(self.out, "accept: {}", text.trim_end_matches('\n'))?;
            }
            Ok(None) => {
                let prompt = self
                    .session
                    .continuation_prompt()
                    .map(|p| p.to_string())
                    .unwrap_or_default();
                writeln!(self.out, "{}", prompt.trim_end())?;
            }
            Err(e) => return Err(self.edit_failure(e)),
        }
        Ok(())
    }

    fn edit_failure(&self, e: TrackerError) -> anyhow::Error {
        if e.is_fatal() {
            error!(target: "runtime", error = %e, "fatal_edit_error");
        }
        anyhow::Error::new(e).context("edit failed")
    }

    fn run(&mut self, input: impl BufRead) -> Result<usize> {
        for line in input.lines() {
            self.feed_line(&line?)?;
        }
        if !self.session.buffer().is_empty() {
            let prompt = self.session.continuation_prompt().map(|p| p.to_string());
            warn!(target: "runtime", len = self.session.buffer().len(), ?prompt, "incomplete_at_eof");
            writeln!(self.out, "incomplete")?;
        }
        self.out.flush()?;
        Ok(self.accepted)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(&args.log_file);
    install_panic_hook();
    info!(target: "runtime", "startup");

    let config = load_from(args.config.clone())?;
    let session = EditSession::with_options(config.buffer_options(), config.tracker_options());
    info!(
        target: "runtime",
        config_override = args.config.is_some(),
        validate = args.validate,
        "bootstrap_complete"
    );

    let stdout = io::stdout();
    let mut driver = Driver::new(session, stdout.lock(), args.validate);
    let accepted = match args.path.as_ref() {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open script {}", path.display()))?;
            driver.run(BufReader::new(file))?
        }
        None => driver.run(io::stdin().lock())?,
    };
    info!(target: "runtime", accepted, "shutdown");
    if args.validate && !driver.session.validate().is_ok() {
        bail!("buffer failed validation at exit");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_state::TrackerOptions;
    use core_text::BufferOptions;
    use pretty_assertions::assert_eq;

    fn drive(script: &str) -> (usize, String) {
        let mut out = Vec::new();
        let accepted = {
            let mut driver = Driver::new(EditSession::new(), &mut out, true);
            driver.run(script.as_bytes()).unwrap()
        };
        (accepted, String::from_utf8(out).unwrap())
    }

    #[test]
    fn prompts_then_accepts() {
        let (accepted, out) = drive("if true; then\necho hi\nfi\nls -la\n");
        assert_eq!(accepted, 2);
        assert_eq!(out, "if>\nif>\naccept: if true; then\necho hi\nfi\naccept: ls -la\n");
    }

    #[test]
    fn quote_continuation_and_eof() {
        let (accepted, out) = drive("echo 'hello\nworld'\necho \"open\n");
        assert_eq!(accepted, 1);
        assert_eq!(
            out,
            "quote>\naccept: echo 'hello\nworld'\ndquote>\nincomplete\n"
        );
    }

    #[test]
    fn allocation_limit_is_fatal() {
        let options = BufferOptions {
            initial_capacity: 16,
            max_capacity: Some(32),
        };
        let session = EditSession::with_options(options, TrackerOptions::default());
        let mut out = Vec::new();
        let mut driver = Driver::new(session, &mut out, false);
        let err = driver.feed_line(&"x".repeat(64)).unwrap_err();
        let tracker = err.downcast_ref::<TrackerError>().unwrap();
        assert!(tracker.is_fatal());
    }
}

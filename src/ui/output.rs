//! ui::output
//!
//! Human-facing messages from `ap`.
//!
//! Results (pushed branch, proposal URL, config listing) go to stdout so
//! they can be captured by a calling job. Everything about the run itself
//! (warnings, errors, `--debug` notes) goes to stderr, which keeps a diff
//! printed with `--diff` clean on stdout. `--quiet` silences everything
//! except errors.

use std::fmt::Display;

/// How much `ap` says about a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// `--quiet`: errors only
    Quiet,
    /// Results and warnings
    Normal,
    /// `--debug`: also notes about branch resolution and config lookup
    Debug,
}

impl Verbosity {
    /// Verbosity for the global flags. `--quiet` wins over `--debug`.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    fn shows_results(self) -> bool {
        self != Verbosity::Quiet
    }
}

/// Informational line on stdout, hidden by `--quiet`.
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_results() {
        println!("{}", message);
    }
}

/// Outcome of a publish or config change on stdout, hidden by `--quiet`.
pub fn success(message: impl Display, verbosity: Verbosity) {
    print(message, verbosity);
}

/// `[debug]` note on stderr, shown only with `--debug`.
pub fn debug(message: impl Display, verbosity: Verbosity) {
    if verbosity == Verbosity::Debug {
        eprintln!("[debug] {}", message);
    }
}

/// `warning:` line on stderr, hidden by `--quiet`.
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity.shows_results() {
        eprintln!("warning: {}", message);
    }
}

/// `error:` line on stderr. Always shown.
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

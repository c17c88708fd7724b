use stderrlog::{LogLevelNum, Timestamp};

/// How chatty a subcommand is without `-v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandVerbosity {
    /// `fit`: per-epoch losses and learning rate changes at info.
    Training,

    /// `transform` and `predict`: warnings only, stdout carries the results.
    Inference,
}

impl CommandVerbosity {
    /// The `-v` count this command behaves as by default.
    pub fn default_count(self) -> u8 {
        match self {
            CommandVerbosity::Training => 3,
            CommandVerbosity::Inference => 2,
        }
    }
}

/// Logging setup arg group.
#[derive(clap::Args, Debug)]
pub struct LogArgs {
    /// Silence log messages.
    #[clap(short, long)]
    pub quiet: bool,

    /// Raise the log level (-v errors, -vvv training progress, -vvvv batches)
    #[arg(short, long, action = clap::ArgAction::Count, default_value = None)]
    verbose: Option<u8>,

    /// Enable timestamped logging.
    #[clap(short, long)]
    pub ts: bool,
}

impl LogArgs {
    /// The effective level for `command`; `-v` flags replace its default.
    pub fn level(
        &self,
        command: CommandVerbosity,
    ) -> LogLevelNum {
        if self.quiet {
            return LogLevelNum::Off;
        }
        let count = match self.verbose {
            Some(verbose) if verbose > 0 => verbose,
            _ => command.default_count(),
        };
        match count {
            0 => LogLevelNum::Off,
            1 => LogLevelNum::Error,
            2 => LogLevelNum::Warn,
            3 => LogLevelNum::Info,
            4 => LogLevelNum::Debug,
            _ => LogLevelNum::Trace,
        }
    }

    /// Install the stderr logger for `command`.
    pub fn setup_logging(
        &self,
        command: CommandVerbosity,
    ) -> Result<(), Box<dyn std::error::Error>> {
        stderrlog::new()
            .quiet(self.quiet)
            .verbosity(self.level(command))
            .timestamp(if self.ts {
                Timestamp::Second
            } else {
                Timestamp::Off
            })
            .init()?;

        Ok(())
    }
}

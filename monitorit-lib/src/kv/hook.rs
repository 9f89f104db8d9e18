use crate::config::{Component, OptionFn, Options};
use crate::error::Result;
use crate::hook::{CallStart, OperationMetrics, OperationObserver, OperationRecord, Outcome};
use crate::registry::CollectorRegistry;
use std::fmt::Display;
use std::sync::Arc;

/// Pseudo-command under which whole pipelines are timed
pub const PIPELINE_OPERATION: &str = "pipeline";

const COMMAND_LABEL_NAMES: [&str; 2] = ["instance_name", "command"];
const ERROR_LABEL_NAMES: [&str; 3] = ["instance_name", "command", "error"];

/// A command as seen by the client's hook
pub trait Command {
    fn name(&self) -> &str;

    /// Terminal outcome; a nil reply must be reported as `Outcome::NotFound`
    fn outcome(&self) -> Outcome<'_>;
}

/// Result of a finished command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    /// The key did not exist
    Nil,
    Err(String),
}

/// A plain [`Command`] for clients that report name and status separately
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    name: String,
    status: CommandStatus,
}

impl CommandResult {
    pub fn new<S: Into<String>>(name: S, status: CommandStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }

    pub fn ok<S: Into<String>>(name: S) -> Self {
        Self::new(name, CommandStatus::Ok)
    }

    pub fn nil<S: Into<String>>(name: S) -> Self {
        Self::new(name, CommandStatus::Nil)
    }

    pub fn failed<S: Into<String>, E: Display>(name: S, err: E) -> Self {
        Self::new(name, CommandStatus::Err(err.to_string()))
    }

    pub fn status(&self) -> &CommandStatus {
        &self.status
    }
}

impl Command for CommandResult {
    fn name(&self) -> &str {
        &self.name
    }

    fn outcome(&self) -> Outcome<'_> {
        match &self.status {
            CommandStatus::Ok => Outcome::Success,
            CommandStatus::Nil => Outcome::NotFound,
            CommandStatus::Err(e) => Outcome::Failed(e.as_str().into()),
        }
    }
}

/// The client's hook extension point.
///
/// The value returned by a `before_*` method is handed back to the matching
/// `after_*` call. The client passes `None` if it lost track of it.
pub trait ProcessHook: Send + Sync {
    fn before_process(&self, cmd: &dyn Command) -> CallStart;

    fn after_process(&self, start: Option<CallStart>, cmd: &dyn Command);

    fn before_process_pipeline(&self, cmds: &[&dyn Command]) -> CallStart;

    fn after_process_pipeline(&self, start: Option<CallStart>, cmds: &[&dyn Command]);
}

/// Hook that exports metrics of commands and pipelines.
///
/// The following metrics are exported:
///
/// - Single commands (not pipelined)
///   - `single_commands`: histogram of duration
///   - `single_errors`: counter of errors
/// - Pipelined commands
///   - `pipelined_commands`: counter of commands
///   - `pipelined_errors`: counter of errors
///
/// The duration of individual pipelined commands is not collected; the
/// overall pipeline duration is recorded in `single_commands` under the
/// pseudo-command `"pipeline"`.
pub struct CommandHook {
    instance_name: String,
    single: Arc<dyn OperationObserver>,
    pipelined: Arc<dyn OperationObserver>,
}

impl std::fmt::Debug for CommandHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandHook")
            .field("instance_name", &self.instance_name)
            .finish_non_exhaustive()
    }
}

impl CommandHook {
    /// Create a hook and register its collectors with `registry`
    pub fn new<S, I>(registry: &CollectorRegistry, instance_name: S, opts: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = OptionFn>,
    {
        let options = Options::build(Component::KeyValue, opts)?;
        let instance_name = instance_name.into();

        let single_commands = registry.histogram_vec(
            &options,
            "single_commands",
            "Histogram of single key-value commands",
            &COMMAND_LABEL_NAMES,
        )?;
        let pipelined_commands = registry.counter_vec(
            &options,
            "pipelined_commands",
            "Number of pipelined key-value commands",
            &COMMAND_LABEL_NAMES,
        )?;
        let single_errors = registry.counter_vec(
            &options,
            "single_errors",
            "Number of single key-value commands that have failed",
            &ERROR_LABEL_NAMES,
        )?;
        let pipelined_errors = registry.counter_vec(
            &options,
            "pipelined_errors",
            "Number of pipelined key-value commands that have failed",
            &ERROR_LABEL_NAMES,
        )?;

        let single = OperationMetrics::new(instance_name.clone())
            .with_duration(single_commands)
            .with_errors(single_errors);
        let pipelined = OperationMetrics::new(instance_name.clone())
            .with_calls(pipelined_commands)
            .with_errors(pipelined_errors);

        Ok(Self::with_observers(instance_name, Arc::new(single), Arc::new(pipelined)))
    }

    /// Create a hook that reports to custom observers
    pub fn with_observers<S: Into<String>>(
        instance_name: S,
        single: Arc<dyn OperationObserver>,
        pipelined: Arc<dyn OperationObserver>,
    ) -> Self {
        Self {
            instance_name: instance_name.into(),
            single,
            pipelined,
        }
    }

    pub fn instance_name(&self) -> &str {
        &self.instance_name
    }
}

impl ProcessHook for CommandHook {
    fn before_process(&self, _cmd: &dyn Command) -> CallStart {
        CallStart::now()
    }

    fn after_process(&self, start: Option<CallStart>, cmd: &dyn Command) {
        self.single
            .observe(&OperationRecord::timed(cmd.name(), start, cmd.outcome()));
    }

    fn before_process_pipeline(&self, _cmds: &[&dyn Command]) -> CallStart {
        CallStart::now()
    }

    fn after_process_pipeline(&self, start: Option<CallStart>, cmds: &[&dyn Command]) {
        self.single.observe(&OperationRecord::timed(
            PIPELINE_OPERATION,
            start,
            Outcome::Success,
        ));

        for cmd in cmds {
            self.pipelined
                .observe(&OperationRecord::new(cmd.name(), None, cmd.outcome()));
        }
    }
}

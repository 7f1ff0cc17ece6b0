//! External command execution

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use gemstrap_core::{Result, SetupError};

/// A command to run, with the environment it must see
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Variables set on top of the inherited environment
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
    /// Capture stdout instead of streaming it to our stderr
    pub capture: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Shell-like rendering for logs and error messages
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when terminated by a signal
    pub code: Option<i32>,
    /// Empty unless the command was captured
    pub stdout: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

pub trait CommandRunner {
    /// Runs the command to completion. Failing to start it is an error; a
    /// non-zero exit is reported through [`CommandOutput::code`].
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Runs the command and turns a non-zero exit into
    /// [`SetupError::InstallStepFailure`].
    fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(spec)?;
        if output.success() {
            Ok(output)
        } else {
            Err(SetupError::InstallStepFailure {
                command: spec.display(),
                status: match output.code {
                    Some(code) => format!("exit code {}", code),
                    None => "a signal".to_string(),
                },
            })
        }
    }
}

/// Runs commands as child processes of this one
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let program = resolve_program(spec)?;
        tracing::info!("[command]{}", spec.display());

        let mut command = Command::new(&program);
        command.args(&spec.args).envs(&spec.env);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        if spec.capture {
            let output = command.stderr(Stdio::inherit()).output()?;
            Ok(CommandOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            })
        } else {
            // stdout may be read by `eval`, so child output goes to stderr
            let status = command.stdout(Stdio::from(std::io::stderr())).status()?;
            Ok(CommandOutput {
                code: status.code(),
                stdout: String::new(),
            })
        }
    }
}

/// Looks the program up on the PATH the command will see, which may differ
/// from ours after the runtime's `bin` was prepended.
fn resolve_program(spec: &CommandSpec) -> Result<PathBuf> {
    let path = spec
        .env
        .get("PATH")
        .or_else(|| spec.env.get("Path"))
        .cloned()
        .or_else(|| std::env::var("PATH").ok());
    let cwd = match &spec.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir()?,
    };

    which::which_in(&spec.program, path, cwd).map_err(|e| SetupError::InstallStepFailure {
        command: spec.display(),
        status: format!("not found: {}", e),
    })
}

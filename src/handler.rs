//! Source handlers: obtain raw output from a shell command or a file and
//! parse it into samples.
//!
//! Handlers never fail. Every error is logged under the rule's target and
//! degrades to [`Output::nan`], so one broken rule cannot take down a
//! scrape.

use std::path::{Path, PathBuf};

use log::{debug, error};

use crate::output::Output;
use crate::process::{Command, ExecConfig, OutputParser};
use crate::util::RuleLog;

/// A data source bound to one rule
#[derive(Debug, Clone)]
pub enum Handler {
    Shell(ShellHandler),
    File(FileHandler),
}

impl Handler {
    /// Produce a fresh reading
    pub async fn exec(&self) -> Output {
        match self {
            Handler::Shell(shell) => shell.exec().await,
            Handler::File(file) => file.exec().await,
        }
    }

    /// Human readable description of the source
    pub fn describe(&self) -> String {
        match self {
            Handler::Shell(shell) => format!("shell {:?}", shell.command),
            Handler::File(file) => format!("file {}", file.path.display()),
        }
    }
}

/// Runs a command through `sh -c` and parses its standard output
#[derive(Debug, Clone)]
pub struct ShellHandler {
    command: String,
    exec: ExecConfig,
    parser: OutputParser,
    log: RuleLog,
}

impl ShellHandler {
    pub fn new(command: impl Into<String>, exec: ExecConfig, log: RuleLog) -> Self {
        Self {
            command: command.into(),
            exec,
            parser: OutputParser::new(log.clone()),
            log,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub async fn exec(&self) -> Output {
        debug!(target: self.log.target(), "Running command {:?}", self.command);

        let captured = match Command::shell(self.command.as_str()).run(&self.exec).await {
            Ok(captured) => captured,
            Err(e) => {
                match e.partial() {
                    Some(partial) => error!(
                        target: self.log.target(),
                        "Cannot execute command {:?}: {}, stdout={:?} stderr={:?}",
                        self.command,
                        e,
                        partial.stdout_lossy(),
                        partial.stderr_lossy()
                    ),
                    None => error!(target: self.log.target(), "Cannot execute command {:?}: {}", self.command, e),
                }
                return Output::nan();
            }
        };

        if !captured.status.success() {
            error!(
                target: self.log.target(),
                "Command {:?} failed with {}, stdout={:?} stderr={:?}",
                self.command,
                captured.status,
                captured.stdout_lossy(),
                captured.stderr_lossy()
            );
            return Output::nan();
        }

        match self.parser.parse_output(&captured.stdout) {
            Ok(output) => output,
            Err(e) => {
                error!(
                    target: self.log.target(),
                    "Cannot parse output of {:?}: {}, stdout={:?} stderr={:?}",
                    self.command,
                    e,
                    captured.stdout_lossy(),
                    captured.stderr_lossy()
                );
                Output::nan()
            }
        }
    }
}

/// Reads a whole file and parses its contents
#[derive(Debug, Clone)]
pub struct FileHandler {
    path: PathBuf,
    parser: OutputParser,
    log: RuleLog,
}

impl FileHandler {
    pub fn new(path: impl Into<PathBuf>, log: RuleLog) -> Self {
        Self {
            path: path.into(),
            parser: OutputParser::new(log.clone()),
            log,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exec(&self) -> Output {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) => {
                error!(target: self.log.target(), "Cannot read file {}: {}", self.path.display(), e);
                return Output::nan();
            }
        };

        match self.parser.parse_output(&content) {
            Ok(output) => output,
            Err(e) => {
                error!(
                    target: self.log.target(),
                    "Cannot parse file {}: {}, content={:?}",
                    self.path.display(),
                    e,
                    String::from_utf8_lossy(&content)
                );
                Output::nan()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{Labels, Sample};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn shell(command: &str) -> Handler {
        Handler::Shell(ShellHandler::new(command, ExecConfig::default(), RuleLog::for_rule("test")))
    }

    fn file(path: &Path) -> Handler {
        Handler::File(FileHandler::new(path, RuleLog::for_rule("test")))
    }

    #[tokio::test]
    async fn test_shell_plain_value() {
        let out = shell("echo '0.73'").exec().await;
        assert_eq!(out, Output(vec![Sample::new(0.73)]));
    }

    #[tokio::test]
    async fn test_shell_labeled_value() {
        let out = shell(r#"echo 'sensor="cpu" 42.5'"#).exec().await;
        let expected = Labels::from([("sensor".to_string(), "cpu".to_string())]);
        assert_eq!(out, Output(vec![Sample::with_labels(expected, 42.5)]));
    }

    #[tokio::test]
    async fn test_shell_non_zero_exit_is_sentinel() {
        assert!(shell("exit 1").exec().await.is_nan_sentinel());
        assert!(shell("echo 5; exit 2").exec().await.is_nan_sentinel());
    }

    #[tokio::test]
    async fn test_shell_unparsable_output_is_sentinel() {
        assert!(shell("echo 1; echo hello").exec().await.is_nan_sentinel());
    }

    #[tokio::test]
    async fn test_shell_empty_output_is_empty() {
        let out = shell("true").exec().await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_shell_large_output_is_fully_parsed() {
        // 100k lines of "disk 1.5\n" is ~900KB, well past any pipe buffer
        let out = shell("i=0; while [ $i -lt 100000 ]; do echo 'disk 1.5'; i=$((i+1)); done")
            .exec()
            .await;
        assert_eq!(out.len(), 100_000);
        assert!(out.iter().all(|s| s.value == 1.5));
    }

    #[tokio::test]
    async fn test_shell_timeout_is_sentinel() {
        let handler = ShellHandler::new(
            "sleep 30",
            ExecConfig {
                timeout: std::time::Duration::from_millis(100),
                wait_delay: std::time::Duration::from_millis(500),
            },
            RuleLog::for_rule("slow"),
        );
        assert!(handler.exec().await.is_nan_sentinel());
    }

    #[tokio::test]
    async fn test_shell_timeout_ignores_partial_output() {
        let handler = ShellHandler::new(
            "echo 5; sleep 30",
            ExecConfig {
                timeout: std::time::Duration::from_millis(200),
                wait_delay: std::time::Duration::from_millis(500),
            },
            RuleLog::for_rule("half_done"),
        );
        assert!(handler.exec().await.is_nan_sentinel());
    }

    #[tokio::test]
    async fn test_file_contents_are_parsed() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, "cpu 0.5\nmem 0.25").unwrap();

        let out = file(tmp.path()).exec().await;
        assert_eq!(out.len(), 2);
        assert_eq!(out.0[1].value, 0.25);
        assert_eq!(
            out.0[1].labels,
            Some(Labels::from([("type".to_string(), "mem".to_string())]))
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let out = file(&dir.path().join("missing")).exec().await;
        assert!(out.is_nan_sentinel());
    }

    #[tokio::test]
    async fn test_bad_file_content_is_sentinel() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "12\nnot-a-number").unwrap();
        assert!(file(tmp.path()).exec().await.is_nan_sentinel());
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_output() {
        let tmp = NamedTempFile::new().unwrap();
        let out = file(tmp.path()).exec().await;
        assert!(out.is_empty());
    }
}

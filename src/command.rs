//! Command data model for child processes

use std::ffi::CString;
use std::fmt;

use crate::error::{Error, Result};

/// An executable plus its arguments
///
/// Non-empty by construction: the program name always occupies argv[0].
/// The command is read-only while a child executes it; the caller keeps
/// ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    program: String,
    args: Vec<String>,
}

impl Command {
    /// Create a command for `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build a command from a full argv, program first
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Result<Self> {
        let (program, rest) = argv
            .split_first()
            .ok_or_else(|| Error::InvalidCommand("empty argv".to_string()))?;
        Ok(Self {
            program: program.as_ref().to_string(),
            args: rest.iter().map(|s| s.as_ref().to_string()).collect(),
        })
    }

    /// Program path or name (argv[0])
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments after argv[0]
    pub fn args_slice(&self) -> &[String] {
        &self.args
    }

    /// Full argv as C strings for execvp, program included
    ///
    /// Fails if any element contains an interior NUL byte.
    pub fn to_cstring_argv(&self) -> Result<Vec<CString>> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        for s in std::iter::once(&self.program).chain(self.args.iter()) {
            argv.push(CString::new(s.as_str()).map_err(|_| {
                Error::InvalidCommand(format!("argument contains NUL byte: {:?}", s))
            })?);
        }
        Ok(argv)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = Command::new("/bin/echo").arg("hello").arg("world");
        assert_eq!(cmd.program(), "/bin/echo");
        assert_eq!(cmd.args_slice(), ["hello", "world"]);
    }

    #[test]
    fn test_command_from_argv() {
        let cmd = Command::from_argv(&["cat", "-e"]).unwrap();
        assert_eq!(cmd.program(), "cat");
        assert_eq!(cmd.args_slice(), ["-e"]);
    }

    #[test]
    fn test_command_from_empty_argv() {
        let argv: [&str; 0] = [];
        assert!(matches!(
            Command::from_argv(&argv),
            Err(Error::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_cstring_argv_includes_program() {
        let cmd = Command::new("tr").args(["a", "b"]);
        let argv = cmd.to_cstring_argv().unwrap();
        assert_eq!(argv.len(), 3);
        assert_eq!(argv[0].to_str().unwrap(), "tr");
    }

    #[test]
    fn test_cstring_argv_rejects_nul() {
        let cmd = Command::new("echo").arg("a\0b");
        assert!(matches!(
            cmd.to_cstring_argv(),
            Err(Error::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_command_display() {
        let cmd = Command::new("grep").args(["-c", "foo"]);
        assert_eq!(cmd.to_string(), "grep -c foo");
    }
}

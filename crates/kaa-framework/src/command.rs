//! Structured command arguments using clap.
//!
//! [`CommandArgs<T>`] parses the argument text of a command invocation as a
//! clap command line whose program name is the hook. Parse failures and
//! `--help` requests are answered with clap's rendered output.
//!
//! # Example
//!
//! ```rust,ignore
//! use clap::Parser;
//! use kaa_framework::CommandArgs;
//!
//! #[derive(Parser, Clone)]
//! struct Roll {
//!     /// Number of sides
//!     #[arg(short, long, default_value_t = 6)]
//!     sides: u32,
//! }
//!
//! async fn roll(cmd: CommandArgs<Roll>) -> String {
//!     format!("rolling a d{}", cmd.sides)
//! }
//! ```

use clap::Parser;
use kaa_core::{ExtractError, ExtractResult, Invocation};

use crate::extractor::FromInvocation;

/// Arguments parsed into a clap [`Parser`].
#[derive(Debug, Clone)]
pub struct CommandArgs<T: Parser>(pub T);

impl<T: Parser> CommandArgs<T> {
    /// Unwraps the parsed value.
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Parser> std::ops::Deref for CommandArgs<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Parser> FromInvocation for CommandArgs<T> {
    fn from_invocation(invocation: &Invocation) -> ExtractResult<Self> {
        let argv = std::iter::once(invocation.hook().to_string()).chain(shell_split(invocation.args()));
        T::try_parse_from(argv)
            .map(CommandArgs)
            .map_err(|err| ExtractError::Usage(err.to_string().trim_end().to_string()))
    }
}

/// Simple shell-like argument splitting.
///
/// Handles:
/// - Space-separated arguments
/// - Quoted strings (single and double quotes)
/// - Escape sequences within double quotes
pub fn shell_split(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_double_quote => {
                escape_next = true;
            }
            '\'' if !in_double_quote => {
                in_single_quote = !in_single_quote;
            }
            '"' if !in_single_quote => {
                in_double_quote = !in_double_quote;
            }
            ' ' | '\t' if !in_single_quote && !in_double_quote => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        args.push(current);
    }

    args
}

//! Turning received arguments into one command line and back into an argv.

use std::path::Path;

use crate::error::Result;
use crate::error::RunNonRootErr;

/// Joins already-tokenized arguments into one command line.
///
/// Double quotes are backslash-escaped in every argument, and arguments that
/// contain whitespace are wrapped in double quotes, so splitting the result
/// as a POSIX command line restores the original argument boundaries.
pub fn reconstruct<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(|arg| quote_argument(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_argument(arg: &str) -> String {
    let escaped = arg.replace('"', "\\\"");
    if arg.chars().any(char::is_whitespace) {
        format!("\"{escaped}\"")
    } else {
        escaped
    }
}

/// Words that only mean something to a shell when they start a command.
const SHELL_COMMAND_WORDS: &[&str] = &[
    "!", ".", ":", "{", "alias", "break", "case", "cd", "command", "continue", "eval", "exec",
    "exit", "export", "for", "getopts", "hash", "if", "read", "readonly", "return", "set",
    "shift", "source", "times", "trap", "type", "ulimit", "umask", "unalias", "unset", "until",
    "wait", "while",
];

/// True when `command` uses syntax that only a shell can carry out:
/// pipelines, lists, redirections, subshells, expansions, globs, comments,
/// variable assignments, or a builtin or reserved word as the command.
pub fn requires_shell(command: &str) -> bool {
    let mut in_single = false;
    let mut in_double = false;
    let mut escaped = false;
    let mut at_word_start = true;
    for c in command.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        if in_single {
            in_single = c != '\'';
            continue;
        }
        let word_start = std::mem::replace(&mut at_word_start, false);
        match c {
            '\\' => escaped = true,
            '"' => in_double = !in_double,
            // Parameter and command substitution happen inside double quotes.
            '$' | '`' => return true,
            _ if in_double => {}
            '\'' => in_single = true,
            '|' | '&' | ';' | '<' | '>' | '(' | ')' | '*' | '?' | '\n' => return true,
            '~' | '#' if word_start => return true,
            c if c.is_whitespace() => at_word_start = true,
            _ => {}
        }
    }
    shlex::split(command)
        .and_then(|argv| argv.into_iter().next())
        .is_some_and(|first| {
            is_assignment(&first) || SHELL_COMMAND_WORDS.contains(&first.as_str())
        })
}

/// `NAME=value`, where NAME is a valid shell variable name.
fn is_assignment(word: &str) -> bool {
    let Some((name, _)) = word.split_once('=') else {
        return false;
    };
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Splits a command line into the argv that will replace this process.
///
/// Commands needing a shell run as `shell -c command`; everything else is
/// split with POSIX quoting rules and executed directly.
pub fn command_argv(command: &str, shell: &Path) -> Result<Vec<String>> {
    if command.trim().is_empty() {
        return Err(RunNonRootErr::EmptyCommand);
    }
    if requires_shell(command) {
        return Ok(vec![
            shell.to_string_lossy().to_string(),
            "-c".to_string(),
            command.to_string(),
        ]);
    }
    let argv =
        shlex::split(command).ok_or_else(|| RunNonRootErr::CommandParse(command.to_string()))?;
    if argv.is_empty() {
        return Err(RunNonRootErr::EmptyCommand);
    }
    Ok(argv)
}

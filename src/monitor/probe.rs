//! Gateway liveness via the process table.

use std::sync::Arc;

use crate::platform::{CommandRunner, shell_quote};

/// Looks up the gateway's supervised process by command-line pattern.
///
/// When several processes match, the first one `pgrep` reports wins. That is
/// an approximation: nothing guarantees it is the "real" singleton.
pub struct ProcessProbe {
    runner: Arc<dyn CommandRunner>,
    pattern: String,
}

impl ProcessProbe {
    /// Probe for processes whose full command line contains `pattern`.
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, pattern: impl Into<String>) -> Self {
        Self {
            runner,
            pattern: pattern.into(),
        }
    }

    /// Command line used for the lookup.
    ///
    /// The pattern's first character is bracketed (`[o]penclaw`) so the
    /// shell running `pgrep` never matches its own command line.
    #[must_use]
    pub fn command_line(&self) -> String {
        format!("pgrep -f {}", shell_quote(&self_excluding_regex(&self.pattern)))
    }

    /// `Some(pid)` when the gateway is running.
    #[must_use]
    pub fn probe(&self) -> Option<u32> {
        let output = self.runner.run(&self.command_line());
        let pid = first_pid(&output);
        tracing::trace!(pattern = %self.pattern, ?pid, "process probe");
        pid
    }
}

/// First line of `pgrep` output that parses as a nonzero pid.
#[must_use]
pub fn first_pid(output: &str) -> Option<u32> {
    output
        .lines()
        .map(str::trim)
        .find_map(|line| line.parse::<u32>().ok().filter(|pid| *pid > 0))
}

/// Escape `pattern` for an extended regex and bracket its first character.
fn self_excluding_regex(pattern: &str) -> String {
    const META: &[char] = &[
        '\\', '.', '^', '$', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|',
    ];
    let mut out = String::with_capacity(pattern.len() + 4);
    let mut chars = pattern.chars();
    if let Some(first) = chars.next() {
        if first.is_alphanumeric() || first == '-' || first == '_' || first == '/' {
            out.push('[');
            out.push(first);
            out.push(']');
        } else if META.contains(&first) {
            out.push('\\');
            out.push(first);
        } else {
            out.push(first);
        }
    }
    for ch in chars {
        if META.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Runs the gateway's version query.
pub struct VersionQuery {
    runner: Arc<dyn CommandRunner>,
    command: String,
}

impl VersionQuery {
    /// Query that runs `command`; a blank command always yields "".
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>, command: impl Into<String>) -> Self {
        Self {
            runner,
            command: command.into(),
        }
    }

    /// First non-empty output line, trimmed; empty when unavailable.
    #[must_use]
    pub fn query(&self) -> String {
        if self.command.trim().is_empty() {
            return String::new();
        }
        self.runner
            .run(&self.command)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::ScriptedRunner;

    fn probe_with(output: &str) -> ProcessProbe {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("pgrep", output);
        ProcessProbe::new(runner, "openclaw-gateway")
    }

    #[test]
    fn single_match_reports_pid() {
        assert_eq!(probe_with("4242\n").probe(), Some(4242));
    }

    #[test]
    fn first_of_several_matches_wins() {
        assert_eq!(probe_with("300\n200\n100\n").probe(), Some(300));
    }

    #[test]
    fn empty_output_means_stopped() {
        assert_eq!(probe_with("").probe(), None);
    }

    #[test]
    fn garbled_output_means_stopped() {
        assert_eq!(probe_with("pgrep: invalid option\n").probe(), None);
    }

    #[test]
    fn first_pid_skips_noise_lines() {
        assert_eq!(first_pid("warning: something\n  77 \n"), Some(77));
        assert_eq!(first_pid("0\n"), None);
    }

    #[test]
    fn zero_line_does_not_hide_a_later_pid() {
        assert_eq!(first_pid("0\n123\n"), Some(123));
        assert_eq!(probe_with("0\n  0\n88\n").probe(), Some(88));
    }

    #[test]
    fn command_line_brackets_first_char() {
        let probe = probe_with("");
        assert_eq!(probe.command_line(), "pgrep -f '[o]penclaw-gateway'");
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        assert_eq!(self_excluding_regex("gw.node"), "[g]w\\.node");
        assert_eq!(self_excluding_regex(".hidden"), "\\.hidden");
        assert_eq!(self_excluding_regex(""), "");
    }

    #[test]
    fn version_query_takes_first_line() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("--version", "\n  2026.1.5  \nbuild abc\n");
        let query = VersionQuery::new(runner, "openclaw --version");
        assert_eq!(query.query(), "2026.1.5");
    }

    #[test]
    fn version_query_empty_when_unavailable() {
        let runner = Arc::new(ScriptedRunner::new());
        let query = VersionQuery::new(Arc::clone(&runner) as Arc<dyn CommandRunner>, "openclaw --version");
        assert_eq!(query.query(), "");
        let blank = VersionQuery::new(runner, "  ");
        assert_eq!(blank.query(), "");
    }
}

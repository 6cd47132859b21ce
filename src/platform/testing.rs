//! Scripted [`CommandRunner`] for unit tests.

use parking_lot::Mutex;

use super::CommandRunner;

/// Answers commands by substring match and records every invocation.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    responses: Mutex<Vec<(String, String)>>,
    calls: Mutex<Vec<String>>,
    spawned: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer any command containing `needle` with `output`, replacing an
    /// earlier answer for the same needle.
    pub fn respond(&self, needle: &str, output: &str) {
        let mut responses = self.responses.lock();
        responses.retain(|(n, _)| n != needle);
        responses.push((needle.to_string(), output.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn spawned(&self) -> Vec<String> {
        self.spawned.lock().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.contains(needle))
            .count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command_line: &str) -> String {
        self.calls.lock().push(command_line.to_string());
        self.responses
            .lock()
            .iter()
            .find(|(needle, _)| command_line.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or_default()
    }

    fn spawn_detached(&self, command_line: &str) {
        self.spawned.lock().push(command_line.to_string());
    }
}

//! Persisted expert/first-run/start-running flags.
//!
//! The state lives in a small JSON-like side file (`expert.json`) that users
//! may hand-edit. Loading is tolerant: a line counts for a field as soon as
//! it contains the field name and a `true`/`false` token. Partial updates
//! rewrite only the lines of the targeted field and pass every other line
//! through byte-identical, so hand-edited content survives.
//!
//! Persistence failures are never fatal; the miner keeps running with the
//! in-memory state.

use std::fs;
use std::path::{Path, PathBuf};

use crate::prompt::Prompt;

/// Default name of the side file, created next to the config artifacts.
pub const STATE_FILE: &str = "expert.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpertState {
    pub expert_mode: bool,
    pub first_run: bool,
    pub start_running: bool,
}

/// A recognized field of the state file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateField {
    ExpertMode,
    FirstRun,
    StartRunning,
}

impl StateField {
    fn key(self) -> &'static str {
        match self {
            StateField::ExpertMode => "expert_mode",
            StateField::FirstRun => "first_run",
            StateField::StartRunning => "start_running",
        }
    }

    fn replacement_line(self, value: bool) -> String {
        // start_running is the last field in the canonical layout and
        // carries no trailing comma there.
        match self {
            StateField::StartRunning => format!("  \"{}\" : {}", self.key(), value),
            _ => format!("  \"{}\" : {},", self.key(), value),
        }
    }
}

/// Result of [`ExpertStateStore::load`].
#[derive(Clone, Copy, Debug)]
pub struct LoadOutcome {
    pub state: ExpertState,
    pub file_present: bool,
}

enum LineValue {
    True,
    False,
    Malformed,
}

/// A line counts for a field when it names the field; the value is whatever
/// `true`/`false` token follows (after an optional colon).
fn scan_line(line: &str, key: &str) -> Option<LineValue> {
    let idx = line.find(key)?;
    let rest = &line[idx + key.len()..];
    let rest = rest.split_once(':').map_or(rest, |(_, r)| r);
    if rest.contains("true") {
        Some(LineValue::True)
    } else if rest.contains("false") {
        Some(LineValue::False)
    } else {
        Some(LineValue::Malformed)
    }
}

pub struct ExpertStateStore {
    path: PathBuf,
}

impl ExpertStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted state.
    ///
    /// Missing file: first run, not started, expert mode left for the wizard.
    /// Present file: explicit defaults per field (expert on, not first run,
    /// not running), overridden by whatever lines match. A malformed
    /// `expert_mode` value flags the state for reset (`first_run` turns
    /// true); malformed values of the other fields keep the defaults.
    pub fn load(&self) -> LoadOutcome {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => {
                return LoadOutcome {
                    state: ExpertState {
                        expert_mode: false,
                        first_run: true,
                        start_running: false,
                    },
                    file_present: false,
                }
            }
        };

        let mut state = ExpertState {
            expert_mode: true,
            first_run: false,
            start_running: false,
        };

        for line in text.lines() {
            match scan_line(line, StateField::ExpertMode.key()) {
                Some(LineValue::True) => state.expert_mode = true,
                Some(LineValue::False) => state.expert_mode = false,
                Some(LineValue::Malformed) => state.first_run = true,
                None => {}
            }
            match scan_line(line, StateField::FirstRun.key()) {
                Some(LineValue::True) => state.first_run = true,
                Some(LineValue::False) => state.first_run = false,
                Some(LineValue::Malformed) | None => {}
            }
            match scan_line(line, StateField::StartRunning.key()) {
                Some(LineValue::True) => state.start_running = true,
                Some(LineValue::False) => state.start_running = false,
                Some(LineValue::Malformed) | None => {}
            }
        }

        LoadOutcome {
            state,
            file_present: true,
        }
    }

    /// Full rewrite with all three fields. Failures are logged and absorbed.
    pub fn save(&self, state: &ExpertState) {
        let body = format!(
            "{{\n  \"expert_mode\" : {},\n  \"first_run\" : {},\n  \"start_running\" : {}\n}}\n",
            state.expert_mode, state.first_run, state.start_running
        );
        if let Err(e) = fs::write(&self.path, body) {
            log::warn!(
                "Cannot persist miner state to '{}': {e}",
                self.path.display()
            );
        }
    }

    /// Line-preserving patch of a single field. A missing file is a no-op;
    /// unrelated lines pass through byte-identical.
    pub fn update_field(&self, field: StateField, value: bool) {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(_) => return,
        };

        let patched: Vec<String> = text
            .lines()
            .map(|line| {
                if scan_line(line, field.key()).is_some() {
                    field.replacement_line(value)
                } else {
                    line.to_string()
                }
            })
            .collect();

        let mut body = patched.join("\n");
        body.push('\n');
        if let Err(e) = fs::write(&self.path, body) {
            log::warn!(
                "Cannot update '{}' in '{}': {e}",
                field.key(),
                self.path.display()
            );
        }
    }

    /// First-run resolution: decide expert mode (prompting when allowed),
    /// then persist the resolved state.
    pub fn resolve(&self, ask_expert: bool, prompt: &mut dyn Prompt) -> anyhow::Result<ExpertState> {
        let LoadOutcome { mut state, .. } = self.load();

        if state.first_run {
            state.expert_mode = if ask_expert {
                prompt.yes_no("Are you an expert? (y/n):")?
            } else {
                false
            };
        }

        self.save(&state);
        Ok(state)
    }

    /// Persisted epilogue of the first forced start: the configuration now
    /// exists, and the next boot should start mining.
    pub fn complete_first_run(&self) {
        self.update_field(StateField::FirstRun, false);
        self.update_field(StateField::StartRunning, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompt;
    use std::fs;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> ExpertStateStore {
        ExpertStateStore::new(dir.join(STATE_FILE))
    }

    #[test]
    fn missing_file_defaults_to_first_run() {
        let dir = tempdir().expect("tempdir");
        let outcome = store_in(dir.path()).load();
        assert!(!outcome.file_present);
        assert!(outcome.state.first_run);
        assert!(!outcome.state.start_running);
    }

    #[test]
    fn first_invocation_then_config_cycle_persists_the_expected_flags() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());

        let mut prompt = ScriptedPrompt::new(["n"]);
        let resolved = store.resolve(true, &mut prompt).expect("resolve");
        assert!(resolved.first_run);
        assert!(!resolved.expert_mode);

        store.complete_first_run();

        let reloaded = store.load();
        assert!(reloaded.file_present);
        assert!(!reloaded.state.first_run);
        assert!(reloaded.state.start_running);
    }

    #[test]
    fn resolve_without_prompting_forces_non_expert() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let mut prompt = ScriptedPrompt::new(Vec::<String>::new());
        let resolved = store.resolve(false, &mut prompt).expect("resolve");
        assert!(!resolved.expert_mode);
        assert!(prompt.exhausted());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let state = ExpertState {
            expert_mode: true,
            first_run: false,
            start_running: true,
        };
        store.save(&state);
        assert_eq!(store.load().state, state);
    }

    #[test]
    fn update_field_preserves_unrelated_lines_byte_identical() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        let hand_edited = "{\n  // my note\n  \"expert_mode\" : true,\n  \"first_run\" : true,\n  \"start_running\" : false\n}\n";
        fs::write(store.path(), hand_edited).expect("seed file");

        store.update_field(StateField::FirstRun, false);

        let after = fs::read_to_string(store.path()).expect("read back");
        let before_lines: Vec<&str> = hand_edited.lines().collect();
        let after_lines: Vec<&str> = after.lines().collect();
        assert_eq!(before_lines.len(), after_lines.len());
        for (b, a) in before_lines.iter().zip(after_lines.iter()) {
            if b.contains("first_run") {
                assert!(a.contains("false"), "target line must change: {a}");
            } else {
                assert_eq!(b, a, "unrelated line must not change");
            }
        }
        assert!(!store.load().state.first_run);
    }

    #[test]
    fn update_field_on_missing_file_is_a_no_op() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        store.update_field(StateField::StartRunning, true);
        assert!(!store.path().exists());
    }

    #[test]
    fn malformed_expert_mode_flags_a_reset() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        fs::write(
            store.path(),
            "{\n  \"expert_mode\" : maybe,\n  \"start_running\" : true\n}\n",
        )
        .expect("seed file");
        let outcome = store.load();
        assert!(outcome.state.first_run, "malformed expert_mode must reset");
        assert!(outcome.state.start_running);
    }

    #[test]
    fn malformed_secondary_fields_keep_their_defaults() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        fs::write(
            store.path(),
            "{\n  \"expert_mode\" : true,\n  \"first_run\" : wat,\n  \"start_running\" : wat\n}\n",
        )
        .expect("seed file");
        let outcome = store.load();
        assert!(outcome.state.expert_mode);
        assert!(!outcome.state.first_run);
        assert!(!outcome.state.start_running);
    }

    #[test]
    fn absent_fields_take_their_documented_defaults() {
        let dir = tempdir().expect("tempdir");
        let store = store_in(dir.path());
        fs::write(store.path(), "{\n}\n").expect("seed file");
        let outcome = store.load();
        assert!(outcome.file_present);
        assert!(outcome.state.expert_mode);
        assert!(!outcome.state.first_run);
        assert!(!outcome.state.start_running);
    }
}

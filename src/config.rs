use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// What to do when dispatch hits an unassigned opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownOpcodePolicy {
    /// Abort the whole run with a diagnostic (default)
    Fail,
    /// Log the diagnostic and tear down only the offending thread
    TerminateThread,
}

/// Interpreter tuning, loadable from a TOML file by the runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    pub unknown_opcode: UnknownOpcodePolicy,
    /// Seed for a predictable RNG; omit for real randomness
    pub rng_seed: Option<u64>,
    /// Upper bound on scheduler rounds for a run
    pub max_rounds: u64,
    /// Upper bound on instructions a single turn may execute, to catch
    /// scripts that spin without yielding
    pub max_turn_instructions: u64,
    /// Which collected menu entry the headless shell resolves menus with
    pub auto_menu_choice: usize,
    /// Code id the runner registers a loaded blob under
    pub entry_code_id: u32,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            unknown_opcode: UnknownOpcodePolicy::Fail,
            rng_seed: None,
            max_rounds: 100_000,
            max_turn_instructions: 1_000_000,
            auto_menu_choice: 0,
            entry_code_id: 0x0002_0001,
        }
    }
}

impl InterpreterConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = fs::read_to_string(path)
            .map_err(|e| format!("Cannot read config file {}: {}", path.display(), e))?;
        toml::from_str(&text).map_err(|e| format!("Cannot parse {}: {}", path.display(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = InterpreterConfig::default();
        assert_eq!(config.unknown_opcode, UnknownOpcodePolicy::Fail);
        assert_eq!(config.auto_menu_choice, 0);
        assert!(config.rng_seed.is_none());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: InterpreterConfig = toml::from_str(
            r#"
            unknown_opcode = "terminate_thread"
            rng_seed = 42
            "#,
        )
        .unwrap();
        assert_eq!(config.unknown_opcode, UnknownOpcodePolicy::TerminateThread);
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.max_rounds, 100_000);
    }
}

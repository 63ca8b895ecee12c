//! Instruction presets for the system message.

use serde::{Deserialize, Serialize};

use crate::session::{WORKLOG_MARKER, WorklogId};

/// Role line plus an ordered list of directives
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub role: String,
    pub instructions: Vec<String>,
}

const DEFAULT_ROLE: &str = "Helpful CLI Assistant";

const DEFAULT_INSTRUCTIONS: &[&str] = &[
    "You are a helpful CLI assistant that can execute commands and perform file operations.",
    "Always be clear and concise in your responses.",
    "Use the available tools to accomplish tasks when needed.",
    "If you don't know how to answer or complete a task, be honest about it.",
    "When executing commands, ensure they are safe and appropriate.",
    "Provide clear explanations of what you're doing and why.",
    "MANDATORY: Avoid interactive sessions or commands that require user input during execution as they will cause the CLI to get stuck.",
    "MANDATORY: Document every step you execute and its corresponding result with a datetimestamp.",
    "MANDATORY: For every response, document concised summary of the result in log file",
    "MANDATORY: Use the unique log filename provided in the system message for all worklog entries.",
    "MANDATORY: When using tools that support it, always pass the correct log_filename parameter.",
];

impl Default for Preset {
    fn default() -> Self {
        Self {
            role: DEFAULT_ROLE.into(),
            instructions: DEFAULT_INSTRUCTIONS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl Preset {
    /// Render the system message for a session bound to `worklog_id`
    pub fn system_prompt(&self, worklog_id: &WorklogId) -> String {
        let mut prompt = format!("ROLE: {}\nINSTRUCTIONS:\n", self.role);
        for instruction in &self.instructions {
            prompt.push_str("- ");
            prompt.push_str(instruction);
            prompt.push('\n');
        }
        prompt.push_str("\nMANDATORY: ");
        prompt.push_str(WORKLOG_MARKER);
        prompt.push_str(worklog_id.as_str());
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preset_layout() {
        let preset = Preset::default();
        assert_eq!(preset.instructions.len(), 11);

        let prompt = preset.system_prompt(&WorklogId::from_string("worklog_x.log"));
        assert!(prompt.starts_with("ROLE: Helpful CLI Assistant\nINSTRUCTIONS:\n- You are"));
        assert!(prompt.ends_with("MANDATORY: All worklog entries must use this filename: worklog_x.log"));
    }

    #[test]
    fn test_preset_from_json() {
        let preset: Preset =
            serde_json::from_str(r#"{"role": "Reviewer", "instructions": ["Be strict."]}"#).unwrap();
        let prompt = preset.system_prompt(&WorklogId::from_string("a.log"));
        assert!(prompt.contains("ROLE: Reviewer\nINSTRUCTIONS:\n- Be strict.\n"));
    }
}

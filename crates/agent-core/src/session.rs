//! Session Management
//!
//! A session is one logical conversation bound to a worklog. It moves
//! through three states:
//!
//! ```text
//!   FRESH ──┐
//!           ├── finish_turn ──► ACTIVE ──► finish_turn ──► ACTIVE ...
//!   RESUMED ┘
//! ```
//!
//! The worklog id is carried as an explicit field. The legacy text marker in
//! the system message is still written, and parsed when resuming from a
//! transcript that predates the field.

use std::sync::LazyLock;

use chrono::{DateTime, Local, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::message::{Conversation, Message, Role};
use crate::preset::Preset;
use crate::worklog::WorklogStore;

/// Marker text that precedes the worklog id inside the system message
pub const WORKLOG_MARKER: &str = "All worklog entries must use this filename: ";

static MARKER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"All worklog entries must use this filename: ([^\r\n]+)")
        .expect("worklog marker pattern is valid")
});

const REPLAY_HEADER: &str = "\n\n--- PREVIOUS INTERACTIONS (FROM WORKLOG) ---\n";
const REPLAY_FOOTER: &str = "\n--- END OF PREVIOUS INTERACTIONS ---";

/// Worklog identifier (a file name or path)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorklogId(String);

impl WorklogId {
    /// Timestamp-derived id, e.g. `worklog_20261018_093000_1a2b3c4d.log`
    pub fn generate() -> Self {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("worklog_{}_{}.log", stamp, &suffix[..8]))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorklogId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Find the worklog id embedded in a system message
pub fn extract_worklog_id(system_prompt: &str) -> Option<WorklogId> {
    let captured = MARKER_PATTERN.captures(system_prompt)?.get(1)?.as_str().trim();
    if captured.is_empty() {
        None
    } else {
        Some(WorklogId::from_string(captured))
    }
}

/// Lifecycle state of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// No prior transcript; worklog id freshly generated
    Fresh,
    /// Worklog id taken from a caller-supplied log or transcript
    Resumed,
    /// At least one turn completed
    Active,
}

/// What the session keeps in memory after each turn
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRetention {
    /// Only the system message; prior context comes back through worklog replay
    #[default]
    SystemOnly,
    /// The full transcript
    Full,
}

/// Context assembled for one turn of the agent loop
#[derive(Clone, Debug)]
pub struct TurnContext {
    /// The human query of this turn
    pub query: String,
    /// System message (with worklog replay) + retained history + query
    pub messages: Vec<Message>,
}

/// A complete agent session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    /// Worklog this session logs to
    pub worklog_id: WorklogId,

    /// Conversation history; the system message is always first
    pub conversation: Conversation,

    /// Instruction preset the system message was built from
    pub preset: Preset,

    /// Retention policy applied after each turn
    pub retention: HistoryRetention,

    state: SessionState,

    turns: usize,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// New session with a generated worklog id
    pub fn fresh(preset: Preset) -> Self {
        Self::build(preset, WorklogId::generate(), SessionState::Fresh)
    }

    /// Session continuing an existing (or to-be-created) worklog file
    pub fn resume_from_log(preset: Preset, worklog: impl Into<String>) -> Self {
        Self::build(preset, WorklogId::from_string(worklog), SessionState::Resumed)
    }

    /// Session continuing a transcript returned by a previous turn.
    ///
    /// The worklog id is recovered from the system message marker. Without a
    /// usable marker the session starts fresh: a new id is generated and the
    /// system message is rebuilt from the preset, keeping the other messages.
    pub fn resume_from_transcript(preset: Preset, messages: Vec<Message>) -> Self {
        let mut conversation = Conversation::from_messages(messages);
        let found = conversation
            .system()
            .and_then(|m| extract_worklog_id(&m.content));

        let now = Utc::now();
        let (worklog_id, state) = match found {
            Some(id) => (id, SessionState::Resumed),
            None => {
                let id = WorklogId::generate();
                tracing::warn!(
                    worklog = %id,
                    "no worklog marker in transcript, starting a fresh worklog"
                );
                conversation.set_system(preset.system_prompt(&id));
                (id, SessionState::Fresh)
            }
        };

        Self {
            worklog_id,
            conversation,
            preset,
            retention: HistoryRetention::default(),
            state,
            turns: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn build(preset: Preset, worklog_id: WorklogId, state: SessionState) -> Self {
        let now = Utc::now();
        Self {
            conversation: Conversation::with_system_prompt(preset.system_prompt(&worklog_id)),
            worklog_id,
            preset,
            retention: HistoryRetention::default(),
            state,
            turns: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the retention policy
    pub fn with_retention(mut self, retention: HistoryRetention) -> Self {
        self.retention = retention;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Completed turns in this process
    pub fn turns(&self) -> usize {
        self.turns
    }

    pub fn is_first_turn(&self) -> bool {
        self.turns == 0
    }

    /// System message content without worklog replay
    pub fn system_prompt(&self) -> &str {
        self.conversation.system().map_or("", |m| m.content.as_str())
    }

    /// Prepare a turn.
    ///
    /// Appends `USER REQUEST: <query>` to the worklog first, so the request
    /// is durable even if the turn later fails, then reads the full worklog
    /// back and appends it to a copy of the system message. The session
    /// itself is not modified. Worklog failures are logged and skipped.
    pub fn begin_turn(&self, store: &WorklogStore, query: &str) -> TurnContext {
        let id = self.worklog_id.as_str();

        if let Err(e) = store.append(id, format!("USER REQUEST: {query}")) {
            tracing::warn!(worklog = %id, error = %e, "failed to log user request");
        }

        let replay = store.read_all(id).unwrap_or_else(|e| {
            tracing::warn!(worklog = %id, error = %e, "failed to read worklog context");
            String::new()
        });

        let mut system = self.system_prompt().to_string();
        if !replay.is_empty() {
            system.push_str(REPLAY_HEADER);
            system.push_str(&replay);
            system.push_str(REPLAY_FOOTER);
        }

        let mut messages = vec![Message::system(system)];
        if self.retention == HistoryRetention::Full {
            messages.extend(
                self.conversation
                    .messages()
                    .iter()
                    .filter(|m| m.role != Role::System)
                    .cloned(),
            );
        }
        messages.push(Message::user(query));

        TurnContext {
            query: query.to_string(),
            messages,
        }
    }

    /// Record a completed turn and apply the retention policy
    pub fn finish_turn(&mut self, query: &str, answer: &str) {
        self.conversation.push(Message::user(query));
        self.conversation.push(Message::assistant(answer));

        if self.retention == HistoryRetention::SystemOnly {
            self.conversation.clear_history();
        }

        self.state = SessionState::Active;
        self.turns += 1;
        self.touch();
    }

    /// Update the activity timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Message count
    pub fn message_count(&self) -> usize {
        self.conversation.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system_count(messages: &[Message]) -> usize {
        messages.iter().filter(|m| m.role == Role::System).count()
    }

    #[test]
    fn test_fresh_session_has_single_system_message() {
        let session = Session::fresh(Preset::default());

        assert_eq!(session.state(), SessionState::Fresh);
        assert_eq!(session.message_count(), 1);
        assert_eq!(session.conversation.messages()[0].role, Role::System);
        assert!(session.worklog_id.as_str().starts_with("worklog_"));
        assert!(session.worklog_id.as_str().ends_with(".log"));
        assert_eq!(
            extract_worklog_id(session.system_prompt()),
            Some(session.worklog_id.clone())
        );
    }

    #[test]
    fn test_resume_from_transcript_reuses_marker() {
        let original = Session::fresh(Preset::default());
        let transcript = original.conversation.messages().to_vec();

        let resumed = Session::resume_from_transcript(Preset::default(), transcript);
        assert_eq!(resumed.state(), SessionState::Resumed);
        assert_eq!(resumed.worklog_id, original.worklog_id);
    }

    #[test]
    fn test_resume_without_marker_generates_new_id() {
        let original = Session::fresh(Preset::default());
        let transcript = vec![
            Message::system("ROLE: something without a marker"),
            Message::user("earlier question"),
        ];

        let resumed = Session::resume_from_transcript(Preset::default(), transcript);
        assert_eq!(resumed.state(), SessionState::Fresh);
        assert_ne!(resumed.worklog_id, original.worklog_id);
        assert_eq!(
            extract_worklog_id(resumed.system_prompt()),
            Some(resumed.worklog_id.clone())
        );
        assert_eq!(system_count(resumed.conversation.messages()), 1);
        assert_eq!(resumed.message_count(), 2);
    }

    #[test]
    fn test_resume_without_system_message_is_fresh() {
        let resumed =
            Session::resume_from_transcript(Preset::default(), vec![Message::user("hi")]);
        assert_eq!(resumed.state(), SessionState::Fresh);
        assert_eq!(resumed.conversation.messages()[0].role, Role::System);
    }

    #[test]
    fn test_extract_worklog_id_variants() {
        let text = "ROLE: x\n\nMANDATORY: All worklog entries must use this filename: /tmp/a b.log\n";
        assert_eq!(extract_worklog_id(text), Some(WorklogId::from_string("/tmp/a b.log")));
        assert_eq!(extract_worklog_id("All worklog entries must use this filename:    "), None);
        assert_eq!(extract_worklog_id("nothing here"), None);
    }

    #[test]
    fn test_begin_turn_logs_request_and_replays_worklog() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorklogStore::new(dir.path());
        let session = Session::resume_from_log(Preset::default(), "w.log");
        store.append("w.log", "earlier entry").unwrap();

        let ctx = session.begin_turn(&store, "list files in current directory");

        assert_eq!(ctx.messages.len(), 2);
        let system = &ctx.messages[0].content;
        assert!(system.starts_with(session.system_prompt()));
        assert!(system.contains("--- PREVIOUS INTERACTIONS (FROM WORKLOG) ---"));
        assert!(system.contains("earlier entry"));
        assert!(system.contains("USER REQUEST: list files in current directory"));
        assert!(system.ends_with("--- END OF PREVIOUS INTERACTIONS ---"));
        assert_eq!(ctx.messages[1].role, Role::User);

        // The session's own system message is not augmented.
        assert!(!session.system_prompt().contains("PREVIOUS INTERACTIONS"));
        assert_eq!(store.entries("w.log").unwrap().len(), 2);
    }

    #[test]
    fn test_begin_turn_survives_unwritable_worklog() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the log file should be makes open() fail.
        std::fs::create_dir(dir.path().join("blocked.log")).unwrap();
        let store = WorklogStore::new(dir.path());
        let session = Session::resume_from_log(Preset::default(), "blocked.log");

        let ctx = session.begin_turn(&store, "hello");
        assert_eq!(ctx.messages[0].content, session.system_prompt());
        assert_eq!(ctx.messages[1].content, "hello");
    }

    #[test]
    fn test_finish_turn_system_only_retention() {
        let mut session = Session::fresh(Preset::default());
        session.finish_turn("q", "a");

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.message_count(), 1);
        assert!(!session.is_first_turn());
    }

    #[test]
    fn test_full_retention_threads_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorklogStore::new(dir.path());
        let mut session =
            Session::resume_from_log(Preset::default(), "full.log").with_retention(HistoryRetention::Full);

        session.finish_turn("first", "answer one");
        let ctx = session.begin_turn(&store, "second");

        assert_eq!(ctx.messages.len(), 4);
        assert_eq!(system_count(&ctx.messages), 1);
        assert_eq!(ctx.messages[0].role, Role::System);
        assert_eq!(ctx.messages[1].content, "first");
        assert_eq!(ctx.messages[2].content, "answer one");
        assert_eq!(ctx.messages[3].content, "second");
    }
}

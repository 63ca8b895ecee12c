//! Interactive prompt and single-turn execution.

use agent_core::CancellationToken;
use agent_mcp::ToolDescriptor;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::assistant::Assistant;

pub const PROMPT: &str = ">>> ";

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "q"];

/// What a line typed at the prompt asks for
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Exit,
    Empty,
    Query(String),
}

impl Input {
    pub fn classify(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            Self::Empty
        } else if EXIT_WORDS.iter().any(|w| trimmed.eq_ignore_ascii_case(w)) {
            Self::Exit
        } else {
            Self::Query(trimmed.to_string())
        }
    }
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Completed,
    Interrupted,
}

fn print_tools(tools: &[ToolDescriptor]) {
    println!("\nAvailable tools:");
    for tool in tools {
        println!("  - {}: {}", tool.name, tool.description);
    }
    println!();
}

/// Await `turn` unless `interrupt` fires first.
///
/// The interrupt is polled first, so when both are ready (a Ctrl-C that
/// also killed the tool server) the turn counts as interrupted.
async fn interruptible<T>(
    turn: impl Future<Output = T>,
    interrupt: impl Future<Output = ()>,
) -> Option<T> {
    tokio::select! {
        biased;
        () = interrupt => None,
        output = turn => Some(output),
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Run one query, printing the answer or the error.
///
/// Ctrl-C while the turn is running cancels it.
pub async fn run_query(assistant: &mut Assistant, query: &str) -> TurnStatus {
    let cancel = CancellationToken::new();

    match interruptible(assistant.run_turn(query, &cancel, print_tools), ctrl_c()).await {
        Some(Ok(answer)) => {
            println!("\n=== Result ===");
            println!("{answer}");
            TurnStatus::Completed
        }
        Some(Err(e)) => {
            tracing::debug!(error = %e, "turn failed");
            eprintln!("Error: {}", e.user_message());
            TurnStatus::Completed
        }
        None => {
            cancel.cancel();
            tracing::debug!("turn interrupted");
            TurnStatus::Interrupted
        }
    }
}

/// Where prompt lines come from
pub trait LineSource {
    fn read_line(&mut self) -> rustyline::Result<String>;

    /// Record a submitted query for recall
    fn remember(&mut self, _line: &str) {}
}

impl LineSource for DefaultEditor {
    fn read_line(&mut self) -> rustyline::Result<String> {
        // Blocks on the terminal
        tokio::task::block_in_place(|| self.readline(PROMPT))
    }

    fn remember(&mut self, line: &str) {
        if let Err(e) = self.add_history_entry(line) {
            tracing::debug!(error = %e, "history not updated");
        }
    }
}

/// Read-evaluate loop on the terminal.
pub async fn run(assistant: &mut Assistant) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new()?;
    run_with(assistant, &mut editor).await
}

/// Read-evaluate loop until an exit word, Ctrl-C or end of input.
pub async fn run_with(assistant: &mut Assistant, lines: &mut impl LineSource) -> anyhow::Result<()> {
    loop {
        match lines.read_line() {
            Ok(line) => match Input::classify(&line) {
                Input::Exit => {
                    println!("Goodbye!");
                    break;
                }
                Input::Empty => {}
                Input::Query(query) => {
                    lines.remember(&query);
                    if run_query(assistant, &query).await == TurnStatus::Interrupted {
                        println!("\nGoodbye!");
                        break;
                    }
                }
            },
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    use agent_core::WorklogStore;

    use crate::testing::{NeverCalled, offline_config};

    /// Typed lines, then end of input
    struct Script(VecDeque<&'static str>);

    impl LineSource for Script {
        fn read_line(&mut self) -> rustyline::Result<String> {
            self.0
                .pop_front()
                .map(String::from)
                .ok_or(ReadlineError::Eof)
        }
    }

    #[test]
    fn test_exit_words_are_case_insensitive() {
        for word in ["exit", "QUIT", "Q", "  Exit  "] {
            assert_eq!(Input::classify(word), Input::Exit, "{word}");
        }
    }

    #[test]
    fn test_empty_input_reprompts() {
        assert_eq!(Input::classify(""), Input::Empty);
        assert_eq!(Input::classify("   \t"), Input::Empty);
    }

    #[test]
    fn test_query_is_trimmed() {
        assert_eq!(
            Input::classify("  list files  "),
            Input::Query("list files".into())
        );
        assert_eq!(Input::classify("quitting time"), Input::Query("quitting time".into()));
    }

    #[tokio::test]
    async fn test_exit_word_stops_before_any_turn() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorklogStore::new(dir.path());
        let mut assistant = Assistant::new(
            std::sync::Arc::new(NeverCalled),
            offline_config(&crate::config::Cli::default()),
            store.clone(),
        );
        let mut script = Script(VecDeque::from(["", "  ", "EXIT", "list files"]));

        run_with(&mut assistant, &mut script).await.unwrap();

        assert_eq!(script.0, ["list files"]);
        assert!(assistant.session().is_first_turn());
        assert!(!store.exists(assistant.session().worklog_id.as_str()));
    }

    #[tokio::test]
    async fn test_end_of_input_ends_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut assistant = Assistant::new(
            std::sync::Arc::new(NeverCalled),
            offline_config(&crate::config::Cli::default()),
            WorklogStore::new(dir.path()),
        );
        run_with(&mut assistant, &mut Script(VecDeque::new())).await.unwrap();
        assert!(assistant.session().is_first_turn());
    }

    #[tokio::test]
    async fn test_interrupt_wins_over_a_finished_turn() {
        let interrupted = interruptible(std::future::ready(1), std::future::ready(())).await;
        assert_eq!(interrupted, None);

        let finished = interruptible(std::future::ready(1), std::future::pending()).await;
        assert_eq!(finished, Some(1));
    }

    #[tokio::test]
    async fn test_interrupt_during_a_slow_turn() {
        let turn = tokio::time::sleep(Duration::from_secs(30));
        let interrupt = tokio::time::sleep(Duration::from_millis(10));
        assert!(interruptible(turn, interrupt).await.is_none());
    }
}

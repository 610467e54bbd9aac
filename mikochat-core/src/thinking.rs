//! Two-phase "thinking" protocol.
//!
//! The first request asks only for reasoning between two sentinel markers;
//! the second asks only for the final answer over the same history window.
//! Reasoning is display-only and never becomes part of the history.
//!
//! ```text
//! Idle -> ThinkingRequested -> ReasoningReceived -> FinalRequested -> Done
//!              \___________________ Error ___________________/
//! ```

use crate::error::Error;
use crate::services::CompletionService;
use crate::types::ChatMessage;

pub const THINKING_START: &str = "[THINKING_PROCESS_START]";
pub const THINKING_END: &str = "[THINKING_PROCESS_END]";

/// System prompt for the reasoning phase.
pub fn thinking_prompt(system_prompt: &str) -> String {
    format!(
        "{system_prompt}\n\n[Instruction: Thinking Mode is active. You MUST ONLY output your step-by-step thinking \
         process or reasoning to arrive at the answer. Use headings, bullet points, or numbered lists for clarity. \
         Surround your entire thinking process output with the delimiters {THINKING_START} and {THINKING_END}. \
         DO NOT include the final answer in this response. The final answer will be requested in a subsequent step.]"
    )
}

/// System prompt for the final-answer phase.
pub fn final_answer_prompt(system_prompt: &str) -> String {
    format!(
        "{system_prompt}\n\n[Instruction: You have just completed a thinking process for the user's request. \
         Based *strictly* on the conclusion reached during that thinking process (which you should recall but not \
         repeat here), provide ONLY the final, concise answer. Do not add any conversational filler, introductory \
         phrases (like \"The final answer is:\", \"Based on my reasoning:\", etc.), explanations, or summaries. \
         Output *only* the answer itself.]"
    )
}

/// The text strictly between the first start marker and the first end
/// marker, trimmed. Falls back to the whole response.
pub fn extract_reasoning(raw: &str) -> String {
    if let (Some(start), Some(end)) = (raw.find(THINKING_START), raw.find(THINKING_END)) {
        if let Some(inner) = raw.get(start + THINKING_START.len()..end).filter(|_| start < end) {
            return inner.trim().to_string();
        }
    }
    raw.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    ThinkingRequested,
    ReasoningReceived,
    FinalRequested,
    Done,
    Error,
}

/// Which request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedPhase {
    Thinking,
    Final,
}

#[derive(Debug)]
pub struct ThinkingFailure {
    pub phase: FailedPhase,
    pub error: Error,
}

/// One two-phase turn over a fixed history window.
pub struct ThinkingTurn {
    phase: Phase,
    system_prompt: String,
    window: Vec<ChatMessage>,
}

impl ThinkingTurn {
    /// `window` is the outbound history, without any system message.
    pub fn new(system_prompt: impl Into<String>, window: Vec<ChatMessage>) -> Self {
        Self {
            phase: Phase::Idle,
            system_prompt: system_prompt.into(),
            window,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn request(&self, system: String) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.window.len() + 1);
        messages.push(ChatMessage::system(system));
        messages.extend(self.window.iter().cloned());
        messages
    }

    /// Run both phases in order.
    ///
    /// `on_reasoning` sees the extracted reasoning before the final request is
    /// issued. A failure in the first phase skips the second.
    pub async fn run(
        &mut self,
        completion: &dyn CompletionService,
        mut on_reasoning: impl FnMut(&str) + Send,
    ) -> Result<String, ThinkingFailure> {
        self.phase = Phase::ThinkingRequested;
        let request = self.request(thinking_prompt(&self.system_prompt));
        let raw = match completion.complete(&request).await {
            Ok(raw) => raw,
            Err(error) => {
                self.phase = Phase::Error;
                tracing::warn!(error = %error, "Thinking phase failed");
                return Err(ThinkingFailure {
                    phase: FailedPhase::Thinking,
                    error,
                });
            }
        };

        self.phase = Phase::ReasoningReceived;
        let reasoning = extract_reasoning(&raw);
        tracing::debug!(chars = reasoning.len(), "Reasoning received");
        on_reasoning(&reasoning);

        self.phase = Phase::FinalRequested;
        let request = self.request(final_answer_prompt(&self.system_prompt));
        match completion.complete(&request).await {
            Ok(answer) => {
                self.phase = Phase::Done;
                Ok(answer)
            }
            Err(error) => {
                self.phase = Phase::Error;
                tracing::warn!(error = %error, "Final answer phase failed");
                Err(ThinkingFailure {
                    phase: FailedPhase::Final,
                    error,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<crate::Result<String>>>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl Scripted {
        fn new(replies: Vec<crate::Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionService for Scripted {
        async fn complete(&self, messages: &[ChatMessage]) -> crate::Result<String> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.replies.lock().unwrap().pop_front().unwrap()
        }
    }

    #[test]
    fn extracts_text_between_markers() {
        let raw = "preamble [THINKING_PROCESS_START] step one step two [THINKING_PROCESS_END] ignored tail";
        assert_eq!(extract_reasoning(raw), "step one step two");
    }

    #[test]
    fn missing_or_reversed_markers_fall_back_to_raw() {
        let only_start = "[THINKING_PROCESS_START] half";
        assert_eq!(extract_reasoning(only_start), only_start);
        let reversed = "[THINKING_PROCESS_END] x [THINKING_PROCESS_START]";
        assert_eq!(extract_reasoning(reversed), reversed);
        assert_eq!(extract_reasoning("plain"), "plain");
    }

    #[test]
    fn prompts_extend_the_base_prompt() {
        let p = thinking_prompt("BASE");
        assert!(p.starts_with("BASE\n\n[Instruction: Thinking Mode is active."));
        assert!(p.contains(THINKING_START) && p.contains(THINKING_END));
        assert!(final_answer_prompt("BASE").starts_with("BASE\n\n[Instruction: You have just completed"));
    }

    #[tokio::test]
    async fn both_phases_share_the_window() {
        let service = Scripted::new(vec![
            Ok("[THINKING_PROCESS_START] a then b [THINKING_PROCESS_END]".to_string()),
            Ok("42".to_string()),
        ]);
        let window = vec![ChatMessage::user("question")];
        let mut turn = ThinkingTurn::new("SYS", window.clone());
        let mut reasoning = String::new();

        let answer = turn
            .run(&service, |r| reasoning = r.to_string())
            .await
            .unwrap();

        assert_eq!(answer, "42");
        assert_eq!(reasoning, "a then b");
        assert_eq!(turn.phase(), Phase::Done);

        let seen = service.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0][1..], window[..]);
        assert_eq!(seen[1][1..], window[..]);
        assert!(seen[0][0].content.text().contains("Thinking Mode is active"));
        assert!(seen[1][0].content.text().contains("final, concise answer"));
    }

    #[tokio::test]
    async fn thinking_failure_skips_final_phase() {
        let service = Scripted::new(vec![Err(Error::service("completion", "boom"))]);
        let mut turn = ThinkingTurn::new("SYS", vec![ChatMessage::user("q")]);
        let mut called = false;

        let failure = turn.run(&service, |_| called = true).await.unwrap_err();

        assert_eq!(failure.phase, FailedPhase::Thinking);
        assert_eq!(turn.phase(), Phase::Error);
        assert!(!called);
        assert_eq!(service.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn final_failure_reports_final_phase() {
        let service = Scripted::new(vec![
            Ok("reasoning".to_string()),
            Err(Error::service("completion", "timeout")),
        ]);
        let mut turn = ThinkingTurn::new("SYS", vec![]);
        let failure = turn.run(&service, |_| {}).await.unwrap_err();
        assert_eq!(failure.phase, FailedPhase::Final);
        assert_eq!(turn.phase(), Phase::Error);
    }
}

//! Digest conversation state, trigger policy, and history compaction.
//!
//! [`DigestState`] is owned exclusively by the session controller task — no
//! locks, no sharing.  Workers receive snapshots and return results; only
//! the controller mutates.

use std::time::Instant;

use crate::config::DigestConfig;
use crate::llm::{prompt, ChatMessage, ChatResponse};

// ---------------------------------------------------------------------------
// DigestState
// ---------------------------------------------------------------------------

/// Everything the digest loop knows about the session so far.
#[derive(Debug)]
pub struct DigestState {
    /// Chat history: system message, then user/assistant pairs per digest.
    pub messages: Vec<ChatMessage>,
    /// Formatted transcript lines waiting for the next digest.
    pub buffer: Vec<String>,
    /// Every formatted transcript line of the session.
    pub all_lines: Vec<String>,
    /// Successful digests so far.
    pub digest_count: u64,
    /// Failed digest calls since the last success.
    pub consecutive_failures: u32,
    /// When the last digest completed (session start before the first).
    pub last_digest_time: Instant,
    /// Prompt token count reported by the last digest call.
    pub prompt_tokens: u64,
}

impl DigestState {
    /// Fresh state with only the template's system message in history.
    pub fn new(system_prompt: &str) -> Self {
        Self {
            messages: vec![ChatMessage::system(system_prompt)],
            buffer: Vec::new(),
            all_lines: Vec::new(),
            digest_count: 0,
            consecutive_failures: 0,
            last_digest_time: Instant::now(),
            prompt_tokens: 0,
        }
    }

    /// Record newly transcribed lines.
    pub fn append_lines(&mut self, lines: &[String]) {
        self.buffer.extend_from_slice(lines);
        self.all_lines.extend_from_slice(lines);
    }

    /// Snapshot-and-drain the buffer for a digest launch.
    ///
    /// Lines arriving while the call is in flight accumulate in the (now
    /// empty) buffer and count toward the next trigger.
    pub fn take_buffer(&mut self) -> Vec<String> {
        std::mem::take(&mut self.buffer)
    }

    /// Splice a failed launch's snapshot back in front of whatever arrived
    /// since, so no transcript material is lost and order is preserved.
    pub fn restore_buffer(&mut self, mut snapshot: Vec<String>) {
        snapshot.append(&mut self.buffer);
        self.buffer = snapshot;
    }

    /// Merge a successful digest call into history.
    pub fn record_success(&mut self, user_message: String, response: &ChatResponse) {
        self.messages.push(ChatMessage::user(user_message));
        self.messages
            .push(ChatMessage::assistant(response.content.clone()));
        self.digest_count += 1;
        self.consecutive_failures = 0;
        self.prompt_tokens = response.prompt_tokens;
        self.last_digest_time = Instant::now();
    }

    /// Record a failed digest call.  The previous digest stays intact.
    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
    }

    /// Markdown of the most recent digest, if any.
    pub fn latest_digest(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "assistant")
            .map(|m| m.content.as_str())
    }

    /// The last `n` transcript lines (for quick-action prompts).
    pub fn recent_lines(&self, n: usize) -> &[String] {
        let start = self.all_lines.len().saturating_sub(n);
        &self.all_lines[start..]
    }

    /// True when the history has grown past the compaction threshold.
    pub fn needs_compaction(&self, threshold: u64) -> bool {
        self.prompt_tokens >= threshold
    }
}

// ---------------------------------------------------------------------------
// Trigger policy
// ---------------------------------------------------------------------------

/// Decide whether a digest should launch now.
///
/// Fires when enough lines have buffered **and** either the minimum interval
/// elapsed or the line cap was hit (the cap bounds prompt size under rapid
/// speech, ignoring the clock).
pub fn should_trigger_digest(state: &DigestState, config: &DigestConfig, now: Instant) -> bool {
    let lines = state.buffer.len() as u32;
    if lines < config.min_lines {
        return false;
    }
    if lines >= config.line_cap() {
        return true;
    }
    let elapsed = now.duration_since(state.last_digest_time).as_secs_f32();
    elapsed >= config.min_interval
}

// ---------------------------------------------------------------------------
// Compaction
// ---------------------------------------------------------------------------

/// Collapse the chat history to exactly three messages:
/// `[system, compacted-user, latest-assistant]`, and reset the token count.
///
/// No-op when there is no assistant message yet.  Idempotent: compacting an
/// already-compacted history reproduces it exactly.
pub fn compact_messages(state: &mut DigestState) {
    let Some(system) = state.messages.iter().find(|m| m.role == "system").cloned() else {
        return;
    };
    let Some(assistant) = state
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "assistant")
        .cloned()
    else {
        return;
    };

    let compacted_user = ChatMessage::user(prompt::compaction_message(&assistant.content));
    state.messages = vec![system, compacted_user, assistant];
    state.prompt_tokens = 0;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> DigestConfig {
        DigestConfig {
            min_lines: 15,
            min_interval: 60.0,
            max_lines: Some(50),
            ..DigestConfig::default()
        }
    }

    fn state_with_lines(n: usize) -> DigestState {
        let mut s = DigestState::new("system");
        let lines: Vec<String> = (0..n).map(|i| format!("line {i}")).collect();
        s.append_lines(&lines);
        s
    }

    fn response(content: &str, prompt_tokens: u64) -> ChatResponse {
        ChatResponse {
            content: content.into(),
            prompt_tokens,
        }
    }

    // ---- trigger policy -----------------------------------------------------

    #[test]
    fn no_trigger_below_min_lines() {
        let s = state_with_lines(14);
        let later = s.last_digest_time + Duration::from_secs(600);
        assert!(!should_trigger_digest(&s, &config(), later));
    }

    #[test]
    fn no_trigger_before_min_interval() {
        let s = state_with_lines(20);
        let soon = s.last_digest_time + Duration::from_secs(30);
        assert!(!should_trigger_digest(&s, &config(), soon));
    }

    #[test]
    fn triggers_at_min_lines_and_interval() {
        let s = state_with_lines(15);
        let later = s.last_digest_time + Duration::from_secs(60);
        assert!(should_trigger_digest(&s, &config(), later));
    }

    #[test]
    fn line_cap_overrides_interval() {
        let s = state_with_lines(50);
        let soon = s.last_digest_time + Duration::from_secs(1);
        assert!(should_trigger_digest(&s, &config(), soon));
    }

    #[test]
    fn default_cap_is_twice_min_lines() {
        let cfg = DigestConfig {
            max_lines: None,
            ..config()
        };
        let s = state_with_lines(30);
        let soon = s.last_digest_time + Duration::from_secs(1);
        assert!(should_trigger_digest(&s, &cfg, soon));
    }

    // ---- buffer snapshot / restore ------------------------------------------

    #[test]
    fn take_buffer_drains_but_keeps_all_lines() {
        let mut s = state_with_lines(3);
        let snapshot = s.take_buffer();
        assert_eq!(snapshot.len(), 3);
        assert!(s.buffer.is_empty());
        assert_eq!(s.all_lines.len(), 3);
    }

    #[test]
    fn restore_splices_snapshot_before_new_arrivals() {
        let mut s = state_with_lines(2);
        let snapshot = s.take_buffer();
        s.append_lines(&["during call".to_string()]);

        s.restore_buffer(snapshot);
        assert_eq!(s.buffer, vec!["line 0", "line 1", "during call"]);
    }

    #[test]
    fn lines_during_call_count_toward_next_trigger() {
        let mut s = state_with_lines(20);
        let _snapshot = s.take_buffer();
        let lines: Vec<String> = (0..15).map(|i| format!("late {i}")).collect();
        s.append_lines(&lines);

        // A success does not touch the buffer: the 15 late lines still
        // satisfy min_lines for the next round.
        s.record_success("user".into(), &response("# Digest #1", 100));
        let later = s.last_digest_time + Duration::from_secs(60);
        assert!(should_trigger_digest(&s, &config(), later));
    }

    // ---- success / failure --------------------------------------------------

    #[test]
    fn success_appends_pair_and_resets_failures() {
        let mut s = state_with_lines(0);
        s.consecutive_failures = 2;
        s.record_success("the lines".into(), &response("# Digest #1", 1234));

        assert_eq!(s.messages.len(), 3); // system + user + assistant
        assert_eq!(s.digest_count, 1);
        assert_eq!(s.consecutive_failures, 0);
        assert_eq!(s.prompt_tokens, 1234);
        assert_eq!(s.latest_digest(), Some("# Digest #1"));
    }

    #[test]
    fn failure_leaves_previous_digest_intact() {
        let mut s = state_with_lines(0);
        s.record_success("u".into(), &response("# Digest #1", 10));
        s.record_failure();
        s.record_failure();

        assert_eq!(s.consecutive_failures, 2);
        assert_eq!(s.digest_count, 1);
        assert_eq!(s.latest_digest(), Some("# Digest #1"));
    }

    // ---- recent_lines -------------------------------------------------------

    #[test]
    fn recent_lines_returns_tail() {
        let s = state_with_lines(60);
        let recent = s.recent_lines(50);
        assert_eq!(recent.len(), 50);
        assert_eq!(recent[0], "line 10");
        assert_eq!(recent[49], "line 59");
    }

    #[test]
    fn recent_lines_handles_short_sessions() {
        let s = state_with_lines(3);
        assert_eq!(s.recent_lines(50).len(), 3);
    }

    // ---- compaction ---------------------------------------------------------

    #[test]
    fn compaction_collapses_to_three_messages() {
        let mut s = state_with_lines(0);
        s.record_success("u1".into(), &response("# Digest #1", 10));
        s.record_success("u2".into(), &response("# Digest #2", 200_000));
        assert_eq!(s.messages.len(), 5);
        assert!(s.needs_compaction(100_000));

        compact_messages(&mut s);

        assert_eq!(s.messages.len(), 3);
        assert_eq!(s.messages[0].role, "system");
        assert_eq!(s.messages[1].role, "user");
        assert!(s.messages[1].content.contains("# Digest #2"));
        assert_eq!(s.messages[2].role, "assistant");
        assert_eq!(s.messages[2].content, "# Digest #2");
        assert_eq!(s.prompt_tokens, 0);
    }

    #[test]
    fn compaction_is_idempotent() {
        let mut s = state_with_lines(0);
        s.record_success("u1".into(), &response("# Digest #1", 10));
        s.record_success("u2".into(), &response("# Digest #2", 20));

        compact_messages(&mut s);
        let once = s.messages.clone();
        compact_messages(&mut s);

        assert_eq!(s.messages, once);
    }

    #[test]
    fn compaction_without_digest_is_noop() {
        let mut s = state_with_lines(5);
        compact_messages(&mut s);
        assert_eq!(s.messages.len(), 1);
    }
}

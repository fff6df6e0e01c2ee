//! Pure prompt builders for digest and quick-action calls.
//!
//! Templates are plain strings with `{placeholder}` markers bound by simple
//! substitution:
//!
//! | Placeholder           | Bound to                                      |
//! |-----------------------|-----------------------------------------------|
//! | `{line_count}`        | number of new transcript lines                |
//! | `{new_lines}`         | the new transcript lines, one per line        |
//! | `{user_context}`      | free-text context set by the user             |
//! | `{full_transcript}`   | every line of the session (final digest only) |
//! | `{digest_markdown}`   | latest digest markdown (quick actions)        |
//! | `{recent_transcript}` | recent transcript lines (quick actions)       |

// ---------------------------------------------------------------------------
// Digest prompts
// ---------------------------------------------------------------------------

/// Bind a periodic digest user message.
pub fn build_digest_prompt(template: &str, new_lines: &[String], user_context: &str) -> String {
    template
        .replace("{line_count}", &new_lines.len().to_string())
        .replace("{new_lines}", &new_lines.join("\n"))
        .replace("{user_context}", user_context)
}

/// Bind the forced final digest user message (adds the full transcript).
pub fn build_final_prompt(
    template: &str,
    new_lines: &[String],
    all_lines: &[String],
    user_context: &str,
) -> String {
    build_digest_prompt(template, new_lines, user_context)
        .replace("{full_transcript}", &all_lines.join("\n"))
}

// ---------------------------------------------------------------------------
// Quick actions
// ---------------------------------------------------------------------------

/// Bind a quick-action prompt against the latest digest and recent lines.
///
/// Non-empty user context is appended after the template so every action
/// sees it without each template having to opt in.
pub fn build_quick_action_prompt(
    template: &str,
    digest_markdown: &str,
    recent_lines: &[String],
    user_context: &str,
) -> String {
    let mut prompt = template
        .replace("{digest_markdown}", digest_markdown)
        .replace("{recent_transcript}", &recent_lines.join("\n"));

    if !user_context.is_empty() {
        prompt.push_str("\n\nAdditional context from the user: ");
        prompt.push_str(user_context);
    }
    prompt
}

// ---------------------------------------------------------------------------
// Compaction
// ---------------------------------------------------------------------------

/// The user message that replaces the collapsed history during compaction.
pub fn compaction_message(digest_markdown: &str) -> String {
    format!(
        "(Prior conversation compacted) Current session state:\n\n{digest_markdown}\n\n\
         Continue analyzing the conversation from this state."
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn digest_prompt_binds_all_placeholders() {
        let out = build_digest_prompt(
            "n={line_count}\n{new_lines}\nctx={user_context}",
            &lines(&["[00:00:01] hello", "[00:00:05] world"]),
            "weekly sync",
        );
        assert!(out.contains("n=2"));
        assert!(out.contains("[00:00:01] hello\n[00:00:05] world"));
        assert!(out.contains("ctx=weekly sync"));
    }

    #[test]
    fn digest_prompt_empty_context_binds_empty() {
        let out = build_digest_prompt("ctx=[{user_context}]", &lines(&["a"]), "");
        assert_eq!(out, "ctx=[]");
    }

    #[test]
    fn final_prompt_adds_full_transcript() {
        let out = build_final_prompt(
            "{new_lines} || {full_transcript}",
            &lines(&["tail"]),
            &lines(&["head", "tail"]),
            "",
        );
        assert_eq!(out, "tail || head\ntail");
    }

    #[test]
    fn quick_action_prompt_binds_digest_and_recent() {
        let out = build_quick_action_prompt(
            "D:{digest_markdown}\nR:{recent_transcript}",
            "# Digest #3",
            &lines(&["one", "two"]),
            "",
        );
        assert_eq!(out, "D:# Digest #3\nR:one\ntwo");
    }

    #[test]
    fn quick_action_prompt_appends_user_context() {
        let out = build_quick_action_prompt("{digest_markdown}", "d", &[], "planning call");
        assert!(out.ends_with("Additional context from the user: planning call"));
    }

    #[test]
    fn compaction_message_embeds_digest() {
        let msg = compaction_message("# Digest #5\n- point");
        assert!(msg.starts_with("(Prior conversation compacted)"));
        assert!(msg.contains("# Digest #5\n- point"));
    }
}

//! services/api/src/bot/composer.rs
//!
//! Builds replies for messages that don't match a scripted step. The
//! completion API is asked to answer and to classify the user's intent on a
//! trailing marker line; when it is unavailable or returns nothing usable,
//! the deterministic templates from `replies` are used instead.

use crate::bot::replies;
use regex::Regex;
use study_shelf_core::domain::{ComposerReply, FlowDirective};
use study_shelf_core::ports::TextGeneration;
use tracing::warn;

const FREE_FORM_TEMPLATE: &str = r#"A student named {name} wrote to a study-material storefront chat:

{message}

Do two things:

1) Give a short, friendly, conversational answer. If the question is about
   nursing or exam content, answer it directly. If it's about the store,
   explain that they can browse the catalog or ask for a practice question.
2) On the FINAL line, write EXACTLY one of:
   INTENT: BROWSE
   INTENT: PRACTICE
   INTENT: NONE

Definitions:
- BROWSE = the student is asking to see, buy, or download study materials.
- PRACTICE = the student is asking to be quizzed or to try a practice question.
- NONE = anything else."#;

const PRACTICE_TEMPLATE: &str = "Write one NCLEX-style multiple-choice practice question with \
four options labelled A-D, then the correct answer with a one-sentence rationale on its own \
line starting with \"(Answer:\". Plain text only.";

/// Produces the reply for a free-form message.
///
/// The trailing marker line can turn into a directive that starts a new
/// scripted flow; otherwise the cleaned answer body is sent as-is.
pub async fn compose_reply(
    textgen: Option<&dyn TextGeneration>,
    user_name: &str,
    message: &str,
) -> ComposerReply {
    let Some(textgen) = textgen else {
        return ComposerReply::PlainText(replies::free_form_fallback().to_string());
    };

    let prompt = FREE_FORM_TEMPLATE
        .replace("{name}", user_name)
        .replace("{message}", message);

    match textgen.complete(&prompt, 400).await {
        Ok(raw) => parse_output(&raw),
        Err(e) => {
            warn!("Completion API unavailable for free-form reply: {:?}", e);
            ComposerReply::PlainText(replies::free_form_fallback().to_string())
        }
    }
}

/// Generates one practice question, falling back to the canned question.
pub async fn practice_question(textgen: Option<&dyn TextGeneration>) -> String {
    let Some(textgen) = textgen else {
        return replies::practice_fallback().to_string();
    };
    match textgen.complete(PRACTICE_TEMPLATE, 300).await {
        Ok(raw) => {
            let cleaned = sanitize_reply(raw.trim());
            if cleaned.is_empty() {
                replies::practice_fallback().to_string()
            } else {
                cleaned
            }
        }
        Err(e) => {
            warn!("Completion API unavailable for practice question: {:?}", e);
            replies::practice_fallback().to_string()
        }
    }
}

/// Splits the answer body from the trailing `INTENT:` marker line.
fn parse_output(raw: &str) -> ComposerReply {
    let mut lines: Vec<&str> = raw.trim().lines().collect();

    let intent = match lines.last() {
        Some(last) if last.trim().starts_with("INTENT:") => {
            let value = last.trim().trim_start_matches("INTENT:").trim().to_string();
            lines.pop();
            value
        }
        // No marker line: treat as a plain answer and use the full text.
        _ => "NONE".to_string(),
    };

    match intent.to_uppercase().as_str() {
        "BROWSE" => ComposerReply::Directive(FlowDirective::StartBrowse),
        "PRACTICE" => ComposerReply::Directive(FlowDirective::StartPractice),
        _ => {
            let body = sanitize_reply(lines.join("\n").trim());
            if body.is_empty() {
                ComposerReply::PlainText(replies::free_form_fallback().to_string())
            } else {
                ComposerReply::PlainText(body)
            }
        }
    }
}

/// Strips markdown artifacts the completion API sneaks in despite the
/// plain-text instruction: inline links, citation parentheticals, headings.
fn sanitize_reply(text: &str) -> String {
    let citation_regex = Regex::new(r"\(\[.*?\]\(.*?\)\)").unwrap();
    let without_citations = citation_regex.replace_all(text, "");

    let link_regex = Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap();
    let without_links = link_regex.replace_all(&without_citations, "$1");

    without_links
        .lines()
        .filter(|line| !line.trim_start().starts_with("##"))
        .collect::<Vec<&str>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_browse_marker_becomes_a_directive() {
        let reply = parse_output("Sure, let me show you the catalog.\nINTENT: BROWSE");
        assert!(matches!(
            reply,
            ComposerReply::Directive(FlowDirective::StartBrowse)
        ));
    }

    #[test]
    fn trailing_practice_marker_becomes_a_directive() {
        let reply = parse_output("Let's quiz you!\nINTENT: PRACTICE");
        assert!(matches!(
            reply,
            ComposerReply::Directive(FlowDirective::StartPractice)
        ));
    }

    #[test]
    fn missing_marker_falls_back_to_plain_text() {
        let reply = parse_output("Pharmacology is the study of drugs.");
        match reply {
            ComposerReply::PlainText(body) => {
                assert_eq!(body, "Pharmacology is the study of drugs.")
            }
            other => panic!("expected plain text, got {other:?}"),
        }
    }

    #[test]
    fn none_marker_keeps_the_answer_body_only() {
        let reply = parse_output("Good question! Beta blockers slow the heart.\nINTENT: NONE");
        match reply {
            ComposerReply::PlainText(body) => {
                assert_eq!(body, "Good question! Beta blockers slow the heart.")
            }
            other => panic!("expected plain text, got {other:?}"),
        }
    }

    #[test]
    fn sanitize_strips_links_and_headings() {
        let cleaned = sanitize_reply(
            "## Summary\nSee [this guide](https://example.com) for more. ([ref](https://x))",
        );
        assert_eq!(cleaned, "See this guide for more.");
    }
}

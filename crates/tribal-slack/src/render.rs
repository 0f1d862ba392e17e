use slack_morphism::prelude::*;
use tribal_agent::ProcessingResult;

/// Max tool-usage bullets shown inline before collapsing into "(+N more)".
const MAX_TOOL_BULLETS: usize = 10;
/// Paragraph-boundary chunk size for mrkdwn section text.
const SECTION_CHUNK_CHARS: usize = 2900;
/// Hard cap on a single preformatted code block, Slack's own block limit.
const CODE_BLOCK_CHARS: usize = 3000;
/// Hard cap on the inlined SQL block — the query itself, not its result set.
const SQL_BLOCK_CHARS: usize = 2000;
/// Cap on the plain-text fallback shown in notifications.
const FALLBACK_TEXT_CHARS: usize = 500;

/// Render a [`ProcessingResult`] into a Slack Block Kit message: a short
/// plain-text fallback (for notifications/previews) and the structured
/// block list. Mirrors the original bot's `format_response_for_slack`:
/// tool-usage summary first, then the response body split on code fences,
/// then the last SQL query executed, then a fallback-model notice.
///
/// Code segments are rendered as `section` blocks with the text re-wrapped
/// in triple backticks rather than `rich_text_preformatted` elements —
/// `slack-morphism`'s typed `SlackBlock` enum doesn't expose that newer
/// block kind, and a backtick-fenced mrkdwn section renders identically in
/// Slack's client.
pub fn render(result: &ProcessingResult) -> (String, Vec<SlackBlock>) {
    let mut blocks = Vec::new();

    if !result.tools_used.is_empty() {
        blocks.push(tool_usage_block(result));
        blocks.push(SlackBlock::Divider(SlackDividerBlock::new()));
    }

    blocks.extend(response_blocks(&result.response_text));

    if let Some(sql) = result.sql_queries.last() {
        blocks.push(SlackBlock::Divider(SlackDividerBlock::new()));
        blocks.push(context_block("\u{1f4dd} *SQL Query Executed:*"));
        blocks.push(code_section(&truncate_chars(sql, SQL_BLOCK_CHARS)));
    }

    if result.used_fallback {
        blocks.push(context_block(&format!("\u{26a0}\u{fe0f} _Used fallback: {}_", result.actual_model)));
    }

    (fallback_text(&result.response_text), blocks)
}

fn tool_usage_block(result: &ProcessingResult) -> SlackBlock {
    let lines: Vec<String> = result
        .tools_used
        .iter()
        .map(|t| {
            if t.detail.is_empty() {
                format!("`{}`", t.tool)
            } else {
                format!("`{}` \u{2192} {}", t.tool, t.detail)
            }
        })
        .collect();

    let summary = if lines.len() > MAX_TOOL_BULLETS {
        format!("{} _(+{} more)_", lines[..MAX_TOOL_BULLETS].join(" \u{2022} "), lines.len() - MAX_TOOL_BULLETS)
    } else {
        lines.join(" \u{2022} ")
    };

    context_block(&format!("\u{1f527} {summary}"))
}

fn mrkdwn(text: impl Into<String>) -> SlackBlockText {
    SlackBlockText::MarkDown(SlackBlockMarkDownText::new(text.into()))
}

fn context_block(text: &str) -> SlackBlock {
    SlackBlock::Context(SlackContextBlock::new(vec![SlackContextBlockElement::MarkDownText(SlackBlockMarkDownText::new(
        text.to_string(),
    ))]))
}

fn code_section(text: &str) -> SlackBlock {
    SlackBlock::Section(SlackSectionBlock::new().with_text(mrkdwn(format!("```{text}```"))))
}

/// Split on triple-backtick fences. Even segments are prose (chunked at
/// paragraph boundaries); odd segments are code (language hint on the
/// first line stripped if present, capped at [`CODE_BLOCK_CHARS`]).
fn response_blocks(text: &str) -> Vec<SlackBlock> {
    let parts: Vec<&str> = text.split("```").collect();
    let mut blocks = Vec::new();

    for (i, part) in parts.iter().enumerate() {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }

        if i % 2 == 0 {
            for chunk in chunk_text(trimmed, SECTION_CHUNK_CHARS) {
                if !chunk.is_empty() {
                    blocks.push(SlackBlock::Section(SlackSectionBlock::new().with_text(mrkdwn(chunk))));
                }
            }
        } else {
            blocks.push(code_section(&truncate_chars(&strip_language_hint(trimmed), CODE_BLOCK_CHARS)));
        }
    }

    if blocks.is_empty() && !text.trim().is_empty() {
        blocks.push(SlackBlock::Section(SlackSectionBlock::new().with_text(mrkdwn(truncate_chars(text, SECTION_CHUNK_CHARS)))));
    }

    blocks
}

/// Drop a bare language-hint first line (e.g. the `sql` in ` ```sql\n… ``` `)
/// when it's a short alphabetic token on its own line.
fn strip_language_hint(code: &str) -> String {
    if let Some((first, rest)) = code.split_once('\n') {
        if first.len() < 15 && !first.is_empty() && first.chars().all(|c| c.is_alphabetic()) {
            return rest.to_string();
        }
    }
    code.to_string()
}

/// Split `text` into chunks no longer than `max_length`, breaking at blank
/// lines (`\n\n`) so a chunk boundary never lands mid-paragraph.
fn chunk_text(text: &str, max_length: usize) -> Vec<String> {
    if text.len() <= max_length {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        if current.len() + paragraph.len() + 2 <= max_length {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(paragraph);
        } else {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            current = truncate_chars(paragraph, max_length);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

fn fallback_text(text: &str) -> String {
    if text.chars().count() > FALLBACK_TEXT_CHARS {
        format!("{}...", truncate_chars(text, FALLBACK_TEXT_CHARS))
    } else {
        text.to_string()
    }
}

/// Truncate `text` to `max_length`, preferring to cut at the last newline
/// within the final 500 characters, and append a visible marker. Used for
/// legacy single-text updates rather than full block renders.
pub fn truncate_for_slack(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }

    let budget = max_length.saturating_sub(50);
    let mut truncated = truncate_chars(text, budget);
    if let Some(last_newline) = truncated.rfind('\n') {
        if last_newline > max_length.saturating_sub(500) {
            truncated.truncate(last_newline);
        }
    }

    format!("{truncated}\n\n... _(response truncated)_")
}

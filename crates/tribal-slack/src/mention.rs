/// Remove a leading `<@BOT_ID>` mention token, as Slack renders it in
/// message text. Mirrors the Discord adapter's `strip_mention`, adapted to
/// Slack's `<@U…>` syntax instead of Discord's `<@123…>`.
pub fn strip_mention(text: &str, bot_user_id: &str) -> String {
    let token = format!("<@{bot_user_id}>");
    text.replace(&token, "").trim().to_string()
}

/// True if `text` is short and carries no alphanumeric characters — an
/// emoji-only reply that shouldn't re-trigger the agent loop in a thread
/// the bot is already watching.
pub fn is_emoji_only_short_token(text: &str) -> bool {
    text.chars().count() <= 4 && !text.chars().any(|c| c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_mention_token() {
        assert_eq!(strip_mention("<@U123> how many merchants?", "U123"), "how many merchants?");
    }

    #[test]
    fn strips_mention_token_anywhere_in_text() {
        assert_eq!(strip_mention("hey <@U123> are you there", "U123"), "hey  are you there");
    }

    #[test]
    fn leaves_text_without_mention_untouched() {
        assert_eq!(strip_mention("how many merchants?", "U123"), "how many merchants?");
    }

    #[test]
    fn short_emoji_reply_is_emoji_only() {
        assert!(is_emoji_only_short_token("👍"));
        assert!(is_emoji_only_short_token("👍👍"));
    }

    #[test]
    fn short_word_is_not_emoji_only() {
        assert!(!is_emoji_only_short_token("ok"));
        assert!(!is_emoji_only_short_token("no"));
    }

    #[test]
    fn empty_text_counts_as_emoji_only() {
        assert!(is_emoji_only_short_token(""));
    }
}

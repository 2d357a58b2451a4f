//! Lexical classification of user replies while a confirmation is pending.

/// Outcome of interpreting a free-text reply to a pending confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationReply {
    Yes,
    No,
    Unclear,
}

const AFFIRMATIVE: &[&str] = &[
    "yes", "y", "yeah", "yep", "sure", "ok", "okay", "confirm", "confirmed", "do it", "go ahead",
    "proceed",
];

const NEGATIVE: &[&str] = &[
    "no", "n", "nope", "cancel", "stop", "abort", "don't", "dont", "never mind", "nevermind",
];

/// Lexical classification of a user's reply while a confirmation is pending.
/// Anything that matches neither list is Unclear and re-prompts.
pub fn parse_confirmation_reply(input: &str) -> ConfirmationReply {
    let normalized = input.trim().to_lowercase();
    if normalized.is_empty() {
        return ConfirmationReply::Unclear;
    }
    if NEGATIVE
        .iter()
        .any(|w| normalized == *w || normalized.starts_with(&format!("{w} ")))
    {
        return ConfirmationReply::No;
    }
    if AFFIRMATIVE
        .iter()
        .any(|w| normalized == *w || normalized.starts_with(&format!("{w} ")))
    {
        return ConfirmationReply::Yes;
    }
    ConfirmationReply::Unclear
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_replies() {
        for input in ["yes", "Yes", "  y ", "ok", "go ahead", "confirm"] {
            assert_eq!(parse_confirmation_reply(input), ConfirmationReply::Yes);
        }
    }

    #[test]
    fn negative_replies() {
        for input in ["no", "N", "cancel", "never mind", "stop"] {
            assert_eq!(parse_confirmation_reply(input), ConfirmationReply::No);
        }
    }

    #[test]
    fn ambiguous_replies_reprompt() {
        for input in ["", "maybe", "what does this do?", "rename it first"] {
            assert_eq!(parse_confirmation_reply(input), ConfirmationReply::Unclear);
        }
    }

    #[test]
    fn negative_wins_over_embedded_affirmative() {
        // "no" is checked before "ok" so "no thanks" never confirms
        assert_eq!(parse_confirmation_reply("no thanks"), ConfirmationReply::No);
    }
}

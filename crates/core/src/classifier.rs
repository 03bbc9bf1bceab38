//! Mention and prefix grammar for bot commands.
//!
//! Matching is exact on the literal token sequence after whitespace has been collapsed to single
//! spaces. Anything else is not a command.

use crate::domain::intent::{Command, Intent, RoutingTarget};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CommandKind {
    Feedback,
    Bug,
    Query,
}

const HUB_PREFIXES: [(&str, CommandKind); 2] =
    [("bug:", CommandKind::Bug), ("feedback:", CommandKind::Feedback)];

const MENTION_PREFIXES: [(&str, CommandKind); 3] = [
    ("feedback:", CommandKind::Feedback),
    ("query:", CommandKind::Query),
    ("bug:", CommandKind::Bug),
];

pub fn classify(
    text: &str,
    bot_user_id: &str,
    hub_channel_id: Option<&str>,
    channel_id: &str,
) -> Intent {
    let matchable = collapse_whitespace(text).to_lowercase();
    let in_hub = hub_channel_id.is_some_and(|hub| !hub.is_empty() && hub == channel_id);

    let (kind, target) = if in_hub {
        match match_prefix(&matchable, &HUB_PREFIXES) {
            Some(kind) => (kind, RoutingTarget::InternalBucket),
            None => return Intent::None,
        }
    } else {
        let mention = format!("<@{}> ", bot_user_id.to_lowercase());
        let Some(rest) = matchable.strip_prefix(&mention) else {
            return Intent::None;
        };
        match match_prefix(rest, &MENTION_PREFIXES) {
            Some(kind) => (kind, RoutingTarget::ExternalTeamStore),
            None => return Intent::None,
        }
    };

    let body = command_body(text);
    if body.is_empty() {
        return Intent::None;
    }

    let command = Command { body, target };
    match kind {
        CommandKind::Feedback => Intent::Feedback(command),
        CommandKind::Bug => Intent::Bug(command),
        CommandKind::Query => Intent::Query(command),
    }
}

fn match_prefix(text: &str, prefixes: &[(&str, CommandKind)]) -> Option<CommandKind> {
    prefixes.iter().find(|(prefix, _)| text.starts_with(prefix)).map(|(_, kind)| *kind)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Everything after the first `:` in the original text, casing and line breaks intact.
fn command_body(text: &str) -> String {
    text.split_once(':').map(|(_, body)| body.trim().to_owned()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::classify;
    use crate::domain::intent::{Command, Intent, RoutingTarget};

    const BOT: &str = "BOT123";
    const HUB: &str = "CHUB";

    fn external(body: &str) -> Command {
        Command { body: body.to_owned(), target: RoutingTarget::ExternalTeamStore }
    }

    fn internal(body: &str) -> Command {
        Command { body: body.to_owned(), target: RoutingTarget::InternalBucket }
    }

    #[test]
    fn mention_feedback_outside_hub_targets_external_store() {
        let intent = classify("<@BOT123> feedback: app crashes on save", BOT, Some(HUB), "CGENERAL");
        assert_eq!(intent, Intent::Feedback(external("app crashes on save")));
    }

    #[test]
    fn hub_bug_targets_internal_bucket_without_mention() {
        let intent = classify("bug: login button broken", BOT, Some(HUB), HUB);
        assert_eq!(intent, Intent::Bug(internal("login button broken")));
    }

    #[test]
    fn plain_chatter_is_not_a_command() {
        assert_eq!(classify("hello there", BOT, Some(HUB), "CGENERAL"), Intent::None);
        assert_eq!(classify("hello there", BOT, Some(HUB), HUB), Intent::None);
    }

    #[test]
    fn query_is_only_available_through_a_mention() {
        let intent = classify("<@BOT123> query: show me urgent bugs", BOT, Some(HUB), "CGENERAL");
        assert_eq!(intent, Intent::Query(external("show me urgent bugs")));
        assert_eq!(classify("query: show me urgent bugs", BOT, Some(HUB), HUB), Intent::None);
    }

    #[test]
    fn prefixes_match_case_insensitively_and_keep_body_casing() {
        let intent = classify("<@bot123>   FEEDBACK:  Dark Mode please ", BOT, Some(HUB), "C1");
        assert_eq!(intent, Intent::Feedback(external("Dark Mode please")));
    }

    #[test]
    fn mention_of_another_user_is_ignored() {
        assert_eq!(classify("<@U999> feedback: nice", BOT, Some(HUB), "C1"), Intent::None);
    }

    #[test]
    fn mention_without_space_or_with_extra_words_is_ignored() {
        assert_eq!(classify("<@BOT123>feedback: nice", BOT, Some(HUB), "C1"), Intent::None);
        assert_eq!(classify("<@BOT123> some feedback: nice", BOT, Some(HUB), "C1"), Intent::None);
        assert_eq!(classify("hey <@BOT123> feedback: nice", BOT, Some(HUB), "C1"), Intent::None);
    }

    #[test]
    fn hub_messages_with_mention_are_not_hub_commands() {
        assert_eq!(classify("<@BOT123> bug: crash", BOT, Some(HUB), HUB), Intent::None);
    }

    #[test]
    fn empty_body_is_not_a_command() {
        assert_eq!(classify("feedback:   ", BOT, Some(HUB), HUB), Intent::None);
    }

    #[test]
    fn body_keeps_line_breaks_and_later_colons() {
        let intent = classify("bug: steps:\n1. open\n2. crash", BOT, Some(HUB), HUB);
        assert_eq!(intent, Intent::Bug(internal("steps:\n1. open\n2. crash")));
    }

    #[test]
    fn missing_hub_channel_routes_everything_through_mentions() {
        assert_eq!(classify("bug: crash", BOT, None, "C1"), Intent::None);
        let intent = classify("<@BOT123> bug: crash", BOT, None, "C1");
        assert_eq!(intent, Intent::Bug(external("crash")));
    }

    #[test]
    fn classification_is_deterministic() {
        let inputs = ["<@BOT123> feedback: a", "bug: b", "random", "<@BOT123> query: c"];
        for text in inputs {
            for channel in [HUB, "C1"] {
                assert_eq!(
                    classify(text, BOT, Some(HUB), channel),
                    classify(text, BOT, Some(HUB), channel)
                );
            }
        }
    }
}

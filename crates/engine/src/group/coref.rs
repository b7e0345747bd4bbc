//! Heuristic coreference resolution against rolling entity mentions.
//!
//! Pronouns in an inbound message are annotated with the best recent
//! referent, e.g. `"what about it"` becomes `"what about it (Rust)"`.
//! Unresolvable pronouns are left alone; this only enriches the text
//! handed downstream, it never blocks scoring.

use std::collections::HashMap;

use super::ParticipantState;

/// Pronouns that may need resolution.
const PRONOUNS: &[&str] = &[
    "he", "him", "his", "she", "her", "hers", "they", "them", "their", "theirs", "it", "its",
    "this", "that", "these", "those",
];

fn is_pronoun(word: &str) -> bool {
    PRONOUNS.contains(&word)
}

/// Extract candidate entity referents from a message.
///
/// Three sources: `<@id>` platform mentions mapped through known
/// participants, quoted strings, and capitalized words past the first
/// (sentence-initial capitals are not names often enough to count).
pub fn extract_entities(
    text: &str,
    participants: &HashMap<String, ParticipantState>,
) -> Vec<String> {
    let mut entities = Vec::new();

    for id in platform_mentions(text) {
        if let Some(p) = participants.get(&id) {
            entities.push(p.display_name.clone());
        }
    }

    let mut parts = text.split('"');
    parts.next(); // text before the first quote
    while let (Some(quoted), rest) = (parts.next(), parts.next()) {
        if !quoted.is_empty() {
            entities.push(quoted.to_string());
        }
        if rest.is_none() {
            break;
        }
    }

    for word in text.split_whitespace().skip(1) {
        if word.len() > 1
            && word.chars().next().is_some_and(|c| c.is_uppercase())
            && word.chars().all(|c| c.is_alphabetic())
        {
            entities.push(word.to_string());
        }
    }

    entities
}

/// Parse `<@123>` / `<@!123>` mention ids out of a message.
fn platform_mentions(text: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("<@") {
        let after = &rest[start + 2..];
        let after = after.strip_prefix('!').unwrap_or(after);
        let digits: String = after.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() && after[digits.len()..].starts_with('>') {
            ids.push(digits.clone());
        }
        rest = &rest[start + 2..];
    }
    ids
}

/// Annotate pronouns in `text` with the best recent referent across all
/// participants. Most recent mention wins; on a timestamp tie, the message
/// author's own mention is preferred over other participants', and any
/// remaining tie breaks on participant id so resolution is deterministic.
pub fn resolve(
    text: &str,
    author_id: &str,
    participants: &HashMap<String, ParticipantState>,
) -> String {
    let Some(referent) = best_referent(author_id, participants) else {
        return text.to_string();
    };

    let resolved: Vec<String> = text
        .split_whitespace()
        .map(|word| {
            let trailing_start = word
                .rfind(|c: char| c.is_alphanumeric())
                .map_or(0, |i| i + word[i..].chars().next().map_or(0, char::len_utf8));
            let (core, trailing) = word.split_at(trailing_start);
            if is_pronoun(core.to_lowercase().as_str()) {
                format!("{core} ({referent}){trailing}")
            } else {
                word.to_string()
            }
        })
        .collect();

    resolved.join(" ")
}

fn best_referent(
    author_id: &str,
    participants: &HashMap<String, ParticipantState>,
) -> Option<String> {
    let mut best: Option<(&super::EntityMention, bool, &str)> = None;
    for (id, participant) in participants {
        let is_author = id == author_id;
        for mention in &participant.recent_entity_mentions {
            let better = match best {
                None => true,
                Some((b, b_author, b_id)) => match mention.at.cmp(&b.at) {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => {
                        (is_author && !b_author)
                            || (is_author == b_author && id.as_str() < b_id)
                    }
                },
            };
            if better {
                best = Some((mention, is_author, id));
            }
        }
    }
    best.map(|(m, _, _)| m.entity.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{ChannelPolicy, GroupState};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use parley_config::OrganicConfig;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn group() -> GroupState {
        GroupState::new(ChannelPolicy::from_config(&OrganicConfig::default()))
    }

    #[test]
    fn capitalized_words_past_the_first_are_entities() {
        let entities = extract_entities("Maybe ask Dana about Rust", &HashMap::new());
        assert_eq!(entities, vec!["Dana", "Rust"]);
    }

    #[test]
    fn sentence_initial_capital_is_not_an_entity() {
        let entities = extract_entities("Everyone should rest", &HashMap::new());
        assert!(entities.is_empty());
    }

    #[test]
    fn quoted_strings_are_entities() {
        let entities = extract_entities(r#"did you read "the manual" yet"#, &HashMap::new());
        assert_eq!(entities, vec!["the manual"]);
    }

    #[test]
    fn platform_mentions_map_to_display_names() {
        let mut state = group();
        state.record_message("42", "Dana", "hello", t0());

        let entities = extract_entities("ping <@42> please", &state.participants);
        assert_eq!(entities, vec!["Dana"]);
    }

    #[test]
    fn pronoun_annotated_with_most_recent_entity() {
        let mut state = group();
        state.record_message("u1", "Ann", "let's talk about Python", t0());
        state.record_message("u2", "Bob", "I prefer Rust", t0() + Duration::seconds(10));

        let resolved = resolve("is it fast?", "u1", &state.participants);
        assert_eq!(resolved, "is it (Rust) fast?");
    }

    #[test]
    fn tie_prefers_authors_own_mention() {
        let mut state = group();
        let now = t0();
        state.record_message("u1", "Ann", "thinking about Python", now);
        state.record_message("u2", "Bob", "thinking about Rust", now);

        let resolved = resolve("it seems nice", "u1", &state.participants);
        assert_eq!(resolved, "it (Python) seems nice");
    }

    #[test]
    fn tie_between_other_participants_is_deterministic() {
        let mut state = group();
        let now = t0();
        state.record_message("u2", "Bob", "what about Zig", now);
        state.record_message("u3", "Cal", "what about Ada", now);

        // Neither candidate belongs to the author; lowest participant id wins
        for _ in 0..10 {
            let resolved = resolve("it looks fun", "u1", &state.participants);
            assert_eq!(resolved, "it (Zig) looks fun");
        }
    }

    #[test]
    fn no_candidates_leaves_text_unchanged() {
        let state = group();
        assert_eq!(
            resolve("what do you think about it?", "u1", &state.participants),
            "what do you think about it?"
        );
    }

    #[test]
    fn non_pronoun_words_untouched() {
        let mut state = group();
        state.record_message("u1", "Ann", "we deployed Parley", t0());

        let resolved = resolve("the bitter end", "u1", &state.participants);
        assert_eq!(resolved, "the bitter end");
    }
}

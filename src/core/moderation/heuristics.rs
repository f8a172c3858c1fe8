// Local heuristic evaluator - the network-free half of review moderation.
//
// Rules run in a fixed priority order and the first failing rule decides the
// verdict:
//   length -> profanity -> links -> long token -> consonant cluster
//          -> repeated character -> dictionary
//
// This is a pure, total function over any string. It must never panic.

use super::moderation_models::ModerationVerdict;
use regex::Regex;
use std::sync::LazyLock;

/// Trimmed comments shorter than this are rejected.
pub const MIN_COMMENT_CHARS: usize = 10;
/// Tokens longer than this look like keyboard mashing.
pub const MAX_TOKEN_CHARS: usize = 20;
/// The dictionary rule only applies to comments longer than this.
pub const DICTIONARY_MIN_CHARS: usize = 20;
/// A run of this many identical characters is gibberish.
pub const REPEATED_CHAR_RUN: usize = 5;

const PROFANITY: &[&str] = &[
    "shit", "fuck", "fucking", "bitch", "ass", "asshole", "dick", "pussy", "cunt", "bastard",
];

const COMMON_WORDS: &[&str] = &[
    "the", "and", "was", "very", "had", "for", "with", "this", "that", "not", "but", "they", "is",
    "it", "to", "of", "my", "clinic", "great", "place", "extern", "externship", "student", "vet",
    "doctor", "staff",
];

static PROFANITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = PROFANITY
        .iter()
        .map(|word| regex::escape(word))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternation)).expect("profanity pattern is valid")
});

// TLDs that double as English words (me, us, co, ca) only count when a path
// follows, so "helped.Us students" is not a link
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bhttps?\b|\bwww\.|\b[a-z0-9-]+\.(?:com|net|org|io|info|biz|xyz|ru|uk)\b|\b[a-z0-9-]+\.[a-z]{2,}/",
    )
    .expect("link pattern is valid")
});

// `y` counts as a vowel here
static CONSONANT_CLUSTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[bcdfghjklmnpqrstvwxz]{5,}").expect("cluster pattern is valid"));

/// A named check with a fixed rejection reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeuristicRule {
    Length,
    Profanity,
    Links,
    LongToken,
    ConsonantCluster,
    RepeatedCharacter,
    Dictionary,
}

impl HeuristicRule {
    /// Every rule, in evaluation order.
    pub const ALL: [HeuristicRule; 7] = [
        HeuristicRule::Length,
        HeuristicRule::Profanity,
        HeuristicRule::Links,
        HeuristicRule::LongToken,
        HeuristicRule::ConsonantCluster,
        HeuristicRule::RepeatedCharacter,
        HeuristicRule::Dictionary,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            HeuristicRule::Length => "length",
            HeuristicRule::Profanity => "profanity",
            HeuristicRule::Links => "links",
            HeuristicRule::LongToken => "long_token",
            HeuristicRule::ConsonantCluster => "consonant_cluster",
            HeuristicRule::RepeatedCharacter => "repeated_character",
            HeuristicRule::Dictionary => "dictionary",
        }
    }

    /// Reason string stored as the moderation note when this rule fails.
    pub fn reason(&self) -> &'static str {
        match self {
            HeuristicRule::Length => "Too short",
            HeuristicRule::Profanity => "Profanity detected",
            HeuristicRule::Links => "Links not allowed",
            HeuristicRule::LongToken => "Keyboard mash (long word)",
            HeuristicRule::ConsonantCluster => "Keyboard mash (consonant cluster)",
            HeuristicRule::RepeatedCharacter => "Gibberish detected",
            HeuristicRule::Dictionary => "Non-sensical content",
        }
    }

    fn fails(&self, text: &PreparedText) -> bool {
        match self {
            HeuristicRule::Length => text.char_count < MIN_COMMENT_CHARS,
            HeuristicRule::Profanity => PROFANITY_PATTERN.is_match(&text.lower),
            HeuristicRule::Links => LINK_PATTERN.is_match(&text.lower),
            HeuristicRule::LongToken => text
                .tokens()
                .any(|token| token.chars().count() > MAX_TOKEN_CHARS),
            HeuristicRule::ConsonantCluster => CONSONANT_CLUSTER.is_match(&text.lower),
            HeuristicRule::RepeatedCharacter => has_char_run(&text.lower, REPEATED_CHAR_RUN),
            HeuristicRule::Dictionary => {
                text.char_count > DICTIONARY_MIN_CHARS
                    && !text.tokens().any(|token| {
                        let word = token.trim_matches(|c: char| !c.is_alphanumeric());
                        COMMON_WORDS.contains(&word)
                    })
            }
        }
    }
}

/// The comment in the forms the rules need, computed once.
struct PreparedText {
    lower: String,
    char_count: usize,
}

impl PreparedText {
    fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        Self {
            lower: trimmed.to_lowercase(),
            char_count: trimmed.chars().count(),
        }
    }

    fn tokens(&self) -> impl Iterator<Item = &str> {
        self.lower.split_whitespace()
    }
}

/// True if any letter or symbol repeats `run` or more times in a row.
/// Whitespace and digits never count ("100000 yen" is a number, not noise).
fn has_char_run(text: &str, run: usize) -> bool {
    let mut previous = None;
    let mut count = 0;

    for c in text.chars() {
        if c.is_whitespace() || c.is_numeric() {
            previous = None;
            count = 0;
            continue;
        }
        if Some(c) == previous {
            count += 1;
        } else {
            previous = Some(c);
            count = 1;
        }
        if count >= run {
            return true;
        }
    }
    false
}

/// Run every rule in order and return the first one that fails, if any.
pub fn evaluate_with_rule(text: &str) -> Option<HeuristicRule> {
    let prepared = PreparedText::new(text);
    HeuristicRule::ALL
        .into_iter()
        .find(|rule| rule.fails(&prepared))
}

/// Evaluate a comment against the heuristic rules.
pub fn evaluate(text: &str) -> ModerationVerdict {
    match evaluate_with_rule(text) {
        Some(rule) => {
            tracing::debug!(rule = rule.name(), "Heuristic rule rejected comment");
            ModerationVerdict::rejected(rule.reason())
        }
        None => ModerationVerdict::safe(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

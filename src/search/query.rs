//! Evidence query derivation and keyword helpers

use crate::config::EvidenceQueryStrategy;
use crate::models::{Hypothesis, Topic};

/// Queries mentioning any of these are routed to the astronomy provider
pub const SPACE_KEYWORDS: [&str; 7] = [
    "nasa", "space", "astronomy", "planet", "cosmos", "asteroid", "galaxy",
];

const MAX_QUERY_TERMS: usize = 8;

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "also", "an", "and", "any", "are", "as", "at", "be", "because",
    "been", "between", "both", "but", "by", "can", "could", "do", "does", "during", "each",
    "for", "from", "has", "have", "how", "if", "in", "into", "is", "it", "its", "may", "might",
    "more", "most", "not", "of", "on", "or", "other", "our", "over", "should", "such", "than",
    "that", "the", "their", "then", "there", "these", "they", "this", "those", "through", "to",
    "under", "up", "via", "was", "we", "were", "when", "where", "which", "while", "will",
    "with", "within", "would",
];

pub fn is_space_query(query: &str) -> bool {
    let lower = query.to_lowercase();
    SPACE_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Lowercased content words of `text`, de-duplicated, in order of first appearance
pub fn keywords(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for token in text
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .map(|t| t.trim_matches('-').to_lowercase())
    {
        if token.len() < 3 || STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        if token.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if !seen.contains(&token) {
            seen.push(token);
        }
    }
    seen
}

/// Builds the evidence query for one iteration.
///
/// `HypothesisDerived` uses the leading content words of the hypothesis and
/// falls back to the topic when the hypothesis has none.
pub fn derive_query(strategy: EvidenceQueryStrategy, topic: &Topic, hypothesis: &Hypothesis) -> String {
    match strategy {
        EvidenceQueryStrategy::TopicOnly => topic.as_str().to_string(),
        EvidenceQueryStrategy::HypothesisDerived => {
            let terms = keywords(hypothesis.text());
            if terms.is_empty() {
                topic.as_str().to_string()
            } else {
                terms
                    .into_iter()
                    .take(MAX_QUERY_TERMS)
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AgentKind;

    #[test]
    fn test_space_routing() {
        assert!(is_space_query("Effect of microgravity in SPACE on seeds"));
        assert!(is_space_query("exoplanet atmospheres"));
        assert!(!is_space_query("effect of fasting on longevity"));
    }

    #[test]
    fn test_keywords_drop_stopwords_and_duplicates() {
        let words = keywords("The roots of the plant grow slower in the dark, and roots curl.");
        assert_eq!(words, vec!["roots", "plant", "grow", "slower", "dark", "curl"]);
    }

    #[test]
    fn test_derive_query_topic_only() {
        let topic = Topic::new("effect of microgravity on seed germination").unwrap();
        let h = Hypothesis::new("Auxin redistribution delays germination", AgentKind::Generation, 0).unwrap();
        assert_eq!(
            derive_query(EvidenceQueryStrategy::TopicOnly, &topic, &h),
            "effect of microgravity on seed germination"
        );
    }

    #[test]
    fn test_derive_query_from_hypothesis() {
        let topic = Topic::new("seed germination").unwrap();
        let h = Hypothesis::new(
            "Microgravity alters auxin transport in Arabidopsis seedlings, which delays root emergence by 20 percent and reduces gravitropic curvature in hypocotyls",
            AgentKind::Evolution,
            1,
        )
        .unwrap();
        let query = derive_query(EvidenceQueryStrategy::HypothesisDerived, &topic, &h);
        assert_eq!(
            query,
            "microgravity alters auxin transport arabidopsis seedlings delays root"
        );
    }

    #[test]
    fn test_derive_query_falls_back_to_topic() {
        let topic = Topic::new("seed germination").unwrap();
        let h = Hypothesis::new("it is as it was", AgentKind::Evolution, 1).unwrap();
        assert_eq!(
            derive_query(EvidenceQueryStrategy::HypothesisDerived, &topic, &h),
            "seed germination"
        );
    }
}

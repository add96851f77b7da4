//! Detects answers where the model says it could not read the documents.
//!
//! This is substring matching, not semantic classification. An answer is a
//! [`Refusal::Full`] only when it contains *every* phrase, which is rare in
//! practice; any single phrase makes it [`Refusal::Partial`].

pub const DEFAULT_NEGATION_PHRASES: &[&str] = &[
    "I don't have access",
    "I cannot access the document",
    "unable to provide specific content",
    "does not exist",
    "not able to retrieve",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    Full,
    Partial,
    Normal,
}

pub trait RefusalClassifier: Send + Sync {
    fn classify(&self, answer: &str) -> Refusal;
}

/// Case-insensitive phrase matcher.
#[derive(Debug, Clone)]
pub struct PhraseClassifier {
    phrases: Vec<String>,
}

impl PhraseClassifier {
    pub fn new<S: AsRef<str>>(phrases: &[S]) -> Self {
        Self {
            phrases: phrases
                .iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// True iff every phrase occurs in `text`.
    pub fn all_present(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.phrases.iter().all(|p| haystack.contains(p.as_str()))
    }

    /// True iff at least one phrase occurs in `text`.
    pub fn any_present(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.phrases.iter().any(|p| haystack.contains(p.as_str()))
    }
}

impl Default for PhraseClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_NEGATION_PHRASES)
    }
}

impl RefusalClassifier for PhraseClassifier {
    fn classify(&self, answer: &str) -> Refusal {
        if self.phrases.is_empty() {
            return Refusal::Normal;
        }
        if self.all_present(answer) {
            Refusal::Full
        } else if self.any_present(answer) {
            Refusal::Partial
        } else {
            Refusal::Normal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_answer() {
        let c = PhraseClassifier::default();
        let text = "The report covers Q3 revenue.";
        assert!(!c.any_present(text));
        assert!(!c.all_present(text));
        assert_eq!(c.classify(text), Refusal::Normal);
    }

    #[test]
    fn single_phrase_is_partial_case_insensitive() {
        let c = PhraseClassifier::default();
        let text = "Sorry, i DON'T HAVE ACCESS to that file.";
        assert!(c.any_present(text));
        assert!(!c.all_present(text));
        assert_eq!(c.classify(text), Refusal::Partial);
    }

    #[test]
    fn every_phrase_is_full() {
        let c = PhraseClassifier::default();
        let text = DEFAULT_NEGATION_PHRASES.join(" and ").to_uppercase();
        assert!(c.all_present(&text));
        assert_eq!(c.classify(&text), Refusal::Full);
    }

    #[test]
    fn custom_phrases() {
        let c = PhraseClassifier::new(&["nope"]);
        assert_eq!(c.classify("Nope."), Refusal::Full);
        assert_eq!(c.classify("I don't have access"), Refusal::Normal);
    }

    #[test]
    fn blank_phrases_are_ignored() {
        let c = PhraseClassifier::new(&["", "  "]);
        assert_eq!(c.classify("anything"), Refusal::Normal);
    }
}

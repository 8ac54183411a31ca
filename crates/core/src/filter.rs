use regex::Regex;

/// Accepts or rejects a cleaned sentence as indexable content.
///
/// Rejections are independent of page classification: a citation-looking
/// sentence is excluded even on a content page.
pub struct SentenceFilter {
    purely_numeric: Regex,
    citation: Regex,
}

impl SentenceFilter {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            purely_numeric: Regex::new(r"^\d+\s*$")?,
            citation: Regex::new(r"\([0-9]{4}\)|\bdoi:|\bet al\.")?,
        })
    }

    pub fn is_content(&self, sentence: &str) -> bool {
        let trimmed = sentence.trim();
        if trimmed.chars().count() < 5 {
            return false;
        }
        if self.purely_numeric.is_match(trimmed) {
            return false;
        }
        !self.citation.is_match(&trimmed.to_lowercase())
    }
}

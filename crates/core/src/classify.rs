use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageLabel {
    References,
    Notes,
    Acknowledgements,
    Copyright,
    Metadata,
    Content,
}

impl std::fmt::Display for PageLabel {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PageLabel::References => "references",
            PageLabel::Notes => "notes",
            PageLabel::Acknowledgements => "acknowledgements",
            PageLabel::Copyright => "copyright",
            PageLabel::Metadata => "metadata",
            PageLabel::Content => "content",
        };
        formatter.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageClassification {
    pub label: PageLabel,
    pub confidence: f32,
}

/// Labels page text as indexable content or boilerplate.
///
/// An ordered rule chain over the lower-cased text, first match wins. Pages
/// matching no rule fall back on a length heuristic.
pub struct PageClassifier {
    rules: Vec<(PageLabel, Regex)>,
    contents_heading: Regex,
}

impl PageClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        let rules = vec![
            (
                PageLabel::References,
                Regex::new(r"^\s*references\b|\bdoi:|\[[0-9]+\]")?,
            ),
            (
                PageLabel::Notes,
                Regex::new(r"^\s*notes\b|^\s*footnotes\b|\bnote:")?,
            ),
            (
                PageLabel::Acknowledgements,
                Regex::new(r"^\s*acknowledgements\b|^\s*acknowledgments\b")?,
            ),
            (
                PageLabel::Copyright,
                Regex::new(r"©|copyright|all rights reserved|isbn")?,
            ),
            (
                PageLabel::Metadata,
                Regex::new(r"library of congress|publisher|edition|printing|cover design|typeset by")?,
            ),
        ];

        Ok(Self {
            rules,
            contents_heading: Regex::new(r"^\s*contents\b")?,
        })
    }

    pub fn classify(&self, raw_text: &str) -> PageClassification {
        let lowered = raw_text.to_lowercase();

        for (label, pattern) in &self.rules {
            if pattern.is_match(&lowered) {
                return PageClassification {
                    label: *label,
                    confidence: 0.9,
                };
            }
        }

        if lowered.trim().chars().count() < 200 || self.contents_heading.is_match(&lowered) {
            PageClassification {
                label: PageLabel::Metadata,
                confidence: 0.6,
            }
        } else {
            PageClassification {
                label: PageLabel::Content,
                confidence: 0.8,
            }
        }
    }
}

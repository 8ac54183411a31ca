use crate::extractor::PageText;
use regex::Regex;
use std::collections::HashMap;

/// Running id state threaded through segmentation.
///
/// Ids are assigned page-major, then paragraph, then sentence, and every
/// sentence consumes an id whether or not it later survives filtering. The
/// indexing pass and the retrieval-time rebuild both go through
/// [`Segmenter::segment_page`], so the assignment is identical in both.
#[derive(Debug, Default, Clone, Copy)]
pub struct SegmentCounters {
    pub paragraphs: u64,
    pub sentences: u64,
}

#[derive(Debug, Clone)]
pub struct SentenceSegment {
    pub sentence_id: u64,
    pub text: String,
    pub prev_sentence_id: Option<u64>,
    pub next_sentence_id: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ParagraphSegment {
    pub paragraph_id: u64,
    pub sentences: Vec<SentenceSegment>,
}

pub struct Segmenter {
    paragraph_break: Regex,
    sentence_boundary: Regex,
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Segmenter {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            paragraph_break: Regex::new(r"\n\s*\n+")?,
            sentence_boundary: Regex::new(r#"[.!?]["']?\s+"#)?,
        })
    }

    pub fn split_into_paragraphs(&self, text: &str) -> Vec<String> {
        self.paragraph_break
            .split(text.trim())
            .map(|paragraph| paragraph.trim().to_string())
            .filter(|paragraph| !paragraph.is_empty())
            .collect()
    }

    /// Collapses whitespace runs, then cuts after terminal punctuation
    /// (optionally followed by a closing quote). The unterminated tail is
    /// kept as its own sentence.
    pub fn split_into_sentences(&self, text: &str) -> Vec<String> {
        let normalized = normalize_whitespace(text);
        let mut sentences = Vec::new();
        let mut start = 0;

        for boundary in self.sentence_boundary.find_iter(&normalized) {
            let piece = normalized[start..boundary.end()].trim();
            if !piece.is_empty() {
                sentences.push(piece.to_string());
            }
            start = boundary.end();
        }

        let tail = normalized[start..].trim();
        if !tail.is_empty() {
            sentences.push(tail.to_string());
        }

        sentences
    }

    pub fn segment_page(
        &self,
        page_text: &str,
        counters: &mut SegmentCounters,
    ) -> Vec<ParagraphSegment> {
        let mut paragraphs = Vec::new();

        for paragraph_text in self.split_into_paragraphs(page_text) {
            let paragraph_id = counters.paragraphs;
            counters.paragraphs += 1;

            let texts = self.split_into_sentences(&paragraph_text);
            let count = texts.len();
            let mut sentences = Vec::with_capacity(count);

            for (position, text) in texts.into_iter().enumerate() {
                let sentence_id = counters.sentences;
                counters.sentences += 1;

                sentences.push(SentenceSegment {
                    sentence_id,
                    text,
                    prev_sentence_id: if position == 0 {
                        None
                    } else {
                        Some(sentence_id - 1)
                    },
                    next_sentence_id: if position == count - 1 {
                        None
                    } else {
                        Some(sentence_id + 1)
                    },
                });
            }

            paragraphs.push(ParagraphSegment {
                paragraph_id,
                sentences,
            });
        }

        paragraphs
    }
}

/// No-filter rebuild of the sentence id space over the whole book.
///
/// Covers every sentence, including ones the index build excluded, so context
/// lookups can reference filtered-out neighbors.
pub fn build_sentence_id_map(pages: &[PageText]) -> Result<HashMap<u64, String>, regex::Error> {
    let segmenter = Segmenter::new()?;
    let mut counters = SegmentCounters::default();
    let mut id_map = HashMap::new();

    for page in pages {
        for paragraph in segmenter.segment_page(&page.text, &mut counters) {
            for sentence in paragraph.sentences {
                id_map.insert(sentence.sentence_id, sentence.text);
            }
        }
    }

    Ok(id_map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(number: u32, text: &str) -> PageText {
        PageText {
            number,
            text: text.to_string(),
        }
    }

    #[test]
    fn whitespace_runs_collapse_to_single_spaces() {
        assert_eq!(
            normalize_whitespace("A  \t lot\nof   spacing "),
            "A lot of spacing"
        );
    }

    #[test]
    fn paragraphs_split_on_blank_line_runs() {
        let segmenter = Segmenter::new().unwrap();
        let paragraphs =
            segmenter.split_into_paragraphs("First block.\n\nSecond block.\n \n\nThird block.");
        assert_eq!(
            paragraphs,
            vec!["First block.", "Second block.", "Third block."]
        );
    }

    #[test]
    fn sentences_split_on_terminal_punctuation_and_closing_quotes() {
        let segmenter = Segmenter::new().unwrap();
        let sentences =
            segmenter.split_into_sentences("He said \"stop.\" Then what? Nothing happened! The end");
        assert_eq!(
            sentences,
            vec![
                "He said \"stop.\"",
                "Then what?",
                "Nothing happened!",
                "The end"
            ]
        );
    }

    #[test]
    fn sentence_ids_are_unique_and_monotonic_in_document_order() {
        let segmenter = Segmenter::new().unwrap();
        let mut counters = SegmentCounters::default();
        let pages = vec![
            page(1, "One. Two.\n\nThree."),
            page(2, "Four. Five."),
        ];

        let mut seen = Vec::new();
        for page in &pages {
            for paragraph in segmenter.segment_page(&page.text, &mut counters) {
                for sentence in paragraph.sentences {
                    seen.push(sentence.sentence_id);
                }
            }
        }

        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn adjacency_is_paragraph_local() {
        let segmenter = Segmenter::new().unwrap();
        let mut counters = SegmentCounters::default();
        let paragraphs = segmenter.segment_page("One. Two. Three.\n\nFour.", &mut counters);

        let first = &paragraphs[0].sentences;
        assert_eq!(first[0].prev_sentence_id, None);
        assert_eq!(first[0].next_sentence_id, Some(1));
        assert_eq!(first[1].prev_sentence_id, Some(0));
        assert_eq!(first[1].next_sentence_id, Some(2));
        assert_eq!(first[2].prev_sentence_id, Some(1));
        assert_eq!(first[2].next_sentence_id, None);

        let second = &paragraphs[1].sentences;
        assert_eq!(second[0].prev_sentence_id, None);
        assert_eq!(second[0].next_sentence_id, None);
    }

    #[test]
    fn id_map_rebuild_matches_a_fresh_segmentation_pass() {
        let pages = vec![
            page(1, "Alpha one. Alpha two.\n\nBeta one."),
            page(2, "Gamma one. Gamma two."),
        ];

        let id_map = build_sentence_id_map(&pages).unwrap();

        let segmenter = Segmenter::new().unwrap();
        let mut counters = SegmentCounters::default();
        for page in &pages {
            for paragraph in segmenter.segment_page(&page.text, &mut counters) {
                for sentence in paragraph.sentences {
                    assert_eq!(id_map.get(&sentence.sentence_id), Some(&sentence.text));
                }
            }
        }
        assert_eq!(id_map.len(), counters.sentences as usize);
    }
}

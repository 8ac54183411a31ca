use crate::extractor::PageText;
use crate::segment::Segmenter;
use regex::Regex;

/// One entry of the flat per-page sentence list used for chapter attribution.
#[derive(Debug, Clone)]
pub struct FlatSentence {
    pub text: String,
    pub chapter: Option<String>,
}

/// Scans pages top to bottom for `Chapter …` heading lines and tags every
/// sentence on a page with the most recent heading seen so far. The heading
/// carries forward across pages and never resets. Only the first heading line
/// on a page is considered.
pub struct ChapterScanner {
    heading: Regex,
}

impl ChapterScanner {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            heading: Regex::new(r"(?i)^chapter\s+[\w\s:-]+$")?,
        })
    }

    /// Returns one flat sentence list per input page, aligned by position.
    pub fn scan(&self, pages: &[PageText], segmenter: &Segmenter) -> Vec<Vec<FlatSentence>> {
        let mut chapter: Option<String> = None;
        let mut per_page = Vec::with_capacity(pages.len());

        for page in pages {
            for line in page.text.lines() {
                let trimmed = line.trim();
                if self.heading.is_match(trimmed) {
                    chapter = Some(trimmed.to_string());
                    break;
                }
            }

            let sentences = segmenter
                .split_into_sentences(&page.text)
                .into_iter()
                .map(|text| FlatSentence {
                    text,
                    chapter: chapter.clone(),
                })
                .collect();
            per_page.push(sentences);
        }

        per_page
    }
}

/// Forward-only greedy pointer reconciling paragraph-derived sentences with a
/// page's flat sentence list.
///
/// The flat scan collapses paragraph boundaries, so the two segmentations can
/// disagree on sentence edges. When the cursor exhausts the flat list without
/// an exact text match, the sentence (and every later sentence on the page)
/// resolves to `Unknown`; the cursor never backtracks. `unmatched` counts how
/// often that happened so the degradation is observable.
pub struct AlignmentCursor<'a> {
    flat: &'a [FlatSentence],
    position: usize,
    unmatched: u64,
}

impl<'a> AlignmentCursor<'a> {
    pub fn new(flat: &'a [FlatSentence]) -> Self {
        Self {
            flat,
            position: 0,
            unmatched: 0,
        }
    }

    pub fn chapter_for(&mut self, cleaned_sentence: &str) -> String {
        while self.position < self.flat.len() && self.flat[self.position].text != cleaned_sentence {
            self.position += 1;
        }

        match self.flat.get(self.position) {
            Some(entry) => {
                self.position += 1;
                entry.chapter.clone().unwrap_or_else(|| "Unknown".to_string())
            }
            None => {
                self.unmatched += 1;
                "Unknown".to_string()
            }
        }
    }

    pub fn unmatched(&self) -> u64 {
        self.unmatched
    }
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
    fn headings_carry_forward_across_pages() {
        let segmenter = Segmenter::new().unwrap();
        let scanner = ChapterScanner::new().unwrap();
        let pages = vec![
            page(1, "Chapter 1: Depth\n\nWork deeply every day."),
            page(2, "Depth matters greatly."),
            page(3, "chapter 2: Breadth\n\nBreadth comes later."),
        ];

        let flat = scanner.scan(&pages, &segmenter);
        assert_eq!(flat[1][0].chapter.as_deref(), Some("Chapter 1: Depth"));
        assert_eq!(flat[2][0].chapter.as_deref(), Some("chapter 2: Breadth"));
    }

    #[test]
    fn aligned_sentences_take_the_flat_lists_chapter() {
        let segmenter = Segmenter::new().unwrap();
        let scanner = ChapterScanner::new().unwrap();
        let pages = vec![
            page(1, "Chapter 1: Depth\n\nIgnored here."),
            page(2, "Depth matters greatly. Shallow work spreads."),
        ];

        let flat = scanner.scan(&pages, &segmenter);
        let mut cursor = AlignmentCursor::new(&flat[1]);
        assert_eq!(cursor.chapter_for("Depth matters greatly."), "Chapter 1: Depth");
        assert_eq!(cursor.chapter_for("Shallow work spreads."), "Chapter 1: Depth");
        assert_eq!(cursor.unmatched(), 0);
    }

    #[test]
    fn no_heading_yet_resolves_to_unknown() {
        let segmenter = Segmenter::new().unwrap();
        let scanner = ChapterScanner::new().unwrap();
        let pages = vec![page(1, "No heading here. Just prose.")];

        let flat = scanner.scan(&pages, &segmenter);
        let mut cursor = AlignmentCursor::new(&flat[0]);
        assert_eq!(cursor.chapter_for("No heading here."), "Unknown");
    }

    #[test]
    fn a_missed_match_forfeits_the_rest_of_the_page() {
        // A heading paragraph glues onto the next sentence in the flat scan,
        // so the paragraph-derived "Chapter 1: Depth" never matches; the
        // cursor runs off the end and the whole page degrades to Unknown.
        let segmenter = Segmenter::new().unwrap();
        let scanner = ChapterScanner::new().unwrap();
        let pages = vec![page(1, "Chapter 1: Depth\n\nWork deeply every day.")];

        let flat = scanner.scan(&pages, &segmenter);
        assert_eq!(flat[0].len(), 1);

        let mut cursor = AlignmentCursor::new(&flat[0]);
        assert_eq!(cursor.chapter_for("Chapter 1: Depth"), "Unknown");
        assert_eq!(cursor.chapter_for("Work deeply every day."), "Unknown");
        assert_eq!(cursor.unmatched(), 2);
    }
}

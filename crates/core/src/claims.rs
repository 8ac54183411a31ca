use crate::segment::Segmenter;
use regex::Regex;

/// Heuristic key-claim extraction from an essay.
///
/// First pass takes the opening sentence of each paragraph until `max_claims`
/// are collected. If that falls short, a second pass appends any sentence
/// containing an argumentative marker word, skipping exact-string duplicates.
/// A local LLM could replace this; the heuristic keeps the pipeline offline.
pub fn extract_key_claims(
    segmenter: &Segmenter,
    essay: &str,
    max_claims: usize,
) -> Result<Vec<String>, regex::Error> {
    let paragraphs = segmenter.split_into_paragraphs(essay);
    let mut claims: Vec<String> = Vec::new();

    for paragraph in &paragraphs {
        if claims.len() >= max_claims {
            break;
        }
        if let Some(first) = segmenter.split_into_sentences(paragraph).into_iter().next() {
            claims.push(first);
        }
    }

    if claims.len() < max_claims {
        let marker = Regex::new(r"(?i)\b(should|must|need|prove|argue|claim|show)\b")?;
        let mut strong = Vec::new();
        for paragraph in &paragraphs {
            for sentence in segmenter.split_into_sentences(paragraph) {
                if marker.is_match(&sentence) {
                    strong.push(sentence);
                }
            }
        }

        for sentence in strong {
            if claims.len() >= max_claims {
                break;
            }
            if !claims.contains(&sentence) {
                claims.push(sentence);
            }
        }
    }

    Ok(claims)
}

//! Span Disambiguator + Merger (spec.md #4.F).

use crate::document::Document;
use crate::span::Span;

/// Minimum surviving length (in characters) for a partially truncated span
/// to still satisfy its detector's invariant. Spec §9 leaves the exact rule
/// an open question; DESIGN.md records this as the resolution: truncation
/// must leave at least half the original span, and never fewer than 2 chars.
fn minimum_length_for(span: &Span) -> usize {
    (span.len() / 2).max(2)
}

/// Sorts, sweeps, and merges overlapping spans into a final ordered,
/// non-overlapping list per the rules in spec.md #4.F.
pub struct SpanDisambiguator;

impl SpanDisambiguator {
    pub fn resolve(document: &Document, spans: Vec<Span>) -> Vec<Span> {
        let mut sorted = spans;
        sorted.sort();

        let mut kept: Vec<Span> = Vec::with_capacity(sorted.len());
        for span in sorted {
            match kept.pop() {
                None => kept.push(span),
                Some(current) => {
                    if !current.overlaps(&span) {
                        kept.push(current);
                        kept.push(span);
                    } else {
                        kept.extend(Self::resolve_overlap(document, current, span));
                    }
                }
            }
        }

        kept.sort_by_key(Span::start);
        kept
    }

    /// Resolves one pairwise overlap. `current` always sorts no later than
    /// `incoming` under `(start, end, -priority, -confidence)`.
    fn resolve_overlap(document: &Document, current: Span, incoming: Span) -> Vec<Span> {
        if current.filter_type == incoming.filter_type {
            return vec![merge_same_type(document, current, incoming)];
        }

        let (winner, loser) = if current.priority != incoming.priority {
            if current.priority > incoming.priority {
                (current, incoming)
            } else {
                (incoming, current)
            }
        } else if current.confidence != incoming.confidence {
            if current.confidence > incoming.confidence {
                (current, incoming)
            } else {
                (incoming, current)
            }
        } else {
            // Further tie: the earlier span wins (lower start, or equal
            // start with lower end).
            (current, incoming)
        };

        if winner.contains(&loser) {
            return vec![winner];
        }

        match truncate_loser(&winner, loser) {
            Some(truncated) => {
                let mut out = vec![winner, truncated];
                out.sort();
                out
            }
            None => vec![winner],
        }
    }
}

fn merge_same_type(document: &Document, a: Span, b: Span) -> Span {
    let start = a.start().min(b.start());
    let end = a.end().max(b.end());
    let confidence = a.confidence.max(b.confidence);
    let base = if a.priority >= b.priority { a } else { b };
    crate::span::SpanFactory::reposition(document, &base, start, end)
        .map(|mut merged| {
            merged.confidence = confidence;
            merged
        })
        .unwrap_or(base)
}

/// Truncates `loser` to the portion outside `winner`'s span, dropping it if
/// the remaining prefix/suffix text would violate its own minimum-length
/// invariant.
fn truncate_loser(winner: &Span, loser: Span) -> Option<Span> {
    let prefix_len = winner.start().saturating_sub(loser.start());
    let suffix_len = loser.end().saturating_sub(winner.end());

    let (new_start, new_end) = if prefix_len >= suffix_len {
        (loser.start(), loser.start() + prefix_len)
    } else {
        (loser.end() - suffix_len, loser.end())
    };

    if new_end <= new_start {
        return None;
    }
    if new_end - new_start < minimum_length_for(&loser) {
        return None;
    }

    let offset_start = new_start - loser.start();
    let offset_end = offset_start + (new_end - new_start);
    let mut truncated = loser;
    truncated.character_start = new_start;
    truncated.character_end = new_end;
    truncated.text = truncated.text.chars().skip(offset_start).take(offset_end - offset_start).collect();
    Some(truncated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::{FilterType, SpanOptions};

    fn doc_span(text: &str, start: usize, end: usize, filter_type: FilterType, priority: i32, confidence: f64) -> Span {
        let document = crate::document::Document::typed(text);
        crate::span::SpanFactory::from_position(
            &document,
            start,
            end,
            filter_type,
            confidence,
            SpanOptions {
                priority,
                ..Default::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn non_overlapping_spans_are_untouched() {
        let text = "John Smith visited on 01/02/2020";
        let document = Document::typed(text);
        let a = doc_span(text, 0, 10, FilterType::Name, 80, 0.9);
        let b = doc_span(text, 23, 33, FilterType::Date, 70, 0.8);
        let out = SpanDisambiguator::resolve(&document, vec![b.clone(), a.clone()]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].start(), 0);
        assert_eq!(out[1].start(), 23);
    }

    #[test]
    fn contained_span_is_dropped() {
        let text = "Patient Jane Doe is here";
        let document = Document::typed(text);
        let outer = doc_span(text, 8, 16, FilterType::Name, 80, 0.9);
        let inner = doc_span(text, 8, 12, FilterType::Name, 80, 0.5);
        let out = SpanDisambiguator::resolve(&document, vec![outer.clone(), inner]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].end(), 16);
    }

    #[test]
    fn higher_priority_wins_on_overlap() {
        let text = "Dr. Jane Doe";
        let document = Document::typed(text);
        let high = doc_span(text, 4, 12, FilterType::Name, 90, 0.6);
        let low = doc_span(text, 0, 8, FilterType::Name, 90, 0.6);
        let out = SpanDisambiguator::resolve(&document, vec![high, low]);
        // Same filter type: overlap merges into the union rather than
        // picking a winner.
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start(), 0);
        assert_eq!(out[0].end(), 12);
    }

    #[test]
    fn different_filter_types_pick_higher_priority_and_drop_short_loser() {
        let text = "5551234567";
        let document = Document::typed(text);
        let phone = doc_span(text, 0, 10, FilterType::Phone, 90, 0.9);
        let mrn = doc_span(text, 3, 10, FilterType::Mrn, 40, 0.5);
        let out = SpanDisambiguator::resolve(&document, vec![phone, mrn]);
        // mrn loses and is fully contained by the winning phone span, so it
        // is dropped outright rather than truncated.
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].filter_type, FilterType::Phone);
    }

    #[test]
    fn final_output_is_sorted_by_start() {
        let text = "AAAA BBBB CCCC";
        let document = Document::typed(text);
        let a = doc_span(text, 10, 14, FilterType::Name, 50, 0.5);
        let b = doc_span(text, 0, 4, FilterType::Date, 50, 0.5);
        let out = SpanDisambiguator::resolve(&document, vec![a, b]);
        assert!(out.windows(2).all(|w| w[0].start() <= w[1].start()));
    }
}

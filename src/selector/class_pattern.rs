//! Class-pattern detection for div-style post markup.

use super::rules::CLASS_RULES;
use super::{keep_best, linked_fraction, Candidate, DetectContext, Source};

/// Evaluate every class rule and keep the highest-scoring one.
#[must_use]
pub fn detect_by_class(ctx: &DetectContext) -> Option<Candidate> {
    let mut best = None;

    for rule in CLASS_RULES {
        let valid = ctx.valid_matches(rule.pattern);
        if valid.len() < ctx.options.min_pattern_matches {
            continue;
        }

        let mut score = rule.priority + linked_fraction(&valid) * 30.0;
        if (5..=50).contains(&valid.len()) {
            score += 20.0;
        } else if valid.len() > 100 {
            score -= 20.0;
        }

        keep_best(
            &mut best,
            Candidate {
                selector: rule.pattern.to_string(),
                match_count: valid.len(),
                score,
                source: Source::ClassPattern,
            },
        );
    }

    best
}

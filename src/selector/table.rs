//! Table-based board detection.
//!
//! Classic bulletin boards render one post per `<tr>`. Known row patterns are
//! tried first with fixed priorities; otherwise every table outside excluded
//! regions is scored on its rows.

use dom_query::Selection;

use super::rules::SPECIAL_ROW_RULES;
use super::{Candidate, DetectContext, Source};
use crate::dom;
use crate::patterns::{FULL_DATE, SHORT_DATE, TABLE_CLASS};

const TABLE_BASE_SCORE: f64 = 120.0;
const ROW_COUNT_BONUS: f64 = 30.0;
const FEW_ROWS_BONUS: f64 = 15.0;
const DATE_BONUS: f64 = 20.0;
const CLASS_BONUS: f64 = 25.0;

/// A row looks like a post when it links somewhere and carries a title-sized
/// amount of text.
fn is_valid_row(row: &Selection) -> bool {
    let len = dom::text_len(row);
    dom::has_link(row) && len > 10 && len < 500
}

fn has_date(row: &Selection) -> bool {
    let text = dom::text_content(row);
    FULL_DATE.is_match(&text) || SHORT_DATE.is_match(&text)
}

/// Nearest ancestor `div`, and nearest ancestor `div` carrying a class.
fn enclosing_divs<'a>(table: &Selection<'a>) -> (Option<Selection<'a>>, Option<Selection<'a>>) {
    let divs: Vec<Selection<'a>> = dom::self_and_ancestors(table)
        .skip(1)
        .filter(|s| dom::tag_name(s).as_deref() == Some("div"))
        .collect();
    let nearest = divs.first().cloned();
    let classed = divs.into_iter().find(|d| dom::first_class(d).is_some());
    (nearest, classed)
}

fn build_selector(ctx: &DetectContext, table: &Selection, valid_rows: usize) -> String {
    let (_, classed_div) = enclosing_divs(table);

    if let Some(parent_class) = classed_div.as_ref().and_then(dom::first_class) {
        let class = dom::css_escape(&parent_class);
        let with_tbody = format!(".{class} table tbody tr");
        if dom::count_matches(ctx.doc, &with_tbody) == valid_rows {
            return with_tbody;
        }
        return format!(".{class} table tr");
    }

    if let Some(table_id) = dom::id(table) {
        return format!("#{} tbody tr", dom::css_escape(&table_id));
    }

    "table tbody tr".to_string()
}

/// Score one table, `None` when it does not look like a board.
fn score_table(ctx: &DetectContext, table: &Selection) -> Option<(f64, usize)> {
    let tbody = table.select("tbody").first();
    let rows = if tbody.exists() { tbody.select("tr") } else { table.select("tr") };
    let rows = dom::each(&rows);

    let min_rows = ctx.options.min_table_rows;
    if rows.len() < min_rows {
        return None;
    }

    let valid_rows = rows.iter().filter(|row| is_valid_row(row)).count();
    if valid_rows < min_rows {
        return None;
    }

    let mut score = TABLE_BASE_SCORE;
    score += if (10..=100).contains(&valid_rows) { ROW_COUNT_BONUS } else { FEW_ROWS_BONUS };

    if rows.iter().any(has_date) {
        score += DATE_BONUS;
    }

    let (nearest_div, _) = enclosing_divs(table);
    let class_text = format!(
        "{} {}",
        dom::class_name(table),
        nearest_div.as_ref().map(dom::class_name).unwrap_or_default()
    )
    .to_lowercase();
    if TABLE_CLASS.is_match(&class_text) {
        score += CLASS_BONUS;
    }

    Some((score, valid_rows))
}

/// Detect a board table.
#[must_use]
pub fn detect_table_board(ctx: &DetectContext) -> Option<Candidate> {
    let min_rows = ctx.options.min_table_rows;

    for rule in SPECIAL_ROW_RULES {
        let valid = ctx
            .valid_matches(rule.pattern)
            .iter()
            .filter(|row| is_valid_row(row))
            .count();
        if valid >= min_rows {
            return Some(Candidate {
                selector: rule.pattern.to_string(),
                match_count: valid,
                score: rule.priority,
                source: Source::Table,
            });
        }
    }

    let mut best: Option<(f64, String)> = None;

    for table in dom::each(&ctx.doc.select("table")) {
        if ctx.is_excluded(&table) {
            continue;
        }
        let Some((score, valid_rows)) = score_table(ctx, &table) else {
            continue;
        };
        if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            best = Some((score, build_selector(ctx, &table, valid_rows)));
        }
    }

    best.map(|(score, selector)| Candidate {
        match_count: dom::count_matches(ctx.doc, &selector),
        selector,
        score,
        source: Source::Table,
    })
}

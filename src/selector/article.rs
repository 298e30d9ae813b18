//! `<article>` tag detection.

use super::{linked_fraction, Candidate, DetectContext, Source};

const ARTICLE_BASE_SCORE: f64 = 100.0;

/// Detect repeated `<article>` elements outside excluded regions.
#[must_use]
pub fn detect_articles(ctx: &DetectContext) -> Option<Candidate> {
    let articles = ctx.valid_matches("article");
    if articles.len() < ctx.options.min_articles {
        return None;
    }

    let mut score = ARTICLE_BASE_SCORE + linked_fraction(&articles) * 30.0;

    if (5..=50).contains(&articles.len()) {
        score += 20.0;
    }

    if articles.iter().any(|el| el.select("h1, h2, h3, h4").exists()) {
        score += 15.0;
    }

    Some(Candidate {
        selector: "article".to_string(),
        match_count: articles.len(),
        score,
        source: Source::Article,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dom, Options};

    #[test]
    fn scores_linked_articles_with_headings() {
        let items: String = (0..6)
            .map(|i| format!(r#"<article><h2><a href="/p/{i}">Post {i}</a></h2></article>"#))
            .collect();
        let doc = dom::parse(&items);
        let options = Options::default();
        let ctx = DetectContext::new(&doc, &options);

        let found = detect_articles(&ctx).unwrap();
        assert_eq!(found.match_count, 6);
        assert_eq!(found.score, 165.0);
    }

    #[test]
    fn partial_links_scale_bonus() {
        let doc = dom::parse(
            r#"<article><a href="/1">a</a></article><article>b</article>
               <article>c</article><article><a href="/4">d</a></article>"#,
        );
        let options = Options::default();
        let ctx = DetectContext::new(&doc, &options);
        assert_eq!(detect_articles(&ctx).unwrap().score, 115.0);
    }

    #[test]
    fn needs_three_articles_outside_chrome() {
        let doc = dom::parse(
            "<article>a</article><article>b</article><header><article>c</article></header>",
        );
        let options = Options::default();
        let ctx = DetectContext::new(&doc, &options);
        assert!(detect_articles(&ctx).is_none());
    }
}

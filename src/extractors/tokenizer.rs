// src/extractors/tokenizer.rs

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::utils::error::ExtractError;

// --- CSS Selectors (Lazy Static) ---
// A job card in the results grid. The class string is matched exactly; the
// grid also contains look-alike wrappers that only share a prefix of it.
static CARD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        "div[class='relative bg-white rounded-xl border border-gray-200 shadow hover:border-gray-500 md:hover:border-gray-200']",
    )
    .expect("Failed to compile CARD_SELECTOR")
});

// Action buttons under a card. More than one means the company has other
// open listings.
static BUTTON_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div[class='flex justify-center space-x-2'] > div")
        .expect("Failed to compile BUTTON_SELECTOR")
});

/// Hyperlink targets pulled from fixed positions inside a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardLinks {
    /// Link to the job's detail page, e.g. `/viewjob/abc123`.
    pub permalink: String,
    /// "More from this company" link, e.g. `/?company=k9x&searchState=...`.
    pub company_link: Option<String>,
}

/// All job cards of a parsed page, in document order.
pub fn find_cards(document: &Html) -> Vec<ElementRef<'_>> {
    document.select(&CARD_SELECTOR).collect()
}

/// Text of every `span` inside the card, one token per text node, in
/// document order. Whitespace runs collapse to one space; blank nodes drop.
pub fn tokenize(card: ElementRef<'_>) -> Vec<String> {
    card.descendants()
        .filter(|node| {
            node.parent()
                .and_then(ElementRef::wrap)
                .map_or(false, |parent| parent.value().name() == "span")
        })
        .filter_map(|node| node.value().as_text().map(|text| normalize_ws(text)))
        .filter(|token| !token.is_empty())
        .collect()
}

/// Reads the permalink (first anchor) and the company link (second anchor)
/// from the card's second `div` child. A card without a permalink cannot be
/// identified and is reported with its token dump.
pub fn extract_links(card: ElementRef<'_>, tokens: &[String]) -> Result<CardLinks, ExtractError> {
    let permalink = nth_anchor_href(card, 0).ok_or_else(|| ExtractError::MissingAnchor {
        anchor: "permalink",
        tokens: tokens.to_vec(),
    })?;
    let company_link = nth_anchor_href(card, 1);

    Ok(CardLinks { permalink, company_link })
}

/// Number of action buttons on the card.
pub fn count_buttons(card: ElementRef<'_>) -> u32 {
    card.select(&BUTTON_SELECTOR).count() as u32
}

/// `div[2]/div/a[n+1]/@href`: first inner div whose n-th anchor child has an href.
fn nth_anchor_href(card: ElementRef<'_>, n: usize) -> Option<String> {
    let body = child_elements(card, "div").nth(1)?;

    child_elements(body, "div")
        .filter_map(|inner| child_elements(inner, "a").nth(n))
        .find_map(|anchor| anchor.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
}

fn child_elements<'a>(parent: ElementRef<'a>, name: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    parent
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |el| el.value().name() == name)
}

pub(crate) fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const CARD_CLASS: &str =
        "relative bg-white rounded-xl border border-gray-200 shadow hover:border-gray-500 md:hover:border-gray-200";

    /// Builds a card the way the results grid renders it: a header div with
    /// the text spans, a body div holding the two links, and the button row.
    pub fn card_html(spans: &[&str], permalink: Option<&str>, company_link: Option<&str>, buttons: usize) -> String {
        let spans: String = spans.iter().map(|s| format!("<span>{}</span>", s)).collect();
        let mut anchors = String::new();
        if let Some(href) = permalink {
            anchors.push_str(&format!("<a href=\"{}\">view</a>", href));
        }
        if let Some(href) = company_link {
            anchors.push_str(&format!("<a href=\"{}\">more</a>", href));
        }
        let button_divs: String = (0..buttons).map(|_| "<div>b</div>").collect();
        format!(
            "<div class=\"{}\"><div>{}</div><div><div>{}</div></div><div class=\"flex justify-center space-x-2\">{}</div></div>",
            CARD_CLASS, spans, anchors, button_divs
        )
    }

    fn first_card(html: &str) -> Html {
        Html::parse_document(&format!("<html><body>{}</body></html>", html))
    }

    #[test]
    fn tokens_follow_document_order_and_collapse_whitespace() {
        let html = format!(
            "<div class=\"{}\"><div><span>  3d </span><p><span>Data\n   Scientist</span></p><span>   </span><span>Palo Alto, California</span></div></div>",
            CARD_CLASS
        );
        let doc = first_card(&html);
        let cards = find_cards(&doc);
        assert_eq!(cards.len(), 1);
        assert_eq!(tokenize(cards[0]), vec!["3d", "Data Scientist", "Palo Alto, California"]);
    }

    #[test]
    fn lookalike_wrappers_are_not_cards() {
        let html = "<div class=\"relative bg-white rounded-xl\"><span>x</span></div>";
        assert!(find_cards(&first_card(html)).is_empty());
    }

    #[test]
    fn links_come_from_second_div() {
        let doc = first_card(&card_html(&["3d"], Some("/viewjob/abc123"), Some("/?company=k9&x=1"), 2));
        let card = find_cards(&doc)[0];
        let links = extract_links(card, &[]).unwrap();
        assert_eq!(links.permalink, "/viewjob/abc123");
        assert_eq!(links.company_link.as_deref(), Some("/?company=k9&x=1"));
        assert_eq!(count_buttons(card), 2);
    }

    #[test]
    fn missing_permalink_is_an_error_with_token_dump() {
        let doc = first_card(&card_html(&["3d", "Engineer"], None, None, 1));
        let card = find_cards(&doc)[0];
        let tokens = tokenize(card);
        match extract_links(card, &tokens) {
            Err(ExtractError::MissingAnchor { anchor, tokens }) => {
                assert_eq!(anchor, "permalink");
                assert_eq!(tokens, vec!["3d", "Engineer"]);
            }
            other => panic!("expected MissingAnchor, got {:?}", other),
        }
    }
}

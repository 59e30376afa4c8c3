//! HTML access helpers shared by the extractor and the validator.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

/// Class of the order title ("PORTARIA Nº 120, DE 3 DE MAIO DE 2024").
pub const ORDER_MARKER: &str = "Texto_Centralizado_Maiusculas";
/// Class of the summary paragraph citing the contract.
pub const SUMMARY_MARKER: &str = "Texto_Ementa";

static ORDER_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(&format!(".{ORDER_MARKER}")).expect("static selector"));
static SUMMARY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(&format!(".{SUMMARY_MARKER}")).expect("static selector"));
pub(crate) static TR_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("static selector"));
pub(crate) static TD_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("static selector"));

pub(crate) fn parse(html: &str) -> Html {
    Html::parse_document(html)
}

/// Element text with every text node trimmed and the pieces concatenated.
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

pub(crate) fn order_element(doc: &Html) -> Option<ElementRef<'_>> {
    doc.select(&ORDER_SEL).next()
}

pub(crate) fn summary_element(doc: &Html) -> Option<ElementRef<'_>> {
    doc.select(&SUMMARY_SEL).next()
}

/// First `<table>` after the `n`-th `<hr>` (1-based) in document order.
pub(crate) fn table_after_hr(doc: &Html, n: usize) -> Option<ElementRef<'_>> {
    let mut seen = 0;
    for node in doc.root_element().descendants() {
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        match el.value().name() {
            "hr" => seen += 1,
            "table" if seen >= n => return Some(el),
            _ => {}
        }
    }
    None
}

//! # Labeled Row Scan
//!
//! Finds the first table row whose text contains one of several accepted
//! labels and returns the text of a cell relative to the labelled one.
//! Matching is a plain substring test, so renamed rows on the upstream page
//! ("Vàng miếng SJC" vs "SJC 1L") are handled by listing both variants.

use scraper::{ElementRef, Html, Selector};

/// Where a label matched and what sat next to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledValue {
    pub label: String,
    pub row_index: usize,
    pub value: String,
}

/// Flattened, whitespace-collapsed text of an element.
fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// # Find Labeled Value
///
/// Scans rows (in document order) selected by `row_selector`. Within a row,
/// the first `td`/`th` containing any of `labels` is the label cell and the
/// cell `value_offset` positions to its right is returned.
///
/// The first row containing a label is authoritative: if its value cell is
/// missing or blank the result is `None`, later rows are not consulted.
///
/// An invalid selector yields `None`.
pub fn find_labeled_value(html: &str, row_selector: &str, labels: &[&str], value_offset: usize) -> Option<LabeledValue> {
    let rows = Selector::parse(row_selector).ok()?;
    let cells = Selector::parse("td, th").ok()?;
    let document = Html::parse_document(html);

    for (row_index, row) in document.select(&rows).enumerate() {
        let texts: Vec<String> = row.select(&cells).map(|c| cell_text(&c)).collect();

        let hit = texts.iter().enumerate().find_map(|(position, text)| {
            labels
                .iter()
                .find(|label| text.contains(*label))
                .map(|label| (position, *label))
        });

        if let Some((position, label)) = hit {
            let value = texts.get(position + value_offset)?.trim().to_string();
            if value.is_empty() {
                return None;
            }
            return Some(LabeledValue {
                label: label.to_string(),
                row_index,
                value,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <table id="gold">
            <tr><th>Loại vàng</th><th>Mua</th><th>Bán</th></tr>
            <tr><td>Vàng nhẫn 9999</td><td>82.100</td><td>83.400</td></tr>
            <tr><td><b>SJC 1L</b>, 10L, 1KG</td><td> 83.500 </td><td>85.500</td></tr>
            <tr><td>Vàng miếng SJC 5 chỉ</td><td>70.000</td><td>71.000</td></tr>
          </table>
        </body></html>
    "#;

    #[test]
    fn first_matching_row_wins() {
        let hit = find_labeled_value(PAGE, "table tr", &["Vàng miếng SJC", "SJC 1L"], 1).unwrap();
        assert_eq!(hit.value, "83.500");
        assert_eq!(hit.label, "SJC 1L");
        assert_eq!(hit.row_index, 2);
    }

    #[test]
    fn offset_selects_the_column() {
        let hit = find_labeled_value(PAGE, "table tr", &["SJC 1L"], 2).unwrap();
        assert_eq!(hit.value, "85.500");
    }

    #[test]
    fn no_label_no_value() {
        assert!(find_labeled_value(PAGE, "table tr", &["PNJ"], 1).is_none());
    }

    #[test]
    fn missing_adjacent_cell_is_none() {
        let page = "<table><tr><td>SJC 1L</td></tr><tr><td>SJC 1L</td><td>1</td></tr></table>";
        assert!(find_labeled_value(page, "tr", &["SJC 1L"], 1).is_none());
    }

    #[test]
    fn bad_selector_is_none() {
        assert!(find_labeled_value(PAGE, "tr[", &["SJC 1L"], 1).is_none());
    }
}

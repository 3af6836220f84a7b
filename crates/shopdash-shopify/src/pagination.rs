//! Cursor pagination for the Admin REST API.
//!
//! Every list endpoint answers with a `Link` header naming the adjacent
//! pages; the cursor travels as the `page_info` query parameter:
//!
//! ```text
//! <https://shop.myshopify.com/admin/api/2024-10/orders.json?limit=250&page_info=PREV>; rel="previous",
//! <https://shop.myshopify.com/admin/api/2024-10/orders.json?limit=250&page_info=NEXT>; rel="next"
//! ```

/// Extracts the `page_info` cursor of the `rel="next"` link, if any.
///
/// `None` means the last page was reached (no header, no next relation, or a
/// next URL without a cursor).
#[must_use]
pub fn extract_next_cursor(link_header: Option<&str>) -> Option<String> {
    let header = link_header?;

    for segment in header.split(',') {
        let segment = segment.trim();
        if !segment.contains(r#"rel="next""#) {
            continue;
        }

        let url = extract_angle_bracket_url(segment)?;
        return extract_query_param(url, "page_info");
    }

    None
}

fn extract_angle_bracket_url(segment: &str) -> Option<&str> {
    let start = segment.find('<')? + 1;
    let end = segment.find('>')?;
    if start >= end {
        return None;
    }
    Some(&segment[start..end])
}

/// Shopify cursors are base64url, so no percent-decoding is needed.
fn extract_query_param(url: &str, param: &str) -> Option<String> {
    let query_start = url.find('?')? + 1;
    let query = &url[query_start..];

    let needle = format!("{param}=");
    for pair in query.split('&') {
        if let Some(value) = pair.strip_prefix(needle.as_str()) {
            let value = value.split('#').next().unwrap_or(value);
            if !value.is_empty() {
                return Some(value.to_owned());
            }
        }
    }
    None
}

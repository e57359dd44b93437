//! HTML output encoding
//!
//! Every user-supplied string is passed through [`encode_html`] before it is
//! placed in a page, either as element text or as a quoted attribute value.

/// HTML entities for encoding special characters
const HTML_ENTITIES: &[(char, &str)] = &[
    ('&', "&amp;"),
    ('<', "&lt;"),
    ('>', "&gt;"),
    ('"', "&quot;"),
    ('\'', "&#x27;"),
    ('/', "&#x2F;"),
    ('`', "&#x60;"),
    ('=', "&#x3D;"),
];

/// Encode HTML entities to prevent XSS attacks
pub fn encode_html(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for c in input.chars() {
        match HTML_ENTITIES.iter().find(|(special, _)| *special == c) {
            Some((_, entity)) => result.push_str(entity),
            None => result.push(c),
        }
    }
    result
}

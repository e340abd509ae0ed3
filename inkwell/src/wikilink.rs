use memchr::{memchr, memmem};

use crate::document::Link;

/// Find `[[target]]` links in raw Markdown.
///
/// Each link's text and url are both the target; `position` is the offset of
/// the opening `[[`. An opening without a closing `]]` is ignored.
pub fn detect_wikilinks(text: &str) -> Vec<Link> {
    let bytes = text.as_bytes();
    let mut links = Vec::new();
    let mut i = 0;

    while let Some(offset) = memchr(b'[', &bytes[i..]) {
        let open = i + offset;
        if bytes.get(open + 1) != Some(&b'[') {
            i = open + 1;
            continue;
        }

        let start = open + 2;
        let Some(len) = memmem::find(&bytes[start..], b"]]") else {
            break;
        };
        let end = start + len;
        let target = &text[start..end];
        links.push(Link {
            text: target.to_string(),
            url: target.to_string(),
            position: open,
            is_wikilink: true,
        });
        i = end + 2;
    }

    links
}

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose};

use crate::gmail::types::MessagePart;

/// Header names the digest cares about; everything else is ignored.
const HEADERS_OF_INTEREST: [&str; 4] = ["subject", "from", "date", "message-id"];

/// Map of lower-cased header name to its first value, restricted to the
/// headers the digest renders.
pub fn parse_headers(payload: &MessagePart) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for h in &payload.headers {
        let lname = h.name.to_lowercase();
        if HEADERS_OF_INTEREST.contains(&lname.as_str()) {
            out.entry(lname).or_insert_with(|| h.value.clone());
        }
    }
    out
}

/// Gmail body data is URL-safe base64, padded or not depending on the part.
/// Undecodable data is dropped, never an error.
fn decode_base64url(data: &str) -> Option<Vec<u8>> {
    general_purpose::URL_SAFE
        .decode(data)
        .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(data))
        .ok()
}

/// Collect the leaf parts of a payload subtree in traversal order. A node with
/// children contributes its children's leaves; a leaf contributes itself.
fn collect_leaves<'a>(part: &'a MessagePart, out: &mut Vec<&'a MessagePart>) {
    if part.parts.is_empty() {
        out.push(part);
    } else {
        for child in &part.parts {
            collect_leaves(child, out);
        }
    }
}

/// Best-effort plain text for a message payload tree.
///
/// `text/plain` leaves are kept verbatim, `text/html` leaves are reduced to
/// text, everything else (attachments, images) is skipped. An empty result
/// means the message has no readable content and should be skipped upstream.
pub fn extract_plain_text(payload: &MessagePart) -> String {
    let mut chunks: Vec<String> = Vec::new();

    // Single-part messages carry the body directly on the payload.
    if let Some(data) = payload.body.as_ref().and_then(|b| b.data.as_deref())
        && let Some(bytes) = decode_base64url(data)
    {
        chunks.push(String::from_utf8_lossy(&bytes).into_owned());
    }

    if !payload.parts.is_empty() {
        let mut leaves = Vec::new();
        collect_leaves(payload, &mut leaves);

        for leaf in leaves {
            let Some(data) = leaf.body.as_ref().and_then(|b| b.data.as_deref()) else {
                continue;
            };
            let Some(bytes) = decode_base64url(data) else {
                continue;
            };
            let decoded = String::from_utf8_lossy(&bytes);
            let mime = leaf.mime_type.as_deref().unwrap_or("");
            if mime.contains("text/plain") {
                chunks.push(decoded.into_owned());
            } else if mime.contains("text/html") {
                chunks.push(html_to_text(&decoded));
            }
        }
    }

    let joined = chunks
        .iter()
        .filter(|c| !c.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    joined.trim().to_string()
}

/// Best-effort HTML to text: drop `<script>`/`<style>` blocks with their
/// content, turn `<br>` into a newline and `</p>` into a paragraph break,
/// then strip every remaining tag.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        rest = &rest[lt..];

        let Some(gt) = rest.find('>') else {
            // unterminated tag: keep the remainder literally
            out.push_str(rest);
            return out;
        };

        let tag = rest[1..gt].trim().to_ascii_lowercase();
        rest = &rest[gt + 1..];

        if let Some(name) = content_stripped_element(&tag) {
            // skip through the matching close tag, content included;
            // with no close tag the content survives and later tags are
            // stripped like any others
            if let Some(end) = find_close_tag(rest, name) {
                rest = &rest[end..];
            }
        } else if is_br(&tag) {
            out.push('\n');
        } else if tag == "/p" {
            out.push_str("\n\n");
        }
    }

    out.push_str(rest);
    out
}

fn content_stripped_element(tag: &str) -> Option<&'static str> {
    ["script", "style"]
        .into_iter()
        .find(|name| tag.starts_with(name))
}

fn is_br(tag: &str) -> bool {
    tag == "br" || tag.starts_with("br/") || tag.starts_with("br ")
}

/// Byte offset just past `</name ...>`, case-insensitive.
fn find_close_tag(haystack: &str, name: &str) -> Option<usize> {
    // ASCII lowercasing keeps byte offsets stable
    let lower = haystack.to_ascii_lowercase();
    let at = lower.find(&format!("</{name}"))?;
    let gt = haystack[at..].find('>')?;
    Some(at + gt + 1)
}

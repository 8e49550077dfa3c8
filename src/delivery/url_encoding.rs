//! `application/x-www-form-urlencoded` bodies.
//!
//! Spaces become `+`; every reserved character is percent-encoded and
//! unreserved characters (alphanumerics, `-`, `_`, `.`, `~`) pass through.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Characters percent-encoded in form values. Space is handled separately.
const FORM_VALUE_SET: &AsciiSet = &CONTROLS
    .add(b'"')
    .add(b'#')
    .add(b'$')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}')
    .add(b'!');

fn encode_component(s: &str, out: &mut String) {
    for (i, chunk) in s.split(' ').enumerate() {
        if i > 0 {
            out.push('+');
        }
        out.extend(utf8_percent_encode(chunk, FORM_VALUE_SET));
    }
}

/// Encode `fields` as a form body, in order.
pub fn form_urlencode<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut body = String::new();
    for (i, (key, value)) in fields.into_iter().enumerate() {
        if i > 0 {
            body.push('&');
        }
        encode_component(key, &mut body);
        body.push('=');
        encode_component(value, &mut body);
    }
    body
}

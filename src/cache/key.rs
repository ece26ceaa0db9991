//! Storage Key Derivation
//!
//! Maps a logical cache key to the key actually sent to the backend.
//!
//! Backends without naming restrictions receive `prefix + key` unchanged.
//! Backends that store one file per key receive a sanitized form containing
//! only `[A-Za-z0-9._~-]`:
//!
//! ```text
//! raw ─▶ collapse whitespace ─▶ reserved placeholders ─▶ entity decode/encode
//!     ─▶ strip letter entities ─▶ spaces to '-' ─▶ percent-encode, '%' to '-'
//! ```

use std::borrow::Cow;

/// Placeholders for characters that are illegal in file names on at least one
/// supported platform. Every placeholder is distinct.
const RESERVED_PLACEHOLDERS: [(char, &str); 8] = [
    ('"', "_dq_"),
    ('*', "_st_"),
    (':', "_cl_"),
    ('<', "_lt_"),
    ('>', "_gt_"),
    ('?', "_qm_"),
    ('\'', "_sq_"),
    ('|', "_pp_"),
];

/// Suffixes of named entities that denote a decorated Latin letter.
const LETTER_ENTITY_SUFFIXES: [&str; 11] = [
    "acute", "cedil", "circ", "grave", "lig", "orn", "ring", "slash", "th", "tilde", "uml",
];

/// Named entities understood by the decode/encode round trip.
const NAMED_ENTITIES: &[(char, &str)] = &[
    ('&', "amp"),
    ('<', "lt"),
    ('>', "gt"),
    ('"', "quot"),
    ('\'', "apos"),
    ('\u{a0}', "nbsp"),
    ('À', "Agrave"),
    ('Á', "Aacute"),
    ('Â', "Acirc"),
    ('Ã', "Atilde"),
    ('Ä', "Auml"),
    ('Å', "Aring"),
    ('Æ', "AElig"),
    ('Ç', "Ccedil"),
    ('È', "Egrave"),
    ('É', "Eacute"),
    ('Ê', "Ecirc"),
    ('Ë', "Euml"),
    ('Ì', "Igrave"),
    ('Í', "Iacute"),
    ('Î', "Icirc"),
    ('Ï', "Iuml"),
    ('Ñ', "Ntilde"),
    ('Ò', "Ograve"),
    ('Ó', "Oacute"),
    ('Ô', "Ocirc"),
    ('Õ', "Otilde"),
    ('Ö', "Ouml"),
    ('Ø', "Oslash"),
    ('Ù', "Ugrave"),
    ('Ú', "Uacute"),
    ('Û', "Ucirc"),
    ('Ü', "Uuml"),
    ('Ý', "Yacute"),
    ('Þ', "THORN"),
    ('ß', "szlig"),
    ('à', "agrave"),
    ('á', "aacute"),
    ('â', "acirc"),
    ('ã', "atilde"),
    ('ä', "auml"),
    ('å', "aring"),
    ('æ', "aelig"),
    ('ç', "ccedil"),
    ('è', "egrave"),
    ('é', "eacute"),
    ('ê', "ecirc"),
    ('ë', "euml"),
    ('ì', "igrave"),
    ('í', "iacute"),
    ('î', "icirc"),
    ('ï', "iuml"),
    ('ñ', "ntilde"),
    ('ò', "ograve"),
    ('ó', "oacute"),
    ('ô', "ocirc"),
    ('õ', "otilde"),
    ('ö', "ouml"),
    ('ø', "oslash"),
    ('ù', "ugrave"),
    ('ú', "uacute"),
    ('û', "ucirc"),
    ('ü', "uuml"),
    ('ý', "yacute"),
    ('þ', "thorn"),
    ('ÿ', "yuml"),
];

/// Storage key codec
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyCodec;

impl KeyCodec {
    /// Compute the backend key for `logical_key` under `prefix`.
    ///
    /// `safe_names` is the bound backend's `requires_safe_keys()` capability.
    pub fn storage_key(prefix: &str, logical_key: &str, safe_names: bool) -> String {
        let raw = format!("{}{}", prefix, logical_key);
        if safe_names {
            Self::sanitize(&raw)
        } else {
            raw
        }
    }

    /// Reduce `raw` to a string usable as a single path segment
    pub fn sanitize(raw: &str) -> String {
        let collapsed = collapse_whitespace(raw);
        let placeheld = replace_reserved(&collapsed);
        let normalized = encode_entities(&decode_entities(&placeheld));
        let plain = collapse_letter_entities(&normalized).replace(' ', "-");

        urlencoding::encode(&plain).replace('%', "-")
    }
}

/// Collapse every run of whitespace or control characters into one space
fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_run = false;
    for c in input.chars() {
        if c.is_whitespace() || c.is_control() {
            if !in_run {
                out.push(' ');
                in_run = true;
            }
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

fn replace_reserved(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 2);
    for c in input.chars() {
        match RESERVED_PLACEHOLDERS.iter().find(|(r, _)| *r == c) {
            Some((_, placeholder)) => out.push_str(placeholder),
            None => out.push(c),
        }
    }
    out
}

/// Decode `&name;`, `&#NNN;` and `&#xHH;` references. Unknown references are
/// left untouched.
fn decode_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match parse_entity(tail) {
            Some((decoded, consumed)) => {
                out.push(decoded);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Parse an entity at the start of `s` (which begins with `&`). Returns the
/// decoded character and the number of bytes consumed.
fn parse_entity(s: &str) -> Option<(char, usize)> {
    let end = s[1..].find(';')? + 1;
    let body = &s[1..end];
    if body.is_empty() || body.len() > 10 {
        return None;
    }

    let decoded = if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        char::from_u32(code)?
    } else {
        NAMED_ENTITIES
            .iter()
            .find(|(_, name)| *name == body)
            .map(|(c, _)| *c)?
    };

    Some((decoded, end + 1))
}

fn encode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\'' => out.push_str("&#039;"),
            _ => match NAMED_ENTITIES.iter().find(|(e, _)| *e == c) {
                Some((_, name)) => {
                    out.push('&');
                    out.push_str(name);
                    out.push(';');
                }
                None => out.push(c),
            },
        }
    }
    out
}

/// Replace decorated-letter entities (`&eacute;`, `&AElig;`) with their base
/// letters (`e`, `AE`)
fn collapse_letter_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        match letter_entity_base(tail) {
            Some((base, consumed)) => {
                out.push_str(base);
                rest = &tail[consumed..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn letter_entity_base(s: &str) -> Option<(&str, usize)> {
    let name_len = s[1..].find(|c: char| !c.is_ascii_alphabetic())?;
    if s[1..].as_bytes().get(name_len) != Some(&b';') {
        return None;
    }
    let name = &s[1..1 + name_len];

    LETTER_ENTITY_SUFFIXES.iter().find_map(|suffix| {
        let base = name.strip_suffix(suffix)?;
        if (1..=2).contains(&base.len()) {
            Some((base, name_len + 2))
        } else {
            None
        }
    })
}

// =============================================================================
// Tests
// =============================================================================

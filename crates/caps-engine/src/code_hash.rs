//! Structural code hashing for step sources.
//!
//! The code hash must ignore comments and formatting but change with any
//! semantically relevant token. The normalization is frozen here: strip
//! `//` and (nested) `/* */` comments, pass string/char/raw-string
//! literals through verbatim, collapse every other whitespace run to a
//! single space, trim. This is a pure function of the token stream.
//!
//! The hash is NOT portable across host languages: the same logical step
//! written elsewhere hashes differently, and tooling migrations must
//! expect run ids to change.

use caps_core::hash::{digest_bytes, Digest};

/// Digest of the normalized source.
pub fn hash_source(src: &str) -> Digest {
    digest_bytes(normalize_source(src).as_bytes())
}

/// The frozen normal form. Exposed for tests and diagnostics.
pub fn normalize_source(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let n = chars.len();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;

    while i < n {
        let c = chars[i];

        // Line comment.
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < n && chars[i] != '\n' {
                i += 1;
            }
            push_space(&mut out);
            continue;
        }

        // Block comment, nesting respected.
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let mut depth = 1usize;
            i += 2;
            while i < n && depth > 0 {
                if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
                    depth += 1;
                    i += 2;
                } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    depth -= 1;
                    i += 2;
                } else {
                    i += 1;
                }
            }
            push_space(&mut out);
            continue;
        }

        // Raw string literal: r"..." or r#"..."# with any number of #s.
        if c == 'r' && matches!(chars.get(i + 1), Some('"') | Some('#')) {
            let mut j = i + 1;
            let mut hashes = 0usize;
            while chars.get(j) == Some(&'#') {
                hashes += 1;
                j += 1;
            }
            if chars.get(j) == Some(&'"') {
                j += 1;
                loop {
                    match chars.get(j) {
                        None => break,
                        Some('"') => {
                            let mut k = j + 1;
                            let mut closing = 0usize;
                            while closing < hashes && chars.get(k) == Some(&'#') {
                                closing += 1;
                                k += 1;
                            }
                            if closing == hashes {
                                j = k;
                                break;
                            }
                            j += 1;
                        }
                        Some(_) => j += 1,
                    }
                }
                out.extend(chars[i..j].iter());
                i = j;
                continue;
            }
            // An identifier that merely starts with `r`; fall through.
        }

        // Ordinary string literal, escapes respected.
        if c == '"' {
            let start = i;
            i += 1;
            while i < n {
                match chars[i] {
                    '\\' => i += 2,
                    '"' => {
                        i += 1;
                        break;
                    }
                    _ => i += 1,
                }
            }
            out.extend(chars[start..i.min(n)].iter());
            continue;
        }

        // Char literal vs lifetime: 'a' closes within two chars, 'a does not.
        if c == '\'' {
            let is_char_literal = chars.get(i + 1) == Some(&'\\')
                || chars.get(i + 2) == Some(&'\'');
            if is_char_literal {
                let start = i;
                i += 1;
                while i < n {
                    match chars[i] {
                        '\\' => i += 2,
                        '\'' => {
                            i += 1;
                            break;
                        }
                        _ => i += 1,
                    }
                }
                out.extend(chars[start..i.min(n)].iter());
                continue;
            }
        }

        if c.is_whitespace() {
            while i < n && chars[i].is_whitespace() {
                i += 1;
            }
            push_space(&mut out);
            continue;
        }

        out.push(c);
        i += 1;
    }

    out.trim().to_string()
}

fn push_space(out: &mut String) {
    if !out.is_empty() && !out.ends_with(' ') {
        out.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEP: &str = r#"
        fn transform(text: &str) -> String {
            // append the configured suffix
            format!("{}{}", text, "!")
        }
    "#;

    #[test]
    fn comments_and_formatting_are_ignored() {
        let reformatted = "fn transform(text: &str) -> String \
                           { /* core */ format!(\"{}{}\", text, \"!\") }";
        assert_eq!(hash_source(STEP), hash_source(reformatted));
    }

    #[test]
    fn token_changes_change_the_hash() {
        let changed = STEP.replace("\"!\"", "\"?\"");
        assert_ne!(hash_source(STEP), hash_source(&changed));
    }

    #[test]
    fn string_literal_whitespace_is_significant() {
        let a = normalize_source(r#"let s = "a b";"#);
        let b = normalize_source(r#"let s = "a  b";"#);
        assert_ne!(a, b);
    }

    #[test]
    fn nested_block_comments_are_stripped() {
        let src = "a /* outer /* inner */ still outer */ b";
        assert_eq!(normalize_source(src), "a b");
    }

    #[test]
    fn raw_strings_pass_through() {
        let src = "let s = r#\"kept   // not a comment\"#;";
        let norm = normalize_source(src);
        assert!(norm.contains("kept   // not a comment"));
    }

    #[test]
    fn lifetimes_are_not_char_literals() {
        let src = "fn f<'a>(x: &'a str) -> &'a str { x }";
        assert_eq!(normalize_source(src), src);
    }

    #[test]
    fn escaped_char_literals_are_preserved() {
        let src = "let c = '\\n';  let q = '\\'';";
        let norm = normalize_source(src);
        assert!(norm.contains("'\\n'"));
        assert!(norm.contains("'\\''"));
    }
}

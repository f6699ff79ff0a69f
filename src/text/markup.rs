//! Inline text markup.
//!
//! `\b{...}` bold and `\i{...}` italic (nestable), `^{...}` superscript,
//! `_{...}` subscript, and `\name` escapes for Greek letters and math
//! symbols. Unrecognized escapes pass through verbatim.

use crate::error::{Error, Result};

/// Script level of a glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Script {
    #[default]
    Normal,
    /// Raised, at 0.6x size.
    Super,
    /// Lowered, at 0.6x size.
    Sub,
}

/// One character with resolved styling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyledGlyph {
    pub ch: char,
    pub bold: bool,
    pub italic: bool,
    pub script: Script,
}

/// Latin-name escapes mapped to Unicode.
fn named_symbol(name: &str) -> Option<char> {
    let ch = match name {
        "alpha" => 'α',
        "beta" => 'β',
        "gamma" => 'γ',
        "delta" => 'δ',
        "epsilon" => 'ε',
        "zeta" => 'ζ',
        "eta" => 'η',
        "theta" => 'θ',
        "iota" => 'ι',
        "kappa" => 'κ',
        "lambda" => 'λ',
        "mu" => 'μ',
        "nu" => 'ν',
        "xi" => 'ξ',
        "omicron" => 'ο',
        "pi" => 'π',
        "rho" => 'ρ',
        "sigma" => 'σ',
        "tau" => 'τ',
        "upsilon" => 'υ',
        "phi" => 'φ',
        "chi" => 'χ',
        "psi" => 'ψ',
        "omega" => 'ω',
        "Alpha" => 'Α',
        "Beta" => 'Β',
        "Gamma" => 'Γ',
        "Delta" => 'Δ',
        "Epsilon" => 'Ε',
        "Zeta" => 'Ζ',
        "Eta" => 'Η',
        "Theta" => 'Θ',
        "Iota" => 'Ι',
        "Kappa" => 'Κ',
        "Lambda" => 'Λ',
        "Mu" => 'Μ',
        "Nu" => 'Ν',
        "Xi" => 'Ξ',
        "Omicron" => 'Ο',
        "Pi" => 'Π',
        "Rho" => 'Ρ',
        "Sigma" => 'Σ',
        "Tau" => 'Τ',
        "Upsilon" => 'Υ',
        "Phi" => 'Φ',
        "Chi" => 'Χ',
        "Psi" => 'Ψ',
        "Omega" => 'Ω',
        "leftarrow" => '←',
        "uparrow" => '↑',
        "rightarrow" => '→',
        "downarrow" => '↓',
        "Leftarrow" => '⇐',
        "Uparrow" => '⇑',
        "Rightarrow" => '⇒',
        "Downarrow" => '⇓',
        "otimes" => '⊗',
        "oplus" => '⊕',
        "infty" => '∞',
        "approx" => '≈',
        "ne" => '≠',
        "leq" => '≤',
        "geq" => '≥',
        "pm" => '±',
        "cdot" => '·',
        "times" => '×',
        "partial" => '∂',
        "nabla" => '∇',
        "int" => '∫',
        "sum" => '∑',
        "prod" => '∏',
        _ => return None,
    };
    Some(ch)
}

#[derive(Debug, Clone, Copy, Default)]
struct State {
    bold: bool,
    italic: bool,
    script: Script,
}

/// Parse a marked-up string into a flat sequence of styled glyphs.
pub fn parse_markup(input: &str) -> Result<Vec<StyledGlyph>> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    parse_run(&chars, &mut i, State::default(), None, &mut out)?;
    Ok(out)
}

/// Parse until `stop` (or end of input when None), appending glyphs.
fn parse_run(
    chars: &[char],
    i: &mut usize,
    state: State,
    stop: Option<char>,
    out: &mut Vec<StyledGlyph>,
) -> Result<()> {
    while *i < chars.len() {
        let c = chars[*i];
        if Some(c) == stop {
            *i += 1;
            return Ok(());
        }
        match c {
            '\\' => {
                *i += 1;
                parse_escape(chars, i, state, out)?;
            }
            '^' | '_' => {
                *i += 1;
                let script = if c == '^' { Script::Super } else { Script::Sub };
                let sub_state = State { script, ..state };
                if chars.get(*i) == Some(&'{') {
                    *i += 1;
                    parse_run(chars, i, sub_state, Some('}'), out)?;
                } else if let Some(&single) = chars.get(*i) {
                    *i += 1;
                    out.push(glyph(single, sub_state));
                }
            }
            _ => {
                *i += 1;
                out.push(glyph(c, state));
            }
        }
    }
    if stop.is_some() {
        return Err(Error::validation("unterminated group in text markup"));
    }
    Ok(())
}

fn parse_escape(
    chars: &[char],
    i: &mut usize,
    state: State,
    out: &mut Vec<StyledGlyph>,
) -> Result<()> {
    // \b{...} and \i{...} toggle style for the group.
    if let (Some(&style_char), Some(&'{')) = (chars.get(*i), chars.get(*i + 1)) {
        if style_char == 'b' || style_char == 'i' {
            *i += 2;
            let sub_state = State {
                bold: state.bold || style_char == 'b',
                italic: state.italic || style_char == 'i',
                ..state
            };
            return parse_run(chars, i, sub_state, Some('}'), out);
        }
    }
    // \name symbol escape: consume a run of ASCII letters.
    let start = *i;
    while *i < chars.len() && chars[*i].is_ascii_alphabetic() {
        *i += 1;
    }
    let name: String = chars[start..*i].iter().collect();
    if let Some(sym) = named_symbol(&name) {
        out.push(glyph(sym, state));
    } else {
        // Unknown escape: emit verbatim including the backslash.
        out.push(glyph('\\', state));
        for &c in &chars[start..*i] {
            out.push(glyph(c, state));
        }
    }
    Ok(())
}

fn glyph(ch: char, state: State) -> StyledGlyph {
    StyledGlyph {
        ch,
        bold: state.bold,
        italic: state.italic,
        script: state.script,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_of(glyphs: &[StyledGlyph]) -> String {
        glyphs.iter().map(|g| g.ch).collect()
    }

    #[test]
    fn plain_text_passes_through() {
        let g = parse_markup("hello").unwrap();
        assert_eq!(text_of(&g), "hello");
        assert!(g.iter().all(|g| !g.bold && !g.italic));
    }

    #[test]
    fn bold_and_italic_nest() {
        let g = parse_markup(r"a\b{b\i{c}}d").unwrap();
        assert_eq!(text_of(&g), "abcd");
        assert!(!g[0].bold);
        assert!(g[1].bold && !g[1].italic);
        assert!(g[2].bold && g[2].italic);
        assert!(!g[3].bold);
    }

    #[test]
    fn scripts_cover_groups_and_single_chars() {
        let g = parse_markup("x^{21}_i").unwrap();
        assert_eq!(text_of(&g), "x21i");
        assert_eq!(g[0].script, Script::Normal);
        assert_eq!(g[1].script, Script::Super);
        assert_eq!(g[2].script, Script::Super);
        assert_eq!(g[3].script, Script::Sub);
    }

    #[test]
    fn greek_escapes_resolve() {
        let g = parse_markup(r"\gamma\Omega\rightarrow").unwrap();
        assert_eq!(text_of(&g), "γΩ→");
    }

    #[test]
    fn unknown_escape_passes_verbatim() {
        let g = parse_markup(r"\foo").unwrap();
        assert_eq!(text_of(&g), "\\foo");
    }

    #[test]
    fn unterminated_group_is_an_error() {
        assert!(parse_markup(r"\b{oops").is_err());
    }
}

//! Star name normalization and matching.
//!
//! The service labels stars with Greek Bayer letters (`α Ori`) while the
//! catalog spells them out (`Alpha Ori`). Names are normalized to the
//! spelled-out form, then matched on whole tokens.

/// Greek lowercase letters and their Latin names.
const GREEK_LETTERS: [(char, &str); 24] = [
    ('α', "Alpha"),
    ('β', "Beta"),
    ('γ', "Gamma"),
    ('δ', "Delta"),
    ('ε', "Epsilon"),
    ('ζ', "Zeta"),
    ('η', "Eta"),
    ('θ', "Theta"),
    ('ι', "Iota"),
    ('κ', "Kappa"),
    ('λ', "Lambda"),
    ('μ', "Mu"),
    ('ν', "Nu"),
    ('ξ', "Xi"),
    ('ο', "Omicron"),
    ('π', "Pi"),
    ('ρ', "Rho"),
    ('σ', "Sigma"),
    ('τ', "Tau"),
    ('υ', "Upsilon"),
    ('φ', "Phi"),
    ('χ', "Chi"),
    ('ψ', "Psi"),
    ('ω', "Omega"),
];

/// Folds capitals, accented vowels and symbol variants onto the lowercase table.
fn fold_greek(c: char) -> char {
    match c {
        'ς' | 'ϲ' | 'Ϲ' => 'σ',
        'ϐ' => 'β',
        'ϑ' | 'ϴ' => 'θ',
        'ϕ' => 'φ',
        'ϖ' => 'π',
        'ϵ' | '϶' => 'ε',
        'ϱ' | 'ϼ' => 'ρ',
        'ϰ' => 'κ',
        'ϒ' | 'ϓ' | 'ϔ' => 'υ',
        'ά' | 'Ά' => 'α',
        'έ' | 'Έ' => 'ε',
        'ή' | 'Ή' => 'η',
        'ί' | 'ϊ' | 'ΐ' | 'Ί' | 'Ϊ' => 'ι',
        'ό' | 'Ό' => 'ο',
        'ύ' | 'ϋ' | 'ΰ' | 'Ύ' | 'Ϋ' => 'υ',
        'ώ' | 'Ώ' => 'ω',
        'Α'..='Ω' => c.to_lowercase().next().unwrap_or(c),
        _ => c,
    }
}

fn is_greek_block(c: char) -> bool {
    ('\u{0370}'..='\u{03FF}').contains(&c)
}

fn latin_name(c: char) -> Option<&'static str> {
    let folded = fold_greek(c);
    GREEK_LETTERS
        .iter()
        .find(|(greek, _)| *greek == folded)
        .map(|(_, latin)| *latin)
}

/// Spells out Greek letters and collapses runs of whitespace.
///
/// `"α  Ori"` → `"Alpha Ori"`. Codepoints of the Greek block with no Latin
/// spelling (archaic letters, Coptic, Greek punctuation) are dropped, so the
/// result never contains Greek. Idempotent.
pub fn normalize_name(name: &str) -> String {
    let mut spelled = String::with_capacity(name.len() + 8);
    for c in name.chars() {
        match latin_name(c) {
            Some(latin) => spelled.push_str(latin),
            None if is_greek_block(c) => {}
            None => spelled.push(c),
        }
    }
    spelled.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokens(name: &str) -> Vec<&str> {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whether `pattern` occurs in `alias` as a run of whole tokens.
///
/// `alias` is normalized first. Tokens compare ASCII case-insensitively, so
/// `"Eta Ori"` matches `"η Ori / 28 Ori"` but not `"Theta Ori"`.
pub fn matches_pattern(pattern: &str, alias: &str) -> bool {
    let wanted = tokens(pattern);
    if wanted.is_empty() {
        return false;
    }

    let normalized = normalize_name(alias);
    let have = tokens(&normalized);
    have.windows(wanted.len()).any(|window| {
        window
            .iter()
            .zip(&wanted)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
    })
}

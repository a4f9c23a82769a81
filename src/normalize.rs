// 🔤 Text Normalizer
// Makes a hand-typed payment reference comparable with a roster name.
//
// Pipeline (order matters):
//   trim → lowercase → NBSP → collapse whitespace → digit/letter boundaries → fold
//
// Each step is a pure function so it can be tested on its own.

/// Run the full normalization pipeline.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    let s = text.trim();
    let s = lowercase(s);
    let s = replace_non_breaking_spaces(&s);
    let s = collapse_whitespace(&s);
    let s = split_digit_letter_boundaries(&s);
    fold_letters(&s)
}

pub fn lowercase(text: &str) -> String {
    text.to_lowercase()
}

/// NBSP, narrow NBSP and figure space become a plain space.
pub fn replace_non_breaking_spaces(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{00A0}' | '\u{202F}' | '\u{2007}' => ' ',
            other => other,
        })
        .collect()
}

/// Any run of whitespace becomes a single space; leading/trailing runs vanish.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// "Mueller5" → "Mueller 5", "12345abc" → "12345 abc"
pub fn split_digit_letter_boundaries(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut prev: Option<char> = None;

    for c in text.chars() {
        if let Some(p) = prev {
            let letter_to_digit = p.is_alphabetic() && c.is_ascii_digit();
            let digit_to_letter = p.is_ascii_digit() && c.is_alphabetic();
            if letter_to_digit || digit_to_letter {
                out.push(' ');
            }
        }
        out.push(c);
        prev = Some(c);
    }

    out
}

/// Fold accented letters, then collapse digraphs.
pub fn fold_letters(text: &str) -> String {
    fold_digraphs(&fold_diacritics(text))
}

/// "müller" → "muller", "straße" → "strasse", "josé" → "jose"
pub fn fold_diacritics(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match fold_char(c) {
            Some(replacement) => out.push_str(replacement),
            None => out.push(c),
        }
    }
    out
}

fn fold_char(c: char) -> Option<&'static str> {
    let folded = match c {
        'ä' | 'á' | 'à' | 'â' | 'ã' | 'å' | 'ą' => "a",
        'æ' => "ae",
        'ç' | 'ć' | 'č' => "c",
        'ď' => "d",
        'é' | 'è' | 'ê' | 'ë' | 'ę' | 'ě' => "e",
        'í' | 'ì' | 'î' | 'ï' => "i",
        'ł' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ö' | 'ó' | 'ò' | 'ô' | 'õ' | 'ø' => "o",
        'œ' => "oe",
        'ř' => "r",
        'ß' => "ss",
        'ś' | 'š' => "s",
        'ť' => "t",
        'ü' | 'ú' | 'ù' | 'û' | 'ů' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        _ => return None,
    };
    Some(folded)
}

const DIGRAPHS: [(&str, &str); 3] = [("ae", "a"), ("oe", "o"), ("ue", "u")];

/// "mueller" → "muller", so the transliterated and the umlaut spelling agree.
///
/// Repeats until nothing changes: a single pass over "uee" leaves "ue".
pub fn fold_digraphs(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut next = current.clone();
        for (from, to) in DIGRAPHS {
            next = next.replace(from, to);
        }
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Keep only alphanumeric characters ("mueller, lisa" → "muellerlisa").
pub fn strip_non_alphanumeric(text: &str) -> String {
    text.chars().filter(|c| c.is_alphanumeric()).collect()
}

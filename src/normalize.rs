//! Normalization of the free-text and numeric fields found in Base.gov CSV
//! exports.
//!
//! Every equality comparison of legal citations and procedure types goes
//! through [`normalize_text`] so that case and whitespace variance in the
//! source data does not cause false negatives. Accents are preserved: the
//! legal texts are compared accent-sensitively. Only the search/sort helper
//! [`normalize_for_search`] additionally folds diacritics.

/// Trims, collapses internal whitespace runs to a single space and lowercases.
pub fn normalize_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// [`normalize_text`] plus diacritic folding. Used for keyword search and as
/// the collation key approximating pt-PT ordering of findings.
pub fn normalize_for_search(value: &str) -> String {
    normalize_text(value).chars().map(fold_diacritic).collect()
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Parses a Portuguese-formatted monetary string ("1.234,56 €") into a float.
///
/// Strips everything except digits, comma, dot and minus; removes dots acting
/// as thousands separators (a dot followed by a run of exactly three digits);
/// converts a trailing comma-decimal of one or two digits to a dot-decimal.
/// Returns 0.0 when nothing numeric remains. The sign is preserved; callers
/// that require a non-negative amount clamp at their end.
pub fn parse_price(value: &str) -> f64 {
    let cleaned: Vec<char> = value
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();
    if cleaned.is_empty() {
        return 0.0;
    }

    let mut without_grouping = String::with_capacity(cleaned.len());
    for (i, &c) in cleaned.iter().enumerate() {
        if c == '.' {
            let trailing_digits = cleaned[i + 1..]
                .iter()
                .take_while(|d| d.is_ascii_digit())
                .count();
            if trailing_digits == 3 {
                continue;
            }
        }
        without_grouping.push(c);
    }

    let normalized = convert_decimal_comma(&without_grouping);
    leading_float(&normalized).unwrap_or(0.0)
}

/// Replaces a final ",D" or ",DD" suffix with a dot decimal.
fn convert_decimal_comma(value: &str) -> String {
    if let Some(pos) = value.rfind(',') {
        let decimals = &value[pos + 1..];
        let len = decimals.chars().count();
        if (1..=2).contains(&len) && decimals.chars().all(|c| c.is_ascii_digit()) {
            return format!("{}.{}", &value[..pos], decimals);
        }
    }
    value.to_string()
}

/// Parses the longest leading float prefix (sign, digits, one dot), matching
/// the prefix semantics the original exports were cleaned with. "1,234"
/// therefore yields 1.0, not an error.
fn leading_float(value: &str) -> Option<f64> {
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_digit = false;
    for (i, c) in value.char_indices() {
        match c {
            '-' if i == 0 => {}
            '.' if !seen_dot => seen_dot = true,
            d if d.is_ascii_digit() => seen_digit = true,
            _ => break,
        }
        end = i + c.len_utf8();
    }
    if !seen_digit {
        return None;
    }
    value[..end].parse::<f64>().ok().filter(|f| f.is_finite())
}

const DATE_FORMATS: [&str; 4] = ["%d-%m-%Y", "%d/%m/%Y", "%Y-%m-%d", "%Y/%m/%d"];

/// Tries the explicit export formats in order (day-first before ISO, matching
/// Portuguese convention for ambiguous numeric dates), then a lenient
/// datetime fallback. Returns `None` when nothing matches.
pub fn parse_date(value: &str) -> Option<chrono::NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = chrono::NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date);
        }
    }
    // Lenient fallback for timestamped exports.
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
        .map(|dt| dt.date())
        .ok()
}

/// Year component of [`parse_date`].
pub fn parse_year(value: &str) -> Option<i32> {
    parse_date(value).map(|d| chrono::Datelike::year(&d))
}

/// Splits the multi-valued contract-type cell on HTML line breaks, pipe,
/// semicolon or newline, decodes the entities Base.gov emits, normalizes each
/// piece and drops empties.
pub fn extract_contract_types(raw: &str) -> Vec<String> {
    // Every piece ends up lowercased by normalize_text, so decoding can work
    // on a single lowercased copy.
    let decoded = replace_br_tags(&raw.to_lowercase())
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    decoded
        .split(['|', ';', '\n'])
        .map(normalize_text)
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Turns `<br>`, `<br/>` and `<br />` into newlines. Expects lowercased input.
fn replace_br_tags(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut i = 0;
    while i < value.len() {
        if value[i..].starts_with("<br") {
            let rest = &value[i + 3..];
            let tag_end = rest
                .char_indices()
                .take_while(|(_, c)| c.is_whitespace() || *c == '/')
                .last()
                .map(|(idx, c)| idx + c.len_utf8())
                .unwrap_or(0);
            if rest[tag_end..].starts_with('>') {
                out.push('\n');
                i += 3 + tag_end + 1;
                continue;
            }
        }
        let c = value[i..].chars().next().unwrap_or('\0');
        out.push(c);
        i += c.len_utf8();
    }
    out
}

/// True when the trimmed value is a non-empty run of ASCII digits. Used to
/// validate framework-agreement registration numbers.
pub fn has_numeric_value(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit())
}

const UNITS: [&str; 10] = [
    "zero", "um", "dois", "três", "quatro", "cinco", "seis", "sete", "oito", "nove",
];
const TEENS: [&str; 10] = [
    "dez",
    "onze",
    "doze",
    "treze",
    "catorze",
    "quinze",
    "dezasseis",
    "dezassete",
    "dezoito",
    "dezanove",
];
const TENS: [&str; 10] = [
    "", "dez", "vinte", "trinta", "quarenta", "cinquenta", "sessenta", "setenta", "oitenta",
    "noventa",
];
const HUNDREDS: [&str; 10] = [
    "",
    "cento",
    "duzentos",
    "trezentos",
    "quatrocentos",
    "quinhentos",
    "seiscentos",
    "setecentos",
    "oitocentos",
    "novecentos",
];

fn below_hundred(n: u64) -> String {
    if n < 10 {
        return UNITS[n as usize].to_string();
    }
    if n < 20 {
        return TEENS[(n - 10) as usize].to_string();
    }
    let ten = (n / 10) as usize;
    let unit = (n % 10) as usize;
    if unit == 0 {
        TENS[ten].to_string()
    } else {
        format!("{} e {}", TENS[ten], UNITS[unit])
    }
}

fn below_thousand(n: u64) -> String {
    if n == 0 {
        return String::new();
    }
    if n == 100 {
        return "cem".to_string();
    }
    let hundred = (n / 100) as usize;
    let remainder = n % 100;
    let mut parts = Vec::new();
    if hundred > 0 {
        parts.push(HUNDREDS[hundred].to_string());
    }
    if remainder > 0 {
        parts.push(below_hundred(remainder));
    }
    parts.join(" e ")
}

/// Renders a non-negative integer as Portuguese words ("cem" for exactly 100,
/// "mil" unpluralized for exactly 1000). Only used for display of audit
/// years, so the supported range stays in the low hundred-thousands.
pub fn number_to_portuguese_words(value: u64) -> String {
    if value == 0 {
        return "zero".to_string();
    }
    let thousands = value / 1000;
    let remainder = value % 1000;
    let mut parts = Vec::new();
    if thousands > 0 {
        if thousands == 1 {
            parts.push("mil".to_string());
        } else {
            parts.push(format!("{} mil", below_thousand(thousands)));
        }
    }
    if remainder > 0 {
        parts.push(below_thousand(remainder));
    }
    parts.join(" e ")
}

/// "2023 (dois mil e vinte e três)", used on the report cover.
pub fn format_year_with_words(year: i32) -> String {
    format!("{} ({})", year, number_to_portuguese_words(year.max(0) as u64))
}

/// pt-PT currency rendering: space-grouped thousands, comma decimal,
/// trailing euro sign.
pub fn format_euro(value: f64) -> String {
    let negative = value < 0.0;
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }

    let sign = if negative { "-" } else { "" };
    format!("{}{},{:02} €", sign, grouped, fraction)
}

// 🧹 Normalization Engine
// Canonical forms for surnames, dates and place names from archival records
//
// Every function here is total: values that are not text (or are blank)
// pass through untouched, and nothing ever returns an error.

use crate::rules::NormalizationRuleSet;
use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Hierarchy separators in place names ("Тверская губ., Бежецкий у.")
pub const LOCATION_SEPARATORS: &[char] = &[',', ';', '/', '|', '>'];

/// Separators between date components
const DATE_SEPARATORS: &[char] = &['-', '.', '/', ','];

// ============================================================================
// FIELD VALUE
// ============================================================================

/// One cell of a record column, as handed over by the loader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Missing,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Type a raw cell the way a data-frame loader would
    pub fn infer(cell: &str) -> FieldValue {
        if cell.is_empty() {
            return FieldValue::Missing;
        }

        let trimmed = cell.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return FieldValue::Integer(n);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return FieldValue::Float(f);
            }
        }

        FieldValue::Text(cell.to_string())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Integer(n)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Missing => Ok(()),
            FieldValue::Integer(n) => write!(f, "{}", n),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

// ============================================================================
// DATE RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePrecision {
    Day,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateStatus {
    /// Canonical `YYYY-MM-DD`, `YYYY-MM` or `YYYY`
    Normalized(DatePrecision),
    /// Blank or non-text input, passed through
    Missing,
    /// Text that matched no recognized layout; value returned unchanged
    Unparsed,
}

/// Outcome of date normalization: the value plus how it was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateNormalization {
    pub value: FieldValue,
    pub status: DateStatus,
}

impl DateNormalization {
    fn normalized(value: String, precision: DatePrecision) -> Self {
        DateNormalization {
            value: FieldValue::Text(value),
            status: DateStatus::Normalized(precision),
        }
    }

    /// True when text was present but could not be read as a date
    pub fn is_unparsed(&self) -> bool {
        self.status == DateStatus::Unparsed
    }

    pub fn precision(&self) -> Option<DatePrecision> {
        match self.status {
            DateStatus::Normalized(p) => Some(p),
            _ => None,
        }
    }

    /// Year of a normalized date, for grouping by year
    pub fn year(&self) -> Option<i32> {
        self.precision()?;
        self.value.as_text()?.get(..4)?.parse().ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateToken {
    Number { value: u32, digits: usize },
    Month(u32),
}

impl DateToken {
    fn year(&self) -> Option<i32> {
        match *self {
            DateToken::Number { value, digits: 4 } if value > 0 => Some(value as i32),
            _ => None,
        }
    }

    fn month(&self) -> Option<u32> {
        match *self {
            DateToken::Number { value, digits } if digits <= 2 && (1..=12).contains(&value) => {
                Some(value)
            }
            DateToken::Month(m) => Some(m),
            _ => None,
        }
    }

    fn day(&self) -> Option<u32> {
        match *self {
            DateToken::Number { value, digits } if digits <= 2 => Some(value),
            _ => None,
        }
    }
}

// ============================================================================
// COLUMN HELPERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Surname,
    Date,
    Location,
}

/// A derived column: the source column is never modified
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedColumn {
    pub values: Vec<FieldValue>,
    /// Values that differ from their source cell
    pub changed: usize,
    /// Dates flagged as unparsed (always 0 for other kinds)
    pub unparsed: usize,
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// Stateless normalizer bound to one immutable rule table
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: NormalizationRuleSet,
}

impl Normalizer {
    pub fn new(rules: NormalizationRuleSet) -> Result<Self> {
        rules.validate()?;
        Ok(Normalizer { rules })
    }

    /// Shared normalizer over the built-in Russian rule table
    pub fn standard() -> &'static Normalizer {
        static STANDARD: OnceLock<Normalizer> = OnceLock::new();
        STANDARD.get_or_init(|| Normalizer {
            rules: NormalizationRuleSet::russian(),
        })
    }

    pub fn rules(&self) -> &NormalizationRuleSet {
        &self.rules
    }

    // ------------------------------------------------------------------------
    // Surnames
    // ------------------------------------------------------------------------

    pub fn surname(&self, value: &FieldValue) -> FieldValue {
        match value {
            FieldValue::Text(text) if !text.is_empty() => FieldValue::Text(self.surname_text(text)),
            other => other.clone(),
        }
    }

    /// Lowercase, keep letters and hyphens, rewrite feminine endings per part.
    /// Input without any letter comes back unchanged.
    pub fn surname_text(&self, text: &str) -> String {
        let cleaned: String = text
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphabetic() || *c == '-')
            .collect();

        if !cleaned.chars().any(char::is_alphabetic) {
            return text.to_string();
        }

        cleaned
            .split('-')
            .map(|part| self.surname_part(part))
            .collect::<Vec<_>>()
            .join("-")
    }

    fn surname_part(&self, part: &str) -> String {
        let mut current = part.to_string();

        // Each rewrite shortens the word or leaves a terminal ending,
        // so the chain is bounded by the word length.
        for _ in 0..=part.chars().count() {
            match self.rewrite_ending(&current) {
                Some(next) => current = next,
                None => break,
            }
        }

        match self.rules.matching_prefix(&current) {
            Some(prefix) => format!("{}{}", prefix, &current[prefix.len()..]),
            None => current,
        }
    }

    fn rewrite_ending(&self, word: &str) -> Option<String> {
        if let Some(rewritten) = self
            .rules
            .female_endings()
            .iter()
            .find_map(|rule| rule.apply(word))
        {
            return Some(rewritten);
        }

        let generic = self.rules.generic_feminine_suffix()?;
        let stem = word.strip_suffix(generic)?;
        if stem.is_empty() {
            return None;
        }
        Some(stem.to_string())
    }

    // ------------------------------------------------------------------------
    // Dates
    // ------------------------------------------------------------------------

    pub fn date(&self, value: &FieldValue) -> DateNormalization {
        match value {
            FieldValue::Text(text) => self.date_text(text),
            other => DateNormalization {
                value: other.clone(),
                status: DateStatus::Missing,
            },
        }
    }

    /// Day-first for numeric dates with the year last; ISO order otherwise.
    /// Two-digit years are never expanded.
    pub fn date_text(&self, text: &str) -> DateNormalization {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return DateNormalization {
                value: FieldValue::Text(text.to_string()),
                status: DateStatus::Missing,
            };
        }

        let lowered = trimmed.to_lowercase();
        let parsed = self
            .date_tokens(strip_time(&lowered))
            .and_then(|tokens| self.interpret_date(&tokens));

        match parsed {
            Some(normalized) => normalized,
            None => DateNormalization {
                value: FieldValue::Text(text.to_string()),
                status: DateStatus::Unparsed,
            },
        }
    }

    fn date_tokens(&self, text: &str) -> Option<Vec<DateToken>> {
        let mut tokens = Vec::new();

        for raw in text
            .split(|c: char| DATE_SEPARATORS.contains(&c) || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            if self.rules.is_year_marker(raw) {
                continue;
            }

            // "1890г" -> "1890"
            let digits_end = raw
                .char_indices()
                .find(|(_, c)| !c.is_ascii_digit())
                .map_or(raw.len(), |(i, _)| i);
            let (digits, rest) = raw.split_at(digits_end);

            if !digits.is_empty() && (rest.is_empty() || self.rules.is_year_marker(rest)) {
                if digits.len() > 8 {
                    return None;
                }
                let value = digits.parse::<u32>().ok()?;
                tokens.push(DateToken::Number {
                    value,
                    digits: digits.len(),
                });
            } else if let Some(month) = self.rules.month_number(raw) {
                tokens.push(DateToken::Month(month));
            } else {
                return None;
            }
        }

        Some(tokens)
    }

    fn interpret_date(&self, tokens: &[DateToken]) -> Option<DateNormalization> {
        match *tokens {
            [DateToken::Number { value, digits: 8 }] if value >= 10_000 => {
                let (year, month, day) = (value / 10_000, value / 100 % 100, value % 100);
                full_date(year as i32, month, day)
            }
            [only] => {
                let year = only.year()?;
                Some(DateNormalization::normalized(
                    format!("{:04}", year),
                    DatePrecision::Year,
                ))
            }
            [first, second] => {
                let (year, month) = match (first.year(), second.year()) {
                    (Some(y), _) => (y, second.month()?),
                    (None, Some(y)) => (y, first.month()?),
                    (None, None) => return None,
                };
                Some(DateNormalization::normalized(
                    format!("{:04}-{:02}", year, month),
                    DatePrecision::Month,
                ))
            }
            [first, second, third] => {
                if let Some(year) = first.year() {
                    // 1890-03-12
                    return full_date(year, second.month()?, third.day()?);
                }
                let year = third.year()?;
                match first {
                    // March 12, 1890
                    DateToken::Month(month) => full_date(year, month, second.day()?),
                    // 12.03.1890 / 12 марта 1890
                    _ => full_date(year, second.month()?, first.day()?),
                }
            }
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Locations
    // ------------------------------------------------------------------------

    pub fn location(&self, value: &FieldValue) -> FieldValue {
        match value {
            FieldValue::Text(text) if !text.is_empty() => FieldValue::Text(self.location_text(text)),
            other => other.clone(),
        }
    }

    /// Lowercase components joined by ", ", abbreviations expanded,
    /// boilerplate trimmed. Blank input comes back unchanged.
    pub fn location_text(&self, text: &str) -> String {
        let components: Vec<String> = text
            .split(LOCATION_SEPARATORS)
            .filter_map(|component| self.location_component(component))
            .collect();

        if components.is_empty() {
            return text.to_string();
        }
        components.join(", ")
    }

    fn location_component(&self, raw: &str) -> Option<String> {
        let mut words: Vec<String> = Vec::new();
        for token in raw.split_whitespace() {
            self.push_location_token(&token.to_lowercase(), &mut words);
        }

        if words.is_empty() {
            return None;
        }

        let words = self.trim_boilerplate(words);
        Some(words.join(" "))
    }

    /// Expand a known abbreviation, including one glued to the next word
    /// by its dot ("г.москва" -> "город москва")
    fn push_location_token(&self, token: &str, words: &mut Vec<String>) {
        if let Some(expansion) = self.rules.expand_abbreviation(token.trim_end_matches('.')) {
            words.extend(expansion.split_whitespace().map(str::to_string));
            return;
        }

        if let Some((head, rest)) = token.split_once('.') {
            if !rest.is_empty() {
                if let Some(expansion) = self.rules.expand_abbreviation(head) {
                    words.extend(expansion.split_whitespace().map(str::to_string));
                    self.push_location_token(rest, words);
                    return;
                }
            }
        }

        words.push(token.to_string());
    }

    fn trim_boilerplate(&self, mut words: Vec<String>) -> Vec<String> {
        let phrases: Vec<Vec<&str>> = self
            .rules
            .location_boilerplate()
            .iter()
            .map(|p| p.split_whitespace().collect())
            .collect();

        loop {
            let mut trimmed = false;

            for phrase in &phrases {
                let n = phrase.len();
                if words.len() > n && words[..n].iter().zip(phrase).all(|(w, p)| w == p) {
                    words.drain(..n);
                    trimmed = true;
                }
                if words.len() > n && words[words.len() - n..].iter().zip(phrase).all(|(w, p)| w == p) {
                    words.truncate(words.len() - n);
                    trimmed = true;
                }
            }

            if !trimmed {
                return words;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------------

    /// Normalize a whole column into a new derived column
    pub fn normalize_column(&self, kind: FieldKind, source: &[FieldValue]) -> DerivedColumn {
        let mut values = Vec::with_capacity(source.len());
        let mut unparsed = 0;

        for value in source {
            let normalized = match kind {
                FieldKind::Surname => self.surname(value),
                FieldKind::Location => self.location(value),
                FieldKind::Date => {
                    let result = self.date(value);
                    if result.is_unparsed() {
                        unparsed += 1;
                    }
                    result.value
                }
            };
            values.push(normalized);
        }

        let changed = values.iter().zip(source).filter(|(n, s)| n != s).count();

        debug!(
            kind = ?kind,
            rows = source.len(),
            changed,
            unparsed,
            "normalized column"
        );

        DerivedColumn {
            values,
            changed,
            unparsed,
        }
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::standard().clone()
    }
}

fn full_date(year: i32, month: u32, day: u32) -> Option<DateNormalization> {
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(DateNormalization::normalized(
        date.format("%Y-%m-%d").to_string(),
        DatePrecision::Day,
    ))
}

/// Drop a trailing time of day ("1890-03-12 00:00:00", "1890-03-12t10:30")
fn strip_time(text: &str) -> &str {
    let Some(colon) = text.find(':') else {
        return text;
    };

    match text[..colon].rfind(|c: char| c == 't' || c.is_whitespace()) {
        Some(boundary) => text[..boundary].trim_end(),
        None => text,
    }
}

// ============================================================================
// FREE FUNCTIONS (built-in rule table)
// ============================================================================

pub fn normalize_surname(value: &FieldValue) -> FieldValue {
    Normalizer::standard().surname(value)
}

pub fn normalize_date(value: &FieldValue) -> DateNormalization {
    Normalizer::standard().date(value)
}

pub fn normalize_location(value: &FieldValue) -> FieldValue {
    Normalizer::standard().location(value)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::EndingRule;
    use proptest::prelude::*;

    fn surname(s: &str) -> String {
        Normalizer::standard().surname_text(s)
    }

    fn date(s: &str) -> DateNormalization {
        Normalizer::standard().date_text(s)
    }

    fn location(s: &str) -> String {
        Normalizer::standard().location_text(s)
    }

    #[test]
    fn test_specific_ending_beats_generic_suffix() {
        assert_eq!(surname("Достоевская"), "достоевский");
        assert_eq!(surname("Вяземская"), "вяземский");
        assert_eq!(surname("Трубецкая"), "трубецкий");
    }

    #[test]
    fn test_generic_and_common_endings() {
        assert_eq!(surname("Петрова"), "петров");
        assert_eq!(surname("Иванова"), "иванов");
        assert_eq!(surname("Королева"), "королев");
        assert_eq!(surname("Пушкина"), "пушкин");
        assert_eq!(surname("Иванов"), "иванов");
        assert_eq!(surname("Сидоров"), "сидоров");
    }

    #[test]
    fn test_strips_digits_and_punctuation() {
        assert_eq!(surname("Иванов123"), "иванов");
        assert_eq!(surname("Петров!@#"), "петров");
        assert_eq!(surname(" Петрова "), "петров");
    }

    #[test]
    fn test_hyphenated_surnames() {
        assert_eq!(surname("Иванова-Петрова"), "иванов-петров");
        assert_eq!(surname("Смит-Джонсон"), "смит-джонсон");
        assert_eq!(surname("Римская-Корсакова"), "римский-корсаков");
    }

    #[test]
    fn test_prefix_casing() {
        assert_eq!(surname("McDonald"), "mcdonald");
        assert_eq!(surname("MacArthur"), "macarthur");
        assert_eq!(surname("VanDyke"), "vandyke");
    }

    #[test]
    fn test_latin_a_is_not_a_feminine_suffix() {
        assert_eq!(surname("Garcia"), "garcia");
    }

    #[test]
    fn test_single_letter_is_kept() {
        assert_eq!(surname("А"), "а");
    }

    #[test]
    fn test_passthrough() {
        let n = Normalizer::standard();

        assert_eq!(n.surname(&FieldValue::Missing), FieldValue::Missing);
        assert_eq!(n.surname(&FieldValue::Integer(123)), FieldValue::Integer(123));
        assert_eq!(n.surname(&FieldValue::Float(1.5)), FieldValue::Float(1.5));
        assert_eq!(n.surname(&FieldValue::from("")), FieldValue::from(""));
        assert_eq!(n.surname(&FieldValue::from("   ")), FieldValue::from("   "));
        assert_eq!(n.surname(&FieldValue::from("123")), FieldValue::from("123"));
        assert_eq!(n.location(&FieldValue::Integer(7)), FieldValue::Integer(7));
        assert_eq!(n.location(&FieldValue::from(" , ")), FieldValue::from(" , "));
    }

    #[test]
    fn test_custom_rules_per_call() {
        let rules = NormalizationRuleSet::empty()
            .with_female_endings(vec![EndingRule::new("ová", "")])
            .with_generic_suffix(None);
        let n = Normalizer::new(rules).unwrap();

        assert_eq!(n.surname_text("Nováková"), "novák");
        assert_eq!(n.surname_text("Petrova"), "petrova");
    }

    #[test]
    fn test_invalid_rules_rejected() {
        let rules = NormalizationRuleSet::empty()
            .with_female_endings(vec![EndingRule::new("ий", "ая")])
            .with_generic_suffix(Some('я'));

        assert!(Normalizer::new(rules).is_err());
    }

    #[test]
    fn test_date_year_only() {
        let result = date("1923");
        assert_eq!(result.value, FieldValue::from("1923"));
        assert_eq!(result.status, DateStatus::Normalized(DatePrecision::Year));
        assert_eq!(result.year(), Some(1923));
    }

    #[test]
    fn test_date_full_day_first() {
        for input in ["12.03.1890", "12/03/1890", "12-03-1890", "1890-03-12", "1890/03/12"] {
            let result = date(input);
            assert_eq!(result.value, FieldValue::from("1890-03-12"), "input {}", input);
            assert_eq!(result.precision(), Some(DatePrecision::Day));
        }
    }

    #[test]
    fn test_date_month_names_and_markers() {
        assert_eq!(date("12 марта 1890 г.").value, FieldValue::from("1890-03-12"));
        assert_eq!(date("March 12, 1890").value, FieldValue::from("1890-03-12"));
        assert_eq!(date("май 1901").value, FieldValue::from("1901-05"));
        assert_eq!(date("1890г").value, FieldValue::from("1890"));
        assert_eq!(date("1890 года").value, FieldValue::from("1890"));
    }

    #[test]
    fn test_date_partial_and_time() {
        assert_eq!(date("03.1890").value, FieldValue::from("1890-03"));
        assert_eq!(date("1890-03").value, FieldValue::from("1890-03"));
        assert_eq!(date("1890-03-12 00:00:00").value, FieldValue::from("1890-03-12"));
        assert_eq!(date("1890-03-12T10:30:00").value, FieldValue::from("1890-03-12"));
        assert_eq!(date("18900312").value, FieldValue::from("1890-03-12"));
    }

    #[test]
    fn test_date_unparsed_is_flagged() {
        for input in ["не указано", "12.03.90", "31.02.1890", "13.13.1890", "около 1890"] {
            let result = date(input);
            assert!(result.is_unparsed(), "input {}", input);
            assert_eq!(result.value, FieldValue::from(input));
            assert_eq!(result.year(), None);
        }
    }

    #[test]
    fn test_date_missing() {
        let n = Normalizer::standard();
        assert_eq!(n.date(&FieldValue::Missing).status, DateStatus::Missing);
        assert_eq!(n.date(&FieldValue::Integer(1890)).value, FieldValue::Integer(1890));
        assert_eq!(date("  ").status, DateStatus::Missing);
    }

    #[test]
    fn test_location_expansion_and_separators() {
        assert_eq!(
            location("Тверская губ.,, Бежецкий у. ; с. Градницы"),
            "тверская губерния, бежецкий уезд, село градницы"
        );
        assert_eq!(location("  Москва  "), "москва");
    }

    #[test]
    fn test_location_glued_abbreviations() {
        assert_eq!(location("Г.Москва"), "город москва");
        assert_eq!(
            location("Тверская губ.,Бежецкий у.,с.Градницы"),
            "тверская губерния, бежецкий уезд, село градницы"
        );
        assert_eq!(location("Д.Б.Ивановка"), "деревня б.ивановка");
        assert_eq!(location("Санкт.Петербург"), "санкт.петербург");
        for raw in ["Г.Москва", "с.Градницы, Д.Б.Ивановка"] {
            assert_eq!(location(&location(raw)), location(raw));
        }
    }

    #[test]
    fn test_location_boilerplate() {
        assert_eq!(location("Province of Tver"), "tver");
        assert_eq!(location("Prov. of Tver / Kashin"), "tver, kashin");
        // never emptied
        assert_eq!(location("Province of"), "province of");
    }

    #[test]
    fn test_normalize_column_keeps_source() {
        let source = vec![
            FieldValue::from("Петрова"),
            FieldValue::Missing,
            FieldValue::from("Иванов"),
        ];

        let derived = Normalizer::standard().normalize_column(FieldKind::Surname, &source);

        assert_eq!(source[0], FieldValue::from("Петрова"));
        assert_eq!(
            derived.values,
            vec![FieldValue::from("петров"), FieldValue::Missing, FieldValue::from("иванов")]
        );
        assert_eq!(derived.changed, 2);
        assert_eq!(derived.unparsed, 0);
    }

    #[test]
    fn test_normalize_column_counts_unparsed_dates() {
        let source = vec![
            FieldValue::from("12.03.1890"),
            FieldValue::from("???"),
            FieldValue::Missing,
        ];

        let derived = Normalizer::standard().normalize_column(FieldKind::Date, &source);

        assert_eq!(derived.values[0], FieldValue::from("1890-03-12"));
        assert_eq!(derived.values[1], FieldValue::from("???"));
        assert_eq!(derived.unparsed, 1);
    }

    #[test]
    fn test_field_value_infer() {
        assert_eq!(FieldValue::infer(""), FieldValue::Missing);
        assert_eq!(FieldValue::infer("42"), FieldValue::Integer(42));
        assert_eq!(FieldValue::infer("4.5"), FieldValue::Float(4.5));
        assert_eq!(FieldValue::infer("Петрова"), FieldValue::from("Петрова"));
        assert_eq!(FieldValue::infer("   "), FieldValue::from("   "));
    }

    #[test]
    fn test_free_functions_use_builtin_rules() {
        assert_eq!(normalize_surname(&FieldValue::from("Петрова")), FieldValue::from("петров"));
        assert_eq!(normalize_date(&FieldValue::from("1923")).value, FieldValue::from("1923"));
        assert_eq!(
            normalize_location(&FieldValue::from("Тверская губ.")),
            FieldValue::from("тверская губерния")
        );
    }

    proptest! {
        #[test]
        fn prop_surname_idempotent(s in "[А-Яа-яЁёA-Za-z0-9 !.'-]{0,24}") {
            let once = surname(&s);
            prop_assert_eq!(surname(&once), once);
        }

        #[test]
        fn prop_surname_idempotent_any_text(s in "\\PC{0,16}") {
            let once = surname(&s);
            prop_assert_eq!(surname(&once), once);
        }

        #[test]
        fn prop_location_idempotent(s in "[А-Яа-яA-Za-z .,;/|>-]{0,40}") {
            let once = location(&s);
            prop_assert_eq!(location(&once), once);
        }

        #[test]
        fn prop_date_idempotent(s in "[0-9./ -]{0,12}") {
            let once = date(&s);
            let twice = Normalizer::standard().date(&once.value);
            prop_assert_eq!(twice.value, once.value);
        }

        #[test]
        fn prop_non_text_passthrough(n in any::<i64>()) {
            let value = FieldValue::Integer(n);
            prop_assert_eq!(normalize_surname(&value), value.clone());
            prop_assert_eq!(normalize_location(&value), value);
        }
    }
}

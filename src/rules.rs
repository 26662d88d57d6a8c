// 🏷️ Normalization Rules - Rules as Data
// Ending rewrites, name prefixes and locale token maps for genealogical records

use anyhow::{bail, ensure, Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

// ============================================================================
// ENDING RULE
// ============================================================================

/// One feminine -> masculine surname ending rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndingRule {
    /// Feminine ending to look for (e.g. "ская")
    pub suffix: String,

    /// Masculine form that replaces it (e.g. "ский")
    pub replacement: String,
}

impl EndingRule {
    pub fn new(suffix: &str, replacement: &str) -> Self {
        EndingRule {
            suffix: suffix.to_string(),
            replacement: replacement.to_string(),
        }
    }

    /// Rewrite `text` when it ends with this rule's suffix.
    /// A rule never consumes the whole word: some stem must remain.
    pub fn apply(&self, text: &str) -> Option<String> {
        let stem = text.strip_suffix(self.suffix.as_str())?;
        if stem.is_empty() {
            return None;
        }
        Some(format!("{}{}", stem, self.replacement))
    }
}

// ============================================================================
// RULE SET
// ============================================================================

/// Immutable rule table driving the normalization engine.
///
/// Order of `female_endings` is significant: the first matching ending wins,
/// so more specific endings ("ская") must come before broader ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationRuleSet {
    female_endings: Vec<EndingRule>,

    /// Single trailing letter stripped when no specific ending matched
    #[serde(default)]
    generic_feminine_suffix: Option<char>,

    /// Recognized name prefixes (canonical lowercase, longest first)
    #[serde(default)]
    prefixes: Vec<String>,

    /// Administrative abbreviation -> expansion ("губ" -> "губерния")
    #[serde(default)]
    location_abbreviations: BTreeMap<String, String>,

    /// Phrases trimmed from either end of a location component
    #[serde(default)]
    location_boilerplate: Vec<String>,

    /// Month name or abbreviation -> month number
    #[serde(default)]
    month_names: BTreeMap<String, u32>,

    /// Tokens ignored in dates ("г.", "года")
    #[serde(default)]
    year_markers: Vec<String>,
}

impl NormalizationRuleSet {
    /// Rule table for Russian parish registers (births, marriages, deaths)
    pub fn russian() -> Self {
        let female_endings = [
            ("ская", "ский"),
            ("цкая", "цкий"),
            ("ова", "ов"),
            ("ёва", "ёв"),
            ("ева", "ев"),
            ("ина", "ин"),
            ("ына", "ын"),
        ]
        .iter()
        .map(|(suffix, replacement)| EndingRule::new(suffix, replacement))
        .collect();

        let prefixes = [
            "mc", "mac", "van", "von", "de", "del", "di", "fitz", "фон", "де", "ван",
        ]
        .iter()
        .map(|p| p.to_string())
        .collect();

        let location_abbreviations = [
            ("губ", "губерния"),
            ("у", "уезд"),
            ("уез", "уезд"),
            ("вол", "волость"),
            ("с", "село"),
            ("д", "деревня"),
            ("дер", "деревня"),
            ("г", "город"),
            ("пос", "поселок"),
            ("обл", "область"),
            ("р-н", "район"),
            ("окр", "округ"),
            ("prov", "province"),
            ("co", "county"),
            ("twp", "township"),
            ("par", "parish"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let location_boilerplate = [
            "province of",
            "governorate of",
            "county of",
            "parish of",
            "city of",
        ]
        .iter()
        .map(|p| p.to_string())
        .collect();

        let mut month_names = BTreeMap::new();
        let months: [&[&str]; 12] = [
            &["январь", "января", "янв", "january", "jan"],
            &["февраль", "февраля", "фев", "february", "feb"],
            &["март", "марта", "мар", "march", "mar"],
            &["апрель", "апреля", "апр", "april", "apr"],
            &["май", "мая", "may"],
            &["июнь", "июня", "июн", "june", "jun"],
            &["июль", "июля", "июл", "july", "jul"],
            &["август", "августа", "авг", "august", "aug"],
            &["сентябрь", "сентября", "сен", "сент", "september", "sep", "sept"],
            &["октябрь", "октября", "окт", "october", "oct"],
            &["ноябрь", "ноября", "ноя", "november", "nov"],
            &["декабрь", "декабря", "дек", "december", "dec"],
        ];
        for (index, names) in months.iter().enumerate() {
            for name in names.iter() {
                month_names.insert(name.to_string(), index as u32 + 1);
            }
        }

        let year_markers = ["г", "год", "года"].iter().map(|m| m.to_string()).collect();

        NormalizationRuleSet {
            female_endings,
            generic_feminine_suffix: Some('а'),
            prefixes,
            location_abbreviations,
            location_boilerplate,
            month_names,
            year_markers,
        }
        .canonicalized()
    }

    /// Empty rule table: surnames are only lowercased and cleaned
    pub fn empty() -> Self {
        NormalizationRuleSet {
            female_endings: Vec::new(),
            generic_feminine_suffix: None,
            prefixes: Vec::new(),
            location_abbreviations: BTreeMap::new(),
            location_boilerplate: Vec::new(),
            month_names: BTreeMap::new(),
            year_markers: Vec::new(),
        }
    }

    /// Load rules from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read rules file: {:?}", path.as_ref()))?;

        Self::from_json(&content)
            .with_context(|| format!("Invalid rules file: {:?}", path.as_ref()))
    }

    /// Parse and validate a JSON rule table
    pub fn from_json(json: &str) -> Result<Self> {
        let rules: NormalizationRuleSet =
            serde_json::from_str(json).context("Failed to parse rules JSON")?;

        let rules = rules.canonicalized();
        rules.validate()?;
        Ok(rules)
    }

    // ------------------------------------------------------------------------
    // Builders (each returns a new, canonicalized table)
    // ------------------------------------------------------------------------

    pub fn with_female_endings(mut self, endings: Vec<EndingRule>) -> Self {
        self.female_endings = endings;
        self.canonicalized()
    }

    pub fn with_generic_suffix(mut self, suffix: Option<char>) -> Self {
        self.generic_feminine_suffix = suffix;
        self.canonicalized()
    }

    pub fn with_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.prefixes = prefixes;
        self.canonicalized()
    }

    pub fn with_location_abbreviation(mut self, abbreviation: &str, expansion: &str) -> Self {
        self.location_abbreviations
            .insert(abbreviation.to_string(), expansion.to_string());
        self.canonicalized()
    }

    pub fn with_location_boilerplate(mut self, phrase: &str) -> Self {
        self.location_boilerplate.push(phrase.to_string());
        self.canonicalized()
    }

    /// Lowercase every key, dedupe prefixes and sort them longest first
    fn canonicalized(mut self) -> Self {
        for rule in &mut self.female_endings {
            rule.suffix = rule.suffix.to_lowercase();
            rule.replacement = rule.replacement.to_lowercase();
        }

        self.generic_feminine_suffix = self
            .generic_feminine_suffix
            .and_then(|c| c.to_lowercase().next());

        let unique: BTreeSet<String> = self
            .prefixes
            .iter()
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        let mut prefixes: Vec<String> = unique.into_iter().collect();
        prefixes.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        self.prefixes = prefixes;

        self.location_abbreviations = self
            .location_abbreviations
            .into_iter()
            .map(|(k, v)| (k.trim().trim_end_matches('.').to_lowercase(), v.trim().to_lowercase()))
            .collect();

        let mut seen = BTreeSet::new();
        self.location_boilerplate = self
            .location_boilerplate
            .into_iter()
            .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase())
            .filter(|p| !p.is_empty() && seen.insert(p.clone()))
            .collect();

        self.month_names = self
            .month_names
            .into_iter()
            .map(|(k, v)| (k.trim().trim_end_matches('.').to_lowercase(), v))
            .collect();

        self.year_markers = self
            .year_markers
            .into_iter()
            .map(|m| m.trim().trim_end_matches('.').to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();

        self
    }

    /// Check the table can only ever produce a fixpoint.
    ///
    /// A replacement either shortens the word, or ends in a letter that no
    /// feminine ending (nor the generic suffix) ends in.
    pub fn validate(&self) -> Result<()> {
        let mut terminal_blockers: BTreeSet<char> = self
            .female_endings
            .iter()
            .filter_map(|r| r.suffix.chars().last())
            .collect();
        if let Some(generic) = self.generic_feminine_suffix {
            ensure!(generic.is_alphabetic(), "Generic suffix {:?} is not a letter", generic);
            terminal_blockers.insert(generic);
        }

        for rule in &self.female_endings {
            ensure!(!rule.suffix.is_empty(), "Female ending rule has an empty suffix");
            ensure!(
                rule.suffix.chars().all(char::is_alphabetic)
                    && rule.replacement.chars().all(char::is_alphabetic),
                "Ending rule {:?} -> {:?} must contain letters only",
                rule.suffix,
                rule.replacement
            );

            let shortens = rule.replacement.chars().count() < rule.suffix.chars().count();
            let terminal = rule
                .replacement
                .chars()
                .last()
                .map_or(false, |c| !terminal_blockers.contains(&c));
            if !shortens && !terminal {
                bail!(
                    "Ending rule {:?} -> {:?} can be rewritten again; replacement must be terminal",
                    rule.suffix,
                    rule.replacement
                );
            }
        }

        for prefix in &self.prefixes {
            ensure!(
                prefix.chars().all(char::is_alphabetic),
                "Name prefix {:?} must contain letters only",
                prefix
            );
        }

        for (abbreviation, expansion) in &self.location_abbreviations {
            ensure!(
                !abbreviation.is_empty()
                    && !abbreviation.contains(char::is_whitespace)
                    && !abbreviation.contains(crate::normalize::LOCATION_SEPARATORS),
                "Location abbreviation {:?} must be a single token",
                abbreviation
            );
            ensure!(
                !expansion.is_empty() && !expansion.contains(crate::normalize::LOCATION_SEPARATORS),
                "Location abbreviation {:?} needs a non-empty expansion without separators",
                abbreviation
            );

            for token in expansion.split_whitespace() {
                if let Some(again) = self.location_abbreviations.get(token.trim_end_matches('.')) {
                    ensure!(
                        again == token,
                        "Expansion {:?} of {:?} is itself an abbreviation",
                        expansion,
                        abbreviation
                    );
                }
            }
        }

        for (name, month) in &self.month_names {
            ensure!((1..=12).contains(month), "Month name {:?} maps to invalid month {}", name, month);
        }

        Ok(())
    }

    /// SHA-256 over the canonical JSON form of the table
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    // ------------------------------------------------------------------------
    // Lookups used by the normalizer
    // ------------------------------------------------------------------------

    pub fn female_endings(&self) -> &[EndingRule] {
        &self.female_endings
    }

    pub fn generic_feminine_suffix(&self) -> Option<char> {
        self.generic_feminine_suffix
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Longest configured prefix that `text` starts with
    pub fn matching_prefix(&self, text: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|p| text.starts_with(p.as_str()))
            .map(|p| p.as_str())
    }

    pub fn expand_abbreviation(&self, token: &str) -> Option<&str> {
        self.location_abbreviations.get(token).map(|s| s.as_str())
    }

    pub fn location_boilerplate(&self) -> &[String] {
        &self.location_boilerplate
    }

    pub fn month_number(&self, name: &str) -> Option<u32> {
        self.month_names.get(name).copied()
    }

    pub fn is_year_marker(&self, token: &str) -> bool {
        self.year_markers.iter().any(|m| m == token)
    }
}

impl Default for NormalizationRuleSet {
    fn default() -> Self {
        Self::russian()
    }
}

// ============================================================================
// TESTS
// ============================================================================

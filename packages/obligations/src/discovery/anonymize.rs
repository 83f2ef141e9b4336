//! Anonymization of candidate patterns before they become shared.
//!
//! A candidate is mined from one customer's documents; before promotion
//! into the shared library every company-identifying term is replaced
//! with a fixed placeholder token. The rule set is data, not code: the
//! shipped defaults are UK-centric heuristics (the documents this system
//! grew up on), and callers with other locales supply their own rules.

use regex::{Regex, RegexBuilder};

/// One anonymization rule: what to find, what to put in its place.
pub struct AnonymizerRule {
    /// Rule name, reported when a term is detected
    pub name: String,

    /// Placeholder token substituted for every match
    pub replacement: String,

    regex: Regex,
}

impl AnonymizerRule {
    /// Build a rule from a regex source.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            replacement: replacement.into(),
            regex: RegexBuilder::new(pattern).build()?,
        })
    }

    fn matches(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// An ordered anonymization rule set.
#[derive(Default)]
pub struct AnonymizerRules {
    rules: Vec<AnonymizerRule>,
}

impl AnonymizerRules {
    /// An empty rule set (no anonymization).
    pub fn none() -> Self {
        Self::default()
    }

    /// The UK-centric default heuristics: company suffixes, postcodes,
    /// street addresses, emails, phone numbers, permit references,
    /// salutation-prefixed person names, currency amounts.
    pub fn uk_defaults() -> Self {
        let rules = [
            (
                "company_name",
                r"\b[A-Z][\w&'()-]*(?:\s+[A-Z&][\w&'()-]*){0,4}\s+(?:Ltd|Limited|PLC|plc|LLP)\b\.?",
                "[COMPANY]",
            ),
            (
                "uk_postcode",
                r"\b[A-Z]{1,2}\d{1,2}[A-Z]?\s*\d[A-Z]{2}\b",
                "[POSTCODE]",
            ),
            (
                "street_address",
                r"\b\d+[A-Za-z]?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?\s+(?:Road|Street|Lane|Avenue|Way|Drive|Close|Place|Park|Estate)\b",
                "[ADDRESS]",
            ),
            (
                // Also matches addresses inside escaped regex text,
                // where dots appear as "\.".
                "email",
                r"\b[\w.%+-]+@[\w\\.-]+\.[A-Za-z]{2,}\b",
                "[EMAIL]",
            ),
            (
                "uk_phone",
                r"\b(?:\+44\s?\d{3,4}|\(?0\d{3,4}\)?)[\s-]?\d{3}[\s-]?\d{3,4}\b",
                "[PHONE]",
            ),
            (
                "permit_reference",
                r"\b(?:EPR|EAWML|WML|PPC|COTC)[/\s-]?[A-Z0-9]{2,}(?:/[A-Z0-9]+)*\b",
                "[PERMIT]",
            ),
            (
                "person_name",
                r"\b(?:Mr|Mrs|Ms|Miss|Dr|Prof)\.?\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)?\b",
                "[NAME]",
            ),
            (
                "currency_amount",
                r"£\s?\d[\d,]*(?:\.\d{2})?",
                "[AMOUNT]",
            ),
        ];

        Self {
            rules: rules
                .into_iter()
                .map(|(name, pattern, replacement)| {
                    // Patterns above are compile-time constants; building
                    // them is infallible in practice.
                    AnonymizerRule::new(name, pattern, replacement)
                        .expect("default anonymizer pattern must compile")
                })
                .collect(),
        }
    }

    /// Append a rule.
    pub fn with_rule(mut self, rule: AnonymizerRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Replace every identifying term with its placeholder token.
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for rule in &self.rules {
            out = rule
                .regex
                .replace_all(&out, rule.replacement.as_str())
                .into_owned();
        }
        out
    }

    /// Name of the first rule that detects an identifying term, if any.
    pub fn first_hit(&self, text: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.matches(text))
            .map(|rule| rule.name.as_str())
    }

    /// Whether the text contains no identifying terms.
    pub fn is_clean(&self, text: &str) -> bool {
        self.first_hit(text).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_company_name_replaced() {
        let rules = AnonymizerRules::uk_defaults();
        let out = rules.apply("samples taken by Acme Waste Solutions Ltd each week");
        assert!(out.contains("[COMPANY]"), "got: {}", out);
        assert!(!out.contains("Acme"));
    }

    #[test]
    fn test_postcode_and_address() {
        let rules = AnonymizerRules::uk_defaults();
        let out = rules.apply("deliver to 14 Mill Lane, Exeter EX2 7LL");
        assert!(out.contains("[ADDRESS]"), "got: {}", out);
        assert!(out.contains("[POSTCODE]"), "got: {}", out);
    }

    #[test]
    fn test_email_and_phone() {
        let rules = AnonymizerRules::uk_defaults();
        let out = rules.apply("contact compliance@acme.co.uk or 01392 123456");
        assert!(out.contains("[EMAIL]"));
        assert!(out.contains("[PHONE]"), "got: {}", out);
    }

    #[test]
    fn test_permit_reference_and_currency() {
        let rules = AnonymizerRules::uk_defaults();
        let out = rules.apply("permit EPR/AB1234CD carries a fee of £1,250.00");
        assert!(out.contains("[PERMIT]"), "got: {}", out);
        assert!(out.contains("[AMOUNT]"), "got: {}", out);
    }

    #[test]
    fn test_person_name() {
        let rules = AnonymizerRules::uk_defaults();
        let out = rules.apply("as agreed with Mr John Smith on site");
        assert!(out.contains("[NAME]"));
        assert!(!out.contains("Smith"));
    }

    #[test]
    fn test_clean_text_untouched() {
        let rules = AnonymizerRules::uk_defaults();
        let text = "the operator shall monitor effluent ph weekly";
        assert_eq!(rules.apply(text), text);
        assert!(rules.is_clean(text));
    }

    #[test]
    fn test_first_hit_names_the_rule() {
        let rules = AnonymizerRules::uk_defaults();
        assert_eq!(
            rules.first_hit("send results to env@site.org"),
            Some("email")
        );
        assert_eq!(rules.first_hit("monitor ph weekly"), None);
    }

    #[test]
    fn test_pluggable_rule_set() {
        let rules = AnonymizerRules::none().with_rule(
            AnonymizerRule::new("site_codename", r"\bPROJECT-\d+\b", "[SITE]").unwrap(),
        );
        assert_eq!(rules.apply("works at PROJECT-7 continue"), "works at [SITE] continue");
        // Defaults don't apply: an email passes through this custom set.
        assert!(rules.is_clean("mail me at a@b.com"));
    }
}

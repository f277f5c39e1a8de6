//! Unicode-aware normalization for substring matching.
//!
//! `normalize` produces a canonical form in which only letters and digits
//! (of any script) survive, separated by single spaces. Phrases, entity names,
//! and message text all pass through the same function so that matching is a
//! plain `str::contains` / `str::find`.

/// Typographic variants replaced before punctuation is stripped.
const SUBSTITUTIONS: &[(char, &str)] = &[
    ('&', " and "),
    ('\u{2019}', "'"),
    ('\u{2018}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2013}', "-"),
    ('\u{2014}', "-"),
];

/// Legal-entity suffix tokens stripped from the end of entity names.
///
/// Only whole trailing tokens are removed. Multi-word or spelled-out forms
/// ("corporation", "limited") and dotted acronyms that normalize to several
/// tokens ("s.a.s." → "s a s") are not in this list and are kept. Changing
/// this list changes matching for every tracked entity.
pub const LEGAL_SUFFIXES: &[&str] = &[
    "inc", "ltd", "gmbh", "sas", "srl", "llc", "corp", "co", "plc",
];

/// Canonicalize free text for substring comparison.
///
/// Applies typographic substitutions and full Unicode case folding, replaces
/// every character that is not a letter or digit with a space, then collapses
/// whitespace and trims. Idempotent.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut substituted = String::with_capacity(text.len());
    for c in text.chars() {
        match SUBSTITUTIONS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => substituted.push_str(to),
            None => substituted.push(c),
        }
    }

    caseless::default_case_fold_str(&substituted)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Canonicalize an entity (company) name.
///
/// Runs [`normalize`], then drops every trailing [`LEGAL_SUFFIXES`] token
/// ("Acme Co Ltd" → "acme"). A name made only of suffixes ("Co", "Inc.")
/// normalizes to the empty string and never matches.
pub fn normalize_entity_name(name: &str) -> String {
    let normalized = normalize(name);
    let mut tokens: Vec<&str> = normalized.split(' ').collect();
    while tokens
        .last()
        .is_some_and(|token| LEGAL_SUFFIXES.contains(token))
    {
        tokens.pop();
    }
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(normalize("Hello, World!"), "hello world");
        assert_eq!(normalize("  We're   pleased...  "), "we re pleased");
    }

    #[test]
    fn empty_and_blank_inputs() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \n\t "), "");
        assert_eq!(normalize("!!! ---"), "");
    }

    #[test]
    fn ampersand_becomes_and() {
        assert_eq!(normalize("Johnson&Johnson"), "johnson and johnson");
        assert_eq!(normalize("AT & T"), "at and t");
    }

    #[test]
    fn curly_quotes_and_dashes_match_straight_forms() {
        assert_eq!(normalize("we\u{2019}d like"), normalize("we'd like"));
        assert_eq!(normalize("next\u{2014}stage"), normalize("next-stage"));
        assert_eq!(normalize("\u{201C}quoted\u{201D}"), "quoted");
    }

    #[test]
    fn full_case_folding() {
        assert_eq!(normalize("STRASSE"), normalize("Straße"));
        assert_eq!(normalize("ΟΔΟΣ"), normalize("οδος"));
        assert_eq!(normalize("ΣΑΣ"), "σασ");
    }

    #[test]
    fn ligatures_fold_to_their_letters() {
        assert_eq!(normalize("ﬁnal oﬀer"), normalize("final offer"));
        assert_eq!(normalize("ﬁnal oﬀer"), "final offer");
        assert_eq!(normalize("Stra\u{017F}e"), "strase");
    }

    #[test]
    fn keeps_letters_and_digits_of_any_script() {
        assert_eq!(normalize("К сожалению, позиция №5 закрыта"), "к сожалению позиция 5 закрыта");
        assert_eq!(normalize("На жаль — відмова"), "на жаль відмова");
        assert_eq!(normalize("日本語テキスト。"), "日本語テキスト");
    }

    #[test]
    fn underscore_and_symbols_are_separators() {
        assert_eq!(normalize("snake_case+plus=eq"), "snake case plus eq");
        assert_eq!(normalize("price: $100 €"), "price 100");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "Hello, World!",
            "Straße & Co — “Test” ’n’ stuff",
            "İstanbul ΣΊΣΥΦΟΣ",
            "line one\nline two\r\n\ttabbed",
            "already normalized text",
            "ǅemal ﬁne ½ ²",
            "",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn entity_suffixes_are_stripped() {
        assert_eq!(normalize_entity_name("Acme Inc."), normalize_entity_name("ACME inc"));
        assert_eq!(normalize_entity_name("Acme Inc."), "acme");
        assert_eq!(normalize_entity_name("Widgets GmbH"), "widgets");
        assert_eq!(normalize_entity_name("Foo LLC"), "foo");
        assert_eq!(normalize_entity_name("Bar PLC"), "bar");
    }

    #[test]
    fn repeated_suffixes_are_all_stripped() {
        assert_eq!(normalize_entity_name("Acme Co. Ltd."), "acme");
    }

    #[test]
    fn embedded_suffixes_are_kept() {
        assert_eq!(normalize_entity_name("Incognito Labs"), "incognito labs");
        assert_eq!(normalize_entity_name("Costco"), "costco");
        assert_eq!(normalize_entity_name("Co Working Space"), "co working space");
    }

    #[test]
    fn spelled_out_suffixes_are_kept() {
        assert_eq!(normalize_entity_name("Microsoft Corporation"), "microsoft corporation");
        assert_eq!(normalize_entity_name("Widget Limited"), "widget limited");
    }

    #[test]
    fn suffix_only_names_normalize_to_empty() {
        assert_eq!(normalize_entity_name("Co"), "");
        assert_eq!(normalize_entity_name("Inc."), "");
        assert_eq!(normalize_entity_name("Co. Ltd."), "");
        assert_eq!(normalize_entity_name(""), "");
    }
}

//! Text field statistics, computed from the sample of non-null values.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::Result;
use crate::models::FieldValue;

use super::collector::FieldCollector;
use super::finalize::FinalizeContext;
use super::models::{FieldReport, Scale, StatKey, StatValue, TopValue};
use super::stats;

/// Words ignored by the word frequency list.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "were", "will", "with",
];

struct TextPatterns {
    word: Regex,
    email: Regex,
    url: Regex,
}

#[allow(clippy::expect_used)] // literal patterns
fn patterns() -> &'static TextPatterns {
    static PATTERNS: OnceLock<TextPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| TextPatterns {
        word: Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}]+)?").expect("Invalid word pattern"),
        email: Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email pattern"),
        url: Regex::new(r"^(?i)(https?|ftp)://[^\s/$.?#].[^\s]*$").expect("Invalid URL pattern"),
    })
}

/// Letter case of a non-empty string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Casing {
    Upper,
    Lower,
    Title,
    Mixed,
    Uncased,
}

fn casing(text: &str) -> Casing {
    let has_upper = text.chars().any(char::is_uppercase);
    let has_lower = text.chars().any(char::is_lowercase);
    match (has_upper, has_lower) {
        (false, false) => Casing::Uncased,
        (true, false) => Casing::Upper,
        (false, true) => Casing::Lower,
        (true, true) if is_titlecase(text) => Casing::Title,
        (true, true) => Casing::Mixed,
    }
}

// Uppercase letters only start words, lowercase letters only continue them.
fn is_titlecase(text: &str) -> bool {
    let mut previous_cased = false;
    for c in text.chars() {
        if c.is_uppercase() {
            if previous_cased {
                return false;
            }
            previous_cased = true;
        } else if c.is_lowercase() {
            if !previous_cased {
                return false;
            }
            previous_cased = true;
        } else {
            previous_cased = false;
        }
    }
    true
}

fn as_text(value: &FieldValue) -> Cow<'_, str> {
    match value.as_text() {
        Some(text) => Cow::Borrowed(text),
        None => Cow::Owned(value.display_string()),
    }
}

/// Renders a top-value list entry, `'value': count`.
fn render_entry(value: &str, count: u64, estimated: bool) -> String {
    if estimated {
        format!("'{}': {} (Est.)", value, count)
    } else {
        format!("'{}': {}", value, count)
    }
}

fn scaled(count: u64, scale: Option<Scale>) -> u64 {
    scale.map_or(count, |s| s.apply(count))
}

/// Adds text statistics to `report`.
pub fn analyze(
    collector: &FieldCollector,
    ctx: &FinalizeContext<'_>,
    report: &mut FieldReport,
) -> Result<()> {
    let options = ctx.options;
    let raw = collector.ordered_raw_sample();
    let sample: Vec<Cow<'_, str>> = raw.iter().map(|value| as_text(value)).collect();
    let n = sample.len();
    let scale = Scale::for_sample(collector.is_exact(), collector.non_null_count(), n);
    let estimated = scale.is_some();
    let out = &mut report.stats;

    let empty = sample.iter().filter(|s| s.is_empty()).count() as u64;
    out.insert(StatKey::EmptyStrings, StatValue::sampled_count(empty, scale));
    out.insert(StatKey::PercentEmpty, StatValue::percent(empty, n as u64));

    let non_empty: Vec<&str> = sample
        .iter()
        .map(AsRef::<str>::as_ref)
        .filter(|s| !s.is_empty())
        .collect();

    if options.text_case_analysis {
        let padded = non_empty.iter().filter(|s| s.trim() != **s).count() as u64;
        let internal = non_empty
            .iter()
            .filter(|s| s.trim().contains("  "))
            .count() as u64;
        out.insert(StatKey::PaddedValues, StatValue::sampled_count(padded, scale));
        out.insert(
            StatKey::InternalSpaces,
            StatValue::sampled_count(internal, scale),
        );
    }

    let counts = stats::frequencies(sample.iter().map(AsRef::<str>::as_ref));
    out.insert(
        StatKey::Variety,
        if estimated {
            StatValue::text(format!(">={} (Sample)", counts.len()))
        } else {
            StatValue::count(counts.len() as u64)
        },
    );

    if !non_empty.is_empty() {
        let lengths: Vec<usize> = non_empty.iter().map(|s| s.chars().count()).collect();
        let min = lengths.iter().copied().min().unwrap_or(0);
        let max = lengths.iter().copied().max().unwrap_or(0);
        let avg = lengths.iter().sum::<usize>() as f64 / lengths.len() as f64;
        out.insert(StatKey::MinLength, StatValue::count(min as u64));
        out.insert(StatKey::MaxLength, StatValue::count(max as u64));
        out.insert(StatKey::AvgLength, StatValue::Real(avg));
    }

    let top: Vec<TopValue> = counts
        .iter()
        .take(options.limit_unique)
        .map(|(value, count)| TopValue {
            value: (*value).to_string(),
            count: scaled(*count, scale),
            estimated,
        })
        .collect();
    out.insert(
        StatKey::TopValues,
        StatValue::List(
            top.iter()
                .map(|t| render_entry(&t.value, t.count, t.estimated))
                .collect(),
        ),
    );

    if let Some((first, _)) = counts.first() {
        report.side.most_frequent = sample
            .iter()
            .position(|s| &**s == *first)
            .map(|index| FieldValue::clone(raw[index]));
    }
    report.side.top_values = top;

    let out = &mut report.stats;

    if options.text_rarity_nonprintable {
        let once = counts.iter().filter(|(_, count)| *count == 1).count() as u64;
        out.insert(
            StatKey::SingletonValues,
            StatValue::sampled_count(once, scale),
        );

        let patterns = patterns();
        let words = non_empty.iter().flat_map(|s| {
            patterns
                .word
                .find_iter(s)
                .map(|m| m.as_str().to_lowercase())
                .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        });
        let top_words: Vec<String> = stats::top_k(words, options.limit_unique)
            .into_iter()
            .map(|(word, count)| {
                let count = scaled(count, scale);
                if estimated {
                    format!("{}: {} (Est.)", word, count)
                } else {
                    format!("{}: {}", word, count)
                }
            })
            .collect();
        out.insert(StatKey::TopWords, StatValue::List(top_words));

        let emails = non_empty
            .iter()
            .filter(|s| patterns.email.is_match(s.trim()))
            .count() as u64;
        let urls = non_empty
            .iter()
            .filter(|s| patterns.url.is_match(s.trim()))
            .count() as u64;
        let suffix = if estimated { " (Est.)" } else { "" };
        out.insert(
            StatKey::PatternMatches,
            StatValue::List(vec![
                format!("Emails: {}{}", scaled(emails, scale), suffix),
                format!("URLs: {}{}", scaled(urls, scale), suffix),
            ]),
        );
    }

    if options.text_case_analysis {
        let total = non_empty.len() as u64;
        let mut tally = [0u64; 4];
        for s in &non_empty {
            match casing(s) {
                Casing::Upper => tally[0] += 1,
                Casing::Lower => tally[1] += 1,
                Casing::Title => tally[2] += 1,
                Casing::Mixed => tally[3] += 1,
                Casing::Uncased => {}
            }
        }
        out.insert(StatKey::PercentUppercase, StatValue::percent(tally[0], total));
        out.insert(StatKey::PercentLowercase, StatValue::percent(tally[1], total));
        out.insert(StatKey::PercentTitlecase, StatValue::percent(tally[2], total));
        out.insert(StatKey::PercentMixedCase, StatValue::percent(tally[3], total));
    }

    out.insert(
        StatKey::NonPrintable,
        StatValue::count(collector.non_printable().count()),
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldDescriptor, FieldDomain, RecordId};
    use crate::profiling::config::{ProfileOptions, ProfilerConfig};

    fn run(values: &[&str], config: &ProfilerConfig) -> FieldReport {
        let mut collector =
            FieldCollector::new(FieldDescriptor::new("t", FieldDomain::Text, 0), config);
        for (i, value) in values.iter().enumerate() {
            collector.observe(RecordId(i as u64), &FieldValue::from(*value));
        }
        let ctx = FinalizeContext {
            options: &config.options,
            now: chrono::NaiveDateTime::default(),
            rows_analyzed: values.len() as u64,
        };
        let mut report = FieldReport::default();
        analyze(&collector, &ctx, &mut report).unwrap();
        report
    }

    fn list(report: &FieldReport, key: StatKey) -> Vec<String> {
        match report.get(key) {
            Some(StatValue::List(items)) => items.clone(),
            other => panic!("{} is not a list: {:?}", key, other),
        }
    }

    #[test]
    fn test_top_values_tie_break_first_seen() {
        let config = ProfilerConfig::new()
            .with_seed(1)
            .with_options(ProfileOptions::new().with_limit_unique(2));
        let report = run(&["", "", "abc", "abc", "xyz"], &config);

        assert_eq!(report.get(StatKey::EmptyStrings), Some(&StatValue::Integer(2)));
        assert_eq!(list(&report, StatKey::TopValues), vec!["'': 2", "'abc': 2"]);
        assert_eq!(
            report.side.top_values,
            vec![
                TopValue {
                    value: String::new(),
                    count: 2,
                    estimated: false
                },
                TopValue {
                    value: "abc".into(),
                    count: 2,
                    estimated: false
                },
            ]
        );
        assert_eq!(report.side.most_frequent, Some(FieldValue::from("")));
        assert_eq!(report.get(StatKey::PercentEmpty), Some(&StatValue::text("40.00%")));
    }

    #[test]
    fn test_sampled_ties_keep_stream_order() {
        let values: Vec<String> = (0..1000).map(|i| format!("v{:04}", i)).collect();
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        let config = ProfilerConfig::new()
            .with_seed(3)
            .with_max_exact_values(20)
            .with_options(ProfileOptions::new().with_limit_unique(5));
        let report = run(&values, &config);

        let top: Vec<&str> = report.side.top_values.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(top.len(), 5);
        assert!(report.side.top_values.iter().all(|t| t.estimated));
        assert!(top.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(report.side.most_frequent, Some(FieldValue::from(top[0])));
    }

    #[test]
    fn test_lengths_ignore_empty_strings() {
        let config = ProfilerConfig::new().with_seed(1);
        let report = run(&["", "ab", "abcd", "é"], &config);
        assert_eq!(report.get(StatKey::MinLength), Some(&StatValue::Integer(1)));
        assert_eq!(report.get(StatKey::MaxLength), Some(&StatValue::Integer(4)));
        assert_eq!(
            report.get(StatKey::AvgLength),
            Some(&StatValue::Real(7.0 / 3.0))
        );
    }

    #[test]
    fn test_case_and_whitespace_analysis() {
        let config = ProfilerConfig::new().with_seed(1);
        let report = run(
            &["ABC", "abc", "Hello World", "hELLo", " pad ", "two  spaces", "123"],
            &config,
        );
        assert_eq!(
            report.get(StatKey::PercentUppercase),
            Some(&StatValue::text("14.29%"))
        );
        assert_eq!(
            report.get(StatKey::PercentLowercase),
            Some(&StatValue::text("42.86%"))
        );
        assert_eq!(
            report.get(StatKey::PercentTitlecase),
            Some(&StatValue::text("14.29%"))
        );
        assert_eq!(
            report.get(StatKey::PercentMixedCase),
            Some(&StatValue::text("14.29%"))
        );
        assert_eq!(report.get(StatKey::PaddedValues), Some(&StatValue::Integer(1)));
        assert_eq!(report.get(StatKey::InternalSpaces), Some(&StatValue::Integer(1)));
    }

    #[test]
    fn test_rarity_words_and_patterns() {
        let config = ProfilerConfig::new()
            .with_seed(1)
            .with_options(ProfileOptions::new().with_limit_unique(2));
        let report = run(
            &[
                "the red fox",
                "a red hen",
                "user@example.com",
                "https://example.com/x",
                "a red hen",
            ],
            &config,
        );
        assert_eq!(report.get(StatKey::SingletonValues), Some(&StatValue::Integer(3)));
        assert_eq!(list(&report, StatKey::TopWords), vec!["red: 3", "hen: 2"]);
        assert_eq!(
            list(&report, StatKey::PatternMatches),
            vec!["Emails: 1", "URLs: 1"]
        );
    }

    #[test]
    fn test_non_printable_count_is_exact() {
        let config = ProfilerConfig::new().with_seed(1).with_id_list_cap(1);
        let report = run(&["ok", "a\u{0}", "b\u{0}", "c\u{0}"], &config);
        assert_eq!(report.get(StatKey::NonPrintable), Some(&StatValue::Integer(3)));
    }

    #[test]
    fn test_sampled_text_is_estimated() {
        let config = ProfilerConfig::new().with_seed(9).with_max_exact_values(50);
        let values: Vec<&str> = (0..500).map(|i| if i % 2 == 0 { "" } else { "x" }).collect();
        let report = run(&values, &config);

        assert!(report.get(StatKey::EmptyStrings).unwrap().is_estimate());
        assert!(report.side.top_values.iter().all(|t| t.estimated));
        let total: u64 = report.side.top_values.iter().map(|t| t.count).sum();
        assert_eq!(total, 500);
    }

    #[test]
    fn test_titlecase_rules() {
        assert_eq!(casing("Hello World"), Casing::Title);
        assert_eq!(casing("Hello world"), Casing::Mixed);
        assert_eq!(casing("HELLO"), Casing::Upper);
        assert_eq!(casing("hello"), Casing::Lower);
        assert_eq!(casing("42"), Casing::Uncased);
        assert_eq!(casing("O'Neil"), Casing::Title);
    }
}

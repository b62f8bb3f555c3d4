//! Date and date-time field statistics.
//!
//! Min/Max Date come from the exact extrema tracked during the pass; the
//! remaining statistics are computed from the sample of original temporal
//! values.

use chrono::{Datelike, NaiveTime, Timelike, Weekday};

use crate::Result;
use crate::models::{FieldValue, TemporalValue};

use super::collector::FieldCollector;
use super::finalize::FinalizeContext;
use super::models::{FieldReport, Scale, StatKey, StatValue, TopValue};
use super::stats;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const COMMON_LIMIT: usize = 3;

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

fn render(value: TemporalValue, with_time: bool) -> String {
    if with_time {
        value.as_datetime().format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        value.date().format("%Y-%m-%d").to_string()
    }
}

/// Renders the top entries as `label:count, label:count`.
fn common<K, I, F>(items: I, scale: Option<Scale>, label: F) -> StatValue
where
    K: std::hash::Hash + Eq + Clone,
    I: IntoIterator<Item = K>,
    F: Fn(&K) -> String,
{
    let entries: Vec<String> = stats::top_k(items, COMMON_LIMIT)
        .iter()
        .map(|(key, count)| format!("{}:{}", label(key), scale.map_or(*count, |s| s.apply(*count))))
        .collect();
    if entries.is_empty() {
        return StatValue::text("N/A");
    }
    let mut text = entries.join(", ");
    if scale.is_some() {
        text.push_str(" (Est.)");
    }
    StatValue::Text(text)
}

/// Adds temporal statistics to `report`.
pub fn analyze(
    collector: &FieldCollector,
    ctx: &FinalizeContext<'_>,
    report: &mut FieldReport,
) -> Result<()> {
    let sample = collector.temporal_sample();
    let errors = collector.conversion_errors().count();
    let out = &mut report.stats;
    if errors > 0 {
        out.insert(StatKey::ConversionErrors, StatValue::count(errors));
    }

    let extrema = collector.temporal_extrema();
    let (Some(min), Some(max)) = (extrema.min(), extrema.max()) else {
        out.insert(
            StatKey::Status,
            StatValue::text("No valid date values parsed"),
        );
        return Ok(());
    };
    let with_time = extrema.has_time();
    let n = sample.len();
    let scale = Scale::for_sample(collector.is_exact(), collector.temporal_count(), n);
    let estimated = scale.is_some();

    out.insert(StatKey::MinDate, StatValue::Text(render(min, with_time)));
    out.insert(StatKey::MaxDate, StatValue::Text(render(max, with_time)));

    let counts = stats::frequencies(sample.iter().copied());
    let top: Vec<TopValue> = counts
        .iter()
        .take(ctx.options.limit_unique)
        .map(|(value, count)| TopValue {
            value: render(*value, with_time),
            count: scale.map_or(*count, |s| s.apply(*count)),
            estimated,
        })
        .collect();
    out.insert(
        StatKey::TopValues,
        StatValue::List(
            top.iter()
                .map(|t| {
                    if t.estimated {
                        format!("'{}': {} (Est.)", t.value, t.count)
                    } else {
                        format!("'{}': {}", t.value, t.count)
                    }
                })
                .collect(),
        ),
    );

    out.insert(
        StatKey::CommonYears,
        common(sample.iter().map(|v| v.date().year()), scale, |y| y.to_string()),
    );
    out.insert(
        StatKey::CommonMonths,
        common(sample.iter().map(|v| v.date().month0()), scale, |m| {
            MONTH_NAMES[*m as usize % 12].to_string()
        }),
    );
    out.insert(
        StatKey::CommonDays,
        common(sample.iter().map(|v| v.date().weekday()), scale, |d| {
            day_name(*d).to_string()
        }),
    );

    if with_time {
        let before = sample.iter().filter(|v| v.as_datetime() < ctx.now).count() as u64;
        let after = sample.iter().filter(|v| v.as_datetime() > ctx.now).count() as u64;
        out.insert(StatKey::DatesBeforeNow, StatValue::sampled_count(before, scale));
        out.insert(StatKey::DatesAfterNow, StatValue::sampled_count(after, scale));
    } else {
        let today = ctx.now.date();
        let before = sample.iter().filter(|v| v.date() < today).count() as u64;
        let after = sample.iter().filter(|v| v.date() > today).count() as u64;
        out.insert(
            StatKey::DatesBeforeToday,
            StatValue::sampled_count(before, scale),
        );
        out.insert(
            StatKey::DatesAfterToday,
            StatValue::sampled_count(after, scale),
        );
    }

    if ctx.options.date_time_weekend {
        let weekend = sample
            .iter()
            .filter(|v| matches!(v.date().weekday(), Weekday::Sat | Weekday::Sun))
            .count() as u64;
        let total = n as u64;
        out.insert(StatKey::PercentWeekend, StatValue::percent(weekend, total));
        out.insert(
            StatKey::PercentWeekday,
            StatValue::percent(total - weekend, total),
        );

        if with_time {
            let times: Vec<NaiveTime> = sample
                .iter()
                .filter(|v| v.has_time())
                .map(|v| v.as_datetime().time())
                .collect();
            let timed = times.len() as u64;
            let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN);
            let midnight = times.iter().filter(|t| **t == NaiveTime::MIN).count() as u64;
            let at_noon = times.iter().filter(|t| **t == noon).count() as u64;
            out.insert(StatKey::PercentMidnight, StatValue::percent(midnight, timed));
            out.insert(StatKey::PercentNoon, StatValue::percent(at_noon, timed));
            out.insert(
                StatKey::CommonHours,
                common(times.iter().map(|t| t.hour()), scale, |h| format!("{:02}:00", h)),
            );
        }
    }

    report.side.most_frequent = counts.first().map(|(value, _)| FieldValue::from(*value));
    report.side.top_values = top;
    Ok(())
}

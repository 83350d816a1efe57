use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::report::{ItemKind, MonthReport};

/// Hour totals of a month report.
///
/// Items without tags do not appear in `per_tag`, and an item carrying several
/// tags counts towards each of them, so `per_tag` is not expected to sum up to
/// `month_total_hours`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub per_day: BTreeMap<NaiveDate, u32>,
    pub per_tag: BTreeMap<String, u32>,
    pub per_kind: BTreeMap<ItemKind, u32>,
    pub item_count: usize,
    pub month_total_hours: u32,
}

pub fn aggregate(report: &MonthReport) -> Aggregate {
    let mut totals = Aggregate::default();

    for (date, day) in &report.days {
        let day_total = day.total_hours();

        for item in &day.items {
            let kind_total = totals.per_kind.entry(item.kind).or_default();
            *kind_total = kind_total.saturating_add(item.duration_hours);

            let tags: BTreeSet<String> = item
                .tags
                .iter()
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| !tag.is_empty())
                .collect();
            for tag in tags {
                let tag_total = totals.per_tag.entry(tag).or_default();
                *tag_total = tag_total.saturating_add(item.duration_hours);
            }
        }

        totals.per_day.insert(*date, day_total);
        totals.item_count += day.items.len();
        totals.month_total_hours = totals.month_total_hours.saturating_add(day_total);
    }

    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::calendar::MonthKey;
    use crate::models::report::{DayReport, LogItem};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn sample() -> MonthReport {
        MonthReport::new(MonthKey::new(2025, 6).unwrap())
            .with_day(DayReport::new(
                date(2),
                vec![
                    LogItem::new("daily", 1, ItemKind::Meeting),
                    LogItem::new("abrau: tests", 7, ItemKind::Task).with_tags(["Abrau", "qa"]),
                ],
            ))
            .with_day(DayReport::new(
                date(3),
                vec![
                    LogItem::new("daily", 1, ItemKind::Meeting),
                    LogItem::new("abrau: deploy", 4, ItemKind::Task).with_tags(["abrau"]),
                    LogItem::new("ks: review", 3, ItemKind::Task).with_tags(["KS", "ks "]),
                ],
            ))
            .with_day(DayReport::new(date(4), vec![]))
            .with_unmentioned([date(1)])
    }

    #[test]
    fn sums_per_day_and_month() {
        let totals = aggregate(&sample());
        assert_eq!(totals.per_day[&date(2)], 8);
        assert_eq!(totals.per_day[&date(3)], 8);
        assert_eq!(totals.per_day[&date(4)], 0);
        assert!(!totals.per_day.contains_key(&date(1)));
        assert_eq!(totals.month_total_hours, 16);
        assert_eq!(totals.item_count, 5);
    }

    #[test]
    fn tags_are_case_normalized_and_untagged_is_omitted() {
        let totals = aggregate(&sample());
        assert_eq!(
            totals.per_tag,
            BTreeMap::from([
                ("abrau".to_string(), 11),
                ("ks".to_string(), 3),
                ("qa".to_string(), 7),
            ])
        );
        assert!(!totals.per_tag.contains_key("untagged"));
    }

    #[test]
    fn hours_by_kind() {
        let totals = aggregate(&sample());
        assert_eq!(totals.per_kind[&ItemKind::Meeting], 2);
        assert_eq!(totals.per_kind[&ItemKind::Task], 14);
    }

    #[test]
    fn deterministic_and_empty_safe() {
        let report = sample();
        assert_eq!(aggregate(&report), aggregate(&report));

        let empty = aggregate(&MonthReport::new(MonthKey::new(2025, 6).unwrap()));
        assert_eq!(empty, Aggregate::default());
    }

    #[test]
    fn oversized_entries_saturate() {
        let report = MonthReport::new(MonthKey::new(2025, 6).unwrap())
            .with_day(DayReport::new(
                date(2),
                vec![
                    LogItem::new("daily", 1, ItemKind::Meeting),
                    LogItem::new("abrau: tests", u32::MAX, ItemKind::Task).with_tags(["abrau"]),
                    LogItem::new("abrau: review", 7, ItemKind::Task).with_tags(["abrau"]),
                ],
            ))
            .with_day(DayReport::new(
                date(3),
                vec![LogItem::new("daily", 1, ItemKind::Meeting)],
            ));

        let totals = aggregate(&report);
        assert_eq!(totals.per_day[&date(2)], u32::MAX);
        assert_eq!(totals.per_tag["abrau"], u32::MAX);
        assert_eq!(totals.per_kind[&ItemKind::Task], u32::MAX);
        assert_eq!(totals.month_total_hours, u32::MAX);
    }
}

use std::collections::HashMap;
use std::hash::Hash;

use chrono::{Datelike, Days, NaiveDate};

use crate::model::UsageRecord;

/// Running totals for one group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bucket {
    pub total: u64,
    pub count: u64,
}

impl Bucket {
    fn add(&mut self, pieces: u64) {
        self.total = self.total.saturating_add(pieces);
        self.count += 1;
    }
}

/// Groups records by `key`, keeping groups in first-encounter order.
///
/// Records for which `key` returns `None` are left out.
pub fn group_in_order<'r, K, I, F>(records: I, mut key: F) -> Vec<(K, Bucket)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = &'r UsageRecord>,
    F: FnMut(&'r UsageRecord) -> Option<K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Bucket)> = Vec::new();

    for record in records {
        let Some(k) = key(record) else {
            continue;
        };
        let slot = *index.entry(k.clone()).or_insert_with(|| {
            groups.push((k, Bucket::default()));
            groups.len() - 1
        });
        groups[slot].1.add(record.pieces_counter);
    }

    groups
}

/// `round(total / count)` with halves rounded up. Returns 0 when `count` is 0.
pub fn rounded_average(total: u64, count: u64) -> u64 {
    if count == 0 {
        return 0;
    }
    let (total, count) = (total as u128, count as u128);
    ((2 * total + count) / (2 * count)) as u64
}

/// Shortens a label to `max` characters followed by `...`.
///
/// Counts Unicode scalar values, so a character outside the BMP counts once.
pub fn truncate_label(label: &str, max: usize) -> String {
    if label.chars().count() > max {
        let head: String = label.chars().take(max).collect();
        format!("{head}...")
    } else {
        label.to_string()
    }
}

/// The Sunday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let back = date.weekday().num_days_from_sunday() as u64;
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounded_average() {
        assert_eq!(rounded_average(0, 0), 0);
        assert_eq!(rounded_average(180, 3), 60);
        assert_eq!(rounded_average(5, 2), 3);
        assert_eq!(rounded_average(7, 2), 4);
        assert_eq!(rounded_average(1, 3), 0);
        assert_eq!(rounded_average(2, 3), 1);
        assert_eq!(rounded_average(u64::MAX, 1), u64::MAX);
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("Alice", 12), "Alice");
        assert_eq!(truncate_label("Exactly12chr", 12), "Exactly12chr");
        assert_eq!(truncate_label("Christopher Long", 12), "Christopher ...");
        assert_eq!(truncate_label("Ñandú Ñandú Ñandú", 12), "Ñandú Ñandú ...");
        // Twelve emoji fit; a UTF-16 count would have cut after six.
        let emoji = "🎞".repeat(12);
        assert_eq!(truncate_label(&emoji, 12), emoji);
        assert_eq!(truncate_label(&"🎞".repeat(13), 12), format!("{emoji}..."));
    }

    #[test]
    fn test_week_start() {
        let sunday = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert_eq!(week_start(sunday), sunday);
        assert_eq!(week_start(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()), sunday);
        assert_eq!(week_start(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()), sunday);
        assert_eq!(
            week_start(NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()),
            NaiveDate::from_ymd_opt(2024, 1, 7).unwrap()
        );
    }
}

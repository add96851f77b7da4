//! Question/answer log bucketed by calendar date.

use chrono::{Days, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::QaPair;

/// Characters of the question shown on a history button.
const LABEL_CHARS: usize = 30;

pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `Q{n}: {first 30 chars}...`
pub fn button_label(position: usize, question: &str) -> String {
    let head: String = question.chars().take(LABEL_CHARS).collect();
    format!("Q{}: {}...", position + 1, head)
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub index: usize,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryBucket {
    pub title: &'static str,
    pub date: String,
    pub entries: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct QuestionLog {
    by_date: BTreeMap<String, Vec<QaPair>>,
}

impl QuestionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, date: NaiveDate, pair: QaPair) {
        self.by_date.entry(date_key(date)).or_default().push(pair);
    }

    pub fn get(&self, date: &str, index: usize) -> Option<&QaPair> {
        self.by_date.get(date).and_then(|pairs| pairs.get(index))
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_date.values().map(|v| v.len()).sum()
    }

    /// Every pair, oldest date first, insertion order within a date.
    pub fn all(&self) -> impl Iterator<Item = &QaPair> {
        self.by_date.values().flatten()
    }

    /// Sidebar buckets for today, yesterday, and the day before. Days with
    /// no questions are omitted; older days are never shown.
    pub fn sidebar(&self, today: NaiveDate) -> Vec<HistoryBucket> {
        let titles = [
            "Today's History",
            "Yesterday's History",
            "Day Before Yesterday's History",
        ];
        let mut buckets = Vec::new();
        for (offset, title) in titles.into_iter().enumerate() {
            let Some(day) = today.checked_sub_days(Days::new(offset as u64)) else {
                continue;
            };
            let key = date_key(day);
            if let Some(pairs) = self.by_date.get(&key) {
                buckets.push(HistoryBucket {
                    title,
                    date: key,
                    entries: pairs
                        .iter()
                        .enumerate()
                        .map(|(i, p)| HistoryEntry {
                            index: i,
                            label: button_label(i, &p.user),
                        })
                        .collect(),
                });
            }
        }
        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(q: &str) -> QaPair {
        QaPair {
            user: q.to_string(),
            bot: format!("answer to {}", q),
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn label_truncates_to_thirty_chars() {
        let q = "What does the quarterly report say about revenue growth?";
        assert_eq!(button_label(0, q), "Q1: What does the quarterly report...");
        assert_eq!(button_label(4, "short"), "Q5: short...");
    }

    #[test]
    fn label_truncates_on_char_boundaries() {
        let q = "é".repeat(40);
        assert_eq!(button_label(0, &q), format!("Q1: {}...", "é".repeat(30)));
    }

    #[test]
    fn sidebar_shows_three_most_recent_days_only() {
        let today = day(2024, 3, 10);
        let mut log = QuestionLog::new();
        log.record(day(2024, 3, 6), pair("old"));
        log.record(day(2024, 3, 8), pair("two days ago"));
        log.record(today, pair("now"));
        log.record(today, pair("again"));

        let buckets = log.sidebar(today);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].title, "Today's History");
        assert_eq!(buckets[0].entries.len(), 2);
        assert_eq!(buckets[0].entries[1].label, "Q2: again...");
        assert_eq!(buckets[1].title, "Day Before Yesterday's History");
        assert_eq!(buckets[1].date, "2024-03-08");
        assert_eq!(log.len(), 4);
    }

    #[test]
    fn sidebar_crosses_month_boundary() {
        let mut log = QuestionLog::new();
        log.record(day(2024, 2, 29), pair("leap"));
        let buckets = log.sidebar(day(2024, 3, 1));
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].title, "Yesterday's History");
    }

    #[test]
    fn all_is_date_ordered() {
        let mut log = QuestionLog::new();
        log.record(day(2024, 3, 2), pair("b"));
        log.record(day(2024, 3, 1), pair("a"));
        let users: Vec<&str> = log.all().map(|p| p.user.as_str()).collect();
        assert_eq!(users, vec!["a", "b"]);
        assert_eq!(log.get("2024-03-02", 0).unwrap().user, "b");
        assert!(log.get("2024-03-02", 1).is_none());
    }
}

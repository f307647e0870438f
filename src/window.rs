//! Recent-booking windows: counts and bond sums for the last 24/48/72 hours.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer, ser::SerializeMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Window {
    Last24h,
    Last48h,
    Last72h,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Last24h, Window::Last48h, Window::Last72h];

    pub fn label(self) -> &'static str {
        match self {
            Window::Last24h => "24h",
            Window::Last48h => "48h",
            Window::Last72h => "72h",
        }
    }

    pub fn upper_bound(self) -> Duration {
        match self {
            Window::Last24h => Duration::hours(24),
            Window::Last48h => Duration::hours(48),
            Window::Last72h => Duration::hours(72),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WindowBucket {
    pub count: usize,
    pub sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowTable {
    buckets: [WindowBucket; 3],
}

impl WindowTable {
    pub fn bucket(&self, window: Window) -> &WindowBucket {
        &self.buckets[window.index()]
    }

    pub fn add(&mut self, window: Window, amount: f64) {
        let bucket = &mut self.buckets[window.index()];
        bucket.count += 1;
        bucket.sum += amount;
    }

    pub fn total_count(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Window, &WindowBucket)> {
        Window::ALL.into_iter().zip(self.buckets.iter())
    }

    pub fn merge(&mut self, other: &WindowTable) {
        for (mine, theirs) in self.buckets.iter_mut().zip(other.buckets.iter()) {
            mine.count += theirs.count;
            mine.sum += theirs.sum;
        }
    }
}

impl Serialize for WindowTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for (window, bucket) in self.iter() {
            map.serialize_entry(window.label(), bucket)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone)]
pub struct WindowBucketizer {
    now: DateTime<Utc>,
    table: WindowTable,
}

impl WindowBucketizer {
    pub fn new(now: DateTime<Utc>) -> Self {
        WindowBucketizer {
            now,
            table: WindowTable::default(),
        }
    }

    pub fn starting_now() -> Self {
        WindowBucketizer::new(Utc::now())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Future timestamps and anything older than 72h fall in no window.
    pub fn classify(&self, timestamp: DateTime<Utc>) -> Option<Window> {
        classify_elapsed(self.now - timestamp)
    }

    pub fn record(&mut self, timestamp: DateTime<Utc>, amount: Option<f64>) -> Option<Window> {
        let window = self.classify(timestamp)?;
        self.table.add(window, amount.unwrap_or(0.0));
        Some(window)
    }

    pub fn table(&self) -> &WindowTable {
        &self.table
    }

    pub fn into_table(self) -> WindowTable {
        self.table
    }
}

pub fn classify_elapsed(elapsed: Duration) -> Option<Window> {
    if elapsed < Duration::zero() {
        return None;
    }
    Window::ALL
        .into_iter()
        .find(|window| elapsed <= window.upper_bound())
}

#[derive(Debug, Clone)]
pub struct GroupedWindows {
    now: DateTime<Utc>,
    groups: BTreeMap<String, WindowTable>,
}

impl GroupedWindows {
    pub fn new(now: DateTime<Utc>) -> Self {
        GroupedWindows {
            now,
            groups: BTreeMap::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn ensure_group(&mut self, group: &str) {
        self.groups.entry(group.to_string()).or_default();
    }

    pub fn record(
        &mut self,
        group: &str,
        timestamp: DateTime<Utc>,
        amount: Option<f64>,
    ) -> Option<Window> {
        let window = classify_elapsed(self.now - timestamp)?;
        self.groups
            .entry(group.to_string())
            .or_default()
            .add(window, amount.unwrap_or(0.0));
        Some(window)
    }

    pub fn group(&self, group: &str) -> Option<&WindowTable> {
        self.groups.get(group)
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &WindowTable)> {
        self.groups.iter().map(|(name, table)| (name.as_str(), table))
    }

    pub fn absorb(&mut self, group: &str, table: &WindowTable) {
        self.groups.entry(group.to_string()).or_default().merge(table);
    }
}

impl Serialize for GroupedWindows {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (group, table) in &self.groups {
            map.serialize_entry(group, table)?;
        }
        map.end()
    }
}

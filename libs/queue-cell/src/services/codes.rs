use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};

/// Builds the short display code printed on a ticket: issue hour in clinic
/// time with an am/pm marker, then the day's sequence number. The sequence
/// resets at the start of each service-day; a unique index on
/// (service-day, queue_code) backs uniqueness, and codes are never reused
/// even when an entry is later cancelled.
pub struct QueueCodeGenerator {
    offset_hours: i32,
}

impl QueueCodeGenerator {
    pub fn new(offset_hours: i32) -> Self {
        Self { offset_hours }
    }

    /// `seq` is 1-based: the number of entries already issued this
    /// service-day plus one.
    pub fn next_code(&self, now: DateTime<Utc>, seq: u32) -> String {
        let offset = FixedOffset::east_opt(self.offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix());
        let local = now.with_timezone(&offset);

        let hour = local.hour();
        let marker = if hour < 12 { 'A' } else { 'P' };
        let hour12 = match hour % 12 {
            0 => 12,
            h => h,
        };

        format!("{:02}{}-{:03}", hour12, marker, seq)
    }
}

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};

pub const DEFAULT_SLOTS: [&str; 8] = [
    "09:00", "10:00", "11:00", "13:00", "14:00", "15:00", "16:00", "17:00",
];

/// Bookable dates and times of day. Dates roll forward with the clock, slots are fixed.
#[derive(Clone, Debug)]
pub struct SlotCatalog {
    offset: FixedOffset,
    days_ahead: u32,
    slots: Vec<String>,
}

impl SlotCatalog {
    pub fn new(offset: FixedOffset, days_ahead: u32, slots: Vec<String>) -> Self {
        Self {
            offset,
            days_ahead,
            slots,
        }
    }

    pub fn default_slots() -> Vec<String> {
        DEFAULT_SLOTS.iter().map(|slot| slot.to_string()).collect()
    }

    /// The next `days_ahead` calendar days, starting tomorrow in local time.
    pub fn dates(&self, now: DateTime<Utc>) -> Vec<NaiveDate> {
        let today = now.with_timezone(&self.offset).date_naive();
        (1..=self.days_ahead)
            .filter_map(|offset| today.checked_add_days(Days::new(u64::from(offset))))
            .collect()
    }

    pub fn contains_slot(&self, slot: &str) -> bool {
        self.slots.iter().any(|candidate| candidate == slot)
    }

    pub fn available(&self, taken: &[String]) -> Vec<String> {
        self.slots
            .iter()
            .filter(|slot| !taken.contains(*slot))
            .cloned()
            .collect()
    }
}

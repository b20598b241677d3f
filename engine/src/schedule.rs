//! Event timing for the auction notifier.
//!
//! Stored bidding times are offset-less wall-clock values, so "now" has to be
//! shifted by the same fixed UTC offset before any comparison.

use crate::record::PurchaseRecord;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use std::time::Duration;

/// How long before an auction the notification fires.
pub const DEFAULT_LEAD_WINDOW: Duration = Duration::from_secs(10 * 60);
/// Wait used when nothing is scheduled.
pub const DEFAULT_IDLE_POLL: Duration = Duration::from_secs(24 * 60 * 60);
/// Offset of the wall clock bidding times are recorded in, in hours east of UTC.
pub const DEFAULT_UTC_OFFSET_HOURS: i64 = 3;
/// Widest offset any real time zone uses.
pub const MAX_UTC_OFFSET_HOURS: i64 = 14;

/// Timing knobs of the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub lead_window: Duration,
    pub idle_poll: Duration,
    /// Signed; negative west of UTC.
    pub utc_offset: chrono::Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            lead_window: DEFAULT_LEAD_WINDOW,
            idle_poll: DEFAULT_IDLE_POLL,
            utc_offset: chrono::Duration::hours(DEFAULT_UTC_OFFSET_HOURS),
        }
    }
}

impl Timing {
    /// Shift a UTC instant into the wall clock of stored timestamps.
    pub fn local(&self, utc_now: NaiveDateTime) -> NaiveDateTime {
        utc_now + self.utc_offset
    }
}

/// The next record due for notification and how long to wait for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NearestEvent {
    /// Position in the ordered record list; `None` when nothing qualifies.
    pub index: Option<usize>,
    pub wait: Duration,
}

/// Find the nearest event in `records`, which must be ordered ascending by
/// bidding time.
///
/// The first record whose notification moment (`bidding - lead`) is still
/// ahead wins with the time left until that moment. A record whose moment has
/// passed but whose auction has not started yet fires immediately. With no
/// qualifying record the result is `(None, idle)`.
pub fn nearest_event(
    records: &[PurchaseRecord],
    now: NaiveDateTime,
    lead: Duration,
    idle: Duration,
) -> NearestEvent {
    for (i, record) in records.iter().enumerate() {
        let Some(bidding) = record.bidding else {
            continue;
        };
        // negative deltas fail to convert: the auction already started
        let Ok(remaining) = (bidding - now).to_std() else {
            continue;
        };
        if remaining.is_zero() {
            continue;
        }

        let wait = remaining.checked_sub(lead).unwrap_or(Duration::ZERO);
        return NearestEvent {
            index: Some(i),
            wait,
        };
    }

    NearestEvent {
        index: None,
        wait: idle,
    }
}

/// Records pending notification, owned by the notifier task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerState {
    records: Vec<PurchaseRecord>,
    next: Option<NearestEvent>,
}

impl SchedulerState {
    /// Start from a freshly loaded record list, leaving out anything already
    /// in `notified`.
    pub fn reload(mut records: Vec<PurchaseRecord>, notified: &Notified) -> Self {
        records.retain(|r| !notified.contains(&r.registry_number));
        Self::new(records)
    }

    /// Start from a freshly loaded record list.
    pub fn new(mut records: Vec<PurchaseRecord>) -> Self {
        // stable: the database already returns them in order
        records.sort_by_key(|r| r.bidding);
        Self {
            records,
            next: None,
        }
    }

    pub fn records(&self) -> &[PurchaseRecord] {
        &self.records
    }

    /// Last computed nearest event.
    pub fn next(&self) -> Option<NearestEvent> {
        self.next
    }

    /// Recompute the nearest event at wall-clock `now`.
    pub fn recompute(&mut self, now: NaiveDateTime, timing: &Timing) -> NearestEvent {
        let next = nearest_event(&self.records, now, timing.lead_window, timing.idle_poll);
        self.next = Some(next);
        next
    }

    /// Remove and return the record that is due.
    ///
    /// Everything ordered before it goes too; those auctions already started
    /// and are never notified.
    pub fn take_due(&mut self) -> Option<PurchaseRecord> {
        let index = self.next.take()?.index?;
        if index >= self.records.len() {
            return None;
        }
        self.records.drain(..=index).last()
    }
}

/// Registry numbers notified during one wall-clock day.
///
/// Outlives every [`SchedulerState`] rebuild so that a reload never brings
/// back a record that was already sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notified {
    day: Option<NaiveDate>,
    numbers: HashSet<String>,
}

impl Notified {
    /// Forget everything once `today` differs from the day entries were made on.
    pub fn roll_over(&mut self, today: NaiveDate) {
        if self.day != Some(today) {
            self.numbers.clear();
            self.day = Some(today);
        }
    }

    pub fn insert(&mut self, registry_number: impl Into<String>) {
        self.numbers.insert(registry_number.into());
    }

    pub fn contains(&self, registry_number: &str) -> bool {
        self.numbers.contains(registry_number)
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn bidding_in(minutes: i64) -> PurchaseRecord {
        let mut r = PurchaseRecord::new(format!("rn-{minutes}"), "subject");
        r.bidding = Some(t0() + chrono::Duration::minutes(minutes));
        r
    }

    const MIN: Duration = Duration::from_secs(60);

    #[test]
    fn empty_list_idles() {
        let next = nearest_event(&[], t0(), 10 * MIN, DEFAULT_IDLE_POLL);
        assert_eq!(
            next,
            NearestEvent {
                index: None,
                wait: Duration::from_secs(24 * 60 * 60)
            }
        );
    }

    #[test]
    fn lead_window_elapsed_fires_now() {
        let records = vec![bidding_in(2), bidding_in(60)];
        let next = nearest_event(&records, t0(), 10 * MIN, DEFAULT_IDLE_POLL);
        assert_eq!(
            next,
            NearestEvent {
                index: Some(0),
                wait: Duration::ZERO
            }
        );
    }

    #[test]
    fn waits_until_lead_moment() {
        let records = vec![bidding_in(60)];
        let next = nearest_event(&records, t0(), 10 * MIN, DEFAULT_IDLE_POLL);
        assert_eq!(next.index, Some(0));
        assert_eq!(next.wait, 50 * MIN);
    }

    #[test]
    fn started_auctions_are_skipped() {
        let mut no_time = PurchaseRecord::new("x", "s");
        no_time.bidding = None;
        let records = vec![bidding_in(-30), bidding_in(0), no_time, bidding_in(25)];

        let next = nearest_event(&records, t0(), 10 * MIN, DEFAULT_IDLE_POLL);
        assert_eq!(next.index, Some(3));
        assert_eq!(next.wait, 15 * MIN);
    }

    #[test]
    fn all_past_idles() {
        let records = vec![bidding_in(-60), bidding_in(-1)];
        let next = nearest_event(&records, t0(), 10 * MIN, 5 * MIN);
        assert_eq!(next.index, None);
        assert_eq!(next.wait, 5 * MIN);
    }

    #[test]
    fn timing_shifts_to_wall_clock() {
        let timing = Timing::default();
        assert_eq!(timing.local(t0()), t0() + chrono::Duration::hours(3));
    }

    #[test]
    fn timing_shifts_west_of_utc() {
        let timing = Timing {
            utc_offset: chrono::Duration::hours(-5),
            ..Timing::default()
        };
        assert_eq!(timing.local(t0()), t0() - chrono::Duration::hours(5));
    }

    #[test]
    fn reload_leaves_out_notified_records() {
        let timing = Timing::default();
        let mut notified = Notified::default();
        notified.roll_over(t0().date());

        let mut state = SchedulerState::reload(vec![bidding_in(5), bidding_in(60)], &notified);
        state.recompute(t0(), &timing);
        let sent = state.take_due().unwrap();
        notified.insert(sent.registry_number.clone());

        // the source still returns the sent auction: it has not started yet
        let mut state = SchedulerState::reload(vec![bidding_in(5), bidding_in(60)], &notified);
        assert_eq!(state.records().len(), 1);
        let next = state.recompute(t0(), &timing);
        assert_eq!(next.wait, 50 * MIN);
        assert_eq!(state.take_due().unwrap().registry_number, "rn-60");
    }

    #[test]
    fn notified_clears_on_a_new_day() {
        let mut notified = Notified::default();
        notified.roll_over(t0().date());
        notified.insert("rn-5");

        notified.roll_over(t0().date());
        assert!(notified.contains("rn-5"));

        notified.roll_over(t0().date().succ_opt().unwrap());
        assert!(notified.is_empty());
    }

    #[test]
    fn state_consumes_each_record_once() {
        let timing = Timing::default();
        let mut state = SchedulerState::new(vec![bidding_in(60), bidding_in(5), bidding_in(120)]);
        assert_eq!(state.records()[0].registry_number, "rn-5");

        assert_eq!(state.recompute(t0(), &timing).index, Some(0));
        assert_eq!(state.take_due().unwrap().registry_number, "rn-5");
        // nothing due until recomputed
        assert!(state.take_due().is_none());

        let next = state.recompute(t0(), &timing);
        assert_eq!(next.wait, 50 * MIN);
        assert_eq!(state.take_due().unwrap().registry_number, "rn-60");

        state.recompute(t0(), &timing);
        assert_eq!(state.take_due().unwrap().registry_number, "rn-120");

        let next = state.recompute(t0(), &timing);
        assert_eq!(next.index, None);
        assert!(state.take_due().is_none());
        assert!(state.records().is_empty());
    }

    #[test]
    fn take_due_drops_started_records_before_it() {
        let timing = Timing::default();
        let mut state = SchedulerState::new(vec![bidding_in(-10), bidding_in(30)]);

        state.recompute(t0(), &timing);
        assert_eq!(state.take_due().unwrap().registry_number, "rn-30");
        assert!(state.records().is_empty());
    }
}

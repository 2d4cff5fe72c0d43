//! Free-slot search over merged busy intervals.
//!
//! Walks the user's events chronologically and emits gaps that are long
//! enough for the requested duration, clipped to working hours. Instants
//! are interpreted in UTC; callers convert to the user's zone at the edge.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use jobtrail_domain::{AvailableSlot, CalendarEvent};

/// Working hours start, inclusive.
pub const WORK_DAY_START_HOUR: u32 = 9;
/// Working hours end, exclusive.
pub const WORK_DAY_END_HOUR: u32 = 18;

/// Maximum number of slots returned from one search.
pub const MAX_SLOTS: usize = 10;

/// Find free intervals within `[search_start, search_end]` that fit
/// `duration_minutes` inside working hours.
///
/// `events` are the user's persisted events for the window; all-day events
/// never block a slot. Returns at most [`MAX_SLOTS`] slots of exactly the
/// requested duration, in chronological order. With no events in range the
/// whole window (clipped to working hours) yields slots via the tail check.
pub fn find_available_slots(
    events: &[CalendarEvent],
    duration_minutes: i64,
    search_start: DateTime<Utc>,
    search_end: DateTime<Utc>,
) -> Vec<AvailableSlot> {
    let mut busy: Vec<&CalendarEvent> = events.iter().filter(|e| !e.is_all_day).collect();
    busy.sort_by_key(|e| e.start_time);

    let mut slots = Vec::new();
    let mut cursor = search_start;

    for event in busy {
        push_gap(&mut slots, cursor, event.start_time, duration_minutes);
        if slots.len() >= MAX_SLOTS {
            slots.truncate(MAX_SLOTS);
            return slots;
        }
        // The cursor always advances past the event, emitted slot or not.
        cursor = cursor.max(event.end_time);
    }

    push_gap(&mut slots, cursor, search_end, duration_minutes);
    slots.truncate(MAX_SLOTS);
    slots
}

/// Clip `[gap_start, gap_end]` to working hours day by day, emitting one
/// slot for each day whose clipped portion still fits the duration. A gap
/// spanning midnight never yields a slot outside that day's hours.
fn push_gap(
    slots: &mut Vec<AvailableSlot>,
    gap_start: DateTime<Utc>,
    gap_end: DateTime<Utc>,
    duration_minutes: i64,
) {
    if gap_end <= gap_start {
        return;
    }

    let mut day = gap_start.date_naive();
    let last_day = gap_end.date_naive();
    while day <= last_day {
        let start = gap_start.max(hour_on(day, WORK_DAY_START_HOUR));
        let end = gap_end.min(hour_on(day, WORK_DAY_END_HOUR));

        if end - start >= Duration::minutes(duration_minutes) {
            slots.push(AvailableSlot { start, end: start + Duration::minutes(duration_minutes) });
        }

        let Some(next) = day.succ_opt() else { break };
        day = next;
    }
}

fn hour_on(day: NaiveDate, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    day.and_time(time).and_utc()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use jobtrail_domain::EventStatus;

    use super::*;

    fn on(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, h, m, 0).unwrap()
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        on(2, h, m)
    }

    fn busy(start: DateTime<Utc>, end: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent {
            id: None,
            external_id: None,
            provider: None,
            title: "Busy".to_string(),
            description: None,
            location: None,
            start_time: start,
            end_time: end,
            timezone: None,
            is_all_day: false,
            recurrence: None,
            attendees: Vec::new(),
            reminders: Vec::new(),
            status: EventStatus::Confirmed,
            created: None,
            updated: None,
            metadata: None,
        }
    }

    #[test]
    fn splits_window_around_single_event() {
        // One hour requested, event 10:00-11:00, window 09:00-12:00.
        let events = vec![busy(at(10, 0), at(11, 0))];
        let slots = find_available_slots(&events, 60, at(9, 0), at(12, 0));

        assert_eq!(
            slots,
            vec![
                AvailableSlot { start: at(9, 0), end: at(10, 0) },
                AvailableSlot { start: at(11, 0), end: at(12, 0) },
            ]
        );
    }

    #[test]
    fn empty_calendar_yields_window_clipped_to_working_hours() {
        let slots = find_available_slots(&[], 60, at(7, 0), at(20, 0));
        assert_eq!(slots, vec![AvailableSlot { start: at(9, 0), end: at(10, 0) }]);
    }

    #[test]
    fn slots_respect_requested_duration_and_bounds() {
        // Window spans two days; every slot must sit inside its own day's
        // working hours.
        let events = vec![
            busy(at(9, 30), at(10, 0)),
            busy(at(12, 0), at(14, 30)),
            busy(on(3, 10, 0), on(3, 16, 0)),
        ];
        let search_start = at(9, 0);
        let search_end = on(3, 17, 0);
        let slots = find_available_slots(&events, 45, search_start, search_end);

        assert!(!slots.is_empty());
        for slot in &slots {
            assert_eq!((slot.end - slot.start).num_minutes(), 45);
            assert!(slot.start >= search_start);
            assert!(slot.end <= search_end);
            assert!(slot.start >= hour_on(slot.start.date_naive(), WORK_DAY_START_HOUR));
            assert!(slot.end <= hour_on(slot.end.date_naive(), WORK_DAY_END_HOUR));
            for event in &events {
                assert!(
                    slot.end <= event.start_time || slot.start >= event.end_time,
                    "slot {slot:?} overlaps {event:?}"
                );
            }
        }
    }

    #[test]
    fn overnight_gap_never_leaks_past_the_closing_hour() {
        // Free from 17:30 day 2 until 10:00 day 3: the 30 minutes left on
        // day 2 cannot hold an hour, so the first slot opens at 09:00 day 3.
        let events = vec![busy(at(9, 0), at(17, 30)), busy(on(3, 10, 0), on(3, 11, 0))];
        let slots = find_available_slots(&events, 60, at(9, 0), on(3, 12, 0));

        assert_eq!(
            slots,
            vec![
                AvailableSlot { start: on(3, 9, 0), end: on(3, 10, 0) },
                AvailableSlot { start: on(3, 11, 0), end: on(3, 12, 0) },
            ]
        );
    }

    #[test]
    fn gap_too_short_is_skipped() {
        let events = vec![busy(at(9, 0), at(10, 0)), busy(at(10, 30), at(12, 0))];
        let slots = find_available_slots(&events, 60, at(9, 0), at(12, 0));
        // The 30-minute gap cannot hold an hour and the tail is empty.
        assert!(slots.is_empty());
    }

    #[test]
    fn evening_gap_is_clipped_to_closing_hour() {
        let events = vec![busy(at(16, 0), at(17, 0))];
        let slots = find_available_slots(&events, 60, at(16, 0), at(21, 0));
        assert_eq!(slots, vec![AvailableSlot { start: at(17, 0), end: at(18, 0) }]);
    }

    #[test]
    fn all_day_event_does_not_block_slots() {
        let mut conference = busy(at(0, 0), at(23, 0));
        conference.is_all_day = true;
        let slots = find_available_slots(&[conference], 60, at(9, 0), at(11, 0));
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, at(9, 0));
    }

    #[test]
    fn returns_at_most_ten_slots_in_order() {
        // 15-minute meetings every half hour leave a dozen 15-minute gaps.
        let events: Vec<CalendarEvent> = (0..12)
            .map(|i| {
                let start = at(9, 0) + Duration::minutes(i * 30);
                busy(start, start + Duration::minutes(15))
            })
            .collect();

        let slots = find_available_slots(&events, 15, at(9, 0), at(16, 0));
        assert_eq!(slots.len(), MAX_SLOTS);
        for pair in slots.windows(2) {
            assert!(pair[0].start < pair[1].start);
        }
    }

    #[test]
    fn overlapping_events_do_not_rewind_the_cursor() {
        // Second event ends before the first; the cursor must stay at 12:00.
        let events = vec![busy(at(9, 0), at(12, 0)), busy(at(10, 0), at(11, 0))];
        let slots = find_available_slots(&events, 60, at(9, 0), at(13, 0));
        assert_eq!(slots, vec![AvailableSlot { start: at(12, 0), end: at(13, 0) }]);
    }
}

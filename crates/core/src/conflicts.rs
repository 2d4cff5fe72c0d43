//! Conflict detection over canonical events.
//!
//! Events are sorted by start time, then each event scans forward only
//! while later events can still overlap it. On typical calendars with few
//! overlaps this stays near O(n log n) instead of the naive O(n²) pairwise
//! scan.

use jobtrail_domain::{CalendarEvent, ConflictGroup, ConflictSeverity};

const HIGH_PRIORITY_KEYWORD: &str = "interview";
const MEDIUM_PRIORITY_KEYWORDS: [&str; 4] = ["meeting", "call", "presentation", "review"];
const SKIPPABLE_KEYWORDS: [&str; 4] = ["optional", "fyi", "update", "sync"];

/// Minutes within which two events are close enough to suggest scheduling
/// them back-to-back.
const BACK_TO_BACK_WINDOW_MINUTES: i64 = 30;

/// Find overlapping-time groups among `events`.
///
/// All-day events are excluded entirely: they never conflict and never
/// appear in any group. Each group pairs a base event with every later
/// event overlapping it, plus a severity classification and resolution
/// suggestions.
pub fn detect_conflicts(events: &[CalendarEvent]) -> Vec<ConflictGroup> {
    let mut timed: Vec<&CalendarEvent> = events.iter().filter(|e| !e.is_all_day).collect();
    timed.sort_by_key(|e| e.start_time);

    let mut groups = Vec::new();

    for (i, base) in timed.iter().enumerate() {
        let mut conflicting: Vec<CalendarEvent> = Vec::new();

        for other in &timed[i + 1..] {
            // Sorted by start: once a later event starts at or after this
            // one ends, nothing further can overlap it.
            if other.start_time >= base.end_time {
                break;
            }
            if base.overlaps(other) {
                conflicting.push((*other).clone());
            }
        }

        if conflicting.is_empty() {
            continue;
        }

        let severity = classify_severity(base, &conflicting);
        let suggestions = suggest_resolutions(base, &conflicting);
        groups.push(ConflictGroup {
            base_event: (*base).clone(),
            conflicting_events: conflicting,
            severity,
            suggestions,
        });
    }

    groups
}

/// Severity classification; the first matching rule wins.
fn classify_severity(base: &CalendarEvent, conflicts: &[CalendarEvent]) -> ConflictSeverity {
    if conflicts.len() > 2 {
        return ConflictSeverity::High;
    }

    let any_title = |pred: &dyn Fn(&str) -> bool| {
        std::iter::once(base)
            .chain(conflicts.iter())
            .any(|e| pred(&e.title.to_lowercase()))
    };

    if any_title(&|t| t.contains(HIGH_PRIORITY_KEYWORD)) {
        return ConflictSeverity::High;
    }
    if conflicts.len() == 2 {
        return ConflictSeverity::Medium;
    }
    if any_title(&|t| MEDIUM_PRIORITY_KEYWORDS.iter().any(|k| t.contains(k))) {
        return ConflictSeverity::Medium;
    }

    ConflictSeverity::Low
}

/// Human-readable resolution hints for one conflict group.
///
/// Each heuristic is independent; all applicable ones are included, in a
/// fixed order.
pub fn suggest_resolutions(base: &CalendarEvent, conflicts: &[CalendarEvent]) -> Vec<String> {
    let mut suggestions = Vec::new();
    let involved = || std::iter::once(base).chain(conflicts.iter());

    // (a) The shortest event is the cheapest to move.
    if let Some(shortest) = involved().min_by_key(|e| e.duration_minutes()) {
        suggestions.push(format!(
            "Consider rescheduling '{}' ({} min) to a free slot",
            shortest.title,
            shortest.duration_minutes()
        ));
    }

    // (b) A single near-miss pair can often be made back-to-back.
    if let [only] = conflicts {
        let gap = (only.start_time - base.start_time).num_minutes().abs();
        if gap > 0 && gap <= BACK_TO_BACK_WINDOW_MINUTES {
            suggestions.push(format!(
                "'{}' and '{}' start {} minutes apart; consider scheduling them back-to-back",
                base.title, only.title, gap
            ));
        }
    }

    // (c) Different venues make one of them a candidate for remote attendance.
    let mut locations: Vec<&str> = involved()
        .filter_map(|e| e.location.as_deref())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    locations.sort_unstable();
    locations.dedup();
    if locations.len() >= 2 {
        suggestions
            .push("Events are in different locations; consider attending one virtually".to_string());
    }

    // (d) Low-stakes events can be delegated or skipped.
    if let Some(skippable) = involved().find(|e| {
        let title = e.title.to_lowercase();
        SKIPPABLE_KEYWORDS.iter().any(|k| title.contains(k))
    }) {
        suggestions.push(format!(
            "'{}' looks optional; consider delegating it or skipping it",
            skippable.title
        ));
    }

    suggestions
}

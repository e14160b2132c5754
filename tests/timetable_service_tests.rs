use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::json;
use timetable::{
    CellKey, ClassEntry, Day, EntryDraft, EntryPatch, FixedClock, MemoryTimetableStore, Period,
    Recurrence, RepeatUntil, TimetableService, TimetableStore,
};

fn d(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn at(date: NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, 0, 0).unwrap()
}

// Wednesday of the week starting Monday 2025-01-06
fn service() -> TimetableService<MemoryTimetableStore, FixedClock> {
    TimetableService::with_clock(
        MemoryTimetableStore::new(),
        FixedClock::new(at(d(2025, 1, 8), 10)),
    )
}

fn stored(id: i64, day: Day, period: Period, created_at: NaiveDateTime) -> ClassEntry {
    let draft = EntryDraft::new(format!("class {id}"), day, period);
    ClassEntry::from_draft(id, draft, created_at, created_at)
}

fn cell_keys(
    service: &TimetableService<MemoryTimetableStore, FixedClock>,
    week: NaiveDate,
) -> Vec<String> {
    service
        .week_view(Some(week))
        .unwrap()
        .cells
        .keys()
        .map(ToString::to_string)
        .collect()
}

#[test]
fn add_to_empty_cell_stores_exactly_one_entry() {
    let service = service();
    let id = service
        .add_entry(
            EntryDraft::new("Math", Day::Mon, Period::Numbered(1))
                .room("101")
                .teacher("Tanaka"),
            None,
        )
        .unwrap();

    let occupants = service.find_all_by_cell(Day::Mon, Period::Numbered(1)).unwrap();
    assert_eq!(occupants.len(), 1);
    assert_eq!(occupants[0].id, id);
    assert_eq!(occupants[0].room, "101");
    assert_eq!(occupants[0].created_at, at(d(2025, 1, 8), 10));
    assert_eq!(occupants[0].updated_at, occupants[0].created_at);
}

#[test]
fn adding_to_occupied_cell_replaces_previous_occupant() {
    let service = service();
    let first = service
        .add_entry(EntryDraft::new("Math", Day::Tue, Period::Numbered(2)), None)
        .unwrap();
    let other_cell = service
        .add_entry(EntryDraft::new("Art", Day::Tue, Period::Numbered(3)), None)
        .unwrap();
    let second = service
        .add_entry(EntryDraft::new("English", Day::Tue, Period::Numbered(2)), None)
        .unwrap();

    assert!(second > first);
    let occupants = service.find_all_by_cell(Day::Tue, Period::Numbered(2)).unwrap();
    assert_eq!(occupants.len(), 1);
    assert_eq!(occupants[0].name, "English");
    assert!(service.get_entry(first).unwrap().is_none());
    assert!(service.get_entry(other_cell).unwrap().is_some());

    let found = service.find_by_cell(Day::Tue, Period::Numbered(2)).unwrap().unwrap();
    assert_eq!(found.id, second);
}

#[test]
fn add_with_week_start_anchors_creation_to_that_week() {
    let service = service();
    // viewing the week of 2025-01-20, placing a Thursday class
    let id = service
        .add_entry(
            EntryDraft::new("Lab", Day::Thu, Period::Numbered(4)),
            Some(d(2025, 1, 22)),
        )
        .unwrap();

    let entry = service.get_entry(id).unwrap().unwrap();
    assert_eq!(entry.created_at.date(), d(2025, 1, 23));
    assert_eq!(entry.updated_at, at(d(2025, 1, 8), 10));

    assert_eq!(cell_keys(&service, d(2025, 1, 20)), vec!["thu-4"]);
    assert!(service.week_view(None).unwrap().is_empty());
}

#[test]
fn week_view_defaults_to_clock_week_and_normalizes_target() {
    let service = service();
    service
        .add_entry(EntryDraft::new("Math", Day::Fri, Period::Lunch), None)
        .unwrap();

    let current = service.week_view(None).unwrap();
    assert_eq!(current.week_start, d(2025, 1, 6));
    assert_eq!(current.len(), 1);
    assert_eq!(current.get(Day::Fri, Period::Lunch).unwrap().name, "Math");

    let from_sunday = service.week_view(Some(d(2025, 1, 12))).unwrap();
    assert_eq!(from_sunday.week_start, d(2025, 1, 6));
    assert_eq!(from_sunday, current);
}

#[test]
fn one_off_entry_visible_only_in_its_week() {
    let service = service();
    service
        .add_entry(EntryDraft::new("Exam", Day::Wed, Period::Numbered(2)), None)
        .unwrap();

    assert_eq!(cell_keys(&service, d(2025, 1, 6)), vec!["wed-2"]);
    assert!(cell_keys(&service, d(2025, 1, 13)).is_empty());
    assert!(cell_keys(&service, d(2024, 12, 30)).is_empty());
}

#[test]
fn weekly_count_entry_spans_three_weeks() {
    let service = service();
    service
        .add_entry(
            EntryDraft::new("Seminar", Day::Mon, Period::Numbered(5))
                .with_recurrence(Recurrence::Weekly(RepeatUntil::Count(3))),
            None,
        )
        .unwrap();

    for week in [d(2025, 1, 6), d(2025, 1, 13), d(2025, 1, 20)] {
        assert_eq!(cell_keys(&service, week), vec!["mon-5"], "week {week}");
    }
    assert!(cell_keys(&service, d(2025, 1, 27)).is_empty());
}

#[test]
fn weekly_until_date_stops_after_end_week() {
    let service = service();
    service
        .add_entry(
            EntryDraft::new("Club", Day::Fri, Period::Numbered(6))
                .with_recurrence(Recurrence::Weekly(RepeatUntil::Date(d(2025, 2, 3)))),
            None,
        )
        .unwrap();

    assert_eq!(cell_keys(&service, d(2025, 2, 3)), vec!["fri-6"]);
    assert!(cell_keys(&service, d(2025, 2, 10)).is_empty());
}

#[test]
fn later_add_wins_over_once_entry_in_every_week() {
    let service = service();
    service.clock().set(at(d(2025, 1, 6), 9));
    let once = service
        .add_entry(EntryDraft::new("Intro", Day::Mon, Period::Numbered(1)), None)
        .unwrap();
    let weekly = service
        .add_entry(
            EntryDraft::new("Math", Day::Mon, Period::Numbered(1))
                .with_recurrence(Recurrence::Weekly(RepeatUntil::Never)),
            None,
        )
        .unwrap();
    assert_eq!((once, weekly), (1, 2));

    for week in [d(2025, 1, 6), d(2025, 2, 3)] {
        let view = service.week_view(Some(week)).unwrap();
        assert_eq!(view.len(), 1);
        let cell = view.get(Day::Mon, Period::Numbered(1)).unwrap();
        assert_eq!(cell.id, 2);
        assert_eq!(cell_keys(&service, week), vec!["mon-1"]);
    }
}

#[test]
fn week_view_picks_largest_id_among_visible_duplicates() {
    let service = service();
    let monday = at(d(2025, 1, 6), 8);
    service
        .store()
        .bulk_add_entries(vec![
            stored(3, Day::Mon, Period::Numbered(1), monday),
            stored(8, Day::Mon, Period::Numbered(1), monday),
            stored(5, Day::Mon, Period::Numbered(1), monday),
        ])
        .unwrap();

    let view = service.week_view(None).unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view.get(Day::Mon, Period::Numbered(1)).unwrap().id, 8);
}

#[test]
fn cleanup_keeps_largest_id_per_cell() {
    let service = service();
    let monday = at(d(2025, 1, 6), 8);
    service
        .store()
        .bulk_add_entries(vec![
            stored(5, Day::Mon, Period::Numbered(1), monday),
            stored(7, Day::Tue, Period::Numbered(2), monday),
            stored(9, Day::Mon, Period::Numbered(1), monday),
        ])
        .unwrap();

    assert_eq!(service.cleanup_duplicates().unwrap(), 1);
    let ids: Vec<i64> = service.list_all().unwrap().iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![7, 9]);
    assert_eq!(service.cleanup_duplicates().unwrap(), 0);
}

#[test]
fn cleanup_ignores_display_week() {
    let service = service();
    service
        .store()
        .bulk_add_entries(vec![
            stored(1, Day::Thu, Period::Lunch, at(d(2025, 1, 6), 8)),
            stored(2, Day::Thu, Period::Lunch, at(d(2025, 3, 3), 8)),
            stored(3, Day::Thu, Period::Lunch, at(d(2024, 11, 4), 8)),
        ])
        .unwrap();

    assert_eq!(service.cleanup_duplicates().unwrap(), 2);
    let remaining = service.find_all_by_cell(Day::Thu, Period::Lunch).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, 3);
}

#[test]
fn update_merges_fields_and_refreshes_updated_at_only() {
    let service = service();
    let id = service
        .add_entry(EntryDraft::new("Math", Day::Mon, Period::Numbered(1)), None)
        .unwrap();
    let before = service.get_entry(id).unwrap().unwrap();

    service.clock().advance(Duration::hours(26));
    let patch = EntryPatch {
        name: Some("Algebra".into()),
        teacher: Some("Sato".into()),
        ..EntryPatch::default()
    };
    assert_eq!(service.update_entry(id, &patch).unwrap(), 1);

    let after = service.get_entry(id).unwrap().unwrap();
    assert_eq!(after.name, "Algebra");
    assert_eq!(after.teacher, "Sato");
    assert_eq!(after.room, before.room);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.updated_at, at(d(2025, 1, 9), 12));
}

#[test]
fn update_of_unknown_id_reports_zero_rows() {
    let service = service();
    let patch = EntryPatch {
        name: Some("Ghost".into()),
        ..EntryPatch::default()
    };
    assert_eq!(service.update_entry(999, &patch).unwrap(), 0);
    assert!(service.list_all().unwrap().is_empty());
}

#[test]
fn delete_is_idempotent() {
    let service = service();
    let id = service
        .add_entry(EntryDraft::new("Math", Day::Mon, Period::Numbered(1)), None)
        .unwrap();
    service.delete_entry(id).unwrap();
    service.delete_entry(id).unwrap();
    assert!(service.find_by_cell(Day::Mon, Period::Numbered(1)).unwrap().is_none());
}

#[test]
fn ids_are_not_reused_after_delete() {
    let service = service();
    let first = service
        .add_entry(EntryDraft::new("Math", Day::Mon, Period::Numbered(1)), None)
        .unwrap();
    service.delete_entry(first).unwrap();
    let second = service
        .add_entry(EntryDraft::new("Math", Day::Mon, Period::Numbered(1)), None)
        .unwrap();
    assert!(second > first);
}

#[test]
fn settings_are_upserted_by_key() {
    let service = service();
    assert!(service.setting("theme").unwrap().is_none());

    service.put_setting("theme", "dark").unwrap();
    service.put_setting("periods", json!(6)).unwrap();
    service.put_setting("theme", "light").unwrap();

    let theme = service.setting("theme").unwrap().unwrap();
    assert_eq!(theme.value, json!("light"));
    assert_eq!(service.store().list_settings().unwrap().len(), 2);
}

#[test]
fn week_view_serializes_as_cell_key_map() {
    let service = service();
    service
        .add_entry(
            EntryDraft::new("Math", Day::Mon, Period::Numbered(1))
                .room("101")
                .color("blue"),
            None,
        )
        .unwrap();
    service
        .add_entry(EntryDraft::new("Homeroom", Day::Wed, Period::Lunch), None)
        .unwrap();

    let value = serde_json::to_value(service.week_view(None).unwrap()).unwrap();
    assert_eq!(value["week_start"], json!("2025-01-06"));
    assert_eq!(
        value["cells"]["mon-1"],
        json!({
            "id": 1,
            "name": "Math",
            "room": "101",
            "color": "blue",
            "teacher": "",
            "note": ""
        })
    );
    assert_eq!(value["cells"]["wed-lunch"]["name"], json!("Homeroom"));
    assert_eq!("wed-lunch".parse::<CellKey>().unwrap(), CellKey::new(Day::Wed, Period::Lunch));
}

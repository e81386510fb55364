use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use uuid::Uuid;

use appointment_cell::{
    Appointment, AppointmentBookingService, AppointmentError, AppointmentQuery, AppointmentStatus,
    BookAppointmentRequest, ConflictCheckQuery, ConflictScope, InMemoryAppointmentRepository,
    SchedulingConsistencyService, SlotService, UpdateStatusRequest,
};
use availability_cell::{AvailabilityService, BreakInterval, InMemoryAvailabilityRepository, WindowRequest, WindowSchedule};
use cache_cell::ScheduleCache;
use shared_config::AppConfig;
use shared_models::DateRange;
use shared_utils::test_utils::{at, hm, TestConfig};

struct Harness {
    booking: Arc<AppointmentBookingService>,
    slots: SlotService,
    consistency: SchedulingConsistencyService,
    availability: Arc<AvailabilityService>,
    cache: Arc<ScheduleCache>,
}

fn harness_with(config: AppConfig) -> Harness {
    let cache = Arc::new(ScheduleCache::in_memory(&config));
    let repository = Arc::new(InMemoryAppointmentRepository::new());
    let availability = Arc::new(AvailabilityService::new(
        Arc::new(InMemoryAvailabilityRepository::new()),
        cache.clone(),
        &config,
    ));

    Harness {
        booking: Arc::new(AppointmentBookingService::new(repository.clone(), cache.clone(), &config)),
        slots: SlotService::new(availability.clone(), repository.clone(), cache.clone(), &config),
        consistency: SchedulingConsistencyService::new(repository, &config),
        availability,
        cache,
    }
}

fn harness() -> Harness {
    harness_with(TestConfig::default().to_app_config())
}

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
}

fn request(provider_id: Uuid, subject_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> BookAppointmentRequest {
    BookAppointmentRequest {
        provider_id,
        subject_id,
        start_time: start,
        end_time: end,
        kind: Default::default(),
        notes: None,
    }
}

fn provider_query(provider_id: Uuid) -> AppointmentQuery {
    AppointmentQuery {
        provider_id: Some(provider_id),
        subject_id: None,
        from: monday(),
        to: monday(),
        status: None,
        limit: None,
        offset: None,
    }
}

async fn add_morning_window(harness: &Harness, provider_id: Uuid) {
    harness
        .availability
        .create_window(
            provider_id,
            WindowRequest {
                applies_to: WindowSchedule::Weekly { weekday: Weekday::Mon },
                start_time: hm(9, 0),
                end_time: hm(12, 0),
                slot_duration_minutes: 30,
                breaks: vec![BreakInterval {
                    start_time: hm(10, 0),
                    end_time: hm(10, 15),
                }],
            },
        )
        .await
        .unwrap();
}

async fn advance(harness: &Harness, appointment: &Appointment, status: AppointmentStatus) -> Appointment {
    harness
        .booking
        .update_status(
            appointment.id,
            UpdateStatusRequest {
                status,
                expected_version: appointment.version,
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_overlapping_booking_is_rejected_with_conflicting_id() {
    let h = harness();
    let provider = Uuid::new_v4();

    let first = h
        .booking
        .book_appointment(request(provider, Uuid::new_v4(), at(monday(), 9, 0), at(monday(), 9, 30)))
        .await
        .unwrap();
    assert_eq!(first.status, AppointmentStatus::Requested);
    assert_eq!(first.version, 1);

    let second = h
        .booking
        .book_appointment(request(provider, Uuid::new_v4(), at(monday(), 9, 15), at(monday(), 9, 45)))
        .await;

    assert_matches!(second, Err(AppointmentError::ScheduleConflict(ids)) if ids == vec![first.id]);
}

#[tokio::test]
async fn test_back_to_back_bookings_are_allowed() {
    let h = harness();
    let provider = Uuid::new_v4();

    let slots = [
        (at(monday(), 9, 0), at(monday(), 9, 30)),
        (at(monday(), 9, 30), at(monday(), 10, 0)),
    ];
    for (start, end) in slots {
        let result = h
            .booking
            .book_appointment(request(provider, Uuid::new_v4(), start, end))
            .await;
        tokio_test::assert_ok!(result);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bookings_for_same_slot_admit_exactly_one() {
    let h = harness();
    let provider = Uuid::new_v4();

    let attempts: Vec<_> = (0..2)
        .map(|_| {
            let booking = h.booking.clone();
            tokio::spawn(async move {
                booking
                    .book_appointment(request(provider, Uuid::new_v4(), at(monday(), 9, 0), at(monday(), 9, 30)))
                    .await
            })
        })
        .collect();

    let results: Vec<Result<Appointment, AppointmentError>> = futures::future::join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let booked: Vec<&Appointment> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(booked.len(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppointmentError::ScheduleConflict(ids)) if ids == &vec![booked[0].id])));
}

#[tokio::test]
async fn test_subject_cannot_be_double_booked_across_providers() {
    let h = harness();
    let subject = Uuid::new_v4();

    let first = h
        .booking
        .book_appointment(request(Uuid::new_v4(), subject, at(monday(), 14, 0), at(monday(), 15, 0)))
        .await
        .unwrap();

    let preview = h
        .slots
        .check_conflicts(&ConflictCheckQuery {
            provider_id: Uuid::new_v4(),
            subject_id: Some(subject),
            start_time: at(monday(), 14, 30),
            end_time: at(monday(), 15, 30),
        })
        .await
        .unwrap();
    assert!(preview.has_conflict);
    assert_eq!(preview.conflicts[0].scope, ConflictScope::Subject);

    let result = h
        .booking
        .book_appointment(request(Uuid::new_v4(), subject, at(monday(), 14, 30), at(monday(), 15, 30)))
        .await;
    assert_matches!(result, Err(AppointmentError::ScheduleConflict(ids)) if ids == vec![first.id]);
}

#[tokio::test]
async fn test_cancelled_booking_frees_its_slot() {
    let h = harness();
    let provider = Uuid::new_v4();
    add_morning_window(&h, provider).await;

    let before: Vec<_> = h.slots.list_slots(provider, monday()).await.unwrap();
    assert_eq!(before.len(), 5);

    let booked = h
        .booking
        .book_appointment(request(provider, Uuid::new_v4(), at(monday(), 9, 0), at(monday(), 9, 30)))
        .await
        .unwrap();

    let during = h.slots.list_slots(provider, monday()).await.unwrap();
    assert_eq!(during.len(), 4);
    assert!(during.iter().all(|slot| slot.start_time != at(monday(), 9, 0)));

    let cancelled = advance(&h, &booked, AppointmentStatus::Cancelled).await;
    assert_eq!(cancelled.version, 2);

    let after = h.slots.list_slots(provider, monday()).await.unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_cached_listing_reflects_subsequent_booking() {
    let h = harness();
    let provider = Uuid::new_v4();

    let empty = h.booking.list_appointments(&provider_query(provider)).await.unwrap();
    assert!(empty.appointments.is_empty());
    // Second read is a cache hit.
    h.booking.list_appointments(&provider_query(provider)).await.unwrap();
    assert_eq!(h.cache.stats().hits, 1);

    let booked = h
        .booking
        .book_appointment(request(provider, Uuid::new_v4(), at(monday(), 11, 0), at(monday(), 11, 30)))
        .await
        .unwrap();

    let page = h.booking.list_appointments(&provider_query(provider)).await.unwrap();
    assert_eq!(page.appointments, vec![booked]);
}

#[tokio::test]
async fn test_completed_appointment_rejects_every_transition() {
    let h = harness();
    let booked = h
        .booking
        .book_appointment(request(Uuid::new_v4(), Uuid::new_v4(), at(monday(), 9, 0), at(monday(), 9, 30)))
        .await
        .unwrap();

    let confirmed = advance(&h, &booked, AppointmentStatus::Confirmed).await;
    let checked_in = advance(&h, &confirmed, AppointmentStatus::CheckedIn).await;
    let completed = advance(&h, &checked_in, AppointmentStatus::Completed).await;
    assert_eq!(completed.version, 4);

    for status in [AppointmentStatus::Cancelled, AppointmentStatus::Confirmed, AppointmentStatus::Requested] {
        let result = h
            .booking
            .update_status(
                completed.id,
                UpdateStatusRequest {
                    status,
                    expected_version: completed.version,
                },
            )
            .await;
        assert_matches!(result, Err(AppointmentError::InvalidStatusTransition { .. }));
    }

    let transitions = h.booking.get_valid_transitions(completed.id).await.unwrap();
    assert!(transitions.valid_transitions.is_empty());
}

#[tokio::test]
async fn test_completed_appointment_with_stale_version_is_still_invalid_transition() {
    let h = harness();
    let booked = h
        .booking
        .book_appointment(request(Uuid::new_v4(), Uuid::new_v4(), at(monday(), 9, 0), at(monday(), 9, 30)))
        .await
        .unwrap();

    let confirmed = advance(&h, &booked, AppointmentStatus::Confirmed).await;
    let checked_in = advance(&h, &confirmed, AppointmentStatus::CheckedIn).await;
    let completed = advance(&h, &checked_in, AppointmentStatus::Completed).await;
    assert_eq!(completed.version, 4);

    let result = h
        .booking
        .update_status(
            completed.id,
            UpdateStatusRequest {
                status: AppointmentStatus::Cancelled,
                expected_version: 1,
            },
        )
        .await;

    assert_matches!(
        result,
        Err(AppointmentError::InvalidStatusTransition {
            from: AppointmentStatus::Completed,
            to: AppointmentStatus::Cancelled
        })
    );
}

#[tokio::test]
async fn test_listing_at_end_of_calendar_is_a_validation_error() {
    let h = harness();
    let provider = Uuid::new_v4();
    let query = AppointmentQuery {
        from: NaiveDate::MAX,
        to: NaiveDate::MAX,
        ..provider_query(provider)
    };

    let result = h.booking.list_appointments(&query).await;
    assert_matches!(result, Err(AppointmentError::Validation(_)));

    let slots = h.slots.list_slots(provider, NaiveDate::MAX).await.unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn test_stale_version_is_rejected() {
    let h = harness();
    let booked = h
        .booking
        .book_appointment(request(Uuid::new_v4(), Uuid::new_v4(), at(monday(), 9, 0), at(monday(), 9, 30)))
        .await
        .unwrap();
    advance(&h, &booked, AppointmentStatus::Confirmed).await;

    let result = h
        .booking
        .update_status(
            booked.id,
            UpdateStatusRequest {
                status: AppointmentStatus::Cancelled,
                expected_version: 1,
            },
        )
        .await;

    assert_matches!(result, Err(AppointmentError::VersionConflict { expected: 1, current: 2 }));
}

#[tokio::test]
async fn test_unknown_appointment_is_not_found() {
    let h = harness();
    let missing = Uuid::new_v4();

    assert_matches!(h.booking.get_appointment(missing).await, Err(AppointmentError::NotFound(id)) if id == missing);
}

#[tokio::test]
async fn test_auto_confirm_creates_confirmed_bookings() {
    let config = AppConfig {
        auto_confirm_bookings: true,
        ..TestConfig::default().to_app_config()
    };
    let h = harness_with(config);

    let booked = h
        .booking
        .book_appointment(request(Uuid::new_v4(), Uuid::new_v4(), at(monday(), 9, 0), at(monday(), 9, 30)))
        .await
        .unwrap();

    assert_eq!(booked.status, AppointmentStatus::Confirmed);
}

#[tokio::test]
async fn test_listing_pages_by_start_time() {
    let h = harness();
    let provider = Uuid::new_v4();

    let mut booked = Vec::new();
    for hour in [13, 9, 11] {
        booked.push(
            h.booking
                .book_appointment(request(provider, Uuid::new_v4(), at(monday(), hour, 0), at(monday(), hour, 30)))
                .await
                .unwrap(),
        );
    }

    let first_page = h
        .booking
        .list_appointments(&AppointmentQuery {
            limit: Some(2),
            ..provider_query(provider)
        })
        .await
        .unwrap();
    assert!(first_page.has_more);
    assert_eq!(
        first_page.appointments.iter().map(|a| a.start_time).collect::<Vec<_>>(),
        vec![at(monday(), 9, 0), at(monday(), 11, 0)]
    );

    let second_page = h
        .booking
        .list_appointments(&AppointmentQuery {
            limit: Some(2),
            offset: Some(2),
            ..provider_query(provider)
        })
        .await
        .unwrap();
    assert!(!second_page.has_more);
    assert_eq!(second_page.appointments[0].start_time, at(monday(), 13, 0));
}

#[tokio::test]
async fn test_listing_requires_exactly_one_owner() {
    let h = harness();
    let query = AppointmentQuery {
        subject_id: Some(Uuid::new_v4()),
        ..provider_query(Uuid::new_v4())
    };

    assert_matches!(h.booking.list_appointments(&query).await, Err(AppointmentError::Validation(_)));
}

#[tokio::test]
async fn test_consistency_report_for_clean_schedule() {
    let h = harness();
    let provider = Uuid::new_v4();
    h.booking
        .book_appointment(request(provider, Uuid::new_v4(), at(monday(), 9, 0), at(monday(), 9, 30)))
        .await
        .unwrap();

    let report = h
        .consistency
        .check_provider(provider, DateRange::single(monday()))
        .await
        .unwrap();

    assert!(report.consistent);
    assert_eq!(report.active_appointments, 1);
}

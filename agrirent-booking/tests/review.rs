use std::sync::Arc;

use agrirent_booking::models::{Booking, BookingStatus};
use agrirent_booking::pricing::{compute_quote, FeeSchedule};
use agrirent_booking::repository::{BookingRepository, Transition, TransitionOutcome};
use agrirent_booking::ReviewService;
use agrirent_catalog::{Equipment, EquipmentRepository};
use agrirent_core::{BookingError, KycStatus, Principal, Role};
use agrirent_store::memory::{MemoryBookings, MemoryEquipment, MemoryReviews};
use chrono::{TimeZone, Utc};
use uuid::Uuid;

async fn completed_booking(
    bookings: &MemoryBookings,
    equipment_id: Uuid,
    renter: Uuid,
    owner: Uuid,
) -> Booking {
    let start = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let quote = compute_quote(start, end, 100, &FeeSchedule::default()).unwrap();
    let booking = Booking::new(
        equipment_id,
        renter,
        owner,
        start,
        end,
        quote,
        "123456".to_string(),
    );
    bookings.insert(&booking).await.unwrap();
    bookings
        .transition(
            booking.id,
            BookingStatus::Created,
            Transition::Activate { at: Utc::now() },
        )
        .await
        .unwrap();
    match bookings
        .transition(
            booking.id,
            BookingStatus::InProgress,
            Transition::Complete { at: Utc::now() },
        )
        .await
        .unwrap()
    {
        TransitionOutcome::Applied(b) => b,
        other => panic!("expected completed booking, got {:?}", other),
    }
}

#[tokio::test]
async fn test_review_gate_and_aggregate() {
    let bookings = Arc::new(MemoryBookings::new());
    let equipment = Arc::new(MemoryEquipment::new());
    let reviews = Arc::new(MemoryReviews::new());

    let owner = Uuid::new_v4();
    let renter = Principal::new(Uuid::new_v4(), Role::Member, KycStatus::Verified);
    let item = Equipment::new(owner, "Seeder".to_string(), 80);
    let equipment_id = item.id;
    equipment.seed(item);

    let booking = completed_booking(&bookings, equipment_id, renter.user_id, owner).await;

    let service = ReviewService::new(reviews, bookings, equipment.clone());

    // Stranger and out-of-range ratings bounce.
    let stranger = Principal::new(Uuid::new_v4(), Role::Member, KycStatus::Verified);
    assert!(matches!(
        service.submit(&stranger, booking.id, 4, None).await.unwrap_err(),
        BookingError::Forbidden(_)
    ));
    assert!(matches!(
        service.submit(&renter, booking.id, 0, None).await.unwrap_err(),
        BookingError::Validation(_)
    ));

    let review = service
        .submit(&renter, booking.id, 4, Some("solid machine".to_string()))
        .await
        .unwrap();
    assert_eq!(review.rating, 4);

    let item = equipment.get(equipment_id).await.unwrap().unwrap();
    assert_eq!(item.rating, 4.0);
    assert_eq!(item.review_count, 1);

    // One review per booking.
    assert!(matches!(
        service.submit(&renter, booking.id, 5, None).await.unwrap_err(),
        BookingError::Validation(_)
    ));
}

#[tokio::test]
async fn test_review_requires_completed_booking() {
    let bookings = Arc::new(MemoryBookings::new());
    let equipment = Arc::new(MemoryEquipment::new());
    let reviews = Arc::new(MemoryReviews::new());

    let owner = Uuid::new_v4();
    let renter = Principal::new(Uuid::new_v4(), Role::Member, KycStatus::Verified);
    let item = Equipment::new(owner, "Baler".to_string(), 120);
    let equipment_id = item.id;
    equipment.seed(item);

    let start = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let quote = compute_quote(start, end, 120, &FeeSchedule::default()).unwrap();
    let booking = Booking::new(
        equipment_id,
        renter.user_id,
        owner,
        start,
        end,
        quote,
        "654321".to_string(),
    );
    bookings.insert(&booking).await.unwrap();

    let service = ReviewService::new(reviews, bookings, equipment);
    assert!(matches!(
        service.submit(&renter, booking.id, 5, None).await.unwrap_err(),
        BookingError::InvalidState { .. }
    ));
}

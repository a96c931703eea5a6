use std::sync::Arc;

use agrirent_api::middleware::auth::Claims;
use agrirent_api::state::{AppState, AuthConfig};
use agrirent_api::app;
use agrirent_booking::{BookingService, FeeSchedule, PhotoPolicy, ReviewService};
use agrirent_core::{KycStatus, MockImageStore, Role};
use agrirent_store::{ChannelNotifier, MemoryBookings, MemoryEquipment, MemoryReviews};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "test-secret";

fn test_app() -> Router {
    let bookings = Arc::new(MemoryBookings::new());
    let equipment = Arc::new(MemoryEquipment::new());
    let reviews = Arc::new(MemoryReviews::new());
    let (notifier, _rx) = ChannelNotifier::new(32);

    let booking_service = BookingService::new(
        bookings.clone(),
        equipment.clone(),
        Arc::new(notifier),
        Arc::new(MockImageStore),
        FeeSchedule::default(),
        PhotoPolicy::default(),
    );
    let review_service = ReviewService::new(reviews, bookings, equipment.clone());

    app(AppState {
        bookings: Arc::new(booking_service),
        reviews: Arc::new(review_service),
        equipment,
        auth: AuthConfig {
            secret: SECRET.to_string(),
        },
    })
}

fn bearer(user_id: Uuid, role: Role, kyc_status: KycStatus) -> String {
    let claims = Claims {
        sub: user_id,
        role,
        kyc_status,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();
    format!("Bearer {}", token)
}

async fn send(app: &Router, method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&value).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_requests_without_token_are_unauthorized() {
    let app = test_app();
    let (status, _) = send(&app, Method::GET, "/v1/bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unverified_renter_cannot_book() {
    let app = test_app();
    let owner = Uuid::new_v4();
    let owner_auth = bearer(owner, Role::Member, KycStatus::Verified);

    let (status, item) = send(
        &app,
        Method::POST,
        "/v1/equipment",
        Some(&owner_auth),
        Some(json!({ "name": "Rotavator", "price_per_hour": 90 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let equipment_id = item["id"].as_str().unwrap().to_string();

    let renter_auth = bearer(Uuid::new_v4(), Role::Member, KycStatus::Pending);
    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/bookings",
        Some(&renter_auth),
        Some(json!({
            "equipment_id": equipment_id,
            "start": "2026-09-01T08:00:00Z",
            "end": "2026-09-01T11:30:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap().contains("KYC"));

    // The equipment must still be bookable.
    let (status, listing) = send(&app, Method::GET, "/v1/equipment", Some(&renter_auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_full_rental_flow() {
    let app = test_app();
    let owner = Uuid::new_v4();
    let renter = Uuid::new_v4();
    let owner_auth = bearer(owner, Role::Member, KycStatus::Verified);
    let renter_auth = bearer(renter, Role::Member, KycStatus::Verified);

    // Owner lists a tractor at ₹100/hr.
    let (status, item) = send(
        &app,
        Method::POST,
        "/v1/equipment",
        Some(&owner_auth),
        Some(json!({ "name": "Tractor", "price_per_hour": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let equipment_id = item["id"].as_str().unwrap().to_string();

    // Quote preview matches the charge taken at creation.
    let (status, quote) = send(
        &app,
        Method::POST,
        &format!("/v1/equipment/{}/quote", equipment_id),
        Some(&renter_auth),
        Some(json!({
            "start": "2026-09-01T08:00:00Z",
            "end": "2026-09-01T11:30:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["total"], 492);

    // Renter books; response carries the handover code for the renter.
    let (status, booking) = send(
        &app,
        Method::POST,
        "/v1/bookings",
        Some(&renter_auth),
        Some(json!({
            "equipment_id": equipment_id,
            "start": "2026-09-01T08:00:00Z",
            "end": "2026-09-01T11:30:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "CREATED");
    assert_eq!(booking["total_amount"], 492);
    let booking_id = booking["id"].as_str().unwrap().to_string();
    let token = booking["handover_token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 6);

    // The owner's view must not leak the code.
    let (status, owner_view) = send(
        &app,
        Method::GET,
        &format!("/v1/bookings/{}", booking_id),
        Some(&owner_auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(owner_view.get("handover_token").is_none());

    // Second renter bounces off the availability lock.
    let other_auth = bearer(Uuid::new_v4(), Role::Member, KycStatus::Verified);
    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/bookings",
        Some(&other_auth),
        Some(json!({
            "equipment_id": equipment_id,
            "start": "2026-09-01T08:00:00Z",
            "end": "2026-09-01T11:30:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("available"));

    // Renter may not verify their own handover.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/verify-handover", booking_id),
        Some(&renter_auth),
        Some(json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Owner enters a wrong code, then the right one.
    let wrong = if token == "000000" { "000001" } else { "000000" };
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/verify-handover", booking_id),
        Some(&owner_auth),
        Some(json!({ "token": wrong })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, active) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/verify-handover", booking_id),
        Some(&owner_auth),
        Some(json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["status"], "IN_PROGRESS");

    // Replaying the correct code is a state conflict, not a second success.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/verify-handover", booking_id),
        Some(&owner_auth),
        Some(json!({ "token": token })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Cancelling an active rental is rejected.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/cancel", booking_id),
        Some(&renter_auth),
        Some(json!({ "reason": "changed my mind" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Renter uploads proof photos and confirms the return.
    let (status, uploaded) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/photos", booking_id),
        Some(&renter_auth),
        Some(json!({
            "photos": [
                { "data": "aGVsbG8=", "latitude": 18.52, "longitude": 73.85 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(uploaded["uploaded"], 1);

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/confirm-return", booking_id),
        Some(&renter_auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Owner files a damage report, then completes.
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/damage-report", booking_id),
        Some(&owner_auth),
        Some(json!({
            "description": "hydraulic hose torn",
            "severity": "Minor",
            "photos": ["aGVsbG8="]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, done) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/complete", booking_id),
        Some(&owner_auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "COMPLETED");
    assert_eq!(done["payment_status"], "PAID");
    assert_eq!(done["damage_report"]["severity"], "Minor");

    // Equipment is bookable again.
    let (status, listing) = send(&app, Method::GET, "/v1/equipment", Some(&renter_auth), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing.as_array().unwrap().len(), 1);

    // Renter reviews the completed rental; aggregate is written back.
    let (status, review) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/review", booking_id),
        Some(&renter_auth),
        Some(json!({ "rating": 4, "comment": "reliable machine" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(review["rating"], 4);

    let (status, item) = send(
        &app,
        Method::GET,
        &format!("/v1/equipment/{}", equipment_id),
        Some(&renter_auth),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["rating"], 4.0);
    assert_eq!(item["review_count"], 1);
}

#[tokio::test]
async fn test_cancel_before_handover_refunds() {
    let app = test_app();
    let owner = Uuid::new_v4();
    let owner_auth = bearer(owner, Role::Member, KycStatus::Verified);
    let renter_auth = bearer(Uuid::new_v4(), Role::Member, KycStatus::Verified);

    let (_, item) = send(
        &app,
        Method::POST,
        "/v1/equipment",
        Some(&owner_auth),
        Some(json!({ "name": "Power Tiller", "price_per_hour": 70 })),
    )
    .await;
    let equipment_id = item["id"].as_str().unwrap().to_string();

    let (_, booking) = send(
        &app,
        Method::POST,
        "/v1/bookings",
        Some(&renter_auth),
        Some(json!({
            "equipment_id": equipment_id,
            "start": "2026-09-03T06:00:00Z",
            "end": "2026-09-03T09:00:00Z"
        })),
    )
    .await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    let (status, cancelled) = send(
        &app,
        Method::POST,
        &format!("/v1/bookings/{}/cancel", booking_id),
        Some(&renter_auth),
        Some(json!({ "reason": "rain forecast" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED_BY_RENTER");
    assert_eq!(cancelled["payment_status"], "REFUNDED");
    assert_eq!(cancelled["cancellation_reason"], "rain forecast");

    // Lock released: the tiller is listed again.
    let (_, listing) = send(&app, Method::GET, "/v1/equipment", Some(&renter_auth), None).await;
    assert_eq!(listing.as_array().unwrap().len(), 1);
}

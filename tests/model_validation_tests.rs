use campus_events::models::{
    AddBuildingsRequest, CreateEventRequest, EventCategory, NewBuilding, RatingRequest,
    RegisterUserRequest, Role, Status, UpdateEventRequest, User, UserProfile, Visibility,
};
use chrono::{TimeZone, Utc};
use serde_json::json;
use validator::Validate;

// --- Wire formats ---

#[test]
fn test_enums_use_snake_case_on_the_wire() {
    assert_eq!(json!(Role::RsoAdmin), json!("rso_admin"));
    assert_eq!(json!(Status::Pending), json!("pending"));
    assert_eq!(json!(Visibility::Rso), json!("rso"));

    let role: Role = serde_json::from_value(json!("university")).unwrap();
    assert_eq!(role, Role::University);
    assert!(serde_json::from_value::<Visibility>(json!("secret")).is_err());
}

#[test]
fn test_user_profile_never_carries_the_password_hash() {
    let user = User {
        user_id: 7,
        email: "alice@campus.test".to_string(),
        password_hash: "$argon2id$...".to_string(),
        role: Role::Student,
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    };

    let value = serde_json::to_value(UserProfile::from(user)).unwrap();
    assert_eq!(value["user_id"], 7);
    assert_eq!(value["role"], "student");
    assert!(value.get("password_hash").is_none());
}

#[test]
fn test_create_event_request_parses_from_json() {
    let req: CreateEventRequest = serde_json::from_value(json!({
        "name": "Career Fair",
        "description": "Meet employers",
        "category": "tech_talk",
        "date_time": "2025-03-01T18:00:00Z",
        "visibility": "private",
        "university_id": 3
    }))
    .unwrap();

    assert_eq!(req.category, EventCategory::TechTalk);
    assert_eq!(req.visibility, Visibility::Private);
    assert_eq!(req.university_id, Some(3));
    assert_eq!(req.rso_id, None);
    assert!(req.validate().is_ok());
}

#[test]
fn test_update_event_request_omits_absent_fields() {
    let req = UpdateEventRequest {
        name: Some("Gala".to_string()),
        ..Default::default()
    };
    assert_eq!(serde_json::to_value(&req).unwrap(), json!({"name": "Gala"}));
}

// --- Validation rules ---

#[test]
fn test_register_request_validation() {
    let ok = RegisterUserRequest {
        email: "alice@campus.test".to_string(),
        password: "secret123".to_string(),
        role: Role::Student,
    };
    assert!(ok.validate().is_ok());

    let bad = RegisterUserRequest {
        email: "not-an-email".to_string(),
        password: "123".to_string(),
        ..ok
    };
    let errors = bad.validate().unwrap_err();
    let fields = errors.field_errors();
    assert!(fields.contains_key("email"));
    assert!(fields.contains_key("password"));
}

#[test]
fn test_rating_request_range() {
    assert!(RatingRequest { rating: 1 }.validate().is_ok());
    assert!(RatingRequest { rating: 5 }.validate().is_ok());
    assert!(RatingRequest { rating: 0 }.validate().is_err());
    assert!(RatingRequest { rating: 6 }.validate().is_err());
}

#[test]
fn test_building_coordinates_are_checked_per_entry() {
    let valid = NewBuilding {
        name: "Library".to_string(),
        lat: 28.6,
        lng: -81.2,
    };
    let off_the_map = NewBuilding {
        name: "Nowhere".to_string(),
        lat: 91.0,
        lng: 0.0,
    };

    assert!(
        AddBuildingsRequest {
            buildings: vec![valid.clone()]
        }
        .validate()
        .is_ok()
    );
    assert!(
        AddBuildingsRequest {
            buildings: vec![valid, off_the_map]
        }
        .validate()
        .is_err()
    );
    assert!(AddBuildingsRequest { buildings: vec![] }.validate().is_err());
}

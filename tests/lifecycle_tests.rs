//! End-to-end asset lifecycle through the public store API.

use asset_tracker::activity::{ActivityKind, Severity};
use asset_tracker::repair::AllocateRepaired;
use asset_tracker::*;
use chrono::NaiveDate;
use tempfile::TempDir;

fn open_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(Config::with_data_dir(dir.path())).unwrap();
    (dir, store)
}

fn user(username: &str, role: Role) -> User {
    User {
        username: username.to_string(),
        email: format!("{}@example.com", username),
        full_name: username.to_string(),
        business_unit: String::new(),
        role,
        is_active: true,
        password_hash: String::new(),
    }
}

fn desk() -> NewAsset {
    NewAsset {
        name: "Standing Desk".to_string(),
        category: "Furniture".to_string(),
        asset_type: "Desk".to_string(),
        manufacturer: "Ikea".to_string(),
        model: "Bekant".to_string(),
        serial_number: String::new(),
        company: "PT Head Office".to_string(),
        business_unit: "Finance".to_string(),
        location: "HO - Ciputat".to_string(),
        room: "1010 - Finance".to_string(),
        owner: "General Affairs".to_string(),
        condition: "New".to_string(),
        purchase_date: NaiveDate::from_ymd_opt(2021, 7, 1).unwrap(),
        purchase_cost: 8_000.0,
        warranty: String::new(),
        supplier: String::new(),
        journal: String::new(),
        notes: String::new(),
    }
}

fn submit(store: &Store, actor: &User, asset_id: Option<u64>, payload: RequestPayload) -> ApprovalRequest {
    store
        .submit(actor, Submission { asset_id, payload })
        .unwrap()
}

#[test]
fn test_damage_repair_and_return_to_service() {
    let (_dir, store) = open_store();
    let admin = user("alice", Role::Admin);
    let manager = user("mike", Role::Manager);
    let staff = user("sam", Role::Staff);

    // Admin registrations are decided by a manager.
    let add = submit(&store, &admin, None, RequestPayload::AddAsset(desk()));
    assert_eq!(add.request_type, RequestType::AdminAddAsset);
    assert!(store.approve(&admin, add.id, "").is_err());
    let id = store.approve(&manager, add.id, "checked").unwrap().asset_id.unwrap();

    let asset = store.asset(id).unwrap();
    assert_eq!(asset.status, AssetStatus::Active);
    assert!(asset.financials.book_value < 8_000.0);

    let damage = submit(
        &store,
        &staff,
        Some(id),
        RequestPayload::DamageReport {
            damage_type: "Motor".to_string(),
            severity: Severity::Heavy,
            description: "lift motor dead".to_string(),
            notes: String::new(),
        },
    );
    assert_eq!(damage.approver_role, Role::Admin);
    store.approve(&admin, damage.id, "").unwrap();
    assert_eq!(store.asset(id).unwrap().status, AssetStatus::UnderRepair);

    let allocated = store
        .allocate_repaired(
            &staff,
            id,
            AllocateRepaired {
                location: "Branch - Bandung".to_string(),
                room: "201 - Operations".to_string(),
                business_unit: String::new(),
                description: "motor replaced".to_string(),
                notes: String::new(),
            },
        )
        .unwrap();
    assert_eq!(allocated.status, AssetStatus::Active);
    assert_eq!(allocated.business_unit, "Finance");

    let history = store.history(id).unwrap();
    assert_eq!(history.len(), 2);
    assert!(matches!(history[0].kind, ActivityKind::Damage(_)));
    assert!(matches!(history[1].kind, ActivityKind::Repair(_)));
    assert_eq!(history[1].request_id, None);
}

#[test]
fn test_rejected_request_leaves_asset_alone() {
    let (_dir, store) = open_store();
    let admin = user("alice", Role::Admin);
    let manager = user("mike", Role::Manager);

    let add = submit(&store, &manager, None, RequestPayload::AddAsset(desk()));
    let id = store.approve(&admin, add.id, "").unwrap().asset_id.unwrap();
    let before = store.asset(id).unwrap();

    let relocate = submit(
        &store,
        &manager,
        Some(id),
        RequestPayload::Relocation {
            to: Placement {
                location: "HO - Ciputat".to_string(),
                room: "1015 - Meeting Room".to_string(),
            },
            reason: "meeting room setup".to_string(),
            notes: String::new(),
        },
    );
    let rejected = store.reject(&admin, relocate.id, "keep it").unwrap();
    assert_eq!(rejected.status, ApprovalStatus::Rejected);
    assert_eq!(store.asset(id).unwrap(), before);
    assert!(store.history(id).unwrap().is_empty());

    // A decided request cannot be decided again.
    assert!(matches!(
        store.approve(&admin, relocate.id, ""),
        Err(AppError::InvalidState(_))
    ));
}

#[test]
fn test_lost_asset_accepts_nothing_more() {
    let (_dir, store) = open_store();
    let admin = user("alice", Role::Admin);
    let staff = user("sam", Role::Staff);

    let add = submit(&store, &staff, None, RequestPayload::AddAsset(desk()));
    let id = store.approve(&admin, add.id, "").unwrap().asset_id.unwrap();

    let lost = submit(
        &store,
        &staff,
        Some(id),
        RequestPayload::LostReport {
            reason: "not found in audit".to_string(),
            description: String::new(),
            notes: String::new(),
            date_lost: NaiveDate::from_ymd_opt(2024, 2, 1),
        },
    );
    assert_eq!(lost.description, "Lost asset report: not found in audit");
    store.approve(&admin, lost.id, "").unwrap();
    assert_eq!(store.asset(id).unwrap().status, AssetStatus::Lost);

    let again = store.submit(
        &staff,
        Submission {
            asset_id: Some(id),
            payload: RequestPayload::RepairAction {
                description: "store it".to_string(),
                notes: String::new(),
            },
        },
    );
    assert!(matches!(again, Err(AppError::InvalidState(_))));

    let summary = store.summary(2024);
    assert_eq!(summary.lost, 1);
    assert_eq!(summary.total_assets, 1);
}

//! JSON file snapshot on a real filesystem.

use tollgate::plans::{PayCountry, Plan};
use tollgate::store::{
    JsonFileSnapshot, MemberMap, MemberStore, Payment, SnapshotStore, Stage, SubscriptionRecord,
};

fn submitted() -> SubscriptionRecord {
    SubscriptionRecord {
        expire_at: 0,
        stage: Stage::BillSubmitted {
            plan: Plan::MidTerm,
            payment: Payment::for_subscriber("42", PayCountry::Japan),
            bill_file: "uploads/42_1.png".to_string(),
        },
    }
}

#[test]
fn test_missing_file_loads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = JsonFileSnapshot::new(dir.path().join("members.json"));

    assert!(snapshot.load().unwrap().is_empty());
}

#[test]
fn test_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("members.json");

    {
        let mut store = MemberStore::load(JsonFileSnapshot::new(&path)).unwrap();
        store.upsert("42", |r| *r = submitted()).unwrap();
        store.upsert("7", |r| r.stage = Stage::PlanChosen { plan: Plan::ShortTerm }).unwrap();
        store.remove("7").unwrap();
    }

    let store = MemberStore::load(JsonFileSnapshot::new(&path)).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.get("42"), Some(&submitted()));
}

#[test]
fn test_write_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = JsonFileSnapshot::new(dir.path().join("members.json"));

    let mut members = MemberMap::new();
    members.insert("42".to_string(), submitted());
    snapshot.save(&members).unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["members.json".to_string()]);
}

#[test]
fn test_file_uses_camel_case_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("members.json");
    let snapshot = JsonFileSnapshot::new(&path);

    let mut members = MemberMap::new();
    members.insert("42".to_string(), submitted());
    snapshot.save(&members).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let record = &raw["42"];
    assert_eq!(record["stage"], "bill_submitted");
    assert_eq!(record["plan"], "6m");
    assert_eq!(record["payCountry"], "JP");
    assert_eq!(record["transferNote"], "DISCORD_42");
    assert_eq!(record["billFile"], "uploads/42_1.png");
    assert_eq!(record["expireAt"], 0);
}

#[test]
fn test_legacy_file_without_stage_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("members.json");
    std::fs::write(
        &path,
        r#"{
            "1": {"expireAt": 0},
            "2": {"plan": "1m", "expireAt": 0},
            "3": {"plan": "1m", "payCountry": "VN", "transferNote": "DISCORD_3", "expireAt": 0},
            "4": {"plan": "1y", "payCountry": "VN", "transferNote": "DISCORD_4",
                  "billFile": "uploads/4.png", "expireAt": 0},
            "5": {"plan": "1y", "payCountry": "VN", "transferNote": "DISCORD_5",
                  "billFile": "uploads/5.png", "expireAt": 1800000000000}
        }"#,
    )
    .unwrap();

    let members = JsonFileSnapshot::new(&path).load().unwrap();
    let stage = |id: &str| members[id].stage.name();
    assert_eq!(stage("1"), "fresh");
    assert_eq!(stage("2"), "plan_chosen");
    assert_eq!(stage("3"), "awaiting_payment");
    assert_eq!(stage("4"), "bill_submitted");
    assert_eq!(stage("5"), "active");
    assert_eq!(members["5"].expire_at, 1_800_000_000_000);
}

#[test]
fn test_corrupt_file_is_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("members.json");
    std::fs::write(&path, r#"{"42": {"stage": "active"}}"#).unwrap();

    let err = JsonFileSnapshot::new(&path).load().unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("plan"));
}

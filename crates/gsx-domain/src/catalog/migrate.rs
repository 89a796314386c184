use serde_json::{json, Map, Value};

use super::normalize::utc_now_iso;
use super::types::{CATALOG_VERSION, DEFAULT_GROUP_ID, DEFAULT_GROUP_NAME};

/// What the migration driver did to a raw document. `path` holds every
/// version the document passed through, starting with the detected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub raw_version: i64,
    pub final_version: i64,
    pub path: Vec<i64>,
}

impl MigrationOutcome {
    pub fn changed(&self) -> bool {
        self.raw_version != self.final_version
    }
}

/// Detect the schema version of a raw parsed document.
///
/// `catalog_version` wins over `schema_version`; a non-empty object with
/// neither key is the unversioned legacy shape (version 1); an empty
/// object is version 0.
pub fn detect_version(value: &Value) -> i64 {
    let Some(map) = value.as_object() else {
        return 0;
    };
    if map.is_empty() {
        return 0;
    }
    if let Some(version) = map.get("catalog_version").and_then(Value::as_i64) {
        return version;
    }
    if let Some(version) = map.get("schema_version").and_then(Value::as_i64) {
        return version;
    }
    1
}

type MigrationStep = fn(Value) -> Value;

fn step_for(version: i64) -> Option<MigrationStep> {
    match version {
        0 => Some(migrate_v0_to_v1),
        1 => Some(migrate_v1_to_v2),
        2 => Some(migrate_v2_to_v3),
        3 => Some(migrate_v3_to_v4),
        _ => None,
    }
}

/// Walk a raw document up the migration ladder one step at a time until
/// it reports the current version.
///
/// Each step must strictly increase the detected version; a step that
/// fails to bump it gets the version forced to `previous + 1` so the
/// driver can never loop. Documents already at or above the current
/// version are returned untouched, which preserves files written by a
/// newer release.
pub fn migrate_document(mut value: Value) -> (Value, MigrationOutcome) {
    let raw_version = detect_version(&value);
    let mut current = raw_version;
    let mut path = vec![raw_version];

    while current < CATALOG_VERSION {
        let Some(step) = step_for(current) else {
            break;
        };
        value = step(value);
        let mut next = detect_version(&value);
        if next <= current {
            next = current + 1;
            set_versions(&mut value, next);
        }
        tracing::debug!(from = current, to = next, "applied catalog migration step");
        current = next;
        path.push(current);
    }

    let outcome = MigrationOutcome {
        raw_version,
        final_version: current,
        path,
    };
    (value, outcome)
}

fn set_versions(value: &mut Value, version: i64) {
    if let Some(map) = value.as_object_mut() {
        map.insert("catalog_version".to_string(), json!(version));
        map.insert("schema_version".to_string(), json!(version));
    }
}

fn ensure_array(map: &mut Map<String, Value>, key: &str) {
    if !map.get(key).is_some_and(Value::is_array) {
        map.insert(key.to_string(), json!([]));
    }
}

fn ensure_string(map: &mut Map<String, Value>, key: &str, fallback: &str) {
    if !map.get(key).is_some_and(Value::is_string) {
        map.insert(key.to_string(), json!(fallback));
    }
}

fn collect_ids(map: &Map<String, Value>, collection: &str) -> Vec<Value> {
    map.get(collection)
        .and_then(Value::as_array)
        .map(|records| {
            records
                .iter()
                .filter_map(|record| record.get("id"))
                .filter(|id| id.as_str().is_some_and(|s| !s.is_empty()))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

/// v0 -> v1: grow an empty (or non-object) document into the legacy
/// envelope with the four original collections. Version keys stay absent;
/// the non-empty envelope detects as version 1.
fn migrate_v0_to_v1(value: Value) -> Value {
    let mut map = match value {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let now = utc_now_iso();
    ensure_string(&mut map, "project_root", "");
    ensure_string(&mut map, "created_at", &now);
    ensure_string(&mut map, "updated_at", &now);
    ensure_array(&mut map, "models_3d");
    ensure_array(&mut map, "radargrams");
    ensure_array(&mut map, "timeslices");
    ensure_array(&mut map, "links");
    Value::Object(map)
}

/// v1 -> v2: promote the legacy envelope to the versioned shape.
fn migrate_v1_to_v2(mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        let now = utc_now_iso();
        ensure_string(map, "project_root", "");
        ensure_string(map, "created_at", &now);
        ensure_string(map, "updated_at", &now);
        ensure_array(map, "models_3d");
        ensure_array(map, "radargrams");
        ensure_array(map, "timeslices");
        ensure_array(map, "links");
    }
    set_versions(&mut value, 2);
    value
}

/// v2 -> v3: introduce `raster_groups`, seeding the default "Imported"
/// group with every radargram and time-slice known at migration time.
fn migrate_v2_to_v3(mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        if !map.get("raster_groups").is_some_and(Value::is_array) {
            let radargram_ids = collect_ids(map, "radargrams");
            let timeslice_ids = collect_ids(map, "timeslices");
            map.insert(
                "raster_groups".to_string(),
                json!([{
                    "id": DEFAULT_GROUP_ID,
                    "name": DEFAULT_GROUP_NAME,
                    "radargram_ids": radargram_ids,
                    "timeslice_ids": timeslice_ids,
                    "style_qml_path": "",
                }]),
            );
        }
    }
    set_versions(&mut value, 3);
    value
}

/// v3 -> v4: introduce the `vector_layers` collection.
fn migrate_v3_to_v4(mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        ensure_array(map, "vector_layers");
    }
    set_versions(&mut value, 4);
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_detects_as_version_zero() {
        assert_eq!(detect_version(&json!({})), 0);
        assert_eq!(detect_version(&Value::Null), 0);
    }

    #[test]
    fn unversioned_envelope_detects_as_version_one() {
        let value = json!({"project_root": "/proj", "timeslices": []});
        assert_eq!(detect_version(&value), 1);
    }

    #[test]
    fn catalog_version_wins_over_schema_version() {
        let value = json!({"catalog_version": 3, "schema_version": 2});
        assert_eq!(detect_version(&value), 3);
    }

    #[test]
    fn empty_document_migrates_through_every_step() {
        let (value, outcome) = migrate_document(json!({}));
        assert_eq!(outcome.path, vec![0, 1, 2, 3, 4]);
        assert_eq!(detect_version(&value), CATALOG_VERSION);
        assert!(value["raster_groups"].is_array());
        assert!(value["vector_layers"].is_array());
    }

    #[test]
    fn default_group_is_seeded_from_existing_records() {
        let legacy = json!({
            "schema_version": 2,
            "project_root": "/proj",
            "radargrams": [{"id": "rg_1"}, {"id": "rg_2"}],
            "timeslices": [{"id": "ts_1"}],
            "links": [],
        });
        let (value, outcome) = migrate_document(legacy);
        assert_eq!(outcome.raw_version, 2);
        assert_eq!(outcome.final_version, CATALOG_VERSION);
        let group = &value["raster_groups"][0];
        assert_eq!(group["id"], json!(DEFAULT_GROUP_ID));
        assert_eq!(group["radargram_ids"], json!(["rg_1", "rg_2"]));
        assert_eq!(group["timeslice_ids"], json!(["ts_1"]));
    }

    #[test]
    fn record_contents_survive_migration() {
        let legacy = json!({
            "project_root": "/proj",
            "radargrams": [{
                "id": "rg_1",
                "project_path": "/proj/radargrams/line.png",
                "operator": "field crew 2",
            }],
        });
        let (value, _) = migrate_document(legacy);
        assert_eq!(value["radargrams"][0]["operator"], json!("field crew 2"));
        assert_eq!(
            value["radargrams"][0]["project_path"],
            json!("/proj/radargrams/line.png")
        );
    }

    #[test]
    fn existing_raster_groups_are_not_replaced() {
        let legacy = json!({
            "schema_version": 2,
            "raster_groups": [{"id": "grp_custom", "name": "Custom"}],
            "radargrams": [{"id": "rg_1"}],
        });
        let (value, _) = migrate_document(legacy);
        let groups = value["raster_groups"].as_array().expect("groups");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["id"], json!("grp_custom"));
    }
}

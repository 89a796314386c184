use std::collections::HashSet;

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::OffsetDateTime;

use super::types::{
    CatalogDocument, LinkRecord, Model3dRecord, RadargramRecord, RasterGroupRecord, StorageMode,
    TimesliceRecord, VectorLayerRecord, CATALOG_VERSION, DEFAULT_GROUP_ID, DEFAULT_GROUP_NAME,
};

/// Current UTC time as an RFC 3339 timestamp with second precision.
pub fn utc_now_iso() -> String {
    let now = OffsetDateTime::now_utc();
    let now = now.replace_nanosecond(0).unwrap_or(now);
    now.format(&Rfc3339).unwrap_or_default()
}

/// Compact UTC stamp used inside generated record ids.
pub fn utc_compact_stamp() -> String {
    let format = format_description!("[year][month][day]T[hour][minute][second]Z");
    OffsetDateTime::now_utc().format(&format).unwrap_or_default()
}

fn sanitize_fragment(name: &str) -> String {
    let mut fragment: String = name
        .trim()
        .to_ascii_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    fragment.truncate(24);
    fragment.trim_matches('_').to_string()
}

/// Build a record id of the form `{prefix}_{stamp}[_{fragment}]`, with a
/// numeric suffix appended until the id is unique within `taken`. The
/// suffix keeps same-second bulk registration collision-free without
/// reaching for randomness.
pub fn generate_record_id(prefix: &str, name: Option<&str>, taken: &HashSet<String>) -> String {
    let mut base = format!("{prefix}_{}", utc_compact_stamp());
    if let Some(fragment) = name.map(sanitize_fragment) {
        if !fragment.is_empty() {
            base = format!("{base}_{fragment}");
        }
    }
    if !taken.contains(&base) {
        return base;
    }
    let mut counter = 2_u64;
    loop {
        let candidate = format!("{base}_{counter}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// De-duplicating union of membership ids: existing entries keep their
/// position, new ids are appended in input order.
pub fn merge_member_ids(existing: &mut Vec<String>, additions: &[String]) {
    for id in additions {
        if !id.is_empty() && !existing.iter().any(|known| known == id) {
            existing.push(id.clone());
        }
    }
}

/// Case-insensitive, separator-normalized path comparison used for
/// vector-layer upserts.
pub fn paths_equivalent(a: &str, b: &str) -> bool {
    normalize_path_key(a) == normalize_path_key(b)
}

fn normalize_path_key(path: &str) -> String {
    path.trim()
        .replace('\\', "/")
        .trim_end_matches('/')
        .to_ascii_lowercase()
}

fn dedupe_member_ids(ids: &mut Vec<String>) {
    let mut seen = HashSet::new();
    ids.retain(|id| !id.is_empty() && seen.insert(id.clone()));
}

fn taken_ids<I>(ids: I) -> HashSet<String>
where
    I: IntoIterator<Item = String>,
{
    ids.into_iter().filter(|id| !id.is_empty()).collect()
}

fn normalize_model_3d(record: &mut Model3dRecord, taken: &mut HashSet<String>, now: &str) {
    if record.id.is_empty() {
        record.id = generate_record_id("m3d", None, taken);
    }
    taken.insert(record.id.clone());
    if record.imported_at.is_empty() {
        record.imported_at = now.to_string();
    }
}

fn normalize_radargram(record: &mut RadargramRecord, taken: &mut HashSet<String>, now: &str) {
    if record.id.is_empty() {
        record.id = generate_record_id("rg", None, taken);
    }
    taken.insert(record.id.clone());
    if record.imported_at.is_empty() {
        record.imported_at = now.to_string();
    }
}

fn normalize_timeslice(record: &mut TimesliceRecord, taken: &mut HashSet<String>, now: &str) {
    if record.id.is_empty() {
        record.id = generate_record_id("ts", None, taken);
    }
    taken.insert(record.id.clone());
    if record.imported_at.is_empty() {
        record.imported_at = now.to_string();
    }
    if record.unit.is_empty() {
        record.unit = "m".to_string();
    }
}

fn normalize_vector_layer(record: &mut VectorLayerRecord, taken: &mut HashSet<String>, now: &str) {
    if record.layer_name.is_empty() {
        record.layer_name = record.name.clone();
    }
    record.name = record.layer_name.clone();
    if record.id.is_empty() {
        let fragment = (!record.layer_name.is_empty()).then_some(record.layer_name.as_str());
        record.id = generate_record_id("vec", fragment, taken);
    }
    taken.insert(record.id.clone());
    if record.storage_mode.is_none() {
        record.storage_mode = Some(StorageMode::from_project_path(&record.project_path));
    }
    if record.created_at.is_empty() {
        record.created_at = now.to_string();
    }
    if record.updated_at.is_empty() {
        record.updated_at = record.created_at.clone();
    }
}

fn normalize_link(record: &mut LinkRecord, taken: &mut HashSet<String>) {
    if record.id.is_empty() {
        record.id = generate_record_id("lnk", None, taken);
    }
    taken.insert(record.id.clone());
    record.confidence = record.confidence.clamp(0.0, 1.0);
}

fn normalize_group(record: &mut RasterGroupRecord, taken: &mut HashSet<String>) {
    if record.id.is_empty() {
        let fragment = (!record.name.is_empty()).then_some(record.name.as_str());
        record.id = generate_record_id("grp", fragment, taken);
    }
    taken.insert(record.id.clone());
    if record.is_default() && record.name.is_empty() {
        record.name = DEFAULT_GROUP_NAME.to_string();
    }
    dedupe_member_ids(&mut record.radargram_ids);
    dedupe_member_ids(&mut record.timeslice_ids);
}

/// Fill defaults on every record so callers always see the canonical
/// field set: generated ids, import timestamps, synced vector-layer
/// names, de-duplicated group membership, and current version/root keys
/// on the envelope. Unknown keys are left alone.
///
/// This pass never drops data; dangling-reference pruning lives in
/// [`normalize_document`] so that a validation read can still observe
/// stale ids before a full load repairs them.
pub fn normalize_records(doc: &mut CatalogDocument, project_root: &str) {
    let now = utc_now_iso();

    let version = doc
        .catalog_version
        .max(doc.schema_version)
        .max(CATALOG_VERSION);
    doc.catalog_version = version;
    doc.schema_version = version;
    doc.project_root = project_root.to_string();
    if doc.created_at.is_empty() {
        doc.created_at = now.clone();
    }
    if doc.updated_at.is_empty() {
        doc.updated_at = doc.created_at.clone();
    }

    let mut taken = taken_ids(doc.models_3d.iter().map(|r| r.id.clone()));
    for record in &mut doc.models_3d {
        normalize_model_3d(record, &mut taken, &now);
    }

    let mut taken = taken_ids(doc.radargrams.iter().map(|r| r.id.clone()));
    for record in &mut doc.radargrams {
        normalize_radargram(record, &mut taken, &now);
    }

    let mut taken = taken_ids(doc.timeslices.iter().map(|r| r.id.clone()));
    for record in &mut doc.timeslices {
        normalize_timeslice(record, &mut taken, &now);
    }

    let mut taken = taken_ids(doc.vector_layers.iter().map(|r| r.id.clone()));
    for record in &mut doc.vector_layers {
        normalize_vector_layer(record, &mut taken, &now);
    }

    let mut taken = taken_ids(doc.links.iter().map(|r| r.id.clone()));
    for record in &mut doc.links {
        normalize_link(record, &mut taken);
    }

    let mut taken = taken_ids(doc.raster_groups.iter().map(|r| r.id.clone()));
    for record in &mut doc.raster_groups {
        normalize_group(record, &mut taken);
    }
}

/// Full normalization pipeline applied on load: record defaults plus
/// cross-reference pruning. Group members that no longer resolve to a
/// record are removed silently, and when no raster group is left at all
/// a fresh default group is synthesized from the known radargram ids.
pub fn normalize_document(doc: &mut CatalogDocument, project_root: &str) {
    normalize_records(doc, project_root);

    let timeslice_ids: HashSet<String> =
        doc.timeslices.iter().map(|r| r.id.clone()).collect();
    let radargram_ids: HashSet<String> =
        doc.radargrams.iter().map(|r| r.id.clone()).collect();
    for group in &mut doc.raster_groups {
        group.timeslice_ids.retain(|id| timeslice_ids.contains(id));
        group.radargram_ids.retain(|id| radargram_ids.contains(id));
    }

    if doc.raster_groups.is_empty() {
        doc.raster_groups.push(default_group(
            doc.radargrams.iter().map(|r| r.id.clone()).collect(),
        ));
    }
}

fn default_group(radargram_ids: Vec<String>) -> RasterGroupRecord {
    RasterGroupRecord {
        id: DEFAULT_GROUP_ID.to_string(),
        name: DEFAULT_GROUP_NAME.to_string(),
        radargram_ids,
        ..RasterGroupRecord::default()
    }
}

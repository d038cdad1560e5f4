//! End-to-end import runs against the in-memory store.

use std::path::{Path, PathBuf};

use fhir_ingest_core::ResourceKind;
use fhir_ingest_db_memory::{MemoryHandle, MemoryStore};
use fhir_ingest_importer::{AbortPolicy, BundleImporter, ErrorCategory, ImportError};
use serde_json::{Value, json};
use tempfile::TempDir;

fn bundle(resources: Vec<Value>) -> Value {
    json!({
        "resourceType": "Bundle",
        "type": "transaction",
        "entry": resources
            .into_iter()
            .map(|r| json!({"fullUrl": format!("urn:uuid:{}", r["id"].as_str().unwrap_or("x")), "resource": r}))
            .collect::<Vec<_>>()
    })
}

fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
    path
}

fn patient(id: &str) -> Value {
    json!({
        "resourceType": "Patient",
        "id": id,
        "gender": "female",
        "birthDate": "1970-05-01",
        "name": [{"use": "official", "family": "Lee", "given": ["Ann", "Marie"]}]
    })
}

fn encounter(id: &str) -> Value {
    json!({
        "resourceType": "Encounter",
        "id": id,
        "status": "finished",
        "class": {"system": "http://terminology.hl7.org/CodeSystem/v3-ActCode", "code": "AMB"},
        "period": {"start": "2020-01-01T10:00:00Z", "end": "2020-01-01T10:30:00Z"},
        "participant": [{
            "individual": {
                "reference": "Practitioner?identifier=http://hl7.org/fhir/sid/us-npi|9999",
                "display": "Dr. Who"
            }
        }]
    })
}

fn observation(id: &str, encounter_id: &str) -> Value {
    json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "code": {"coding": [{"system": "http://loinc.org", "code": "8302-2", "display": "Body Height"}]},
        "encounter": {"reference": format!("urn:uuid:{encounter_id}")},
        "effectiveDateTime": "2020-01-01T10:05:00Z",
        "valueQuantity": {"value": 172.5, "unit": "cm"}
    })
}

fn setup() -> (TempDir, MemoryStore, MemoryHandle) {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryStore::new();
    let handle = store.handle();
    (dir, store, handle)
}

#[tokio::test]
async fn test_patient_encounter_observation_scenario() {
    let (dir, store, handle) = setup();
    write_json(
        dir.path(),
        "lee.json",
        &bundle(vec![patient("P1"), encounter("E1"), observation("O1", "E1")]),
    );

    let summary = BundleImporter::new(store).run(dir.path()).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.files_imported(), 1);

    let tables = handle.snapshot().await;
    assert_eq!(tables.count("patient"), 1);

    let names = tables.rows("name");
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].text("patient_id"), Some("P1"));
    assert_eq!(names[0].text("family"), Some("Lee"));
    assert_eq!(names[0].text("given"), Some("Ann Marie"));

    let encounters = tables.rows("encounter");
    assert_eq!(encounters.len(), 1);
    assert_eq!(encounters[0].text("id"), Some("E1"));
    assert_eq!(encounters[0].text("patient_id"), Some("P1"));

    let observations = tables.rows("observation");
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].text("id"), Some("O1"));
    assert_eq!(observations[0].text("patient_id"), Some("P1"));
    assert_eq!(observations[0].text("encounter_id"), Some("E1"));

    assert_eq!(tables.count("participant"), 1);
    let links = tables.rows("encounter_participant");
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].text("participant_id"), Some("9999"));
    assert_eq!(links[0].text("encounter_id"), Some("E1"));

    assert!(handle.is_closed().await);
    assert_eq!(summary.rows().get("observation"), 1);
}

#[tokio::test]
async fn test_dependent_entries_follow_most_recent_patient() {
    let (dir, store, handle) = setup();
    write_json(
        dir.path(),
        "two.json",
        &bundle(vec![
            patient("P1"),
            encounter("E1"),
            patient("P2"),
            json!({"resourceType": "Condition", "id": "C1", "code": {"text": "Asthma"}}),
        ]),
    );

    BundleImporter::new(store).run(dir.path()).await.unwrap();

    let tables = handle.snapshot().await;
    assert_eq!(tables.rows("encounter")[0].text("patient_id"), Some("P1"));
    assert_eq!(tables.rows("condition")[0].text("patient_id"), Some("P2"));
}

#[tokio::test]
async fn test_context_resets_between_files() {
    let (dir, store, handle) = setup();
    write_json(dir.path(), "a.json", &bundle(vec![patient("P1")]));
    write_json(
        dir.path(),
        "b.json",
        &bundle(vec![observation("O1", "E1")]),
    );

    let err = BundleImporter::new(store)
        .run(dir.path())
        .await
        .unwrap_err();

    assert!(err.is_missing_patient_context());
    assert!(err.path().unwrap().ends_with("b.json"));
    assert_eq!(err.entry_index(), Some(0));
    match err {
        ImportError::MissingPatientContext { resource_type, .. } => {
            assert_eq!(resource_type, ResourceKind::Observation);
        }
        other => panic!("unexpected error: {other}"),
    }

    assert_eq!(handle.count("patient").await, 1);
    assert_eq!(handle.count("observation").await, 0);
}

#[tokio::test]
async fn test_encounter_without_patient_writes_nothing() {
    let (dir, store, handle) = setup();
    write_json(dir.path(), "orphan.json", &bundle(vec![encounter("E1")]));

    let err = BundleImporter::new(store)
        .run(dir.path())
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::MissingContext);
    assert!(handle.snapshot().await.is_empty());
    assert!(handle.is_closed().await);
}

#[tokio::test]
async fn test_sub_entity_multiplicity() {
    let (dir, store, handle) = setup();
    let mut p = patient("P1");
    p["telecom"] = json!([
        {"system": "phone", "value": "555-0101", "use": "home"},
        {"system": "phone", "value": "555-0102", "use": "mobile"},
        {"system": "email", "value": "ann@example.org"}
    ]);
    write_json(dir.path(), "p.json", &bundle(vec![p]));

    let summary = BundleImporter::new(store).run(dir.path()).await.unwrap();

    let tables = handle.snapshot().await;
    assert_eq!(tables.count("address"), 0);
    let telecoms = tables.rows("telecom");
    assert_eq!(telecoms.len(), 3);
    assert!(telecoms.iter().all(|r| r.text("patient_id") == Some("P1")));
    assert_eq!(summary.rows().get("telecom"), 3);
    assert_eq!(summary.rows().get("address"), 0);
}

#[tokio::test]
async fn test_reimport_is_rejected_without_duplicates() {
    let (dir, _, _) = setup();
    let file = write_json(dir.path(), "p.json", &bundle(vec![patient("P1"), encounter("E1")]));

    let store = MemoryStore::new();
    let handle = store.handle();
    let mut importer = BundleImporter::new(store);
    importer.import_file(&file).await.unwrap();

    let err = importer.import_file(&file).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Persistence);
    match &err {
        ImportError::Persistence { source, .. } => assert!(source.is_already_exists()),
        other => panic!("unexpected error: {other}"),
    }

    let tables = handle.snapshot().await;
    assert_eq!(tables.count("patient"), 1);
    assert_eq!(tables.count("name"), 1);
    assert_eq!(tables.count("encounter"), 1);
    assert_eq!(tables.count("encounter_participant"), 1);
}

#[tokio::test]
async fn test_many_files_keep_key_checks_across_commits() {
    let (dir, store, handle) = setup();
    for i in 0..40 {
        write_json(
            dir.path(),
            &format!("{i:03}.json"),
            &bundle(vec![
                patient(&format!("P{i}")),
                encounter(&format!("E{i}")),
                observation(&format!("O{i}"), &format!("E{i}")),
            ]),
        );
    }
    // a late file repeating an early patient id
    write_json(
        dir.path(),
        "999.json",
        &bundle(vec![patient("P3"), encounter("E-late")]),
    );

    let summary = BundleImporter::new(store)
        .with_policy(AbortPolicy::PerFile)
        .run(dir.path())
        .await
        .unwrap();

    assert_eq!(summary.files_imported(), 40);
    assert_eq!(summary.files_failed(), 1);
    assert!(summary.failed[0].path.ends_with("999.json"));
    match &summary.failed[0].error {
        ImportError::Persistence { source, .. } => assert!(source.is_already_exists()),
        other => panic!("unexpected error: {other}"),
    }

    let tables = handle.snapshot().await;
    assert_eq!(tables.count("patient"), 40);
    assert_eq!(tables.count("name"), 40);
    assert_eq!(tables.count("encounter"), 40);
    assert_eq!(tables.count("observation"), 40);
    // one practitioner shared by every file, linked once per encounter
    assert_eq!(tables.count("participant"), 1);
    assert_eq!(tables.count("encounter_participant"), 40);
    assert!(
        tables
            .rows("encounter")
            .iter()
            .all(|r| r.text("id") != Some("E-late"))
    );
    assert_eq!(handle.total_rows().await, tables.total_rows());

    let stats = handle.stats().await;
    assert_eq!(stats.committed_transactions, 40);
    assert_eq!(stats.rolled_back_transactions, 1);
}

#[tokio::test]
async fn test_malformed_date_time_rolls_back_file() {
    let (dir, store, handle) = setup();
    let mut bad = observation("O1", "E1");
    bad["effectiveDateTime"] = json!("2020-01-01Tnot-a-time");
    write_json(
        dir.path(),
        "bad.json",
        &bundle(vec![patient("P1"), encounter("E1"), bad]),
    );

    let err = BundleImporter::new(store).run(dir.path()).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Mapping);
    assert_eq!(err.entry_index(), Some(2));
    assert_eq!(handle.total_rows().await, 0);
}

#[tokio::test]
async fn test_whole_run_stops_at_first_failing_entry() {
    let (dir, store, handle) = setup();
    write_json(dir.path(), "01.json", &bundle(vec![patient("P1")]));
    write_json(
        dir.path(),
        "02.json",
        &bundle(vec![
            patient("P2"),
            json!({"resourceType": "Encounter", "id": "E2"}),
            observation("O2", "E2"),
        ]),
    );
    write_json(dir.path(), "03.json", &bundle(vec![patient("P3")]));

    let err = BundleImporter::new(store)
        .with_policy(AbortPolicy::WholeRun)
        .run(dir.path())
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Mapping);
    assert_eq!(err.entry_index(), Some(1));
    assert!(err.path().unwrap().ends_with("02.json"));

    let tables = handle.snapshot().await;
    let ids: Vec<_> = tables
        .rows("patient")
        .iter()
        .filter_map(|r| r.text("id"))
        .collect();
    assert_eq!(ids, vec!["P1"]);
    assert_eq!(tables.count("observation"), 0);

    let stats = handle.stats().await;
    assert_eq!(stats.total_transactions, 2);
    assert_eq!(stats.committed_transactions, 1);
    assert_eq!(stats.rolled_back_transactions, 1);
    assert!(handle.is_closed().await);
}

#[tokio::test]
async fn test_per_file_continues_after_failure() {
    let (dir, store, handle) = setup();
    write_json(dir.path(), "01.json", &bundle(vec![patient("P1")]));
    write_json(dir.path(), "02.json", &bundle(vec![encounter("E1")]));
    write_json(dir.path(), "03.json", &bundle(vec![patient("P3")]));

    let summary = BundleImporter::new(store)
        .with_policy(AbortPolicy::PerFile)
        .run(dir.path())
        .await
        .unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.files_imported(), 2);
    assert_eq!(summary.files_failed(), 1);
    assert!(summary.failed[0].path.ends_with("02.json"));
    assert!(summary.failed[0].error.is_missing_patient_context());

    assert_eq!(handle.count("patient").await, 2);
    assert_eq!(handle.count("encounter").await, 0);
    assert!(handle.is_closed().await);
}

#[tokio::test]
async fn test_missing_resource_type_under_both_policies() {
    let no_type = json!({"type": "collection", "entry": []});

    // Whole run: aborts before the later file.
    let (dir, store, handle) = setup();
    write_json(dir.path(), "a.json", &no_type);
    write_json(dir.path(), "b.json", &bundle(vec![patient("P1")]));

    let err = BundleImporter::new(store)
        .run(dir.path())
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Decode);
    assert!(err.path().unwrap().ends_with("a.json"));
    assert_eq!(handle.count("patient").await, 0);
    assert!(handle.is_closed().await);

    // Per file: the later file is still imported.
    let (dir, store, handle) = setup();
    write_json(dir.path(), "a.json", &no_type);
    write_json(dir.path(), "b.json", &bundle(vec![patient("P1")]));

    let summary = BundleImporter::new(store)
        .with_policy(AbortPolicy::PerFile)
        .run(dir.path())
        .await
        .unwrap();
    assert_eq!(summary.files_failed(), 1);
    assert_eq!(summary.failed[0].error.category(), ErrorCategory::Decode);
    assert_eq!(summary.files_imported(), 1);
    assert_eq!(handle.count("patient").await, 1);
}

#[tokio::test]
async fn test_unhandled_kinds_are_skipped() {
    let (dir, store, handle) = setup();
    write_json(
        dir.path(),
        "mixed.json",
        &bundle(vec![
            json!({"resourceType": "Organization", "id": "ORG1"}),
            patient("P1"),
            json!({"resourceType": "Claim", "id": "CL1"}),
        ]),
    );

    let summary = BundleImporter::new(store).run(dir.path()).await.unwrap();

    assert_eq!(summary.imported[0].entries, 3);
    assert_eq!(summary.imported[0].skipped, 2);
    assert_eq!(handle.count("patient").await, 1);
}

#[tokio::test]
async fn test_shared_participant_across_encounters() {
    let (dir, store, handle) = setup();
    write_json(
        dir.path(),
        "p.json",
        &bundle(vec![patient("P1"), encounter("E1"), encounter("E2")]),
    );

    BundleImporter::new(store).run(dir.path()).await.unwrap();

    let tables = handle.snapshot().await;
    assert_eq!(tables.count("participant"), 1);
    assert_eq!(tables.count("encounter_participant"), 2);
}

#[tokio::test]
async fn test_empty_directory() {
    let (dir, store, handle) = setup();
    std::fs::write(dir.path().join("README.md"), "not a bundle").unwrap();

    let summary = BundleImporter::new(store).run(dir.path()).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.files_imported(), 0);
    assert!(summary.rows().is_empty());
    assert!(handle.is_closed().await);
}

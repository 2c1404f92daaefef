//! End-to-end verification protocol through the portal facade.

use cert_portal::core::caller::Caller;
use cert_portal::core::config::{PortalConfig, StorageBackendKind};
use cert_portal::core::errors::{PortalError, INVALID_CODE_MESSAGE};
use cert_portal::core::record::{CertificateSubmission, CodeMatch};
use cert_portal::service::CertificatePortal;
use cert_portal::storage::MemoryStore;
use cert_portal::anomaly_detection::AnomalyDetector;
use cert_portal::verification::ScriptedCodeGenerator;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use chrono::NaiveDate;
use std::sync::Arc;

fn create_portal(codes: &[&str]) -> CertificatePortal {
    let mut config = PortalConfig::default();
    config.storage.backend = StorageBackendKind::Memory;
    let detector = AnomalyDetector::with_rng(config.detector.clone(), StdRng::seed_from_u64(7));
    CertificatePortal::with_components(
        config,
        Arc::new(MemoryStore::new()),
        detector,
        Arc::new(ScriptedCodeGenerator::new(codes.iter().copied())),
    )
    .unwrap()
}

fn abc() -> Caller {
    Caller::institution("ABC University")
}

#[test]
fn test_verify_rotate_grace_then_exhausted() {
    let portal = create_portal(&["AB12CD34", "5E6F7A8B"]);
    let created = portal
        .submit_certificate(
            &abc(),
            CertificateSubmission::new("ABC University").with_external_id("X1"),
            Some("/uploads/x1.pdf"),
        )
        .unwrap()
        .record;
    assert_eq!(created.verification_code(), "AB12CD34");
    assert!(!created.is_verified);

    let first = portal.verify("AB12CD34").unwrap();
    assert_eq!(first.original_code, "AB12CD34");
    assert_eq!(first.matched, CodeMatch::Current);
    assert!(first.record.is_verified);
    assert_ne!(first.record.verification_code(), "AB12CD34");
    assert_eq!(first.record.previous_verification_code(), Some("AB12CD34"));

    let second = portal.verify("AB12CD34").unwrap();
    assert_eq!(second.record.id, first.record.id);
    assert_eq!(second.original_code, "AB12CD34");
    assert_eq!(second.matched, CodeMatch::Previous);
    assert_eq!(second.record.verification_code(), first.record.verification_code());
    assert!(second.record.is_verified);

    let third = portal.verify("AB12CD34").unwrap_err();
    assert!(matches!(third, PortalError::NotFound(ref msg) if msg == INVALID_CODE_MESSAGE));
}

#[test]
fn test_code_two_generations_old_never_matches() {
    let portal = create_portal(&["AAAA0001", "AAAA0002", "AAAA0003"]);
    portal
        .submit_certificate(&abc(), CertificateSubmission::new("ABC University"), Some("/f.pdf"))
        .unwrap();

    portal.verify("AAAA0001").unwrap();
    portal.verify("AAAA0002").unwrap();
    assert!(matches!(portal.verify("AAAA0001"), Err(PortalError::NotFound(_))));

    let latest = portal.verify("AAAA0003").unwrap();
    assert_eq!(latest.record.verification_count, 3);
}

#[test]
fn test_unknown_code_is_indistinguishable() {
    let portal = create_portal(&[]);
    let unknown = portal.verify("FFFFFFFF").unwrap_err();
    let blank = portal.verify("").unwrap_err();
    assert_eq!(unknown.to_string(), blank.to_string());
}

#[test]
fn test_duplicate_external_id_leaves_store_unchanged() {
    let portal = create_portal(&[]);
    portal
        .submit_certificate(
            &abc(),
            CertificateSubmission::new("ABC University").with_external_id("X1"),
            Some("/a.pdf"),
        )
        .unwrap();
    let before = portal.store().all_records().unwrap();

    let err = portal
        .submit_certificate(
            &abc(),
            CertificateSubmission::new("ABC University").with_external_id("X1"),
            Some("/b.pdf"),
        )
        .unwrap_err();
    assert!(matches!(err, PortalError::DuplicateExternalId(ref id) if id == "X1"));
    assert_eq!(portal.store().all_records().unwrap(), before);
}

#[test]
fn test_revoked_certificate_still_resolves_and_frees_external_id() {
    let portal = create_portal(&["C0DE0001"]);
    let id = portal
        .submit_certificate(
            &abc(),
            CertificateSubmission::new("ABC University").with_external_id("X1"),
            Some("/a.pdf"),
        )
        .unwrap()
        .record
        .id;
    portal.revoke(&abc(), &id).unwrap();

    let outcome = portal.verify("C0DE0001").unwrap();
    assert!(outcome.record.is_revoked);

    portal
        .submit_certificate(
            &abc(),
            CertificateSubmission::new("ABC University").with_external_id("X1"),
            Some("/reissued.pdf"),
        )
        .unwrap();
    assert_eq!(portal.store().count().unwrap(), 2);
}

#[test]
fn test_analysis_follow_up_with_original_code() {
    let portal = create_portal(&["AB12CD34"]);
    portal
        .submit_certificate(
            &abc(),
            CertificateSubmission::new("ABC University")
                .with_external_id("X1")
                .with_subject("12345678901")
                .with_program("BSc Computer Science")
                .with_grade("A")
                .with_dates(
                    NaiveDate::from_ymd_opt(2019, 10, 1).unwrap(),
                    NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
                ),
            Some("/x1.pdf"),
        )
        .unwrap();

    portal.verify("AB12CD34").unwrap();
    let analysis = portal.analyze("AB12CD34").unwrap();
    assert_eq!(analysis.outcome.matched, CodeMatch::Previous);
    assert!(analysis.insights.iter().any(|i| i.title == "Issuer Analysis"));
    assert!(analysis.insights.iter().any(|i| i.title == "Standard Timeline"));
    assert!(analysis.confidence > 0.8 && analysis.confidence < 1.0);
}

#[test]
fn test_concurrent_verifications_of_one_code_are_serialized() {
    const THREADS: usize = 16;
    let portal = Arc::new(create_portal(&["AB12CD34"]));
    portal
        .submit_certificate(&abc(), CertificateSubmission::new("ABC University"), Some("/x1.pdf"))
        .unwrap();

    let barrier = Arc::new(std::sync::Barrier::new(THREADS));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let portal = Arc::clone(&portal);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                portal.verify("AB12CD34")
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let rotated = results.iter().filter(|r| matches!(r, Ok(o) if o.rotated)).count();
    let grace = results
        .iter()
        .filter(|r| matches!(r, Ok(o) if o.matched == CodeMatch::Previous))
        .count();
    let refused = results.iter().filter(|r| matches!(r, Err(PortalError::NotFound(_)))).count();
    assert_eq!(rotated, 1);
    assert_eq!(grace, 1);
    assert_eq!(refused, THREADS - 2);

    let record = portal.store().find_by_active_or_previous_code("AB12CD34").unwrap();
    assert!(record.is_none());
    let all = portal.store().all_records().unwrap();
    assert_eq!(all[0].verification_count, 1);
    assert!(all[0].is_verified);
}

use cert_portal::anomaly_detection::{ForestParams, IsolationForest};
use cert_portal::core::record::{CertificateRecord, CertificateSubmission};
use cert_portal::storage::{CertificateStore, MemoryStore};
use cert_portal::verification::{RandomCodeGenerator, VerificationManager};
use chrono::Utc;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

fn vectors(rows: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Vec<f64>>> {
    proptest::collection::vec(proptest::collection::vec(0.0f64..500.0, 6), rows)
}

/// Which code the next lookup uses.
#[derive(Debug, Clone, Copy)]
enum Lookup {
    Current,
    Previous,
    Stale,
}

fn lookup() -> impl Strategy<Value = Lookup> {
    prop_oneof![Just(Lookup::Current), Just(Lookup::Previous), Just(Lookup::Stale)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn score_stays_in_unit_interval(
        training in vectors(5..40),
        probe in proptest::collection::vec(-1000.0f64..1000.0, 6),
        seed in any::<u64>()
    ) {
        let mut rng = StdRng::seed_from_u64(seed);
        let forest = IsolationForest::fit(&training, ForestParams::default(), &mut rng).unwrap();
        let score = forest.predict(&probe);
        prop_assert!(score > 0.0 && score <= 1.0, "score {} out of bounds", score);
        for row in &training {
            let s = forest.predict(row);
            prop_assert!(s > 0.0 && s <= 1.0);
        }
    }

    #[test]
    fn verified_flag_is_monotonic(ops in proptest::collection::vec(lookup(), 1..25)) {
        let store = MemoryStore::new();
        let record = CertificateRecord::new(
            CertificateSubmission::new("ABC University"),
            "/f.pdf",
            "AB12CD34",
            Utc::now(),
        );
        let id = record.id.clone();
        store.append(record).unwrap();
        let manager = VerificationManager::new(Arc::new(RandomCodeGenerator::new()), 8);

        let mut seen_verified = false;
        let mut stale = Vec::new();
        for op in ops {
            let current = store.find_by_id(&id).unwrap().unwrap();
            let code = match op {
                Lookup::Current => current.verification_code().to_string(),
                Lookup::Previous => current
                    .previous_verification_code()
                    .unwrap_or("00000000")
                    .to_string(),
                Lookup::Stale => stale.first().cloned().unwrap_or_else(|| "FFFFFFFF".to_string()),
            };
            if let Ok(outcome) = manager.verify(&store, &code) {
                if outcome.rotated {
                    stale.push(code);
                }
            }

            let after = store.find_by_id(&id).unwrap().unwrap();
            prop_assert!(!(seen_verified && !after.is_verified));
            seen_verified |= after.is_verified;
        }
    }
}

/// Property-based tests for batch classification and tallying
///
/// Uses proptest to check invariants that must hold for any input:
/// interval merging, tie-breaking, order independence, bounded proportions
/// and the complete/partial/missing partition of the truth set.
use proptest::prelude::*;

use tnseval::batch::Batch;
use tnseval::classify::{combined_length, BatchClassifier, Classification, EvalConfig};
use tnseval::mapping::PafRecord;
use tnseval::reference::{GeneMap, Reference, TruthSet};
use tnseval::tally::{ReconstructionState, TallyEngine};

fn record(
    (query_start, query_end): (u32, u32),
    target: &str,
    (ref_start, ref_end, ref_len): (u32, u32, u32),
    matches: u32,
) -> PafRecord {
    PafRecord {
        query_name: "c1".to_string(),
        query_len: query_end,
        query_start,
        query_end,
        strand: '+',
        ref_name: target.to_string(),
        ref_len,
        ref_start,
        ref_end,
        matches,
        block_len: (query_end - query_start).max(matches).max(1),
        quality: 60,
        cigar: None,
        max_indel: 0,
    }
}

/// Ten transcripts t0..t9 in five genes of two; t0..t4 are truth
fn reference() -> Reference {
    let mut genes = GeneMap::new();
    for i in 0..10 {
        genes.insert(&format!("t{i}"), &format!("g{}", i / 2));
    }
    Reference {
        genes,
        truth: (0..5).map(|i| format!("t{i}")).collect::<TruthSet>(),
        tpm_bins: None,
    }
}

fn interval() -> impl Strategy<Value = (u32, u32)> {
    (0u32..5_000, 1u32..5_000).prop_map(|(start, len)| (start, start + len))
}

proptest! {
    #[test]
    fn prop_combined_length_symmetric_and_bounded(a in interval(), b in interval()) {
        let ab = combined_length(a.0, a.1, b.0, b.1);
        let ba = combined_length(b.0, b.1, a.0, a.1);
        prop_assert_eq!(ab, ba);

        let (len_a, len_b) = (a.1 - a.0, b.1 - b.0);
        prop_assert!(ab >= len_a.max(len_b));
        prop_assert!(ab <= len_a + len_b);

        // union span when the intervals touch or overlap
        if a.0 <= b.1 && b.0 <= a.1 {
            prop_assert_eq!(ab, a.1.max(b.1) - a.0.min(b.0));
        }
    }

    #[test]
    fn prop_tie_goes_to_truth_transcript(
        q in interval(),
        matches in 1u32..1000,
        truth_idx in 0usize..5,
        other_idx in 5usize..10,
    ) {
        let reference = reference();
        let config = EvalConfig { min_pid: 0.0, ..EvalConfig::default() };
        let classifier = BatchClassifier::new(&config, &reference);

        let truth_t = format!("t{truth_idx}");
        let other_t = format!("t{other_idx}");
        let a = record(q, &truth_t, (0, 100, 100), matches);
        let b = record(q, &other_t, (0, 100, 100), matches);

        for records in [vec![a.clone(), b.clone()], vec![b, a]] {
            let result = classifier.classify(&Batch::from_records("c1", records)).unwrap();
            match result {
                Some(Classification::Reconstruction { transcript, .. }) => {
                    prop_assert_eq!(transcript, truth_t.clone())
                }
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn prop_classification_independent_of_record_order(
        qa in interval(),
        qb in interval(),
        ta in 0usize..10,
        tb in 0usize..10,
        ma in 1u32..1000,
        mb in 1u32..1000,
    ) {
        prop_assume!(ma != mb);
        let reference = reference();
        let config = EvalConfig::default();
        let classifier = BatchClassifier::new(&config, &reference);

        let a = record(qa, &format!("t{ta}"), (0, 100, 100), ma);
        let b = record(qb, &format!("t{tb}"), (0, 100, 100), mb);

        let ab = classifier.classify(&Batch::from_records("c1", vec![a.clone(), b.clone()])).unwrap();
        let ba = classifier.classify(&Batch::from_records("c1", vec![b, a])).unwrap();
        prop_assert_eq!(ab, ba);
    }

    #[test]
    fn prop_reconstruction_proportion_in_unit_interval(
        q in interval(),
        start in 0u32..1000,
        len in 0u32..1000,
        extra in 1u32..1000,
    ) {
        let reference = reference();
        let config = EvalConfig { min_pid: 0.0, ..EvalConfig::default() };
        let classifier = BatchClassifier::new(&config, &reference);
        let rec = record(q, "t0", (start, start + len, start + len + extra), 10);
        let result = classifier.classify(&Batch::from_records("c1", vec![rec])).unwrap();
        match result {
            Some(Classification::Reconstruction { proportion, .. }) => {
                prop_assert!((0.0..=1.0).contains(&proportion))
            }
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn prop_truth_set_partition(
        reconstructions in proptest::collection::vec((0usize..10, 0.0f64..=1.0), 0..40),
    ) {
        let reference = reference();
        let mut tally = TallyEngine::new(0.95, &reference);
        for (i, (t, p)) in reconstructions.iter().enumerate() {
            tally.record(&Classification::Reconstruction {
                contig: format!("c{i}"),
                transcript: format!("t{t}"),
                proportion: *p,
                identity: 1.0,
            });
        }
        let summary = tally.finalize().unwrap();

        prop_assert_eq!(
            summary.complete.len() + summary.partial.len() + summary.missing.len(),
            reference.truth.len()
        );
        for category in [&summary.complete, &summary.partial, &summary.missing, &summary.false_positive] {
            prop_assert_eq!(category.all.len(), category.stg.len() + category.mtg.len());
        }
        for (_, p) in tally.state().iter() {
            prop_assert!((0.0..=1.0).contains(&p));
        }
        prop_assert_eq!(tally.counts().total(), reconstructions.len());
    }

    #[test]
    fn prop_redundancy_counts_extra_complete_contigs(
        proportions in proptest::collection::vec(0.0f64..=1.0, 0..30),
    ) {
        let mut state = ReconstructionState::new();
        let mut previous = 0;
        for (i, p) in proportions.iter().enumerate() {
            state.update("t0", &format!("c{i}"), *p, 0.95);
            prop_assert!(state.num_redundant() >= previous);
            previous = state.num_redundant();
        }
        let full = proportions.iter().filter(|p| **p >= 0.95).count();
        prop_assert_eq!(state.num_redundant(), full.saturating_sub(1));
        prop_assert_eq!(state.complete_contigs("t0").len(), full);
    }
}

//! Property-based tests for invariants using proptest
//!
//! These tests verify that certain properties hold true for all inputs:
//! - Threshold classification is monotone in the sampled value
//! - Classification is total and agrees with the pair boundaries
//! - Topic mapping is total over arbitrary keys
//! - Quiet-hours membership is consistent with its complement

use node_warden::config::QuietHours;
use node_warden::thresholds::{ThresholdPair, classify};
use node_warden::{AlertKey, Severity, Topic};
use proptest::prelude::*;

// Property: severity never decreases as the sampled value increases
proptest! {
    #[test]
    fn prop_classification_is_monotone(
        value1 in -1000.0f64..1000.0f64,
        value2 in -1000.0f64..1000.0f64,
        warning in 0.0f64..100.0f64,
        delta in 0.1f64..100.0f64,
    ) {
        let critical = warning + delta;
        let (low, high) = if value1 <= value2 { (value1, value2) } else { (value2, value1) };

        let low_severity = classify(low, warning, critical);
        let high_severity = classify(high, warning, critical);

        prop_assert!(low_severity <= high_severity);
    }
}

// Property: classification lands exactly on the boundary tiers
proptest! {
    #[test]
    fn prop_classification_respects_boundaries(
        warning in 0.0f64..100.0f64,
        delta in 0.1f64..100.0f64,
    ) {
        let critical = warning + delta;

        prop_assert_eq!(classify(warning - 0.0001, warning, critical), Severity::Ok);
        prop_assert_eq!(classify(warning, warning, critical), Severity::Warning);
        prop_assert_eq!(classify(critical, warning, critical), Severity::Critical);
    }
}

// Property: a valid pair always classifies into exactly one tier
proptest! {
    #[test]
    fn prop_classification_is_total(
        value in -1e9f64..1e9f64,
        warning in -1e6f64..1e6f64,
        delta in 0.001f64..1e6f64,
    ) {
        let severity = classify(value, warning, warning + delta);
        prop_assert!(matches!(
            severity,
            Severity::Ok | Severity::Warning | Severity::Critical
        ));
    }
}

// Property: pair validation accepts exactly critical > warning
proptest! {
    #[test]
    fn prop_pair_validation(
        warning in -1e6f64..1e6f64,
        critical in -1e6f64..1e6f64,
    ) {
        let pair = ThresholdPair::new(warning, critical);
        prop_assert_eq!(pair.validate("metric").is_ok(), critical > warning);
    }
}

// Property: every key, however odd, maps to exactly one topic
proptest! {
    #[test]
    fn prop_topic_mapping_is_total(key in "[a-z0-9-]{0,40}") {
        let _topic = Topic::for_key(&AlertKey::new(key));
        // no panic is the property; the fallback arm guarantees totality
    }
}

// Property: known prefixes always win over the fallback
proptest! {
    #[test]
    fn prop_known_prefixes_never_fall_back(suffix in "[a-z0-9]{1,20}") {
        let key = AlertKey::new(format!("disk-{suffix}"));
        prop_assert_eq!(Topic::for_key(&key), Topic::Disk);

        let key = AlertKey::new(format!("svc-{suffix}"));
        prop_assert_eq!(Topic::for_key(&key), Topic::Services);
    }
}

// Property: an hour is inside a quiet window or its complement, never both
proptest! {
    #[test]
    fn prop_quiet_hours_partition_the_day(
        start in 0u32..24u32,
        end in 0u32..24u32,
        hour in 0u32..24u32,
    ) {
        prop_assume!(start != end);

        let window = QuietHours { start_hour: start, end_hour: end };
        let complement = QuietHours { start_hour: end, end_hour: start };

        prop_assert_ne!(window.contains(hour), complement.contains(hour));
    }
}

// Property: severity ordering is the escalation order
#[test]
fn test_severity_escalation_order() {
    let mut tiers = [
        Severity::Critical,
        Severity::Ok,
        Severity::Warning,
        Severity::Info,
    ];
    tiers.sort();
    assert_eq!(
        tiers,
        [
            Severity::Ok,
            Severity::Info,
            Severity::Warning,
            Severity::Critical
        ]
    );
}

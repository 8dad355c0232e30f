use qsa_db::EngraveDb;
use qsa_interface::{ErrorCode, Revision};

use crate::{MappingUpsert, MatchType, SkuResolver};

fn resolver() -> SkuResolver {
    SkuResolver::new(EngraveDb::in_memory().unwrap())
}

fn mapping(pattern: &str, match_type: MatchType, code: &str, priority: u16) -> MappingUpsert {
    MappingUpsert {
        legacy_pattern: pattern.to_string(),
        match_type,
        canonical_code: code.to_string(),
        revision: None,
        priority,
        is_active: true,
    }
}

#[test]
fn native_skus_resolve_structurally() {
    let resolver = resolver();

    let plain = resolver.resolve("CUBE-00001").unwrap().unwrap();
    assert_eq!(plain.design.as_str(), "CUBE");
    assert_eq!(plain.revision, None);
    assert!(!plain.is_legacy);

    let revised = resolver.resolve("STARa-34924").unwrap().unwrap();
    assert_eq!(revised.design.as_str(), "STAR");
    assert_eq!(revised.revision, Some(Revision::try_new('a').unwrap()));
    assert!(!revised.is_legacy);
}

#[test]
fn malformed_skus_fall_through_to_none() {
    let resolver = resolver();
    assert!(resolver.resolve("CUBE-1").unwrap().is_none());
    assert!(resolver.resolve("CUBEa34924").unwrap().is_none());
    assert!(resolver.resolve("").unwrap().is_none());
}

#[test]
fn exact_mapping_wins_before_prefix() {
    let resolver = resolver();
    resolver
        .create_mapping(&mapping("LED-OLD-77", MatchType::Exact, "CUBE", 10))
        .unwrap();
    resolver
        .create_mapping(&mapping("LED-OLD", MatchType::Prefix, "STAR", 1))
        .unwrap();

    let resolved = resolver.resolve("led-old-77").unwrap().unwrap();
    assert_eq!(resolved.design.as_str(), "CUBE");
    assert!(resolved.is_legacy);

    // Anything else starting with the prefix falls to the prefix rule.
    let resolved = resolver.resolve("LED-OLD-123").unwrap().unwrap();
    assert_eq!(resolved.design.as_str(), "STAR");
}

#[test]
fn longest_prefix_wins_then_priority() {
    let resolver = resolver();
    resolver
        .create_mapping(&mapping("QX", MatchType::Prefix, "AAAA", 1))
        .unwrap();
    resolver
        .create_mapping(&mapping("QX-PRO", MatchType::Prefix, "BBBB", 50))
        .unwrap();

    let resolved = resolver.resolve("QX-PRO-500").unwrap().unwrap();
    assert_eq!(resolved.design.as_str(), "BBBB");
}

#[test]
fn suffix_and_regex_passes() {
    let resolver = resolver();
    resolver
        .create_mapping(&mapping("-RGBW", MatchType::Suffix, "CUBE", 1))
        .unwrap();
    resolver
        .create_mapping(&mapping(r"^B[0-9]{3}-", MatchType::Regex, "STAR", 1))
        .unwrap();

    assert_eq!(
        resolver.resolve("panel-rgbw").unwrap().unwrap().design.as_str(),
        "CUBE"
    );
    assert_eq!(
        resolver.resolve("B123-X").unwrap().unwrap().design.as_str(),
        "STAR"
    );
}

#[test]
fn mapping_revision_is_carried() {
    let resolver = resolver();
    resolver
        .create_mapping(&MappingUpsert {
            revision: Some(Revision::try_new('b').unwrap()),
            ..mapping("OLDSKU", MatchType::Exact, "CUBE", 1)
        })
        .unwrap();

    let resolved = resolver.resolve("OLDSKU").unwrap().unwrap();
    assert_eq!(resolved.revision, Some(Revision::try_new('b').unwrap()));
}

#[test]
fn inactive_mappings_are_skipped() {
    let resolver = resolver();
    resolver
        .create_mapping(&MappingUpsert {
            is_active: false,
            ..mapping("GHOST", MatchType::Exact, "CUBE", 1)
        })
        .unwrap();
    assert!(resolver.resolve("GHOST").unwrap().is_none());
}

#[test]
fn cache_is_invalidated_by_mapping_changes() {
    let resolver = resolver();
    assert!(resolver.resolve("LEGACY-1").unwrap().is_none());

    resolver
        .create_mapping(&mapping("LEGACY-1", MatchType::Exact, "CUBE", 1))
        .unwrap();
    // A stale memo would still say None here.
    assert!(resolver.resolve("LEGACY-1").unwrap().is_some());
}

#[test]
fn duplicate_patterns_are_rejected_case_insensitively() {
    let resolver = resolver();
    resolver
        .create_mapping(&mapping("Old-Led", MatchType::Exact, "CUBE", 1))
        .unwrap();
    let err = resolver
        .create_mapping(&mapping("OLD-LED", MatchType::Exact, "STAR", 2))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::DuplicatePattern);

    // The same pattern under a different match type is fine.
    resolver
        .create_mapping(&mapping("OLD-LED", MatchType::Prefix, "STAR", 2))
        .unwrap();
}

#[test]
fn invalid_writes_are_rejected() {
    let resolver = resolver();

    let err = resolver
        .create_mapping(&mapping(&"x".repeat(65), MatchType::Exact, "CUBE", 1))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PatternTooLong);

    let err = resolver
        .create_mapping(&mapping("[unclosed", MatchType::Regex, "CUBE", 1))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidRegex);

    let err = resolver
        .create_mapping(&mapping("FINE", MatchType::Exact, "TOOLONG", 1))
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidSkuFormat);
}

#[test]
fn test_pattern_dry_runs() {
    let resolver = resolver();
    assert!(resolver
        .test_pattern("LED", MatchType::Prefix, "led-55")
        .unwrap());
    assert!(!resolver
        .test_pattern("LED", MatchType::Suffix, "led-55")
        .unwrap());
    assert!(resolver
        .test_pattern(r"\d{2}$", MatchType::Regex, "led-55")
        .unwrap());
    assert_eq!(
        resolver
            .test_pattern("[bad", MatchType::Regex, "x")
            .unwrap_err()
            .code,
        ErrorCode::InvalidRegex
    );
}

#[test]
fn update_and_delete_mappings() {
    let resolver = resolver();
    let id = resolver
        .create_mapping(&mapping("OLD", MatchType::Exact, "CUBE", 1))
        .unwrap();

    resolver
        .update_mapping(id, &mapping("OLD", MatchType::Exact, "STAR", 1))
        .unwrap();
    assert_eq!(
        resolver.resolve("OLD").unwrap().unwrap().design.as_str(),
        "STAR"
    );

    resolver.delete_mapping(id).unwrap();
    assert!(resolver.resolve("OLD").unwrap().is_none());
    assert_eq!(
        resolver.delete_mapping(id).unwrap_err().code,
        ErrorCode::NotFound
    );
}

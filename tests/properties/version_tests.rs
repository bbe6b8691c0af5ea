use std::cmp::Ordering;

use proptest::prelude::*;

use ucm_updater::updater::Version;

fn arb_version() -> impl Strategy<Value = Version> {
    (0u64..1000, 0u64..1000, 0u64..1000).prop_map(|(a, b, c)| Version::new(a, b, c))
}

proptest! {
    #[test]
    fn tag_form_parses_back(version in arb_version()) {
        prop_assert_eq!(Version::parse(&version.to_tag()).unwrap(), version);
        prop_assert_eq!(Version::parse(&version.to_string()).unwrap(), version);
    }

    #[test]
    fn zero_padded_tags_parse_back(version in arb_version()) {
        let padded = format!("v{:02}.{:02}.{:03}", version.major, version.minor, version.patch);
        prop_assert_eq!(Version::parse(&padded).unwrap(), version);
    }

    #[test]
    fn ordering_is_lexicographic_on_triple(a in arb_version(), b in arb_version()) {
        let expected = (a.major, a.minor, a.patch).cmp(&(b.major, b.minor, b.patch));
        prop_assert_eq!(a.cmp(&b), expected);
        prop_assert_eq!(b.cmp(&a), expected.reverse());
    }

    #[test]
    fn ordering_is_transitive(a in arb_version(), b in arb_version(), c in arb_version()) {
        if a <= b && b <= c {
            prop_assert!(a <= c);
        }
    }

    #[test]
    fn suffixes_do_not_affect_equality(
        version in arb_version(),
        pre in "[a-z]{1,6}(\\.[1-9][0-9]?)?",
        build in "[a-z0-9]{1,8}",
    ) {
        let tagged = format!("v{version}-{pre}+{build}");
        let parsed = Version::parse(&tagged).unwrap();
        prop_assert_eq!(parsed.cmp(&version), Ordering::Equal);
    }

    #[test]
    fn garbage_never_panics(input in ".{0,24}") {
        let _ = Version::parse(&input);
    }

    #[test]
    fn two_part_versions_are_rejected(a in 0u64..100, b in 0u64..100) {
        let input = format!("v{a}.{b}");
        prop_assert!(Version::parse(&input).is_err());
    }
}

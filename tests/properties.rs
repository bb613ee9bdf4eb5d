//! Property-based tests for the laws in the public contract.

use std::net::Ipv4Addr;

use patricia_store::{DiffEvent, Ipv4Net, PrefixMap, PrefixSet, Range};
use proptest::prelude::*;

fn arb_prefix() -> impl Strategy<Value = Ipv4Net> {
    (any::<u32>(), 0u8..=32).prop_map(|(addr, len)| {
        Ipv4Net::new(Ipv4Addr::from(addr), len).unwrap()
    })
}

fn map_of(entries: &[(Ipv4Net, i32)]) -> PrefixMap<i32> {
    let map = PrefixMap::new();
    for (key, value) in entries {
        let _ = map.insert_or_update(*key, *value);
    }
    map
}

fn set_of(entries: &[Ipv4Net]) -> PrefixSet {
    let set = PrefixSet::new();
    for key in entries {
        let _ = set.insert(*key);
    }
    set
}

proptest! {
    #[test]
    fn aggregate_is_idempotent(entries in prop::collection::vec((arb_prefix(), any::<i32>()), 0..30)) {
        let map = map_of(&entries);
        let once = map.snapshot().aggregate();
        let twice = once.aggregate();
        prop_assert!(once.equals(&twice));
    }

    #[test]
    fn aggregate_preserves_every_address_longest_match(
        entries in prop::collection::vec((arb_prefix(), any::<i32>()), 0..30),
        query in any::<u32>(),
    ) {
        let map = map_of(&entries);
        let snapshot = map.snapshot();
        let aggregated = snapshot.aggregate();
        let addr = Ipv4Addr::from(query);
        let original = snapshot.longest_match(addr).map(|(_, v, k)| (v, k));
        let reduced = aggregated.longest_match(addr).map(|(_, v, k)| (v, k));
        prop_assert_eq!(original, reduced);
    }

    #[test]
    fn diff_of_a_table_against_itself_is_empty(
        entries in prop::collection::vec((arb_prefix(), any::<i32>()), 0..30),
    ) {
        let map = map_of(&entries);
        let snapshot = map.snapshot();
        let mut events = 0;
        snapshot.diff(&snapshot, |_event| {
            events += 1;
            true
        });
        prop_assert_eq!(events, 0);
    }

    #[test]
    fn diff_against_a_modified_copy_only_reports_changed_values(
        entries in prop::collection::vec((arb_prefix(), any::<i32>()), 1..30),
        bumps in prop::collection::vec(any::<i32>(), 1..30),
    ) {
        let a = map_of(&entries);
        let b = map_of(&entries);
        for ((key, _), bump) in entries.iter().zip(bumps.iter()) {
            if *bump != 0 {
                let _ = b.insert_or_update(*key, bump.wrapping_add(1));
            }
        }
        let mut saw_add_or_remove = false;
        a.snapshot().diff(&b.snapshot(), |event| {
            if matches!(event, DiffEvent::Added(..) | DiffEvent::Removed(..)) {
                saw_add_or_remove = true;
            }
            true
        });
        prop_assert!(!saw_add_or_remove);
    }

    #[test]
    fn union_is_commutative(
        a_entries in prop::collection::vec(arb_prefix(), 0..20),
        b_entries in prop::collection::vec(arb_prefix(), 0..20),
    ) {
        let a = set_of(&a_entries);
        let b = set_of(&b_entries);
        let ab = a.union(&b);
        let ba = b.union(&a);
        prop_assert!(ab.equals(&ba));
    }

    #[test]
    fn difference_and_intersection_partition_the_original_set(
        a_entries in prop::collection::vec(arb_prefix(), 0..20),
        b_entries in prop::collection::vec(arb_prefix(), 0..20),
    ) {
        let a = set_of(&a_entries);
        let b = set_of(&b_entries);
        let reunited = a.difference(&b).union(&a.intersection(&b));
        prop_assert!(reunited.equals(&a));
    }

    #[test]
    fn a_is_a_subset_of_its_union_with_b(
        a_entries in prop::collection::vec(arb_prefix(), 0..20),
        b_entries in prop::collection::vec(arb_prefix(), 0..20),
    ) {
        let a = set_of(&a_entries);
        let b = set_of(&b_entries);
        let u = a.union(&b);
        for key in &a_entries {
            prop_assert!(u.contains(*key));
        }
    }

    #[test]
    fn range_round_trips_through_its_minimal_prefix_cover(
        first in any::<u32>(),
        width in 0u32..4096,
    ) {
        let last = first.saturating_add(width);
        let range = Range::new(first.min(last), first.max(last));
        let prefixes = range.to_prefixes();

        let set = PrefixSet::new();
        for prefix in &prefixes {
            set.insert(*prefix).unwrap();
        }
        prop_assert_eq!(set.num_addresses(), u64::from(range.last - range.first) + 1);
        prop_assert!(set.contains(Ipv4Addr::from(range.first)));
        prop_assert!(set.contains(Ipv4Addr::from(range.last)));
    }
}

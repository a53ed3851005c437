//! Region algebra: sort order, gap policy, over-read accounting.

use coread::io::IoStatistics;
use coread::region::{coalesce, Region};

fn regions(pairs: &[(u64, u64)]) -> Vec<Region> {
    pairs.iter()
        .map(|&(offset, length)| Region::new(offset, length))
        .collect()
}

#[test]
fn merges_adjacent_regions_within_gap() {
    let stats = IoStatistics::new();
    let mut set = regions(&[(0, 10), (12, 8)]);

    coalesce(&mut set, 4, Some(&stats));

    assert_eq!(set, regions(&[(0, 20)]));
    assert_eq!(stats.raw_overread_bytes(), 2);
}

#[test]
fn keeps_distant_regions_apart() {
    let stats = IoStatistics::new();
    let mut set = regions(&[(0, 10), (12, 8)]);

    coalesce(&mut set, 1, Some(&stats));

    assert_eq!(set, regions(&[(0, 10), (12, 8)]));
    assert_eq!(stats.raw_overread_bytes(), 0);
}

#[test]
fn absorbs_overlap_without_overread() {
    let stats = IoStatistics::new();
    let mut set = regions(&[(0, 100), (50, 200)]);

    coalesce(&mut set, 0, Some(&stats));

    assert_eq!(set, regions(&[(0, 250)]));
    assert_eq!(stats.raw_overread_bytes(), 0);
}

#[test]
fn collapses_duplicates() {
    let stats = IoStatistics::new();
    let mut set = regions(&[(100, 50), (100, 50)]);

    coalesce(&mut set, 0, Some(&stats));

    assert_eq!(set, regions(&[(100, 50)]));
    assert_eq!(stats.raw_overread_bytes(), 0);
}

#[test]
fn swallows_contained_regions() {
    let mut set = regions(&[(0, 100), (10, 20), (90, 10)]);

    coalesce(&mut set, 0, None);

    assert_eq!(set, regions(&[(0, 100)]));
}

#[test]
fn sorts_before_merging() {
    let mut set = regions(&[(40, 10), (0, 10), (12, 8)]);

    coalesce(&mut set, 4, None);

    assert_eq!(set, regions(&[(0, 20), (40, 10)]));
}

#[test]
fn sort_breaks_ties_by_length() {
    // Same offset, different lengths: the shorter one sorts first and is
    // swallowed by the longer one.
    let mut set = regions(&[(50, 40), (50, 10)]);

    coalesce(&mut set, 0, None);

    assert_eq!(set, regions(&[(50, 40)]));
}

#[test]
fn survivors_are_separated_by_more_than_the_merge_distance() {
    let max_merge_distance = 16;
    let mut set = regions(&[
        (0, 10),
        (20, 5),
        (100, 30),
        (120, 10),
        (400, 1),
        (500, 50),
    ]);

    coalesce(&mut set, max_merge_distance, None);

    for pair in set.windows(2) {
        let gap = pair[1].offset - pair[0].end();
        assert!(
            gap > max_merge_distance,
            "regions {:?} and {:?} should have been merged",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn every_mergeable_neighbor_pair_is_merged() {
    // Chain of regions each within the merge distance of its neighbor: the
    // whole chain must collapse into a single read.
    let mut set = regions(&[(0, 8), (10, 8), (20, 8), (30, 8)]);

    coalesce(&mut set, 2, None);

    assert_eq!(set, regions(&[(0, 38)]));
}

#[test]
fn overread_sums_positive_gaps_only() {
    let stats = IoStatistics::new();
    // Gaps after sort: 4 (merged, counted), overlap (merged, zero), then a
    // gap of 6 which exceeds the distance and starts a new region.
    let mut set = regions(&[(0, 10), (14, 6), (18, 4), (28, 4)]);

    coalesce(&mut set, 4, Some(&stats));

    assert_eq!(set, regions(&[(0, 22), (28, 4)]));
    assert_eq!(stats.raw_overread_bytes(), 4);
}

#[test]
fn empty_set_is_a_noop() {
    let mut set: Vec<Region> = Vec::new();
    coalesce(&mut set, 4, None);
    assert!(set.is_empty());
}

#[test]
#[should_panic(expected = "invalid region")]
fn zero_length_region_fails_fast() {
    let mut set = regions(&[(0, 10), (20, 0)]);
    coalesce(&mut set, 4, None);
}

#[test]
fn region_from_range() {
    let region = Region::from(128u64..160);
    assert_eq!(region, Region::new(128, 32));
    assert_eq!(region.end(), 160);
    assert!(!region.is_empty());
}

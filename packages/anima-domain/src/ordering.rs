use std::cmp::Ordering;

use crate::fragment::{FragmentMetadata, RetrievalResult};

#[derive(Clone, Copy, Debug)]
struct NarrativeKey {
	millis: i64,
	position: (i64, i64),
}
impl NarrativeKey {
	fn of(metadata: &FragmentMetadata) -> Self {
		Self { millis: metadata.timestamp_millis(), position: metadata.position() }
	}
}

/// Narrative reading order: timestamps when both sides carry distinct nonzero values,
/// otherwise `(batch, slice)` from the position key.
pub fn narrative_cmp(lhs: &FragmentMetadata, rhs: &FragmentMetadata) -> Ordering {
	key_cmp(&NarrativeKey::of(lhs), &NarrativeKey::of(rhs))
}

/// Sorts results into narrative order.
///
/// Keys are read once per result. `narrative_cmp` is not transitive once zero and nonzero
/// timestamps mix, so this runs a stable merge sort, which stays well-defined for any
/// comparator.
pub fn sort_narrative(results: &mut Vec<RetrievalResult>) {
	if results.len() < 2 {
		return;
	}

	let keyed = results
		.iter()
		.enumerate()
		.map(|(i, result)| (NarrativeKey::of(&result.fragment.metadata), i))
		.collect();
	let order = merge_sort(keyed);
	let mut slots: Vec<Option<RetrievalResult>> =
		std::mem::take(results).into_iter().map(Some).collect();

	*results = order.into_iter().filter_map(|(_, i)| slots[i].take()).collect();
}

fn key_cmp(lhs: &NarrativeKey, rhs: &NarrativeKey) -> Ordering {
	if lhs.millis != 0 && rhs.millis != 0 && lhs.millis != rhs.millis {
		return lhs.millis.cmp(&rhs.millis);
	}

	lhs.position.cmp(&rhs.position)
}

fn merge_sort(mut entries: Vec<(NarrativeKey, usize)>) -> Vec<(NarrativeKey, usize)> {
	if entries.len() < 2 {
		return entries;
	}

	let right = merge_sort(entries.split_off(entries.len() / 2));
	let left = merge_sort(entries);
	let mut merged = Vec::with_capacity(left.len() + right.len());
	let (mut i, mut j) = (0, 0);

	while i < left.len() && j < right.len() {
		// Ties keep the left entry.
		if key_cmp(&left[i].0, &right[j].0) == Ordering::Greater {
			merged.push(right[j]);

			j += 1;
		} else {
			merged.push(left[i]);

			i += 1;
		}
	}

	merged.extend_from_slice(&left[i..]);
	merged.extend_from_slice(&right[j..]);

	merged
}

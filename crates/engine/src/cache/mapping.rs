//! Flat ↔ typed paragraph mapping.
//!
//! The host's flat iterator and its typed enumerators disagree about how a
//! footnote looks and give no shared key, so the cache has to reconstruct
//! the bijection. With node ids the mapping is exact; without them a
//! heuristic walks both sides front to back, using the equivalence
//! comparator for every probe. The heuristic's output is checked against the
//! per-kind paragraph counts and repaired before publication.

use galley_host::{FlatSnapshot, KindSnapshot};
use galley_primitives::{Locale, TextCoord, TextKind, is_equal_text};
use rustc_hash::FxHashMap;

/// A freshly built mapping, negatives already compacted away.
#[derive(Debug, Default)]
pub(crate) struct MappingOutcome {
	pub to_text: Vec<TextCoord>,
	pub to_flat: FxHashMap<TextKind, Vec<isize>>,
	pub chapter_begins: FxHashMap<TextKind, Vec<usize>>,
	/// Flat paragraphs left `Unknown`.
	pub unmatched: usize,
	/// Typed paragraphs without a flat slot; non-zero means desync.
	pub unmatched_text: usize,
	pub dirty: bool,
}

/// Builds the mapping, exact when node ids are available on both sides.
pub(crate) fn build_mapping(flat: &FlatSnapshot, kinds: &[KindSnapshot]) -> MappingOutcome {
	let mut outcome = match map_by_node_ids(flat, kinds) {
		Some(outcome) => outcome,
		None => map_heuristic(flat, kinds),
	};
	outcome.chapter_begins = chapter_begins(flat, kinds, &outcome.to_flat);
	compact(&mut outcome);
	outcome
}

/// Exact mapping through stable node identifiers. `None` when either side
/// lacks ids.
fn map_by_node_ids(flat: &FlatSnapshot, kinds: &[KindSnapshot]) -> Option<MappingOutcome> {
	let flat_ids = flat.node_ids()?;
	let mut lookup: FxHashMap<u64, (TextKind, usize)> = FxHashMap::default();
	for ks in kinds {
		let ids = ks.node_ids.as_ref()?;
		for (index, &id) in ids.iter().enumerate() {
			lookup.insert(id, (ks.kind, index));
		}
	}

	let mut to_text = Vec::with_capacity(flat.len());
	let mut to_flat = empty_to_flat(kinds);
	let mut unmatched = 0usize;
	for (i, id) in flat_ids.iter().enumerate() {
		match lookup.get(id) {
			Some(&(kind, index)) => {
				to_text.push(TextCoord::new(kind, index));
				if let Some(slot) = to_flat.get_mut(&kind).and_then(|v| v.get_mut(index)) {
					*slot = i as isize;
				}
			}
			None => {
				to_text.push(TextCoord::unknown(i));
				unmatched += 1;
			}
		}
	}

	let unmatched_text = count_unmapped(&to_flat);
	Some(MappingOutcome {
		to_text,
		to_flat,
		chapter_begins: FxHashMap::default(),
		unmatched,
		unmatched_text,
		dirty: unmatched_text > 0,
	})
}

/// Fallback mapping without node ids.
///
/// Flat positions are walked left to right. Footnote and endnote paragraphs
/// are probed first while any remain (the two cursors rotate), then headers,
/// footers and shapes, and finally the table/body-text pair, which needs a
/// lookahead to break textual ties. Whatever resists is `Unknown` and
/// handed to the repair pass.
fn map_heuristic(flat: &FlatSnapshot, kinds: &[KindSnapshot]) -> MappingOutcome {
	let by_kind: FxHashMap<TextKind, &KindSnapshot> = kinds.iter().map(|k| (k.kind, k)).collect();
	let mut to_text: Vec<TextCoord> = Vec::with_capacity(flat.len());
	let mut to_flat = empty_to_flat(kinds);
	let mut cursors: FxHashMap<TextKind, usize> =
		TextKind::MAPPED.iter().map(|&k| (k, 0)).collect();
	let mut unmatched = 0usize;
	let mut prefer_endnote = false;

	for i in 0..flat.len() {
		let mut try_kind = |kind: TextKind,
		                    cursors: &mut FxHashMap<TextKind, usize>,
		                    to_flat: &mut FxHashMap<TextKind, Vec<isize>>|
		 -> Option<TextCoord> {
			let ks = by_kind.get(&kind)?;
			let cursor = *cursors.get(&kind).unwrap_or(&0);
			if cursor >= ks.paragraphs.len() {
				return None;
			}
			let para = &flat.paragraphs[i];
			if !is_equal_text(&para.text, &ks.paragraphs[cursor], &para.footnotes) {
				return None;
			}
			if let Some(slot) = to_flat.get_mut(&kind).and_then(|v| v.get_mut(cursor)) {
				*slot = i as isize;
			}
			cursors.insert(kind, cursor + 1);
			Some(TextCoord::new(kind, cursor))
		};

		// Notes go first while any remain; the cursor rotation keeps
		// alternating footnote/endnote sequences aligned.
		let note_order = if prefer_endnote {
			[TextKind::Endnote, TextKind::Footnote]
		} else {
			[TextKind::Footnote, TextKind::Endnote]
		};
		let mut coord = None;
		for kind in note_order {
			if let Some(c) = try_kind(kind, &mut cursors, &mut to_flat) {
				prefer_endnote = c.kind == TextKind::Endnote;
				coord = Some(c);
				break;
			}
		}

		if coord.is_none() {
			for kind in [TextKind::HeaderFooter, TextKind::Shape] {
				if let Some(c) = try_kind(kind, &mut cursors, &mut to_flat) {
					coord = Some(c);
					break;
				}
			}
		}

		if coord.is_none() {
			coord = map_text_or_table(flat, i, &by_kind, &mut cursors, &mut to_flat);
		}

		match coord {
			Some(c) => to_text.push(c),
			None => {
				to_text.push(TextCoord::unknown(i));
				unmatched += 1;
			}
		}
	}

	let mut outcome = MappingOutcome {
		to_text,
		to_flat,
		chapter_begins: FxHashMap::default(),
		unmatched,
		unmatched_text: 0,
		dirty: false,
	};

	outcome.unmatched_text = count_unmapped(&outcome.to_flat);
	if outcome.unmatched_text > 0 {
		repair(flat, kinds, &mut outcome);
	}
	if unmapped_of(&outcome.to_flat, TextKind::Text) > 0 {
		redo_text_linear(flat, &by_kind, &mut outcome);
	}
	outcome.unmatched_text = count_unmapped(&outcome.to_flat);
	outcome.dirty = outcome.unmatched_text > 0;
	if outcome.dirty {
		tracing::warn!(
			unmatched_flat = outcome.unmatched,
			unmatched_text = outcome.unmatched_text,
			"paragraph mapping left unmatched entries after repair"
		);
	}
	outcome
}

/// Disambiguates the table/body-text pair at flat position `i`.
///
/// When both next candidates equal the flat text, neither cursor alone can
/// decide. The chains are followed in parallel until one stops matching;
/// the surviving chain wins, and body text wins if both survive to the end.
/// The decision is re-evaluated at every tie, so documents interleaving
/// tables and body text repeatedly stay mapped.
fn map_text_or_table(
	flat: &FlatSnapshot,
	i: usize,
	by_kind: &FxHashMap<TextKind, &KindSnapshot>,
	cursors: &mut FxHashMap<TextKind, usize>,
	to_flat: &mut FxHashMap<TextKind, Vec<isize>>,
) -> Option<TextCoord> {
	let para = &flat.paragraphs[i];
	let matches_kind = |kind: TextKind, cursor: usize| -> bool {
		by_kind.get(&kind).is_some_and(|ks| {
			cursor < ks.paragraphs.len()
				&& is_equal_text(&para.text, &ks.paragraphs[cursor], &para.footnotes)
		})
	};
	let text_cursor = *cursors.get(&TextKind::Text).unwrap_or(&0);
	let table_cursor = *cursors.get(&TextKind::Table).unwrap_or(&0);
	let text_ok = matches_kind(TextKind::Text, text_cursor);
	let table_ok = matches_kind(TextKind::Table, table_cursor);

	let kind = match (text_ok, table_ok) {
		(true, true) => lookahead_choice(flat, i, by_kind, text_cursor, table_cursor),
		(true, false) => TextKind::Text,
		(false, true) => TextKind::Table,
		(false, false) => return None,
	};

	let cursor = *cursors.get(&kind).unwrap_or(&0);
	if let Some(slot) = to_flat.get_mut(&kind).and_then(|v| v.get_mut(cursor)) {
		*slot = i as isize;
	}
	cursors.insert(kind, cursor + 1);
	Some(TextCoord::new(kind, cursor))
}

/// Follows both match chains from the position after the tie.
fn lookahead_choice(
	flat: &FlatSnapshot,
	i: usize,
	by_kind: &FxHashMap<TextKind, &KindSnapshot>,
	text_cursor: usize,
	table_cursor: usize,
) -> TextKind {
	let chain_matches = |kind: TextKind, index: usize, fi: usize| -> bool {
		by_kind.get(&kind).is_some_and(|ks| {
			fi < flat.len() && index < ks.paragraphs.len() && {
				let para = &flat.paragraphs[fi];
				is_equal_text(&para.text, &ks.paragraphs[index], &para.footnotes)
			}
		})
	};

	for step in 1.. {
		let text_ok = chain_matches(TextKind::Text, text_cursor + step, i + step);
		let table_ok = chain_matches(TextKind::Table, table_cursor + step, i + step);
		match (text_ok, table_ok) {
			(true, true) => continue,
			(true, false) => return TextKind::Text,
			(false, true) => return TextKind::Table,
			// Both chains end without diverging: prefer body text.
			(false, false) => return TextKind::Text,
		}
	}
	TextKind::Text
}

/// Rematches every kind's unmapped typed paragraphs against the flat slots
/// left `Unknown`.
fn repair(flat: &FlatSnapshot, kinds: &[KindSnapshot], outcome: &mut MappingOutcome) {
	for ks in kinds {
		let Some(slots) = outcome.to_flat.get(&ks.kind) else {
			continue;
		};
		let holes: Vec<usize> = (0..slots.len()).filter(|&t| slots[t] < 0).collect();
		for t in holes {
			let Some(flat_index) = (0..flat.len()).find(|&i| {
				outcome.to_text[i].is_unknown() && {
					let para = &flat.paragraphs[i];
					is_equal_text(&para.text, &ks.paragraphs[t], &para.footnotes)
				}
			}) else {
				continue;
			};
			outcome.to_text[flat_index] = TextCoord::new(ks.kind, t);
			if let Some(slots) = outcome.to_flat.get_mut(&ks.kind) {
				slots[t] = flat_index as isize;
			}
			outcome.unmatched -= 1;
		}
	}
}

/// Last resort for body text: drop its mapping and redo it linearly along
/// the flat order. Remaining unmatched paragraphs are logged, not fixed.
fn redo_text_linear(
	flat: &FlatSnapshot,
	by_kind: &FxHashMap<TextKind, &KindSnapshot>,
	outcome: &mut MappingOutcome,
) {
	let Some(ks) = by_kind.get(&TextKind::Text) else {
		return;
	};
	for coord in &mut outcome.to_text {
		if coord.kind == TextKind::Text {
			*coord = TextCoord::unknown(coord.index);
		}
	}
	let slots = vec![-1isize; ks.paragraphs.len()];
	outcome.to_flat.insert(TextKind::Text, slots);

	let mut t = 0usize;
	for i in 0..flat.len() {
		if t >= ks.paragraphs.len() {
			break;
		}
		if !outcome.to_text[i].is_unknown() {
			continue;
		}
		let para = &flat.paragraphs[i];
		if is_equal_text(&para.text, &ks.paragraphs[t], &para.footnotes) {
			outcome.to_text[i] = TextCoord::new(TextKind::Text, t);
			if let Some(slots) = outcome.to_flat.get_mut(&TextKind::Text) {
				slots[t] = i as isize;
			}
			t += 1;
		}
	}
	outcome.unmatched = outcome.to_text.iter().filter(|c| c.is_unknown()).count();

	let remaining = unmapped_of(&outcome.to_flat, TextKind::Text);
	if remaining > 0 {
		tracing::warn!(
			remaining,
			total = ks.paragraphs.len(),
			"linear body-text remap left paragraphs unmatched"
		);
	}
}

/// Chapter boundaries per kind: heading positions, and for body text also
/// the position after each heading plus every language-change boundary.
fn chapter_begins(
	flat: &FlatSnapshot,
	kinds: &[KindSnapshot],
	to_flat: &FxHashMap<TextKind, Vec<isize>>,
) -> FxHashMap<TextKind, Vec<usize>> {
	let mut result = FxHashMap::default();
	for ks in kinds {
		let count = ks.paragraphs.len();
		let mut begins: Vec<usize> = ks.headings.iter().map(|h| h.position).collect();
		if ks.kind == TextKind::Text {
			// A heading is a chapter of its own, so the next paragraph
			// starts a new one.
			begins.extend(ks.headings.iter().map(|h| h.position + 1));
			begins.extend(language_boundaries(flat, to_flat, count));
		}
		begins.retain(|&b| b <= count);
		begins.sort_unstable();
		begins.dedup();
		result.insert(ks.kind, begins);
	}
	result
}

/// Body-text positions whose language differs from their predecessor's.
fn language_boundaries(
	flat: &FlatSnapshot,
	to_flat: &FxHashMap<TextKind, Vec<isize>>,
	count: usize,
) -> Vec<usize> {
	let Some(slots) = to_flat.get(&TextKind::Text) else {
		return Vec::new();
	};
	let locale_of = |t: usize| -> Option<&Locale> {
		let flat_index = *slots.get(t)?;
		(flat_index >= 0).then(|| &flat.paragraphs[flat_index as usize].locale)
	};
	(1..count)
		.filter(|&t| match (locale_of(t - 1), locale_of(t)) {
			(Some(a), Some(b)) => !a.same_language(b),
			_ => false,
		})
		.collect()
}

fn empty_to_flat(kinds: &[KindSnapshot]) -> FxHashMap<TextKind, Vec<isize>> {
	kinds
		.iter()
		.map(|ks| (ks.kind, vec![-1isize; ks.paragraphs.len()]))
		.collect()
}

fn count_unmapped(to_flat: &FxHashMap<TextKind, Vec<isize>>) -> usize {
	to_flat.values().map(|v| v.iter().filter(|&&s| s < 0).count()).sum()
}

fn unmapped_of(to_flat: &FxHashMap<TextKind, Vec<isize>>, kind: TextKind) -> usize {
	to_flat
		.get(&kind)
		.map(|v| v.iter().filter(|&&s| s < 0).count())
		.unwrap_or(0)
}

/// Drops unmapped slots from `to_flat` and renumbers the affected text
/// coordinates and chapter boundaries, so published mappings satisfy the
/// reverse-lookup invariant.
fn compact(outcome: &mut MappingOutcome) {
	for (kind, slots) in &mut outcome.to_flat {
		if slots.iter().all(|&s| s >= 0) {
			continue;
		}
		// Old typed index → new index: every position moves down by the
		// number of dropped slots before it. One extra entry so the
		// end-of-kind boundary translates too.
		let mut new_index = Vec::with_capacity(slots.len() + 1);
		let mut kept = 0usize;
		for &slot in slots.iter() {
			new_index.push(kept);
			if slot >= 0 {
				kept += 1;
			}
		}
		new_index.push(kept);

		let mut compacted = Vec::with_capacity(kept);
		for &slot in slots.iter() {
			if slot < 0 {
				continue;
			}
			outcome.to_text[slot as usize] = TextCoord::new(*kind, compacted.len());
			compacted.push(slot);
		}
		// Chapter begins were computed in the pre-compaction index space;
		// translate them along, then restore strict ordering (adjacent
		// boundaries can collapse onto one surviving position).
		if let Some(begins) = outcome.chapter_begins.get_mut(kind) {
			for begin in begins.iter_mut() {
				*begin = new_index[(*begin).min(slots.len())];
			}
			begins.sort_unstable();
			begins.dedup();
		}
		*slots = compacted;
	}
}

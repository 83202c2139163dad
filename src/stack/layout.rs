//! Frame layout (Section 4.3.1): assigns a downward offset to every
//! not-yet-placed entity, spill slots first.

use crate::ir::{EntityKind, FrameState, FrameType};

/// Orders a frame's members so spill slots come first (or last, per
/// `spillslots_first`), each group by its stable creation-order `nr` — by
/// default spill slots get first claim on the cache lines nearest the
/// frame pointer.
pub fn sort_frame_entities(frame: &mut FrameType, spillslots_first: bool) {
    frame.members.sort_by_key(|e| {
        let ordinary_last = matches!(e.kind, EntityKind::Ordinary) as u8;
        let group = if spillslots_first { ordinary_last } else { 1 - ordinary_last };
        (group, e.nr)
    });
}

/// Assigns a negative offset to every entity that doesn't already have one,
/// walking the sorted member list and growing the frame downward from
/// `begin`. Entities that already carry an offset (pre-assigned by a caller
/// convention) are left untouched; their footprint is folded into the
/// starting cursor first so a not-yet-placed entity can never be assigned a
/// range one of them already occupies, regardless of where in the member
/// list the pre-assigned entity falls.
pub fn layout_frame_type(frame: &mut FrameType, begin: i64, misalign: i64) {
    sort_frame_entities(frame, true);

    let floor = frame
        .members
        .iter()
        .filter(|e| !e.is_unset())
        .map(|e| e.offset)
        .fold(begin, i64::min);

    let mut offset = floor;
    let mut max_align: i64 = 1;

    for entity in &mut frame.members {
        max_align = max_align.max(entity.align);
        if !entity.is_unset() {
            continue;
        }
        offset -= entity.size;
        offset = -round_up_misaligned(-offset, entity.align, misalign);
        entity.offset = offset;
    }

    frame.size = -offset;
    frame.align = max_align;
    frame.state = FrameState::LayoutFixed;
    tracing::debug!(target: "stack_layout", members = frame.members.len(), size = frame.size, "frame laid out");
}

/// Rounds `x` up to the nearest multiple of `a`, then compensates for a
/// residual misalignment `m` (Section 4.3.1: `round_up_misaligned(x, a, m)
/// = round_up_pow2(x + m, a) - m`).
pub(crate) fn round_up_misaligned(x: i64, a: i64, m: i64) -> i64 {
    round_up_pow2(x + m, a) - m
}

fn round_up_pow2(x: i64, a: i64) -> i64 {
    if a <= 1 {
        return x;
    }
    let rem = x.rem_euclid(a);
    if rem == 0 {
        x
    } else {
        x + (a - rem)
    }
}

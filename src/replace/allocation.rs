//! Per-character code resolution for a replacement string, against a
//! single font: feasibility checking and the free-code allocation policy.

use crate::fonts::catalogue::UsageCatalogue;
use std::collections::BTreeSet;

/// The decision for one replacement character, against one font.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodePlan {
    /// The character already appears somewhere in this font's usage; reuse
    /// one of its existing codes.
    Reuse(u8),
    /// The character isn't drawn anywhere yet but the font's CMap already
    /// has an entry for it; reuse that code without touching the CMap.
    BorrowFromCmap(u8),
    /// A new byte code must be allocated from the free-code pool and the
    /// font's CMap extended.
    Allocate(u8),
}

impl CodePlan {
    /// The byte code this plan resolves to, regardless of variant.
    pub fn code(&self) -> u8 {
        match self {
            CodePlan::Reuse(c) | CodePlan::BorrowFromCmap(c) | CodePlan::Allocate(c) => *c,
        }
    }

    /// Whether this plan requires a new CMap entry / font patch.
    pub fn is_allocation(&self) -> bool {
        matches!(self, CodePlan::Allocate(_))
    }
}

fn is_pdf_whitespace_char(c: char) -> bool {
    matches!(c, '\u{0009}' | '\u{000A}' | '\u{000D}' | '\u{0020}')
}

/// Resolve a single character against `font`'s recorded usage and CMap.
/// `allow_auto_insert` gates whether an unresolvable character may fall
/// through to `Allocate` rather than refusing outright; the caller enforces
/// the "any Allocate without auto-insert is a refusal" rule, this function
/// only ever returns `None` when no plan is possible at all. PDF whitespace
/// always has a WinAnsi code equal to its scalar value, so in practice this
/// only returns `None` for a non-whitespace character with neither a usage
/// code nor a CMap entry while auto-insert is disabled.
pub fn resolve_character(
    ch: char,
    alias: &str,
    catalogue: &UsageCatalogue,
    allow_auto_insert: bool,
) -> Option<CodePlan> {
    if catalogue.characters_in_font(alias).contains(&ch) {
        let codes = catalogue.codes_for_character(alias, ch);
        return codes.iter().next().copied().map(CodePlan::Reuse);
    }

    if is_pdf_whitespace_char(ch) {
        if let Some(inverted_code) = catalogue.cmap(alias).and_then(|c| c.invert().get(&ch).copied())
        {
            return Some(CodePlan::Reuse(inverted_code));
        }
        if !allow_auto_insert {
            // ASCII whitespace codes equal their scalar value.
            return Some(CodePlan::Reuse(ch as u8));
        }
        return Some(CodePlan::Allocate(0));
    }

    if let Some(code) = catalogue.cmap(alias).and_then(|c| c.invert().get(&ch).copied()) {
        return Some(CodePlan::BorrowFromCmap(code));
    }

    if allow_auto_insert {
        return Some(CodePlan::Allocate(0));
    }

    None
}

/// Choose the smallest free byte code for a newly allocated character:
/// prefer `0xB0..=0xFF`, fall back to `0x80..=0xAF`, never the
/// ASCII-printable (`0x21..=0x7E`) or control (`0x00..=0x20`) ranges.
///
/// `codes_in_use` and `other_font_domains` are both consulted and must be
/// disjoint from the chosen code; `reserved` additionally excludes codes
/// already claimed by earlier characters within the same replacement
/// operation (the caller reserves immediately after allocating, but this
/// parameter lets allocation and reservation stay decoupled for testing).
pub fn allocate_code(
    codes_in_use: &BTreeSet<u8>,
    other_font_domains: &BTreeSet<u8>,
    reserved: &BTreeSet<u8>,
) -> Option<u8> {
    let is_free = |c: u8| {
        !codes_in_use.contains(&c) && !other_font_domains.contains(&c) && !reserved.contains(&c)
    };

    for c in 0xB0u16..=0xFF {
        let c = c as u8;
        if is_free(c) {
            return Some(c);
        }
    }
    for c in 0x80u16..=0xAF {
        let c = c as u8;
        if is_free(c) {
            return Some(c);
        }
    }
    None
}

/// A fully resolved plan for one match's replacement text against one font:
/// either every character resolved (`Ok`), or the first unresolvable
/// character and reason (`Err`).
#[derive(Debug, Clone)]
pub struct MatchPlan {
    /// One resolved entry per character of the replacement string, in order.
    pub entries: Vec<(char, CodePlan)>,
}

/// Failure reason for a match that could not be planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanFailure {
    /// A character has no usable code and `allow_auto_insert` is `false`.
    UnsupportedCharacter(char),
    /// `allow_auto_insert` is `true` but no free code remains in either
    /// allocation range.
    NoFreeCode,
}

/// Plan every character of `replacement` against `font`, reserving newly
/// allocated codes in `catalogue` as it goes so later characters in the
/// same replacement (and later matches in the same operation) never
/// collide. Reservations made before a failure are *not* rolled back by
/// this function: partial commits to the content stream are never allowed,
/// but an aborted plan's reservations are harmless no-ops since the code
/// was never written anywhere; the caller simply discards `Err` plans
/// without touching the content stream.
pub fn plan_replacement(
    replacement: &str,
    alias: &str,
    page_index: usize,
    catalogue: &mut UsageCatalogue,
    allow_auto_insert: bool,
) -> Result<MatchPlan, PlanFailure> {
    let mut entries = Vec::with_capacity(replacement.chars().count());
    let other_domains = catalogue.differences_domains_excluding(page_index, alias);

    for ch in replacement.chars() {
        let Some(plan) = resolve_character(ch, alias, catalogue, allow_auto_insert) else {
            return Err(PlanFailure::UnsupportedCharacter(ch));
        };

        let plan = if let CodePlan::Allocate(_) = plan {
            let reserved: BTreeSet<u8> = BTreeSet::new();
            let codes_in_use = catalogue.codes_in_use(alias);
            match allocate_code(&codes_in_use, &other_domains, &reserved) {
                Some(code) => {
                    catalogue.reserve(alias, code, ch);
                    CodePlan::Allocate(code)
                },
                None => return Err(PlanFailure::NoFreeCode),
            }
        } else {
            plan
        };

        entries.push((ch, plan));
    }

    Ok(MatchPlan { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue_with_ascii(alias: &str) -> UsageCatalogue {
        let mut cat = UsageCatalogue::default();
        for ch in "Hello".chars() {
            let code = ch as u8;
            cat.reserve(alias, code, ch);
        }
        cat
    }

    #[test]
    fn reuses_existing_character() {
        let cat = catalogue_with_ascii("TT0");
        let plan = resolve_character('H', "TT0", &cat, false).unwrap();
        assert_eq!(plan, CodePlan::Reuse(b'H'));
    }

    #[test]
    fn refuses_unsupported_without_auto_insert() {
        let cat = catalogue_with_ascii("TT0");
        let plan = resolve_character('\u{00E9}', "TT0", &cat, false);
        assert!(plan.is_none());
    }

    #[test]
    fn allocates_when_auto_insert_enabled() {
        let cat = catalogue_with_ascii("TT0");
        let plan = resolve_character('\u{00E9}', "TT0", &cat, true).unwrap();
        assert!(plan.is_allocation());
    }

    #[test]
    fn allocation_prefers_b0_range() {
        let in_use = BTreeSet::new();
        let other = BTreeSet::new();
        let reserved = BTreeSet::new();
        assert_eq!(allocate_code(&in_use, &other, &reserved), Some(0xB0));
    }

    #[test]
    fn allocation_skips_codes_in_use() {
        let mut in_use = BTreeSet::new();
        in_use.insert(0xB0);
        in_use.insert(0xB1);
        let other = BTreeSet::new();
        let reserved = BTreeSet::new();
        assert_eq!(allocate_code(&in_use, &other, &reserved), Some(0xB2));
    }

    #[test]
    fn allocation_falls_back_to_low_range() {
        let mut in_use = BTreeSet::new();
        for c in 0xB0u16..=0xFF {
            in_use.insert(c as u8);
        }
        let other = BTreeSet::new();
        let reserved = BTreeSet::new();
        assert_eq!(allocate_code(&in_use, &other, &reserved), Some(0x80));
    }

    #[test]
    fn allocation_exhausted_returns_none() {
        let mut in_use = BTreeSet::new();
        for c in 0x80u16..=0xFF {
            in_use.insert(c as u8);
        }
        let other = BTreeSet::new();
        let reserved = BTreeSet::new();
        assert_eq!(allocate_code(&in_use, &other, &reserved), None);
    }

    #[test]
    fn plan_replacement_allocates_only_one_code_for_repeated_char() {
        let mut cat = catalogue_with_ascii("TT0");
        let plan = plan_replacement("éé", "TT0", 0, &mut cat, true).unwrap();
        let codes: BTreeSet<u8> = plan.entries.iter().map(|(_, p)| p.code()).collect();
        assert_eq!(codes.len(), 1, "both é's should resolve to the same allocated code");
    }

    #[test]
    fn plan_replacement_fails_closed_on_unsupported_character() {
        let mut cat = catalogue_with_ascii("TT0");
        let err = plan_replacement("Héllo", "TT0", 0, &mut cat, false).unwrap_err();
        assert_eq!(err, PlanFailure::UnsupportedCharacter('é'));
    }
}

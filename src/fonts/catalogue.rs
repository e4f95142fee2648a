//! Document-wide font character and code usage, for conflict-free code
//! allocation during text replacement.
//!
//! `FontInfo` here is a narrow view over a font dictionary: alias, basic
//! identity, the decode `CMap`, and the object references needed to write
//! patches back. It is distinct from `fonts::font_dict::FontInfo`, which
//! models the full font-dictionary grammar for text extraction (including
//! CID/Type0 fonts out of scope for replacement).

use crate::content::replace_scan::{self, Token};
use crate::document::PdfDocument;
use crate::error::Result;
use crate::fonts::cmap::CMap;
use crate::object::ObjectRef;
use std::collections::{BTreeSet, HashMap, HashSet};

/// A single-byte TrueType font in scope for text replacement.
#[derive(Debug, Clone)]
pub struct FontInfo {
    /// Alias this font is bound to in the page's `/Resources/Font` dict.
    pub alias: String,
    /// `/BaseFont` name.
    pub base_font: String,
    /// `/Subtype` name (`TrueType` for everything reaching this struct).
    pub subtype: String,
    /// `/Encoding`'s base name, if a named encoding or `Differences`'s
    /// `/BaseEncoding` is present.
    pub encoding_name: Option<String>,
    /// Byte codes overridden by a `/Differences` array on this font, if any.
    pub differences_domain: BTreeSet<u8>,
    /// Decode mapping: `ToUnicode` if present, else the synthesized default.
    pub cmap: CMap,
    /// `/FirstChar`.
    pub first_char: u32,
    /// `/Widths`, indexed from `first_char`.
    pub widths: Vec<f64>,
    /// Embedded `FontFile2` program bytes, if present.
    pub font_program: Option<Vec<u8>>,
    /// Indirect reference to the font dictionary itself.
    pub dict_ref: ObjectRef,
    /// Indirect reference to the `/FontDescriptor`, if present.
    pub descriptor_ref: Option<ObjectRef>,
    /// Indirect reference to the `/Widths` array, if itself indirect.
    pub widths_ref: Option<ObjectRef>,
    /// Indirect reference to the `/ToUnicode` stream, if present.
    pub tounicode_ref: Option<ObjectRef>,
    /// Indirect reference to the `/FontFile2` stream, if present.
    pub font_file_ref: Option<ObjectRef>,
}

/// Document-wide usage facts for every in-scope font.
#[derive(Debug, Default)]
pub struct UsageCatalogue {
    characters_in_font: HashMap<String, HashSet<char>>,
    codes_for_character: HashMap<String, HashMap<char, BTreeSet<u8>>>,
    codes_in_use: HashMap<String, BTreeSet<u8>>,
    cmaps: HashMap<String, CMap>,
    /// Per page, each font alias's `/Differences`-array domain, used by
    /// allocation rule 2 (must not collide with *other* fonts' domains on
    /// the same page).
    differences_domains: HashMap<usize, HashMap<String, BTreeSet<u8>>>,
}

impl UsageCatalogue {
    /// Build the catalogue by scanning every page's content stream.
    ///
    /// Scanning every page (not just the one being edited) is required so
    /// newly allocated codes never collide with codes a font already uses
    /// elsewhere in the document.
    pub fn build(doc: &mut PdfDocument) -> Result<Self> {
        let mut catalogue = UsageCatalogue::default();
        let page_count = doc.page_count()?;

        for page_index in 0..page_count {
            let fonts = match doc.fonts_in_scope(page_index) {
                Ok(f) => f,
                Err(_) => continue,
            };
            if fonts.is_empty() {
                continue;
            }

            let mut page_domains: HashMap<String, BTreeSet<u8>> = HashMap::new();
            let mut cmaps: HashMap<String, CMap> = HashMap::new();
            for (alias, info) in &fonts {
                cmaps.insert(alias.clone(), info.cmap.clone());
                page_domains.insert(alias.clone(), info.differences_domain.clone());
                catalogue
                    .cmaps
                    .entry(alias.clone())
                    .or_insert_with(|| info.cmap.clone());
            }
            catalogue.differences_domains.insert(page_index, page_domains);

            let content = match doc.content_bytes(page_index) {
                Ok(c) => c,
                Err(_) => continue,
            };
            let tokens = replace_scan::scan(&content, &cmaps);

            for token in tokens {
                if let Token::Show(run) = token {
                    let Some(alias) = run.font_alias.clone() else { continue };
                    if !fonts.contains_key(&alias) {
                        continue;
                    }
                    for (ch, byte) in run.decoded.chars().zip(run.raw_bytes.iter()) {
                        catalogue
                            .characters_in_font
                            .entry(alias.clone())
                            .or_default()
                            .insert(ch);
                        catalogue
                            .codes_for_character
                            .entry(alias.clone())
                            .or_default()
                            .entry(ch)
                            .or_default()
                            .insert(*byte);
                        catalogue
                            .codes_in_use
                            .entry(alias.clone())
                            .or_default()
                            .insert(*byte);
                    }
                }
            }
        }

        Ok(catalogue)
    }

    /// All Unicode characters ever drawn with `alias`.
    pub fn characters_in_font(&self, alias: &str) -> HashSet<char> {
        self.characters_in_font.get(alias).cloned().unwrap_or_default()
    }

    /// Every byte code observed for `ch` under `alias`.
    pub fn codes_for_character(&self, alias: &str, ch: char) -> BTreeSet<u8> {
        self.codes_for_character
            .get(alias)
            .and_then(|m| m.get(&ch))
            .cloned()
            .unwrap_or_default()
    }

    /// Every byte code currently in use for `alias`, document-wide.
    pub fn codes_in_use(&self, alias: &str) -> BTreeSet<u8> {
        self.codes_in_use.get(alias).cloned().unwrap_or_default()
    }

    /// The decode `CMap` for `alias` (`ToUnicode`, or the synthesized
    /// default), if the font was seen anywhere in the document.
    pub fn cmap(&self, alias: &str) -> Option<&CMap> {
        self.cmaps.get(alias)
    }

    /// Byte codes claimed by `Differences` arrays of every font *other
    /// than* `alias` on `page_index` — codes an allocation must avoid so a
    /// later render under a `Differences`-mapped font doesn't collide.
    pub fn differences_domains_excluding(&self, page_index: usize, alias: &str) -> BTreeSet<u8> {
        let mut out = BTreeSet::new();
        if let Some(page) = self.differences_domains.get(&page_index) {
            for (other_alias, domain) in page {
                if other_alias != alias {
                    out.extend(domain.iter().copied());
                }
            }
        }
        out
    }

    /// Reserve `code` for `ch` under `alias` immediately, so subsequent
    /// characters in the same replacement operation don't re-allocate it.
    pub fn reserve(&mut self, alias: &str, code: u8, ch: char) {
        self.characters_in_font.entry(alias.to_string()).or_default().insert(ch);
        self.codes_for_character
            .entry(alias.to_string())
            .or_default()
            .entry(ch)
            .or_default()
            .insert(code);
        self.codes_in_use.entry(alias.to_string()).or_default().insert(code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::cmap::synthesize_winansi;

    #[test]
    fn reserve_updates_all_three_maps() {
        let mut cat = UsageCatalogue::default();
        cat.cmaps.insert("TT0".to_string(), synthesize_winansi());
        cat.reserve("TT0", 0xB0, '\u{00E9}');

        assert!(cat.characters_in_font("TT0").contains(&'\u{00E9}'));
        assert!(cat.codes_for_character("TT0", '\u{00E9}').contains(&0xB0));
        assert!(cat.codes_in_use("TT0").contains(&0xB0));
    }

    #[test]
    fn codes_in_use_is_union_of_codes_for_character() {
        let mut cat = UsageCatalogue::default();
        cat.reserve("TT0", 0x41, 'A');
        cat.reserve("TT0", 0x42, 'B');

        let union: BTreeSet<u8> = cat
            .codes_for_character
            .get("TT0")
            .unwrap()
            .values()
            .flat_map(|s| s.iter().copied())
            .collect();
        assert_eq!(union, cat.codes_in_use("TT0"));
    }
}

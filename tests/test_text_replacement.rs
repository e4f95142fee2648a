//! Integration tests for the text-replacement engine, exercised end to end
//! against hand-built minimal PDFs (classic xref, single-byte TrueType
//! fonts) rather than through `DocumentBuilder`, whose font embedding only
//! covers composite Type0/CID fonts.

use pdf_oxide::fonts::cmap::CMap;
use pdf_oxide::replace::report::RefusalReason;
use pdf_oxide::replace::ReplaceOptions;
use pdf_oxide::PdfDocument;
use tempfile::TempDir;

fn dict_obj(id: u32, dict: &str) -> Vec<u8> {
    format!("{} 0 obj\n{}\nendobj\n", id, dict).into_bytes()
}

fn array_obj(id: u32, items: &str) -> Vec<u8> {
    format!("{} 0 obj\n[{}]\nendobj\n", id, items).into_bytes()
}

fn stream_obj(id: u32, data: &[u8]) -> Vec<u8> {
    let mut v = format!("{} 0 obj\n<< /Length {} >>\nstream\n", id, data.len()).into_bytes();
    v.extend_from_slice(data);
    v.extend_from_slice(b"\nendstream\nendobj\n");
    v
}

/// Concatenate pre-formatted indirect-object bodies (implicit ids 1..=N by
/// position) into a complete classic-xref PDF file.
fn assemble_pdf(objects: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for body in objects {
        offsets.push(out.len());
        out.extend_from_slice(body);
    }
    let xref_start = out.len();
    let n = objects.len();
    out.extend_from_slice(format!("xref\n0 {}\n", n + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for off in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(format!("trailer\n<< /Size {} /Root 1 0 R >>\n", n + 1).as_bytes());
    out.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_start).as_bytes());
    out
}

fn ascii_widths() -> String {
    vec!["600"; 95].join(" ")
}

/// One page, one in-scope font `TT0` (WinAnsi, no `/ToUnicode` so the
/// synthesized ASCII-identity map applies), with the given content bytes.
fn single_font_fixture(content: &[u8]) -> Vec<u8> {
    let objects = vec![
        dict_obj(1, "<< /Type /Catalog /Pages 2 0 R >>"),
        dict_obj(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        dict_obj(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /TT0 4 0 R >> >> /Contents 6 0 R >>",
        ),
        dict_obj(
            4,
            "<< /Type /Font /Subtype /TrueType /BaseFont /Helvetica \
             /FirstChar 32 /LastChar 126 /Widths 5 0 R /Encoding /WinAnsiEncoding >>",
        ),
        array_obj(5, &ascii_widths()),
        stream_obj(6, content),
    ];
    assemble_pdf(&objects)
}

/// One page, two in-scope fonts: `F1` (ASCII-only, no `/ToUnicode`) and
/// `F2` (WinAnsi plus a `/ToUnicode` mapping 0xE9 to `é`), for the
/// cross-font no-borrow scenario.
fn two_font_fixture(content: &[u8]) -> Vec<u8> {
    let mut f2_cmap = CMap::empty();
    for code in 0x20u8..=0x7E {
        f2_cmap.insert_no_overwrite(code, code as char);
    }
    f2_cmap.insert_no_overwrite(0xE9, '\u{00E9}');
    let tounicode_bytes = f2_cmap.to_tounicode_bytes();

    let objects = vec![
        dict_obj(1, "<< /Type /Catalog /Pages 2 0 R >>"),
        dict_obj(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        dict_obj(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R /F2 6 0 R >> >> /Contents 9 0 R >>",
        ),
        dict_obj(
            4,
            "<< /Type /Font /Subtype /TrueType /BaseFont /Helvetica \
             /FirstChar 32 /LastChar 126 /Widths 5 0 R /Encoding /WinAnsiEncoding >>",
        ),
        array_obj(5, &ascii_widths()),
        dict_obj(
            6,
            "<< /Type /Font /Subtype /TrueType /BaseFont /Arial \
             /FirstChar 32 /LastChar 126 /Widths 7 0 R /Encoding /WinAnsiEncoding \
             /ToUnicode 8 0 R >>",
        ),
        array_obj(7, &ascii_widths()),
        stream_obj(8, &tounicode_bytes),
        stream_obj(9, content),
    ];
    assemble_pdf(&objects)
}

fn be16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn be_i16(out: &mut Vec<u8>, v: i16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn be32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn pad_to_4(out: &mut Vec<u8>) {
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

/// The largest power of two `<= n` (`n >= 1`), and its base-2 log.
fn pow2_floor(n: u16) -> (u16, u16) {
    let mut pow = 1u16;
    let mut log = 0u16;
    while pow.checked_mul(2).map(|p| p <= n).unwrap_or(false) {
        pow *= 2;
        log += 1;
    }
    (pow, log)
}

/// A single-contour rectangular outline, as a TrueType simple-glyph
/// description body (no composite glyphs, no hinting).
fn rect_glyph(width: i16, height: i16) -> Vec<u8> {
    let mut g = Vec::new();
    be_i16(&mut g, 1); // numberOfContours
    be_i16(&mut g, 0); // xMin
    be_i16(&mut g, 0); // yMin
    be_i16(&mut g, width); // xMax
    be_i16(&mut g, height); // yMax
    be16(&mut g, 3); // endPtsOfContours[0] (4 points: 0..=3)
    be16(&mut g, 0); // instructionLength
    for _ in 0..4 {
        g.push(0x01); // ON_CURVE_POINT, full-width deltas for x and y
    }
    let deltas = [(0, 0), (width, 0), (0, height), (-width, 0)];
    for (dx, _) in deltas {
        be_i16(&mut g, dx);
    }
    for (_, dy) in deltas {
        be_i16(&mut g, dy);
    }
    g
}

/// A format-4 `cmap` subtable mapping each `(code, glyph_id)` pair plus the
/// mandatory terminal segment, wrapped in a single Windows/Unicode-BMP
/// table record.
fn cmap_table(mappings: &[(u16, u16)]) -> Vec<u8> {
    let mut segments: Vec<(u16, u16, u16)> = mappings.iter().map(|&(c, g)| (c, c, g)).collect();
    segments.sort_by_key(|s| s.0);
    segments.push((0xFFFF, 0xFFFF, 0)); // terminal segment, glyph 0
    let seg_count = segments.len() as u16;

    let mut sub = Vec::new();
    be16(&mut sub, 4); // format
    be16(&mut sub, 0); // length placeholder, patched below
    be16(&mut sub, 0); // language
    be16(&mut sub, seg_count * 2); // segCountX2
    let (search_range_segs, entry_selector) = pow2_floor(seg_count);
    be16(&mut sub, search_range_segs * 2);
    be16(&mut sub, entry_selector);
    be16(&mut sub, seg_count * 2 - search_range_segs * 2);
    for &(_, end, _) in &segments {
        be16(&mut sub, end);
    }
    be16(&mut sub, 0); // reservedPad
    for &(start, _, _) in &segments {
        be16(&mut sub, start);
    }
    for &(start, _, glyph) in &segments {
        let delta = if start == 0xFFFF { 1i16 } else { glyph as i16 - start as i16 };
        be_i16(&mut sub, delta);
    }
    for _ in &segments {
        be16(&mut sub, 0); // idRangeOffset, always 0 here
    }
    let len = sub.len() as u16;
    sub[2..4].copy_from_slice(&len.to_be_bytes());

    let mut cmap = Vec::new();
    be16(&mut cmap, 0); // version
    be16(&mut cmap, 1); // numTables
    be16(&mut cmap, 3); // platformID: Windows
    be16(&mut cmap, 1); // encodingID: Unicode BMP
    be32(&mut cmap, 12); // offset to subtable (4 header + 8 record bytes)
    cmap.extend_from_slice(&sub);
    cmap
}

/// A minimal, valid single-glyf TrueType program: `.notdef` plus one real
/// glyph per entry in `glyphs` (`(unicode_scalar, advance_width)`), built
/// table-by-table at runtime so offsets are always self-consistent.
fn minimal_truetype_font(glyphs: &[(char, i16)]) -> Vec<u8> {
    let num_glyphs = 1 + glyphs.len() as u16;

    let mut glyf = Vec::new();
    let mut loca = vec![0u32];
    // glyph 0: .notdef, empty outline
    loca.push(glyf.len() as u32);
    for &(_, width) in glyphs {
        let g = rect_glyph(width, 700);
        glyf.extend_from_slice(&g);
        pad_to_4(&mut glyf);
        loca.push(glyf.len() as u32);
    }
    // cmap maps each char to its glyph id (1-based, in `glyphs` order)
    let mappings: Vec<(u16, u16)> =
        glyphs.iter().enumerate().map(|(i, &(ch, _))| (ch as u16, i as u16 + 1)).collect();
    let cmap = cmap_table(&mappings);

    let max_width = glyphs.iter().map(|&(_, w)| w).max().unwrap_or(0);

    let mut head = Vec::new();
    be16(&mut head, 1); // majorVersion
    be16(&mut head, 0); // minorVersion
    be32(&mut head, 0x00010000); // fontRevision
    be32(&mut head, 0); // checkSumAdjustment
    be32(&mut head, 0x5F0F3CF5); // magicNumber
    be16(&mut head, 0); // flags
    be16(&mut head, 1000); // unitsPerEm
    be32(&mut head, 0); // created (hi)
    be32(&mut head, 0); // created (lo)
    be32(&mut head, 0); // modified (hi)
    be32(&mut head, 0); // modified (lo)
    be_i16(&mut head, 0); // xMin
    be_i16(&mut head, 0); // yMin
    be_i16(&mut head, max_width); // xMax
    be_i16(&mut head, 700); // yMax
    be16(&mut head, 0); // macStyle
    be16(&mut head, 8); // lowestRecPPEM
    be_i16(&mut head, 2); // fontDirectionHint
    be_i16(&mut head, 1); // indexToLocFormat: long
    be_i16(&mut head, 0); // glyphDataFormat

    let mut hhea = Vec::new();
    be16(&mut hhea, 1); // majorVersion
    be16(&mut hhea, 0); // minorVersion
    be_i16(&mut hhea, 800); // ascender
    be_i16(&mut hhea, -200); // descender
    be_i16(&mut hhea, 0); // lineGap
    be16(&mut hhea, max_width.max(0) as u16); // advanceWidthMax
    be_i16(&mut hhea, 0); // minLeftSideBearing
    be_i16(&mut hhea, 0); // minRightSideBearing
    be_i16(&mut hhea, max_width); // xMaxExtent
    be_i16(&mut hhea, 1); // caretSlopeRise
    be_i16(&mut hhea, 0); // caretSlopeRun
    be_i16(&mut hhea, 0); // caretOffset
    for _ in 0..4 {
        be_i16(&mut hhea, 0); // reserved
    }
    be_i16(&mut hhea, 0); // metricDataFormat
    be16(&mut hhea, num_glyphs); // numberOfHMetrics: one entry per glyph

    let mut maxp = Vec::new();
    be32(&mut maxp, 0x00010000); // version 1.0
    be16(&mut maxp, num_glyphs);
    be16(&mut maxp, 4); // maxPoints
    be16(&mut maxp, 1); // maxContours
    be16(&mut maxp, 0); // maxCompositePoints
    be16(&mut maxp, 0); // maxCompositeContours
    be16(&mut maxp, 1); // maxZones
    be16(&mut maxp, 0); // maxTwilightPoints
    be16(&mut maxp, 0); // maxStorage
    be16(&mut maxp, 0); // maxFunctionDefs
    be16(&mut maxp, 0); // maxInstructionDefs
    be16(&mut maxp, 0); // maxStackElements
    be16(&mut maxp, 0); // maxSizeOfInstructions
    be16(&mut maxp, 0); // maxComponentElements
    be16(&mut maxp, 0); // maxComponentDepth

    let mut hmtx = Vec::new();
    be16(&mut hmtx, 0); // .notdef advance
    be_i16(&mut hmtx, 0); // .notdef lsb
    for &(_, width) in glyphs {
        be16(&mut hmtx, width.max(0) as u16);
        be_i16(&mut hmtx, 0);
    }

    let mut loca_bytes = Vec::new();
    for off in &loca {
        be32(&mut loca_bytes, *off);
    }

    let tables: Vec<(&[u8; 4], Vec<u8>)> = vec![
        (b"cmap", cmap),
        (b"glyf", glyf),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"loca", loca_bytes),
        (b"maxp", maxp),
    ];

    let num_tables = tables.len() as u16;
    let (search_range_tables, entry_selector_tables) = pow2_floor(num_tables);

    let mut font = Vec::new();
    be32(&mut font, 0x00010000); // sfntVersion
    be16(&mut font, num_tables);
    be16(&mut font, search_range_tables * 16);
    be16(&mut font, entry_selector_tables);
    be16(&mut font, num_tables * 16 - search_range_tables * 16);

    let header_and_directory_len = 12 + 16 * tables.len();
    let mut body = Vec::new();
    let mut records = Vec::new();
    for (tag, table) in &tables {
        let offset = header_and_directory_len + body.len();
        records.push((*tag, offset as u32, table.len() as u32));
        body.extend_from_slice(table);
        pad_to_4(&mut body);
    }
    for (tag, offset, length) in records {
        font.extend_from_slice(*tag);
        be32(&mut font, 0); // checkSum, unverified by ttf-parser
        be32(&mut font, offset);
        be32(&mut font, length);
    }
    font.extend_from_slice(&body);
    font
}

/// One page, one in-scope font `TT0` with a real embedded `/FontFile2`
/// covering `glyphs`, for the successful auto-insert-and-patch path.
fn embedded_font_fixture(content: &[u8], glyphs: &[(char, i16)]) -> Vec<u8> {
    let program = minimal_truetype_font(glyphs);
    let objects = vec![
        dict_obj(1, "<< /Type /Catalog /Pages 2 0 R >>"),
        dict_obj(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
        dict_obj(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /TT0 4 0 R >> >> /Contents 6 0 R >>",
        ),
        dict_obj(
            4,
            "<< /Type /Font /Subtype /TrueType /BaseFont /Helvetica \
             /FirstChar 32 /LastChar 126 /Widths 5 0 R /Encoding /WinAnsiEncoding \
             /FontDescriptor 7 0 R >>",
        ),
        array_obj(5, &ascii_widths()),
        stream_obj(6, content),
        dict_obj(
            7,
            "<< /Type /FontDescriptor /FontName /Helvetica /Flags 32 \
             /FontBBox [0 0 1000 1000] /ItalicAngle 0 /Ascent 800 /Descent -200 \
             /CapHeight 700 /StemV 80 /FontFile2 8 0 R >>",
        ),
        stream_obj(8, &program),
    ];
    assemble_pdf(&objects)
}

/// Write `bytes` to a fresh temp file and open it. The returned `TempDir`
/// must be kept alive by the caller for as long as `doc` is used: `doc`
/// keeps the file open for lazy object loading.
fn open_fixture(bytes: Vec<u8>) -> (PdfDocument, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.pdf");
    std::fs::write(&path, bytes).unwrap();
    let doc = PdfDocument::open(&path).expect("fixture PDF should open");
    (doc, dir)
}

#[test]
fn ascii_replace_needs_no_allocation() {
    let (mut doc, _dir) = open_fixture(single_font_fixture(b"BT /TT0 12 Tf (Hello) Tj ET"));

    let report = doc.replace_text(0, "Hello", "World", &ReplaceOptions::default()).expect("replace should succeed");

    assert_eq!(report.located, 1);
    assert_eq!(report.rewritten, 1);
    assert!(report.refused.is_empty());
    assert!(report.allocations.is_empty(), "ASCII replacement text needs no new codes");
    assert!(report.patched_fonts.is_empty());

    let content = doc.content_bytes(0).expect("content bytes");
    assert!(content.windows(b"(World)Tj".len()).any(|w| w == b"(World)Tj"));
    assert!(!content.windows(b"Hello".len()).any(|w| w == b"Hello"));

    let elements = doc.parse_page_text(0).expect("parse should succeed");
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0].text, "World");
}

#[test]
fn replace_with_empty_string_yields_empty_show() {
    let (mut doc, _dir) = open_fixture(single_font_fixture(b"BT /TT0 12 Tf (Hello) Tj ET"));

    let report = doc.replace_text(0, "Hello", "", &ReplaceOptions::default()).expect("replace should succeed");
    assert_eq!(report.rewritten, 1);

    let content = doc.content_bytes(0).expect("content bytes");
    assert!(content.windows(b"()Tj".len()).any(|w| w == b"()Tj"));
}

#[test]
fn refuses_without_auto_insert_when_character_unsupported() {
    // The font's decode map is ASCII-only (ToUnicode-less WinAnsi default);
    // "World€" needs a euro sign with no existing code and no auto-insert.
    let (mut doc, _dir) = open_fixture(single_font_fixture(b"BT /TT0 12 Tf (Hello) Tj ET"));

    let options = ReplaceOptions { allow_auto_insert: false, ..ReplaceOptions::default() };
    let report = doc.replace_text(0, "Hello", "World\u{20AC}", &options).expect("replace call should succeed");

    assert_eq!(report.located, 1);
    assert_eq!(report.rewritten, 0);
    assert_eq!(report.refused.len(), 1);
    assert_eq!(report.refused[0].reason, RefusalReason::UnsupportedCharacter);
    assert_eq!(report.refused_count(RefusalReason::UnsupportedCharacter), 1);

    let content = doc.content_bytes(0).expect("content bytes");
    assert!(content.windows(b"Hello".len()).any(|w| w == b"Hello"), "refused match leaves content untouched");
}

#[test]
fn instance_index_selects_a_single_occurrence() {
    let (mut doc, _dir) =
        open_fixture(single_font_fixture(b"BT /TT0 12 Tf (FOO) Tj (FOO) Tj (FOO) Tj ET"));

    let options = ReplaceOptions { instance_index: Some(1), ..ReplaceOptions::default() };
    let report = doc.replace_text(0, "FOO", "BAR", &options).expect("replace should succeed");

    assert_eq!(report.located, 3);
    assert_eq!(report.rewritten, 1);

    let elements = doc.parse_page_text(0).expect("parse should succeed");
    let texts: Vec<&str> = elements.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["FOO", "BAR", "FOO"]);
}

#[test]
fn out_of_range_instance_index_is_an_error() {
    let (mut doc, _dir) = open_fixture(single_font_fixture(b"BT /TT0 12 Tf (FOO) Tj (FOO) Tj ET"));

    let options = ReplaceOptions { instance_index: Some(5), ..ReplaceOptions::default() };
    let err = doc.replace_text(0, "FOO", "BAR", &options).expect_err("out-of-range instance should fail");
    assert!(matches!(err, pdf_oxide::error::Error::NoSuchInstance { .. }), "unexpected error: {err:?}");
}

#[test]
fn tj_array_rewrite_drops_kerning_adjustments() {
    let (mut doc, _dir) =
        open_fixture(single_font_fixture(b"BT /TT0 12 Tf [(H) -20 (i)] TJ ET"));

    let report = doc.replace_text(0, "Hi", "Yo", &ReplaceOptions::default()).expect("replace should succeed");
    assert_eq!(report.rewritten, 1);

    let content = doc.content_bytes(0).expect("content bytes");
    assert!(content.windows(b"[(Yo)]TJ".len()).any(|w| w == b"[(Yo)]TJ"), "kerning adjustment is dropped, leaving a single-element TJ array");

    let elements = doc.parse_page_text(0).expect("parse should succeed");
    assert_eq!(elements[0].text, "Yo");
}

#[test]
fn cross_font_code_borrowing_is_refused() {
    // F1 has no code for 'é'; F2 does, but resolve_character must not
    // borrow a code from a font other than the one the match is drawn in.
    let (mut doc, _dir) = open_fixture(two_font_fixture(b"BT /F1 12 Tf (cafe) Tj ET"));

    let options = ReplaceOptions { allow_auto_insert: false, ..ReplaceOptions::default() };
    let report = doc.replace_text(0, "cafe", "caf\u{00E9}", &options).expect("replace call should succeed");

    assert_eq!(report.rewritten, 0);
    assert_eq!(report.refused_count(RefusalReason::UnsupportedCharacter), 1);
}

#[test]
fn no_allocation_needed_when_auto_insert_enabled_but_character_already_resolvable() {
    let (mut doc, _dir) = open_fixture(two_font_fixture(b"BT /F2 12 Tf (cafe) Tj ET"));

    let options = ReplaceOptions { allow_auto_insert: true, ..ReplaceOptions::default() };
    let report = doc.replace_text(0, "cafe", "caf\u{00E9}", &options).expect("replace should succeed");

    assert_eq!(report.rewritten, 1);
    assert!(report.allocations.is_empty(), "F2's own ToUnicode map already covers 0xE9 -> 'é'");
    assert!(report.patched_fonts.is_empty());
}

#[test]
fn auto_insert_without_embedded_font_program_fails_closed_on_patch() {
    // TT0 has no /FontFile2: even with allow_auto_insert, there is no
    // embedded TrueType program to subset a new glyph into.
    let (mut doc, _dir) = open_fixture(single_font_fixture(b"BT /TT0 12 Tf (Hello) Tj ET"));

    let options = ReplaceOptions { allow_auto_insert: true, ..ReplaceOptions::default() };
    let err = doc.replace_text(0, "Hello", "World\u{20AC}", &options).expect_err("patch should fail without a font program");
    assert!(matches!(err, pdf_oxide::error::Error::Font(_)), "unexpected error: {err:?}");
}

#[test]
fn auto_insert_with_embedded_font_program_allocates_and_patches() {
    // TT0 has a real /FontFile2 with glyphs for 'H' and 'i'; the euro sign
    // has neither an existing code nor a CMap entry, so allow_auto_insert
    // must allocate one and carry the width-ratio/CMap/subsetting patch
    // through to completion.
    let (mut doc, _dir) =
        open_fixture(embedded_font_fixture(b"BT /TT0 12 Tf (Hi) Tj ET", &[('H', 600), ('i', 300)]));

    let font_ref = {
        let fonts = doc.fonts_in_scope(0).expect("fonts_in_scope should succeed");
        fonts.get("TT0").expect("TT0 should be in scope").dict_ref
    };
    let (_, original_widths) = doc.read_widths(font_ref).expect("read_widths should succeed");
    let original_program = doc.read_font_program(font_ref).expect("read_font_program should succeed");
    assert!(original_program.is_some());

    let options = ReplaceOptions { allow_auto_insert: true, ..ReplaceOptions::default() };
    let report = doc.replace_text(0, "Hi", "Hi\u{20AC}", &options).expect("replace should succeed");

    assert_eq!(report.rewritten, 1);
    assert_eq!(report.allocations.len(), 1);
    let allocation = &report.allocations[0];
    assert_eq!(allocation.alias, "TT0");
    assert_eq!(allocation.scalar, '\u{20AC}');
    assert!((0xB0..=0xFF).contains(&allocation.code), "new codes come from the high allocation range");
    assert_eq!(report.patched_fonts, vec!["TT0".to_string()]);

    let elements = doc.parse_page_text(0).expect("parse should succeed");
    assert_eq!(elements[0].text, "Hi\u{20AC}");

    let merged_cmap = doc.read_tounicode(font_ref).expect("read_tounicode should succeed").expect("font should now have a ToUnicode stream");
    assert_eq!(merged_cmap.get(&(allocation.code as u32)).map(|s| s.as_str()), Some("\u{20AC}"));
    // Previously resolvable codes are untouched by the merge.
    assert_eq!(merged_cmap.get(&(b'H' as u32)).map(|s| s.as_str()), Some("H"));

    let (new_first_char, new_widths) = doc.read_widths(font_ref).expect("read_widths should succeed");
    assert_eq!(new_first_char, 0);
    assert!(new_widths.len() > allocation.code as usize);
    assert_ne!(new_widths.len(), original_widths.len(), "widths array is re-indexed from 0 and extended to the new code");
    // Codes the font already had widths for keep those widths exactly.
    assert_eq!(new_widths[b'H' as usize], original_widths[(b'H' - 32) as usize]);
    assert_eq!(new_widths[b'i' as usize], original_widths[(b'i' - 32) as usize]);
    // The newly allocated code gets a width even though the embedded
    // program has no glyph for it yet (falls back to the font's average).
    assert!(new_widths[allocation.code as usize] > 0.0);

    let patched_program = doc.read_font_program(font_ref).expect("read_font_program should succeed").expect("font program should still be present");
    assert_ne!(patched_program, original_program.unwrap(), "subsetting rewrites the program bytes");
    let patched_face =
        pdf_oxide::fonts::truetype_parser::TrueTypeFont::parse(&patched_program).expect("patched program must remain a valid TrueType font");
    assert!(patched_face.glyph_id('H' as u32).is_some(), "subsetting keeps glyphs the replacement still needs");
}

#[test]
fn empty_target_is_rejected() {
    let (mut doc, _dir) = open_fixture(single_font_fixture(b"BT /TT0 12 Tf (Hello) Tj ET"));
    let err = doc.replace_text(0, "", "World", &ReplaceOptions::default()).expect_err("empty target should fail");
    assert!(matches!(err, pdf_oxide::error::Error::EmptyTarget));
}

#[test]
fn identical_target_and_replacement_is_rejected() {
    let (mut doc, _dir) = open_fixture(single_font_fixture(b"BT /TT0 12 Tf (Hello) Tj ET"));
    let err = doc.replace_text(0, "Hello", "Hello", &ReplaceOptions::default()).expect_err("identical target/replacement should fail");
    assert!(matches!(err, pdf_oxide::error::Error::IdenticalTargetReplacement));
}

#[test]
fn search_text_locates_without_rewriting() {
    let (mut doc, _dir) = open_fixture(single_font_fixture(b"BT /TT0 12 Tf (Hello) Tj ET"));
    let matches = doc.search_text("Hello", Some(0), true).expect("search should succeed");
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].text, "Hello");

    let content_before = doc.content_bytes(0).expect("content bytes");
    assert!(content_before.windows(b"Hello".len()).any(|w| w == b"Hello"));
}

#[test]
fn replace_then_reverse_replace_round_trips_the_decoded_text() {
    let (mut doc, _dir) = open_fixture(single_font_fixture(b"BT /TT0 12 Tf (Hello) Tj ET"));

    doc.replace_text(0, "Hello", "World", &ReplaceOptions::default()).expect("first replace should succeed");
    doc.replace_text(0, "World", "Hello", &ReplaceOptions::default()).expect("reverse replace should succeed");

    let elements = doc.parse_page_text(0).expect("parse should succeed");
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0].text, "Hello");
}

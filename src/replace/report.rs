//! Observable outputs of the replacement core: `ReplacementReport`, plus the
//! read-only `analyze_fonts`/`search`/`parse_page_text` library surface's
//! result types.

use crate::geometry::Rect;

/// Severity of one `LogEntry`, mirroring the original implementation's
/// `[INFO]`/`[DEBUG]`/`[WARNING]`/`[ERROR]`/`[SUCCESS]`/`[DATA]` line
/// prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Informational progress message.
    Info,
    /// Fine-grained tracing, including per-character allocation detail.
    Debug,
    /// A match was skipped or a non-fatal condition was hit.
    Warning,
    /// An operation-ending failure.
    Error,
    /// A match was rewritten successfully.
    Success,
    /// Structured data worth recording at high verbosity (allocation
    /// triples, etc.) but not meant to read as prose.
    Data,
}

impl Level {
    /// The `[LEVEL]` prefix used in both the log file and CLI stdout.
    pub fn prefix(&self) -> &'static str {
        match self {
            Level::Info => "[INFO]",
            Level::Debug => "[DEBUG]",
            Level::Warning => "[WARNING]",
            Level::Error => "[ERROR]",
            Level::Success => "[SUCCESS]",
            Level::Data => "[DATA]",
        }
    }

    /// Whether a `LogEntry` at this level should be printed to stdout at a
    /// given `--verbose` level: `0` prints only `Error`; `1` (default) adds
    /// `Warning`/`Info`/`Success`; `2` adds `Data`; `3` adds `Debug`.
    pub fn should_print(&self, verbose: u8) -> bool {
        match self {
            Level::Error => true,
            Level::Warning | Level::Info | Level::Success => verbose >= 1,
            Level::Data => verbose >= 2,
            Level::Debug => verbose >= 3,
        }
    }
}

/// One recorded log line. All entries are always recorded in
/// `ReplacementReport.log` regardless of verbosity; verbosity only gates
/// what the CLI prints.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity.
    pub level: Level,
    /// Human-readable message.
    pub message: String,
}

impl LogEntry {
    /// Construct a log entry.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self { level, message: message.into() }
    }

    /// Render as `[LEVEL] message`, the line format used both on stdout and
    /// in the optional `--log-file`.
    pub fn render(&self) -> String {
        format!("{} {}", self.level.prefix(), self.message)
    }
}

/// Why a match was skipped rather than rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefusalReason {
    /// A replacement character has no usable code in the match's font and
    /// `allow_auto_insert` was `false`.
    UnsupportedCharacter,
    /// The match's font is not a single-byte TrueType font in scope for
    /// replacement.
    FontSubtypeOutOfScope,
    /// `allow_auto_insert` was `true` but no free code remained in either
    /// allocation range.
    NoFreeCode,
}

impl RefusalReason {
    /// The machine-readable reason string used for `ReplacementReport`'s
    /// refusal entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefusalReason::UnsupportedCharacter => "unsupported_character",
            RefusalReason::FontSubtypeOutOfScope => "font_subtype_out_of_scope",
            RefusalReason::NoFreeCode => "no_free_code",
        }
    }
}

/// One match that was located but not rewritten, with the reason why.
#[derive(Debug, Clone)]
pub struct Refusal {
    /// Discovery-order instance index of the match within the page.
    pub instance_index: usize,
    /// Font alias the match was drawn under, if any.
    pub font_alias: Option<String>,
    /// Why the match was left untouched.
    pub reason: RefusalReason,
}

/// A newly allocated `(font alias, byte code, Unicode scalar)` triple,
/// reported so callers/tests can verify that no two characters allocated
/// during one operation share a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Font alias the code was allocated for.
    pub alias: String,
    /// Newly allocated byte code.
    pub code: u8,
    /// Unicode scalar the code now maps to.
    pub scalar: char,
}

/// The outcome of one `replace_text` call.
#[derive(Debug, Clone, Default)]
pub struct ReplacementReport {
    /// Number of matches located (regardless of instance-index filtering).
    pub located: usize,
    /// Number of matches actually rewritten.
    pub rewritten: usize,
    /// Matches that were located but left untouched, with reasons.
    pub refused: Vec<Refusal>,
    /// Newly allocated codes, across all rewritten matches.
    pub allocations: Vec<Allocation>,
    /// Font aliases whose CMap/widths/program were patched.
    pub patched_fonts: Vec<String>,
    /// Full log, independent of any `--verbose` filtering.
    pub log: Vec<LogEntry>,
}

impl ReplacementReport {
    pub(crate) fn log(&mut self, level: Level, message: impl Into<String>) {
        self.log.push(LogEntry::new(level, message));
    }

    /// Count of refusals matching a specific reason, for test assertions
    /// and CLI summaries.
    pub fn refused_count(&self, reason: RefusalReason) -> usize {
        self.refused.iter().filter(|r| r.reason == reason).count()
    }
}

/// One font's identity and `ToUnicode` mapping, as reported by
/// `analyze_fonts`.
#[derive(Debug, Clone)]
pub struct FontReport {
    /// Page index the font was observed on (a font dictionary shared across
    /// pages is reported once per page it's referenced from, since width/
    /// CMap patches are addressed per `ObjectRef` rather than per alias).
    pub page_index: usize,
    /// Font alias on that page.
    pub alias: String,
    /// `/BaseFont` name.
    pub base_font: String,
    /// Number of entries in the font's decode CMap.
    pub cmap_size: usize,
    /// Every `code -> scalar` pair in the font's decode CMap, ascending by
    /// code.
    pub entries: Vec<(u8, char)>,
}

/// A pure text match, with no UI/rendering dependency. `bbox` is only
/// populated when a rendering collaborator supplies one; this crate's
/// replacement core never does, so it is always `None` here.
#[derive(Debug, Clone)]
pub struct Match {
    /// Page the match was found on.
    pub page_index: usize,
    /// Discovery-order instance index within the page.
    pub instance_index: usize,
    /// The font alias the match was drawn under, if any.
    pub font_alias: Option<String>,
    /// The matched text itself.
    pub text: String,
    /// Bounding rectangle, only populated by a rendering collaborator this
    /// crate does not implement.
    pub bbox: Option<Rect>,
}

/// One decoded show-operator run, in content-stream order, as produced by
/// `parse_page_text`.
#[derive(Debug, Clone)]
pub struct TextElement {
    /// Discovery-order index of the show operator on the page.
    pub instance_index: usize,
    /// Font alias active at the time, if any.
    pub font_alias: Option<String>,
    /// Decoded Unicode text.
    pub text: String,
}

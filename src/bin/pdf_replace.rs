//! Text replacement CLI.
//!
//! Usage:
//!   pdf_replace replace --input PATH --output PATH --find STR --replace STR [--page N] [--instance K] [--allow-auto-insert] [--verbose 0..3] [--log-file PATH]
//!   pdf_replace search --input PATH --find STR [--page N] [--case-sensitive] [--json] [--json-file PATH]
//!   pdf_replace parse --input PATH [--page N] [--json] [--json-file PATH]

use pdf_oxide::replace::report::{Match, TextElement};
use pdf_oxide::replace::ReplaceOptions;
use pdf_oxide::PdfDocument;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: pdf_replace <replace|search|parse> [flags...]");
        return ExitCode::from(3);
    }

    match args[1].as_str() {
        "replace" => run_replace(&args[2..]),
        "search" => run_search(&args[2..]),
        "parse" => run_parse(&args[2..]),
        other => {
            eprintln!("unknown subcommand: {}", other);
            ExitCode::from(3)
        },
    }
}

fn run_replace(args: &[String]) -> ExitCode {
    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut find: Option<String> = None;
    let mut replace: Option<String> = None;
    let mut page: usize = 0;
    let mut instance: Option<usize> = None;
    let mut allow_auto_insert = false;
    let mut verbose: u8 = 1;
    let mut log_file: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input = args.get(i).map(PathBuf::from);
            },
            "--output" => {
                i += 1;
                output = args.get(i).map(PathBuf::from);
            },
            "--find" => {
                i += 1;
                find = args.get(i).cloned();
            },
            "--replace" => {
                i += 1;
                replace = args.get(i).cloned();
            },
            "--page" => {
                i += 1;
                page = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(0);
            },
            "--instance" => {
                i += 1;
                instance = args.get(i).and_then(|s| s.parse().ok());
            },
            "--allow-auto-insert" => allow_auto_insert = true,
            "--verbose" => {
                i += 1;
                verbose = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(1);
            },
            "--log-file" => {
                i += 1;
                log_file = args.get(i).map(PathBuf::from);
            },
            other => {
                eprintln!("unknown flag: {}", other);
                return ExitCode::from(3);
            },
        }
        i += 1;
    }

    let (Some(input), Some(output), Some(find), Some(replace)) = (input, output, find, replace) else {
        eprintln!("replace requires --input, --output, --find, --replace");
        return ExitCode::from(3);
    };

    let mut doc = match PdfDocument::open(&input) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("[ERROR] failed to open {}: {}", input.display(), e);
            return ExitCode::from(3);
        },
    };

    let options = ReplaceOptions { instance_index: instance, allow_auto_insert, ..ReplaceOptions::default() };

    let report = match doc.replace_text(page, &find, &replace, &options) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            return ExitCode::from(3);
        },
    };

    for entry in &report.log {
        if entry.level.should_print(verbose) {
            println!("{}", entry.render());
        }
    }

    if let Some(path) = &log_file {
        if let Err(e) = append_log(path, &report.log) {
            eprintln!("[ERROR] failed to write log file {}: {}", path.display(), e);
        }
    }

    if report.located == 0 {
        println!("[INFO] no match found");
        return ExitCode::from(1);
    }

    if report.rewritten == 0 {
        println!("[INFO] all {} located matches were refused", report.located);
        return ExitCode::from(2);
    }

    if let Err(e) = doc.save(&output) {
        eprintln!("[ERROR] failed to save {}: {}", output.display(), e);
        return ExitCode::from(3);
    }

    if !report.refused.is_empty() {
        println!(
            "[SUCCESS] rewrote {} of {} located matches ({} refused)",
            report.rewritten,
            report.located,
            report.refused.len()
        );
    } else {
        println!("[SUCCESS] rewrote {} of {} located matches", report.rewritten, report.located);
    }
    ExitCode::SUCCESS
}

fn append_log(path: &std::path::Path, entries: &[pdf_oxide::replace::report::LogEntry]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for entry in entries {
        writeln!(file, "{}", entry.render())?;
    }
    Ok(())
}

fn run_search(args: &[String]) -> ExitCode {
    let mut input: Option<PathBuf> = None;
    let mut find: Option<String> = None;
    let mut page: Option<usize> = None;
    let mut case_sensitive = false;
    let mut json = false;
    let mut json_file: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input = args.get(i).map(PathBuf::from);
            },
            "--find" => {
                i += 1;
                find = args.get(i).cloned();
            },
            "--page" => {
                i += 1;
                page = args.get(i).and_then(|s| s.parse().ok());
            },
            "--case-sensitive" => case_sensitive = true,
            "--json" => json = true,
            "--json-file" => {
                i += 1;
                json_file = args.get(i).map(PathBuf::from);
            },
            other => {
                eprintln!("unknown flag: {}", other);
                return ExitCode::from(3);
            },
        }
        i += 1;
    }

    let (Some(input), Some(find)) = (input, find) else {
        eprintln!("search requires --input and --find");
        return ExitCode::from(3);
    };

    let mut doc = match PdfDocument::open(&input) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("[ERROR] failed to open {}: {}", input.display(), e);
            return ExitCode::from(3);
        },
    };

    let matches = match doc.search_text(&find, page, case_sensitive) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            return ExitCode::from(3);
        },
    };

    if json || json_file.is_some() {
        let body = matches_to_json(&matches);
        if json {
            println!("{}", body);
        }
        if let Some(path) = json_file {
            if let Err(e) = std::fs::write(&path, body) {
                eprintln!("[ERROR] failed to write {}: {}", path.display(), e);
                return ExitCode::from(3);
            }
        }
    } else {
        for m in &matches {
            println!(
                "page {} instance {} [{}]: {}",
                m.page_index,
                m.instance_index,
                m.font_alias.as_deref().unwrap_or("?"),
                m.text
            );
        }
    }

    ExitCode::SUCCESS
}

fn run_parse(args: &[String]) -> ExitCode {
    let mut input: Option<PathBuf> = None;
    let mut page: usize = 0;
    let mut json = false;
    let mut json_file: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input = args.get(i).map(PathBuf::from);
            },
            "--page" => {
                i += 1;
                page = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(0);
            },
            "--json" => json = true,
            "--json-file" => {
                i += 1;
                json_file = args.get(i).map(PathBuf::from);
            },
            other => {
                eprintln!("unknown flag: {}", other);
                return ExitCode::from(3);
            },
        }
        i += 1;
    }

    let Some(input) = input else {
        eprintln!("parse requires --input");
        return ExitCode::from(3);
    };

    let mut doc = match PdfDocument::open(&input) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("[ERROR] failed to open {}: {}", input.display(), e);
            return ExitCode::from(3);
        },
    };

    let elements = match doc.parse_page_text(page) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("[ERROR] {}", e);
            return ExitCode::from(3);
        },
    };

    if json || json_file.is_some() {
        let body = elements_to_json(&elements);
        if json {
            println!("{}", body);
        }
        if let Some(path) = json_file {
            if let Err(e) = std::fs::write(&path, body) {
                eprintln!("[ERROR] failed to write {}: {}", path.display(), e);
                return ExitCode::from(3);
            }
        }
    } else {
        for element in &elements {
            println!(
                "instance {} [{}]: {}",
                element.instance_index,
                element.font_alias.as_deref().unwrap_or("?"),
                element.text
            );
        }
    }

    ExitCode::SUCCESS
}

fn json_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn matches_to_json(matches: &[Match]) -> String {
    let items: Vec<String> = matches
        .iter()
        .map(|m| {
            format!(
                "{{\"page_index\":{},\"instance_index\":{},\"font_alias\":{},\"text\":\"{}\"}}",
                m.page_index,
                m.instance_index,
                m.font_alias.as_ref().map(|a| format!("\"{}\"", json_escape(a))).unwrap_or_else(|| "null".to_string()),
                json_escape(&m.text)
            )
        })
        .collect();
    format!("[{}]", items.join(","))
}

fn elements_to_json(elements: &[TextElement]) -> String {
    let items: Vec<String> = elements
        .iter()
        .map(|e| {
            format!(
                "{{\"instance_index\":{},\"font_alias\":{},\"text\":\"{}\"}}",
                e.instance_index,
                e.font_alias.as_ref().map(|a| format!("\"{}\"", json_escape(a))).unwrap_or_else(|| "null".to_string()),
                json_escape(&e.text)
            )
        })
        .collect();
    format!("[{}]", items.join(","))
}

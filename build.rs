use grep::regex::RegexMatcher;
use grep::searcher::{Searcher, Sink, SinkMatch};
use std::error::Error;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// Directories holding this crate's own Rust sources.
const SOURCE_DIRS: [&str; 4] = ["screen", "cli", "tests", "benches"];

// Collects every matching line of one file so a single error lists them all.
struct LineCollector {
    violations: Vec<String>,
    file_path: PathBuf,
    skip_doc_comments: bool,
}

impl LineCollector {
    fn new(file_path: &Path, skip_doc_comments: bool) -> Self {
        Self {
            violations: Vec::new(),
            file_path: file_path.to_path_buf(),
            skip_doc_comments,
        }
    }

    fn check_and_get_error_message(&self, rule: &str) -> Option<String> {
        if self.violations.is_empty() {
            return None;
        }

        let file_name = self.file_path.to_str().unwrap_or("?");
        let mut error_msg = format!(
            "\n❌ ERROR: Found {} violations in {}:\n",
            self.violations.len(),
            file_name
        );
        for violation in &self.violations {
            error_msg.push_str(&format!("   {violation}\n"));
        }
        error_msg.push_str(&format!("\n⚠️ {rule}\n"));
        Some(error_msg)
    }
}

impl Sink for LineCollector {
    type Error = std::io::Error;

    fn matched(&mut self, _: &Searcher, mat: &SinkMatch) -> Result<bool, Self::Error> {
        let line_number = mat.line_number().unwrap_or(0);
        let line_text = std::str::from_utf8(mat.bytes()).unwrap_or("").trim_end();

        if self.skip_doc_comments && is_doc_comment(line_text) {
            return Ok(true);
        }

        self.violations.push(format!("{line_number}:{line_text}"));
        Ok(true)
    }
}

fn is_doc_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("///") || trimmed.starts_with("//!")
}

fn rust_sources() -> impl Iterator<Item = PathBuf> {
    SOURCE_DIRS.into_iter().flat_map(|dir| {
        WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "rs"))
            .map(|e| e.into_path())
    })
}

fn scan(pattern: &str, skip_doc_comments: bool, rule: &str) -> Result<(), Box<dyn Error>> {
    let matcher = RegexMatcher::new_line_matcher(pattern)?;
    let mut searcher = Searcher::new();

    for path in rust_sources() {
        let mut collector = LineCollector::new(&path, skip_doc_comments);
        searcher.search_path(&matcher, &path, &mut collector)?;
        if let Some(error_message) = collector.check_and_get_error_message(rule) {
            return Err(error_message.into());
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    for dir in SOURCE_DIRS {
        println!("cargo:rerun-if-changed={dir}");
    }

    let checks = [
        (
            r"(//|/\*).*\b(FIXED|CORRECTED|FIX|FIXES|NEW|CHANGED|CHANGES|CHANGE|MODIFIED|MODIFIES|MODIFY|UPDATED|UPDATES|UPDATE)\b",
            false,
            "Comments narrating edits (FIXED, NEW, CHANGED, UPDATED and similar) are not allowed. Describe the code as it is.",
        ),
        (
            r"(//|/\*).*\*\*",
            true,
            "The '**' pattern is not allowed in regular comments (it is allowed in doc comments).",
        ),
        (
            r"#\s*\[\s*allow\s*\(\s*dead_code\s*\)\s*\]",
            false,
            "#[allow(dead_code)] is not allowed. Either use the code or remove it.",
        ),
    ];

    for (pattern, skip_doc_comments, rule) in checks {
        if let Err(e) = scan(pattern, skip_doc_comments, rule) {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

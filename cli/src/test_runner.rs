use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use inkwell::{Document, ParseError, Parser, ParserOptions};

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// If set, the warning's span must start on this 1-based source line.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Human-readable test description.
    #[serde(default)]
    pub description: Option<String>,

    /// Parser options, same keys as an options file.
    #[serde(default)]
    pub options: Option<toml::Table>,

    #[serde(default)]
    pub expect_words: Option<usize>,

    #[serde(default)]
    pub expect_chars: Option<usize>,

    /// Expected link URLs, in document order.
    #[serde(default)]
    pub expect_links: Option<Vec<String>>,

    /// Expected wiki-link targets found in the raw source, in order.
    #[serde(default)]
    pub expect_wikilinks: Option<Vec<String>>,

    /// Expected outline, one entry per line, indented two spaces per depth.
    #[serde(default)]
    pub expect_toc: Option<String>,

    /// Expected warnings. If present (even empty), warning count and content are checked.
    #[serde(default)]
    pub expect_warnings: Option<Vec<ExpectedWarning>>,
}

/// Parse a `.test.md` file into its TOML config and Markdown body.
fn parse_test_file(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with("---") {
        return Err("missing opening --- frontmatter delimiter".into());
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest_start = close_pos + 4; // skip \n---
    let source = after_open[rest_start..]
        .strip_prefix("\r\n")
        .or_else(|| after_open[rest_start..].strip_prefix('\n'))
        .unwrap_or(&after_open[rest_start..]);

    let config: TestConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

fn parser_options(table: Option<&toml::Table>) -> Result<ParserOptions, String> {
    let Some(table) = table else {
        return Ok(ParserOptions::default());
    };
    let text = toml::to_string(table).map_err(|e| e.to_string())?;
    ParserOptions::from_toml_str(&text).map_err(|e| e.to_string())
}

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

fn run_single_test(path: &Path) -> TestResult {
    let fail = |description: Option<String>, reason: String| TestResult {
        path: path.to_path_buf(),
        description,
        outcome: TestOutcome::Fail(reason),
    };

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => return fail(None, format!("cannot read file: {}", e)),
    };

    let (config, source) = match parse_test_file(&content) {
        Ok(pair) => pair,
        Err(e) => return fail(None, format!("frontmatter error: {}", e)),
    };

    let description = config.description.clone();

    let options = match parser_options(config.options.as_ref()) {
        Ok(options) => options,
        Err(e) => return fail(description, format!("options error: {}", e)),
    };

    let parser = Parser::new(options);
    let document = parser.parse(source);

    match check_document(&config, &parser, source, &document) {
        Some(reason) => fail(description, reason),
        None => TestResult {
            path: path.to_path_buf(),
            description,
            outcome: TestOutcome::Pass,
        },
    }
}

/// Check every expectation the config states. Returns `Some(reason)` on the
/// first mismatch.
fn check_document(
    config: &TestConfig,
    parser: &Parser,
    source: &str,
    document: &Document,
) -> Option<String> {
    if let Some(expected) = config.expect_words {
        let actual = document.word_count();
        if actual != expected {
            return Some(format!("expected {} word(s), got {}", expected, actual));
        }
    }

    if let Some(expected) = config.expect_chars {
        let actual = document.character_count();
        if actual != expected {
            return Some(format!("expected {} character(s), got {}", expected, actual));
        }
    }

    if let Some(expected) = &config.expect_links {
        let actual: Vec<String> = document.extract_links().into_iter().map(|l| l.url).collect();
        if &actual != expected {
            return Some(format!(
                "link mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, actual
            ));
        }
    }

    if let Some(expected) = &config.expect_wikilinks {
        let actual: Vec<String> = parser
            .detect_wikilinks(source)
            .into_iter()
            .map(|l| l.url)
            .collect();
        if &actual != expected {
            return Some(format!(
                "wiki link mismatch\n  expected: {:?}\n  actual:   {:?}",
                expected, actual
            ));
        }
    }

    if let Some(expected) = &config.expect_toc {
        let actual = render_toc(document);
        if actual.trim_end() != expected.trim_end() {
            return Some(format!(
                "table of contents mismatch\n  expected:\n{}\n  actual:\n{}",
                indent(expected),
                indent(&actual)
            ));
        }
    }

    if let Some(expected) = &config.expect_warnings {
        return check_warnings(source, document.diagnostics(), expected);
    }

    None
}

fn render_toc(document: &Document) -> String {
    let mut out = String::new();
    for (depth, entry) in document.toc().flatten() {
        out.push_str(&"  ".repeat(depth));
        out.push_str(&entry.text);
        out.push('\n');
    }
    out
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convert a byte offset in `source` to a 1-based line number.
fn byte_offset_to_line(source: &str, offset: usize) -> usize {
    source[..offset.min(source.len())]
        .bytes()
        .filter(|&b| b == b'\n')
        .count()
        + 1
}

/// Check that actual warnings match expectations. Returns `Some(reason)` on mismatch.
fn check_warnings(
    source: &str,
    diagnostics: &[ParseError],
    expected: &[ExpectedWarning],
) -> Option<String> {
    let actual_warnings: Vec<&ParseError> = diagnostics.iter().filter(|d| d.is_warning()).collect();

    if actual_warnings.len() != expected.len() {
        let actual_msgs: Vec<String> = actual_warnings
            .iter()
            .map(|w| format!("  - {}", w.message))
            .collect();
        return Some(format!(
            "expected {} warning(s), got {}\n  actual warnings:\n{}",
            expected.len(),
            actual_warnings.len(),
            if actual_msgs.is_empty() {
                "    (none)".to_string()
            } else {
                actual_msgs.join("\n")
            }
        ));
    }

    for (i, (actual, expected)) in actual_warnings.iter().zip(expected.iter()).enumerate() {
        if !actual.message.contains(&expected.contains) {
            return Some(format!(
                "warning[{}]: expected message containing \"{}\", got: {}",
                i, expected.contains, actual.message
            ));
        }

        if let Some(expected_line) = expected.line {
            let actual_line = byte_offset_to_line(source, actual.span.start);
            if actual_line != expected_line {
                return Some(format!(
                    "warning[{}]: expected on line {}, but span is on line {}",
                    i, expected_line, actual_line
                ));
            }
        }
    }

    None
}

/// Discover `.test.md` files grouped by category (subfolder relative to root).
/// Files directly in `root` get category "" (uncategorized).
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_tests(&path, root, out);
        } else if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.ends_with(".test.md") {
                let category = path
                    .parent()
                    .and_then(|p| p.strip_prefix(root).ok())
                    .map(|p| p.to_string_lossy().replace('\\', "/"))
                    .unwrap_or_default();
                out.entry(category).or_default().push(path);
            }
        }
    }
}

/// List available categories for the given test path.
pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (cat, files) in &categories {
        let label = if cat.is_empty() { "(root)" } else { cat.as_str() };
        eprintln!("  {} ({} tests)", label, files.len());
    }
}

fn pass_label(no_color: bool) -> &'static str {
    if no_color { "PASS" } else { "\x1b[32mPASS\x1b[0m" }
}

fn fail_label(no_color: bool) -> &'static str {
    if no_color { "FAIL" } else { "\x1b[31mFAIL\x1b[0m" }
}

fn bold(s: &str, no_color: bool) -> String {
    if no_color {
        s.to_string()
    } else {
        format!("\x1b[1m{}\x1b[0m", s)
    }
}

fn label_for<'a>(result: &'a TestResult) -> &'a str {
    result.description.as_deref().unwrap_or_else(|| {
        result
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("?")
    })
}

/// Select the test files to run: one file, or every file under a directory,
/// optionally restricted to `categories` (a category also selects its
/// subcategories).
fn select_tests(path: &Path, categories: &[String]) -> Result<Vec<(String, Vec<PathBuf>)>, String> {
    if path.is_file() {
        return Ok(vec![(String::new(), vec![path.to_path_buf()])]);
    }

    let all_categories = discover_categorized(path);
    if all_categories.is_empty() {
        return Err(format!("no .test.md files found in {}", path.display()));
    }

    if categories.is_empty() {
        return Ok(all_categories.into_iter().collect());
    }

    let mut selected = BTreeMap::new();
    for requested in categories {
        let req = requested.trim_matches('/');
        let mut found = false;
        for (cat, files) in &all_categories {
            if cat == req || cat.starts_with(&format!("{}/", req)) {
                selected.insert(cat.clone(), files.clone());
                found = true;
            }
        }
        if !found {
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                all_categories
                    .keys()
                    .map(|k| if k.is_empty() { "(root)" } else { k.as_str() })
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
    }

    if selected.is_empty() {
        return Err("no matching categories found".into());
    }
    Ok(selected.into_iter().collect())
}

/// Run all `.test.md` files under `path` (or a single file).
/// Returns exit code: 0 = all pass, 1 = any failure.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let selected = match select_tests(path, categories) {
        Ok(selected) => selected,
        Err(message) => {
            eprintln!("{}", message);
            return 1;
        }
    };
    let single_file = path.is_file();

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (cat, files) in &selected {
        if !single_file {
            let header = if cat.is_empty() { "(root)" } else { cat.as_str() };
            eprintln!();
            eprintln!("{}", bold(header, no_color));
        }

        for file in files {
            let result = run_single_test(file);
            match &result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", pass_label(no_color), label_for(&result));
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", fail_label(no_color), label_for(&result));
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for f in &failures {
            eprintln!();
            eprintln!("  --- {} ---", f.path.display());
            if let TestOutcome::Fail(reason) = &f.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    let failed = failures.len();
    eprintln!();
    if failed == 0 {
        let ok = if no_color { "ok" } else { "\x1b[32mok\x1b[0m" };
        eprintln!("test result: {}. {} passed, 0 failed", ok, passed);
        0
    } else {
        let label = if no_color { "FAILED" } else { "\x1b[31mFAILED\x1b[0m" };
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            label,
            passed,
            failed,
            passed + failed
        );
        1
    }
}

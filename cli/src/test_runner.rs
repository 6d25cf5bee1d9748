use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use shapescript::parser::{ErrorKind, ParseError, Parser};

const EXTENSION: &str = ".test.shs";

#[derive(Debug, Deserialize)]
pub struct ExpectedWarning {
    /// Substring that must appear in the warning message.
    pub contains: String,

    /// Diagnostic code, e.g. `type-mismatch`.
    #[serde(default)]
    pub code: Option<String>,

    /// 1-based source line the warning must be reported on.
    #[serde(default)]
    pub line: Option<usize>,
}

/// `expect_parse_error = true` accepts any fatal error; a string names
/// the required code.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ExpectParseError {
    Any(bool),
    Code(String),
}

#[derive(Debug, Deserialize)]
pub struct TestConfig {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub expect_parse_error: Option<ExpectParseError>,

    /// If present (even empty), the warning count and content are checked in order.
    #[serde(default)]
    pub expect_warnings: Option<Vec<ExpectedWarning>>,

    /// Expected `BlockTree::outline`, compared after trimming.
    #[serde(default)]
    pub expect_outline: Option<String>,
}

/// Split a fixture into its TOML frontmatter and the shapescript source.
fn split_fixture(content: &str) -> Result<(TestConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}');
    let rest = content
        .strip_prefix("---")
        .ok_or("missing opening --- frontmatter delimiter")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);

    let (frontmatter, after) = match rest.strip_prefix("---") {
        Some(after) => ("", after),
        None => {
            let close = rest
                .find("\n---")
                .ok_or("missing closing --- frontmatter delimiter")?;
            (rest[..close].trim_end_matches('\r'), &rest[close + "\n---".len()..])
        }
    };
    let source = after
        .strip_prefix("\r\n")
        .or_else(|| after.strip_prefix('\n'))
        .unwrap_or(after);

    let config = toml::from_str(frontmatter).map_err(|e| format!("TOML parse error: {}", e))?;
    Ok((config, source))
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

impl TestResult {
    fn label(&self) -> &str {
        self.description
            .as_deref()
            .or_else(|| self.path.file_name().and_then(|n| n.to_str()))
            .map(|name| name.trim_end_matches(EXTENSION))
            .unwrap_or("?")
    }
}

fn run_single_test(path: &Path) -> TestResult {
    let (description, outcome) = match std::fs::read_to_string(path) {
        Ok(content) => match split_fixture(&content) {
            Ok((config, source)) => (config.description.clone(), check_fixture(&config, source)),
            Err(e) => (None, Err(format!("frontmatter error: {}", e))),
        },
        Err(e) => (None, Err(format!("cannot read file: {}", e))),
    };
    debug!("{}: {}", path.display(), if outcome.is_ok() { "pass" } else { "fail" });

    TestResult {
        path: path.to_path_buf(),
        description,
        outcome: match outcome {
            Ok(()) => TestOutcome::Pass,
            Err(reason) => TestOutcome::Fail(reason),
        },
    }
}

/// Parse `source` and hold it against every expectation in `config`.
fn check_fixture(config: &TestConfig, source: &str) -> Result<(), String> {
    let result = Parser::new(source.to_string(), 0).parse();

    let program = match (&config.expect_parse_error, result) {
        (Some(ExpectParseError::Any(true)), Err(_)) => return Ok(()),
        (Some(ExpectParseError::Code(code)), Err(error)) => {
            return if error.kind.code() == code {
                Ok(())
            } else {
                Err(format!(
                    "expected parse error `{}`, got `{}`: {}",
                    code,
                    error.kind.code(),
                    error
                ))
            };
        }
        (Some(ExpectParseError::Any(true) | ExpectParseError::Code(_)), Ok(_)) => {
            return Err("expected parse error, but parsing succeeded".into());
        }
        (_, Err(error)) => return Err(format!("unexpected parse error: {}", error)),
        (_, Ok(program)) => program,
    };

    if let Some(expected) = &config.expect_warnings {
        check_warnings(&program.diagnostics, expected)?;
    }

    if let Some(expected) = &config.expect_outline {
        let actual = program.tree.outline(source);
        if actual.trim() != expected.trim() {
            return Err(format!(
                "outline mismatch\n  expected:\n{}\n  actual:\n{}",
                indent(expected.trim()),
                indent(actual.trim())
            ));
        }
    }

    Ok(())
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|l| format!("    {}", l))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compare diagnostics against expectations, pairwise in source order.
fn check_warnings(actual: &[ParseError], expected: &[ExpectedWarning]) -> Result<(), String> {
    if actual.len() != expected.len() {
        let listed = if actual.is_empty() {
            "    (none)".to_string()
        } else {
            actual
                .iter()
                .map(|w| format!("  - [{}] {}", w.kind.code(), w))
                .collect::<Vec<_>>()
                .join("\n")
        };
        return Err(format!(
            "expected {} warning(s), got {}\n  actual warnings:\n{}",
            expected.len(),
            actual.len(),
            listed
        ));
    }

    for (i, (warning, want)) in actual.iter().zip(expected).enumerate() {
        if !warning.message.contains(&want.contains) {
            return Err(format!(
                "warning[{}]: expected message containing \"{}\", got: {}",
                i, want.contains, warning.message
            ));
        }
        if let Some(code) = &want.code {
            if ErrorKind::from_code(code).is_none() {
                return Err(format!("warning[{}]: `{}` is not a diagnostic code", i, code));
            }
            if warning.kind.code() != code {
                return Err(format!(
                    "warning[{}]: expected code `{}`, got `{}`",
                    i,
                    code,
                    warning.kind.code()
                ));
            }
        }
        if let Some(line) = want.line
            && warning.line + 1 != line
        {
            return Err(format!(
                "warning[{}]: expected on line {}, but reported on line {}",
                i,
                line,
                warning.line + 1
            ));
        }
    }
    Ok(())
}

/// Fixtures grouped by the folder they sit in, relative to `root`.
/// Files directly in `root` have category "".
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_fixtures(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_fixtures(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        if path.is_dir() {
            collect_fixtures(&path, root, out);
            continue;
        }
        let is_fixture = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(EXTENSION));
        if is_fixture {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }
    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no {} files found in {}", EXTENSION, path.display());
        return;
    }
    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} tests)", category_label(category), files.len());
    }
}

/// ANSI styling for the report, switched off by `--no-color`.
struct Style {
    color: bool,
}

impl Style {
    fn paint(&self, text: &str, code: &str) -> String {
        if self.color {
            format!("\x1b[{}m{}\x1b[0m", code, text)
        } else {
            text.to_string()
        }
    }

    fn pass(&self) -> String {
        self.paint("PASS", "32")
    }

    fn fail(&self) -> String {
        self.paint("FAIL", "31")
    }

    fn bold(&self, text: &str) -> String {
        self.paint(text, "1")
    }
}

/// Keep the categories matching a requested name or nested below it.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a Vec<PathBuf>> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v)).collect();
    }
    let mut selected = BTreeMap::new();
    for req in requested {
        let req = req.trim_matches('/');
        let nested = format!("{}/", req);
        let before = selected.len();
        for (category, files) in all {
            if category == req || category.starts_with(&nested) {
                selected.insert(category.as_str(), files);
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                req,
                available.join(", ")
            );
        }
    }
    selected
}

/// Run every fixture under `path` (or the single file), printing a report.
/// Returns the process exit code: 0 when all pass, 1 otherwise.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let style = Style { color: !no_color };

    let groups: Vec<(String, Vec<PathBuf>)> = if path.is_file() {
        vec![(String::new(), vec![path.to_path_buf()])]
    } else {
        let all = discover_categorized(path);
        if all.is_empty() {
            eprintln!("no {} files found in {}", EXTENSION, path.display());
            return 1;
        }
        let selected = select_categories(&all, categories);
        if selected.is_empty() {
            eprintln!("no matching categories found");
            return 1;
        }
        selected
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    };
    let single = path.is_file();

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &groups {
        if !single {
            eprintln!();
            eprintln!("{}", style.bold(category_label(category)));
        }
        for file in files {
            let result = run_single_test(file);
            match result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", style.pass(), result.label());
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", style.fail(), result.label());
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    if failures.is_empty() {
        eprintln!("test result: {}. {} passed, 0 failed", style.paint("ok", "32"), passed);
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            style.paint("FAILED", "31"),
            passed,
            failures.len(),
            passed + failures.len()
        );
        1
    }
}

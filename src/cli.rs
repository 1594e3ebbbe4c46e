//! Minimal CLI: declarations + documents → pass/fail report
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;
use shape_guard::{Declarations, Record, Shape};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// validate JSON/NDJSON documents against shapes declared in a JSON file
#[derive(Parser, Debug)]
#[command(name = "shape-guard", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,

    /// disable colored output
    #[arg(long, global = true, default_value_t = false)]
    no_color: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// validate every input document against one shape
    Check(CheckOut),
    /// print the effective field specs of every declared shape
    Shapes(ShapesOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat input as newline-delimited JSON (NDJSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// JSON Pointer to select a subnode in each document (e.g. /data/items/0/payload)
    #[arg(long)]
    json_pointer: Option<String>,

    /// JQ pre-process filter for each document.
    #[arg(long)]
    jq_expr: Option<String>,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// shape declaration file (.json)
    #[arg(long)]
    shapes: PathBuf,

    /// name of the shape every document must satisfy
    #[arg(long)]
    shape: String,

    /// write each valid document's JSON projection, one per line
    #[arg(long, default_value_t = false)]
    emit: bool,

    /// output .ndjson file for --emit (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct ShapesOut {
    /// shape declaration file (.json)
    #[arg(long)]
    shapes: PathBuf,
}

/// One input document and where it came from.
#[derive(Debug, Clone, PartialEq)]
struct Document {
    source: String,
    value: Value,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn load_documents(&self) -> Result<Vec<Document>> {
        let source_paths = resolve_file_path_patterns(&self.input)
            .context("failed to resolve input file paths")?;
        let mut documents = Vec::new();
        for source_path in source_paths {
            let source_path_str = source_path.to_string_lossy().to_string();
            let source = std::fs::read_to_string(&source_path)
                .with_context(|| format!("failed to read source file ({source_path_str})"))?;
            documents.extend(self.parse_source(&source_path_str, &source)?);
        }
        Ok(documents)
    }

    /// Split one source into documents, then narrow each by pointer and jq.
    fn parse_source(&self, name: &str, source: &str) -> Result<Vec<Document>> {
        let mut raw = Vec::new();
        if self.ndjson {
            for (ix, line) in source.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let value = serde_json::from_str::<Value>(line)
                    .with_context(|| format!("failed to parse JSON line ({name}:{})", ix + 1))?;
                raw.push((format!("{name}:{}", ix + 1), value));
            }
        } else {
            let value = serde_json::from_str::<Value>(source)
                .with_context(|| format!("failed to parse JSON source file ({name})"))?;
            raw.push((name.to_string(), value));
        }

        let mut documents = Vec::new();
        for (source, value) in raw {
            let value = match self.json_pointer.as_deref() {
                None => value,
                Some(pointer) => value
                    .pointer(pointer)
                    .cloned()
                    .ok_or_else(|| anyhow!("JSON pointer {pointer} selects nothing in {source}"))?,
            };
            match self.jq_expr.as_deref() {
                None => documents.push(Document { source, value }),
                Some(jq_expr) => {
                    let outputs = crate::jq_exec::run_jaq(jq_expr, &value)
                        .with_context(|| format!("failed to apply jq expression to {source}"))?;
                    for (ix, value) in outputs.into_iter().enumerate() {
                        documents.push(Document { source: format!("{source}#{ix}"), value });
                    }
                }
            }
        }
        Ok(documents)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> Result<ExitCode> {
        if self.no_color {
            colored::control::set_override(false);
        }
        match &self.cmd {
            Command::Check(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(ExitCode::SUCCESS);
                }
                target.run()
            }
            Command::Shapes(target) => {
                let declarations = load_declarations(&target.shapes)?;
                for name in declarations.names() {
                    if let Some(shape) = declarations.get(name) {
                        print!("{}", describe_shape(shape));
                    }
                }
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

impl CheckOut {
    fn run(&self) -> Result<ExitCode> {
        let declarations = load_declarations(&self.shapes)?;
        let Some(shape) = declarations.get(&self.shape) else {
            bail!(
                "no shape named `{}` in {} (declared: {})",
                self.shape,
                self.shapes.display(),
                declarations.names().collect::<Vec<_>>().join(", ")
            );
        };
        let documents = self.input_settings.load_documents()?;
        tracing::info!(shape = %self.shape, documents = documents.len(), "checking documents");

        // shapes are immutable and shared, so documents validate independently
        let results = documents
            .into_par_iter()
            .map(|doc| {
                let record = Record::from_document(shape, &doc.value);
                (doc, record)
            })
            .collect::<Vec<_>>();

        let mut emitted = String::new();
        let mut failed = 0usize;
        for (doc, record) in &results {
            match record {
                Ok(record) => {
                    eprintln!("{} {}", "ok".green().bold(), doc.source);
                    if self.emit {
                        emitted.push_str(&record.to_json().to_string());
                        emitted.push('\n');
                    }
                }
                Err(error) => {
                    failed += 1;
                    eprintln!("{} {}: {error}", "FAIL".red().bold(), doc.source);
                }
            }
        }
        let passed = results.len() - failed;
        eprintln!(
            "{} passed, {} failed",
            passed.to_string().green(),
            if failed > 0 { failed.to_string().red() } else { failed.to_string().normal() }
        );

        if self.emit {
            if let Some(out) = self.out.as_ref() {
                if let Some(parent) = out.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(out, &emitted)
                    .with_context(|| format!("failed to write {}", out.display()))?;
            } else {
                print!("{emitted}");
            }
        }

        Ok(if failed > 0 { ExitCode::FAILURE } else { ExitCode::SUCCESS })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn load_declarations(path: &Path) -> Result<Declarations> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read shape declarations ({})", path.display()))?;
    let declarations = source
        .parse::<Declarations>()
        .with_context(|| format!("invalid shape declarations ({})", path.display()))?;
    tracing::debug!(shapes = declarations.len(), path = %path.display(), "loaded declarations");
    Ok(declarations)
}

fn describe_shape(shape: &Shape) -> String {
    let mut out = format!("{} ({:?})\n", shape.name().bold(), shape.flavor());
    for (name, spec) in shape.fields() {
        let mut flags = Vec::new();
        if spec.is_required() { flags.push("required"); }
        if spec.is_immutable() { flags.push("immutable"); }
        if spec.coerces() { flags.push("coerce"); }
        if spec.choices().is_some() { flags.push("choices"); }
        if spec.predicate().is_some() { flags.push("predicate"); }
        out.push_str(&format!("  {name}: {}  {}\n", spec.types().describe(), flags.join(" ").dimmed()));
    }
    out
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{' ))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings(ndjson: bool, json_pointer: Option<&str>, jq_expr: Option<&str>) -> InputSettings {
        InputSettings {
            ndjson,
            json_pointer: json_pointer.map(str::to_string),
            jq_expr: jq_expr.map(str::to_string),
            input: vec!["unused".to_string()],
        }
    }

    #[test]
    fn ndjson_sources_yield_one_document_per_line() {
        let docs = settings(true, None, None)
            .parse_source("points.ndjson", "{\"x\": 1}\n\n{\"x\": 2}\n")
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "points.ndjson:1");
        assert_eq!(docs[1].source, "points.ndjson:3");
        assert_eq!(docs[1].value, json!({"x": 2}));
    }

    #[test]
    fn pointer_narrows_each_document() {
        let docs = settings(false, Some("/data/0"), None)
            .parse_source("wrapped.json", r#"{"data": [{"x": 1}]}"#)
            .unwrap();
        assert_eq!(docs, vec![Document { source: "wrapped.json".into(), value: json!({"x": 1}) }]);

        let missing = settings(false, Some("/nope"), None).parse_source("wrapped.json", "{}");
        assert!(missing.is_err());
    }

    #[test]
    fn jq_outputs_become_documents() {
        let docs = settings(false, None, Some(".[]"))
            .parse_source("list.json", r#"[{"x": 1}, {"x": 2}]"#)
            .unwrap();
        let sources = docs.iter().map(|d| d.source.as_str()).collect::<Vec<_>>();
        assert_eq!(sources, ["list.json#0", "list.json#1"]);
    }

    #[test]
    fn describe_lists_effective_flags() {
        colored::control::set_override(false);
        let declarations: Declarations =
            r#"{"shapes": {"Point": {"flavor": "strict", "fields": {"x": "integer"}}}}"#.parse().unwrap();
        let text = describe_shape(declarations.get("Point").unwrap());
        assert_eq!(text, "Point (Strict)\n  x: a `integer`  required immutable\n");
    }

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["a.json", "b/c.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("b/c.json")]);
    }
}

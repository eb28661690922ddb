//! Source scanner for the test-discovery engine.
//!
//! Walks a source tree, filters by extension and exclusion patterns, and
//! derives per-file metrics from the AST: imports, exported surface,
//! cyclomatic complexity, panic usage, I/O markers, and a testability
//! score.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use syn::visit::{self, Visit};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{EngineError, Result};

/// Markers that identify machine-written files.
const GENERATED_MARKERS: [&str; 2] = ["@generated", "DO NOT EDIT"];

const DB_IMPORT_MARKERS: [&str; 8] = [
    "rusqlite", "sqlx", "diesel", "postgres", "mongodb", "redis", "sled", "rocksdb",
];
const NETWORK_IMPORT_MARKERS: [&str; 6] =
    ["reqwest", "hyper", "axum", "tonic", "std::net", "tokio::net"];
const FILE_IMPORT_MARKERS: [&str; 2] = ["std::fs", "tokio::fs"];

/// Scanner configuration.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// File extensions to keep
    pub extensions: Vec<String>,
    /// Path patterns (regex over the path relative to the scan root) to
    /// skip entirely
    pub exclude_patterns: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["rs".to_string()],
            exclude_patterns: vec![
                r".*_test\.rs$".to_string(),
                r"(^|/)tests/".to_string(),
                r"(^|/)benches/".to_string(),
                r"(^|/)target/".to_string(),
                r"(^|/)\.git/".to_string(),
                r"(^|/)vendor/".to_string(),
                r"(^|/)testdata/".to_string(),
                r"(^|/)mocks?(/|_)".to_string(),
            ],
        }
    }
}

/// An exported function's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub param_count: usize,
    pub has_return: bool,
}

/// Everything the ranker needs to know about one source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub line_count: usize,
    pub import_count: usize,
    pub function_count: usize,
    pub method_count: usize,
    pub trait_count: usize,
    pub exported_functions: Vec<FunctionInfo>,
    pub exported_types: Vec<String>,
    pub complexity: u32,
    pub testability: i32,
    pub has_tests: bool,
    pub is_generated: bool,
    pub has_network_io: bool,
    pub has_db_io: bool,
    pub has_file_io: bool,
}

pub struct FileScanner {
    config: ScannerConfig,
    exclusions: Vec<Regex>,
}

impl FileScanner {
    pub fn new(config: ScannerConfig) -> Result<Self> {
        let exclusions = config
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    EngineError::Configuration(format!("bad exclusion pattern '{p}': {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { config, exclusions })
    }

    pub fn with_defaults() -> Self {
        Self::new(ScannerConfig::default()).expect("default patterns compile")
    }

    /// Walk the tree and analyze every kept file, in path order.
    ///
    /// Pattern-excluded paths are skipped outright; files that fail to
    /// parse are skipped with a warning. Content-level flags (generated
    /// marker, I/O markers) are recorded on the `FileInfo` and left to the
    /// ranker's exclusion rules.
    pub fn scan(&self, root: impl AsRef<Path>) -> Result<Vec<FileInfo>> {
        let root = root.as_ref();
        let mut files = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("walk error under {}: {e}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !self.config.extensions.iter().any(|e| e == extension) {
                continue;
            }
            let relative = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");
            if self.exclusions.iter().any(|re| re.is_match(&relative)) {
                continue;
            }

            match self.analyze(path) {
                Ok(info) => files.push(info),
                Err(e) => warn!("skipping unparseable file {}: {e}", path.display()),
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(kept = files.len(), root = %root.display(), "scan complete");
        Ok(files)
    }

    fn analyze(&self, path: &Path) -> Result<FileInfo> {
        let source = std::fs::read_to_string(path)?;
        let ast = syn::parse_file(&source)
            .map_err(|e| EngineError::Configuration(format!("parse failure: {e}")))?;

        let mut collector = AstCollector::default();
        collector.visit_file(&ast);

        let line_count = source.lines().count();
        let is_generated = GENERATED_MARKERS.iter().any(|m| source.contains(m));
        let has_tests = source.contains("#[cfg(test)]") || source.contains("#[test]");

        let has_db_io = collector.has_import_marker(&DB_IMPORT_MARKERS);
        let has_network_io = collector.has_import_marker(&NETWORK_IMPORT_MARKERS);
        let has_file_io = collector.has_import_marker(&FILE_IMPORT_MARKERS);

        let complexity = 1 + collector.branches + collector.panic_uses;
        let import_count = collector.imports.len();

        let mut testability: i32 = 100;
        if import_count > 10 {
            testability -= 2 * (import_count as i32 - 10);
        }
        if has_db_io {
            testability -= 20;
        }
        if has_network_io {
            testability -= 15;
        }
        if has_file_io {
            testability -= 10;
        }
        if !(5..=50).contains(&complexity) {
            testability -= 15;
        }
        testability += 5 * collector.trait_count as i32;
        let testability = testability.clamp(0, 100);

        Ok(FileInfo {
            path: path.to_path_buf(),
            line_count,
            import_count,
            function_count: collector.function_count,
            method_count: collector.method_count,
            trait_count: collector.trait_count,
            exported_functions: collector.exported_functions,
            exported_types: collector.exported_types,
            complexity,
            testability,
            has_tests,
            is_generated,
            has_network_io,
            has_db_io,
            has_file_io,
        })
    }
}

#[derive(Default)]
struct AstCollector {
    imports: Vec<String>,
    function_count: usize,
    method_count: usize,
    trait_count: usize,
    exported_functions: Vec<FunctionInfo>,
    exported_types: Vec<String>,
    branches: u32,
    panic_uses: u32,
}

impl AstCollector {
    fn has_import_marker(&self, markers: &[&str]) -> bool {
        self.imports
            .iter()
            .any(|import| markers.iter().any(|m| import.starts_with(m) || import.contains(m)))
    }
}

fn collect_use_paths(tree: &syn::UseTree, prefix: &str, out: &mut Vec<String>) {
    match tree {
        syn::UseTree::Path(p) => {
            let next = if prefix.is_empty() {
                p.ident.to_string()
            } else {
                format!("{prefix}::{}", p.ident)
            };
            collect_use_paths(&p.tree, &next, out);
        }
        syn::UseTree::Name(n) => {
            if prefix.is_empty() {
                out.push(n.ident.to_string());
            } else {
                out.push(format!("{prefix}::{}", n.ident));
            }
        }
        syn::UseTree::Rename(r) => out.push(format!("{prefix}::{}", r.ident)),
        syn::UseTree::Glob(_) => out.push(format!("{prefix}::*")),
        syn::UseTree::Group(g) => {
            for item in &g.items {
                collect_use_paths(item, prefix, out);
            }
        }
    }
}

impl<'ast> Visit<'ast> for AstCollector {
    fn visit_item_use(&mut self, node: &'ast syn::ItemUse) {
        collect_use_paths(&node.tree, "", &mut self.imports);
        visit::visit_item_use(self, node);
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        self.function_count += 1;
        if matches!(node.vis, syn::Visibility::Public(_)) {
            self.exported_functions.push(FunctionInfo {
                name: node.sig.ident.to_string(),
                param_count: node.sig.inputs.len(),
                has_return: !matches!(node.sig.output, syn::ReturnType::Default),
            });
        }
        visit::visit_item_fn(self, node);
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        self.method_count += 1;
        visit::visit_impl_item_fn(self, node);
    }

    fn visit_item_trait(&mut self, node: &'ast syn::ItemTrait) {
        self.trait_count += 1;
        if matches!(node.vis, syn::Visibility::Public(_)) {
            self.exported_types.push(node.ident.to_string());
        }
        visit::visit_item_trait(self, node);
    }

    fn visit_item_struct(&mut self, node: &'ast syn::ItemStruct) {
        if matches!(node.vis, syn::Visibility::Public(_)) {
            self.exported_types.push(node.ident.to_string());
        }
        visit::visit_item_struct(self, node);
    }

    fn visit_item_enum(&mut self, node: &'ast syn::ItemEnum) {
        if matches!(node.vis, syn::Visibility::Public(_)) {
            self.exported_types.push(node.ident.to_string());
        }
        visit::visit_item_enum(self, node);
    }

    fn visit_expr_if(&mut self, node: &'ast syn::ExprIf) {
        self.branches += 1;
        visit::visit_expr_if(self, node);
    }

    fn visit_expr_for_loop(&mut self, node: &'ast syn::ExprForLoop) {
        self.branches += 1;
        visit::visit_expr_for_loop(self, node);
    }

    fn visit_expr_while(&mut self, node: &'ast syn::ExprWhile) {
        self.branches += 1;
        visit::visit_expr_while(self, node);
    }

    fn visit_expr_loop(&mut self, node: &'ast syn::ExprLoop) {
        self.branches += 1;
        visit::visit_expr_loop(self, node);
    }

    fn visit_expr_match(&mut self, node: &'ast syn::ExprMatch) {
        self.branches += 1;
        visit::visit_expr_match(self, node);
    }

    fn visit_macro(&mut self, node: &'ast syn::Macro) {
        if let Some(ident) = node.path.get_ident() {
            let name = ident.to_string();
            if matches!(name.as_str(), "panic" | "unreachable" | "todo" | "unimplemented") {
                self.panic_uses += 1;
            }
        }
        visit::visit_macro(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast syn::ExprMethodCall) {
        let method = node.method.to_string();
        if method == "unwrap" || method == "expect" {
            self.panic_uses += 1;
        }
        visit::visit_expr_method_call(self, node);
    }
}

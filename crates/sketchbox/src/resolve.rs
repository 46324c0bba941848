//! Import resolution over the project tree.
//!
//! Specifiers are classified as:
//!
//! - **local**: relative (`./`, `../`), absolute (`/`) or starting with the
//!   configured root alias (`@/` by default), resolved against the tree
//! - **external**: anything else (`react`, `lucide-react/icons`), left for the
//!   host module environment to satisfy
//!
//! An extensionless local specifier is probed as the exact path, then with
//! each configured extension in order, then as `<path>/index` with each
//! extension. The first existing file wins.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex_lite::Regex;
use thiserror::Error;

use crate::config::PreviewConfig;
use crate::path;
use crate::tree::{ProjectTree, TreeError};

/// Static `import`/`export ... from` statements, anchored at line start.
static STATIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"(?m)^[ \t]*(?:import|export)\s*(?:[\w*{}\s,$]*?\s*from\s*)?['"]([^'"\n]+)['"]"#)
        .expect("static import regex")
});

/// Dynamic `import('...')` and `require('...')` calls.
static CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r#"\b(?:import|require)\s*\(\s*['"]([^'"\n]+)['"]\s*\)"#).expect("call import regex")
});

/// Errors from import resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A local specifier matched no file
    #[error("cannot resolve {specifier:?} imported from {from}:{line}")]
    Unresolved {
        /// Specifier as written
        specifier: String,
        /// Importing module
        from: String,
        /// 1-based line of the import
        line: usize,
    },
    /// Modules import each other in a loop
    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency {
        /// The loop, starting and ending with the same module
        cycle: Vec<String>,
    },
    /// The module itself could not be read
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// What an import refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportTarget {
    /// A local module, by absolute path
    Module(String),
    /// A local stylesheet, by absolute path; not traversed
    Stylesheet(String),
    /// A package satisfied outside the tree
    External(String),
}

/// One import statement found in a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    /// Specifier as written in the source
    pub specifier: String,
    /// 1-based source line
    pub line: usize,
    /// Resolution result
    pub target: ImportTarget,
}

/// A module and its resolved imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    /// Absolute path
    pub path: String,
    /// Imports in source order
    pub imports: Vec<ImportRef>,
}

/// Blank out `//` and `/* */` comments. Line breaks and string literals are
/// kept, so line numbers in the result match `source`.
pub fn strip_comments(source: &str) -> String {
    #[derive(Clone, Copy)]
    enum State {
        Code,
        Quoted(char),
        Line,
        Block,
    }

    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::Line;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::Block;
                }
                '\'' | '"' | '`' => {
                    out.push(c);
                    state = State::Quoted(c);
                }
                '\\' => {
                    out.push(c);
                    out.extend(chars.next());
                }
                _ => out.push(c),
            },
            State::Quoted(quote) => {
                out.push(c);
                if c == '\\' {
                    out.extend(chars.next());
                } else if c == quote || (c == '\n' && quote != '`') {
                    state = State::Code;
                }
            }
            State::Line => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    out.push(' ');
                }
            }
            State::Block => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
        }
    }
    out
}

/// Find every import specifier in `source`, with its 1-based line, in source
/// order. Commented-out imports are skipped.
pub fn scan_imports(source: &str) -> Vec<(String, usize)> {
    let source = strip_comments(source);
    let source = source.as_str();
    let mut found: Vec<(usize, &str)> = STATIC_RE
        .captures_iter(source)
        .chain(CALL_RE.captures_iter(source))
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.start(), m.as_str()))
        .collect();
    found.sort_unstable_by_key(|(offset, _)| *offset);
    found.dedup_by_key(|(offset, _)| *offset);

    found
        .into_iter()
        .map(|(offset, spec)| {
            let line = source[..offset].matches('\n').count() + 1;
            (spec.to_string(), line)
        })
        .collect()
}

/// Resolves imports against a tree snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    tree: &'a ProjectTree,
    config: &'a PreviewConfig,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over `tree`.
    pub fn new(tree: &'a ProjectTree, config: &'a PreviewConfig) -> Self {
        Self { tree, config }
    }

    /// First configured entry point that exists as a file.
    pub fn entry_point(&self) -> Option<&'a str> {
        self.config
            .entry_points
            .iter()
            .map(String::as_str)
            .find(|p| self.tree.is_file(p))
    }

    /// Base path a specifier refers to, or `None` if it is external.
    pub fn local_base(&self, specifier: &str, from: &str) -> Option<String> {
        let alias = self.config.root_alias.as_str();
        if !alias.is_empty()
            && let Some(rest) = specifier.strip_prefix(alias)
        {
            return Some(path::normalize(rest));
        }
        if specifier.starts_with('/') {
            return Some(path::normalize(specifier));
        }
        let relative = specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../");
        relative.then(|| path::join(path::parent(from).unwrap_or(path::ROOT), specifier))
    }

    /// Resolve one specifier written at `line` of `from`.
    pub fn resolve(
        &self,
        specifier: &str,
        from: &str,
        line: usize,
    ) -> Result<ImportTarget, ResolveError> {
        let Some(base) = self.local_base(specifier, from) else {
            return Ok(ImportTarget::External(specifier.to_string()));
        };
        let resolved = self.probe(&base).ok_or_else(|| ResolveError::Unresolved {
            specifier: specifier.to_string(),
            from: from.to_string(),
            line,
        })?;
        Ok(match path::extension(&resolved) {
            Some(".css") => ImportTarget::Stylesheet(resolved),
            _ => ImportTarget::Module(resolved),
        })
    }

    fn probe(&self, base: &str) -> Option<String> {
        if self.tree.is_file(base) {
            return Some(base.to_string());
        }
        let stem = base.trim_end_matches('/');
        let with_ext = self.config.extensions.iter().map(|ext| format!("{stem}{ext}"));
        let index = self
            .config
            .extensions
            .iter()
            .map(|ext| format!("{}/index{ext}", stem));
        with_ext.chain(index).find(|candidate| self.tree.is_file(candidate))
    }

    /// Scan and resolve the imports of the module at `path`.
    pub fn imports(&self, path: &str) -> Result<Vec<ImportRef>, ResolveError> {
        let source = self.tree.read(path)?;
        scan_imports(source)
            .into_iter()
            .map(|(specifier, line)| {
                let target = self.resolve(&specifier, path, line)?;
                Ok(ImportRef {
                    specifier,
                    line,
                    target,
                })
            })
            .collect()
    }

    /// Every local module reachable from `entry`, dependencies before the
    /// modules that import them. `entry` is last.
    pub fn dependency_closure(&self, entry: &str) -> Result<Vec<ModuleInfo>, ResolveError> {
        let entry = path::normalize(entry);
        let mut out = Vec::new();
        let mut stack = Vec::new();
        let mut done = HashSet::new();
        self.visit(&entry, &mut stack, &mut done, &mut out)?;
        tracing::debug!(entry = %entry, modules = out.len(), "resolved dependency closure");
        Ok(out)
    }

    fn visit(
        &self,
        path: &str,
        stack: &mut Vec<String>,
        done: &mut HashSet<String>,
        out: &mut Vec<ModuleInfo>,
    ) -> Result<(), ResolveError> {
        if done.contains(path) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|p| p == path) {
            let mut cycle = stack[pos..].to_vec();
            cycle.push(path.to_string());
            return Err(ResolveError::CyclicDependency { cycle });
        }

        stack.push(path.to_string());
        let imports = self.imports(path)?;
        for import in &imports {
            if let ImportTarget::Module(dep) = &import.target {
                self.visit(dep, stack, done, out)?;
            }
        }
        stack.pop();

        done.insert(path.to_string());
        out.push(ModuleInfo {
            path: path.to_string(),
            imports,
        });
        Ok(())
    }
}

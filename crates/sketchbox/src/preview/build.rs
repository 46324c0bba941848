//! Linking the entry module and its local dependencies into a [`Bundle`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::PreviewError;
use crate::config::PreviewConfig;
use crate::resolve::{ImportRef, ImportTarget, ModuleInfo, ResolveError, Resolver};
use crate::tree::ProjectTree;

/// One linked module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleModule {
    /// Absolute path
    pub path: String,
    /// Bare specifier the module is imported by inside the bundle
    pub specifier: String,
    /// Source with local specifiers rewritten to bundle specifiers
    pub code: String,
}

/// A stylesheet collected from a `.css` import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stylesheet {
    /// Absolute path
    pub path: String,
    /// Bare specifier the stylesheet is imported by inside the bundle
    pub specifier: String,
    /// Stylesheet text
    pub css: String,
}

/// Everything a sandbox needs to execute one tree version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    /// Tree version the bundle was built from
    pub version: u64,
    /// Path of the entry module
    pub entry: String,
    /// Linked modules, dependencies first; the entry is last
    pub modules: Vec<BundleModule>,
    /// External specifier to module URL
    pub import_map: BTreeMap<String, String>,
    /// Stylesheets in first-import order
    pub styles: Vec<Stylesheet>,
    /// External specifiers, sorted
    pub externals: Vec<String>,
}

impl Bundle {
    /// Look up a module by path.
    pub fn module(&self, path: &str) -> Option<&BundleModule> {
        self.modules.iter().find(|m| m.path == path)
    }

    /// The entry module.
    pub fn entry_module(&self) -> Option<&BundleModule> {
        self.module(&self.entry)
    }
}

impl From<ResolveError> for PreviewError {
    fn from(err: ResolveError) -> Self {
        let (file, line) = match &err {
            ResolveError::Unresolved { from, line, .. } => (Some(from.clone()), Some(*line)),
            ResolveError::CyclicDependency { cycle } => (cycle.first().cloned(), None),
            ResolveError::Tree(_) => (None, None),
        };
        PreviewError::BuildFailure {
            message: err.to_string(),
            file,
            line,
        }
    }
}

/// Build the bundle for the tree's current state.
///
/// Returns `Ok(None)` when none of the configured entry points exists.
pub fn build(tree: &ProjectTree, config: &PreviewConfig) -> Result<Option<Bundle>, PreviewError> {
    let resolver = Resolver::new(tree, config);
    let Some(entry) = resolver.entry_point() else {
        return Ok(None);
    };
    let closure = resolver.dependency_closure(entry)?;

    let mut modules = Vec::with_capacity(closure.len());
    let mut styles: Vec<Stylesheet> = Vec::new();
    let mut externals = BTreeSet::new();

    for ModuleInfo { path, imports } in &closure {
        let source = tree.read(path).map_err(ResolveError::from)?;
        for import in imports {
            match &import.target {
                ImportTarget::External(spec) => {
                    externals.insert(spec.clone());
                }
                ImportTarget::Stylesheet(css_path) => {
                    if !styles.iter().any(|s| &s.path == css_path) {
                        let css = tree.read(css_path).map_err(ResolveError::from)?;
                        styles.push(Stylesheet {
                            path: css_path.clone(),
                            specifier: module_specifier(css_path),
                            css: css.to_string(),
                        });
                    }
                }
                ImportTarget::Module(_) => {}
            }
        }
        modules.push(BundleModule {
            path: path.clone(),
            specifier: module_specifier(path),
            code: link(source, imports),
        });
    }

    let base = config.cdn_url.trim_end_matches('/');
    let import_map = externals
        .iter()
        .map(|spec| (spec.clone(), format!("{base}/{spec}")))
        .collect();

    tracing::debug!(
        entry,
        modules = modules.len(),
        externals = externals.len(),
        "built preview bundle"
    );
    Ok(Some(Bundle {
        version: tree.version(),
        entry: entry.to_string(),
        modules,
        import_map,
        styles,
        externals: externals.into_iter().collect(),
    }))
}

/// Bundle specifier for a module path: `/components/Card.jsx` becomes
/// `@/components/Card.jsx`.
///
/// Bundle specifiers are bare, so an import map matches them exactly no
/// matter which URL the importing module was loaded from.
pub fn module_specifier(path: &str) -> String {
    format!("@/{}", path.trim_start_matches('/'))
}

/// Rewrite each local specifier in `source` to the bundle specifier of the
/// path it resolved to. Line structure is preserved.
fn link(source: &str, imports: &[ImportRef]) -> String {
    let mut lines: Vec<String> = source.split_inclusive('\n').map(String::from).collect();
    for import in imports {
        let target = match &import.target {
            ImportTarget::Module(path) | ImportTarget::Stylesheet(path) => path,
            ImportTarget::External(_) => continue,
        };
        let Some(line) = lines.get_mut(import.line.saturating_sub(1)) else {
            continue;
        };
        for quote in ['\'', '"', '`'] {
            let quoted = format!("{quote}{}{quote}", import.specifier);
            if line.contains(&quoted) {
                let linked = format!("\"{}\"", module_specifier(target));
                *line = line.replacen(&quoted, &linked, 1);
                break;
            }
        }
    }
    lines.concat()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(files: &[(&str, &str)]) -> ProjectTree {
        let mut tree = ProjectTree::new();
        for (path, content) in files {
            tree.put(path, *content).expect("put");
        }
        tree
    }

    #[test]
    fn test_no_entry_point() {
        let tree = tree(&[("/components/Button.jsx", "export default () => null;")]);
        let bundle = build(&tree, &PreviewConfig::default()).expect("build");
        assert!(bundle.is_none());
    }

    #[test]
    fn test_bundle_contents() {
        let tree = tree(&[
            (
                "/App.jsx",
                "import React from 'react';\nimport Button from '@/components/Button';\nimport './index.css';\n\nexport default function App() {\n  return <Button />;\n}\n",
            ),
            (
                "/components/Button.jsx",
                "import { motion } from \"framer-motion\";\nexport default function Button() { return <motion.button />; }\n",
            ),
            ("/index.css", "body { margin: 0; }"),
        ]);
        let bundle = build(&tree, &PreviewConfig::default())
            .expect("build")
            .expect("entry exists");

        assert_eq!(bundle.entry, "/App.jsx");
        assert_eq!(bundle.version, 3);
        let paths: Vec<_> = bundle.modules.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["/components/Button.jsx", "/App.jsx"]);

        let app = bundle.entry_module().expect("entry module");
        assert_eq!(app.specifier, "@/App.jsx");
        assert!(app.code.contains("import Button from \"@/components/Button.jsx\";"));
        assert!(app.code.contains("import \"@/index.css\";"));
        assert!(app.code.contains("import React from 'react';"));
        assert_eq!(app.code.lines().count(), 7);

        assert_eq!(bundle.externals, vec!["framer-motion", "react"]);
        assert_eq!(
            bundle.import_map.get("react").map(String::as_str),
            Some("https://esm.sh/react")
        );
        assert_eq!(
            bundle.styles,
            vec![Stylesheet {
                path: "/index.css".to_string(),
                specifier: "@/index.css".to_string(),
                css: "body { margin: 0; }".to_string(),
            }]
        );
    }

    #[test]
    fn test_unresolved_import_is_build_failure() {
        let tree = tree(&[(
            "/App.jsx",
            "import Card from '@/components/Card';\nexport default Card;\n",
        )]);
        let err = build(&tree, &PreviewConfig::default()).expect_err("unresolved");
        match err {
            PreviewError::BuildFailure { file, line, message } => {
                assert_eq!(file.as_deref(), Some("/App.jsx"));
                assert_eq!(line, Some(1));
                assert!(message.contains("@/components/Card"));
            }
            other => panic!("expected build failure, got {other:?}"),
        }
    }

    #[test]
    fn test_link_rewrites_each_specifier_once() {
        let source = "import a from './a';\nconst b = import(\"./a\");\n";
        let imports = vec![
            ImportRef {
                specifier: "./a".to_string(),
                line: 1,
                target: ImportTarget::Module("/lib/a.js".to_string()),
            },
            ImportRef {
                specifier: "./a".to_string(),
                line: 2,
                target: ImportTarget::Module("/lib/a.js".to_string()),
            },
        ];
        assert_eq!(
            link(source, &imports),
            "import a from \"@/lib/a.js\";\nconst b = import(\"@/lib/a.js\");\n"
        );
    }
}

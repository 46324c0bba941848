//! Sandbox execution boundary.
//!
//! A [`Sandbox`] turns a [`Bundle`] into a [`RenderOutput`]. The renderer
//! never calls a sandbox directly: [`execute_isolated`] runs each execution in
//! its own task so a panic inside the sandbox is contained and reported as a
//! [`PreviewError::RuntimeFailure`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use futures::FutureExt;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::PreviewError;
use super::build::Bundle;
use crate::resolve::strip_comments;

static DEFAULT_EXPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\bexport\s+default\b").expect("default export regex")
});

/// `export { ... }` lists, with or without a `from` clause.
static EXPORT_LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\bexport\s*\{([^}]*)\}").expect("export list regex")
});

/// Whether `code` exports a default binding: `export default ...`,
/// `export { App as default }` or a re-export like `export { default } from`.
fn has_default_export(code: &str) -> bool {
    let code = strip_comments(code);
    if DEFAULT_EXPORT_RE.is_match(&code) {
        return true;
    }
    EXPORT_LIST_RE
        .captures_iter(&code)
        .filter_map(|caps| caps.get(1))
        .flat_map(|list| list.as_str().split(','))
        .any(|item| {
            let words: Vec<&str> = item.split_whitespace().collect();
            matches!(words.as_slice(), ["default"] | [.., "as", "default"])
        })
}

/// Result of a successful execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutput {
    /// Tree version that was rendered
    pub version: u64,
    /// Entry module path
    pub entry: String,
    /// Rendered preview document
    pub document: String,
}

/// An isolated environment that executes a bundle.
///
/// Returning `Err` reports a runtime failure with the given message.
///
/// # Example
///
/// ```rust,ignore
/// use sketchbox::preview::{Bundle, RenderOutput, Sandbox};
///
/// struct EchoSandbox;
///
/// #[async_trait::async_trait]
/// impl Sandbox for EchoSandbox {
///     async fn execute(&self, bundle: Bundle) -> Result<RenderOutput, String> {
///         Ok(RenderOutput {
///             version: bundle.version,
///             entry: bundle.entry.clone(),
///             document: bundle.entry,
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Execute one bundle.
    async fn execute(&self, bundle: Bundle) -> Result<RenderOutput, String>;
}

/// Closures can act as sandboxes.
#[async_trait]
impl<F, Fut> Sandbox for F
where
    F: Fn(Bundle) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<RenderOutput, String>> + Send,
{
    async fn execute(&self, bundle: Bundle) -> Result<RenderOutput, String> {
        self(bundle).await
    }
}

/// Aborts the wrapped task when dropped, so a cancelled build tears down its
/// sandbox execution.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run `bundle` in `sandbox` on a fresh task, containing panics.
pub async fn execute_isolated(
    sandbox: Arc<dyn Sandbox>,
    bundle: Bundle,
) -> Result<RenderOutput, PreviewError> {
    let mut task = AbortOnDrop(tokio::spawn(async move {
        AssertUnwindSafe(sandbox.execute(bundle))
            .catch_unwind()
            .await
    }));

    let message = match (&mut task.0).await {
        Ok(Ok(Ok(output))) => return Ok(output),
        Ok(Ok(Err(message))) => message,
        Ok(Err(panic)) => format!("sandbox panicked: {}", panic_message(panic.as_ref())),
        Err(e) if e.is_panic() => "sandbox panicked".to_string(),
        Err(e) => format!("sandbox task failed: {e}"),
    };
    Err(PreviewError::RuntimeFailure { message })
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

// Errors from generated code are shown in place of the app and posted to the
// parent frame with the bundle version, for `PreviewRenderer::report_runtime_error`.
const BOOTSTRAP: &str = r##"
(() => {
  const data = JSON.parse(document.getElementById("__bundle").textContent);
  let reported = false;
  const showError = (message) => {
    if (reported) return;
    reported = true;
    parent.postMessage({ type: "preview-error", version: data.version, message }, "*");
    const render = () => {
      const pre = document.createElement("pre");
      pre.id = "__preview_error";
      pre.style.cssText =
        "margin:0;padding:16px;color:#b91c1c;background:#fef2f2;white-space:pre-wrap;font:13px/1.5 ui-monospace,monospace";
      pre.textContent = message;
      const root = document.getElementById("root");
      if (root) root.replaceChildren(pre);
      else document.body.appendChild(pre);
    };
    if (document.readyState === "loading") {
      document.addEventListener("DOMContentLoaded", render, { once: true });
    } else {
      render();
    }
  };
  window.addEventListener("error", (event) => showError(String(event.error ?? event.message)));
  window.addEventListener("unhandledrejection", (event) => showError(String(event.reason)));

  const imports = Object.assign({}, data.imports);
  const url = (code) => URL.createObjectURL(new Blob([code], { type: "text/javascript" }));
  for (const specifier of data.stylesheets) {
    imports[specifier] = url("");
  }
  for (const [specifier, code] of Object.entries(data.modules)) {
    let out;
    try {
      out = Babel.transform(code, {
        filename: specifier,
        presets: [["react", { runtime: "automatic" }], "typescript"],
      }).code;
    } catch (error) {
      const message = `${specifier}: ${error.message}`;
      showError(message);
      out = `throw new SyntaxError(${JSON.stringify(message)});`;
    }
    imports[specifier] = url(out);
  }
  const map = document.createElement("script");
  map.type = "importmap";
  map.textContent = JSON.stringify({ imports });
  document.head.appendChild(map);
})();
"##;

/// Renders a bundle into a self-contained HTML preview document.
///
/// Module sources are embedded verbatim; the document lowers them with an
/// in-browser transpiler, links them through blob URLs and a generated import
/// map keyed by bundle specifier, then mounts the entry's default export into
/// `#root`. Transpile and runtime errors replace `#root` with the message and
/// are posted to the parent frame as `{ type: "preview-error", version, message }`.
#[derive(Debug, Clone)]
pub struct DocumentSandbox {
    cdn_url: String,
    transpiler_url: String,
    stylesheet_url: Option<String>,
}

impl Default for DocumentSandbox {
    fn default() -> Self {
        Self {
            cdn_url: "https://esm.sh".to_string(),
            transpiler_url: "https://unpkg.com/@babel/standalone/babel.min.js".to_string(),
            stylesheet_url: Some("https://cdn.tailwindcss.com".to_string()),
        }
    }
}

impl DocumentSandbox {
    /// Create a sandbox with the default CDN endpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Base URL for the runtime packages the mount script needs.
    pub fn cdn_url(mut self, url: impl Into<String>) -> Self {
        self.cdn_url = url.into();
        self
    }

    /// Script URL of the in-browser transpiler.
    pub fn transpiler_url(mut self, url: impl Into<String>) -> Self {
        self.transpiler_url = url.into();
        self
    }

    /// Utility stylesheet script loaded before the modules, if any.
    pub fn stylesheet_url(mut self, url: Option<String>) -> Self {
        self.stylesheet_url = url;
        self
    }

    /// Render the document for `bundle`.
    pub fn render(&self, bundle: &Bundle) -> Result<String, String> {
        let entry = bundle
            .entry_module()
            .ok_or_else(|| format!("{} is missing from the bundle", bundle.entry))?;
        if !has_default_export(&entry.code) {
            return Err(format!("{} has no default export", bundle.entry));
        }

        let base = self.cdn_url.trim_end_matches('/');
        let mut imports = bundle.import_map.clone();
        for runtime in ["react", "react-dom/client", "react/jsx-runtime"] {
            imports
                .entry(runtime.to_string())
                .or_insert_with(|| format!("{base}/{runtime}"));
        }
        let modules: serde_json::Map<String, serde_json::Value> = bundle
            .modules
            .iter()
            .map(|m| (m.specifier.clone(), m.code.clone().into()))
            .collect();
        let data = serde_json::json!({
            "version": bundle.version,
            "imports": imports,
            "modules": modules,
            "stylesheets": bundle.styles.iter().map(|s| &s.specifier).collect::<Vec<_>>(),
        });
        let entry_specifier = serde_json::Value::from(entry.specifier.as_str());

        let mut doc = String::new();
        doc.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        if let Some(url) = &self.stylesheet_url {
            doc.push_str(&format!("<script src=\"{url}\"></script>\n"));
        }
        for style in &bundle.styles {
            doc.push_str(&format!(
                "<style data-path=\"{}\">\n{}\n</style>\n",
                style.path,
                style.css.replace("</", "<\\/")
            ));
        }
        doc.push_str(&format!("<script src=\"{}\"></script>\n", self.transpiler_url));
        doc.push_str("<script type=\"application/json\" id=\"__bundle\">");
        doc.push_str(&embed(&data.to_string()));
        doc.push_str("</script>\n<script>");
        doc.push_str(BOOTSTRAP);
        doc.push_str("</script>\n</head>\n<body>\n<div id=\"root\"></div>\n");
        doc.push_str(&format!(
            "<script type=\"module\">\nimport {{ createElement }} from \"react\";\n\
             import {{ createRoot }} from \"react-dom/client\";\n\
             import App from {entry_specifier};\n\
             createRoot(document.getElementById(\"root\")).render(createElement(App));\n\
             </script>\n"
        ));
        doc.push_str("</body>\n</html>\n");
        Ok(doc)
    }
}

/// Make JSON safe to embed inside a `<script>` element.
fn embed(json: &str) -> String {
    json.replace("</", "<\\/")
}

#[async_trait]
impl Sandbox for DocumentSandbox {
    async fn execute(&self, bundle: Bundle) -> Result<RenderOutput, String> {
        let document = self.render(&bundle)?;
        Ok(RenderOutput {
            version: bundle.version,
            entry: bundle.entry,
            document,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use serde_json::Value;

    use super::*;
    use crate::config::PreviewConfig;
    use crate::preview::build::{BundleModule, Stylesheet, build};
    use crate::tree::ProjectTree;

    fn bundle(entry_code: &str) -> Bundle {
        Bundle {
            version: 4,
            entry: "/App.jsx".to_string(),
            modules: vec![BundleModule {
                path: "/App.jsx".to_string(),
                specifier: "@/App.jsx".to_string(),
                code: entry_code.to_string(),
            }],
            import_map: BTreeMap::from([(
                "lucide-react".to_string(),
                "https://esm.sh/lucide-react".to_string(),
            )]),
            styles: vec![Stylesheet {
                path: "/index.css".to_string(),
                specifier: "@/index.css".to_string(),
                css: "body { color: red; }".to_string(),
            }],
            externals: vec!["lucide-react".to_string()],
        }
    }

    /// The JSON the bootstrap script reads.
    fn embedded_data(doc: &str) -> Value {
        let marker = "id=\"__bundle\">";
        let start = doc.find(marker).expect("bundle data") + marker.len();
        let end = start + doc[start..].find("</script>").expect("end of bundle data");
        serde_json::from_str(&doc[start..end]).expect("bundle json")
    }

    #[tokio::test]
    async fn test_document_sandbox_renders() {
        let sandbox = DocumentSandbox::new();
        let output = sandbox
            .execute(bundle(
                "export default function App() { return <p>\"</script>\"</p>; }",
            ))
            .await
            .expect("render");

        assert_eq!(output.version, 4);
        assert_eq!(output.entry, "/App.jsx");
        let doc = &output.document;
        assert!(doc.contains("<div id=\"root\"></div>"));
        assert!(doc.contains("import App from \"@/App.jsx\";"));
        assert!(doc.contains("https://esm.sh/lucide-react"));
        assert!(doc.contains("https://esm.sh/react-dom/client"));
        assert!(doc.contains("body { color: red; }"));
        assert_eq!(doc.matches("</script>").count(), 5);

        let data = embedded_data(doc);
        assert_eq!(data["version"], 4);
        assert_eq!(
            data["modules"]["@/App.jsx"],
            "export default function App() { return <p>\"</script>\"</p>; }"
        );
        assert_eq!(data["stylesheets"], serde_json::json!(["@/index.css"]));
    }

    #[tokio::test]
    async fn test_linked_specifiers_match_import_map_keys() {
        let mut tree = ProjectTree::new();
        let files = [
            (
                "/App.jsx",
                "import Card from '@/components/Card';\nimport './index.css';\nexport default function App() { return <Card />; }\n",
            ),
            (
                "/components/Card.jsx",
                "import { Badge } from './ui/Badge';\nexport default function Card() { return <Badge />; }\n",
            ),
            ("/components/ui/Badge.tsx", "export const Badge = () => null;\n"),
            ("/index.css", "body {}"),
        ];
        for (path, content) in files {
            tree.put(path, content).expect("put");
        }
        let bundle = build(&tree, &PreviewConfig::default())
            .expect("build")
            .expect("entry");
        let doc = DocumentSandbox::new().render(&bundle).expect("render");

        let data = embedded_data(&doc);
        let keys: BTreeSet<&str> = data["modules"]
            .as_object()
            .expect("modules")
            .keys()
            .map(String::as_str)
            .chain(
                data["stylesheets"]
                    .as_array()
                    .expect("stylesheets")
                    .iter()
                    .filter_map(Value::as_str),
            )
            .collect();

        let quoted = Regex::new(r#""([^"\n]+)""#).expect("regex");
        let mut linked = 0;
        for module in &bundle.modules {
            assert!(keys.contains(module.specifier.as_str()));
            assert!(!module.code.contains("\"/"), "path specifier left in {}", module.path);
            for spec in quoted
                .captures_iter(&module.code)
                .filter_map(|caps| caps.get(1))
                .map(|m| m.as_str())
                .filter(|spec| spec.starts_with("@/"))
            {
                assert!(keys.contains(spec), "{spec} has no import map entry");
                linked += 1;
            }
        }
        assert_eq!(linked, 3);
        assert!(doc.contains("import App from \"@/App.jsx\";"));
    }

    #[test]
    fn test_default_export_forms() {
        for code in [
            "export default function App() {}",
            "const App = () => null; export default App;",
            "export { default } from './Main';",
            "function App() {}\nexport { App as default };",
            "export {\n  Main as default,\n  helper,\n};",
        ] {
            assert!(has_default_export(code), "{code}");
        }
        for code in [
            "export function App() {}",
            "export { default as Main } from './Main';",
            "// export default App;\nexport const x = 1;",
            "/* export { default } */",
        ] {
            assert!(!has_default_export(code), "{code}");
        }
    }

    #[tokio::test]
    async fn test_document_sandbox_requires_default_export() {
        let sandbox = DocumentSandbox::new();
        let err = sandbox
            .execute(bundle("export function App() { return null; }"))
            .await
            .expect_err("no default export");
        assert_eq!(err, "/App.jsx has no default export");

        for code in [
            "function App() {}\nexport { App as default };",
            "export { default } from './Main';",
            "const App = () => null; export default App;",
        ] {
            assert!(sandbox.execute(bundle(code)).await.is_ok(), "{code}");
        }
    }

    #[test]
    fn test_document_reports_errors_in_frame() {
        let doc = DocumentSandbox::new()
            .render(&bundle("export default 1;"))
            .expect("render");
        assert!(doc.contains("type: \"preview-error\", version: data.version"));
        assert!(doc.contains("pre.id = \"__preview_error\""));
        assert!(doc.contains("root.replaceChildren(pre)"));
    }

    #[tokio::test]
    async fn test_execute_isolated_contains_panics() {
        let sandbox: Arc<dyn Sandbox> = Arc::new(|_bundle: Bundle| async move {
            if true {
                panic!("render exploded");
            }
            Err::<RenderOutput, String>(String::new())
        });

        let err = execute_isolated(sandbox, bundle("export default 1;"))
            .await
            .expect_err("panic should be contained");
        assert_eq!(
            err,
            PreviewError::RuntimeFailure {
                message: "sandbox panicked: render exploded".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_execute_isolated_reports_errors() {
        let sandbox: Arc<dyn Sandbox> = Arc::new(|bundle: Bundle| async move {
            Err::<RenderOutput, String>(format!("ReferenceError in {}", bundle.entry))
        });

        let err = execute_isolated(sandbox, bundle("export default 1;"))
            .await
            .expect_err("runtime error");
        assert_eq!(err.to_string(), "runtime error: ReferenceError in /App.jsx");
    }
}

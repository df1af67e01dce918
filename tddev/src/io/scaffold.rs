//! Starter files written into a fresh project once a template is chosen.

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use crate::core::templates::Template;
use crate::io::project::ProjectStore;

/// Materializes a catalog template into the project root.
pub trait Scaffolder {
    /// Write the starter files; returns the paths written.
    fn materialize(&self, store: &ProjectStore, template: &Template) -> Result<Vec<String>>;
}

/// Writes the same minimal Vite + React + TypeScript project for every template.
///
/// The chosen key is only recorded in the logs; fetching the real upstream
/// starter is left to another [`Scaffolder`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicScaffolder;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>TDDev App</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.tsx"></script>
  </body>
</html>
"#;

const MAIN_TSX: &str = r#"import React from 'react'
import ReactDOM from 'react-dom/client'
import App from './App'
import './index.css'

ReactDOM.createRoot(document.getElementById('root')!).render(
  <React.StrictMode>
    <App />
  </React.StrictMode>,
)
"#;

const APP_TSX: &str = r#"function App() {
  return (
    <div className="app">
      <h1>Welcome to TDDev</h1>
      <p>Your application will be generated here.</p>
    </div>
  )
}

export default App
"#;

const INDEX_CSS: &str = r#"* {
  margin: 0;
  padding: 0;
  box-sizing: border-box;
}

body {
  font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', 'Roboto', sans-serif;
  line-height: 1.6;
  color: #333;
}

.app {
  max-width: 1200px;
  margin: 0 auto;
  padding: 2rem;
}
"#;

const VITE_CONFIG_TS: &str = r#"import { defineConfig } from 'vite'
import react from '@vitejs/plugin-react'

export default defineConfig({
  plugins: [react()],
})
"#;

const TSCONFIG_JSON: &str = r#"{
  "compilerOptions": {
    "target": "ES2020",
    "useDefineForClassFields": true,
    "lib": ["ES2020", "DOM", "DOM.Iterable"],
    "module": "ESNext",
    "skipLibCheck": true,
    "moduleResolution": "bundler",
    "allowImportingTsExtensions": true,
    "resolveJsonModule": true,
    "isolatedModules": true,
    "noEmit": true,
    "jsx": "react-jsx",
    "strict": true,
    "noUnusedLocals": true,
    "noUnusedParameters": true,
    "noFallthroughCasesInSwitch": true
  },
  "include": ["src"]
}
"#;

fn package_json() -> Result<String> {
    let manifest = json!({
        "name": "tddev-app",
        "version": "1.0.0",
        "type": "module",
        "scripts": {
            "dev": "vite",
            "build": "vite build",
            "preview": "vite preview"
        },
        "dependencies": {
            "react": "^18.2.0",
            "react-dom": "^18.2.0"
        },
        "devDependencies": {
            "@types/react": "^18.2.0",
            "@types/react-dom": "^18.2.0",
            "@vitejs/plugin-react": "^4.0.0",
            "typescript": "^5.0.0",
            "vite": "^5.0.0"
        }
    });
    let mut buf = serde_json::to_string_pretty(&manifest).context("serialize package.json")?;
    buf.push('\n');
    Ok(buf)
}

impl Scaffolder for BasicScaffolder {
    fn materialize(&self, store: &ProjectStore, template: &Template) -> Result<Vec<String>> {
        info!(template = template.key, reference = template.reference_url, "writing starter files");
        let package = package_json()?;
        let files: [(&str, &str); 7] = [
            ("package.json", &package),
            ("index.html", INDEX_HTML),
            ("src/main.tsx", MAIN_TSX),
            ("src/App.tsx", APP_TSX),
            ("src/index.css", INDEX_CSS),
            ("vite.config.ts", VITE_CONFIG_TS),
            ("tsconfig.json", TSCONFIG_JSON),
        ];
        let mut written = Vec::with_capacity(files.len());
        for (path, content) in files {
            store
                .write(path, content)
                .with_context(|| format!("write starter file {path}"))?;
            written.push(path.to_string());
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::templates::{default_template, find_template};

    #[test]
    fn writes_the_vite_react_starter() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ProjectStore::open(temp.path()).expect("open");
        let written = BasicScaffolder
            .materialize(&store, default_template())
            .expect("materialize");
        assert_eq!(written.len(), 7);

        let files = store.list_files(None).expect("list");
        for path in &written {
            assert!(files.contains(path), "missing {path}");
        }

        let manifest: serde_json::Value =
            serde_json::from_str(&store.read("package.json").expect("read")).expect("json");
        assert_eq!(manifest["name"], "tddev-app");
        assert_eq!(manifest["scripts"]["dev"], "vite");
        assert!(store.read("src/main.tsx").expect("read").contains("createRoot"));
    }

    #[test]
    fn every_template_gets_the_same_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = ProjectStore::open(temp.path()).expect("open");
        let vue = find_template("vuejs").expect("vuejs");
        let written = BasicScaffolder.materialize(&store, vue).expect("materialize");
        assert!(written.contains(&"vite.config.ts".to_string()));
    }
}

//! Module path resolution for relative import specifiers
//!
//! Maps `./x` and `../x` specifiers to file IDs of a known file set.
//! Bare (package) specifiers are never resolved.

use ahash::AHashMap;
use camino::Utf8Path;

use crate::config::EngineConfig;

/// A file supplied by the caller: opaque ID plus its snapshot path
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct IndexedFile {
    pub id: String,
    pub path: String,
}

impl IndexedFile {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }
}

/// Normalized path → file ID lookup over a snapshot
#[derive(Debug, Clone, Default)]
pub struct KnownFiles {
    by_path: AHashMap<String, String>,
}

impl KnownFiles {
    pub fn new<'a>(files: impl IntoIterator<Item = &'a IndexedFile>) -> Self {
        let mut by_path = AHashMap::new();
        for file in files {
            if let Some(path) = normalize_path(Utf8Path::new(&file.path)) {
                // First registration wins on duplicate paths
                by_path.entry(path).or_insert_with(|| file.id.clone());
            }
        }
        Self { by_path }
    }

    /// File ID for an exact (normalized) path
    pub fn get(&self, path: &str) -> Option<&str> {
        let normalized = normalize_path(Utf8Path::new(path))?;
        self.by_path.get(&normalized).map(String::as_str)
    }

    fn lookup(&self, normalized: &str) -> Option<&str> {
        self.by_path.get(normalized).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

/// Whether `specifier` is relative (`.`, `..`, `./x`, `../x`)
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Resolve a relative import specifier to a known file ID
///
/// # Resolution order (first match wins)
/// 1. Exact path
/// 2. Path + each allowlisted extension, in priority order
/// 3. Explicit `.js`/`.jsx`/`.mjs`/`.cjs` swapped for its TypeScript counterpart
/// 4. `<path>/index.<ext>`, in priority order
///
/// Specifiers ending in `/` skip straight to step 4.
///
/// # Returns
/// - Some(file_id) on a hit
/// - None for bare specifiers, paths escaping the snapshot root, or misses
///
/// # Examples
/// - resolve_import("./utils", "src/index", ..) -> src/utils.ts
/// - resolve_import("./utils", "src/index", ..) -> src/utils/index.ts (no src/utils.*)
pub fn resolve_import<'k>(
    specifier: &str,
    from_path: &str,
    known: &'k KnownFiles,
    config: &EngineConfig,
) -> Option<&'k str> {
    if !is_relative_specifier(specifier) {
        return None;
    }

    let from = Utf8Path::new(from_path);
    let base = from.parent().unwrap_or_else(|| Utf8Path::new(""));
    let target = normalize_path(&base.join(specifier))?;
    // `./utils/`, `.` and `..` can only name a directory
    let names_directory = specifier.ends_with('/') || specifier == "." || specifier == "..";

    // 1. Exact
    if !target.is_empty() && !names_directory {
        if let Some(id) = known.lookup(&target) {
            return Some(id);
        }

        // 2. Extension probing
        for ext in &config.extensions {
            if let Some(id) = known.lookup(&format!("{}.{}", target, ext)) {
                return Some(id);
            }
        }

        // 3. ESM TypeScript convention: `./a.js` names `a.ts` on disk
        let target_path = Utf8Path::new(&target);
        if let (Some(stem), Some(ext)) = (target_path.file_stem(), target_path.extension()) {
            let dir = target_path.parent().unwrap_or_else(|| Utf8Path::new(""));
            for counterpart in typescript_counterparts(ext) {
                if !config.allows_extension(counterpart) {
                    continue;
                }
                let candidate = join_normalized(dir, &format!("{}.{}", stem, counterpart));
                if let Some(id) = known.lookup(&candidate) {
                    return Some(id);
                }
            }
        }
    }

    // 4. Directory index
    let dir = Utf8Path::new(&target);
    for ext in &config.extensions {
        let candidate = join_normalized(dir, &format!("index.{}", ext));
        if let Some(id) = known.lookup(&candidate) {
            return Some(id);
        }
    }

    None
}

fn typescript_counterparts(ext: &str) -> &'static [&'static str] {
    match ext {
        "js" => &["ts", "tsx"],
        "jsx" => &["tsx"],
        "mjs" => &["mts"],
        "cjs" => &["cts"],
        _ => &[],
    }
}

fn join_normalized(dir: &Utf8Path, file: &str) -> String {
    if dir.as_str().is_empty() {
        file.to_string()
    } else {
        format!("{}/{}", dir, file)
    }
}

/// Lexically normalize a snapshot path: `/` separators, no `.`, `..` folded.
///
/// Returns None when `..` climbs above the snapshot root.
fn normalize_path(path: &Utf8Path) -> Option<String> {
    let unified = path.as_str().replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(paths: &[&str]) -> KnownFiles {
        let files: Vec<IndexedFile> = paths
            .iter()
            .map(|p| IndexedFile::new(format!("id:{}", p), *p))
            .collect();
        KnownFiles::new(&files)
    }

    fn resolve<'k>(spec: &str, from: &str, files: &'k KnownFiles) -> Option<&'k str> {
        resolve_import(spec, from, files, &EngineConfig::default())
    }

    #[test]
    fn test_resolves_sibling_file_with_extension_probing() {
        let files = known(&["src/index.ts", "src/utils.ts", "src/utils/index.ts"]);
        assert_eq!(resolve("./utils", "src/index", &files), Some("id:src/utils.ts"));
    }

    #[test]
    fn test_falls_back_to_directory_index() {
        let files = known(&["src/index.ts", "src/utils/index.js"]);
        assert_eq!(resolve("./utils", "src/index", &files), Some("id:src/utils/index.js"));
    }

    #[test]
    fn test_trailing_slash_only_probes_directory_index() {
        let files = known(&["src/index.ts", "src/utils.ts", "src/utils/index.ts"]);
        assert_eq!(resolve("./utils/", "src/index.ts", &files), Some("id:src/utils/index.ts"));
        assert_eq!(resolve("./utils", "src/index.ts", &files), Some("id:src/utils.ts"));

        let no_index = known(&["src/index.ts", "src/utils.ts"]);
        assert_eq!(resolve("./utils/", "src/index.ts", &no_index), None);
    }

    #[test]
    fn test_miss_returns_none() {
        let files = known(&["src/index.ts"]);
        assert_eq!(resolve("./utils", "src/index", &files), None);
    }

    #[test]
    fn test_bare_specifiers_not_resolved() {
        let files = known(&["react.ts", "node_modules/react/index.js"]);
        assert_eq!(resolve("react", "index.ts", &files), None);
        assert_eq!(resolve("@scope/pkg", "index.ts", &files), None);
    }

    #[test]
    fn test_exact_match_wins() {
        let files = known(&["src/data.json.ts", "src/data.json"]);
        assert_eq!(resolve("./data.json", "src/a.ts", &files), Some("id:src/data.json"));
    }

    #[test]
    fn test_extension_priority_typed_before_plain() {
        let files = known(&["src/a.js", "src/a.ts", "src/a.mjs"]);
        assert_eq!(resolve("./a", "src/b.ts", &files), Some("id:src/a.ts"));
    }

    #[test]
    fn test_parent_directory_specifier() {
        let files = known(&["lib/core.ts", "lib/sub/user.ts"]);
        assert_eq!(resolve("../core", "lib/sub/user.ts", &files), Some("id:lib/core.ts"));
    }

    #[test]
    fn test_escaping_root_is_none() {
        let files = known(&["a.ts"]);
        assert_eq!(resolve("../../a", "src/b.ts", &files), None);
    }

    #[test]
    fn test_js_specifier_maps_to_typescript_source() {
        let files = known(&["src/a.ts", "src/b.ts"]);
        assert_eq!(resolve("./a.js", "src/b.ts", &files), Some("id:src/a.ts"));
    }

    #[test]
    fn test_dot_specifier_resolves_index() {
        let files = known(&["src/index.ts", "src/b.ts"]);
        assert_eq!(resolve(".", "src/b.ts", &files), Some("id:src/index.ts"));
    }

    #[test]
    fn test_known_files_normalize_paths() {
        let files = known(&["./src/./a.ts"]);
        assert_eq!(files.get("src/a.ts"), Some("id:./src/./a.ts"));
        assert_eq!(resolve("./a", "src/b.ts", &files), Some("id:./src/./a.ts"));
    }

    #[test]
    fn test_allowlist_limits_probing() {
        let files = known(&["src/a.js"]);
        let config = EngineConfig {
            extensions: vec!["ts".to_string()],
            ..EngineConfig::default()
        };
        assert_eq!(resolve_import("./a", "src/b.ts", &files, &config), None);
    }
}

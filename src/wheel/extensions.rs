// src/wheel/extensions.rs

//! Compiled extension module detection
//!
//! A CPython extension exports `PyInit_<module>`, where `<module>` is the
//! last component of its import path. Moving `core.cpython-312.so` into a
//! renamed package directory is fine only if nothing resolves the symbol by
//! the package name, which holds for private `_name` modules imported by the
//! package itself. Public top-level extensions keep the old name baked into
//! their binary and will not import under the new one.

use crate::wheel::archive::Archive;
use serde::Serialize;

/// Classification of one compiled module entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionClassification {
    pub path: String,
    pub module_name: String,
    pub renamable: bool,
}

/// Whether a file name carries a compiled-module suffix
///
/// Matches `.so`, `.pyd` and versioned variants such as `.so.1.2`.
pub fn is_extension_file(file_name: &str) -> bool {
    let mut parts = file_name.split('.').skip(1).collect::<Vec<_>>();
    // Strip a trailing numeric version (`.so.1`, `.so.1.2`)
    while parts.last().is_some_and(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit())) {
        parts.pop();
    }
    matches!(parts.last(), Some(&"so") | Some(&"pyd"))
}

/// Module name of an extension file: everything before the first `.`
pub fn module_name(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Classify a single archive path; `None` if it is not an extension
pub fn classify(path: &str) -> Option<ExtensionClassification> {
    if path.ends_with('/') {
        return None;
    }
    let file_name = path.rsplit('/').next().unwrap_or(path);
    if !is_extension_file(file_name) {
        return None;
    }

    let module = module_name(file_name);
    Some(ExtensionClassification {
        path: path.to_string(),
        module_name: module.to_string(),
        renamable: module.starts_with('_'),
    })
}

/// Classify every extension entry in archive order
pub fn classify_archive(archive: &Archive) -> Vec<ExtensionClassification> {
    archive.iter().filter_map(|entry| classify(&entry.path)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wheel::archive::Entry;

    #[test]
    fn test_underscore_module_is_renamable() {
        let ext = classify("pkg/_core.cpython-312.so").unwrap();
        assert_eq!(ext.module_name, "_core");
        assert!(ext.renamable);
    }

    #[test]
    fn test_public_module_is_not_renamable() {
        let ext = classify("pkg/core.cpython-312.so").unwrap();
        assert_eq!(ext.module_name, "core");
        assert!(!ext.renamable);
    }

    #[test]
    fn test_suffix_variants() {
        assert!(is_extension_file("_speedups.pyd"));
        assert!(is_extension_file("_speedups.cp312-win_amd64.pyd"));
        assert!(is_extension_file("libfoo.so.1"));
        assert!(is_extension_file("libfoo.so.1.2"));
        assert!(!is_extension_file("module.py"));
        assert!(!is_extension_file("notes.so.txt"));
        assert!(!is_extension_file("so"));
        assert!(classify("pkg/lib.so/").is_none());
    }

    #[test]
    fn test_classify_archive_in_order() {
        let mut archive = Archive::new();
        archive.push(Entry::file("pkg/__init__.py", Vec::new())).unwrap();
        archive.push(Entry::file("pkg/_a.abi3.so", Vec::new())).unwrap();
        archive.push(Entry::file("pkg/b.pyd", Vec::new())).unwrap();

        let found = classify_archive(&archive);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].path, "pkg/_a.abi3.so");
        assert!(!found[1].renamable);
    }
}

// src/wheel/imports.rs

//! Import statement rewriting for Python sources
//!
//! Pattern based, no parser. Handles the statically visible shapes:
//! - `import old`
//! - `import old as alias`
//! - `import old.sub`
//! - `import os, old` (any position in an import list)
//! - `from old import x` and `from old.sub import x`
//!
//! The old name must appear as a whole identifier at the start of the module
//! path, so `old_extra`, `myold` and `from x import old` are never touched.
//! Quoted strings naming the old package are counted but left alone.

use crate::error::{Error, Result};
use regex::Regex;

/// Result of rewriting one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRewrite {
    pub text: String,
    /// Number of module references changed
    pub replacements: usize,
    /// Quoted literals still naming the old package after the rewrite
    pub leftover_literals: usize,
}

impl ImportRewrite {
    pub fn changed(&self) -> bool {
        self.replacements > 0
    }
}

/// Compiled patterns for one old→new rename
#[derive(Debug, Clone)]
pub struct ImportRewriter {
    old: String,
    new: String,
    from_import: Regex,
    plain_import: Regex,
    literal: Regex,
}

impl ImportRewriter {
    pub fn new(old: &str, new: &str) -> Result<Self> {
        let old_escaped = regex::escape(old);
        let compile = |pattern: String| {
            Regex::new(&pattern).map_err(|e| Error::InvalidDistributionName(format!("{}: {}", old, e)))
        };

        Ok(Self {
            old: old.to_string(),
            new: new.to_string(),
            from_import: compile(format!(
                r"(?m)(^|;)([ \t]*)from([ \t]+){}([ \t]|\.)",
                old_escaped
            ))?,
            plain_import: compile(r"(?m)(^|;)([ \t]*import[ \t]+)([^;#\r\n]+)".to_string())?,
            literal: compile(format!(r#"["']{}(\.[\w.]*)?["']"#, old_escaped))?,
        })
    }

    /// Rewrite the import statements of one source text
    pub fn rewrite(&self, source: &str) -> ImportRewrite {
        let mut replacements = 0;

        let from_replacement = format!("${{1}}${{2}}from${{3}}{}${{4}}", self.new);
        let text = self.from_import.replace_all(source, |caps: &regex::Captures<'_>| {
            replacements += 1;
            let mut out = String::new();
            caps.expand(&from_replacement, &mut out);
            out
        });

        let text = self.plain_import.replace_all(&text, |caps: &regex::Captures<'_>| {
            let (modules, count) = self.rewrite_module_list(&caps[3]);
            replacements += count;
            format!("{}{}{}", &caps[1], &caps[2], modules)
        });

        let leftover_literals = self.literal.find_iter(&text).count();

        ImportRewrite {
            text: text.into_owned(),
            replacements,
            leftover_literals,
        }
    }

    /// Rewrite each `old[.sub] [as alias]` item of an `import a, b` list
    fn rewrite_module_list(&self, list: &str) -> (String, usize) {
        let mut count = 0;
        let items: Vec<String> = list
            .split(',')
            .map(|item| {
                let module = item.trim_start();
                let indent = &item[..item.len() - module.len()];
                match module.strip_prefix(self.old.as_str()) {
                    Some(rest) if !rest.starts_with(|c: char| c.is_alphanumeric() || c == '_') => {
                        count += 1;
                        format!("{}{}{}", indent, self.new, rest)
                    }
                    _ => item.to_string(),
                }
            })
            .collect();
        (items.join(","), count)
    }
}

/// One-shot convenience wrapper around [`ImportRewriter`]
pub fn rewrite_imports(source: &str, old: &str, new: &str) -> Result<ImportRewrite> {
    Ok(ImportRewriter::new(old, new)?.rewrite(source))
}

/// Whether an archive path is a Python source the rewriter should scan
pub fn is_python_source(path: &str) -> bool {
    path.ends_with(".py") || path.ends_with(".pyi")
}

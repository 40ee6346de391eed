// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use spare_tire::wheel::{Archive, Entry, Record};

/// Builds small but structurally complete wheels in memory
pub struct WheelBuilder {
    name: String,
    version: String,
    tags: String,
    files: Vec<Entry>,
    requires: Vec<String>,
    with_record: bool,
}

impl WheelBuilder {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            tags: "py3-none-any".to_string(),
            files: Vec::new(),
            requires: Vec::new(),
            with_record: true,
        }
    }

    /// Compatibility tags, e.g. `cp312-cp312-manylinux_2_17_x86_64`
    pub fn tags(mut self, tags: &str) -> Self {
        self.tags = tags.to_string();
        self
    }

    pub fn file(mut self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.push(Entry::file(path, data));
        self
    }

    pub fn entry(mut self, entry: Entry) -> Self {
        self.files.push(entry);
        self
    }

    pub fn requires(mut self, requirement: &str) -> Self {
        self.requires.push(requirement.to_string());
        self
    }

    pub fn without_record(mut self) -> Self {
        self.with_record = false;
        self
    }

    pub fn dist_info(&self) -> String {
        format!("{}-{}.dist-info", self.name, self.version)
    }

    pub fn filename(&self) -> String {
        format!("{}-{}-{}.whl", self.name, self.version, self.tags)
    }

    pub fn archive(&self) -> Archive {
        let dist_info = self.dist_info();
        let mut archive = Archive::new();
        for entry in &self.files {
            archive.push(entry.clone()).unwrap();
        }

        let mut metadata = format!(
            "Metadata-Version: 2.1\nName: {}\nVersion: {}\nSummary: Test fixture\n",
            self.name, self.version
        );
        for requirement in &self.requires {
            metadata.push_str(&format!("Requires-Dist: {}\n", requirement));
        }
        metadata.push_str("\nLong description mentioning the old name.\n");

        archive
            .push(Entry::file(format!("{}/METADATA", dist_info), metadata))
            .unwrap();
        archive
            .push(Entry::file(
                format!("{}/WHEEL", dist_info),
                "Wheel-Version: 1.0\nGenerator: fixture\nRoot-Is-Purelib: true\nTag: py3-none-any\n",
            ))
            .unwrap();

        if self.with_record {
            let record_path = format!("{}/RECORD", dist_info);
            let record = Record::rebuild(&archive, &record_path);
            archive.push(Entry::file(record_path, record.to_bytes())).unwrap();
        }
        archive
    }

    pub fn build(&self) -> Vec<u8> {
        self.archive().serialize().unwrap()
    }
}

/// A pure Python `pkg` 1.0 wheel whose modules import each other
pub fn sample_wheel() -> WheelBuilder {
    WheelBuilder::new("pkg", "1.0")
        .file(
            "pkg/__init__.py",
            "from pkg.core import run\nimport pkg.util as util\n\n__all__ = [\"run\"]\n",
        )
        .file(
            "pkg/core.py",
            "import os\nimport pkg\nfrom pkg import util\nfrom pkgextra import thing\n\n\ndef run():\n    return util.VALUE + len(os.sep)\n",
        )
        .file("pkg/util.py", "VALUE = 1\n")
        .file("pkg-1.0.dist-info/top_level.txt", "pkg\n")
}

/// Text content of an archive member
pub fn text(archive: &Archive, path: &str) -> String {
    let entry = archive
        .get(path)
        .unwrap_or_else(|| panic!("{} missing from archive", path));
    String::from_utf8(entry.data.clone()).unwrap()
}

/// Assert the RECORD lists exactly the archive's files with matching digests
pub fn assert_record_consistent(archive: &Archive, record_path: &str) {
    let record = Record::parse(&archive.get(record_path).unwrap().data, record_path).unwrap();
    let issues = record.verify(archive, record_path);
    assert!(issues.is_empty(), "RECORD issues: {:?}", issues);

    let files = archive.iter().filter(|e| !e.is_dir()).count();
    assert_eq!(record.len(), files, "one RECORD row per file, RECORD included");

    let last = record.entries().last().unwrap();
    assert_eq!(last.path, record_path);
    assert!(last.digest.is_none() && last.size.is_none());
}

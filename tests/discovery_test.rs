//! Test-discovery end to end: scan a real source tree, rank it, and check
//! exclusions and candidate selection.

use std::fmt::Write as _;
use std::path::Path;

use runeforge::discovery::{
    discover, FileScanner, PriorityRanker, RankerConfig, ScannerConfig,
};

fn write_file(dir: &Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

/// A tidy, dependency-light module in the ideal size band.
fn tidy_source() -> String {
    let mut src = String::from(
        "use std::collections::BTreeMap;\n\n\
         pub struct Ledger {\n    entries: BTreeMap<String, i64>,\n}\n\n\
         impl Ledger {\n\
             pub fn credit(&mut self, key: &str, amount: i64) {\n\
                 let entry = self.entries.entry(key.to_string()).or_insert(0);\n\
                 if amount > 0 {\n        *entry += amount;\n    }\n\
             }\n\
             pub fn balance(&self, key: &str) -> i64 {\n\
                 match self.entries.get(key) {\n\
                     Some(v) => *v,\n\
                     None => 0,\n\
                 }\n\
             }\n\
         }\n\n",
    );
    for i in 0..20 {
        writeln!(src, "pub fn helper_{i}(x: i64) -> i64 {{ x + {i} }}").unwrap();
        src.push('\n');
    }
    src
}

/// A 2000-line monster with 30 imports and database I/O.
fn monster_source() -> String {
    let mut src = String::new();
    src.push_str("use rusqlite::Connection;\n");
    for i in 0..29 {
        writeln!(src, "use std::collections::HashMap as Map{i};").unwrap();
    }
    src.push_str("\npub fn query_everything() -> u64 {\n    let mut total = 0u64;\n");
    while src.lines().count() < 1995 {
        src.push_str("    total += 1;\n");
    }
    src.push_str("    total\n}\n");
    src
}

#[test]
fn oversized_db_heavy_file_is_excluded_and_never_a_candidate() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "src/ledger.rs", &tidy_source());
    write_file(dir.path(), "src/monster.rs", &monster_source());

    let scanner = FileScanner::with_defaults();
    let files = scanner.scan(dir.path()).unwrap();
    assert_eq!(files.len(), 2);

    let monster = files
        .iter()
        .find(|f| f.path.ends_with("monster.rs"))
        .unwrap();
    assert!(monster.line_count >= 1990);
    assert_eq!(monster.import_count, 30);
    assert!(monster.has_db_io);

    let ranker = PriorityRanker::with_defaults();
    let ranked = ranker.rank(&files);
    let monster_score = ranked
        .iter()
        .find(|s| s.path.ends_with("monster.rs"))
        .unwrap();
    assert!(monster_score.is_excluded);
    let reason = monster_score.exclusion_reason.as_deref().unwrap();
    assert!(
        reason.contains("imports") || reason.contains("size"),
        "reason was: {reason}"
    );

    // Absent from the candidate list regardless of N
    let top = ranker.top_candidates(&files, 10);
    assert_eq!(top.len(), 1);
    assert!(top[0].path.ends_with("ledger.rs"));
    assert!(!top[0].selection_reason.is_empty());
}

#[test]
fn test_files_and_vendor_trees_never_reach_the_ranker() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "src/lib.rs", &tidy_source());
    write_file(dir.path(), "src/lib_test.rs", "pub fn t() {}\n");
    write_file(dir.path(), "tests/e2e.rs", "pub fn t() {}\n");
    write_file(dir.path(), "vendor/third_party.rs", "pub fn v() {}\n");
    write_file(dir.path(), "testdata/fixture.rs", "pub fn f() {}\n");

    let scores = discover(
        dir.path(),
        ScannerConfig::default(),
        RankerConfig::default(),
    )
    .unwrap();
    assert_eq!(scores.len(), 1);
    assert!(scores[0].path.ends_with("lib.rs"));
}

#[test]
fn empty_tree_yields_an_empty_ranking() {
    let dir = tempfile::tempdir().unwrap();
    let scores = discover(
        dir.path(),
        ScannerConfig::default(),
        RankerConfig::default(),
    )
    .unwrap();
    assert!(scores.is_empty());
}

#[test]
fn ranking_a_real_tree_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "src/a.rs", &tidy_source());
    write_file(dir.path(), "src/b.rs", &tidy_source());

    let first = discover(
        dir.path(),
        ScannerConfig::default(),
        RankerConfig::default(),
    )
    .unwrap();
    let second = discover(
        dir.path(),
        ScannerConfig::default(),
        RankerConfig::default(),
    )
    .unwrap();

    let paths =
        |scores: &[runeforge::discovery::FileScore]| -> Vec<std::path::PathBuf> {
            scores.iter().map(|s| s.path.clone()).collect()
        };
    assert_eq!(paths(&first), paths(&second));
    // Identical files tie on score; the path breaks the tie
    assert!(first[0].path.ends_with("a.rs"));
}

// Test-discovery engine: scan a source tree, derive AST metrics, rank
// candidates for testing effort.

pub mod ranker;
pub mod scanner;

pub use ranker::{FileScore, PriorityRanker, RankWeights, RankerConfig};
pub use scanner::{FileInfo, FileScanner, FunctionInfo, ScannerConfig};

use std::path::Path;

use crate::error::Result;

/// Scan and rank in one call with the given configurations.
pub fn discover(
    root: impl AsRef<Path>,
    scanner_config: ScannerConfig,
    ranker_config: RankerConfig,
) -> Result<Vec<FileScore>> {
    let scanner = FileScanner::new(scanner_config)?;
    let files = scanner.scan(root)?;
    Ok(PriorityRanker::new(ranker_config).rank(&files))
}

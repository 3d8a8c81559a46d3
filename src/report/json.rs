//! JSON scan export

use crate::error::Result;
use crate::models::Scan;
use std::path::Path;
use tracing::info;

/// Exports a scan as a JSON file
pub fn export(scan: &Scan, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(scan)?;
    std::fs::write(output_path, json)?;
    info!("JSON report saved to {}", output_path.display());
    Ok(())
}

/// Loads a Scan from a JSON file
pub fn load(input_path: &Path) -> Result<Scan> {
    let content = std::fs::read_to_string(input_path)?;
    let scan: Scan = serde_json::from_str(&content)?;
    Ok(scan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures;

    #[test]
    fn test_export_then_load_keeps_scores() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("scan.json");
        let scan = fixtures::completed_scan();

        export(&scan, &path).expect("export");
        let loaded = load(&path).expect("load");
        assert_eq!(loaded.id, scan.id);
        assert_eq!(loaded.scores, scan.scores);
        assert_eq!(loaded.checks, scan.checks);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").expect("write");
        assert!(load(&path).is_err());
    }
}

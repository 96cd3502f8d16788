//! Batch file parsing
//!
//! One invocation per line, whitespace-tokenized. Blank lines and `#`
//! comments are skipped. A line consisting of the literal `commit-batch`
//! is a barrier, not a command.

use std::path::Path;

use steward_domain::{Invocation, Result, StewardError, BATCH_BARRIER};

/// Parse a batch file into its invocation list.
///
/// # Errors
/// Returns `StewardError::InvalidInput` when the file cannot be read or
/// contains no invocations.
pub fn parse_file(path: &Path) -> Result<Vec<Invocation>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        StewardError::InvalidInput(format!("cannot read batch file {}: {e}", path.display()))
    })?;
    let invocations = parse(&content)?;
    if invocations.iter().all(Invocation::is_barrier) {
        return Err(StewardError::InvalidInput(format!(
            "batch file {} contains no invocations",
            path.display()
        )));
    }
    Ok(invocations)
}

fn parse(content: &str) -> Result<Vec<Invocation>> {
    let mut invocations = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line == BATCH_BARRIER {
            invocations.push(Invocation::barrier());
            continue;
        }
        let tokens: Vec<String> = line.split_whitespace().map(ToString::to_string).collect();
        invocations.push(Invocation::new(tokens)?);
    }
    Ok(invocations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_comments_and_barriers() {
        let content = "\
# onboarding batch
user create alice@example.com

user create bob@example.com
commit-batch
group members add eng@example.com alice@example.com
";
        let invocations = parse(content).unwrap();

        assert_eq!(invocations.len(), 4);
        assert_eq!(invocations[0].tokens(), ["user", "create", "alice@example.com"]);
        assert!(invocations[2].is_barrier());
        assert_eq!(invocations[3].tokens()[0], "group");
    }

    #[test]
    fn barrier_must_stand_alone() {
        let invocations = parse("user rename commit-batch x\n").unwrap();
        assert_eq!(invocations.len(), 1);
        assert!(!invocations[0].is_barrier());
    }

    #[test]
    fn collapses_interior_whitespace() {
        let invocations = parse("user   get\talice@example.com\n").unwrap();
        assert_eq!(invocations[0].tokens(), ["user", "get", "alice@example.com"]);
    }

    #[test]
    fn missing_file_is_invalid_input() {
        let err = parse_file(Path::new("/nonexistent/batch.txt")).unwrap_err();
        assert!(matches!(err, StewardError::InvalidInput(_)));
    }

    #[test]
    fn barrier_only_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.txt");
        std::fs::write(&path, "commit-batch\n").unwrap();

        let err = parse_file(&path).unwrap_err();
        assert!(matches!(err, StewardError::InvalidInput(_)));
    }
}

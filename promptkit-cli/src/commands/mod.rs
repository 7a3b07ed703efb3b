pub mod kv;
pub mod pack;
pub mod prompts;

/// Pretty-prints `value` as JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Turns a storage failure into a report that says whether data was kept.
pub fn write_failure(failure: promptkit_core::WriteFailure) -> eyre::Report {
    if failure.recovered_from_backup {
        eyre::eyre!("{failure}")
    } else {
        eyre::eyre!("{failure}; the stored value may be inconsistent")
    }
}

#[cfg(test)]
mod tests {
    use promptkit_core::{StorageError, WriteFailure};

    use super::*;

    #[test]
    fn test_unrecovered_quota_failure_warns() {
        let report = write_failure(WriteFailure::new(StorageError::QuotaExceeded));
        assert!(report.to_string().contains("may be inconsistent"));

        let report = write_failure(WriteFailure::recovered(StorageError::QuotaExceeded));
        assert!(!report.to_string().contains("may be inconsistent"));
    }
}

//! Centralized validation and helper functions.

/// Longest cluster value accepted; shard names must stay within file name limits
pub const MAX_CLUSTER_VALUE_LENGTH: usize = 200;

/// Largest batch size accepted for chunked scans
pub const MAX_BATCH_SIZE: usize = 10_000_000;

/// Cluster value validation error types
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Empty cluster value")]
    EmptyClusterValue,
    #[error("Cluster value too long: exceeds {MAX_CLUSTER_VALUE_LENGTH} characters")]
    ClusterValueTooLong,
    #[error("Cluster value contains path separators or control characters")]
    UnsafeClusterValue,
    #[error("Batch size must be between 1 and {MAX_BATCH_SIZE}, got {0}")]
    InvalidBatchSize(usize),
}

/// Check that a cluster value can be embedded in a shard file name.
///
/// Shards are named `<LEVEL>_<value>.tsv` inside the index directory, so the
/// value must not be able to escape that directory or produce an unreadable
/// name:
/// - not empty, and within the length limit
/// - no directory traversal (`..`, `/`, `\`)
/// - no NUL or other control characters
///
/// # Errors
///
/// Returns `ValidationError::EmptyClusterValue`,
/// `ValidationError::ClusterValueTooLong` or
/// `ValidationError::UnsafeClusterValue`.
pub fn validate_cluster_value(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyClusterValue);
    }

    if value.len() > MAX_CLUSTER_VALUE_LENGTH {
        return Err(ValidationError::ClusterValueTooLong);
    }

    if value.contains("..") || value.contains('/') || value.contains('\\') {
        return Err(ValidationError::UnsafeClusterValue);
    }

    if value.chars().any(char::is_control) {
        return Err(ValidationError::UnsafeClusterValue);
    }

    Ok(())
}

/// Check a batch size for chunked scans
///
/// # Errors
///
/// Returns `ValidationError::InvalidBatchSize` if the size is zero or above
/// [`MAX_BATCH_SIZE`].
pub fn validate_batch_size(batch_size: usize) -> Result<usize, ValidationError> {
    if batch_size == 0 || batch_size > MAX_BATCH_SIZE {
        return Err(ValidationError::InvalidBatchSize(batch_size));
    }
    Ok(batch_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_cluster_value_safe() {
        assert!(validate_cluster_value("12").is_ok());
        assert!(validate_cluster_value("HC400_12").is_ok());
        assert!(validate_cluster_value("cluster-a.1").is_ok());
    }

    #[test]
    fn test_validate_cluster_value_dangerous() {
        assert_eq!(
            validate_cluster_value(""),
            Err(ValidationError::EmptyClusterValue)
        );
        assert_eq!(
            validate_cluster_value("  "),
            Err(ValidationError::EmptyClusterValue)
        );
        assert_eq!(
            validate_cluster_value("../etc"),
            Err(ValidationError::UnsafeClusterValue)
        );
        assert_eq!(
            validate_cluster_value("a/b"),
            Err(ValidationError::UnsafeClusterValue)
        );
        assert_eq!(
            validate_cluster_value("a\\b"),
            Err(ValidationError::UnsafeClusterValue)
        );
        assert_eq!(
            validate_cluster_value("a\0b"),
            Err(ValidationError::UnsafeClusterValue)
        );
        assert_eq!(
            validate_cluster_value(&"1".repeat(MAX_CLUSTER_VALUE_LENGTH + 1)),
            Err(ValidationError::ClusterValueTooLong)
        );
    }

    #[test]
    fn test_validate_batch_size() {
        assert_eq!(validate_batch_size(1), Ok(1));
        assert_eq!(validate_batch_size(10_000), Ok(10_000));
        assert_eq!(validate_batch_size(0), Err(ValidationError::InvalidBatchSize(0)));
        assert!(validate_batch_size(MAX_BATCH_SIZE + 1).is_err());
    }
}

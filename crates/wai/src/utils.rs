//! Small helpers shared by the crate internals.

/// Returns early with the given error when the predicate does not hold.
///
/// Works like `assert!`, but yields an `Err` instead of panicking, which keeps
/// validation code in builders flat.
///
/// ```ignore
/// ensure!(block_size > 0, ConfigError::invalid_block_size(block_size));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

//! Validation helpers used when building and checking configurations.

use crate::dtype::DType;

/// State value name reserved for digitizer signal data.
pub const RESERVED_STATE_VALUE: &str = "signal";

/// Validates if a given string is not empty.
///
/// # Arguments
///
/// * `value` - The string to validate.
///
/// # Returns
///
/// * `Ok(())` if the string is not empty.
/// * `Err(&'static str)` if the string is empty.
pub fn is_not_empty(value: &str) -> Result<(), &'static str> {
    if !value.is_empty() {
        Ok(())
    } else {
        Err("Value cannot be empty")
    }
}

/// Validates if a given string is an absolute container path.
///
/// # Arguments
///
/// * `path` - The dataset path to validate.
///
/// # Returns
///
/// * `Ok(())` if the path is absolute and well formed.
/// * `Err(&'static str)` if the path is empty, relative, or contains null
///   bytes.
pub fn is_valid_dset_path(path: &str) -> Result<(), &'static str> {
    if path.is_empty() {
        return Err("Dataset path cannot be empty");
    }
    if !path.starts_with('/') {
        return Err("Dataset path must be absolute");
    }
    if path.contains('\0') {
        return Err("Dataset path cannot contain null bytes");
    }
    if path == "/" {
        return Err("Dataset path cannot be the root group");
    }
    Ok(())
}

/// Validates if a name may be used as a state value key.
///
/// The comparison is exact; `"Signal"` is allowed.
pub fn is_allowed_state_value(name: &str) -> Result<(), &'static str> {
    is_not_empty(name)?;
    if name == RESERVED_STATE_VALUE {
        return Err("'signal' is reserved for digitizer data");
    }
    Ok(())
}

/// Validates that a shot number dtype is an integer type.
pub fn is_integer_dtype(dtype: DType) -> Result<(), &'static str> {
    if dtype.is_integer() {
        Ok(())
    } else {
        Err("Shot numbers must be stored as integers")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dset_paths() {
        assert!(is_valid_dset_path("/Raw data + config/Waveform/Run time list").is_ok());
        assert!(is_valid_dset_path("Run time list").is_err());
        assert!(is_valid_dset_path("").is_err());
        assert!(is_valid_dset_path("/").is_err());
        assert!(is_valid_dset_path("/a\0b").is_err());
    }

    #[test]
    fn reserved_state_value() {
        assert!(is_allowed_state_value("signal").is_err());
        assert!(is_allowed_state_value("").is_err());
        assert!(is_allowed_state_value("xyz").is_ok());
    }

    #[test]
    fn integer_dtypes() {
        assert!(is_integer_dtype(DType::Int32).is_ok());
        assert!(is_integer_dtype(DType::Float64).is_err());
    }
}

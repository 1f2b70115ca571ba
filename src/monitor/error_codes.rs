//! Native installer error codes and their domain [`ErrorCode`]s.

use crate::state::ErrorCode;

/// Every native code the installer documents. Anything else is `UnknownError`.
pub const NATIVE_ERROR_CODES: &[(i32, ErrorCode)] = &[
    (0, ErrorCode::NoError),
    (-1, ErrorCode::ActiveSessionsLimitExceeded),
    (-2, ErrorCode::ModuleUnavailable),
    (-3, ErrorCode::InvalidRequest),
    (-4, ErrorCode::SessionNotFound),
    (-5, ErrorCode::ApiNotAvailable),
    (-6, ErrorCode::NetworkError),
    (-7, ErrorCode::AccessDenied),
    (-8, ErrorCode::IncompatibleWithExistingSession),
    (-10, ErrorCode::InsufficientStorage),
    (-11, ErrorCode::VerificationError),
    (-12, ErrorCode::EmulationError),
    (-13, ErrorCode::CopyError),
    (-14, ErrorCode::StoreNotFound),
    (-15, ErrorCode::AppNotOwned),
    (-100, ErrorCode::InternalError),
];

pub fn map_native_error(native: i32) -> ErrorCode {
    NATIVE_ERROR_CODES
        .iter()
        .find(|(code, _)| *code == native)
        .map(|(_, mapped)| *mapped)
        .unwrap_or(ErrorCode::UnknownError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_documented_codes_map_one_to_one() {
        let natives: HashSet<i32> = NATIVE_ERROR_CODES.iter().map(|(c, _)| *c).collect();
        let domains: HashSet<ErrorCode> = NATIVE_ERROR_CODES.iter().map(|(_, d)| *d).collect();
        assert_eq!(natives.len(), NATIVE_ERROR_CODES.len());
        assert_eq!(domains.len(), NATIVE_ERROR_CODES.len());
        assert!(!domains.contains(&ErrorCode::UnknownError));

        assert_eq!(map_native_error(-6), ErrorCode::NetworkError);
        assert_eq!(map_native_error(-100), ErrorCode::InternalError);
    }

    #[test]
    fn test_unmapped_codes_fall_back() {
        for native in [-9, -16, 1, 42, i32::MIN, i32::MAX] {
            assert_eq!(map_native_error(native), ErrorCode::UnknownError);
        }
    }
}

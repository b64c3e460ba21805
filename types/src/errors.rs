/*
 * Copyright 2024 Download Service Contributors
 */

use std::fmt;

/// The error taxonomy from §7, carried in `Envelope::error_msg` alongside
/// the HTTP status in `Envelope::code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    FileNotFound,
    InvalidFileAmount,
    JobNotFound,
    ForgedToken,
    TokenExpired,
    InvalidToken,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FileNotFound => "FILE_NOT_FOUND",
            ErrorCode::InvalidFileAmount => "INVALID_FILE_AMOUNT",
            ErrorCode::JobNotFound => "JOB_NOT_FOUND",
            ErrorCode::ForgedToken => "FORGED_TOKEN",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::FileNotFound | ErrorCode::JobNotFound => 404,
            ErrorCode::InvalidFileAmount => 400,
            ErrorCode::ForgedToken | ErrorCode::TokenExpired | ErrorCode::InvalidToken => 401,
            ErrorCode::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn not_found_variants_map_to_404() {
        assert_eq!(ErrorCode::FileNotFound.http_status(), 404);
        assert_eq!(ErrorCode::JobNotFound.http_status(), 404);
    }

    #[test]
    fn token_variants_map_to_401() {
        assert_eq!(ErrorCode::ForgedToken.http_status(), 401);
        assert_eq!(ErrorCode::TokenExpired.http_status(), 401);
        assert_eq!(ErrorCode::InvalidToken.http_status(), 401);
    }

    #[test]
    fn internal_maps_to_500_and_invalid_amount_to_400() {
        assert_eq!(ErrorCode::Internal.http_status(), 500);
        assert_eq!(ErrorCode::InvalidFileAmount.http_status(), 400);
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(ErrorCode::JobNotFound.to_string(), ErrorCode::JobNotFound.as_str());
    }
}

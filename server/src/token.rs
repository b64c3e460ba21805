/*
 * Copyright 2024 Download Service Contributors
 */

//! Token Service (C4): mints and verifies short-lived HS256 hand-off
//! tokens. Rotation is supported by accepting two keys during cutover (§9)
//! -- `secondary_secret` is tried only if the primary fails to verify.

use download_types::{DatasetVersionClaims, DownloadClaims};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("token missing required claim: {0}")]
    Forged(&'static str),
    #[error("invalid token: {0}")]
    Invalid(String),
}

pub struct TokenService {
    secret: String,
    secondary_secret: Option<String>,
}

impl TokenService {
    pub fn new(secret: String, secondary_secret: Option<String>) -> TokenService {
        TokenService { secret, secondary_secret }
    }

    pub fn generate_download(&self, claims: &DownloadClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    pub fn generate_dataset_version(&self, claims: &DatasetVersionClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(self.secret.as_bytes()))
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    fn decode<T: serde::de::DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let primary = jsonwebtoken::decode::<T>(token, &DecodingKey::from_secret(self.secret.as_bytes()), &validation);

        match primary {
            Ok(data) => Ok(data.claims),
            Err(e) if e.kind() == &jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(TokenError::Expired),
            Err(e) => {
                if let Some(secondary) = &self.secondary_secret {
                    match jsonwebtoken::decode::<T>(
                        token,
                        &DecodingKey::from_secret(secondary.as_bytes()),
                        &validation,
                    ) {
                        Ok(data) => return Ok(data.claims),
                        Err(e2) if e2.kind() == &jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                            return Err(TokenError::Expired)
                        }
                        Err(_) => {}
                    }
                }
                Err(TokenError::Invalid(e.to_string()))
            }
        }
    }

    /// §4.4: rejects expired tokens and tokens missing `full_path`.
    pub fn verify_download(&self, token: &str) -> Result<DownloadClaims, TokenError> {
        let claims: DownloadClaims = self.decode(token)?;
        if claims.full_path.is_empty() {
            return Err(TokenError::Forged("full_path"));
        }
        Ok(claims)
    }

    /// Same as `verify_download` but for dataset-version tokens, which
    /// carry `location` instead of `full_path`.
    pub fn verify_dataset_version(&self, token: &str) -> Result<DatasetVersionClaims, TokenError> {
        let claims: DatasetVersionClaims = self.decode(token)?;
        if claims.location.is_empty() {
            return Err(TokenError::Forged("location"));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod test {
    use download_types::DownloadClaims;

    use super::*;

    fn claims(exp_offset: i64) -> DownloadClaims {
        let now = 1_700_000_000i64;
        DownloadClaims {
            geid: "g1".into(),
            full_path: "/tmp/proj_1/a.txt".into(),
            issuer: "download-service".into(),
            operator: "alice".into(),
            session_id: "sess".into(),
            job_id: "job1".into(),
            project_code: Some("proj".into()),
            iat: now,
            exp: now + exp_offset,
        }
    }

    #[test]
    fn round_trips_valid_claims() {
        let svc = TokenService::new("shh".into(), None);
        let c = claims(3600);
        let tok = svc.generate_download(&c).unwrap();
        let back = svc.verify_download(&tok).unwrap();
        assert_eq!(back.job_id, c.job_id);
        assert_eq!(back.full_path, c.full_path);
    }

    #[test]
    fn rejects_expired_token() {
        let svc = TokenService::new("shh".into(), None);
        let c = claims(-3600);
        let tok = svc.generate_download(&c).unwrap();
        assert!(matches!(svc.verify_download(&tok), Err(TokenError::Expired)));
    }

    #[test]
    fn round_trips_dataset_version_claims() {
        let svc = TokenService::new("shh".into(), None);
        let c = DatasetVersionClaims {
            geid: "g1".into(),
            location: "http://h/bucket/a/b.txt".into(),
            issuer: "download-service".into(),
            operator: "alice".into(),
            session_id: "sess".into(),
            job_id: "job1".into(),
            project_code: Some("proj".into()),
            iat: 1_700_000_000,
            exp: 1_700_003_600,
        };
        let tok = svc.generate_dataset_version(&c).unwrap();
        let back = svc.verify_dataset_version(&tok).unwrap();
        assert_eq!(back.location, c.location);
    }

    #[test]
    fn accepts_secondary_secret_during_rotation() {
        let minted_with_old = TokenService::new("old-secret".into(), None);
        let c = claims(3600);
        let tok = minted_with_old.generate_download(&c).unwrap();

        let rotated = TokenService::new("new-secret".into(), Some("old-secret".into()));
        assert!(rotated.verify_download(&tok).is_ok());
    }
}

//! `Idempotency-Key` header parsing and storage key namespacing.

use tally_shared::types::OrganizationId;

use super::error::IdempotencyError;

/// Request header carrying the client token.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Response header telling the client whether the response was replayed.
pub const IDEMPOTENT_REPLAYED_HEADER: &str = "idempotent-replayed";

/// Longest accepted key, in characters.
pub const MAX_KEY_LENGTH: usize = 255;

/// A validated client-supplied idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Parses the raw header values of a request.
    ///
    /// Returns `Ok(None)` when the header is absent.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` when the header is repeated, empty, not UTF-8, or
    /// longer than [`MAX_KEY_LENGTH`].
    pub fn from_header_values<'a, I>(values: I) -> Result<Option<Self>, IdempotencyError>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut values = values.into_iter();
        let Some(raw) = values.next() else {
            return Ok(None);
        };
        if values.next().is_some() {
            return Err(IdempotencyError::InvalidKey(
                "header must be supplied exactly once".to_string(),
            ));
        }

        let value = std::str::from_utf8(raw)
            .map_err(|_| IdempotencyError::InvalidKey("header must be valid UTF-8".to_string()))?
            .trim();

        Self::parse(value).map(Some)
    }

    /// Validates a single key value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` when the value is empty or too long.
    pub fn parse(value: &str) -> Result<Self, IdempotencyError> {
        if value.is_empty() {
            return Err(IdempotencyError::InvalidKey(
                "header must not be empty".to_string(),
            ));
        }
        if value.chars().count() > MAX_KEY_LENGTH {
            return Err(IdempotencyError::InvalidKey(format!(
                "header must be at most {MAX_KEY_LENGTH} characters"
            )));
        }
        Ok(Self(value.to_string()))
    }

    /// Returns the key as sent by the client.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the store key, namespaced by tenant so tenants never observe
    /// each other's cached responses.
    #[must_use]
    pub fn storage_key(&self, tenant: Option<OrganizationId>) -> String {
        match tenant {
            Some(org) => format!("idem:{org}:{}", self.0),
            None => format!("idem:global:{}", self.0),
        }
    }
}

impl std::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_values(values: &[&str]) -> Result<Option<IdempotencyKey>, IdempotencyError> {
        IdempotencyKey::from_header_values(values.iter().map(|v| v.as_bytes()))
    }

    #[test]
    fn test_absent_header() {
        assert!(parse_values(&[]).unwrap().is_none());
    }

    #[test]
    fn test_single_value() {
        let key = parse_values(&["k1"]).unwrap().unwrap();
        assert_eq!(key.as_str(), "k1");
    }

    #[test]
    fn test_multiple_values_rejected() {
        assert!(matches!(
            parse_values(&["k1", "k2"]),
            Err(IdempotencyError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_empty_value_rejected() {
        assert!(matches!(
            parse_values(&["   "]),
            Err(IdempotencyError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_length_limit() {
        let max = "a".repeat(MAX_KEY_LENGTH);
        assert!(IdempotencyKey::parse(&max).is_ok());

        let too_long = "a".repeat(MAX_KEY_LENGTH + 1);
        assert!(matches!(
            IdempotencyKey::parse(&too_long),
            Err(IdempotencyError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_non_utf8_rejected() {
        let raw: &[u8] = &[0xff, 0xfe];
        assert!(matches!(
            IdempotencyKey::from_header_values([raw]),
            Err(IdempotencyError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_storage_key_namespacing() {
        let key = IdempotencyKey::parse("k1").unwrap();
        let org = OrganizationId::new();

        assert_eq!(key.storage_key(None), "idem:global:k1");
        assert_eq!(key.storage_key(Some(org)), format!("idem:{org}:k1"));
        assert_ne!(
            key.storage_key(Some(org)),
            key.storage_key(Some(OrganizationId::new()))
        );
    }
}

//! P-256 public key conversion between native, DER/PEM and JWK forms.
//!
//! This module implements [RFC 7517](https://www.rfc-editor.org/rfc/rfc7517.html)
//! JSON Web Keys for EC P-256 public keys and
//! [RFC 7638](https://www.rfc-editor.org/rfc/rfc7638.html) thumbprints.
//!
//! # JWK Format
//!
//! ```json
//! {
//!   "kid": "<key id>",
//!   "kty": "EC",
//!   "crv": "P-256",
//!   "x": "<base64url 32-byte X>",
//!   "y": "<base64url 32-byte Y>",
//!   "use": "sig",
//!   "alg": "ES256"
//! }
//! ```
//!
//! # SubjectPublicKeyInfo
//!
//! Converting a JWK back to native form goes through the exact DER layout
//! generic ECDSA tooling consumes (91 bytes):
//!
//! ```text
//! 30 59
//!    30 13
//!       06 07 2a8648ce3d0201      id-ecPublicKey
//!       06 08 2a8648ce3d030107    prime256v1
//!    03 42 00
//!       04 <x:32> <y:32>          uncompressed point
//! ```
//!
//! The DER is parsed back with the same decoder used for externally supplied
//! keys before it is handed out.
//!
//! # Examples
//!
//! ```
//! use p256::SecretKey;
//! use ucp_trust::keys::{jwk_to_public_key, public_key_to_jwk};
//!
//! let secret = SecretKey::from_slice(&[7u8; 32]).expect("valid scalar");
//! let public = secret.public_key();
//!
//! let jwk = public_key_to_jwk(&public, "key-1")?;
//! assert_eq!(jwk.kty, "EC");
//! assert_eq!(jwk.crv, "P-256");
//!
//! assert_eq!(jwk_to_public_key(&jwk)?, public);
//! # Ok::<(), ucp_trust::TrustError>(())
//! ```

use p256::{
    PublicKey,
    elliptic_curve::sec1::ToEncodedPoint,
    pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding},
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    error::{Result, TrustError},
    jose::{base64_url_decode, base64_url_encode},
};

/// Byte width of a P-256 affine coordinate.
pub const COORDINATE_LEN: usize = 32;

/// `kty` for elliptic-curve keys.
pub const KTY_EC: &str = "EC";

/// `crv` for P-256.
pub const CRV_P256: &str = "P-256";

/// DER prefix of a P-256 SubjectPublicKeyInfo up to and including the `0x04`
/// uncompressed-point tag.
const SPKI_P256_PREFIX: [u8; 27] = [
    0x30, 0x59, // SEQUENCE, 89 bytes
    0x30, 0x13, // SEQUENCE, 19 bytes (AlgorithmIdentifier)
    0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, // id-ecPublicKey
    0x06, 0x08, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, // prime256v1
    0x03, 0x42, 0x00, // BIT STRING, 66 bytes, no unused bits
    0x04, // uncompressed point
];

/// Length of a P-256 SubjectPublicKeyInfo.
pub const SPKI_P256_LEN: usize = SPKI_P256_PREFIX.len() + 2 * COORDINATE_LEN;

/// JSON Web Key for a P-256 public key.
///
/// Every field deserializes with a default so third-party keys missing a field
/// can be inspected and rejected with a precise error by [`jwk_to_public_key`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    /// Key ID.
    #[serde(default)]
    pub kid: String,
    /// Key type (`"EC"`).
    #[serde(default)]
    pub kty: String,
    /// Curve (`"P-256"`).
    #[serde(default)]
    pub crv: String,
    /// X coordinate (base64url, no padding).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    /// Y coordinate (base64url, no padding).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
    /// Key usage (`"sig"`).
    #[serde(rename = "use", default)]
    pub key_use: String,
    /// Algorithm (`"ES256"`).
    #[serde(default)]
    pub alg: String,
}

impl Jwk {
    /// Computes the JWK thumbprint per RFC 7638.
    ///
    /// The canonical form for EC keys is `{"crv":..,"kty":..,"x":..,"y":..}`
    /// with members in lexicographic order; the thumbprint is the base64url
    /// SHA-256 of that string (43 characters).
    ///
    /// Returns `None` if a coordinate is missing.
    #[must_use]
    pub fn thumbprint(&self) -> Option<String> {
        let (x, y) = (self.x.as_deref()?, self.y.as_deref()?);
        let canonical =
            format!(r#"{{"crv":"{}","kty":"{}","x":"{x}","y":"{y}"}}"#, self.crv, self.kty);
        Some(base64_url_encode(&Sha256::digest(canonical.as_bytes())))
    }
}

/// JSON Web Key Set for publishing signing keys.
///
/// # Examples
///
/// ```
/// use ucp_trust::keys::{Jwk, Jwks};
///
/// let jwks = Jwks::new(vec![Jwk { kid: "k1".into(), kty: "EC".into(), ..Jwk::default() }]);
/// let json = jwks.to_json().expect("serialization should succeed");
/// assert!(json.contains("\"keys\""));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    /// Keys in the set.
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Creates a key set.
    #[must_use]
    pub const fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    /// Serializes the set as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Converts a P-256 public key to a JWK.
///
/// Deterministic: the same key and id always produce the same JWK.
///
/// # Errors
///
/// Returns [`TrustError::InvalidKey`] if the key has no affine coordinates.
pub fn public_key_to_jwk(public_key: &PublicKey, key_id: &str) -> Result<Jwk> {
    let point = public_key.to_encoded_point(false);
    let (Some(x), Some(y)) = (point.x(), point.y()) else {
        return Err(TrustError::InvalidKey("point has no affine coordinates".to_owned()));
    };

    let x = left_pad(x).map_err(|_| TrustError::InvalidKey("X coordinate too wide".to_owned()))?;
    let y = left_pad(y).map_err(|_| TrustError::InvalidKey("Y coordinate too wide".to_owned()))?;

    Ok(Jwk {
        kid: key_id.to_owned(),
        kty: KTY_EC.to_owned(),
        crv: CRV_P256.to_owned(),
        x: Some(base64_url_encode(&x)),
        y: Some(base64_url_encode(&y)),
        key_use: "sig".to_owned(),
        alg: "ES256".to_owned(),
    })
}

/// Converts a `BEGIN PUBLIC KEY` PEM to a JWK.
///
/// # Errors
///
/// Returns [`TrustError::InvalidKey`] if the PEM is not a P-256 public key.
pub fn public_key_pem_to_jwk(pem: &str, key_id: &str) -> Result<Jwk> {
    let public_key = public_key_from_pem(pem)?;
    public_key_to_jwk(&public_key, key_id)
}

/// Parses a `BEGIN PUBLIC KEY` PEM into a P-256 public key.
///
/// # Errors
///
/// Returns [`TrustError::InvalidKey`] on parse failure.
pub fn public_key_from_pem(pem: &str) -> Result<PublicKey> {
    PublicKey::from_public_key_pem(pem.trim())
        .map_err(|e| TrustError::InvalidKey(format!("public key PEM: {e}")))
}

/// Encodes a P-256 public key as `BEGIN PUBLIC KEY` PEM.
///
/// # Errors
///
/// Returns [`TrustError::InvalidEncoding`] if encoding fails.
pub fn public_key_to_pem(public_key: &PublicKey) -> Result<String> {
    public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| TrustError::InvalidEncoding(format!("public key PEM: {e}")))
}

/// Converts a JWK to a native P-256 public key.
///
/// `kty` and `crv` are checked before any decoding.
///
/// # Errors
///
/// - [`TrustError::UnsupportedKeyType`] if `kty` is not `"EC"`
/// - [`TrustError::UnsupportedCurve`] if `crv` is not `"P-256"`
/// - [`TrustError::MissingCoordinates`] if `x` or `y` is absent or empty
/// - [`TrustError::InvalidEncoding`] if a coordinate is not base64url, is wider
///   than 32 bytes, or the point is not on the curve
pub fn jwk_to_public_key(jwk: &Jwk) -> Result<PublicKey> {
    let der = jwk_to_spki_der(jwk)?;
    PublicKey::from_public_key_der(&der)
        .map_err(|e| TrustError::InvalidEncoding(format!("SubjectPublicKeyInfo rejected: {e}")))
}

/// Builds the DER SubjectPublicKeyInfo for a JWK.
///
/// The output is only returned after it parses as a P-256 public key.
///
/// # Errors
///
/// Same as [`jwk_to_public_key`].
pub fn jwk_to_spki_der(jwk: &Jwk) -> Result<Vec<u8>> {
    if jwk.kty != KTY_EC {
        return Err(TrustError::UnsupportedKeyType(jwk.kty.clone()));
    }
    if jwk.crv != CRV_P256 {
        return Err(TrustError::UnsupportedCurve(jwk.crv.clone()));
    }

    let x = coordinate(jwk.x.as_deref())?;
    let y = coordinate(jwk.y.as_deref())?;

    let mut der = Vec::with_capacity(SPKI_P256_LEN);
    der.extend_from_slice(&SPKI_P256_PREFIX);
    der.extend_from_slice(&x);
    der.extend_from_slice(&y);

    // Self-check with the decoder used for external keys.
    PublicKey::from_public_key_der(&der)
        .map_err(|e| TrustError::InvalidEncoding(format!("SubjectPublicKeyInfo rejected: {e}")))?;

    Ok(der)
}

/// Converts a JWK to `BEGIN PUBLIC KEY` PEM.
///
/// # Errors
///
/// Same as [`jwk_to_public_key`].
pub fn jwk_to_pem(jwk: &Jwk) -> Result<String> {
    public_key_to_pem(&jwk_to_public_key(jwk)?)
}

fn coordinate(encoded: Option<&str>) -> Result<[u8; COORDINATE_LEN]> {
    let encoded = encoded.filter(|s| !s.is_empty()).ok_or(TrustError::MissingCoordinates)?;
    let bytes = base64_url_decode(encoded)
        .ok_or_else(|| TrustError::InvalidEncoding("coordinate is not base64url".to_owned()))?;
    left_pad(&bytes)
}

/// Left-pads a big-endian integer to 32 bytes.
fn left_pad(bytes: &[u8]) -> Result<[u8; COORDINATE_LEN]> {
    if bytes.len() > COORDINATE_LEN {
        return Err(TrustError::InvalidEncoding(format!(
            "coordinate is {} bytes, expected at most {COORDINATE_LEN}",
            bytes.len()
        )));
    }
    let mut out = [0u8; COORDINATE_LEN];
    out[COORDINATE_LEN - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use p256::{SecretKey, pkcs8::EncodePublicKey};

    use super::*;

    fn public_key(seed: u8) -> PublicKey {
        SecretKey::from_slice(&[seed; 32]).expect("valid scalar").public_key()
    }

    fn decoded(coordinate: &Option<String>) -> Vec<u8> {
        base64_url_decode(coordinate.as_deref().expect("coordinate present")).expect("base64url")
    }

    #[test]
    fn test_jwk_fields() {
        let jwk = public_key_to_jwk(&public_key(1), "kid-1").unwrap();

        assert_eq!(jwk.kid, "kid-1");
        assert_eq!(jwk.kty, "EC");
        assert_eq!(jwk.crv, "P-256");
        assert_eq!(jwk.key_use, "sig");
        assert_eq!(jwk.alg, "ES256");
        assert_eq!(decoded(&jwk.x).len(), 32);
        assert_eq!(decoded(&jwk.y).len(), 32);
        assert!(!jwk.x.as_deref().unwrap().contains('='));
    }

    #[test]
    fn test_jwk_serialization_field_set() {
        let jwk = public_key_to_jwk(&public_key(2), "k").unwrap();
        let value = serde_json::to_value(&jwk).unwrap();
        let mut keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["alg", "crv", "kid", "kty", "use", "x", "y"]);
    }

    #[test]
    fn test_jwk_roundtrip() {
        for seed in 1..=8u8 {
            let key = public_key(seed);
            let jwk = public_key_to_jwk(&key, "k").unwrap();
            assert_eq!(jwk_to_public_key(&jwk).unwrap(), key);
        }
    }

    #[test]
    fn test_jwk_deterministic() {
        let key = public_key(3);
        assert_eq!(public_key_to_jwk(&key, "k").unwrap(), public_key_to_jwk(&key, "k").unwrap());
    }

    #[test]
    fn test_spki_matches_library_encoding() {
        let key = public_key(4);
        let jwk = public_key_to_jwk(&key, "k").unwrap();
        let der = jwk_to_spki_der(&jwk).unwrap();

        assert_eq!(der.len(), SPKI_P256_LEN);
        assert_eq!(der.len(), 91);
        assert_eq!(der, key.to_public_key_der().unwrap().as_bytes());
    }

    #[test]
    fn test_pem_roundtrip() {
        let key = public_key(5);
        let jwk = public_key_to_jwk(&key, "k").unwrap();
        let pem = jwk_to_pem(&jwk).unwrap();

        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----"));
        assert_eq!(public_key_pem_to_jwk(&pem, "k").unwrap(), jwk);
    }

    #[test]
    fn test_left_pad() {
        let padded = left_pad(&[0xab, 0xcd]).unwrap();
        assert_eq!(&padded[..30], &[0u8; 30]);
        assert_eq!(&padded[30..], &[0xab, 0xcd]);
        assert_eq!(left_pad(&[0x01; 32]).unwrap(), [0x01; 32]);
    }

    #[test]
    fn test_zero_stripped_coordinate_accepted() {
        let jwk = public_key_to_jwk(&public_key(6), "k").unwrap();
        let x = decoded(&jwk.x);
        let first = x.iter().position(|&b| b != 0).unwrap_or(0);

        let stripped = Jwk { x: Some(base64_url_encode(&x[first..])), ..jwk.clone() };
        assert_eq!(jwk_to_public_key(&stripped).unwrap(), jwk_to_public_key(&jwk).unwrap());
    }

    #[test]
    fn test_rejects_wrong_kty_before_decoding() {
        let jwk = Jwk { kty: "OKP".into(), crv: "Ed25519".into(), ..Jwk::default() };
        assert!(matches!(jwk_to_public_key(&jwk), Err(TrustError::UnsupportedKeyType(k)) if k == "OKP"));
    }

    #[test]
    fn test_rejects_wrong_curve() {
        let mut jwk = public_key_to_jwk(&public_key(7), "k").unwrap();
        jwk.crv = "P-384".into();
        assert!(matches!(jwk_to_public_key(&jwk), Err(TrustError::UnsupportedCurve(c)) if c == "P-384"));
    }

    #[test]
    fn test_rejects_missing_coordinates() {
        let mut jwk = public_key_to_jwk(&public_key(8), "k").unwrap();
        jwk.y = None;
        assert!(matches!(jwk_to_public_key(&jwk), Err(TrustError::MissingCoordinates)));

        jwk.y = Some(String::new());
        assert!(matches!(jwk_to_public_key(&jwk), Err(TrustError::MissingCoordinates)));
    }

    #[test]
    fn test_rejects_invalid_base64() {
        let mut jwk = public_key_to_jwk(&public_key(9), "k").unwrap();
        jwk.x = Some("not base64!".into());
        assert!(matches!(jwk_to_public_key(&jwk), Err(TrustError::InvalidEncoding(_))));
    }

    #[test]
    fn test_rejects_oversized_coordinate() {
        let mut jwk = public_key_to_jwk(&public_key(10), "k").unwrap();
        jwk.x = Some(base64_url_encode(&[1u8; 33]));
        assert!(matches!(jwk_to_public_key(&jwk), Err(TrustError::InvalidEncoding(_))));
    }

    #[test]
    fn test_rejects_point_off_curve() {
        let mut jwk = public_key_to_jwk(&public_key(11), "k").unwrap();
        jwk.y = Some(base64_url_encode(&[1u8; 32]));
        assert!(matches!(jwk_to_public_key(&jwk), Err(TrustError::InvalidEncoding(_))));
    }

    #[test]
    fn test_deserialize_tolerates_missing_fields() {
        let jwk: Jwk = serde_json::from_str(r#"{"kty":"EC","crv":"P-256"}"#).unwrap();
        assert!(jwk.kid.is_empty());
        assert!(matches!(jwk_to_public_key(&jwk), Err(TrustError::MissingCoordinates)));
    }

    #[test]
    fn test_thumbprint() {
        let jwk = public_key_to_jwk(&public_key(12), "a").unwrap();
        let renamed = Jwk { kid: "b".into(), ..jwk.clone() };

        let thumbprint = jwk.thumbprint().unwrap();
        assert_eq!(thumbprint.len(), 43);
        assert_eq!(Some(thumbprint), renamed.thumbprint(), "kid is not part of the thumbprint");
        assert_eq!(Jwk::default().thumbprint(), None);
    }

    #[test]
    fn test_invalid_pem() {
        assert!(matches!(public_key_from_pem("garbage"), Err(TrustError::InvalidKey(_))));
    }

    #[test]
    fn test_jwks_serialization() {
        let jwk = public_key_to_jwk(&public_key(13), "k").unwrap();
        let json = Jwks::new(vec![jwk.clone()]).to_json().unwrap();
        assert!(json.contains("\"kty\": \"EC\""));
        assert!(json.contains("\"use\": \"sig\""));

        let parsed: Jwks = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.keys, vec![jwk]);
    }
}

//! Magnet link parsing utilities

use std::fmt;

use super::SourceError;

const BTIH_PREFIX: &str = "xt=urn:btih:";

/// SHA-1 hash identifying a unique torrent.
///
/// 20-byte SHA-1 hash of the info dictionary. Its lower-case hex form is
/// also the bundle's directory name under the storage root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InfoHash([u8; 20]);

impl InfoHash {
    /// Creates InfoHash from 20-byte SHA-1 hash.
    pub fn new(hash: [u8; 20]) -> Self {
        Self(hash)
    }

    /// Returns reference to underlying 20-byte hash.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parses a 40 character hex string, in either case.
    ///
    /// # Errors
    ///
    /// - `SourceError::UnsupportedHash` - Base32 (32 character) hashes
    /// - `SourceError::InvalidLocator` - Wrong length or non-hex characters
    pub fn from_hex(hash_str: &str) -> Result<Self, SourceError> {
        match hash_str.len() {
            40 => {
                let mut hash = [0u8; 20];
                hex::decode_to_slice(hash_str, &mut hash).map_err(|e| {
                    SourceError::InvalidLocator {
                        reason: format!("invalid hex in info hash {hash_str}: {e}"),
                    }
                })?;
                Ok(Self(hash))
            }
            32 => Err(SourceError::UnsupportedHash {
                hash: hash_str.to_string(),
            }),
            len => Err(SourceError::InvalidLocator {
                reason: format!("invalid info hash length: {len} (expected 40)"),
            }),
        }
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Parsed magnet link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink {
    /// Info hash from the exact topic (`xt`) parameter
    pub info_hash: InfoHash,
    /// Display name (`dn`), if present
    pub display_name: Option<String>,
    /// Tracker URLs (`tr`)
    pub trackers: Vec<String>,
}

impl MagnetLink {
    /// Parses a magnet URI and extracts its BitTorrent info hash.
    ///
    /// # Errors
    ///
    /// - `SourceError::InvalidLocator` - Malformed URI or missing `xt=urn:btih:` topic
    /// - `SourceError::UnsupportedHash` - Info hash is base32 encoded
    pub fn parse(uri: &str) -> Result<Self, SourceError> {
        let magnet = magnet_url::Magnet::new(uri).map_err(|e| SourceError::InvalidLocator {
            reason: e.to_string(),
        })?;

        let info_hash = Self::extract_info_hash(uri)?;

        Ok(Self {
            info_hash,
            display_name: magnet.display_name().map(|s| s.to_string()),
            trackers: magnet.trackers().to_vec(),
        })
    }

    fn extract_info_hash(uri: &str) -> Result<InfoHash, SourceError> {
        let query = uri
            .split_once('?')
            .map(|(_, query)| query)
            .unwrap_or_default();

        let hash = query
            .split('&')
            .find_map(|param| {
                param
                    .get(..BTIH_PREFIX.len())
                    .filter(|prefix| prefix.eq_ignore_ascii_case(BTIH_PREFIX))
                    .map(|_| &param[BTIH_PREFIX.len()..])
            })
            .ok_or_else(|| SourceError::InvalidLocator {
                reason: format!("missing btih info hash in {uri}"),
            })?;

        InfoHash::from_hex(hash)
    }
}

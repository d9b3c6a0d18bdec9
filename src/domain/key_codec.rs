//! Reversible transform that makes instrument codes safe as stored map keys.
//!
//! The document store rejects "." inside map keys, while instrument codes such as
//! `0700.HK` carry one. Every "." is swapped for [`KEY_DOT_SENTINEL`] on the way in
//! and swapped back on the way out.

/// Stand-in for "." in stored keys. Persisted documents depend on this value; changing
/// it orphans every holding and algo config already written.
pub const KEY_DOT_SENTINEL: &str = "[dot]";

pub fn encode_key(key: &str) -> String {
    key.replace('.', KEY_DOT_SENTINEL)
}

pub fn decode_key(key: &str) -> String {
    key.replace(KEY_DOT_SENTINEL, ".")
}

/// A domain key that already contains the sentinel would not survive a round trip.
pub fn is_encodable(key: &str) -> bool {
    !key.contains(KEY_DOT_SENTINEL)
}

/// Encoded keys never contain "."; one that does was not written by [`encode_key`].
pub fn is_storage_safe(key: &str) -> bool {
    !key.contains('.')
}

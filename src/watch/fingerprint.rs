// src/watch/fingerprint.rs

use std::fmt;

/// Content fingerprint of one store entry: lowercase hex MD5.
///
/// MD5 matches what the store computes on its side, so a fingerprint we
/// advertise on the long-poll call compares equal to the server's when the
/// content is the same. Absence of an entry is modelled as
/// `Option<Fingerprint>::None`, never as a special digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix used in log lines.
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of raw entry content.
pub fn fingerprint(content: &[u8]) -> Fingerprint {
    Fingerprint(format!("{:x}", md5::compute(content)))
}

/// Wire form of a possibly-absent fingerprint: absent is the empty string.
pub fn wire_form(fp: Option<&Fingerprint>) -> &str {
    fp.map(Fingerprint::as_str).unwrap_or("")
}

//! Negotiable transfer parameters (RFC 2347, RFC 2348, RFC 2349).
//!
//! A [`TransferOptionSet`] is used in two flavors. The *proposed* set is what
//! this side of the transfer asks for; the *negotiated* set is built once from
//! whatever the peer acknowledged, and falls back to the protocol defaults for
//! anything the peer left out.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Block size used when none was negotiated (RFC 1350).
pub const DEFAULT_BLOCK_SIZE: u16 = 512;

/// Smallest block size a peer may propose (RFC 2348).
pub const MIN_BLOCK_SIZE: u16 = 8;

/// Largest block size a peer may propose (RFC 2348).
pub const MAX_BLOCK_SIZE: u16 = 65464;

/// Retransmission timeout used when none was negotiated.
pub const DEFAULT_TIMEOUT_SECS: u8 = 5;

/// The options this crate knows how to negotiate.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OptionName {
    /// `blksize`
    BlockSize,

    /// `timeout`
    Timeout,

    /// `tsize`
    TransferSize,
}

impl OptionName {
    /// The on-the-wire name of the option.
    pub fn as_str(self) -> &'static str {
        match self {
            OptionName::BlockSize => "blksize",
            OptionName::Timeout => "timeout",
            OptionName::TransferSize => "tsize",
        }
    }
}

impl FromStr for OptionName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        let s = s.to_ascii_lowercase();

        Ok(match s.as_str() {
            "blksize" => OptionName::BlockSize,
            "timeout" => OptionName::Timeout,
            "tsize" => OptionName::TransferSize,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `(name, value)` pair as carried on the wire.
///
/// Unrecognized names are kept so that they survive decoding, but they
/// are never turned into anything a [`TransferOptionSet`] would act on.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferOption {
    /// The option name, in whatever case the sender used.
    pub name: String,

    /// The option value as decimal text.
    pub value: String,
}

impl TransferOption {
    /// Creates a new `TransferOption`.
    pub fn new<N: Into<String>, V: Into<String>>(name: N, value: V) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Which recognized option this is, if any.
    pub fn kind(&self) -> Option<OptionName> {
        OptionName::from_str(&self.name).ok()
    }
}

/// A collection of recognized transfer options.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransferOptionSet {
    block_size: u16,
    timeout_secs: u8,
    transfer_size: u64,
    includes_block_size: bool,
    includes_timeout: bool,
    includes_transfer_size: bool,
}

impl Default for TransferOptionSet {
    fn default() -> Self {
        Self::new_empty()
    }
}

impl TransferOptionSet {
    /// A set with default values that proposes nothing but the transfer size.
    ///
    /// The size is filled in (or the option dropped) when the transfer starts.
    pub fn new_default() -> Self {
        Self {
            includes_transfer_size: true,
            ..Self::new_empty()
        }
    }

    /// A set with default values that proposes nothing at all.
    pub fn new_empty() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            transfer_size: 0,
            includes_block_size: false,
            includes_timeout: false,
            includes_transfer_size: false,
        }
    }

    /// Builds a set from the options a peer sent.
    ///
    /// Unknown options and values outside the ranges allowed by the RFCs are
    /// skipped as if the peer had not sent them. A value different from what
    /// was proposed is taken as is: peers are allowed to downgrade.
    pub fn from_options(options: &[TransferOption]) -> Self {
        let mut set = Self::new_empty();

        for option in options {
            let kind = match option.kind() {
                Some(kind) => kind,
                None => continue,
            };
            let value = option.value.trim();

            match kind {
                OptionName::BlockSize => {
                    if let Ok(size) = value.parse::<u16>() {
                        let _ = set.set_block_size(size);
                    }
                }
                OptionName::Timeout => {
                    if let Ok(secs) = value.parse::<u8>() {
                        let _ = set.set_timeout_secs(secs);
                    }
                }
                OptionName::TransferSize => {
                    if let Ok(size) = value.parse::<u64>() {
                        set.set_transfer_size(size);
                    }
                }
            }
        }

        set
    }

    /// Serializes the options that were explicitly included.
    pub fn to_option_list(&self) -> Vec<TransferOption> {
        let mut options = vec![];

        if self.includes_block_size {
            options.push(TransferOption::new(
                OptionName::BlockSize.as_str(),
                self.block_size.to_string(),
            ));
        }

        if self.includes_timeout {
            options.push(TransferOption::new(
                OptionName::Timeout.as_str(),
                self.timeout_secs.to_string(),
            ));
        }

        if self.includes_transfer_size {
            options.push(TransferOption::new(
                OptionName::TransferSize.as_str(),
                self.transfer_size.to_string(),
            ));
        }

        options
    }

    /// Resets anything the peer did not acknowledge to the protocol default.
    pub(crate) fn finish_negotiation(mut self) -> Self {
        if !self.includes_block_size {
            self.block_size = DEFAULT_BLOCK_SIZE;
        }

        if !self.includes_timeout {
            self.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }

        self
    }

    /// Whether any option would be serialized.
    pub fn is_empty(&self) -> bool {
        !(self.includes_block_size || self.includes_timeout || self.includes_transfer_size)
    }

    /// The block size in bytes.
    pub fn block_size(&self) -> u16 {
        self.block_size
    }

    /// Sets and includes the block size.
    pub fn set_block_size(&mut self, size: u16) -> Result<(), Error> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&size) {
            return Err(Error::InvalidOption {
                name: OptionName::BlockSize,
                value: size.to_string(),
            });
        }

        self.block_size = size;
        self.includes_block_size = true;
        Ok(())
    }

    /// The retransmission timeout in seconds.
    pub fn timeout_secs(&self) -> u8 {
        self.timeout_secs
    }

    /// Sets and includes the timeout.
    pub fn set_timeout_secs(&mut self, secs: u8) -> Result<(), Error> {
        if secs == 0 {
            return Err(Error::InvalidOption {
                name: OptionName::Timeout,
                value: secs.to_string(),
            });
        }

        self.timeout_secs = secs;
        self.includes_timeout = true;
        Ok(())
    }

    /// The transfer size, if included.
    pub fn transfer_size(&self) -> Option<u64> {
        if self.includes_transfer_size {
            Some(self.transfer_size)
        } else {
            None
        }
    }

    /// Sets and includes the transfer size.
    pub fn set_transfer_size(&mut self, size: u64) {
        self.transfer_size = size;
        self.includes_transfer_size = true;
    }

    /// Stops proposing the transfer size.
    pub fn disable_transfer_size(&mut self) {
        self.transfer_size = 0;
        self.includes_transfer_size = false;
    }

    /// Whether `blksize` was explicitly included.
    pub fn includes_block_size(&self) -> bool {
        self.includes_block_size
    }

    /// Whether `timeout` was explicitly included.
    pub fn includes_timeout(&self) -> bool {
        self.includes_timeout
    }

    /// Whether `tsize` was explicitly included.
    pub fn includes_transfer_size(&self) -> bool {
        self.includes_transfer_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_set_serializes_nothing() {
        let set = TransferOptionSet::new_empty();
        assert!(set.is_empty());
        assert!(set.to_option_list().is_empty());
        assert_eq!(set.block_size(), DEFAULT_BLOCK_SIZE);
        assert_eq!(set.timeout_secs(), DEFAULT_TIMEOUT_SECS);
        assert_eq!(set.transfer_size(), None);
    }

    #[test]
    fn test_explicit_default_is_still_included() {
        let mut set = TransferOptionSet::new_empty();
        set.set_block_size(DEFAULT_BLOCK_SIZE).unwrap();

        assert!(set.includes_block_size());
        assert_eq!(
            set.to_option_list(),
            vec![TransferOption::new("blksize", "512")]
        );
    }

    #[test]
    fn test_proposal_survives_acknowledgement() {
        let mut proposed = TransferOptionSet::new_empty();
        proposed.set_block_size(1428).unwrap();
        proposed.set_timeout_secs(2).unwrap();
        proposed.set_transfer_size(99_000);

        let acknowledged = TransferOptionSet::from_options(&proposed.to_option_list());
        assert_eq!(acknowledged, proposed);

        // Only a subset acknowledged.
        let subset: Vec<_> = proposed
            .to_option_list()
            .into_iter()
            .filter(|o| o.kind() != Some(OptionName::Timeout))
            .collect();
        let acknowledged = TransferOptionSet::from_options(&subset);
        assert_eq!(acknowledged.block_size(), 1428);
        assert_eq!(acknowledged.transfer_size(), Some(99_000));
        assert!(!acknowledged.includes_timeout());
    }

    #[test]
    fn test_names_are_case_insensitive_and_unknown_ignored() {
        let set = TransferOptionSet::from_options(&[
            TransferOption::new("BlkSize", "1024"),
            TransferOption::new("windowsize", "8"),
            TransferOption::new("TIMEOUT", "3"),
        ]);

        assert_eq!(set.block_size(), 1024);
        assert_eq!(set.timeout_secs(), 3);
        assert_eq!(set.to_option_list().len(), 2);
    }

    #[test]
    fn test_out_of_range_values_are_ignored() {
        let set = TransferOptionSet::from_options(&[
            TransferOption::new("blksize", "7"),
            TransferOption::new("timeout", "0"),
            TransferOption::new("tsize", "-1"),
        ]);
        assert!(set.is_empty());

        let set = TransferOptionSet::from_options(&[TransferOption::new("blksize", "65465")]);
        assert!(!set.includes_block_size());

        let mut set = TransferOptionSet::new_empty();
        assert!(set.set_block_size(MAX_BLOCK_SIZE + 1).is_err());
        assert!(set.set_timeout_secs(0).is_err());
        assert!(set.is_empty());
    }

    #[test]
    fn test_missing_block_size_falls_back_to_default() {
        let negotiated = TransferOptionSet::from_options(&[TransferOption::new("tsize", "10")])
            .finish_negotiation();

        assert_eq!(negotiated.block_size(), DEFAULT_BLOCK_SIZE);
        assert_eq!(negotiated.timeout_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_peer_downgrade_is_authoritative() {
        let negotiated = TransferOptionSet::from_options(&[TransferOption::new("blksize", "1024")])
            .finish_negotiation();

        assert_eq!(negotiated.block_size(), 1024);
    }
}

//! The fixed set of validators agreed at deployment.

use std::collections::BTreeMap;

use authentimed_crypto::public_key_of;
use authentimed_types::{PublicKey, ValidatorAddress};

use crate::error::ValidatorSetError;

/// Validators allowed to approve registrations, with the approval threshold.
///
/// Immutable once built. The threshold defaults to a simple majority and an
/// explicit threshold may only raise it, never drop below a majority.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorSet {
    members: BTreeMap<ValidatorAddress, PublicKey>,
    quorum: usize,
}

impl ValidatorSet {
    /// Smallest strict majority of `n` validators: `floor(n/2) + 1`.
    pub fn majority(n: usize) -> usize {
        n / 2 + 1
    }

    /// A set with a simple-majority threshold.
    pub fn new<I>(addresses: I) -> Result<Self, ValidatorSetError>
    where
        I: IntoIterator<Item = ValidatorAddress>,
    {
        Self::build(addresses, None)
    }

    /// A set with an explicit threshold between a majority and the set size.
    pub fn with_quorum<I>(addresses: I, quorum: usize) -> Result<Self, ValidatorSetError>
    where
        I: IntoIterator<Item = ValidatorAddress>,
    {
        Self::build(addresses, Some(quorum))
    }

    /// Build from config strings, as listed in `NodeConfig::validators`.
    pub fn from_strings(addresses: &[String], quorum: Option<usize>) -> Result<Self, ValidatorSetError> {
        let parsed = addresses
            .iter()
            .map(|raw| {
                ValidatorAddress::parse(raw)
                    .ok_or_else(|| ValidatorSetError::InvalidAddress(raw.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::build(parsed, quorum)
    }

    fn build<I>(addresses: I, quorum: Option<usize>) -> Result<Self, ValidatorSetError>
    where
        I: IntoIterator<Item = ValidatorAddress>,
    {
        let mut members = BTreeMap::new();
        for address in addresses {
            let key = public_key_of(&address)
                .ok_or_else(|| ValidatorSetError::InvalidAddress(address.to_string()))?;
            if members.insert(address.clone(), key).is_some() {
                return Err(ValidatorSetError::DuplicateValidator(address.to_string()));
            }
        }
        if members.is_empty() {
            return Err(ValidatorSetError::Empty);
        }

        let size = members.len();
        let min = Self::majority(size);
        let quorum = quorum.unwrap_or(min);
        if quorum < min || quorum > size {
            return Err(ValidatorSetError::InvalidQuorum { quorum, size, min });
        }
        Ok(Self { members, quorum })
    }

    /// Approvals needed to register a product.
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, address: &ValidatorAddress) -> bool {
        self.members.contains_key(address)
    }

    pub fn public_key(&self, address: &ValidatorAddress) -> Option<&PublicKey> {
        self.members.get(address)
    }

    /// Member addresses in sorted order.
    pub fn addresses(&self) -> impl Iterator<Item = &ValidatorAddress> {
        self.members.keys()
    }
}

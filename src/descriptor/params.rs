//! Protocol constants for v2 descriptors.
//!
//! [`DescriptorParams::default`] carries the values every deployed Tor
//! relay expects. Tests and experiments can build other values with
//! [`DescriptorParamsBuilder`] and pass them to
//! [`OnionDescriptor::update_with`](super::hidden::OnionDescriptor::update_with).
//!
//! # Example
//!
//! ```rust
//! use onion_desc::descriptor::{DescriptorParams, DescriptorParamsBuilder};
//!
//! let params = DescriptorParamsBuilder::default()
//!     .max_replica(3u8)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.version, 2);
//! assert!(params.check_replica(3).is_ok());
//! assert!(DescriptorParams::default().check_replica(3).is_err());
//! ```

use derive_builder::Builder;

use super::HiddenServiceDescriptorError;

/// Descriptor format version written by `update`.
pub const DESCRIPTOR_VERSION: u32 = 2;

/// Introduction protocol versions advertised by `update`.
pub const PROTOCOL_VERSIONS: [u32; 2] = [2, 3];

/// Smallest replica index.
pub const MIN_REPLICA: u8 = 0;

/// Largest replica index.
pub const MAX_REPLICA: u8 = 1;

/// Fixed inputs to descriptor derivation.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct DescriptorParams {
    /// Value of the `version` line.
    #[builder(default = "DESCRIPTOR_VERSION")]
    pub version: u32,

    /// Value of the `protocol-versions` line.
    #[builder(default = "PROTOCOL_VERSIONS.to_vec()")]
    pub protocol_versions: Vec<u32>,

    /// Smallest accepted replica.
    #[builder(default = "MIN_REPLICA")]
    pub min_replica: u8,

    /// Largest accepted replica.
    #[builder(default = "MAX_REPLICA")]
    pub max_replica: u8,
}

impl DescriptorParamsBuilder {
    fn validate(&self) -> Result<(), String> {
        let min = self.min_replica.unwrap_or(MIN_REPLICA);
        let max = self.max_replica.unwrap_or(MAX_REPLICA);
        if min > max {
            return Err(format!("min_replica {} exceeds max_replica {}", min, max));
        }
        Ok(())
    }
}

impl Default for DescriptorParams {
    fn default() -> Self {
        Self {
            version: DESCRIPTOR_VERSION,
            protocol_versions: PROTOCOL_VERSIONS.to_vec(),
            min_replica: MIN_REPLICA,
            max_replica: MAX_REPLICA,
        }
    }
}

impl DescriptorParams {
    /// Narrows `replica` to a byte if it lies in `[min_replica, max_replica]`.
    ///
    /// # Errors
    ///
    /// Returns [`HiddenServiceDescriptorError::ReplicaOutOfRange`] otherwise.
    pub fn check_replica(&self, replica: i32) -> Result<u8, HiddenServiceDescriptorError> {
        match u8::try_from(replica) {
            Ok(r) if (self.min_replica..=self.max_replica).contains(&r) => Ok(r),
            _ => Err(HiddenServiceDescriptorError::ReplicaOutOfRange {
                replica,
                min: self.min_replica,
                max: self.max_replica,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol() {
        let params = DescriptorParams::default();
        assert_eq!(params.version, 2);
        assert_eq!(params.protocol_versions, vec![2, 3]);
        assert_eq!(params.min_replica, 0);
        assert_eq!(params.max_replica, 1);

        let built = DescriptorParamsBuilder::default().build().unwrap();
        assert_eq!(built, params);
    }

    #[test]
    fn test_check_replica() {
        let params = DescriptorParams::default();
        assert_eq!(params.check_replica(0), Ok(0));
        assert_eq!(params.check_replica(1), Ok(1));
        assert_eq!(
            params.check_replica(-1),
            Err(HiddenServiceDescriptorError::ReplicaOutOfRange {
                replica: -1,
                min: 0,
                max: 1,
            })
        );
        assert!(params.check_replica(2).is_err());
        assert!(params.check_replica(256).is_err());
    }

    #[test]
    fn test_builder_rejects_inverted_range() {
        let result = DescriptorParamsBuilder::default()
            .min_replica(2u8)
            .max_replica(1u8)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_overrides() {
        let params = DescriptorParamsBuilder::default()
            .version(3u32)
            .protocol_versions(vec![3])
            .build()
            .unwrap();
        assert_eq!(params.version, 3);
        assert_eq!(params.protocol_versions, vec![3]);
        assert_eq!(params.max_replica, MAX_REPLICA);
    }
}

//! Distribution capability flags.
//!
//! The handshake's NAME/CHALLENGE packets carry these as a single 32-bit
//! big-endian field (see [`crate::handshake`]), so the flag set is kept to
//! the bits that fit there instead of the wider 64-bit set some distribution
//! implementations have grown into.

bitflags::bitflags! {
    /// Capabilities a node advertises to its peers during the handshake.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DistributionFlags: u32 {
        /// The node is to be published and part of the global namespace.
        const PUBLISHED = 0x01;

        /// The node implements an atom cache (obsolete).
        const ATOM_CACHE = 0x02;

        /// The node implements extended (3 x 32 bits) references.
        ///
        /// [NOTE] This flag is mandatory. If not present, the connection is refused.
        const EXTENDED_REFERENCES = 0x04;

        /// The node implements distributed process monitoring.
        const DIST_MONITOR = 0x08;

        /// The node uses a separate tag for funs (lambdas) in the distribution protocol.
        const FUN_TAGS = 0x10;

        /// The node implements distributed named process monitoring.
        const DIST_MONITOR_NAME = 0x20;

        /// The (hidden) node implements atom cache (obsolete).
        const HIDDEN_ATOM_CACHE = 0x40;

        /// The node understands new fun tags.
        ///
        /// [NOTE] This flag is mandatory. If not present, the connection is refused.
        const NEW_FUN_TAGS = 0x80;

        /// The node can handle extended pids and ports.
        ///
        /// [NOTE] This flag is mandatory. If not present, the connection is refused.
        const EXTENDED_PIDS_PORTS = 0x100;

        /// This node understands the `EXPORT_EXT` tag.
        const EXPORT_PTR_TAG = 0x200;

        /// The node understands bit binaries.
        const BIT_BINARIES = 0x400;

        /// The node understands the new float format.
        const NEW_FLOATS = 0x800;

        /// This node allows unicode characters in I/O operations.
        const UNICODE_IO = 0x1000;

        /// The node implements atom cache in the distribution header.
        ///
        /// Note that this crate does not interpret distribution headers.
        const DIST_HDR_ATOM_CACHE = 0x2000;

        /// The node understands the `SMALL_ATOM_EXT` tag.
        const SMALL_ATOM_TAGS = 0x4000;

        /// The node understands UTF-8 encoded atoms.
        ///
        /// [NOTE] This flag is mandatory. If not present, the connection is refused.
        const UTF8_ATOMS = 0x10000;

        /// The node understands maps.
        const MAP_TAGS = 0x20000;
    }
}

impl Default for DistributionFlags {
    /// The flags this crate advertises by default.
    fn default() -> Self {
        Self::EXTENDED_REFERENCES
            | Self::EXTENDED_PIDS_PORTS
            | Self::FUN_TAGS
            | Self::NEW_FUN_TAGS
            | Self::EXPORT_PTR_TAG
            | Self::BIT_BINARIES
            | Self::NEW_FLOATS
            | Self::SMALL_ATOM_TAGS
            | Self::UTF8_ATOMS
            | Self::MAP_TAGS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_flags_include_mandatory_bits() {
        let flags = DistributionFlags::default();
        assert!(flags.contains(DistributionFlags::EXTENDED_REFERENCES));
        assert!(flags.contains(DistributionFlags::EXTENDED_PIDS_PORTS));
        assert!(flags.contains(DistributionFlags::NEW_FUN_TAGS));
        assert!(flags.contains(DistributionFlags::UTF8_ATOMS));
    }

    #[test]
    fn intersection_keeps_only_shared_bits() {
        let ours = DistributionFlags::default();
        let theirs = DistributionFlags::EXTENDED_REFERENCES | DistributionFlags::UNICODE_IO;
        let shared = ours & theirs;
        assert_eq!(shared, DistributionFlags::EXTENDED_REFERENCES);
    }
}

//! Packaging: RO-Crate assembly, license compliance, provenance
//! serialization, and versioned archival.

pub mod license;
pub mod provenance;
pub mod rocrate;
pub mod storage;

pub use license::{
    LicenseCompatibility, LicenseManifest, LicenseValidator, SourceLicense, check_compatibility,
    generate_manifest, license_info, source_license_info, validate_license,
};
pub use provenance::ProvenanceTracker;
pub use rocrate::{CrateValidation, DataFileSpec, RoCrateBuilder, RoCrateValidator};
pub use storage::PackageStorage;

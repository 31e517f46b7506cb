/**
 * Volume driver operations: the plugin-facing
 *  entry points that tie the registry and the
 *  lifecycle manager together.
 */
pub mod driver;
/**
 * Per-bucket mount state machine: decides
 *  whether to mount, share, or tear down.
 */
pub mod lifecycle;
/**
 * The capability we mount buckets through.
 */
pub mod provider;
/**
 * Declared volume names.
 */
pub mod registry;
/**
 * Lock-striped bucket -> mount record table.
 */
pub mod table;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;
/**
 * Volume name parsing and mountpoint paths.
 */
pub mod volume;

/**
 * In-memory mount provider for exercising
 *  the lifecycle without FUSE or privileges.
 */
#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub mod prelude {
    pub use crate::driver::{Driver, DriverError, Scope, VolumeInfo, VolumeStatus};
    pub use crate::lifecycle::{LifecycleError, LifecycleManager, MountSnapshot};
    pub use crate::provider::{MountOptions, MountProvider, TargetKind};
    pub use crate::registry::{RegistryError, VolumeEntry, VolumeRegistry};
    pub use crate::version::{build_info, BuildInfo};
    pub use crate::volume::{PathResolver, VolumeName, VolumeNameError};
}

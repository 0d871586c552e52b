/// Maximum centroid distance for a detection to join an existing identity.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

/// Appearances closer than this (seconds) are coalesced into one time range.
pub const DEFAULT_RANGE_GAP_SECONDS: f64 = 2.0;

pub const BATCH_SAMPLING_INTERVAL_SECONDS: f64 = 1.0;
pub const ONLINE_SAMPLING_INTERVAL_SECONDS: f64 = 0.5;

pub const DEFAULT_CROP_WIDTH_SCALE: f64 = 1.5;
pub const DEFAULT_CROP_HEIGHT_SCALE: f64 = 2.0;

/// Per-frame seek + extraction deadline.
pub const DEFAULT_EXTRACTION_TIMEOUT_MS: u64 = 3000;

/// Below this fraction of frames yielding detections a run carries an
/// advisory warning.
pub const DEFAULT_MIN_SUCCESS_RATE: f64 = 0.1;

pub const DEFAULT_MERGE_SUGGESTION_THRESHOLD: f64 = 0.6;

/// Prefix of the opaque labels given to new identities.
pub const IDENTITY_LABEL_PREFIX: &str = "person";

pub const CONFIG_DIR_NAME: &str = "FaceTimeline";
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Version tag written into session snapshots.
pub const SESSION_SNAPSHOT_VERSION: u32 = 1;

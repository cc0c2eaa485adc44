//! Configuration and constants for the attribution engine.

/// Current report schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Default number of ranked methods in a report
pub const DEFAULT_TOP_N: usize = 20;
pub const MAX_TOP_N: usize = 10_000;

/// Event type carrying a captured call stack
pub const EXECUTION_SAMPLE_EVENT: &str = "jdk.ExecutionSample";

/// Log ingestion progress every N execution samples
pub const PROGRESS_INTERVAL: u64 = 100_000;

// 1 mWh = 3.6 J
pub const JOULES_PER_MILLIWATT_HOUR: f64 = 3.6;

/// Lower bound for the observation window when dividing by its duration
pub const MIN_DURATION_SECS: f64 = 1e-9;

/// Byte-order mark some exporters put in front of the header
pub const HEADER_MARKER: char = '\u{FEFF}';

// Header patterns, matched against the normalized header text
pub const ENERGY_PATTERN: &str = r"(package|processor|pkg|ia).*energy.*(j|joule)";
pub const POWER_PATTERN: &str = r"(package|processor|pkg|ia).*power.*(w|watt)";
pub const ELAPSED_PATTERN: &str = r"elapsed\s*time";
pub const WALL_CLOCK_PATTERN: &str = r"system\s*time";

// Platform runtime namespaces never attributed
pub const INFRASTRUCTURE_PREFIXES: &[&str] = &["java.", "jdk.", "sun.", "javax.", "com.sun."];

// Compiler-generated frames: lambdas, inner-class accessors, initializers
pub const SYNTHETIC_METHOD_MARKERS: &[&str] = &["$", "<init>", "<clinit>"];

pub const HELPER_METHOD_NAMES: &[&str] = &[
    "run",
    "call",
    "execute",
    "process",
    "compute",
    "calculate",
    "computeIntensive",
    "doWork",
    "sleep",
    "pause",
    "runWithGap",
    "warmup",
    "main",
];

pub const HELPER_CLASS_MARKERS: &[&str] = &["Util", "Helper", "Common"];

// Namespaces of known compute frameworks
pub const DOMAIN_NAMESPACE_MARKERS: &[&str] = &[
    "torch.",
    "pytorch",
    "tensorflow",
    "deeplearning4j",
    "onnxruntime",
];

pub const DOMAIN_METHOD_VERBS: &[&str] = &[
    "forward",
    "backward",
    "optimize",
    "train",
    "predict",
    "inference",
];

/// Error code registry for taskvars
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Load errors (reading and decoding spec documents)
/// - 3000-3999: Validation errors
/// - 4000-4999: Substitution errors
/// - 9000-9999: Other errors
#[allow(dead_code)]
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_YAML: u16 = 1002;
    pub const CONFIG_INVALID_VALUE: u16 = 1005;
    pub const CONFIG_INVALID_ENV: u16 = 1006;

    // Load errors (2000-2999)
    pub const LOAD_GENERIC: u16 = 2000;
    pub const LOAD_IO_ERROR: u16 = 2001;
    pub const LOAD_INVALID_YAML: u16 = 2002;
    pub const LOAD_INVALID_JSON: u16 = 2003;
    pub const LOAD_UNKNOWN_KIND: u16 = 2004;

    // Validation errors (3000-3999)
    pub const VALIDATION_GENERIC: u16 = 3000;
    pub const VALIDATION_SPEC_REJECTED: u16 = 3001;
    pub const VALIDATION_BINDING_REJECTED: u16 = 3002;

    // Substitution errors (4000-4999)
    pub const SUBSTITUTION_GENERIC: u16 = 4000;
    pub const SUBSTITUTION_UNRESOLVED: u16 = 4001;
    pub const SUBSTITUTION_ARRAY_IN_SCALAR: u16 = 4002;
    pub const SUBSTITUTION_INDEX_OUT_OF_RANGE: u16 = 4003;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
    pub const OTHER_INTERNAL_ERROR: u16 = 9004;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        // Configuration errors
        1000 => "Generic configuration error",
        1001 => "Configuration file not found",
        1002 => "Invalid YAML syntax in configuration",
        1005 => "Invalid value in configuration",
        1006 => "Invalid value in configuration environment variable",

        // Load errors
        2000 => "Generic load error",
        2001 => "Failed to read spec document",
        2002 => "Invalid YAML syntax in spec document",
        2003 => "Invalid JSON syntax in spec document",
        2004 => "Spec document kind is not supported",

        // Validation errors
        3000 => "Generic validation error",
        3001 => "Spec failed validation",
        3002 => "Run-time bindings failed validation",

        // Substitution errors
        4000 => "Generic substitution error",
        4001 => "Variable reference could not be resolved during substitution",
        4002 => "Array reference reached a field that cannot hold a list",
        4003 => "Array index reference out of range during substitution",

        // Other errors
        9000 => "Generic error",
        9004 => "Internal error",

        _ => "Unknown error code",
    }
}

//! Global constants for the interpretation core

pub mod chunks {
    /// Maximum number of codepoints stored in a single chunk of the
    /// codepoint index.
    pub const MAX_CPP_PER_CHUNK: usize = 1000;

    /// Two adjacent chunks are merged when their combined codepoint count
    /// stays at or below this bound.
    pub const MERGE_THRESHOLD: usize = MAX_CPP_PER_CHUNK / 2;
}

pub mod decode {
    /// How many codepoint boundaries past the erased region are cached
    /// before an edit, used to re-synchronize the re-decode pass.
    pub const CACHED_BOUNDARIES: usize = 4;
}

pub mod errors {
    // Error codes
    pub const UNKNOWN_ENCODING: &str = "UNKNOWN_ENCODING";
    pub const DUPLICATE_ENCODING: &str = "DUPLICATE_ENCODING";
    pub const LANGUAGE_ERROR: &str = "LANGUAGE_ERROR";
    pub const QUERY_ERROR: &str = "QUERY_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

pub mod captures {
    // Injection captures
    pub const INJECTION_CONTENT: &str = "injection.content";
    pub const INJECTION_LANGUAGE: &str = "injection.language";
    pub const INJECTION_INCLUDE_CHILDREN: &str = "injection.include-children";

    // Local-scope captures
    pub const LOCAL_SCOPE: &str = "local.scope";
    pub const LOCAL_DEFINITION: &str = "local.definition";
    pub const LOCAL_DEFINITION_VALUE: &str = "local.definition-value";
    pub const LOCAL_REFERENCE: &str = "local.reference";
    pub const LOCAL_SCOPE_INHERITS: &str = "local.scope-inherits";
}

pub mod highlight {
    /// Chunk size served to the parser's streaming read callback.
    pub const PARSE_CHUNK: usize = 1024;
}

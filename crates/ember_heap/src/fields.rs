//! Well-known field names.

/// UTF-8 bytes of a string record.
pub const CHARS: &str = "chars";
/// Function name (string edge).
pub const NAME: &str = "name";
/// Owning script, or debug info wrapping it, of a function.
pub const SCRIPT_OR_DEBUG_INFO: &str = "script_or_debug_info";
/// Active bytecode of a function.
pub const FUNCTION_DATA: &str = "function_data";
/// Source offset where a function starts.
pub const START_POSITION: &str = "start_position";
/// Source offset where a function ends.
pub const END_POSITION: &str = "end_position";
/// Lexical scope description of a function.
pub const SCOPE_INFO: &str = "scope_info";
/// Literal table of a function or bytecode blob.
pub const LITERALS: &str = "literals";
/// Source text of a script (string edge).
pub const SOURCE: &str = "source";
/// Script name or URL.
pub const SCRIPT_NAME: &str = "script_name";
/// Runtime-assigned script id.
pub const ID: &str = "id";
/// Origin option bits of a script.
pub const ORIGIN_OPTIONS: &str = "origin_options";
/// Embedder context pointer of a script.
pub const CONTEXT_DATA: &str = "context_data";
/// Host-defined options list of a script.
pub const HOST_DEFINED_OPTIONS: &str = "host_defined_options";
/// Functions defined by a script.
pub const SHARED_FUNCTION_INFOS: &str = "shared_function_infos";
/// Script a debug info belongs to.
pub const SCRIPT: &str = "script";
/// Bytecode before debugger instrumentation.
pub const ORIGINAL_BYTECODE: &str = "original_bytecode";
/// Debugger-instrumented bytecode.
pub const DEBUG_BYTECODE: &str = "debug_bytecode";
/// Break point dictionary of a debug info.
pub const BREAK_POINTS: &str = "break_points";
/// Opcode bytes of a bytecode blob.
pub const CODE: &str = "code";

/// Origin option bit marking a script as a module.
pub const ORIGIN_MODULE_BIT: i64 = 1 << 3;

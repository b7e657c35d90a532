use thiserror::Error;

/// Hard failures of the scripting system.
///
/// Everything else (unknown idents, bad coercions, missing arguments)
/// degrades to well-defined defaults instead of erroring; scripts must
/// never take the host down.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("unterminated string starting on line {line}")]
    UnterminatedString { line: u32 },

    #[error("unterminated block starting on line {line}")]
    UnterminatedBlock { line: u32 },

    #[error("command {0:?} is already registered")]
    DuplicateCommand(String),

    #[error("could not read script file {path:?}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

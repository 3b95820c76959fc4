use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Render `value` as one JSON document followed by a newline.
fn render<T: Serialize>(value: &T, compact: bool, mut out: impl Write) -> Result<(), String> {
    let written = if compact {
        serde_json::to_writer(&mut out, value)
    } else {
        serde_json::to_writer_pretty(&mut out, value)
    };
    written.map_err(|e| format!("JSON serialization failed: {}", e))?;
    out.write_all(b"\n")
        .and_then(|_| out.flush())
        .map_err(|e| format!("Failed to write summary: {}", e))
}

/// Write a command summary to `output_path`, or stdout when none is given.
///
/// Failures are reported on stderr; returns false if anything went wrong.
pub fn emit<T: Serialize>(value: &T, compact: bool, output_path: Option<&str>) -> bool {
    let result = match output_path {
        Some(path) => create_file_writer(Path::new(path))
            .and_then(|writer| render(value, compact, writer)),
        None => render(value, compact, std::io::stdout().lock()),
    };
    if let Err(ref e) = result {
        eprintln!("Error: {}", e);
    }
    result.is_ok()
}

/// Buffered writer for a side file such as the JSON-lines packet stream.
pub fn create_file_writer(path: &Path) -> Result<BufWriter<File>, String> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|e| format!("Failed to create '{}': {}", path.display(), e))
}

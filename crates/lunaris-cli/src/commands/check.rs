//! `lunaris check`: compile files without running them.

use std::path::PathBuf;

use anyhow::bail;
use lunaris_runtime::Script;
use termcolor::ColorChoice;

use crate::output::StyledOutput;

pub fn execute(files: &[PathBuf], choice: ColorChoice) -> anyhow::Result<()> {
    let mut out = StyledOutput::new(choice);
    let mut script = Script::new();
    let mut failures = 0;

    for file in files {
        match script.load_file(file, None, None) {
            Ok(_) => out.success(&format!("ok    {}", file.display())),
            Err(e) => {
                failures += 1;
                out.stderr_error(&format!("error {}", e));
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} files failed to compile", failures, files.len());
    }
    Ok(())
}

//! `jpegtran` integration for lossless re-orientation.

use super::backend::{JpegTransform, ToolError};
use super::run_tool;
use std::path::Path;

const JPEGTRAN: &str = "jpegtran";

/// Runs `jpegtran -copy all -perfect <operation> -outfile <output> <source>`.
///
/// `-perfect` makes jpegtran refuse transforms that cannot be done losslessly
/// (image edges not on an MCU boundary) instead of silently leaving the edge
/// blocks untransformed.
pub struct Jpegtran {
    program: String,
}

impl Jpegtran {
    pub fn new() -> Self {
        Self {
            program: JPEGTRAN.to_string(),
        }
    }

    fn arguments(source: &Path, output: &Path, operation: &[&str]) -> Vec<String> {
        let mut args: Vec<String> = vec!["-copy".into(), "all".into(), "-perfect".into()];
        args.extend(operation.iter().map(|s| s.to_string()));
        args.push("-outfile".into());
        args.push(output.to_string_lossy().into_owned());
        args.push(source.to_string_lossy().into_owned());
        args
    }
}

impl Default for Jpegtran {
    fn default() -> Self {
        Self::new()
    }
}

impl JpegTransform for Jpegtran {
    fn transform(
        &self,
        source: &Path,
        output: &Path,
        operation: &[&str],
    ) -> Result<(), ToolError> {
        run_tool(&self.program, &Self::arguments(source, output, operation)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_put_source_last() {
        let args = Jpegtran::arguments(
            Path::new("/p/a.jpg"),
            Path::new("/p/.a.jpg.orient"),
            &["-rotate", "90"],
        );
        assert_eq!(
            args,
            vec![
                "-copy",
                "all",
                "-perfect",
                "-rotate",
                "90",
                "-outfile",
                "/p/.a.jpg.orient",
                "/p/a.jpg"
            ]
        );
    }
}

//! Command-line definition.
//!
//! Two mutually exclusive modes share one flat flag set: checking a
//! published `package@version`, or checking a local project root against a
//! declared compatibility expression. When neither mode is fully
//! specified the binary prints usage and produces no result.

use std::path::PathBuf;

use clap::Parser;

/// Audit whether a package's declared interpreter-compatibility range is
/// actually supportable.
#[derive(Parser, Debug)]
#[command(
    name = "pyvet",
    disable_version_flag = true,
    about = "Check whether a package's declared compatible interpreter range is right",
    long_about = "Pyvet statically analyzes a package (published or local) and reports three \
                  findings: use of features incompatible with the claimed versions, locally \
                  detectable compatibility handling without a declared range, and claimed \
                  versions for which no compatible dependency release exists."
)]
pub struct Cli {
    /// Name of a published package to check
    #[arg(short = 'p', long)]
    pub package: Option<String>,

    /// Version of the published package
    #[arg(short = 'v', long)]
    pub version: Option<String>,

    /// Root path of a local project to check
    #[arg(short = 'r', long)]
    pub root: Option<PathBuf>,

    /// Declared compatibility expression of the local project
    #[arg(short = 'c', long)]
    pub python_requires: Option<String>,

    /// Directory for registry caches and downloaded archives
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub verbose: bool,

    /// Suppress all output except errors and findings
    #[arg(short = 'q', long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

/// A fully specified invocation mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Package { name: String, version: String },
    Project { root: PathBuf, python_requires: String },
}

impl Cli {
    /// The requested mode, or `None` when required flags are missing.
    /// Package mode wins when both are specified.
    pub fn mode(&self) -> Option<Mode> {
        if let (Some(name), Some(version)) = (&self.package, &self.version) {
            return Some(Mode::Package {
                name: name.clone(),
                version: version.clone(),
            });
        }
        if let (Some(root), Some(python_requires)) = (&self.root, &self.python_requires) {
            return Some(Mode::Project {
                root: root.clone(),
                python_requires: python_requires.clone(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_mode_requires_both_flags() {
        let cli = Cli::parse_from(["pyvet", "-p", "requests", "-v", "2.26.0"]);
        assert_eq!(
            cli.mode(),
            Some(Mode::Package {
                name: "requests".into(),
                version: "2.26.0".into()
            })
        );

        let cli = Cli::parse_from(["pyvet", "-p", "requests"]);
        assert_eq!(cli.mode(), None);
    }

    #[test]
    fn project_mode_requires_both_flags() {
        let cli = Cli::parse_from(["pyvet", "-r", "/tmp/demo", "-c", ">=3.6"]);
        assert_eq!(
            cli.mode(),
            Some(Mode::Project {
                root: "/tmp/demo".into(),
                python_requires: ">=3.6".into()
            })
        );

        let cli = Cli::parse_from(["pyvet", "-r", "/tmp/demo"]);
        assert_eq!(cli.mode(), None);
    }

    #[test]
    fn no_flags_means_no_mode() {
        let cli = Cli::parse_from(["pyvet"]);
        assert_eq!(cli.mode(), None);
    }

    #[test]
    fn package_mode_wins_over_project_mode() {
        let cli = Cli::parse_from([
            "pyvet", "-p", "requests", "-v", "2.26.0", "-r", "/tmp/demo", "-c", ">=3.6",
        ]);
        assert!(matches!(cli.mode(), Some(Mode::Package { .. })));
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["pyvet", "--quiet", "--verbose"]).is_err());
    }
}

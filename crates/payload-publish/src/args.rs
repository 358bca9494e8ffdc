//! CLI argument definitions for the sender.

use clap::Args;
use std::path::PathBuf;

/// Arguments for one send (or validation) run.
#[derive(Args, Clone, Debug)]
pub struct SendArgs {
    /// Path to the definition document (JSON, or YAML by extension)
    #[arg(long = "def", env = "PAYLOAD_SENDER_DEF", value_name = "PATH")]
    pub definition: PathBuf,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(long)]
    pub debug: bool,

    /// Render and export every payload without connecting to a broker
    #[arg(long)]
    pub validate: bool,

    /// Worker count, overriding the document's `threads` (0 = all cores)
    #[arg(long)]
    pub threads: Option<usize>,

    /// Write run metrics as JSON to this file after completion
    #[arg(long, value_name = "PATH")]
    pub emit_metrics: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: SendArgs,
    }

    #[test]
    fn test_parse_flags() {
        let cli = TestCli::parse_from([
            "payload-sender",
            "--def",
            "defs/orders.json",
            "--validate",
            "--threads",
            "4",
            "--emit-metrics",
            "out/metrics.json",
        ]);
        assert_eq!(cli.args.definition, PathBuf::from("defs/orders.json"));
        assert!(cli.args.validate);
        assert!(!cli.args.debug);
        assert_eq!(cli.args.threads, Some(4));
        assert_eq!(cli.args.emit_metrics, Some(PathBuf::from("out/metrics.json")));
    }

    #[test]
    fn test_threads_optional() {
        let cli = TestCli::parse_from(["payload-sender", "--def", "a.yaml", "--debug"]);
        assert!(cli.args.debug);
        assert_eq!(cli.args.threads, None);
        assert_eq!(cli.args.emit_metrics, None);
    }
}

//
// main.rs
// Seg-Audit
//
// Entry point that hands off execution to the CLI layer.
//
// Thales Matheus Mendonça Santos - November 2025

use seg_audit::cli;

fn main() -> anyhow::Result<()> {
    cli::run()
}

//! Finding output: one red/green line per finding.

use owo_colors::OwoColorize;

use pyvet_engine::Findings;

pub fn print_findings(findings: &Findings, no_color: bool) {
    let rows = [
        ("Use incompatible features", findings.incompatible_feature),
        ("Check compatibility locally", findings.local_mismatch),
        ("No available resource", findings.unavailable_resource),
    ];
    for (name, detected) in rows {
        let line = format!("{name}: {detected}");
        if no_color {
            println!("{line}");
        } else if detected {
            println!("{}", line.red());
        } else {
            println!("{}", line.green());
        }
    }
}

use crate::support::{EXIT_PROBLEMS, load_config_or_exit, print_json, print_sample_block};
use formwork_kernel::{DefaultsMatrix, OutputChannel};
use serde_json::json;

pub fn run(config: Option<String>, json_output: bool) {
    let config = load_config_or_exit(config.as_deref());
    let mut matrix = DefaultsMatrix::builtin();
    let issues = matrix.apply_overrides(&config.matrix);

    if json_output {
        print_json(&json!({
            "matrix": matrix,
            "issues": issues,
        }));
    } else {
        let header: Vec<&str> = OutputChannel::ALL.iter().map(|channel| channel.as_str()).collect();
        println!("{:<18} {}", "row", header.join(" "));
        for (row, channels) in matrix.rows() {
            let cells: Vec<String> = OutputChannel::ALL
                .iter()
                .map(|channel| {
                    let width = channel.as_str().len();
                    let cell = channels.get(channel).map_or("-", |rep| rep.as_str());
                    format!("{cell:<width$}")
                })
                .collect();
            println!("{row:<18} {}", cells.join(" "));
        }
        let lines: Vec<String> = issues
            .iter()
            .map(|issue| format!("[{}] {}: {}", issue.severity, issue.path, issue.message))
            .collect();
        print_sample_block("Issues", &lines);
    }

    if issues.iter().any(|issue| issue.is_error()) {
        std::process::exit(EXIT_PROBLEMS);
    }
}

use crate::support::{
    EXIT_PROBLEMS, exit_input_error, load_config_or_exit, print_json, print_sample_block,
    read_json_file_or_exit, request_context_or_exit,
};
use formwork_kernel::{FormDefinition, FormEngine, SubmissionState};
use serde_json::{Map, Value};

pub fn run(form: String, request: String, config: Option<String>, now: Option<String>, json_output: bool) {
    let definition = FormDefinition::load(&form).unwrap_or_else(|e| exit_input_error(e));
    let request: Map<String, Value> = read_json_file_or_exit(&request, "request");
    let config = load_config_or_exit(config.as_deref());
    let ctx = request_context_or_exit(now.as_deref());

    let engine = FormEngine::new(definition, config);
    let run = engine.process(&request, &ctx);

    if json_output {
        print_json(&run);
    } else {
        println!("formwork check {form}");
        println!("  Form id: {}", run.form_id);
        println!("  State: {}", run.state);
        let setup_errors: Vec<String> = run
            .report
            .setup_errors()
            .map(|issue| format!("{} {}: {}", issue.class, issue.path, issue.message))
            .collect();
        print_sample_block("Setup errors", &setup_errors);
        let setup_warnings: Vec<String> = run
            .report
            .setup_warnings()
            .map(|issue| format!("{} {}: {}", issue.class, issue.path, issue.message))
            .collect();
        print_sample_block("Setup warnings", &setup_warnings);
        let fields: Vec<String> = run
            .report
            .per_field
            .iter()
            .flat_map(|(name, problems)| {
                problems
                    .iter()
                    .map(move |problem| format!("{name}: {} ({})", problem.message, problem.code))
            })
            .collect();
        print_sample_block("Field problems", &fields);
        let missing: Vec<String> = run
            .fields
            .iter()
            .filter(|view| view.required_but_empty)
            .map(|view| view.name.clone())
            .collect();
        print_sample_block("Required but empty", &missing);
        let groups: Vec<String> = run
            .report
            .group
            .iter()
            .map(|problem| format!("{} [{}]: {}", problem.rule_type, problem.fields.join(", "), problem.message))
            .collect();
        print_sample_block("Group problems", &groups);
        if run.dispatches() {
            println!("  Dispatched fields: {}", run.dispatch.len());
        }
        if run.antispam_delay_secs > 0 {
            println!("  Antispam delay: {}s", run.antispam_delay_secs);
        }
    }

    if run.state == SubmissionState::SubmittedWithProblems {
        std::process::exit(EXIT_PROBLEMS);
    }
}

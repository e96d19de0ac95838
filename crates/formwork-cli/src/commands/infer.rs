use crate::support::{exit_input_error, print_json, read_json_file_or_exit};
use formwork_kernel::WidgetKind;
use formwork_schema::{ColumnMeta, InferOptions, infer_definition};
use std::collections::BTreeMap;

pub struct Args {
    pub columns: String,
    pub boolean_checkboxes: bool,
    pub intelligence: bool,
    pub required: Vec<String>,
    pub not_required: Vec<String>,
    pub kinds: Vec<String>,
    pub json: bool,
}

fn parse_kind_overrides(entries: &[String]) -> BTreeMap<String, WidgetKind> {
    entries
        .iter()
        .map(|entry| {
            let Some((column, kind)) = entry.split_once('=') else {
                exit_input_error(format!("--kind expects COLUMN=KIND, got `{entry}`"));
            };
            let kind = kind
                .trim()
                .parse::<WidgetKind>()
                .unwrap_or_else(|e| exit_input_error(format!("--kind {entry}: {e}")));
            (column.trim().to_string(), kind)
        })
        .collect()
}

pub fn run(args: Args) {
    let columns: Vec<ColumnMeta> = read_json_file_or_exit(&args.columns, "columns");
    let options = InferOptions {
        boolean_checkboxes: args.boolean_checkboxes,
        intelligence: args.intelligence,
        required: args.required,
        not_required: args.not_required,
        kind_overrides: parse_kind_overrides(&args.kinds),
    };
    let definition = infer_definition(&columns, &options).unwrap_or_else(|e| exit_input_error(e));

    if args.json {
        print_json(&definition);
    } else {
        println!("formwork infer {}", args.columns);
        println!("  Columns: {}", columns.len());
        println!("  Widgets: {}", definition.widgets.len());
        for spec in &definition.widgets {
            let required = if spec.required.is_required() {
                " (required)"
            } else {
                ""
            };
            let editable = if spec.editable { "" } else { " (read-only)" };
            println!("    - {} {}{required}{editable}", spec.name, spec.kind);
        }
        println!("  Form id: {}", definition.fingerprint());
    }
}

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "formwork",
    about = "Formwork: declarative form binding, validation, and output projection",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bind, validate, and project one request against a form definition
    Check {
        /// Path to the form definition JSON
        #[arg(long)]
        form: String,

        /// Path to the request tree JSON
        #[arg(long)]
        request: String,

        /// Path to a formwork TOML config
        #[arg(long)]
        config: Option<String>,

        /// Request clock (RFC 3339); defaults to local time
        #[arg(long)]
        now: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Infer a form definition from column metadata
    Infer {
        /// Path to a JSON array of columns
        #[arg(long)]
        columns: String,

        /// Map 1-digit integer columns to a single checkbox
        #[arg(long)]
        boolean_checkboxes: bool,

        /// Upgrade text widgets by column name
        #[arg(long)]
        intelligence: bool,

        /// Column that is required (repeatable; exclusive with --not-required)
        #[arg(long = "required", value_name = "COLUMN")]
        required: Vec<String>,

        /// Column that is optional even if NOT NULL (repeatable)
        #[arg(long = "not-required", value_name = "COLUMN")]
        not_required: Vec<String>,

        /// Explicit widget kind for a column (repeatable)
        #[arg(long = "kind", value_name = "COLUMN=KIND")]
        kinds: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the resolved defaults matrix
    Matrix {
        /// Path to a formwork TOML config
        #[arg(long)]
        config: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use qabench::commands::{models, presets, question_sets, questions, results, test_runs};
use qabench::config::AppConfig;
use qabench::{AppError, AppState};

#[derive(Debug, Parser)]
#[command(name = "qabench", about = "Manage question sets and grade LLM answers", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage questions
    #[command(subcommand)]
    Questions(QuestionsCmd),
    /// Manage question sets
    #[command(subcommand)]
    Sets(SetsCmd),
    /// Inspect, import and export test results
    #[command(subcommand)]
    Results(ResultsCmd),
    /// Manage API presets
    #[command(subcommand)]
    Presets(PresetsCmd),
    /// Generate and grade answers for every question of a set
    Run(RunArgs),
    /// List models offered by a provider
    Models(ModelsArgs),
}

#[derive(Debug, Subcommand)]
enum QuestionsCmd {
    List {
        #[arg(long)]
        category: Option<String>,
    },
    Show {
        id: String,
    },
    Add {
        #[arg(long)]
        text: String,
        #[arg(long)]
        expected_answer: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        text: Option<String>,
        #[arg(long)]
        expected_answer: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    Delete {
        id: String,
    },
    Import {
        path: PathBuf,
    },
    Export {
        path: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum SetsCmd {
    List,
    Show {
        id: String,
    },
    Create {
        #[arg(long)]
        name: String,
        /// Question ids, in order
        #[arg(long = "question", value_delimiter = ',')]
        questions: Vec<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// Replaces the member list when given
        #[arg(long = "question", value_delimiter = ',')]
        questions: Option<Vec<String>>,
    },
    Delete {
        id: String,
    },
    Import {
        path: PathBuf,
    },
    Export {
        path: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum ResultsCmd {
    List {
        #[arg(long)]
        set: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
    Show {
        id: String,
    },
    Delete {
        id: String,
    },
    SetNames,
    ModelNames,
    Import {
        path: PathBuf,
    },
    Export {
        path: PathBuf,
    },
}

#[derive(Debug, Args)]
struct PresetFields {
    #[arg(long)]
    name: String,
    #[arg(long)]
    provider: Option<String>,
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    temperature: Option<f64>,
    #[arg(long)]
    max_tokens: Option<i64>,
}

impl From<PresetFields> for presets::PresetInput {
    fn from(fields: PresetFields) -> Self {
        Self {
            name: fields.name,
            provider_name: fields.provider,
            endpoint: fields.endpoint,
            api_key: fields.api_key,
            model: fields.model,
            temperature: fields.temperature,
            max_tokens: fields.max_tokens,
        }
    }
}

#[derive(Debug, Subcommand)]
enum PresetsCmd {
    List,
    Show {
        name: String,
    },
    Save {
        /// Id of the preset to update
        #[arg(long)]
        id: Option<String>,
        #[command(flatten)]
        fields: PresetFields,
    },
    Delete {
        id: String,
    },
    Test {
        name: String,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Question set id
    set_id: String,
    /// Preset used to generate answers
    #[arg(long)]
    generation_preset: Option<String>,
    /// Preset used to grade answers
    #[arg(long)]
    evaluation_preset: Option<String>,
}

#[derive(Debug, Args)]
struct ModelsArgs {
    /// OpenAI, Anthropic or Custom
    #[arg(long, default_value = "OpenAI")]
    provider: String,
    #[arg(long)]
    endpoint: Option<String>,
    #[arg(long)]
    api_key: Option<String>,
    /// Take endpoint and key from this preset
    #[arg(long)]
    preset: Option<String>,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Validation(format!("failed to render output: {e}")))?;
    println!("{text}");
    Ok(())
}

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();
    qabench::init_tracing();

    let cli = Cli::parse();
    if let Err(error) = run(cli, config).await {
        eprintln!("qabench failed: {error}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<(), AppError> {
    let state = AppState::open(config)?;

    match cli.command {
        Command::Questions(cmd) => match cmd {
            QuestionsCmd::List { category } => {
                print_json(&questions::filter_by_category(&state, category.as_deref())?)
            }
            QuestionsCmd::Show { id } => print_json(&questions::get_question(&state, &id)?),
            QuestionsCmd::Add {
                text,
                expected_answer,
                category,
                id,
            } => {
                let id = questions::add_question(
                    &state,
                    &text,
                    &expected_answer,
                    category.as_deref(),
                    id.as_deref(),
                )?;
                print_json(&serde_json::json!({ "id": id }))
            }
            QuestionsCmd::Update {
                id,
                text,
                expected_answer,
                category,
            } => {
                let updated = questions::update_question(
                    &state,
                    &id,
                    text.as_deref(),
                    expected_answer.as_deref(),
                    category.as_deref(),
                )?;
                print_json(&serde_json::json!({ "updated": updated }))
            }
            QuestionsCmd::Delete { id } => {
                questions::delete_question(&state, &id)?;
                print_json(&serde_json::json!({ "deleted": id }))
            }
            QuestionsCmd::Import { path } => print_json(&questions::import_questions(&state, &path)?),
            QuestionsCmd::Export { path } => {
                let count = questions::export_questions(&state, &path)?;
                print_json(&serde_json::json!({ "exported": count }))
            }
        },
        Command::Sets(cmd) => match cmd {
            SetsCmd::List => print_json(&*question_sets::load_question_sets(&state)?),
            SetsCmd::Show { id } => print_json(&question_sets::set_question_details(&state, &id)?),
            SetsCmd::Create { name, questions } => {
                print_json(&question_sets::create_set(&state, &name, &questions)?)
            }
            SetsCmd::Update {
                id,
                name,
                questions,
            } => {
                question_sets::update_set(&state, &id, name.as_deref(), questions.as_deref())?;
                print_json(&serde_json::json!({ "updated": id }))
            }
            SetsCmd::Delete { id } => {
                question_sets::delete_set(&state, &id)?;
                print_json(&serde_json::json!({ "deleted": id }))
            }
            SetsCmd::Import { path } => {
                let outcome = question_sets::import_question_sets(&state, &path)?;
                print_json(&outcome)?;
                if outcome.success {
                    Ok(())
                } else {
                    Err(AppError::Validation("no question sets were imported".to_string()))
                }
            }
            SetsCmd::Export { path } => {
                let count = question_sets::export_question_sets(&state, &path)?;
                print_json(&serde_json::json!({ "exported": count }))
            }
        },
        Command::Results(cmd) => match cmd {
            ResultsCmd::List { set, model } => print_json(&results::filter_results(
                &state,
                set.as_deref(),
                model.as_deref(),
            )?),
            ResultsCmd::Show { id } => print_json(&results::get_result(&state, &id)?),
            ResultsCmd::Delete { id } => {
                results::delete_result(&state, &id)?;
                print_json(&serde_json::json!({ "deleted": id }))
            }
            ResultsCmd::SetNames => print_json(&results::list_set_names(&state)?),
            ResultsCmd::ModelNames => print_json(&results::list_model_names(&state)?),
            ResultsCmd::Import { path } => print_json(&results::import_results(&state, &path)?),
            ResultsCmd::Export { path } => {
                let count = results::export_results(&state, &path)?;
                print_json(&serde_json::json!({ "exported": count }))
            }
        },
        Command::Presets(cmd) => match cmd {
            PresetsCmd::List => print_json(&*presets::load_presets(&state)?),
            PresetsCmd::Show { name } => {
                let preset = presets::get_preset_by_name(&state, &name)?
                    .ok_or_else(|| AppError::NotFound(format!("preset '{name}'")))?;
                print_json(&preset)
            }
            PresetsCmd::Save { id, fields } => {
                let input = presets::PresetInput::from(fields);
                print_json(&presets::save_preset(&state, &input, id.as_deref())?)
            }
            PresetsCmd::Delete { id } => {
                let name = presets::delete_preset(&state, &id)?;
                print_json(&serde_json::json!({ "deleted": name }))
            }
            PresetsCmd::Test { name } => {
                let config = test_runs::client_config_for(&state, Some(name.as_str()))?;
                let check = presets::test_connection(&config).await;
                print_json(&check)
            }
        },
        Command::Run(args) => {
            let outcome = test_runs::run_test_with_presets(
                &state,
                &args.set_id,
                args.generation_preset.as_deref(),
                args.evaluation_preset.as_deref(),
            )
            .await?;
            print_json(&outcome)
        }
        Command::Models(args) => {
            let listed = models::list_models(
                &state,
                &args.provider,
                args.endpoint.as_deref(),
                args.api_key.as_deref(),
                args.preset.as_deref(),
            )
            .await?;
            print_json(&listed)
        }
    }
}

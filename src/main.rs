use std::io::Write;

use partstream::auth::EnvSecretStore;
use partstream::config::{load_config, ProviderConfig};
use partstream::error::BridgeError;
use partstream::host::{CancelToken, FnSink, HostMessage, HostRole, ResponsePart};
use partstream::models::ModelInfo;
use partstream::observability::init_tracing;
use partstream::provider::ChatProvider;
use partstream::request::RequestOptions;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

struct CliArgs {
    config_path: Option<String>,
    model_id: Option<String>,
    list_models: bool,
    prompt: String,
}

fn main() {
    let args = parse_args().unwrap_or_else(|message| {
        eprintln!("{message}");
        eprintln!(
            "Usage: partstream [--config <path>] [--model <id>] [--list-models] <prompt...>"
        );
        std::process::exit(2);
    });

    let config = load_cli_config(args.config_path.as_deref());
    init_tracing(&config.features.log_level);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap_or_else(|err| {
            eprintln!("Failed to initialize Tokio runtime: {err}");
            std::process::exit(1);
        });

    if let Err(err) = runtime.block_on(run(config, args)) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn parse_args() -> Result<CliArgs, String> {
    let mut config_path = None;
    let mut model_id = None;
    let mut list_models = false;
    let mut prompt_words: Vec<String> = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path = Some(args.next().ok_or("--config requires a path")?);
            }
            "--model" => {
                model_id = Some(args.next().ok_or("--model requires a model id")?);
            }
            "--list-models" => list_models = true,
            other => prompt_words.push(other.to_string()),
        }
    }

    let prompt = prompt_words.join(" ");
    if prompt.is_empty() && !list_models {
        return Err("a prompt is required".to_string());
    }
    Ok(CliArgs {
        config_path,
        model_id,
        list_models,
        prompt,
    })
}

fn load_cli_config(path: Option<&str>) -> ProviderConfig {
    match path {
        Some(path) => load_config(path).unwrap_or_else(|err| {
            eprintln!("Failed to load configuration from {path}: {err}");
            std::process::exit(1);
        }),
        None => match load_config(DEFAULT_CONFIG_PATH) {
            Ok(config) => config,
            Err(err) => {
                if std::path::Path::new(DEFAULT_CONFIG_PATH).exists() {
                    eprintln!("Failed to load configuration: {err}");
                    std::process::exit(1);
                }
                ProviderConfig::default()
            }
        },
    }
}

async fn run(config: ProviderConfig, args: CliArgs) -> Result<(), BridgeError> {
    let secrets = EnvSecretStore::new(&config.api.api_key_env);
    let provider = ChatProvider::new(config)?;

    let models = provider.list_models(&secrets).await?;
    if args.list_models {
        for model in &models {
            println!(
                "{}\tcontext={}\toutput={}\ttools={}\tthinking={}",
                model.id,
                model.max_input_tokens,
                model.max_output_tokens,
                model.capabilities.tool_calling,
                model.capabilities.supports_thinking,
            );
        }
        if args.prompt.is_empty() {
            return Ok(());
        }
    }

    let model = select_model(&models, args.model_id.as_deref())?;
    tracing::info!(model = %model.id, "sending chat request");

    let messages = vec![HostMessage::text(HostRole::User, args.prompt.clone())];
    let options = RequestOptions::default();
    let cancel = CancelToken::new();

    let mut sink = FnSink(|part: ResponsePart| match part {
        ResponsePart::Text(text) => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        ResponsePart::Thinking { text, .. } => {
            eprint!("{text}");
            let _ = std::io::stderr().flush();
        }
        ResponsePart::ToolCall {
            id,
            name,
            arguments,
        } => {
            let args_json = serde_json::Value::Object(arguments).to_string();
            println!("\n[tool call {id}] {name} {args_json}");
        }
    });

    provider
        .stream_response(&model, &messages, &options, &secrets, &mut sink, &cancel)
        .await?;
    println!();
    Ok(())
}

fn select_model(models: &[ModelInfo], requested: Option<&str>) -> Result<ModelInfo, BridgeError> {
    match requested {
        Some(id) => models
            .iter()
            .find(|model| model.id == id)
            .cloned()
            .ok_or_else(|| BridgeError::InvalidRequest(format!("unknown model '{id}'"))),
        None => models
            .first()
            .cloned()
            .ok_or_else(|| BridgeError::InvalidRequest("no models available".to_string())),
    }
}

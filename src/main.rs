use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kubeassist::cli::commands::run::{RunOptions, request_from_words};
use kubeassist::config::{
    ClusterOverrides, CompletionApi, ConfigOverrides, GroundingMode, LlmOverrides,
    SchemaOverrides, SessionOverrides, parse_model_map,
};
use kubeassist::session::LoopOutcome;
use kubeassist::{AssistError, Output};

#[derive(Parser)]
#[command(name = "kubectl-assist")]
#[command(
    version,
    about = "Generate Kubernetes manifests from natural language and apply them after confirmation",
    args_conflicts_with_subcommands = true,
    after_help = "A request whose first word is a subcommand name must follow `--`:\n  \
                  kubectl-assist -- config map named app-settings"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// What to create or change, in plain words (put it after `--` when it starts with "config")
    #[arg(value_name = "REQUEST")]
    request: Vec<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, help = "API key for the completion endpoint")]
    openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_ENDPOINT", help = "Completion endpoint base URL")]
    openai_endpoint: Option<String>,

    #[arg(long, env = "OPENAI_DEPLOYMENT_NAME", help = "Model or deployment name")]
    openai_deployment_name: Option<String>,

    #[arg(
        long,
        env = "AZURE_OPENAI_MAP",
        value_parser = parse_model_map,
        help = "Model to deployment mapping, e.g. gpt-4=my-gpt4,gpt-35-turbo=my-35"
    )]
    azure_openai_map: Option<BTreeMap<String, String>>,

    #[arg(long, env = "TEMPERATURE", help = "Sampling temperature")]
    temperature: Option<f32>,

    #[arg(
        long,
        env = "REQUIRE_CONFIRMATION",
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Ask before applying (default: true)"
    )]
    require_confirmation: Option<bool>,

    #[arg(
        long,
        env = "DEBUG",
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Verbose diagnostics on stderr"
    )]
    debug: Option<bool>,

    #[arg(long, help = "Print the generated manifest and exit without applying")]
    raw: bool,

    #[arg(long, env = "K8S_OPENAPI_URL", help = "Fetch the OpenAPI document from this URL instead of the cluster")]
    k8s_openapi_url: Option<String>,

    #[arg(long, help = "Schema grounding: off, best-effort, required")]
    schema_grounding: Option<GroundingMode>,

    #[arg(long, help = "Completion route: auto, chat, completion")]
    completion_api: Option<CompletionApi>,

    #[arg(long, help = "Maximum number of reprompts per session")]
    max_reprompts: Option<u32>,

    #[arg(long, help = "Path to the kubeconfig file (default: $KUBECONFIG or ~/.kube/config)")]
    kubeconfig: Option<PathBuf>,

    #[arg(long, help = "Kubeconfig context to use")]
    context: Option<String>,

    #[arg(long, short, help = "Namespace for namespaced objects without one")]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(
            short = 'f',
            long,
            default_value = "toml",
            help = "Output format: toml, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Write the default global config file
    Init {
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            llm: LlmOverrides {
                model: self.openai_deployment_name.clone(),
                endpoint: self.openai_endpoint.clone(),
                api_key: self.openai_api_key.clone(),
                model_map: self.azure_openai_map.clone(),
                temperature: self.temperature,
                completion_api: self.completion_api,
            },
            schema: SchemaOverrides {
                url: self.k8s_openapi_url.clone(),
                grounding: self.schema_grounding,
            },
            cluster: ClusterOverrides {
                kubeconfig: self.kubeconfig.clone(),
                context: self.context.clone(),
                namespace: self.namespace.clone(),
            },
            session: SessionOverrides {
                raw: self.raw.then_some(true),
                require_confirmation: self.require_confirmation,
                debug: self.debug,
                max_reprompts: self.max_reprompts,
            },
        }
    }
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mkubectl-assist encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Backtrace when RUST_BACKTRACE=1
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(code) => code,
        Err(e) => {
            Output::new().error(&e.to_string());
            match e.downcast_ref::<AssistError>() {
                Some(err) => ExitCode::from(err.exit_code()),
                None => ExitCode::FAILURE,
            }
        }
    }
}

fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.debug.unwrap_or(false) {
        "kubeassist=debug,info"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let overrides = cli.overrides();

    match cli.command {
        Some(Commands::Config { action }) => {
            match action {
                ConfigAction::Show { format } => {
                    kubeassist::cli::commands::config::show(&format, &overrides)?;
                }
                ConfigAction::Path => {
                    kubeassist::cli::commands::config::path()?;
                }
                ConfigAction::Init { force } => {
                    kubeassist::cli::commands::config::init(force)?;
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        None => {
            let request = request_from_words(&cli.request)?;

            let rt = Runtime::new()?;
            let outcome = rt.block_on(kubeassist::cli::commands::run::run(RunOptions {
                request,
                overrides,
            }));
            // A decision prompt may still be blocked on stdin after an interrupt
            rt.shutdown_background();

            match outcome? {
                LoopOutcome::Applied(_) | LoopOutcome::Declined => Ok(ExitCode::SUCCESS),
                LoopOutcome::Failed(e) => {
                    Output::new().error(&e.to_string());
                    Ok(ExitCode::from(e.exit_code()))
                }
            }
        }
    }
}

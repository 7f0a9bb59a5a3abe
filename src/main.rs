use clap::{Args, Parser, Subcommand};
use pangea::commands::CommandKind;
use pangea::config::{CONFIG_ENV_VAR, NAMESPACE_ENV_VAR};
use pangea::core::application::{Application, Invocation};
use pangea::shared::logging;
use std::path::PathBuf;

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "pangea",
    about = "Compile infrastructure templates to Terraform JSON and drive tofu/terraform.",
    version = APP_VERSION,
    disable_version_flag(true)
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long, short = 'V', help = "Print version")]
    pub version: bool,
}

#[derive(Args, Clone)]
pub struct TemplateArgs {
    #[arg(value_name = "FILE", help = "Template file (.yml, .yaml or .json)")]
    pub file: PathBuf,

    #[arg(long, short = 'n', env = NAMESPACE_ENV_VAR, help = "Namespace from pangea.yml")]
    pub namespace: Option<String>,

    #[arg(long, short = 't', help = "Only process this template")]
    pub template: Option<String>,

    #[arg(long, short = 'c', value_name = "PATH", env = CONFIG_ENV_VAR, help = "Path to pangea.yml")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Emit JSON instead of text")]
    pub json: bool,

    #[arg(long, help = "Verbose logging and full error causes")]
    pub debug: bool,

    #[arg(long, help = "Let terraform prompt before apply/destroy")]
    pub no_auto_approve: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Compile templates and run terraform plan")]
    Plan(TemplateArgs),

    #[command(about = "Compile templates and run terraform apply")]
    Apply(TemplateArgs),

    #[command(about = "Run terraform destroy for the templates")]
    Destroy(TemplateArgs),

    #[command(about = "Compile templates and show their resources")]
    Inspect(TemplateArgs),

    #[command(about = "Machine-readable JSON description of the templates")]
    Agent(TemplateArgs),
}

impl Commands {
    fn into_invocation(self) -> Invocation {
        let (command, args) = match self {
            Commands::Plan(args) => (CommandKind::Plan, args),
            Commands::Apply(args) => (CommandKind::Apply, args),
            Commands::Destroy(args) => (CommandKind::Destroy, args),
            Commands::Inspect(args) => (CommandKind::Inspect, args),
            Commands::Agent(args) => (CommandKind::Agent, args),
        };
        Invocation {
            command,
            file: args.file,
            config: args.config,
            namespace: args.namespace,
            template: args.template,
            json: args.json || command == CommandKind::Agent,
            debug: args.debug,
            auto_approve: !args.no_auto_approve,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", APP_VERSION);
        std::process::exit(0);
    }

    match cli.command {
        Some(command) => {
            let invocation = command.into_invocation();
            logging::init(invocation.debug);
            let code = Application::run(invocation).await;
            std::process::exit(code);
        }
        None => {
            println!("No command specified. Use --help for usage information.");
            std::process::exit(1);
        }
    }
}

mod commands;
mod context;
mod prompt;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "valk")]
#[command(version)]
#[command(about = "Provision and operate serverless web apps on AWS Lambda", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new project and provision its environments
    Create {
        /// Project name (defaults to the current directory name)
        #[arg(short, long)]
        name: Option<String>,
        /// AWS region to provision into
        #[arg(short, long)]
        region: Option<String>,
        /// Environment to create (repeatable; default: staging and production)
        #[arg(short, long = "env")]
        envs: Vec<String>,
        /// Lambda handler in file.export notation
        #[arg(long)]
        handler: Option<String>,
        /// Lambda memory size in MB
        #[arg(long)]
        memory: Option<u32>,
        /// Lambda timeout in seconds
        #[arg(long)]
        timeout: Option<u32>,
        /// Lambda runtime identifier
        #[arg(long)]
        runtime: Option<String>,
        /// Function description
        #[arg(long)]
        description: Option<String>,
        /// Credential profile from ~/.valkconfig
        #[arg(short, long, env = "VALKYRIE_PROFILE")]
        profile: Option<String>,
        /// Accept defaults instead of prompting
        #[arg(short, long)]
        yes: bool,
        /// Keep partially provisioned resources on failure
        #[arg(long)]
        no_rollback: bool,
    },
    /// Add an environment to an existing project
    CreateEnv {
        /// Environment name
        name: Option<String>,
        /// Display color for the environment name
        #[arg(long)]
        color: Option<String>,
        /// Require confirmation before updates of this environment
        #[arg(long)]
        confirm: bool,
        /// Credential profile from ~/.valkconfig
        #[arg(short, long, env = "VALKYRIE_PROFILE")]
        profile: Option<String>,
        /// Accept defaults instead of prompting
        #[arg(short, long)]
        yes: bool,
        /// Keep partially provisioned resources on failure
        #[arg(long)]
        no_rollback: bool,
    },
    /// Tear down environments and their remote resources
    Delete {
        /// Delete only this environment
        #[arg(short, long)]
        env: Option<String>,
        /// Credential profile from ~/.valkconfig
        #[arg(short, long, env = "VALKYRIE_PROFILE")]
        profile: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Push code and/or configuration of an environment
    Update {
        /// Push only the code bundle
        #[arg(long)]
        code: bool,
        /// Push only the function configuration
        #[arg(long)]
        config: bool,
        /// Environment to update
        #[arg(short, long)]
        env: Option<String>,
        /// Credential profile from ~/.valkconfig
        #[arg(short, long, env = "VALKYRIE_PROFILE")]
        profile: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Manage AWS credential profiles in ~/.valkconfig
    Configure {
        /// Open the global configuration in $EDITOR
        #[arg(short, long)]
        edit: bool,
        /// Set the default profile
        #[arg(long = "default", value_name = "NAME")]
        default_profile: Option<String>,
        /// List configured profiles
        #[arg(long)]
        profiles: bool,
        /// Remove the global configuration file
        #[arg(long)]
        purge: bool,
    },
    /// List, create, encrypt, or delete function environment variables
    Variables {
        /// Create or overwrite a variable
        #[arg(long)]
        create: bool,
        /// Encrypt variables with a project KMS key
        #[arg(long)]
        encrypt: bool,
        /// Delete variables
        #[arg(long)]
        delete: bool,
        /// Environment to operate on
        #[arg(short, long)]
        env: Option<String>,
        /// Credential profile from ~/.valkconfig
        #[arg(short, long, env = "VALKYRIE_PROFILE")]
        profile: Option<String>,
    },
    /// Show the project and its environment URLs
    Info,
    /// Fetch recent CloudWatch logs of an environment
    Logs {
        /// Log stream name (latest stream by default)
        #[arg(short, long)]
        stream: Option<String>,
        /// Environment to read logs from
        #[arg(short, long)]
        env: Option<String>,
        /// Credential profile from ~/.valkconfig
        #[arg(short, long, env = "VALKYRIE_PROFILE")]
        profile: Option<String>,
    },
    /// Serve the project locally, emulating the gateway
    Local {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
        /// Environment whose settings the server uses
        #[arg(short, long)]
        env: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt::init();

    match cli.command {
        Commands::Create {
            name,
            region,
            envs,
            handler,
            memory,
            timeout,
            runtime,
            description,
            profile,
            yes,
            no_rollback,
        } => {
            commands::create::handle(commands::create::CreateOptions {
                name,
                region,
                envs,
                handler,
                memory,
                timeout,
                runtime,
                description,
                profile,
                yes,
                no_rollback,
            })
            .await?;
        }
        Commands::CreateEnv {
            name,
            color,
            confirm,
            profile,
            yes,
            no_rollback,
        } => {
            commands::create_env::handle(name, color, confirm, profile.as_deref(), yes, no_rollback)
                .await?;
        }
        Commands::Delete { env, profile, yes } => {
            commands::delete::handle(env, profile.as_deref(), yes).await?;
        }
        Commands::Update {
            code,
            config,
            env,
            profile,
            yes,
        } => {
            commands::update::handle(code, config, env, profile.as_deref(), yes).await?;
        }
        Commands::Configure {
            edit,
            default_profile,
            profiles,
            purge,
        } => {
            commands::configure::handle(edit, default_profile, profiles, purge).await?;
        }
        Commands::Variables {
            create,
            encrypt,
            delete,
            env,
            profile,
        } => {
            commands::variables::handle(create, encrypt, delete, env, profile.as_deref()).await?;
        }
        Commands::Info => {
            commands::info::handle().await?;
        }
        Commands::Logs {
            stream,
            env,
            profile,
        } => {
            commands::logs::handle(stream, env, profile.as_deref()).await?;
        }
        Commands::Local { port, env } => {
            commands::local::handle(port, env).await?;
        }
    }

    Ok(())
}

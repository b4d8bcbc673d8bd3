use canopy::authz::{Canopy, RoleTopology};
use canopy::{settings, storage};
use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "canopy", version, about = "Nested-set access control administration")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Override the configured role topology
    #[arg(long)]
    topology: Option<RoleTopology>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply or drop the schema
    Migrate {
        #[command(subcommand)]
        direction: Direction,
    },
    /// Delete every resource, role, action, tag and rule
    Purge {
        /// Confirm the purge
        #[arg(long)]
        yes: bool,
    },
    #[command(subcommand)]
    Resource(ResourceCommand),
    #[command(subcommand)]
    Role(RoleCommand),
    #[command(subcommand)]
    Action(ActionCommand),
    #[command(subcommand)]
    Tag(TagCommand),
    /// Attach tags to a role
    TagRole { role: String, tags: Vec<String> },
    /// Detach tags from a role
    UntagRole { role: String, tags: Vec<String> },
    /// Record an allow (or, with --deny, a deny) rule
    Enforce {
        #[command(flatten)]
        rule: RuleArgs,
        #[arg(long)]
        deny: bool,
    },
    /// Delete a rule
    Lift {
        #[command(flatten)]
        rule: RuleArgs,
    },
    /// Decide whether the given roles may perform an action on a resource
    Check {
        action: String,
        resource: String,
        #[arg(long = "role", required = true)]
        roles: Vec<String>,
    },
    /// List every rule affecting a resource
    Controls { resource: String },
}

#[derive(Subcommand, Debug)]
enum Direction {
    Up,
    Down,
}

#[derive(Subcommand, Debug)]
enum ResourceCommand {
    Add {
        alias: String,
        #[arg(long, default_value = "root")]
        parent: String,
        #[arg(long)]
        description: Option<String>,
    },
    Remove {
        alias: String,
    },
    Edit {
        alias: String,
        description: String,
    },
    /// Print the subtree below a resource
    Tree {
        #[arg(default_value = "root")]
        alias: String,
        /// Skip nodes (and their subtrees) whose alias starts with this prefix
        #[arg(long = "exclude")]
        exclude: Vec<String>,
    },
    /// Print the ancestors of a resource, root first
    Path {
        alias: String,
        #[arg(long)]
        exclusive: bool,
    },
}

#[derive(Subcommand, Debug)]
enum RoleCommand {
    Add {
        alias: String,
        /// Parent role (hierarchical) or tags to attach (flat-with-tags)
        #[arg(long = "related")]
        related: Vec<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Remove {
        alias: String,
    },
}

#[derive(Subcommand, Debug)]
enum ActionCommand {
    Add {
        alias: String,
        #[arg(long)]
        description: Option<String>,
    },
    Remove {
        alias: String,
    },
}

#[derive(Subcommand, Debug)]
enum TagCommand {
    Add { name: String },
    Remove { name: String },
}

#[derive(Args, Debug)]
struct RuleArgs {
    action: String,
    resource: String,
    #[arg(long, required_unless_present = "tag", conflicts_with = "tag")]
    role: Option<String>,
    #[arg(long)]
    tag: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");
    let topology = cli.topology.unwrap_or(settings.authz.topology);

    let db = storage::init(&settings.database).await?;

    if let Command::Migrate { direction } = &cli.command {
        let canopy = Canopy::new(db, topology);
        match direction {
            Direction::Up => {
                canopy.migrate_up().await?;
                canopy.prepare_trees().await?;
            }
            Direction::Down => canopy.migrate_down().await?,
        }
        return Ok(());
    }

    let canopy = Canopy::open(db, topology).await?;
    run(&canopy, cli.command).await
}

async fn run(canopy: &Canopy, command: Command) -> Result<()> {
    match command {
        Command::Migrate { .. } => {}
        Command::Purge { yes } => {
            if !yes {
                miette::bail!("Refusing to purge without --yes");
            }
            canopy.purge().await?;
        }
        Command::Resource(cmd) => resource(canopy, cmd).await?,
        Command::Role(RoleCommand::Add {
            alias,
            related,
            description,
        }) => {
            if !canopy.add_role(&alias, &related, description).await? {
                let parent = related.first().map(String::as_str).unwrap_or("root");
                miette::bail!("Parent role `{parent}` not found");
            }
        }
        Command::Role(RoleCommand::Remove { alias }) => canopy.remove_role(&alias).await?,
        Command::Action(ActionCommand::Add { alias, description }) => {
            canopy.add_action(&alias, description).await?
        }
        Command::Action(ActionCommand::Remove { alias }) => canopy.remove_action(&alias).await?,
        Command::Tag(TagCommand::Add { name }) => canopy.add_tag(&name).await?,
        Command::Tag(TagCommand::Remove { name }) => canopy.remove_tag(&name).await?,
        Command::TagRole { role, tags } => print_json(&canopy.tag_role(&role, &tags).await?)?,
        Command::UntagRole { role, tags } => {
            let removed = canopy.untag_role(&role, &tags).await?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
        Command::Enforce { rule, deny } => match (&rule.role, &rule.tag) {
            (Some(role), _) => {
                canopy
                    .enforce(!deny, &rule.action, role, &rule.resource)
                    .await?
            }
            (None, Some(tag)) => {
                canopy
                    .enforce_tag(!deny, &rule.action, tag, &rule.resource)
                    .await?
            }
            (None, None) => miette::bail!("Either --role or --tag is required"),
        },
        Command::Lift { rule } => {
            let removed = match (&rule.role, &rule.tag) {
                (Some(role), _) => canopy.lift(&rule.action, role, &rule.resource).await?,
                (None, Some(tag)) => canopy.lift_tag(&rule.action, tag, &rule.resource).await?,
                (None, None) => miette::bail!("Either --role or --tag is required"),
            };
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
        Command::Check {
            action,
            resource,
            roles,
        } => print_json(&canopy.explain(roles.as_slice(), &action, &resource).await?)?,
        Command::Controls { resource } => print_json(&canopy.controls(&resource).await?)?,
    }
    Ok(())
}

async fn resource(canopy: &Canopy, cmd: ResourceCommand) -> Result<()> {
    match cmd {
        ResourceCommand::Add {
            alias,
            parent,
            description,
        } => {
            if !canopy.add_resource(&alias, &parent, description).await? {
                miette::bail!("Parent resource `{parent}` not found");
            }
        }
        ResourceCommand::Remove { alias } => {
            let removed = canopy.remove_resource(&alias).await?;
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
        ResourceCommand::Edit { alias, description } => {
            canopy.edit_resource(&alias, &description).await?
        }
        ResourceCommand::Tree { alias, exclude } => {
            print_json(&canopy.resource_tree(&alias, &exclude).await?)?
        }
        ResourceCommand::Path { alias, exclusive } => {
            print_json(&canopy.resource_path(&alias, !exclusive).await?)?
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{out}");
    Ok(())
}

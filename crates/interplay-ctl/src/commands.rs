use interplay::{
    command::CommandEdit,
    host::{InteractionEvent, ParserTable, INTERACTION_CREATE},
    InteractionState, SlashCommand, SlashOption,
};
use serde_json::Value;
use serenity::model::id::{CommandId, GuildId};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::prelude::*;

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Print the resolved application ID
    AppId,

    /// List registered commands
    List {
        /// Only list commands scoped to this guild
        #[arg(long)]
        guild: Option<NonZeroU64>,

        /// Query the API rather than the local store
        #[arg(long)]
        remote: bool,
    },

    /// Register every command in a JSON file
    Register {
        /// A JSON array of command definitions
        file: PathBuf,

        /// Register the commands in this guild only
        #[arg(long)]
        guild: Option<NonZeroU64>,
    },

    /// Update a registered command
    Edit {
        /// The command ID
        id: NonZeroU64,

        /// The new command name
        #[arg(long)]
        name: Option<String>,

        /// The new command description
        #[arg(long)]
        description: Option<String>,

        /// A JSON file containing the new option list
        #[arg(long)]
        options: Option<PathBuf>,
    },

    /// Delete a registered command
    Delete {
        /// The command ID
        id: NonZeroU64,
    },

    /// Replace every command in a scope with the commands in a JSON file
    Sync {
        /// A JSON array of command definitions
        file: PathBuf,

        /// Replace this guild's commands rather than the global ones
        #[arg(long)]
        guild: Option<NonZeroU64>,
    },

    /// Feed recorded interaction payloads through the dispatcher and print
    /// the resulting events
    Replay {
        /// A file with one raw interaction payload per line
        file: PathBuf,
    },
}

fn guild_id(guild: Option<NonZeroU64>) -> Option<GuildId> { guild.map(|g| GuildId::new(g.get())) }

async fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Error reading {path:?}"))?;

    serde_json::from_slice(&bytes).with_context(|| format!("Error parsing {path:?}"))
}

fn print_command(cmd: &SlashCommand) -> Result {
    let scope = cmd
        .guild_id()
        .map_or_else(|| "global".to_owned(), |g| format!("guild {g}"));
    let id = cmd.id().map_or_else(|| "-".to_owned(), |i| i.to_string());

    println!("{id}\t{cmd}\t({scope})\t{}", cmd.description());

    for opt in cmd.get_options() {
        println!(
            "\t{}",
            serde_json::to_string(opt).context("Error formatting option")?
        );
    }

    Ok(())
}

pub async fn run(
    state: &Arc<InteractionState>,
    command: Command,
    events: UnboundedReceiver<InteractionEvent>,
) -> Result {
    match command {
        Command::AppId => println!("{}", state.application_id()),
        Command::List { guild, remote } => list(state, guild_id(guild), remote).await?,
        Command::Register { file, guild } => {
            let cmds: Vec<SlashCommand> = read_json(&file).await?;
            let guild = guild_id(guild);

            for cmd in cmds {
                let cmd = match guild {
                    Some(g) => cmd.guild(g),
                    None => cmd,
                };
                let name = cmd.name().to_owned();

                let registered = state
                    .register(cmd)
                    .await
                    .with_context(|| format!("Error registering {name:?}"))?;
                info!(id = ?registered.id(), %name, "Registered command");
                print_command(&registered)?;
            }
        },
        Command::Edit {
            id,
            name,
            description,
            options,
        } => {
            let options = match options {
                Some(path) => Some(read_json::<Vec<SlashOption>>(&path).await?),
                None => None,
            };
            let edit = CommandEdit {
                name,
                description,
                options,
            };
            ensure!(!edit.is_empty(), "Nothing to edit");

            let cmd = state
                .edit(CommandId::new(id.get()), edit)
                .await
                .context("Error editing command")?;
            print_command(&cmd)?;
        },
        Command::Delete { id } => {
            let id = CommandId::new(id.get());
            state
                .delete(id)
                .await
                .with_context(|| format!("Error deleting command {id}"))?;
            info!(%id, "Deleted command");
        },
        Command::Sync { file, guild } => {
            let cmds: Vec<SlashCommand> = read_json(&file).await?;
            let out = state
                .replace_commands(guild_id(guild), &cmds)
                .await
                .context("Error replacing commands")?;

            info!(count = out.len(), "Commands synced");
            for cmd in out {
                print_command(&cmd)?;
            }
        },
        Command::Replay { file } => replay(state, &file, events).await?,
    }

    Ok(())
}

async fn list(state: &InteractionState, guild: Option<GuildId>, remote: bool) -> Result {
    let mut cmds = if remote {
        state
            .fetch_commands(guild)
            .await
            .context("Error fetching commands")?
    } else {
        state
            .commands()
            .into_iter()
            .filter(|c| guild.map_or(true, |g| c.guild_id() == Some(g)))
            .map(|c| SlashCommand::clone(&c))
            .collect()
    };

    cmds.sort_by(|a, b| a.name().cmp(b.name()));

    if cmds.is_empty() {
        warn!("No commands found");
    }

    for cmd in &cmds {
        print_command(cmd)?;
    }

    Ok(())
}

async fn replay(
    state: &Arc<InteractionState>,
    path: &PathBuf,
    mut events: UnboundedReceiver<InteractionEvent>,
) -> Result {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Error reading {path:?}"))?;

    let table = ParserTable::default();
    state
        .attach(&table)
        .context("Error attaching interaction parser")?;

    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let payload: Value = serde_json::from_str(line)
            .with_context(|| format!("Invalid JSON on line {}", i + 1))?;
        table.deliver(INTERACTION_CREATE, payload);

        while let Ok(event) = events.try_recv() {
            match event {
                InteractionEvent::Slash(cmd) => {
                    println!("{}\t{}\t{}", event_name(&cmd), cmd.author(), cmd.content());
                },
                InteractionEvent::Button(btn) => {
                    println!("button_interaction\t{}\t{}", btn.author(), btn.custom_id());
                },
            }
        }
    }

    state.detach(&table);
    Ok(())
}

fn event_name(cmd: &interplay::InteractionCommand) -> String {
    let known = cmd.command();
    if known.is_known() {
        "slash_interaction".into()
    } else {
        format!("slash_interaction ({known})")
    }
}

//! Chat commands.
//!
//! A chat line starting with the command prefix never reaches other
//! participants. Its first word picks a [`Command`], the rest are handed to
//! the handler as arguments, and whatever the handler answers goes back to
//! the sender alone.

use crate::network::Packet;
use crate::player::PlayerHandle;

/// Runs a command for `player`. Returns the reply line, or `None` when the
/// arguments didn't make sense, in which case the usage line is sent instead.
pub type Handler<C> = fn(&mut C, &PlayerHandle, &[&str]) -> Option<String>;

pub struct Command<C> {
    pub trigger: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    pub handler: Handler<C>,
}

pub struct CommandFramework<C> {
    prefix: String,
    commands: Vec<Command<C>>,
}

impl<C> CommandFramework<C> {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), commands: vec![] }
    }
    /// Registers `command`, replacing any command with the same trigger.
    pub fn add_command(&mut self, command: Command<C>) {
        self.commands.retain(|c| c.trigger != command.trigger);
        self.commands.push(command);
    }
    pub fn commands(&self) -> impl Iterator<Item = &Command<C>> {
        self.commands.iter()
    }
    pub fn is_command(&self, message: &str) -> bool {
        !self.prefix.is_empty() && message.starts_with(&self.prefix)
    }

    /// Runs `message` if it is a command. Returns false for ordinary chat.
    pub fn process(&self, ctx: &mut C, player: &PlayerHandle, message: &str) -> bool {
        if !self.is_command(message) {
            return false;
        }
        let line = &message[self.prefix.len()..];
        let mut words = line.split_whitespace();
        let trigger = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();
        let reply = match self.commands.iter().find(|c| c.trigger == trigger) {
            Some(command) => {
                log::debug!("{} ran {}{trigger} {args:?}", player.name(), self.prefix);
                (command.handler)(ctx, player, &args).unwrap_or_else(|| format!("Usage: {}", command.usage))
            }
            None => format!("Unknown command {:?}. Try {}help", trigger, self.prefix),
        };
        player.deliver(Packet::chat(reply).to_bytes());
        true
    }
}

pub mod builtin {
    //! Commands every server starts with.

    use super::{Command, CommandFramework};
    use crate::game::Game;
    use crate::network::Packet;
    use crate::player::PlayerHandle;
    use crate::types::{ItemId, ItemStack};

    pub fn register(commands: &mut CommandFramework<Game>) {
        commands.add_command(Command {
            trigger: "help",
            description: "Lists the available commands",
            usage: "help",
            handler: help,
        });
        commands.add_command(Command {
            trigger: "list",
            description: "Lists who is online",
            usage: "list",
            handler: list,
        });
        commands.add_command(Command {
            trigger: "spawn",
            description: "Teleports you back to spawn",
            usage: "spawn",
            handler: spawn,
        });
        commands.add_command(Command {
            trigger: "give",
            description: "Gives you some items",
            usage: "give <item id> [count]",
            handler: give,
        });
    }

    fn help(game: &mut Game, _: &PlayerHandle, _: &[&str]) -> Option<String> {
        let lines: Vec<String> = game
            .commands()
            .commands()
            .map(|c| format!("{}: {}", c.usage, c.description))
            .collect();
        Some(lines.join(", "))
    }

    fn list(game: &mut Game, _: &PlayerHandle, _: &[&str]) -> Option<String> {
        Some(format!("Online: {}", game.player_names().join(", ")))
    }

    fn spawn(game: &mut Game, player: &PlayerHandle, _: &[&str]) -> Option<String> {
        let spawn = game.services().config.spawn;
        game.teleport(player, spawn);
        Some("Teleported to spawn".to_owned())
    }

    fn give(game: &mut Game, player: &PlayerHandle, args: &[&str]) -> Option<String> {
        let (id, count) = match args {
            [id] => (id.parse::<ItemId>().ok()?, 1),
            [id, count] => (id.parse::<ItemId>().ok()?, count.parse::<i8>().ok()?),
            _ => return None,
        };
        let registry = game.services().registry.clone();
        let Some(item_type) = registry.items.get(id) else {
            return Some(format!("Unknown item {id}"));
        };
        if count < 1 {
            return None;
        }
        let name = item_type.name.clone();
        let stack = ItemStack::new(id, count.min(item_type.max_stack));
        player.deliver_task(move |state| {
            if let Some(rest) = state.inventory.add(stack, &registry) {
                log::debug!("no room for {} of item {}", rest.count, rest.id);
            }
            let (window_id, items) = (state.window.id(), state.window.items(&state.inventory));
            state.send(&Packet::WindowItems { window_id, items });
        });
        Some(format!("Giving {} {name}", stack.count))
    }
}

//! Console input parsing: `/command args` lines and plain message text.

use crate::domain::events::{AppEvent, ShellCommand};

pub const HELP_LINES: &[&str] = &[
    "/channels                 list channels",
    "/filter <text>            filter channels by name or description",
    "/open <name|id>           open a channel",
    "/reply <n>                reply to message n with the next send",
    "/cancel                   drop staged reply, edit and forward",
    "/edit <n> <text>          edit your message n",
    "/delete <n> [all]         delete message n for you, or for everyone",
    "/react <n> <emoji>        toggle a reaction on message n",
    "/select <n>               toggle message n in the selection",
    "/forward [n] <a,b,...>    forward message n, or the selection, to channels",
    "/search <text>            search your channels",
    "/typing                   tell the channel you are typing",
    "/help                     show this list",
    "/quit                     leave",
    "<text>                    send to the open channel",
];

/// Blank lines produce no event.
pub fn parse_line(line: &str) -> Option<AppEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Some(AppEvent::Command(ShellCommand::Send(line.to_owned())));
    };

    let (name, args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };

    let command = match name {
        "quit" | "q" | "exit" => return Some(AppEvent::QuitRequested),
        "channels" | "ls" => ShellCommand::ListChannels,
        "filter" => ShellCommand::Filter(args.to_owned()),
        "open" | "o" if !args.is_empty() => ShellCommand::Open(args.to_owned()),
        "reply" | "r" => match parse_position(args) {
            Some(position) => ShellCommand::Reply(position),
            None => ShellCommand::Unknown(line.to_owned()),
        },
        "cancel" => ShellCommand::CancelReply,
        "edit" | "e" => match split_position(args) {
            Some((position, content)) => ShellCommand::Edit {
                position,
                content: content.to_owned(),
            },
            None => ShellCommand::Unknown(line.to_owned()),
        },
        "delete" | "d" => match split_position(args) {
            Some((position, scope)) => ShellCommand::Delete {
                position,
                for_everyone: scope.eq_ignore_ascii_case("all"),
            },
            None => ShellCommand::Unknown(line.to_owned()),
        },
        "react" => match split_position(args) {
            Some((position, emoji)) if !emoji.is_empty() => ShellCommand::React {
                position,
                emoji: emoji.to_owned(),
            },
            _ => ShellCommand::Unknown(line.to_owned()),
        },
        "select" | "sel" => match parse_position(args) {
            Some(position) => ShellCommand::Select(position),
            None => ShellCommand::Unknown(line.to_owned()),
        },
        "forward" | "fw" => {
            let (position, targets) = match split_position(args) {
                Some((position, targets)) => (Some(position), targets),
                None => (None, args),
            };
            ShellCommand::Forward {
                position,
                targets: split_targets(targets),
            }
        }
        "search" | "s" => ShellCommand::Search(args.to_owned()),
        "typing" => ShellCommand::Typing,
        "help" | "h" | "?" => ShellCommand::Help,
        _ => ShellCommand::Unknown(line.to_owned()),
    };

    Some(AppEvent::Command(command))
}

fn parse_position(value: &str) -> Option<usize> {
    value.trim().parse().ok()
}

fn split_targets(targets: &str) -> Vec<String> {
    targets
        .split(',')
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(str::to_owned)
        .collect()
}

fn split_position(args: &str) -> Option<(usize, &str)> {
    let (position, rest) = match args.split_once(char::is_whitespace) {
        Some((position, rest)) => (position, rest.trim()),
        None => (args, ""),
    };
    parse_position(position).map(|position| (position, rest))
}

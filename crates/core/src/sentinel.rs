// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sentinel commands reserved by the controller/worker runtime (spec §3, §6).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Signals a remote handle can forward to its worker via
/// `REMOTE_KILL_<signal>` sentinels (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    Sigint,
    Sigterm,
    Sighup,
    Sigkill,
    Sigbreak,
    Sigstop,
}

impl Signal {
    pub const ALL: [Signal; 6] = [
        Signal::Sigint,
        Signal::Sigterm,
        Signal::Sighup,
        Signal::Sigkill,
        Signal::Sigbreak,
        Signal::Sigstop,
    ];

    /// Name used inside `REMOTE_KILL_<signal>` wire tokens.
    pub fn wire_name(self) -> &'static str {
        match self {
            Signal::Sigint => "SIGINT",
            Signal::Sigterm => "SIGTERM",
            Signal::Sighup => "SIGHUP",
            Signal::Sigkill => "SIGKILL",
            Signal::Sigbreak => "SIGBREAK",
            Signal::Sigstop => "SIGSTOP",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Signal {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Signal::ALL.into_iter().find(|sig| sig.wire_name() == s).ok_or(())
    }
}

/// A command dispatched to a worker: either a user-defined task name, or
/// one of the closed set of sentinels the runtime itself handles
/// (spec §3 "Sentinel commands").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    User(String),
    Ack,
    Null,
    Exit,
    RemoteKill(Signal),
}

impl Command {
    pub fn user(name: impl Into<String>) -> Self {
        Command::User(name.into())
    }

    /// Wire-form token, as exchanged in Request/Response `command` fields
    /// (spec §6 "Sentinel command wire names").
    pub fn wire_token(&self) -> String {
        match self {
            Command::User(name) => name.clone(),
            Command::Ack => "__ack__".to_string(),
            Command::Null => "__null__".to_string(),
            Command::Exit => "__exit__".to_string(),
            Command::RemoteKill(sig) => {
                format!("__remote_kill_{}__", sig.wire_name().to_lowercase())
            }
        }
    }

    /// Parse a wire token back into a `Command`, recognizing the reserved
    /// namespace; anything else is a user command.
    pub fn from_wire_token(token: &str) -> Self {
        match token {
            "__ack__" => Command::Ack,
            "__null__" => Command::Null,
            "__exit__" => Command::Exit,
            other => {
                if let Some(sig_name) = other
                    .strip_prefix("__remote_kill_")
                    .and_then(|rest| rest.strip_suffix("__"))
                {
                    if let Ok(sig) = sig_name.to_uppercase().parse::<Signal>() {
                        return Command::RemoteKill(sig);
                    }
                }
                Command::User(other.to_string())
            }
        }
    }

    /// True if this command collides with the reserved sentinel namespace
    /// and thus cannot be registered as a user task name.
    pub fn is_reserved(name: &str) -> bool {
        !matches!(Command::from_wire_token(name), Command::User(_))
    }
}

impl Serialize for Command {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.wire_token())
    }
}

impl<'de> Deserialize<'de> for Command {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Command::from_wire_token(&s))
    }
}

#[cfg(test)]
#[path = "sentinel_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parses the `--slave-id=`/`--slave-alias=`/`--slave-title=` flags the
//! controller appends to every spawned worker's argv (spec §6).

use distio_core::WorkerId;

/// A worker's self-identity, as told to it by the controller at spawn time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveIdentity {
    pub worker_id: WorkerId,
    pub alias: String,
    pub title: Option<String>,
}

/// Parse identity flags out of an argv slice. Returns `None` if the
/// required `--slave-id=`/`--slave-alias=` flags are missing or malformed.
pub fn parse_identity<S: AsRef<str>>(args: &[S]) -> Option<SlaveIdentity> {
    let mut worker_id = None;
    let mut alias = None;
    let mut title = None;

    for arg in args {
        let arg = arg.as_ref();
        if let Some(v) = arg.strip_prefix("--slave-id=") {
            worker_id = v.parse::<u64>().ok().map(WorkerId);
        } else if let Some(v) = arg.strip_prefix("--slave-alias=") {
            alias = Some(v.to_string());
        } else if let Some(v) = arg.strip_prefix("--slave-title=") {
            title = Some(v.to_string());
        }
    }

    Some(SlaveIdentity { worker_id: worker_id?, alias: alias?, title })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_required_and_optional_flags() {
        let args = vec!["--slave-id=3", "--slave-alias=bob", "--slave-title=t1", "positional"];
        let identity = parse_identity(&args).unwrap();
        assert_eq!(identity.worker_id, WorkerId(3));
        assert_eq!(identity.alias, "bob");
        assert_eq!(identity.title.as_deref(), Some("t1"));
    }

    #[test]
    fn missing_required_flag_returns_none() {
        let args = vec!["--slave-alias=bob"];
        assert!(parse_identity(&args).is_none());
    }

    #[test]
    fn title_is_optional() {
        let args = vec!["--slave-id=1", "--slave-alias=a"];
        let identity = parse_identity(&args).unwrap();
        assert_eq!(identity.title, None);
    }
}

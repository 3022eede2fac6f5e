//! Scenario scripts.
//!
//! One command per line:
//!
//! ```text
//! c <time> <content> <count> <host>...   create content on hosts
//! u <time> <content>                     bump the content version
//! a <time> <content> <host>              host fetches the content
//! ```
//!
//! Times are in seconds, content ids are 16 hex characters. Blank lines and
//! lines starting with `#` are ignored.

use std::path::Path;
use std::time::Duration;

use rust_ccdn_common::{ContentId, Error, HostId, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioAction {
    Create { content: ContentId, hosts: Vec<HostId> },
    Update { content: ContentId },
    Access { host: HostId, content: ContentId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioEvent {
    pub at: Duration,
    pub action: ScenarioAction,
}

/// Read and parse a scenario file.
pub fn load_scenario(path: impl AsRef<Path>) -> Result<Vec<ScenarioEvent>> {
    let text = std::fs::read_to_string(path)?;
    parse_scenario(&text)
}

pub fn parse_scenario(text: &str) -> Result<Vec<ScenarioEvent>> {
    let mut events = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        events.push(parse_line(idx + 1, line)?);
    }
    Ok(events)
}

fn parse_line(line_no: usize, line: &str) -> Result<ScenarioEvent> {
    let err = |message: String| Error::Scenario {
        line: line_no,
        message,
    };
    let mut tokens = line.split_whitespace();
    let mut next = |what: &str| {
        tokens
            .next()
            .ok_or_else(|| err(format!("missing {}", what)))
    };

    let command = next("command")?;
    let at = parse_time(next("time")?).map_err(err)?;
    let content: ContentId = next("content id")?
        .parse()
        .map_err(|e: Error| err(e.to_string()))?;

    let action = match command {
        "c" => {
            let count: usize = parse_number(next("host count")?).map_err(err)?;
            if count == 0 {
                return Err(err("create needs at least one host".into()));
            }
            let mut hosts = Vec::new();
            for _ in 0..count {
                hosts.push(HostId(parse_number(next("host")?).map_err(err)?));
            }
            ScenarioAction::Create { content, hosts }
        }
        "u" => ScenarioAction::Update { content },
        "a" => {
            let host = HostId(parse_number(next("host")?).map_err(err)?);
            ScenarioAction::Access { host, content }
        }
        other => return Err(err(format!("unknown command {:?}", other))),
    };

    if let Some(extra) = tokens.next() {
        return Err(err(format!("unexpected trailing token {:?}", extra)));
    }

    Ok(ScenarioEvent { at, action })
}

fn parse_time(token: &str) -> std::result::Result<Duration, String> {
    let secs: f64 = token
        .parse()
        .map_err(|_| format!("invalid time {:?}", token))?;
    if secs < 0.0 {
        return Err(format!("time must be a non-negative number of seconds, got {:?}", token));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| format!("time {:?} is out of range", token))
}

fn parse_number<T: std::str::FromStr>(token: &str) -> std::result::Result<T, String> {
    token
        .parse()
        .map_err(|_| format!("invalid number {:?}", token))
}

//! Torrent and session entities built from validated response rows.

use std::fmt;

use serde_derive::Serialize;
use url::Url;

use crate::error::{ErrorKind, Result};
use crate::markup::unescape_html;
use crate::projection::expect_len;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum State {
    Leeching,
    Seeding,
    Complete,
    Stopped,
    Hashing,
    Error,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            State::Leeching => "Leeching",
            State::Seeding => "Seeding",
            State::Complete => "Complete",
            State::Stopped => "Stopped",
            State::Hashing => "Hashing",
            State::Error => "Error",
        };
        f.write_str(s)
    }
}

/// The raw daemon fields the state is derived from.
#[derive(Clone, Copy, Debug, Default)]
pub struct StateFlags<'a> {
    pub active: u64,
    pub message: &'a str,
    pub hashing: u64,
    pub complete: u64,
    pub connection: &'a str,
}

/// Derive the state of a torrent. The first matching rule wins.
pub fn classify(flags: &StateFlags) -> State {
    if flags.active == 1 && !flags.message.is_empty() {
        State::Error
    } else if flags.hashing != 0 {
        State::Hashing
    } else if flags.active == 1 && flags.complete == 1 {
        State::Seeding
    } else if flags.active == 1 && flags.connection == "leech" {
        State::Leeching
    } else if flags.complete == 1 {
        State::Complete
    } else {
        State::Stopped
    }
}

/// Round half up to `decimals` places.
pub fn round(v: f64, decimals: i32) -> f64 {
    let pow = 10f64.powi(decimals);
    (v * pow + 0.5).trunc() / pow
}

/// Completion percentage as displayed, and seconds left at `downrate`.
///
/// An ETA of 0 for an incomplete torrent means the rate is 0 and the time is
/// unknown.
pub fn percent_and_eta(size: u64, done: u64, downrate: u64) -> (String, u64) {
    if size == 0 || done >= size {
        return ("100%".to_string(), 0);
    }

    let percentage = done as f64 / size as f64 * 100.0;
    let mut rounded = (percentage * 10.0).round() / 10.0;
    if rounded >= 100.0 {
        rounded = 99.9;
    }

    let eta = if downrate > 0 {
        (size - done) / downrate
    } else {
        0
    };

    (format!("{:.1}%", rounded), eta)
}

/// One snapshot of a torrent as the daemon reported it.
///
/// `message` and `label` are empty when unset.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Torrent {
    pub name: String,
    pub hash: String,
    pub down_rate: u64,
    pub up_rate: u64,
    pub size: u64,
    pub completed: u64,
    pub percent: String,
    pub eta: u64,
    pub ratio: f64,
    pub age: u64,
    pub up_total: u64,
    pub state: State,
    pub message: String,
    pub tracker: Option<Url>,
    pub path: String,
    pub label: String,
}

impl Torrent {
    /// Map one `d.multicall2` row, laid out as [`crate::request::TORRENT_FIELDS`].
    pub fn from_row(row: Vec<Value>) -> Result<Self> {
        expect_len("torrent row", 16, row.len())?;

        let text = |i: usize| row[i].as_text();
        let num = |i: usize| row[i].as_u64();

        let chunk_size = num(5)?;
        let size = num(4)?.saturating_mul(chunk_size);
        let completed = num(6)?.saturating_mul(chunk_size);
        let down_rate = num(2)?;
        let ratio_raw = num(7)? as f64 / 1000.0;
        let message = text(9)?;

        let state = classify(&StateFlags {
            active: num(11)?,
            message,
            hashing: num(14)?,
            complete: num(13)?,
            connection: text(12)?,
        });
        let (percent, eta) = percent_and_eta(size, completed, down_rate);

        Ok(Torrent {
            name: unescape_html(text(0)?),
            hash: text(1)?.to_string(),
            down_rate,
            up_rate: num(3)?,
            size,
            completed,
            percent,
            eta,
            ratio: round(ratio_raw, 2),
            age: num(8)?,
            up_total: round(completed as f64 * ratio_raw, 1) as u64,
            state,
            message: message.to_string(),
            tracker: None,
            path: unescape_html(text(10)?),
            label: unescape_html(text(15)?),
        })
    }
}

/// Attach the first tracker of every torrent, in request order.
///
/// Either every torrent gets its tracker or the whole call fails.
pub fn apply_trackers(torrents: &mut [Torrent], rows: Vec<Vec<Value>>) -> Result<()> {
    expect_len("tracker rows", torrents.len(), rows.len())?;

    let mut trackers = Vec::with_capacity(rows.len());
    for row in rows {
        let first = row.first().ok_or_else(|| {
            crate::context!(ErrorKind::Shape {
                what: "tracker row",
                expected: 1,
                actual: 0,
            })
        })?;
        let s = first.as_text()?;
        if s.is_empty() {
            trackers.push(None);
            continue;
        }
        let url = Url::parse(s).map_err(|e| {
            crate::context!(e, ErrorKind::Decode(format!("tracker URL, found '{}'", s)))
        })?;
        trackers.push(Some(url));
    }

    for (t, url) in torrents.iter_mut().zip(trackers) {
        t.tracker = url;
    }
    Ok(())
}

/// Global transfer rates in bytes per second.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize)]
pub struct Speeds {
    pub down: u64,
    pub up: u64,
}

impl Speeds {
    pub fn from_values(values: Vec<Value>) -> Result<Self> {
        expect_len("speeds", 2, values.len())?;
        Ok(Speeds {
            down: values[0].as_u64()?,
            up: values[1].as_u64()?,
        })
    }
}

/// Session wide throttles, totals and settings.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize)]
pub struct Stats {
    pub throttle_up: u64,
    pub throttle_down: u64,
    pub total_up: u64,
    pub total_down: u64,
    pub port: u16,
    pub directory: String,
}

impl Stats {
    pub fn from_values(values: Vec<Value>) -> Result<Self> {
        expect_len("stats", 6, values.len())?;
        let port = values[4].as_i64()?;
        Ok(Stats {
            throttle_up: values[0].as_u64()?,
            throttle_down: values[1].as_u64()?,
            total_up: values[2].as_u64()?,
            total_down: values[3].as_u64()?,
            port: u16::try_from(port).map_err(|_| crate::context!(ErrorKind::Range(port)))?,
            directory: values[5].as_text()?.to_string(),
        })
    }
}

/// `"<client>/<library>"` from the version pair.
pub fn version_from_values(values: Vec<Value>) -> Result<String> {
    expect_len("version", 2, values.len())?;
    Ok(format!("{}/{}", values[0].as_text()?, values[1].as_text()?))
}

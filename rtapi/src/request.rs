//! Builders for every remote method the daemon is asked to run.
//!
//! All builders are pure. Batched operations are encoded as one
//! `system.multicall` whose single parameter is an array of
//! `{methodName, params}` records, answered in one round trip.

use std::borrow::Cow;

use crate::value::Value;

/// Attributes requested per torrent by [`list`], in the order the rows come back.
///
/// [`crate::torrent::Torrent::from_row`] reads the row by position, so this
/// order is part of the contract.
pub const TORRENT_FIELDS: [&str; 16] = [
    "d.name=",
    "d.hash=",
    "d.down.rate=",
    "d.up.rate=",
    "d.size_chunks=",
    "d.chunk_size=",
    "d.completed_chunks=",
    "d.ratio=",
    "d.load_date=",
    "d.message=",
    "d.base_path=",
    "d.is_active=",
    "d.connection_current=",
    "d.complete=",
    "d.hashing=",
    "d.custom1=",
];

pub const MULTICALL: &str = "system.multicall";

/// One remote method invocation.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct MethodCall {
    pub name: Cow<'static, str>,
    pub params: Vec<Value>,
}

impl MethodCall {
    pub fn create<N, I>(name: N, params: I) -> Self
    where
        N: Into<Cow<'static, str>>,
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        MethodCall {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// The `{methodName, params}` record this call becomes inside a multicall.
    pub fn to_record(&self) -> Value {
        Value::record(vec![
            ("methodName", Value::text(self.name.clone())),
            ("params", Value::Array(self.params.clone())),
        ])
    }

    /// Inverse of [`MethodCall::to_record`].
    pub fn from_record(value: &Value) -> crate::Result<Self> {
        let name = value
            .member("methodName")
            .ok_or_else(|| crate::context!(crate::ErrorKind::Decode("methodName member".into())))?
            .as_text()?
            .to_string();
        let params = match value.member("params") {
            Some(p) => p.as_array()?.to_vec(),
            None => Vec::new(),
        };
        Ok(MethodCall::create(name, params))
    }
}

/// Bundle independent calls into a single `system.multicall`.
pub fn multicall<I>(calls: I) -> MethodCall
where
    I: IntoIterator<Item = MethodCall>,
{
    let records: Vec<Value> = calls.into_iter().map(|c| c.to_record()).collect();
    MethodCall::create(MULTICALL, vec![Value::Array(records)])
}

/// The torrent listing: `d.multicall2` over the `main` view.
pub fn list() -> MethodCall {
    let params = ["", "main"].into_iter().chain(TORRENT_FIELDS);
    MethodCall::create("d.multicall2", params)
}

pub fn download(link: &str) -> MethodCall {
    MethodCall::create("load.start", ["", link])
}

/// Start a download with a destination directory and a label.
///
/// The label lands in `d.custom1`, the slot ruTorrent reads labels from.
pub fn download_with_options(link: &str, directory: &str, label: &str) -> MethodCall {
    let start = MethodCall::create(
        "load.start",
        vec![
            String::new(),
            link.to_string(),
            format!("d.directory.set=\"{}\"", directory),
            format!("d.custom1.set={}", label),
        ],
    );
    multicall(vec![start])
}

/// N sibling invocations of `method`, one per parameter.
pub fn batch<I, P>(method: &str, params: I) -> MethodCall
where
    I: IntoIterator<Item = P>,
    P: Into<Value>,
{
    multicall(
        params
            .into_iter()
            .map(|p| MethodCall::create(method.to_string(), vec![Into::<Value>::into(p)])),
    )
}

/// First tracker URL of every given torrent.
pub fn trackers<'a, I>(hashes: I) -> MethodCall
where
    I: IntoIterator<Item = &'a str>,
{
    batch("t.url", hashes.into_iter().map(|h| format!("{}:t0", h)))
}

pub fn speeds() -> MethodCall {
    multicall(vec![
        MethodCall::create("throttle.global_down.rate", [""]),
        MethodCall::create("throttle.global_up.rate", [""]),
    ])
}

pub fn stats() -> MethodCall {
    let none: [&str; 0] = [];
    multicall(vec![
        MethodCall::create("throttle.up.max", ["", ""]),
        MethodCall::create("throttle.down.max", ["", ""]),
        MethodCall::create("throttle.global_up.total", none),
        MethodCall::create("throttle.global_down.total", none),
        MethodCall::create("network.listen.port", none),
        MethodCall::create("directory.default", none),
    ])
}

pub fn version() -> MethodCall {
    multicall(vec![
        MethodCall::create("system.client_version", [""]),
        MethodCall::create("system.library_version", [""]),
    ])
}

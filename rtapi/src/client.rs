//! The client session: one connection per call, no state beyond the
//! address and the version fetched at construction.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::envelope;
use crate::error::{ErrorKind, Result};
use crate::markup::{self, MethodResponse};
use crate::projection;
use crate::request::{self, MethodCall};
use crate::sorting::{self, Sorting};
use crate::stream::Address;
use crate::torrent::{self, Speeds, Stats, Torrent};

/// What to start downloading and where.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadOptions {
    /// URL, magnet link or path of the .torrent file, as the daemon accepts it.
    pub link: String,
    /// Destination; the daemon's default directory when `None` or empty.
    pub directory: Option<String>,
    /// Stored in `d.custom1`.
    pub label: Option<String>,
}

/// Send one framed call over `stream` and decode the reply.
pub fn exchange<S>(stream: &mut S, call: &MethodCall) -> Result<MethodResponse>
where
    S: Read + Write + ?Sized,
{
    let framed = envelope::encode(markup::to_markup(call).as_bytes());
    trace!(method = %call.name, bytes = framed.len(), "sending request");
    stream.write_all(&framed).map_err(crate::map_context!())?;
    stream.flush().map_err(crate::map_context!())?;

    let body = envelope::read_body(&mut *stream)?;
    trace!(method = %call.name, bytes = body.len(), "received response");
    let text = std::str::from_utf8(&body)
        .map_err(|e| crate::context!(e, ErrorKind::Decode("UTF-8 encoded markup".into())))?;
    markup::parse_response(text)
}

#[derive(Debug, Clone)]
pub struct Client {
    address: Address,
    version: String,
}

impl Client {
    /// Resolve `address` and fetch the daemon version.
    pub fn new(address: &str) -> Result<Self> {
        Client::with_address(address.parse()?)
    }

    pub fn with_address(address: Address) -> Result<Self> {
        let mut client = Client {
            address,
            version: String::new(),
        };
        let values = projection::scalars(client.call(&request::version())?, "version")?;
        client.version = torrent::version_from_values(values)?;
        debug!(address = %client.address, version = %client.version, "connected to daemon");
        Ok(client)
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// `"<client>/<library>"` version of the daemon.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// One round trip on a fresh connection.
    pub fn call(&self, call: &MethodCall) -> Result<MethodResponse> {
        debug!(address = %self.address, method = %call.name, "calling daemon");
        let mut stream = self.address.connect()?;
        let response = exchange(&mut *stream, call);
        if let Err(e) = stream.shutdown() {
            trace!("shutdown after {}: {}", call.name, e);
        }
        response
    }

    /// All torrents, with their first tracker, ordered by `sorting`.
    pub fn torrents(&self, sorting: Sorting) -> Result<Vec<Torrent>> {
        let rows = projection::rows(self.call(&request::list())?)?;
        let mut torrents = rows
            .into_iter()
            .map(Torrent::from_row)
            .collect::<Result<Vec<_>>>()?;
        self.fill_trackers(&mut torrents)?;
        sorting::sort(&mut torrents, sorting);
        Ok(torrents)
    }

    fn fill_trackers(&self, torrents: &mut [Torrent]) -> Result<()> {
        if torrents.is_empty() {
            return Ok(());
        }
        let call = request::trackers(torrents.iter().map(|t| t.hash.as_str()));
        let rows = projection::rows(self.call(&call)?)?;
        torrent::apply_trackers(torrents, rows)
    }

    pub fn torrent(&self, hash: &str) -> Result<Torrent> {
        self.torrents(Sorting::default())?
            .into_iter()
            .find(|t| t.hash == hash)
            .ok_or_else(|| crate::context!(ErrorKind::NotFound(hash.into())))
    }

    pub fn download(&self, link: &str) -> Result<()> {
        projection::result(self.call(&request::download(link))?)?;
        Ok(())
    }

    pub fn download_with_options(&self, options: &DownloadOptions) -> Result<()> {
        let directory = match options.directory.as_deref() {
            Some(d) if !d.is_empty() => d.to_string(),
            _ => self.stats()?.directory,
        };
        let label = options.label.as_deref().unwrap_or_default();
        let call = request::download_with_options(&options.link, &directory, label);
        projection::check_batch(self.call(&call)?, 1)
    }

    fn command<'a, I>(&self, method: &str, torrents: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Torrent>,
    {
        let hashes: Vec<&str> = torrents.into_iter().map(|t| t.hash.as_str()).collect();
        if hashes.is_empty() {
            debug!(method, "no torrents given, skipping call");
            return Ok(());
        }
        let n = hashes.len();
        projection::check_batch(self.call(&request::batch(method, hashes))?, n)
    }

    pub fn stop<'a, I>(&self, torrents: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Torrent>,
    {
        self.command("d.stop", torrents)
    }

    pub fn start<'a, I>(&self, torrents: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Torrent>,
    {
        self.command("d.start", torrents)
    }

    /// Re-verify the data of the torrents.
    pub fn check<'a, I>(&self, torrents: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Torrent>,
    {
        self.command("d.check_hash", torrents)
    }

    /// Remove the torrents from the daemon and, with `with_data`, their data.
    ///
    /// Data is removed only after the daemon confirmed the erase. A failed
    /// removal does not undo the erase; the last failure is returned after
    /// all paths were tried.
    pub fn erase<'a, I>(&self, with_data: bool, torrents: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Torrent>,
    {
        let torrents: Vec<&Torrent> = torrents.into_iter().collect();
        self.command("d.erase", torrents.iter().copied())?;
        if !with_data {
            return Ok(());
        }

        let mut result = Ok(());
        for t in torrents {
            if let Err(e) = remove_data(Path::new(&t.path)) {
                warn!(path = %t.path, "failed to remove data: {}", e);
                result = Err(crate::context!(e, ErrorKind::RemoveData(PathBuf::from(&t.path))));
            }
        }
        result
    }

    pub fn speeds(&self) -> Result<Speeds> {
        let values = projection::scalars(self.call(&request::speeds())?, "speeds")?;
        Speeds::from_values(values)
    }

    pub fn stats(&self) -> Result<Stats> {
        let values = projection::scalars(self.call(&request::stats())?, "stats")?;
        Stats::from_values(values)
    }
}

fn remove_data(path: &Path) -> io::Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    match fs::symlink_metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
    }
}

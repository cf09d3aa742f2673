//!Client for the [rTorrent](https://github.com/rakshasa/rtorrent) XML-RPC interface.
//!
//!Calls are encoded as XML-RPC markup, wrapped in an SCGI envelope and sent
//!to the daemon's SCGI socket, one connection per call. Responses are
//!decoded into a [`Value`] tree and projected into typed entities like
//![`Torrent`], [`Stats`] and [`Speeds`].
//!
//!```rust,no_run
//!# fn main() -> rtapi::Result<()> {
//!use rtapi::{Client, SortKey, Order, Sorting};
//!
//!let client = Client::new("localhost:5000")?;
//!println!("rTorrent {}", client.version());
//!
//!for t in client.torrents(Sorting::new(SortKey::Name, Order::Ascending))? {
//!    println!("{} {} {}", t.hash, t.state, t.percent);
//!}
//!# Ok(())
//!# }
//!```
//!
//!The lower layers are public as well: [`request`] builds the calls,
//![`markup`] and [`envelope`] do the encoding and [`projection`] shapes the
//!results, so other daemon methods can be called through [`Client::call`].

pub mod error;

pub mod client;
pub mod envelope;
pub mod markup;
pub mod projection;
pub mod request;
pub mod sorting;
pub mod stream;
pub mod torrent;
pub mod value;

pub use crate::client::{Client, DownloadOptions};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::markup::MethodResponse;
pub use crate::request::MethodCall;
pub use crate::sorting::{Order, SortKey, Sorting};
pub use crate::stream::Address;
pub use crate::torrent::{Speeds, State, Stats, Torrent};
pub use crate::value::Value;

use std::cmp::Ordering;
use std::str::FromStr;

use crate::torrent::Torrent;

/// Key a torrent listing is ordered by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Keep the order the daemon returned.
    #[default]
    Daemon,
    Name,
    DownRate,
    UpRate,
    Size,
    Ratio,
    Age,
    UpTotal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Ascending,
    Descending,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Sorting {
    pub key: SortKey,
    pub order: Order,
}

impl Sorting {
    pub fn new(key: SortKey, order: Order) -> Self {
        Sorting { key, order }
    }

    pub fn is_default(&self) -> bool {
        self.key == SortKey::Daemon
    }

    fn compare(&self, a: &Torrent, b: &Torrent) -> Ordering {
        let ord = match self.key {
            SortKey::Daemon => Ordering::Equal,
            SortKey::Name => a.name.cmp(&b.name),
            SortKey::DownRate => a.down_rate.cmp(&b.down_rate),
            SortKey::UpRate => a.up_rate.cmp(&b.up_rate),
            SortKey::Size => a.size.cmp(&b.size),
            SortKey::Ratio => a.ratio.total_cmp(&b.ratio),
            SortKey::Age => a.age.cmp(&b.age),
            SortKey::UpTotal => a.up_total.cmp(&b.up_total),
        };
        match self.order {
            Order::Ascending => ord,
            Order::Descending => ord.reverse(),
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daemon" | "default" => Ok(SortKey::Daemon),
            "name" => Ok(SortKey::Name),
            "down" | "downrate" => Ok(SortKey::DownRate),
            "up" | "uprate" => Ok(SortKey::UpRate),
            "size" => Ok(SortKey::Size),
            "ratio" => Ok(SortKey::Ratio),
            "age" => Ok(SortKey::Age),
            "uptotal" => Ok(SortKey::UpTotal),
            other => Err(format!("unknown sort key '{}'", other)),
        }
    }
}

/// Stable sort of `torrents`; the daemon order is kept for equal keys.
pub fn sort(torrents: &mut [Torrent], sorting: Sorting) {
    if sorting.is_default() {
        return;
    }
    torrents.sort_by(|a, b| sorting.compare(a, b));
}

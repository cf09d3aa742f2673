use std::io::IsTerminal;

use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use rtapi::{Client, DownloadOptions, Order, SortKey, Sorting, Torrent};


const VERSION: &str = env!("CARGO_PKG_VERSION");

fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", n, UNITS[0])
    } else {
        format!("{:.1} {}", v, UNITS[unit])
    }
}

fn human_eta(secs: u64) -> String {
    if secs == 0 {
        return "-".into();
    }
    let (h, m, s) = (secs / 3600, secs / 60 % 60, secs % 60);
    if h > 0 {
        format!("{}h{:02}m", h, m)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// First eight characters of a hash, for the listing.
fn short_hash(hash: &str) -> String {
    hash.chars().take(8).collect()
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn rt_list(client: &Client, sorting: Sorting, json: bool) -> Result<()> {
    let torrents = client.torrents(sorting)?;
    if json {
        return print_json(&torrents);
    }
    for t in &torrents {
        println!(
            "{:<8} {:>6} {:>12} {:>12} {:>5.2} {} {}",
            t.state.to_string(),
            t.percent,
            format!("{}/s", human_bytes(t.down_rate)),
            format!("{}/s", human_bytes(t.up_rate)),
            t.ratio,
            short_hash(&t.hash),
            t.name
        );
    }
    Ok(())
}

fn rt_info(client: &Client, hash: &str, json: bool) -> Result<()> {
    let t = client.torrent(hash)?;
    if json {
        return print_json(&t);
    }
    let tracker = t.tracker.as_ref().map(|u| u.as_str()).unwrap_or("-");
    println!("{} {}", "Name:".bold(), t.name);
    println!("{} {}", "Hash:".bold(), t.hash);
    println!("{} {}", "State:".bold(), t.state);
    if !t.message.is_empty() {
        println!("{} {}", "Message:".bold(), t.message);
    }
    println!(
        "{} {} of {} ({})",
        "Done:".bold(),
        human_bytes(t.completed),
        human_bytes(t.size),
        t.percent
    );
    println!("{} {}", "ETA:".bold(), human_eta(t.eta));
    println!(
        "{} {}/s down, {}/s up",
        "Rates:".bold(),
        human_bytes(t.down_rate),
        human_bytes(t.up_rate)
    );
    println!(
        "{} {:.2} ({} uploaded)",
        "Ratio:".bold(),
        t.ratio,
        human_bytes(t.up_total)
    );
    println!("{} {}", "Tracker:".bold(), tracker);
    println!("{} {}", "Path:".bold(), t.path);
    if !t.label.is_empty() {
        println!("{} {}", "Label:".bold(), t.label);
    }
    Ok(())
}

/// Look up every hash in one listing, in the order given.
fn select(client: &Client, hashes: &[String]) -> Result<Vec<Torrent>> {
    let all = client.torrents(Sorting::default())?;
    hashes
        .iter()
        .map(|h| {
            all.iter()
                .find(|t| &t.hash == h)
                .cloned()
                .ok_or_else(|| anyhow!("No torrent with hash '{}'", h))
        })
        .collect()
}

fn hashes(matches: &ArgMatches) -> Vec<String> {
    matches
        .get_many::<String>("HASH")
        .map(|v| v.cloned().collect())
        .unwrap_or_default()
}

fn build_cli() -> Command {
    let hash_arg = || {
        Arg::new("HASH")
            .required(true)
            .num_args(1..)
            .help("info-hash of the torrent")
    };

    Command::new("rtctl")
        .version(VERSION)
        .about("Control an rTorrent daemon over its SCGI socket")
        .subcommand_required(true)
        .arg(
            Arg::new("address")
                .short('a')
                .long("address")
                .value_name("ADDRESS")
                .env("RTORRENT_ADDRESS")
                .default_value("localhost:5000")
                .help("tcp:HOST:PORT, unix:PATH, or a bare address or socket path"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("print debug"),
        )
        .arg(
            Arg::new("color")
                .long("color")
                .value_parser(["on", "off", "auto"])
                .default_value("auto")
                .help("colorize output"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("print results as JSON"),
        )
        .subcommand(
            Command::new("list")
                .about("List all torrents")
                .arg(
                    Arg::new("sort")
                        .short('s')
                        .long("sort")
                        .value_name("KEY")
                        .value_parser(|s: &str| s.parse::<SortKey>())
                        .help("name, downrate, uprate, size, ratio, age or uptotal"),
                )
                .arg(
                    Arg::new("reverse")
                        .short('r')
                        .long("reverse")
                        .action(ArgAction::SetTrue)
                        .help("sort in descending order"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Show one torrent")
                .arg(Arg::new("HASH").required(true).help("info-hash of the torrent")),
        )
        .subcommand(
            Command::new("add")
                .about("Start downloading a torrent")
                .arg(
                    Arg::new("LINK")
                        .required(true)
                        .help("URL, magnet link or path of the .torrent file"),
                )
                .arg(
                    Arg::new("directory")
                        .short('d')
                        .long("directory")
                        .value_name("DIR")
                        .help("destination, the daemon's default directory if not given"),
                )
                .arg(
                    Arg::new("label")
                        .short('l')
                        .long("label")
                        .value_name("LABEL"),
                ),
        )
        .subcommand(Command::new("stop").about("Stop torrents").arg(hash_arg()))
        .subcommand(Command::new("start").about("Start torrents").arg(hash_arg()))
        .subcommand(
            Command::new("check")
                .about("Re-check the data of torrents")
                .arg(hash_arg()),
        )
        .subcommand(
            Command::new("erase")
                .about("Remove torrents from the daemon")
                .arg(
                    Arg::new("with-data")
                        .long("with-data")
                        .action(ArgAction::SetTrue)
                        .help("also delete the downloaded data"),
                )
                .arg(hash_arg()),
        )
        .subcommand(Command::new("speeds").about("Show the global transfer rates"))
        .subcommand(Command::new("stats").about("Show throttles, totals and settings"))
        .subcommand(Command::new("version").about("Show the daemon version"))
}

fn should_colorize(matches: &ArgMatches) -> bool {
    match matches.get_one::<String>("color").map(String::as_str) {
        Some("on") => true,
        Some("off") => false,
        _ => std::io::stdout().is_terminal() && std::io::stderr().is_terminal(),
    }
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

fn main() {
    let matches = build_cli().get_matches();
    colored::control::set_override(should_colorize(&matches));
    init_logging(matches.get_flag("debug"));

    if let Err(e) = do_main(&matches) {
        if matches.get_flag("debug") {
            eprintln!("{:?}", e);
        } else {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
        }
        std::process::exit(1);
    }
}

fn do_main(matches: &ArgMatches) -> Result<()> {
    let address = matches
        .get_one::<String>("address")
        .map(String::as_str)
        .unwrap_or("localhost:5000");
    let json = matches.get_flag("json");

    let client =
        Client::new(address).with_context(|| format!("Failed to connect to '{}'", address))?;

    match matches.subcommand() {
        Some(("list", sub)) => {
            let sorting = Sorting::new(
                sub.get_one::<SortKey>("sort").copied().unwrap_or_default(),
                if sub.get_flag("reverse") {
                    Order::Descending
                } else {
                    Order::Ascending
                },
            );
            rt_list(&client, sorting, json)?
        }
        Some(("info", sub)) => {
            let hash = sub
                .get_one::<String>("HASH")
                .ok_or_else(|| anyhow!("No HASH given"))?;
            rt_info(&client, hash, json)?
        }
        Some(("add", sub)) => {
            let link = sub
                .get_one::<String>("LINK")
                .ok_or_else(|| anyhow!("No LINK given"))?;
            let directory = sub.get_one::<String>("directory").cloned();
            let label = sub.get_one::<String>("label").cloned();
            if directory.is_none() && label.is_none() {
                client.download(link)?
            } else {
                client.download_with_options(&DownloadOptions {
                    link: link.clone(),
                    directory,
                    label,
                })?
            }
        }
        Some(("stop", sub)) => client.stop(&select(&client, &hashes(sub))?)?,
        Some(("start", sub)) => client.start(&select(&client, &hashes(sub))?)?,
        Some(("check", sub)) => client.check(&select(&client, &hashes(sub))?)?,
        Some(("erase", sub)) => {
            let torrents = select(&client, &hashes(sub))?;
            client.erase(sub.get_flag("with-data"), &torrents)?
        }
        Some(("speeds", _)) => {
            let speeds = client.speeds()?;
            if json {
                print_json(&speeds)?
            } else {
                println!(
                    "{} {}/s  {} {}/s",
                    "Down:".bold(),
                    human_bytes(speeds.down),
                    "Up:".bold(),
                    human_bytes(speeds.up)
                );
            }
        }
        Some(("stats", _)) => {
            let stats = client.stats()?;
            if json {
                print_json(&stats)?
            } else {
                let limit = |v: u64| {
                    if v == 0 {
                        "unlimited".to_string()
                    } else {
                        format!("{}/s", human_bytes(v))
                    }
                };
                println!("{} {}", "Throttle up:".bold(), limit(stats.throttle_up));
                println!("{} {}", "Throttle down:".bold(), limit(stats.throttle_down));
                println!("{} {}", "Total up:".bold(), human_bytes(stats.total_up));
                println!("{} {}", "Total down:".bold(), human_bytes(stats.total_down));
                println!("{} {}", "Port:".bold(), stats.port);
                println!("{} {}", "Directory:".bold(), stats.directory);
            }
        }
        Some(("version", _)) => {
            if json {
                print_json(client.version())?
            } else {
                println!("{}", client.version());
            }
        }
        Some((name, _)) => return Err(anyhow!("Unknown command '{}'", name)),
        None => return Err(anyhow!("No command given")),
    }
    Ok(())
}

use crate::error::{AppError, Result};
use crate::interval::CandleInterval;

pub const USAGE: &str = "\
usage: coin-tracker <command>

commands:
  serve                                   run the HTTP API
  candles <market> <interval> [count]     print candles (interval: 15m, 4h, 1d, minutes/240, ...)
  chart <market> <interval> [count]       print candles with indicator overlays as JSON
  watch [market,...]                      poll tickers until Ctrl+C
  markets [quote]                         list venue markets (default quote: KRW)
  coins [--favorites]                     list tracked coins
  add <symbol> <market> <korean> <english>
  favorite <symbol>                       toggle a favorite
  seed                                    register the default KRW markets
  help";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Candles {
        market: String,
        interval: CandleInterval,
        count: Option<usize>,
    },
    Chart {
        market: String,
        interval: CandleInterval,
        count: Option<usize>,
    },
    Watch {
        markets: Vec<String>,
    },
    Markets {
        quote: String,
    },
    Coins {
        favorites_only: bool,
    },
    Add {
        symbol: String,
        market: String,
        korean_name: String,
        english_name: String,
    },
    Favorite {
        symbol: String,
    },
    Seed,
    Help,
}

/// Accepts exchange codes ("4h") and route form ("minutes/240", "days").
pub fn parse_interval_arg(arg: &str) -> Result<CandleInterval> {
    match arg.split_once('/') {
        Some((unit, value)) => CandleInterval::from_route(unit, value),
        None if arg.chars().all(|c| c.is_ascii_alphabetic()) => CandleInterval::from_route(arg, ""),
        None => CandleInterval::from_code(arg),
    }
}

fn parse_count(arg: Option<&String>) -> Result<Option<usize>> {
    arg.map(|s| {
        s.parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| AppError::invalid_argument(format!("count must be a positive integer, got '{}'", s)))
    })
    .transpose()
}

fn required<'a>(args: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    args.get(idx)
        .map(String::as_str)
        .ok_or_else(|| AppError::invalid_argument(format!("missing <{}>\n\n{}", name, USAGE)))
}

/// Parse arguments after the program name.
pub fn parse_command(args: &[String]) -> Result<Command> {
    let Some(cmd) = args.first() else {
        return Ok(Command::Serve);
    };
    match cmd.as_str() {
        "serve" => Ok(Command::Serve),
        "candles" | "chart" => {
            let market = required(args, 1, "market")?.to_ascii_uppercase();
            let interval = parse_interval_arg(required(args, 2, "interval")?)?;
            let count = parse_count(args.get(3))?;
            Ok(if cmd == "candles" {
                Command::Candles {
                    market,
                    interval,
                    count,
                }
            } else {
                Command::Chart {
                    market,
                    interval,
                    count,
                }
            })
        }
        "watch" => Ok(Command::Watch {
            markets: args
                .get(1)
                .map(|list| {
                    list.split(',')
                        .map(|m| m.trim().to_ascii_uppercase())
                        .filter(|m| !m.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        }),
        "markets" => Ok(Command::Markets {
            quote: args
                .get(1)
                .map(|q| q.to_ascii_uppercase())
                .unwrap_or_else(|| "KRW".to_string()),
        }),
        "coins" => Ok(Command::Coins {
            favorites_only: args.iter().skip(1).any(|a| a == "--favorites" || a == "-f"),
        }),
        "add" => Ok(Command::Add {
            symbol: required(args, 1, "symbol")?.to_string(),
            market: required(args, 2, "market")?.to_string(),
            korean_name: required(args, 3, "korean")?.to_string(),
            english_name: required(args, 4, "english")?.to_string(),
        }),
        "favorite" => Ok(Command::Favorite {
            symbol: required(args, 1, "symbol")?.to_string(),
        }),
        "seed" => Ok(Command::Seed),
        "help" | "-h" | "--help" => Ok(Command::Help),
        other => Err(AppError::invalid_argument(format!(
            "unknown command '{}'\n\n{}",
            other, USAGE
        ))),
    }
}

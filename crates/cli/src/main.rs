//! # CLI — StrataKV interactive shell
//!
//! A REPL over the storage engine. Reads commands from stdin, executes
//! them against the store, and prints results to stdout. Works both
//! interactively and scripted (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! PUT key value   Insert or update a key (key is a u64)
//! GET key         Look up a key (prints the value or "(nil)")
//! DEL key         Delete a key (prints "true" iff it was present)
//! FLUSH           Force-flush the memtable to level 0
//! COMPACT         Run a compaction round
//! RESET           Wipe the store, memory and disk
//! STATS           Print engine debug info
//! EXIT / QUIT     Shut down (flushes buffered writes)
//! ```
//!
//! ## Configuration
//!
//! ```text
//! STRATA_DIR   base directory for the store   (default: "data")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! StrataKV started (dir=data, levels=1, tables=0)
//! > PUT 1 hello
//! OK
//! > GET 1
//! hello
//! > EXIT
//! bye
//! ```

use anyhow::Result;
use engine::KvStore;
use std::io::{self, BufRead, Write};

fn main() -> Result<()> {
    env_logger::init();

    let dir = std::env::var("STRATA_DIR").unwrap_or_else(|_| "data".to_string());
    let mut store = KvStore::open(&dir)?;

    println!(
        "StrataKV started (dir={}, levels={}, tables={})",
        dir,
        store.level_count(),
        store.table_count()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }

        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };

        match command.to_ascii_uppercase().as_str() {
            "PUT" => match (parse_key(parts.next()), parts.next()) {
                (Some(key), Some(value)) => {
                    store.put(key, value.as_bytes().to_vec())?;
                    println!("OK");
                }
                _ => println!("usage: PUT <u64 key> <value>"),
            },
            "GET" => match parse_key(parts.next()) {
                Some(key) => match store.get(key)? {
                    Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                    None => println!("(nil)"),
                },
                None => println!("usage: GET <u64 key>"),
            },
            "DEL" => match parse_key(parts.next()) {
                Some(key) => println!("{}", store.del(key)?),
                None => println!("usage: DEL <u64 key>"),
            },
            "FLUSH" => {
                store.flush()?;
                println!("OK");
            }
            "COMPACT" => {
                store.compact()?;
                println!("OK");
            }
            "RESET" => {
                store.reset()?;
                println!("OK");
            }
            "STATS" => println!("{:#?}", store),
            "EXIT" | "QUIT" => break,
            other => println!("unknown command: {}", other),
        }
    }

    println!("bye");
    Ok(())
}

fn parse_key(arg: Option<&str>) -> Option<u64> {
    arg.and_then(|raw| raw.parse().ok())
}

//! CLI probe for a feed store file.
//!
//! # Responsibility
//! - Open a store, report its startup mode and entity counts, and shut it
//!   down cleanly.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `feedvault_cli [DB_PATH | --config OPTIONS_JSON]`

use feedvault_core::{
    core_version, BookMark, EntityStore, Feed, Folder, Label, News, NewsBin, SearchFilter,
    SearchMark, StoreOptions, StoreRead,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("feedvault error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let options = parse_options(std::env::args().skip(1).collect())?;
    options.init_logging()?;

    println!("feedvault_core version={}", core_version());
    let store = EntityStore::open(&options)?;
    println!("startup_mode={}", store.startup_mode().as_str());
    println!("folders={}", store.load_all::<Folder>()?.len());
    println!("bookmarks={}", store.load_all::<BookMark>()?.len());
    println!("search_marks={}", store.load_all::<SearchMark>()?.len());
    println!("news_bins={}", store.load_all::<NewsBin>()?.len());
    println!("feeds={}", store.load_all::<Feed>()?.len());
    println!("news={}", store.load_all::<News>()?.len());
    println!("labels={}", store.load_all::<Label>()?.len());
    println!("filters={}", store.load_all::<SearchFilter>()?.len());
    store.shutdown()?;
    info!("event=cli_probe module=cli status=ok");
    Ok(())
}

fn parse_options(args: Vec<String>) -> Result<StoreOptions, Box<dyn Error>> {
    let options = match args.as_slice() {
        [] => StoreOptions::default(),
        [flag, json] if flag == "--config" => StoreOptions::from_json_str(json)?,
        [path] => StoreOptions::new(path),
        _ => return Err("usage: feedvault_cli [DB_PATH | --config OPTIONS_JSON]".into()),
    };
    options.validate()?;
    Ok(options)
}

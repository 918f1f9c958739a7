//! Command-line front end for the region record store

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::process;
use tracing_subscriber::EnvFilter;

use region_records::{
    config::StoreConfigBuilder,
    error::{StoreError, StoreResult},
    Change, Committed, Record, Session, SortDirection, SortKey, StoreConfig, EXIT_SUCCESS,
};

fn main() {
    init_tracing();

    match run() {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("regions: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn init_tracing() {
    // Logs go to stderr; stdout carries record tables only
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> StoreResult<i32> {
    let matches = build_cli().get_matches();
    let config = parse_config_from_matches(&matches)?;
    let mut session = Session::new(config)?;

    match matches.subcommand() {
        Some(("files", _)) => {
            let files = session.list_files()?;
            if files.is_empty() {
                println!("Empty folder");
            }
            for file in files {
                println!("{file}");
            }
        }
        Some(("create-file", sub)) => {
            let name = session.create_file(required(sub, "name")?)?;
            println!("File with name {name} was created successfully!");
        }
        Some(("delete-file", sub)) => {
            let name = session.delete_file(required(sub, "name")?)?;
            println!("File {name} has been deleted successfully");
        }
        Some((command, sub)) => {
            let file = required(sub, "file")?;
            session.open_file(file)?;
            run_record_command(&mut session, command, sub)?;
        }
        None => unreachable!("subcommand_required is set"),
    }

    Ok(EXIT_SUCCESS)
}

fn run_record_command(session: &mut Session, command: &str, sub: &ArgMatches) -> StoreResult<()> {
    match command {
        "show" => print_records(session, &session.records()?),
        "add" => {
            let record = record_from_matches(session.config(), sub)?;
            session.append_record(&record)?;
            println!("Record was saved successfully!");
            print_records(session, &session.records()?);
        }
        "delete" => {
            let index = position_from_matches(sub)?;
            let committed = session.delete_at(index)?;
            report(session, committed);
        }
        "edit" => {
            let index = position_from_matches(sub)?;
            let record = record_from_matches(session.config(), sub)?;
            let committed = session.replace_at(index, record)?;
            report(session, committed);
        }
        "sort" => {
            let key: SortKey = required(sub, "by")?.parse()?;
            let direction: SortDirection = required(sub, "order")?.parse()?;
            let committed = session.reorder(key, direction)?;
            report(session, committed);
        }
        "insert" => {
            let record = record_from_matches(session.config(), sub)?;
            let committed = session.insert(record)?;
            report(session, committed);
        }
        "order" => match session.detect_order()? {
            Some(order) => println!("Records are sorted {order}"),
            None => return Err(StoreError::UnorderedCollection),
        },
        other => unreachable!("unknown subcommand {other}"),
    }
    Ok(())
}

fn build_cli() -> Command {
    let file_arg = || {
        Arg::new("file")
            .short('f')
            .long("file")
            .help("Data file to work on (name or name.txt)")
            .required(true)
            .value_name("FILE")
    };
    let record_args = || {
        [
            Arg::new("name")
                .help("Region name (no spaces)")
                .required(true)
                .value_name("NAME"),
            Arg::new("area")
                .help("Region area")
                .required(true)
                .allow_negative_numbers(true)
                .value_parser(value_parser!(f64))
                .value_name("AREA"),
            Arg::new("population")
                .help("Region population")
                .required(true)
                .allow_negative_numbers(true)
                .value_parser(value_parser!(i64))
                .value_name("POPULATION"),
        ]
    };
    let position_arg = || {
        Arg::new("position")
            .help("Record number as shown in the No. column")
            .required(true)
            .value_parser(value_parser!(usize))
            .value_name("POSITION")
    };

    Command::new("regions")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Manage flat-file region records")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("dir")
                .short('d')
                .long("dir")
                .global(true)
                .help("Working folder holding the data files [env: REGIONS_DIR]")
                .value_name("DIR"),
        )
        .arg(
            Arg::new("no-sync")
                .long("no-sync")
                .global(true)
                .help("Skip fsync before committing a rewrite")
                .action(ArgAction::SetTrue),
        )
        .subcommand(Command::new("files").about("List data files"))
        .subcommand(
            Command::new("create-file")
                .about("Create an empty data file")
                .arg(Arg::new("name").required(true).value_name("NAME")),
        )
        .subcommand(
            Command::new("delete-file")
                .about("Delete a data file")
                .arg(Arg::new("name").required(true).value_name("NAME")),
        )
        .subcommand(
            Command::new("show")
                .about("Show the records of a file")
                .arg(file_arg()),
        )
        .subcommand(
            Command::new("add")
                .about("Append a record to the end of a file")
                .arg(file_arg())
                .args(record_args()),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete one record")
                .arg(file_arg())
                .arg(position_arg()),
        )
        .subcommand(
            Command::new("edit")
                .about("Replace one record")
                .arg(file_arg())
                .arg(position_arg())
                .args(record_args()),
        )
        .subcommand(
            Command::new("sort")
                .about("Reorder all records")
                .arg(file_arg())
                .arg(
                    Arg::new("by")
                        .long("by")
                        .help("Sort key")
                        .value_parser(["name", "area", "population"])
                        .default_value("name"),
                )
                .arg(
                    Arg::new("order")
                        .long("order")
                        .help("Sort direction")
                        .value_parser(["asc", "desc"])
                        .default_value("asc"),
                ),
        )
        .subcommand(
            Command::new("insert")
                .about("Insert a record keeping the file's current order")
                .arg(file_arg())
                .args(record_args()),
        )
        .subcommand(
            Command::new("order")
                .about("Report the order the records are sorted in")
                .arg(file_arg()),
        )
}

/// Build the store configuration from global options
fn parse_config_from_matches(matches: &ArgMatches) -> StoreResult<StoreConfig> {
    let mut builder = StoreConfigBuilder::new();

    // Global args are visible from the subcommand matches
    let sub = matches.subcommand().map(|(_, sub)| sub).unwrap_or(matches);

    if let Some(dir) = sub.get_one::<String>("dir") {
        builder = builder.working_dir(dir);
    }
    if sub.get_flag("no-sync") {
        builder = builder.no_sync();
    }

    builder.build()
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> StoreResult<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| StoreError::invalid_config(&format!("missing argument: {id}")))
}

fn position_from_matches(matches: &ArgMatches) -> StoreResult<usize> {
    let position = matches.get_one::<usize>("position").copied().unwrap_or(0);
    if position == 0 {
        return Err(StoreError::invalid_record("record numbers start at 1"));
    }
    Ok(position - 1)
}

fn record_from_matches(config: &StoreConfig, matches: &ArgMatches) -> StoreResult<Record> {
    let name = required(matches, "name")?;
    let area = matches.get_one::<f64>("area").copied().unwrap_or(f64::NAN);
    let population = matches.get_one::<i64>("population").copied().unwrap_or(-1);
    let population = u32::try_from(population).map_err(|_| {
        StoreError::invalid_record(&format!(
            "population must be within [{}; {}]",
            config.population_min, config.population_max
        ))
    })?;
    Record::with_limits(name, area, population, config)
}

fn print_records(session: &Session, records: &[Record]) {
    let file = session.current_file().map(|f| f.name()).unwrap_or("");
    if records.is_empty() {
        println!("File {file} is empty");
        return;
    }

    println!("Records in file {file}\n");
    println!("{:<5}{:<30}{:<20}{:<20}", "No.", "REGION NAME", "AREA SIZE", "POPULATION");
    for (i, record) in records.iter().enumerate() {
        println!(
            "{:<5}{:<30}{:<20.2}{:<20}",
            i + 1,
            record.name(),
            record.area(),
            record.population()
        );
    }
}

fn report(session: &Session, committed: Committed) {
    print_records(session, &committed.records);
    println!();
    match committed.change {
        Change::Deleted { index, record } => {
            println!("Record No.{} [{}] was deleted successfully!", index + 1, record);
        }
        Change::Replaced {
            index,
            previous,
            current,
        } => {
            println!(
                "Record No.{} [{}] was replaced with record [{}]",
                index + 1,
                previous,
                current
            );
        }
        Change::Reordered { key, direction } => {
            println!("File was sorted by {key} in {direction} successfully!");
        }
        Change::Inserted {
            index,
            record,
            order,
        } => {
            println!(
                "Record [{}] was inserted at No.{} (records are sorted {})",
                record,
                index + 1,
                order
            );
        }
    }
}

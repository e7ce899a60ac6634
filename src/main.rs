use std::path::{Path, PathBuf};

use clap::{App, Arg};
use url::Url;

use scrivener::compile::compile_site;
use scrivener::config::{Config, Project};

fn main() {
    let matches = App::new("scrivener")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Compiles a tree of Markdown sources into a static website")
        .arg(
            Arg::with_name("source")
                .short("s")
                .long("source")
                .takes_value(true)
                .value_name("DIR")
                .help("Site source directory"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("DIR")
                .help("Output directory"),
        )
        .arg(
            Arg::with_name("templates")
                .short("t")
                .long("templates")
                .takes_value(true)
                .value_name("DIR")
                .help("Template directory"),
        )
        .arg(
            Arg::with_name("site-url")
                .long("site-url")
                .takes_value(true)
                .value_name("URL")
                .help("Base URL for absolute link generation"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .takes_value(true)
                .value_name("FILE")
                .help("Project file supplying any omitted flags"),
        )
        .arg(
            Arg::with_name("drafts")
                .long("drafts")
                .help("Compile drafts into the blog collection"),
        )
        .arg(
            Arg::with_name("debug")
                .long("debug")
                .help("Enable debugging messages"),
        )
        .get_matches();

    let level = if matches.is_present("debug") {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Err(err) = run(
        matches.value_of("config"),
        matches.value_of("source"),
        matches.value_of("output"),
        matches.value_of("templates"),
        matches.value_of("site-url"),
        matches.is_present("drafts"),
    ) {
        eprintln!("scrivener: {}", err);
        std::process::exit(1);
    }
}

fn run(
    config: Option<&str>,
    source: Option<&str>,
    output: Option<&str>,
    templates: Option<&str>,
    site_url: Option<&str>,
    drafts: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let project = match config {
        Some(path) => Project::from_file(Path::new(path))?,
        None => Project::default(),
    };
    let site_url = match site_url {
        Some(url) => Some(Url::parse(url)?),
        None => None,
    };
    let config = Config::resolve(
        project,
        source.map(PathBuf::from),
        output.map(PathBuf::from),
        templates.map(PathBuf::from),
        site_url,
        drafts,
    )?;
    compile_site(&config)?;
    Ok(())
}
